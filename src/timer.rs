// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Retransmission deadline.
//!
//! A one-shot monotonic deadline checked around each timed read. Nothing
//! fires asynchronously; the caller asks how long it may still block.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Arm a deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Deadline { at: Instant::now() + timeout }
    }

    /// Time left before expiry, `None` once expired.
    pub fn remaining(&self) -> Option<Duration> {
        let left = self.at.saturating_duration_since(Instant::now());
        if left.is_zero() { None } else { Some(left) }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }
}
