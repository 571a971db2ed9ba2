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

//! Session configuration, fixed for the lifetime of a link.

use std::time::Duration;

use crate::frame::Address;
use crate::protocol::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT, MAX_PAYLOAD_LIMIT, MAX_PAYLOAD_SIZE, MIN_TIMEOUT};

/// Which end of the link this session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends SET, transmits data, starts the close
    Initiator,
    /// Answers SET, receives data
    Responder,
}

impl Role {
    /// Address stamped on frames this side sends
    pub fn address(self) -> Address {
        match self {
            Role::Initiator => Address::Command,
            Role::Responder => Address::Response,
        }
    }

    /// Address expected on frames from the peer
    pub fn peer_address(self) -> Address {
        match self {
            Role::Initiator => Address::Response,
            Role::Responder => Address::Command,
        }
    }
}

/// Retransmission policy. `max_attempts` counts every transmission of a
/// frame, the first one included. Both fields are clamped to usable minimums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl RetryBudget {
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        RetryBudget {
            max_attempts: max_attempts.max(1),
            timeout: timeout.max(MIN_TIMEOUT),
        }
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        RetryBudget::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT)
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub role: Role,
    pub retry: RetryBudget,
    /// Largest Information payload, before stuffing
    pub max_payload: usize,
}

impl LinkConfig {
    pub fn new(role: Role) -> Self {
        LinkConfig {
            role,
            retry: RetryBudget::default(),
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }

    pub fn retry(mut self, max_attempts: u32, timeout: Duration) -> Self {
        self.retry = RetryBudget::new(max_attempts, timeout);
        self
    }

    /// Clamped to `1..=MAX_PAYLOAD_LIMIT`.
    pub fn max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.clamp(1, MAX_PAYLOAD_LIMIT);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::new(Role::Initiator);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.timeout, Duration::from_secs(3));
        assert_eq!(config.max_payload, 1000);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let config = LinkConfig::new(Role::Responder).retry(0, Duration::from_millis(10));
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn test_role_addresses() {
        assert_eq!(Role::Initiator.address().to_byte(), 0x03);
        assert_eq!(Role::Responder.address().to_byte(), 0x01);
        assert_eq!(Role::Initiator.peer_address(), Role::Responder.address());
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let config = LinkConfig::new(Role::Initiator).retry(3, Duration::ZERO);
        assert_eq!(config.retry.timeout, MIN_TIMEOUT);
    }

    #[test]
    fn test_max_payload_bounded() {
        assert_eq!(LinkConfig::new(Role::Initiator).max_payload(usize::MAX).max_payload, MAX_PAYLOAD_LIMIT);
        assert_eq!(LinkConfig::new(Role::Initiator).max_payload(0).max_payload, 1);
        assert_eq!(LinkConfig::new(Role::Initiator).max_payload(64).max_payload, 64);
    }
}
