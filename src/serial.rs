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

use std::time::Duration;
use serialport::{SerialPort as SerialPortTrait, DataBits, Parity, StopBits};
use tracing::{debug, trace};

// ============================================================================
// SerialPort Trait
// ============================================================================

/// Transport under a [`LinkSession`](crate::session::LinkSession).
///
/// The session writes whole encoded frames and reads a byte at a time. A read
/// that sees no data within `timeout` must fail with `ErrorKind::TimedOut`;
/// any other error ends the session operation in progress.
pub trait SerialPort: Send {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize>;
}

// ============================================================================
// Real Serial Port Implementation
// ============================================================================

/// Serial device opened through the `serialport` crate
pub struct RealSerialPort {
    port: Box<dyn SerialPortTrait>,
    /// Read timeout currently programmed into the device
    timeout: Duration,
}

impl RealSerialPort {
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        data_bits: DataBits,
        parity: Parity,
        stop_bits: StopBits,
    ) -> Result<Self, serialport::Error> {
        let timeout = Duration::from_millis(100);
        let port = serialport::new(port_name, baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(timeout)
            .open()?;

        // Stale bytes from a previous session would only confuse the decoder
        port.clear(serialport::ClearBuffer::All)?;
        debug!("Opened {} at {} baud", port_name, baud_rate);

        Ok(RealSerialPort { port, timeout })
    }
}

impl SerialPort for RealSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.port.write_all(buf)?;
        self.port.flush()?;
        trace!("Wrote {:02X?}", buf);
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize> {
        if timeout != self.timeout {
            self.port.set_timeout(timeout).map_err(std::io::Error::other)?;
            self.timeout = timeout;
        }
        self.port.read(buf)
    }
}

// ============================================================================
// Mock Serial Port for Testing
// ============================================================================

/// Scripted line. Each script entry is one byte from the peer, or `None` for
/// a read that times out. On drop the script must be used up and the bytes
/// written must equal `expected_writes`.
#[cfg(test)]
pub struct MockSerialPort {
    script: std::collections::VecDeque<Option<u8>>,
    written: Vec<u8>,
    expected_writes: Vec<u8>,
}

#[cfg(test)]
impl MockSerialPort {
    pub fn new(script: Vec<Option<u8>>, expected_writes: Vec<u8>) -> Self {
        MockSerialPort {
            script: script.into(),
            written: Vec::new(),
            expected_writes,
        }
    }

    /// Script a wire sequence with no timeouts in it
    pub fn from_bytes(bytes: &[u8], expected_writes: Vec<u8>) -> Self {
        Self::new(bytes.iter().copied().map(Some).collect(), expected_writes)
    }
}

#[cfg(test)]
impl SerialPort for MockSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.written.extend_from_slice(buf);
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // Running dry means the script is wrong, not that the line is idle
        let first = match self.script.pop_front() {
            None => {
                return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "Mock script exhausted"));
            }
            Some(None) => {
                return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "Mock timeout"));
            }
            Some(Some(byte)) => byte,
        };

        let mut count = 0;
        let mut next = Some(first);
        while let Some(byte) = next {
            buf[count] = byte;
            count += 1;
            next = match self.script.front() {
                Some(Some(byte)) if count < buf.len() => {
                    let byte = *byte;
                    self.script.pop_front();
                    Some(byte)
                }
                _ => None,
            };
        }
        Ok(count)
    }
}

#[cfg(test)]
impl Drop for MockSerialPort {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        assert!(
            self.script.is_empty(),
            "MockSerialPort dropped with {} scripted reads left",
            self.script.len()
        );

        assert_eq!(
            self.written,
            self.expected_writes,
            "MockSerialPort wrote the wrong bytes\nexpected: {:02X?}\nwritten:  {:02X?}",
            self.expected_writes,
            self.written
        );
    }
}

// ============================================================================
// In-memory Line for Testing
// ============================================================================

/// One end of an in-memory full-duplex line. Each `write_all` call is one
/// chunk on the line and can be dropped or damaged to simulate noise.
#[cfg(test)]
pub struct PipeSerialPort {
    tx: std::sync::mpsc::Sender<Vec<u8>>,
    rx: std::sync::mpsc::Receiver<Vec<u8>>,
    pending: std::collections::VecDeque<u8>,
    writes: usize,
    dropped_writes: Vec<usize>,
    corrupted_writes: Vec<(usize, usize, u8)>,
}

#[cfg(test)]
pub fn pipe_pair() -> (PipeSerialPort, PipeSerialPort) {
    let (a_tx, b_rx) = std::sync::mpsc::channel();
    let (b_tx, a_rx) = std::sync::mpsc::channel();
    (PipeSerialPort::new(a_tx, a_rx), PipeSerialPort::new(b_tx, b_rx))
}

#[cfg(test)]
impl PipeSerialPort {
    fn new(tx: std::sync::mpsc::Sender<Vec<u8>>, rx: std::sync::mpsc::Receiver<Vec<u8>>) -> Self {
        PipeSerialPort {
            tx,
            rx,
            pending: std::collections::VecDeque::new(),
            writes: 0,
            dropped_writes: Vec::new(),
            corrupted_writes: Vec::new(),
        }
    }

    /// Lose the `n`th `write_all` (0-based) on the line
    pub fn drop_write(mut self, n: usize) -> Self {
        self.dropped_writes.push(n);
        self
    }

    /// XOR `mask` into byte `index` of the `n`th `write_all`
    pub fn corrupt_write(mut self, n: usize, index: usize, mask: u8) -> Self {
        self.corrupted_writes.push((n, index, mask));
        self
    }
}

#[cfg(test)]
impl SerialPort for PipeSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        let n = self.writes;
        self.writes += 1;
        if self.dropped_writes.contains(&n) {
            return Ok(());
        }

        let mut chunk = buf.to_vec();
        for &(_, index, mask) in self.corrupted_writes.iter().filter(|(w, _, _)| *w == n) {
            if let Some(byte) = chunk.get_mut(index) {
                *byte ^= mask;
            }
        }

        // The far end may already be gone after a close
        let _ = self.tx.send(chunk);
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(timeout) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "Pipe timeout"));
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "Pipe closed"));
                }
            }
        }

        let mut bytes_read = 0;
        while bytes_read < buf.len() {
            match self.pending.pop_front() {
                Some(byte) => {
                    buf[bytes_read] = byte;
                    bytes_read += 1;
                }
                None => break,
            }
        }
        Ok(bytes_read)
    }
}
