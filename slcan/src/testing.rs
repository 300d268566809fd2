//! Test doubles for the serial port and the clock

extern crate std;

use core::cell::Cell;
use std::collections::VecDeque;
use std::vec::Vec;

use crate::driver::clock::Clock;
use crate::driver::serial::{Interest, IoError, PortConfig, SerialPort};
use crate::time::{Duration, Instant};

/// In-memory port: the test feeds incoming bytes and inspects written ones
pub(crate) struct MockPort {
    pub incoming: VecDeque<u8>,
    pub written: Vec<u8>,
    /// Maximum bytes accepted by a single `write`
    pub write_limit: usize,
    pub write_calls: usize,
    pub fail_read: bool,
    pub fail_write: bool,
    pub config: Option<PortConfig>,
    pub flushed: usize,
}

impl MockPort {
    pub fn new() -> Self {
        Self {
            incoming: VecDeque::new(),
            written: Vec::new(),
            write_limit: usize::MAX,
            write_calls: 0,
            fail_read: false,
            fail_write: false,
            config: None,
            flushed: 0,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes.iter().copied());
    }

    pub fn take_written(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.written)
    }
}

impl SerialPort for MockPort {
    fn configure(&mut self, config: &PortConfig) -> Result<(), IoError> {
        self.config = Some(*config);
        Ok(())
    }

    fn poll(&mut self, interest: Interest, _timeout: Duration) -> Result<Interest, IoError> {
        let mut ready = Interest::empty();
        if !self.incoming.is_empty() {
            ready |= Interest::READABLE;
        }
        if self.write_limit > 0 {
            ready |= Interest::WRITABLE;
        }
        Ok(ready & interest)
    }

    fn bytes_available(&mut self) -> Result<usize, IoError> {
        Ok(self.incoming.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        if self.fail_read {
            return Err(IoError::Device);
        }
        let n = buf.len().min(self.incoming.len());
        for (dst, src) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        if self.fail_write {
            return Err(IoError::Device);
        }
        self.write_calls += 1;
        let n = buf.len().min(self.write_limit);
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> Result<(), IoError> {
        self.flushed += 1;
        Ok(())
    }
}

/// Clock that only moves when told to
pub(crate) struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::from_ticks(0)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
