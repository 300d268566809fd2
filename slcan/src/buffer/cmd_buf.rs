use core::ops::Deref;

use crate::core::Error;

/// Capacity of a protocol line buffer
///
/// Fits the longest line: an extended data frame with timestamp and auto-poll marker.
pub const CMD_BUF_SIZE: usize = 32;

/// Holds a single protocol line, terminator included
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdBuf {
    bytes: heapless::Vec<u8, CMD_BUF_SIZE>,
}

impl CmdBuf {
    pub const fn new() -> Self {
        Self {
            bytes: heapless::Vec::new(),
        }
    }

    pub fn from_slice(line: &[u8]) -> Result<Self, Error> {
        let bytes = heapless::Vec::from_slice(line).map_err(|_| Error::Overflow)?;
        Ok(Self { bytes })
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn push(&mut self, byte: u8) -> Result<(), Error> {
        self.bytes.push(byte).map_err(|_| Error::Overflow)
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.bytes
            .extend_from_slice(bytes)
            .map_err(|_| Error::Overflow)
    }

    pub fn is_full(&self) -> bool {
        self.bytes.is_full()
    }

    pub fn remaining(&self) -> usize {
        CMD_BUF_SIZE - self.bytes.len()
    }
}

impl Deref for CmdBuf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}
