//! Engine and transport configuration

use crate::buffer::CMD_BUF_SIZE;
use crate::time::Duration;
use crate::transport::IO_FIFO_SIZE;

/// Transport configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct TransportConfig {
    /// Outbound byte count at which new submissions are refused
    ///
    /// The slack above the watermark keeps room for the lines already being encoded.
    pub tx_watermark: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tx_watermark: IO_FIFO_SIZE - 2 * CMD_BUF_SIZE,
        }
    }
}

/// Master engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct MasterConfig {
    /// Time a request waits for its response
    pub timeout: Duration,
    /// When `false`, requests complete as soon as they are queued for transmission.
    /// Use with adapters that never answer.
    pub expect_answers: bool,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(100),
            expect_answers: true,
        }
    }
}

/// Slave engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct SlaveConfig {
    pub hardware_version: u8,
    pub software_version: u8,
    pub serial_number: u16,
    /// Initial auto-poll state
    pub auto_poll: bool,
    /// Initial timestamp state
    pub timestamp: bool,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            hardware_version: 0x10,
            software_version: 0x10,
            serial_number: 0x0001,
            auto_poll: false,
            timestamp: false,
        }
    }
}
