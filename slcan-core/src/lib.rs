//! SLCAN protocol core data types
//!
//! This crate provides basic data type definitions used by other SLCAN crates.
//! Stack users should not depend on this crate directly. Use `slcan::core` reexport instead.
#![no_std]

mod error;
mod message;

pub use error::Error;
pub use message::{CanMessage, FrameKind, IdKind, MessageMeta};

pub use embedded_can::{ExtendedId, Id, StandardId};

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue;

impl From<InvalidValue> for Error {
    fn from(_: InvalidValue) -> Self {
        Error::InvalidValue
    }
}

/// Standard CAN bit rate selected with the `S` command
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BitRate {
    Kbit10 = 0,
    Kbit20 = 1,
    Kbit50 = 2,
    Kbit100 = 3,
    Kbit125 = 4,
    Kbit250 = 5,
    Kbit500 = 6,
    Kbit800 = 7,
    Mbit1 = 8,
}

impl BitRate {
    pub const MAX: BitRate = BitRate::Mbit1;

    pub const fn try_from_u8(code: u8) -> Option<BitRate> {
        match code {
            0 => Some(BitRate::Kbit10),
            1 => Some(BitRate::Kbit20),
            2 => Some(BitRate::Kbit50),
            3 => Some(BitRate::Kbit100),
            4 => Some(BitRate::Kbit125),
            5 => Some(BitRate::Kbit250),
            6 => Some(BitRate::Kbit500),
            7 => Some(BitRate::Kbit800),
            8 => Some(BitRate::Mbit1),
            _ => None,
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }

    pub const fn bits_per_second(self) -> u32 {
        match self {
            BitRate::Kbit10 => 10_000,
            BitRate::Kbit20 => 20_000,
            BitRate::Kbit50 => 50_000,
            BitRate::Kbit100 => 100_000,
            BitRate::Kbit125 => 125_000,
            BitRate::Kbit250 => 250_000,
            BitRate::Kbit500 => 500_000,
            BitRate::Kbit800 => 800_000,
            BitRate::Mbit1 => 1_000_000,
        }
    }
}

impl From<BitRate> for u8 {
    fn from(value: BitRate) -> Self {
        value.into_u8()
    }
}

impl TryFrom<u8> for BitRate {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from_u8(value).ok_or(InvalidValue)
    }
}

/// Serial line baud rate selected with the `U` command
///
/// Codes are ordered from the fastest rate down, matching the adapter's table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum UartBaud {
    Baud230400 = 0,
    Baud115200 = 1,
    #[default]
    Baud57600 = 2,
    Baud38400 = 3,
    Baud19200 = 4,
    Baud9600 = 5,
    Baud2400 = 6,
}

impl UartBaud {
    pub const MAX: UartBaud = UartBaud::Baud2400;

    pub const fn try_from_u8(code: u8) -> Option<UartBaud> {
        match code {
            0 => Some(UartBaud::Baud230400),
            1 => Some(UartBaud::Baud115200),
            2 => Some(UartBaud::Baud57600),
            3 => Some(UartBaud::Baud38400),
            4 => Some(UartBaud::Baud19200),
            5 => Some(UartBaud::Baud9600),
            6 => Some(UartBaud::Baud2400),
            _ => None,
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }

    pub const fn bits_per_second(self) -> u32 {
        match self {
            UartBaud::Baud230400 => 230_400,
            UartBaud::Baud115200 => 115_200,
            UartBaud::Baud57600 => 57_600,
            UartBaud::Baud38400 => 38_400,
            UartBaud::Baud19200 => 19_200,
            UartBaud::Baud9600 => 9_600,
            UartBaud::Baud2400 => 2_400,
        }
    }
}

impl From<UartBaud> for u8 {
    fn from(value: UartBaud) -> Self {
        value.into_u8()
    }
}

impl TryFrom<u8> for UartBaud {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from_u8(value).ok_or(InvalidValue)
    }
}

bitflags::bitflags! {
    /// Adapter status reported in the `F` response
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        const RX_FIFO_FULL = 1 << 0;
        const TX_FIFO_FULL = 1 << 1;
        const ERROR_WARNING = 1 << 2;
        const DATA_OVERRUN = 1 << 3;
        const ERROR_PASSIVE = 1 << 5;
        const ARBITRATION_LOST = 1 << 6;
        const BUS_ERROR = 1 << 7;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Status({=u8:#04x})", self.bits())
    }
}
