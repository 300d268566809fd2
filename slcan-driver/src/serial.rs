//! Serial port collaborator

use slcan_core::{Error, InvalidValue, UartBaud};

use crate::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Parity {
    #[default]
    None = 0,
    Even = 1,
    Odd = 2,
}

impl TryFrom<u8> for Parity {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Parity::None),
            1 => Ok(Parity::Even),
            2 => Ok(Parity::Odd),
            _ => Err(InvalidValue),
        }
    }
}

impl From<Parity> for u8 {
    fn from(value: Parity) -> Self {
        value as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StopBits {
    #[default]
    One = 0,
    Two = 1,
}

impl TryFrom<u8> for StopBits {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StopBits::One),
            1 => Ok(StopBits::Two),
            _ => Err(InvalidValue),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(value: StopBits) -> Self {
        value as u8
    }
}

/// Serial line settings
///
/// The default is 57600 baud, no parity, one stop bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct PortConfig {
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub baud: UartBaud,
}

impl PortConfig {
    pub const fn new(baud: UartBaud) -> Self {
        Self {
            parity: Parity::None,
            stop_bits: StopBits::One,
            baud,
        }
    }
}

bitflags::bitflags! {
    /// Port readiness interest and result of `SerialPort::poll`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Interest: u8 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 2;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Interest {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Interest({=u8:#04x})", self.bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// The port cannot take more data right now
    WouldBlock,
    /// The port was closed by the driver or the peer
    Closed,
    /// Any other device failure
    Device,
}

impl From<IoError> for Error {
    fn from(value: IoError) -> Self {
        match value {
            IoError::Closed => Error::State,
            IoError::WouldBlock | IoError::Device => Error::Io,
        }
    }
}

/// Non-blocking byte channel
///
/// `read` and `write` return the number of bytes actually transferred, which may be zero.
pub trait SerialPort {
    fn configure(&mut self, config: &PortConfig) -> Result<(), IoError>;

    /// Returns the subset of `interest` the port is ready for, waiting at most `timeout`
    fn poll(&mut self, interest: Interest, timeout: Duration) -> Result<Interest, IoError>;

    fn bytes_available(&mut self) -> Result<usize, IoError>;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError>;

    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError>;

    /// Pushes bytes buffered inside the driver to the line
    fn flush(&mut self) -> Result<(), IoError>;
}

impl<P: SerialPort + ?Sized> SerialPort for &mut P {
    fn configure(&mut self, config: &PortConfig) -> Result<(), IoError> {
        (**self).configure(config)
    }

    fn poll(&mut self, interest: Interest, timeout: Duration) -> Result<Interest, IoError> {
        (**self).poll(interest, timeout)
    }

    fn bytes_available(&mut self) -> Result<usize, IoError> {
        (**self).bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<(), IoError> {
        (**self).flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PortConfig::default();
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.baud, UartBaud::Baud57600);
        assert_eq!(PortConfig::new(UartBaud::Baud57600), config);
    }

    #[test]
    fn test_codes() {
        assert_eq!(Parity::try_from(2).unwrap(), Parity::Odd);
        assert!(Parity::try_from(3).is_err());
        assert_eq!(u8::from(Parity::Even), 1);
        assert_eq!(StopBits::try_from(1).unwrap(), StopBits::Two);
        assert!(StopBits::try_from(2).is_err());
        assert_eq!(u8::from(StopBits::One), 0);
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(Error::from(IoError::Device), Error::Io);
        assert_eq!(Error::from(IoError::Closed), Error::State);
    }
}
