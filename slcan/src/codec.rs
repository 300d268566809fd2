//! Line codec
//!
//! Translates between protocol lines and typed commands. A line always includes its
//! terminator: `\r` for everything except the ERR response, which is a single BEL byte.
//!
//! Decoding selects the layout by the first byte. Opcodes whose request and response share
//! the same letter (`F`, `V`, `N`, `Z`) are told apart by the line length alone.
//! Unknown opcodes are not an error; they decode to [`Command::Unknown`] so that a slave can
//! answer them with ERR.

mod frame;
mod hex;

use crate::buffer::CmdBuf;
use crate::core::{BitRate, CanMessage, Error, FrameKind, IdKind, MessageMeta, Status, UartBaud};

pub const TERMINATOR: u8 = b'\r';
pub const BELL: u8 = 0x07;
/// Trailing byte of a frame line pushed by an adapter in auto-poll mode
pub const AUTO_POLL_MARKER: u8 = b'z';

/// Command kind, independent of its shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Opcode {
    Ok,
    Err,
    OkAutoPoll,
    OkAutoPollExt,
    SetupCanStd,
    SetupCanBtr,
    Open,
    Listen,
    Close,
    Transmit,
    TransmitExt,
    TransmitRtr,
    TransmitRtrExt,
    Poll,
    PollAll,
    Status,
    SetAutoPoll,
    SetupUart,
    Version,
    SerialNumber,
    SetTimestamp,
    SetAcceptanceFilter,
    SetAcceptanceMask,
    Unknown(u8),
}

impl Opcode {
    /// First byte of the line
    pub const fn byte(self) -> u8 {
        match self {
            Opcode::Ok => TERMINATOR,
            Opcode::Err => BELL,
            Opcode::OkAutoPoll => b'z',
            Opcode::OkAutoPollExt => b'Z',
            Opcode::SetupCanStd => b'S',
            Opcode::SetupCanBtr => b's',
            Opcode::Open => b'O',
            Opcode::Listen => b'L',
            Opcode::Close => b'C',
            Opcode::Transmit => b't',
            Opcode::TransmitExt => b'T',
            Opcode::TransmitRtr => b'r',
            Opcode::TransmitRtrExt => b'R',
            Opcode::Poll => b'P',
            Opcode::PollAll => b'A',
            Opcode::Status => b'F',
            Opcode::SetAutoPoll => b'X',
            Opcode::SetupUart => b'U',
            Opcode::Version => b'V',
            Opcode::SerialNumber => b'N',
            Opcode::SetTimestamp => b'Z',
            Opcode::SetAcceptanceFilter => b'M',
            Opcode::SetAcceptanceMask => b'm',
            Opcode::Unknown(byte) => byte,
        }
    }

    pub const fn is_transmit(self) -> bool {
        matches!(
            self,
            Opcode::Transmit | Opcode::TransmitExt | Opcode::TransmitRtr | Opcode::TransmitRtrExt
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Frames travel in both directions with the same layout
    NotApplicable,
    Request,
    Response,
}

/// Protocol command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// `\r`
    Ok,
    /// BEL
    Err,
    /// `z\r` or `Z\r`, answers a transmit while auto-poll is on
    OkAutoPoll(IdKind),
    SetupCanStd(BitRate),
    SetupCanBtr {
        btr0: u8,
        btr1: u8,
    },
    Open,
    Listen,
    Close,
    Transmit {
        message: CanMessage,
        meta: MessageMeta,
    },
    Poll,
    PollAll,
    StatusRequest,
    StatusResponse(Status),
    SetAutoPoll(bool),
    SetupUart(UartBaud),
    VersionRequest,
    VersionResponse {
        hardware: u8,
        software: u8,
    },
    SerialNumberRequest,
    SerialNumberResponse(u16),
    SetTimestamp(bool),
    SetAcceptanceFilter(u32),
    SetAcceptanceMask(u32),
    Unknown(u8),
}

impl Command {
    pub fn transmit(message: CanMessage) -> Self {
        Command::Transmit {
            message,
            meta: MessageMeta::default(),
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Ok => Opcode::Ok,
            Command::Err => Opcode::Err,
            Command::OkAutoPoll(IdKind::Standard) => Opcode::OkAutoPoll,
            Command::OkAutoPoll(IdKind::Extended) => Opcode::OkAutoPollExt,
            Command::SetupCanStd(_) => Opcode::SetupCanStd,
            Command::SetupCanBtr { .. } => Opcode::SetupCanBtr,
            Command::Open => Opcode::Open,
            Command::Listen => Opcode::Listen,
            Command::Close => Opcode::Close,
            Command::Transmit { message, .. } => match (message.id_kind(), message.kind()) {
                (IdKind::Standard, FrameKind::Data) => Opcode::Transmit,
                (IdKind::Extended, FrameKind::Data) => Opcode::TransmitExt,
                (IdKind::Standard, FrameKind::Remote) => Opcode::TransmitRtr,
                (IdKind::Extended, FrameKind::Remote) => Opcode::TransmitRtrExt,
            },
            Command::Poll => Opcode::Poll,
            Command::PollAll => Opcode::PollAll,
            Command::StatusRequest | Command::StatusResponse(_) => Opcode::Status,
            Command::SetAutoPoll(_) => Opcode::SetAutoPoll,
            Command::SetupUart(_) => Opcode::SetupUart,
            Command::VersionRequest | Command::VersionResponse { .. } => Opcode::Version,
            Command::SerialNumberRequest | Command::SerialNumberResponse(_) => {
                Opcode::SerialNumber
            }
            Command::SetTimestamp(_) => Opcode::SetTimestamp,
            Command::SetAcceptanceFilter(_) => Opcode::SetAcceptanceFilter,
            Command::SetAcceptanceMask(_) => Opcode::SetAcceptanceMask,
            Command::Unknown(byte) => Opcode::Unknown(*byte),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Command::Ok
            | Command::Err
            | Command::OkAutoPoll(_)
            | Command::StatusResponse(_)
            | Command::VersionResponse { .. }
            | Command::SerialNumberResponse(_) => Mode::Response,
            Command::Transmit { .. } | Command::Unknown(_) => Mode::NotApplicable,
            _ => Mode::Request,
        }
    }

    pub fn is_frame(&self) -> bool {
        matches!(self, Command::Transmit { .. })
    }

    pub fn decode(line: &[u8]) -> Result<Self, Error> {
        let Some(&opcode) = line.first() else {
            return Err(Error::InvalidSize);
        };

        let command = match opcode {
            TERMINATOR | BELL => {
                if line.len() != 1 {
                    return Err(Error::InvalidSize);
                }
                if opcode == TERMINATOR {
                    Command::Ok
                } else {
                    Command::Err
                }
            }
            b'z' => {
                fields(line, 0)?;
                Command::OkAutoPoll(IdKind::Standard)
            }
            b'Z' => match line.len() {
                2 => {
                    fields(line, 0)?;
                    Command::OkAutoPoll(IdKind::Extended)
                }
                _ => Command::SetTimestamp(toggle(fields(line, 1)?)?),
            },
            b'S' => {
                let code = hex::parse_u8(fields(line, 1)?)?;
                Command::SetupCanStd(BitRate::try_from(code)?)
            }
            b's' => {
                let digits = fields(line, 4)?;
                Command::SetupCanBtr {
                    btr0: hex::parse_u8(&digits[..2])?,
                    btr1: hex::parse_u8(&digits[2..])?,
                }
            }
            b'O' => {
                fields(line, 0)?;
                Command::Open
            }
            b'L' => {
                fields(line, 0)?;
                Command::Listen
            }
            b'C' => {
                fields(line, 0)?;
                Command::Close
            }
            b't' | b'T' | b'r' | b'R' => {
                let (message, meta) = frame::decode(line)?;
                Command::Transmit { message, meta }
            }
            b'P' => {
                fields(line, 0)?;
                Command::Poll
            }
            b'A' => {
                fields(line, 0)?;
                Command::PollAll
            }
            b'F' => match line.len() {
                2 => {
                    fields(line, 0)?;
                    Command::StatusRequest
                }
                _ => {
                    let bits = hex::parse_u8(fields(line, 2)?)?;
                    Command::StatusResponse(Status::from_bits_retain(bits))
                }
            },
            b'X' => Command::SetAutoPoll(toggle(fields(line, 1)?)?),
            b'U' => {
                let code = hex::parse_u8(fields(line, 1)?)?;
                Command::SetupUart(UartBaud::try_from(code)?)
            }
            b'V' => match line.len() {
                2 => {
                    fields(line, 0)?;
                    Command::VersionRequest
                }
                _ => {
                    let digits = fields(line, 4)?;
                    Command::VersionResponse {
                        hardware: hex::parse_u8(&digits[..2])?,
                        software: hex::parse_u8(&digits[2..])?,
                    }
                }
            },
            b'N' => match line.len() {
                2 => {
                    fields(line, 0)?;
                    Command::SerialNumberRequest
                }
                _ => Command::SerialNumberResponse(hex::parse_u16(fields(line, 4)?)?),
            },
            b'M' => Command::SetAcceptanceFilter(hex::parse(fields(line, 8)?)?),
            b'm' => Command::SetAcceptanceMask(hex::parse(fields(line, 8)?)?),
            other => Command::Unknown(other),
        };
        Ok(command)
    }

    /// Writes the line into `buf`, replacing its content
    ///
    /// On failure `buf` is left empty.
    pub fn encode(&self, buf: &mut CmdBuf) -> Result<(), Error> {
        buf.clear();
        let res = self.write_line(buf);
        if res.is_err() {
            buf.clear();
        }
        res
    }

    fn write_line(&self, buf: &mut CmdBuf) -> Result<(), Error> {
        match *self {
            Command::Ok => return buf.push(TERMINATOR),
            Command::Err => return buf.push(BELL),
            Command::Transmit { message, meta } => return frame::encode(&message, &meta, buf),
            Command::Unknown(_) => return Err(Error::InvalidValue),
            _ => {}
        }

        buf.push(self.opcode().byte())?;
        match *self {
            Command::SetupCanStd(rate) => hex::push(buf, rate.into_u8().into(), 1)?,
            Command::SetupCanBtr { btr0, btr1 } => {
                hex::push(buf, btr0.into(), 2)?;
                hex::push(buf, btr1.into(), 2)?;
            }
            Command::StatusResponse(status) => hex::push(buf, status.bits().into(), 2)?,
            Command::SetAutoPoll(enable) | Command::SetTimestamp(enable) => {
                hex::push(buf, enable.into(), 1)?
            }
            Command::SetupUart(baud) => hex::push(buf, baud.into_u8().into(), 1)?,
            Command::VersionResponse { hardware, software } => {
                hex::push(buf, hardware.into(), 2)?;
                hex::push(buf, software.into(), 2)?;
            }
            Command::SerialNumberResponse(number) => hex::push(buf, number.into(), 4)?,
            Command::SetAcceptanceFilter(value) | Command::SetAcceptanceMask(value) => {
                hex::push(buf, value, 8)?
            }
            _ => {}
        }
        buf.push(TERMINATOR)
    }
}

/// Returns the `width` field bytes between the opcode and the terminator
fn fields(line: &[u8], width: usize) -> Result<&[u8], Error> {
    if line.len() != width + 2 {
        return Err(Error::InvalidSize);
    }
    if line[width + 1] != TERMINATOR {
        return Err(Error::InvalidData);
    }
    Ok(&line[1..=width])
}

fn toggle(digits: &[u8]) -> Result<bool, Error> {
    match hex::parse_u8(digits)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::InvalidValue),
    }
}
