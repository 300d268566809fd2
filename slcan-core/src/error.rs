use core::fmt;

/// Result code shared by every layer of the stack
///
/// Capacity errors (`Overflow`, `Overrun`) and `Underrun` are transient: the operation had no
/// effect and may be retried once the buffer state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An argument can never be accepted by the callee
    InvalidArgument,
    /// A code or toggle digit outside its defined set
    InvalidValue,
    /// A line whose length does not match its layout
    InvalidSize,
    /// A malformed field, e.g., a non-hex digit
    InvalidData,
    /// An identifier outside the range of its kind
    OutOfRange,
    /// Not enough buffered data to satisfy a read
    Underrun,
    /// A byte buffer or line buffer has no room left
    Overflow,
    /// A message or request queue is full
    Overrun,
    /// The serial collaborator failed
    Io,
    /// A response that matches no outstanding request
    Unexpected,
    /// The peer answered with ERR
    ExecFail,
    /// No response arrived before the request deadline
    Timeout,
    /// The request was abandoned by an engine reset
    Canceled,
    /// The operation is not allowed in the current channel state
    State,
}

impl Error {
    /// Returns `true` for errors caused by a full buffer
    pub const fn is_capacity(self) -> bool {
        matches!(self, Error::Overflow | Error::Overrun)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::InvalidArgument => "invalid argument",
            Error::InvalidValue => "invalid value",
            Error::InvalidSize => "invalid size",
            Error::InvalidData => "invalid data",
            Error::OutOfRange => "value out of range",
            Error::Underrun => "buffer underrun",
            Error::Overflow => "buffer overflow",
            Error::Overrun => "queue overrun",
            Error::Io => "serial i/o failure",
            Error::Unexpected => "unexpected response",
            Error::ExecFail => "command refused by peer",
            Error::Timeout => "request timed out",
            Error::Canceled => "request canceled",
            Error::State => "operation not allowed in current state",
        };
        f.write_str(text)
    }
}

impl core::error::Error for Error {}
