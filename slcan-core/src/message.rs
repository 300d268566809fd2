use embedded_can::{ExtendedId, Id, StandardId};

use crate::Error;

/// CAN identifier width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdKind {
    /// 11-bit identifier
    Standard,
    /// 29-bit identifier
    Extended,
}

impl IdKind {
    pub fn max_raw(self) -> u32 {
        match self {
            IdKind::Standard => StandardId::MAX.as_raw() as u32,
            IdKind::Extended => ExtendedId::MAX.as_raw(),
        }
    }

    /// Builds an identifier of this kind, failing with `OutOfRange` if `raw` does not fit
    pub fn id(self, raw: u32) -> Result<Id, Error> {
        match self {
            IdKind::Standard => u16::try_from(raw)
                .ok()
                .and_then(StandardId::new)
                .map(Id::Standard),
            IdKind::Extended => ExtendedId::new(raw).map(Id::Extended),
        }
        .ok_or(Error::OutOfRange)
    }
}

impl From<Id> for IdKind {
    fn from(value: Id) -> Self {
        match value {
            Id::Standard(_) => IdKind::Standard,
            Id::Extended(_) => IdKind::Extended,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameKind {
    Data,
    /// Remote transmission request; carries a length but no payload
    Remote,
}

/// Classic CAN frame
///
/// Payload bytes past `len` are kept zeroed, so the derived equality compares frames by their
/// meaningful content only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanMessage {
    id: Id,
    kind: FrameKind,
    len: u8,
    data: [u8; CanMessage::MAX_LEN],
}

#[cfg(feature = "defmt")]
impl defmt::Format for CanMessage {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "CanMessage {{ id: {=u32:#x} ({}), kind: {}, data: {=[u8]:02x} }}",
            self.raw_id(),
            self.id_kind(),
            self.kind,
            self.data(),
        )
    }
}

impl CanMessage {
    pub const MAX_LEN: usize = 8;

    pub fn new_data(id: impl Into<Id>, data: &[u8]) -> Result<Self, Error> {
        if data.len() > Self::MAX_LEN {
            return Err(Error::InvalidSize);
        }
        let mut buf = [0u8; Self::MAX_LEN];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            id: id.into(),
            kind: FrameKind::Data,
            len: data.len() as u8,
            data: buf,
        })
    }

    pub fn new_remote(id: impl Into<Id>, len: usize) -> Result<Self, Error> {
        if len > Self::MAX_LEN {
            return Err(Error::InvalidSize);
        }
        Ok(Self {
            id: id.into(),
            kind: FrameKind::Remote,
            len: len as u8,
            data: [0; Self::MAX_LEN],
        })
    }

    /// Builds a frame from its raw parts, checking the identifier range
    pub fn from_parts(
        id_kind: IdKind,
        raw_id: u32,
        kind: FrameKind,
        len: usize,
        data: &[u8],
    ) -> Result<Self, Error> {
        let id = id_kind.id(raw_id)?;
        match kind {
            FrameKind::Data if data.len() != len => Err(Error::InvalidSize),
            FrameKind::Data => Self::new_data(id, data),
            FrameKind::Remote => Self::new_remote(id, len),
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn id_kind(&self) -> IdKind {
        self.id.into()
    }

    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(id) => id.as_raw().into(),
            Id::Extended(id) => id.as_raw(),
        }
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn is_remote(&self) -> bool {
        self.kind == FrameKind::Remote
    }

    pub fn len(&self) -> usize {
        self.len.into()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payload of a data frame; empty for remote frames
    pub fn data(&self) -> &[u8] {
        match self.kind {
            FrameKind::Data => &self.data[..self.len()],
            FrameKind::Remote => &[],
        }
    }
}

impl embedded_can::Frame for CanMessage {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::new_data(id, data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        CanMessage::new_remote(id, dlc).ok()
    }

    fn is_extended(&self) -> bool {
        self.id_kind() == IdKind::Extended
    }

    fn is_remote_frame(&self) -> bool {
        self.is_remote()
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.len()
    }

    fn data(&self) -> &[u8] {
        CanMessage::data(self)
    }
}

/// Per-frame metadata carried on the serial line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageMeta {
    /// Reception time in milliseconds, wrapping every minute
    pub timestamp: Option<u16>,
    /// Set when the adapter pushed the frame on its own rather than answering a poll
    pub auto_poll: bool,
}
