//! Frame line layout
//!
//! ```text
//! t iii l dd..dd [ssss] [z] \r     standard id, data frame
//! T iiiiiiii l dd..dd [ssss] [z] \r   extended id, data frame
//! r iii l [ssss] [z] \r            standard id, remote frame
//! R iiiiiiii l [ssss] [z] \r       extended id, remote frame
//! ```
//!
//! The optional suffix is told apart by its length only, so the size of every line is
//! fully determined by the id kind, the frame kind, the length digit and the metadata.

use crate::buffer::CmdBuf;
use crate::core::{CanMessage, Error, FrameKind, IdKind, MessageMeta};

use super::{AUTO_POLL_MARKER, TERMINATOR, hex};

const STD_ID_WIDTH: usize = 3;
const EXT_ID_WIDTH: usize = 8;
const TIMESTAMP_WIDTH: usize = 4;
const MARKER_WIDTH: usize = 1;
const FULL_SUFFIX_WIDTH: usize = TIMESTAMP_WIDTH + MARKER_WIDTH;

pub(crate) const fn opcode(id_kind: IdKind, kind: FrameKind) -> u8 {
    match (id_kind, kind) {
        (IdKind::Standard, FrameKind::Data) => b't',
        (IdKind::Extended, FrameKind::Data) => b'T',
        (IdKind::Standard, FrameKind::Remote) => b'r',
        (IdKind::Extended, FrameKind::Remote) => b'R',
    }
}

const fn id_width(id_kind: IdKind) -> usize {
    match id_kind {
        IdKind::Standard => STD_ID_WIDTH,
        IdKind::Extended => EXT_ID_WIDTH,
    }
}

/// Total line size, terminator included
pub(crate) const fn line_len(
    id_kind: IdKind,
    kind: FrameKind,
    len: usize,
    meta: &MessageMeta,
) -> usize {
    let payload = match kind {
        FrameKind::Data => 2 * len,
        FrameKind::Remote => 0,
    };
    let timestamp = if meta.timestamp.is_some() {
        TIMESTAMP_WIDTH
    } else {
        0
    };
    let marker = if meta.auto_poll { MARKER_WIDTH } else { 0 };
    1 + id_width(id_kind) + 1 + payload + timestamp + marker + 1
}

pub(crate) fn decode(line: &[u8]) -> Result<(CanMessage, MessageMeta), Error> {
    let (id_kind, kind) = match line.first() {
        Some(b't') => (IdKind::Standard, FrameKind::Data),
        Some(b'T') => (IdKind::Extended, FrameKind::Data),
        Some(b'r') => (IdKind::Standard, FrameKind::Remote),
        Some(b'R') => (IdKind::Extended, FrameKind::Remote),
        _ => return Err(Error::InvalidData),
    };

    let id_end = 1 + id_width(id_kind);
    if line.len() < id_end + 2 {
        return Err(Error::InvalidSize);
    }
    let len = usize::from(hex::nibble(line[id_end])?);
    if len > CanMessage::MAX_LEN {
        return Err(Error::InvalidValue);
    }

    let base = line_len(id_kind, kind, len, &MessageMeta::default());
    let extra = line.len().checked_sub(base).ok_or(Error::InvalidSize)?;
    let (has_timestamp, has_marker) = match extra {
        0 => (false, false),
        TIMESTAMP_WIDTH => (true, false),
        MARKER_WIDTH => (false, true),
        FULL_SUFFIX_WIDTH => (true, true),
        _ => return Err(Error::InvalidSize),
    };
    if line[line.len() - 1] != TERMINATOR {
        return Err(Error::InvalidData);
    }

    let raw_id = hex::parse(&line[1..id_end])?;
    let mut pos = id_end + 1;

    let mut data = [0u8; CanMessage::MAX_LEN];
    if kind == FrameKind::Data {
        for byte in &mut data[..len] {
            *byte = hex::parse_u8(&line[pos..pos + 2])?;
            pos += 2;
        }
    }

    let timestamp = if has_timestamp {
        let value = hex::parse_u16(&line[pos..pos + TIMESTAMP_WIDTH])?;
        pos += TIMESTAMP_WIDTH;
        Some(value)
    } else {
        None
    };

    if has_marker && line[pos] != AUTO_POLL_MARKER {
        return Err(Error::InvalidData);
    }

    let message = CanMessage::from_parts(id_kind, raw_id, kind, len, &data[..len])?;
    let meta = MessageMeta {
        timestamp,
        auto_poll: has_marker,
    };
    Ok((message, meta))
}

pub(crate) fn encode(
    message: &CanMessage,
    meta: &MessageMeta,
    buf: &mut CmdBuf,
) -> Result<(), Error> {
    let id_kind = message.id_kind();
    let size = line_len(id_kind, message.kind(), message.len(), meta);
    if size > buf.remaining() {
        return Err(Error::Overflow);
    }
    let start = buf.len();

    buf.push(opcode(id_kind, message.kind()))?;
    hex::push(buf, message.raw_id(), id_width(id_kind))?;
    hex::push(buf, message.len() as u32, 1)?;
    for &byte in message.data() {
        hex::push(buf, byte.into(), 2)?;
    }
    if let Some(timestamp) = meta.timestamp {
        hex::push(buf, timestamp.into(), TIMESTAMP_WIDTH)?;
    }
    if meta.auto_poll {
        buf.push(AUTO_POLL_MARKER)?;
    }
    buf.push(TERMINATOR)?;

    debug_assert!(buf.len() - start == size);
    Ok(())
}
