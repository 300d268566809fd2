use crate::buffer::CmdBuf;
use crate::core::Error;

const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

pub(crate) fn nibble(c: u8) -> Result<u8, Error> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(Error::InvalidData),
    }
}

/// Parses up to 8 hex digits, most significant first
pub(crate) fn parse(digits: &[u8]) -> Result<u32, Error> {
    debug_assert!(digits.len() <= 8);
    digits
        .iter()
        .try_fold(0u32, |acc, &c| Ok((acc << 4) | u32::from(nibble(c)?)))
}

pub(crate) fn parse_u8(digits: &[u8]) -> Result<u8, Error> {
    debug_assert!(digits.len() <= 2);
    parse(digits).map(|v| v as u8)
}

pub(crate) fn parse_u16(digits: &[u8]) -> Result<u16, Error> {
    debug_assert!(digits.len() <= 4);
    parse(digits).map(|v| v as u16)
}

/// Appends the `width` least significant nibbles of `value`
pub(crate) fn push(buf: &mut CmdBuf, value: u32, width: usize) -> Result<(), Error> {
    for i in (0..width).rev() {
        let nibble = (value >> (4 * i)) & 0xF;
        buf.push(DIGITS[nibble as usize])?;
    }
    Ok(())
}
