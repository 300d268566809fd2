use crate::core::Error;

/// Byte ring buffer for one direction of serial traffic
///
/// Besides byte-wise access, the buffer exposes its contiguous regions so that a serial port
/// can read into or write out of it directly. A region ends either at the buffered data
/// boundary or at the physical end of the array, whichever comes first; a second call after
/// advancing yields the part that wrapped around.
pub struct IoFifo<const N: usize> {
    buf: [u8; N],
    read: usize,
    write: usize,
    count: usize,
}

impl<const N: usize> IoFifo<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            read: 0,
            write: 0,
            count: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub const fn len(&self) -> usize {
        self.count
    }

    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn is_full(&self) -> bool {
        self.count == N
    }

    pub const fn remaining(&self) -> usize {
        N - self.count
    }

    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.count = 0;
    }

    pub fn push(&mut self, byte: u8) -> Result<(), Error> {
        if self.is_full() {
            return Err(Error::Overflow);
        }
        self.buf[self.write] = byte;
        self.write = Self::wrap(self.write + 1);
        self.count += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.buf[self.read];
        self.read = Self::wrap(self.read + 1);
        self.count -= 1;
        Some(byte)
    }

    /// Appends all of `data` or nothing
    pub fn write_block(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.len() > self.remaining() {
            return Err(Error::Overflow);
        }
        let mut rest = data;
        while !rest.is_empty() {
            let span = self.write_span();
            let n = span.len().min(rest.len());
            span[..n].copy_from_slice(&rest[..n]);
            self.commit_write(n);
            rest = &rest[n..];
        }
        Ok(())
    }

    /// Removes exactly `out.len()` bytes or nothing
    pub fn read_block(&mut self, out: &mut [u8]) -> Result<(), Error> {
        if out.len() > self.len() {
            return Err(Error::Underrun);
        }
        let mut filled = 0;
        while filled < out.len() {
            let span = self.read_span();
            let n = span.len().min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&span[..n]);
            self.commit_read(n);
            filled += n;
        }
        Ok(())
    }

    /// Contiguous buffered bytes starting at the read position
    pub fn read_span(&self) -> &[u8] {
        let n = self.count.min(N - self.read);
        &self.buf[self.read..self.read + n]
    }

    /// Discards `n` bytes previously returned by `read_span`
    pub fn commit_read(&mut self, n: usize) {
        assert!(n <= self.read_span().len());
        self.read = Self::wrap(self.read + n);
        self.count -= n;
    }

    /// Contiguous free space starting at the write position
    pub fn write_span(&mut self) -> &mut [u8] {
        let n = self.remaining().min(N - self.write);
        &mut self.buf[self.write..self.write + n]
    }

    /// Marks `n` bytes of the last `write_span` as buffered
    pub fn commit_write(&mut self, n: usize) {
        assert!(n <= self.remaining().min(N - self.write));
        self.write = Self::wrap(self.write + n);
        self.count += n;
    }

    fn wrap(index: usize) -> usize {
        if index >= N { index - N } else { index }
    }
}

impl<const N: usize> Default for IoFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}
