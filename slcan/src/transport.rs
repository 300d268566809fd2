//! Line transport over a serial port
//!
//! The transport owns one byte FIFO per direction and one line buffer per direction.
//! `pump_io` moves bytes between the FIFOs and the port; `next_command` and `submit` move
//! whole lines between the FIFOs and the engine. Neither side blocks: whatever does not fit
//! stays where it is until the next cycle.

use crate::buffer::{CmdBuf, IoFifo};
use crate::codec::{BELL, Command, TERMINATOR};
use crate::config::TransportConfig;
use crate::core::Error;
use crate::driver::clock::Clock;
use crate::driver::serial::{Interest, IoError, PortConfig, SerialPort};
use crate::time::Duration;

pub const IO_FIFO_SIZE: usize = 256;

pub struct Transport<S> {
    port: S,
    rx: IoFifo<IO_FIFO_SIZE>,
    tx: IoFifo<IO_FIFO_SIZE>,
    rx_line: CmdBuf,
    tx_line: CmdBuf,
    // Set after a line overflow until the rest of that line is skipped
    discarding: bool,
    config: TransportConfig,
}

impl<S: SerialPort> Transport<S> {
    pub fn new(port: S, config: TransportConfig) -> Self {
        Self {
            port,
            rx: IoFifo::new(),
            tx: IoFifo::new(),
            rx_line: CmdBuf::new(),
            tx_line: CmdBuf::new(),
            discarding: false,
            config,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn port(&self) -> &S {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut S {
        &mut self.port
    }

    pub fn into_inner(self) -> S {
        self.port
    }

    /// Applies serial line settings to the port
    pub fn configure(&mut self, config: &PortConfig) -> Result<(), Error> {
        debug!("configuring port: {:?}", config);
        self.port.configure(config).map_err(Error::from)
    }

    /// Returns `true` if `submit` will accept a line
    pub fn can_submit(&self) -> bool {
        self.tx.len() < self.config.tx_watermark
    }

    /// Bytes queued for the port
    pub fn tx_pending(&self) -> usize {
        self.tx.len()
    }

    /// Bytes received from the port but not yet framed
    pub fn rx_pending(&self) -> usize {
        self.rx.len()
    }

    /// Encodes `command` and queues the line for transmission
    ///
    /// Fails with `Overflow` if the outbound FIFO is above the watermark or cannot hold the
    /// whole line. Nothing is queued on failure.
    pub fn submit(&mut self, command: &Command) -> Result<(), Error> {
        if !self.can_submit() {
            return Err(Error::Overflow);
        }
        command.encode(&mut self.tx_line)?;
        self.tx.write_block(&self.tx_line)?;
        trace!("queued {:?}", command);
        Ok(())
    }

    /// Frames and decodes the next buffered line
    ///
    /// Returns `Ok(None)` when no complete line is buffered. The line is consumed even if it
    /// fails to decode. A line longer than the line buffer is reported once with `Overflow` and
    /// skipped up to its terminator.
    pub fn next_command(&mut self) -> Result<Option<Command>, Error> {
        while let Some(byte) = self.rx.pop() {
            let end_of_line = byte == TERMINATOR || byte == BELL;

            if self.discarding {
                self.discarding = !end_of_line;
                continue;
            }

            if self.rx_line.push(byte).is_err() {
                warn!("line overflow, skipping to next terminator");
                self.rx_line.clear();
                self.discarding = !end_of_line;
                return Err(Error::Overflow);
            }

            if end_of_line {
                let res = Command::decode(&self.rx_line);
                self.rx_line.clear();
                trace!("received {:?}", res);
                return res.map(Some);
            }
        }
        Ok(None)
    }

    /// Moves bytes between the FIFOs and the port without waiting
    pub fn pump_io(&mut self) -> Result<(), Error> {
        let ready = self
            .port
            .poll(Interest::READABLE | Interest::WRITABLE, Duration::from_ticks(0))?;
        if ready.contains(Interest::READABLE) {
            self.pump_in()?;
        }
        if ready.contains(Interest::WRITABLE) {
            self.pump_out()?;
        }
        Ok(())
    }

    fn pump_in(&mut self) -> Result<(), Error> {
        loop {
            let available = match self.port.bytes_available() {
                Ok(n) => n,
                Err(IoError::WouldBlock) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            let span = self.rx.write_span();
            let wanted = available.min(span.len());
            if wanted == 0 {
                return Ok(());
            }
            let read = match self.port.read(&mut span[..wanted]) {
                Ok(n) => n.min(wanted),
                Err(IoError::WouldBlock) => 0,
                Err(e) => return Err(e.into()),
            };
            self.rx.commit_write(read);
            if read < wanted {
                return Ok(());
            }
        }
    }

    /// Writes queued bytes until the port stops accepting them
    pub fn pump_out(&mut self) -> Result<(), Error> {
        while !self.tx.is_empty() {
            let span = self.tx.read_span();
            let len = span.len();
            let written = match self.port.write(span) {
                Ok(n) => n.min(len),
                Err(IoError::WouldBlock) => 0,
                Err(e) => return Err(e.into()),
            };
            if written == 0 {
                break;
            }
            self.tx.commit_read(written);
        }
        Ok(())
    }

    /// Pumps until every queued byte is handed to the port
    ///
    /// `idle` runs between attempts and may sleep or yield. Fails with `Timeout` once
    /// `timeout` elapses with bytes still queued.
    pub fn flush<C: Clock>(
        &mut self,
        clock: &C,
        timeout: Duration,
        mut idle: impl FnMut(),
    ) -> Result<(), Error> {
        let deadline = clock.now().saturating_add(timeout);
        loop {
            self.pump_io()?;
            if self.tx.is_empty() {
                self.port.flush()?;
                return Ok(());
            }
            if clock.now() >= deadline {
                debug!("flush timed out with {} bytes queued", self.tx.len());
                return Err(Error::Timeout);
            }
            idle();
        }
    }

    /// Drops all buffered bytes and any partially received line
    pub fn reset(&mut self) {
        self.rx.clear();
        self.tx.clear();
        self.rx_line.clear();
        self.tx_line.clear();
        self.discarding = false;
    }
}
