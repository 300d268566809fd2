//! Slave engine
//!
//! The adapter side of the protocol. The slave answers every command line with exactly one
//! line, except `A`, which answers with the buffered frames followed by its trailer. Frames
//! from the bus wait in the to-host queue until the host polls them, or are pushed as soon as
//! possible when auto-poll is enabled. Frames from the host wait in the from-host queue until
//! the device puts them on the bus.
//!
//! Answers are only produced while the transport accepts a whole line, so a slow host stalls
//! command processing instead of losing answers.

use crate::buffer::{CanExtFifo, CanFifo};
use crate::codec::Command;
use crate::completion::{self, Completion, Reply};
use crate::config::SlaveConfig;
use crate::core::{BitRate, CanMessage, Error, MessageMeta, Status, UartBaud};
use crate::driver::clock::Clock;
use crate::driver::serial::SerialPort;
use crate::time::Duration;
use crate::transport::Transport;

/// Timestamps wrap every minute
const TIMESTAMP_PERIOD_MS: u64 = 60_000;

/// Device hooks
///
/// Called by the slave once a command passes its state checks. A hook that returns an error
/// makes the slave answer ERR and leave its state untouched. Hooks that are not implemented
/// refuse the command.
pub trait Device {
    fn setup_can_std(&mut self, _bit_rate: BitRate) -> Result<(), Error> {
        Err(Error::ExecFail)
    }

    fn setup_can_btr(&mut self, _btr0: u8, _btr1: u8) -> Result<(), Error> {
        Err(Error::ExecFail)
    }

    fn open(&mut self) -> Result<(), Error> {
        Err(Error::ExecFail)
    }

    fn listen(&mut self) -> Result<(), Error> {
        Err(Error::ExecFail)
    }

    fn close(&mut self) -> Result<(), Error> {
        Err(Error::ExecFail)
    }

    /// Takes effect after the answer is sent
    fn setup_uart(&mut self, _baud: UartBaud) -> Result<(), Error> {
        Err(Error::ExecFail)
    }

    fn set_acceptance_mask(&mut self, _mask: u32) -> Result<(), Error> {
        Err(Error::ExecFail)
    }

    fn set_acceptance_filter(&mut self, _filter: u32) -> Result<(), Error> {
        Err(Error::ExecFail)
    }
}

impl<D: Device + ?Sized> Device for &mut D {
    fn setup_can_std(&mut self, bit_rate: BitRate) -> Result<(), Error> {
        (**self).setup_can_std(bit_rate)
    }

    fn setup_can_btr(&mut self, btr0: u8, btr1: u8) -> Result<(), Error> {
        (**self).setup_can_btr(btr0, btr1)
    }

    fn open(&mut self) -> Result<(), Error> {
        (**self).open()
    }

    fn listen(&mut self) -> Result<(), Error> {
        (**self).listen()
    }

    fn close(&mut self) -> Result<(), Error> {
        (**self).close()
    }

    fn setup_uart(&mut self, baud: UartBaud) -> Result<(), Error> {
        (**self).setup_uart(baud)
    }

    fn set_acceptance_mask(&mut self, mask: u32) -> Result<(), Error> {
        (**self).set_acceptance_mask(mask)
    }

    fn set_acceptance_filter(&mut self, filter: u32) -> Result<(), Error> {
        (**self).set_acceptance_filter(filter)
    }
}

bitflags::bitflags! {
    /// Slave state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeviceFlags: u8 {
        /// A bit rate was set
        const CONFIGURED = 1 << 0;
        const OPENED = 1 << 1;
        const LISTEN_ONLY = 1 << 2;
        const AUTO_POLL = 1 << 3;
        const TIMESTAMP = 1 << 4;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DeviceFlags {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "DeviceFlags({=u8:#04x})", self.bits())
    }
}

bitflags::bitflags! {
    /// Errors latched until the next status read
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeviceErrors: u8 {
        const IO = 1 << 0;
        const OVERRUN = 1 << 1;
        const ARBITRATION_LOST = 1 << 2;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DeviceErrors {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "DeviceErrors({=u8:#04x})", self.bits())
    }
}

/// SLCAN slave
///
/// * `RX` - capacity of the queue of frames received from the bus
/// * `TX` - capacity of the queue of frames received from the host
pub struct Slave<'a, S, C, D, const RX: usize = 16, const TX: usize = 16> {
    transport: Transport<S>,
    clock: C,
    device: D,
    flags: DeviceFlags,
    errors: DeviceErrors,
    to_host: CanExtFifo<'a, RX>,
    from_host: CanFifo<'a, TX>,
    poll_all_pending: bool,
    config: SlaveConfig,
}

impl<'a, S: SerialPort, C: Clock, D: Device, const RX: usize, const TX: usize>
    Slave<'a, S, C, D, RX, TX>
{
    pub fn new(transport: Transport<S>, clock: C, device: D, config: SlaveConfig) -> Self {
        Self {
            transport,
            clock,
            device,
            flags: initial_flags(&config),
            errors: DeviceErrors::empty(),
            to_host: CanExtFifo::new(),
            from_host: CanFifo::new(),
            poll_all_pending: false,
            config,
        }
    }

    pub fn transport(&self) -> &Transport<S> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport<S> {
        &mut self.transport
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn flags(&self) -> DeviceFlags {
        self.flags
    }

    /// Overrides the state flags, bypassing command checks
    pub fn set_flags(&mut self, flags: DeviceFlags) {
        debug!("flags {:?} -> {:?}", self.flags, flags);
        self.flags = flags;
    }

    pub fn errors(&self) -> DeviceErrors {
        self.errors
    }

    /// Latches bus errors for the next status read
    pub fn report_errors(&mut self, errors: DeviceErrors) {
        self.errors |= errors;
    }

    /// Queues a frame received from the bus for the host
    ///
    /// `completion` finishes once the frame is written to the line.
    pub fn send_can_message(
        &mut self,
        message: CanMessage,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        completion::start(completion);
        if !self.flags.contains(DeviceFlags::OPENED) {
            completion::finish(completion, Err(Error::State));
            return Err(Error::State);
        }

        let meta = MessageMeta {
            timestamp: self
                .flags
                .contains(DeviceFlags::TIMESTAMP)
                .then(|| self.timestamp()),
            auto_poll: false,
        };
        if let Err(e) = self.to_host.push(message, meta, completion) {
            warn!("to-host queue full, dropping {:?}", message);
            self.errors |= DeviceErrors::OVERRUN;
            completion::finish(completion, Err(e));
            return Err(e);
        }
        Ok(())
    }

    /// Takes the next frame the host asked to put on the bus
    pub fn recv_can_message(&mut self) -> Option<CanMessage> {
        self.from_host.pop().map(|entry| entry.message)
    }

    /// Runs one engine cycle
    ///
    /// Answers buffered commands and pushes auto-poll frames as far as the line allows. Only
    /// serial port failures are returned.
    pub fn poll(&mut self) -> Result<(), Error> {
        self.transport.pump_io()?;
        if self.poll_all_pending {
            self.answer_poll_all();
        }
        while !self.poll_all_pending && self.transport.can_submit() {
            match self.transport.next_command() {
                Ok(Some(command)) => self.dispatch(command),
                Ok(None) => break,
                // nothing to answer to
                Err(Error::Overflow) => {}
                Err(e) => {
                    warn!("malformed command: {:?}", e);
                    self.answer(&Command::Err);
                }
            }
        }
        if self.flags.contains(DeviceFlags::OPENED | DeviceFlags::AUTO_POLL) {
            self.push_frames();
        }
        self.transport.pump_io()
    }

    /// Polls until every answer and pushed frame is handed to the port
    ///
    /// `idle` runs between cycles and may sleep or yield.
    pub fn flush(&mut self, timeout: Duration, mut idle: impl FnMut()) -> Result<(), Error> {
        let deadline = self.clock.now().saturating_add(timeout);
        loop {
            self.poll()?;
            if self.is_flushed() {
                return Ok(());
            }
            if self.clock.now() >= deadline {
                return Err(Error::Timeout);
            }
            idle();
        }
    }

    /// Returns to the power-on state
    ///
    /// Frames queued for the host finish with `Canceled`.
    pub fn reset(&mut self) {
        for entry in self.to_host.drain() {
            completion::finish(entry.completion, Err(Error::Canceled));
        }
        self.from_host.drain().for_each(drop);
        self.poll_all_pending = false;
        self.flags = initial_flags(&self.config);
        self.errors = DeviceErrors::empty();
        self.transport.reset();
        debug!("slave reset");
    }

    fn is_flushed(&self) -> bool {
        let pushing = self.flags.contains(DeviceFlags::OPENED | DeviceFlags::AUTO_POLL);
        self.transport.tx_pending() == 0
            && !self.poll_all_pending
            && !(pushing && !self.to_host.is_empty())
    }

    fn timestamp(&self) -> u16 {
        (self.clock.now().as_millis() % TIMESTAMP_PERIOD_MS) as u16
    }

    fn dispatch(&mut self, command: Command) {
        let opened = self.flags.contains(DeviceFlags::OPENED);
        let res = match command {
            Command::SetupCanStd(bit_rate) => {
                self.configure(|device| device.setup_can_std(bit_rate))
            }
            Command::SetupCanBtr { btr0, btr1 } => {
                self.configure(|device| device.setup_can_btr(btr0, btr1))
            }
            Command::Open => self.open(false),
            Command::Listen => self.open(true),
            Command::Close => self.close(),
            Command::Transmit { message, .. } => self.transmit(message),
            Command::Poll => return self.answer_poll(),
            Command::PollAll => {
                if self.can_poll() {
                    self.poll_all_pending = true;
                    self.answer_poll_all();
                    return;
                }
                Err(Error::State)
            }
            Command::StatusRequest if opened => {
                let status = self.take_status();
                return self.answer(&Command::StatusResponse(status));
            }
            Command::SetAutoPoll(enable) if !opened => {
                self.flags.set(DeviceFlags::AUTO_POLL, enable);
                Ok(Command::Ok)
            }
            Command::SetTimestamp(enable) if !opened => {
                self.flags.set(DeviceFlags::TIMESTAMP, enable);
                Ok(Command::Ok)
            }
            Command::SetupUart(baud) if !opened => {
                self.device.setup_uart(baud).map(|_| Command::Ok)
            }
            Command::SetAcceptanceFilter(filter) if !opened => self
                .device
                .set_acceptance_filter(filter)
                .map(|_| Command::Ok),
            Command::SetAcceptanceMask(mask) if !opened => {
                self.device.set_acceptance_mask(mask).map(|_| Command::Ok)
            }
            Command::VersionRequest => Ok(Command::VersionResponse {
                hardware: self.config.hardware_version,
                software: self.config.software_version,
            }),
            Command::SerialNumberRequest => {
                Ok(Command::SerialNumberResponse(self.config.serial_number))
            }
            Command::StatusRequest
            | Command::SetAutoPoll(_)
            | Command::SetTimestamp(_)
            | Command::SetupUart(_)
            | Command::SetAcceptanceFilter(_)
            | Command::SetAcceptanceMask(_) => Err(Error::State),
            Command::Ok
            | Command::Err
            | Command::OkAutoPoll(_)
            | Command::StatusResponse(_)
            | Command::VersionResponse { .. }
            | Command::SerialNumberResponse(_)
            | Command::Unknown(_) => Err(Error::Unexpected),
        };

        match res {
            Ok(answer) => self.answer(&answer),
            Err(e) => {
                debug!("refusing {:?}: {:?}", command, e);
                self.answer(&Command::Err);
            }
        }
    }

    fn configure(
        &mut self,
        setup: impl FnOnce(&mut D) -> Result<(), Error>,
    ) -> Result<Command, Error> {
        if self.flags.contains(DeviceFlags::OPENED) {
            return Err(Error::State);
        }
        setup(&mut self.device)?;
        self.flags.insert(DeviceFlags::CONFIGURED);
        Ok(Command::Ok)
    }

    fn open(&mut self, listen_only: bool) -> Result<Command, Error> {
        if !self.flags.contains(DeviceFlags::CONFIGURED)
            || self.flags.contains(DeviceFlags::OPENED)
        {
            return Err(Error::State);
        }
        if listen_only {
            self.device.listen()?;
        } else {
            self.device.open()?;
        }
        self.flags.insert(DeviceFlags::OPENED);
        self.flags.set(DeviceFlags::LISTEN_ONLY, listen_only);
        debug!("channel opened, flags {:?}", self.flags);
        Ok(Command::Ok)
    }

    fn close(&mut self) -> Result<Command, Error> {
        if !self.flags.contains(DeviceFlags::OPENED) {
            return Err(Error::State);
        }
        self.device.close()?;
        self.flags.remove(DeviceFlags::OPENED | DeviceFlags::LISTEN_ONLY);
        debug!("channel closed");
        Ok(Command::Ok)
    }

    fn transmit(&mut self, message: CanMessage) -> Result<Command, Error> {
        if !self.flags.contains(DeviceFlags::OPENED)
            || self.flags.contains(DeviceFlags::LISTEN_ONLY)
        {
            return Err(Error::State);
        }
        if let Err(e) = self.from_host.push(message, None) {
            self.errors |= DeviceErrors::OVERRUN;
            return Err(e);
        }
        if self.flags.contains(DeviceFlags::AUTO_POLL) {
            Ok(Command::OkAutoPoll(message.id_kind()))
        } else {
            Ok(Command::Ok)
        }
    }

    fn can_poll(&self) -> bool {
        self.flags.contains(DeviceFlags::OPENED) && !self.flags.contains(DeviceFlags::AUTO_POLL)
    }

    fn take_status(&mut self) -> Status {
        let mut status = Status::empty();
        status.set(Status::RX_FIFO_FULL, self.to_host.is_full());
        status.set(Status::TX_FIFO_FULL, self.from_host.is_full());
        status.set(Status::DATA_OVERRUN, self.errors.contains(DeviceErrors::OVERRUN));
        status.set(Status::BUS_ERROR, self.errors.contains(DeviceErrors::IO));
        status.set(
            Status::ARBITRATION_LOST,
            self.errors.contains(DeviceErrors::ARBITRATION_LOST),
        );
        self.errors = DeviceErrors::empty();
        status
    }

    fn answer_poll(&mut self) {
        if !self.can_poll() {
            return self.answer(&Command::Err);
        }
        match self.send_frame(false) {
            Ok(true) => {}
            Ok(false) => self.answer(&Command::Ok),
            Err(e) => warn!("poll answer lost: {:?}", e),
        }
    }

    /// Sends buffered frames and the `A` trailer until the line pushes back
    fn answer_poll_all(&mut self) {
        while self.transport.can_submit() {
            match self.send_frame(false) {
                Ok(true) => {}
                Ok(false) => {
                    self.answer(&Command::PollAll);
                    self.poll_all_pending = false;
                    return;
                }
                Err(_) => break,
            }
        }
        debug!("poll all interrupted by backpressure");
        self.errors |= DeviceErrors::OVERRUN;
    }

    fn push_frames(&mut self) {
        while self.transport.can_submit() {
            if !matches!(self.send_frame(true), Ok(true)) {
                break;
            }
        }
    }

    /// Writes the oldest to-host frame
    ///
    /// Returns `Ok(false)` if no frame is queued and a capacity error if the line is full.
    /// A frame that fails otherwise is dropped with its completion finished.
    fn send_frame(&mut self, auto_poll: bool) -> Result<bool, Error> {
        let Some(entry) = self.to_host.front().copied() else {
            return Ok(false);
        };
        let meta = MessageMeta {
            auto_poll,
            ..entry.meta
        };
        let res = self.transport.submit(&Command::Transmit {
            message: entry.message,
            meta,
        });
        match res {
            Err(e) if e.is_capacity() => Err(e),
            res => {
                self.to_host.pop();
                if let Err(e) = res {
                    warn!("dropping {:?}: {:?}", entry.message, e);
                }
                completion::finish(entry.completion, res.map(|_| Reply::Done));
                Ok(true)
            }
        }
    }

    fn answer(&mut self, command: &Command) {
        if let Err(e) = self.transport.submit(command) {
            warn!("answer {:?} lost: {:?}", command, e);
        }
    }
}

fn initial_flags(config: &SlaveConfig) -> DeviceFlags {
    let mut flags = DeviceFlags::empty();
    flags.set(DeviceFlags::AUTO_POLL, config.auto_poll);
    flags.set(DeviceFlags::TIMESTAMP, config.timestamp);
    flags
}
