//! Master engine
//!
//! The host side of the protocol. Requests are pipelined over a single serial line and the
//! adapter answers them strictly in order, so every response belongs to the oldest
//! outstanding request. Frames travel on the same line and may show up between any two
//! responses; they are either the answer to a poll or an unsolicited push, never the answer
//! to anything else.
//!
//! Each outstanding request carries a deadline. Deadlines are taken from a single timeout,
//! so the queue is ordered by deadline and a timeout sweep only needs to look at its front.
//!
//! Nothing here blocks. The owner calls [`Master::poll`] from its loop; results are reported
//! through the [`Completion`] handles passed with each operation.

use heapless::Deque;

use crate::buffer::{CanExtFifo, CanFifo};
use crate::codec::{Command, Opcode};
use crate::completion::{self, Completion, CompletionResult, Reply};
use crate::config::MasterConfig;
use crate::core::{BitRate, CanMessage, Error, MessageMeta, UartBaud};
use crate::driver::clock::Clock;
use crate::driver::serial::SerialPort;
use crate::time::{Duration, Instant};
use crate::transport::Transport;

struct PendingRequest<'a> {
    opcode: Opcode,
    completion: Option<&'a Completion>,
    deadline: Instant,
}

/// SLCAN master
///
/// * `RX` - received frame queue capacity
/// * `TX` - outgoing frame queue capacity
/// * `REQ` - outstanding request capacity
pub struct Master<'a, S, C, const RX: usize = 16, const TX: usize = 16, const REQ: usize = 16> {
    transport: Transport<S>,
    clock: C,
    pending: Deque<PendingRequest<'a>, REQ>,
    rx_fifo: CanExtFifo<'a, RX>,
    tx_fifo: CanFifo<'a, TX>,
    config: MasterConfig,
}

impl<'a, S: SerialPort, C: Clock, const RX: usize, const TX: usize, const REQ: usize>
    Master<'a, S, C, RX, TX, REQ>
{
    pub fn new(transport: Transport<S>, clock: C, config: MasterConfig) -> Self {
        Self {
            transport,
            clock,
            pending: Deque::new(),
            rx_fifo: CanExtFifo::new(),
            tx_fifo: CanFifo::new(),
            config,
        }
    }

    pub fn transport(&self) -> &Transport<S> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport<S> {
        &mut self.transport
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Sets the response timeout for subsequent requests
    ///
    /// Requests already sent keep their deadlines.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), Error> {
        if timeout == Duration::from_ticks(0) {
            return Err(Error::InvalidArgument);
        }
        self.config.timeout = timeout;
        Ok(())
    }

    pub fn expect_answers(&self) -> bool {
        self.config.expect_answers
    }

    pub fn set_expect_answers(&mut self, expect_answers: bool) {
        self.config.expect_answers = expect_answers;
    }

    /// Number of received frames waiting for `recv_can_message`
    pub fn received_count(&self) -> usize {
        self.rx_fifo.len()
    }

    /// Number of frames `send_can_message` can still queue
    pub fn send_capacity(&self) -> usize {
        self.tx_fifo.remaining()
    }

    /// Number of requests waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Queues a frame for transmission
    ///
    /// The frame is sent right away if nothing is queued ahead of it. `completion` finishes
    /// once the adapter acknowledges the frame.
    pub fn send_can_message(
        &mut self,
        message: CanMessage,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        let was_empty = self.tx_fifo.is_empty();
        completion::start(completion);
        if let Err(e) = self.tx_fifo.push(message, completion) {
            completion::finish(completion, Err(e));
            return Err(e);
        }
        if was_empty {
            self.send_queued_messages()
        } else {
            Ok(())
        }
    }

    pub fn recv_can_message(&mut self) -> Option<(CanMessage, MessageMeta)> {
        self.rx_fifo
            .pop()
            .map(|entry| (entry.message, entry.meta))
    }

    pub fn request_setup_can_std(
        &mut self,
        bit_rate: BitRate,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        self.request(&Command::SetupCanStd(bit_rate), completion)
    }

    pub fn request_setup_can_btr(
        &mut self,
        btr0: u8,
        btr1: u8,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        self.request(&Command::SetupCanBtr { btr0, btr1 }, completion)
    }

    pub fn request_open(&mut self, completion: Option<&'a Completion>) -> Result<(), Error> {
        self.request(&Command::Open, completion)
    }

    pub fn request_listen(&mut self, completion: Option<&'a Completion>) -> Result<(), Error> {
        self.request(&Command::Listen, completion)
    }

    pub fn request_close(&mut self, completion: Option<&'a Completion>) -> Result<(), Error> {
        self.request(&Command::Close, completion)
    }

    /// Asks for one buffered frame
    ///
    /// The frame lands in the receive queue; the completion finishes with `Reply::Done`
    /// whether or not the adapter had one.
    pub fn request_poll(&mut self, completion: Option<&'a Completion>) -> Result<(), Error> {
        self.request(&Command::Poll, completion)
    }

    /// Asks for all buffered frames
    pub fn request_poll_all(&mut self, completion: Option<&'a Completion>) -> Result<(), Error> {
        self.request(&Command::PollAll, completion)
    }

    /// Reads the adapter status; the result is `Reply::Status`
    pub fn request_status(&mut self, completion: Option<&'a Completion>) -> Result<(), Error> {
        self.request(&Command::StatusRequest, completion)
    }

    pub fn request_set_auto_poll(
        &mut self,
        enable: bool,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        self.request(&Command::SetAutoPoll(enable), completion)
    }

    pub fn request_setup_uart(
        &mut self,
        baud: UartBaud,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        self.request(&Command::SetupUart(baud), completion)
    }

    /// Reads the adapter version; the result is `Reply::Version`
    pub fn request_version(&mut self, completion: Option<&'a Completion>) -> Result<(), Error> {
        self.request(&Command::VersionRequest, completion)
    }

    /// Reads the adapter serial number; the result is `Reply::SerialNumber`
    pub fn request_serial_number(
        &mut self,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        self.request(&Command::SerialNumberRequest, completion)
    }

    pub fn request_set_timestamp(
        &mut self,
        enable: bool,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        self.request(&Command::SetTimestamp(enable), completion)
    }

    pub fn request_set_acceptance_filter(
        &mut self,
        filter: u32,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        self.request(&Command::SetAcceptanceFilter(filter), completion)
    }

    pub fn request_set_acceptance_mask(
        &mut self,
        mask: u32,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        self.request(&Command::SetAcceptanceMask(mask), completion)
    }

    /// Runs one engine cycle
    ///
    /// Reads and dispatches responses, expires overdue requests and sends queued frames.
    /// Only serial port failures are returned; protocol anomalies are logged and skipped.
    pub fn poll(&mut self) -> Result<(), Error> {
        self.transport.pump_io()?;
        loop {
            match self.transport.next_command() {
                Ok(Some(command)) => self.process_response(command),
                Ok(None) => break,
                Err(e) => warn!("dropping malformed line: {:?}", e),
            }
        }
        self.process_timeouts();
        self.send_queued_messages()?;
        self.transport.pump_io()
    }

    /// Polls until every request is answered and every queued frame is sent
    ///
    /// `idle` runs between cycles and may sleep or yield.
    pub fn flush(&mut self, timeout: Duration, mut idle: impl FnMut()) -> Result<(), Error> {
        let deadline = self.clock.now().saturating_add(timeout);
        loop {
            self.poll()?;
            if self.pending.is_empty()
                && self.tx_fifo.is_empty()
                && self.transport.tx_pending() == 0
            {
                return Ok(());
            }
            if self.clock.now() >= deadline {
                return Err(Error::Timeout);
            }
            idle();
        }
    }

    /// Abandons all outstanding work
    ///
    /// Outstanding requests and queued frames finish with `Canceled`. Received frames and
    /// buffered bytes are dropped.
    pub fn reset(&mut self) {
        while let Some(request) = self.pending.pop_front() {
            completion::finish(request.completion, Err(Error::Canceled));
        }
        for entry in self.tx_fifo.drain() {
            completion::finish(entry.completion, Err(Error::Canceled));
        }
        self.rx_fifo.drain().for_each(drop);
        self.transport.reset();
        debug!("master reset");
    }

    fn request(
        &mut self,
        command: &Command,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        completion::start(completion);
        self.enqueue_request(command, completion)
            .inspect_err(|&e| completion::finish(completion, Err(e)))
    }

    /// Records and submits a request; leaves the completion untouched on failure
    fn enqueue_request(
        &mut self,
        command: &Command,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        if !self.config.expect_answers {
            self.transport.submit(command)?;
            completion::finish(completion, Ok(Reply::Done));
            return Ok(());
        }

        let request = PendingRequest {
            opcode: command.opcode(),
            completion,
            deadline: self.clock.now().saturating_add(self.config.timeout),
        };
        if self.pending.push_back(request).is_err() {
            return Err(Error::Overrun);
        }
        if let Err(e) = self.transport.submit(command) {
            self.pending.pop_back();
            return Err(e);
        }
        Ok(())
    }

    fn process_response(&mut self, command: Command) {
        let Some(opcode) = self.pending.front().map(|request| request.opcode) else {
            match command {
                Command::Transmit { message, meta } => {
                    let _ = self.store_frame(message, meta);
                }
                other => warn!("unexpected response: {:?}", other),
            }
            return;
        };

        if let Command::Transmit { message, meta } = command {
            let stored = self.store_frame(message, meta);
            // pushed frames never answer a poll
            if opcode == Opcode::Poll && !meta.auto_poll {
                self.complete_front(stored.map(|_| Reply::Done));
            }
            return;
        }

        let result = match (opcode, command) {
            (_, Command::Err) => Err(Error::ExecFail),
            (Opcode::Status, Command::StatusResponse(status)) => Ok(Reply::Status(status)),
            (Opcode::Version, Command::VersionResponse { hardware, software }) => {
                Ok(Reply::Version { hardware, software })
            }
            (Opcode::SerialNumber, Command::SerialNumberResponse(number)) => {
                Ok(Reply::SerialNumber(number))
            }
            (Opcode::PollAll, Command::PollAll) => Ok(Reply::Done),
            (opcode, Command::OkAutoPoll(_)) if opcode.is_transmit() => Ok(Reply::Done),
            (Opcode::Status | Opcode::Version | Opcode::SerialNumber | Opcode::PollAll, _) => {
                Err(Error::Unexpected)
            }
            (_, Command::Ok) => Ok(Reply::Done),
            _ => Err(Error::Unexpected),
        };
        if result == Err(Error::Unexpected) {
            warn!("response {:?} does not answer {:?}", command, opcode);
        }
        self.complete_front(result);
    }

    fn complete_front(&mut self, result: CompletionResult) {
        if let Some(request) = self.pending.pop_front() {
            if let Err(e) = result {
                debug!("request {:?} failed: {:?}", request.opcode, e);
            }
            completion::finish(request.completion, result);
        }
    }

    fn store_frame(&mut self, message: CanMessage, meta: MessageMeta) -> Result<(), Error> {
        self.rx_fifo
            .push(message, meta, None)
            .inspect_err(|_| warn!("receive queue full, dropping {:?}", message))
    }

    fn process_timeouts(&mut self) {
        let now = self.clock.now();
        while let Some(request) = self.pending.front() {
            if request.deadline > now {
                break;
            }
            debug!("request {:?} timed out", request.opcode);
            self.complete_front(Err(Error::Timeout));
        }
    }

    /// Turns queued frames into transmit requests until the line pushes back
    fn send_queued_messages(&mut self) -> Result<(), Error> {
        while let Some(entry) = self.tx_fifo.front().copied() {
            match self.enqueue_request(&Command::transmit(entry.message), entry.completion) {
                Err(e) if e.is_capacity() => return Ok(()),
                res => {
                    self.tx_fifo.pop();
                    if let Err(e) = res {
                        completion::finish(entry.completion, Err(e));
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }
}
