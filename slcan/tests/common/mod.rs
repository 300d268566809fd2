#![allow(dead_code)]

use slcan::core::{BitRate, Error};
use slcan::driver::clock::Clock;
use slcan::driver::serial::{Interest, IoError, PortConfig, SerialPort};
use slcan::master::Master;
use slcan::slave::{Device, Slave};
use slcan::time::{Duration, Instant};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

type Queue = Rc<RefCell<VecDeque<u8>>>;

/// One end of an in-memory serial line
pub struct PipePort {
    input: Queue,
    output: Queue,
    /// Everything this end has written
    pub tap: Rc<RefCell<Vec<u8>>>,
}

/// Returns the master and slave ends of a connected line
pub fn pipe() -> (PipePort, PipePort) {
    let a: Queue = Default::default();
    let b: Queue = Default::default();
    let master = PipePort {
        input: a.clone(),
        output: b.clone(),
        tap: Default::default(),
    };
    let slave = PipePort {
        input: b,
        output: a,
        tap: Default::default(),
    };
    (master, slave)
}

impl SerialPort for PipePort {
    fn configure(&mut self, _config: &PortConfig) -> Result<(), IoError> {
        Ok(())
    }

    fn poll(&mut self, interest: Interest, _timeout: Duration) -> Result<Interest, IoError> {
        let mut ready = Interest::WRITABLE;
        if !self.input.borrow().is_empty() {
            ready |= Interest::READABLE;
        }
        Ok(ready & interest)
    }

    fn bytes_available(&mut self) -> Result<usize, IoError> {
        Ok(self.input.borrow().len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        let mut input = self.input.borrow_mut();
        let n = buf.len().min(input.len());
        for (dst, src) in buf.iter_mut().zip(input.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        self.output.borrow_mut().extend(buf.iter().copied());
        self.tap.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), IoError> {
        Ok(())
    }
}

pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::from_ticks(0)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// CAN controller stand-in that accepts every setting
#[derive(Default)]
pub struct Adapter {
    pub bit_rate: Option<BitRate>,
    pub opened: bool,
    pub listen_only: bool,
}

impl Device for Adapter {
    fn setup_can_std(&mut self, bit_rate: BitRate) -> Result<(), Error> {
        self.bit_rate = Some(bit_rate);
        Ok(())
    }

    fn open(&mut self) -> Result<(), Error> {
        self.opened = true;
        Ok(())
    }

    fn listen(&mut self) -> Result<(), Error> {
        self.opened = true;
        self.listen_only = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.opened = false;
        self.listen_only = false;
        Ok(())
    }
}

pub type TestMaster<'a> = Master<'a, PipePort, &'a ManualClock>;
pub type TestSlave<'a> = Slave<'a, PipePort, &'a ManualClock, Adapter>;

/// Lets both engines run until the line is quiet
pub fn exchange(master: &mut TestMaster<'_>, slave: &mut TestSlave<'_>) {
    for _ in 0..8 {
        master.poll().unwrap();
        slave.poll().unwrap();
    }
}

/// Puts every frame the host sent back on the to-host queue
pub fn loop_back(slave: &mut TestSlave<'_>) {
    while let Some(message) = slave.recv_can_message() {
        slave.send_can_message(message, None).unwrap();
    }
}
