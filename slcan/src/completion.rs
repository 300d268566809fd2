//! Completion handle for submitted sends and requests
//!
//! An engine never owns a completion; it borrows one for as long as the operation is in
//! flight and finishes it exactly once. The handle may be observed from another execution
//! context (an interrupt handler, another thread or an async task) while the engine runs, so
//! every transition happens under a critical section.

use core::cell::Cell;
use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::waitqueue::AtomicWaker;

use crate::core::{Error, Status};

/// Successful outcome of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    /// The operation carries no data, e.g., OK to a command or a sent frame
    Done,
    Status(Status),
    Version { hardware: u8, software: u8 },
    SerialNumber(u16),
}

pub type CompletionResult = Result<Reply, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompletionState {
    Idle,
    Running,
    Done(CompletionResult),
}

pub struct Completion {
    state: Mutex<CriticalSectionRawMutex, Cell<CompletionState>>,
    waker: AtomicWaker,
}

impl Completion {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(CompletionState::Idle)),
            waker: AtomicWaker::new(),
        }
    }

    pub fn state(&self) -> CompletionState {
        self.state.lock(|state| state.get())
    }

    /// Marks the operation as in flight, discarding any previous result
    pub fn start(&self) {
        self.state.lock(|state| state.set(CompletionState::Running));
    }

    pub fn finish(&self, result: CompletionResult) {
        self.state
            .lock(|state| state.set(CompletionState::Done(result)));
        self.waker.wake();
    }

    /// Returns the handle to the idle state
    pub fn reset(&self) {
        self.state.lock(|state| state.set(CompletionState::Idle));
    }

    pub fn is_running(&self) -> bool {
        self.state() == CompletionState::Running
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state(), CompletionState::Done(_))
    }

    /// Returns the result once the operation is done
    pub fn result(&self) -> Option<CompletionResult> {
        match self.state() {
            CompletionState::Done(result) => Some(result),
            _ => None,
        }
    }

    pub fn poll_wait(&self, cx: &mut Context<'_>) -> Poll<CompletionResult> {
        self.waker.register(cx.waker());
        match self.result() {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }

    /// Waits until the operation is done
    ///
    /// The engine must keep being polled for the future to resolve.
    pub async fn wait(&self) -> CompletionResult {
        poll_fn(|cx| self.poll_wait(cx)).await
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts an optional completion
pub(crate) fn start(completion: Option<&Completion>) {
    if let Some(completion) = completion {
        completion.start();
    }
}

/// Finishes an optional completion
pub(crate) fn finish(completion: Option<&Completion>, result: CompletionResult) {
    if let Some(completion) = completion {
        completion.finish(result);
    }
}
