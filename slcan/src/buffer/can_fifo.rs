use heapless::Deque;

use crate::completion::Completion;
use crate::core::{CanMessage, Error, MessageMeta};

#[derive(Clone, Copy)]
pub struct CanEntry<'a> {
    pub message: CanMessage,
    pub completion: Option<&'a Completion>,
}

/// CAN frame queue
pub struct CanFifo<'a, const N: usize> {
    entries: Deque<CanEntry<'a>, N>,
}

impl<'a, const N: usize> CanFifo<'a, N> {
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub fn remaining(&self) -> usize {
        N - self.entries.len()
    }

    pub fn push(
        &mut self,
        message: CanMessage,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        self.entries
            .push_back(CanEntry {
                message,
                completion,
            })
            .map_err(|_| Error::Overrun)
    }

    pub fn front(&self) -> Option<&CanEntry<'a>> {
        self.entries.front()
    }

    pub fn pop(&mut self) -> Option<CanEntry<'a>> {
        self.entries.pop_front()
    }

    /// Removes all entries, oldest first
    pub fn drain(&mut self) -> impl Iterator<Item = CanEntry<'a>> + '_ {
        core::iter::from_fn(move || self.entries.pop_front())
    }
}

impl<const N: usize> Default for CanFifo<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
pub struct CanExtEntry<'a> {
    pub message: CanMessage,
    pub meta: MessageMeta,
    pub completion: Option<&'a Completion>,
}

/// CAN frame queue with per-frame line metadata
pub struct CanExtFifo<'a, const N: usize> {
    entries: Deque<CanExtEntry<'a>, N>,
}

impl<'a, const N: usize> CanExtFifo<'a, N> {
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub fn remaining(&self) -> usize {
        N - self.entries.len()
    }

    pub fn push(
        &mut self,
        message: CanMessage,
        meta: MessageMeta,
        completion: Option<&'a Completion>,
    ) -> Result<(), Error> {
        self.entries
            .push_back(CanExtEntry {
                message,
                meta,
                completion,
            })
            .map_err(|_| Error::Overrun)
    }

    pub fn front(&self) -> Option<&CanExtEntry<'a>> {
        self.entries.front()
    }

    pub fn pop(&mut self) -> Option<CanExtEntry<'a>> {
        self.entries.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = CanExtEntry<'a>> + '_ {
        core::iter::from_fn(move || self.entries.pop_front())
    }
}

impl<const N: usize> Default for CanExtFifo<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}
