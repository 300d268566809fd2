//! SLCAN driver interface
//!
//! The crate provides an interface between serial port drivers and the SLCAN stack.
//! Limited scope facilitates compatibility across versions.
//! Driver crates should depend on this crate. Stack users should depend on the `slcan` crate
//! instead.
//!
//! The stack talks to two collaborators:
//! * `SerialPort` moves raw bytes over the serial line without blocking
//! * `Clock` provides the monotonic time used for request deadlines and frame timestamps
//!
//! The stack never waits on a port. It asks for readiness with a zero timeout, moves whatever
//! the port can take right now and leaves the rest queued for the next poll cycle. Opening and
//! closing a port belong to the driver: a port handed to the stack is open, and dropping it
//! closes it.
#![no_std]

pub mod clock;
pub mod serial;

pub mod time {
    pub use embassy_time::{Duration, Instant};
}
