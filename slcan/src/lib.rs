//! # SLCAN
//!
//! This library implements the SLCAN (serial-line CAN, Lawicel) protocol in no_std
//! environments: the host side (_master_) that drives a USB/serial CAN adapter, and the adapter
//! side (_slave_) that exposes a CAN controller to a host. All queues have fixed capacities
//! chosen at compile time, requiring no dynamic memory allocation.
//!
//! ## Architecture
//!
//! ```text
//!  ┌────────────┐   bytes   ┌───────────┐  commands  ┌────────────────┐
//!  │ SerialPort │◄─────────►│ Transport │◄──────────►│ Master / Slave │
//!  └────────────┘           └───────────┘            └───────┬────────┘
//!                                                            │ Completion
//!                                                            ▼
//!                                                      application
//! ```
//! Components:
//! * _Transport_ owns a byte FIFO per direction, splits the inbound stream into lines and
//!   queues encoded outbound lines. It never blocks on the port.
//! * _Codec_ converts between wire lines and [`codec::Command`] values.
//! * _Master_ pipelines requests to an adapter and matches responses to them in order,
//!   with a deadline per request. Received frames are buffered for the application.
//! * _Slave_ answers host commands on behalf of a [`slave::Device`], tracking the adapter
//!   state (configured, opened, listen-only) and buffering frames in both directions.
//! * _Completion_ is a caller-owned handle that reports the outcome of one operation. It can
//!   be polled or awaited.
//!
//! ## Concurrency model
//!
//! Engines are driven by calling `poll()` from a single loop or task. Nothing inside waits on
//! the port or the clock. A completion handle may be observed from another task or an
//! interrupt; its state is guarded by a critical-section mutex.
//!
//! ## Limitations
//!
//! * One adapter per serial line; no multiplexing.
//! * Frames are classic CAN only (up to 8 data bytes).
#![no_std]

pub use slcan_core as core;
pub use slcan_driver as driver;
pub use slcan_driver::time;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod buffer;
pub mod codec;
pub mod completion;
pub mod config;
pub mod master;
pub mod slave;
#[cfg(test)]
mod testing;
pub mod transport;
