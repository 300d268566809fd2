//! Fixed-capacity buffers
//!
//! Every buffer is owned by a single transport or engine instance and never allocates.
//! Pushing into a full buffer fails without touching the buffered data, so capacity errors
//! are always safe to retry.

mod can_fifo;
mod cmd_buf;
mod io_fifo;

pub use can_fifo::{CanEntry, CanExtEntry, CanExtFifo, CanFifo};
pub use cmd_buf::{CMD_BUF_SIZE, CmdBuf};
pub use io_fifo::IoFifo;
