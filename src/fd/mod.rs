//! File descriptors
//!
//! Each process owns one `FdTable`; nothing here is shared between
//! processes, so no locking is involved.

pub mod table;

pub use table::{Fd, FdError, FdTable};
