//! Device interfaces used by the system-call layer
//!
//! The drivers themselves are external; this module holds the traits they
//! are consumed through plus small helpers on top of them.

pub mod console;

pub use console::{write_chunked, Console, ConsoleWriter};
