//! PantherOS user-program support
//!
//! The kernel side of the system-call boundary: everything that runs
//! between a user program's `int $0x30` and its return to user mode.
//!
//! # Components
//! - `mm`: fault-safe access to user memory, range-checked against the
//!   user/kernel split
//! - `syscall::args`: argument words and buffers pulled off the user stack
//! - `fd`: per-process file descriptor table
//! - `syscall`: the call implementations and the dispatcher
//! - `trap`: the call frame and registration of the syscall gate
//!
//! # Collaborators
//! The scheduler, filesystem, console driver and machine control are
//! outside this crate. They are reached through the `ProcessManager`,
//! `FileSystem`, `Console` and `Machine` traits and are passed explicitly
//! into every trap; there is no global "current process".
//!
//! # Security Features
//! - A user pointer is never dereferenced directly
//! - Bad pointers and unknown call numbers kill the process, not the kernel
//! - Buffers are validated before a call has any side effect

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod drivers;
pub mod fd;
pub mod fs;
pub mod logger;
pub mod mm;
pub mod process;
pub mod syscall;
pub mod trap;

#[cfg(test)]
mod testing;

pub use fd::{Fd, FdTable};
pub use process::{Pid, ProcessContext};
pub use syscall::{dispatch, Services, TrapOutcome};
pub use trap::IntrFrame;
