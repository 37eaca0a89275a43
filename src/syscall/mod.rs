//! System Call Interface
//!
//! The kernel side of `int $0x30`.
//!
//! # Security Model
//! - Whitelist approach: only the calls in `numbers` exist; any other
//!   number terminates the caller
//! - Every byte read from the user stack or a user buffer goes through the
//!   fault-safe accessor and is validated before the call acts on it
//! - Invalid pointers kill the process, never the kernel
//!
//! # Calls
//! - 0: halt()
//! - 1: exit(status)
//! - 2: exec(cmd_line) -> pid
//! - 3: wait(pid) -> status
//! - 4: create(name, initial_size) -> bool
//! - 5: remove(name) -> bool
//! - 6: open(name) -> fd
//! - 7: filesize(fd) -> size
//! - 8: read(fd, buffer, size) -> bytes
//! - 9: write(fd, buffer, size) -> bytes
//! - 10: seek(fd, position)
//! - 11: tell(fd) -> position
//! - 12: close(fd)

pub mod args;
mod dispatch;
mod handler;
pub mod numbers;


pub use dispatch::{dispatch, TrapOutcome};
pub use handler::{Services, SyscallError};
pub use numbers::Syscall;
