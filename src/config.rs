//! Kernel configuration constants for the user-program layer.
//!
//! Everything here is fixed at compile time. User programs are compiled
//! against several of these values (the vector number, the argument layout),
//! so changing them breaks the user ABI.

/// Base of kernel virtual memory. Every user address lies strictly below it.
pub const PHYS_BASE: u32 = 0xC000_0000;

/// Page size (4 KiB)
pub const PAGE_SIZE: u32 = 4096;

/// Size in bytes of one argument slot on the user stack.
pub const WORD_SIZE: u32 = 4;

/// Largest number of arguments any system call takes.
pub const MAX_SYSCALL_ARGS: u32 = 3;

/// Number of descriptor slots per process, not counting stdin/stdout.
pub const MAX_OPEN_FILES: usize = 128;

/// Descriptors 0 and 1 are the console and never come from the table.
pub const RESERVED_FDS: usize = 2;

/// Largest single write handed to the console driver.
///
/// Also the size of the kernel bounce buffer used for file transfers.
pub const CONSOLE_CHUNK: usize = 256;

/// Longest file name accepted by create/remove/open, excluding the NUL.
pub const NAME_MAX: usize = 14;

/// Longest command line accepted by exec, excluding the NUL.
pub const CMDLINE_MAX: usize = PAGE_SIZE as usize - 1;

/// Exit status of a process that never called `exit`.
pub const DEFAULT_EXIT_STATUS: i32 = -1;

/// Interrupt vector user programs trap through (`int $0x30`).
pub const SYSCALL_VECTOR: u8 = 0x30;

/// Descriptor privilege level of the syscall gate: callable from ring 3.
pub const SYSCALL_DPL: u8 = 3;
