//! User memory for the system-call layer
//!
//! Provides:
//! - `UserAddr`, the type of every address a user program hands over
//! - The fault-safe accessor every other component reads user memory through
//! - A simulated page-mapped address space
//!
//! # Security Principles
//! - User addresses are range-checked against `PHYS_BASE` before any access
//! - Faults on user addresses are values, never kernel crashes

pub mod address;
pub mod space;
pub mod uaccess;

pub use address::UserAddr;
pub use space::{AddressSpace, PageFlags};
pub use uaccess::{read_byte, verify_writable, write_byte, Fault, UserMemory};
