//! System Call Argument Marshaling
//!
//! Pulls call arguments off the user stack and validates the buffers and
//! strings they point to.
//!
//! # Stack Layout
//! ```text
//!   esp + 12  │ arg 2 │
//!   esp +  8  │ arg 1 │
//!   esp +  4  │ arg 0 │
//!   esp       │  nr   │
//! ```
//! Each slot is a 4-byte little-endian word.
//!
//! # Security Principles
//! - Every byte is read through `mm::uaccess`, including each byte of a
//!   multi-byte word
//! - Buffers are validated end to end before the call body acts on them,
//!   so a failing call has no partial side effects
//! - Null is never a valid buffer or string pointer
//! - Any failure here is a `Fault`, which kills the calling process

use alloc::string::String;
use alloc::vec::Vec;

use crate::config::WORD_SIZE;
use crate::mm::address::range_is_user;
use crate::mm::{read_byte, verify_writable, write_byte, Fault, UserAddr, UserMemory};

/// Read the 4-byte little-endian word at `addr`.
pub fn read_word<M: UserMemory + ?Sized>(mem: &M, addr: UserAddr) -> Result<u32, Fault> {
    let mut bytes = [0u8; WORD_SIZE as usize];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let at = addr.checked_add(i as u32).ok_or(Fault::at(addr))?;
        *byte = read_byte(mem, at)?;
    }
    Ok(u32::from_le_bytes(bytes))
}

/// Address of argument slot `index` (zero-based) above `esp`.
fn slot_addr(esp: UserAddr, index: u32) -> Result<UserAddr, Fault> {
    index
        .checked_add(1)
        .and_then(|slot| slot.checked_mul(WORD_SIZE))
        .and_then(|offset| esp.checked_add(offset))
        .ok_or(Fault::at(esp))
}

/// Fetch argument `index` of the current call.
pub fn arg<M: UserMemory + ?Sized>(mem: &M, esp: UserAddr, index: u32) -> Result<u32, Fault> {
    read_word(mem, slot_addr(esp, index)?)
}

/// Check that `count` whole words starting at `esp` are readable.
pub fn validate_words<M: UserMemory + ?Sized>(
    mem: &M,
    esp: UserAddr,
    count: u32,
) -> Result<(), Fault> {
    let len = count.checked_mul(WORD_SIZE).ok_or(Fault::at(esp))?;
    if !range_is_user(esp, len) {
        return Err(Fault::at(esp));
    }
    for offset in 0..len {
        let at = esp.checked_add(offset).ok_or(Fault::at(esp))?;
        read_byte(mem, at)?;
    }
    Ok(())
}

/// Common pointer checks: non-null, and the whole range below `PHYS_BASE`.
fn check_range(ptr: UserAddr, len: u32) -> Result<(), Fault> {
    if ptr.is_null() || !range_is_user(ptr, len) {
        return Err(Fault::at(ptr));
    }
    Ok(())
}

/// A validated, readable user buffer.
///
/// Only constructed by `validate_user_read` after every byte was probed.
/// Later accesses still go through the accessor.
#[derive(Debug, Clone, Copy)]
pub struct UserBuffer {
    addr: UserAddr,
    len: u32,
}

impl UserBuffer {
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `dst.len()` bytes starting `offset` bytes into the buffer.
    pub fn copy_to_kernel<M: UserMemory + ?Sized>(
        &self,
        mem: &M,
        offset: u32,
        dst: &mut [u8],
    ) -> Result<(), Fault> {
        for (i, byte) in dst.iter_mut().enumerate() {
            *byte = read_byte(mem, self.at(offset, i)?)?;
        }
        Ok(())
    }

    fn at(&self, offset: u32, i: usize) -> Result<UserAddr, Fault> {
        offset
            .checked_add(i as u32)
            .filter(|&pos| pos < self.len)
            .and_then(|pos| self.addr.checked_add(pos))
            .ok_or(Fault::at(self.addr))
    }
}

/// A validated, writable user buffer.
#[derive(Debug, Clone, Copy)]
pub struct UserBufferMut {
    inner: UserBuffer,
}

impl UserBufferMut {
    pub fn len(&self) -> u32 {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Store one byte at `offset`.
    pub fn put<M: UserMemory + ?Sized>(
        &self,
        mem: &mut M,
        offset: u32,
        value: u8,
    ) -> Result<(), Fault> {
        write_byte(mem, self.inner.at(offset, 0)?, value)
    }

    /// Copy `src` into the buffer starting `offset` bytes in.
    pub fn copy_from_kernel<M: UserMemory + ?Sized>(
        &self,
        mem: &mut M,
        offset: u32,
        src: &[u8],
    ) -> Result<(), Fault> {
        for (i, &byte) in src.iter().enumerate() {
            write_byte(mem, self.inner.at(offset, i)?, byte)?;
        }
        Ok(())
    }
}

/// Validate a user buffer the kernel will read from.
///
/// # Security Checks
/// 1. Pointer is not null
/// 2. `ptr + len` doesn't overflow and stays below `PHYS_BASE`
/// 3. Every byte in the range is mapped and readable
pub fn validate_user_read<M: UserMemory + ?Sized>(
    mem: &M,
    ptr: UserAddr,
    len: u32,
) -> Result<UserBuffer, Fault> {
    check_range(ptr, len)?;
    for offset in 0..len {
        let at = ptr.checked_add(offset).ok_or(Fault::at(ptr))?;
        read_byte(mem, at)?;
    }
    Ok(UserBuffer { addr: ptr, len })
}

/// Validate a user buffer the kernel will write into.
///
/// Same checks as `validate_user_read`, plus every byte must be writable.
/// The buffer contents are left unchanged.
pub fn validate_user_write<M: UserMemory + ?Sized>(
    mem: &mut M,
    ptr: UserAddr,
    len: u32,
) -> Result<UserBufferMut, Fault> {
    check_range(ptr, len)?;
    for offset in 0..len {
        let at = ptr.checked_add(offset).ok_or(Fault::at(ptr))?;
        verify_writable(mem, at)?;
    }
    Ok(UserBufferMut {
        inner: UserBuffer { addr: ptr, len },
    })
}

/// Result of copying a NUL-terminated string out of user memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserStr {
    /// The string, without its terminator.
    Valid(String),
    /// No terminator within the allowed length.
    TooLong,
    /// Terminated, but not UTF-8.
    NotUtf8,
}

/// Copy a NUL-terminated string of at most `max` bytes from user memory.
///
/// Bytes are probed one at a time up to and including the terminator, or
/// up to `max + 1` bytes when there is none. An unreadable byte in that
/// range is a `Fault`; a missing terminator is only `UserStr::TooLong`.
pub fn read_user_str<M: UserMemory + ?Sized>(
    mem: &M,
    ptr: UserAddr,
    max: usize,
) -> Result<UserStr, Fault> {
    if ptr.is_null() {
        return Err(Fault::at(ptr));
    }
    let mut bytes = Vec::new();
    loop {
        let at = ptr.checked_add(bytes.len() as u32).ok_or(Fault::at(ptr))?;
        let byte = read_byte(mem, at)?;
        if byte == 0 {
            break;
        }
        if bytes.len() == max {
            return Ok(UserStr::TooLong);
        }
        bytes.push(byte);
    }
    Ok(match String::from_utf8(bytes) {
        Ok(s) => UserStr::Valid(s),
        Err(_) => UserStr::NotUtf8,
    })
}
