//! Fault-Safe User Memory Access
//!
//! The only path by which kernel code reads or writes memory named by a
//! user program.
//!
//! # Security Principles
//! - Range check first: anything at or above `PHYS_BASE` is rejected
//!   before the backing memory is consulted at all
//! - A page fault raised while probing a user address becomes a `Fault`
//!   return value instead of a kernel crash
//! - Nothing read from kernel memory is ever returned to the caller

use super::address::UserAddr;

/// A failed access to user memory.
///
/// Carries the offending address for diagnostics only; it is never
/// reported back to the user program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    addr: UserAddr,
}

impl Fault {
    pub(crate) const fn at(addr: UserAddr) -> Self {
        Self { addr }
    }

    /// The address that could not be accessed.
    pub const fn addr(&self) -> UserAddr {
        self.addr
    }
}

impl core::fmt::Display for Fault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "bad user address {}", self.addr)
    }
}

/// Backing store for a process's user address space.
///
/// Implementations report a page fault as `None`/`false`. They are only
/// ever called with addresses below `PHYS_BASE`.
pub trait UserMemory {
    /// Load one byte, or `None` if the access faults.
    fn load(&self, addr: UserAddr) -> Option<u8>;

    /// Store one byte. Returns `false` if the access faults.
    fn store(&mut self, addr: UserAddr, value: u8) -> bool;
}

impl<M: UserMemory + ?Sized> UserMemory for &mut M {
    fn load(&self, addr: UserAddr) -> Option<u8> {
        (**self).load(addr)
    }

    fn store(&mut self, addr: UserAddr, value: u8) -> bool {
        (**self).store(addr, value)
    }
}

/// Read one byte at user address `addr`.
///
/// Null and kernel addresses fail without touching `mem`.
#[inline]
pub fn read_byte<M: UserMemory + ?Sized>(mem: &M, addr: UserAddr) -> Result<u8, Fault> {
    if addr.is_null() || !addr.is_user() {
        return Err(Fault::at(addr));
    }
    mem.load(addr).ok_or(Fault::at(addr))
}

/// Write `value` to user address `addr`.
///
/// Null and kernel addresses fail without touching `mem`.
#[inline]
pub fn write_byte<M: UserMemory + ?Sized>(
    mem: &mut M,
    addr: UserAddr,
    value: u8,
) -> Result<(), Fault> {
    if addr.is_null() || !addr.is_user() {
        return Err(Fault::at(addr));
    }
    if mem.store(addr, value) {
        Ok(())
    } else {
        Err(Fault::at(addr))
    }
}

/// Prove that `addr` is writable without changing its contents.
///
/// Reads the byte and stores the same value back.
pub fn verify_writable<M: UserMemory + ?Sized>(mem: &mut M, addr: UserAddr) -> Result<(), Fault> {
    let value = read_byte(mem, addr)?;
    write_byte(mem, addr, value)
}

/// Fault-trapping accessors for the real i386 kernel.
///
/// Each probe loads the address of its continuation label into `eax` before
/// the access. If the access page-faults, the page-fault handler sees a
/// kernel-mode fault, copies `eax` into `eip` and sets `eax` to -1, so the
/// probe resumes after the access with a failure code.
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod hw {
    use core::arch::asm;

    use super::{UserAddr, UserMemory};

    /// The current process's address space, accessed directly.
    #[derive(Debug, Default)]
    pub struct FaultingUserMemory;

    impl UserMemory for FaultingUserMemory {
        fn load(&self, addr: UserAddr) -> Option<u8> {
            let result: i32;
            // SAFETY:
            // - `read_byte` has already rejected addresses >= PHYS_BASE
            // - a fault inside this sequence is redirected by the page-fault
            //   handler to label 2 with eax = -1
            unsafe {
                asm!(
                    "movl $2f, %eax",
                    "movzbl ({addr}), %eax",
                    "2:",
                    addr = in(reg) addr.as_u32(),
                    out("eax") result,
                    options(att_syntax, nostack, readonly),
                );
            }
            if result == -1 {
                None
            } else {
                Some(result as u8)
            }
        }

        fn store(&mut self, addr: UserAddr, value: u8) -> bool {
            let error_code: i32;
            // SAFETY: same contract as `load`
            unsafe {
                asm!(
                    "movl $2f, %eax",
                    "movb {value}, ({addr})",
                    "2:",
                    addr = in(reg) addr.as_u32(),
                    value = in(reg_byte) value,
                    out("eax") error_code,
                    options(att_syntax, nostack),
                );
            }
            error_code != -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PHYS_BASE;
    use crate::mm::space::{AddressSpace, PageFlags};

    /// Memory that records whether it was ever consulted.
    struct Tripwire {
        touched: core::cell::Cell<bool>,
    }

    impl UserMemory for Tripwire {
        fn load(&self, _addr: UserAddr) -> Option<u8> {
            self.touched.set(true);
            Some(0xAA)
        }

        fn store(&mut self, _addr: UserAddr, _value: u8) -> bool {
            self.touched.set(true);
            true
        }
    }

    #[test]
    fn test_kernel_addresses_never_probed() {
        let mut mem = Tripwire {
            touched: core::cell::Cell::new(false),
        };
        for raw in [PHYS_BASE, PHYS_BASE + 1, 0xC010_0000, 0xFFFF_FFFF] {
            let addr = UserAddr::new(raw);
            assert_eq!(read_byte(&mem, addr), Err(Fault::at(addr)));
            assert_eq!(write_byte(&mut mem, addr, 1), Err(Fault::at(addr)));
        }
        assert!(!mem.touched.get());
    }

    #[test]
    fn test_null_never_probed() {
        let mut mem = Tripwire {
            touched: core::cell::Cell::new(false),
        };
        assert!(read_byte(&mem, UserAddr::NULL).is_err());
        assert!(write_byte(&mut mem, UserAddr::NULL, 0).is_err());
        assert!(!mem.touched.get());
    }

    #[test]
    fn test_mapped_round_trip() {
        let mut space = AddressSpace::new();
        space
            .map(UserAddr::new(PHYS_BASE - 0x1000), PageFlags::USER_RW)
            .unwrap();
        for (i, raw) in [PHYS_BASE - 0x1000, PHYS_BASE - 0x800, PHYS_BASE - 1]
            .into_iter()
            .enumerate()
        {
            let addr = UserAddr::new(raw);
            write_byte(&mut space, addr, 0x40 + i as u8).unwrap();
            assert_eq!(read_byte(&space, addr), Ok(0x40 + i as u8));
        }
    }

    #[test]
    fn test_unmapped_page_faults() {
        let mut space = AddressSpace::new();
        let addr = UserAddr::new(0x0804_8000);
        assert!(read_byte(&space, addr).is_err());
        assert!(write_byte(&mut space, addr, 3).is_err());
    }

    #[test]
    fn test_verify_writable_preserves_contents() {
        let mut space = AddressSpace::new();
        space.map(UserAddr::new(0x1000), PageFlags::USER_RW).unwrap();
        space.map(UserAddr::new(0x2000), PageFlags::USER_RO).unwrap();
        write_byte(&mut space, UserAddr::new(0x1004), 0x5A).unwrap();

        assert!(verify_writable(&mut space, UserAddr::new(0x1004)).is_ok());
        assert_eq!(read_byte(&space, UserAddr::new(0x1004)), Ok(0x5A));
        assert!(verify_writable(&mut space, UserAddr::new(0x2004)).is_err());
    }
}
