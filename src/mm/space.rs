//! Simulated User Address Space
//!
//! A page-granular model of one process's user memory. Pages are either
//! absent (any access faults) or present with a set of flags, exactly like
//! the page directory the VM subsystem maintains for a real process.
//!
//! # Design
//! - One 4 KiB backing frame per mapped page, keyed by virtual page number
//! - Access checks use the same flags a hardware walk would use:
//!   `PRESENT` and `USER` for loads, plus `WRITABLE` for stores
//! - A failed check reports a fault; nothing ever panics on a bad address

use alloc::boxed::Box;
use alloc::collections::BTreeMap;

use bitflags::bitflags;

use super::address::{UserAddr, PAGE_MASK};
use super::uaccess::UserMemory;
use crate::config::{PAGE_SIZE, PHYS_BASE};

bitflags! {
    /// Page table entry flags for a user page.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        /// Page is mapped.
        const PRESENT = 1 << 0;
        /// Page may be written.
        const WRITABLE = 1 << 1;
        /// Page is reachable from user mode.
        const USER = 1 << 2;
    }
}

impl PageFlags {
    /// Flags for an ordinary read-only user page (code, rodata).
    pub const USER_RO: Self = Self::PRESENT.union(Self::USER);
    /// Flags for an ordinary read/write user page (data, stack).
    pub const USER_RW: Self = Self::USER_RO.union(Self::WRITABLE);
}

/// Error type for mapping operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// The page lies at or above `PHYS_BASE`.
    KernelAddress,
    /// The address is not page-aligned.
    Unaligned,
    /// The page is already mapped.
    AlreadyMapped,
}

impl core::fmt::Display for MapError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::KernelAddress => write!(f, "page lies in kernel space"),
            Self::Unaligned => write!(f, "address not page-aligned"),
            Self::AlreadyMapped => write!(f, "page already mapped"),
        }
    }
}

struct Page {
    flags: PageFlags,
    frame: Box<[u8; PAGE_SIZE as usize]>,
}

/// A process's user address space.
#[derive(Default)]
pub struct AddressSpace {
    pages: BTreeMap<u32, Page>,
}

impl AddressSpace {
    /// Create an empty address space: every access faults.
    pub const fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    /// Map one zero-filled page at `base`.
    pub fn map(&mut self, base: UserAddr, flags: PageFlags) -> Result<(), MapError> {
        if base.as_u32() & PAGE_MASK != 0 {
            return Err(MapError::Unaligned);
        }
        if base.as_u32() >= PHYS_BASE {
            return Err(MapError::KernelAddress);
        }
        if self.pages.contains_key(&base.page_number()) {
            return Err(MapError::AlreadyMapped);
        }
        self.pages.insert(
            base.page_number(),
            Page {
                flags: flags | PageFlags::PRESENT,
                frame: Box::new([0; PAGE_SIZE as usize]),
            },
        );
        Ok(())
    }

    /// Map `count` consecutive pages starting at `base`.
    pub fn map_range(
        &mut self,
        base: UserAddr,
        count: u32,
        flags: PageFlags,
    ) -> Result<(), MapError> {
        for i in 0..count {
            let page = i
                .checked_mul(PAGE_SIZE)
                .and_then(|offset| base.checked_add(offset))
                .ok_or(MapError::KernelAddress)?;
            self.map(page, flags)?;
        }
        Ok(())
    }

    /// Remove the page containing `addr`. Returns whether a page was mapped.
    pub fn unmap(&mut self, addr: UserAddr) -> bool {
        self.pages.remove(&addr.page_number()).is_some()
    }

    /// Flags of the page containing `addr`, if mapped.
    pub fn flags(&self, addr: UserAddr) -> Option<PageFlags> {
        self.pages.get(&addr.page_number()).map(|page| page.flags)
    }

    /// Number of mapped pages.
    pub fn mapped_pages(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, addr: UserAddr, required: PageFlags) -> Option<&Page> {
        self.pages
            .get(&addr.page_number())
            .filter(|page| page.flags.contains(required))
    }

    fn page_mut(&mut self, addr: UserAddr, required: PageFlags) -> Option<&mut Page> {
        self.pages
            .get_mut(&addr.page_number())
            .filter(|page| page.flags.contains(required))
    }
}

impl UserMemory for AddressSpace {
    fn load(&self, addr: UserAddr) -> Option<u8> {
        self.page(addr, PageFlags::USER_RO)
            .map(|page| page.frame[addr.page_offset()])
    }

    fn store(&mut self, addr: UserAddr, value: u8) -> bool {
        match self.page_mut(addr, PageFlags::USER_RW) {
            Some(page) => {
                page.frame[addr.page_offset()] = value;
                true
            }
            None => false,
        }
    }
}

impl core::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(
                self.pages
                    .iter()
                    .map(|(vpn, page)| (UserAddr::new(vpn << 12), page.flags)),
            )
            .finish()
    }
}
