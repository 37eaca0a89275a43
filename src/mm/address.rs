//! User Virtual Address Type
//!
//! A type-safe wrapper for addresses handed to the kernel by user programs.
//!
//! # Security Properties
//! - A `UserAddr` cannot be turned into a pointer; the only way to touch the
//!   memory behind it is through `mm::uaccess`
//! - Arithmetic is checked so an address never silently wraps into the
//!   low pages or past the user/kernel split

use core::fmt;

use crate::config::{PAGE_SIZE, PHYS_BASE};

/// Page size mask
pub const PAGE_MASK: u32 = PAGE_SIZE - 1;
/// Bits to shift for page number
pub const PAGE_SHIFT: u32 = 12;

/// A 32-bit user virtual address.
///
/// The value is entirely caller-controlled: it may be null, point into
/// kernel space, or reference a page that was never mapped.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct UserAddr(u32);

impl UserAddr {
    /// The null address.
    pub const NULL: Self = Self(0);

    /// Wrap a raw address. No validation happens here.
    #[inline]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Check for the null address.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Check if this address lies below the user/kernel split.
    ///
    /// This says nothing about whether the page is mapped.
    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 < PHYS_BASE
    }

    /// Check if this address aliases kernel memory.
    #[inline]
    pub const fn is_kernel(self) -> bool {
        !self.is_user()
    }

    /// Virtual page number.
    #[inline]
    pub const fn page_number(self) -> u32 {
        self.0 >> PAGE_SHIFT
    }

    /// Offset inside the page (lowest 12 bits).
    #[inline]
    pub const fn page_offset(self) -> usize {
        (self.0 & PAGE_MASK) as usize
    }

    /// Align the address down to the nearest page boundary.
    #[inline]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    /// Add a byte offset, returning `None` on 32-bit overflow.
    #[inline]
    pub const fn checked_add(self, offset: u32) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }
}

impl From<u32> for UserAddr {
    fn from(addr: u32) -> Self {
        Self::new(addr)
    }
}

impl fmt::Debug for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserAddr({:#010x})", self.0)
    }
}

impl fmt::Display for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Check that `[start, start + len)` lies entirely below the user/kernel split.
///
/// An empty range is accepted as long as `start` itself is a user address.
pub const fn range_is_user(start: UserAddr, len: u32) -> bool {
    if !start.is_user() {
        return false;
    }
    match start.0.checked_add(len) {
        Some(end) => end <= PHYS_BASE,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_kernel_split() {
        assert!(UserAddr::new(0x0804_8000).is_user());
        assert!(UserAddr::new(PHYS_BASE - 1).is_user());
        assert!(UserAddr::new(PHYS_BASE).is_kernel());
        assert!(UserAddr::new(u32::MAX).is_kernel());
    }

    #[test]
    fn test_page_arithmetic() {
        let addr = UserAddr::new(0x0804_8123);
        assert_eq!(addr.page_number(), 0x08048);
        assert_eq!(addr.page_offset(), 0x123);
        assert_eq!(addr.align_down().as_u32(), 0x0804_8000);
    }

    #[test]
    fn test_range_check() {
        assert!(range_is_user(UserAddr::new(PHYS_BASE - 4), 4));
        assert!(!range_is_user(UserAddr::new(PHYS_BASE - 4), 5));
        assert!(!range_is_user(UserAddr::new(PHYS_BASE), 0));
        assert!(!range_is_user(UserAddr::new(0xFFFF_FFF0), 0x20));
    }

    #[test]
    fn test_checked_add_overflow() {
        assert_eq!(UserAddr::new(u32::MAX).checked_add(1), None);
        assert_eq!(
            UserAddr::new(0x1000).checked_add(4),
            Some(UserAddr::new(0x1004))
        );
    }
}
