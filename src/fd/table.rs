//! Per-Process File Descriptor Table
//!
//! Maps the small integers a user program sees to open-file handles owned
//! by the filesystem.
//!
//! # Design
//! - Fixed-capacity slot array plus an allocation bitmap
//!   (1 = allocated, 0 = free)
//! - Descriptors 0 and 1 are the console and are never allocated; slot `i`
//!   is handed out as descriptor `i + RESERVED_FDS`
//! - Lowest free slot first, so a closed descriptor number is reissued by
//!   the next `allocate`
//! - A descriptor is usable only while its bit is set *and* a handle is
//!   bound; everything else is `FdError::Invalid`

use crate::config::{MAX_OPEN_FILES, RESERVED_FDS};
use crate::fs::FileSystem;

const BITMAP_SIZE: usize = MAX_OPEN_FILES.div_ceil(8);

/// A descriptor number as seen by the user program.
///
/// This is a newtype so arbitrary integers cannot be used as slot indices;
/// the table is the only place that maps it back to a slot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Fd(i32);

impl Fd {
    /// Standard input (keyboard).
    pub const STDIN: Self = Self(0);

    /// Standard output (display).
    pub const STDOUT: Self = Self(1);

    /// Wrap the raw argument word a user program passed.
    #[inline]
    pub const fn from_user(word: u32) -> Self {
        Self(word as i32)
    }

    /// The value returned to the user program.
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Check for one of the console descriptors.
    #[inline]
    pub const fn is_console(self) -> bool {
        self.0 == Self::STDIN.0 || self.0 == Self::STDOUT.0
    }

    #[inline]
    const fn from_slot(slot: usize) -> Self {
        Self((slot + RESERVED_FDS) as i32)
    }

    /// Table slot for this descriptor, if it could name one.
    #[inline]
    const fn slot(self) -> Option<usize> {
        if self.0 < RESERVED_FDS as i32 {
            return None;
        }
        let slot = self.0 as usize - RESERVED_FDS;
        if slot < MAX_OPEN_FILES {
            Some(slot)
        } else {
            None
        }
    }
}

impl core::fmt::Display for Fd {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "fd {}", self.0)
    }
}

/// Error type for descriptor table operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdError {
    /// Every slot is allocated.
    Exhausted,
    /// Out of range, a console descriptor, or not currently open.
    Invalid,
    /// `bind` on a slot that already holds a handle.
    Occupied,
}

impl core::fmt::Display for FdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Exhausted => write!(f, "no free descriptor"),
            Self::Invalid => write!(f, "bad file descriptor"),
            Self::Occupied => write!(f, "descriptor already bound"),
        }
    }
}

/// Descriptor table for one process.
///
/// `H` is the filesystem's open-file handle type.
pub struct FdTable<H> {
    /// Allocation bitmap, one bit per slot.
    bitmap: [u8; BITMAP_SIZE],
    /// Bound handles.
    slots: [Option<H>; MAX_OPEN_FILES],
    /// Number of allocated slots.
    allocated: usize,
}

impl<H> FdTable<H> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            bitmap: [0; BITMAP_SIZE],
            slots: core::array::from_fn(|_| None),
            allocated: 0,
        }
    }

    #[inline]
    fn set_bit(&mut self, slot: usize, allocated: bool) {
        if allocated {
            self.bitmap[slot / 8] |= 1 << (slot % 8);
        } else {
            self.bitmap[slot / 8] &= !(1 << (slot % 8));
        }
    }

    #[inline]
    fn is_allocated(&self, slot: usize) -> bool {
        (self.bitmap[slot / 8] >> (slot % 8)) & 1 == 1
    }

    /// Number of allocated descriptors.
    pub fn len(&self) -> usize {
        self.allocated
    }

    /// Check whether no descriptors are allocated.
    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    /// Check whether another `allocate` would fail.
    pub fn is_full(&self) -> bool {
        self.allocated == MAX_OPEN_FILES
    }

    /// Reserve the lowest free descriptor.
    pub fn allocate(&mut self) -> Result<Fd, FdError> {
        if self.is_full() {
            return Err(FdError::Exhausted);
        }
        for (byte_idx, &byte) in self.bitmap.iter().enumerate() {
            if byte == 0xFF {
                continue;
            }
            let slot = byte_idx * 8 + byte.trailing_ones() as usize;
            if slot >= MAX_OPEN_FILES {
                break;
            }
            self.set_bit(slot, true);
            self.allocated += 1;
            return Ok(Fd::from_slot(slot));
        }
        Err(FdError::Exhausted)
    }

    /// Store `handle` in a slot returned by `allocate`.
    pub fn bind(&mut self, fd: Fd, handle: H) -> Result<(), FdError> {
        let slot = fd.slot().ok_or(FdError::Invalid)?;
        if !self.is_allocated(slot) {
            return Err(FdError::Invalid);
        }
        if self.slots[slot].is_some() {
            return Err(FdError::Occupied);
        }
        self.slots[slot] = Some(handle);
        Ok(())
    }

    /// Free the slot behind `fd` without closing anything.
    ///
    /// Any bound handle is handed back to the caller, who decides whether
    /// it still needs closing.
    pub fn release(&mut self, fd: Fd) -> Result<Option<H>, FdError> {
        let slot = fd.slot().ok_or(FdError::Invalid)?;
        if !self.is_allocated(slot) {
            return Err(FdError::Invalid);
        }
        self.set_bit(slot, false);
        self.allocated -= 1;
        Ok(self.slots[slot].take())
    }

    /// Get the open handle behind `fd`.
    pub fn lookup(&mut self, fd: Fd) -> Result<&mut H, FdError> {
        let slot = fd.slot().ok_or(FdError::Invalid)?;
        if !self.is_allocated(slot) {
            return Err(FdError::Invalid);
        }
        self.slots[slot].as_mut().ok_or(FdError::Invalid)
    }

    /// Close the file behind `fd` and free its slot.
    ///
    /// Invalid descriptors are ignored, so closing twice is harmless.
    pub fn close<F>(&mut self, fs: &F, fd: Fd)
    where
        F: FileSystem<Handle = H> + ?Sized,
    {
        if self.lookup(fd).is_err() {
            log::debug!("close: ignoring {}", fd);
            return;
        }
        if let Ok(Some(handle)) = self.release(fd) {
            fs.close(handle);
        }
    }

    /// Close every open file. Used when the owning process exits.
    pub fn close_all<F>(&mut self, fs: &F)
    where
        F: FileSystem<Handle = H> + ?Sized,
    {
        for slot in 0..MAX_OPEN_FILES {
            if !self.is_allocated(slot) {
                continue;
            }
            self.set_bit(slot, false);
            self.allocated -= 1;
            if let Some(handle) = self.slots[slot].take() {
                fs.close(handle);
            }
        }
    }
}

impl<H> Default for FdTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> core::fmt::Debug for FdTable<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FdTable")
            .field("allocated", &self.allocated)
            .field("capacity", &MAX_OPEN_FILES)
            .finish()
    }
}
