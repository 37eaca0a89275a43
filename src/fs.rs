//! Filesystem Interface
//!
//! The filesystem is an external collaborator. It owns the open-file
//! objects; this crate only holds their handles in a descriptor table and
//! hands them back on every call.
//!
//! Implementations serialize their own internal mutations, so every method
//! takes `&self`.

/// The filesystem collaborator.
pub trait FileSystem {
    /// An open file. Dropping a handle without `close` leaks it.
    type Handle;

    /// Create `name` with `initial_size` zero bytes. Fails if it exists.
    fn create(&self, name: &str, initial_size: u32) -> bool;

    /// Open `name`, or `None` if there is no such file.
    fn open(&self, name: &str) -> Option<Self::Handle>;

    /// Delete `name`. Open handles stay usable until closed.
    fn remove(&self, name: &str) -> bool;

    /// Read at the current position into `buf`; returns bytes read.
    fn read(&self, file: &mut Self::Handle, buf: &mut [u8]) -> u32;

    /// Write `buf` at the current position; returns bytes written.
    fn write(&self, file: &mut Self::Handle, buf: &[u8]) -> u32;

    /// Move the position. Seeking past the end is allowed.
    fn seek(&self, file: &mut Self::Handle, position: u32);

    /// Current position in bytes from the start of the file.
    fn tell(&self, file: &Self::Handle) -> u32;

    /// File length in bytes.
    fn length(&self, file: &Self::Handle) -> u32;

    /// Close the file and release the handle.
    fn close(&self, file: Self::Handle);
}
