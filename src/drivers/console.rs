//! Console Driver Interface
//!
//! The console driver itself (VGA text + serial on the real machine) lives
//! outside this crate. The system-call layer only needs two things from it:
//! bulk output and blocking keyboard input.
//!
//! # Constraints
//! - `write_bytes` is only safe for buffers up to `CONSOLE_CHUNK` bytes;
//!   longer output must go through `write_chunked`
//! - `read_key` blocks the calling thread until a key arrives

use core::fmt::{self, Write};

use crate::config::CONSOLE_CHUNK;

/// The console collaborator.
pub trait Console {
    /// Write `buf` to the display. `buf.len()` never exceeds `CONSOLE_CHUNK`.
    fn write_bytes(&self, buf: &[u8]);

    /// Wait for and return the next key from the keyboard.
    fn read_key(&self) -> u8;
}

/// Write `buf` to the console in `CONSOLE_CHUNK`-sized pieces.
pub fn write_chunked<C: Console + ?Sized>(console: &C, buf: &[u8]) {
    for chunk in buf.chunks(CONSOLE_CHUNK) {
        console.write_bytes(chunk);
    }
}

/// `fmt::Write` adapter over a console.
pub struct ConsoleWriter<'a, C: Console + ?Sized> {
    console: &'a C,
}

impl<'a, C: Console + ?Sized> ConsoleWriter<'a, C> {
    pub fn new(console: &'a C) -> Self {
        Self { console }
    }
}

impl<C: Console + ?Sized> Write for ConsoleWriter<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_chunked(self.console, s.as_bytes());
        Ok(())
    }
}

/// Print formatted text to a console.
#[macro_export]
macro_rules! cprint {
    ($console:expr, $($arg:tt)*) => {{
        use core::fmt::Write;
        let mut writer = $crate::drivers::console::ConsoleWriter::new($console);
        let _ = write!(writer, $($arg)*);
    }};
}

/// Print formatted text and a newline to a console.
#[macro_export]
macro_rules! cprintln {
    ($console:expr) => {
        $crate::cprint!($console, "\n")
    };
    ($console:expr, $($arg:tt)*) => {{
        $crate::cprint!($console, $($arg)*);
        $crate::cprint!($console, "\n");
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConsole;

    #[test]
    fn test_write_chunked_splits() {
        let console = MockConsole::new();
        let data = [b'x'; CONSOLE_CHUNK * 2 + 5];
        write_chunked(&console, &data);
        assert_eq!(
            console.write_sizes(),
            [CONSOLE_CHUNK, CONSOLE_CHUNK, 5]
        );
        assert_eq!(console.output().len(), data.len());
    }

    #[test]
    fn test_write_chunked_empty() {
        let console = MockConsole::new();
        write_chunked(&console, &[]);
        assert!(console.write_sizes().is_empty());
    }

    #[test]
    fn test_print_macros() {
        let console = MockConsole::new();
        cprintln!(&console, "{}: exit({})", "echo", 0);
        assert_eq!(console.output(), b"echo: exit(0)\n");
    }
}
