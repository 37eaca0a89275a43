//! System Call Trap Entry
//!
//! User programs request kernel services with `int $0x30`. The interrupt
//! stub saves the user registers into an `IntrFrame` and calls the
//! registered handler, which hands the frame to `syscall::dispatch`.
//!
//! # Frame Contract
//! - `esp` is the user stack pointer at the moment of the trap; the call
//!   number sits at `esp`, arguments directly above it
//! - `eax` is restored into the user's `%eax` on return from the interrupt
//! - The frame is borrowed for one call and never retained

use crate::config::{SYSCALL_DPL, SYSCALL_VECTOR};

/// Register state captured at trap time, reduced to what the system-call
/// layer reads and writes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntrFrame {
    /// User stack pointer.
    pub esp: u32,
    /// Result register.
    pub eax: u32,
}

impl IntrFrame {
    /// Frame for a trap with the user stack at `esp`.
    pub const fn new(esp: u32) -> Self {
        Self { esp, eax: 0 }
    }

    /// The result register, read back as the signed value user code sees.
    pub const fn result(&self) -> i32 {
        self.eax as i32
    }
}

/// Interrupt level the handler runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrLevel {
    /// Interrupts stay disabled for the whole handler.
    Off,
    /// Interrupts are re-enabled on entry; the handler may be preempted.
    On,
}

/// Handler signature the trap stub calls.
pub type TrapHandler = fn(&mut IntrFrame);

/// The interrupt controller's registration interface.
pub trait InterruptRegistry {
    /// Route software interrupt `vector` to `handler`.
    ///
    /// `dpl` is the lowest privilege ring allowed to raise it.
    fn register_int(
        &mut self,
        vector: u8,
        dpl: u8,
        level: IntrLevel,
        handler: TrapHandler,
        name: &'static str,
    );
}

/// Install `handler` as the system-call gate.
///
/// The gate is user-callable and runs with interrupts enabled.
pub fn syscall_init<R: InterruptRegistry + ?Sized>(registry: &mut R, handler: TrapHandler) {
    registry.register_int(SYSCALL_VECTOR, SYSCALL_DPL, IntrLevel::On, handler, "syscall");
    log::info!("syscall gate installed on vector {:#04x}", SYSCALL_VECTOR);
}
