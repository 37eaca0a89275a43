//! System Call Dispatcher
//!
//! Validates the trap frame, decodes the call number, runs the call body and
//! writes the result back into the frame.
//!
//! # States
//! ```text
//!   Idle ──frame ok──▶ FrameValidated ──known nr──▶ Dispatched ──▶ Idle
//!     │                      │                          │
//!     └──bad frame──┐        └──unknown nr──┐           └──exit / fault / halt
//!                   ▼                       ▼                     ▼
//!                          Terminated (absorbing for the process)
//! ```
//! A bad frame or an unknown call number never reaches a call body.

use crate::config::MAX_SYSCALL_ARGS;
use crate::cprintln;
use crate::mm::{UserAddr, UserMemory};
use crate::process::ProcessContext;
use crate::trap::IntrFrame;

use super::args;
use super::handler::{Action, Call, Services, SyscallError};
use super::numbers::Syscall;

/// How the trap stub should leave the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    /// Return to user mode; `eax` holds the result if the call has one.
    Resume,
    /// The process was terminated with this exit status.
    Terminated(i32),
    /// The machine was powered off.
    Halted,
}

/// Handle one system-call trap from the process owning `process` and `mem`.
///
/// # Security
/// - The call-number slot and the largest argument region any call could
///   use are validated before the number is even decoded
/// - Unknown call numbers terminate the process with status -1
/// - Pointer faults anywhere in a call terminate the process with status -1
pub fn dispatch<H, M>(
    services: Services<'_, H>,
    frame: &mut IntrFrame,
    process: &mut ProcessContext<H>,
    mem: &mut M,
) -> TrapOutcome
where
    M: UserMemory + ?Sized,
{
    let esp = UserAddr::new(frame.esp);

    // Idle -> FrameValidated
    if let Err(fault) = args::validate_words(&*mem, esp, 1 + MAX_SYSCALL_ARGS) {
        log::warn!("{}: bad syscall frame: {}", process.name(), fault);
        return terminate(services, process, -1);
    }
    let nr = match args::read_word(&*mem, esp) {
        Ok(nr) => nr,
        Err(fault) => {
            log::warn!("{}: bad syscall frame: {}", process.name(), fault);
            return terminate(services, process, -1);
        }
    };

    // FrameValidated -> Dispatched
    let Some(call) = Syscall::from_raw(nr) else {
        log::warn!("{}: {}", process.name(), SyscallError::BadCallNumber(nr));
        return terminate(services, process, -1);
    };
    log::trace!("{}: system call {} ({})", process.name(), nr, call.name());

    let result = Call {
        services,
        process: &mut *process,
        mem: &mut *mem,
        esp,
    }
    .run(call);

    match result {
        Ok(Action::Return(value)) => {
            frame.eax = value as u32;
            TrapOutcome::Resume
        }
        Ok(Action::Resume) => TrapOutcome::Resume,
        Ok(Action::Exit(status)) => terminate(services, process, status),
        Ok(Action::Halt) => TrapOutcome::Halted,
        Err(err) if err.is_fatal() => {
            log::warn!("{}: {} failed: {}", process.name(), call.name(), err);
            terminate(services, process, -1)
        }
        Err(err) => {
            log::debug!("{}: {} failed: {}", process.name(), call.name(), err);
            frame.eax = -1i32 as u32;
            TrapOutcome::Resume
        }
    }
}

/// Exit path shared by `exit` and every fatal validation failure.
fn terminate<H>(services: Services<'_, H>, process: &mut ProcessContext<H>, status: i32) -> TrapOutcome {
    process.set_exit_status(status);
    cprintln!(services.console, "{}: exit({})", process.name(), process.exit_status());
    process.teardown(services.fs);
    services.processes.terminate_current();
    TrapOutcome::Terminated(process.exit_status())
}
