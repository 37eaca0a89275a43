//! Process Context and Scheduler Interface
//!
//! `ProcessContext` is the part of a process control block the system-call
//! layer owns: the exit status and the descriptor table. The scheduler owns
//! everything else and is reached through `ProcessManager`.
//!
//! # Ownership
//! A context belongs to exactly one process and is only borrowed by the
//! trap handler running on that process's thread, so it needs no lock.

use alloc::string::String;

use crate::config::DEFAULT_EXIT_STATUS;
use crate::fd::FdTable;
use crate::fs::FileSystem;

/// Process identifier as seen by user programs.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Pid(pub i32);

impl core::fmt::Display for Pid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The scheduler/process collaborator.
pub trait ProcessManager {
    /// Load and start a new process from `cmd_line`.
    ///
    /// Returns once the child has either been loaded or failed to load.
    fn start_process(&self, cmd_line: &str) -> Option<Pid>;

    /// Block until child `pid` exits and consume its exit status.
    ///
    /// Returns `None` immediately if `pid` is not a live-or-unreaped child
    /// of the caller, including the second wait on the same child.
    fn wait_for(&self, pid: Pid) -> Option<i32>;

    /// Tear down the current thread. On the real kernel this never returns.
    fn terminate_current(&self);
}

/// Machine-level control.
pub trait Machine {
    /// Power the machine off. On the real kernel this never returns.
    fn power_off(&self);
}

/// Per-process state owned by the system-call layer.
pub struct ProcessContext<H> {
    name: String,
    exit_status: i32,
    exited: bool,
    fds: FdTable<H>,
}

impl<H> ProcessContext<H> {
    /// Fresh context for a process whose executable is `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            exit_status: DEFAULT_EXIT_STATUS,
            exited: false,
            fds: FdTable::new(),
        }
    }

    /// Executable name, used in the exit message.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The recorded exit status (the default until the process exits).
    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    /// Check whether the exit status has been recorded.
    pub fn has_exited(&self) -> bool {
        self.exited
    }

    /// Record the exit status. Only the first call has any effect.
    ///
    /// Returns whether this call recorded it.
    pub fn set_exit_status(&mut self, status: i32) -> bool {
        if self.exited {
            return false;
        }
        self.exit_status = status;
        self.exited = true;
        true
    }

    /// The descriptor table.
    pub fn fds(&mut self) -> &mut FdTable<H> {
        &mut self.fds
    }

    /// Close every descriptor still open. Called on process exit.
    pub fn teardown<F>(&mut self, fs: &F)
    where
        F: FileSystem<Handle = H> + ?Sized,
    {
        if !self.fds.is_empty() {
            log::debug!("{}: closing {} open files", self.name, self.fds.len());
        }
        self.fds.close_all(fs);
    }
}

impl<H> core::fmt::Debug for ProcessContext<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProcessContext")
            .field("name", &self.name)
            .field("exit_status", &self.exit_status)
            .field("exited", &self.exited)
            .field("fds", &self.fds)
            .finish()
    }
}
