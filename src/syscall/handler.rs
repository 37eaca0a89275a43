//! System Call Implementations
//!
//! One method per call. Each pulls its arguments through `args`, validates
//! every pointer before acting, and reports either an `Action` for the
//! dispatcher or a `SyscallError`.
//!
//! # Security Considerations
//! - No call body ever sees an unvalidated user pointer
//! - User data moves through a fixed kernel bounce buffer, never through a
//!   reference into user memory
//! - Bad descriptors and wrong directions are reported, not fatal

use core::cmp::min;

use crate::config::{CMDLINE_MAX, CONSOLE_CHUNK, NAME_MAX};
use crate::drivers::Console;
use crate::fd::{Fd, FdError};
use crate::fs::FileSystem;
use crate::mm::{Fault, UserAddr, UserMemory};
use crate::process::{Machine, Pid, ProcessContext, ProcessManager};

use super::args::{self, UserStr};
use super::numbers::Syscall;

/// System call errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// A user pointer failed validation. Fatal to the process.
    BadAddress(Fault),
    /// Call number outside the table. Fatal to the process.
    BadCallNumber(u32),
    /// Descriptor not open in this process.
    BadDescriptor,
    /// Reading stdout or writing stdin.
    WrongDirection,
    /// Descriptor table full.
    TooManyOpenFiles,
    /// Name or command line rejected before reaching a collaborator.
    InvalidName,
    /// A collaborator refused the request.
    Failed,
    /// Result does not fit the 32-bit signed return register.
    Overflow,
}

impl SyscallError {
    /// Check whether this error terminates the calling process.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::BadAddress(_) | Self::BadCallNumber(_))
    }
}

impl From<Fault> for SyscallError {
    fn from(fault: Fault) -> Self {
        Self::BadAddress(fault)
    }
}

impl From<FdError> for SyscallError {
    fn from(err: FdError) -> Self {
        match err {
            FdError::Exhausted => Self::TooManyOpenFiles,
            FdError::Invalid | FdError::Occupied => Self::BadDescriptor,
        }
    }
}

impl core::fmt::Display for SyscallError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadAddress(fault) => write!(f, "{}", fault),
            Self::BadCallNumber(nr) => write!(f, "unknown system call {}", nr),
            Self::BadDescriptor => write!(f, "bad file descriptor"),
            Self::WrongDirection => write!(f, "descriptor not open in that direction"),
            Self::TooManyOpenFiles => write!(f, "too many open files"),
            Self::InvalidName => write!(f, "invalid name"),
            Self::Failed => write!(f, "operation failed"),
            Self::Overflow => write!(f, "result out of range"),
        }
    }
}

/// What the dispatcher should do once a call body finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Store the value in the result register and resume the caller.
    Return(i32),
    /// Resume the caller without touching the result register.
    Resume,
    /// Terminate the caller with this status.
    Exit(i32),
    /// The machine was powered off.
    Halt,
}

/// The external collaborators the call bodies act on.
pub struct Services<'k, H> {
    pub fs: &'k dyn FileSystem<Handle = H>,
    pub console: &'k dyn Console,
    pub processes: &'k dyn ProcessManager,
    pub machine: &'k dyn Machine,
}

impl<H> Clone for Services<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H> Copy for Services<'_, H> {}

fn to_i32(value: u32) -> Result<i32, SyscallError> {
    i32::try_from(value).map_err(|_| SyscallError::Overflow)
}

/// A single system call in progress.
pub(super) struct Call<'a, 'k, H, M: ?Sized> {
    pub services: Services<'k, H>,
    pub process: &'a mut ProcessContext<H>,
    pub mem: &'a mut M,
    pub esp: UserAddr,
}

impl<H, M: UserMemory + ?Sized> Call<'_, '_, H, M> {
    /// Run the body of `call`.
    pub fn run(&mut self, call: Syscall) -> Result<Action, SyscallError> {
        match call {
            Syscall::Halt => self.sys_halt(),
            Syscall::Exit => self.sys_exit(),
            Syscall::Exec => self.sys_exec(),
            Syscall::Wait => self.sys_wait(),
            Syscall::Create => self.sys_create(),
            Syscall::Remove => self.sys_remove(),
            Syscall::Open => self.sys_open(),
            Syscall::Filesize => self.sys_filesize(),
            Syscall::Read => self.sys_read(),
            Syscall::Write => self.sys_write(),
            Syscall::Seek => self.sys_seek(),
            Syscall::Tell => self.sys_tell(),
            Syscall::Close => self.sys_close(),
        }
    }

    fn arg(&self, index: u32) -> Result<u32, SyscallError> {
        Ok(args::arg(&*self.mem, self.esp, index)?)
    }

    fn fd_arg(&self, index: u32) -> Result<Fd, SyscallError> {
        self.arg(index).map(Fd::from_user)
    }

    fn ptr_arg(&self, index: u32) -> Result<UserAddr, SyscallError> {
        self.arg(index).map(UserAddr::new)
    }

    /// Copy a file name argument, or `None` if it can never name a file.
    fn name_arg(&self, index: u32) -> Result<Option<alloc::string::String>, SyscallError> {
        let ptr = self.ptr_arg(index)?;
        match args::read_user_str(&*self.mem, ptr, NAME_MAX)? {
            UserStr::Valid(name) => Ok(Some(name)),
            UserStr::TooLong | UserStr::NotUtf8 => Ok(None),
        }
    }

    fn sys_halt(&mut self) -> Result<Action, SyscallError> {
        log::info!("{}: halt", self.process.name());
        self.services.machine.power_off();
        Ok(Action::Halt)
    }

    fn sys_exit(&mut self) -> Result<Action, SyscallError> {
        let status = self.arg(0)? as i32;
        Ok(Action::Exit(status))
    }

    fn sys_exec(&mut self) -> Result<Action, SyscallError> {
        let ptr = self.ptr_arg(0)?;
        let cmd_line = match args::read_user_str(&*self.mem, ptr, CMDLINE_MAX)? {
            UserStr::Valid(cmd_line) => cmd_line,
            UserStr::TooLong | UserStr::NotUtf8 => return Err(SyscallError::InvalidName),
        };
        let pid = self
            .services
            .processes
            .start_process(&cmd_line)
            .ok_or(SyscallError::Failed)?;
        log::debug!("exec {:?} -> pid {}", cmd_line, pid);
        Ok(Action::Return(pid.0))
    }

    fn sys_wait(&mut self) -> Result<Action, SyscallError> {
        let pid = Pid(self.arg(0)? as i32);
        let status = self
            .services
            .processes
            .wait_for(pid)
            .ok_or(SyscallError::Failed)?;
        Ok(Action::Return(status))
    }

    fn sys_create(&mut self) -> Result<Action, SyscallError> {
        let name = self.name_arg(0)?;
        let initial_size = self.arg(1)?;
        let created = match name {
            Some(name) => self.services.fs.create(&name, initial_size),
            None => false,
        };
        Ok(Action::Return(created as i32))
    }

    fn sys_remove(&mut self) -> Result<Action, SyscallError> {
        let removed = match self.name_arg(0)? {
            Some(name) => self.services.fs.remove(&name),
            None => false,
        };
        Ok(Action::Return(removed as i32))
    }

    fn sys_open(&mut self) -> Result<Action, SyscallError> {
        let name = self.name_arg(0)?.ok_or(SyscallError::InvalidName)?;
        let fds = self.process.fds();
        let fd = fds.allocate()?;
        let Some(handle) = self.services.fs.open(&name) else {
            // Nothing was opened, so there is nothing to close.
            let _ = fds.release(fd);
            return Err(SyscallError::Failed);
        };
        fds.bind(fd, handle)?;
        log::debug!("open {:?} -> {}", name, fd);
        Ok(Action::Return(fd.as_i32()))
    }

    fn sys_filesize(&mut self) -> Result<Action, SyscallError> {
        let fd = self.fd_arg(0)?;
        let file = self.process.fds().lookup(fd)?;
        let length = self.services.fs.length(file);
        Ok(Action::Return(to_i32(length)?))
    }

    fn sys_read(&mut self) -> Result<Action, SyscallError> {
        let fd = self.fd_arg(0)?;
        let buffer = self.ptr_arg(1)?;
        let size = self.arg(2)?;
        let buffer = args::validate_user_write(&mut *self.mem, buffer, size)?;
        let result = to_i32(size)?;

        if fd == Fd::STDIN {
            for offset in 0..size {
                let key = self.services.console.read_key();
                buffer.put(&mut *self.mem, offset, key)?;
            }
            return Ok(Action::Return(result));
        }
        if fd == Fd::STDOUT {
            return Err(SyscallError::WrongDirection);
        }

        let fs = self.services.fs;
        let file = self.process.fds().lookup(fd)?;
        let mut bounce = [0u8; CONSOLE_CHUNK];
        let mut done = 0u32;
        while done < size {
            let want = min((size - done) as usize, CONSOLE_CHUNK);
            let got = min(fs.read(file, &mut bounce[..want]) as usize, want);
            buffer.copy_from_kernel(&mut *self.mem, done, &bounce[..got])?;
            done += got as u32;
            if got < want {
                break;
            }
        }
        Ok(Action::Return(to_i32(done)?))
    }

    fn sys_write(&mut self) -> Result<Action, SyscallError> {
        let fd = self.fd_arg(0)?;
        let buffer = self.ptr_arg(1)?;
        let size = self.arg(2)?;
        let buffer = args::validate_user_read(&*self.mem, buffer, size)?;
        let result = to_i32(size)?;

        let mut bounce = [0u8; CONSOLE_CHUNK];
        if fd == Fd::STDOUT {
            let mut done = 0u32;
            while done < size {
                let chunk = &mut bounce[..min((size - done) as usize, CONSOLE_CHUNK)];
                buffer.copy_to_kernel(&*self.mem, done, chunk)?;
                self.services.console.write_bytes(chunk);
                done += chunk.len() as u32;
            }
            return Ok(Action::Return(result));
        }
        if fd == Fd::STDIN {
            return Err(SyscallError::WrongDirection);
        }

        let fs = self.services.fs;
        let file = self.process.fds().lookup(fd)?;
        let mut done = 0u32;
        while done < size {
            let chunk = &mut bounce[..min((size - done) as usize, CONSOLE_CHUNK)];
            buffer.copy_to_kernel(&*self.mem, done, chunk)?;
            let wrote = min(fs.write(file, chunk) as usize, chunk.len());
            done += wrote as u32;
            if wrote < chunk.len() {
                break;
            }
        }
        Ok(Action::Return(to_i32(done)?))
    }

    fn sys_seek(&mut self) -> Result<Action, SyscallError> {
        let fd = self.fd_arg(0)?;
        let position = self.arg(1)?;
        match self.process.fds().lookup(fd) {
            Ok(file) => self.services.fs.seek(file, position),
            Err(err) => log::debug!("seek: {} ({})", fd, err),
        }
        Ok(Action::Resume)
    }

    fn sys_tell(&mut self) -> Result<Action, SyscallError> {
        let fd = self.fd_arg(0)?;
        let file = self.process.fds().lookup(fd)?;
        let position = self.services.fs.tell(file);
        Ok(Action::Return(to_i32(position)?))
    }

    fn sys_close(&mut self) -> Result<Action, SyscallError> {
        let fd = self.fd_arg(0)?;
        self.process.fds().close(self.services.fs, fd);
        Ok(Action::Resume)
    }
}
