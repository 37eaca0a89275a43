//! Test doubles for the external collaborators, plus a rig that lays out
//! system-call frames on a simulated user stack.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::config::{PAGE_SIZE, PHYS_BASE};
use crate::drivers::Console;
use crate::fs::FileSystem;
use crate::mm::{read_byte, write_byte, AddressSpace, PageFlags, UserAddr};
use crate::process::{Machine, Pid, ProcessContext, ProcessManager};
use crate::syscall::{dispatch, Services, TrapOutcome};
use crate::trap::IntrFrame;

/// Console that records every `write_bytes` call and replays scripted keys.
#[derive(Default)]
pub struct MockConsole {
    writes: Mutex<Vec<Vec<u8>>>,
    keys: Mutex<VecDeque<u8>>,
    polls: Mutex<usize>,
}

impl MockConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(keys: &[u8]) -> Self {
        let console = Self::new();
        console.keys.lock().extend(keys.iter().copied());
        console
    }

    pub fn output(&self) -> Vec<u8> {
        self.writes.lock().concat()
    }

    pub fn write_sizes(&self) -> Vec<usize> {
        self.writes.lock().iter().map(Vec::len).collect()
    }

    pub fn clear(&self) {
        self.writes.lock().clear();
    }

    pub fn key_polls(&self) -> usize {
        *self.polls.lock()
    }
}

impl Console for MockConsole {
    fn write_bytes(&self, buf: &[u8]) {
        self.writes.lock().push(buf.to_vec());
    }

    fn read_key(&self) -> u8 {
        *self.polls.lock() += 1;
        self.keys.lock().pop_front().expect("keyboard queue empty")
    }
}

/// An open file in `MockFs`.
#[derive(Debug)]
pub struct MockFile {
    data: Arc<Mutex<Vec<u8>>>,
    pos: u32,
}

/// In-memory flat filesystem. Files never grow past their created size.
#[derive(Default)]
pub struct MockFs {
    files: Mutex<BTreeMap<String, Arc<Mutex<Vec<u8>>>>>,
    open_handles: Mutex<usize>,
    close_calls: Mutex<usize>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(name: &str, contents: &[u8]) -> Self {
        let fs = Self::new();
        fs.files
            .lock()
            .insert(String::from(name), Arc::new(Mutex::new(contents.to_vec())));
        fs
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().get(name).map(|data| data.lock().clone())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    pub fn open_handles(&self) -> usize {
        *self.open_handles.lock()
    }

    pub fn close_calls(&self) -> usize {
        *self.close_calls.lock()
    }
}

impl FileSystem for MockFs {
    type Handle = MockFile;

    fn create(&self, name: &str, initial_size: u32) -> bool {
        let mut files = self.files.lock();
        if name.is_empty() || files.contains_key(name) {
            return false;
        }
        files.insert(
            String::from(name),
            Arc::new(Mutex::new(vec![0; initial_size as usize])),
        );
        true
    }

    fn open(&self, name: &str) -> Option<MockFile> {
        let data = self.files.lock().get(name).cloned()?;
        *self.open_handles.lock() += 1;
        Some(MockFile { data, pos: 0 })
    }

    fn remove(&self, name: &str) -> bool {
        self.files.lock().remove(name).is_some()
    }

    fn read(&self, file: &mut MockFile, buf: &mut [u8]) -> u32 {
        let data = file.data.lock();
        let start = (file.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        file.pos += n as u32;
        n as u32
    }

    fn write(&self, file: &mut MockFile, buf: &[u8]) -> u32 {
        let mut data = file.data.lock();
        let start = (file.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        data[start..start + n].copy_from_slice(&buf[..n]);
        file.pos += n as u32;
        n as u32
    }

    fn seek(&self, file: &mut MockFile, position: u32) {
        file.pos = position;
    }

    fn tell(&self, file: &MockFile) -> u32 {
        file.pos
    }

    fn length(&self, file: &MockFile) -> u32 {
        file.data.lock().len() as u32
    }

    fn close(&self, file: MockFile) {
        drop(file);
        *self.open_handles.lock() -= 1;
        *self.close_calls.lock() += 1;
    }
}

/// Process manager with scripted children.
///
/// `exec` of a command whose program name starts with `missing` fails;
/// anything else becomes a child whose exit status is its pid times ten.
#[derive(Default)]
pub struct MockProcesses {
    next_pid: Mutex<i32>,
    children: Mutex<BTreeMap<i32, i32>>,
    started: Mutex<Vec<String>>,
    terminated: Mutex<usize>,
}

impl MockProcesses {
    pub fn new() -> Self {
        Self {
            next_pid: Mutex::new(100),
            ..Self::default()
        }
    }

    pub fn add_child(&self, pid: i32, status: i32) {
        self.children.lock().insert(pid, status);
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn terminated(&self) -> usize {
        *self.terminated.lock()
    }
}

impl ProcessManager for MockProcesses {
    fn start_process(&self, cmd_line: &str) -> Option<Pid> {
        self.started.lock().push(String::from(cmd_line));
        if cmd_line.starts_with("missing") {
            return None;
        }
        let mut next = self.next_pid.lock();
        let pid = *next;
        *next += 1;
        self.children.lock().insert(pid, pid * 10);
        Some(Pid(pid))
    }

    fn wait_for(&self, pid: Pid) -> Option<i32> {
        self.children.lock().remove(&pid.0)
    }

    fn terminate_current(&self) {
        *self.terminated.lock() += 1;
    }
}

#[derive(Default)]
pub struct MockMachine {
    powered_off: Mutex<bool>,
}

impl MockMachine {
    pub fn powered_off(&self) -> bool {
        *self.powered_off.lock()
    }
}

impl Machine for MockMachine {
    fn power_off(&self) {
        *self.powered_off.lock() = true;
    }
}

/// Start of the user data pages in every rig.
pub const DATA: u32 = 0x0804_8000;
/// Number of mapped data pages.
pub const DATA_PAGES: u32 = 4;
/// A read-only page right after the data pages.
pub const RODATA: u32 = DATA + DATA_PAGES * PAGE_SIZE;
/// Where the rig places the call number.
pub const STACK_ESP: u32 = PHYS_BASE - 0x100;

/// One user process plus its collaborators.
pub struct Rig {
    pub fs: MockFs,
    pub console: MockConsole,
    pub processes: MockProcesses,
    pub machine: MockMachine,
    pub space: AddressSpace,
    pub process: ProcessContext<MockFile>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with(MockFs::new(), MockConsole::new())
    }

    pub fn with(fs: MockFs, console: MockConsole) -> Self {
        let mut space = AddressSpace::new();
        space
            .map(UserAddr::new(PHYS_BASE - PAGE_SIZE), PageFlags::USER_RW)
            .unwrap();
        space
            .map_range(UserAddr::new(DATA), DATA_PAGES, PageFlags::USER_RW)
            .unwrap();
        space
            .map(UserAddr::new(RODATA), PageFlags::USER_RO)
            .unwrap();
        Self {
            fs,
            console,
            processes: MockProcesses::new(),
            machine: MockMachine::default(),
            space,
            process: ProcessContext::new("test"),
        }
    }

    pub fn poke(&mut self, addr: u32, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            write_byte(&mut self.space, UserAddr::new(addr + i as u32), b).unwrap();
        }
    }

    pub fn peek(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| read_byte(&self.space, UserAddr::new(addr + i as u32)).unwrap())
            .collect()
    }

    /// Store a NUL-terminated string at `addr`.
    pub fn put_str(&mut self, addr: u32, s: &str) {
        self.poke(addr, s.as_bytes());
        self.poke(addr + s.len() as u32, &[0]);
    }

    /// Trap with the frame at an arbitrary `esp`, stack contents untouched.
    pub fn trap_at(&mut self, esp: u32) -> (TrapOutcome, IntrFrame) {
        let services = Services {
            fs: &self.fs,
            console: &self.console,
            processes: &self.processes,
            machine: &self.machine,
        };
        let mut frame = IntrFrame::new(esp);
        frame.eax = 0xDEAD_BEEF;
        let outcome = dispatch(services, &mut frame, &mut self.process, &mut self.space);
        (outcome, frame)
    }

    /// Push `nr` and `args` at `STACK_ESP` and trap.
    pub fn syscall(&mut self, nr: u32, args: &[u32]) -> (TrapOutcome, IntrFrame) {
        let mut words = vec![nr];
        words.extend_from_slice(args);
        for (i, word) in words.iter().enumerate() {
            self.poke(STACK_ESP + 4 * i as u32, &word.to_le_bytes());
        }
        self.trap_at(STACK_ESP)
    }

    /// Trap and expect the caller to resume; returns the result register.
    pub fn call(&mut self, nr: u32, args: &[u32]) -> i32 {
        let (outcome, frame) = self.syscall(nr, args);
        assert_eq!(outcome, TrapOutcome::Resume);
        frame.result()
    }
}
