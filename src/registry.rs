//! Child identity, per-child bookkeeping, and the supervisor's registry.
//!
//! See spec.md §3 (Data Model). The registry is a `BTreeMap` rather than a
//! `HashMap` so the UI's child list and this module's sorted iteration are
//! the same ordering discovery already produced — no extra sort step.

use std::collections::BTreeMap;
use std::fmt;
use std::os::fd::{AsRawFd, BorrowedFd};

use nix::unistd::Pid;

use crate::pty::{ChildHandle, PtyError};

/// Opaque child identifier — the discovered program's file name. Unique
/// within one supervisor run (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChildName(String);

impl ChildName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChildName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Block size for non-blocking drain reads (spec.md §4.2).
const DRAIN_BLOCK_SIZE: usize = 4096;

/// Created exactly when a launch succeeds; destroyed exactly when the
/// supervisor observes the child has exited and has closed the master
/// descriptor (spec.md §3).
pub struct ChildRecord {
    name: ChildName,
    pid: Pid,
    master: nix::libc::c_int,
    // Keep the OwnedFd itself so it closes exactly once on drop if the
    // dispatcher ever forgets to, while `master` (a raw copy) is what the
    // drain/attach paths actually read and write.
    _master_owned: std::os::fd::OwnedFd,
    /// Append-only byte accumulator holding everything read from the
    /// master while no Attach Session is active for this record.
    output_buffer: Vec<u8>,
}

impl ChildRecord {
    pub(crate) fn new(name: ChildName, handle: ChildHandle) -> Self {
        let master = handle.master.as_raw_fd();
        Self {
            name,
            pid: handle.pid,
            master,
            _master_owned: handle.master,
            output_buffer: Vec::new(),
        }
    }

    pub fn name(&self) -> &ChildName {
        &self.name
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    fn master_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: `_master_owned` keeps the descriptor alive for the
        // lifetime of this record; this is a non-owning borrow of it.
        unsafe { BorrowedFd::borrow_raw(self.master) }
    }

    /// Read up to [`DRAIN_BLOCK_SIZE`] bytes at a time from the master
    /// descriptor into the accumulator until the read would block, hits
    /// EOF, or errors. Would-block and EOF are not errors — they terminate
    /// the pass cleanly (spec.md §4.2). EOF is reported back to the caller
    /// so it can decide whether to treat it as exit, since a record alone
    /// cannot mutate the registry (spec.md §4.5).
    pub fn drain_into_buffer(&mut self) -> Result<DrainOutcome, PtyError> {
        let mut buf = [0u8; DRAIN_BLOCK_SIZE];
        loop {
            match nix::unistd::read(&self.master_fd(), &mut buf) {
                Ok(0) => return Ok(DrainOutcome::Eof),
                Ok(n) => self.output_buffer.extend_from_slice(&buf[..n]),
                Err(nix::Error::EAGAIN) => return Ok(DrainOutcome::WouldBlock),
                Err(nix::Error::EIO) => return Ok(DrainOutcome::Eof),
                Err(e) => return Err(PtyError::Io(std::io::Error::from_raw_os_error(e as i32))),
            }
        }
    }

    /// Drain the accumulator by reference, leaving it empty. Called at
    /// Attach Session entry to flush everything produced while detached
    /// (spec.md §4.4 step 4).
    pub fn take_buffered_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output_buffer)
    }

    pub fn has_buffered_output(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    /// Borrowed master descriptor for the Attach Session's relay loop.
    pub fn master(&self) -> BorrowedFd<'_> {
        self.master_fd()
    }
}

/// Outcome of one [`ChildRecord::drain_into_buffer`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No more data available without blocking; pass terminated cleanly.
    WouldBlock,
    /// Master descriptor hit EOF (or EIO, the PTY-closed equivalent) —
    /// the caller should treat this child as gone.
    Eof,
}

/// Mapping ChildName → ChildRecord. A ChildName is present iff its child
/// is believed running; reaped entries are removed (spec.md §3). The only
/// component allowed to mutate this is the Supervisor Dispatcher (spec.md
/// §4.5) — this type has no knowledge of that rule, it just holds the map.
#[derive(Default)]
pub struct Registry {
    children: BTreeMap<ChildName, ChildRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &ChildName) -> bool {
        self.children.contains_key(name)
    }

    pub fn get_mut(&mut self, name: &ChildName) -> Option<&mut ChildRecord> {
        self.children.get_mut(name)
    }

    pub fn get(&self, name: &ChildName) -> Option<&ChildRecord> {
        self.children.get(name)
    }

    /// Insert a freshly launched record. Two children sharing a name is
    /// impossible given filesystem uniqueness (spec.md §9) but would be a
    /// logic error elsewhere in the supervisor, so it's asserted here
    /// rather than silently overwriting.
    pub fn insert(&mut self, record: ChildRecord) {
        debug_assert!(
            !self.children.contains_key(&record.name),
            "duplicate child name inserted into registry: {}",
            record.name
        );
        self.children.insert(record.name.clone(), record);
    }

    pub fn remove(&mut self, name: &ChildName) -> Option<ChildRecord> {
        self.children.remove(name)
    }

    /// Iterate children in sorted name order (the ordering the UI wants).
    pub fn iter(&self) -> impl Iterator<Item = (&ChildName, &ChildRecord)> {
        self.children.iter()
    }

    /// Mutable iteration, used by the Drain Loop to append to each
    /// record's accumulator in place.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ChildName, &mut ChildRecord)> {
        self.children.iter_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &ChildName> {
        self.children.keys()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::spawn_child;

    fn spawn_sleeper() -> ChildRecord {
        let handle = spawn_child(&["sleep".into(), "5".into()]).unwrap();
        ChildRecord::new(ChildName::new("sleeper"), handle)
    }

    #[test]
    fn registry_insert_contains_remove() {
        let mut reg = Registry::new();
        assert!(reg.is_empty());
        let record = spawn_sleeper();
        let name = record.name().clone();
        reg.insert(record);
        assert!(reg.contains(&name));
        assert_eq!(reg.len(), 1);
        let removed = reg.remove(&name);
        assert!(removed.is_some());
        assert!(!reg.contains(&name));
    }

    #[test]
    fn fresh_record_has_empty_buffer() {
        let record = spawn_sleeper();
        assert!(!record.has_buffered_output());
        nix::sys::signal::kill(record.pid(), nix::sys::signal::Signal::SIGKILL).unwrap();
    }

    #[test]
    fn drain_accumulates_output_in_order() {
        let handle = spawn_child(&["sh".into(), "-c".into(), "echo one; echo two".into()])
            .unwrap();
        let mut record = ChildRecord::new(ChildName::new("echoer"), handle);

        // Give the child a moment to write and exit.
        std::thread::sleep(std::time::Duration::from_millis(100));

        loop {
            match record.drain_into_buffer().unwrap() {
                DrainOutcome::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                }
                DrainOutcome::Eof => break,
            }
        }

        let buffered = record.take_buffered_output();
        let text = String::from_utf8_lossy(&buffered);
        assert!(text.contains("one"));
        assert!(text.contains("two"));
        assert!(text.find("one").unwrap() < text.find("two").unwrap());
        assert!(!record.has_buffered_output());
    }

    #[test]
    fn names_are_sorted() {
        let mut reg = Registry::new();
        for n in ["zebra", "apple", "mango"] {
            let handle = spawn_child(&["sleep".into(), "5".into()]).unwrap();
            reg.insert(ChildRecord::new(ChildName::new(n), handle));
        }
        let names: Vec<&str> = reg.names().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["apple", "mango", "zebra"]);
        for (_, record) in reg.iter() {
            let _ = nix::sys::signal::kill(record.pid(), nix::sys::signal::Signal::SIGKILL);
        }
    }
}
