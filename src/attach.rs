//! Attach Session — the bidirectional terminal/PTY relay and its escape
//! automaton. See spec.md §4.4, the central algorithm of this crate.

use std::io::{self, Write};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use crate::pty::{PtyError, TerminalGuard, wait_nonblocking};
use crate::registry::ChildRecord;

/// Reserved escape-prefix byte (spec.md §4.4).
pub const ESC1: u8 = 0x04;
/// Reserved escape-confirm byte — ESC1 ESC2 detaches.
pub const ESC2: u8 = 0x18;

/// Bounded readiness-wait timeout so the relay loop can re-check child
/// liveness without blocking indefinitely (spec.md §5).
const POLL_TIMEOUT_MS: u16 = 100;
const RELAY_BLOCK_SIZE: usize = 4096;

/// Result of one byte fed through the escape automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeAction {
    /// Forward this byte to the child unmodified.
    Forward(u8),
    /// Consume the byte without forwarding anything (arming the prefix).
    Swallow,
    /// ESC1 ESC2 matched — detach without forwarding anything.
    Detach,
}

/// Two-byte escape sequence recognizer (spec.md §4.4 table).
///
/// The "armed=true, any other byte" row discards the initial ESC1 and
/// forwards only the subsequent byte. This matches the original
/// implementation's observed behavior exactly (see SPEC_FULL.md §9,
/// open question 1) — it is not an omission.
pub fn step_escape_automaton(armed: bool, byte: u8) -> (EscapeAction, bool) {
    match (armed, byte) {
        (false, ESC1) => (EscapeAction::Swallow, true),
        (false, other) => (EscapeAction::Forward(other), false),
        (true, ESC1) => (EscapeAction::Forward(ESC1), false),
        (true, ESC2) => (EscapeAction::Detach, false),
        (true, other) => (EscapeAction::Forward(other), false),
    }
}

/// Why the relay loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The operator sent the detach sequence; the child is still running.
    Detached,
    /// The child's exit was observed while attached.
    ChildExited { exit_code: i32 },
}

/// Transient per-session state: the escape automaton's arming bit. Exists
/// only for the lifetime of one Attach Session (spec.md §3, AttachState).
struct AttachState {
    escape_armed: bool,
}

/// Run an Attach Session against `record` until detach or child exit.
///
/// The caller is responsible for tearing down any other UI before calling
/// this (spec.md §4.4 step 2) and for re-checking the child's liveness
/// afterward to update the registry (spec.md §4.3) — this function never
/// touches the registry itself (spec.md §4.5).
///
/// `stdin_fd`/`stdout` are the controlling terminal's input and output.
/// `_terminal_guard` is held only to document that raw mode must already
/// be active and be the outermost scope; restoration happens through the
/// guard's own `Drop`/`restore`, not here.
pub fn run_attach_session(
    record: &mut ChildRecord,
    stdin_fd: std::os::fd::RawFd,
    stdout: &mut impl Write,
    _terminal_guard: &TerminalGuard,
) -> Result<AttachOutcome, PtyError> {
    let mut state = AttachState {
        escape_armed: false,
    };

    // Step 4: flush anything accumulated while detached.
    let buffered = record.take_buffered_output();
    if !buffered.is_empty() {
        stdout.write_all(&buffered).map_err(PtyError::Io)?;
        stdout.flush().map_err(PtyError::Io)?;
    }

    let pid = record.pid();
    let master = record.master();
    // SAFETY: stdin_fd is the controlling terminal's stdin, valid for the
    // lifetime of this function call.
    let stdin = unsafe { BorrowedFd::borrow_raw(stdin_fd) };

    let mut buf = [0u8; RELAY_BLOCK_SIZE];

    loop {
        // Exit path 2: child died between iterations.
        if let Some(exit_code) = wait_nonblocking(pid)? {
            drain_remaining_to_terminal(&master, stdout)?;
            return Ok(AttachOutcome::ChildExited { exit_code });
        }

        let mut fds = [
            PollFd::new(stdin, PollFlags::POLLIN),
            PollFd::new(master, PollFlags::POLLIN),
        ];
        match poll(&mut fds, PollTimeout::from(POLL_TIMEOUT_MS)) {
            Ok(_) => {}
            Err(nix::Error::EINTR) => continue,
            Err(e) => return Err(PtyError::Io(io::Error::from_raw_os_error(e as i32))),
        }

        let master_ready = fds[1]
            .revents()
            .is_some_and(|r| r.contains(PollFlags::POLLIN));
        let stdin_ready = fds[0]
            .revents()
            .is_some_and(|r| r.contains(PollFlags::POLLIN));

        if master_ready {
            match nix::unistd::read(&master, &mut buf) {
                Ok(0) => {
                    // Master EOF: child is gone or about to be reaped.
                    if let Some(exit_code) = wait_nonblocking(pid)? {
                        return Ok(AttachOutcome::ChildExited { exit_code });
                    }
                }
                Ok(n) => {
                    stdout.write_all(&buf[..n]).map_err(PtyError::Io)?;
                    stdout.flush().map_err(PtyError::Io)?;
                }
                Err(nix::Error::EAGAIN) => {}
                Err(e) => return Err(PtyError::Io(io::Error::from_raw_os_error(e as i32))),
            }
        }

        if stdin_ready {
            let mut one = [0u8; 1];
            match nix::unistd::read(&stdin, &mut one) {
                Ok(0) => {}
                Ok(_) => {
                    let (action, next_armed) = step_escape_automaton(state.escape_armed, one[0]);
                    state.escape_armed = next_armed;
                    match action {
                        EscapeAction::Forward(byte) => {
                            write_all_to_fd(&master, &[byte])?;
                        }
                        EscapeAction::Swallow => {}
                        EscapeAction::Detach => return Ok(AttachOutcome::Detached),
                    }
                }
                Err(nix::Error::EAGAIN) => {}
                Err(e) => return Err(PtyError::Io(io::Error::from_raw_os_error(e as i32))),
            }
        }
    }
}

/// Best-effort drain of whatever is still readable once exit is observed,
/// so the operator sees trailing output before the "[Process exited]"
/// notice (spec.md §4.4 exit path 2).
fn drain_remaining_to_terminal(
    master: &BorrowedFd<'_>,
    stdout: &mut impl Write,
) -> Result<(), PtyError> {
    let mut buf = [0u8; RELAY_BLOCK_SIZE];
    loop {
        match nix::unistd::read(master, &mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let _ = stdout.write_all(&buf[..n]);
            }
            Err(_) => break,
        }
    }
    let _ = stdout.flush();
    Ok(())
}

fn write_all_to_fd(fd: &BorrowedFd<'_>, mut data: &[u8]) -> Result<(), PtyError> {
    while !data.is_empty() {
        match nix::unistd::write(fd, data) {
            Ok(n) => data = &data[n..],
            Err(nix::Error::EINTR) => continue,
            Err(nix::Error::EAGAIN) => std::thread::sleep(Duration::from_millis(1)),
            Err(e) => return Err(PtyError::Io(io::Error::from_raw_os_error(e as i32))),
        }
    }
    Ok(())
}
