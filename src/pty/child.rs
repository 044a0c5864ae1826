//! Child process spawning — PTY allocation, fork, exec.
//!
//! Isolates the `unsafe` fork/exec code from the rest of the supervisor.
//! See spec.md §4.1 (PTY Launcher).

use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd};

use nix::libc;
use nix::pty::openpty;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, execvp, fork, setsid};

use super::PtyError;

/// A spawned child process with its PTY master fd.
///
/// `master` is non-blocking (see [`spawn_child`]) and owned solely by this
/// handle — closing it is the caller's responsibility, exactly once, per
/// spec.md §3's descriptor-conservation invariant.
#[derive(Debug)]
pub struct ChildHandle {
    /// Child process PID.
    pub pid: Pid,
    /// Master side of the PTY pair (non-blocking).
    pub master: OwnedFd,
}

/// Spawn `argv` on a fresh PTY pair.
///
/// Allocates a master/slave pair, forks, binds the slave as the child's
/// stdin/stdout/stderr and controlling terminal, execs `argv[0]` with the
/// remaining elements as arguments, and returns the master fd in
/// non-blocking mode. `argv[0]` is resolved against `PATH`.
///
/// # Safety
///
/// Uses `fork()` internally. Only async-signal-safe operations run between
/// fork and exec/exit in the child branch.
pub fn spawn_child(argv: &[String]) -> Result<ChildHandle, PtyError> {
    if argv.is_empty() {
        return Err(PtyError::Exec("empty command".into()));
    }

    // Validate and prepare C strings before any resource allocation.
    let c_args: Vec<CString> = argv
        .iter()
        .map(|s| {
            CString::new(s.as_bytes())
                .map_err(|_| PtyError::Exec(format!("argument contains null byte: {s:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    // No explicit window size: the original wrapper never matched PTY
    // dimensions to the controlling terminal either (plain `pty.openpty()`),
    // and resize propagation is an explicit non-goal (spec.md §1, §9).
    let pty = openpty(None, None).map_err(PtyError::PtyAlloc)?;
    let master = pty.master;
    let slave = pty.slave;

    nix::fcntl::fcntl(
        &master,
        nix::fcntl::FcntlArg::F_SETFL(nix::fcntl::OFlag::O_NONBLOCK),
    )
    .map_err(PtyError::PtyAlloc)?;

    // SAFETY: between fork() and exec()/_exit(), only async-signal-safe
    // functions are called. All heap allocation happens before fork.
    match unsafe { fork() }.map_err(PtyError::Fork)? {
        ForkResult::Parent { child } => {
            drop(slave);
            Ok(ChildHandle { pid: child, master })
        }
        ForkResult::Child => {
            drop(master);

            if setsid().is_err() {
                unsafe { libc::_exit(1) };
            }

            let slave_fd = slave.as_raw_fd();
            if unsafe { libc::ioctl(slave_fd, libc::TIOCSCTTY, 0) } < 0 {
                unsafe { libc::_exit(1) };
            }

            if unsafe { libc::dup2(slave_fd, 0) } < 0
                || unsafe { libc::dup2(slave_fd, 1) } < 0
                || unsafe { libc::dup2(slave_fd, 2) } < 0
            {
                unsafe { libc::_exit(1) };
            }

            if slave_fd > 2 {
                drop(slave);
            } else {
                std::mem::forget(slave);
            }

            for fd in 3..1024 {
                unsafe { libc::close(fd) };
            }

            let _ = execvp(&c_args[0], &c_args);
            unsafe { libc::_exit(127) };
        }
    }
}

/// Non-blocking exit check.
///
/// Returns `Some(exit_code)` once the child has exited (128 + signal for
/// signal-terminated children, per the usual shell convention), or `None`
/// while it is still alive. Never blocks — this is what the Drain Loop and
/// the Attach Session's 100ms poll use to detect exit without a dedicated
/// reaper thread (spec.md §4.2, §5: single-threaded, no background
/// threads).
pub fn wait_nonblocking(pid: Pid) -> Result<Option<i32>, PtyError> {
    match waitpid(pid, Some(WaitPidFlag::WNOHANG)).map_err(PtyError::Signal)? {
        WaitStatus::Exited(_, code) => Ok(Some(code)),
        WaitStatus::Signaled(_, sig, _) => Ok(Some(128 + sig as i32)),
        _ => Ok(None),
    }
}

/// Replace the current process image with `argv`, never returning on
/// success. Used by `ForegroundExec` (spec.md §4.3): the supervisor process
/// itself becomes the child, inheriting the controlling terminal directly
/// rather than a PTY pair.
pub fn exec_replace(argv: &[String]) -> PtyError {
    let c_args: Vec<CString> = match argv
        .iter()
        .map(|s| {
            CString::new(s.as_bytes())
                .map_err(|_| PtyError::Exec(format!("argument contains null byte: {s:?}")))
        })
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(args) => args,
        Err(e) => return e,
    };
    if c_args.is_empty() {
        return PtyError::Exec("empty command".into());
    }
    match execvp(&c_args[0], &c_args) {
        Ok(never) => match never {},
        Err(e) => PtyError::Exec(format!("execvp failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_rejected() {
        let err = spawn_child(&[]).unwrap_err();
        assert!(matches!(err, PtyError::Exec(ref msg) if msg.contains("empty command")));
    }

    #[test]
    fn nul_byte_in_argument_rejected() {
        let cmd = vec!["echo".into(), "hello\0world".into()];
        let err = spawn_child(&cmd).unwrap_err();
        assert!(matches!(err, PtyError::Exec(ref msg) if msg.contains("null byte")));
    }

    #[test]
    fn spawn_true_exits_zero() {
        let child = spawn_child(&["true".into()]).unwrap();
        let code = loop {
            if let Some(code) = wait_nonblocking(child.pid).unwrap() {
                break code;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        };
        assert_eq!(code, 0);
    }

    #[test]
    fn spawn_false_exits_nonzero() {
        let child = spawn_child(&["false".into()]).unwrap();
        let code = loop {
            if let Some(code) = wait_nonblocking(child.pid).unwrap() {
                break code;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        };
        assert_eq!(code, 1);
    }

    #[test]
    fn nonexistent_command_exits_127() {
        let child = spawn_child(&["__duckymux_nonexistent_cmd_12345__".into()]).unwrap();
        let code = loop {
            if let Some(code) = wait_nonblocking(child.pid).unwrap() {
                break code;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        };
        assert_eq!(code, 127);
    }

    #[test]
    fn spawn_writes_to_master() {
        let child = spawn_child(&["sh".into(), "-c".into(), "echo hello".into()]).unwrap();

        let mut output = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            match nix::unistd::read(&child.master, &mut buf) {
                Ok(0) => break,
                Ok(n) => output.extend_from_slice(&buf[..n]),
                Err(nix::Error::EAGAIN) => {
                    if wait_nonblocking(child.pid).unwrap().is_some() {
                        while let Ok(n) = nix::unistd::read(&child.master, &mut buf) {
                            if n == 0 {
                                break;
                            }
                            output.extend_from_slice(&buf[..n]);
                        }
                        break;
                    }
                    std::thread::sleep(std::time::Duration::from_millis(20));
                }
                Err(nix::Error::EIO) => break,
                Err(e) => panic!("read error: {e}"),
            }
        }

        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("hello"), "got: {text:?}");
    }
}
