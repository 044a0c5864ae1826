//! Terminal-State Guard — raw mode entry with guaranteed restoration.
//!
//! See spec.md §4.6. Must be the outermost scoped resource of any Attach
//! Session: the [`Drop`] impl is the safety net for every exit path,
//! including panics, but callers that can observe an error should prefer
//! the explicit [`TerminalGuard::restore`] so a `TerminalRestoreFailed`
//! error can be surfaced and made fatal (spec.md §7).

use std::os::fd::{AsRawFd, BorrowedFd, RawFd};

use nix::sys::termios::{self, SetArg, Termios};

use super::PtyError;

/// RAII guard that restores the controlling terminal's attributes on drop.
pub struct TerminalGuard {
    original: Termios,
    fd: RawFd,
}

impl TerminalGuard {
    /// Capture the current terminal attributes for `fd` and switch it to
    /// raw mode (no line buffering, no echo, no signal translation).
    pub fn enter_raw_mode(fd: impl AsRawFd) -> Result<Self, PtyError> {
        let raw_fd = fd.as_raw_fd();
        // SAFETY: raw_fd is the caller's controlling terminal, valid for
        // the lifetime of this guard.
        let borrowed = unsafe { BorrowedFd::borrow_raw(raw_fd) };

        let original = termios::tcgetattr(borrowed).map_err(PtyError::Terminal)?;

        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(borrowed, SetArg::TCSANOW, &raw).map_err(PtyError::Terminal)?;

        Ok(Self {
            original,
            fd: raw_fd,
        })
    }

    /// Explicitly restore the original attributes. Returns an error rather
    /// than swallowing it, so callers can promote a failure here to the
    /// fatal `TerminalRestoreFailed` class (spec.md §7).
    pub fn restore(&self) -> Result<(), PtyError> {
        // SAFETY: self.fd outlives the guard by construction.
        let borrowed = unsafe { BorrowedFd::borrow_raw(self.fd) };
        termios::tcsetattr(borrowed, SetArg::TCSADRAIN, &self.original).map_err(PtyError::Terminal)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // SAFETY: self.fd outlives the guard by construction.
        let borrowed = unsafe { BorrowedFd::borrow_raw(self.fd) };
        if let Err(e) = termios::tcsetattr(borrowed, SetArg::TCSADRAIN, &self.original) {
            eprintln!("WARNING: failed to restore terminal: {e}");
        }
    }
}
