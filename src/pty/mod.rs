//! PTY layer — allocation, fork/exec, and terminal raw-mode control.
//!
//! Isolates the `unsafe` fork/exec code and termios manipulation from the
//! rest of the supervisor. See spec.md §4.1 (PTY Launcher) and §4.6
//! (Terminal-State Guard).

mod child;
mod terminal;

use std::io;

pub use child::{ChildHandle, exec_replace, spawn_child, wait_nonblocking};
pub use terminal::TerminalGuard;

/// PTY-layer errors. Scoped to allocation, spawn, and terminal-mode
/// failures — everything that crosses the dispatcher boundary is wrapped
/// into [`crate::error::SupervisorError`].
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("PTY allocation failed: {0}")]
    PtyAlloc(nix::Error),
    #[error("fork failed: {0}")]
    Fork(nix::Error),
    #[error("exec failed: {0}")]
    Exec(String),
    #[error("terminal error: {0}")]
    Terminal(nix::Error),
    #[error("signal error: {0}")]
    Signal(nix::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
