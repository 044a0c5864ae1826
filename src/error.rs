//! Crate-level error taxonomy. See spec.md §7.
//!
//! `pty::PtyError` stays scoped to the PTY layer (alloc/fork/exec/terminal/
//! signal); this wraps it for everything that crosses the Dispatcher
//! boundary, mirroring how the teacher's daemon/client/hotkey modules each
//! wrap `PtyError`/IO errors into their own top-level error type.
use crate::pty::PtyError;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// PTY allocation, spawn, or descriptor-flag failure (spec.md §4.1).
    /// Surfaced to the operator; not fatal to the supervisor.
    #[error("launch failed: {0}")]
    LaunchFailed(#[source] PtyError),

    /// The `apps/` directory is missing or unreadable at startup.
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// Restoring the controlling terminal's attributes failed. Always
    /// fatal (spec.md §7).
    #[error("failed to restore terminal: {0}")]
    TerminalRestoreFailed(#[source] PtyError),

    #[error(transparent)]
    Pty(#[from] PtyError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
