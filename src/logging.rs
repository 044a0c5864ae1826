//! Diagnostic log setup. See spec.md §6: "errors during launch and drain
//! are appended to a line-oriented diagnostic log... exact schema is not
//! part of the contract." Defaults to stderr; `--log-file` switches to a
//! non-rotating file appender, grounded on the teacher's subscriber setup
//! (`main.rs`) and `visiquate-cco`'s `init_daemon_logging` file-writer
//! pattern (the teacher itself only ever logs to stderr).

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber. Returns the file appender's
/// guard when logging to a file — it must be kept alive for the process
/// lifetime or buffered lines are lost on exit.
pub fn init(log_file: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    match log_file {
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            None
        }
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path.file_name().unwrap_or_else(|| path.as_os_str());
            let appender = match dir {
                Some(dir) => tracing_appender::rolling::never(dir, file_name),
                None => tracing_appender::rolling::never(".", file_name),
            };
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            Some(guard)
        }
    }
}
