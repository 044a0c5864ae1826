//! Supervisor Loop & Dispatcher: owns the registry, executes commands from
//! the UI collaborator, runs the Background Drain Loop, and performs
//! teardown. See spec.md §4.2 (Drain Loop), §4.3 (Dispatcher), §4.5
//! (Registry-and-Reap interaction — this module is the only mutator).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};

use crate::attach::{AttachOutcome, run_attach_session};
use crate::config::Config;
use crate::discovery::{child_name_for, discover_apps};
use crate::error::SupervisorError;
use crate::pty::{self, PtyError, TerminalGuard, spawn_child};
use crate::registry::{ChildName, ChildRecord, DrainOutcome, Registry};

/// Grace period between soft-terminate and hard-kill (spec.md §4.3).
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(2);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One discovered child: its registry name and on-disk path.
#[derive(Debug, Clone)]
pub struct AppEntry {
    pub name: ChildName,
    pub path: PathBuf,
}

/// Abstract command stream from the UI collaborator (spec.md §4.3, §6).
#[derive(Debug, Clone)]
pub enum Command {
    Start(ChildName),
    Stop(ChildName),
    Attach(ChildName),
    ForegroundExec(ChildName),
    Quit,
}

/// Outcome of dispatching one non-terminal command, for the UI to render.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Started,
    StartFailed(String),
    Stopped,
    NoSuchChild,
    Attached { child_exited: bool },
}

pub struct Supervisor {
    registry: Registry,
    config: Config,
    apps: Vec<AppEntry>,
}

impl Supervisor {
    /// Discover apps and build the supervisor. Fails the same way
    /// `discover_apps` fails — a missing/unreadable `apps/` directory is
    /// `UnsupportedEnvironment`, fatal at startup (spec.md §7).
    pub fn new(config: Config) -> Result<Self, SupervisorError> {
        let paths = discover_apps(&config.apps_dir, &config.extension)?;
        let apps = paths
            .into_iter()
            .filter_map(|path| {
                child_name_for(&path).map(|name| AppEntry {
                    name: ChildName::new(name),
                    path,
                })
            })
            .collect();
        Ok(Self {
            registry: Registry::new(),
            config,
            apps,
        })
    }

    pub fn apps(&self) -> &[AppEntry] {
        &self.apps
    }

    pub fn is_running(&self, name: &ChildName) -> bool {
        self.registry.contains(name)
    }

    fn path_for(&self, name: &ChildName) -> Option<&Path> {
        self.apps
            .iter()
            .find(|entry| &entry.name == name)
            .map(|entry| entry.path.as_path())
    }

    /// `Start(name)`: if not in registry, invoke the Launcher; on success
    /// insert the record (spec.md §4.3).
    pub fn start(&mut self, name: &ChildName) -> Result<bool, SupervisorError> {
        if self.registry.contains(name) {
            return Ok(false);
        }
        let Some(path) = self.path_for(name) else {
            return Ok(false);
        };
        let argv = self.config.argv_for(name.as_str(), path);
        match spawn_child(&argv) {
            Ok(handle) => {
                self.registry
                    .insert(ChildRecord::new(name.clone(), handle));
                Ok(true)
            }
            Err(e) => {
                tracing::error!(child = %name, error = %e, "launch failed");
                Err(SupervisorError::LaunchFailed(e))
            }
        }
    }

    /// `Stop(name)`: soft-terminate, wait up to the grace period,
    /// hard-kill if still alive, close the master descriptor, remove the
    /// entry. Idempotent if absent (spec.md §4.3).
    pub fn stop(&mut self, name: &ChildName) -> bool {
        let Some(record) = self.registry.get(name) else {
            return false;
        };
        let pid = record.pid();

        let _ = signal::kill(pid, Signal::SIGTERM);

        let deadline = std::time::Instant::now() + STOP_GRACE_PERIOD;
        let exited = loop {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => break true,
                _ => {}
            }
            if std::time::Instant::now() >= deadline {
                break false;
            }
            std::thread::sleep(STOP_POLL_INTERVAL);
        };

        if !exited {
            let _ = signal::kill(pid, Signal::SIGKILL);
            let _ = waitpid(pid, None);
        }

        // The record's OwnedFd closes the master on drop when removed.
        self.registry.remove(name);
        true
    }

    /// Drain pass over every live entry: reap exited children, or read
    /// whatever is available without blocking into the accumulator
    /// (spec.md §4.2). The attached child, if any, is excluded by the
    /// caller — the relay loop owns its I/O while attached (spec.md §5).
    pub fn drain_tick(&mut self, skip: Option<&ChildName>) {
        let to_reap: Vec<ChildName> = {
            let mut reap = Vec::new();
            for (name, record) in self.registry.iter() {
                if Some(name) == skip {
                    continue;
                }
                if pty::wait_nonblocking(record.pid())
                    .ok()
                    .flatten()
                    .is_some()
                {
                    reap.push(name.clone());
                }
            }
            reap
        };

        for name in &to_reap {
            self.registry.remove(name);
        }

        for (name, record) in self.registry.iter_mut() {
            if Some(name) == skip {
                continue;
            }
            match record.drain_into_buffer() {
                Ok(DrainOutcome::WouldBlock) => {}
                Ok(DrainOutcome::Eof) => {
                    // Will be reaped on the next tick once wait_nonblocking
                    // observes the exit; nothing further to do now.
                }
                Err(e) => {
                    tracing::warn!(child = %name, error = %e, "drain I/O error");
                }
            }
        }
    }

    /// `Attach(name)`: ensure the child is running, enter an Attach
    /// Session, then re-check liveness on return (spec.md §4.3).
    pub fn attach(
        &mut self,
        name: &ChildName,
        stdin_fd: std::os::fd::RawFd,
        stdout: &mut impl Write,
    ) -> Result<DispatchOutcome, SupervisorError> {
        if !self.registry.contains(name) {
            if !self.start(name)? {
                return Ok(DispatchOutcome::NoSuchChild);
            }
        }

        let guard = TerminalGuard::enter_raw_mode(std::io::stdin())?;

        let outcome = {
            let Some(record) = self.registry.get_mut(name) else {
                return Ok(DispatchOutcome::NoSuchChild);
            };
            run_attach_session(record, stdin_fd, stdout, &guard)?
        };

        guard.restore().map_err(SupervisorError::TerminalRestoreFailed)?;

        match outcome {
            AttachOutcome::Detached => Ok(DispatchOutcome::Attached { child_exited: false }),
            AttachOutcome::ChildExited { exit_code } => {
                tracing::info!(child = %name, exit_code, "child exited while attached");
                self.registry.remove(name);
                Ok(DispatchOutcome::Attached { child_exited: true })
            }
        }
    }

    /// `ForegroundExec(name)`: stop every other entry, then replace this
    /// process image with a fresh invocation of `name`. Non-returning on
    /// success (spec.md §4.3) — any caller-side state outside the kernel
    /// is discarded.
    pub fn foreground_exec(&mut self, name: &ChildName) -> Result<PtyError, SupervisorError> {
        let others: Vec<ChildName> = self
            .registry
            .names()
            .filter(|n| *n != name)
            .cloned()
            .collect();
        for other in &others {
            self.stop(other);
        }
        self.stop(name);

        let Some(path) = self.path_for(name) else {
            return Ok(PtyError::Exec(format!("no such app: {name}")));
        };
        let argv = self.config.argv_for(name.as_str(), path);
        Ok(pty::exec_replace(&argv))
    }

    /// `Quit`: stop every entry, then return for the caller to exit.
    pub fn quit(&mut self) {
        let names: Vec<ChildName> = self.registry.names().cloned().collect();
        for name in &names {
            self.stop(name);
        }
    }

    pub fn dispatch(
        &mut self,
        command: Command,
        stdin_fd: std::os::fd::RawFd,
        stdout: &mut impl Write,
    ) -> Result<Option<DispatchOutcome>, SupervisorError> {
        match command {
            Command::Start(name) => match self.start(&name) {
                Ok(true) => Ok(Some(DispatchOutcome::Started)),
                Ok(false) => Ok(Some(DispatchOutcome::NoSuchChild)),
                Err(e) => Ok(Some(DispatchOutcome::StartFailed(e.to_string()))),
            },
            Command::Stop(name) => {
                let stopped = self.stop(&name);
                Ok(Some(if stopped {
                    DispatchOutcome::Stopped
                } else {
                    DispatchOutcome::NoSuchChild
                }))
            }
            Command::Attach(name) => self.attach(&name, stdin_fd, stdout).map(Some),
            Command::ForegroundExec(name) => {
                let err = self.foreground_exec(&name)?;
                Err(SupervisorError::Pty(err))
            }
            Command::Quit => {
                self.quit();
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::spawn_child;
    use crate::registry::ChildRecord;
    use std::collections::HashMap;

    fn test_config() -> Config {
        Config {
            apps_dir: PathBuf::from("apps"),
            extension: ".py".into(),
            default_interpreter: "python3".into(),
            interpreter_overrides: HashMap::new(),
            log_file: None,
            use_color: false,
        }
    }

    /// Build a `Supervisor` directly from already-spawned records, bypassing
    /// `discover_apps`/`Supervisor::new` — these tests exercise the
    /// Dispatcher and Drain Loop against real child processes, the way
    /// `pty::child::tests` exercises `spawn_child` directly (spec.md §8;
    /// the reference scenarios stop/quit/drain a running child).
    fn supervisor_with(records: Vec<ChildRecord>) -> Supervisor {
        let mut registry = Registry::new();
        for record in records {
            registry.insert(record);
        }
        Supervisor {
            registry,
            config: test_config(),
            apps: Vec::new(),
        }
    }

    #[test]
    fn stop_soft_terminates_a_cooperative_child_quickly() {
        let handle = spawn_child(&["sleep".into(), "5".into()]).unwrap();
        let name = ChildName::new("sleeper");
        let mut supervisor = supervisor_with(vec![ChildRecord::new(name.clone(), handle)]);

        let start = std::time::Instant::now();
        assert!(supervisor.stop(&name));
        let elapsed = start.elapsed();

        assert!(!supervisor.is_running(&name));
        // `sleep` honors SIGTERM immediately; well under the grace period.
        assert!(elapsed < STOP_GRACE_PERIOD, "took {elapsed:?}");
    }

    #[test]
    fn stop_waits_out_the_grace_period_then_hard_kills_a_stubborn_child() {
        // A busy loop rather than `sleep` in a forked grandchild: the trap
        // only disarms SIGTERM for this `sh` process itself, and a separate
        // `sleep` child wouldn't inherit it, so it would survive the kill.
        let handle = spawn_child(&[
            "sh".into(),
            "-c".into(),
            "trap '' TERM; while true; do :; done".into(),
        ])
        .unwrap();
        let name = ChildName::new("stubborn");
        let mut supervisor = supervisor_with(vec![ChildRecord::new(name.clone(), handle)]);

        let start = std::time::Instant::now();
        assert!(supervisor.stop(&name));
        let elapsed = start.elapsed();

        assert!(!supervisor.is_running(&name));
        assert!(elapsed >= STOP_GRACE_PERIOD, "hard-kill fired early: {elapsed:?}");
        assert!(elapsed < STOP_GRACE_PERIOD + Duration::from_secs(2), "took {elapsed:?}");
    }

    #[test]
    fn stop_is_idempotent_on_an_absent_child() {
        let mut supervisor = supervisor_with(Vec::new());
        assert!(!supervisor.stop(&ChildName::new("nobody")));
    }

    #[test]
    fn quit_stops_every_registered_child_within_a_few_seconds() {
        let h1 = spawn_child(&["sleep".into(), "5".into()]).unwrap();
        let h2 = spawn_child(&["sleep".into(), "5".into()]).unwrap();
        let n1 = ChildName::new("one");
        let n2 = ChildName::new("two");
        let mut supervisor = supervisor_with(vec![
            ChildRecord::new(n1.clone(), h1),
            ChildRecord::new(n2.clone(), h2),
        ]);

        let start = std::time::Instant::now();
        supervisor.quit();
        let elapsed = start.elapsed();

        assert!(!supervisor.is_running(&n1));
        assert!(!supervisor.is_running(&n2));
        assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
    }

    #[test]
    fn drain_tick_accumulates_output_before_a_later_stop() {
        // spec.md §8 scenario 1: writes "hello\n" then sleeps; stopped
        // before the sleep ends. The accumulator must hold exactly the
        // bytes produced before the stop.
        let handle = spawn_child(&[
            "sh".into(),
            "-c".into(),
            "printf 'hello\\n'; sleep 5".into(),
        ])
        .unwrap();
        let name = ChildName::new("greeter");
        let mut supervisor = supervisor_with(vec![ChildRecord::new(name.clone(), handle)]);

        std::thread::sleep(Duration::from_millis(300));
        supervisor.drain_tick(None);

        let buffered = supervisor
            .registry
            .get_mut(&name)
            .expect("still running before stop")
            .take_buffered_output();
        assert_eq!(buffered, b"hello\n");

        assert!(supervisor.stop(&name));
        assert!(!supervisor.is_running(&name));
    }

    #[test]
    fn drain_tick_reaps_a_child_that_has_already_exited() {
        let handle = spawn_child(&["true".into()]).unwrap();
        let name = ChildName::new("done");
        let mut supervisor = supervisor_with(vec![ChildRecord::new(name.clone(), handle)]);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while supervisor.is_running(&name) && std::time::Instant::now() < deadline {
            supervisor.drain_tick(None);
            std::thread::sleep(Duration::from_millis(20));
        }

        assert!(!supervisor.is_running(&name));
    }

    #[test]
    fn drain_tick_skips_the_attached_child() {
        // While attached, the relay loop owns the child's I/O directly
        // (spec.md §5) — a drain pass must leave that record untouched.
        let handle = spawn_child(&[
            "sh".into(),
            "-c".into(),
            "printf 'hello\\n'; sleep 5".into(),
        ])
        .unwrap();
        let name = ChildName::new("attached");
        let mut supervisor = supervisor_with(vec![ChildRecord::new(name.clone(), handle)]);

        std::thread::sleep(Duration::from_millis(300));
        supervisor.drain_tick(Some(&name));

        let record = supervisor.registry.get(&name).expect("still registered");
        assert!(!record.has_buffered_output(), "skipped record must stay undrained");

        supervisor.stop(&name);
    }
}
