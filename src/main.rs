mod attach;
mod cli;
mod config;
mod discovery;
mod error;
mod logging;
mod pty;
mod registry;
mod supervisor;
mod ui;

use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::time::Duration;

use clap::Parser;

use cli::Cli;
use config::Config;
use error::SupervisorError;
use registry::ChildName;
use supervisor::{Command, DispatchOutcome, Supervisor};
use ui::UiState;
use ui::input::{UiEvent, poll_event};
use ui::list::ClickAction;

/// Exit code used when the controlling terminal's attributes could not be
/// restored after an Attach Session — spec.md §7 marks this fatal, and
/// spec.md §6 reserves non-zero exit codes for exactly this case.
const EXIT_TERMINAL_RESTORE_FAILED: i32 = 1;

/// Bounded poll timeout shared by the list loop's input wait and the
/// supervisor's drain cadence (spec.md §5).
const LOOP_POLL_TIMEOUT: Duration = Duration::from_millis(100);

fn main() {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli);
    let _log_guard = logging::init(config.log_file.as_deref());

    let mut supervisor = match Supervisor::new(config.clone()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            eprintln!("duckymux: {e}");
            std::process::exit(1);
        }
    };

    if supervisor.apps().is_empty() {
        eprintln!(
            "No apps found in '{}'. Nothing to supervise.",
            config.apps_dir.display()
        );
        std::process::exit(0);
    }

    let mut stdout = io::stdout();
    if let Err(e) = ui::enter_screen(&mut stdout) {
        eprintln!("duckymux: failed to initialize terminal: {e}");
        std::process::exit(1);
    }

    let exit_code = run(&mut supervisor, &config, &mut stdout);

    if let Err(e) = ui::leave_screen(&mut stdout) {
        eprintln!("duckymux: failed to restore terminal: {e}");
        std::process::exit(1);
    }

    std::process::exit(exit_code);
}

fn run(supervisor: &mut Supervisor, config: &Config, stdout: &mut impl Write) -> i32 {
    let mut state = UiState::new();
    let mut showing_help = false;
    let mut help_scroll: usize = 0;

    loop {
        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
        let (max_x, max_y) = (cols as usize, rows as usize);

        if showing_help {
            let _ = ui::help::render(stdout, help_scroll, max_x, max_y);
        } else {
            render_list(supervisor, &mut state, stdout, max_x, max_y, config.use_color);
        }

        let event = poll_event(LOOP_POLL_TIMEOUT).unwrap_or(UiEvent::Tick);

        match event {
            UiEvent::Tick => {
                if !showing_help {
                    supervisor.drain_tick(None);
                }
            }
            UiEvent::Resize => {}
            UiEvent::Quit => {
                if showing_help {
                    showing_help = false;
                } else {
                    let stdin_fd = io::stdin().as_raw_fd();
                    let _ = supervisor.dispatch(Command::Quit, stdin_fd, stdout);
                    return 0;
                }
            }
            UiEvent::ToggleHelp => {
                showing_help = !showing_help;
                help_scroll = 0;
            }
            UiEvent::Up => {
                if showing_help {
                    help_scroll = help_scroll.saturating_sub(1);
                } else {
                    state.move_up();
                }
            }
            UiEvent::Down => {
                if showing_help {
                    help_scroll += 1;
                } else {
                    state.move_down(supervisor.apps().len());
                }
            }
            UiEvent::ScrollUp if !showing_help => state.move_up(),
            UiEvent::ScrollDown if !showing_help => state.move_down(supervisor.apps().len()),
            UiEvent::RunSelected if !showing_help => {
                if let Some(name) = selected_name(supervisor, &state) {
                    if let Some(message) = dispatch_simple(supervisor, Command::Start(name), stdout)
                    {
                        state.set_message(message);
                    }
                }
            }
            UiEvent::StopSelected if !showing_help => {
                if let Some(name) = selected_name(supervisor, &state) {
                    if let Some(message) = dispatch_simple(supervisor, Command::Stop(name), stdout)
                    {
                        state.set_message(message);
                    }
                }
            }
            UiEvent::OpenSelected if !showing_help => {
                if let Some(name) = selected_name(supervisor, &state) {
                    if let Some(code) = do_attach(supervisor, &name, stdout) {
                        return code;
                    }
                }
            }
            UiEvent::RunForegroundSelected if !showing_help => {
                if let Some(name) = selected_name(supervisor, &state) {
                    do_foreground_exec(supervisor, &name, stdout);
                }
            }
            UiEvent::Click { x, y, right } if !showing_help => {
                if let Some(code) =
                    handle_click(supervisor, &mut state, x, y, right, max_x, max_y, stdout)
                {
                    return code;
                }
            }
            _ => {}
        }
    }
}

fn render_list(
    supervisor: &Supervisor,
    state: &mut UiState,
    stdout: &mut impl Write,
    max_x: usize,
    max_y: usize,
    use_color: bool,
) {
    let apps = supervisor.apps().to_vec();
    let is_running = |name: &str| supervisor.is_running(&ChildName::new(name));
    let _ = ui::list::render(stdout, &apps, is_running, state, max_x, max_y, use_color);
}

fn selected_name(supervisor: &Supervisor, state: &UiState) -> Option<ChildName> {
    supervisor
        .apps()
        .get(state.current_index)
        .map(|entry| entry.name.clone())
}

/// Dispatch a `Start`/`Stop` command that doesn't need terminal teardown.
/// Returns a transient status line to show the operator, if any —
/// spec.md §7: "a failed launch... displays a transient message".
fn dispatch_simple(supervisor: &mut Supervisor, command: Command, stdout: &mut impl Write) -> Option<String> {
    let name = match &command {
        Command::Start(n) | Command::Stop(n) => n.clone(),
        _ => return None,
    };
    let stdin_fd = io::stdin().as_raw_fd();
    match supervisor.dispatch(command, stdin_fd, stdout) {
        Ok(Some(outcome)) => describe_outcome(&name, &outcome),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(child = %name, error = %e, "command failed");
            Some(format!("{name}: {e}"))
        }
    }
}

/// Render a `DispatchOutcome` as the transient status line the operator
/// sees for one render (spec.md §7).
fn describe_outcome(name: &ChildName, outcome: &DispatchOutcome) -> Option<String> {
    match outcome {
        DispatchOutcome::Started => Some(format!("started {name}")),
        DispatchOutcome::StartFailed(msg) => Some(format!("failed to start {name}: {msg}")),
        DispatchOutcome::Stopped => Some(format!("stopped {name}")),
        DispatchOutcome::NoSuchChild => Some(format!("no such app: {name}")),
        DispatchOutcome::Attached { .. } => None,
    }
}

/// Run an Attach Session against `name`. Returns `Some(exit_code)` when the
/// controlling terminal could not be restored afterward — `TerminalRestoreFailed`
/// is the one fatal error class (spec.md §7) and must propagate all the way
/// out to the process exit code (spec.md §6), not just a logged warning.
fn do_attach(supervisor: &mut Supervisor, name: &ChildName, stdout: &mut impl Write) -> Option<i32> {
    // Attach Session entry tears down the TUI itself (spec.md §4.4 step
    // 2) — here that means leaving the alternate screen the list view
    // owns, before the Attach Session takes raw-mode control of stdin.
    let _ = ui::leave_screen(stdout);
    let stdin_fd = io::stdin().as_raw_fd();
    let outcome = match supervisor.dispatch(Command::Attach(name.clone()), stdin_fd, stdout) {
        Ok(Some(DispatchOutcome::Attached { child_exited })) => {
            if child_exited {
                let _ = writeln!(stdout, "\r\n[Process exited]");
                let _ = stdout.flush();
                std::thread::sleep(Duration::from_secs(1));
            }
            None
        }
        Ok(_) => None,
        Err(SupervisorError::TerminalRestoreFailed(cause)) => {
            tracing::error!(child = %name, error = %cause, "failed to restore terminal after attach session");
            eprintln!("duckymux: failed to restore terminal: {cause}");
            Some(EXIT_TERMINAL_RESTORE_FAILED)
        }
        Err(e) => {
            tracing::warn!(child = %name, error = %e, "attach failed");
            None
        }
    };

    if outcome.is_none() {
        let _ = ui::enter_screen(stdout);
    }
    outcome
}

fn do_foreground_exec(supervisor: &mut Supervisor, name: &ChildName, stdout: &mut impl Write) {
    // Tear down the TUI before the image replacement so the child
    // inherits a clean terminal (spec.md §4.3).
    let _ = ui::leave_screen(stdout);
    let stdin_fd = io::stdin().as_raw_fd();
    // Only reachable on failure: a successful exec never returns, so
    // `dispatch` itself never does either.
    if let Err(e) = supervisor.dispatch(Command::ForegroundExec(name.clone()), stdin_fd, stdout) {
        eprintln!("duckymux: foreground exec failed: {e}");
    }
    let _ = ui::enter_screen(stdout);
}

fn handle_click(
    supervisor: &mut Supervisor,
    state: &mut UiState,
    x: usize,
    y: usize,
    right: bool,
    max_x: usize,
    max_y: usize,
    stdout: &mut impl Write,
) -> Option<i32> {
    let visible_count = max_y.saturating_sub(1).max(1);
    let apps = supervisor.apps().to_vec();
    let is_running = |name: &str| supervisor.is_running(&ChildName::new(name));

    let Some((index, action)) =
        ui::list::hit_test(x, y, &apps, is_running, state, visible_count, max_x)
    else {
        return None;
    };
    state.current_index = index;
    let name = apps[index].name.clone();

    match action {
        ClickAction::SelectOnly => {
            if right {
                match supervisor.start(&name) {
                    Ok(true) => state.set_message(format!("started {name}")),
                    Ok(false) => {}
                    Err(e) => state.set_message(format!("failed to start {name}: {e}")),
                }
            }
            None
        }
        ClickAction::ToggleRun => {
            if supervisor.is_running(&name) {
                supervisor.stop(&name);
                state.set_message(format!("stopped {name}"));
            } else {
                match supervisor.start(&name) {
                    Ok(true) => state.set_message(format!("started {name}")),
                    Ok(false) => {}
                    Err(e) => state.set_message(format!("failed to start {name}: {e}")),
                }
            }
            None
        }
        ClickAction::Monitor => do_attach(supervisor, &name, stdout),
        ClickAction::ExecFg => {
            do_foreground_exec(supervisor, &name, stdout);
            None
        }
    }
}
