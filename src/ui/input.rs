//! Keyboard/mouse event translation — the UI collaborator's half of
//! spec.md §6's "abstract command stream... free to bind this to
//! keyboard, mouse, or RPC."

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, MouseButton, MouseEventKind};

/// One decoded input event, before it's turned into a `supervisor::Command`
/// (that translation needs list state — current selection, running status
/// — which lives in `main`, not here).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Quit,
    ToggleHelp,
    Up,
    Down,
    RunSelected,
    RunForegroundSelected,
    OpenSelected,
    StopSelected,
    Click { x: usize, y: usize, right: bool },
    ScrollUp,
    ScrollDown,
    Resize,
    /// Poll timed out with nothing ready — the caller's cue to run a
    /// drain pass (spec.md §4.2).
    Tick,
}

/// Wait up to `timeout` for one input event, matching the 100ms poll
/// timeout the supervisor loop uses to interleave input handling with the
/// Drain Loop (spec.md §5).
pub fn poll_event(timeout: Duration) -> io::Result<UiEvent> {
    if !event::poll(timeout)? {
        return Ok(UiEvent::Tick);
    }
    match event::read()? {
        Event::Key(key) => Ok(match key.code {
            KeyCode::Char('q') => UiEvent::Quit,
            KeyCode::Char('h') => UiEvent::ToggleHelp,
            KeyCode::Up | KeyCode::Char('k') => UiEvent::Up,
            KeyCode::Down | KeyCode::Char('j') => UiEvent::Down,
            KeyCode::Char('r') => UiEvent::RunSelected,
            KeyCode::Char('R') => UiEvent::RunForegroundSelected,
            KeyCode::Char('o') => UiEvent::OpenSelected,
            KeyCode::Char('s') => UiEvent::StopSelected,
            _ => UiEvent::Tick,
        }),
        Event::Mouse(mouse) => Ok(match mouse.kind {
            MouseEventKind::ScrollUp => UiEvent::ScrollUp,
            MouseEventKind::ScrollDown => UiEvent::ScrollDown,
            MouseEventKind::Down(MouseButton::Left) => UiEvent::Click {
                x: mouse.column as usize,
                y: mouse.row as usize,
                right: false,
            },
            MouseEventKind::Down(MouseButton::Right) => UiEvent::Click {
                x: mouse.column as usize,
                y: mouse.row as usize,
                right: true,
            },
            _ => UiEvent::Tick,
        }),
        Event::Resize(_, _) => Ok(UiEvent::Resize),
        _ => Ok(UiEvent::Tick),
    }
}
