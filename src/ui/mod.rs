//! The UI collaborator — list rendering, highlight bar, help screen, and
//! mouse hit-testing (SPEC_FULL.md §4.9). Mechanical per spec.md §1; kept
//! out of the core's correctness invariants but implemented so the crate
//! is runnable end to end. Built on `crossterm`, the pack's closest
//! analogue to the original's `curses` list/mouse handling.

pub mod help;
pub mod input;
pub mod list;

use std::io::{self, Write};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, terminal};

/// Selection + scroll state for the child list. Module-level mutable
/// globals in the original (`current_index`, `current_scroll`) become
/// explicit fields here, owned by whichever loop is currently driving the
/// screen (spec.md §9).
#[derive(Debug, Default)]
pub struct UiState {
    pub current_index: usize,
    pub current_scroll: usize,
    /// Transient status line (a failed launch, a stop confirmation, ...)
    /// shown in place of the header for one render, then cleared
    /// (spec.md §7: "a failed launch... displays a transient message").
    pub message: Option<String>,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_up(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    pub fn move_down(&mut self, child_count: usize) {
        if child_count == 0 {
            return;
        }
        if self.current_index + 1 < child_count {
            self.current_index += 1;
        }
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }
}

/// Enter the list screen: raw mode, alternate screen, mouse capture,
/// hidden cursor. Paired with [`leave_screen`], which every code path
/// through `main` calls before handing the terminal to an Attach Session
/// or exiting (spec.md §4.4 step 2, §5).
pub fn enter_screen(out: &mut impl Write) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    execute!(
        out,
        EnterAlternateScreen,
        EnableMouseCapture,
        cursor::Hide
    )
}

pub fn leave_screen(out: &mut impl Write) -> io::Result<()> {
    execute!(out, DisableMouseCapture, LeaveAlternateScreen, cursor::Show)?;
    terminal::disable_raw_mode()
}
