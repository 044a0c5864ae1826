//! Child list rendering and mouse hit-testing.
//!
//! Ported from the original's `print_app_list`/`handle_click` (row layout,
//! scroll clamping, button-zone math) rather than redesigned — the
//! original's column arithmetic is the contract here, not an invented one.

use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::{cursor, terminal};

use crate::supervisor::AppEntry;
use crate::ui::UiState;

/// Result of a mouse click, translated from screen coordinates into an
/// action on the currently-selected (or clicked) child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    /// Select only (clicked row but not over a button).
    SelectOnly,
    /// Start if stopped, stop if running (the "start"/"stop" button, or a
    /// plain click left of the buttons when there's no room for them).
    ToggleRun,
    /// Open an Attach Session ("open" button).
    Monitor,
    /// Foreground-exec ("exec" button).
    ExecFg,
}

/// Recompute `state.current_scroll` from `state.current_index` and the
/// visible row count, exactly like the original recomputed
/// `current_scroll` at the top of every `print_app_list` call.
pub fn clamp_scroll(state: &mut UiState, child_count: usize, visible_count: usize) {
    let max_scroll = child_count.saturating_sub(visible_count);
    state.current_scroll = state.current_scroll.min(max_scroll);
    if state.current_index < state.current_scroll {
        state.current_scroll = state.current_index;
    }
    if state.current_index >= state.current_scroll + visible_count {
        state.current_scroll = state.current_index + 1 - visible_count;
    }
}

fn button_label(running: bool) -> &'static str {
    if running { "stop " } else { "start" }
}

fn status_label(running: bool) -> &'static str {
    if running { "RUNNING" } else { "       " }
}

/// Compute one row's text, right-padded to `max_x`, matching the
/// original's base/button layout math (row too narrow for buttons ⇒ name
/// is truncated with an ellipsis instead).
fn build_row(name: &str, running: bool, selected: bool, max_x: usize) -> String {
    let prefix = if selected { "> " } else { "  " };
    let status = status_label(running);
    let action_btn = button_label(running);
    let buttons = format!("{action_btn} open exec");

    let base_len = prefix.len() + name.len() + 1 + status.len();
    let buttons_len = buttons.len() + 1;

    let line = if base_len + buttons_len + 3 <= max_x {
        let padding_len = max_x - base_len - buttons_len - 1;
        format!("{prefix}{name} {status}{}{buttons}", " ".repeat(padding_len))
    } else {
        let available_for_name = max_x.saturating_sub(prefix.len() + 1 + status.len() + 1);
        let shown_name = if name.chars().count() > available_for_name && available_for_name > 3 {
            let head: String = name.chars().take(available_for_name - 3).collect();
            format!("{head}...")
        } else {
            name.to_string()
        };
        format!("{prefix}{shown_name} {status}")
    };

    let mut truncated: String = line.chars().take(max_x).collect();
    while truncated.chars().count() < max_x {
        truncated.push(' ');
    }
    truncated
}

const HEADER: &str = "duckymux q:quit h:help";

/// Render the header and visible child rows. `max_y`/`max_x` are the
/// terminal dimensions; one row is reserved for the header.
pub fn render(
    out: &mut impl Write,
    apps: &[AppEntry],
    running: impl Fn(&str) -> bool,
    state: &mut UiState,
    max_x: usize,
    max_y: usize,
    use_color: bool,
) -> io::Result<()> {
    let visible_count = max_y.saturating_sub(1).max(1);
    clamp_scroll(state, apps.len(), visible_count);

    queue!(out, cursor::MoveTo(0, 0), terminal::Clear(terminal::ClearType::All))?;
    if use_color {
        queue!(out, SetForegroundColor(Color::Black))?;
    }
    let header_text: String = match state.message.take() {
        Some(message) => message,
        None => HEADER.to_string(),
    };
    let shown_header: String = header_text.chars().take(max_x).collect();
    write!(out, "{shown_header:width$}", width = max_x)?;
    if use_color {
        queue!(out, ResetColor)?;
    }

    let end = (state.current_scroll + visible_count).min(apps.len());
    for (row, i) in (state.current_scroll..end).enumerate() {
        let entry = &apps[i];
        let selected = i == state.current_index;
        let line = build_row(entry.name.as_str(), running(entry.name.as_str()), selected, max_x);
        queue!(out, cursor::MoveTo(0, (row + 1) as u16))?;
        if selected && use_color {
            queue!(out, SetForegroundColor(Color::Black))?;
            write!(out, "{line}")?;
            queue!(out, ResetColor)?;
        } else {
            write!(out, "{line}")?;
        }
    }

    out.flush()
}

/// Translate a click at `(mx, my)` into an action, reproducing the
/// original's button-zone math (`start`/`stop`, `open`, `exec` columns).
/// Returns the clicked row index alongside the action so the caller can
/// update `current_index` before dispatching.
pub fn hit_test(
    mx: usize,
    my: usize,
    apps: &[AppEntry],
    running: impl Fn(&str) -> bool,
    state: &UiState,
    visible_count: usize,
    max_x: usize,
) -> Option<(usize, ClickAction)> {
    if my < 1 {
        return None;
    }
    let clicked_index = state.current_scroll + (my - 1);
    if clicked_index >= apps.len() || clicked_index >= state.current_scroll + visible_count {
        return None;
    }

    let entry = &apps[clicked_index];
    let is_running = running(entry.name.as_str());
    let status = status_label(is_running);
    let action_btn = button_label(is_running);

    let base_len = 2 + entry.name.len() + 1 + status.len();
    let buttons = format!("{action_btn} open exec");
    let buttons_len = buttons.len() + 1;

    if base_len + buttons_len + 3 > max_x {
        return Some((clicked_index, ClickAction::SelectOnly));
    }

    let padding_len = max_x - base_len - buttons_len - 1;
    let buttons_start = base_len + padding_len;

    if mx < buttons_start {
        return Some((clicked_index, ClickAction::SelectOnly));
    }

    let relative_x = mx - buttons_start;
    let action_len = action_btn.len();
    let open_start = action_len + 1;
    let exec_start = open_start + 5;

    let action = if relative_x < action_len {
        ClickAction::ToggleRun
    } else if relative_x >= open_start && relative_x < exec_start - 1 {
        ClickAction::Monitor
    } else if relative_x >= exec_start {
        ClickAction::ExecFg
    } else {
        ClickAction::SelectOnly
    };

    Some((clicked_index, action))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(name: &str) -> AppEntry {
        AppEntry {
            name: crate::registry::ChildName::new(name),
            path: name.into(),
        }
    }

    #[test]
    fn clamp_scroll_keeps_selection_visible_going_down() {
        let mut state = UiState {
            current_index: 9,
            current_scroll: 0,
            message: None,
        };
        clamp_scroll(&mut state, 20, 5);
        assert_eq!(state.current_scroll, 5);
    }

    #[test]
    fn clamp_scroll_keeps_selection_visible_going_up() {
        let mut state = UiState {
            current_index: 2,
            current_scroll: 8,
            message: None,
        };
        clamp_scroll(&mut state, 20, 5);
        assert_eq!(state.current_scroll, 2);
    }

    #[test]
    fn clamp_scroll_caps_at_max_scroll() {
        let mut state = UiState {
            current_index: 0,
            current_scroll: 100,
            message: None,
        };
        clamp_scroll(&mut state, 20, 5);
        assert_eq!(state.current_scroll, 15);
    }

    #[test]
    fn row_has_exact_width() {
        let row = build_row("hello.py", false, false, 40);
        assert_eq!(row.chars().count(), 40);
    }

    #[test]
    fn row_includes_running_status() {
        let row = build_row("hello.py", true, false, 80);
        assert!(row.contains("RUNNING"));
        assert!(row.contains("stop "));
    }

    #[test]
    fn hit_test_selects_row_without_buttons_on_narrow_terminal() {
        let apps = vec![app("a.py")];
        let state = UiState::new();
        let action = hit_test(0, 1, &apps, |_| false, &state, 10, 10);
        assert_eq!(action, Some((0, ClickAction::SelectOnly)));
    }

    #[test]
    fn hit_test_toggle_run_zone() {
        let apps = vec![app("a.py")];
        let state = UiState::new();
        // Wide terminal: buttons_start = base_len(2+4+1+7=14) + padding.
        // max_x = 40 gives enough room; click right at buttons_start.
        let max_x = 40usize;
        let base_len = 2 + "a.py".len() + 1 + 7;
        let buttons = "start open exec";
        let buttons_len = buttons.len() + 1;
        let padding_len = max_x - base_len - buttons_len - 1;
        let buttons_start = base_len + padding_len;
        let action = hit_test(buttons_start, 1, &apps, |_| false, &state, 10, max_x);
        assert_eq!(action, Some((0, ClickAction::ToggleRun)));
    }
}
