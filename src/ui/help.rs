//! Help screen: static text with its own scroll state, entered with `h`
//! and left with `h` or `q` (mirrors the original's `show_help`).

use std::io::{self, Write};

use crossterm::queue;
use crossterm::{cursor, terminal};

pub const HELP_TEXT: &str = "\
duckymux - manage multiple scripts under a shared terminal

h: show this help or exit help

arrows or j/k or click: move selection up/down

r or right click:  run the selected app in the background

o or double click: open the attach session for the selected app
                   send ESC(0x04) ESC(0x18) to return here
                   send ESC(0x04) ESC(0x04) to deliver a literal ESC byte

shift+r:           run the selected app in the foreground, replacing this
                   process and stopping every other app; there is no way
                   back to the list afterward

s: stop the selected app

q: quit

=== press q or h to return ===";

/// Clamp `scroll_pos` to the text's bounds for the given viewport height,
/// exactly like `show_help`'s scroll clamp.
pub fn clamp_scroll(scroll_pos: usize, line_count: usize, visible_count: usize) -> usize {
    let max_scroll = line_count.saturating_sub(visible_count);
    scroll_pos.min(max_scroll)
}

pub fn render(out: &mut impl Write, scroll_pos: usize, max_x: usize, max_y: usize) -> io::Result<()> {
    let lines: Vec<&str> = HELP_TEXT.lines().collect();
    let scroll_pos = clamp_scroll(scroll_pos, lines.len(), max_y);

    queue!(out, cursor::MoveTo(0, 0), terminal::Clear(terminal::ClearType::All))?;
    for row in 0..max_y {
        let idx = scroll_pos + row;
        if idx >= lines.len() {
            break;
        }
        let line = lines[idx];
        let shown: String = line.chars().take(max_x).collect();
        queue!(out, cursor::MoveTo(0, row as u16))?;
        write!(out, "{shown}")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_clamps_to_text_length() {
        let lines = HELP_TEXT.lines().count();
        assert_eq!(clamp_scroll(10_000, lines, 5), lines.saturating_sub(5));
    }

    #[test]
    fn scroll_zero_stays_zero() {
        assert_eq!(clamp_scroll(0, 100, 20), 0);
    }
}
