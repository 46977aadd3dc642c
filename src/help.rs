//! Text overlays drawn over the visualizer: help box, round bar, status line.

use crate::terminal::Terminal;
use crate::timeline::ProgressBar;
use crossterm::style::Color;

const BORDER: Color = Color::White;
const TEXT: Color = Color::Grey;
/// Spinner shown while the hourglass animation is on.
const SAND: [char; 4] = ['◴', '◷', '◶', '◵'];
const SAND_IDLE: char = '◔';

/// Render a centered help box with the provided text.
pub fn render_help_overlay(term: &mut Terminal, help_text: &str) {
    if help_text.is_empty() {
        return;
    }
    let (width, height) = term.size();
    let lines: Vec<&str> = help_text.lines().collect();
    let inner = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let box_width = inner + 4;
    let box_height = lines.len() + 2;

    let x0 = ((width as usize).saturating_sub(box_width) / 2) as i32;
    let y0 = ((height as usize).saturating_sub(box_height) / 2) as i32;
    let x1 = x0 + box_width as i32 - 1;
    let y1 = y0 + box_height as i32 - 1;

    for x in x0 + 1..x1 {
        term.set_with_bg(x, y0, '─', Some(BORDER), Some(Color::Black), false);
        term.set_with_bg(x, y1, '─', Some(BORDER), Some(Color::Black), false);
    }
    for (ch, x, y) in [('┌', x0, y0), ('┐', x1, y0), ('└', x0, y1), ('┘', x1, y1)] {
        term.set_with_bg(x, y, ch, Some(BORDER), Some(Color::Black), false);
    }

    for (i, line) in lines.iter().enumerate() {
        let y = y0 + 1 + i as i32;
        term.set_with_bg(x0, y, '│', Some(BORDER), Some(Color::Black), false);
        term.set_with_bg(x1, y, '│', Some(BORDER), Some(Color::Black), false);
        let padded = format!(" {:<inner$} ", line);
        for (j, ch) in padded.chars().enumerate() {
            term.set_with_bg(x0 + 1 + j as i32, y, ch, Some(TEXT), Some(Color::Black), false);
        }
    }
}

/// Round progress along row `y`, with the hourglass and seconds left.
pub fn render_progress_bar(term: &mut Terminal, y: i32, bar: &ProgressBar, seconds_left: Option<u32>, tick: u64) {
    let (width, _) = term.size();
    let label = match seconds_left {
        Some(s) => format!(" {s:>3}s"),
        None => String::new(),
    };
    let glass = if bar.sand_animated {
        SAND[(tick / 10) as usize % SAND.len()]
    } else {
        SAND_IDLE
    };
    let reserved = 2 + label.chars().count() as i32;
    let track = (width as i32 - reserved).max(0);
    let filled = filled_cells(bar.width, track);

    term.set(0, y, glass, Some(Color::White), false);
    term.set(1, y, ' ', None, false);
    for x in 0..track {
        let (ch, fg) = if x < filled { ('█', Color::from(bar.color)) } else { ('░', Color::DarkGrey) };
        term.set(2 + x, y, ch, Some(fg), false);
    }
    term.set_str(2 + track, y, &label, Some(Color::White), true);
}

/// Cells lit for a bar `percent` wide on a `track` of cells.
pub fn filled_cells(percent: f64, track: i32) -> i32 {
    let fraction = (percent / 100.0).clamp(0.0, 1.0);
    (fraction * track as f64).round() as i32
}

/// One line of status text, centered on row `y`.
pub fn render_status(term: &mut Terminal, y: i32, text: &str) {
    let (width, _) = term.size();
    let len = text.chars().count() as i32;
    let x = ((width as i32 - len) / 2).max(0);
    term.set_str(x, y, text, Some(Color::Yellow), true);
}
