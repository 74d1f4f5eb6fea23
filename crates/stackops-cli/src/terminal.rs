use std::io::{self, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::{Attribute, Color, Print, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

use stackops_scrollback::ViewSnapshot;

pub struct TerminalSession {
    pub stdout: io::Stdout,
}

impl TerminalSession {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        Ok(Self { stdout })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = execute!(
            self.stdout,
            SetAttribute(Attribute::Reset),
            LeaveAlternateScreen,
            Show,
            MoveTo(0, 0)
        );
        let _ = terminal::disable_raw_mode();
    }
}

pub fn terminal_size() -> io::Result<(u16, u16)> {
    terminal::size()
}

/// Body rows padded to the viewport, then the status row. An error replaces
/// the status text.
pub fn frame_rows(snapshot: &ViewSnapshot, width: u16, height: u16) -> Vec<String> {
    let width = usize::from(width);
    let body = usize::from(height.saturating_sub(1));
    let mut rows: Vec<String> = snapshot
        .lines
        .iter()
        .take(body)
        .map(|line| line.chars().take(width).collect())
        .collect();
    rows.resize(body, String::new());

    let status = match &snapshot.error {
        Some(err) => format!("error: {err} (x to dismiss)"),
        None => snapshot.status.clone(),
    };
    rows.push(status.chars().take(width).collect());
    rows
}

pub fn draw<W: Write>(out: &mut W, snapshot: &ViewSnapshot, width: u16, height: u16) -> io::Result<()> {
    let rows = frame_rows(snapshot, width, height);
    let last = rows.len().saturating_sub(1);
    for (y, row) in rows.iter().enumerate() {
        let y = u16::try_from(y).unwrap_or(u16::MAX);
        queue!(out, MoveTo(0, y), Clear(ClearType::CurrentLine))?;
        if usize::from(y) == last {
            if snapshot.error.is_some() {
                queue!(out, SetForegroundColor(Color::Red))?;
            }
            queue!(out, SetAttribute(Attribute::Reverse), Print(row), SetAttribute(Attribute::Reset))?;
        } else {
            queue!(out, Print(row))?;
        }
    }
    out.flush()
}
