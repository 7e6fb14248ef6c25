/*
 *  term.rs
 *
 *  MeterBridge - needle in the red
 *	(c) 2020-25 Stuart Hunter
 *
 *	TODO:
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
//! Terminal surface. Blits the RGB frame with half-block cells (two pixel
//! rows per character cell, upper half foreground, lower half background)
//! and turns raw-mode keystrokes into UI events. Terminal state is always
//! restored, even on panic, via Drop.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    style::{self, Color, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand, QueueableCommand,
};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

use crate::vframebuf::VarFrameBuf;

/// What the user asked for, decoded from a keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Quit,
    RestartProducer,
    ToggleMode,
    CycleSkin,
    ToggleAsymmetric,
    ToggleFreeze,
    Resized,
}

pub struct TermSurface {
    stdout: io::Stdout,
    restored: bool,
}

impl TermSurface {
    pub fn new() -> Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode().context("enabling raw mode")?;
        stdout
            .execute(EnterAlternateScreen)
            .context("entering alternate screen")?;
        stdout.execute(cursor::Hide)?;
        stdout.execute(terminal::SetTitle("MeterBridge"))?;
        Ok(Self {
            stdout,
            restored: false,
        })
    }

    /// Pixel geometry that fits the current terminal, keeping the last
    /// character row free for the status line.
    pub fn frame_size(&self) -> Result<(u32, u32)> {
        let (cols, rows) = terminal::size().context("querying terminal size")?;
        Ok(cell_to_pixel_size(cols, rows))
    }

    /// Paint a whole frame plus the status line and flush once.
    pub fn blit(&mut self, frame: &VarFrameBuf<Rgb888>, status: &str) -> Result<()> {
        let cell_rows = frame.height() / 2;
        self.stdout.queue(cursor::MoveTo(0, 0))?;

        for cy in 0..cell_rows {
            self.stdout.queue(cursor::MoveTo(0, cy as u16))?;
            let mut last: Option<(Rgb888, Rgb888)> = None;
            let mut run = String::with_capacity(frame.width());
            for x in 0..frame.width() {
                let top = frame
                    .pixel_at(x as i32, (cy * 2) as i32)
                    .unwrap_or(Rgb888::BLACK);
                let bottom = frame
                    .pixel_at(x as i32, (cy * 2 + 1) as i32)
                    .unwrap_or(Rgb888::BLACK);
                if last != Some((top, bottom)) {
                    // flush the run before switching colors
                    if !run.is_empty() {
                        self.stdout.queue(style::Print(run.as_str()))?;
                        run.clear();
                    }
                    self.stdout.queue(SetForegroundColor(to_term(top)))?;
                    self.stdout.queue(SetBackgroundColor(to_term(bottom)))?;
                    last = Some((top, bottom));
                }
                run.push('\u{2580}');
            }
            if !run.is_empty() {
                self.stdout.queue(style::Print(run.as_str()))?;
            }
        }

        self.stdout.queue(ResetColor)?;
        self.stdout.queue(cursor::MoveTo(0, cell_rows as u16))?;
        self.stdout
            .queue(terminal::Clear(terminal::ClearType::UntilNewLine))?;
        // Keep the status inside one row; a wrap would scroll the meters
        let fitted: String = status.chars().take(frame.width()).collect();
        self.stdout.queue(style::Print(fitted.as_str()))?;
        self.stdout.flush()?;
        Ok(())
    }

    /// Non-blocking: drain at most one pending input event.
    pub fn poll_event(&mut self) -> Result<Option<UiEvent>> {
        if !event::poll(Duration::ZERO)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) => Ok(map_key(key)),
            Event::Resize(_, _) => Ok(Some(UiEvent::Resized)),
            _ => Ok(None),
        }
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        let _ = self.stdout.execute(cursor::Show);
        let _ = self.stdout.execute(LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = self.stdout.flush();
    }
}

impl Drop for TermSurface {
    fn drop(&mut self) {
        self.restore();
    }
}

fn cell_to_pixel_size(cols: u16, rows: u16) -> (u32, u32) {
    let w = cols.max(2) as u32;
    // one row reserved for status, each remaining cell is two pixels tall
    let h = (rows.saturating_sub(1).max(2) as u32) * 2;
    (w, h)
}

fn to_term(c: Rgb888) -> Color {
    Color::Rgb {
        r: c.r(),
        g: c.g(),
        b: c.b(),
    }
}

fn map_key(key: KeyEvent) -> Option<UiEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(UiEvent::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(UiEvent::Quit),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(UiEvent::RestartProducer),
        KeyCode::Char('m') | KeyCode::Char('M') => Some(UiEvent::ToggleMode),
        KeyCode::Char('s') | KeyCode::Char('S') => Some(UiEvent::CycleSkin),
        KeyCode::Char('a') | KeyCode::Char('A') => Some(UiEvent::ToggleAsymmetric),
        KeyCode::Char('f') | KeyCode::Char('F') => Some(UiEvent::ToggleFreeze),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn keys_map_to_ui_events() {
        assert_eq!(
            map_key(press(KeyCode::Char('q'), KeyModifiers::NONE)),
            Some(UiEvent::Quit)
        );
        assert_eq!(
            map_key(press(KeyCode::Esc, KeyModifiers::NONE)),
            Some(UiEvent::Quit)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(UiEvent::Quit)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('r'), KeyModifiers::NONE)),
            Some(UiEvent::RestartProducer)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('m'), KeyModifiers::NONE)),
            Some(UiEvent::ToggleMode)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('s'), KeyModifiers::NONE)),
            Some(UiEvent::CycleSkin)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('f'), KeyModifiers::NONE)),
            Some(UiEvent::ToggleFreeze)
        );
        // plain c is not quit
        assert_eq!(map_key(press(KeyCode::Char('c'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn geometry_reserves_the_status_row() {
        assert_eq!(cell_to_pixel_size(120, 40), (120, 78));
        assert_eq!(cell_to_pixel_size(80, 24), (80, 46));
        // degenerate terminals still yield a drawable frame
        let (w, h) = cell_to_pixel_size(1, 1);
        assert!(w >= 2 && h >= 4);
    }
}
