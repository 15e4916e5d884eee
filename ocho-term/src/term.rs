//! Terminal IO devices.
use std::{
    io::{self, Write as _},
    time::Duration,
};

use crossterm::{
    cursor, event,
    event::{Event, KeyCode as TermKey, KeyEvent, KeyModifiers},
    execute, queue, style, terminal,
};
use ocho::{
    constants::{DISPLAY_HEIGHT, DISPLAY_WIDTH},
    prelude::*,
};

use crate::keymap::KeyBindings;

/// Keyboard and display backed by the hosting terminal.
///
/// Construction switches the terminal to raw mode on an alternate
/// screen with the cursor hidden; dropping the value restores it, also
/// when the machine exits with an error.
pub struct TermDevices {
    bindings: KeyBindings,
}

impl TermDevices {
    pub fn new(bindings: KeyBindings) -> Chip8Result<Self> {
        terminal::enable_raw_mode().map_err(to_chip8)?;
        execute!(
            io::stdout(),
            terminal::EnterAlternateScreen,
            terminal::Clear(terminal::ClearType::All),
            cursor::Hide,
        )
        .map_err(to_chip8)?;

        Ok(Self { bindings })
    }
}

impl Drop for TermDevices {
    fn drop(&mut self) {
        // Restore the terminal as far as possible, even when one of
        // the steps fails.
        let _ = execute!(
            io::stdout(),
            cursor::Show,
            terminal::LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();
    }
}

impl Devices for TermDevices {
    /// Drain all pending terminal events into one sample of keys down.
    ///
    /// Terminals report key presses but not releases, so a held key
    /// shows up through auto-repeat. Keys the repeat skips for one
    /// sample read as released and re-latch on the next event; programs
    /// built around edge-triggered input handle this fine.
    fn poll_keys(&mut self) -> Chip8Result<Option<KeySet>> {
        let mut down = KeySet::new();

        while event::poll(Duration::ZERO).map_err(to_chip8)? {
            if let Event::Key(KeyEvent { code, modifiers }) = event::read().map_err(to_chip8)? {
                match code {
                    TermKey::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(None)
                    }
                    TermKey::Esc => return Ok(None),
                    TermKey::Char(ch) => {
                        if self.bindings.is_quit(ch) {
                            return Ok(None);
                        }
                        if let Some(key) = self.bindings.lookup(ch) {
                            down.insert(key);
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(Some(down))
    }

    /// Blit the display buffer as a bordered block of characters.
    ///
    /// The whole frame goes out in one write, rewinding the cursor
    /// instead of clearing, so the terminal never shows a half-drawn
    /// screen.
    fn draw(&mut self, display: &FrameBuffer) -> Chip8Result<()> {
        let mut frame = String::with_capacity((DISPLAY_WIDTH + 4) * (DISPLAY_HEIGHT + 2));

        frame.push('/');
        for _ in 0..DISPLAY_WIDTH {
            frame.push('-');
        }
        frame.push('\\');
        frame.push_str("\r\n");

        for row in display.rows() {
            frame.push('|');
            for &px in row {
                frame.push(if px { '*' } else { ' ' });
            }
            frame.push('|');
            frame.push_str("\r\n");
        }

        frame.push('\\');
        for _ in 0..DISPLAY_WIDTH {
            frame.push('-');
        }
        frame.push('/');
        frame.push_str("\r\n");

        let mut stdout = io::stdout();
        queue!(stdout, cursor::MoveTo(0, 0), style::Print(frame)).map_err(to_chip8)?;
        stdout.flush()?;

        Ok(())
    }
}

/// Lift a terminal error into the machine's error type.
fn to_chip8(err: crossterm::ErrorKind) -> Chip8Error {
    Chip8Error::Io(io::Error::new(io::ErrorKind::Other, err))
}
