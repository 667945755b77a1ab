//! Operator menu: numbered commands typed one per line.
//!
//! Reading stdin blocks, so a small reader thread forwards raw lines over an
//! `mpsc` channel. The tick loop drains at most one line per tick with
//! `try_recv()`, so every state change still happens on the loop thread.

use crate::animation::{AnimationState, Mode};
use crate::error::{Error, Result};
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

// ── Commands ─────────────────────────────────────────────────────────

/// A menu selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// 1: pause or resume animation and servo output.
    ToggleActive,
    /// 2: every tile to brightness 0.
    FillMin,
    /// 3: every tile to brightness 50.
    FillMid,
    /// 4: every tile to brightness 100.
    FillMax,
    /// 5: start the wave animation.
    Wave,
    /// 6: start the invert animation.
    Invert,
}

impl Command {
    /// Decode a menu number. Zero and negatives mean "nothing selected".
    pub fn from_code(code: i64) -> Result<Option<Self>> {
        let command = match code {
            i64::MIN..=0 => return Ok(None),
            1 => Command::ToggleActive,
            2 => Command::FillMin,
            3 => Command::FillMid,
            4 => Command::FillMax,
            5 => Command::Wave,
            6 => Command::Invert,
            _ => return Err(Error::InvalidCommand(code)),
        };
        Ok(Some(command))
    }

    /// Parse an input line, taking the first integer found in it.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        match parse_int(line) {
            Some(code) => Self::from_code(code),
            None => Ok(None),
        }
    }

    /// Apply this command to the display state.
    ///
    /// Everything except the toggle also switches the display on.
    pub fn apply(self, state: &mut AnimationState, now_ms: u32) {
        match self {
            Command::ToggleActive => state.set_active(!state.is_active()),
            Command::FillMin => {
                state.set_active(true);
                state.fill(0.0);
            }
            Command::FillMid => {
                state.set_active(true);
                state.fill(50.0);
            }
            Command::FillMax => {
                state.set_active(true);
                state.fill(100.0);
            }
            Command::Wave => {
                state.set_active(true);
                state.set_mode(Mode::Wave, now_ms);
            }
            Command::Invert => {
                state.set_active(true);
                state.set_mode(Mode::Invert, now_ms);
            }
        }
    }
}

// ── Menu text and input parsing ──────────────────────────────────────

/// First integer in `line`, with an optional leading minus.
///
/// Anything before the number is skipped and anything after is ignored,
/// so `"> 5"` and `"5)"` both read as 5. Huge numbers saturate.
pub fn parse_int(line: &str) -> Option<i64> {
    let start = line.find(|c: char| c.is_ascii_digit())?;
    let digits = &line[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let negative = line[..start].ends_with('-');

    let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}

/// The menu text. Item 1 reads according to the current active flag.
pub fn menu_prompt(active: bool) -> String {
    let toggle = if active { "1) Stop!!" } else { "1) Go..." };
    format!(
        "Select an option:\n\
         -----------------\n\
         {toggle}\n\
         2) Set Servos to Min\n\
         3) Set Servos to Mid\n\
         4) Set Servos to Max\n\
         5) Wave Mode\n\
         6) Invert Mode\n"
    )
}

// ── Input ────────────────────────────────────────────────────────────

/// What a polled line turned out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied(Command),
    Invalid(i64),
}

/// Spawn a thread forwarding stdin lines until stdin closes or the receiver
/// is dropped.
pub fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("stdin-menu".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read from stdin: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Menu input closed");
        })?;

    Ok(rx)
}

// ── Control surface ──────────────────────────────────────────────────

/// Polls operator input and echoes the menu to `out`.
pub struct ControlSurface<W: Write = io::Stdout> {
    input: Receiver<String>,
    out: W,
    show_menu: bool,
    disconnected: bool,
}

impl ControlSurface<io::Stdout> {
    /// Menu on stdin/stdout.
    pub fn stdio() -> io::Result<Self> {
        Ok(Self::new(spawn_stdin_reader()?, io::stdout()))
    }
}

impl<W: Write> ControlSurface<W> {
    pub fn new(input: Receiver<String>, out: W) -> Self {
        Self {
            input,
            out,
            show_menu: true,
            disconnected: false,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Handle at most one pending input line.
    pub fn poll(&mut self, state: &mut AnimationState, now_ms: u32) -> Option<Outcome> {
        if self.show_menu {
            self.print(&menu_prompt(state.is_active()));
            self.show_menu = false;
        }

        let line = match self.input.try_recv() {
            Ok(line) => line,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                if !self.disconnected {
                    tracing::info!("Menu input disconnected, running without operator");
                    self.disconnected = true;
                }
                return None;
            }
        };

        let code = parse_int(&line)?;
        if code <= 0 {
            return None;
        }
        self.print(&format!(">{code}\n"));
        // A positive number always brings the menu back, valid or not.
        self.show_menu = true;

        match Command::from_code(code) {
            Ok(Some(command)) => {
                command.apply(state, now_ms);
                tracing::info!(
                    "Command {:?}: active={}, mode={}",
                    command,
                    state.is_active(),
                    state.mode()
                );
                if matches!(command, Command::Wave | Command::Invert) {
                    self.print(&format!("{} mode selected\n", state.mode()));
                }
                Some(Outcome::Applied(command))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("{}", e);
                self.print(&format!("'{code}' is not a valid menu option.  Try harder.\n"));
                Some(Outcome::Invalid(code))
            }
        }
    }

    fn print(&mut self, text: &str) {
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(e) = result {
            tracing::warn!("Failed to write menu output: {}", e);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
