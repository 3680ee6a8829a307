//! Terminal input and rendering for the interactive client.
//!
//! The session talks to the terminal only through [`Console`], so it can be
//! driven by a scripted console in tests.

use crate::executor::ExecutionReport;
use crate::response_parser::Suggestion;
use crate::selector::SelectionNotice;
use anyhow::Result;
use colored::*;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::time::Duration;
use tracing::warn;

pub const QUERY_PROMPT: &str = "Query? (or 'q' to quit): ";
const EDIT_PROMPT: &str = "Edit command: ";

/// A keypress while choosing a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    /// Ctrl-C or Esc.
    Interrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Commit(String),
    Cancelled,
}

/// Informational messages shown between steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NoSuggestions,
    Selection(SelectionNotice),
    RequestFailed(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSuggestions => write!(f, "No suggestions found. Try rephrasing the query."),
            Self::Selection(notice) => write!(f, "{}", notice),
            Self::RequestFailed(message) => write!(f, "Failed to get suggestions: {}", message),
        }
    }
}

pub trait Console {
    /// Next query, or `None` when input is closed.
    fn read_query(&mut self) -> Result<Option<String>>;

    fn start_status(&mut self, message: &str);

    fn stop_status(&mut self);

    fn show_suggestions(&mut self, suggestions: &[Suggestion]);

    fn read_selection_key(&mut self) -> Result<KeyInput>;

    /// Let the user edit `command` in place.
    fn edit_command(&mut self, command: &str) -> Result<EditOutcome>;

    fn show_execution(&mut self, command: &str, report: &ExecutionReport);

    fn show_quick_result(&mut self, command: &str);

    fn notice(&mut self, notice: Notice);
}

/// Color a command: program name bold cyan, flags yellow, arguments green.
pub fn colorize_command(command: &str) -> String {
    command
        .split_whitespace()
        .enumerate()
        .map(|(i, token)| {
            if i == 0 {
                token.cyan().bold().to_string()
            } else if token.starts_with('-') {
                token.yellow().to_string()
            } else {
                token.green().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render the numbered selection table.
pub fn format_table(suggestions: &[Suggestion]) -> String {
    let width = suggestions
        .iter()
        .map(|s| s.command.chars().count())
        .max()
        .unwrap_or(0)
        .max("Command".len());

    let mut out = format!(
        "{}  {}{}  {}\n",
        "#".bold(),
        "Command".bold(),
        " ".repeat(width - "Command".len()),
        "Explanation".bold()
    );
    for (i, suggestion) in suggestions.iter().enumerate() {
        let pad = width - suggestion.command.chars().count();
        out.push_str(&format!(
            "{}  {}{}  {}\n",
            i.to_string().bright_white(),
            colorize_command(&suggestion.command),
            " ".repeat(pad),
            suggestion.explanation.dimmed()
        ));
    }
    out
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to leave raw mode: {}", e);
        }
    }
}

/// Console backed by the real terminal.
pub struct TerminalConsole {
    editor: DefaultEditor,
    spinner: Option<ProgressBar>,
}

impl TerminalConsole {
    /// `history` seeds the line editor so earlier commands can be recalled.
    pub fn new(history: &[String]) -> Result<Self> {
        let mut editor = DefaultEditor::new()?;
        for entry in history {
            if let Err(e) = editor.add_history_entry(entry.as_str()) {
                warn!("Failed to add line to history: {}", e);
            }
        }
        Ok(Self {
            editor,
            spinner: None,
        })
    }
}

impl Console for TerminalConsole {
    fn read_query(&mut self) -> Result<Option<String>> {
        match self.editor.readline(QUERY_PROMPT) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn start_status(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.dimmed().to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    fn stop_status(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn show_suggestions(&mut self, suggestions: &[Suggestion]) {
        println!();
        print!("{}", format_table(suggestions));
        println!(
            "\n{}",
            format!(
                "Press 0-{} to edit and run, 'n' for a new query, 'q' to quit",
                suggestions.len().saturating_sub(1)
            )
            .dimmed()
        );
    }

    fn read_selection_key(&mut self) -> Result<KeyInput> {
        let _raw = RawModeGuard::enable()?;
        loop {
            if let Event::Key(KeyEvent {
                code,
                modifiers,
                kind: KeyEventKind::Press,
                ..
            }) = event::read()?
            {
                match code {
                    KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(KeyInput::Interrupt);
                    }
                    KeyCode::Esc => return Ok(KeyInput::Interrupt),
                    KeyCode::Char(c) => return Ok(KeyInput::Char(c)),
                    _ => {}
                }
            }
        }
    }

    fn edit_command(&mut self, command: &str) -> Result<EditOutcome> {
        match self.editor.readline_with_initial(EDIT_PROMPT, (command, "")) {
            Ok(line) => Ok(EditOutcome::Commit(line)),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(EditOutcome::Cancelled),
            Err(e) => Err(e.into()),
        }
    }

    fn show_execution(&mut self, command: &str, report: &ExecutionReport) {
        if let Err(e) = self.editor.add_history_entry(command) {
            warn!("Failed to add line to history: {}", e);
        }
        println!("{} {}", "$".dimmed(), colorize_command(command));
        let text = report.display_text();
        if report.success {
            println!("{}", text);
        } else {
            println!("{}", text.red());
        }
    }

    fn show_quick_result(&mut self, command: &str) {
        println!("{}", command);
    }

    fn notice(&mut self, notice: Notice) {
        match notice {
            Notice::RequestFailed(_) => eprintln!("{}", notice.to_string().red()),
            _ => println!("{}", notice.to_string().yellow()),
        }
    }
}
