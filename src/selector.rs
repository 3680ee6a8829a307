//! Keypress-driven selection over a list of suggestions.
//!
//! The selector knows nothing about the terminal: it consumes characters and
//! reports what the caller should show or do next, so the whole flow can be
//! driven by synthetic input.

use crate::response_parser::Suggestion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionState {
    AwaitingSelection,
    /// The suggestion at `index` is being edited.
    Editing { index: usize },
    /// `command` has been committed and is running.
    Executing { command: String },
    /// The user asked for a new query.
    NewQuery,
    Quit,
}

/// Feedback for a key that did not change the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionNotice {
    OutOfRange { key: char, count: usize },
    InvalidKey(char),
    /// The key arrived in a state that does not accept keys.
    NotAwaitingSelection,
}

impl std::fmt::Display for SelectionNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { key, count } => write!(
                f,
                "Suggestion {} does not exist; choose 0-{}",
                key,
                count.saturating_sub(1)
            ),
            Self::InvalidKey(key) => write!(
                f,
                "Invalid input {:?}: press a number, 'n' for a new query or 'q' to quit",
                key
            ),
            Self::NotAwaitingSelection => write!(f, "Not waiting for a selection"),
        }
    }
}

pub struct Selector {
    suggestions: Vec<Suggestion>,
    state: SelectionState,
}

impl Selector {
    pub fn new(suggestions: Vec<Suggestion>) -> Self {
        Self {
            suggestions,
            state: SelectionState::AwaitingSelection,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    /// Whether the selector has reached one of its exits.
    pub fn is_done(&self) -> bool {
        matches!(self.state, SelectionState::NewQuery | SelectionState::Quit)
    }

    /// Apply a keypress while awaiting a selection.
    ///
    /// Rejected keys leave the state untouched.
    pub fn handle_key(&mut self, key: char) -> Result<&SelectionState, SelectionNotice> {
        if self.state != SelectionState::AwaitingSelection {
            return Err(SelectionNotice::NotAwaitingSelection);
        }

        self.state = match key {
            'q' => SelectionState::Quit,
            'n' => SelectionState::NewQuery,
            digit @ '0'..='9' => {
                let index = digit as usize - '0' as usize;
                if index >= self.suggestions.len() {
                    return Err(SelectionNotice::OutOfRange {
                        key,
                        count: self.suggestions.len(),
                    });
                }
                SelectionState::Editing { index }
            }
            other => return Err(SelectionNotice::InvalidKey(other)),
        };
        Ok(&self.state)
    }

    /// The command to pre-fill in the editor, if editing.
    pub fn editing_command(&self) -> Option<&str> {
        match self.state {
            SelectionState::Editing { index } => Some(&self.suggestions[index].command),
            _ => None,
        }
    }

    /// Commit the edited line; a blank edit keeps the original command.
    ///
    /// Returns the command to run, or `None` if not editing.
    pub fn commit_edit(&mut self, edited: &str) -> Option<String> {
        let original = self.editing_command()?;
        let command = if edited.trim().is_empty() {
            original.to_string()
        } else {
            edited.trim().to_string()
        };
        self.state = SelectionState::Executing {
            command: command.clone(),
        };
        Some(command)
    }

    /// Abandon the edit and go back to choosing.
    pub fn cancel_edit(&mut self) {
        if matches!(self.state, SelectionState::Editing { .. }) {
            self.state = SelectionState::AwaitingSelection;
        }
    }

    /// The running command finished; offer the list again.
    pub fn finish_execution(&mut self) {
        if matches!(self.state, SelectionState::Executing { .. }) {
            self.state = SelectionState::AwaitingSelection;
        }
    }
}
