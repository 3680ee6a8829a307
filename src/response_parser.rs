//! Turns the backend's numbered list into [`Suggestion`]s.

/// The most suggestions a response can yield; one per digit key.
pub const MAX_SUGGESTIONS: usize = 10;

/// A single command proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub command: String,
    pub explanation: String,
}

impl Suggestion {
    pub fn new(command: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            explanation: explanation.into(),
        }
    }
}

/// Extract up to [`MAX_SUGGESTIONS`] suggestions from `"N. <command> - <explanation>"`
/// lines, in the order the backend produced them.
///
/// Lines that do not start with a digit and a dot are ignored, as are lines
/// whose command is empty once markup is removed.
pub fn parse(text: &str) -> Vec<Suggestion> {
    text.lines()
        .filter_map(parse_line)
        .take(MAX_SUGGESTIONS)
        .collect()
}

fn parse_line(line: &str) -> Option<Suggestion> {
    let line = line.trim();
    let mut chars = line.chars();
    if !matches!((chars.next(), chars.next()), (Some('0'..='9'), Some('.'))) {
        return None;
    }

    let (command, explanation) = match line.split_once(" - ") {
        Some((command, explanation)) => (command, explanation.trim()),
        None => (line, ""),
    };

    let command = clean_command(&command[2..]);
    if command.is_empty() {
        return None;
    }

    Some(Suggestion::new(command, explanation))
}

fn clean_command(raw: &str) -> String {
    raw.trim_matches(|c: char| c == '`' || c == '*' || c.is_whitespace())
        .to_string()
}
