//! Instruction text sent to the generative backend.
//!
//! Full mode asks for a ranked, numbered list of `<command> - <explanation>`
//! lines that the client parses into a selection table. Quick mode asks for a
//! single command that can be pasted straight into a shell.

use crate::classifier::Classification;

/// Label used for non-git commands in the prompts.
pub const DEFAULT_COMMAND_TYPE: &str = "CLI";

/// Upper bound on list entries requested in full mode.
pub const MAX_FULL_SUGGESTIONS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Full,
    Quick,
}

const SHELL_SAFE_RULES: &str = "Do not wrap commands in markdown, code fences or backticks.
Never put unescaped double quotes inside a double-quoted argument; prefer single quotes so the command survives shell parsing.";

const COMMIT_MESSAGE_RULES: &str = "Rewrite the commit message to follow the Conventional Commits specification.
The subject line is `<type>(<optional scope>): <description>` and stays under 72 characters.
Separate the subject from the body with a blank line by passing the subject and the body as two separate -m arguments.
Wrap the body at about 72 columns.
Output a single git commit invocation and nothing else.";

pub fn build(
    query: &str,
    classification: Classification,
    command_type: &str,
    system_info: &str,
    mode: PromptMode,
) -> String {
    match mode {
        PromptMode::Full => build_full(query, classification, command_type, system_info),
        PromptMode::Quick => build_quick(query, classification, command_type, system_info),
    }
}

fn build_full(
    query: &str,
    classification: Classification,
    command_type: &str,
    system_info: &str,
) -> String {
    let system_query = if classification.is_git {
        "Machine-readable output. You are a Git expert providing git commands that match the query.
Git commands are portable, so do not tailor them to an operating system.
Rank suggestions by relevance, most relevant first.
Explain what each git command does and how it works.
Output as a numbered list (starts with 0) in the format: <git command> - <explanation>."
            .to_string()
    } else {
        format!(
            "Machine-readable output. You are a CLI expert providing {command_type} commands that match the query.
The user's system is: {system_info}
Provide commands specific to this system.
Rank suggestions by relevance, most relevant first.
Explain what each command does and how it works.
Output as a numbered list (starts with 0) in the format: <command> - <explanation>."
        )
    };

    format!(
        "{system_query}\n{SHELL_SAFE_RULES}\n\nquery: {query}\n\nProvide up to {MAX_FULL_SUGGESTIONS} commands."
    )
}

fn build_quick(
    query: &str,
    classification: Classification,
    command_type: &str,
    system_info: &str,
) -> String {
    let mut system_query = if classification.is_git {
        "Machine-readable output.
Output JUST the command to run directly in the command line, with no explanation.
You are a Git expert providing the single best git command that matches the query."
            .to_string()
    } else {
        format!(
            "Machine-readable output.
Output JUST the command to run directly in the command line, with no explanation.
You are a CLI expert providing the single best {command_type} command that matches the query.
The user's system is: {system_info}
Provide a command specific to this system."
        )
    };

    system_query.push('\n');
    system_query.push_str(SHELL_SAFE_RULES);

    if classification.is_commit_message {
        system_query.push('\n');
        system_query.push_str(COMMIT_MESSAGE_RULES);
    }

    format!("{system_query}\n\nquery: {query}\n")
}
