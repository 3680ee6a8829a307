//! The interactive query → select → edit → run loop.

use crate::client::SuggestionSource;
use crate::executor::{Executor, ProcessRunner};
use crate::history::CommandHistory;
use crate::response_parser;
use crate::selector::{SelectionState, Selector};
use crate::terminal::{Console, EditOutcome, KeyInput, Notice};
use anyhow::Result;
use tracing::{debug, info, warn};

/// How a round of selection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundExit {
    NewQuery,
    Quit,
}

pub fn is_exit_command(input: &str) -> bool {
    matches!(
        input.trim().to_lowercase().as_str(),
        "q" | "quit" | "exit"
    )
}

pub struct Session<C, S, R>
where
    C: Console,
    S: SuggestionSource,
    R: ProcessRunner,
{
    console: C,
    source: S,
    executor: Executor<R>,
    history: CommandHistory,
}

impl<C, S, R> Session<C, S, R>
where
    C: Console,
    S: SuggestionSource,
    R: ProcessRunner,
{
    pub fn new(console: C, source: S, executor: Executor<R>, history: CommandHistory) -> Self {
        Self {
            console,
            source,
            executor,
            history,
        }
    }

    /// Run until the user quits. `initial_query` is handled before prompting.
    pub async fn run(&mut self, initial_query: Option<String>) -> Result<()> {
        let mut pending = initial_query;
        loop {
            let query = match pending.take() {
                Some(query) => query,
                None => match self.console.read_query()? {
                    Some(query) => query,
                    None => break,
                },
            };

            let query = query.trim();
            if query.is_empty() {
                continue;
            }
            if is_exit_command(query) {
                break;
            }

            if self.handle_query(query).await? == RoundExit::Quit {
                break;
            }
        }
        info!("Session finished");
        Ok(())
    }

    /// Fetch one command and print it without the selection table.
    pub async fn run_quick(&mut self, query: &str) -> Result<()> {
        self.console.start_status("Thinking...");
        let result = self.source.quick_suggestion(query).await;
        self.console.stop_status();

        self.console.show_quick_result(result?.trim());
        Ok(())
    }

    async fn handle_query(&mut self, query: &str) -> Result<RoundExit> {
        self.console.start_status("Generating suggestions...");
        let result = self.source.suggestions(query).await;
        self.console.stop_status();

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                warn!("Suggestion request failed: {:#}", e);
                self.console.notice(Notice::RequestFailed(format!("{:#}", e)));
                return Ok(RoundExit::NewQuery);
            }
        };
        debug!("Backend response:\n{}", text);

        let suggestions = response_parser::parse(&text);
        if suggestions.is_empty() {
            self.console.notice(Notice::NoSuggestions);
            return Ok(RoundExit::NewQuery);
        }

        self.select(Selector::new(suggestions)).await
    }

    async fn select(&mut self, mut selector: Selector) -> Result<RoundExit> {
        let mut redraw = true;
        loop {
            match selector.state().clone() {
                SelectionState::AwaitingSelection => {
                    if redraw {
                        self.console.show_suggestions(selector.suggestions());
                        redraw = false;
                    }
                    match self.console.read_selection_key()? {
                        KeyInput::Char(key) => {
                            if let Err(notice) = selector.handle_key(key) {
                                self.console.notice(Notice::Selection(notice));
                            }
                        }
                        KeyInput::Interrupt => return Ok(RoundExit::Quit),
                    }
                }
                SelectionState::Editing { .. } => {
                    let original = selector.editing_command().unwrap_or_default().to_string();
                    match self.console.edit_command(&original)? {
                        EditOutcome::Commit(line) => {
                            selector.commit_edit(&line);
                        }
                        EditOutcome::Cancelled => {
                            selector.cancel_edit();
                            redraw = true;
                        }
                    }
                }
                SelectionState::Executing { command } => {
                    self.console.start_status("Running...");
                    let report = self.executor.execute(&command).await;
                    self.console.stop_status();
                    self.console.show_execution(&command, &report);

                    if let Err(e) = self.history.append(&command) {
                        warn!("Failed to save command to history: {:#}", e);
                    }

                    selector.finish_execution();
                    redraw = true;
                }
                SelectionState::NewQuery => return Ok(RoundExit::NewQuery),
                SelectionState::Quit => return Ok(RoundExit::Quit),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionReport;
    use crate::executor::tests::MockProcessRunner;
    use crate::response_parser::Suggestion;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::fs;
    use tempfile::TempDir;

    /// Console fed from scripted input that records everything shown.
    #[derive(Default)]
    struct ScriptedConsole {
        queries: VecDeque<Option<String>>,
        keys: VecDeque<KeyInput>,
        edits: VecDeque<EditOutcome>,
        tables_shown: usize,
        edited: Vec<String>,
        executions: Vec<(String, ExecutionReport)>,
        quick_results: Vec<String>,
        notices: Vec<Notice>,
    }

    impl ScriptedConsole {
        fn queries(mut self, queries: &[&str]) -> Self {
            self.queries = queries.iter().map(|q| Some(q.to_string())).collect();
            self
        }

        fn keys(mut self, keys: &str) -> Self {
            self.keys = keys.chars().map(KeyInput::Char).collect();
            self
        }

        fn edits(mut self, edits: Vec<EditOutcome>) -> Self {
            self.edits = edits.into();
            self
        }
    }

    impl Console for ScriptedConsole {
        fn read_query(&mut self) -> Result<Option<String>> {
            Ok(self.queries.pop_front().flatten())
        }

        fn start_status(&mut self, _message: &str) {}

        fn stop_status(&mut self) {}

        fn show_suggestions(&mut self, _suggestions: &[Suggestion]) {
            self.tables_shown += 1;
        }

        fn read_selection_key(&mut self) -> Result<KeyInput> {
            Ok(self.keys.pop_front().unwrap_or(KeyInput::Interrupt))
        }

        fn edit_command(&mut self, command: &str) -> Result<EditOutcome> {
            self.edited.push(command.to_string());
            Ok(self.edits.pop_front().unwrap_or(EditOutcome::Cancelled))
        }

        fn show_execution(&mut self, command: &str, report: &ExecutionReport) {
            self.executions.push((command.to_string(), report.clone()));
        }

        fn show_quick_result(&mut self, command: &str) {
            self.quick_results.push(command.to_string());
        }

        fn notice(&mut self, notice: Notice) {
            self.notices.push(notice);
        }
    }

    struct FixedSource {
        full: Result<String, String>,
        quick: String,
    }

    impl FixedSource {
        fn full(text: &str) -> Self {
            Self {
                full: Ok(text.to_string()),
                quick: String::new(),
            }
        }

        fn quick(text: &str) -> Self {
            Self {
                full: Ok(String::new()),
                quick: text.to_string(),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                full: Err(message.to_string()),
                quick: String::new(),
            }
        }
    }

    #[async_trait]
    impl SuggestionSource for FixedSource {
        async fn suggestions(&self, _query: &str) -> Result<String> {
            self.full.clone().map_err(anyhow::Error::msg)
        }

        async fn quick_suggestion(&self, _query: &str) -> Result<String> {
            Ok(self.quick.clone())
        }
    }

    const LISTING: &str = "0. ls - list files\n1. ls -la - list all files\n2. tree - show tree";

    fn session(
        console: ScriptedConsole,
        source: FixedSource,
        runner: MockProcessRunner,
        history: CommandHistory,
    ) -> Session<ScriptedConsole, FixedSource, MockProcessRunner> {
        Session::new(console, source, Executor::with_runner(runner), history)
    }

    #[tokio::test]
    async fn test_select_edit_run_then_quit() {
        let temp = TempDir::new().unwrap();
        let history = CommandHistory::new(temp.path().join("history"));
        let console = ScriptedConsole::default()
            .keys("1q")
            .edits(vec![EditOutcome::Commit("ls -la /tmp".into())]);
        let mut session = session(
            console,
            FixedSource::full(LISTING),
            MockProcessRunner::success("file\n"),
            history.clone(),
        );

        session.run(Some("list files".into())).await.unwrap();

        assert_eq!(session.console.edited, vec!["ls -la"]);
        assert_eq!(session.console.executions.len(), 1);
        assert_eq!(session.console.executions[0].0, "ls -la /tmp");
        assert_eq!(session.console.tables_shown, 2);
        assert_eq!(history.load().unwrap(), vec!["ls -la /tmp"]);
    }

    #[tokio::test]
    async fn test_out_of_range_key_shows_notice_and_keeps_waiting() {
        let temp = TempDir::new().unwrap();
        let console = ScriptedConsole::default().keys("5xq");
        let mut session = session(
            console,
            FixedSource::full(LISTING),
            MockProcessRunner::success(""),
            CommandHistory::new(temp.path().join("history")),
        );

        session.run(Some("list".into())).await.unwrap();

        assert_eq!(session.console.notices.len(), 2);
        assert!(matches!(session.console.notices[0], Notice::Selection(_)));
        assert_eq!(session.console.tables_shown, 1);
        assert!(session.console.executions.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_edit_returns_to_selection() {
        let temp = TempDir::new().unwrap();
        let console = ScriptedConsole::default()
            .keys("0q")
            .edits(vec![EditOutcome::Cancelled]);
        let mut session = session(
            console,
            FixedSource::full(LISTING),
            MockProcessRunner::success(""),
            CommandHistory::new(temp.path().join("history")),
        );

        session.run(Some("list".into())).await.unwrap();

        assert!(session.console.executions.is_empty());
        assert_eq!(session.console.tables_shown, 2);
    }

    #[tokio::test]
    async fn test_failed_command_is_shown_and_still_recorded() {
        let temp = TempDir::new().unwrap();
        let history = CommandHistory::new(temp.path().join("history"));
        let console = ScriptedConsole::default()
            .keys("2q")
            .edits(vec![EditOutcome::Commit(String::new())]);
        let mut session = session(
            console,
            FixedSource::full(LISTING),
            MockProcessRunner::failure("tree: command not found"),
            history.clone(),
        );

        session.run(Some("tree".into())).await.unwrap();

        let (command, report) = &session.console.executions[0];
        assert_eq!(command, "tree");
        assert!(!report.success);
        assert_eq!(report.display_text(), "Error: tree: command not found");
        assert_eq!(history.load().unwrap(), vec!["tree"]);
    }

    #[tokio::test]
    async fn test_history_failure_does_not_abort_session() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, "").unwrap();
        let console = ScriptedConsole::default()
            .keys("00q")
            .edits(vec![
                EditOutcome::Commit("ls".into()),
                EditOutcome::Commit("ls".into()),
            ]);
        let mut session = session(
            console,
            FixedSource::full(LISTING),
            MockProcessRunner::success("a"),
            CommandHistory::new(blocker.join("history")),
        );

        session.run(Some("list".into())).await.unwrap();

        assert_eq!(session.console.executions.len(), 2);
    }

    #[tokio::test]
    async fn test_new_query_then_exit_word() {
        let temp = TempDir::new().unwrap();
        let console = ScriptedConsole::default()
            .queries(&["  ", "show disk usage", "quit"])
            .keys("nn");
        let mut session = session(
            console,
            FixedSource::full(LISTING),
            MockProcessRunner::success(""),
            CommandHistory::new(temp.path().join("history")),
        );

        session.run(None).await.unwrap();

        assert_eq!(session.console.tables_shown, 1);
        assert!(session.console.queries.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_response_shows_notice() {
        let temp = TempDir::new().unwrap();
        let console = ScriptedConsole::default().queries(&["exit"]);
        let mut session = session(
            console,
            FixedSource::full("I cannot help with that."),
            MockProcessRunner::success(""),
            CommandHistory::new(temp.path().join("history")),
        );

        session.run(Some("???".into())).await.unwrap();

        assert_eq!(session.console.notices, vec![Notice::NoSuggestions]);
        assert_eq!(session.console.tables_shown, 0);
    }

    #[tokio::test]
    async fn test_request_failure_returns_to_prompt() {
        let temp = TempDir::new().unwrap();
        let console = ScriptedConsole::default();
        let mut session = session(
            console,
            FixedSource::failing("Server error (503): No generative backend is available"),
            MockProcessRunner::success(""),
            CommandHistory::new(temp.path().join("history")),
        );

        session.run(Some("list".into())).await.unwrap();

        assert!(matches!(
            &session.console.notices[0],
            Notice::RequestFailed(m) if m.contains("503")
        ));
    }

    #[tokio::test]
    async fn test_interrupt_during_selection_quits() {
        let temp = TempDir::new().unwrap();
        let console = ScriptedConsole::default().queries(&["never read"]);
        let mut session = session(
            console,
            FixedSource::full(LISTING),
            MockProcessRunner::success(""),
            CommandHistory::new(temp.path().join("history")),
        );

        session.run(Some("list".into())).await.unwrap();

        assert_eq!(session.console.queries.len(), 1);
    }

    #[tokio::test]
    async fn test_quick_mode_prints_single_command() {
        let temp = TempDir::new().unwrap();
        let mut session = session(
            ScriptedConsole::default(),
            FixedSource::quick("git reset --soft HEAD~1\n"),
            MockProcessRunner::success(""),
            CommandHistory::new(temp.path().join("history")),
        );

        session.run_quick("undo last commit").await.unwrap();

        assert_eq!(session.console.quick_results, vec!["git reset --soft HEAD~1"]);
    }

    #[test]
    fn test_exit_commands() {
        assert!(is_exit_command("q"));
        assert!(is_exit_command(" Quit "));
        assert!(is_exit_command("EXIT"));
        assert!(!is_exit_command("quit vim"));
    }
}
