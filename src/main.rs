use clap::{Arg, ArgAction, Command, value_parser};
use optionk::client::SuggestionClient;
use optionk::config::Config;
use optionk::executor::Executor;
use optionk::history::CommandHistory;
use optionk::http_client::ReqwestHttpClient;
use optionk::session::Session;
use optionk::terminal::TerminalConsole;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("opk")
        .about("Turn plain-English queries into shell commands")
        .long_about("opk asks the local optionk server for command suggestions, lets you pick one with a single key, edit it and run it")
        .arg(Arg::new("query")
            .help("What you want to do, e.g. 'undo last commit'")
            .num_args(1..))
        .arg(Arg::new("quick")
            .long("quick")
            .short('q')
            .help("Print the single best command and exit")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("config")
            .long("config")
            .help("Path to the configuration file")
            .value_name("PATH")
            .value_parser(value_parser!(PathBuf)))
        .get_matches();

    let query = matches
        .get_many::<String>("query")
        .map(|words| words.cloned().collect::<Vec<_>>().join(" "))
        .filter(|query| !query.trim().is_empty());
    let quick = matches.get_flag("quick");
    if quick && query.is_none() {
        anyhow::bail!("--quick needs a query. Use 'opk --help' for usage information.");
    }

    let config_path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
    let config = Config::load_existing(config_path)?;
    let client = SuggestionClient::new(config.port()?, Arc::new(ReqwestHttpClient::new()));
    info!("Using server at {}", client.base_url());

    let history = CommandHistory::new(Config::history_path()?);
    if let Some(legacy) = Config::legacy_history_path()
        && let Err(e) = history.import_legacy(&legacy)
    {
        warn!("Failed to import legacy history: {:#}", e);
    }
    let entries = history.load().unwrap_or_else(|e| {
        warn!("Failed to load history: {:#}", e);
        Vec::new()
    });

    let console = TerminalConsole::new(&entries)?;
    let mut session = Session::new(console, client, Executor::new(), history);

    match query {
        Some(query) if quick => session.run_quick(&query).await,
        query => session.run(query).await,
    }
}
