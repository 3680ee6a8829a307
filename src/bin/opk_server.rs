use clap::{Arg, Command, value_parser};
use optionk::backends;
use optionk::classifier::QueryClassifier;
use optionk::config::Config;
use optionk::error::ConfigError;
use optionk::generation_gateway::GenerationGateway;
use optionk::http_client::ReqwestHttpClient;
use optionk::server::{self, AppState};
use optionk::system_info;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("opk-server")
        .about("Local suggestion server for opk")
        .arg(Arg::new("config")
            .long("config")
            .help("Path to the configuration file")
            .value_name("PATH")
            .value_parser(value_parser!(PathBuf)))
        .get_matches();

    let config = Config::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if config.freshly_created
        && let Some(path) = config.source.clone()
    {
        return Err(ConfigError::TemplateCreated(path).into());
    }
    let settings = config.server_settings()?;

    let backend = backends::from_settings(&settings.backend, Arc::new(ReqwestHttpClient::new()));
    let system_info = system_info::current().to_string();
    info!("System: {}", system_info);

    let shutdown = CancellationToken::new();
    tokio::spawn(server::shutdown_signal(shutdown.clone()));

    let state = AppState::new(
        GenerationGateway::new(backend),
        QueryClassifier::new(settings.fuzzy_threshold),
        system_info,
        shutdown,
    );

    server::serve(settings.port, state).await
}
