//! optionk - plain-English queries in, shell commands out.
//!
//! The crate ships two binaries that share this library:
//!
//! - `opk-server` classifies a query, builds a prompt and asks a Gemini
//!   backend (Google AI Studio or Vertex AI) for command suggestions, over a
//!   loopback HTTP interface.
//! - `opk` fetches suggestions from the server, shows them as a numbered
//!   table, lets the user pick one with a single key, edit it in place and run
//!   it, and records executed commands in a history file.
//!
//! # Architecture
//!
//! Server side:
//!
//! - [`classifier`] - Git / commit-message detection
//! - [`prompt_builder`] - Full and quick prompt templates
//! - [`system_info`] - Cached host description
//! - [`generation_gateway`] - Deterministic calls into a [`generation_gateway::GenerativeBackend`]
//! - [`backends`] - Google AI Studio and Vertex AI implementations
//! - [`sse`] - Streamed response splitting
//! - [`server`] - axum router, error mapping and graceful shutdown
//!
//! Client side:
//!
//! - [`client`] - HTTP client for the server endpoints
//! - [`response_parser`] - Numbered list to [`response_parser::Suggestion`]s
//! - [`selector`] - Keypress-driven selection state machine
//! - [`terminal`] - Raw-mode keys, line editing, table and spinner
//! - [`executor`] - Shell execution with captured output
//! - [`history`] - Append-only command log
//! - [`session`] - The interactive loop tying the above together
//!
//! Shared: [`config`], [`error`], [`http_client`].
//!
//! # Example
//!
//! ```ignore
//! use optionk::classifier::QueryClassifier;
//! use optionk::prompt_builder::{self, PromptMode, DEFAULT_COMMAND_TYPE};
//!
//! let classification = QueryClassifier::default().classify("undo last commit");
//! assert!(classification.is_git);
//!
//! let prompt = prompt_builder::build(
//!     "undo last commit",
//!     classification,
//!     DEFAULT_COMMAND_TYPE,
//!     &optionk::system_info::current().to_string(),
//!     PromptMode::Quick,
//! );
//! ```

pub mod backends;
pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod generation_gateway;
pub mod history;
pub mod http_client;
pub mod prompt_builder;
pub mod response_parser;
pub mod selector;
pub mod server;
pub mod session;
pub mod sse;
pub mod system_info;
pub mod terminal;
