//! # azure-chat-dispatch
//!
//! Batched, order-preserving dispatch of chat-completion requests to Azure OpenAI
//! deployments.
//!
//! ## Overview
//!
//! A run takes a list of work items (messages plus per-item options), turns each
//! into a canonical request body, sends them in contiguous batches with a fixed
//! concurrency ceiling, and returns exactly one result per item at its input
//! position. Per-item failures either become inline error records or abort the
//! whole run.
//!
//! ## Key Features
//!
//! - **Reproducible requests**: bodies are serialized with a fixed key order and
//!   an optional seed that pins the temperature to 0
//! - **Bounded concurrency**: preset or custom batch sizes, batches run as barriers
//! - **Stable ordering**: results line up with inputs whatever order responses arrive in
//! - **Output shaping**: full, simplified or raw payloads, with optional JSON extraction
//!   from the message content
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use azure_chat_dispatch::{ChatDispatcher, ConcurrencyMode, ItemConfig, Message, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> azure_chat_dispatch::Result<()> {
//!     let dispatcher = ChatDispatcher::builder()
//!         .service(
//!             ServiceConfig::new("https://my-resource.openai.azure.com", "api-key")
//!                 .with_deployment("gpt-4o-mini"),
//!         )
//!         .concurrency(ConcurrencyMode::Medium)
//!         .continue_on_failure(true)
//!         .build()?;
//!
//!     let items = vec![
//!         ItemConfig::new(vec![Message::user("Name a prime number")]).seed(7),
//!         ItemConfig::new(vec![Message::user("Name a colour")]),
//!     ];
//!
//!     let report = dispatcher.run(items).await?;
//!     for record in &report.results {
//!         println!("{}", serde_json::to_string(record)?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`request`] | Work items, parameter resolution, canonical request bodies |
//! | [`batch`] | Concurrency modes, partitioning and the batch executor |
//! | [`transport`] | Transport trait and the reqwest-backed HTTP transport |
//! | [`shape`] | Output modes and JSON-content extraction |
//! | [`classify`] | Failure records and the continue/abort policy |
//! | [`client`] | The [`ChatDispatcher`] facade and its builder |
//! | [`config`] | Service settings, run options and run documents |
//! | [`types`] | Chat message types |

pub mod batch;
pub mod classify;
pub mod client;
pub mod config;
pub mod request;
pub mod shape;
pub mod transport;
pub mod types;

pub use batch::{ConcurrencyMode, ResultRecord, RunReport, RunStats};
pub use classify::{ErrorRecord, FailureClass, FailurePolicy, StatusCode};
pub use client::{ChatDispatcher, ChatDispatcherBuilder};
pub use config::{RunDocument, RunOptions, ServiceConfig};
pub use request::{DeploymentSelection, ItemConfig, OutputFlags, RequestBody, SamplingOverrides};
pub use shape::OutputMode;
pub use types::{Message, MessageRole};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
