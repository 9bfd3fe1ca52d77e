//! Run configuration: service connection settings, run options and run documents.
//!
//! A run document is YAML (or JSON, which parses as YAML):
//!
//! ```yaml
//! service:
//!   endpoint: https://my-resource.openai.azure.com
//!   deployment: gpt-4o-mini
//! run:
//!   concurrency: { mode: custom, requests: 8 }
//!   continue_on_failure: true
//! items:
//!   - messages:
//!       - { role: user, content: "Summarise RFC 9110 in one line" }
//! ```
//!
//! Service fields the document leaves out are read from `AZURE_OPENAI_ENDPOINT`,
//! `AZURE_OPENAI_API_KEY`, `AZURE_OPENAI_API_VERSION` and `AZURE_OPENAI_DEPLOYMENT`.

use crate::batch::ConcurrencyMode;
use crate::request::{ItemConfig, WorkItem};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

pub const DEFAULT_API_VERSION: &str = "2025-01-01-preview";

/// Connection settings, read once per run and shared read-only by every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default)]
    pub api_version: String,
    /// Deployment used by items that select `use_default`.
    #[serde(default)]
    pub deployment: String,
}

impl ServiceConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            deployment: String::new(),
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = deployment.into();
        self
    }

    pub fn from_env() -> Self {
        Self::default().fill_from_env()
    }

    /// Fill empty fields from the environment, then default the API version.
    pub fn fill_from_env(mut self) -> Self {
        fill(&mut self.endpoint, "AZURE_OPENAI_ENDPOINT");
        fill(&mut self.api_key, "AZURE_OPENAI_API_KEY");
        fill(&mut self.api_version, "AZURE_OPENAI_API_VERSION");
        fill(&mut self.deployment, "AZURE_OPENAI_DEPLOYMENT");
        if self.api_version.trim().is_empty() {
            self.api_version = DEFAULT_API_VERSION.to_string();
        }
        self
    }

    /// Check the fields every request needs. The default deployment is optional
    /// here; it is only required by items that use it.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("service.endpoint", &self.endpoint),
            ("service.api_key", &self.api_key),
            ("service.api_version", &self.api_version),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::configuration_with_context(
                    "required service setting is missing",
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_source("service_config"),
                ));
            }
        }

        let parsed = url::Url::parse(&self.endpoint).map_err(|e| {
            Error::configuration_with_context(
                "endpoint is not a valid URL",
                ErrorContext::new()
                    .with_field_path("service.endpoint")
                    .with_details(e.to_string())
                    .with_source("service_config"),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                "endpoint must use http or https",
                ErrorContext::new()
                    .with_field_path("service.endpoint")
                    .with_details(parsed.scheme().to_string())
                    .with_source("service_config"),
            ));
        }
        Ok(())
    }

    /// Endpoint without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// `POST` target for a deployment's chat completions.
    pub fn chat_completions_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.base_url(),
            deployment,
            self.api_version
        )
    }

    /// `GET` target for the model listing.
    pub fn models_url(&self) -> String {
        format!(
            "{}/openai/models?api-version={}",
            self.base_url(),
            self.api_version
        )
    }
}

fn fill(slot: &mut String, var: &str) {
    if slot.trim().is_empty() {
        if let Ok(value) = env::var(var) {
            *slot = value;
        }
    }
}

/// Run-level options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub concurrency: ConcurrencyMode,
    #[serde(default)]
    pub continue_on_failure: bool,
}

/// A complete run description: connection, options and work items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDocument {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub run: RunOptions,
    #[serde(default)]
    pub items: Vec<ItemConfig>,
}

impl RunDocument {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn work_items(&self) -> Vec<WorkItem> {
        WorkItem::sequence(self.items.iter().cloned())
    }
}
