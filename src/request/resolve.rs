//! Parameter resolution: raw per-item configuration → validated request parameters.
//!
//! Resolution runs once per item before any batching, so every concurrent task
//! receives its own owned parameters and configuration errors surface before the
//! first request leaves the process.

use super::item::{DeploymentSelection, SamplingOverrides, StopInput, WorkItem};
use crate::shape::ShapeOptions;
use crate::types::Message;
use crate::{Error, ErrorContext, Result};

/// Sampling knobs that were explicitly set for the item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingOptions {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub completion_count: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeterminismSettings {
    pub enabled: bool,
    pub seed: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequestParams {
    pub index: usize,
    pub deployment_name: String,
    pub messages: Vec<Message>,
    pub sampling: SamplingOptions,
    pub determinism: DeterminismSettings,
    pub shaping: ShapeOptions,
}

/// Resolve one work item against the run-level default deployment.
pub fn resolve(item: &WorkItem, default_deployment: &str) -> Result<ResolvedRequestParams> {
    let config = &item.config;

    let deployment_name = match &config.deployment {
        DeploymentSelection::UseDefault => {
            if default_deployment.trim().is_empty() {
                return Err(config_error(
                    "no default deployment is configured",
                    "service.deployment",
                    item.index,
                ));
            }
            default_deployment.to_string()
        }
        DeploymentSelection::Custom(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(config_error(
                    "custom deployment name is blank",
                    format!("items[{}].deployment.custom", item.index),
                    item.index,
                ));
            }
            name.to_string()
        }
        preset => preset.preset_name().unwrap_or_default().to_string(),
    };

    if config.messages.is_empty() {
        return Err(config_error(
            "message list is empty",
            format!("items[{}].messages", item.index),
            item.index,
        ));
    }

    Ok(ResolvedRequestParams {
        index: item.index,
        deployment_name,
        messages: config.messages.clone(),
        sampling: resolve_sampling(&config.options),
        determinism: DeterminismSettings {
            enabled: config.determinism.enabled,
            seed: config.determinism.seed,
        },
        shaping: config.output.into(),
    })
}

/// Resolve every item up front; the first configuration error aborts resolution.
pub fn resolve_all(items: &[WorkItem], default_deployment: &str) -> Result<Vec<ResolvedRequestParams>> {
    items
        .iter()
        .map(|item| resolve(item, default_deployment))
        .collect()
}

fn resolve_sampling(raw: &SamplingOverrides) -> SamplingOptions {
    SamplingOptions {
        temperature: raw.temperature,
        top_p: raw.top_p,
        // zero means "unset" for counts and an empty user id is no user id
        max_tokens: raw.max_tokens.filter(|n| *n > 0),
        frequency_penalty: raw.frequency_penalty,
        presence_penalty: raw.presence_penalty,
        completion_count: raw.n.filter(|n| *n > 0),
        // a stop list with no usable token is not sent at all
        stop_sequences: raw.stop.as_ref().map(parse_stop).filter(|s| !s.is_empty()),
        user_id: raw.user.clone().filter(|u| !u.is_empty()),
    }
}

/// Split a comma-delimited stop list, trimming tokens and dropping empty ones.
pub fn parse_stop_sequences(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_stop(input: &StopInput) -> Vec<String> {
    match input {
        StopInput::Delimited(raw) => parse_stop_sequences(raw),
        StopInput::List(list) => list
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn config_error(msg: &str, field: impl Into<String>, index: usize) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(field)
            .with_details(format!("item {}", index))
            .with_source("parameter_resolver"),
    )
}
