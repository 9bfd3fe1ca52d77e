//! Per-item raw configuration, as supplied by the caller for each work item.

use crate::types::Message;
use serde::{Deserialize, Serialize};

/// A unit of work: the item's position in the input plus its raw configuration.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub index: usize,
    pub config: ItemConfig,
}

impl WorkItem {
    pub fn new(index: usize, config: ItemConfig) -> Self {
        Self { index, config }
    }

    /// Number a sequence of configurations by input position.
    pub fn sequence(configs: impl IntoIterator<Item = ItemConfig>) -> Vec<WorkItem> {
        configs
            .into_iter()
            .enumerate()
            .map(|(index, config)| WorkItem::new(index, config))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemConfig {
    #[serde(default)]
    pub deployment: DeploymentSelection,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub determinism: DeterminismConfig,
    #[serde(default)]
    pub options: SamplingOverrides,
    #[serde(default)]
    pub output: OutputFlags,
}

impl ItemConfig {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn deployment(mut self, selection: DeploymentSelection) -> Self {
        self.deployment = selection;
        self
    }

    pub fn seed(mut self, seed: i32) -> Self {
        self.determinism = DeterminismConfig {
            enabled: true,
            seed,
        };
        self
    }

    pub fn options(mut self, options: SamplingOverrides) -> Self {
        self.options = options;
        self
    }

    pub fn output(mut self, output: OutputFlags) -> Self {
        self.output = output;
        self
    }
}

/// Which deployment the item is routed to.
///
/// Accepts `"use_default"`, one of the preset names, or `{custom: "<name>"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDeployment", into = "RawDeployment")]
pub enum DeploymentSelection {
    #[default]
    UseDefault,
    Gpt4oMini,
    Gpt4o,
    Custom(String),
}

impl DeploymentSelection {
    pub fn custom(name: impl Into<String>) -> Self {
        DeploymentSelection::Custom(name.into())
    }

    /// The literal deployment identifier of a preset.
    pub fn preset_name(&self) -> Option<&'static str> {
        match self {
            DeploymentSelection::Gpt4oMini => Some("gpt-4o-mini"),
            DeploymentSelection::Gpt4o => Some("gpt-4o"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDeployment {
    Name(String),
    Custom { custom: String },
}

impl TryFrom<RawDeployment> for DeploymentSelection {
    type Error = String;

    fn try_from(raw: RawDeployment) -> Result<Self, Self::Error> {
        match raw {
            RawDeployment::Custom { custom } => Ok(DeploymentSelection::Custom(custom)),
            RawDeployment::Name(name) => match name.as_str() {
                "use_default" => Ok(DeploymentSelection::UseDefault),
                "gpt-4o-mini" => Ok(DeploymentSelection::Gpt4oMini),
                "gpt-4o" => Ok(DeploymentSelection::Gpt4o),
                "custom" => Ok(DeploymentSelection::Custom(String::new())),
                other => Err(format!(
                    "unknown deployment selection `{}` (expected use_default, gpt-4o-mini, gpt-4o or {{custom: <name>}})",
                    other
                )),
            },
        }
    }
}

impl From<DeploymentSelection> for RawDeployment {
    fn from(selection: DeploymentSelection) -> Self {
        match selection {
            DeploymentSelection::UseDefault => RawDeployment::Name("use_default".into()),
            DeploymentSelection::Custom(custom) => RawDeployment::Custom { custom },
            preset => RawDeployment::Name(preset.preset_name().unwrap_or_default().into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_seed")]
    pub seed: i32,
}

fn default_seed() -> i32 {
    42
}

impl Default for DeterminismConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            seed: default_seed(),
        }
    }
}

/// Optional sampling knobs. `None` leaves the remote default in effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingOverrides {
    pub frequency_penalty: Option<f64>,
    pub max_tokens: Option<u32>,
    pub n: Option<u32>,
    pub presence_penalty: Option<f64>,
    pub stop: Option<StopInput>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub user: Option<String>,
}

/// Stop sequences, either as one comma-delimited string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopInput {
    Delimited(String),
    List(Vec<String>),
}

/// Output-shaping switches for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFlags {
    pub simplify: bool,
    pub full_response: bool,
    pub content_as_json: bool,
    pub include_debug: bool,
}

impl Default for OutputFlags {
    fn default() -> Self {
        Self {
            simplify: true,
            full_response: false,
            content_as_json: false,
            include_debug: false,
        }
    }
}
