//! Canonical chat-completion request body.
//!
//! Keys are always emitted in the same order so serialized bodies are reproducible
//! for auditing and hashing:
//!
//! 1. `messages`
//! 2. `seed`, then a forced `temperature: 0` (determinism only, and only when no
//!    temperature was set explicitly)
//! 3. `frequency_penalty`, `max_tokens`, `n`, `presence_penalty`, `stop`,
//!    `temperature`, `top_p`, `user`

use super::resolve::ResolvedRequestParams;
use crate::types::Message;
use crate::Result;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub messages: Vec<Message>,
    pub seed: Option<i32>,
    /// Set when determinism pins the temperature because the caller did not.
    pub forced_temperature: bool,
    pub frequency_penalty: Option<f64>,
    pub max_tokens: Option<u32>,
    pub n: Option<u32>,
    pub presence_penalty: Option<f64>,
    pub stop: Option<Vec<String>>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub user: Option<String>,
}

impl RequestBody {
    /// Build the body for resolved parameters. Pure; never touches the network.
    pub fn build(params: &ResolvedRequestParams) -> Self {
        let sampling = &params.sampling;
        let determinism = params.determinism;
        Self {
            messages: params.messages.clone(),
            seed: determinism.enabled.then_some(determinism.seed),
            forced_temperature: determinism.enabled && sampling.temperature.is_none(),
            frequency_penalty: sampling.frequency_penalty,
            max_tokens: sampling.max_tokens,
            n: sampling.completion_count,
            presence_penalty: sampling.presence_penalty,
            stop: sampling.stop_sequences.clone(),
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            user: sampling.user_id.clone(),
        }
    }

    /// The temperature the remote will see, if any was sent.
    pub fn effective_temperature(&self) -> Option<f64> {
        if self.forced_temperature {
            Some(0.0)
        } else {
            self.temperature
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Lowercase hex SHA-256 of the canonical serialized body.
    pub fn fingerprint(&self) -> Result<String> {
        let digest = Sha256::digest(self.to_json_string()?.as_bytes());
        Ok(format!("{:x}", digest))
    }
}

impl Serialize for RequestBody {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("messages", &self.messages)?;

        if let Some(seed) = self.seed {
            map.serialize_entry("seed", &seed)?;
        }
        if self.forced_temperature {
            map.serialize_entry("temperature", &0)?;
        }

        if let Some(v) = self.frequency_penalty {
            map.serialize_entry("frequency_penalty", &v)?;
        }
        if let Some(v) = self.max_tokens {
            map.serialize_entry("max_tokens", &v)?;
        }
        if let Some(v) = self.n {
            map.serialize_entry("n", &v)?;
        }
        if let Some(v) = self.presence_penalty {
            map.serialize_entry("presence_penalty", &v)?;
        }
        if let Some(v) = &self.stop {
            map.serialize_entry("stop", v)?;
        }
        if let Some(v) = self.temperature {
            map.serialize_entry("temperature", &v)?;
        }
        if let Some(v) = self.top_p {
            map.serialize_entry("top_p", &v)?;
        }
        if let Some(v) = &self.user {
            map.serialize_entry("user", v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{
        resolve, DeploymentSelection, ItemConfig, SamplingOverrides, StopInput, WorkItem,
    };
    use serde_json::json;

    fn params(config: ItemConfig) -> ResolvedRequestParams {
        resolve(&WorkItem::new(0, config), "dep").unwrap()
    }

    fn keys(body: &RequestBody) -> Vec<String> {
        body.to_value()
            .unwrap()
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }

    #[test]
    fn determinism_forces_seed_and_zero_temperature() {
        let config = ItemConfig::new(vec![Message::user("hi")]).seed(7);
        let body = RequestBody::build(&params(config));
        let value = body.to_value().unwrap();
        assert_eq!(value["seed"], json!(7));
        assert_eq!(value["temperature"], json!(0));
        assert_eq!(keys(&body), ["messages", "seed", "temperature"]);
        assert_eq!(body.effective_temperature(), Some(0.0));
    }

    #[test]
    fn explicit_temperature_wins_over_determinism() {
        let config = ItemConfig::new(vec![Message::user("hi")])
            .seed(7)
            .options(SamplingOverrides {
                temperature: Some(0.9),
                top_p: Some(1.0),
                ..SamplingOverrides::default()
            });
        let body = RequestBody::build(&params(config));
        let value = body.to_value().unwrap();
        assert_eq!(value["seed"], json!(7));
        assert_eq!(value["temperature"], json!(0.9));
        assert_eq!(keys(&body), ["messages", "seed", "temperature", "top_p"]);
    }

    #[test]
    fn all_options_follow_fixed_order() {
        let config = ItemConfig::new(vec![Message::system("s"), Message::user("u")])
            .deployment(DeploymentSelection::Gpt4o)
            .options(SamplingOverrides {
                user: Some("u-1".into()),
                top_p: Some(0.5),
                temperature: Some(0.2),
                stop: Some(StopInput::Delimited("a, b ,,c".into())),
                presence_penalty: Some(0.1),
                n: Some(2),
                max_tokens: Some(64),
                frequency_penalty: Some(-0.5),
            });
        let body = RequestBody::build(&params(config));
        assert_eq!(
            keys(&body),
            [
                "messages",
                "frequency_penalty",
                "max_tokens",
                "n",
                "presence_penalty",
                "stop",
                "temperature",
                "top_p",
                "user"
            ]
        );
        assert_eq!(body.to_value().unwrap()["stop"], json!(["a", "b", "c"]));
    }

    #[test]
    fn serialization_is_stable_and_fingerprintable() {
        let config = ItemConfig::new(vec![Message::user("hi")]).seed(1);
        let a = RequestBody::build(&params(config.clone()));
        let b = RequestBody::build(&params(config));
        assert_eq!(
            a.to_json_string().unwrap(),
            r#"{"messages":[{"role":"user","content":"hi"}],"seed":1,"temperature":0}"#
        );
        let fp = a.fingerprint().unwrap();
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, b.fingerprint().unwrap());
    }

    #[test]
    fn plain_body_has_only_messages() {
        let body = RequestBody::build(&params(ItemConfig::new(vec![Message::user("hi")])));
        assert_eq!(keys(&body), ["messages"]);
        assert_eq!(body.effective_temperature(), None);
    }
}
