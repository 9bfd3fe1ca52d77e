use crate::batch::{BatchExecutor, BatchExecutorConfig, RunReport};
use crate::classify::FailurePolicy;
use crate::client::builder::ChatDispatcherBuilder;
use crate::config::{RunOptions, ServiceConfig};
use crate::request::{resolve_all, ItemConfig, RequestBody, ResolvedRequestParams, WorkItem};
use crate::shape::{shape, DebugInfo, OutputMode, RequestMetadata, ShapeContext};
use crate::transport::{Transport, TransportError, TransportRequest};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Runs work items against an Azure OpenAI resource.
///
/// The service configuration and transport are shared read-only by every
/// concurrent request of a run.
pub struct ChatDispatcher {
    pub(crate) service: Arc<ServiceConfig>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) options: RunOptions,
}

/// An item ready to go on the wire.
struct PreparedRequest {
    params: ResolvedRequestParams,
    body: RequestBody,
    body_value: Value,
}

impl PreparedRequest {
    fn new(params: ResolvedRequestParams) -> Result<Self> {
        let body = RequestBody::build(&params);
        let body_value = body.to_value()?;
        Ok(Self {
            params,
            body,
            body_value,
        })
    }
}

impl ChatDispatcher {
    pub fn builder() -> ChatDispatcherBuilder {
        ChatDispatcherBuilder::new()
    }

    pub fn service(&self) -> &ServiceConfig {
        &self.service
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    /// Dispatch every item and return one result per item, in input order.
    ///
    /// Every item is resolved and serialized before the first request is sent,
    /// so configuration errors never leave a run half done. Under the abort
    /// policy the first failing item ends the run with
    /// [`Error::RunAborted`](crate::Error::RunAborted) and no partial results.
    pub async fn run(&self, items: Vec<ItemConfig>) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let work = WorkItem::sequence(items);

        let batch_size = self.options.concurrency.batch_size()?;
        let prepared = resolve_all(&work, &self.service.deployment)?
            .into_iter()
            .map(PreparedRequest::new)
            .collect::<Result<Vec<_>>>()?;

        info!(
            %run_id,
            items = prepared.len(),
            batch_size,
            continue_on_failure = self.options.continue_on_failure,
            "starting run"
        );

        let executor = BatchExecutor::with_config(
            BatchExecutorConfig::new()
                .with_batch_size(batch_size)
                .with_policy(FailurePolicy::from_continue_on_failure(
                    self.options.continue_on_failure,
                )),
        );

        let report = executor
            .execute(prepared, |request| self.dispatch(request))
            .instrument(info_span!("run", %run_id))
            .await?;

        info!(
            %run_id,
            batches = report.stats.batches,
            succeeded = report.stats.succeeded,
            failed = report.stats.failed,
            elapsed_ms = report.stats.elapsed.as_millis() as u64,
            "run complete"
        );
        Ok(report)
    }

    async fn dispatch(&self, prepared: PreparedRequest) -> std::result::Result<Value, TransportError> {
        let PreparedRequest {
            params,
            body,
            body_value,
        } = prepared;

        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(fingerprint) = body.fingerprint() {
                debug!(
                    index = params.index,
                    deployment = %params.deployment_name,
                    %fingerprint,
                    "sending chat completion"
                );
            }
        }

        let metadata = (params.shaping.mode == OutputMode::Full).then(|| RequestMetadata {
            deployment: params.deployment_name.clone(),
            api_version: self.service.api_version.clone(),
            endpoint: self.service.endpoint.clone(),
            request_body: body_value.clone(),
        });

        let request = self.chat_request(&params.deployment_name, body_value);
        let response = self.transport.execute(request).await?;

        let ctx = ShapeContext {
            debug: DebugInfo {
                seed_used: body.seed,
                temperature: body.effective_temperature(),
                determinism_enabled: params.determinism.enabled,
            },
            metadata,
        };
        Ok(shape(response.body, &params.shaping, &ctx))
    }

    fn chat_request(&self, deployment: &str, body: Value) -> TransportRequest {
        TransportRequest::post(self.service.chat_completions_url(deployment), body)
            .header("Content-Type", "application/json")
            .header("api-key", self.service.api_key.as_str())
    }

    /// Model ids available to the resource.
    ///
    /// Lookup failures are logged and yield an empty list.
    pub async fn list_models(&self) -> Vec<String> {
        let request = TransportRequest::get(self.service.models_url())
            .header("api-key", self.service.api_key.as_str());

        match self.transport.execute(request).await {
            Ok(response) => model_ids(&response.body),
            Err(e) => {
                warn!(error = %e, "model listing failed");
                Vec::new()
            }
        }
    }

    /// Send a one-token probe to the default deployment to check the endpoint,
    /// key and deployment together.
    pub async fn verify_credentials(&self) -> Result<()> {
        let deployment = self.service.deployment.trim();
        if deployment.is_empty() {
            return Err(crate::Error::configuration_with_context(
                "no default deployment is configured",
                crate::ErrorContext::new()
                    .with_field_path("service.deployment")
                    .with_source("credential_probe"),
            ));
        }

        let body = json!({
            "messages": [
                {"role": "system", "content": "Test"},
                {"role": "user", "content": "Hi"}
            ],
            "max_tokens": 1,
            "temperature": 0
        });
        self.transport
            .execute(self.chat_request(deployment, body))
            .await?;
        info!(deployment, "credentials verified");
        Ok(())
    }
}

fn model_ids(body: &Value) -> Vec<String> {
    body.get("data")
        .and_then(Value::as_array)
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
