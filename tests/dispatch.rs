//! End-to-end dispatch runs against a scripted in-memory transport.

use async_trait::async_trait;
use azure_chat_dispatch::transport::{
    Transport, TransportError, TransportRequest, TransportResponse,
};
use azure_chat_dispatch::{
    ChatDispatcher, ConcurrencyMode, DeploymentSelection, Error, ItemConfig, Message, OutputFlags,
    SamplingOverrides, ServiceConfig,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers every chat request with a canned completion echoing the item's prompt.
#[derive(Default)]
struct ScriptedTransport {
    delays_ms: HashMap<usize, u64>,
    failures: HashMap<usize, u16>,
    content: HashMap<usize, String>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    seen: Mutex<Vec<TransportRequest>>,
    events: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn delay(mut self, index: usize, ms: u64) -> Self {
        self.delays_ms.insert(index, ms);
        self
    }

    fn fail(mut self, index: usize, status: u16) -> Self {
        self.failures.insert(index, status);
        self
    }

    fn reply(mut self, index: usize, content: &str) -> Self {
        self.content.insert(index, content.to_string());
        self
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn requests(&self) -> Vec<TransportRequest> {
        self.seen.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn position(&self, event: &str) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("no `{event}` in {:?}", self.events()))
    }
}

fn prompt_index(request: &TransportRequest) -> usize {
    let prompt = request.body.as_ref().unwrap()["messages"][0]["content"]
        .as_str()
        .unwrap()
        .to_string();
    prompt.trim_start_matches("item-").parse().unwrap()
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let index = prompt_index(&request);
        self.seen.lock().unwrap().push(request);
        self.events.lock().unwrap().push(format!("start {index}"));

        if let Some(ms) = self.delays_ms.get(&index) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("end {index}"));

        if let Some(status) = self.failures.get(&index) {
            return Err(TransportError::from_status(
                *status,
                Some(json!({"error": {"message": format!("scripted failure {index}")}})),
            ));
        }

        let content = self
            .content
            .get(&index)
            .cloned()
            .unwrap_or_else(|| format!("answer-{index}"));
        Ok(TransportResponse {
            status: 200,
            body: json!({
                "id": format!("chatcmpl-{index}"),
                "object": "chat.completion",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": content},
                    "logprobs": null,
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
            }),
        })
    }
}

fn service() -> ServiceConfig {
    ServiceConfig::new("https://unit.openai.azure.com/", "test-key").with_deployment("team-default")
}

fn items(n: usize) -> Vec<ItemConfig> {
    (0..n)
        .map(|i| ItemConfig::new(vec![Message::user(format!("item-{i}"))]))
        .collect()
}

fn dispatcher(
    transport: Arc<ScriptedTransport>,
    mode: ConcurrencyMode,
    continue_on_failure: bool,
) -> ChatDispatcher {
    ChatDispatcher::builder()
        .service(service())
        .transport(transport)
        .concurrency(mode)
        .continue_on_failure(continue_on_failure)
        .build()
        .unwrap()
}

#[tokio::test]
async fn results_keep_input_order_under_uneven_latency() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .delay(0, 60)
            .delay(1, 5)
            .delay(2, 30)
            .delay(3, 1),
    );
    let report = dispatcher(transport.clone(), ConcurrencyMode::High, false)
        .run(items(4))
        .await
        .unwrap();

    let indices: Vec<usize> = report.results.iter().map(|r| r.index).collect();
    assert_eq!(indices, [0, 1, 2, 3]);
    for (i, record) in report.results.iter().enumerate() {
        assert_eq!(
            record.payload().unwrap()["message"]["content"],
            json!(format!("answer-{i}"))
        );
    }
    assert_eq!(report.stats.batches, 1);
    assert_eq!(transport.peak(), 4);
}

#[tokio::test]
async fn continue_policy_keeps_every_result_in_input_position() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .delay(0, 40)
            .delay(2, 20)
            .delay(4, 1),
    );
    let report = dispatcher(transport, ConcurrencyMode::Medium, true)
        .run(items(5))
        .await
        .unwrap();

    assert_eq!(report.results.len(), 5);
    for (i, record) in report.results.iter().enumerate() {
        assert_eq!(record.index, i);
        assert!(record.is_ok());
    }
    assert_eq!(report.stats.failed, 0);
}

#[tokio::test]
async fn next_batch_waits_for_slowest_item() {
    let transport = Arc::new(ScriptedTransport::default().delay(0, 50).fail(3, 500));
    let report = dispatcher(transport.clone(), ConcurrencyMode::Low, true)
        .run(items(5))
        .await
        .unwrap();

    // item 1 finishes first, yet item 2 only starts once item 0 has settled
    assert!(transport.position("end 1") < transport.position("end 0"));
    assert!(transport.position("end 0") < transport.position("start 2"));
    assert!(transport.position("end 0") < transport.position("start 3"));
    assert!(transport.position("end 3") < transport.position("start 4"));
    assert!(transport.position("end 2") < transport.position("start 4"));

    let indices: Vec<usize> = report.results.iter().map(|r| r.index).collect();
    assert_eq!(indices, [0, 1, 2, 3, 4]);
    assert_eq!(report.results[3].error().unwrap().class.name(), "server_error");
    assert_eq!(report.stats.batches, 3);
}

#[tokio::test]
async fn batch_size_bounds_requests_in_flight() {
    let mut scripted = ScriptedTransport::default();
    for i in 0..7 {
        scripted = scripted.delay(i, 10);
    }
    let transport = Arc::new(scripted);
    let report = dispatcher(transport.clone(), ConcurrencyMode::custom(3), false)
        .run(items(7))
        .await
        .unwrap();

    assert_eq!(report.results.len(), 7);
    assert_eq!(report.stats.batches, 3);
    assert_eq!(report.stats.succeeded, 7);
    assert!(transport.peak() <= 3, "peak {} exceeded batch size", transport.peak());
}

#[tokio::test]
async fn single_mode_is_strictly_sequential() {
    let transport = Arc::new(ScriptedTransport::default().delay(0, 10).delay(1, 10));
    let report = dispatcher(transport.clone(), ConcurrencyMode::Single, false)
        .run(items(3))
        .await
        .unwrap();
    assert_eq!(report.stats.batches, 3);
    assert_eq!(transport.peak(), 1);
}

#[tokio::test]
async fn continue_on_failure_emits_inline_error_records() {
    let transport = Arc::new(ScriptedTransport::default().fail(1, 429));
    let report = dispatcher(transport, ConcurrencyMode::Low, true)
        .run(items(3))
        .await
        .unwrap();

    assert_eq!(report.stats.succeeded, 2);
    assert_eq!(report.stats.failed, 1);
    let failed = serde_json::to_value(&report.results[1]).unwrap();
    assert_eq!(
        failed,
        json!({
            "index": 1,
            "err": {"error": "scripted failure 1", "status": 429, "class": "rate_limited"}
        })
    );
    assert!(report.results[2].is_ok());
}

#[tokio::test]
async fn abort_stops_before_later_batches() {
    let transport = Arc::new(ScriptedTransport::default().fail(1, 401));
    let err = dispatcher(transport.clone(), ConcurrencyMode::Low, false)
        .run(items(6))
        .await
        .unwrap_err();

    assert_eq!(err.aborted_index(), Some(1));
    match &err {
        Error::RunAborted {
            message,
            description,
            ..
        } => {
            assert_eq!(message, "scripted failure 1");
            assert_eq!(
                description,
                "Status: 401. Check your credentials and deployment configuration."
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    // only the first batch of two was ever sent
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn configuration_errors_precede_any_request() {
    let transport = Arc::new(ScriptedTransport::default());
    let mut batch = items(3);
    batch[2] = ItemConfig::new(vec![Message::user("item-2")])
        .deployment(DeploymentSelection::custom("   "));

    let err = dispatcher(transport.clone(), ConcurrencyMode::High, true)
        .run(batch)
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(
        err.context().and_then(|c| c.field_path.as_deref()),
        Some("items[2].deployment.custom")
    );
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn out_of_range_custom_concurrency_is_rejected_at_build() {
    let result = ChatDispatcher::builder()
        .service(service())
        .transport(Arc::new(ScriptedTransport::default()))
        .concurrency(ConcurrencyMode::custom(21))
        .build();
    assert!(matches!(result, Err(ref e) if e.is_configuration()));
}

#[tokio::test]
async fn requests_target_resolved_deployment_with_canonical_body() {
    let transport = Arc::new(ScriptedTransport::default());
    let batch = vec![
        ItemConfig::new(vec![Message::user("item-0")]).seed(7),
        ItemConfig::new(vec![Message::user("item-1")])
            .deployment(DeploymentSelection::Gpt4o)
            .options(SamplingOverrides {
                max_tokens: Some(0),
                stop: Some(azure_chat_dispatch::request::StopInput::Delimited(
                    " END , ,STOP".into(),
                )),
                ..SamplingOverrides::default()
            }),
    ];
    dispatcher(transport.clone(), ConcurrencyMode::Single, false)
        .run(batch)
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(
        requests[0].url,
        "https://unit.openai.azure.com/openai/deployments/team-default/chat/completions?api-version=2025-01-01-preview"
    );
    assert_eq!(requests[0].header_value("api-key"), Some("test-key"));
    assert_eq!(
        serde_json::to_string(requests[0].body.as_ref().unwrap()).unwrap(),
        r#"{"messages":[{"role":"user","content":"item-0"}],"seed":7,"temperature":0}"#
    );

    assert!(requests[1].url.contains("/deployments/gpt-4o/"));
    assert_eq!(
        requests[1].body.as_ref().unwrap(),
        &json!({"messages": [{"role": "user", "content": "item-1"}], "stop": ["END", "STOP"]})
    );
}

#[tokio::test]
async fn full_mode_echoes_debug_and_request_metadata() {
    let transport = Arc::new(ScriptedTransport::default());
    let item = ItemConfig::new(vec![Message::user("item-0")])
        .seed(11)
        .output(OutputFlags {
            full_response: true,
            ..OutputFlags::default()
        });
    let report = dispatcher(transport, ConcurrencyMode::Single, false)
        .run(vec![item])
        .await
        .unwrap();

    let payload = report.results[0].payload().unwrap();
    assert_eq!(payload["id"], json!("chatcmpl-0"));
    assert_eq!(
        payload["debug"],
        json!({"seedUsed": 11, "temperature": 0.0, "determinismEnabled": true})
    );
    let metadata = &payload["_request_metadata"];
    assert_eq!(metadata["deployment"], json!("team-default"));
    assert_eq!(metadata["api_version"], json!("2025-01-01-preview"));
    assert_eq!(metadata["endpoint"], json!("https://unit.openai.azure.com"));
    assert_eq!(metadata["request_body"]["seed"], json!(11));
}

#[tokio::test]
async fn simplified_and_raw_modes() {
    let transport = Arc::new(ScriptedTransport::default());
    let raw = ItemConfig::new(vec![Message::user("item-1")]).output(OutputFlags {
        simplify: false,
        ..OutputFlags::default()
    });
    let report = dispatcher(transport, ConcurrencyMode::Low, false)
        .run(vec![ItemConfig::new(vec![Message::user("item-0")]), raw])
        .await
        .unwrap();

    let simplified = report.results[0].payload().unwrap();
    assert_eq!(
        simplified,
        &json!({
            "index": 0,
            "message": {"role": "assistant", "content": "answer-0"},
            "logprobs": null,
            "finish_reason": "stop"
        })
    );

    let passthrough = report.results[1].payload().unwrap();
    assert!(passthrough.get("usage").is_some());
    assert!(passthrough.get("debug").is_none());
}

#[tokio::test]
async fn json_content_is_parsed_from_fenced_block() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .reply(0, "Here you go:\n```json\n{\"colour\": \"teal\"}\n```")
            .reply(1, "not json at all"),
    );
    let flags = OutputFlags {
        content_as_json: true,
        ..OutputFlags::default()
    };
    let report = dispatcher(transport, ConcurrencyMode::Low, false)
        .run(vec![
            ItemConfig::new(vec![Message::user("item-0")]).output(flags),
            ItemConfig::new(vec![Message::user("item-1")]).output(flags),
        ])
        .await
        .unwrap();

    assert_eq!(
        report.results[0].payload().unwrap()["message"]["content"],
        json!({"colour": "teal"})
    );
    assert_eq!(
        report.results[1].payload().unwrap()["message"]["content"],
        json!("not json at all")
    );
}

#[tokio::test]
async fn empty_run_sends_nothing() {
    let transport = Arc::new(ScriptedTransport::default());
    let report = dispatcher(transport.clone(), ConcurrencyMode::High, false)
        .run(Vec::new())
        .await
        .unwrap();
    assert!(report.results.is_empty());
    assert_eq!(transport.calls(), 0);
}
