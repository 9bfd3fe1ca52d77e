//! Mock HTTP server setup for integration tests

use azure_chat_dispatch::{ChatDispatcher, ConcurrencyMode, ServiceConfig};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

pub const API_KEY: &str = "mock-key";
pub const API_VERSION: &str = "2024-10-21";
pub const DEPLOYMENT: &str = "mock-deployment";

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    pub fn service(&self) -> ServiceConfig {
        // trailing slash must not leak into request paths
        ServiceConfig::new(format!("{}/", self.base_url), API_KEY)
            .with_api_version(API_VERSION)
            .with_deployment(DEPLOYMENT)
    }

    /// Dispatcher using the real HTTP transport pointed at the mock server
    pub fn dispatcher(&self, mode: ConcurrencyMode, continue_on_failure: bool) -> ChatDispatcher {
        ChatDispatcher::builder()
            .service(self.service())
            .concurrency(mode)
            .continue_on_failure(continue_on_failure)
            .build()
            .expect("dispatcher builds against mock server")
    }

    pub fn chat_path(deployment: &str) -> String {
        format!("/openai/deployments/{}/chat/completions", deployment)
    }

    /// Mock a chat completion for requests whose body matches `body` exactly
    pub async fn mock_completion(&mut self, deployment: &str, body: &str, content: &str) -> Mock {
        self.server
            .mock("POST", Self::chat_path(deployment).as_str())
            .match_query(Matcher::UrlEncoded("api-version".into(), API_VERSION.into()))
            .match_header("api-key", API_KEY)
            .match_header("content-type", "application/json")
            .match_body(Matcher::Exact(body.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion(content).to_string())
            .create_async()
            .await
    }

    /// Mock an error response for requests carrying `prompt` as first message
    pub async fn mock_error_response(
        &mut self,
        deployment: &str,
        prompt: &str,
        status: u16,
        error_body: &str,
    ) -> Mock {
        self.server
            .mock("POST", Self::chat_path(deployment).as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(
                json!({"messages": [{"role": "user", "content": prompt}]}),
            ))
            .with_status(status as usize)
            .with_header("content-type", "application/json")
            .with_body(error_body)
            .create_async()
            .await
    }

    pub async fn mock_models(&mut self, status: u16, body: &str) -> Mock {
        self.server
            .mock("GET", "/openai/models")
            .match_query(Matcher::UrlEncoded("api-version".into(), API_VERSION.into()))
            .match_header("api-key", API_KEY)
            .with_status(status as usize)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }
}

pub fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "logprobs": null,
            "finish_reason": "stop"
        }]
    })
}
