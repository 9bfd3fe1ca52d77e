use super::{HttpMethod, Transport, TransportError, TransportRequest, TransportResponse};
use crate::Result;
use async_trait::async_trait;
use reqwest::Proxy;
use std::env;
use std::time::Duration;
use tracing::debug;

/// reqwest-backed transport shared read-only by every concurrent request of a run.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(
                env::var("AZURE_OPENAI_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("AZURE_OPENAI_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::other(e.to_string())))?;

        Ok(Self { client })
    }

    /// Wrap an existing client (custom TLS roots, proxies, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn map_reqwest(err: reqwest::Error, after: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { after }
    } else {
        TransportError::Http(err)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut req = match request.method {
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Get => self.client.get(&request.url),
        };

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let timeout = request.timeout;
        let resp = req
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest(e, timeout))?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| map_reqwest(e, timeout))?;

        if !(200..300).contains(&status) {
            debug!(
                http_status = status,
                method = request.method.as_str(),
                "request rejected by remote"
            );
            return Err(TransportError::from_status(
                status,
                serde_json::from_str(&text).ok(),
            ));
        }

        let body = serde_json::from_str(&text).map_err(TransportError::Decode)?;
        Ok(TransportResponse { status, body })
    }
}
