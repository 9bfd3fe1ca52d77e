use crate::batch::ConcurrencyMode;
use crate::client::core::ChatDispatcher;
use crate::config::{RunDocument, RunOptions, ServiceConfig};
use crate::transport::{HttpTransport, Transport};
use crate::Result;
use std::sync::Arc;

/// Builder for [`ChatDispatcher`].
///
/// Anything left unset falls back to the environment (service settings) or to
/// the defaults of [`RunOptions`].
#[derive(Default)]
pub struct ChatDispatcherBuilder {
    service: Option<ServiceConfig>,
    transport: Option<Arc<dyn Transport>>,
    options: RunOptions,
}

impl ChatDispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the builder from a run document's `service` and `run` sections.
    pub fn from_document(doc: &RunDocument) -> Self {
        Self {
            service: Some(doc.service.clone()),
            transport: None,
            options: doc.run,
        }
    }

    pub fn service(mut self, service: ServiceConfig) -> Self {
        self.service = Some(service);
        self
    }

    /// Swap the HTTP transport, mostly for tests and custom clients.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.options.concurrency = mode;
        self
    }

    pub fn continue_on_failure(mut self, enable: bool) -> Self {
        self.options.continue_on_failure = enable;
        self
    }

    /// Validate the settings and build the dispatcher.
    pub fn build(self) -> Result<ChatDispatcher> {
        let service = self.service.unwrap_or_default().fill_from_env();
        service.validate()?;
        // reject an out-of-range custom size before any item is looked at
        self.options.concurrency.batch_size()?;

        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new()?),
        };

        Ok(ChatDispatcher {
            service: Arc::new(service),
            transport,
            options: self.options,
        })
    }
}
