use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::settings::SourceConfig;
use crate::keeper::{resolver, Resolver};
use crate::resilience::retry::RetrySettings;

/// Resolve operation backed by one configured HTTP request.
///
/// The response body is parsed as JSON and becomes the keeper's value.
#[derive(Debug, Clone)]
pub struct HttpSource {
    pub name: String,
    pub cfg: Arc<SourceConfig>,
    pub client: Client,
}

impl HttpSource {
    pub fn new(name: impl Into<String>, cfg: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            name: name.into(),
            cfg: Arc::new(cfg),
            client,
        })
    }

    pub async fn fetch(&self) -> Result<Value> {
        let req_cfg = &self.cfg;
        let mut request = self.client.request(req_cfg.method.clone(), &req_cfg.url);

        if let Some(headers) = &req_cfg.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }
        if let Some(body) = &req_cfg.body {
            request = request.json(body);
        }

        debug!(source = %self.name, url = %req_cfg.url, "fetching value");
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP request failed: {}", response.status()));
        }
        let body = response.text().await?;
        serde_json::from_str(&body)
            .with_context(|| format!("source '{}' returned a non-JSON body", self.name))
    }

    /// Resolver performing [`fetch`](Self::fetch) with back-off.
    pub fn into_resolver(self, retry: RetrySettings) -> Resolver<Value> {
        let source = Arc::new(self);
        resolver(move || {
            let source = Arc::clone(&source);
            let retry = retry.clone();
            async move { retry.run_with_retry(|| source.fetch()).await }
        })
    }
}
