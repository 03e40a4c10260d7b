//! Implements the `Remote` trait over HTTP with `reqwest`.

use crate::api::{Remote, RemoteEntry};
use crate::model::Savings;
use crate::Result;
use anyhow::{bail, Context};
use reqwest::Response;
use tracing::{debug, trace};
use url::Url;

pub(super) struct HttpRemote {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpRemote {
    pub(super) fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl Remote for HttpRemote {
    async fn fetch_all(&self) -> Result<Savings> {
        trace!("GET {}", self.endpoint);
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .context("Failed to send the request for the remote savings")?;
        let response = check_status(response, "fetch").await?;
        let body = response
            .text()
            .await
            .context("Failed to read the remote savings response")?;
        let value: serde_json::Value = serde_json::from_str(&body)
            .context("The remote savings response is not valid JSON")?;
        let savings = Savings::from_remote(value)?;
        debug!("Fetched {} entries from the remote store", savings.len());
        Ok(savings)
    }

    async fn put(&self, entry: &RemoteEntry) -> Result<()> {
        // Sent as a plain body with no content-type so the endpoint sees a simple request.
        let body = serde_json::to_string(entry).context("Unable to serialize the remote entry")?;
        trace!("POST {} {body}", self.endpoint);
        let response = self
            .client
            .post(self.endpoint.clone())
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} to the remote store", entry.date))?;
        check_status(response, "write").await?;
        Ok(())
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read response body".to_string());
    bail!("Remote {what} failed with status {status}: {body}")
}
