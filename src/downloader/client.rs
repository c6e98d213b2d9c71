// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use reqwest::{Client, Proxy};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::importer::config::ImporterConfig;
use crate::utils::is_pem_certificate;

pub struct HttpClient {
    client: Client,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HttpClient {
    pub fn new() -> anyhow::Result<Self> {
        Self::from_builder(Self::builder())
    }

    /// Client honoring the importer's TLS and proxy settings
    pub fn for_importer(config: &ImporterConfig) -> anyhow::Result<Self> {
        let mut builder = Self::builder();

        if !config.ssl_verify() {
            warn!("SSL verification disabled for feed");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ca_path) = config.get_str("ssl_ca_cert") {
            let bytes = std::fs::read(ca_path)
                .with_context(|| format!("Failed to read CA certificate: {}", ca_path))?;
            let certificate = if is_pem_certificate(&bytes) {
                reqwest::Certificate::from_pem(&bytes)?
            } else {
                reqwest::Certificate::from_der(&bytes)?
            };
            builder = builder.add_root_certificate(certificate);
        }

        if let Some(proxy_url) = config.get_str("proxy_url") {
            let mut url = Url::parse(proxy_url).context("Invalid proxy URL")?;
            if let Some(port) = config.get_int("proxy_port") {
                let port = u16::try_from(port).context("Invalid proxy port")?;
                url.set_port(Some(port))
                    .map_err(|_| anyhow::anyhow!("Proxy URL cannot carry a port: {}", url))?;
            }

            let mut proxy = Proxy::all(url.as_str())?;
            if let (Some(user), Some(pass)) = (config.get_str("proxy_user"), config.get_str("proxy_pass")) {
                proxy = proxy.basic_auth(user, pass);
            }
            debug!(proxy = %url, "Using proxy for feed");
            builder = builder.proxy(proxy);
        }

        Self::from_builder(builder)
    }

    fn builder() -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(Duration::from_secs(300))
            .user_agent(concat!("RepoSyncImporter/", env!("CARGO_PKG_VERSION")))
    }

    fn from_builder(builder: reqwest::ClientBuilder) -> anyhow::Result<Self> {
        Ok(Self {
            client: builder.build()?,
            max_retries: 3,
            retry_base_delay: Duration::from_secs(2),
        })
    }

    /// Override the retry policy (attempts, first back-off delay)
    pub fn with_retry(mut self, max_retries: u32, retry_base_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_base_delay = retry_base_delay;
        self
    }

    /// Fetch a document; `file://` URLs are read from disk
    pub async fn fetch_bytes(&self, url: &Url) -> anyhow::Result<Vec<u8>> {
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| anyhow::anyhow!("Invalid file URL: {}", url))?;
            return tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()));
        }

        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.fetch_once(url).await {
                Ok(body) => {
                    if attempt > 1 {
                        info!(url = %url, attempt, "Fetch succeeded after retry");
                    }
                    return Ok(body);
                }
                Err(e) => {
                    warn!(url = %url, attempt, error = %e, "Fetch attempt failed");
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_base_delay * 2_u32.pow(attempt - 1)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Fetch failed after {} attempts", self.max_retries)))
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &Url) -> anyhow::Result<T> {
        let body = self.fetch_bytes(url).await?;
        serde_json::from_slice(&body).with_context(|| format!("Malformed JSON document at {}", url))
    }

    async fn fetch_once(&self, url: &Url) -> anyhow::Result<Vec<u8>> {
        debug!(url = %url, "Fetching");

        let response = self.client.get(url.clone()).send().await?;
        response.error_for_status_ref()?;

        Ok(response.bytes().await?.to_vec())
    }
}
