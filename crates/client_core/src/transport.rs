//! Generic fetch capability used by the capabilities client and the layer factory.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get_text(&self, url: &Url) -> Result<String>;
}

#[async_trait]
impl<T> HttpFetch for Arc<T>
where
    T: HttpFetch + ?Sized,
{
    async fn get_text(&self, url: &Url) -> Result<String> {
        (**self).get_text(url).await
    }
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("wfs-explorer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ReqwestFetch {
    http: Client,
}

impl ReqwestFetch {
    pub fn new(options: &TransportOptions) -> Result<Self> {
        let http = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get_text(&self, url: &Url) -> Result<String> {
        debug!(%url, "GET");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("request to {url} was rejected"))?;
        response
            .text()
            .await
            .with_context(|| format!("failed to read response body from {url}"))
    }
}
