use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::formats::Message;
use crate::sync::background::Background;

pub const BACKGROUND_URL_ENV: &str = "STORYLIGHT_BACKGROUND_URL";

/// Delivers a message to the host shell and returns its raw JSON response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: Message) -> anyhow::Result<serde_json::Value>;
}

#[derive(Clone)]
pub struct InProcessTransport {
    background: Arc<Background>,
}

impl InProcessTransport {
    pub fn new(background: Arc<Background>) -> Self {
        Self { background }
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(&self, message: Message) -> anyhow::Result<serde_json::Value> {
        self.background.handle(message).await
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            anyhow::bail!("background url is empty");
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = std::env::var(BACKGROUND_URL_ENV)
            .with_context(|| format!("{BACKGROUND_URL_ENV} is required for the http transport"))?;
        Self::new(&base_url).with_context(|| format!("invalid {BACKGROUND_URL_ENV}"))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, message: Message) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}/messages", self.base_url);
        let kind = message.kind();
        let resp = self
            .client
            .post(url)
            .json(&message)
            .send()
            .await
            .with_context(|| format!("send {kind} message"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{kind} failed ({status}): {body}");
        }
        resp.json()
            .await
            .with_context(|| format!("decode {kind} response"))
    }
}

#[cfg(test)]
mod tests {
    use super::HttpTransport;

    #[test]
    fn base_url_is_normalised() {
        let transport = HttpTransport::new(" http://127.0.0.1:9/ ").unwrap();
        assert_eq!(transport.base_url, "http://127.0.0.1:9");
        assert!(HttpTransport::new("  ").is_err());
    }
}
