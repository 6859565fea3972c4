use super::StatusSource;
use crate::model::{PollConfig, StatusSnapshot};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use thiserror::Error;

/// A status check that produced no usable snapshot.
///
/// Each variant is recoverable: the poller skips the cycle and retries on the
/// next tick.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint returned HTTP {0}")]
    HttpStatus(StatusCode),

    #[error("response is not JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::HttpStatus(_) => "http_status",
            FetchError::Decode(_) => "decode",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusClient {
    status_url: reqwest::Url,
    http: reqwest::Client,
}

impl StatusClient {
    pub fn new(status_url: &str, cfg: &PollConfig) -> Result<Self> {
        let status_url = reqwest::Url::parse(status_url)
            .with_context(|| format!("invalid status URL: {status_url}"))?;
        let mut builder = reqwest::Client::builder().user_agent(cfg.user_agent.clone());
        if let Some(timeout) = cfg.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("build http client")?;
        Ok(Self { status_url, http })
    }

    pub fn status_url(&self) -> &reqwest::Url {
        &self.status_url
    }
}

impl StatusSource for StatusClient {
    async fn fetch(&self) -> Result<StatusSnapshot, FetchError> {
        let resp = self
            .http
            .get(self.status_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status));
        }
        let body = resp.bytes().await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        Ok(StatusSnapshot::from_value(&value))
    }
}
