//! Portrait lookup against the Wikipedia page-summary API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::FetchError;

/// Anything that can turn a fighter's name into a portrait URL.
///
/// Implementations must swallow their own failures: a lookup either finds
/// an image or it doesn't.
#[async_trait]
pub trait PortraitLookup: Send + Sync {
    async fn fetch_portrait(&self, first: &str, last: &str) -> Option<String>;
}

/// Page titles tried in order: `First_Last`, then `First Last`.
pub fn candidate_titles(first: &str, last: &str) -> [String; 2] {
    [format!("{}_{}", first, last), format!("{} {}", first, last)]
}

/// `originalimage.source` from a summary response, if present.
pub fn image_source(summary: &Value) -> Option<String> {
    summary
        .get("originalimage")
        .and_then(|img| img.get("source"))
        .and_then(|s| s.as_str())
        .map(str::to_string)
}

pub struct WikiPortraits {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl WikiPortraits {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create portrait HTTP client")?;
        Ok(Self {
            client,
            base_url: config.portrait_url.clone(),
            timeout: config.portrait_timeout,
        })
    }

    /// One attempt at one title. Any failure is returned, not retried.
    async fn fetch_summary(&self, title: &str) -> Result<Value, FetchError> {
        let url = summary_url(&self.base_url, title)?;
        let url_str = url.to_string();

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url_str.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url_str, status });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Body {
            url: url_str.clone(),
            source,
        })?;
        serde_json::from_slice(&body).map_err(|source| FetchError::Json { url: url_str, source })
    }
}

#[async_trait]
impl PortraitLookup for WikiPortraits {
    async fn fetch_portrait(&self, first: &str, last: &str) -> Option<String> {
        for title in candidate_titles(first, last) {
            match self.fetch_summary(&title).await {
                Ok(summary) => {
                    if let Some(src) = image_source(&summary) {
                        return Some(src);
                    }
                }
                Err(e) => debug!("Portrait candidate {:?} failed: {}", title, e),
            }
        }
        None
    }
}

/// Base URL with the title appended as one escaped path segment.
fn summary_url(base: &str, title: &str) -> Result<Url, FetchError> {
    let bad = || FetchError::BadUrl {
        base: base.to_string(),
    };
    let mut url = Url::parse(base).map_err(|_| bad())?;
    url.path_segments_mut()
        .map_err(|_| bad())?
        .pop_if_empty()
        .push(title);
    Ok(url)
}
