//! Upstream build observation.
//!
//! The upstream app page embeds its build number and build hash in inline
//! script config. One GET plus two regex captures is all the scraping the
//! relay does.

use async_trait::async_trait;
use axum::http::StatusCode;
use regex::Regex;

use crate::error::FetchError;

use super::record::BuildRecord;

/// Produces the currently observed upstream build.
#[async_trait]
pub trait BuildFetcher: Send + Sync {
    async fn fetch_candidate(&self) -> Result<BuildRecord, FetchError>;
}

/// Fetches the configured upstream page and extracts the build markers.
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
    build_number: Regex,
    build_hash: Regex,
}

impl HttpFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            build_number: Regex::new(r#"BUILD_NUMBER":"(\d+)"#).unwrap(),
            build_hash: Regex::new(r#"buildId":"(\w+)"#).unwrap(),
        }
    }

    fn extract(&self, body: &str) -> Result<BuildRecord, FetchError> {
        let hash = self
            .build_hash
            .captures(body)
            .and_then(|c| c.get(1))
            .ok_or(FetchError::Parse("build hash"))?
            .as_str();
        let number = self
            .build_number
            .captures(body)
            .and_then(|c| c.get(1))
            .ok_or(FetchError::Parse("build number"))?
            .as_str();
        Ok(BuildRecord::observed_now(hash, number))
    }
}

#[async_trait]
impl BuildFetcher for HttpFetcher {
    async fn fetch_candidate(&self) -> Result<BuildRecord, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        let status: StatusCode = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = response.text().await?;
        self.extract(&body)
    }
}
