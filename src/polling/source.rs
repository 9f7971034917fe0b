//! Snapshot sources: a primary HTTP endpoint with an optional static fallback.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::config::PollerConfig;
use crate::domain::Snapshot;
use crate::error::{DecisifyError, Result};

/// Where a committed snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Primary,
    Fallback,
}

/// A validated snapshot together with its origin
#[derive(Debug, Clone)]
pub struct Fetched {
    pub snapshot: Snapshot,
    pub origin: DataOrigin,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch and validate one snapshot
    async fn fetch(&self) -> Result<Fetched>;
}

/// Static resource consulted when the primary endpoint is unreachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    Url(String),
    File(PathBuf),
}

impl Fallback {
    /// `http(s)://` values are URLs, anything else is a file path
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Fallback::Url(raw.to_string())
        } else {
            Fallback::File(PathBuf::from(raw))
        }
    }
}

impl std::fmt::Display for Fallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fallback::Url(url) => write!(f, "{}", url),
            Fallback::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// HTTP snapshot source.
///
/// One timeout bounds the whole attempt, fallback included. The fallback is
/// only consulted when the primary request fails to complete; an HTTP error
/// status from a reachable primary is reported as-is.
pub struct HttpSnapshotSource {
    client: Client,
    primary_url: String,
    fallback: Option<Fallback>,
    timeout: Duration,
}

impl HttpSnapshotSource {
    pub fn new(config: &PollerConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| DecisifyError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            primary_url: config.primary_url.clone(),
            fallback: config.fallback.as_deref().map(Fallback::parse),
            timeout: config.timeout(),
        })
    }

    pub fn primary_url(&self) -> &str {
        &self.primary_url
    }

    pub fn fallback(&self) -> Option<&Fallback> {
        self.fallback.as_ref()
    }

    async fn fetch_inner(&self) -> Result<Fetched> {
        let primary_err = match self.get(&self.primary_url).await {
            Ok(response) => {
                let snapshot = read_response(response).await?;
                return Ok(Fetched {
                    snapshot,
                    origin: DataOrigin::Primary,
                });
            }
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_err.into());
        };

        warn!(
            "Backend API unavailable ({}), using fallback {}",
            primary_err, fallback
        );

        let snapshot = match fallback {
            Fallback::Url(url) => read_response(self.get(url).await?).await?,
            Fallback::File(path) => {
                let body = tokio::fs::read(path).await?;
                Snapshot::from_slice(&body)?
            }
        };

        Ok(Fetched {
            snapshot,
            origin: DataOrigin::Fallback,
        })
    }

    async fn get(&self, url: &str) -> std::result::Result<Response, reqwest::Error> {
        debug!("GET {}", url);
        self.client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<Fetched> {
        tokio::time::timeout(self.timeout, self.fetch_inner())
            .await
            .map_err(|_| DecisifyError::Timeout)?
    }
}

async fn read_response(response: Response) -> Result<Snapshot> {
    let status = response.status();
    if !status.is_success() {
        return Err(DecisifyError::HttpStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }
    let body = response.bytes().await?;
    Snapshot::from_slice(&body)
}
