//! Cargo sparse index lookups
//!
//! A published version is resolvable by downstream `cargo publish` runs once
//! its entry shows up in the index file `<index>/<prefix>/<name>`. Each line
//! of that file is one JSON record per version.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::core::traits::PackageId;

const USER_AGENT: &str = concat!("release-publisher/", env!("CARGO_PKG_VERSION"));

/// Errors fetching an index file
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("index returned HTTP {0}")]
    Status(u16),
}

/// One version record of an index file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub vers: String,
    #[serde(default)]
    pub yanked: bool,
}

/// HTTP client for a cargo sparse index
#[derive(Debug, Clone)]
pub struct SparseIndex {
    client: reqwest::Client,
    base_url: String,
}

impl SparseIndex {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Relative path of a crate's index file
    ///
    /// # Examples
    ///
    /// ```
    /// use release_publisher::registry::SparseIndex;
    ///
    /// assert_eq!(SparseIndex::index_path("a"), "1/a");
    /// assert_eq!(SparseIndex::index_path("ab"), "2/ab");
    /// assert_eq!(SparseIndex::index_path("abc"), "3/a/abc");
    /// assert_eq!(SparseIndex::index_path("Serde"), "se/rd/serde");
    /// ```
    pub fn index_path(name: &str) -> String {
        let name = name.to_lowercase();
        let chars: Vec<char> = name.chars().collect();
        match chars.len() {
            0..=2 => format!("{}/{}", chars.len(), name),
            3 => format!("3/{}/{}", chars[0], name),
            _ => {
                let first: String = chars[..2].iter().collect();
                let second: String = chars[2..4].iter().collect();
                format!("{}/{}/{}", first, second, name)
            }
        }
    }

    pub fn entry_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, Self::index_path(name))
    }

    /// All version records for `name`; a missing file means no versions
    pub async fn fetch_entries(&self, name: &str) -> Result<Vec<IndexEntry>, IndexError> {
        let response = self
            .client
            .get(self.entry_url(name))
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(IndexError::Status(status.as_u16()));
        }

        let body = response.text().await?;

        Ok(body
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<IndexEntry>(line).ok())
            .collect())
    }

    /// Whether the exact, non-yanked version is listed
    ///
    /// Lookup failures read as "not yet".
    pub async fn contains(&self, id: &PackageId) -> bool {
        match self.fetch_entries(&id.name).await {
            Ok(entries) => entries.iter().any(|entry| {
                !entry.yanked
                    && semver::Version::parse(&entry.vers).is_ok_and(|v| v == id.version)
            }),
            Err(e) => {
                tracing::warn!(package = %id, error = %e, "index lookup failed");
                false
            }
        }
    }
}
