//! Remote metainfo sources

use async_trait::async_trait;

use super::types::{MetaInfo, MetaInfoError};
use crate::config::SourceConfig;

/// Remote provider of torrent metainfo.
///
/// Implementations must report definitive absence as `SourceError::NotFound`
/// so that callers can stop retrying.
#[async_trait]
pub trait MetaInfoSource: Send + Sync {
    /// Downloads metainfo for `name` within `namespace`.
    ///
    /// # Errors
    ///
    /// - `SourceError::NotFound` - If the source has no metainfo for the name
    /// - `SourceError::Malformed` - If the source returned undecodable metainfo
    /// - Any other variant for transport or server failures
    async fn download(&self, namespace: &str, name: &str) -> Result<MetaInfo, SourceError>;
}

/// Errors reported by a metainfo source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("metainfo not found")]
    NotFound,

    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("malformed metainfo: {0}")]
    Malformed(#[from] MetaInfoError),

    #[error("invalid source URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source unavailable: {reason}")]
    Unavailable { reason: String },
}

impl SourceError {
    /// Checks whether another attempt could succeed.
    ///
    /// Absence and corrupt payloads are final; everything else is transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SourceError::NotFound | SourceError::Malformed(_) | SourceError::InvalidUrl(_)
        )
    }
}

/// HTTP client for a tracker's metainfo endpoint.
///
/// Requests `GET {base}/namespace/{namespace}/blobs/{name}/metainfo` and
/// treats HTTP 404 as definitive absence.
pub struct HttpMetaInfoSource {
    base_url: url::Url,
    client: reqwest::Client,
}

impl HttpMetaInfoSource {
    /// Creates a client for the tracker at `config.tracker_url`.
    ///
    /// # Errors
    ///
    /// - `SourceError::InvalidUrl` - If the tracker URL does not parse
    /// - `SourceError::Http` - If the HTTP client cannot be constructed
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let base_url = url::Url::parse(&config.tracker_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self { base_url, client })
    }

    /// Build metainfo URL for a namespace and name
    pub(crate) fn build_metainfo_url(&self, namespace: &str, name: &str) -> String {
        format!(
            "{}/namespace/{}/blobs/{}/metainfo",
            self.base_url.as_str().trim_end_matches('/'),
            urlencoding::encode(namespace),
            urlencoding::encode(name)
        )
    }
}

#[async_trait]
impl MetaInfoSource for HttpMetaInfoSource {
    async fn download(&self, namespace: &str, name: &str) -> Result<MetaInfo, SourceError> {
        let url = self.build_metainfo_url(namespace, name);
        tracing::debug!(%url, "requesting metainfo");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound);
        }
        if !status.is_success() {
            return Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        Ok(MetaInfo::deserialize(&body)?)
    }
}
