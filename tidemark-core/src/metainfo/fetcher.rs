//! Retrying metainfo fetcher
//!
//! Wraps a metainfo source with a bounded number of attempts and a
//! pluggable delay between them. Definitive absence and corrupt payloads
//! end the loop immediately.

use std::time::Duration;

use super::source::{MetaInfoSource, SourceError};
use super::types::{MetaInfo, MetaInfoError};
use crate::config::ArchiveConfig;

/// Delay policy between fetch attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Retry with fixed delay
    FixedDelay { delay: Duration },
    /// Retry with exponential backoff
    ExponentialBackoff {
        base_delay: Duration,
        max_delay: Duration,
    },
    /// Retry immediately
    Immediate,
}

impl RetryStrategy {
    /// Calculate delay before the given retry, counting retries from 1.
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self {
            Self::FixedDelay { delay } => *delay,
            Self::ExponentialBackoff {
                base_delay,
                max_delay,
            } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                base_delay.saturating_mul(factor).min(*max_delay)
            }
            Self::Immediate => Duration::ZERO,
        }
    }
}

/// Errors reported by the retrying fetcher.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("metainfo not found")]
    NotFound,

    #[error("malformed metainfo: {0}")]
    Malformed(#[source] MetaInfoError),

    #[error("download metainfo failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: SourceError,
    },
}

/// Metainfo fetcher with bounded retries.
pub struct MetaInfoFetcher<M> {
    source: M,
    attempts: u32,
    strategy: RetryStrategy,
}

impl<M: MetaInfoSource> MetaInfoFetcher<M> {
    /// Creates a fetcher making at most `attempts` calls, never fewer than one.
    pub fn new(source: M, attempts: u32, strategy: RetryStrategy) -> Self {
        Self {
            source,
            attempts: attempts.max(1),
            strategy,
        }
    }

    /// Creates a fetcher with a fixed delay taken from archive configuration.
    pub fn from_config(source: M, config: &ArchiveConfig) -> Self {
        let config = config.with_defaults();
        Self::new(
            source,
            config.retries(),
            RetryStrategy::FixedDelay {
                delay: config.retry_delay(),
            },
        )
    }

    /// Replaces the delay policy.
    pub fn with_retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Returns the attempt ceiling.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the wrapped source.
    pub fn source(&self) -> &M {
        &self.source
    }

    /// Downloads metainfo, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - `FetchError::NotFound` - If the source reports the name absent
    /// - `FetchError::Malformed` - If the source returned corrupt metainfo
    /// - `FetchError::Exhausted` - If every attempt failed transiently
    pub async fn fetch(&self, namespace: &str, name: &str) -> Result<MetaInfo, FetchError> {
        let mut attempt = 1;
        loop {
            tracing::debug!(namespace, name, attempt, "downloading metainfo");
            let error = match self.source.download(namespace, name).await {
                Ok(meta_info) => return Ok(meta_info),
                Err(SourceError::NotFound) => return Err(FetchError::NotFound),
                Err(SourceError::Malformed(e)) => return Err(FetchError::Malformed(e)),
                Err(e) if !e.is_retryable() || attempt >= self.attempts => e,
                Err(e) => {
                    let delay = self.strategy.delay_for(attempt);
                    tracing::warn!(
                        namespace,
                        name,
                        attempt,
                        error = %e,
                        "metainfo download failed, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
            };

            return Err(FetchError::Exhausted {
                attempts: attempt,
                source: error,
            });
        }
    }
}
