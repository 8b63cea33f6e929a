//! Connector configuration.
//!
//! Every tuning knob is an explicit field with its default baked into
//! `Default`; nothing is resolved implicitly at call sites.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::writer::WriteConfig;

pub const DEFAULT_PARTITIONS_PER_HOST: usize = 10;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 16;
pub const DEFAULT_FETCH_CACHE_CAPACITY: usize = 1024;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Output partitions assigned to every host when repartitioning.
    pub partitions_per_host: usize,

    /// Single-partition requests in flight per local partition.
    pub max_concurrent_requests: usize,

    /// Fetched results kept per local partition for repeated join keys.
    /// Zero disables the cache.
    pub fetch_cache_capacity: usize,

    /// Timeout of one request attempt.
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,

    /// Retry policy for single-partition reads.
    pub retry: RetryPolicy,

    /// Retry policy for topology fetches.
    pub topology_retry: RetryPolicy,

    pub write: WriteConfig,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            partitions_per_host: DEFAULT_PARTITIONS_PER_HOST,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            fetch_cache_capacity: DEFAULT_FETCH_CACHE_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            topology_retry: RetryPolicy::new(
                3,
                2,
                Duration::from_millis(200),
                Duration::from_secs(5),
            ),
            write: WriteConfig::default(),
        }
    }
}

impl ConnectorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid connector config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.partitions_per_host == 0 {
            return Err(Error::Configuration(
                "partitions_per_host must be at least 1".into(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(Error::Configuration(
                "max_concurrent_requests must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Configuration(
                "request_timeout must be positive".into(),
            ));
        }
        self.retry.validate("retry").map_err(Error::Configuration)?;
        self.topology_retry
            .validate("topology_retry")
            .map_err(Error::Configuration)?;
        self.write.validate()
    }
}

/// Serializes a `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
