// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use tokio::sync::Semaphore;
use tracing::Level;

use crate::compression::Compression;
use crate::constants::{
    DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_BATCH_BYTES, DEFAULT_MAX_BATCH_ENTRIES,
    DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT,
};
use crate::errors::ConfigError;
use crate::retry::RetryAfter;

const ENV_PREFIX: &str = "LOGS_FORWARDER_";

/// Configuration of a [`crate::forwarder::LogsForwarder`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Collector endpoint every batch is POSTed to
    pub url: String,
    /// Host attached to every record built by the tracing layer
    pub host: String,
    /// Tags attached to every record built by the tracing layer
    pub tags: Vec<String>,
    /// Minimum level forwarded by the tracing layer
    pub level: Level,
    /// Period of the flush timer
    pub flush_interval: Duration,
    /// Maximum number of records per batch
    pub batch_size: usize,
    /// Maximum serialized size of a batch in bytes
    pub batch_bytes: usize,
    /// Maximum number of uploads in flight
    pub max_concurrent_requests: usize,
    /// Capacity of the hand-off queue
    pub queue_capacity: usize,
    /// Timeout of a single POST attempt
    pub request_timeout: Duration,
    pub compression: Compression,
    pub retry_after: RetryAfter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            host: String::new(),
            tags: Vec::new(),
            level: Level::INFO,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            batch_size: DEFAULT_MAX_BATCH_ENTRIES,
            batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            compression: Compression::None,
            retry_after: RetryAfter::default(),
        }
    }
}

impl Config {
    /// Defaults pointing at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Builds a configuration from `LOGS_FORWARDER_*` environment variables.
    ///
    /// Unset variables keep their default. Set but unparseable values are
    /// reported instead of being silently replaced.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let url = env_var("URL").unwrap_or_default();
        let host = env_var("HOST").unwrap_or_default();
        let tags = env_var("TAGS")
            .map(|val| {
                val.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let level = parse_env("LEVEL", "Level")?.unwrap_or(defaults.level);
        let flush_interval = parse_env::<u64>("FLUSH_INTERVAL_MS", "Interval")?
            .map_or(defaults.flush_interval, Duration::from_millis);
        let batch_size = parse_env("BATCH_SIZE", "BatchSize")?.unwrap_or(defaults.batch_size);
        let batch_bytes = parse_env("BATCH_BYTES", "BatchBytes")?.unwrap_or(defaults.batch_bytes);
        let max_concurrent_requests = parse_env("MAX_CONCURRENT_REQUESTS", "MaxConcurrentRequests")?
            .unwrap_or(defaults.max_concurrent_requests);
        let queue_capacity =
            parse_env("QUEUE_CAPACITY", "QueueCapacity")?.unwrap_or(defaults.queue_capacity);
        let compression = match env_var("COMPRESSION") {
            Some(val) => Compression::parse(&val).ok_or_else(|| {
                ConfigError::new("unsupported compression", "Compression", &val)
            })?,
            None => defaults.compression,
        };

        let config = Self {
            url,
            host,
            tags,
            level,
            flush_interval,
            batch_size,
            batch_bytes,
            max_concurrent_requests,
            queue_capacity,
            compression,
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the forwarder cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = Url::parse(&self.url) {
            return Err(ConfigError::new(
                format!("invalid endpoint URL ({e})"),
                "EndpointURL",
                &self.url,
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::new(
                "negative or 0 time intervals are not supported",
                "Interval",
                format!("{:?}", self.flush_interval),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::new(
                "negative or 0 batch sizes are not supported",
                "BatchSize",
                self.batch_size,
            ));
        }
        if self.batch_bytes == 0 {
            return Err(ConfigError::new(
                "negative or 0 batch sizes are not supported",
                "BatchBytes",
                self.batch_bytes,
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::new(
                "at least one request must be allowed in flight",
                "MaxConcurrentRequests",
                self.max_concurrent_requests,
            ));
        }
        if self.max_concurrent_requests > Semaphore::MAX_PERMITS {
            return Err(ConfigError::new(
                format!(
                    "more than {} concurrent requests are not supported",
                    Semaphore::MAX_PERMITS
                ),
                "MaxConcurrentRequests",
                self.max_concurrent_requests,
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::new(
                "the hand-off queue needs room for at least one record",
                "QueueCapacity",
                self.queue_capacity,
            ));
        }
        // the hand-off queue is bounded by a semaphore too
        if self.queue_capacity > Semaphore::MAX_PERMITS {
            return Err(ConfigError::new(
                format!(
                    "queue capacities above {} are not supported",
                    Semaphore::MAX_PERMITS
                ),
                "QueueCapacity",
                self.queue_capacity,
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::new(
                "negative or 0 time intervals are not supported",
                "RequestTimeout",
                format!("{:?}", self.request_timeout),
            ));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|val| !val.trim().is_empty())
}

fn parse_env<T: FromStr>(name: &str, field: &'static str) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::new("unparseable value", field, val)),
        None => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const URL: &str = "https://collector.example.com/receiver/v1/http/token";

    const ALL_VARS: [&str; 10] = [
        "URL",
        "HOST",
        "TAGS",
        "LEVEL",
        "FLUSH_INTERVAL_MS",
        "BATCH_SIZE",
        "BATCH_BYTES",
        "MAX_CONCURRENT_REQUESTS",
        "QUEUE_CAPACITY",
        "COMPRESSION",
    ];

    fn clear_env() {
        for name in ALL_VARS {
            env::remove_var(format!("{ENV_PREFIX}{name}"));
        }
    }

    fn set_env(name: &str, value: &str) {
        env::set_var(format!("{ENV_PREFIX}{name}"), value);
    }

    #[test]
    fn test_defaults() {
        let config = Config::new(URL);
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.batch_bytes, 1_000_000);
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert_eq!(config.max_concurrent_requests, 1000);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.compression, Compression::None);
    }

    #[test]
    fn test_default_requires_url() {
        let error = Config::default().validate().unwrap_err();
        assert_eq!(error.field, "EndpointURL");
    }

    #[test]
    fn test_validate_zero_interval() {
        let config = Config {
            flush_interval: Duration::ZERO,
            ..Config::new(URL)
        };
        let error = config.validate().unwrap_err();
        assert_eq!(
            error.to_string(),
            "negative or 0 time intervals are not supported Config.Interval: 0ns"
        );
    }

    #[test]
    fn test_validate_zero_batch_size() {
        let config = Config {
            batch_size: 0,
            ..Config::new(URL)
        };
        let error = config.validate().unwrap_err();
        assert_eq!(
            error.to_string(),
            "negative or 0 batch sizes are not supported Config.BatchSize: 0"
        );
    }

    #[test]
    fn test_validate_unsupported_limits() {
        let cases: [(Config, &str); 6] = [
            (
                Config {
                    batch_bytes: 0,
                    ..Config::new(URL)
                },
                "BatchBytes",
            ),
            (
                Config {
                    max_concurrent_requests: 0,
                    ..Config::new(URL)
                },
                "MaxConcurrentRequests",
            ),
            (
                Config {
                    queue_capacity: 0,
                    ..Config::new(URL)
                },
                "QueueCapacity",
            ),
            (
                Config {
                    request_timeout: Duration::ZERO,
                    ..Config::new(URL)
                },
                "RequestTimeout",
            ),
            (
                Config {
                    max_concurrent_requests: usize::MAX,
                    ..Config::new(URL)
                },
                "MaxConcurrentRequests",
            ),
            (
                Config {
                    queue_capacity: Semaphore::MAX_PERMITS + 1,
                    ..Config::new(URL)
                },
                "QueueCapacity",
            ),
        ];
        for (config, field) in cases {
            let error = config.validate().unwrap_err();
            assert_eq!(error.field, field);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        set_env("URL", URL);

        let config = Config::from_env().unwrap();

        assert_eq!(config.url, URL);
        assert!(config.host.is_empty());
        assert!(config.tags.is_empty());
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.batch_size, DEFAULT_MAX_BATCH_ENTRIES);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        set_env("URL", URL);
        set_env("HOST", "web-1");
        set_env("TAGS", "env:prod, team:core,,");
        set_env("LEVEL", "warn");
        set_env("FLUSH_INTERVAL_MS", "250");
        set_env("BATCH_SIZE", "10");
        set_env("BATCH_BYTES", "2048");
        set_env("MAX_CONCURRENT_REQUESTS", "4");
        set_env("QUEUE_CAPACITY", "16");
        set_env("COMPRESSION", "zstd:6");

        let config = Config::from_env().unwrap();

        assert_eq!(config.host, "web-1");
        assert_eq!(config.tags, vec!["env:prod", "team:core"]);
        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.flush_interval, Duration::from_millis(250));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batch_bytes, 2048);
        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.compression, Compression::Zstd(6));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        clear_env();
        set_env("URL", URL);
        set_env("BATCH_SIZE", "lots");

        let error = Config::from_env().unwrap_err();
        assert_eq!(error.field, "BatchSize");
        assert_eq!(error.value, "lots");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_zero_batch_size() {
        clear_env();
        set_env("URL", URL);
        set_env("BATCH_SIZE", "0");

        let error = Config::from_env().unwrap_err();
        assert_eq!(error.field, "BatchSize");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unsupported_limits() {
        clear_env();
        set_env("URL", URL);
        set_env("MAX_CONCURRENT_REQUESTS", &usize::MAX.to_string());

        let error = Config::from_env().unwrap_err();
        assert_eq!(error.field, "MaxConcurrentRequests");
        assert_eq!(error.value, usize::MAX.to_string());

        set_env("MAX_CONCURRENT_REQUESTS", "8");
        set_env("QUEUE_CAPACITY", &usize::MAX.to_string());

        let error = Config::from_env().unwrap_err();
        assert_eq!(error.field, "QueueCapacity");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_compression() {
        clear_env();
        set_env("URL", URL);
        set_env("COMPRESSION", "brotli");

        let error = Config::from_env().unwrap_err();
        assert_eq!(error.field, "Compression");
        clear_env();
    }
}
