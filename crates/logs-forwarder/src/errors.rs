// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

use reqwest::StatusCode;

/// Returned by [`crate::config::Config::validate`] when a configuration field
/// holds an impossible value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} Config.{field}: {value}")]
pub struct ConfigError {
    pub reason: String,
    pub field: &'static str,
    /// The offending value, as displayed.
    pub value: String,
}

impl ConfigError {
    pub(crate) fn new(reason: impl Into<String>, field: &'static str, value: impl Display) -> Self {
        ConfigError {
            reason: reason.into(),
            field,
            value: value.to_string(),
        }
    }
}

/// Failure of a single POST attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("sending request - {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected response status {0}")]
    Status(StatusCode),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("the forwarder was already closed")]
    Closed,

    #[error("too many requests are already in-flight")]
    TooManyRequests,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("marshalling records - {0}")]
    Encode(#[from] serde_json::Error),

    #[error("compressing payload - {0}")]
    Compression(#[from] std::io::Error),

    #[error("send task panicked - {0}")]
    Panicked(String),

    #[error("{count} records dropped")]
    Dropped { count: usize },
}
