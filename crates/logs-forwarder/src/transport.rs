// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Network side of an upload: one POST of an already encoded payload.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Url;
use tracing::debug;

use crate::compression::Compression;
use crate::errors::{ConfigError, Error, TransportError};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a single delivery attempt of `body`. Retrying is the caller's
    /// job.
    async fn post(&self, body: Vec<u8>) -> Result<(), TransportError>;
}

/// POSTs payloads to a fixed collector URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    headers: HeaderMap,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(endpoint: &str, compression: Compression, timeout: Duration) -> Result<Self, Error> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ConfigError::new(format!("invalid endpoint URL ({e})"), "EndpointURL", endpoint)
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Request)?;

        Ok(HttpTransport {
            client,
            endpoint,
            headers: Self::headers(compression),
            timeout,
        })
    }

    fn headers(compression: Compression) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(encoding) = compression.content_encoding() {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }
        headers
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: Vec<u8>) -> Result<(), TransportError> {
        let size = body.len();
        let resp = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }
        debug!("{status}: posted {size} bytes to {}", self.endpoint);
        Ok(())
    }
}
