// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Test doubles shared by the unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::errors::TransportError;
use crate::retry::RetryAfter;
use crate::transport::Transport;

/// Transport that fails its first `failures` calls and records the bodies of
/// the successful ones.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    failures: usize,
    delay: Option<Duration>,
    calls: AtomicUsize,
    bodies: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_first(failures: usize) -> Self {
        MockTransport {
            failures,
            ..Self::default()
        }
    }

    pub(crate) fn always_failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    /// Every call takes `delay` before it resolves.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().unwrap().clone()
    }

    pub(crate) fn payloads(&self) -> Vec<serde_json::Value> {
        self.bodies()
            .iter()
            .map(|body| serde_json::from_slice(body).unwrap())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, body: Vec<u8>) -> Result<(), TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if call < self.failures {
            return Err(TransportError::Status(StatusCode::SERVICE_UNAVAILABLE));
        }
        self.bodies.lock().unwrap().push(body);
        Ok(())
    }
}

/// Retry policy waiting `wait` every time and recording the retry indexes it
/// was asked for.
pub(crate) fn recording_retry_after(wait: Duration) -> (RetryAfter, Arc<Mutex<Vec<usize>>>) {
    let waits = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&waits);
    let retry_after = RetryAfter::new(move |retry_index| {
        recorded.lock().unwrap().push(retry_index);
        wait
    });
    (retry_after, waits)
}
