// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of one batch: encode, compress, POST, retry.
//!
//! ```text
//!   Batch ──> encode (JSON array) ──> compress ──> POST ──ok──> done
//!                                                   │
//!                                                 error
//!                                                   │
//!                                   wait retry_after(i) or shutdown
//!                                                   │
//!                                    retry, at most MAX_SEND_ATTEMPTS POSTs
//! ```
//!
//! Failures never escape as fatal errors: once the attempts are exhausted, or
//! the forwarder is closed while waiting for the next attempt, the batch is
//! dropped and the number of lost records is reported. A POST that is already
//! running is never interrupted; it completes or hits its request timeout.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::aggregator::Batch;
use crate::codec;
use crate::compression::Compression;
use crate::constants::MAX_SEND_ATTEMPTS;
use crate::errors::Error;
use crate::retry::RetryAfter;
use crate::transport::Transport;

#[derive(Clone)]
pub struct Uploader {
    transport: Arc<dyn Transport>,
    compression: Compression,
    retry_after: RetryAfter,
    shutdown: CancellationToken,
}

impl Uploader {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        compression: Compression,
        retry_after: RetryAfter,
        shutdown: CancellationToken,
    ) -> Self {
        Uploader {
            transport,
            compression,
            retry_after,
            shutdown,
        }
    }

    /// Delivers `batch`, retrying failed attempts.
    ///
    /// Every failure is reported through the diagnostics before it is
    /// returned, so callers may ignore the result.
    pub async fn send(&self, batch: Batch) -> Result<(), Error> {
        let count = batch.len();

        let payload = codec::encode(&batch).map_err(|e| {
            error!("marshalling {count} records - {e}, records dropped");
            Error::Encode(e)
        })?;
        drop(batch);

        let payload = self.compression.compress(payload).map_err(|e| {
            error!("compressing {count} records - {e}, records dropped");
            Error::Compression(e)
        })?;

        for attempt in 0..MAX_SEND_ATTEMPTS {
            match self.transport.post(payload.clone()).await {
                Ok(()) => {
                    debug!("sent batch of {count} records");
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        "sending batch of {count} records failed (attempt {}/{MAX_SEND_ATTEMPTS}) - {e}",
                        attempt + 1
                    );
                }
            }

            if attempt + 1 == MAX_SEND_ATTEMPTS {
                break;
            }

            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    error!(
                        "{count} records dropped because they failed to be sent and the forwarder was closed"
                    );
                    return Err(Error::Dropped { count });
                }
                () = tokio::time::sleep(self.retry_after.duration(attempt)) => {}
            }
        }

        error!(
            "{count} records dropped because they failed to be sent after {MAX_SEND_ATTEMPTS} attempts"
        );
        Err(Error::Dropped { count })
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("compression", &self.compression)
            .field("retry_after", &self.retry_after)
            .finish_non_exhaustive()
    }
}
