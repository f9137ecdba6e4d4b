// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Default limits and timings for batching and delivery.
//!
//! Batches are closed as soon as one of these limits is reached:
//! - **Count limit**: [`DEFAULT_MAX_BATCH_ENTRIES`] records per batch
//! - **Size limit**: [`DEFAULT_MAX_BATCH_BYTES`] bytes of serialized JSON
//! - **Flush timer**: every [`DEFAULT_FLUSH_INTERVAL`]

use std::time::Duration;

/// Maximum number of records per batch.
pub const DEFAULT_MAX_BATCH_ENTRIES: usize = 250;

/// Maximum serialized (uncompressed) size of a batch in bytes.
///
/// The boundary is advisory: it is computed from the same serializer used to
/// build the payload, but the collector is never consulted.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 1_000_000;

/// Interval of the periodic flush timer.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum number of uploads running at the same time.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 1000;

/// Capacity of the hand-off queue between producers and the dispatch loop.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Timeout applied to every single POST attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of POST attempts made for a batch before it is dropped.
pub const MAX_SEND_ATTEMPTS: usize = 10;

// Exponential backoff used when no retry policy is configured.
pub(crate) const BACKOFF_BASE: Duration = Duration::from_millis(100);
pub(crate) const BACKOFF_FACTOR: u32 = 2;
pub(crate) const BACKOFF_MAX: Duration = Duration::from_secs(10);
