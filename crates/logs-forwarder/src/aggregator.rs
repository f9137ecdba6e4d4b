// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Accumulation of records into size-bounded batches.
//!
//! Records are buffered until one of the batch limits is reached:
//! 1. **Size limit**: adding the next record would push the encoded batch over
//!    `max_batch_bytes`. The pending records are closed as a batch and the new
//!    record starts the next one.
//! 2. **Count limit**: the pending records reach `max_batch_entries`.
//! 3. **Flush**: the caller asks for whatever is pending.
//!
//! A push returns at most one batch. The size check runs first; the count
//! check only runs when the size check did not close a batch.
//!
//! The aggregator is owned by a single task and is not synchronized.

use tracing::{error, warn};

use crate::codec;
use crate::record::Record;

/// Records closed together and shipped in one request, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
    /// Sum of the entry sizes of `records`, see [`codec::entry_size`].
    byte_size: usize,
}

impl Batch {
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }
}

#[derive(Debug)]
pub struct Aggregator {
    pending: Vec<Record>,
    byte_total: usize,
    max_batch_entries: usize,
    max_batch_bytes: usize,
}

impl Aggregator {
    #[must_use]
    pub fn new(max_batch_entries: usize, max_batch_bytes: usize) -> Self {
        Aggregator {
            pending: Vec::with_capacity(max_batch_entries.min(1024)),
            byte_total: 0,
            max_batch_entries,
            max_batch_bytes,
        }
    }

    /// Adds a record, returning the batch it closed, if any.
    pub fn push(&mut self, record: Record) -> Option<Batch> {
        let entry_size = match codec::entry_size(&record) {
            Ok(size) => size,
            Err(e) => {
                error!("marshalling record - {e}, record dropped");
                return None;
            }
        };

        if entry_size > self.max_batch_bytes {
            warn!(
                "record of {} bytes exceeds the {} bytes batch limit, it will be sent on its own",
                entry_size, self.max_batch_bytes
            );
        }

        let mut batch = None;
        if self.byte_total + entry_size > self.max_batch_bytes {
            batch = self.flush();
        }

        self.pending.push(record);
        self.byte_total += entry_size;

        if batch.is_none() && self.pending.len() >= self.max_batch_entries {
            batch = self.flush();
        }

        batch
    }

    /// Closes and returns the pending records, or `None` when nothing is
    /// pending.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.pending.is_empty() {
            return None;
        }

        let records = std::mem::replace(
            &mut self.pending,
            Vec::with_capacity(self.max_batch_entries.min(1024)),
        );
        let byte_size = std::mem::take(&mut self.byte_total);
        Some(Batch { records, byte_size })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn byte_total(&self) -> usize {
        self.byte_total
    }
}
