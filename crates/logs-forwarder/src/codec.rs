// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON encoding of records and batches.
//!
//! A batch is sent as a compact JSON array, `[r1,r2,...,rn]`. Every record
//! therefore costs its own serialized length plus one byte for the `,` (or,
//! for the last record, the closing `]`), and the opening `[` is the only
//! byte not accounted to a record.

use std::io;

use crate::aggregator::Batch;
use crate::record::Record;

/// `io::Write` sink that only counts the bytes written to it.
#[derive(Default)]
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serialized length of a record in bytes, computed without allocating the
/// payload.
pub fn encoded_len(record: &Record) -> Result<usize, serde_json::Error> {
    let mut counter = ByteCounter::default();
    serde_json::to_writer(&mut counter, record)?;
    Ok(counter.0)
}

/// Number of bytes a record adds to an encoded batch: its serialized length
/// plus its list separator.
pub fn entry_size(record: &Record) -> Result<usize, serde_json::Error> {
    encoded_len(record).map(|len| len + 1)
}

/// Encodes a batch as a JSON array of record objects.
pub fn encode(batch: &Batch) -> Result<Vec<u8>, serde_json::Error> {
    let mut buffer = Vec::with_capacity(batch.byte_size() + 1);
    serde_json::to_writer(&mut buffer, batch.records())?;
    Ok(buffer)
}
