// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Structured log records as they are shipped to the collector.
//!
//! A record serializes to:
//!
//! ```json
//! {
//!   "tags": ["tag1", "tag2"],
//!   "host": "admin-lambda-test",
//!   "level": "ERROR",
//!   "data": {"message": "Hello world!", "fields": {"name": "kate", "age": 33}}
//! }
//! ```
//!
//! `tags` is `null` when no tags are configured.

use serde::Serialize;
use serde_json::{Map, Value};

/// One log event accepted by the forwarder.
///
/// Records are built with the consuming `with_*` methods and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub tags: Option<Vec<String>>,
    pub host: String,
    pub level: String,
    pub data: RecordData,
}

/// Message and structured fields of a [`Record`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RecordData {
    pub message: String,
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a record with the given severity and message, no host, no tags
    /// and no fields.
    #[must_use]
    pub fn new(level: tracing::Level, message: impl Into<String>) -> Self {
        Record {
            tags: None,
            host: String::new(),
            level: level.as_str().to_uppercase(),
            data: RecordData {
                message: message.into(),
                fields: Map::new(),
            },
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the record tags. An empty list is kept as `null` on the wire.
    #[must_use]
    pub fn with_tags(mut self, tags: &[String]) -> Self {
        self.tags = if tags.is_empty() {
            None
        } else {
            Some(tags.to_vec())
        };
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.data.fields.extend(fields);
        self
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.data.message
    }
}
