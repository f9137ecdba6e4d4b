// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` integration: forwards application events as [`Record`]s.
//!
//! ```ignore
//! let forwarder = Arc::new(LogsForwarder::new(config.clone())?);
//! tracing_subscriber::registry()
//!     .with(ForwarderLayer::from_config(Arc::clone(&forwarder), &config))
//!     .init();
//! ```
//!
//! Events emitted by this crate are never forwarded, so a failing upload
//! cannot feed its own diagnostics back into the queue.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::config::Config;
use crate::forwarder::LogsForwarder;
use crate::record::Record;

const OWN_TARGET: &str = "logs_forwarder";

/// A [`Layer`] enqueuing every event at or above `level` into a
/// [`LogsForwarder`].
#[derive(Debug, Clone)]
pub struct ForwarderLayer {
    forwarder: Arc<LogsForwarder>,
    level: Level,
    host: String,
    tags: Vec<String>,
}

impl ForwarderLayer {
    #[must_use]
    pub fn new(forwarder: Arc<LogsForwarder>, level: Level) -> Self {
        ForwarderLayer {
            forwarder,
            level,
            host: String::new(),
            tags: Vec::new(),
        }
    }

    /// Uses the level, host and tags of `config`.
    #[must_use]
    pub fn from_config(forwarder: Arc<LogsForwarder>, config: &Config) -> Self {
        Self::new(forwarder, config.level)
            .with_host(config.host.clone())
            .with_tags(config.tags.clone())
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Levels this layer forwards, most severe first.
    #[must_use]
    pub fn levels(&self) -> Vec<Level> {
        [
            Level::ERROR,
            Level::WARN,
            Level::INFO,
            Level::DEBUG,
            Level::TRACE,
        ]
        .into_iter()
        .filter(|level| *level <= self.level)
        .collect()
    }

    fn accepts(&self, event: &Event<'_>) -> bool {
        let metadata = event.metadata();
        let target = metadata.target();
        let own = target == OWN_TARGET
            || target
                .strip_prefix(OWN_TARGET)
                .is_some_and(|rest| rest.starts_with("::"));
        *metadata.level() <= self.level && !own
    }
}

impl<S: Subscriber> Layer<S> for ForwarderLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !self.accepts(event) {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let record = Record::new(*event.metadata().level(), visitor.message)
            .with_host(self.host.as_str())
            .with_tags(&self.tags)
            .with_fields(visitor.fields);

        // a logging call must never fail because of the forwarder
        let _ = self.forwarder.enqueue(record);
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl RecordVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = match value {
                Value::String(message) => message,
                other => other.to_string(),
            };
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for RecordVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::MockTransport;
    use crate::transport::Transport;
    use std::time::Duration;
    use tracing_subscriber::layer::SubscriberExt;

    fn create_forwarder(transport: &Arc<MockTransport>) -> Arc<LogsForwarder> {
        let config = Config {
            flush_interval: Duration::from_secs(3600),
            ..Config::new("http://localhost:8080/logs")
        };
        Arc::new(
            LogsForwarder::with_transport(config, Arc::clone(transport) as Arc<dyn Transport>)
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_levels() {
        let forwarder = create_forwarder(&Arc::new(MockTransport::new()));

        let layer = ForwarderLayer::new(Arc::clone(&forwarder), Level::WARN);
        assert_eq!(layer.levels(), vec![Level::ERROR, Level::WARN]);

        let layer = ForwarderLayer::new(forwarder, Level::TRACE);
        assert_eq!(layer.levels().len(), 5);
    }

    #[tokio::test]
    async fn test_events_become_records() {
        let transport = Arc::new(MockTransport::new());
        let forwarder = create_forwarder(&transport);
        let layer = ForwarderLayer::new(Arc::clone(&forwarder), Level::INFO)
            .with_host("web-1")
            .with_tags(vec!["env:test".to_string()]);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "app", name = "kate", age = 33, "Hello world!");
            tracing::debug!(target: "app", "too verbose");
            tracing::warn!(target: "logs_forwarder::uploader", "own diagnostic");
        });
        forwarder.close().await.unwrap();

        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(
            payloads[0],
            serde_json::json!([{
                "tags": ["env:test"],
                "host": "web-1",
                "level": "ERROR",
                "data": {
                    "message": "Hello world!",
                    "fields": {"name": "kate", "age": 33}
                }
            }])
        );
    }

    #[tokio::test]
    async fn test_only_own_diagnostics_are_skipped() {
        let transport = Arc::new(MockTransport::new());
        let forwarder = create_forwarder(&transport);
        let subscriber = tracing_subscriber::registry()
            .with(ForwarderLayer::new(Arc::clone(&forwarder), Level::INFO));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "logs_forwarder", "own root");
            tracing::info!(target: "logs_forwarder::forwarder", "own module");
            tracing::info!(target: "logs_forwarder_compat", "from the binary");
            tracing::info!(target: "logs_forwarderx::io", "lookalike crate");
        });
        forwarder.close().await.unwrap();

        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 1);
        let messages: Vec<&str> = payloads[0]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["data"]["message"].as_str().unwrap())
            .collect();
        assert_eq!(messages, vec!["from the binary", "lookalike crate"]);
    }

    #[tokio::test]
    async fn test_enqueue_failure_is_ignored() {
        let transport = Arc::new(MockTransport::new());
        let forwarder = create_forwarder(&transport);
        forwarder.close().await.unwrap();

        let subscriber =
            tracing_subscriber::registry().with(ForwarderLayer::new(forwarder, Level::INFO));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "app", "after close");
        });

        assert_eq!(transport.calls(), 0);
    }
}
