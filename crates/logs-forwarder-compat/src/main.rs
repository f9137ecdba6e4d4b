// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::str::FromStr;

use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, Level};
use tracing_subscriber::EnvFilter;

use logs_forwarder::{Config, LogsForwarder, Record};

/// Builds the record for one input line, or `None` when it is blank or below
/// the configured level.
///
/// A JSON object line contributes its keys as fields; its `message` (or
/// `msg`) and `level` keys set the record message and severity. Any other line
/// is forwarded verbatim at INFO.
fn parse_line(line: &str, config: &Config) -> Option<Record> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (level, message, fields) = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(mut fields)) => {
            let message = take_string(&mut fields, "message")
                .or_else(|| take_string(&mut fields, "msg"))
                .unwrap_or_default();
            let level = take_string(&mut fields, "level")
                .and_then(|level| Level::from_str(&level).ok())
                .unwrap_or(Level::INFO);
            (level, message, fields)
        }
        _ => (Level::INFO, line.to_string(), Map::new()),
    };

    if level > config.level {
        return None;
    }

    Some(
        Record::new(level, message)
            .with_host(config.host.as_str())
            .with_tags(&config.tags)
            .with_fields(fields),
    )
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(value)) => Some(value),
        Some(other) => {
            fields.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOGS_FORWARDER_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,reqwest=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return;
        }
    };

    let forwarder = match LogsForwarder::new(config.clone()) {
        Ok(forwarder) => forwarder,
        Err(e) => {
            error!("Unable to start the logs forwarder: {e}");
            return;
        }
    };
    info!("Forwarding stdin to {}", config.url);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut forwarded = 0usize;
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let Some(record) = parse_line(&line, &config) else {
                        continue;
                    };
                    if let Err(e) = forwarder.enqueue_async(record).await {
                        error!("Unable to forward line: {e}");
                        break;
                    }
                    forwarded += 1;
                }
                Ok(None) => {
                    debug!("End of input");
                    break;
                }
                Err(e) => {
                    error!("Error reading stdin: {e}");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                debug!("Interrupted");
                break;
            }
        }
    }

    if let Err(e) = forwarder.close().await {
        error!("Error closing the logs forwarder: {e}");
    }
    info!("Forwarded {forwarded} lines");
}
