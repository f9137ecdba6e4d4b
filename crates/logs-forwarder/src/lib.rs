// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Logs Forwarder
//!
//! Batches structured log records and ships them to an HTTP collector.
//!
//! ## Pipeline
//!
//! ```text
//! enqueue ──> hand-off queue ──> dispatch loop ──> aggregator ──> batch
//!                                    │                              │
//!                              flush timer                  bounded executor
//!                                                                   │
//!                                                     uploader (encode, retry)
//!                                                                   │
//!                                                               transport
//! ```
//!
//! - [`aggregator`]: groups records into batches bounded by count and bytes
//! - [`executor`]: caps the number of uploads running at once
//! - [`uploader`]: delivers one batch with retries
//! - [`forwarder`]: dispatch loop and the [`LogsForwarder`] handle
//! - [`layer`]: `tracing` layer feeding application events to a forwarder
//!
//! Delivery is best effort: records are never persisted, deduplicated or
//! ordered across batches, but every record accepted before
//! [`LogsForwarder::close`] is attempted before `close` returns.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod codec;
pub mod compression;
pub mod config;
pub mod constants;
pub mod errors;
pub mod executor;
pub mod forwarder;
pub mod layer;
pub mod record;
pub mod retry;
pub mod transport;
pub mod uploader;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use errors::Error;
pub use forwarder::{LogsForwarder, State};
pub use layer::ForwarderLayer;
pub use record::Record;
