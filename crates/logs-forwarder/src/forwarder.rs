// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Dispatch loop and the handle producers talk to.
//!
//! [`LogsForwarder`] is the handle: it hands records to the dispatch loop
//! through a bounded queue and drives the shutdown. The dispatch loop runs on
//! its own task, owns the [`Aggregator`] and the [`BoundedExecutor`] and
//! reacts to four events:
//!
//! - a record arrives: it is pushed into the aggregator and a completed batch,
//!   if any, is submitted for upload
//! - the flush timer fires: whatever is pending is submitted
//! - an upload finishes: it is reaped from the executor
//! - shutdown is requested: the loop drains
//!
//! Draining stops the queue, pushes what was already queued, submits the last
//! batch and waits for every upload still in flight. Dropping every handle
//! drains the loop the same way.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Instrument};

use crate::aggregator::{Aggregator, Batch};
use crate::config::Config;
use crate::errors::Error;
use crate::executor::BoundedExecutor;
use crate::record::Record;
use crate::transport::{HttpTransport, Transport};
use crate::uploader::Uploader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Running = 0,
    Draining = 1,
    Closed = 2,
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            0 => State::Running,
            1 => State::Draining,
            _ => State::Closed,
        }
    }
}

/// One-way `Running -> Draining -> Closed` state shared by the handle and the
/// dispatch loop.
#[derive(Debug)]
struct Lifecycle(AtomicU8);

impl Lifecycle {
    fn new() -> Self {
        Lifecycle(AtomicU8::new(State::Running as u8))
    }

    fn load(&self) -> State {
        State::from(self.0.load(Ordering::Acquire))
    }

    /// Returns `false` if draining had already begun.
    fn begin_drain(&self) -> bool {
        self.0
            .compare_exchange(
                State::Running as u8,
                State::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn close(&self) {
        self.0.store(State::Closed as u8, Ordering::Release);
    }
}

/// Handle to a running forwarder.
///
/// Share it behind an [`Arc`] to enqueue from several places. The forwarder
/// is drained when [`LogsForwarder::close`] is called or when the handle is
/// dropped.
#[derive(Debug)]
pub struct LogsForwarder {
    tx: mpsc::Sender<Record>,
    lifecycle: Arc<Lifecycle>,
    shutdown: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl LogsForwarder {
    /// Validates `config` and starts a forwarder POSTing to `config.url`.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let transport =
            HttpTransport::new(&config.url, config.compression, config.request_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Starts a forwarder delivering through `transport` instead of HTTP.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let lifecycle = Arc::new(Lifecycle::new());
        let shutdown = CancellationToken::new();

        let dispatcher = Dispatcher {
            rx,
            aggregator: Aggregator::new(config.batch_size, config.batch_bytes),
            executor: BoundedExecutor::new(config.max_concurrent_requests),
            uploader: Uploader::new(
                transport,
                config.compression,
                config.retry_after,
                shutdown.clone(),
            ),
            flush_interval: config.flush_interval,
            lifecycle: Arc::clone(&lifecycle),
            shutdown: shutdown.clone(),
        };
        let handle = tokio::spawn(dispatcher.run().in_current_span());

        Ok(LogsForwarder {
            tx,
            lifecycle,
            shutdown,
            dispatcher: Mutex::new(Some(handle)),
        })
    }

    /// Hands `record` to the dispatch loop without waiting.
    ///
    /// A full queue drops the record with a warning and still returns `Ok`.
    /// Fails with [`Error::Closed`] once the forwarder started draining.
    pub fn enqueue(&self, record: Record) -> Result<(), Error> {
        if self.lifecycle.load() != State::Running {
            return Err(Error::Closed);
        }
        match self.tx.try_send(record) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(record)) => {
                warn!(
                    "hand-off queue is full, record dropped: {}",
                    record.message()
                );
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(Error::Closed),
        }
    }

    /// Like [`LogsForwarder::enqueue`], but waits for room in the queue
    /// instead of dropping the record.
    pub async fn enqueue_async(&self, record: Record) -> Result<(), Error> {
        if self.lifecycle.load() != State::Running {
            return Err(Error::Closed);
        }
        self.tx.send(record).await.map_err(|_| Error::Closed)
    }

    /// Same as [`LogsForwarder::close`].
    pub async fn flush(&self) -> Result<(), Error> {
        self.close().await
    }

    /// Drains the forwarder: every record accepted so far is submitted and
    /// every upload in flight has finished when this returns.
    ///
    /// Uploads waiting for a retry give up immediately. Only the first call
    /// drains; later calls fail with [`Error::Closed`].
    pub async fn close(&self) -> Result<(), Error> {
        if !self.lifecycle.begin_drain() {
            return Err(Error::Closed);
        }
        self.shutdown.cancel();

        let dispatcher = self.dispatcher.lock().await.take();
        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                error!("logs forwarder dispatch loop failed - {e}");
            }
        }
        self.lifecycle.close();
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.lifecycle.load()
    }
}

struct Dispatcher {
    rx: mpsc::Receiver<Record>,
    aggregator: Aggregator,
    executor: BoundedExecutor,
    uploader: Uploader,
    flush_interval: Duration,
    lifecycle: Arc<Lifecycle>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    async fn run(mut self) {
        debug!("logs forwarder started");

        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    break;
                }
                Some(()) = self.executor.join_next() => {}
                record = self.rx.recv() => match record {
                    Some(record) => {
                        if let Some(batch) = self.aggregator.push(record) {
                            debug!("batch limit reached");
                            self.dispatch(batch);
                        }
                    }
                    None => {
                        debug!("every forwarder handle was dropped");
                        self.lifecycle.begin_drain();
                        self.shutdown.cancel();
                        break;
                    }
                },
                _ = ticker.tick() => {
                    if let Some(batch) = self.aggregator.flush() {
                        debug!("flush interval elapsed");
                        self.dispatch(batch);
                    }
                }
            }
        }

        self.drain().await;
    }

    async fn drain(mut self) {
        debug!("draining logs forwarder");

        self.rx.close();
        while let Some(record) = self.rx.recv().await {
            if let Some(batch) = self.aggregator.push(record) {
                self.dispatch(batch);
            }
        }
        if let Some(batch) = self.aggregator.flush() {
            self.dispatch(batch);
        }

        self.executor.close().await;
        self.lifecycle.close();
        debug!("logs forwarder closed");
    }

    fn dispatch(&mut self, batch: Batch) {
        let count = batch.len();
        debug!(
            "submitting batch of {count} records ({} bytes)",
            batch.byte_size()
        );

        let uploader = self.uploader.clone();
        let task = async move {
            // failures are reported by the uploader itself
            let _ = uploader.send(batch).await;
        };
        if let Err(e) = self.executor.submit(task.in_current_span()) {
            error!("sending {count} records failed - {e}");
        }
    }
}
