// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity concurrency gate for upload tasks.
//!
//! Every submitted task holds one semaphore permit for its whole lifetime. When
//! no permit is available the task is refused immediately; it is never queued
//! and the caller never waits. Tasks run on the tokio runtime inside a
//! [`JoinSet`], which turns a panicking task into a [`JoinError`] instead of
//! tearing down the caller. Finished tasks are reaped with
//! [`BoundedExecutor::join_next`] or [`BoundedExecutor::close`], which report
//! panics through the diagnostics.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error};

use crate::errors::Error;

#[derive(Debug)]
pub struct BoundedExecutor {
    capacity: usize,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl BoundedExecutor {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        BoundedExecutor {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            tasks: JoinSet::new(),
        }
    }

    /// Starts `task` unless `capacity` tasks are already running, in which case
    /// [`Error::TooManyRequests`] is returned and `task` is dropped unpolled.
    pub fn submit<F>(&mut self, task: F) -> Result<(), Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| Error::TooManyRequests)?;

        self.tasks.spawn(async move {
            // released when the task finishes or unwinds
            let _permit = permit;
            task.await;
        });
        Ok(())
    }

    /// Number of tasks currently holding a permit.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Waits for the next task to finish and reports it. Returns `None`
    /// immediately when no task is left to reap.
    pub async fn join_next(&mut self) -> Option<()> {
        let result = self.tasks.join_next().await?;
        Self::report(result);
        Some(())
    }

    /// Waits until every submitted task has finished.
    pub async fn close(&mut self) {
        debug!("waiting for {} in-flight sends", self.tasks.len());
        while let Some(result) = self.tasks.join_next().await {
            Self::report(result);
        }
    }

    fn report(result: Result<(), JoinError>) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                error!("{}", Error::Panicked(format_panic(e)));
            }
            Err(e) => {
                error!("send task failed - {e}");
            }
        }
    }
}

fn format_panic(join_err: JoinError) -> String {
    match join_err.into_panic().downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}
