// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Retry timing for failed uploads.
//!
//! The retry policy is a stateless function from a zero-based retry index to
//! the time to wait before that retry. Each upload evaluates it on its own, so
//! one batch's failures never change another batch's timing.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{BACKOFF_BASE, BACKOFF_FACTOR, BACKOFF_MAX};

pub type RetryAfterFn = Arc<dyn Fn(usize) -> Duration + Send + Sync>;

/// Wait duration before the retry with the given index.
#[derive(Clone)]
pub struct RetryAfter(RetryAfterFn);

impl RetryAfter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        RetryAfter(Arc::new(f))
    }

    /// Waits the same duration before every retry.
    #[must_use]
    pub fn constant(wait: Duration) -> Self {
        Self::new(move |_| wait)
    }

    #[must_use]
    pub fn duration(&self, retry_index: usize) -> Duration {
        (self.0)(retry_index)
    }
}

impl Default for RetryAfter {
    fn default() -> Self {
        let backoff = ExponentialBackoff::default();
        Self::new(move |retry_index| backoff.duration(retry_index))
    }
}

impl From<ExponentialBackoff> for RetryAfter {
    fn from(backoff: ExponentialBackoff) -> Self {
        Self::new(move |retry_index| backoff.duration(retry_index))
    }
}

impl Debug for RetryAfter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RetryAfter")
    }
}

/// `base * factor^n`, randomized by `±jitter` and capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub factor: u32,
    /// Fraction of the computed wait that is randomized, in `[0, 1]`.
    pub jitter: f64,
    pub max: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        ExponentialBackoff {
            base: BACKOFF_BASE,
            factor: BACKOFF_FACTOR,
            jitter: 0.25,
            max: BACKOFF_MAX,
        }
    }
}

impl ExponentialBackoff {
    #[must_use]
    pub fn duration(&self, retry_index: usize) -> Duration {
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let max = self.max.as_secs_f64();
        let mut wait = self.base.as_secs_f64() * f64::from(self.factor).powi(exponent);

        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter > 0.0 {
            // uniform in [1 - jitter, 1 + jitter)
            wait *= 1.0 - jitter + 2.0 * jitter * fastrand::f64();
        }

        if !wait.is_finite() || wait > max {
            return self.max;
        }
        Duration::from_secs_f64(wait.max(0.0))
    }
}
