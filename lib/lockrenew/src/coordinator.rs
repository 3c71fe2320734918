// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Fan-out of per-object renewal tasks.
//!
//! [`FanOut`] spawns one task per object key on a [`TaskTracker`] and knows
//! when all of them have finished. By default every key is dispatched
//! immediately; an optional limit bounds how many tasks run at once, in which
//! case [`FanOut::dispatch`] waits for a free slot.
//!
//! The first task failure wins: it is recorded, the run is marked aborted, and
//! [`FanOut::wait`] returns the error at once. No further tasks are started,
//! while tasks already in flight are neither cancelled nor waited for.
//!
//! With an abort grace configured ([`FanOut::with_abort_grace`]) the abort is
//! also propagated: in-flight tasks stop at their next suspension point and
//! `wait` gives them at most the grace period to do so before returning.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, trace, warn};

use crate::error::RenewalError;
use crate::policy::RenewalPolicy;
use crate::retention::ObjectKey;
use crate::storage::StorageClient;
use crate::task::{TaskOutcome, renew_object};

/// Per-outcome task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutSummary {
    pub dispatched: usize,
    pub renewed: usize,
    pub skipped: usize,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicUsize,
    renewed: AtomicUsize,
    skipped: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> FanOutSummary {
        FanOutSummary {
            dispatched: self.dispatched.load(Ordering::Acquire),
            renewed: self.renewed.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
        }
    }
}

/// First fatal error of a run, shared by all tasks.
#[derive(Clone, Default)]
struct FailureSlot {
    first: Arc<Mutex<Option<RenewalError>>>,
    aborted: CancellationToken,
}

impl FailureSlot {
    /// Record `err` if no failure has been recorded yet, then mark the run aborted.
    fn record(&self, err: RenewalError) {
        {
            let mut first = self.first.lock();
            if first.is_some() {
                debug!(key = err.key(), error = %err, "Additional failure after abort");
                return;
            }
            error!(key = err.key(), error = %err, "Renewal failed, aborting run");
            *first = Some(err);
        }
        self.aborted.cancel();
    }

    fn take(&self) -> Option<RenewalError> {
        self.first.lock().take()
    }
}

/// Dispatches renewal tasks and tracks their completion.
pub struct FanOut {
    storage: Arc<dyn StorageClient>,
    bucket: Arc<str>,
    policy: RenewalPolicy,
    tracker: TaskTracker,
    limiter: Option<Arc<Semaphore>>,
    abort_grace: Option<Duration>,
    failure: FailureSlot,
    counters: Arc<Counters>,
}

impl FanOut {
    /// Create an unbounded fan-out.
    pub fn new(storage: Arc<dyn StorageClient>, bucket: &str, policy: RenewalPolicy) -> Self {
        Self {
            storage,
            bucket: Arc::from(bucket),
            policy,
            tracker: TaskTracker::new(),
            limiter: None,
            abort_grace: None,
            failure: FailureSlot::default(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Bound the number of concurrently running tasks. `None` keeps it unbounded.
    ///
    /// The limit is clamped to `1..=Semaphore::MAX_PERMITS`.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.limiter = limit
            .map(|limit| Arc::new(Semaphore::new(limit.clamp(1, Semaphore::MAX_PERMITS))));
        self
    }

    /// Cancel in-flight tasks on abort and wait up to `abort_grace` for them
    /// to stop. `None` leaves them running and returns the error at once.
    pub fn with_abort_grace(mut self, abort_grace: Option<Duration>) -> Self {
        self.abort_grace = abort_grace;
        self
    }

    /// Token cancelled when the run aborts.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.failure.aborted.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.failure.aborted.is_cancelled()
    }

    /// Number of dispatched tasks that have not finished yet.
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    /// Start a renewal task for `key`.
    ///
    /// Returns once the task is spawned. With a concurrency limit this first
    /// waits for a free slot; if the run aborts meanwhile the key is dropped.
    pub async fn dispatch(&self, key: ObjectKey) {
        let permit = match &self.limiter {
            Some(limiter) => tokio::select! {
                biased;
                _ = self.failure.aborted.cancelled() => return,
                permit = limiter.clone().acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
            },
            None => None,
        };

        if self.is_aborted() {
            trace!(key = %key, "Run aborted, not dispatching");
            return;
        }

        self.counters.dispatched.fetch_add(1, Ordering::AcqRel);

        let storage = self.storage.clone();
        let bucket = self.bucket.clone();
        let policy = self.policy;
        let failure = self.failure.clone();
        let counters = self.counters.clone();
        let cancel = self.abort_grace.map(|_| self.failure.aborted.clone());

        self.tracker.spawn(async move {
            let _permit = permit;

            let renewal = renew_object(storage.as_ref(), &bucket, &key, &policy);
            let outcome = match cancel {
                Some(cancel) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        trace!(key = %key, "Renewal task cancelled");
                        return;
                    }
                    outcome = renewal => outcome,
                },
                None => renewal.await,
            };

            match outcome {
                Ok(TaskOutcome::Renewed { .. }) => {
                    counters.renewed.fetch_add(1, Ordering::AcqRel);
                }
                Ok(TaskOutcome::Skipped { .. }) => {
                    counters.skipped.fetch_add(1, Ordering::AcqRel);
                }
                Err(err) => failure.record(err),
            }
        });
    }

    /// Abort the run with `err` unless another failure came first.
    pub fn abort(&self, err: RenewalError) {
        self.failure.record(err);
    }

    /// Wait until every dispatched task has finished, or until the run aborts.
    ///
    /// On abort the first error is returned without waiting for outstanding
    /// tasks, unless an abort grace is configured.
    pub async fn wait(&self) -> Result<FanOutSummary, RenewalError> {
        self.tracker.close();

        tokio::select! {
            _ = self.tracker.wait() => {}
            _ = self.failure.aborted.cancelled() => {}
        }

        if let Some(err) = self.failure.take() {
            match self.abort_grace {
                Some(abort_grace) => self.drain(abort_grace).await,
                None => debug!(
                    outstanding = self.tracker.len(),
                    "Run aborted, not waiting for outstanding renewal tasks"
                ),
            }
            return Err(err);
        }

        Ok(self.counters.snapshot())
    }

    async fn drain(&self, abort_grace: Duration) {
        if tokio::time::timeout(abort_grace, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                outstanding = self.tracker.len(),
                grace_secs = abort_grace.as_secs_f64(),
                "Abort grace period elapsed with renewal tasks still outstanding"
            );
        } else {
            debug!("All outstanding renewal tasks stopped after abort");
        }
    }

    pub fn summary(&self) -> FanOutSummary {
        self.counters.snapshot()
    }
}
