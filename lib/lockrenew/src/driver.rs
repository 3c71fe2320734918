// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Run orchestration: paginate the bucket, fan out, drain.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::config::RenewalConfig;
use crate::coordinator::FanOut;
use crate::error::RenewalError;
use crate::policy::RenewalPolicy;
use crate::storage::StorageClient;

/// Counts reported by a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Listing pages fetched.
    pub pages: usize,
    /// Objects a renewal task was started for.
    pub dispatched: usize,
    pub renewed: usize,
    pub skipped: usize,
}

/// Renews every due object lock in one bucket.
pub struct Driver {
    storage: Arc<dyn StorageClient>,
    bucket: String,
    policy: RenewalPolicy,
    max_concurrency: Option<usize>,
    abort_grace: Option<Duration>,
}

impl Driver {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        bucket: impl Into<String>,
        policy: RenewalPolicy,
    ) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
            policy,
            max_concurrency: None,
            abort_grace: None,
        }
    }

    pub fn from_config(storage: Arc<dyn StorageClient>, config: &RenewalConfig) -> Self {
        Self::new(storage, config.bucket.clone(), config.policy())
            .with_max_concurrency(config.max_concurrency)
            .with_abort_grace(config.abort_grace())
    }

    /// Bound the number of objects processed at once. `None` is unbounded.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit;
        self
    }

    /// On failure, cancel in-flight tasks and wait up to `abort_grace` for
    /// them to stop. `None` returns the error without cancelling or waiting.
    pub fn with_abort_grace(mut self, abort_grace: Option<Duration>) -> Self {
        self.abort_grace = abort_grace;
        self
    }

    /// Execute the run.
    ///
    /// Returns the first fatal error from listing, retrieval, or update. Once
    /// an error occurs no further pages are requested and no further tasks
    /// are started. Tasks already in flight keep running unless an abort
    /// grace is set.
    pub async fn run(&self) -> Result<RunSummary, RenewalError> {
        info!(
            bucket = %self.bucket,
            expiry_window_secs = self.policy.expiry_window().num_seconds(),
            lock_duration_secs = self.policy.lock_duration().num_seconds(),
            mode = %self.policy.mode(),
            max_concurrency = self.max_concurrency,
            abort_grace_secs = self.abort_grace.map(|grace| grace.as_secs()),
            "Starting object lock renewal"
        );
        if self.policy.renews_into_window() {
            warn!(
                "Lock duration is shorter than the expiry window; renewed objects will be due again on the next run"
            );
        }

        let fan_out = FanOut::new(self.storage.clone(), &self.bucket, self.policy)
            .with_max_concurrency(self.max_concurrency)
            .with_abort_grace(self.abort_grace);
        let aborted = fan_out.cancellation_token();

        let mut pages = self.storage.list_objects(&self.bucket);
        let mut page_count = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = aborted.cancelled() => break,
                next = pages.next() => next,
            };

            match next {
                Some(Ok(keys)) => {
                    page_count += 1;
                    debug!(page = page_count, keys = keys.len(), "Fetched listing page");
                    for key in keys {
                        if fan_out.is_aborted() {
                            break;
                        }
                        fan_out.dispatch(key).await;
                    }
                }
                Some(Err(source)) => {
                    fan_out.abort(RenewalError::List {
                        bucket: self.bucket.clone(),
                        source,
                    });
                    break;
                }
                None => break,
            }
        }
        drop(pages);

        debug!(
            outstanding = fan_out.outstanding(),
            "Listing finished, waiting for renewal tasks"
        );
        let tasks = fan_out.wait().await?;

        let summary = RunSummary {
            pages: page_count,
            dispatched: tasks.dispatched,
            renewed: tasks.renewed,
            skipped: tasks.skipped,
        };
        info!(
            bucket = %self.bucket,
            pages = summary.pages,
            objects = summary.dispatched,
            renewed = summary.renewed,
            skipped = summary.skipped,
            "Object lock renewal complete"
        );
        Ok(summary)
    }
}
