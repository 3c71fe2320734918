// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! In-memory [`StorageClient`] for tests.
//!
//! Holds one retention record per key, pages the listing with a configurable
//! page size, and can inject listing, retrieval, and update failures.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{KeyPage, PageStream, StorageClient};
use crate::error::StorageError;
use crate::retention::{ObjectKey, RetentionMode, RetentionRecord};

/// A retention update observed by [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionWrite {
    pub key: ObjectKey,
    pub mode: RetentionMode,
    pub retain_until: DateTime<Utc>,
    /// Wall-clock time at which the update call arrived.
    pub received_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, Option<RetentionRecord>>,
    writes: Vec<RetentionWrite>,
    retrievals: usize,
    fail_listing_at_page: Option<usize>,
    fail_retrieval: HashSet<ObjectKey>,
    fail_update: HashSet<ObjectKey>,
}

/// In-memory bucket contents with failure injection.
pub struct MemoryStorage {
    state: Mutex<State>,
    page_size: usize,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Same page size S3 uses for `ListObjectsV2`.
    pub const DEFAULT_PAGE_SIZE: usize = 1000;

    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: Self::DEFAULT_PAGE_SIZE,
            latency: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Number of keys per listing page. Zero is treated as one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Delay every retention read and write by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add an object locked in compliance mode until `retain_until`.
    pub fn with_object(self, key: impl Into<ObjectKey>, retain_until: DateTime<Utc>) -> Self {
        self.insert(key, retain_until);
        self
    }

    /// Add an object with no retention configured.
    pub fn with_unlocked_object(self, key: impl Into<ObjectKey>) -> Self {
        self.state.lock().objects.insert(key.into(), None);
        self
    }

    /// Fail the listing when page `index` (zero based) is requested.
    pub fn fail_listing_at_page(self, index: usize) -> Self {
        self.state.lock().fail_listing_at_page = Some(index);
        self
    }

    /// Fail every retention read for `key`.
    pub fn fail_retrieval(self, key: impl Into<ObjectKey>) -> Self {
        self.state.lock().fail_retrieval.insert(key.into());
        self
    }

    /// Fail every retention update for `key`.
    pub fn fail_update(self, key: impl Into<ObjectKey>) -> Self {
        self.state.lock().fail_update.insert(key.into());
        self
    }

    /// Add or replace an object locked in compliance mode until `retain_until`.
    pub fn insert(&self, key: impl Into<ObjectKey>, retain_until: DateTime<Utc>) {
        self.state.lock().objects.insert(
            key.into(),
            Some(RetentionRecord::new(RetentionMode::Compliance, retain_until)),
        );
    }

    /// Current retention of `key`, if the object exists and has one.
    pub fn retention(&self, key: &str) -> Option<RetentionRecord> {
        self.state.lock().objects.get(key).cloned().flatten()
    }

    /// All updates received so far, in arrival order.
    pub fn writes(&self) -> Vec<RetentionWrite> {
        self.state.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().writes.len()
    }

    pub fn retrieval_count(&self) -> usize {
        self.state.lock().retrievals
    }

    /// Highest number of retention requests that were in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_request(&self) -> InFlight<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        guard
    }
}

/// Decrements the in-flight counter when a simulated request ends.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    fn list_objects(&self, bucket: &str) -> PageStream {
        let (keys, fail_at) = {
            let state = self.state.lock();
            let keys: Vec<ObjectKey> = state.objects.keys().cloned().collect();
            (keys, state.fail_listing_at_page)
        };

        // An empty bucket still answers with one empty page.
        let pages: Vec<KeyPage> = if keys.is_empty() {
            vec![Vec::new()]
        } else {
            keys.chunks(self.page_size).map(<[_]>::to_vec).collect()
        };
        let bucket = bucket.to_owned();

        Box::pin(try_stream! {
            for (index, page) in pages.into_iter().enumerate() {
                if fail_at == Some(index) {
                    Err::<(), _>(StorageError::service(
                        "list_objects_v2",
                        format!("injected failure listing page {index} of '{bucket}'"),
                    ))?;
                }
                yield page;
            }
        })
    }

    async fn get_retention(
        &self,
        _bucket: &str,
        key: &str,
    ) -> Result<RetentionRecord, StorageError> {
        let _request = self.simulate_request().await;

        let mut state = self.state.lock();
        state.retrievals += 1;
        if state.fail_retrieval.contains(key) {
            return Err(StorageError::service(
                "get_object_retention",
                format!("injected failure for '{key}'"),
            ));
        }
        match state.objects.get(key) {
            Some(Some(record)) => Ok(record.clone()),
            Some(None) => Err(StorageError::NoRetention { key: key.to_owned() }),
            None => Err(StorageError::service(
                "get_object_retention",
                format!("NoSuchKey: '{key}'"),
            )),
        }
    }

    async fn put_retention(
        &self,
        _bucket: &str,
        key: &str,
        mode: RetentionMode,
        retain_until: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let _request = self.simulate_request().await;

        let mut state = self.state.lock();
        if state.fail_update.contains(key) {
            return Err(StorageError::service(
                "put_object_retention",
                format!("injected failure for '{key}'"),
            ));
        }
        let Some(entry) = state.objects.get_mut(key) else {
            return Err(StorageError::service(
                "put_object_retention",
                format!("NoSuchKey: '{key}'"),
            ));
        };
        *entry = Some(RetentionRecord::new(mode, retain_until));
        state.writes.push(RetentionWrite {
            key: key.to_owned(),
            mode,
            retain_until,
            received_at: Utc::now(),
        });
        Ok(())
    }
}
