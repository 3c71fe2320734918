// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Storage capability consumed by the renewal pipeline.
//!
//! The pipeline only depends on [`StorageClient`]. Bindings:
//! - [`S3StorageClient`] - S3-compatible services through the AWS SDK
//! - [`MemoryStorage`] - in-process fake for tests (feature `testing`)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::StorageError;
use crate::retention::{ObjectKey, RetentionMode, RetentionRecord};

mod s3;

#[cfg(any(test, feature = "testing"))]
mod memory;

pub use s3::S3StorageClient;

#[cfg(any(test, feature = "testing"))]
pub use memory::{MemoryStorage, RetentionWrite};

/// One page of object keys from a bucket listing.
pub type KeyPage = Vec<ObjectKey>;

/// Lazy, finite, non-restartable sequence of listing pages.
pub type PageStream = BoxStream<'static, Result<KeyPage, StorageError>>;

/// Object storage operations needed to renew retention.
///
/// Implementations must be safe to share across concurrently running tasks.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// List every object key in `bucket`, one page at a time.
    ///
    /// Nothing is fetched until the stream is polled.
    fn list_objects(&self, bucket: &str) -> PageStream;

    /// Read the retention currently configured on an object.
    ///
    /// Fails with [`StorageError::NoRetention`] if the object has none.
    async fn get_retention(&self, bucket: &str, key: &str)
        -> Result<RetentionRecord, StorageError>;

    /// Replace the retention configured on an object.
    async fn put_retention(
        &self,
        bucket: &str,
        key: &str,
        mode: RetentionMode,
        retain_until: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}
