// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Bulk renewal of S3 object-lock retention.
//!
//! Lists every object in a bucket and, for each object whose lock expires
//! within the configured window, extends the lock to `now + lock duration`.
//! Objects are processed concurrently; the first failure aborts the run.
//!
//! ```rust,ignore
//! let config = RenewalConfig::from_env()?;
//! let storage = Arc::new(S3StorageClient::new(&config.s3).await);
//! let summary = Driver::from_config(storage, &config).run().await?;
//! ```

pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod logging;
pub mod policy;
pub mod retention;
pub mod storage;
pub mod task;

pub use config::{ConfigError, RenewalConfig, S3Config};
pub use coordinator::{FanOut, FanOutSummary};
pub use driver::{Driver, RunSummary};
pub use error::{RenewalError, StorageError};
pub use policy::RenewalPolicy;
pub use retention::{ObjectKey, RetentionMode, RetentionRecord};
pub use storage::{S3StorageClient, StorageClient};
pub use task::{TaskOutcome, renew_object};
