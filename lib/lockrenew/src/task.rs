// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-object renewal: read retention, decide, conditionally write.

use chrono::{DateTime, Utc};

use crate::error::RenewalError;
use crate::policy::RenewalPolicy;
use crate::storage::StorageClient;

/// Result of renewing a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The lock was extended to `retain_until`.
    Renewed { retain_until: DateTime<Utc> },

    /// The lock, held until `retain_until`, was not due.
    Skipped { retain_until: DateTime<Utc> },
}

/// Renew the lock on `key` if it expires within the policy's window.
///
/// Issues at most one update, and none when renewal is not due. Any storage
/// failure is returned as-is; callers treat it as fatal for the run.
pub async fn renew_object(
    storage: &dyn StorageClient,
    bucket: &str,
    key: &str,
    policy: &RenewalPolicy,
) -> Result<TaskOutcome, RenewalError> {
    let current = storage
        .get_retention(bucket, key)
        .await
        .map_err(|source| RenewalError::Retrieval {
            key: key.to_owned(),
            source,
        })?;

    if !policy.is_due(current.retain_until) {
        tracing::debug!(key, retain_until = %current.retain_until, "Object lock not due for renewal");
        return Ok(TaskOutcome::Skipped {
            retain_until: current.retain_until,
        });
    }

    let retain_until = policy.renewed_until(Utc::now());
    tracing::info!(
        key,
        previous = %current.retain_until,
        retain_until = %retain_until,
        "Renewing object lock"
    );

    storage
        .put_retention(bucket, key, policy.mode(), retain_until)
        .await
        .map_err(|source| RenewalError::Update {
            key: key.to_owned(),
            source,
        })?;

    Ok(TaskOutcome::Renewed { retain_until })
}
