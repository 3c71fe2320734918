// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the renewal pipeline.
//!
//! [`StorageError`] is what a [`StorageClient`](crate::storage::StorageClient)
//! reports. [`RenewalError`] is the run-level taxonomy: every variant is fatal
//! and aborts the whole run.

use thiserror::Error;

use crate::retention::ObjectKey;

/// Failure reported by a storage binding.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object '{key}' has no retention configured")]
    NoRetention { key: ObjectKey },

    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },
}

impl StorageError {
    pub fn service(operation: &'static str, message: impl Into<String>) -> Self {
        StorageError::Service {
            operation,
            message: message.into(),
        }
    }
}

/// Fatal condition that terminates a renewal run.
#[derive(Debug, Error)]
pub enum RenewalError {
    #[error("failed to list objects in bucket '{bucket}': {source}")]
    List {
        bucket: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to get retention for '{key}': {source}")]
    Retrieval {
        key: ObjectKey,
        #[source]
        source: StorageError,
    },

    #[error("failed to update retention for '{key}': {source}")]
    Update {
        key: ObjectKey,
        #[source]
        source: StorageError,
    },
}

impl RenewalError {
    /// The object the failure is attributed to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            RenewalError::List { .. } => None,
            RenewalError::Retrieval { key, .. } | RenewalError::Update { key, .. } => Some(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_key() {
        let err = RenewalError::Retrieval {
            key: "reports/2025.csv".into(),
            source: StorageError::NoRetention {
                key: "reports/2025.csv".into(),
            },
        };
        assert_eq!(err.key(), Some("reports/2025.csv"));
        assert!(err.to_string().contains("reports/2025.csv"));

        let err = RenewalError::List {
            bucket: "vault".into(),
            source: StorageError::service("list_objects_v2", "access denied"),
        };
        assert_eq!(err.key(), None);
        assert_eq!(
            err.to_string(),
            "failed to list objects in bucket 'vault': list_objects_v2 failed: access denied"
        );
    }
}
