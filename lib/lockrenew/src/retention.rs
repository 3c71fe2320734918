// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Object-lock retention records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key identifying one object within a bucket.
pub type ObjectKey = String;

/// Object-lock retention class.
///
/// In `Compliance` mode no principal can shorten or remove the lock before it
/// expires. In `Governance` mode principals with the bypass permission can.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMode {
    #[default]
    Compliance,
    Governance,
}

impl RetentionMode {
    /// Wire name used by the S3 API.
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionMode::Compliance => "COMPLIANCE",
            RetentionMode::Governance => "GOVERNANCE",
        }
    }
}

impl fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetentionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("compliance") {
            Ok(RetentionMode::Compliance)
        } else if s.eq_ignore_ascii_case("governance") {
            Ok(RetentionMode::Governance)
        } else {
            Err(format!(
                "unknown retention mode '{s}', expected 'compliance' or 'governance'"
            ))
        }
    }
}

/// Retention currently configured on an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionRecord {
    /// Retention class. `None` when the service reports a mode this crate does not know.
    pub mode: Option<RetentionMode>,

    /// Instant until which the object is locked.
    pub retain_until: DateTime<Utc>,
}

impl RetentionRecord {
    pub fn new(mode: RetentionMode, retain_until: DateTime<Utc>) -> Self {
        Self {
            mode: Some(mode),
            retain_until,
        }
    }
}
