// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Renewal policy and the renewal decision.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::retention::RetentionMode;

/// When a lock counts as expiring soon, and how far a renewal extends it.
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalPolicy {
    expiry_window: TimeDelta,
    lock_duration: TimeDelta,
    mode: RetentionMode,
}

impl RenewalPolicy {
    /// Default expiry window: 30 days.
    pub const DEFAULT_EXPIRY_WINDOW: Duration = Duration::from_secs(30 * 24 * 3600);

    /// Default lock duration: 90 days.
    pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(90 * 24 * 3600);

    pub fn new(expiry_window: Duration, lock_duration: Duration) -> Self {
        Self {
            expiry_window: to_delta(expiry_window),
            lock_duration: to_delta(lock_duration),
            mode: RetentionMode::Compliance,
        }
    }

    /// Set the retention mode written on renewal.
    pub fn with_mode(mut self, mode: RetentionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn expiry_window(&self) -> TimeDelta {
        self.expiry_window
    }

    pub fn lock_duration(&self) -> TimeDelta {
        self.lock_duration
    }

    pub fn mode(&self) -> RetentionMode {
        self.mode
    }

    /// Whether a lock held until `retain_until` is due for renewal now.
    pub fn is_due(&self, retain_until: DateTime<Utc>) -> bool {
        self.is_due_at(retain_until, Utc::now())
    }

    /// Whether a lock held until `retain_until` is due for renewal at `now`.
    ///
    /// Due means `retain_until < now + expiry_window`; a lock expiring exactly
    /// on the bound is not due.
    pub fn is_due_at(&self, retain_until: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        retain_until < saturating_add(now, self.expiry_window)
    }

    /// New expiry for a lock renewed at `now`.
    pub fn renewed_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        saturating_add(now, self.lock_duration)
    }

    /// A renewal may leave the lock inside the expiry window, making it due
    /// again on the next run.
    pub fn renews_into_window(&self) -> bool {
        self.lock_duration < self.expiry_window
    }
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EXPIRY_WINDOW, Self::DEFAULT_LOCK_DURATION)
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

fn saturating_add(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
