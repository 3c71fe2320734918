// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Run configuration.
//!
//! Sources in priority order (lowest to highest):
//! 1. Code defaults
//! 2. System config file at `/etc/lockrenew/lockrenew.toml`
//! 3. TOML file from the `LOCKRENEW_CONFIG_PATH` environment variable (or an explicit path)
//! 4. Environment variables (`LOCKRENEW_*`, `LOCKRENEW_S3_*` for the `s3` table)
//! 5. Programmatic overrides merged by the caller, e.g. command-line flags
//!
//! Example:
//! ```toml
//! bucket = "archive"
//! update_expires_within_secs = 2592000
//! lock_for_secs = 7776000
//!
//! [s3]
//! endpoint_url = "https://s3.eu-central-1.wasabisys.com"
//! region = "eu-central-1"
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::policy::RenewalPolicy;
use crate::retention::RetentionMode;

/// ENV naming the TOML configuration file
pub const CONFIG_PATH_ENV: &str = "LOCKRENEW_CONFIG_PATH";

/// System-wide configuration file
const SYSTEM_CONFIG_PATH: &str = "/etc/lockrenew/lockrenew.toml";

/// Upper bound for any configured duration: 100 years.
const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 3600;

/// Largest concurrency limit a semaphore can hold.
const MAX_CONCURRENCY: usize = Semaphore::MAX_PERMITS;

/// Top-level keys that may be set through `LOCKRENEW_<KEY>`.
const TOP_LEVEL_ENV_KEYS: &[&str] = &[
    "bucket",
    "update_expires_within_secs",
    "lock_for_secs",
    "mode",
    "max_concurrency",
    "abort_grace_secs",
];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to extract configuration: {0}")]
    Extraction(#[from] Box<figment::Error>),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Configuration of one renewal run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RenewalConfig {
    /// Bucket whose objects are renewed.
    #[validate(length(min = 1, message = "a bucket name is required"))]
    pub bucket: String,

    /// Connection settings for the storage service.
    #[validate(nested)]
    #[serde(default)]
    pub s3: S3Config,

    /// Renew objects whose lock expires within this many seconds.
    #[validate(range(min = 1, max = MAX_DURATION_SECS))]
    pub update_expires_within_secs: u64,

    /// How many seconds past the renewal a renewed lock extends.
    #[validate(range(min = 1, max = MAX_DURATION_SECS))]
    pub lock_for_secs: u64,

    /// Retention mode written on renewal.
    #[serde(default)]
    pub mode: RetentionMode,

    /// Maximum number of objects processed at once. None = unbounded.
    #[validate(range(min = 1, max = MAX_CONCURRENCY))]
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// When set, an aborted run cancels in-flight tasks and waits this many
    /// seconds for them to stop. None = return at once, leave them running.
    #[validate(range(max = MAX_DURATION_SECS))]
    #[serde(default)]
    pub abort_grace_secs: Option<u64>,
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            s3: S3Config::default(),
            update_expires_within_secs: RenewalPolicy::DEFAULT_EXPIRY_WINDOW.as_secs(),
            lock_for_secs: RenewalPolicy::DEFAULT_LOCK_DURATION.as_secs(),
            mode: RetentionMode::default(),
            max_concurrency: None,
            abort_grace_secs: None,
        }
    }
}

impl RenewalConfig {
    /// Create a Figment configuration with all sources merged.
    pub fn figment() -> Figment {
        let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_default();
        Self::figment_with_file(Path::new(&config_path))
    }

    /// Like [`figment`](Self::figment), but reads `config_path` instead of the
    /// file named by `LOCKRENEW_CONFIG_PATH`.
    pub fn figment_with_file(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(RenewalConfig::default()))
            .merge(Toml::file(SYSTEM_CONFIG_PATH))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("LOCKRENEW_").only(TOP_LEVEL_ENV_KEYS))
            // S3 config: LOCKRENEW_S3_ENDPOINT_URL, LOCKRENEW_S3_REGION, etc.
            .merge(
                Env::prefixed("LOCKRENEW_S3_")
                    .map(|k| format!("s3.{}", k.as_str().to_lowercase()).into()),
            )
    }

    /// Load configuration from default figment (env and files).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::extract_from(Self::figment())
    }

    /// Extract and validate configuration from any provider.
    pub fn extract_from<T: Provider>(provider: T) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(provider)
            .extract()
            .map_err(|e| ConfigError::Extraction(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// The renewal policy described by this configuration.
    pub fn policy(&self) -> RenewalPolicy {
        RenewalPolicy::new(
            Duration::from_secs(self.update_expires_within_secs),
            Duration::from_secs(self.lock_for_secs),
        )
        .with_mode(self.mode)
    }

    pub fn abort_grace(&self) -> Option<Duration> {
        self.abort_grace_secs.map(Duration::from_secs)
    }
}

impl Provider for RenewalConfig {
    fn metadata(&self) -> Metadata {
        Metadata::named("RenewalConfig")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}

/// S3-compatible service connection settings.
#[derive(Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_credentials"))]
pub struct S3Config {
    /// Custom endpoint URL for S3-compatible services (e.g., MinIO).
    /// If None, uses the default AWS S3 endpoint.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// AWS region. S3-compatible services mostly ignore it, but the SDK needs one.
    #[serde(default = "default_region")]
    pub region: String,

    /// Use path-style URLs instead of virtual-hosted-style.
    /// Required for MinIO and some S3-compatible services.
    #[serde(default)]
    pub force_path_style: bool,

    /// Static access key id. When unset the SDK's default credential chain is used.
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Static secret access key.
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: default_region(),
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl S3Config {
    /// The static key pair, if both parts are configured.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("force_path_style", &self.force_path_style)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

fn validate_credentials(config: &S3Config) -> Result<(), ValidationError> {
    if config.access_key_id.is_some() != config.secret_access_key.is_some() {
        let mut err = ValidationError::new("incomplete_credentials");
        err.message =
            Some("access_key_id and secret_access_key must be set together".into());
        return Err(err);
    }
    Ok(())
}

/// Returns true if `name` is set to a truthy value (`1`, `true`, `on`, `yes`).
pub fn env_is_truthy(name: &str) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        Err(_) => false,
    }
}

/// Check whether JSONL logging is enabled
/// Set the `LOCKRENEW_LOGGING_JSONL` environment variable to a truthy value
pub fn jsonl_logging_enabled() -> bool {
    env_is_truthy("LOCKRENEW_LOGGING_JSONL")
}

/// Check whether ANSI terminal colors should be disabled in logs
/// Set the `LOCKRENEW_DISABLE_ANSI_LOGGING` environment variable to a truthy value
pub fn disable_ansi_logging() -> bool {
    env_is_truthy("LOCKRENEW_DISABLE_ANSI_LOGGING")
}

/// Check whether to use the local timezone for log timestamps (default is UTC)
/// Set the `LOCKRENEW_LOG_USE_LOCAL_TZ` environment variable to a truthy value
pub fn use_local_timezone() -> bool {
    env_is_truthy("LOCKRENEW_LOG_USE_LOCAL_TZ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    const ENV_VARS: &[&str] = &[
        "LOCKRENEW_CONFIG_PATH",
        "LOCKRENEW_BUCKET",
        "LOCKRENEW_LOCK_FOR_SECS",
        "LOCKRENEW_UPDATE_EXPIRES_WITHIN_SECS",
        "LOCKRENEW_MODE",
        "LOCKRENEW_MAX_CONCURRENCY",
        "LOCKRENEW_ABORT_GRACE_SECS",
        "LOCKRENEW_S3_ENDPOINT_URL",
        "LOCKRENEW_S3_REGION",
        "LOCKRENEW_S3_FORCE_PATH_STYLE",
    ];

    #[test]
    fn test_default_config() {
        let config = RenewalConfig::default();
        assert_eq!(config.update_expires_within_secs, 30 * 24 * 3600);
        assert_eq!(config.lock_for_secs, 90 * 24 * 3600);
        assert_eq!(config.mode, RetentionMode::Compliance);
        assert!(config.max_concurrency.is_none());
        assert!(config.abort_grace().is_none());
        assert_eq!(config.s3.region, "us-east-1");
        assert!(config.s3.static_credentials().is_none());
    }

    #[test]
    fn test_missing_bucket_is_rejected() {
        temp_env::with_vars_unset(ENV_VARS.to_vec(), || {
            let err = RenewalConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)));
        });
    }

    #[test]
    fn test_env_override() {
        temp_env::with_vars(
            vec![
                ("LOCKRENEW_CONFIG_PATH", None),
                ("LOCKRENEW_BUCKET", Some("archive")),
                ("LOCKRENEW_LOCK_FOR_SECS", Some("86400")),
                ("LOCKRENEW_MODE", Some("governance")),
                ("LOCKRENEW_MAX_CONCURRENCY", Some("64")),
                ("LOCKRENEW_S3_ENDPOINT_URL", Some("http://minio:9000")),
                ("LOCKRENEW_S3_FORCE_PATH_STYLE", Some("true")),
            ],
            || {
                let config = RenewalConfig::from_env().unwrap();
                assert_eq!(config.bucket, "archive");
                assert_eq!(config.lock_for_secs, 86400);
                assert_eq!(config.mode, RetentionMode::Governance);
                assert_eq!(config.max_concurrency, Some(64));
                assert_eq!(config.s3.endpoint_url.as_deref(), Some("http://minio:9000"));
                assert!(config.s3.force_path_style);
            },
        );
    }

    #[test]
    fn test_tuple_override_beats_env() {
        temp_env::with_vars(
            vec![
                ("LOCKRENEW_CONFIG_PATH", None),
                ("LOCKRENEW_BUCKET", Some("from-env")),
            ],
            || {
                let figment = RenewalConfig::figment()
                    .merge(("bucket", "from-cli"))
                    .merge(("s3.region", "eu-west-1"));
                let config = RenewalConfig::extract_from(figment).unwrap();
                assert_eq!(config.bucket, "from-cli");
                assert_eq!(config.s3.region, "eu-west-1");
            },
        );
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        let config = RenewalConfig {
            bucket: "archive".into(),
            lock_for_secs: 0,
            ..Default::default()
        };
        assert!(RenewalConfig::extract_from(Figment::from(&config)).is_err());

        let config = RenewalConfig {
            bucket: "archive".into(),
            max_concurrency: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_concurrency_above_semaphore_limit_is_rejected() {
        let mut config = RenewalConfig {
            bucket: "archive".into(),
            max_concurrency: Some(usize::MAX),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.max_concurrency = Some(Semaphore::MAX_PERMITS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_abort_grace_from_env() {
        temp_env::with_vars(
            vec![
                ("LOCKRENEW_CONFIG_PATH", None),
                ("LOCKRENEW_BUCKET", Some("archive")),
                ("LOCKRENEW_ABORT_GRACE_SECS", Some("5")),
            ],
            || {
                let config = RenewalConfig::from_env().unwrap();
                assert_eq!(config.abort_grace(), Some(Duration::from_secs(5)));
            },
        );
    }

    #[test]
    fn test_half_credentials_are_rejected() {
        let config = RenewalConfig {
            bucket: "archive".into(),
            s3: S3Config {
                access_key_id: Some("AKIAEXAMPLE".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = S3Config {
            access_key_id: Some("AKIAEXAMPLE".into()),
            secret_access_key: Some("hunter2".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_policy_from_config() {
        let config = RenewalConfig {
            bucket: "archive".into(),
            update_expires_within_secs: 3600,
            lock_for_secs: 7200,
            mode: RetentionMode::Governance,
            ..Default::default()
        };
        let policy = config.policy();
        assert_eq!(policy.expiry_window(), TimeDelta::hours(1));
        assert_eq!(policy.lock_duration(), TimeDelta::hours(2));
        assert_eq!(policy.mode(), RetentionMode::Governance);
    }

    #[test]
    fn test_disable_ansi_logging_env() {
        temp_env::with_var("LOCKRENEW_DISABLE_ANSI_LOGGING", Some("1"), || {
            assert!(disable_ansi_logging());
        });
        temp_env::with_var_unset("LOCKRENEW_DISABLE_ANSI_LOGGING", || {
            assert!(!disable_ansi_logging());
        });
    }

    #[test]
    fn test_env_is_truthy() {
        temp_env::with_var("LOCKRENEW_TEST_FLAG", Some("TRUE"), || {
            assert!(env_is_truthy("LOCKRENEW_TEST_FLAG"));
        });
        temp_env::with_var("LOCKRENEW_TEST_FLAG", Some("0"), || {
            assert!(!env_is_truthy("LOCKRENEW_TEST_FLAG"));
        });
        temp_env::with_var_unset("LOCKRENEW_TEST_FLAG", || {
            assert!(!env_is_truthy("LOCKRENEW_TEST_FLAG"));
        });
    }
}
