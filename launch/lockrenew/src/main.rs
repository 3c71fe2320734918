// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use lockrenew::{
    Driver, RenewalConfig, RenewalError, RetentionMode, RunSummary, S3StorageClient, logging,
};

/// Exit status for configuration errors.
const EXIT_CONFIG: u8 = 2;

/// Renew S3 object locks that are about to expire.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bucket whose objects are renewed
    #[arg(long)]
    bucket: Option<String>,

    /// S3 endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// S3 region
    #[arg(long)]
    region: Option<String>,

    /// Use path-style bucket addressing (MinIO and most S3-compatible services)
    #[arg(long)]
    force_path_style: bool,

    /// Static access key id; the SDK default credential chain is used when unset
    #[arg(long)]
    access_key_id: Option<String>,

    /// Static secret access key
    #[arg(long)]
    secret_access_key: Option<String>,

    /// Only update objects whose lock expires within this many seconds [default: 2592000, 30 days]
    #[arg(long, value_name = "SECONDS")]
    update_expires_within: Option<u64>,

    /// How many seconds to renew the object lock for [default: 7776000, 90 days]
    #[arg(long, value_name = "SECONDS")]
    lock_for: Option<u64>,

    /// Retention mode written on renewal: compliance or governance [default: compliance]
    #[arg(long)]
    mode: Option<RetentionMode>,

    /// Maximum number of objects processed at once [default: unbounded]
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// On failure, cancel in-flight requests and wait up to this many seconds
    /// for them to stop [default: return at once without cancelling]
    #[arg(long, value_name = "SECONDS")]
    abort_grace: Option<u64>,

    /// TOML configuration file; overrides LOCKRENEW_CONFIG_PATH
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let args = Args::parse();

    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match run(&config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(
                bucket = %config.bucket,
                key = err.key(),
                error = %err,
                "Object lock renewal aborted"
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &RenewalConfig) -> Result<RunSummary, RenewalError> {
    let storage = Arc::new(S3StorageClient::new(&config.s3).await);
    Driver::from_config(storage, config).run().await
}

/// Merge command-line flags over files and environment.
fn load_config(args: Args) -> Result<RenewalConfig> {
    let mut figment = match &args.config {
        Some(path) => RenewalConfig::figment_with_file(path),
        None => RenewalConfig::figment(),
    };

    if let Some(bucket) = args.bucket {
        figment = figment.merge(("bucket", bucket));
    }
    if let Some(endpoint) = args.endpoint {
        figment = figment.merge(("s3.endpoint_url", endpoint));
    }
    if let Some(region) = args.region {
        figment = figment.merge(("s3.region", region));
    }
    if args.force_path_style {
        figment = figment.merge(("s3.force_path_style", true));
    }
    if let Some(access_key_id) = args.access_key_id {
        figment = figment.merge(("s3.access_key_id", access_key_id));
    }
    if let Some(secret_access_key) = args.secret_access_key {
        figment = figment.merge(("s3.secret_access_key", secret_access_key));
    }
    if let Some(secs) = args.update_expires_within {
        figment = figment.merge(("update_expires_within_secs", secs));
    }
    if let Some(secs) = args.lock_for {
        figment = figment.merge(("lock_for_secs", secs));
    }
    if let Some(mode) = args.mode {
        figment = figment.merge(("mode", mode));
    }
    if let Some(limit) = args.max_concurrency {
        figment = figment.merge(("max_concurrency", limit));
    }
    if let Some(secs) = args.abort_grace {
        figment = figment.merge(("abort_grace_secs", secs));
    }

    Ok(RenewalConfig::extract_from(figment)?)
}
