// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! S3-compatible implementation of [`StorageClient`].
//!
//! Works against AWS S3 and S3-compatible services such as MinIO, as long as
//! the bucket was created with object lock enabled.

use async_stream::try_stream;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::DateTime as S3DateTime;
use aws_sdk_s3::types::{ObjectLockRetention, ObjectLockRetentionMode};
use chrono::{DateTime, Utc};

use super::{PageStream, StorageClient};
use crate::config::S3Config;
use crate::error::StorageError;
use crate::retention::{RetentionMode, RetentionRecord};

/// Error code S3 returns when an object carries no retention.
const NO_OBJECT_LOCK_CONFIGURATION: &str = "NoSuchObjectLockConfiguration";

/// Name attached to credentials supplied on the command line or in config.
const STATIC_CREDENTIALS_PROVIDER: &str = "lockrenew-static";

/// S3 storage binding.
///
/// Cheap to share: the underlying SDK client is internally reference counted
/// and safe for concurrent use.
#[derive(Clone, Debug)]
pub struct S3StorageClient {
    client: Client,
}

impl S3StorageClient {
    /// Create a client from configuration.
    ///
    /// Static credentials are used when both key parts are configured,
    /// otherwise the SDK's default provider chain applies.
    pub async fn new(config: &S3Config) -> Self {
        Self {
            client: build_s3_client(config).await,
        }
    }

    /// Wrap an existing AWS S3 client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the S3 client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl StorageClient for S3StorageClient {
    fn list_objects(&self, bucket: &str) -> PageStream {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();

        Box::pin(try_stream! {
            while let Some(page) = pages.next().await {
                let page = page.map_err(|e| {
                    StorageError::service("list_objects_v2", DisplayErrorContext(&e).to_string())
                })?;
                let keys: Vec<String> = page
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_owned))
                    .collect();
                yield keys;
            }
        })
    }

    async fn get_retention(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<RetentionRecord, StorageError> {
        let response = match self
            .client
            .get_object_retention()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let no_retention = e
                    .as_service_error()
                    .and_then(|service_error| service_error.code())
                    == Some(NO_OBJECT_LOCK_CONFIGURATION);
                if no_retention {
                    return Err(StorageError::NoRetention { key: key.to_owned() });
                }
                return Err(StorageError::service(
                    "get_object_retention",
                    DisplayErrorContext(&e).to_string(),
                ));
            }
        };

        let retention = response
            .retention()
            .ok_or_else(|| StorageError::NoRetention { key: key.to_owned() })?;
        let retain_until = retention
            .retain_until_date()
            .ok_or_else(|| StorageError::NoRetention { key: key.to_owned() })?;
        let retain_until = from_s3_datetime(retain_until).ok_or_else(|| {
            StorageError::service(
                "get_object_retention",
                format!("retain-until date out of range for '{key}'"),
            )
        })?;

        let mode = match retention.mode() {
            Some(ObjectLockRetentionMode::Compliance) => Some(RetentionMode::Compliance),
            Some(ObjectLockRetentionMode::Governance) => Some(RetentionMode::Governance),
            _ => None,
        };

        Ok(RetentionRecord { mode, retain_until })
    }

    async fn put_retention(
        &self,
        bucket: &str,
        key: &str,
        mode: RetentionMode,
        retain_until: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let retention = ObjectLockRetention::builder()
            .mode(to_s3_mode(mode))
            .retain_until_date(to_s3_datetime(retain_until))
            .build();

        self.client
            .put_object_retention()
            .bucket(bucket)
            .key(key)
            .retention(retention)
            .send()
            .await
            .map_err(|e| {
                StorageError::service("put_object_retention", DisplayErrorContext(&e).to_string())
            })?;
        Ok(())
    }
}

/// Build an S3 client from configuration.
async fn build_s3_client(config: &S3Config) -> Client {
    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .load()
        .await;

    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

    if let Some(endpoint) = &config.endpoint_url {
        s3_config_builder = s3_config_builder.endpoint_url(endpoint);
    }

    if config.force_path_style {
        s3_config_builder = s3_config_builder.force_path_style(true);
    }

    if let Some((access_key_id, secret_access_key)) = config.static_credentials() {
        s3_config_builder = s3_config_builder.credentials_provider(Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            STATIC_CREDENTIALS_PROVIDER,
        ));
    }

    Client::from_conf(s3_config_builder.build())
}

fn to_s3_mode(mode: RetentionMode) -> ObjectLockRetentionMode {
    match mode {
        RetentionMode::Compliance => ObjectLockRetentionMode::Compliance,
        RetentionMode::Governance => ObjectLockRetentionMode::Governance,
    }
}

fn to_s3_datetime(at: DateTime<Utc>) -> S3DateTime {
    S3DateTime::from_secs_and_nanos(at.timestamp(), at.timestamp_subsec_nanos())
}

fn from_s3_datetime(at: &S3DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(at.secs(), at.subsec_nanos())
}
