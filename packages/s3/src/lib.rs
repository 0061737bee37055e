#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! S3-compatible [`RemoteStore`] for bucket mirroring.
//!
//! Works against AWS S3 and any S3-compatible endpoint (`MinIO`, Cloudflare
//! R2). Credentials are always passed in explicitly; the SDK's ambient
//! credential chain is never consulted.
//!
//! # Environment Variables
//!
//! Read only by [`StoreCredentials::from_env`], which binaries call once at
//! startup.
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `AWS_ACCESS_KEY_ID` | Yes | Access key |
//! | `AWS_SECRET_ACCESS_KEY` | Yes | Secret key |
//! | `AWS_SESSION_TOKEN` | No | Session token for temporary credentials |

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};
use bucket_mirror::{MirrorConfig, RemoteStore, StoreError};

/// Delimiter separating the partition from the file name in object keys.
const DELIMITER: &str = "/";

/// Errors building an [`S3Store`].
#[derive(Debug, thiserror::Error)]
pub enum S3Error {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },
}

/// Explicit store credentials.
#[derive(Clone)]
pub struct StoreCredentials {
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Optional session token.
    pub session_token: Option<String>,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl StoreCredentials {
    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, and optionally
    /// `AWS_SESSION_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`S3Error::MissingEnv`] if a required variable is unset.
    pub fn from_env() -> Result<Self, S3Error> {
        Ok(Self {
            access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

/// A bucket in an S3-compatible object store.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Creates a store for `bucket` in `region`.
    ///
    /// When `endpoint_url` is set, path-style addressing is used so that
    /// S3-compatible services work without bucket DNS.
    #[must_use]
    pub fn new(
        region: &str,
        bucket: &str,
        endpoint_url: Option<&str>,
        credentials: StoreCredentials,
    ) -> Self {
        let creds = Credentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            credentials.session_token,
            None,
            "bucket-mirror",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .region(Region::new(region.to_string()))
            .credentials_provider(creds)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled());
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
        }
    }

    /// Creates a store from the region, bucket, and endpoint of `config`.
    #[must_use]
    pub fn from_config(config: &MirrorConfig, credentials: StoreCredentials) -> Self {
        Self::new(
            &config.region,
            &config.bucket,
            config.endpoint_url.as_deref(),
            credentials,
        )
    }

    /// Bucket this store writes to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_error(
        &self,
        prefix: &str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> StoreError {
        StoreError::List {
            bucket: self.bucket.clone(),
            prefix: prefix.to_string(),
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl RemoteStore for S3Store {
    /// Lists top-level common prefixes, following continuation tokens
    /// until the listing is exhausted.
    async fn list_partitions(&self) -> Result<BTreeSet<String>, StoreError> {
        log::info!("Listing partitions in s3://{}", self.bucket);

        collect_listing(
            move |token| {
                let request = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .delimiter(DELIMITER)
                    .set_continuation_token(token);
                async move {
                    let output = request.send().await.map_err(|e| self.list_error("", e))?;
                    Ok(ListingPage {
                        names: output
                            .common_prefixes()
                            .iter()
                            .filter_map(|common| common.prefix().and_then(partition_name))
                            .map(String::from)
                            .collect(),
                        is_truncated: output.is_truncated() == Some(true),
                        next_token: output.next_continuation_token().map(String::from),
                    })
                }
            },
            || self.list_error("", TruncatedListing),
        )
        .await
    }

    /// Lists every object under `"{partition}/"`, following continuation
    /// tokens until the listing is exhausted.
    async fn list_files(&self, partition: &str) -> Result<BTreeSet<String>, StoreError> {
        let prefix = format!("{partition}{DELIMITER}");
        let prefix = prefix.as_str();
        log::debug!("Listing s3://{}/{prefix}*", self.bucket);

        collect_listing(
            move |token| {
                let request = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(prefix)
                    .set_continuation_token(token);
                async move {
                    let output = request
                        .send()
                        .await
                        .map_err(|e| self.list_error(prefix, e))?;
                    Ok(ListingPage {
                        names: output
                            .contents()
                            .iter()
                            .filter_map(|obj| obj.key().and_then(|key| key_suffix(key, prefix)))
                            .map(String::from)
                            .collect(),
                        is_truncated: output.is_truncated() == Some(true),
                        next_token: output.next_continuation_token().map(String::from),
                    })
                }
            },
            || self.list_error(prefix, TruncatedListing),
        )
        .await
    }

    async fn put_file(&self, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let data = tokio::fs::read(local_path).await?;
        log::debug!(
            "Pushing {} -> s3://{}/{key} ({} bytes)",
            local_path.display(),
            self.bucket,
            data.len()
        );

        let body = aws_sdk_s3::primitives::ByteStream::from(data);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type(key))
            .send()
            .await
            .map_err(|e| StoreError::Upload {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        Ok(())
    }
}

/// Names extracted from one `ListObjectsV2` response.
struct ListingPage {
    names: Vec<String>,
    is_truncated: bool,
    next_token: Option<String>,
}

/// Fetches pages until one reports it is the last, passing each page's
/// continuation token to the next fetch. A page that is truncated but has
/// no token fails with `on_truncated()` instead of returning a partial
/// listing.
async fn collect_listing<F, Fut>(
    mut fetch: F,
    on_truncated: impl FnOnce() -> StoreError + Send,
) -> Result<BTreeSet<String>, StoreError>
where
    F: FnMut(Option<String>) -> Fut + Send,
    Fut: Future<Output = Result<ListingPage, StoreError>> + Send,
{
    let mut names = BTreeSet::new();
    let mut continuation_token: Option<String> = None;
    let mut pages = 0_usize;

    loop {
        let page = fetch(continuation_token.take()).await?;
        pages += 1;
        names.extend(page.names);

        if !page.is_truncated {
            break;
        }
        match page.next_token {
            Some(token) => continuation_token = Some(token),
            None => return Err(on_truncated()),
        }
    }

    log::trace!("Listing complete after {pages} page(s)");
    Ok(names)
}

/// A listing reported more pages but gave no continuation token.
#[derive(Debug, thiserror::Error)]
#[error("listing truncated without a continuation token")]
struct TruncatedListing;

/// Partition name from a common prefix such as `"2019/"`.
fn partition_name(prefix: &str) -> Option<&str> {
    prefix
        .strip_suffix(DELIMITER)
        .filter(|name| !name.is_empty())
}

/// File name from a full key under `prefix`. Folder placeholder objects
/// (the bare prefix) yield `None`.
fn key_suffix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix).filter(|name| !name.is_empty())
}

/// MIME type for an object key.
fn content_type(key: &str) -> &'static str {
    let is_csv = Path::new(key)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        "text/csv"
    } else {
        "application/octet-stream"
    }
}

/// Reads a required environment variable.
fn require_env(name: &str) -> Result<String, S3Error> {
    std::env::var(name).map_err(|_| S3Error::MissingEnv {
        name: name.to_string(),
    })
}
