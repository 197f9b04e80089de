//! Optional S3 mirror for persisted snapshots.
//!
//! Connectivity is probed exactly once at startup with a `ListBuckets`
//! call; the result is cached for the process lifetime. Uploads are
//! best-effort: every push error is logged at the mirror boundary and
//! never reaches the poll cycle.

use crate::config::S3Config;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

/// Logical key prefix shared by all mirrored records.
const KEY_PREFIX: &str = "data/";

struct MirrorInner {
    client: Client,
    bucket: String,
}

/// Capability object for the remote mirror.
///
/// Either connected to a bucket or permanently disabled; there is no
/// re-probe after startup.
pub struct SnapshotMirror {
    inner: Option<MirrorInner>,
}

impl SnapshotMirror {
    /// A mirror that never uploads. Used when no S3 section is configured
    /// or the startup probe failed.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Build a client from static credentials and probe connectivity.
    ///
    /// On probe failure the mirror comes back disabled; the daemon keeps
    /// running with local storage only.
    pub async fn connect(config: &S3Config) -> Self {
        let client = make_s3_client(config);

        match client.list_buckets().send().await {
            Ok(output) => {
                log::info!("connected to S3, mirroring to bucket '{}'", config.bucket);
                for bucket in output.buckets() {
                    log::info!("  visible bucket: {}", bucket.name().unwrap_or("<unnamed>"));
                }
                Self {
                    inner: Some(MirrorInner {
                        client,
                        bucket: config.bucket.clone(),
                    }),
                }
            }
            Err(e) => {
                log::warn!("S3 probe failed, mirroring disabled: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn available(&self) -> bool {
        self.inner.is_some()
    }

    /// Upload a record under `data/<id>`. Errors are logged and swallowed;
    /// the cycle's success never depends on the mirror.
    pub async fn push(&self, id: &str, bytes: Vec<u8>) {
        let Some(inner) = &self.inner else {
            return;
        };

        let key = format!("{}{}", KEY_PREFIX, id);
        let result = inner
            .client
            .put_object()
            .bucket(&inner.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .send()
            .await;

        match result {
            Ok(_) => log::info!("mirrored snapshot to s3://{}/{}", inner.bucket, key),
            Err(e) => log::warn!("mirror upload failed for {}: {}", id, e),
        }
    }
}

fn make_s3_client(config: &S3Config) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "meteosnap",
    );

    let mut builder = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials);

    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint.clone()).force_path_style(true);
    }

    Client::from_conf(builder.build())
}
