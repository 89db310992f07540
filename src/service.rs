/*!
 * Multi-bucket storage service
 *
 * `OssService` is the one object applications share (typically as
 * `Arc<OssService>`). Every operation takes an options value whose `bucket`
 * field picks the client; when it is absent the default bucket is used.
 * Calls are forwarded unchanged to that bucket's client and its result or
 * error is returned as is.
 *
 * # Example
 *
 * ```no_run
 * use bucket_hub::config::HubConfig;
 * use bucket_hub::protocol::s3::{PutObjectOptions, RequestOptions};
 * use bucket_hub::service::OssService;
 *
 * #[tokio::main]
 * async fn main() -> Result<(), Box<dyn std::error::Error>> {
 *     let config = HubConfig::from_json(r#"{
 *         "images": {"region": "us-east-1"},
 *         "videos": {"region": "eu-west-1"}
 *     }"#)?;
 *     let service = OssService::new(config).await?;
 *
 *     let options = PutObjectOptions {
 *         bucket: Some("images".to_string()),
 *         ..Default::default()
 *     };
 *     service.put("cat.png", b"...".to_vec(), &options).await?;
 *     service.delete("cat.png", &RequestOptions::bucket("images")).await?;
 *     Ok(())
 * }
 * ```
 */

use crate::config::{HubConfig, Settings};
use crate::error::{HubError, Result};
use crate::protocol::s3::*;
use crate::registry::{ClientFactory, ClientRegistry, S3ClientFactory};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Storage service routing calls to per-bucket clients
pub struct OssService<F: ClientFactory = S3ClientFactory> {
    registry: ClientRegistry<F>,
}

impl OssService<S3ClientFactory> {
    /// Create a service backed by AWS SDK clients
    ///
    /// For a single-bucket configuration the client is built right away, so
    /// bad credentials or an invalid bucket name surface here.
    pub async fn new(config: HubConfig) -> Result<Self> {
        Self::with_factory(config, S3ClientFactory).await
    }

    /// Create a service from the `[storage]` section of a settings file
    pub async fn from_settings_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = Settings::from_file(path.as_ref())?;
        Self::new(settings.storage).await
    }
}

impl<F: ClientFactory> OssService<F> {
    /// Create a service with a custom client factory
    pub async fn with_factory(config: HubConfig, factory: F) -> Result<Self> {
        let registry = ClientRegistry::with_factory(config, factory)?;

        info!(
            buckets = ?registry.configured_buckets(),
            default_bucket = ?registry.default_bucket(),
            "storage service configured"
        );

        registry.warm_default().await?;
        Ok(Self { registry })
    }

    pub fn registry(&self) -> &ClientRegistry<F> {
        &self.registry
    }

    /// Bucket used when a call names none
    pub fn default_bucket(&self) -> Option<&str> {
        self.registry.default_bucket()
    }

    pub fn configured_buckets(&self) -> Vec<String> {
        self.registry.configured_buckets()
    }

    /// Client for `bucket`, or the default client
    pub async fn client(&self, bucket: Option<&str>) -> Result<Arc<F::Client>> {
        self.registry.resolve(bucket).await
    }

    async fn forward<T, Fut, Call>(
        &self,
        op: &'static str,
        bucket: Option<&str>,
        target: &str,
        call: Call,
    ) -> Result<T>
    where
        Call: FnOnce(Arc<F::Client>) -> Fut,
        Fut: Future<Output = S3Result<T>>,
        T: fmt::Debug,
    {
        let client = match self.registry.resolve(bucket).await {
            Ok(client) => client,
            Err(e) => {
                error!(op, bucket = ?bucket, target, error = %e, "cannot route call");
                return Err(e);
            }
        };
        let resolved = ObjectStore::bucket(client.as_ref()).to_string();

        match call(client).await {
            Ok(result) => {
                debug!(op, bucket = %resolved, target, result = ?result, "call succeeded");
                Ok(result)
            }
            Err(e) => {
                error!(op, bucket = %resolved, target, error = %e, code = ?e.code(), "call failed");
                Err(HubError::Storage(e))
            }
        }
    }

    // Objects

    /// Upload a buffer as one object
    pub async fn put(
        &self,
        name: &str,
        body: impl Into<Bytes>,
        options: &PutObjectOptions,
    ) -> Result<PutObjectOutput> {
        let body = body.into();
        self.forward("put", options.bucket.as_deref(), name, |client| async move {
            client.put(name, body, options).await
        })
        .await
    }

    pub async fn delete(&self, name: &str, options: &RequestOptions) -> Result<DeleteObjectOutput> {
        self.forward("delete", options.bucket.as_deref(), name, |client| async move {
            client.delete(name, options).await
        })
        .await
    }

    /// List objects with marker paging
    pub async fn list(
        &self,
        query: &ListObjectsQuery,
        options: &RequestOptions,
    ) -> Result<S3ListResult> {
        let target = query.prefix.as_deref().unwrap_or("");
        self.forward("list", options.bucket.as_deref(), target, |client| async move {
            client.list(query, options).await
        })
        .await
    }

    /// List objects with continuation-token paging
    pub async fn list_v2(
        &self,
        query: &ListV2ObjectsQuery,
        options: &RequestOptions,
    ) -> Result<S3ListResult> {
        let target = query.prefix.as_deref().unwrap_or("");
        self.forward("list_v2", options.bucket.as_deref(), target, |client| async move {
            client.list_v2(query, options).await
        })
        .await
    }

    pub async fn head(&self, name: &str, options: &HeadObjectOptions) -> Result<S3ObjectMetadata> {
        self.forward("head", options.bucket.as_deref(), name, |client| async move {
            client.head(name, options).await
        })
        .await
    }

    /// Server-side copy of `source_name` to `name`
    pub async fn copy(
        &self,
        name: &str,
        source_name: &str,
        options: &CopyObjectOptions,
    ) -> Result<CopyObjectOutput> {
        self.forward("copy", options.bucket.as_deref(), name, |client| async move {
            client.copy(name, source_name, options).await
        })
        .await
    }

    /// Upload from a reader of unknown length
    pub async fn put_stream(
        &self,
        name: &str,
        stream: ObjectReader,
        options: &PutObjectOptions,
    ) -> Result<PutObjectOutput> {
        self.forward("put_stream", options.bucket.as_deref(), name, |client| async move {
            client.put_stream(name, stream, options).await
        })
        .await
    }

    /// Download an object into `file`, or into memory when `file` is `None`
    pub async fn get(
        &self,
        name: &str,
        file: Option<&Path>,
        options: &GetObjectOptions,
    ) -> Result<GetObjectOutput> {
        self.forward("get", options.bucket.as_deref(), name, |client| async move {
            client.get(name, file, options).await
        })
        .await
    }

    pub async fn get_stream(&self, name: &str, options: &GetObjectOptions) -> Result<GetStreamOutput> {
        self.forward("get_stream", options.bucket.as_deref(), name, |client| async move {
            client.get_stream(name, options).await
        })
        .await
    }

    /// Replace the user metadata of an object
    pub async fn put_meta(
        &self,
        name: &str,
        meta: &HashMap<String, String>,
        options: &RequestOptions,
    ) -> Result<CopyObjectOutput> {
        self.forward("put_meta", options.bucket.as_deref(), name, |client| async move {
            client.put_meta(name, meta, options).await
        })
        .await
    }

    pub async fn delete_multi(
        &self,
        names: &[String],
        options: &DeleteMultiOptions,
    ) -> Result<DeleteMultiOutput> {
        let target = format!("{} objects", names.len());
        self.forward("delete_multi", options.bucket.as_deref(), &target, |client| async move {
            client.delete_multi(names, options).await
        })
        .await
    }

    /// Presign a URL for one object
    pub async fn signature_url(&self, name: &str, options: &SignatureUrlOptions) -> Result<String> {
        self.forward("signature_url", options.bucket.as_deref(), name, |client| async move {
            client.signature_url(name, options).await
        })
        .await
    }

    /// Restore an archived object
    pub async fn restore(&self, name: &str, options: &RestoreOptions) -> Result<RestoreOutput> {
        self.forward("restore", options.bucket.as_deref(), name, |client| async move {
            client.restore(name, options).await
        })
        .await
    }

    /// Write `body` at `options.position` of an appendable object
    pub async fn append(
        &self,
        name: &str,
        body: impl Into<Bytes>,
        options: &AppendObjectOptions,
    ) -> Result<AppendObjectOutput> {
        let body = body.into();
        self.forward("append", options.bucket.as_deref(), name, |client| async move {
            client.append(name, body, options).await
        })
        .await
    }

    // Multipart

    pub async fn init_multipart_upload(
        &self,
        name: &str,
        options: &InitMultipartUploadOptions,
    ) -> Result<InitMultipartUploadOutput> {
        self.forward("init_multipart_upload", options.bucket.as_deref(), name, |client| async move {
            client.init_multipart_upload(name, options).await
        })
        .await
    }

    pub async fn upload_part(
        &self,
        name: &str,
        upload_id: &str,
        part_no: i32,
        body: impl Into<PartBody>,
        options: &RequestOptions,
    ) -> Result<UploadPartInfo> {
        let body = body.into();
        self.forward("upload_part", options.bucket.as_deref(), name, |client| async move {
            client.upload_part(name, upload_id, part_no, body, options).await
        })
        .await
    }

    pub async fn list_parts(
        &self,
        name: &str,
        upload_id: &str,
        query: &ListPartsQuery,
        options: &RequestOptions,
    ) -> Result<ListPartsOutput> {
        self.forward("list_parts", options.bucket.as_deref(), name, |client| async move {
            client.list_parts(name, upload_id, query, options).await
        })
        .await
    }

    pub async fn complete_multipart_upload(
        &self,
        name: &str,
        upload_id: &str,
        parts: &[PartRef],
        options: &RequestOptions,
    ) -> Result<CompleteMultipartUploadOutput> {
        self.forward(
            "complete_multipart_upload",
            options.bucket.as_deref(),
            name,
            |client| async move {
                client
                    .complete_multipart_upload(name, upload_id, parts, options)
                    .await
            },
        )
        .await
    }

    /// Upload a whole file or buffer in parts
    ///
    /// Pass the checkpoint reported to the progress callback back in
    /// `options.checkpoint` to continue an interrupted upload.
    pub async fn multipart_upload(
        &self,
        name: &str,
        source: MultipartSource,
        options: &MultipartUploadOptions,
    ) -> Result<CompleteMultipartUploadOutput> {
        self.forward("multipart_upload", options.bucket.as_deref(), name, |client| async move {
            client.multipart_upload(name, source, options).await
        })
        .await
    }

    /// Server-side copy of an object (or a range of it) in parts
    pub async fn multipart_upload_copy(
        &self,
        name: &str,
        source: &MultipartCopySource,
        options: &MultipartUploadOptions,
    ) -> Result<CompleteMultipartUploadOutput> {
        self.forward(
            "multipart_upload_copy",
            options.bucket.as_deref(),
            name,
            |client| async move { client.multipart_upload_copy(name, source, options).await },
        )
        .await
    }

    pub async fn list_uploads(
        &self,
        query: &ListUploadsQuery,
        options: &RequestOptions,
    ) -> Result<ListUploadsOutput> {
        let target = query.prefix.as_deref().unwrap_or("");
        self.forward("list_uploads", options.bucket.as_deref(), target, |client| async move {
            client.list_uploads(query, options).await
        })
        .await
    }

    pub async fn abort_multipart_upload(
        &self,
        name: &str,
        upload_id: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        self.forward(
            "abort_multipart_upload",
            options.bucket.as_deref(),
            name,
            |client| async move { client.abort_multipart_upload(name, upload_id, options).await },
        )
        .await
    }

    /// Copy a byte range of an existing object as one part
    pub async fn upload_part_copy(
        &self,
        params: &UploadPartCopyParams,
        options: &RequestOptions,
    ) -> Result<UploadPartInfo> {
        self.forward(
            "upload_part_copy",
            options.bucket.as_deref(),
            &params.name,
            |client| async move { client.upload_part_copy(params, options).await },
        )
        .await
    }
}

impl<F: ClientFactory> fmt::Debug for OssService<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OssService")
            .field("registry", &self.registry)
            .finish()
    }
}
