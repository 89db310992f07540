//! S3 operations trait and implementations

use super::client::{to_system_time, user_metadata, S3Client};
use super::error::{not_found_or, S3Error, S3Result};
use super::types::{
    AppendObjectOptions, AppendObjectOutput, CopyObjectOptions, CopyObjectOutput,
    DeleteMultiFailure, DeleteMultiOptions, DeleteMultiOutput, DeleteObjectOutput,
    GetObjectOptions, GetObjectOutput, GetStreamOutput, HeadObjectOptions,
    InitMultipartUploadOptions, ListObjectsQuery, ListV2ObjectsQuery, ObjectReader, PartRef,
    PutObjectOptions, PutObjectOutput, RequestOptions, RestoreOptions, RestoreOutput,
    S3ListResult, S3Object, S3ObjectMetadata, S3StorageClass, SignatureMethod,
    SignatureUrlOptions, MAX_DELETE_BATCH,
};
use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    Delete, GlacierJobParameters, MetadataDirective, ObjectCannedAcl, ObjectIdentifier,
    RestoreRequest,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Single-request object operations
///
/// Every method works on the bucket the implementor is bound to; the
/// `bucket` field of the options is a routing hint for the layer above and is
/// ignored here.
#[async_trait]
pub trait S3Operations {
    /// Upload a buffer as one object
    async fn put(
        &self,
        name: &str,
        body: Bytes,
        options: &PutObjectOptions,
    ) -> S3Result<PutObjectOutput>;

    /// Delete one object
    async fn delete(&self, name: &str, options: &RequestOptions) -> S3Result<DeleteObjectOutput>;

    /// List objects with marker paging (ListObjects v1)
    async fn list(
        &self,
        query: &ListObjectsQuery,
        options: &RequestOptions,
    ) -> S3Result<S3ListResult>;

    /// List objects with continuation-token paging (ListObjectsV2)
    async fn list_v2(
        &self,
        query: &ListV2ObjectsQuery,
        options: &RequestOptions,
    ) -> S3Result<S3ListResult>;

    /// Fetch object metadata
    async fn head(&self, name: &str, options: &HeadObjectOptions) -> S3Result<S3ObjectMetadata>;

    /// Server-side copy of `source_name` to `name`
    async fn copy(
        &self,
        name: &str,
        source_name: &str,
        options: &CopyObjectOptions,
    ) -> S3Result<CopyObjectOutput>;

    /// Upload from a reader of unknown length
    async fn put_stream(
        &self,
        name: &str,
        stream: ObjectReader,
        options: &PutObjectOptions,
    ) -> S3Result<PutObjectOutput>;

    /// Download an object, into `file` when given or into memory otherwise
    async fn get(
        &self,
        name: &str,
        file: Option<&Path>,
        options: &GetObjectOptions,
    ) -> S3Result<GetObjectOutput>;

    /// Download an object as a byte stream
    async fn get_stream(&self, name: &str, options: &GetObjectOptions)
        -> S3Result<GetStreamOutput>;

    /// Replace the user metadata of an object
    async fn put_meta(
        &self,
        name: &str,
        meta: &HashMap<String, String>,
        options: &RequestOptions,
    ) -> S3Result<CopyObjectOutput>;

    /// Delete many objects
    async fn delete_multi(
        &self,
        names: &[String],
        options: &DeleteMultiOptions,
    ) -> S3Result<DeleteMultiOutput>;

    /// Presign a URL for one object
    async fn signature_url(&self, name: &str, options: &SignatureUrlOptions) -> S3Result<String>;

    /// Restore an archived object
    async fn restore(&self, name: &str, options: &RestoreOptions) -> S3Result<RestoreOutput>;

    /// Write `body` at `options.position` of an appendable object
    async fn append(
        &self,
        name: &str,
        body: Bytes,
        options: &AppendObjectOptions,
    ) -> S3Result<AppendObjectOutput>;
}

#[async_trait]
impl S3Operations for S3Client {
    async fn put(
        &self,
        name: &str,
        body: Bytes,
        options: &PutObjectOptions,
    ) -> S3Result<PutObjectOutput> {
        let (sse, kms_key_id) = self.sse();

        let response = self
            .aws_client()
            .put_object()
            .bucket(self.bucket())
            .key(name)
            .body(ByteStream::from(body))
            .set_content_type(options.content_type.clone())
            .set_content_encoding(options.content_encoding.clone())
            .set_content_disposition(options.content_disposition.clone())
            .set_cache_control(options.cache_control.clone())
            .set_metadata(user_metadata(&options.meta))
            .set_acl(options.acl.as_deref().map(ObjectCannedAcl::from))
            .storage_class(self.storage_class_for(options.storage_class).to_aws())
            .set_server_side_encryption(sse)
            .set_ssekms_key_id(kms_key_id)
            .send()
            .await
            .map_err(S3Error::from)?;

        Ok(PutObjectOutput {
            name: name.to_string(),
            etag: response.e_tag().map(|s| s.to_string()),
            version_id: response.version_id().map(|s| s.to_string()),
        })
    }

    async fn delete(&self, name: &str, _options: &RequestOptions) -> S3Result<DeleteObjectOutput> {
        let response = self
            .aws_client()
            .delete_object()
            .bucket(self.bucket())
            .key(name)
            .send()
            .await
            .map_err(S3Error::from)?;

        Ok(DeleteObjectOutput {
            name: name.to_string(),
            delete_marker: response.delete_marker().unwrap_or(false),
            version_id: response.version_id().map(|s| s.to_string()),
        })
    }

    async fn list(
        &self,
        query: &ListObjectsQuery,
        _options: &RequestOptions,
    ) -> S3Result<S3ListResult> {
        let response = self
            .aws_client()
            .list_objects()
            .bucket(self.bucket())
            .set_prefix(query.prefix.clone())
            .set_marker(query.marker.clone())
            .set_delimiter(query.delimiter.clone())
            .set_max_keys(query.max_keys)
            .send()
            .await
            .map_err(S3Error::from)?;

        let objects: Vec<S3Object> = response.contents().iter().filter_map(to_object).collect();
        let is_truncated = response.is_truncated().unwrap_or(false);

        // NextMarker is only returned when a delimiter is set; otherwise the
        // last key of the page is the marker for the next one
        let next_marker = match response.next_marker() {
            Some(marker) => Some(marker.to_string()),
            None if is_truncated => objects.last().map(|o| o.key.clone()),
            None => None,
        };

        Ok(S3ListResult {
            objects,
            common_prefixes: response
                .common_prefixes()
                .iter()
                .filter_map(|cp| cp.prefix().map(|s| s.to_string()))
                .collect(),
            continuation_token: None,
            next_marker,
            is_truncated,
            key_count: None,
        })
    }

    async fn list_v2(
        &self,
        query: &ListV2ObjectsQuery,
        _options: &RequestOptions,
    ) -> S3Result<S3ListResult> {
        let response = self
            .aws_client()
            .list_objects_v2()
            .bucket(self.bucket())
            .set_prefix(query.prefix.clone())
            .set_continuation_token(query.continuation_token.clone())
            .set_start_after(query.start_after.clone())
            .set_delimiter(query.delimiter.clone())
            .set_max_keys(query.max_keys)
            .fetch_owner(query.fetch_owner)
            .send()
            .await
            .map_err(S3Error::from)?;

        Ok(S3ListResult {
            objects: response.contents().iter().filter_map(to_object).collect(),
            common_prefixes: response
                .common_prefixes()
                .iter()
                .filter_map(|cp| cp.prefix().map(|s| s.to_string()))
                .collect(),
            continuation_token: response.next_continuation_token().map(|s| s.to_string()),
            next_marker: None,
            is_truncated: response.is_truncated().unwrap_or(false),
            key_count: response.key_count(),
        })
    }

    async fn head(&self, name: &str, options: &HeadObjectOptions) -> S3Result<S3ObjectMetadata> {
        self.head_in(self.bucket(), name, options.version_id.as_deref())
            .await
    }

    async fn copy(
        &self,
        name: &str,
        source_name: &str,
        options: &CopyObjectOptions,
    ) -> S3Result<CopyObjectOutput> {
        let mut source = self.copy_source(options.source_bucket.as_deref(), source_name);
        if let Some(version) = &options.source_version_id {
            source = format!("{}?versionId={}", source, version);
        }

        // Content type only sticks when metadata is replaced
        let replace = options.meta.is_some() || options.content_type.is_some();
        let (sse, kms_key_id) = self.sse();

        let mut request = self
            .aws_client()
            .copy_object()
            .bucket(self.bucket())
            .key(name)
            .copy_source(source)
            .set_content_type(options.content_type.clone())
            .set_metadata(options.meta.clone())
            .set_server_side_encryption(sse)
            .set_ssekms_key_id(kms_key_id);

        if replace {
            request = request.metadata_directive(MetadataDirective::Replace);
        }
        if let Some(class) = options.storage_class {
            request = request.storage_class(class.to_aws());
        }

        let response = request.send().await.map_err(|e| {
            not_found_or(
                e,
                options.source_bucket.as_deref().unwrap_or(self.bucket()),
                source_name,
            )
        })?;

        let result = response.copy_object_result();
        Ok(CopyObjectOutput {
            name: name.to_string(),
            etag: result.and_then(|r| r.e_tag()).map(|s| s.to_string()),
            last_modified: to_system_time(result.and_then(|r| r.last_modified())),
            version_id: response.version_id().map(|s| s.to_string()),
        })
    }

    async fn put_stream(
        &self,
        name: &str,
        mut stream: ObjectReader,
        options: &PutObjectOptions,
    ) -> S3Result<PutObjectOutput> {
        let chunk_size = self.config().chunk_size;

        let first = read_chunk(&mut stream, chunk_size).await?;
        if first.len() < chunk_size {
            return self.put(name, first, options).await;
        }

        let second = read_chunk(&mut stream, chunk_size).await?;
        if second.is_empty() {
            return self.put(name, first, options).await;
        }

        debug!(key = name, chunk_size, "stream exceeds one part, switching to multipart");

        let init = InitMultipartUploadOptions {
            bucket: None,
            content_type: options.content_type.clone(),
            content_disposition: options.content_disposition.clone(),
            cache_control: options.cache_control.clone(),
            meta: options.meta.clone(),
            storage_class: options.storage_class,
        };
        let upload_id = self.create_upload(name, &init).await?;

        let uploaded = async {
            let mut parts = vec![
                self.send_part(name, &upload_id, 1, first).await?,
                self.send_part(name, &upload_id, 2, second).await?,
            ];

            loop {
                let chunk = read_chunk(&mut stream, chunk_size).await?;
                if chunk.is_empty() {
                    break;
                }
                let part_number = parts.len() as i32 + 1;
                parts.push(self.send_part(name, &upload_id, part_number, chunk).await?);
            }

            let refs: Vec<PartRef> = parts.iter().map(PartRef::from).collect();
            self.finish_upload(name, &upload_id, &refs).await
        }
        .await;

        match uploaded {
            Ok(output) => Ok(PutObjectOutput {
                name: name.to_string(),
                etag: output.etag,
                version_id: output.version_id,
            }),
            Err(e) => {
                if let Err(abort_err) = self.abort_upload(name, &upload_id).await {
                    warn!(key = name, upload_id = %upload_id, error = %abort_err, "failed to abort multipart upload");
                }
                Err(e)
            }
        }
    }

    async fn get(
        &self,
        name: &str,
        file: Option<&Path>,
        options: &GetObjectOptions,
    ) -> S3Result<GetObjectOutput> {
        let response = self
            .aws_client()
            .get_object()
            .bucket(self.bucket())
            .key(name)
            .set_version_id(options.version_id.clone())
            .set_range(options.range.clone())
            .send()
            .await
            .map_err(|e| not_found_or(e, self.bucket(), name))?;

        let etag = response.e_tag().map(|s| s.to_string());
        let content_type = response.content_type().map(|s| s.to_string());
        let last_modified = to_system_time(response.last_modified());
        let metadata = response.metadata().cloned().unwrap_or_default();

        let (content, size) = match file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }

                let mut out = File::create(path).await?;
                let mut body = response.body;
                let mut written = 0u64;

                while let Some(bytes) = body.try_next().await.map_err(|e| {
                    S3Error::Network(format!("Failed to read response body: {}", e))
                })? {
                    out.write_all(&bytes).await?;
                    written += bytes.len() as u64;
                }

                out.flush().await?;
                (None, written)
            }
            None => {
                let body = response.body.collect().await.map_err(|e| {
                    S3Error::Network(format!("Failed to collect response body: {}", e))
                })?;
                let bytes = body.into_bytes();
                let size = bytes.len() as u64;
                (Some(bytes), size)
            }
        };

        Ok(GetObjectOutput {
            name: name.to_string(),
            content,
            size,
            etag,
            content_type,
            last_modified,
            metadata,
        })
    }

    async fn get_stream(
        &self,
        name: &str,
        options: &GetObjectOptions,
    ) -> S3Result<GetStreamOutput> {
        let response = self
            .aws_client()
            .get_object()
            .bucket(self.bucket())
            .key(name)
            .set_version_id(options.version_id.clone())
            .set_range(options.range.clone())
            .send()
            .await
            .map_err(|e| not_found_or(e, self.bucket(), name))?;

        Ok(GetStreamOutput {
            name: name.to_string(),
            content_length: response.content_length().map(|n| n.max(0) as u64),
            etag: response.e_tag().map(|s| s.to_string()),
            content_type: response.content_type().map(|s| s.to_string()),
            stream: response.body,
        })
    }

    async fn put_meta(
        &self,
        name: &str,
        meta: &HashMap<String, String>,
        _options: &RequestOptions,
    ) -> S3Result<CopyObjectOutput> {
        let options = CopyObjectOptions {
            meta: Some(meta.clone()),
            ..Default::default()
        };
        self.copy(name, name, &options).await
    }

    async fn delete_multi(
        &self,
        names: &[String],
        options: &DeleteMultiOptions,
    ) -> S3Result<DeleteMultiOutput> {
        let mut output = DeleteMultiOutput::default();

        for batch in names.chunks(MAX_DELETE_BATCH) {
            let objects = batch
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(options.quiet)
                .build()?;

            let response = self
                .aws_client()
                .delete_objects()
                .bucket(self.bucket())
                .delete(delete)
                .send()
                .await
                .map_err(S3Error::from)?;

            output.deleted.extend(
                response
                    .deleted()
                    .iter()
                    .filter_map(|d| d.key().map(|s| s.to_string())),
            );
            output
                .errors
                .extend(response.errors().iter().map(|e| DeleteMultiFailure {
                    key: e.key().unwrap_or_default().to_string(),
                    code: e.code().map(|s| s.to_string()),
                    message: e.message().map(|s| s.to_string()),
                }));
        }

        Ok(output)
    }

    async fn signature_url(&self, name: &str, options: &SignatureUrlOptions) -> S3Result<String> {
        let presigning = PresigningConfig::expires_in(options.expires)
            .map_err(|e| S3Error::InvalidRequest(format!("Invalid expiry: {}", e)))?;

        let request = match options.method {
            SignatureMethod::Get => self
                .aws_client()
                .get_object()
                .bucket(self.bucket())
                .key(name)
                .set_version_id(options.version_id.clone())
                .set_response_content_disposition(options.response_content_disposition.clone())
                .presigned(presigning)
                .await
                .map_err(S3Error::from)?,
            SignatureMethod::Put => self
                .aws_client()
                .put_object()
                .bucket(self.bucket())
                .key(name)
                .set_content_type(options.content_type.clone())
                .presigned(presigning)
                .await
                .map_err(S3Error::from)?,
            SignatureMethod::Head => self
                .aws_client()
                .head_object()
                .bucket(self.bucket())
                .key(name)
                .set_version_id(options.version_id.clone())
                .presigned(presigning)
                .await
                .map_err(S3Error::from)?,
            SignatureMethod::Delete => self
                .aws_client()
                .delete_object()
                .bucket(self.bucket())
                .key(name)
                .set_version_id(options.version_id.clone())
                .presigned(presigning)
                .await
                .map_err(S3Error::from)?,
        };

        Ok(request.uri().to_string())
    }

    async fn restore(&self, name: &str, options: &RestoreOptions) -> S3Result<RestoreOutput> {
        let job = GlacierJobParameters::builder()
            .tier(options.tier.to_aws())
            .build()?;

        let restore_request = RestoreRequest::builder()
            .days(options.days)
            .glacier_job_parameters(job)
            .build();

        let response = self
            .aws_client()
            .restore_object()
            .bucket(self.bucket())
            .key(name)
            .set_version_id(options.version_id.clone())
            .restore_request(restore_request)
            .send()
            .await
            .map_err(|e| not_found_or(e, self.bucket(), name))?;

        Ok(RestoreOutput {
            name: name.to_string(),
            restore_output_path: response.restore_output_path().map(|s| s.to_string()),
        })
    }

    async fn append(
        &self,
        name: &str,
        body: Bytes,
        options: &AppendObjectOptions,
    ) -> S3Result<AppendObjectOutput> {
        let position = i64::try_from(options.position).map_err(|_| {
            S3Error::InvalidRequest(format!("Append position {} out of range", options.position))
        })?;
        let len = body.len() as u64;

        let response = self
            .aws_client()
            .put_object()
            .bucket(self.bucket())
            .key(name)
            .write_offset_bytes(position)
            .set_content_type(options.content_type.clone())
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(S3Error::from)?;

        Ok(AppendObjectOutput {
            name: name.to_string(),
            next_append_position: options.position + len,
            etag: response.e_tag().map(|s| s.to_string()),
        })
    }
}

fn to_object(obj: &aws_sdk_s3::types::Object) -> Option<S3Object> {
    Some(S3Object {
        key: obj.key()?.to_string(),
        size: obj.size().unwrap_or(0).max(0) as u64,
        last_modified: to_system_time(obj.last_modified()),
        etag: obj.e_tag().map(|s| s.to_string()),
        storage_class: obj
            .storage_class()
            .map(|sc| S3StorageClass::from_wire(sc.as_str())),
        owner: obj.owner().and_then(|o| o.id()).map(|s| s.to_string()),
    })
}

/// Read up to `chunk_size` bytes; a short result means the reader hit EOF
pub(super) async fn read_chunk<R>(reader: &mut R, chunk_size: usize) -> S3Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut chunk = Vec::with_capacity(chunk_size);
    let mut buffer = vec![0u8; chunk_size.min(64 * 1024)];

    while chunk.len() < chunk_size {
        let want = (chunk_size - chunk.len()).min(buffer.len());
        match reader.read(&mut buffer[..want]).await? {
            0 => break,
            n => chunk.extend_from_slice(&buffer[..n]),
        }
    }

    Ok(Bytes::from(chunk))
}
