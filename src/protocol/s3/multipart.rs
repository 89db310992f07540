//! Multipart upload operations for large objects

use super::client::{user_metadata, S3Client};
use super::error::{S3Error, S3Result};
use super::types::{
    byte_range, parse_byte_range, CompleteMultipartUploadOutput, InitMultipartUploadOptions,
    InitMultipartUploadOutput, ListPartsOutput, ListPartsQuery, ListUploadsOutput,
    ListUploadsQuery, MultipartCopySource, MultipartSource, MultipartUploadOptions,
    MultipartUploadSummary, PartBody, PartRef, RequestOptions, ResumeState, S3StorageClass,
    UploadPartCopyParams, UploadPartInfo,
};
use super::{MAX_PARALLEL_OPERATIONS, MAX_PARTS};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

/// Multipart upload operations
#[async_trait]
pub trait MultipartOperations {
    /// Start a multipart upload and return its upload id
    async fn init_multipart_upload(
        &self,
        name: &str,
        options: &InitMultipartUploadOptions,
    ) -> S3Result<InitMultipartUploadOutput>;

    /// Upload one part of an upload
    async fn upload_part(
        &self,
        name: &str,
        upload_id: &str,
        part_no: i32,
        body: PartBody,
        options: &RequestOptions,
    ) -> S3Result<UploadPartInfo>;

    /// List the parts uploaded so far
    async fn list_parts(
        &self,
        name: &str,
        upload_id: &str,
        query: &ListPartsQuery,
        options: &RequestOptions,
    ) -> S3Result<ListPartsOutput>;

    /// Assemble the uploaded parts into the final object
    async fn complete_multipart_upload(
        &self,
        name: &str,
        upload_id: &str,
        parts: &[PartRef],
        options: &RequestOptions,
    ) -> S3Result<CompleteMultipartUploadOutput>;

    /// Upload a whole file or buffer in parts
    async fn multipart_upload(
        &self,
        name: &str,
        source: MultipartSource,
        options: &MultipartUploadOptions,
    ) -> S3Result<CompleteMultipartUploadOutput>;

    /// Copy an existing object (or a byte range of it) in parts, server side
    async fn multipart_upload_copy(
        &self,
        name: &str,
        source: &MultipartCopySource,
        options: &MultipartUploadOptions,
    ) -> S3Result<CompleteMultipartUploadOutput>;

    /// List in-progress multipart uploads
    async fn list_uploads(
        &self,
        query: &ListUploadsQuery,
        options: &RequestOptions,
    ) -> S3Result<ListUploadsOutput>;

    /// Abort an upload and discard its parts
    async fn abort_multipart_upload(
        &self,
        name: &str,
        upload_id: &str,
        options: &RequestOptions,
    ) -> S3Result<()>;

    /// Copy a byte range of an existing object as one part
    async fn upload_part_copy(
        &self,
        params: &UploadPartCopyParams,
        options: &RequestOptions,
    ) -> S3Result<UploadPartInfo>;
}

/// One planned part: number plus the half-open byte span `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSpan {
    pub number: i32,
    pub start: u64,
    pub end: u64,
}

impl PartSpan {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `total` bytes into contiguous parts of `part_size`
///
/// The part size grows when `total` would need more than [`MAX_PARTS`] parts.
/// An empty object is planned as a single empty part.
pub fn plan_parts(total: u64, part_size: u64) -> Vec<PartSpan> {
    let part_size = effective_part_size(total, part_size);

    if total == 0 {
        return vec![PartSpan {
            number: 1,
            start: 0,
            end: 0,
        }];
    }

    let count = total.div_ceil(part_size);
    (0..count)
        .map(|i| PartSpan {
            number: (i + 1) as i32,
            start: i * part_size,
            end: ((i + 1) * part_size).min(total),
        })
        .collect()
}

fn effective_part_size(total: u64, requested: u64) -> u64 {
    let minimum = total.div_ceil(MAX_PARTS);
    requested.max(minimum).max(1)
}

/// Checkpoint for a fresh upload of `total` bytes
///
/// Records the part size [`plan_parts`] will actually use, so a resumed
/// upload plans the same spans.
pub fn start_checkpoint(upload_id: String, total: u64, part_size: u64) -> ResumeState {
    ResumeState::new(upload_id, total, effective_part_size(total, part_size) as usize)
}

impl S3Client {
    /// Create a multipart upload and return its id
    pub(super) async fn create_upload(
        &self,
        key: &str,
        options: &InitMultipartUploadOptions,
    ) -> S3Result<String> {
        let (sse, kms_key_id) = self.sse();

        let response = self
            .aws_client()
            .create_multipart_upload()
            .bucket(self.bucket())
            .key(key)
            .set_content_type(options.content_type.clone())
            .set_content_disposition(options.content_disposition.clone())
            .set_cache_control(options.cache_control.clone())
            .set_metadata(user_metadata(&options.meta))
            .storage_class(self.storage_class_for(options.storage_class).to_aws())
            .set_server_side_encryption(sse)
            .set_ssekms_key_id(kms_key_id)
            .send()
            .await
            .map_err(S3Error::from)?;

        response
            .upload_id()
            .map(|s| s.to_string())
            .ok_or_else(|| S3Error::MultipartUpload("No upload ID returned".to_string()))
    }

    /// Upload one in-memory part
    pub(super) async fn send_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> S3Result<UploadPartInfo> {
        let size = data.len();

        let response = self
            .aws_client()
            .upload_part()
            .bucket(self.bucket())
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(S3Error::from)?;

        let etag = response
            .e_tag()
            .ok_or_else(|| S3Error::MultipartUpload("No ETag returned for part".to_string()))?
            .to_string();

        debug!(key, part_number, size, "uploaded part");
        Ok(UploadPartInfo::new(part_number, etag, size))
    }

    /// Copy a byte range of `copy_source` as one part
    async fn copy_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        copy_source: &str,
        range: &str,
    ) -> S3Result<UploadPartInfo> {
        let (start, end) = parse_byte_range(range)?;

        let response = self
            .aws_client()
            .upload_part_copy()
            .bucket(self.bucket())
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .copy_source(copy_source)
            .copy_source_range(range)
            .send()
            .await
            .map_err(S3Error::from)?;

        let etag = response
            .copy_part_result()
            .and_then(|r| r.e_tag())
            .ok_or_else(|| S3Error::MultipartUpload("No ETag returned for part copy".to_string()))?
            .to_string();

        Ok(UploadPartInfo::new(
            part_number,
            etag,
            (end - start + 1) as usize,
        ))
    }

    /// Complete an upload from part references, sorted by part number
    pub(super) async fn finish_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[PartRef],
    ) -> S3Result<CompleteMultipartUploadOutput> {
        let mut parts = parts.to_vec();
        parts.sort_by_key(|p| p.number);

        let completed_parts: Vec<CompletedPart> = parts
            .iter()
            .map(|p| {
                CompletedPart::builder()
                    .part_number(p.number)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect();

        let multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        let response = self
            .aws_client()
            .complete_multipart_upload()
            .bucket(self.bucket())
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(multipart_upload)
            .send()
            .await
            .map_err(S3Error::from)?;

        Ok(CompleteMultipartUploadOutput {
            name: key.to_string(),
            bucket: response.bucket().unwrap_or(self.bucket()).to_string(),
            etag: response.e_tag().map(|s| s.to_string()),
            location: response.location().map(|s| s.to_string()),
            version_id: response.version_id().map(|s| s.to_string()),
        })
    }

    /// Abort an upload
    pub(super) async fn abort_upload(&self, key: &str, upload_id: &str) -> S3Result<()> {
        self.aws_client()
            .abort_multipart_upload()
            .bucket(self.bucket())
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(S3Error::from)?;

        Ok(())
    }

    fn parallelism(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config().parallel_operations)
            .clamp(1, MAX_PARALLEL_OPERATIONS)
    }
}

#[async_trait]
impl MultipartOperations for S3Client {
    async fn init_multipart_upload(
        &self,
        name: &str,
        options: &InitMultipartUploadOptions,
    ) -> S3Result<InitMultipartUploadOutput> {
        let upload_id = self.create_upload(name, options).await?;

        Ok(InitMultipartUploadOutput {
            name: name.to_string(),
            bucket: self.bucket().to_string(),
            upload_id,
        })
    }

    async fn upload_part(
        &self,
        name: &str,
        upload_id: &str,
        part_no: i32,
        body: PartBody,
        _options: &RequestOptions,
    ) -> S3Result<UploadPartInfo> {
        let data = part_bytes(body).await?;
        self.send_part(name, upload_id, part_no, data).await
    }

    async fn list_parts(
        &self,
        name: &str,
        upload_id: &str,
        query: &ListPartsQuery,
        _options: &RequestOptions,
    ) -> S3Result<ListPartsOutput> {
        let response = self
            .aws_client()
            .list_parts()
            .bucket(self.bucket())
            .key(name)
            .upload_id(upload_id)
            .set_max_parts(query.max_parts)
            .set_part_number_marker(query.part_number_marker.clone())
            .send()
            .await
            .map_err(S3Error::from)?;

        let parts = response
            .parts()
            .iter()
            .filter_map(|p| {
                let part_number = p.part_number()?;
                let etag = p.e_tag()?.to_string();
                let size = p.size().unwrap_or(0).max(0) as usize;
                Some(UploadPartInfo::new(part_number, etag, size))
            })
            .collect();

        Ok(ListPartsOutput {
            parts,
            next_part_number_marker: response.next_part_number_marker().map(|s| s.to_string()),
            is_truncated: response.is_truncated().unwrap_or(false),
        })
    }

    async fn complete_multipart_upload(
        &self,
        name: &str,
        upload_id: &str,
        parts: &[PartRef],
        _options: &RequestOptions,
    ) -> S3Result<CompleteMultipartUploadOutput> {
        self.finish_upload(name, upload_id, parts).await
    }

    async fn multipart_upload(
        &self,
        name: &str,
        source: MultipartSource,
        options: &MultipartUploadOptions,
    ) -> S3Result<CompleteMultipartUploadOutput> {
        let total_size = match &source {
            MultipartSource::File(path) => tokio::fs::metadata(path).await?.len(),
            MultipartSource::Buffer(data) => data.len() as u64,
        };

        let mut state = match options.checkpoint.clone() {
            Some(checkpoint) if checkpoint.upload_id.is_some() => {
                if checkpoint.total_size != total_size {
                    return Err(S3Error::MultipartUpload(format!(
                        "Checkpoint is for {} bytes but the source has {}",
                        checkpoint.total_size, total_size
                    )));
                }
                debug!(
                    key = name,
                    completed = checkpoint.completed_parts.len(),
                    "resuming multipart upload"
                );
                checkpoint
            }
            _ => {
                let part_size = options.part_size.unwrap_or(self.config().chunk_size) as u64;
                let init = InitMultipartUploadOptions {
                    bucket: None,
                    content_type: options.content_type.clone(),
                    content_disposition: None,
                    cache_control: None,
                    meta: options.meta.clone(),
                    storage_class: options.storage_class,
                };
                let upload_id = self.create_upload(name, &init).await?;
                start_checkpoint(upload_id, total_size, part_size)
            }
        };

        let upload_id = state
            .upload_id
            .clone()
            .ok_or_else(|| S3Error::MultipartUpload("Missing upload ID".to_string()))?;

        let done: HashSet<i32> = state.completed_parts.iter().map(|p| p.part_number).collect();
        let pending: Vec<PartSpan> = plan_parts(total_size, state.chunk_size as u64)
            .into_iter()
            .filter(|span| !done.contains(&span.number))
            .collect();

        let source = &source;
        let upload_id_ref = upload_id.as_str();
        let mut uploads = stream::iter(pending)
            .map(|span| async move {
                let body = match source {
                    MultipartSource::File(path) => PartBody::File {
                        path: path.clone(),
                        start: span.start,
                        end: span.end,
                    },
                    MultipartSource::Buffer(data) => {
                        PartBody::Bytes(data.slice(span.start as usize..span.end as usize))
                    }
                };
                let data = part_bytes(body).await?;
                self.send_part(name, upload_id_ref, span.number, data).await
            })
            .buffer_unordered(self.parallelism(options.parallel));

        // Failed uploads are left open so the checkpoint can resume them
        while let Some(result) = uploads.next().await {
            state.completed_parts.push(result?);
            if let Some(progress) = &options.progress {
                progress(state.fraction(), &state);
            }
        }
        drop(uploads);

        let parts: Vec<PartRef> = state.completed_parts.iter().map(PartRef::from).collect();
        self.finish_upload(name, &upload_id, &parts).await
    }

    async fn multipart_upload_copy(
        &self,
        name: &str,
        source: &MultipartCopySource,
        options: &MultipartUploadOptions,
    ) -> S3Result<CompleteMultipartUploadOutput> {
        let source_bucket = source
            .source_bucket
            .clone()
            .unwrap_or_else(|| self.bucket().to_string());
        let meta = self
            .head_in(&source_bucket, &source.source_key, None)
            .await?;

        if meta.size == 0 {
            return Err(S3Error::InvalidRange(format!(
                "Cannot copy empty object {}/{} in parts",
                source_bucket, source.source_key
            )));
        }

        let start = source.start.unwrap_or(0);
        let end = source.end.unwrap_or(meta.size - 1);
        if start > end || end >= meta.size {
            return Err(S3Error::InvalidRange(format!(
                "Range {}-{} outside object of {} bytes",
                start, end, meta.size
            )));
        }

        let total = end - start + 1;
        let part_size = options.part_size.unwrap_or(self.config().chunk_size) as u64;
        let spans = plan_parts(total, part_size);

        let init = InitMultipartUploadOptions {
            bucket: None,
            content_type: options
                .content_type
                .clone()
                .or_else(|| meta.content_type.clone()),
            content_disposition: None,
            cache_control: None,
            meta: if options.meta.is_empty() {
                meta.metadata.clone()
            } else {
                options.meta.clone()
            },
            storage_class: options.storage_class,
        };
        let upload_id = self.create_upload(name, &init).await?;
        let mut state = start_checkpoint(upload_id.clone(), total, part_size);

        let copy_source = self.copy_source(Some(&source_bucket), &source.source_key);
        let copy_source = copy_source.as_str();
        let upload_id_ref = upload_id.as_str();

        let copied = async {
            let mut copies = stream::iter(spans)
                .map(|span| async move {
                    let range = byte_range(start + span.start, start + span.end - 1);
                    self.copy_part(name, upload_id_ref, span.number, copy_source, &range)
                        .await
                })
                .buffer_unordered(self.parallelism(options.parallel));

            while let Some(result) = copies.next().await {
                state.completed_parts.push(result?);
                if let Some(progress) = &options.progress {
                    progress(state.fraction(), &state);
                }
            }
            drop(copies);

            let parts: Vec<PartRef> = state.completed_parts.iter().map(PartRef::from).collect();
            self.finish_upload(name, upload_id_ref, &parts).await
        }
        .await;

        if copied.is_err() {
            if let Err(abort_err) = self.abort_upload(name, &upload_id).await {
                warn!(key = name, upload_id = %upload_id, error = %abort_err, "failed to abort multipart copy");
            }
        }
        copied
    }

    async fn list_uploads(
        &self,
        query: &ListUploadsQuery,
        _options: &RequestOptions,
    ) -> S3Result<ListUploadsOutput> {
        let response = self
            .aws_client()
            .list_multipart_uploads()
            .bucket(self.bucket())
            .set_prefix(query.prefix.clone())
            .set_delimiter(query.delimiter.clone())
            .set_key_marker(query.key_marker.clone())
            .set_upload_id_marker(query.upload_id_marker.clone())
            .set_max_uploads(query.max_uploads)
            .send()
            .await
            .map_err(S3Error::from)?;

        let uploads = response
            .uploads()
            .iter()
            .filter_map(|u| {
                Some(MultipartUploadSummary {
                    name: u.key()?.to_string(),
                    upload_id: u.upload_id()?.to_string(),
                    initiated: super::client::to_system_time(u.initiated()),
                    storage_class: u
                        .storage_class()
                        .map(|sc| S3StorageClass::from_wire(sc.as_str())),
                })
            })
            .collect();

        Ok(ListUploadsOutput {
            uploads,
            common_prefixes: response
                .common_prefixes()
                .iter()
                .filter_map(|cp| cp.prefix().map(|s| s.to_string()))
                .collect(),
            next_key_marker: response.next_key_marker().map(|s| s.to_string()),
            next_upload_id_marker: response.next_upload_id_marker().map(|s| s.to_string()),
            is_truncated: response.is_truncated().unwrap_or(false),
        })
    }

    async fn abort_multipart_upload(
        &self,
        name: &str,
        upload_id: &str,
        _options: &RequestOptions,
    ) -> S3Result<()> {
        self.abort_upload(name, upload_id).await
    }

    async fn upload_part_copy(
        &self,
        params: &UploadPartCopyParams,
        _options: &RequestOptions,
    ) -> S3Result<UploadPartInfo> {
        let copy_source = self.copy_source(params.source_bucket.as_deref(), &params.source_key);
        self.copy_part(
            &params.name,
            &params.upload_id,
            params.part_no,
            &copy_source,
            &params.range,
        )
        .await
    }
}

/// Materialize a part body
pub(super) async fn part_bytes(body: PartBody) -> S3Result<Bytes> {
    match body {
        PartBody::Bytes(data) => Ok(data),
        PartBody::File { path, start, end } => read_file_range(&path, start, end).await,
    }
}

async fn read_file_range(path: &Path, start: u64, end: u64) -> S3Result<Bytes> {
    if end < start {
        return Err(S3Error::InvalidRange(format!(
            "Part range {}..{} of {} is reversed",
            start,
            end,
            path.display()
        )));
    }

    let mut file = File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(start)).await?;

    let mut buffer = vec![0u8; (end - start) as usize];
    file.read_exact(&mut buffer).await?;

    Ok(Bytes::from(buffer))
}
