//! In-memory object store for testing
//!
//! Implements `ObjectStore` over a map so the registry and service can be
//! exercised without a network. Every call is recorded as `"op:target"`, and
//! a failure can be injected to check that errors pass through unchanged.

use super::s3::*;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;
use tokio::io::AsyncReadExt;

#[derive(Debug, Clone)]
struct MockObject {
    data: Bytes,
    content_type: Option<String>,
    meta: HashMap<String, String>,
    modified: SystemTime,
}

impl MockObject {
    fn new(data: Bytes) -> Self {
        Self {
            data,
            content_type: None,
            meta: HashMap::new(),
            modified: SystemTime::now(),
        }
    }

    fn etag(&self) -> String {
        format!("\"{:x}-{}\"", self.data.iter().map(|b| *b as u64).sum::<u64>(), self.data.len())
    }
}

#[derive(Debug, Clone, Default)]
struct MockUpload {
    name: String,
    parts: BTreeMap<i32, Bytes>,
}

/// In-memory `ObjectStore` bound to one bucket
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    bucket: String,
    objects: Arc<RwLock<BTreeMap<String, MockObject>>>,
    uploads: Arc<RwLock<HashMap<String, MockUpload>>>,
    calls: Arc<Mutex<Vec<String>>>,
    failure: Arc<Mutex<Option<S3Error>>>,
}

impl MockStore {
    /// Create an empty store for `bucket`
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Add an object with the given content
    pub fn add_object(&self, name: &str, data: &[u8]) {
        self.objects
            .write()
            .unwrap()
            .insert(name.to_string(), MockObject::new(Bytes::copy_from_slice(data)));
    }

    /// Content of an object, if present
    pub fn object(&self, name: &str) -> Option<Bytes> {
        self.objects.read().unwrap().get(name).map(|o| o.data.clone())
    }

    /// User metadata of an object, if present
    pub fn object_meta(&self, name: &str) -> Option<HashMap<String, String>> {
        self.objects.read().unwrap().get(name).map(|o| o.meta.clone())
    }

    /// Calls received so far, as `"op:target"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Make every following call fail with `error`
    pub fn fail_with(&self, error: S3Error) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Number of in-progress uploads
    pub fn open_uploads(&self) -> usize {
        self.uploads.read().unwrap().len()
    }

    fn enter(&self, op: &str, target: &str) -> S3Result<()> {
        self.calls.lock().unwrap().push(format!("{}:{}", op, target));
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn not_found(&self, name: &str) -> S3Error {
        S3Error::NotFound {
            bucket: self.bucket.clone(),
            key: name.to_string(),
        }
    }

    fn load(&self, name: &str) -> S3Result<MockObject> {
        self.objects
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found(name))
    }

    fn store(&self, name: &str, object: MockObject) -> String {
        let etag = object.etag();
        self.objects.write().unwrap().insert(name.to_string(), object);
        etag
    }

    fn no_such_upload(upload_id: &str) -> S3Error {
        S3Error::Service {
            code: "NoSuchUpload".to_string(),
            message: format!("upload {} does not exist", upload_id),
        }
    }

    fn metadata(&self, name: &str, object: &MockObject) -> S3ObjectMetadata {
        S3ObjectMetadata {
            key: name.to_string(),
            size: object.data.len() as u64,
            last_modified: Some(object.modified),
            etag: Some(object.etag()),
            storage_class: Some(S3StorageClass::Standard),
            content_type: object.content_type.clone(),
            content_encoding: None,
            cache_control: None,
            content_disposition: None,
            metadata: object.meta.clone(),
            server_side_encryption: None,
            version_id: None,
            restore: None,
        }
    }

    fn listing(&self, prefix: Option<&str>, after: Option<&str>, max_keys: Option<i32>) -> (Vec<S3Object>, bool) {
        let objects = self.objects.read().unwrap();
        let limit = max_keys.map(|n| n.max(0) as usize).unwrap_or(1000);

        let mut matching = objects
            .iter()
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
            .filter(|(key, _)| after.map_or(true, |a| key.as_str() > a))
            .map(|(key, object)| S3Object {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: Some(object.modified),
                etag: Some(object.etag()),
                storage_class: Some(S3StorageClass::Standard),
                owner: None,
            });

        let page: Vec<S3Object> = matching.by_ref().take(limit).collect();
        let truncated = matching.next().is_some();
        (page, truncated)
    }
}

#[async_trait]
impl S3Operations for MockStore {
    async fn put(&self, name: &str, body: Bytes, options: &PutObjectOptions) -> S3Result<PutObjectOutput> {
        self.enter("put", name)?;
        let mut object = MockObject::new(body);
        object.content_type = options.content_type.clone();
        object.meta = options.meta.clone();

        Ok(PutObjectOutput {
            name: name.to_string(),
            etag: Some(self.store(name, object)),
            version_id: None,
        })
    }

    async fn delete(&self, name: &str, _options: &RequestOptions) -> S3Result<DeleteObjectOutput> {
        self.enter("delete", name)?;
        self.objects.write().unwrap().remove(name);

        Ok(DeleteObjectOutput {
            name: name.to_string(),
            delete_marker: false,
            version_id: None,
        })
    }

    async fn list(&self, query: &ListObjectsQuery, _options: &RequestOptions) -> S3Result<S3ListResult> {
        self.enter("list", query.prefix.as_deref().unwrap_or(""))?;
        let (objects, is_truncated) =
            self.listing(query.prefix.as_deref(), query.marker.as_deref(), query.max_keys);
        let next_marker = if is_truncated {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(S3ListResult {
            objects,
            next_marker,
            is_truncated,
            ..Default::default()
        })
    }

    async fn list_v2(&self, query: &ListV2ObjectsQuery, _options: &RequestOptions) -> S3Result<S3ListResult> {
        self.enter("list_v2", query.prefix.as_deref().unwrap_or(""))?;
        let after = query
            .continuation_token
            .as_deref()
            .or(query.start_after.as_deref());
        let (objects, is_truncated) = self.listing(query.prefix.as_deref(), after, query.max_keys);
        let continuation_token = if is_truncated {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(S3ListResult {
            key_count: Some(objects.len() as i32),
            objects,
            continuation_token,
            is_truncated,
            ..Default::default()
        })
    }

    async fn head(&self, name: &str, _options: &HeadObjectOptions) -> S3Result<S3ObjectMetadata> {
        self.enter("head", name)?;
        let object = self.load(name)?;
        Ok(self.metadata(name, &object))
    }

    async fn copy(&self, name: &str, source_name: &str, options: &CopyObjectOptions) -> S3Result<CopyObjectOutput> {
        self.enter("copy", name)?;
        let mut object = self.load(source_name)?;
        if let Some(meta) = &options.meta {
            object.meta = meta.clone();
        }
        if let Some(content_type) = &options.content_type {
            object.content_type = Some(content_type.clone());
        }
        object.modified = SystemTime::now();

        Ok(CopyObjectOutput {
            name: name.to_string(),
            etag: Some(self.store(name, object)),
            last_modified: Some(SystemTime::now()),
            version_id: None,
        })
    }

    async fn put_stream(&self, name: &str, mut stream: ObjectReader, options: &PutObjectOptions) -> S3Result<PutObjectOutput> {
        self.enter("put_stream", name)?;
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await?;

        let mut object = MockObject::new(Bytes::from(data));
        object.content_type = options.content_type.clone();
        object.meta = options.meta.clone();

        Ok(PutObjectOutput {
            name: name.to_string(),
            etag: Some(self.store(name, object)),
            version_id: None,
        })
    }

    async fn get(&self, name: &str, file: Option<&Path>, _options: &GetObjectOptions) -> S3Result<GetObjectOutput> {
        self.enter("get", name)?;
        let object = self.load(name)?;
        let size = object.data.len() as u64;

        let content = match file {
            Some(path) => {
                tokio::fs::write(path, &object.data).await?;
                None
            }
            None => Some(object.data.clone()),
        };

        Ok(GetObjectOutput {
            name: name.to_string(),
            content,
            size,
            etag: Some(object.etag()),
            content_type: object.content_type.clone(),
            last_modified: Some(object.modified),
            metadata: object.meta.clone(),
        })
    }

    async fn get_stream(&self, name: &str, _options: &GetObjectOptions) -> S3Result<GetStreamOutput> {
        self.enter("get_stream", name)?;
        let object = self.load(name)?;

        Ok(GetStreamOutput {
            name: name.to_string(),
            content_length: Some(object.data.len() as u64),
            etag: Some(object.etag()),
            content_type: object.content_type.clone(),
            stream: ByteStream::from(object.data),
        })
    }

    async fn put_meta(&self, name: &str, meta: &HashMap<String, String>, _options: &RequestOptions) -> S3Result<CopyObjectOutput> {
        self.enter("put_meta", name)?;
        let mut object = self.load(name)?;
        object.meta = meta.clone();

        Ok(CopyObjectOutput {
            name: name.to_string(),
            etag: Some(self.store(name, object)),
            last_modified: Some(SystemTime::now()),
            version_id: None,
        })
    }

    async fn delete_multi(&self, names: &[String], options: &DeleteMultiOptions) -> S3Result<DeleteMultiOutput> {
        self.enter("delete_multi", &names.join(","))?;
        let mut objects = self.objects.write().unwrap();
        for name in names {
            objects.remove(name);
        }

        Ok(DeleteMultiOutput {
            deleted: if options.quiet { Vec::new() } else { names.to_vec() },
            errors: Vec::new(),
        })
    }

    async fn signature_url(&self, name: &str, options: &SignatureUrlOptions) -> S3Result<String> {
        self.enter("signature_url", name)?;
        Ok(format!(
            "https://{}.mock.local/{}?method={:?}&expires={}",
            self.bucket,
            name,
            options.method,
            options.expires.as_secs()
        ))
    }

    async fn restore(&self, name: &str, _options: &RestoreOptions) -> S3Result<RestoreOutput> {
        self.enter("restore", name)?;
        self.load(name)?;
        Ok(RestoreOutput {
            name: name.to_string(),
            restore_output_path: None,
        })
    }

    async fn append(&self, name: &str, body: Bytes, options: &AppendObjectOptions) -> S3Result<AppendObjectOutput> {
        self.enter("append", name)?;
        let mut object = self
            .objects
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| MockObject::new(Bytes::new()));

        if object.data.len() as u64 != options.position {
            return Err(S3Error::Service {
                code: "PositionNotEqualToLength".to_string(),
                message: format!(
                    "position {} but object has {} bytes",
                    options.position,
                    object.data.len()
                ),
            });
        }

        let mut data = object.data.to_vec();
        data.extend_from_slice(&body);
        object.data = Bytes::from(data);
        let next_append_position = object.data.len() as u64;

        Ok(AppendObjectOutput {
            name: name.to_string(),
            next_append_position,
            etag: Some(self.store(name, object)),
        })
    }
}

#[async_trait]
impl MultipartOperations for MockStore {
    async fn init_multipart_upload(&self, name: &str, _options: &InitMultipartUploadOptions) -> S3Result<InitMultipartUploadOutput> {
        self.enter("init_multipart_upload", name)?;
        let mut uploads = self.uploads.write().unwrap();
        let upload_id = format!("upload-{}", uploads.len() + 1);
        uploads.insert(
            upload_id.clone(),
            MockUpload {
                name: name.to_string(),
                ..Default::default()
            },
        );

        Ok(InitMultipartUploadOutput {
            name: name.to_string(),
            bucket: self.bucket.clone(),
            upload_id,
        })
    }

    async fn upload_part(&self, name: &str, upload_id: &str, part_no: i32, body: PartBody, _options: &RequestOptions) -> S3Result<UploadPartInfo> {
        self.enter("upload_part", name)?;
        let data = match body {
            PartBody::Bytes(data) => data,
            PartBody::File { path, start, end } => {
                let all = tokio::fs::read(&path).await?;
                Bytes::copy_from_slice(&all[start as usize..end as usize])
            }
        };
        let size = data.len();

        let mut uploads = self.uploads.write().unwrap();
        let upload = uploads
            .get_mut(upload_id)
            .ok_or_else(|| Self::no_such_upload(upload_id))?;
        upload.parts.insert(part_no, data);

        Ok(UploadPartInfo::new(part_no, format!("etag-{}", part_no), size))
    }

    async fn list_parts(&self, name: &str, upload_id: &str, _query: &ListPartsQuery, _options: &RequestOptions) -> S3Result<ListPartsOutput> {
        self.enter("list_parts", name)?;
        let uploads = self.uploads.read().unwrap();
        let upload = uploads
            .get(upload_id)
            .ok_or_else(|| Self::no_such_upload(upload_id))?;

        Ok(ListPartsOutput {
            parts: upload
                .parts
                .iter()
                .map(|(n, data)| UploadPartInfo::new(*n, format!("etag-{}", n), data.len()))
                .collect(),
            next_part_number_marker: None,
            is_truncated: false,
        })
    }

    async fn complete_multipart_upload(&self, name: &str, upload_id: &str, parts: &[PartRef], _options: &RequestOptions) -> S3Result<CompleteMultipartUploadOutput> {
        self.enter("complete_multipart_upload", name)?;
        let upload = self
            .uploads
            .write()
            .unwrap()
            .remove(upload_id)
            .ok_or_else(|| Self::no_such_upload(upload_id))?;

        let mut numbers: Vec<i32> = parts.iter().map(|p| p.number).collect();
        numbers.sort_unstable();

        let mut data = Vec::new();
        for number in numbers {
            let part = upload.parts.get(&number).ok_or_else(|| S3Error::Service {
                code: "InvalidPart".to_string(),
                message: format!("part {} was never uploaded", number),
            })?;
            data.extend_from_slice(part);
        }

        let etag = self.store(&upload.name, MockObject::new(Bytes::from(data)));
        Ok(CompleteMultipartUploadOutput {
            name: name.to_string(),
            bucket: self.bucket.clone(),
            etag: Some(etag),
            location: None,
            version_id: None,
        })
    }

    async fn multipart_upload(&self, name: &str, source: MultipartSource, options: &MultipartUploadOptions) -> S3Result<CompleteMultipartUploadOutput> {
        self.enter("multipart_upload", name)?;
        let data = match source {
            MultipartSource::Buffer(data) => data,
            MultipartSource::File(path) => Bytes::from(tokio::fs::read(&path).await?),
        };

        let part_size = options.part_size.unwrap_or(DEFAULT_CHUNK_SIZE) as u64;
        let mut state = start_checkpoint("mock-upload".to_string(), data.len() as u64, part_size);
        for span in plan_parts(data.len() as u64, part_size) {
            state
                .completed_parts
                .push(UploadPartInfo::new(span.number, format!("etag-{}", span.number), span.len() as usize));
            if let Some(progress) = &options.progress {
                progress(state.fraction(), &state);
            }
        }

        let mut object = MockObject::new(data);
        object.content_type = options.content_type.clone();
        object.meta = options.meta.clone();

        Ok(CompleteMultipartUploadOutput {
            name: name.to_string(),
            bucket: self.bucket.clone(),
            etag: Some(self.store(name, object)),
            location: None,
            version_id: None,
        })
    }

    async fn multipart_upload_copy(&self, name: &str, source: &MultipartCopySource, _options: &MultipartUploadOptions) -> S3Result<CompleteMultipartUploadOutput> {
        self.enter("multipart_upload_copy", name)?;
        let object = self.load(&source.source_key)?;
        let len = object.data.len() as u64;
        let start = source.start.unwrap_or(0);
        let end = source.end.unwrap_or(len.saturating_sub(1));
        if len == 0 || start > end || end >= len {
            return Err(S3Error::InvalidRange(format!("{}-{} of {}", start, end, len)));
        }

        let copy = MockObject::new(object.data.slice(start as usize..=end as usize));
        Ok(CompleteMultipartUploadOutput {
            name: name.to_string(),
            bucket: self.bucket.clone(),
            etag: Some(self.store(name, copy)),
            location: None,
            version_id: None,
        })
    }

    async fn list_uploads(&self, query: &ListUploadsQuery, _options: &RequestOptions) -> S3Result<ListUploadsOutput> {
        self.enter("list_uploads", query.prefix.as_deref().unwrap_or(""))?;
        let uploads = self.uploads.read().unwrap();
        let mut summaries: Vec<MultipartUploadSummary> = uploads
            .iter()
            .filter(|(_, u)| query.prefix.as_deref().map_or(true, |p| u.name.starts_with(p)))
            .map(|(id, u)| MultipartUploadSummary {
                name: u.name.clone(),
                upload_id: id.clone(),
                initiated: None,
                storage_class: None,
            })
            .collect();
        summaries.sort_by(|a, b| a.upload_id.cmp(&b.upload_id));

        Ok(ListUploadsOutput {
            uploads: summaries,
            ..Default::default()
        })
    }

    async fn abort_multipart_upload(&self, name: &str, upload_id: &str, _options: &RequestOptions) -> S3Result<()> {
        self.enter("abort_multipart_upload", name)?;
        self.uploads
            .write()
            .unwrap()
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| Self::no_such_upload(upload_id))
    }

    async fn upload_part_copy(&self, params: &UploadPartCopyParams, _options: &RequestOptions) -> S3Result<UploadPartInfo> {
        self.enter("upload_part_copy", &params.name)?;
        let (start, end) = parse_byte_range(&params.range)?;
        let object = self.load(&params.source_key)?;
        if end >= object.data.len() as u64 {
            return Err(S3Error::InvalidRange(params.range.clone()));
        }
        let data = object.data.slice(start as usize..=end as usize);
        let size = data.len();

        let mut uploads = self.uploads.write().unwrap();
        let upload = uploads
            .get_mut(&params.upload_id)
            .ok_or_else(|| Self::no_such_upload(&params.upload_id))?;
        upload.parts.insert(params.part_no, data);

        Ok(UploadPartInfo::new(params.part_no, format!("etag-{}", params.part_no), size))
    }
}

impl ObjectStore for MockStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }
}
