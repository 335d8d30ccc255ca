use crate::options::OssOptions;
use crate::store::{Listing, ObjectMeta, ObjectStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use s3::{Bucket, creds::Credentials, error::S3Error, region::Region};
use uploadkit_core::storage::{Error, ErrorKind, Result};

/// An [`ObjectStore`] backed by a bucket of an S3 compatible service such as Aliyun OSS,
/// MinIO or AWS S3.
#[derive(Clone)]
pub struct S3Store {
    bucket: Box<Bucket>,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store").field("bucket", &self.bucket.name()).finish()
    }
}

impl S3Store {
    /// Creates a client for the bucket described by `options`. No request is made yet.
    pub fn new(options: &OssOptions) -> Result<Self> {
        let region = Region::Custom {
            region: options.region.clone(),
            endpoint: options.endpoint.clone(),
        };
        let credentials = Credentials::new(Some(options.key_id.as_str()), Some(options.key_secret.as_str()), None, None, None)
            .map_err(|e| Error::new(ErrorKind::Configuration, e))?;
        let mut bucket = Bucket::new(&options.bucket, region, credentials).map_err(|e| Error::new(ErrorKind::Configuration, e))?;
        if options.path_style {
            bucket = bucket.with_path_style();
        }
        Ok(S3Store { bucket })
    }
}

fn s3_error(err: S3Error) -> Error {
    let kind = match &err {
        S3Error::HttpFailWithBody(status, _) => match *status {
            404 => ErrorKind::NotFound,
            401 | 403 => ErrorKind::PermissionDenied,
            408 => ErrorKind::Timeout,
            409 | 412 => ErrorKind::Conflict,
            500..=599 => ErrorKind::Connectivity,
            _ => ErrorKind::LocalError,
        },
        _ => ErrorKind::Connectivity,
    };
    Error::new(kind, err)
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl ObjectStore for S3Store {
    #[tracing_attributes::instrument(skip(self, content))]
    async fn put(&self, key: &str, content: Vec<u8>) -> Result<()> {
        self.bucket.put_object(key, &content).await.map_err(s3_error)?;
        Ok(())
    }

    #[tracing_attributes::instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self.bucket.get_object(key).await.map_err(s3_error)?;
        Ok(response.bytes().to_vec())
    }

    #[tracing_attributes::instrument(skip(self))]
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        match self.bucket.head_object(key).await {
            Ok((head, _)) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: head.content_length.unwrap_or_default().max(0) as u64,
                last_modified: head.last_modified.as_deref().and_then(parse_time),
            })),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(None),
            Err(e) => Err(s3_error(e)),
        }
    }

    #[tracing_attributes::instrument(skip(self))]
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Listing> {
        let pages = self
            .bucket
            .list(prefix.to_string(), delimiter.map(str::to_string))
            .await
            .map_err(s3_error)?;
        let mut listing = Listing::default();
        for page in pages {
            listing.objects.extend(page.contents.into_iter().map(|o| ObjectMeta {
                last_modified: parse_time(&o.last_modified),
                key: o.key,
                size: o.size,
            }));
            listing.prefixes.extend(page.common_prefixes.into_iter().flatten().map(|p| p.prefix));
        }
        Ok(listing)
    }

    #[tracing_attributes::instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        self.bucket.delete_object(key).await.map_err(s3_error)?;
        Ok(())
    }

    #[tracing_attributes::instrument(skip(self))]
    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.bucket.copy_object_internal(from, to).await.map_err(s3_error)?;
        Ok(())
    }
}
