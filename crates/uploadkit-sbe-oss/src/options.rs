//! Settings understood by the [`ObjectStorage`](crate::ObjectStorage) back-end.

use uploadkit_core::settings::{self, Settings};
use uploadkit_core::storage::Result;

/// Endpoint of the object storage service, e.g. `oss-cn-hangzhou.aliyuncs.com`. Required.
pub const OSS_ENDPOINT: &str = "OSS_ENDPOINT";
/// Access key id. Required.
pub const OSS_KEYID: &str = "OSS_KEYID";
/// Access key secret. Required.
pub const OSS_KEYSECRET: &str = "OSS_KEYSECRET";
/// Bucket name. Required.
pub const OSS_BUCKETNAME: &str = "OSS_BUCKETNAME";
/// Signing region.
pub const OSS_REGION: &str = "OSS_REGION";
/// Key prefix all objects are stored under.
pub const OSS_ROOT: &str = "OSS_ROOT";
/// Host public URLs are built from, e.g. a CDN in front of the bucket.
pub const OSS_HOST: &str = "OSS_HOST";
/// Address the bucket as `endpoint/bucket` instead of `bucket.endpoint`.
pub const OSS_PATH_STYLE: &str = "OSS_PATH_STYLE";

pub(crate) const DEFAULT_REGION: &str = "oss";

/// Typed form of the object storage settings.
#[derive(Clone, PartialEq, Eq)]
pub struct OssOptions {
    /// Service endpoint including the scheme.
    pub endpoint: String,
    /// Access key id.
    pub key_id: String,
    /// Access key secret.
    pub key_secret: String,
    /// Bucket name.
    pub bucket: String,
    /// Signing region.
    pub region: String,
    /// Key prefix, without leading or trailing slashes.
    pub root: String,
    /// Host for public URLs, if not derived from bucket and endpoint.
    pub host: Option<String>,
    /// Whether to use path style bucket addressing.
    pub path_style: bool,
}

impl std::fmt::Debug for OssOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OssOptions")
            .field("endpoint", &self.endpoint)
            .field("key_id", &self.key_id)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("root", &self.root)
            .field("host", &self.host)
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl OssOptions {
    /// Options for `bucket` at `endpoint` with everything else at its default.
    pub fn new<E: AsRef<str>, B: Into<String>>(endpoint: E, bucket: B, key_id: &str, key_secret: &str) -> Self {
        let endpoint = endpoint.as_ref().trim_end_matches('/');
        let endpoint = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        };
        OssOptions {
            endpoint,
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
            bucket: bucket.into(),
            region: DEFAULT_REGION.to_string(),
            root: String::new(),
            host: None,
            path_style: false,
        }
    }

    /// Reads the options from a settings map.
    pub fn from_settings(s: &Settings) -> Result<Self> {
        let mut options = OssOptions::new(
            settings::required(s, OSS_ENDPOINT)?,
            settings::required(s, OSS_BUCKETNAME)?,
            settings::required(s, OSS_KEYID)?,
            settings::required(s, OSS_KEYSECRET)?,
        );
        if let Some(region) = settings::optional(s, OSS_REGION) {
            options.region = region.to_string();
        }
        options.root = settings::optional(s, OSS_ROOT).unwrap_or_default().trim_matches('/').to_string();
        options.host = settings::optional(s, OSS_HOST).map(|h| h.trim_end_matches('/').to_string());
        options.path_style = settings::parse_or(s, OSS_PATH_STYLE, false)?;
        Ok(options)
    }

    /// The host objects are publicly reachable under when no [`OssOptions::host`] is set.
    pub fn bucket_url(&self) -> String {
        if self.path_style {
            return format!("{}/{}", self.endpoint, self.bucket);
        }
        match self.endpoint.split_once("://") {
            Some((scheme, host)) => format!("{}://{}.{}", scheme, self.bucket, host),
            None => format!("https://{}.{}", self.bucket, self.endpoint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uploadkit_core::storage::ErrorKind;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn required() -> Settings {
        settings(&[
            (OSS_ENDPOINT, "oss-cn-hangzhou.aliyuncs.com"),
            (OSS_KEYID, "id"),
            (OSS_KEYSECRET, "topsecret"),
            (OSS_BUCKETNAME, "media"),
        ])
    }

    #[test]
    fn defaults() {
        let o = OssOptions::from_settings(&required()).unwrap();
        assert_eq!(o.endpoint, "https://oss-cn-hangzhou.aliyuncs.com");
        assert_eq!(o.region, "oss");
        assert_eq!(o.root, "");
        assert_eq!(o.host, None);
        assert_eq!(o.bucket_url(), "https://media.oss-cn-hangzhou.aliyuncs.com");
        assert!(!format!("{:?}", o).contains("topsecret"));
    }

    #[test]
    fn optional_settings() {
        let mut s = required();
        s.insert(OSS_ENDPOINT.to_string(), "http://localhost:9000/".to_string());
        s.insert(OSS_ROOT.to_string(), "/site/files/".to_string());
        s.insert(OSS_HOST.to_string(), "https://cdn.example.com/".to_string());
        s.insert(OSS_PATH_STYLE.to_string(), "true".to_string());
        s.insert(OSS_REGION.to_string(), "us-east-1".to_string());
        let o = OssOptions::from_settings(&s).unwrap();
        assert_eq!(o.root, "site/files");
        assert_eq!(o.host.as_deref(), Some("https://cdn.example.com"));
        assert_eq!(o.region, "us-east-1");
        assert_eq!(o.bucket_url(), "http://localhost:9000/media");
    }

    #[test]
    fn every_credential_is_required() {
        for key in [OSS_ENDPOINT, OSS_KEYID, OSS_KEYSECRET, OSS_BUCKETNAME] {
            let mut s = required();
            s.remove(key);
            let err = OssOptions::from_settings(&s).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
            assert!(err.to_string().contains(key));
        }
    }
}
