//! Settings understood by the [`FtpUploader`](crate::FtpUploader).

use std::time::Duration;
use uploadkit_core::settings::{self, Settings};
use uploadkit_core::storage::Result;

/// Host name of the FTP server. Required.
pub const FTP_SERVER_URL: &str = "FTP_SERVER_URL";
/// Control port, 21 when not set.
pub const FTP_SERVER_PORT: &str = "FTP_SERVER_PORT";
/// Login name. Required.
pub const FTP_USER_NAME: &str = "FTP_USER_NAME";
/// Login password.
pub const FTP_USER_PWD: &str = "FTP_USER_PWD";
/// Dial timeout in seconds. Zero or unset means the default of 5.
pub const FTP_CONN_TIMEOUT: &str = "FTP_CONN_TIMEOUT";
/// Deadline in seconds for a single storage operation. Zero or unset means no deadline.
pub const FTP_OP_TIMEOUT: &str = "FTP_OP_TIMEOUT";
/// Optional URL prefix that public URLs are built from.
pub const FTP_URL_PREFIX: &str = "FTP_URL_PREFIX";
/// Host that public URLs are derived from when no prefix is configured.
pub const PROXY_SITE_URL: &str = "PROXY_SITE_URL";

pub(crate) const DEFAULT_PORT: u16 = 21;
pub(crate) const DEFAULT_CONN_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Typed form of the FTP back-end settings.
#[derive(Clone, PartialEq, Eq)]
pub struct FtpOptions {
    /// Server host name or address, without scheme.
    pub host: String,
    /// Control port.
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// How long dialing and logging in may take.
    pub connect_timeout: Duration,
    /// Deadline for each storage operation, if any.
    pub operation_timeout: Option<Duration>,
    /// Period of the keep-alive probe.
    pub keepalive_interval: Duration,
    /// Prefix for public URLs.
    pub url_prefix: Option<String>,
    /// Host for public URLs without a prefix.
    pub site_url: String,
}

impl std::fmt::Debug for FtpOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("connect_timeout", &self.connect_timeout)
            .field("operation_timeout", &self.operation_timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("url_prefix", &self.url_prefix)
            .field("site_url", &self.site_url)
            .finish()
    }
}

impl FtpOptions {
    /// Options for `host` on the default port with all other values at their defaults.
    pub fn new<H: Into<String>, U: Into<String>, P: Into<String>>(host: H, username: U, password: P) -> Self {
        FtpOptions {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            connect_timeout: DEFAULT_CONN_TIMEOUT,
            operation_timeout: None,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            url_prefix: None,
            site_url: String::new(),
        }
    }

    /// Reads the options from a settings map.
    pub fn from_settings(s: &Settings) -> Result<Self> {
        let host = settings::required(s, FTP_SERVER_URL)?;
        let host = host.strip_prefix("ftp://").unwrap_or(host).trim_end_matches('/');
        let mut options = FtpOptions::new(host, settings::required(s, FTP_USER_NAME)?, s.get(FTP_USER_PWD).cloned().unwrap_or_default());
        options.port = settings::parse_or(s, FTP_SERVER_PORT, DEFAULT_PORT)?;
        options.connect_timeout = match settings::parse_or(s, FTP_CONN_TIMEOUT, 0u64)? {
            0 => DEFAULT_CONN_TIMEOUT,
            secs => Duration::from_secs(secs),
        };
        options.operation_timeout = match settings::parse_or(s, FTP_OP_TIMEOUT, 0u64)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        options.url_prefix = settings::optional(s, FTP_URL_PREFIX).map(|p| p.trim_end_matches('/').to_string());
        options.site_url = settings::optional(s, PROXY_SITE_URL).unwrap_or_default().to_string();
        Ok(options)
    }

    /// The `host:port` pair to dial.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
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

    #[test]
    fn defaults() {
        let o = FtpOptions::from_settings(&settings(&[(FTP_SERVER_URL, "ftp.example.com"), (FTP_USER_NAME, "bob")])).unwrap();
        assert_eq!(o.address(), "ftp.example.com:21");
        assert_eq!(o.password, "");
        assert_eq!(o.connect_timeout, Duration::from_secs(5));
        assert_eq!(o.operation_timeout, None);
        assert_eq!(o.keepalive_interval, Duration::from_secs(5));
        assert_eq!(o.url_prefix, None);
    }

    #[test]
    fn all_settings() {
        let o = FtpOptions::from_settings(&settings(&[
            (FTP_SERVER_URL, "ftp://ftp.example.com/"),
            (FTP_SERVER_PORT, "2121"),
            (FTP_USER_NAME, "bob"),
            (FTP_USER_PWD, "secret"),
            (FTP_CONN_TIMEOUT, "0"),
            (FTP_OP_TIMEOUT, "30"),
            (FTP_URL_PREFIX, "https://cdn.example.com/files/"),
            (PROXY_SITE_URL, "https://example.com"),
        ]))
        .unwrap();
        assert_eq!(o.address(), "ftp.example.com:2121");
        assert_eq!(o.password, "secret");
        assert_eq!(o.connect_timeout, Duration::from_secs(5));
        assert_eq!(o.operation_timeout, Some(Duration::from_secs(30)));
        assert_eq!(o.url_prefix.as_deref(), Some("https://cdn.example.com/files"));
        assert_eq!(o.site_url, "https://example.com");
        assert!(!format!("{:?}", o).contains("secret"));
    }

    #[test]
    fn missing_or_invalid() {
        let err = FtpOptions::from_settings(&settings(&[(FTP_USER_NAME, "bob")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains(FTP_SERVER_URL));

        let err = FtpOptions::from_settings(&settings(&[(FTP_SERVER_URL, "h"), (FTP_USER_NAME, "bob"), (FTP_SERVER_PORT, "http")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
