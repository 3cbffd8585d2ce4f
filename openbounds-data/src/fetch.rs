//! Resource acquisition for source descriptors.
//!
//! A [`ResourceFetcher`] copies the resource named by a descriptor URL into a
//! [`FetchedResource`], a temporary file that is deleted when dropped.
//! [`HttpFetcher`] handles `http`, `https` and `file` URLs.
//!
//! # Architecture
//!
//! The fetcher trait is synchronous so the batch driver stays a plain loop.
//! [`HttpFetcher`] owns a current-thread Tokio runtime and blocks on the
//! `reqwest` download internally, streaming chunks straight to disk.
//!
//! # Example
//!
//! ```no_run
//! use openbounds_data::{HttpFetcher, ResourceFetcher};
//!
//! let fetcher = HttpFetcher::new()?;
//! let resource = fetcher.fetch("https://example.org/parcels.geojson")?;
//! println!("downloaded to {}", resource.path());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{self, Write};
use std::time::Duration;

use camino::{FromPathBufError, Utf8Path, Utf8PathBuf};
use reqwest::Client;
use tempfile::{Builder, NamedTempFile, TempPath};
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use url::Url;

/// Default user agent for source downloads.
pub const DEFAULT_USER_AGENT: &str = "openbounds/0.1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const TEMP_PREFIX: &str = "openbounds-";

/// Errors encountered while acquiring a resource.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The URL could not be parsed or uses an unsupported scheme.
    #[error("cannot fetch {url}: {message}")]
    InvalidUrl {
        /// URL as written in the descriptor.
        url: String,
        /// Reason the URL was rejected.
        message: String,
    },
    /// The server returned an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The request failed due to an I/O or connection error.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// I/O error reported by the transport.
        #[source]
        source: io::Error,
    },
    /// A `file://` resource could not be read.
    #[error("failed to read local resource {path}: {source}")]
    Local {
        /// Local path the URL points at.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The temporary copy could not be written.
    #[error("failed to store {url} locally: {source}")]
    Storage {
        /// URL being stored.
        url: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// A downloaded resource held in a temporary file.
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct FetchedResource {
    path: Utf8PathBuf,
    temp: TempPath,
}

impl FetchedResource {
    /// Create an empty staging file whose name ends with `file_name`.
    ///
    /// Keeping the original file name lets adapters sniff extensions.
    pub fn staging(file_name: Option<&str>) -> io::Result<NamedTempFile> {
        let suffix = file_name
            .map(|name| {
                let cleaned: String = name
                    .chars()
                    .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'))
                    .collect();
                format!("-{cleaned}")
            })
            .unwrap_or_default();
        Builder::new().prefix(TEMP_PREFIX).suffix(&suffix).tempfile()
    }

    /// Seal a fully written staging file.
    pub fn from_temp_file(file: NamedTempFile) -> io::Result<Self> {
        let temp = file.into_temp_path();
        let path =
            Utf8PathBuf::try_from(temp.to_path_buf()).map_err(FromPathBufError::into_io_error)?;
        Ok(Self { path, temp })
    }

    /// Store `bytes` in a new temporary resource.
    pub fn from_bytes(file_name: Option<&str>, bytes: &[u8]) -> io::Result<Self> {
        let mut file = Self::staging(file_name)?;
        file.write_all(bytes)?;
        file.flush()?;
        Self::from_temp_file(file)
    }

    /// Location of the temporary file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Delete the temporary file now, reporting any failure.
    pub fn close(self) -> io::Result<()> {
        self.temp.close()
    }
}

/// Copies the resource behind a URL to a local temporary file.
pub trait ResourceFetcher {
    /// Acquire `url`.
    fn fetch(&self, url: &str) -> Result<FetchedResource, TransportError>;
}

/// Errors raised while constructing an [`HttpFetcher`].
#[derive(Debug, Error)]
pub enum FetcherBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpFetcherConfig {
    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Fetcher for `http`, `https` and `file` URLs.
///
/// Owns a Tokio runtime reused across calls. Inside an existing
/// multi-threaded runtime the caller's handle is used with
/// [`tokio::task::block_in_place`] instead.
pub struct HttpFetcher {
    client: Client,
    config: HttpFetcherConfig,
    runtime: Runtime,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl HttpFetcher {
    /// Create a fetcher with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn new() -> Result<Self, FetcherBuildError> {
        Self::with_config(HttpFetcherConfig::default())
    }

    /// Create a fetcher with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn with_config(config: HttpFetcherConfig) -> Result<Self, FetcherBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(FetcherBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(FetcherBuildError::Runtime)?;
        Ok(Self {
            client,
            config,
            runtime,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &HttpFetcherConfig {
        &self.config
    }

    async fn download(&self, url: &str, file_name: Option<&str>) -> Result<FetchedResource, TransportError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?
            .error_for_status()
            .map_err(|err| convert_reqwest_error(err, url))?;

        let storage = |source| TransportError::Storage {
            url: url.to_owned(),
            source,
        };
        let mut staging = FetchedResource::staging(file_name).map_err(storage)?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?
        {
            staging.write_all(&chunk).map_err(storage)?;
        }
        staging.flush().map_err(storage)?;
        FetchedResource::from_temp_file(staging).map_err(storage)
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedResource, TransportError> {
        let parsed = Url::parse(url).map_err(|err| TransportError::InvalidUrl {
            url: url.to_owned(),
            message: err.to_string(),
        })?;
        let file_name = last_segment(&parsed);
        match parsed.scheme() {
            "file" => copy_local(url, &parsed, file_name.as_deref()),
            "http" | "https" => {
                let future = self.download(url, file_name.as_deref());
                match Handle::try_current() {
                    Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                        tokio::task::block_in_place(|| handle.block_on(future))
                    }
                    _ => self.runtime.block_on(future),
                }
            }
            other => Err(TransportError::InvalidUrl {
                url: url.to_owned(),
                message: format!("unsupported scheme `{other}`"),
            }),
        }
    }
}

fn last_segment(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
}

fn copy_local(url: &str, parsed: &Url, file_name: Option<&str>) -> Result<FetchedResource, TransportError> {
    let path = parsed
        .to_file_path()
        .ok()
        .and_then(|path| Utf8PathBuf::try_from(path).ok())
        .ok_or_else(|| TransportError::InvalidUrl {
            url: url.to_owned(),
            message: "not a local UTF-8 path".to_owned(),
        })?;
    let local = |source| TransportError::Local {
        path: path.clone(),
        source,
    };
    let mut source = openbounds_fs::open_utf8_file(&path).map_err(local)?;
    let storage = |source| TransportError::Storage {
        url: url.to_owned(),
        source,
    };
    let mut staging = FetchedResource::staging(file_name).map_err(storage)?;
    io::copy(&mut source, &mut staging).map_err(local)?;
    staging.flush().map_err(storage)?;
    FetchedResource::from_temp_file(staging).map_err(storage)
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::fs;
    use tempfile::TempDir;

    #[fixture]
    fn fetcher() -> HttpFetcher {
        HttpFetcher::new().expect("fetcher should build")
    }

    #[rstest]
    fn staging_keeps_sanitised_file_name() {
        let resource =
            FetchedResource::from_bytes(Some("parcels v2.zip"), b"PK").expect("resource");
        let name = resource.path().file_name().expect("file name");
        assert!(name.starts_with(TEMP_PREFIX));
        assert!(name.ends_with("-parcelsv2.zip"), "unexpected name {name}");
    }

    #[rstest]
    fn dropping_a_resource_deletes_it() {
        let resource = FetchedResource::from_bytes(None, b"{}").expect("resource");
        let path = resource.path().to_owned();
        assert!(path.exists());
        drop(resource);
        assert!(!path.exists());
    }

    #[rstest]
    fn copies_file_urls(fetcher: HttpFetcher) {
        let dir = TempDir::new().expect("temp dir");
        let source = dir.path().join("lands.geojson");
        fs::write(&source, br#"{"type":"FeatureCollection","features":[]}"#).expect("write");
        let url = Url::from_file_path(&source).expect("file url");

        let resource = fetcher.fetch(url.as_str()).expect("fetch");
        assert!(resource.path().as_str().ends_with("-lands.geojson"));
        let copied = fs::read(resource.path()).expect("read copy");
        assert_eq!(copied, fs::read(&source).expect("read source"));
    }

    #[rstest]
    fn missing_local_files_are_reported(fetcher: HttpFetcher) {
        let dir = TempDir::new().expect("temp dir");
        let url = Url::from_file_path(dir.path().join("absent.geojson")).expect("file url");
        let err = fetcher.fetch(url.as_str()).expect_err("missing file");
        assert!(matches!(err, TransportError::Local { .. }), "unexpected {err:?}");
    }

    #[rstest]
    #[case("not a url")]
    #[case("ftp://example.org/lands.zip")]
    fn rejects_unsupported_urls(fetcher: HttpFetcher, #[case] url: &str) {
        let err = fetcher.fetch(url).expect_err("unsupported url");
        assert!(matches!(err, TransportError::InvalidUrl { .. }), "unexpected {err:?}");
    }

    #[rstest]
    fn last_segment_ignores_query_strings() {
        let url = Url::parse("https://example.org/data/parcels.zip?v=2#top").expect("url");
        assert_eq!(last_segment(&url).as_deref(), Some("parcels.zip"));
        let bare = Url::parse("https://example.org/").expect("url");
        assert_eq!(last_segment(&bare), None);
    }
}
