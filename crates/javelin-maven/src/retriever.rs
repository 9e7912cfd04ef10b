//! Artifact retrieval: HTTP with retries and local filesystem fallback.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use thiserror::Error;

use crate::repository::Credentials;

const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Outcome of a failed retrieval, branched on by repository-walking callers.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// The URL does not exist in this repository.
    #[error("not found")]
    NotFound,
    /// The repository rejected the credentials.
    #[error("unauthorized")]
    Unauthorized,
    /// Transport-level failure after retries were exhausted.
    #[error("{0}")]
    Network(String),
}

/// Fetches a URL's bytes on behalf of the resolver.
///
/// There is no process-wide default instance; callers construct an
/// [`HttpRetriever`] (or a test stub) and pass it explicitly.
pub trait ArtifactRetriever {
    /// Fetch the bytes at `url`, authenticating when credentials are given.
    fn retrieve(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<u8>, RetrieveError>;

    /// Fetch a metadata document.
    ///
    /// Like [`retrieve`](Self::retrieve), but implementations may cache
    /// negative lookups for their lifetime so that repeated resolution steps
    /// do not re-poll repositories known to lack the artifact.
    fn retrieve_metadata(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<u8>, RetrieveError> {
        self.retrieve(url, credentials)
    }

    /// Fetch a URL and decode it as UTF-8 text.
    fn retrieve_text(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<String, RetrieveError> {
        self.retrieve(url, credentials)
            .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
    }
}

/// Timeouts for the default retriever.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
        }
    }
}

/// The default retriever: blocking HTTP for remote URLs, direct reads for
/// `file:` URLs and bare paths. Scoped to one resolution run so its
/// negative-lookup cache never goes stale across runs.
pub struct HttpRetriever {
    client: Client,
    /// Metadata URLs that returned NotFound during this run.
    negative: Mutex<HashSet<String>>,
}

impl HttpRetriever {
    pub fn new() -> miette::Result<Self> {
        Self::with_config(RetrieverConfig::default())
    }

    pub fn with_config(config: RetrieverConfig) -> miette::Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .user_agent(concat!("javelin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| javelin_util::errors::JavelinError::Network {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            negative: Mutex::new(HashSet::new()),
        })
    }

    fn retrieve_http(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<u8>, RetrieveError> {
        let mut last_err = String::new();

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                std::thread::sleep(RETRY_BACKOFF * 2u32.pow(attempt - 1));
            }

            let req = apply_auth(self.client.get(url), credentials);
            match req.send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
                        return Err(RetrieveError::NotFound);
                    }
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(RetrieveError::Unauthorized);
                    }
                    if status.is_server_error() {
                        last_err = format!("HTTP {status} from {url}");
                        continue;
                    }
                    if !status.is_success() {
                        return Err(RetrieveError::Network(format!(
                            "HTTP {status} fetching {url}"
                        )));
                    }
                    return resp
                        .bytes()
                        .map(|b| b.to_vec())
                        .map_err(|e| {
                            RetrieveError::Network(format!(
                                "Failed to read response from {url}: {e}"
                            ))
                        });
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_err = format!("{e}");
                    continue;
                }
                Err(e) => {
                    return Err(RetrieveError::Network(format!(
                        "Request to {url} failed: {e}"
                    )));
                }
            }
        }

        Err(RetrieveError::Network(format!(
            "Failed after {MAX_RETRIES} attempts for {url}: {last_err}"
        )))
    }

    fn retrieve_local(path: &PathBuf) -> Result<Vec<u8>, RetrieveError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RetrieveError::NotFound),
            Err(e) => Err(RetrieveError::Network(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}

impl ArtifactRetriever for HttpRetriever {
    fn retrieve(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<u8>, RetrieveError> {
        match local_path(url) {
            Some(path) => Self::retrieve_local(&path),
            None => self.retrieve_http(url, credentials),
        }
    }

    fn retrieve_metadata(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<u8>, RetrieveError> {
        if self.negative.lock().expect("poisoned").contains(url) {
            return Err(RetrieveError::NotFound);
        }
        let result = self.retrieve(url, credentials);
        if matches!(result, Err(RetrieveError::NotFound)) {
            self.negative
                .lock()
                .expect("poisoned")
                .insert(url.to_string());
        }
        result
    }
}

/// Interpret `file:` URLs and bare paths as local filesystem locations.
fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(rest) = url.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if let Some(rest) = url.strip_prefix("file:") {
        return Some(PathBuf::from(rest));
    }
    if !url.contains("://") {
        return Some(PathBuf::from(url));
    }
    None
}

/// Apply authentication to a request when credentials are configured.
///
/// A password without a username is sent as a bearer token.
fn apply_auth(request: RequestBuilder, credentials: Option<&Credentials>) -> RequestBuilder {
    match credentials {
        Some(Credentials {
            username: Some(user),
            password,
        }) => request.basic_auth(user, password.as_deref()),
        Some(Credentials {
            username: None,
            password: Some(token),
        }) => request.bearer_auth(token),
        _ => request,
    }
}
