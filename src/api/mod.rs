//! Client for the remote fetch service.
//!
//! [`FetchService`] is the seam between the orchestration code and the
//! network; [`HttpService`] implements it over HTTP with `reqwest`.

mod disposition;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, future, stream};
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION};
use serde::{Deserialize, Serialize};

use crate::config::STATUS_MAX_CHARS;
use crate::error::{Error, Result};
use crate::model::{ClientId, OutputFormat, SearchResponse, VideoInfo};
use crate::progress::{ProgressStream, SseDecoder, decode_event_data};

pub use disposition::parse_filename;

/// Body of `POST /download`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    pub url: String,
    pub client_id: ClientId,
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct CancelRequest<'a> {
    client_id: &'a ClientId,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// A successfully fetched payload and the name it should be saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub filename: String,
    pub payload: Bytes,
}

/// Operations offered by the fetch service.
#[async_trait]
pub trait FetchService: Send + Sync {
    /// Searches for videos matching `query` (free text or a video URL).
    async fn search(&self, query: &str) -> Result<Vec<VideoInfo>>;

    /// Lists the service's trending videos.
    async fn trending(&self) -> Result<Vec<VideoInfo>>;

    /// Runs one download to completion and returns the payload.
    async fn download(&self, request: &DownloadRequest) -> Result<DownloadedFile>;

    /// Asks the server to stop work for `client_id`. Best effort.
    async fn cancel(&self, client_id: &ClientId) -> Result<()>;

    /// Subscribes to progress messages for `client_id`.
    ///
    /// The returned stream connects lazily; it must not delay the download
    /// request that follows it.
    fn progress(&self, client_id: &ClientId) -> ProgressStream;
}

/// Builds a configured HTTP client for service requests.
fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .build()
}

/// HTTP implementation of [`FetchService`].
#[derive(Debug, Clone)]
pub struct HttpService {
    http: reqwest::Client,
    base_url: String,
    status_max_chars: usize,
}

impl HttpService {
    /// Creates a client for the service rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self::with_client(build_http_client()?, base_url))
    }

    /// Creates a service client around an existing `reqwest::Client`.
    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            status_max_chars: STATUS_MAX_CHARS,
        }
    }

    /// Sets the maximum length of free-text progress statuses.
    #[must_use]
    pub const fn with_status_max_chars(mut self, chars: usize) -> Self {
        self.status_max_chars = chars;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Turns a non-success response into [`Error::Server`].
    async fn server_error(response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error);
        Error::server(status, message)
    }

    async fn fetch_listing(&self, request: reqwest::RequestBuilder) -> Result<Vec<VideoInfo>> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::server_error(response).await);
        }
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        body.results.ok_or_else(|| {
            Error::Search(
                body.error
                    .unwrap_or_else(|| "response has no results".to_string()),
            )
        })
    }
}

#[async_trait]
impl FetchService for HttpService {
    async fn search(&self, query: &str) -> Result<Vec<VideoInfo>> {
        log::debug!("Searching for {query:?}");
        self.fetch_listing(self.http.get(self.endpoint("/search")).query(&[("q", query)]))
            .await
    }

    async fn trending(&self) -> Result<Vec<VideoInfo>> {
        self.fetch_listing(self.http.get(self.endpoint("/trending")))
            .await
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadedFile> {
        let response = self
            .http
            .post(self.endpoint("/download"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::server_error(response).await);
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_filename)
            .unwrap_or_else(|| request.format.default_filename().to_string());
        let payload = response.bytes().await?;

        Ok(DownloadedFile { filename, payload })
    }

    async fn cancel(&self, client_id: &ClientId) -> Result<()> {
        self.http
            .post(self.endpoint("/cancel"))
            .json(&CancelRequest { client_id })
            .send()
            .await?;
        Ok(())
    }

    fn progress(&self, client_id: &ClientId) -> ProgressStream {
        let max_chars = self.status_max_chars;
        let id = client_id.clone();
        let connect = self
            .http
            .get(self.endpoint(&format!("/progress/{client_id}")))
            .header(ACCEPT, "text/event-stream")
            .send();

        let updates = stream::once(connect)
            .filter_map(move |res| {
                let id = id.clone();
                future::ready(match res {
                    Ok(response) if response.status().is_success() => {
                        Some(response.bytes_stream())
                    }
                    Ok(response) => {
                        log::debug!("Progress channel for {id} refused: {}", response.status());
                        None
                    }
                    Err(e) => {
                        log::debug!("Progress channel for {id} failed to open: {e}");
                        None
                    }
                })
            })
            .flatten()
            .take_while(|chunk| {
                if let Err(e) = chunk {
                    log::debug!("Progress channel closed: {e}");
                }
                future::ready(chunk.is_ok())
            })
            .filter_map(|chunk| future::ready(chunk.ok()))
            .scan(SseDecoder::new(), |decoder, chunk| {
                future::ready(Some(decoder.push(&chunk)))
            })
            .flat_map(stream::iter)
            .filter_map(move |data| future::ready(decode_event_data(&data, max_chars)));

        ProgressStream::new(updates.boxed())
    }
}
