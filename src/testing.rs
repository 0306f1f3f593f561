//! Test doubles shared by the job and batch tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::api::{DownloadRequest, DownloadedFile, FetchService};
use crate::error::{Error, Result};
use crate::model::{ClientId, OutputFormat, VideoInfo};
use crate::progress::{ProgressStream, ProgressUpdate};

/// How the mock answers a download for a given URL.
#[derive(Debug, Clone)]
pub enum Outcome {
    Save(&'static str, &'static [u8]),
    Fail(u16, &'static str),
    /// Succeeds with the default payload after the given number of milliseconds.
    SlowSave(u64),
    Hang,
}

/// Decrements a counter when dropped, so abandoned futures are accounted for.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Counts progress streams that have been dropped.
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockService {
    outcomes: HashMap<String, Outcome>,
    updates: Vec<ProgressUpdate>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub requests: Mutex<Vec<DownloadRequest>>,
    pub streams_opened: AtomicUsize,
    pub streams_closed: Arc<AtomicUsize>,
    cancel_tx: mpsc::UnboundedSender<ClientId>,
}

impl MockService {
    pub fn new(outcomes: &[(&str, Outcome)]) -> (Self, mpsc::UnboundedReceiver<ClientId>) {
        let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();
        let service = Self {
            outcomes: outcomes
                .iter()
                .map(|(url, outcome)| ((*url).to_string(), outcome.clone()))
                .collect(),
            updates: Vec::new(),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            streams_opened: AtomicUsize::new(0),
            streams_closed: Arc::new(AtomicUsize::new(0)),
            cancel_tx,
        };
        (service, cancel_rx)
    }

    /// Every progress stream will yield these updates, then stay open.
    pub fn with_updates(mut self, updates: Vec<ProgressUpdate>) -> Self {
        self.updates = updates;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

pub fn video(n: usize) -> VideoInfo {
    VideoInfo {
        id: Some(format!("id{n}")),
        title: Some(format!("Video {n}")),
        url: format!("https://youtu.be/id{n}"),
        thumbnail: None,
        duration: None,
        uploader: None,
        view_count: None,
    }
}

pub fn url(n: usize) -> String {
    video(n).url
}

#[async_trait]
impl FetchService for MockService {
    async fn search(&self, _query: &str) -> Result<Vec<VideoInfo>> {
        Ok(vec![video(1)])
    }

    async fn trending(&self) -> Result<Vec<VideoInfo>> {
        Ok(Vec::new())
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadedFile> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(&self.active);
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        tokio::task::yield_now().await;

        match self.outcomes.get(&request.url).cloned() {
            Some(Outcome::Save(name, payload)) => Ok(DownloadedFile {
                filename: name.to_string(),
                payload: Bytes::from_static(payload),
            }),
            Some(Outcome::Fail(status, message)) => {
                Err(Error::server(status, Some(message.to_string())))
            }
            Some(Outcome::SlowSave(millis)) => {
                tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
                Ok(DownloadedFile {
                    filename: request.format.default_filename().to_string(),
                    payload: Bytes::from_static(b"slow payload"),
                })
            }
            Some(Outcome::Hang) => futures::future::pending().await,
            None => Ok(DownloadedFile {
                filename: OutputFormat::Mp4.default_filename().to_string(),
                payload: Bytes::from_static(b"payload"),
            }),
        }
    }

    async fn cancel(&self, client_id: &ClientId) -> Result<()> {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let _ = self.cancel_tx.send(client_id.clone());
        Ok(())
    }

    fn progress(&self, _client_id: &ClientId) -> ProgressStream {
        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        let counter = DropCounter(Arc::clone(&self.streams_closed));
        let updates = futures::stream::iter(self.updates.clone())
            .chain(futures::stream::pending())
            .map(move |update| {
                let _counter = &counter;
                update
            });
        ProgressStream::new(updates.boxed())
    }
}
