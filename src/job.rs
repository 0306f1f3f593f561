//! Job controller: runs one download from request to saved file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::api::{DownloadRequest, DownloadedFile, FetchService};
use crate::error::{Error, Result};
use crate::fs::{FileSystem, TokioFileSystem, save_payload};
use crate::model::{ClientId, JobDescriptor};
use crate::progress::ProgressUpdate;

/// A payload that has been written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    /// Where the payload was written.
    pub path: PathBuf,
    /// Payload size in bytes.
    pub size: u64,
}

/// Runs single download jobs against a [`FetchService`] and saves the
/// payloads into a directory.
pub struct JobController<S: FetchService + ?Sized, F: FileSystem = TokioFileSystem> {
    service: Arc<S>,
    fs: F,
    download_dir: PathBuf,
    notifications: TaskTracker,
}

impl<S: FetchService + ?Sized + 'static> JobController<S, TokioFileSystem> {
    /// Creates a controller that saves with `tokio::fs`.
    #[must_use]
    pub fn new(service: Arc<S>, download_dir: impl Into<PathBuf>) -> Self {
        Self::with_fs(service, download_dir, TokioFileSystem)
    }
}

impl<S: FetchService + ?Sized + 'static, F: FileSystem> JobController<S, F> {
    /// Creates a controller with a custom file system implementation.
    #[must_use]
    pub fn with_fs(service: Arc<S>, download_dir: impl Into<PathBuf>, fs: F) -> Self {
        Self {
            service,
            fs,
            download_dir: download_dir.into(),
            notifications: TaskTracker::new(),
        }
    }

    /// Runs one job to a terminal result: [`fetch`](Self::fetch) followed by
    /// [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on cancellation, [`Error::Server`] for a
    /// non-success response, [`Error::Network`] if the request fails, or
    /// [`Error::Io`] if the payload cannot be saved.
    pub async fn run(
        &self,
        descriptor: &JobDescriptor,
        client_id: &ClientId,
        cancel: &CancellationToken,
        on_update: impl FnMut(ProgressUpdate) + Send,
    ) -> Result<SavedFile> {
        let file = self.fetch(descriptor, client_id, cancel, on_update).await?;
        self.save(descriptor, &file).await
    }

    /// Issues the download request and waits for it to settle.
    ///
    /// Progress messages for `client_id` are passed to `on_update` while the
    /// request is in flight. If `cancel` fires before the request settles this
    /// resolves to [`Error::Cancelled`] immediately, whatever the server
    /// later answers. The server is told to stop by a tracked background task;
    /// see [`flush_notifications`](Self::flush_notifications). The progress
    /// subscription is closed before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on cancellation, [`Error::Server`] for a
    /// non-success response, or [`Error::Network`] if the request fails.
    pub async fn fetch(
        &self,
        descriptor: &JobDescriptor,
        client_id: &ClientId,
        cancel: &CancellationToken,
        mut on_update: impl FnMut(ProgressUpdate) + Send,
    ) -> Result<DownloadedFile> {
        let request = DownloadRequest {
            url: descriptor.url().to_string(),
            client_id: client_id.clone(),
            format: descriptor.format(),
        };

        let mut progress = self.service.progress(client_id);
        let mut stream_open = true;

        let outcome = {
            let download = self.service.download(&request);
            tokio::pin!(download);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break Err(Error::Cancelled),
                    res = &mut download => break res,
                    update = progress.next(), if stream_open => match update {
                        Some(update) => on_update(update),
                        None => {
                            log::debug!("Progress stream for {client_id} ended");
                            stream_open = false;
                        }
                    },
                }
            }
        };
        drop(progress);

        if matches!(outcome, Err(Error::Cancelled)) {
            self.notify_cancel(client_id);
        }
        outcome
    }

    /// Writes a fetched payload into the download directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the payload cannot be saved.
    pub async fn save(
        &self,
        descriptor: &JobDescriptor,
        file: &DownloadedFile,
    ) -> Result<SavedFile> {
        let path =
            save_payload(&self.fs, &self.download_dir, &file.filename, &file.payload).await?;
        log::info!("Saved {} to {}", descriptor.title(), path.display());
        Ok(SavedFile {
            path,
            size: file.payload.len() as u64,
        })
    }

    /// Waits up to `timeout` for pending cancel notifications to reach the
    /// server. Notifications still in flight after that are left running.
    pub async fn flush_notifications(&self, timeout: Duration) {
        self.notifications.close();
        if tokio::time::timeout(timeout, self.notifications.wait())
            .await
            .is_err()
        {
            log::warn!(
                "{} cancel notification(s) still pending after {timeout:?}",
                self.notifications.len()
            );
        }
        self.notifications.reopen();
    }

    /// Tells the server to stop work for `client_id` without blocking the job.
    fn notify_cancel(&self, client_id: &ClientId) {
        let service = Arc::clone(&self.service);
        let client_id = client_id.clone();
        self.notifications.spawn(async move {
            if let Err(e) = service.cancel(&client_id).await {
                log::warn!("Cancel request for {client_id} failed: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::model::OutputFormat;
    use crate::testing::{MockService, Outcome, url, video};
    use tempfile::TempDir;

    fn descriptor(n: usize, format: OutputFormat) -> JobDescriptor {
        JobDescriptor::new(&video(n), format)
    }

    #[tokio::test]
    async fn success_saves_payload_and_closes_stream() {
        let dir = TempDir::new().unwrap();
        let (service, _cancels) =
            MockService::new(&[(url(1).as_str(), Outcome::Save("one.mp4", b"abc"))]);
        let service = Arc::new(service);
        let controller = JobController::new(Arc::clone(&service), dir.path());

        let saved = controller
            .run(
                &descriptor(1, OutputFormat::Mp4),
                &ClientId::from("c1"),
                &CancellationToken::new(),
                |_| {},
            )
            .await
            .unwrap();

        assert_eq!(saved.path, dir.path().join("one.mp4"));
        assert_eq!(saved.size, 3);
        assert_eq!(std::fs::read(&saved.path).unwrap(), b"abc");
        assert_eq!(service.streams_opened.load(Ordering::SeqCst), 1);
        assert_eq!(service.streams_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn request_carries_url_client_id_and_format() {
        let dir = TempDir::new().unwrap();
        let (service, _cancels) = MockService::new(&[]);
        let service = Arc::new(service);
        let controller = JobController::new(Arc::clone(&service), dir.path());

        controller
            .run(
                &descriptor(4, OutputFormat::Thumbnail),
                &ClientId::from("abc123"),
                &CancellationToken::new(),
                |_| {},
            )
            .await
            .unwrap();

        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, url(4));
        assert_eq!(requests[0].client_id.as_str(), "abc123");
        assert_eq!(requests[0].format, OutputFormat::Thumbnail);
    }

    #[tokio::test]
    async fn server_error_is_propagated() {
        let dir = TempDir::new().unwrap();
        let (service, _cancels) = MockService::new(&[(url(2).as_str(), Outcome::Fail(500, "boom"))]);
        let service = Arc::new(service);
        let controller = JobController::new(Arc::clone(&service), dir.path());

        let err = controller
            .run(
                &descriptor(2, OutputFormat::Mp4),
                &ClientId::generate(),
                &CancellationToken::new(),
                |_| {},
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Server { status: 500, ref message } if message == "boom"));
        assert_eq!(service.streams_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_before_settle_wins_over_success() {
        let dir = TempDir::new().unwrap();
        let (service, mut cancels) =
            MockService::new(&[(url(1).as_str(), Outcome::Save("one.mp4", b"abc"))]);
        let service = Arc::new(service);
        let controller = JobController::new(Arc::clone(&service), dir.path());

        let token = CancellationToken::new();
        token.cancel();
        let client_id = ClientId::from("cancel-me");
        let err = controller
            .run(&descriptor(1, OutputFormat::Mp4), &client_id, &token, |_| {})
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!dir.path().join("one.mp4").exists());
        assert_eq!(service.streams_closed.load(Ordering::SeqCst), 1);

        let notified = tokio::time::timeout(Duration::from_secs(1), cancels.recv())
            .await
            .unwrap();
        assert_eq!(notified, Some(client_id));
    }

    #[tokio::test]
    async fn cancel_abandons_hanging_request() {
        let dir = TempDir::new().unwrap();
        let (service, mut cancels) = MockService::new(&[(url(3).as_str(), Outcome::Hang)]);
        let service = Arc::new(service);
        let controller = JobController::new(Arc::clone(&service), dir.path());

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = controller
            .run(&descriptor(3, OutputFormat::Mp3), &ClientId::generate(), &token, |_| {})
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(cancels.recv().await.is_some());
        assert_eq!(service.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn flush_waits_for_cancel_notification() {
        let dir = TempDir::new().unwrap();
        let (service, mut cancels) = MockService::new(&[]);
        let controller = JobController::new(Arc::new(service), dir.path());

        let token = CancellationToken::new();
        token.cancel();
        let client_id = ClientId::from("late");
        let err = controller
            .run(&descriptor(1, OutputFormat::Mp4), &client_id, &token, |_| {})
            .await
            .unwrap_err();
        assert!(err.is_cancelled());

        controller.flush_notifications(Duration::from_secs(1)).await;
        assert_eq!(cancels.try_recv().ok(), Some(client_id));
    }

    #[tokio::test]
    async fn fetch_leaves_saving_to_the_caller() {
        let dir = TempDir::new().unwrap();
        let (service, _cancels) =
            MockService::new(&[(url(1).as_str(), Outcome::Save("one.mp4", b"abc"))]);
        let controller = JobController::new(Arc::new(service), dir.path());
        let descriptor = descriptor(1, OutputFormat::Mp4);

        let file = controller
            .fetch(&descriptor, &ClientId::generate(), &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(file.filename, "one.mp4");
        assert!(!dir.path().join("one.mp4").exists());

        let saved = controller.save(&descriptor, &file).await.unwrap();
        assert_eq!(saved.path, dir.path().join("one.mp4"));
    }

    /// A mock file system that records writes and can refuse them.
    struct MockFileSystem {
        files: Mutex<HashMap<PathBuf, Vec<u8>>>,
        fail_writes: bool,
    }

    impl MockFileSystem {
        fn new(fail_writes: bool) -> Self {
            Self {
                files: Mutex::new(HashMap::new()),
                fail_writes,
            }
        }
    }

    #[async_trait::async_trait]
    impl FileSystem for MockFileSystem {
        async fn file_exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }

        async fn create_dir_all(&self, _path: &Path) -> std::io::Result<()> {
            Ok(())
        }

        async fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
            if self.fail_writes {
                return Err(std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"));
            }
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), contents.to_vec());
            Ok(())
        }

        async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()> {
            let mut files = self.files.lock().unwrap();
            let contents = files
                .remove(from)
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))?;
            files.insert(to.to_path_buf(), contents);
            Ok(())
        }

        async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
            self.files.lock().unwrap().remove(path);
            Ok(())
        }
    }

    #[tokio::test]
    async fn saves_through_custom_file_system() {
        let (service, _cancels) =
            MockService::new(&[(url(1).as_str(), Outcome::Save("one.mp4", b"abc"))]);
        let fs = MockFileSystem::new(false);
        fs.files
            .lock()
            .unwrap()
            .insert(PathBuf::from("out/one.mp4"), b"old".to_vec());
        let controller = JobController::with_fs(Arc::new(service), "out", fs);

        let saved = controller
            .run(
                &descriptor(1, OutputFormat::Mp4),
                &ClientId::generate(),
                &CancellationToken::new(),
                |_| {},
            )
            .await
            .unwrap();

        assert_eq!(saved.path, PathBuf::from("out/one (1).mp4"));
        let files = controller.fs.files.lock().unwrap();
        assert_eq!(files[&PathBuf::from("out/one.mp4")], b"old");
        assert_eq!(files[&saved.path], b"abc");
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn save_failure_is_an_io_error() {
        let (service, _cancels) = MockService::new(&[]);
        let controller = JobController::with_fs(Arc::new(service), "out", MockFileSystem::new(true));

        let err = controller
            .run(
                &descriptor(1, OutputFormat::Mp4),
                &ClientId::generate(),
                &CancellationToken::new(),
                |_| {},
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::StorageFull));
        assert!(controller.fs.files.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn progress_updates_reach_callback() {
        let dir = TempDir::new().unwrap();
        let (service, _cancels) = MockService::new(&[(url(1).as_str(), Outcome::SlowSave(30))]);
        let service = Arc::new(service.with_updates(vec![
            ProgressUpdate::Downloading(12.5),
            ProgressUpdate::Processing,
        ]));
        let controller = JobController::new(Arc::clone(&service), dir.path());

        let mut seen = Vec::new();
        let saved = controller
            .run(
                &descriptor(1, OutputFormat::Mp3),
                &ClientId::generate(),
                &CancellationToken::new(),
                |update| seen.push(update),
            )
            .await
            .unwrap();

        assert_eq!(
            seen,
            vec![ProgressUpdate::Downloading(12.5), ProgressUpdate::Processing]
        );
        assert_eq!(saved.path, dir.path().join("audio.mp3"));
    }
}
