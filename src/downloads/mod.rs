mod fetch;
mod record;

pub use fetch::{DownloadOutcome, download_to_cache};
pub use record::{DownloadRecord, read_record, write_record};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, warn};

use crate::episode::{Episode, EpisodeId, cache_filename, cache_filename_stem};
use crate::error::{CacheError, DownloadError};
use crate::events::{ClientEvent, EventRelay};
use crate::http::SharedHttpClient;

/// Observable state of an episode's download task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    NotStarted,
    InProgress,
    Complete,
}

/// Tracks per-episode download tasks and the on-disk cache.
///
/// Panels only observe the registry (`status`, `is_downloading`,
/// `is_downloaded`); downloads themselves run on spawned tasks that report
/// back through the event relay. Whether an episode is downloaded is decided
/// by the presence of its cache file, so the registry survives restarts
/// without a separate index.
pub struct DownloadRegistry {
    cache_dir: PathBuf,
    client: SharedHttpClient,
    relay: EventRelay,
    in_progress: Mutex<HashSet<EpisodeId>>,
}

impl DownloadRegistry {
    /// Open the registry on a cache directory, creating it if needed.
    ///
    /// Partial files from interrupted downloads are removed during the scan.
    pub fn open(
        cache_dir: impl Into<PathBuf>,
        client: SharedHttpClient,
        relay: EventRelay,
    ) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();
        let cleaned = scan_cache(&cache_dir)?;
        if cleaned > 0 {
            info!(count = cleaned, "removed partial files from cache");
        }

        Ok(Self {
            cache_dir,
            client,
            relay,
            in_progress: Mutex::new(HashSet::new()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path the episode's audio lands on once downloaded
    pub fn audio_path(&self, episode: &Episode) -> PathBuf {
        self.cache_dir.join(cache_filename(episode))
    }

    fn record_path(&self, episode: &Episode) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", cache_filename_stem(episode)))
    }

    pub fn is_downloading(&self, id: &EpisodeId) -> bool {
        self.in_progress.lock().unwrap().contains(id)
    }

    pub fn is_downloaded(&self, episode: &Episode) -> bool {
        self.audio_path(episode).exists()
    }

    pub fn status(&self, episode: &Episode) -> DownloadStatus {
        if self.is_downloading(&episode.id) {
            DownloadStatus::InProgress
        } else if self.is_downloaded(episode) {
            DownloadStatus::Complete
        } else {
            DownloadStatus::NotStarted
        }
    }

    /// When the episode was downloaded, from its sidecar record
    pub fn downloaded_at(&self, episode: &Episode) -> Option<DateTime<FixedOffset>> {
        read_record(&self.record_path(episode))
            .ok()
            .and_then(|record| record.downloaded_at())
    }

    /// Start downloading an episode on a background task.
    ///
    /// Returns false without doing anything when the episode is already
    /// downloaded or a download for it is in flight. Completion or failure
    /// is published on the event relay.
    pub fn start_download(self: &Arc<Self>, episode: &Episode) -> bool {
        if self.is_downloaded(episode) {
            debug!(episode = %episode.id, "already cached, not downloading");
            return false;
        }

        {
            let mut in_progress = self.in_progress.lock().unwrap();
            if !in_progress.insert(episode.id.clone()) {
                debug!(episode = %episode.id, "download already in flight");
                return false;
            }
        }

        let registry = Arc::clone(self);
        let episode = episode.clone();

        tokio::spawn(async move {
            info!(episode = %episode.id, url = %episode.enclosure.url, "download starting");
            let result = registry.run_download(&episode).await;

            registry.in_progress.lock().unwrap().remove(&episode.id);

            match result {
                Ok(outcome) => {
                    info!(episode = %episode.id, bytes = outcome.bytes, "download complete");
                    registry.relay.publish(ClientEvent::DownloadComplete {
                        episode_id: episode.id.clone(),
                    });
                }
                Err(e) => {
                    warn!(episode = %episode.id, error = %e, "download failed");
                    registry.relay.publish(ClientEvent::DownloadFailed {
                        episode_id: episode.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        });

        true
    }

    async fn run_download(&self, episode: &Episode) -> Result<DownloadOutcome, DownloadError> {
        let audio_path = self.audio_path(episode);
        let outcome =
            download_to_cache(self.client.as_ref(), episode, &audio_path, &self.relay).await?;

        let filename = cache_filename(episode);
        let record = DownloadRecord::new(episode, &filename, &outcome.content_hash);
        write_record(&record, &self.record_path(episode)).map_err(DownloadError::Cache)?;

        Ok(outcome)
    }

    /// Remove the cached audio and its sidecar record.
    /// A no-op for episodes that were never downloaded.
    pub fn clear_cache(&self, episode: &Episode) -> Result<(), CacheError> {
        for path in [self.audio_path(episode), self.record_path(episode)] {
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| CacheError::RemoveFailed {
                    path: path.clone(),
                    source: e,
                })?;
            }
        }
        debug!(episode = %episode.id, "cache cleared");
        Ok(())
    }
}

/// Scan the cache directory, creating it if missing and removing `.partial`
/// files from interrupted downloads. Returns the number of files removed.
fn scan_cache(cache_dir: &Path) -> Result<usize, CacheError> {
    if !cache_dir.exists() {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::CreateDirectoryFailed {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;
        return Ok(0);
    }

    let entries = std::fs::read_dir(cache_dir).map_err(|e| CacheError::ReadDirectoryFailed {
        path: cache_dir.to_path_buf(),
        source: e,
    })?;

    let mut cleaned = 0;
    for entry in entries {
        let entry = entry.map_err(|e| CacheError::ReadDirectoryFailed {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "partial") && std::fs::remove_file(&path).is_ok()
        {
            cleaned += 1;
        }
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::Enclosure;
    use crate::http::{ByteStream, HttpResponse};
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::tempdir;
    use url::Url;

    struct MockHttpClient {
        response_data: Vec<u8>,
        status: u16,
    }

    #[async_trait]
    impl crate::http::HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from(self.response_data.clone()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let data = self.response_data.clone();
            let len = data.len() as u64;

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status: self.status,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    /// A client whose streams never produce data, keeping downloads in
    /// flight for as long as the test needs
    struct StalledHttpClient;

    #[async_trait]
    impl crate::http::HttpClient for StalledHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            futures::future::pending().await
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            futures::future::pending().await
        }
    }

    fn make_episode(id: &str) -> Episode {
        Episode {
            id: EpisodeId::from(id),
            title: format!("EP001: {}", id),
            description: None,
            pub_date: None,
            enclosure: Enclosure {
                url: Url::parse("https://example.com/episode.mp3").unwrap(),
                length: None,
                mime_type: Some("audio/mpeg".to_string()),
            },
            duration: Some("30:00".to_string()),
            number: Some(1),
        }
    }

    fn make_registry(dir: &Path, client: SharedHttpClient) -> (Arc<DownloadRegistry>, EventRelay) {
        let relay = EventRelay::new();
        let registry = Arc::new(DownloadRegistry::open(dir, client, relay.clone()).unwrap());
        (registry, relay)
    }

    #[tokio::test]
    async fn download_completes_and_writes_record() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient {
            response_data: b"fake audio".to_vec(),
            status: 200,
        });
        let (registry, relay) = make_registry(dir.path(), client);
        let mut rx = relay.subscribe();

        let episode = make_episode("ep-1");
        assert_eq!(registry.status(&episode), DownloadStatus::NotStarted);
        assert!(registry.start_download(&episode));

        // Drain progress until the completion event
        loop {
            match rx.recv().await.unwrap() {
                ClientEvent::DownloadComplete { episode_id } => {
                    assert_eq!(episode_id, episode.id);
                    break;
                }
                ClientEvent::DownloadProgress { .. } => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }

        assert_eq!(registry.status(&episode), DownloadStatus::Complete);
        assert!(registry.is_downloaded(&episode));
        assert!(registry.downloaded_at(&episode).is_some());
    }

    #[tokio::test]
    async fn duplicate_start_is_a_noop_while_in_flight() {
        let dir = tempdir().unwrap();
        let (registry, _relay) = make_registry(dir.path(), Arc::new(StalledHttpClient));

        let episode = make_episode("ep-1");
        assert!(registry.start_download(&episode));
        assert!(!registry.start_download(&episode));
        assert!(registry.is_downloading(&episode.id));
        assert_eq!(registry.status(&episode), DownloadStatus::InProgress);
    }

    #[tokio::test]
    async fn start_is_a_noop_when_already_downloaded() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient {
            response_data: b"fake audio".to_vec(),
            status: 200,
        });
        let (registry, relay) = make_registry(dir.path(), client);
        let mut rx = relay.subscribe();

        let episode = make_episode("ep-1");
        registry.start_download(&episode);
        loop {
            if let ClientEvent::DownloadComplete { .. } = rx.recv().await.unwrap() {
                break;
            }
        }

        assert!(!registry.start_download(&episode));
    }

    #[tokio::test]
    async fn failed_download_publishes_failure_and_leaves_no_file() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient {
            response_data: b"Not Found".to_vec(),
            status: 404,
        });
        let (registry, relay) = make_registry(dir.path(), client);
        let mut rx = relay.subscribe();

        let episode = make_episode("ep-1");
        assert!(registry.start_download(&episode));

        match rx.recv().await.unwrap() {
            ClientEvent::DownloadFailed { episode_id, error } => {
                assert_eq!(episode_id, episode.id);
                assert!(error.contains("404"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        assert!(!registry.is_downloaded(&episode));
        assert!(!registry.is_downloading(&episode.id));
        assert_eq!(registry.status(&episode), DownloadStatus::NotStarted);
    }

    #[tokio::test]
    async fn clear_cache_removes_audio_and_record() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient {
            response_data: b"fake audio".to_vec(),
            status: 200,
        });
        let (registry, relay) = make_registry(dir.path(), client);
        let mut rx = relay.subscribe();

        let episode = make_episode("ep-1");
        registry.start_download(&episode);
        loop {
            if let ClientEvent::DownloadComplete { .. } = rx.recv().await.unwrap() {
                break;
            }
        }
        assert!(registry.is_downloaded(&episode));

        registry.clear_cache(&episode).unwrap();

        assert!(!registry.is_downloaded(&episode));
        assert!(registry.downloaded_at(&episode).is_none());
        assert_eq!(registry.status(&episode), DownloadStatus::NotStarted);
    }

    #[tokio::test]
    async fn clear_cache_tolerates_nothing_cached() {
        let dir = tempdir().unwrap();
        let (registry, _relay) = make_registry(dir.path(), Arc::new(StalledHttpClient));

        registry.clear_cache(&make_episode("ep-1")).unwrap();
    }

    #[test]
    fn open_creates_cache_dir_and_cleans_partials() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::write(cache_dir.join("ep001-stale.mp3.partial"), b"junk").unwrap();
        std::fs::write(cache_dir.join("ep002-done.mp3"), b"audio").unwrap();

        let relay = EventRelay::new();
        let registry =
            DownloadRegistry::open(&cache_dir, Arc::new(StalledHttpClient), relay).unwrap();

        assert!(!cache_dir.join("ep001-stale.mp3.partial").exists());
        assert!(cache_dir.join("ep002-done.mp3").exists());
        assert_eq!(registry.cache_dir(), cache_dir);
    }
}
