use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::episode::{Episode, EpisodeId};
use crate::error::CacheError;

/// Sidecar metadata written next to each cached audio file.
///
/// Lets the cache be inspected (and re-associated with feed episodes) without
/// re-fetching the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub episode_id: EpisodeId,
    pub title: String,
    pub original_url: String,
    pub downloaded_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub audio_filename: String,
    pub content_hash: String,
}

impl DownloadRecord {
    /// Create a record for an episode downloaded just now
    pub fn new(episode: &Episode, audio_filename: &str, content_hash: &str) -> Self {
        Self {
            episode_id: episode.id.clone(),
            title: episode.title.clone(),
            original_url: episode.enclosure.url.to_string(),
            downloaded_at: Utc::now().to_rfc3339(),
            duration: episode.duration.clone(),
            audio_filename: audio_filename.to_string(),
            content_hash: content_hash.to_string(),
        }
    }

    /// Parse the recorded download timestamp
    pub fn downloaded_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.downloaded_at).ok()
    }
}

/// Write a download record to a JSON file
pub fn write_record(record: &DownloadRecord, path: &Path) -> Result<(), CacheError> {
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json).map_err(|e| CacheError::RecordWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read a download record from a JSON file
pub fn read_record(path: &Path) -> Result<DownloadRecord, CacheError> {
    let content = std::fs::read_to_string(path).map_err(|e| CacheError::RecordReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| CacheError::RecordParseFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::Enclosure;
    use tempfile::tempdir;
    use url::Url;

    fn make_episode() -> Episode {
        Episode {
            id: EpisodeId::from("test-guid-123"),
            title: "EP042: Test Episode".to_string(),
            description: Some("A test episode".to_string()),
            pub_date: None,
            enclosure: Enclosure {
                url: Url::parse("https://example.com/episode.mp3").unwrap(),
                length: Some(1234567),
                mime_type: Some("audio/mpeg".to_string()),
            },
            duration: Some("30:00".to_string()),
            number: Some(42),
        }
    }

    #[test]
    fn record_captures_episode_fields() {
        let record = DownloadRecord::new(&make_episode(), "ep042-test.mp3", "sha256:abc123");

        assert_eq!(record.episode_id.as_str(), "test-guid-123");
        assert_eq!(record.title, "EP042: Test Episode");
        assert_eq!(record.original_url, "https://example.com/episode.mp3");
        assert_eq!(record.duration, Some("30:00".to_string()));
        assert_eq!(record.audio_filename, "ep042-test.mp3");
        assert_eq!(record.content_hash, "sha256:abc123");
        assert!(record.downloaded_at().is_some());
    }

    #[test]
    fn write_and_read_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("episode.json");

        let record = DownloadRecord::new(&make_episode(), "test.mp3", "sha256:abc123");
        write_record(&record, &path).unwrap();
        let read_back = read_record(&path).unwrap();

        assert_eq!(read_back.episode_id, record.episode_id);
        assert_eq!(read_back.audio_filename, "test.mp3");
        assert_eq!(read_back.content_hash, "sha256:abc123");
    }

    #[test]
    fn read_nonexistent_returns_error() {
        let dir = tempdir().unwrap();
        let result = read_record(&dir.path().join("nonexistent.json"));
        assert!(result.is_err());
    }
}
