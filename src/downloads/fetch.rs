use std::path::Path;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::episode::Episode;
use crate::error::DownloadError;
use crate::events::{ClientEvent, EventRelay};
use crate::http::HttpClient;

/// Result of a completed download
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// Number of bytes written to the cache file
    pub bytes: u64,
    /// Hash of the downloaded content ("sha256:<hex>")
    pub content_hash: String,
}

/// Stream an episode's enclosure into the cache.
///
/// The body is written to `<final_path>.partial` and renamed into place once
/// complete, so a crash mid-download never leaves a file that looks cached.
/// Progress is published on the relay as the stream advances. On failure the
/// partial file is removed.
pub async fn download_to_cache(
    client: &dyn HttpClient,
    episode: &Episode,
    final_path: &Path,
    relay: &EventRelay,
) -> Result<DownloadOutcome, DownloadError> {
    let partial_path = partial_path_for(final_path);

    let result = stream_to_partial(client, episode, &partial_path, relay).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial_path).await;
        return result;
    }

    tokio::fs::rename(&partial_path, final_path)
        .await
        .map_err(|e| DownloadError::FinalizeFailed {
            path: final_path.to_path_buf(),
            source: e,
        })?;

    result
}

fn partial_path_for(final_path: &Path) -> std::path::PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(".partial");
    std::path::PathBuf::from(name)
}

async fn stream_to_partial(
    client: &dyn HttpClient,
    episode: &Episode,
    partial_path: &Path,
    relay: &EventRelay,
) -> Result<DownloadOutcome, DownloadError> {
    let url = episode.enclosure.url.as_str();

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    let mut file =
        File::create(partial_path)
            .await
            .map_err(|e| DownloadError::FileCreateFailed {
                path: partial_path.to_path_buf(),
                source: e,
            })?;

    let mut hasher = Sha256::new();
    let mut received: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: partial_path.to_path_buf(),
                source: e,
            })?;

        hasher.update(&chunk);
        received += chunk.len() as u64;

        relay.publish(ClientEvent::DownloadProgress {
            episode_id: episode.id.clone(),
            received,
            total: response.content_length,
        });
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: partial_path.to_path_buf(),
            source: e,
        })?;

    Ok(DownloadOutcome {
        bytes: received,
        content_hash: format!("sha256:{:x}", hasher.finalize()),
    })
}
