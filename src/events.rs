use tokio::sync::broadcast;

use crate::episode::EpisodeId;

/// Default relay capacity; a lagged receiver drops the oldest events
const RELAY_CAPACITY: usize = 64;

/// Events distributed to interested panels and the client loop.
///
/// Download events carry the episode id so receivers can ignore events for
/// episodes they are not bound to. Pause/resume requests arrive from remote
/// controls (the notification surface, headset buttons) and carry no target:
/// they always apply to the active episode.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A background download finished and the cache file is in place
    DownloadComplete { episode_id: EpisodeId },

    /// Streaming progress for an in-flight download
    DownloadProgress {
        episode_id: EpisodeId,
        received: u64,
        total: Option<u64>,
    },

    /// A download failed; no cache file was left behind
    DownloadFailed { episode_id: EpisodeId, error: String },

    /// Remote control asked to pause the active episode
    PauseRequested,

    /// Remote control asked to resume the active episode
    ResumeRequested,
}

/// Typed publish/subscribe channel connecting background tasks to UI panels.
///
/// Cloning shares the underlying channel. Delivery is best-effort:
/// `publish` never blocks and publishing with no live subscribers is not an
/// error. Unsubscribing is dropping the receiver.
#[derive(Debug, Clone)]
pub struct EventRelay {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventRelay {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(RELAY_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: ClientEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }

    /// Subscribe to all events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new()
    }
}
