use std::sync::Arc;

use crate::episode::EpisodeId;

/// Snapshot of playback state, pushed to the notification surface whenever
/// play/pause/seek/position changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub episode_id: EpisodeId,
    /// Display title (number prefix already stripped)
    pub title: String,
    pub position_secs: u64,
    /// Duration in seconds, if the feed published one
    pub duration_secs: Option<u64>,
    pub playing: bool,
}

/// Trait for the system notification surface.
///
/// The panel pushes `NowPlaying` snapshots through this; how they are
/// rendered (status line, desktop notification, nothing) is the
/// implementor's business.
pub trait PlaybackNotifier: Send + Sync {
    /// Display the given playback state
    fn notify(&self, status: NowPlaying);

    /// Remove any displayed notification
    fn clear(&self) {}
}

/// A shared reference to a playback notifier
pub type SharedPlaybackNotifier = Arc<dyn PlaybackNotifier>;

/// A notifier that silently drops all updates.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl PlaybackNotifier for NoopNotifier {
    fn notify(&self, _status: NowPlaying) {
        // Intentionally empty
    }
}

impl NoopNotifier {
    /// Create a new NoopNotifier wrapped in an Arc
    pub fn shared() -> SharedPlaybackNotifier {
        Arc::new(Self)
    }
}
