use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::episode::{Episode, EpisodeId};
use crate::error::PlayerError;

/// Capacity of the position tick channel; a lagged subscriber drops old ticks
const TICK_CAPACITY: usize = 16;

/// Periodic position report, broadcast to all subscribers while the ticker
/// runs. The final tick of an episode carries `playing: false`.
#[derive(Debug, Clone)]
pub struct PositionTick {
    pub episode_id: EpisodeId,
    pub position: Duration,
    pub playing: bool,
}

/// The loaded episode plus the state needed to derive the current position
/// from a monotonic clock
struct ActiveEpisode {
    episode: Episode,
    /// Position accumulated up to `resumed_at` (or the full position while
    /// paused)
    base: Duration,
    /// Set while playing; elapsed time since this instant is added to `base`
    resumed_at: Option<Instant>,
}

impl ActiveEpisode {
    fn position(&self) -> Duration {
        let raw = match self.resumed_at {
            Some(at) => self.base + at.elapsed(),
            None => self.base,
        };
        match self.episode.duration_secs() {
            Some(secs) => raw.min(Duration::from_secs(secs)),
            None => raw,
        }
    }

    fn is_playing(&self) -> bool {
        self.resumed_at.is_some()
    }

    /// True once the position clock has run past the published duration
    fn finished(&self) -> bool {
        self.episode
            .duration_secs()
            .is_some_and(|secs| self.position() >= Duration::from_secs(secs))
    }
}

struct SessionInner {
    active: RwLock<Option<ActiveEpisode>>,
    tick_tx: broadcast::Sender<PositionTick>,
}

/// The playback session: at most one active episode, a playing/paused flag,
/// and a position counter driven by a monotonic clock.
///
/// Audio output itself is an external collaborator; the session models the
/// observable state that panels and the notification surface render.
///
/// Cloning shares the session. Construct one in `main` and pass it to the
/// components that need it; there is no global instance.
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<SessionInner>,
}

impl PlaybackSession {
    pub fn new() -> Self {
        let (tick_tx, _) = broadcast::channel(TICK_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                active: RwLock::new(None),
                tick_tx,
            }),
        }
    }

    /// Begin playback of `episode`.
    ///
    /// If `episode` is already the active one and its position is past zero,
    /// this resumes where it left off. Otherwise the session retargets:
    /// the previous episode (if any) ceases to be active, the position
    /// resets to zero, and playback starts from the beginning.
    pub async fn start(&self, episode: &Episode) {
        let mut active = self.inner.active.write().await;

        if let Some(current) = active.as_mut()
            && current.episode.id == episode.id
            && current.position() > Duration::ZERO
        {
            if current.resumed_at.is_none() {
                debug!(episode = %episode.id, "resuming active episode");
                current.resumed_at = Some(Instant::now());
            }
            return;
        }

        debug!(episode = %episode.id, "starting episode");
        *active = Some(ActiveEpisode {
            episode: episode.clone(),
            base: Duration::ZERO,
            resumed_at: Some(Instant::now()),
        });
    }

    /// Re-enter the playing state on the active episode
    pub async fn resume(&self) -> Result<(), PlayerError> {
        let mut active = self.inner.active.write().await;
        let current = active.as_mut().ok_or(PlayerError::NoActiveEpisode)?;

        if current.resumed_at.is_none() {
            debug!(episode = %current.episode.id, "resuming");
            current.resumed_at = Some(Instant::now());
        }
        Ok(())
    }

    /// Leave the playing state; the position freezes where it is.
    /// A no-op when nothing is loaded or already paused.
    pub async fn pause(&self) {
        let mut active = self.inner.active.write().await;
        if let Some(current) = active.as_mut()
            && current.resumed_at.is_some()
        {
            current.base = current.position();
            current.resumed_at = None;
            debug!(episode = %current.episode.id, position = ?current.base, "paused");
        }
    }

    /// Reposition within the active episode, clamped to its duration when
    /// the feed published one
    pub async fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        let mut active = self.inner.active.write().await;
        let current = active.as_mut().ok_or(PlayerError::NoActiveEpisode)?;

        let clamped = match current.episode.duration_secs() {
            Some(secs) => position.min(Duration::from_secs(secs)),
            None => position,
        };

        current.base = clamped;
        if current.resumed_at.is_some() {
            current.resumed_at = Some(Instant::now());
        }
        debug!(episode = %current.episode.id, position = ?clamped, "seeked");
        Ok(())
    }

    /// Current position within the active episode; zero when nothing is
    /// loaded
    pub async fn position(&self) -> Duration {
        self.inner
            .active
            .read()
            .await
            .as_ref()
            .map(|a| a.position())
            .unwrap_or(Duration::ZERO)
    }

    pub async fn is_playing(&self) -> bool {
        self.inner
            .active
            .read()
            .await
            .as_ref()
            .is_some_and(|a| a.is_playing())
    }

    /// True iff `id` is the active episode and it is currently playing
    pub async fn is_playing_episode(&self, id: &EpisodeId) -> bool {
        self.inner
            .active
            .read()
            .await
            .as_ref()
            .is_some_and(|a| a.episode.id == *id && a.is_playing())
    }

    /// True iff `id` is the active episode, playing or paused
    pub async fn is_active_episode(&self, id: &EpisodeId) -> bool {
        self.inner
            .active
            .read()
            .await
            .as_ref()
            .is_some_and(|a| a.episode.id == *id)
    }

    /// The active episode, playing or paused
    pub async fn active_episode(&self) -> Option<Episode> {
        self.inner
            .active
            .read()
            .await
            .as_ref()
            .map(|a| a.episode.clone())
    }

    /// Subscribe to position ticks. Every subscriber sees every tick;
    /// unsubscribing is dropping the receiver.
    pub fn subscribe_position(&self) -> broadcast::Receiver<PositionTick> {
        self.inner.tick_tx.subscribe()
    }

    /// Spawn the ticker task: samples the position at `interval` while
    /// playing and broadcasts a `PositionTick` to all subscribers.
    ///
    /// When the position reaches the published duration the session
    /// auto-pauses and a final tick with `playing: false` goes out. The task
    /// holds only a weak reference and exits once every session handle has
    /// been dropped.
    pub fn spawn_ticker(&self, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let Some(inner) = weak.upgrade() else {
                    debug!("session dropped, ticker exiting");
                    break;
                };

                let mut active = inner.active.write().await;
                let Some(current) = active.as_mut() else {
                    continue;
                };
                if !current.is_playing() {
                    continue;
                }

                if current.finished() {
                    current.base = current.position();
                    current.resumed_at = None;
                    debug!(episode = %current.episode.id, "episode finished");
                }

                let tick = PositionTick {
                    episode_id: current.episode.id.clone(),
                    position: current.position(),
                    playing: current.is_playing(),
                };
                drop(active);

                let _ = inner.tick_tx.send(tick);
            }
        })
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new()
    }
}
