use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::downloads::{DownloadRegistry, DownloadStatus};
use crate::episode::Episode;
use crate::error::{CacheError, PlayerError};
use crate::events::ClientEvent;
use crate::notify::{NowPlaying, SharedPlaybackNotifier};
use crate::player::{PlaybackSession, PositionTick};

/// The three-state download affordance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadButton {
    /// Tapping starts the download
    Download,
    /// Disabled while the download runs
    Downloading,
    /// Tapping clears the cached file
    Downloaded,
}

impl DownloadButton {
    pub fn enabled(&self) -> bool {
        !matches!(self, DownloadButton::Downloading)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DownloadButton::Download => "download",
            DownloadButton::Downloading => "downloading",
            DownloadButton::Downloaded => "clear cache",
        }
    }
}

/// Everything the front-end needs to render the panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    /// Display title, number prefix stripped
    pub title: String,
    /// Whether the play/pause toggle shows "playing"
    pub toggle_playing: bool,
    /// Cover overlay: hidden while this episode plays
    pub cover_overlay_visible: bool,
    /// Seek bar upper bound; zero when the feed published no duration
    pub seek_max_secs: u64,
    pub seek_position_secs: u64,
    /// Seeking only works while this episode is the active one
    pub seek_enabled: bool,
    pub download: DownloadButton,
}

/// UI composite bound to one episode at a time.
///
/// Derives its play/pause toggle, seek bar and download button from the
/// playback session and the download registry, and issues commands back to
/// them on interaction. Every playback change pushes a `NowPlaying` snapshot
/// through the notifier. The owning loop feeds it relay events and position
/// ticks; events addressed to other episodes leave the panel untouched.
pub struct EpisodeMediaPanel {
    episode: Episode,
    session: PlaybackSession,
    registry: Arc<DownloadRegistry>,
    notifier: SharedPlaybackNotifier,
    download: DownloadButton,
    /// This episode is the one loaded in the session (playing or paused)
    active: bool,
    playing: bool,
    position_secs: u64,
}

impl EpisodeMediaPanel {
    /// Bind a panel to an episode, deriving all sub-view state from the
    /// session and the registry
    pub async fn bind(
        episode: Episode,
        session: PlaybackSession,
        registry: Arc<DownloadRegistry>,
        notifier: SharedPlaybackNotifier,
    ) -> Self {
        let download = match registry.status(&episode) {
            DownloadStatus::NotStarted => DownloadButton::Download,
            DownloadStatus::InProgress => DownloadButton::Downloading,
            DownloadStatus::Complete => DownloadButton::Downloaded,
        };

        let active = session.is_active_episode(&episode.id).await;
        let playing = session.is_playing_episode(&episode.id).await;
        let position_secs = if active {
            session.position().await.as_secs()
        } else {
            0
        };

        debug!(episode = %episode.id, active, playing, "panel bound");

        Self {
            episode,
            session,
            registry,
            notifier,
            download,
            active,
            playing,
            position_secs,
        }
    }

    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    pub fn view(&self) -> PanelView {
        PanelView {
            title: self.episode.display_title().to_string(),
            toggle_playing: self.playing,
            cover_overlay_visible: !self.playing,
            seek_max_secs: self.episode.duration_secs().unwrap_or(0),
            seek_position_secs: self.position_secs,
            seek_enabled: self.active,
            download: self.download,
        }
    }

    /// The play/pause toggle. Starting this episode while it is paused with
    /// a position past zero resumes; anything else (re)starts it.
    pub async fn toggle(&mut self) {
        if self.playing {
            self.session.pause().await;
            self.playing = false;
            self.position_secs = self.session.position().await.as_secs();
        } else {
            self.session.start(&self.episode).await;
            self.active = true;
            self.playing = true;
            self.position_secs = self.session.position().await.as_secs();
        }
        self.push_notification();
    }

    /// The download button. A no-op while disabled (downloading).
    pub fn press_download(&mut self) -> Result<(), CacheError> {
        match self.download {
            DownloadButton::Download => {
                if self.registry.start_download(&self.episode) {
                    self.download = DownloadButton::Downloading;
                } else if self.registry.is_downloaded(&self.episode) {
                    // Cached behind our back (e.g. a previous run)
                    self.download = DownloadButton::Downloaded;
                }
            }
            DownloadButton::Downloading => {}
            DownloadButton::Downloaded => {
                self.registry.clear_cache(&self.episode)?;
                self.download = DownloadButton::Download;
            }
        }
        Ok(())
    }

    /// Drag the seek bar. Only works while this episode is active.
    pub async fn seek_to(&mut self, position_secs: u64) -> Result<(), PlayerError> {
        if !self.active {
            return Err(PlayerError::NoActiveEpisode);
        }

        self.session
            .seek(Duration::from_secs(position_secs))
            .await?;
        self.position_secs = self.session.position().await.as_secs();
        self.push_notification();
        Ok(())
    }

    /// Apply a relay event. Download events for other episodes are compared
    /// and ignored.
    pub async fn handle_event(&mut self, event: &ClientEvent) {
        match event {
            ClientEvent::DownloadComplete { episode_id } if *episode_id == self.episode.id => {
                self.download = DownloadButton::Downloaded;
            }
            ClientEvent::DownloadFailed { episode_id, .. } if *episode_id == self.episode.id => {
                if self.download == DownloadButton::Downloading {
                    self.download = DownloadButton::Download;
                }
            }
            ClientEvent::PauseRequested => {
                self.session.pause().await;
                if self.playing {
                    self.playing = false;
                    self.position_secs = self.session.position().await.as_secs();
                    self.push_notification();
                }
            }
            ClientEvent::ResumeRequested => {
                if self.session.resume().await.is_ok() {
                    self.playing = self.session.is_playing_episode(&self.episode.id).await;
                    if self.playing {
                        self.push_notification();
                    }
                }
            }
            _ => {}
        }
    }

    /// Apply a position tick. A tick for another episode means the session
    /// was retargeted away from us.
    pub fn apply_tick(&mut self, tick: &PositionTick) {
        if tick.episode_id == self.episode.id {
            self.active = true;
            self.playing = tick.playing;
            self.position_secs = tick.position.as_secs();
            self.push_notification();
        } else {
            self.active = false;
            self.playing = false;
            self.position_secs = 0;
        }
    }

    fn push_notification(&self) {
        self.notifier.notify(NowPlaying {
            episode_id: self.episode.id.clone(),
            title: self.episode.display_title().to_string(),
            position_secs: self.position_secs,
            duration_secs: self.episode.duration_secs(),
            playing: self.playing,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{Enclosure, EpisodeId};
    use crate::events::EventRelay;
    use crate::http::{ByteStream, HttpClient, HttpResponse, SharedHttpClient};
    use crate::notify::{NoopNotifier, PlaybackNotifier};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};
    use url::Url;

    struct MockHttpClient {
        response_data: Vec<u8>,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from(self.response_data.clone()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let data = self.response_data.clone();
            let len = data.len() as u64;

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status: 200,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    /// Streams that never produce, keeping downloads in flight
    struct StalledHttpClient;

    #[async_trait]
    impl HttpClient for StalledHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            futures::future::pending().await
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            futures::future::pending().await
        }
    }

    /// Collects every NowPlaying pushed through it
    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<NowPlaying>>,
    }

    impl PlaybackNotifier for RecordingNotifier {
        fn notify(&self, status: NowPlaying) {
            self.seen.lock().unwrap().push(status);
        }
    }

    fn make_episode(id: &str, duration: Option<&str>) -> Episode {
        Episode {
            id: EpisodeId::from(id),
            title: format!("EP001: Title for {}", id),
            description: Some("Show notes".to_string()),
            pub_date: None,
            enclosure: Enclosure {
                url: Url::parse("https://example.com/ep.mp3").unwrap(),
                length: None,
                mime_type: Some("audio/mpeg".to_string()),
            },
            duration: duration.map(String::from),
            number: Some(1),
        }
    }

    fn make_registry(client: SharedHttpClient) -> (TempDir, Arc<DownloadRegistry>, EventRelay) {
        let dir = tempdir().unwrap();
        let relay = EventRelay::new();
        let registry =
            Arc::new(DownloadRegistry::open(dir.path(), client, relay.clone()).unwrap());
        (dir, registry, relay)
    }

    async fn make_panel(
        episode: Episode,
        session: PlaybackSession,
        registry: Arc<DownloadRegistry>,
    ) -> EpisodeMediaPanel {
        EpisodeMediaPanel::bind(episode, session, registry, NoopNotifier::shared()).await
    }

    #[tokio::test]
    async fn fresh_panel_shows_download_affordance() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let panel = make_panel(
            make_episode("ep-1", Some("45:00")),
            PlaybackSession::new(),
            registry,
        )
        .await;

        let view = panel.view();
        assert_eq!(view.title, "Title for ep-1");
        assert_eq!(view.download, DownloadButton::Download);
        assert!(view.download.enabled());
        assert!(!view.toggle_playing);
        assert!(view.cover_overlay_visible);
        assert_eq!(view.seek_max_secs, 2700);
        assert_eq!(view.seek_position_secs, 0);
        assert!(!view.seek_enabled);
    }

    #[tokio::test]
    async fn downloaded_episode_shows_clear_cache_and_reverts_on_tap() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let episode = make_episode("ep-1", None);

        // Seed the cache as if a previous run downloaded it
        std::fs::write(registry.audio_path(&episode), b"audio").unwrap();

        let mut panel = make_panel(episode, PlaybackSession::new(), registry.clone()).await;
        assert_eq!(panel.view().download, DownloadButton::Downloaded);
        assert_eq!(panel.view().download.label(), "clear cache");

        panel.press_download().unwrap();

        assert_eq!(panel.view().download, DownloadButton::Download);
        assert!(!registry.is_downloaded(panel.episode()));
    }

    #[tokio::test]
    async fn downloading_episode_disables_the_button() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let episode = make_episode("ep-1", None);

        let mut panel = make_panel(episode, PlaybackSession::new(), registry.clone()).await;
        panel.press_download().unwrap();

        let view = panel.view();
        assert_eq!(view.download, DownloadButton::Downloading);
        assert!(!view.download.enabled());

        // Tapping while disabled changes nothing
        panel.press_download().unwrap();
        assert_eq!(panel.view().download, DownloadButton::Downloading);
        assert!(registry.is_downloading(&panel.episode().id));
    }

    #[tokio::test]
    async fn completion_event_transitions_to_downloaded() {
        let (_dir, registry, relay) = make_registry(Arc::new(MockHttpClient {
            response_data: b"audio".to_vec(),
        }));
        let episode = make_episode("ep-1", None);
        let mut rx = relay.subscribe();

        let mut panel = make_panel(episode, PlaybackSession::new(), registry).await;
        panel.press_download().unwrap();

        loop {
            let event = rx.recv().await.unwrap();
            let done = matches!(event, ClientEvent::DownloadComplete { .. });
            panel.handle_event(&event).await;
            if done {
                break;
            }
        }

        assert_eq!(panel.view().download, DownloadButton::Downloaded);
    }

    #[tokio::test]
    async fn completion_event_for_other_episode_is_ignored() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let mut panel = make_panel(
            make_episode("ep-1", None),
            PlaybackSession::new(),
            registry,
        )
        .await;

        panel
            .handle_event(&ClientEvent::DownloadComplete {
                episode_id: EpisodeId::from("ep-other"),
            })
            .await;

        assert_eq!(panel.view().download, DownloadButton::Download);
    }

    #[tokio::test]
    async fn failure_event_reverts_the_button() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let episode = make_episode("ep-1", None);
        let mut panel = make_panel(episode.clone(), PlaybackSession::new(), registry).await;
        panel.press_download().unwrap();
        assert_eq!(panel.view().download, DownloadButton::Downloading);

        panel
            .handle_event(&ClientEvent::DownloadFailed {
                episode_id: episode.id,
                error: "connection reset".to_string(),
            })
            .await;

        assert_eq!(panel.view().download, DownloadButton::Download);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_starts_and_pauses_playback() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let session = PlaybackSession::new();
        let episode = make_episode("ep-1", Some("45:00"));
        let mut panel = make_panel(episode.clone(), session.clone(), registry).await;

        panel.toggle().await;
        assert!(panel.view().toggle_playing);
        assert!(!panel.view().cover_overlay_visible);
        assert!(panel.view().seek_enabled);
        assert!(session.is_playing_episode(&episode.id).await);

        panel.toggle().await;
        assert!(!panel.view().toggle_playing);
        assert!(!session.is_playing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_resumes_paused_episode_preserving_position() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let session = PlaybackSession::new();
        let episode = make_episode("ep-1", Some("45:00"));
        let mut panel = make_panel(episode, session.clone(), registry).await;

        panel.toggle().await;
        tokio::time::advance(Duration::from_secs(90)).await;
        panel.toggle().await;

        panel.toggle().await;

        assert_eq!(session.position().await, Duration::from_secs(90));
        assert_eq!(panel.view().seek_position_secs, 90);
    }

    #[tokio::test(start_paused = true)]
    async fn seek_moves_the_active_episode() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let session = PlaybackSession::new();
        let mut panel = make_panel(
            make_episode("ep-1", Some("45:00")),
            session.clone(),
            registry,
        )
        .await;

        panel.toggle().await;
        panel.seek_to(600).await.unwrap();

        assert_eq!(panel.view().seek_position_secs, 600);
        assert_eq!(session.position().await, Duration::from_secs(600));
    }

    #[tokio::test]
    async fn seek_on_inactive_panel_is_rejected() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let mut panel = make_panel(
            make_episode("ep-1", Some("45:00")),
            PlaybackSession::new(),
            registry,
        )
        .await;

        assert!(matches!(
            panel.seek_to(600).await,
            Err(PlayerError::NoActiveEpisode)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_for_another_episode_clears_the_panel_state() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let session = PlaybackSession::new();
        let mut panel = make_panel(
            make_episode("ep-1", Some("45:00")),
            session.clone(),
            registry,
        )
        .await;

        panel.toggle().await;
        assert!(panel.view().toggle_playing);

        panel.apply_tick(&PositionTick {
            episode_id: EpisodeId::from("ep-other"),
            position: Duration::from_secs(10),
            playing: true,
        });

        let view = panel.view();
        assert!(!view.toggle_playing);
        assert!(view.cover_overlay_visible);
        assert!(!view.seek_enabled);
        assert_eq!(view.seek_position_secs, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn playback_changes_push_notifications() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let notifier = Arc::new(RecordingNotifier::default());
        let episode = make_episode("ep-1", Some("45:00"));
        let mut panel = EpisodeMediaPanel::bind(
            episode.clone(),
            PlaybackSession::new(),
            registry,
            notifier.clone(),
        )
        .await;

        panel.toggle().await;
        panel.seek_to(60).await.unwrap();
        panel.toggle().await;

        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].playing);
        assert_eq!(seen[0].title, "Title for ep-1");
        assert_eq!(seen[1].position_secs, 60);
        assert!(!seen[2].playing);
        assert_eq!(seen[2].position_secs, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_pause_and_resume_drive_the_toggle() {
        let (_dir, registry, _relay) = make_registry(Arc::new(StalledHttpClient));
        let session = PlaybackSession::new();
        let mut panel = make_panel(
            make_episode("ep-1", Some("45:00")),
            session.clone(),
            registry,
        )
        .await;
        panel.toggle().await;

        panel.handle_event(&ClientEvent::PauseRequested).await;
        assert!(!panel.view().toggle_playing);
        assert!(!session.is_playing().await);

        panel.handle_event(&ClientEvent::ResumeRequested).await;
        assert!(panel.view().toggle_playing);
        assert!(session.is_playing().await);
    }
}
