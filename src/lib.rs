pub mod downloads;
pub mod episode;
pub mod error;
pub mod events;
pub mod feed;
pub mod http;
pub mod library;
pub mod notify;
pub mod player;
pub mod ui;

// Re-export main types for convenience
pub use downloads::{DownloadRegistry, DownloadStatus};
pub use episode::{Episode, EpisodeId, format_position, parse_duration};
pub use error::{CacheError, DownloadError, FeedError, PlayerError};
pub use events::{ClientEvent, EventRelay};
pub use feed::{Podcast, is_url, load_feed, parse_feed};
pub use http::{HttpClient, HttpResponse, ReqwestClient, SharedHttpClient};
pub use library::EpisodeLibrary;
pub use notify::{NoopNotifier, NowPlaying, PlaybackNotifier, SharedPlaybackNotifier};
pub use player::{PlaybackSession, PositionTick};
pub use ui::{DetailScreen, DownloadButton, EpisodeMediaPanel, PanelView};
