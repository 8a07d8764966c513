mod duration;
mod filename;

pub use duration::{format_position, parse_duration};
pub use filename::{cache_filename, cache_filename_stem, get_audio_extension};

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use url::Url;

/// Stable identifier of an episode within a feed.
///
/// Derived from the item GUID where present, falling back to the enclosure
/// URL. Panels and the download registry key everything on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(String);

impl EpisodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EpisodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Represents a single podcast episode
#[derive(Debug, Clone)]
pub struct Episode {
    pub id: EpisodeId,
    pub title: String,
    pub description: Option<String>,
    pub pub_date: Option<DateTime<FixedOffset>>,
    pub enclosure: Enclosure,
    /// itunes duration string as published ("45:00", "1:02:03", bare seconds)
    pub duration: Option<String>,
    pub number: Option<u32>,
}

/// Represents the audio file attached to an episode
#[derive(Debug, Clone)]
pub struct Enclosure {
    pub url: Url,
    pub length: Option<u64>,
    pub mime_type: Option<String>,
}

impl Episode {
    /// Title as shown on the media panel.
    ///
    /// Feeds in this convention prefix every title with the episode number
    /// ("EP001: Title Text"); the prefix up to and including the first colon
    /// is stripped for display. Titles without a colon pass through unchanged.
    pub fn display_title(&self) -> &str {
        match self.title.split_once(':') {
            Some((_, rest)) => rest.trim_start(),
            None => &self.title,
        }
    }

    /// Published duration parsed to whole seconds, if parseable
    pub fn duration_secs(&self) -> Option<u64> {
        self.duration.as_deref().and_then(parse_duration)
    }
}
