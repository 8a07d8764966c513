use std::collections::HashMap;

use crate::episode::{Episode, EpisodeId};
use crate::feed::Podcast;

/// In-memory episode lookup, built from a parsed feed.
///
/// Keeps the feed's episode order (newest first in most feeds) and indexes
/// by id so navigation targets can be resolved from an episode identifier.
pub struct EpisodeLibrary {
    title: String,
    episodes: Vec<Episode>,
    by_id: HashMap<EpisodeId, usize>,
}

impl EpisodeLibrary {
    pub fn from_podcast(podcast: Podcast) -> Self {
        let by_id = podcast
            .episodes
            .iter()
            .enumerate()
            .map(|(i, episode)| (episode.id.clone(), i))
            .collect();

        Self {
            title: podcast.title,
            episodes: podcast.episodes,
            by_id,
        }
    }

    /// Podcast title, for the client header
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn find_by_id(&self, id: &EpisodeId) -> Option<&Episode> {
        self.by_id.get(id).map(|&i| &self.episodes[i])
    }

    /// Episode at a 1-based list position, as shown by `list`
    pub fn by_position(&self, position: usize) -> Option<&Episode> {
        position.checked_sub(1).and_then(|i| self.episodes.get(i))
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}
