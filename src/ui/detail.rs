use crate::episode::Episode;

/// Scroll distance over which the toolbar fades from transparent to opaque
const FADE_DISTANCE: f32 = 500.0;

/// Toolbar rendering state derived from the scroll offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarState {
    /// 0 (transparent) to 255 (opaque)
    pub alpha: u8,
    /// Full episode title, prefix and all
    pub title: String,
}

/// The navigation target for one episode: show notes plus the scroll-driven
/// toolbar fade. The media panel is rendered alongside by the owning loop.
pub struct DetailScreen {
    episode: Episode,
    scroll_y: i32,
}

impl DetailScreen {
    pub fn new(episode: Episode) -> Self {
        Self {
            episode,
            scroll_y: 0,
        }
    }

    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    pub fn scroll_y(&self) -> i32 {
        self.scroll_y
    }

    /// Record a new scroll offset; the toolbar state follows from it
    pub fn scroll(&mut self, y: i32) {
        self.scroll_y = y;
    }

    pub fn toolbar(&self) -> ToolbarState {
        ToolbarState {
            alpha: toolbar_alpha(self.scroll_y),
            title: self.episode.title.clone(),
        }
    }

    /// Show notes with HTML entities decoded; None when the feed has none
    pub fn show_notes(&self) -> Option<String> {
        self.episode
            .description
            .as_deref()
            .map(|notes| html_escape::decode_html_entities(notes).into_owned())
    }
}

/// Map a scroll offset to a toolbar alpha: transparent at or below zero,
/// opaque from `FADE_DISTANCE` on, linear in between (truncating)
pub fn toolbar_alpha(scroll_y: i32) -> u8 {
    if scroll_y <= 0 {
        0
    } else if scroll_y as f32 >= FADE_DISTANCE {
        255
    } else {
        (scroll_y as f32 / FADE_DISTANCE * 255.0) as u8
    }
}
