mod detail;
mod panel;

pub use detail::{DetailScreen, ToolbarState, toolbar_alpha};
pub use panel::{DownloadButton, EpisodeMediaPanel, PanelView};
