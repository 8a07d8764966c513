mod fetch;
mod parse;

pub use fetch::{is_url, load_feed};
pub use parse::{Podcast, parse_feed};
