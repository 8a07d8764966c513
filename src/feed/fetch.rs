// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{Podcast, parse_feed};

/// Load and parse a podcast feed from a URL or a local file path
pub async fn load_feed<C: HttpClient>(client: &C, source: &str) -> Result<Podcast, FeedError> {
    if is_url(source) {
        let feed_url = Url::parse(source)?;
        let bytes = client
            .get_bytes(source)
            .await
            .map_err(|e| FeedError::FetchFailed {
                url: source.to_string(),
                source: e,
            })?;
        parse_feed(&bytes, feed_url)
    } else {
        let path = Path::new(source);
        let bytes = std::fs::read(path).map_err(|e| FeedError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        parse_feed(&bytes, file_path_to_url(path))
    }
}

/// Construct a file:// URL for a local file path
fn file_path_to_url(path: &Path) -> Url {
    Url::from_file_path(path).unwrap_or_else(|_| {
        Url::parse(&format!("file://{}", path.display())).expect("valid file URL")
    })
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
