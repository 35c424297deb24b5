use serde::{Deserialize, Serialize};

/// One scraped post from a list timeline.
///
/// Every field except `tweet_id` falls back to an empty string when its
/// element is missing from the DOM. A tweet without an id cannot be
/// deduplicated or stored and is dropped by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tweet {
    pub text: String,
    pub image_url: String,
    pub timestamp: String,
    pub username: String,
    pub tweet_url: String,
    pub tweet_id: Option<String>,
}

impl Tweet {
    /// Whether this tweet can be deduplicated and persisted.
    pub fn is_storable(&self) -> bool {
        self.tweet_id.is_some()
    }
}
