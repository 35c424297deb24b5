use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::annotator::Annotation;
use crate::config::FirebaseConfig;
use crate::error::{Result, ScraperError};
use crate::parser::Tweet;

/// The record appended to the remote store: the scraped tweet merged with its
/// annotation and the tag of the list it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredTweet {
    pub tweet_id: String,
    pub username: String,
    pub text: String,
    pub image_url: String,
    pub timestamp: String,
    pub source_list: String,
    pub insight: String,
    pub importance_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
}

impl StoredTweet {
    /// Merge a tweet with its annotation. Returns `None` when the tweet has
    /// no id; such tweets can never be stored.
    pub fn new(tweet: &Tweet, annotation: &Annotation, source_list: &str) -> Option<Self> {
        let tweet_id = tweet.tweet_id.clone()?;
        Some(Self {
            tweet_id,
            username: tweet.username.clone(),
            text: tweet.text.clone(),
            image_url: tweet.image_url.clone(),
            timestamp: tweet.timestamp.clone(),
            source_list: source_list.to_string(),
            insight: annotation.insight.clone(),
            importance_level: annotation.importance_level,
            collected_at: Some(Utc::now()),
        })
    }
}

/// Set of tweet ids already present in the store, snapshotted once at run
/// start. The snapshot is not refreshed mid-run, so an id surfacing in two
/// configured lists within the same run is stored twice.
#[derive(Debug, Default)]
pub struct DedupIndex {
    ids: HashSet<String>,
}

impl DedupIndex {
    /// Build the index from a store snapshot, tolerating children that lack
    /// a `tweet_id` field.
    pub fn from_snapshot(snapshot: &HashMap<String, Value>) -> Self {
        let ids = snapshot
            .values()
            .filter_map(|record| record.get("tweet_id"))
            .filter_map(|id| id.as_str())
            .map(|id| id.to_string())
            .collect();
        Self { ids }
    }

    pub fn contains(&self, tweet_id: &str) -> bool {
        self.ids.contains(tweet_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Seam for the remote document store.
#[async_trait]
pub trait TweetStore: Send + Sync {
    /// Read all existing children keyed by their store key.
    async fn fetch_all(&self) -> Result<HashMap<String, Value>>;

    /// Append a new child under an auto-generated key; returns the key.
    async fn push(&self, record: &StoredTweet) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// Firebase Realtime Database over its REST surface.
pub struct FirebaseStore {
    http: reqwest::Client,
    database_url: String,
    collection: String,
    auth_token: Option<String>,
}

impl FirebaseStore {
    pub fn new(config: &FirebaseConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                ScraperError::NetworkError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            database_url: config.database_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn collection_url(&self) -> String {
        let mut url = format!("{}/{}.json", self.database_url, self.collection);
        if let Some(ref token) = self.auth_token {
            url.push_str("?auth=");
            url.push_str(token);
        }
        url
    }
}

#[async_trait]
impl TweetStore for FirebaseStore {
    async fn fetch_all(&self) -> Result<HashMap<String, Value>> {
        let response = self
            .http
            .get(self.collection_url())
            .send()
            .await
            .map_err(|e| ScraperError::NetworkError(format!("Firebase read failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScraperError::StorageError(format!(
                "Firebase read failed with status {}: {}",
                status, body
            ))
            .into());
        }

        // an empty collection reads back as JSON null
        let snapshot: Option<HashMap<String, Value>> = response
            .json()
            .await
            .map_err(|e| ScraperError::StorageError(format!("Invalid Firebase payload: {}", e)))?;

        let snapshot = snapshot.unwrap_or_default();
        debug!("Fetched {} existing records from Firebase", snapshot.len());
        Ok(snapshot)
    }

    async fn push(&self, record: &StoredTweet) -> Result<String> {
        let response = self
            .http
            .post(self.collection_url())
            .json(record)
            .send()
            .await
            .map_err(|e| ScraperError::NetworkError(format!("Firebase push failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScraperError::StorageError(format!(
                "Firebase push failed with status {}: {}",
                status, body
            ))
            .into());
        }

        let push_response: PushResponse = response.json().await.map_err(|e| {
            ScraperError::StorageError(format!("Invalid Firebase push response: {}", e))
        })?;

        info!(
            "Stored tweet {} under key {}",
            record.tweet_id, push_response.name
        );
        Ok(push_response.name)
    }
}

/// In-memory store used by the pipeline tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing record, as if a previous run had stored it.
    pub async fn seed(&self, record: &StoredTweet) {
        let mut records = self.records.lock().await;
        records.insert(
            Uuid::new_v4().to_string(),
            serde_json::to_value(record).expect("StoredTweet serializes"),
        );
    }

    pub async fn record_count(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn stored_ids(&self) -> Vec<String> {
        let records = self.records.lock().await;
        records
            .values()
            .filter_map(|record| record.get("tweet_id"))
            .filter_map(|id| id.as_str())
            .map(|id| id.to_string())
            .collect()
    }
}

#[async_trait]
impl TweetStore for MemoryStore {
    async fn fetch_all(&self) -> Result<HashMap<String, Value>> {
        Ok(self.records.lock().await.clone())
    }

    async fn push(&self, record: &StoredTweet) -> Result<String> {
        let key = Uuid::new_v4().to_string();
        let mut records = self.records.lock().await;
        records.insert(key.clone(), serde_json::to_value(record)?);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record(id: &str) -> StoredTweet {
        StoredTweet {
            tweet_id: id.to_string(),
            username: "@someone".to_string(),
            text: "hello".to_string(),
            image_url: String::new(),
            timestamp: "2024-05-14T12:00:00.000Z".to_string(),
            source_list: "BTC".to_string(),
            insight: "Nenhum".to_string(),
            importance_level: 1,
            collected_at: None,
        }
    }

    #[test]
    fn test_dedup_index_skips_children_without_id() {
        let mut snapshot = HashMap::new();
        snapshot.insert("-k1".to_string(), json!({"tweet_id": "111"}));
        snapshot.insert("-k2".to_string(), json!({"text": "no id here"}));
        snapshot.insert("-k3".to_string(), json!({"tweet_id": "222"}));

        let index = DedupIndex::from_snapshot(&snapshot);
        assert_eq!(index.len(), 2);
        assert!(index.contains("111"));
        assert!(index.contains("222"));
        assert!(!index.contains("333"));
    }

    #[test]
    fn test_stored_tweet_requires_id() {
        let tweet = Tweet {
            text: "x".to_string(),
            image_url: String::new(),
            timestamp: String::new(),
            username: String::new(),
            tweet_url: String::new(),
            tweet_id: None,
        };
        assert!(StoredTweet::new(&tweet, &Annotation::error_sentinel(), "All").is_none());
    }

    #[test]
    fn test_firebase_collection_url() {
        let store = FirebaseStore::new(&FirebaseConfig {
            database_url: "https://demo.firebaseio.com/".to_string(),
            auth_token: None,
            collection: "twitter-list-tweets".to_string(),
        })
        .unwrap();
        assert_eq!(
            store.collection_url(),
            "https://demo.firebaseio.com/twitter-list-tweets.json"
        );

        let store = FirebaseStore::new(&FirebaseConfig {
            database_url: "https://demo.firebaseio.com".to_string(),
            auth_token: Some("secret".to_string()),
            collection: "twitter-list-tweets".to_string(),
        })
        .unwrap();
        assert_eq!(
            store.collection_url(),
            "https://demo.firebaseio.com/twitter-list-tweets.json?auth=secret"
        );
    }

    #[tokio::test]
    async fn test_memory_store_push_and_fetch() {
        let store = MemoryStore::new();
        store.push(&sample_record("123")).await.unwrap();
        store.push(&sample_record("456")).await.unwrap();

        let snapshot = store.fetch_all().await.unwrap();
        assert_eq!(snapshot.len(), 2);

        let index = DedupIndex::from_snapshot(&snapshot);
        assert!(index.contains("123"));
        assert!(index.contains("456"));
    }
}
