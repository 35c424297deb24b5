pub mod annotator;
pub mod browser;
pub mod collector;
pub mod config;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod storage;

pub use annotator::{Annotation, Annotator, OpenAiAnnotator};
pub use browser::TwitterSession;
pub use config::Config;
pub use error::{Result, ScraperError};
pub use pipeline::{Pipeline, RunSummary};
pub use storage::{DedupIndex, FirebaseStore, StoredTweet, TweetStore};
