pub mod tweet;
pub mod tweet_parser;

pub use tweet::Tweet;
pub use tweet_parser::TweetParser;
