use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::browser::TwitterSession;
use crate::config::{ListSpec, TimingConfig};
use crate::error::Result;
use crate::parser::{Tweet, TweetParser};

/// Collects the most recent tweets rendered on each configured list page.
///
/// Collection is bounded sampling: one fixed-distance scroll, then whatever
/// the first `max_tweets_per_list` articles in the DOM are at that moment.
pub struct ListCollector {
    parser: TweetParser,
    timing: TimingConfig,
}

impl ListCollector {
    pub fn new(timing: TimingConfig) -> Result<Self> {
        let parser = TweetParser::new()?;
        Ok(Self { parser, timing })
    }

    /// Navigate to a list and extract its current tweet window.
    ///
    /// A timeout waiting for the first article is fatal and aborts the run;
    /// a page with fewer articles than the cap is not an error.
    pub async fn collect(&self, session: &TwitterSession, list: &ListSpec) -> Result<Vec<Tweet>> {
        info!("Collecting list: {} ({})", list.tag, list.url);

        session.goto(&list.url).await?;
        session
            .wait_for_element(
                "article",
                Duration::from_secs(self.timing.page_load_timeout_secs),
            )
            .await?;

        // settle, one scroll to pull in lazy-loaded cards, settle again
        let settle = Duration::from_millis(self.timing.settle_ms);
        sleep(settle).await;
        session.scroll_to(self.timing.scroll_distance).await?;
        sleep(settle).await;

        let html = session.content().await?;
        let tweets = self
            .parser
            .parse_list_html(&html, self.timing.max_tweets_per_list);

        debug!("Collected {} tweets from list {}", tweets.len(), list.tag);
        Ok(tweets)
    }
}
