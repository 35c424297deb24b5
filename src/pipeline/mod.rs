use std::sync::Arc;
use tracing::{error, info, warn};

use crate::annotator::Annotator;
use crate::browser::TwitterSession;
use crate::collector::ListCollector;
use crate::config::Config;
use crate::error::Result;
use crate::parser::Tweet;
use crate::storage::{DedupIndex, StoredTweet, TweetStore};

#[cfg(test)]
mod tests;

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub collected: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub dropped_no_id: usize,
    pub push_failures: usize,
}

/// The whole run: login, one pass over the configured lists, annotate and
/// persist every newly-seen tweet.
pub struct Pipeline<S, A> {
    config: Config,
    store: Arc<S>,
    annotator: A,
    collector: ListCollector,
}

impl<S: TweetStore, A: Annotator> Pipeline<S, A> {
    pub fn new(config: Config, store: Arc<S>, annotator: A) -> Result<Self> {
        let collector = ListCollector::new(config.timing.clone())?;
        Ok(Self {
            config,
            store,
            annotator,
            collector,
        })
    }

    /// Execute one full pass. The browser session is closed on every exit
    /// path, including login failure and a mid-run collection error.
    pub async fn run(&self) -> Result<RunSummary> {
        info!(
            "Starting scraper run over {} lists",
            self.config.lists.len()
        );

        let session = TwitterSession::launch().await?;

        if let Err(e) = session.login(&self.config.credentials).await {
            let _ = session.close().await;
            return Err(e);
        }

        let result = self.run_with_session(&session).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }

        let summary = result?;
        info!(
            "Finalizado com sucesso! stored={} duplicates={} dropped_no_id={} push_failures={}",
            summary.stored, summary.duplicates, summary.dropped_no_id, summary.push_failures
        );
        Ok(summary)
    }

    async fn run_with_session(&self, session: &TwitterSession) -> Result<RunSummary> {
        // one snapshot before any write; the index is not refreshed mid-run,
        // so the same id surfacing in two lists is stored twice
        let index = self.build_index().await?;
        info!("Dedup index loaded with {} known tweet ids", index.len());

        let mut summary = RunSummary::default();
        for list in &self.config.lists {
            let tweets = self.collector.collect(session, list).await?;
            summary.collected += tweets.len();
            self.process_list(&list.tag, &tweets, &index, &mut summary)
                .await;
        }

        Ok(summary)
    }

    /// Annotate and persist the eligible tweets of one list.
    ///
    /// A tweet is stored iff it has an id that was absent from the run-start
    /// index. Annotation never fails (it degrades to the sentinel); a push
    /// failure is logged and the loop continues.
    pub(crate) async fn process_list(
        &self,
        tag: &str,
        tweets: &[Tweet],
        index: &DedupIndex,
        summary: &mut RunSummary,
    ) {
        for tweet in tweets {
            let Some(id) = tweet.tweet_id.as_deref() else {
                warn!("Tweet without permalink id dropped (list {})", tag);
                summary.dropped_no_id += 1;
                continue;
            };

            if index.contains(id) {
                info!("Duplicate tweet skipped: {}", id);
                summary.duplicates += 1;
                continue;
            }

            let annotation = self.annotator.annotate(&tweet.text).await;

            if let Some(record) = StoredTweet::new(tweet, &annotation, tag) {
                match self.store.push(&record).await {
                    Ok(key) => {
                        info!(
                            "Tweet stored: {} | importance {} | key {}",
                            id, record.importance_level, key
                        );
                        summary.stored += 1;
                    }
                    Err(e) => {
                        error!("Failed to store tweet {}: {}", id, e);
                        summary.push_failures += 1;
                    }
                }
            }
        }
    }

    pub(crate) async fn build_index(&self) -> Result<DedupIndex> {
        let snapshot = self.store.fetch_all().await?;
        Ok(DedupIndex::from_snapshot(&snapshot))
    }
}
