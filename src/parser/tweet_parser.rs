use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::ScraperError;
use crate::parser::Tweet;

/// html parser for pulling tweets out of a rendered list timeline
pub struct TweetParser {
    // CSS selectors for the parts of a tweet card
    article_selector: Selector,
    text_selector: Selector,
    image_selector: Selector,
    time_selector: Selector,
    username_selector: Selector,
    permalink_selector: Selector,
}

impl TweetParser {
    // set up a parser with css selectors ready
    pub fn new() -> Result<Self, ScraperError> {
        Ok(Self {
            article_selector: Selector::parse("article")
                .map_err(|e| ScraperError::ParseError(format!("Invalid article selector: {}", e)))?,
            text_selector: Selector::parse(r#"div[data-testid="tweetText"]"#)
                .map_err(|e| ScraperError::ParseError(format!("Invalid text selector: {}", e)))?,
            image_selector: Selector::parse(r#"img[src*="twimg"]"#)
                .map_err(|e| ScraperError::ParseError(format!("Invalid image selector: {}", e)))?,
            time_selector: Selector::parse("time")
                .map_err(|e| ScraperError::ParseError(format!("Invalid time selector: {}", e)))?,
            username_selector: Selector::parse(r#"div[dir="ltr"] > span"#).map_err(|e| {
                ScraperError::ParseError(format!("Invalid username selector: {}", e))
            })?,
            permalink_selector: Selector::parse(r#"a[href*="/status/"]"#).map_err(|e| {
                ScraperError::ParseError(format!("Invalid permalink selector: {}", e))
            })?,
        })
    }

    /// Parse up to `limit` tweets from a list page, in DOM order.
    ///
    /// Fewer than `limit` articles on the page is not an error. Per-field
    /// extraction is independent: an absent field yields its default and the
    /// rest of the tweet is still extracted.
    pub fn parse_list_html(&self, html: &str, limit: usize) -> Vec<Tweet> {
        let document = Html::parse_document(html);

        let tweets: Vec<Tweet> = document
            .select(&self.article_selector)
            .take(limit)
            .map(|article| self.parse_article(&article))
            .collect();

        debug!("Parsed {} tweets from list HTML", tweets.len());
        tweets
    }

    // handle one tweet card
    fn parse_article(&self, article: &ElementRef) -> Tweet {
        let text = self
            .extract_text(article)
            .unwrap_or_default();
        let image_url = self.extract_image_url(article).unwrap_or_default();
        let timestamp = self.extract_timestamp(article).unwrap_or_default();
        let username = self.extract_username(article).unwrap_or_default();
        let tweet_url = self.extract_permalink(article).unwrap_or_default();
        let tweet_id = Self::id_from_permalink(&tweet_url);

        Tweet {
            text,
            image_url,
            timestamp,
            username,
            tweet_url,
            tweet_id,
        }
    }

    fn extract_text(&self, article: &ElementRef) -> Option<String> {
        article.select(&self.text_selector).next().map(|elem| {
            elem.text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<&str>>()
                .join(" ")
        })
    }

    // first attached media image, recognized by the twimg cdn host in its src
    fn extract_image_url(&self, article: &ElementRef) -> Option<String> {
        article
            .select(&self.image_selector)
            .next()
            .and_then(|elem| elem.value().attr("src"))
            .map(|src| src.to_string())
    }

    fn extract_timestamp(&self, article: &ElementRef) -> Option<String> {
        article
            .select(&self.time_selector)
            .next()
            .and_then(|elem| elem.value().attr("datetime"))
            .map(|datetime| datetime.to_string())
    }

    fn extract_username(&self, article: &ElementRef) -> Option<String> {
        article
            .select(&self.username_selector)
            .next()
            .map(|elem| elem.text().collect::<String>().trim().to_string())
            .filter(|name| !name.is_empty())
    }

    fn extract_permalink(&self, article: &ElementRef) -> Option<String> {
        article
            .select(&self.permalink_selector)
            .next()
            .and_then(|elem| elem.value().attr("href"))
            .map(|href| {
                if href.starts_with('/') {
                    format!("https://x.com{}", href)
                } else {
                    href.to_string()
                }
            })
    }

    /// The tweet id is the last path segment of the status permalink.
    fn id_from_permalink(url: &str) -> Option<String> {
        url.trim_end_matches('/')
            .rsplit('/')
            .next()
            .map(|segment| segment.split('?').next().unwrap_or(segment))
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_string())
    }
}
