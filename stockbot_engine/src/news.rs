/// news.rs — Ticker headlines from the Alpha Vantage news-sentiment feed
///
/// GET {base}/query?function=NEWS_SENTIMENT&tickers={T}&apikey={K}
///
/// The endpoint answers HTTP 200 even when it has nothing to say: a body
/// without a `feed` key (unknown ticker, exhausted quota) is
/// `DataUnavailable` carrying whatever notice the service sent.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{EngineError, Result};

/// Articles kept per request.
pub const MAX_ARTICLES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title:   String,
    pub link:    String,
    pub source:  String,
    pub summary: String,
}

#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// Newest articles mentioning `ticker`, at most [`MAX_ARTICLES`].
    async fn headlines(&self, ticker: &str) -> Result<Vec<NewsArticle>>;
}

/// Normalise the ticker, query the feed and cap the result.
pub async fn latest_news<N: NewsFeed + ?Sized>(feed: &N, ticker: &str) -> Result<Vec<NewsArticle>> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(EngineError::InvalidInput("Please enter a valid stock ticker.".into()));
    }
    let mut articles = feed.headlines(&ticker).await?;
    articles.truncate(MAX_ARTICLES);
    info!("{} news articles for {}", articles.len(), ticker);
    Ok(articles)
}

// ── Alpha Vantage wire format ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawArticle {
    title:   Option<String>,
    url:     Option<String>,
    source:  Option<String>,
    summary: Option<String>,
}

impl From<RawArticle> for NewsArticle {
    fn from(a: RawArticle) -> Self {
        NewsArticle {
            title:   a.title.unwrap_or_else(|| "No title available".into()),
            link:    a.url.unwrap_or_else(|| "#".into()),
            source:  a.source.unwrap_or_else(|| "Unknown Source".into()),
            summary: a.summary.unwrap_or_else(|| "No summary available".into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    feed:        Option<Vec<RawArticle>>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Note")]
    note:        Option<String>,
}

/// Decode one response body into at most [`MAX_ARTICLES`] articles.
pub fn parse_news(ticker: &str, body: &str) -> Result<Vec<NewsArticle>> {
    let resp: NewsResponse = serde_json::from_str(body)?;
    let Some(feed) = resp.feed else {
        let notice = resp.information.or(resp.note).unwrap_or_else(|| "no feed in response".into());
        return Err(EngineError::DataUnavailable(format!("news for {}: {}", ticker, notice)));
    };
    Ok(feed.into_iter().take(MAX_ARTICLES).map(NewsArticle::from).collect())
}

pub struct AlphaVantageNews {
    client:   Client,
    api_key:  String,
    base_url: String,
}

impl AlphaVantageNews {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            api_key:  api_key.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        if cfg.alpha_vantage_api_key.is_empty() {
            return Err(EngineError::Config("ALPHA_VANTAGE_API_KEY not set".into()));
        }
        Self::new(&cfg.alpha_vantage_api_key, &cfg.alpha_vantage_url)
    }
}

#[async_trait]
impl NewsFeed for AlphaVantageNews {
    async fn headlines(&self, ticker: &str) -> Result<Vec<NewsArticle>> {
        let url = format!("{}/query", self.base_url);
        let resp = self.client
            .get(&url)
            .query(&[
                ("function", "NEWS_SENTIMENT"),
                ("tickers", ticker),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::from_status(status.as_u16(), body, ticker));
        }
        let body = resp.text().await?;
        debug!("{}: {} bytes of news", ticker, body.len());
        parse_news(ticker, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFeed(Vec<NewsArticle>);

    #[async_trait]
    impl NewsFeed for FixedFeed {
        async fn headlines(&self, ticker: &str) -> Result<Vec<NewsArticle>> {
            if ticker == "AAPL" {
                Ok(self.0.clone())
            } else {
                Err(EngineError::DataUnavailable(ticker.to_string()))
            }
        }
    }

    fn article(i: usize) -> NewsArticle {
        NewsArticle {
            title:   format!("Story {i}"),
            link:    format!("https://news.test/{i}"),
            source:  "Wire".into(),
            summary: String::new(),
        }
    }

    #[test]
    fn feed_is_capped_and_missing_fields_filled() {
        let items: Vec<String> = (0..8)
            .map(|i| format!(r#"{{"title":"T{i}","url":"https://x/{i}","source":"S","summary":"sum"}}"#))
            .collect();
        let mut body = format!(r#"{{"items":"8","feed":[{}]}}"#, items.join(","));
        let parsed = parse_news("AAPL", &body).unwrap();
        assert_eq!(parsed.len(), MAX_ARTICLES);
        assert_eq!(parsed[0].title, "T0");
        assert_eq!(parsed[4].link, "https://x/4");

        body = r#"{"feed":[{"title":"Only a title"}]}"#.to_string();
        let sparse = parse_news("AAPL", &body).unwrap();
        assert_eq!(sparse[0].link, "#");
        assert_eq!(sparse[0].source, "Unknown Source");
        assert_eq!(sparse[0].summary, "No summary available");
    }

    #[test]
    fn missing_feed_is_data_unavailable() {
        let body = r#"{"Information":"Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day."}"#;
        match parse_news("AAPL", body) {
            Err(EngineError::DataUnavailable(msg)) => assert!(msg.contains("rate limit"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(parse_news("AAPL", "{}"), Err(EngineError::DataUnavailable(_))));
        assert!(parse_news("AAPL", r#"{"feed":[]}"#).unwrap().is_empty());
    }

    #[tokio::test]
    async fn latest_news_normalises_ticker_and_caps() {
        let feed = FixedFeed((0..7).map(article).collect());
        let news = latest_news(&feed, " aapl ").await.unwrap();
        assert_eq!(news.len(), MAX_ARTICLES);
        assert_eq!(news[0].title, "Story 0");

        assert!(matches!(latest_news(&feed, "  ").await, Err(EngineError::InvalidInput(_))));
        assert!(matches!(latest_news(&feed, "tsla").await, Err(EngineError::DataUnavailable(_))));
    }
}
