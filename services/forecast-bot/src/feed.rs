//! Result feed client
//!
//! One HTTP GET per interval label. The payload carries the latest round
//! under `sample`; anything unusable is reported as "no round".

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::Interval;
use crate::types::{BotError, Result, Round};

/// Source of the latest round for an interval
#[async_trait::async_trait]
pub trait ResultFeed: Send + Sync {
    /// Latest round, or `None` when the feed has nothing usable
    async fn latest(&self, interval: Interval) -> Result<Option<Round>>;
}

/// HTTP result feed at `{base_url}/{interval}`
pub struct HttpResultFeed {
    client: Client,
    base_url: String,
}

impl HttpResultFeed {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0")
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| BotError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, interval: Interval) -> String {
        format!("{}/{}", self.base_url, interval.as_str())
    }
}

#[async_trait::async_trait]
impl ResultFeed for HttpResultFeed {
    async fn latest(&self, interval: Interval) -> Result<Option<Round>> {
        let url = self.url(interval);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BotError::FeedUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::FeedUnavailable(format!(
                "{} returned {}",
                url, status
            )));
        }

        let body: FeedResponse = response
            .json()
            .await
            .map_err(|e| BotError::FeedUnavailable(format!("Invalid feed payload: {}", e)))?;

        let round = body.sample.and_then(FeedSample::into_round);
        debug!("Feed {} -> {:?}", interval, round);
        Ok(round)
    }
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    sample: Option<FeedSample>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedSample {
    #[serde(default)]
    issue_number: Option<StringOrNumber>,
    #[serde(default)]
    number: Option<StringOrNumber>,
}

/// Feed fields arrive as either JSON strings or numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Number(serde_json::Number),
}

impl StringOrNumber {
    fn into_text(self) -> String {
        match self {
            StringOrNumber::Text(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

impl FeedSample {
    fn into_round(self) -> Option<Round> {
        let issue = self.issue_number?.into_text().trim().to_string();
        if issue.is_empty() {
            return None;
        }
        let number = self.number?.into_text().trim().parse::<u32>().ok()?;
        Some(Round { issue, number })
    }
}
