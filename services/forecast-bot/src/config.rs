//! Bot Configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::types::{BotError, ChatId, OperatorId, Result};

/// Win limits an operator may choose from
pub const WIN_LIMIT_OPTIONS: [u32; 3] = [3, 5, 10];

/// Rounds that must pass after the anchor round before the first prediction
pub const DEFAULT_WARMUP_ROUNDS: i64 = 3;

/// Fixed cadence of the polling driver, independent of the interval label
pub const DEFAULT_POLL_PERIOD_MS: u64 = 2000;

/// Scan limit for ADMIN{n}_ID / CHANNEL{n}_ID pairs
const MAX_OPERATOR_SLOTS: usize = 32;

/// Game round cadence; selects which feed endpoint is polled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Sec30,
    Min1,
    Min3,
    Min5,
}

impl Interval {
    pub const ALL: [Interval; 4] = [
        Interval::Sec30,
        Interval::Min1,
        Interval::Min3,
        Interval::Min5,
    ];

    /// Label used in feed URLs and callback data
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Sec30 => "30s",
            Interval::Min1 => "1m",
            Interval::Min3 => "3m",
            Interval::Min5 => "5m",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| BotError::InvalidConfig(format!("Unknown interval: {}", s)))
    }
}

/// Parse a win limit, accepting only the fixed options
pub fn parse_win_limit(s: &str) -> Option<u32> {
    s.parse::<u32>()
        .ok()
        .filter(|n| WIN_LIMIT_OPTIONS.contains(n))
}

/// An allow-listed operator and the channel it forecasts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorEntry {
    pub id: OperatorId,
    pub channel: ChatId,
}

/// Copy interpolated into channel announcements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    pub game_name: String,
    pub register_url: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            game_name: "Wingo".to_string(),
            register_url: "https://tinyurl.com/bhtclubs".to_string(),
        }
    }
}

/// Configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub telegram_api_url: String,
    pub webhook_url: Option<String>,
    pub port: u16,
    pub operators: Vec<OperatorEntry>,
    pub feed_base_url: String,
    pub poll_period: Duration,
    pub warmup_rounds: i64,
    /// `None` disables idle detection
    pub idle_timeout: Option<Duration>,
    pub branding: Branding,
}

impl Config {
    /// Load from process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = var("BOT_TOKEN")
            .ok_or_else(|| BotError::InvalidConfig("BOT_TOKEN environment variable required".into()))?;

        let telegram_api_url = var("TELEGRAM_API_URL")
            .unwrap_or_else(|| "https://api.telegram.org".to_string());

        let webhook_url = var("WEBHOOK_URL").map(|u| u.trim_end_matches('/').to_string());

        let port = parse_or("PORT", var("PORT"), 10000u16)?;

        let operators = load_operators(&var)?;

        let feed_base_url = var("FEED_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8787".to_string())
            .trim_end_matches('/')
            .to_string();

        let poll_period_ms = parse_or("POLL_PERIOD_MS", var("POLL_PERIOD_MS"), DEFAULT_POLL_PERIOD_MS)?;
        if poll_period_ms == 0 {
            return Err(BotError::InvalidConfig("POLL_PERIOD_MS must be positive".into()));
        }

        let warmup_rounds = parse_or("WARMUP_ROUNDS", var("WARMUP_ROUNDS"), DEFAULT_WARMUP_ROUNDS)?;

        let idle_secs = parse_or(
            "OPERATOR_IDLE_TIMEOUT_SECS",
            var("OPERATOR_IDLE_TIMEOUT_SECS"),
            0u64,
        )?;

        let defaults = Branding::default();
        let branding = Branding {
            game_name: var("GAME_NAME").unwrap_or(defaults.game_name),
            register_url: var("REGISTER_URL").unwrap_or(defaults.register_url),
        };

        Ok(Self {
            bot_token,
            telegram_api_url,
            webhook_url,
            port,
            operators,
            feed_base_url,
            poll_period: Duration::from_millis(poll_period_ms),
            warmup_rounds,
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            branding,
        })
    }

    /// Look up an allow-listed operator
    pub fn operator(&self, id: &OperatorId) -> Option<&OperatorEntry> {
        self.operators.iter().find(|o| &o.id == id)
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| BotError::InvalidConfig(format!("Invalid {}: {}", key, v))),
        None => Ok(default),
    }
}

/// Read ADMIN{n}_ID / CHANNEL{n}_ID pairs until the first missing admin
fn load_operators<F>(var: &F) -> Result<Vec<OperatorEntry>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut operators = Vec::new();

    for n in 1..=MAX_OPERATOR_SLOTS {
        let Some(id) = var(&format!("ADMIN{}_ID", n)) else {
            break;
        };
        let channel = var(&format!("CHANNEL{}_ID", n)).ok_or_else(|| {
            BotError::InvalidConfig(format!("CHANNEL{}_ID required for ADMIN{}_ID", n, n))
        })?;
        operators.push(OperatorEntry {
            id: ChatId::new(id.trim()),
            channel: ChatId::new(channel.trim()),
        });
    }

    if operators.is_empty() {
        return Err(BotError::InvalidConfig(
            "At least one ADMIN1_ID / CHANNEL1_ID pair required".into(),
        ));
    }

    Ok(operators)
}
