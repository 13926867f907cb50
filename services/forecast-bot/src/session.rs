//! Forecast session state machine
//!
//! One session per operator. The machine is synchronous and performs no I/O:
//! each observed round yields a [`TickOutcome`] describing what changed, and
//! the runner turns that into messages.
//!
//! ```text
//! Configuring --start(win_limit)--> Running --win_count == win_limit--> Ended
//!                                      \------------stop()------------> Ended
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{Interval, DEFAULT_WARMUP_ROUNDS};
use crate::issue::{is_numeric, issue_distance, next_issue};
use crate::outcome::{classify, predict_next, Bucket};
use crate::types::{BotError, ChatId, MessageRef, OperatorId, Result, Round};

/// Stake multiplier applied after a losing prediction
pub const LOSS_MULTIPLIER: u64 = 3;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Interval and/or win limit not yet chosen
    Configuring,
    /// Polling, zero or more predictions resolved
    Running,
    /// Terminal
    Ended,
}

/// An announced, not yet resolved prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub bucket: Bucket,
    pub target_issue: String,
}

/// Result of resolving a pending prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub won: bool,
    /// The prediction that was just resolved
    pub resolved: Prediction,
    /// Round it was resolved against
    pub observed_issue: String,
    /// Prediction carried into the next round
    pub next: Prediction,
    /// Win limit reached; the session is now `Ended`
    pub session_complete: bool,
}

/// What one observed round did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running, empty identifier, or a round already evaluated
    Ignored,
    /// First round seen; anchors the warm-up window
    Anchored,
    /// Inside the warm-up window
    WarmingUp { elapsed: i64 },
    /// First prediction of the session
    PredictionIssued(Prediction),
    Resolved(Resolution),
}

/// Per-operator forecast session
#[derive(Debug, Clone)]
pub struct ForecastSession {
    pub id: Uuid,
    pub operator_id: OperatorId,
    pub channel_id: ChatId,
    pub interval: Option<Interval>,
    pub win_limit: Option<u32>,
    pub phase: SessionPhase,
    pub win_count: u32,
    pub current_stake: u64,
    pub last_observed_issue: Option<String>,
    pub start_issue: Option<String>,
    /// Distinct rounds observed after the anchor; warm-up fallback for
    /// non-numeric identifiers
    pub rounds_since_start: i64,
    pub pending_prediction: Option<Prediction>,
    /// Winning round identifiers in resolution order
    pub win_history: Vec<String>,
    pub status_message: Option<MessageRef>,
    pub started_at: Option<DateTime<Utc>>,
    warmup_rounds: i64,
}

impl ForecastSession {
    /// New session in `Configuring`
    pub fn new(operator_id: OperatorId, channel_id: ChatId) -> Self {
        Self {
            id: Uuid::new_v4(),
            operator_id,
            channel_id,
            interval: None,
            win_limit: None,
            phase: SessionPhase::Configuring,
            win_count: 0,
            current_stake: 1,
            last_observed_issue: None,
            start_issue: None,
            rounds_since_start: 0,
            pending_prediction: None,
            win_history: Vec::new(),
            status_message: None,
            started_at: None,
            warmup_rounds: DEFAULT_WARMUP_ROUNDS,
        }
    }

    pub fn with_warmup_rounds(mut self, warmup_rounds: i64) -> Self {
        self.warmup_rounds = warmup_rounds;
        self
    }

    pub fn warmup_rounds(&self) -> i64 {
        self.warmup_rounds
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    /// Bind the polling interval; only while configuring
    pub fn select_interval(&mut self, interval: Interval) -> Result<()> {
        if self.phase != SessionPhase::Configuring {
            return Err(BotError::InvalidTransition(format!(
                "cannot select interval while {:?}",
                self.phase
            )));
        }
        self.interval = Some(interval);
        Ok(())
    }

    /// `Configuring -> Running`; resets every counter
    pub fn start(&mut self, win_limit: u32) -> Result<()> {
        if self.phase != SessionPhase::Configuring {
            return Err(BotError::InvalidTransition(format!(
                "cannot start while {:?}",
                self.phase
            )));
        }
        if self.interval.is_none() {
            return Err(BotError::InvalidTransition(
                "interval must be selected before the win limit".to_string(),
            ));
        }
        if win_limit == 0 {
            return Err(BotError::InvalidTransition(
                "win limit must be positive".to_string(),
            ));
        }

        self.win_limit = Some(win_limit);
        self.win_count = 0;
        self.current_stake = 1;
        self.pending_prediction = None;
        self.last_observed_issue = None;
        self.start_issue = None;
        self.rounds_since_start = 0;
        self.win_history.clear();
        self.started_at = Some(Utc::now());
        self.phase = SessionPhase::Running;
        Ok(())
    }

    /// Force the terminal phase (explicit stop)
    pub fn end(&mut self) {
        self.phase = SessionPhase::Ended;
    }

    /// Evaluate the newest round reported by the feed
    pub fn observe(&mut self, round: &Round) -> TickOutcome {
        if self.phase != SessionPhase::Running {
            return TickOutcome::Ignored;
        }

        let issue = round.issue.trim();
        if issue.is_empty() || self.last_observed_issue.as_deref() == Some(issue) {
            return TickOutcome::Ignored;
        }
        self.last_observed_issue = Some(issue.to_string());

        let Some(start_issue) = self.start_issue.as_deref() else {
            debug!("Session {} anchored at issue {}", self.id, issue);
            if !is_numeric(issue) {
                debug!("Non-numeric issue, warm-up counts observed rounds");
            }
            self.start_issue = Some(issue.to_string());
            return TickOutcome::Anchored;
        };

        self.rounds_since_start += 1;
        let elapsed = issue_distance(start_issue, issue).unwrap_or(self.rounds_since_start);
        if elapsed < self.warmup_rounds {
            return TickOutcome::WarmingUp { elapsed };
        }

        let next = Prediction {
            bucket: predict_next(round.number),
            target_issue: next_issue(issue),
        };

        let Some(pending) = self.pending_prediction.replace(next.clone()) else {
            return TickOutcome::PredictionIssued(next);
        };

        if pending.target_issue != issue {
            warn!(
                "Session {}: resolving prediction for {} against round {}",
                self.id, pending.target_issue, issue
            );
        }

        let won = classify(round.number) == pending.bucket;
        if won {
            self.current_stake = 1;
            self.win_count += 1;
            self.win_history.push(issue.to_string());
        } else {
            self.current_stake = self.current_stake.saturating_mul(LOSS_MULTIPLIER);
        }

        let session_complete = self.win_limit.is_some_and(|limit| self.win_count >= limit);
        if session_complete {
            self.phase = SessionPhase::Ended;
        }

        TickOutcome::Resolved(Resolution {
            won,
            resolved: pending,
            observed_issue: issue.to_string(),
            next,
            session_complete,
        })
    }
}
