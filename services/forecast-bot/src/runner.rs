//! Forecast Runner - routes operator commands and drives poll ticks

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, Interval, OperatorEntry};
use crate::feed::ResultFeed;
use crate::gateway::{InlineKeyboardMarkup, MessagingGateway, Update};
use crate::menu::{
    interval_menu, interval_selected_text, main_menu, running_menu, win_limit_menu,
    OperatorCommand, IDLE_STOPPED_TEXT, SELECT_INTERVAL_TEXT, STOPPED_TEXT, WELCOME_TEXT,
};
use crate::poller::spawn_poller;
use crate::presentation::{render, stop_summary, SessionEvent};
use crate::session::{ForecastSession, TickOutcome};
use crate::store::{SessionStore, SharedSession};
use crate::types::{BotError, ChatId, MessageRef, OperatorId, Result};

/// How often idle operators are looked for
const IDLE_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Owns the session store and every outbound effect
pub struct ForecastRunner {
    config: Config,
    store: Arc<SessionStore>,
    feed: Arc<dyn ResultFeed>,
    gateway: Arc<dyn MessagingGateway>,
}

impl ForecastRunner {
    /// Create new runner
    pub fn new(
        config: Config,
        feed: Arc<dyn ResultFeed>,
        gateway: Arc<dyn MessagingGateway>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store: Arc::new(SessionStore::new()),
            feed,
            gateway,
        })
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Run background maintenance until `shutdown` fires
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(
            "Forecast runner started for {} operator(s)",
            self.config.operators.len()
        );

        let Some(timeout) = self.config.idle_timeout else {
            debug!("Idle sweep disabled");
            shutdown.cancelled().await;
            return Ok(());
        };

        let mut sweep_interval = interval(IDLE_SWEEP_PERIOD);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Forecast runner shutting down");
                    break;
                }
                _ = sweep_interval.tick() => {
                    self.sweep_idle(timeout).await;
                }
            }
        }

        Ok(())
    }

    /// Entry point for one inbound update
    pub async fn handle_update(self: &Arc<Self>, update: Update) {
        let (operator, command, origin) = if let Some(query) = update.callback_query {
            let Some(message) = query.message else {
                debug!("Callback {} without message", query.id);
                return;
            };
            let operator = ChatId::from(message.chat.id);
            if self.config.operator(&operator).is_none() {
                debug!("Ignoring callback from {}", operator);
                return;
            }
            if let Err(e) = self.gateway.answer_callback(&query.id).await {
                warn!("Failed to answer callback {}: {}", query.id, e);
            }
            let command = query.data.as_deref().and_then(OperatorCommand::from_callback);
            (operator, command, Some(message.message_ref()))
        } else if let Some(message) = update.message {
            let operator = ChatId::from(message.chat.id);
            if self.config.operator(&operator).is_none() {
                debug!("Ignoring message from {}", operator);
                return;
            }
            let command = message.text.as_deref().and_then(OperatorCommand::from_text);
            (operator, command, None)
        } else {
            debug!("Update {} carries nothing to handle", update.update_id);
            return;
        };

        let Some(command) = command else {
            debug!("Unrecognized input from {}", operator);
            return;
        };

        if let Err(e) = self.handle_command(&operator, command, origin).await {
            error!("Command {:?} from {} failed: {}", command, operator, e);
        }
    }

    /// Apply one operator command
    ///
    /// Navigation edits `origin` (the message carrying the pressed button)
    /// when present and sends a fresh message otherwise.
    pub async fn handle_command(
        self: &Arc<Self>,
        operator: &OperatorId,
        command: OperatorCommand,
        origin: Option<MessageRef>,
    ) -> Result<()> {
        self.store.touch(operator).await;

        match command {
            OperatorCommand::Welcome => {
                self.gateway
                    .send_message(operator, WELCOME_TEXT, Some(&main_menu()))
                    .await?;
            }
            OperatorCommand::MainMenu => {
                self.show(operator, origin, WELCOME_TEXT, main_menu()).await?;
            }
            OperatorCommand::IntervalMenu => {
                self.show(operator, origin, SELECT_INTERVAL_TEXT, interval_menu())
                    .await?;
            }
            OperatorCommand::SelectInterval(interval) => {
                self.select_interval(operator, interval).await?;
                self.show(operator, origin, &interval_selected_text(interval), win_limit_menu())
                    .await?;
            }
            OperatorCommand::SelectWinLimit(win_limit) => {
                self.start_session(operator, win_limit).await?;
            }
            OperatorCommand::Stop => {
                self.stop_session(operator, STOPPED_TEXT).await;
            }
        }

        Ok(())
    }

    /// Replace the operator's session with a fresh one bound to `interval`
    ///
    /// Any running session is cancelled, and a tick of it still dispatching
    /// finishes before this returns.
    pub async fn select_interval(&self, operator: &OperatorId, interval: Interval) -> Result<Uuid> {
        let entry = self.operator_entry(operator)?;
        let mut session = self.new_session(entry);
        session.select_interval(interval)?;
        let session_id = session.id;

        let (_, displaced) = self.store.insert(session).await;
        self.retire(displaced).await;
        info!("Operator {} selected interval {}", operator, interval);
        Ok(session_id)
    }

    /// Start forecasting with `win_limit` on the configured interval
    pub async fn start_session(self: &Arc<Self>, operator: &OperatorId, win_limit: u32) -> Result<()> {
        let entry = self.operator_entry(operator)?.clone();

        let selected = match self.store.get(operator).await {
            Some(shared) => {
                let session = shared.lock().await;
                session.interval
            }
            None => None,
        };
        let Some(interval) = selected else {
            warn!("Win limit chosen by {} before an interval", operator);
            self.gateway
                .send_message(operator, SELECT_INTERVAL_TEXT, Some(&interval_menu()))
                .await?;
            return Ok(());
        };

        // Re-selecting a win limit restarts from scratch on the same interval
        let mut session = self.new_session(&entry);
        session.select_interval(interval)?;
        session.start(win_limit)?;
        let session_id = session.id;
        let started = render(&SessionEvent::SessionStarted, &session, &self.config.branding);

        let (shared, displaced) = self.store.insert(session).await;
        self.retire(displaced).await;
        info!(
            "Session {} started for {}: interval {}, win limit {}",
            session_id, operator, interval, win_limit
        );

        if let Some(text) = started.channel {
            self.send(&entry.channel, &text, None).await;
        }
        if let Some(text) = started.operator {
            let status = self.send(operator, &text, Some(&running_menu())).await;
            shared.lock().await.status_message = status;
        }

        let runner = Arc::clone(self);
        let poll_operator = operator.clone();
        let handle = spawn_poller(self.config.poll_period, move |token| {
            let runner = Arc::clone(&runner);
            let operator = poll_operator.clone();
            async move {
                if let Err(e) = runner.tick(&operator, session_id, &token).await {
                    warn!("Tick for {} failed: {}", operator, e);
                }
            }
        });

        if !self.store.attach_poll(operator, session_id, handle).await {
            debug!("Session {} replaced before polling began", session_id);
        }
        Ok(())
    }

    /// Stop and discard the operator's session, then notify the operator
    ///
    /// Returns whether a session existed. An in-flight tick finishes before
    /// this returns, and no tick runs afterwards.
    pub async fn stop_session(&self, operator: &OperatorId, notice: &str) -> bool {
        let removed = self.store.remove(operator).await;
        let mut text = notice.to_string();

        if let Some(shared) = &removed {
            let mut session = shared.lock().await;
            session.end();
            info!(
                "Session {} for {} stopped at {} win(s)",
                session.id, operator, session.win_count
            );
            if let Some(summary) = stop_summary(&session, Utc::now()) {
                text.push('\n');
                text.push_str(&summary);
            }
        }

        self.send(operator, &text, Some(&main_menu())).await;
        removed.is_some()
    }

    /// One poll step for `session_id`
    pub async fn tick(
        &self,
        operator: &OperatorId,
        session_id: Uuid,
        token: &CancellationToken,
    ) -> Result<()> {
        let Some(shared) = self.store.get(operator).await else {
            token.cancel();
            return Ok(());
        };

        let interval = {
            let session = shared.lock().await;
            if session.id != session_id || !session.is_running() {
                return Ok(());
            }
            session.interval
        };
        let Some(interval) = interval else {
            return Ok(());
        };

        // Fetch without holding the session lock
        let fetched = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            fetched = self.feed.latest(interval) => fetched,
        };
        let round = match fetched {
            Ok(Some(round)) => round,
            Ok(None) => {
                debug!("Feed {} has no round yet", interval);
                return Ok(());
            }
            Err(e) => {
                warn!("Feed error for {}: {}", operator, e);
                return Ok(());
            }
        };

        let mut session = shared.lock().await;
        if token.is_cancelled() || session.id != session_id {
            return Ok(());
        }

        let branding = &self.config.branding;
        match session.observe(&round) {
            TickOutcome::Ignored => {}
            TickOutcome::Anchored => {
                debug!("Session {} anchored at {}", session_id, round.issue);
            }
            TickOutcome::WarmingUp { elapsed } => {
                debug!(
                    "Session {} warming up: {}/{} rounds",
                    session_id,
                    elapsed,
                    session.warmup_rounds()
                );
            }
            TickOutcome::PredictionIssued(prediction) => {
                info!(
                    "Session {} first prediction: {} for {}",
                    session_id, prediction.bucket, prediction.target_issue
                );
                let rendered = render(&SessionEvent::PredictionIssued(prediction), &session, branding);
                if let Some(text) = rendered.channel {
                    self.send(&session.channel_id, &text, None).await;
                }
                if let Some(text) = rendered.operator {
                    let status = self.send(operator, &text, Some(&running_menu())).await;
                    if status.is_some() {
                        session.status_message = status;
                    }
                }
            }
            TickOutcome::Resolved(resolution) => {
                let complete = resolution.session_complete;
                info!(
                    "Session {} issue {}: {} (wins {}, stake {})",
                    session_id,
                    resolution.observed_issue,
                    if resolution.won { "win" } else { "loss" },
                    session.win_count,
                    session.current_stake
                );

                let rendered = render(&SessionEvent::resolved(resolution), &session, branding);
                if let Some(text) = rendered.channel {
                    self.send(&session.channel_id, &text, None).await;
                }
                if let Some(text) = rendered.operator {
                    let keyboard = (!complete).then(running_menu);
                    self.update_status(&mut session, operator, &text, keyboard.as_ref())
                        .await;
                }

                if complete {
                    let ended = render(&SessionEvent::SessionEnded, &session, branding);
                    if let Some(text) = ended.channel {
                        self.send(&session.channel_id, &text, None).await;
                    }
                    // Cancels this poll's own token; the tick still runs to the end
                    self.store.remove_if_current(operator, session_id).await;
                    info!("Session {} for {} reached its win limit", session_id, operator);
                    if let Some(text) = ended.operator {
                        self.send(operator, &text, Some(&interval_menu())).await;
                    }
                }
            }
        }

        Ok(())
    }

    /// Stop every session whose operator has been idle past `timeout`
    pub async fn sweep_idle(&self, timeout: Duration) {
        for operator in self.store.idle_operators(timeout).await {
            info!("Operator {} idle for over {:?}", operator, timeout);
            self.stop_session(&operator, IDLE_STOPPED_TEXT).await;
        }
    }

    /// End a displaced session once any tick holding it has finished
    async fn retire(&self, displaced: Option<SharedSession>) {
        if let Some(old) = displaced {
            let mut session = old.lock().await;
            session.end();
            debug!("Session {} retired", session.id);
        }
    }

    fn operator_entry(&self, operator: &OperatorId) -> Result<&OperatorEntry> {
        self.config
            .operator(operator)
            .ok_or_else(|| BotError::UnknownOperator(operator.clone()))
    }

    fn new_session(&self, entry: &OperatorEntry) -> ForecastSession {
        ForecastSession::new(entry.id.clone(), entry.channel.clone())
            .with_warmup_rounds(self.config.warmup_rounds)
    }

    /// Edit `origin` in place, or send a new message when there is none
    async fn show(
        &self,
        operator: &OperatorId,
        origin: Option<MessageRef>,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<()> {
        match origin {
            Some(message) => self.gateway.edit_message(&message, text, Some(&keyboard)).await,
            None => self
                .gateway
                .send_message(operator, text, Some(&keyboard))
                .await
                .map(|_| ()),
        }
    }

    /// Edit the operator's status message, falling back to a new one
    async fn update_status(
        &self,
        session: &mut ForecastSession,
        operator: &OperatorId,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) {
        if let Some(status) = &session.status_message {
            match self.gateway.edit_message(status, text, keyboard).await {
                Ok(()) => return,
                Err(e) => warn!("Failed to edit status for {}: {}", operator, e),
            }
        }
        if let Some(sent) = self.send(operator, text, keyboard).await {
            session.status_message = Some(sent);
        }
    }

    /// Send, logging rather than propagating failures
    async fn send(
        &self,
        chat_id: &ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Option<MessageRef> {
        match self.gateway.send_message(chat_id, text, keyboard).await {
            Ok(sent) => Some(sent),
            Err(e) => {
                warn!("Failed to send to {}: {}", chat_id, e);
                None
            }
        }
    }
}
