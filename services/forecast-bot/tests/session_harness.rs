//! End-to-end forecast session harness
//!
//! Drives the runner through operator commands and scripted feed rounds:
//! command → session → poll tick → channel + operator messages


use forecast_bot::menu::{
    interval_menu, main_menu, running_menu, OperatorCommand, SELECT_INTERVAL_TEXT, STOPPED_TEXT,
};
use forecast_bot::presentation::SESSION_ENDED_OPERATOR;
use forecast_bot::{ChatId, Config, ForecastRunner, Interval, OperatorId, SessionPhase, Update};
use mock_gateway::{RecordingGateway, ScriptedFeed};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

const OPERATOR: &str = "111";
const CHANNEL: &str = "-1001";

struct Harness {
    runner: Arc<ForecastRunner>,
    feed: Arc<ScriptedFeed>,
    gateway: Arc<RecordingGateway>,
    operator: OperatorId,
}

impl Harness {
    /// Poll period long enough that only manual ticks drive the session
    fn new() -> Self {
        Self::with_poll_period_ms("3600000")
    }

    fn with_poll_period_ms(period: &str) -> Self {
        let env: HashMap<&str, String> = [
            ("BOT_TOKEN", "test-token".to_string()),
            ("ADMIN1_ID", OPERATOR.to_string()),
            ("CHANNEL1_ID", CHANNEL.to_string()),
            ("ADMIN2_ID", "222".to_string()),
            ("CHANNEL2_ID", "-1002".to_string()),
            ("POLL_PERIOD_MS", period.to_string()),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|key: &str| env.get(key).cloned()).unwrap();

        let feed = Arc::new(ScriptedFeed::new());
        let gateway = Arc::new(RecordingGateway::new());
        let runner = ForecastRunner::new(config, feed.clone(), gateway.clone());

        Self {
            runner,
            feed,
            gateway,
            operator: ChatId::from(OPERATOR),
        }
    }

    async fn command(&self, command: OperatorCommand) {
        self.runner
            .handle_command(&self.operator, command, None)
            .await
            .unwrap();
    }

    async fn start(&self, interval: Interval, win_limit: u32) {
        self.command(OperatorCommand::SelectInterval(interval)).await;
        self.command(OperatorCommand::SelectWinLimit(win_limit)).await;
    }

    /// Feed one round and run a single tick for the current session
    async fn round(&self, issue: u64, number: u32) {
        self.feed.set(&issue.to_string(), number);
        let Some(session_id) = self.runner.store().current_id(&self.operator).await else {
            return;
        };
        self.runner
            .tick(&self.operator, session_id, &CancellationToken::new())
            .await
            .unwrap();
    }

    /// Anchor at 100, warm up, first prediction BIG for 104
    async fn warm_up(&self) {
        for issue in 100..=103 {
            self.round(issue, 4).await;
        }
    }
}

#[tokio::test]
async fn test_full_session_until_win_limit() {
    let h = Harness::new();
    h.start(Interval::Min1, 3).await;

    let announcement = &h.gateway.sent_to(CHANNEL)[0];
    assert!(announcement.text.contains("Wingo 1m predictions"));
    let started = &h.gateway.sent_to(OPERATOR)[0];
    assert_eq!(
        started.text,
        "✅ Forecast session started!\nInterval: 1M\nWin Limit: 3"
    );
    assert_eq!(started.keyboard, Some(running_menu()));

    h.warm_up().await;
    let first = h.gateway.sent_to(CHANNEL).last().cloned().unwrap();
    assert_eq!(
        first.text,
        "🎯 NEXT PREDICTION ON WINGO 1M\nISSUE: 104\nSIZE: BIG\nAMOUNT: 1RS\n🏆 Wins: 0 / 3"
    );

    // loss, loss, win, win, win
    h.round(104, 2).await; // SMALL vs BIG; next BIG @105, stake 3
    h.round(105, 2).await; // SMALL vs BIG; next BIG @106, stake 9
    let second_loss = h.gateway.sent_to(CHANNEL).last().cloned().unwrap();
    assert!(second_loss.text.starts_with("AGAIN 3X!!!"));
    assert!(second_loss.text.contains("ISSUE: 106\nSIZE: BIG\nAMOUNT: 9RS"));

    h.round(106, 7).await; // win; next SMALL @107
    h.round(107, 2).await; // win; next BIG @108
    {
        let shared = h.runner.store().get(&h.operator).await.unwrap();
        let session = shared.lock().await;
        assert_eq!(session.win_count, 2);
        assert_eq!(session.current_stake, 1);
        assert_eq!(session.phase, SessionPhase::Running);
    }
    h.round(108, 9).await; // win; limit reached

    assert!(!h.runner.store().contains(&h.operator).await);

    let channel = h.gateway.sent_to(CHANNEL);
    // announcement + first prediction + 5 resolutions + closing
    assert_eq!(channel.len(), 8);
    assert_eq!(channel[6].text, "✅ WIN! (BIG for issue 108)\n🏆 Wins: 3 / 3");
    assert!(channel[7].text.starts_with("✅ Our prediction session has come to an end!"));

    let final_status = h.gateway.edits().last().cloned().unwrap();
    assert!(final_status
        .text
        .contains("Winning Issue Numbers:\n106\n107\n108\nNext prediction:"));

    let notice = h.gateway.sent_to(OPERATOR).last().cloned().unwrap();
    assert_eq!(notice.text, SESSION_ENDED_OPERATOR);
    assert_eq!(notice.keyboard, Some(interval_menu()));

    // Terminal: later rounds produce nothing
    let before = h.gateway.sent().len();
    h.round(109, 1).await;
    assert_eq!(h.gateway.sent().len(), before);
}

#[tokio::test]
async fn test_status_message_edited_in_place() {
    let h = Harness::new();
    h.start(Interval::Min3, 5).await;
    h.warm_up().await;

    let status = h.gateway.sent_to(OPERATOR).last().cloned().unwrap();
    assert!(status.text.contains("Next prediction ready: ISSUE 104 SIZE BIG AMOUNT 1RS"));

    h.round(104, 3).await;
    h.round(105, 8).await;

    let edits = h.gateway.edits();
    assert_eq!(edits.len(), 2);
    assert!(edits.iter().all(|e| e.message.message_id == status.message_id));
    assert!(edits[0].text.starts_with("AGAIN 3X!!! (BIG for issue 104)"));
}

#[tokio::test]
async fn test_duplicate_round_sends_nothing() {
    let h = Harness::new();
    h.start(Interval::Sec30, 3).await;
    h.warm_up().await;

    h.round(104, 1).await;
    let count = h.gateway.sent().len();
    h.round(104, 1).await;
    h.round(104, 1).await;
    assert_eq!(h.gateway.sent().len(), count);
}

#[tokio::test]
async fn test_stop_cancels_session() {
    let h = Harness::new();
    h.start(Interval::Min1, 3).await;
    let session_id = h.runner.store().current_id(&h.operator).await.unwrap();
    assert!(h.runner.store().is_polling(&h.operator).await);

    h.warm_up().await;
    h.command(OperatorCommand::Stop).await;

    assert!(!h.runner.store().contains(&h.operator).await);
    let notice = h.gateway.sent_to(OPERATOR).last().cloned().unwrap();
    assert!(notice
        .text
        .starts_with(&format!("{}\n🏆 Wins: 0 / 3\n⏱ Ran for ", STOPPED_TEXT)));
    assert_eq!(notice.keyboard, Some(main_menu()));

    // A tick for the stopped session is a no-op
    let channel_before = h.gateway.sent_to(CHANNEL).len();
    h.feed.set("104", 7);
    assert_ok!(
        h.runner
            .tick(&h.operator, session_id, &CancellationToken::new())
            .await
    );
    assert_eq!(h.gateway.sent_to(CHANNEL).len(), channel_before);
}

#[tokio::test]
async fn test_reconfigure_replaces_running_session() {
    let h = Harness::new();
    h.start(Interval::Min1, 3).await;
    let old_id = h.runner.store().current_id(&h.operator).await.unwrap();
    h.warm_up().await;

    h.command(OperatorCommand::SelectInterval(Interval::Min5)).await;

    let new_id = h.runner.store().current_id(&h.operator).await.unwrap();
    assert_ne!(old_id, new_id);
    assert!(!h.runner.store().is_polling(&h.operator).await);
    {
        let shared = h.runner.store().get(&h.operator).await.unwrap();
        let session = shared.lock().await;
        assert_eq!(session.phase, SessionPhase::Configuring);
        assert_eq!(session.interval, Some(Interval::Min5));
        assert!(session.pending_prediction.is_none());
    }

    let before = h.gateway.sent().len();
    h.feed.set("104", 7);
    assert_ok!(
        h.runner
            .tick(&h.operator, old_id, &CancellationToken::new())
            .await
    );
    assert_eq!(h.gateway.sent().len(), before);
}

#[tokio::test]
async fn test_win_limit_without_interval_reopens_menu() {
    let h = Harness::new();
    h.command(OperatorCommand::SelectWinLimit(5)).await;

    assert!(!h.runner.store().contains(&h.operator).await);
    let reply = h.gateway.sent_to(OPERATOR).last().cloned().unwrap();
    assert_eq!(reply.text, SELECT_INTERVAL_TEXT);
    assert_eq!(reply.keyboard, Some(interval_menu()));
}

#[tokio::test]
async fn test_feed_errors_are_skipped() {
    let h = Harness::new();
    h.start(Interval::Min1, 3).await;
    h.round(100, 4).await;

    h.feed.fail(true);
    h.round(101, 4).await;
    {
        let shared = h.runner.store().get(&h.operator).await.unwrap();
        assert_eq!(shared.lock().await.last_observed_issue.as_deref(), Some("100"));
    }

    h.feed.fail(false);
    h.round(101, 4).await;
    h.round(102, 4).await;
    h.round(103, 4).await;
    let shared = h.runner.store().get(&h.operator).await.unwrap();
    assert!(shared.lock().await.pending_prediction.is_some());
}

#[tokio::test]
async fn test_operators_are_isolated() {
    let h = Harness::new();
    let other = ChatId::from("222");
    h.start(Interval::Min1, 3).await;
    h.runner
        .handle_command(&other, OperatorCommand::SelectInterval(Interval::Min3), None)
        .await
        .unwrap();

    h.warm_up().await;

    let shared = h.runner.store().get(&other).await.unwrap();
    let session = shared.lock().await;
    assert_eq!(session.phase, SessionPhase::Configuring);
    assert!(session.last_observed_issue.is_none());
    assert!(h.gateway.sent_to("-1002").is_empty());
}

#[tokio::test]
async fn test_unknown_operator_ignored() {
    let h = Harness::new();
    let update: Update = serde_json::from_value(serde_json::json!({
        "update_id": 1,
        "callback_query": {
            "id": "cb-1",
            "data": "interval_1m",
            "message": {"message_id": 5, "chat": {"id": 999}}
        }
    }))
    .unwrap();

    h.runner.handle_update(update).await;

    assert!(h.gateway.is_silent());
    assert!(h.gateway.answered().is_empty());
    assert!(h.runner.store().is_empty().await);
}

#[tokio::test]
async fn test_callback_navigation_edits_origin() {
    let h = Harness::new();
    let update: Update = serde_json::from_value(serde_json::json!({
        "update_id": 2,
        "callback_query": {
            "id": "cb-2",
            "data": "interval_3m",
            "message": {"message_id": 41, "chat": {"id": 111}}
        }
    }))
    .unwrap();

    h.runner.handle_update(update).await;

    assert_eq!(h.gateway.answered(), vec!["cb-2".to_string()]);
    let edit = h.gateway.edits().last().cloned().unwrap();
    assert_eq!(edit.message.message_id, 41);
    assert_eq!(edit.text, "Interval selected: 3M\nChoose winning limit:");
    assert!(h.runner.store().contains(&h.operator).await);
}

#[tokio::test]
async fn test_start_text_sends_main_menu() {
    let h = Harness::new();
    let update: Update = serde_json::from_value(serde_json::json!({
        "update_id": 3,
        "message": {"message_id": 1, "chat": {"id": 111}, "text": "/start"}
    }))
    .unwrap();

    h.runner.handle_update(update).await;

    let reply = h.gateway.sent_to(OPERATOR).last().cloned().unwrap();
    assert_eq!(reply.text, "Welcome! Choose an action:");
    assert_eq!(reply.keyboard, Some(main_menu()));
}

#[tokio::test]
async fn test_poller_drives_session() {
    let h = Harness::with_poll_period_ms("10");
    h.feed.set("100", 4);
    h.start(Interval::Min1, 3).await;

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(h.feed.calls() >= 2);
    {
        let shared = h.runner.store().get(&h.operator).await.unwrap();
        assert_eq!(shared.lock().await.start_issue.as_deref(), Some("100"));
    }

    h.command(OperatorCommand::Stop).await;
    let calls = h.feed.calls();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.feed.calls(), calls);
}

#[tokio::test]
async fn test_idle_sweep_stops_sessions() {
    let h = Harness::new();
    h.start(Interval::Min1, 3).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    h.runner.sweep_idle(Duration::from_millis(10)).await;

    assert!(!h.runner.store().contains(&h.operator).await);
    let notice = h.gateway.sent_to(OPERATOR).last().cloned().unwrap();
    assert!(notice.text.contains("inactivity"));
}

/// Spawn a losing tick for 104 whose channel post is held up by the gateway
async fn spawn_slow_losing_tick(h: &Harness) -> tokio::task::JoinHandle<()> {
    h.gateway
        .delay_sends_containing("AGAIN", Duration::from_millis(200));
    h.feed.set("104", 2);
    let session_id = h.runner.store().current_id(&h.operator).await.unwrap();

    let runner = Arc::clone(&h.runner);
    let operator = h.operator.clone();
    let tick = tokio::spawn(async move {
        runner
            .tick(&operator, session_id, &CancellationToken::new())
            .await
            .unwrap();
    });

    // Let the tick take the session lock and start sending
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!tick.is_finished());
    tick
}

#[tokio::test]
async fn test_stop_waits_for_dispatching_tick() {
    let h = Harness::new();
    h.start(Interval::Min1, 3).await;
    h.warm_up().await;

    let tick = spawn_slow_losing_tick(&h).await;
    h.command(OperatorCommand::Stop).await;

    let sent_at_return = h.gateway.sent().len();
    let edits_at_return = h.gateway.edits().len();
    tick.await.unwrap();
    assert_eq!(h.gateway.sent().len(), sent_at_return);
    assert_eq!(h.gateway.edits().len(), edits_at_return);

    // The loss landed before the stop notice, never after it
    let sent = h.gateway.sent();
    let loss = sent.iter().position(|m| m.text.starts_with("AGAIN")).unwrap();
    let stop = sent.iter().position(|m| m.text.starts_with(STOPPED_TEXT)).unwrap();
    assert!(loss < stop);
    assert_eq!(sent.last().map(|m| m.text.starts_with(STOPPED_TEXT)), Some(true));
}

#[tokio::test]
async fn test_reconfigure_waits_for_dispatching_tick() {
    let h = Harness::new();
    h.start(Interval::Min1, 3).await;
    h.warm_up().await;

    let tick = spawn_slow_losing_tick(&h).await;
    h.command(OperatorCommand::SelectInterval(Interval::Min5)).await;
    h.command(OperatorCommand::SelectWinLimit(5)).await;

    let sent_at_return = h.gateway.sent().len();
    let edits_at_return = h.gateway.edits().len();
    tick.await.unwrap();
    assert_eq!(h.gateway.sent().len(), sent_at_return);
    assert_eq!(h.gateway.edits().len(), edits_at_return);

    let channel = h.gateway.sent_to(CHANNEL);
    let loss = channel.iter().position(|m| m.text.starts_with("AGAIN")).unwrap();
    let announcement = channel
        .iter()
        .position(|m| m.text.contains("Wingo 5m predictions"))
        .unwrap();
    assert!(loss < announcement);
    assert_eq!(announcement, channel.len() - 1);

    let shared = h.runner.store().get(&h.operator).await.unwrap();
    let session = shared.lock().await;
    assert_eq!(session.interval, Some(Interval::Min5));
    assert_eq!(session.phase, SessionPhase::Running);
}
