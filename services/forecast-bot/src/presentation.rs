//! Message rendering
//!
//! Pure functions from a session snapshot and an event to the text posted in
//! the channel and shown to the operator. No I/O happens here.

use chrono::{DateTime, Duration, Utc};

use crate::config::Branding;
use crate::session::{ForecastSession, Prediction, Resolution};

/// Session event to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SessionStarted,
    PredictionIssued(Prediction),
    ResolvedWin(Resolution),
    ResolvedLoss(Resolution),
    SessionEnded,
}

impl SessionEvent {
    pub fn resolved(resolution: Resolution) -> Self {
        if resolution.won {
            SessionEvent::ResolvedWin(resolution)
        } else {
            SessionEvent::ResolvedLoss(resolution)
        }
    }
}

/// Rendered text per audience; `None` means nothing is sent to it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub channel: Option<String>,
    pub operator: Option<String>,
}

/// Render an event for the channel and the operator
pub fn render(event: &SessionEvent, session: &ForecastSession, branding: &Branding) -> Rendered {
    match event {
        SessionEvent::SessionStarted => Rendered {
            channel: Some(start_announcement(session, branding)),
            operator: Some(format!(
                "✅ Forecast session started!\nInterval: {}\nWin Limit: {}",
                interval_label(session),
                win_limit(session)
            )),
        },
        SessionEvent::PredictionIssued(prediction) => Rendered {
            channel: Some(format!(
                "{}\n{}",
                prediction_block(session, prediction, branding),
                wins_line(session)
            )),
            operator: Some(format!(
                "✅ Forecast session started!\n{}\nNext prediction ready: ISSUE {} SIZE {} AMOUNT {}RS",
                wins_line(session),
                prediction.target_issue,
                prediction.bucket,
                session.current_stake
            )),
        },
        SessionEvent::ResolvedWin(resolution) | SessionEvent::ResolvedLoss(resolution) => Rendered {
            channel: Some(resolution_channel(session, resolution, branding)),
            operator: Some(resolution_operator(session, resolution)),
        },
        SessionEvent::SessionEnded => Rendered {
            channel: Some(closing_announcement(branding)),
            operator: Some(SESSION_ENDED_OPERATOR.to_string()),
        },
    }
}

/// Operator notice sent with the interval menu once a session completes
pub const SESSION_ENDED_OPERATOR: &str = "Session ended! Choose interval to start new session:";

/// Wins and running time appended to a stop notice
///
/// `None` for a session that never started.
pub fn stop_summary(session: &ForecastSession, now: DateTime<Utc>) -> Option<String> {
    let started_at = session.started_at?;
    Some(format!(
        "{}\n⏱ Ran for {}",
        wins_line(session),
        format_elapsed(now - started_at)
    ))
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn interval_label(session: &ForecastSession) -> String {
    session
        .interval
        .map(|i| i.as_str().to_uppercase())
        .unwrap_or_else(|| "-".to_string())
}

fn win_limit(session: &ForecastSession) -> u32 {
    session.win_limit.unwrap_or_default()
}

fn wins_line(session: &ForecastSession) -> String {
    format!("🏆 Wins: {} / {}", session.win_count, win_limit(session))
}

fn prediction_block(session: &ForecastSession, prediction: &Prediction, branding: &Branding) -> String {
    format!(
        "🎯 NEXT PREDICTION ON {} {}\nISSUE: {}\nSIZE: {}\nAMOUNT: {}RS",
        branding.game_name.to_uppercase(),
        interval_label(session),
        prediction.target_issue,
        prediction.bucket,
        session.current_stake
    )
}

fn outcome_line(resolution: &Resolution) -> String {
    if resolution.won {
        format!(
            "✅ WIN! ({} for issue {})",
            resolution.resolved.bucket, resolution.observed_issue
        )
    } else {
        "AGAIN 3X!!!".to_string()
    }
}

fn resolution_channel(session: &ForecastSession, resolution: &Resolution, branding: &Branding) -> String {
    let mut text = format!("{}\n{}", outcome_line(resolution), wins_line(session));
    if !resolution.session_complete {
        text.push_str("\n\n");
        text.push_str(&prediction_block(session, &resolution.next, branding));
    }
    text
}

fn resolution_operator(session: &ForecastSession, resolution: &Resolution) -> String {
    let header = if resolution.won { "✅ WIN!" } else { "AGAIN 3X!!!" };
    let mut text = format!(
        "{} ({} for issue {})\n{}\nWinning Issue Numbers:",
        header,
        resolution.resolved.bucket,
        resolution.observed_issue,
        wins_line(session)
    );
    for issue in &session.win_history {
        text.push('\n');
        text.push_str(issue);
    }
    text.push_str(&format!(
        "\nNext prediction:\n🎯 ISSUE: {}\nSIZE: {}\nAMOUNT: {}RS",
        resolution.next.target_issue, resolution.next.bucket, session.current_stake
    ));
    text
}

fn start_announcement(session: &ForecastSession, branding: &Branding) -> String {
    format!(
        "🚨 {game} Prediction Session Is Starting soon! 🎯\n\
         Get ready, everyone — we’re kicking off our next round of {game} {interval} predictions! 💥\n\
         Join in and let’s aim for another winning streak together. 💪\n\
         📲 Don’t forget to register here 👉 {url}\n\
         and predict with us live! 🔥",
        game = branding.game_name,
        interval = session.interval.map(|i| i.as_str()).unwrap_or("-"),
        url = branding.register_url
    )
}

fn closing_announcement(branding: &Branding) -> String {
    format!(
        "✅ Our prediction session has come to an end!\n\
         Thanks for joining, everyone. 🙌\n\
         Have great day and see you on the next session!\n\n\
         📲 Don’t forget to register here 👉 {}\n\n\
         and predict with us in real time! 🎯",
        branding.register_url
    )
}
