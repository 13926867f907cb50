//! Operator command surface: callback data parsing and inline keyboards

use crate::config::{parse_win_limit, Interval, WIN_LIMIT_OPTIONS};
use crate::gateway::{InlineKeyboardButton, InlineKeyboardMarkup};

pub const WELCOME_TEXT: &str = "Welcome! Choose an action:";
pub const SELECT_INTERVAL_TEXT: &str = "Select interval:";
pub const STOPPED_TEXT: &str = "⏹ Forecasting stopped.";
pub const IDLE_STOPPED_TEXT: &str = "⏹ Forecasting stopped after inactivity.";

/// A command issued by an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// `/start` text command
    Welcome,
    /// Navigate back to the main menu
    MainMenu,
    /// Open (or return to) the interval menu
    IntervalMenu,
    SelectInterval(Interval),
    SelectWinLimit(u32),
    Stop,
}

impl OperatorCommand {
    /// Parse inline-keyboard callback data
    pub fn from_callback(data: &str) -> Option<Self> {
        match data {
            "main" => return Some(Self::MainMenu),
            "start_menu" | "interval_back" => return Some(Self::IntervalMenu),
            "stop" => return Some(Self::Stop),
            _ => {}
        }

        if let Some(label) = data.strip_prefix("interval_") {
            return label.parse().ok().map(Self::SelectInterval);
        }
        if let Some(limit) = data.strip_prefix("win_") {
            return parse_win_limit(limit).map(Self::SelectWinLimit);
        }
        None
    }

    /// Parse a text message
    pub fn from_text(text: &str) -> Option<Self> {
        let command = text.split_whitespace().next()?;
        // Accept `/start@BotName` as sent in groups
        let command = command.split('@').next().unwrap_or(command);
        (command == "/start").then_some(Self::Welcome)
    }
}

pub fn interval_selected_text(interval: Interval) -> String {
    format!(
        "Interval selected: {}\nChoose winning limit:",
        interval.as_str().to_uppercase()
    )
}

pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![InlineKeyboardButton::new("Start", "start_menu")]],
    }
}

pub fn interval_menu() -> InlineKeyboardMarkup {
    let intervals = Interval::ALL
        .iter()
        .map(|i| InlineKeyboardButton::new(i.as_str(), format!("interval_{}", i.as_str())))
        .collect();

    InlineKeyboardMarkup {
        inline_keyboard: vec![intervals, vec![back_button("main")]],
    }
}

pub fn win_limit_menu() -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = WIN_LIMIT_OPTIONS
        .iter()
        .map(|n| vec![InlineKeyboardButton::new(format!("{} Wins", n), format!("win_{}", n))])
        .collect();
    rows.push(vec![back_button("interval_back")]);

    InlineKeyboardMarkup {
        inline_keyboard: rows,
    }
}

/// Keyboard attached to the running-session status message
pub fn running_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![
            InlineKeyboardButton::new("⏹ Stop", "stop"),
            back_button("main"),
        ]],
    }
}

fn back_button(target: &str) -> InlineKeyboardButton {
    InlineKeyboardButton::new("⬅️ Back", target)
}
