//! Forecast Bot Library
//!
//! Per-operator forecast sessions that poll a result feed and publish
//! size predictions to a Telegram channel.

pub mod config;
pub mod feed;
pub mod gateway;
pub mod issue;
pub mod menu;
pub mod outcome;
pub mod poller;
pub mod presentation;
pub mod runner;
pub mod server;
pub mod session;
pub mod store;
pub mod types;


// Re-export main types for convenience
pub use config::{Branding, Config, Interval, OperatorEntry};
pub use feed::{HttpResultFeed, ResultFeed};
pub use gateway::{InlineKeyboardMarkup, MessagingGateway, TelegramClient, Update};
pub use menu::OperatorCommand;
pub use outcome::Bucket;
pub use runner::ForecastRunner;
pub use session::{ForecastSession, Prediction, Resolution, SessionPhase, TickOutcome};
pub use store::SessionStore;
pub use types::{BotError, ChatId, MessageRef, OperatorId, Result, Round};
