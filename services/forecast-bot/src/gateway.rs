//! Messaging gateway
//!
//! The runner talks to chats only through [`MessagingGateway`]. The Telegram
//! Bot API implementation lives here together with the inbound update types
//! the webhook receives.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::types::{BotError, ChatId, MessageRef, Result};

/// Timeout for Bot API calls
const TELEGRAM_TIMEOUT_SECS: u64 = 30;

/// Outbound chat operations
#[async_trait::async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send a new message, returning a handle for later edits
    async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageRef>;

    /// Replace the text (and keyboard) of a sent message
    async fn edit_message(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<()>;

    /// Dismiss the loading indicator of a pressed button
    async fn answer_callback(&self, _callback_id: &str) -> Result<()> {
        Ok(())
    }
}

// --- Telegram wire types ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// Inbound update delivered to the webhook
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

impl Message {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: ChatId::from(self.chat.id),
            message_id: self.message_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct EditMessageRequest<'a> {
    chat_id: &'a str,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
}

/// Telegram Bot API client
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    /// Create new client for `{api_url}/bot{token}`
    pub fn new(api_url: &str, bot_token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TELEGRAM_TIMEOUT_SECS))
            .build()
            .map_err(|e| BotError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), bot_token),
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BotError::Gateway(format!("{} request failed: {}", method, e)))?;

        let api: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| BotError::Gateway(format!("{} returned invalid JSON: {}", method, e)))?;

        if !api.ok {
            return Err(BotError::Gateway(format!(
                "{} failed: {}",
                method,
                api.description.unwrap_or_default()
            )));
        }

        api.result
            .ok_or_else(|| BotError::Gateway(format!("{} returned no result", method)))
    }

    /// Register the webhook URL updates are pushed to
    pub async fn set_webhook(&self, url: &str) -> Result<()> {
        let _: bool = self.call("setWebhook", &SetWebhookRequest { url }).await?;
        info!("Webhook registered at {}", url);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessagingGateway for TelegramClient {
    async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageRef> {
        let req = SendMessageRequest {
            chat_id: chat_id.as_str(),
            text,
            reply_markup: keyboard,
        };
        let message: Message = self.call("sendMessage", &req).await?;
        debug!("Sent message {} to {}", message.message_id, chat_id);

        Ok(MessageRef {
            chat_id: chat_id.clone(),
            message_id: message.message_id,
        })
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let req = EditMessageRequest {
            chat_id: message.chat_id.as_str(),
            message_id: message.message_id,
            text,
            reply_markup: keyboard,
        };

        // Result is the edited Message, or `true` for inline messages
        match self.call::<_, serde_json::Value>("editMessageText", &req).await {
            Ok(_) => Ok(()),
            Err(BotError::Gateway(msg)) if msg.contains("message is not modified") => {
                debug!("Message {} unchanged", message.message_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &AnswerCallbackRequest {
                    callback_query_id: callback_id,
                },
            )
            .await?;
        Ok(())
    }
}
