//! Telegram channel: long-polls the Bot API for updates.
//!
//! Text messages become commands or free text, inline-keyboard presses become
//! selections. Replies are sent with `sendMessage`, HTML-formatted when the
//! reply asks for it, with menus rendered as an inline keyboard.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::channels::{
    Channel, EventPayload, IncomingMessage, MenuOption, MessageStream, Reply, TextFormat,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Long-poll timeout handed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause before polling again after a failed `getUpdates`.
const POLL_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// Telegram channel: connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Talk to a different Bot API server (e.g. a local one).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// Send a reply, splitting text over Telegram's 4096 char limit. The menu
    /// is attached to the last chunk.
    async fn send_message(&self, chat_id: &str, reply: &Reply) -> Result<(), ChannelError> {
        let chunks = split_message(&reply.text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let menu: &[MenuOption] = if i == last { reply.menu.as_slice() } else { &[] };
            self.send_message_chunk(chat_id, chunk, reply.format, menu)
                .await?;
        }
        Ok(())
    }

    /// Send a single message chunk (≤4096 chars). HTML that Telegram refuses
    /// is retried as plain text.
    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        format: TextFormat,
        menu: &[MenuOption],
    ) -> Result<(), ChannelError> {
        let body = message_body(chat_id, text, format, menu);
        let resp = self.post("sendMessage", &body).await?;

        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status();
        let err = resp.text().await.unwrap_or_default();
        if format == TextFormat::Plain {
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage returned {status}: {err}"),
            });
        }

        tracing::warn!(
            status = ?status,
            "Telegram sendMessage with HTML failed; retrying without parse_mode"
        );

        let plain_body = message_body(chat_id, text, TextFormat::Plain, menu);
        let plain_resp = self.post("sendMessage", &plain_body).await?;
        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage failed (html: {status}, plain: {plain_err})"),
            });
        }

        Ok(())
    }

    async fn post(&self, method: &str, body: &Value) -> Result<reqwest::Response, ChannelError> {
        self.client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let updates_url = self.api_url("getUpdates");
        let answer_url = self.api_url("answerCallbackQuery");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&updates_url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                if !data.get("ok").and_then(Value::as_bool).unwrap_or(false) {
                    let code = data.get("error_code").and_then(Value::as_i64).unwrap_or_default();
                    let description = data
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("no description");
                    tracing::warn!(code, "Telegram getUpdates refused: {description}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update) else {
                        continue;
                    };

                    if let Some(query_id) =
                        incoming.metadata.get("callback_query_id").and_then(Value::as_str)
                    {
                        let ack = serde_json::json!({ "callback_query_id": query_id });
                        if let Err(e) = client.post(&answer_url).json(&ack).send().await {
                            tracing::warn!("Telegram answerCallbackQuery failed: {e}");
                        }
                    }

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn respond(&self, msg: &IncomingMessage, reply: Reply) -> Result<(), ChannelError> {
        self.send_message(&msg.chat_id, &reply).await
    }

    async fn send_to(&self, chat_id: &str, reply: Reply) -> Result<(), ChannelError> {
        self.send_message(chat_id, &reply).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Convert one `getUpdates` entry into an event. Updates without text or
/// callback data, or without a sender, yield `None`.
fn parse_update(update: &Value) -> Option<IncomingMessage> {
    if let Some(message) = update.get("message") {
        let text = message.get("text").and_then(Value::as_str)?;
        let from = message.get("from")?;
        let user_id = from.get("id").and_then(Value::as_i64)?.to_string();
        let chat_id = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)
            .map(|id| id.to_string())
            .unwrap_or_else(|| user_id.clone());

        let mut incoming = IncomingMessage::new("telegram", &user_id, EventPayload::from_text(text))
            .with_chat_id(&chat_id);
        if let Some(username) = from.get("username").and_then(Value::as_str) {
            incoming = incoming.with_username(username);
        }
        return Some(incoming);
    }

    let query = update.get("callback_query")?;
    let data = query.get("data").and_then(Value::as_str)?;
    let from = query.get("from")?;
    let user_id = from.get("id").and_then(Value::as_i64)?.to_string();
    let chat_id = query
        .get("message")
        .and_then(|m| m.get("chat"))
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_else(|| user_id.clone());
    let query_id = query.get("id").and_then(Value::as_str).unwrap_or_default();

    let mut incoming = IncomingMessage::new(
        "telegram",
        &user_id,
        EventPayload::Selection(data.to_string()),
    )
    .with_chat_id(&chat_id)
    .with_metadata(serde_json::json!({ "callback_query_id": query_id }));
    if let Some(username) = from.get("username").and_then(Value::as_str) {
        incoming = incoming.with_username(username);
    }
    Some(incoming)
}

/// Build a `sendMessage` request body.
fn message_body(chat_id: &str, text: &str, format: TextFormat, menu: &[MenuOption]) -> Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
    });
    if format == TextFormat::Html {
        body["parse_mode"] = Value::String("HTML".into());
    }
    if !menu.is_empty() {
        let rows: Vec<Value> = menu
            .iter()
            .map(|option| {
                serde_json::json!([{
                    "text": option.label,
                    "callback_data": option.tag,
                }])
            })
            .collect();
        body["reply_markup"] = serde_json::json!({ "inline_keyboard": rows });
    }
    body
}

/// Split a message into chunks of at most `max_len` characters.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        // Byte offset of the first character past the limit.
        let Some((limit, _)) = remaining.char_indices().nth(max_len) else {
            chunks.push(remaining.to_string());
            break;
        };

        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
        if remaining.is_empty() {
            break;
        }
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
