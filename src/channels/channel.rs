//! Channel trait and the message types that cross it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Bot commands understood by the registration flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Start,
    Register,
    Cancel,
    Help,
    Stats,
    Unknown(String),
}

impl Command {
    /// Parse a `/command` line. Returns `None` for text that is not a
    /// command. A `@botname` suffix and trailing arguments are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word).to_lowercase();
        let command = match name.as_str() {
            "start" => Self::Start,
            "register" => Self::Register,
            "cancel" => Self::Cancel,
            "help" => Self::Help,
            "stats" => Self::Stats,
            _ => Self::Unknown(name),
        };
        Some(command)
    }
}

/// What a user sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EventPayload {
    /// Free text typed by the user.
    Text(String),
    /// A discrete choice, e.g. the data tag of a pressed button.
    Selection(String),
    Command(Command),
}

impl EventPayload {
    /// Classify a typed line: commands start with `/`, everything else is text.
    pub fn from_text(text: &str) -> Self {
        match Command::parse(text) {
            Some(command) => Self::Command(command),
            None => Self::Text(text.to_string()),
        }
    }
}

/// An inbound event from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Channel the event arrived on.
    pub channel: String,
    /// Stable identifier of the sender; sessions are keyed by it.
    pub user_id: String,
    /// Where replies go. Equal to `user_id` for private chats.
    pub chat_id: String,
    /// Platform username, if the sender has one.
    pub username: Option<String>,
    pub payload: EventPayload,
    pub received_at: DateTime<Utc>,
    /// Channel-specific extras (e.g. a callback query id to acknowledge).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, payload: EventPayload) -> Self {
        Self {
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            chat_id: user_id.to_string(),
            username: None,
            payload,
            received_at: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_chat_id(mut self, chat_id: &str) -> Self {
        self.chat_id = chat_id.to_string();
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// How the text of a reply should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    #[default]
    Plain,
    Html,
}

/// One option of a reply menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub label: String,
    /// Delivered back as `EventPayload::Selection` when chosen.
    pub tag: String,
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub format: TextFormat,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu: Vec<MenuOption>,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Html,
            menu: Vec::new(),
        }
    }

    pub fn with_menu(mut self, menu: Vec<MenuOption>) -> Self {
        self.menu = menu;
        self
    }
}

/// Stream of inbound events produced by `Channel::start`.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A chat transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Short channel name for logs.
    fn name(&self) -> &str;

    /// Begin receiving events.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Reply to the chat an event came from.
    async fn respond(&self, msg: &IncomingMessage, reply: Reply) -> Result<(), ChannelError>;

    /// Send a message to an arbitrary chat.
    async fn send_to(&self, chat_id: &str, reply: Reply) -> Result<(), ChannelError>;

    /// Check the transport is reachable.
    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("  /REGISTER  "), Some(Command::Register));
        assert_eq!(Command::parse("/cancel@worker_bot"), Some(Command::Cancel));
        assert_eq!(Command::parse("/help me"), Some(Command::Help));
        assert_eq!(Command::parse("/stats"), Some(Command::Stats));
        assert_eq!(Command::parse("/foo"), Some(Command::Unknown("foo".into())));
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(Command::parse("start"), None);
        assert_eq!(Command::parse("/"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn payload_from_text() {
        assert_eq!(EventPayload::from_text("/start"), EventPayload::Command(Command::Start));
        assert_eq!(EventPayload::from_text("John"), EventPayload::Text("John".into()));
    }

    #[test]
    fn incoming_message_defaults_chat_to_user() {
        let msg = IncomingMessage::new("telegram", "42", EventPayload::Text("hi".into()));
        assert_eq!(msg.chat_id, "42");
        assert!(msg.username.is_none());

        let msg = msg.with_chat_id("-100").with_username("anna");
        assert_eq!(msg.chat_id, "-100");
        assert_eq!(msg.username.as_deref(), Some("anna"));
    }

    #[test]
    fn reply_constructors() {
        assert_eq!(Reply::plain("a").format, TextFormat::Plain);
        assert_eq!(Reply::html("<b>a</b>").format, TextFormat::Html);
        let reply = Reply::plain("pick").with_menu(vec![MenuOption {
            label: "English".into(),
            tag: "lang:en".into(),
        }]);
        assert_eq!(reply.menu.len(), 1);
    }
}
