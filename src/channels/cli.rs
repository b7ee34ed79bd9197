//! CLI channel: stdin/stdout REPL for local testing.

use std::sync::LazyLock;

use async_trait::async_trait;
use futures::stream;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, EventPayload, IncomingMessage, MessageStream, Reply, TextFormat};
use crate::error::ChannelError;

/// Sender id given to everything typed on the terminal.
pub const LOCAL_USER: &str = "local-user";

/// Lines starting with this are delivered as menu selections.
const SELECTION_PREFIX: &str = "lang:";

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("valid tag pattern"));

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel {
    user_id: String,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            user_id: LOCAL_USER.to_string(),
        }
    }

    /// Use `user_id` as the sender of typed lines.
    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one typed line into an event. Blank lines yield nothing.
pub fn parse_line(line: &str) -> Option<EventPayload> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with(SELECTION_PREFIX) {
        return Some(EventPayload::Selection(line.to_string()));
    }
    Some(EventPayload::from_text(line))
}

/// Render a reply for the terminal: markup removed, menu listed below the text.
pub fn render_reply(reply: &Reply) -> String {
    let mut out = match reply.format {
        TextFormat::Plain => reply.text.clone(),
        TextFormat::Html => HTML_TAG
            .replace_all(&reply.text, "")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&amp;", "&"),
    };
    for option in &reply.menu {
        out.push_str(&format!("\n  [{}] {}", option.tag, option.label));
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let user_id = self.user_id.clone();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprintln!("Type /start to begin. Pick a language by typing e.g. lang:en.");
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(payload) = parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        let msg = IncomingMessage::new("cli", &user_id, payload);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(&self, _msg: &IncomingMessage, reply: Reply) -> Result<(), ChannelError> {
        println!("\n{}\n", render_reply(&reply));
        eprint!("> ");
        Ok(())
    }

    async fn send_to(&self, chat_id: &str, reply: Reply) -> Result<(), ChannelError> {
        println!("\n[to {chat_id}]\n{}\n", render_reply(&reply));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::channels::{Command, MenuOption};

    #[test]
    fn lines_map_to_events() {
        assert_eq!(parse_line("   "), None);
        assert_eq!(
            parse_line("/start"),
            Some(EventPayload::Command(Command::Start))
        );
        assert_eq!(
            parse_line(" lang:uk "),
            Some(EventPayload::Selection("lang:uk".into()))
        );
        assert_eq!(
            parse_line("Anna Li"),
            Some(EventPayload::Text("Anna Li".into()))
        );
    }

    #[test]
    fn html_is_flattened() {
        let reply = Reply::html("<b>Name:</b> A &amp; B");
        assert_eq!(render_reply(&reply), "Name: A & B");
    }

    #[test]
    fn menu_is_listed() {
        let reply = Reply::plain("Pick").with_menu(vec![MenuOption {
            label: "English".into(),
            tag: "lang:en".into(),
        }]);
        assert_eq!(render_reply(&reply), "Pick\n  [lang:en] English");
    }
}
