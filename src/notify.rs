//! Administrator roster and new-registration notifications.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::channels::{Channel, Reply};
use crate::error::ChannelError;
use crate::i18n::{Language, MessageKey, StringTable, escape_html};
use crate::registration::StoredRegistration;

/// Chat identifiers of the administrators. Order is stable, duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminRoster {
    ids: BTreeSet<String>,
}

impl AdminRoster {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids
            .into_iter()
            .map(Into::into)
            .map(|id: String| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        Self { ids }
    }

    /// Parse a comma-separated list of chat ids. Blank entries are skipped.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Add one more id.
    pub fn insert(&mut self, id: &str) {
        let id = id.trim();
        if !id.is_empty() {
            self.ids.insert(id.to_string());
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Delivers a new-registration notice to one administrator.
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify(&self, recipient: &str, registration: &StoredRegistration) -> Result<(), ChannelError>;
}

/// Render the HTML notice about `registration`, escaping every user-supplied field.
pub fn render_notification(
    strings: &StringTable,
    language: Language,
    registration: &StoredRegistration,
) -> String {
    let record = &registration.record;
    let name = escape_html(&record.name);
    let age = record.age.to_string();
    let phone = escape_html(&record.phone);
    let username = escape_html(&record.username);
    let user_id = escape_html(&record.user_id);
    let registered_at = registration.registered_at_display();
    strings.lookup(
        language,
        MessageKey::AdminNotification,
        &[
            ("name", name.as_str()),
            ("age", age.as_str()),
            ("phone", phone.as_str()),
            ("username", username.as_str()),
            ("user_id", user_id.as_str()),
            ("registered_at", registered_at.as_str()),
        ],
    )
}

/// Sends notifications through a chat channel.
pub struct ChannelNotifier {
    channel: Arc<dyn Channel>,
    strings: Arc<StringTable>,
    language: Language,
}

impl ChannelNotifier {
    pub fn new(channel: Arc<dyn Channel>, strings: Arc<StringTable>, language: Language) -> Self {
        Self {
            channel,
            strings,
            language,
        }
    }
}

#[async_trait]
impl AdminNotifier for ChannelNotifier {
    async fn notify(&self, recipient: &str, registration: &StoredRegistration) -> Result<(), ChannelError> {
        let text = render_notification(&self.strings, self.language, registration);
        self.channel.send_to(recipient, Reply::html(text)).await?;
        debug!(recipient = %recipient, channel = self.channel.name(), "Admin notified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::registration::RegistrationRecord;

    #[test]
    fn roster_parses_comma_separated_ids() {
        let roster = AdminRoster::parse(" 12, 34 ,,12,");
        assert_eq!(roster.len(), 2);
        assert!(roster.contains("12"));
        assert!(roster.contains("34"));
        assert_eq!(roster.iter().collect::<Vec<_>>(), vec!["12", "34"]);
    }

    #[test]
    fn empty_roster() {
        let mut roster = AdminRoster::parse("");
        assert!(roster.is_empty());
        roster.insert("  ");
        assert!(roster.is_empty());
        roster.insert("99");
        assert!(roster.contains("99"));
    }

    #[test]
    fn notification_escapes_user_fields() {
        let record = RegistrationRecord::new("Anna <b>", 25, "+380501234567", Some("a&b"), "42");
        let stored = StoredRegistration::stamp_now(record);
        let text = render_notification(&StringTable::builtin(), Language::En, &stored);

        assert!(text.contains("Anna &lt;b&gt;"));
        assert!(text.contains("a&amp;b"));
        assert!(text.contains("+380501234567"));
        assert!(text.contains("42"));
        assert!(text.contains(&stored.registered_at_display()));
        assert!(!text.contains("{name}"));
    }
}
