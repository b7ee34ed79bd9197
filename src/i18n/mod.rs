//! Localized user-facing strings.
//!
//! Lookup is two-level: the requested language first, then the table's fixed
//! fallback language. A key missing from both renders as its own name, so a
//! localization gap never fails a conversation.

mod tables;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Languages the bot can talk in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    En,
    Uk,
    Ru,
}

impl Language {
    /// All supported languages, in menu order.
    pub const ALL: [Language; 3] = [Language::Uk, Language::En, Language::Ru];

    /// Short tag used in selection payloads and configuration.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Uk => "uk",
            Self::Ru => "ru",
        }
    }

    /// Parse a language tag. Case-insensitive, surrounding whitespace ignored.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "en" => Some(Self::En),
            "uk" | "ua" => Some(Self::Uk),
            "ru" => Some(Self::Ru),
            _ => None,
        }
    }

    /// Name of the language in that language, used for menu labels.
    pub fn native_name(&self) -> &'static str {
        match self {
            Self::En => "🇬🇧 English",
            Self::Uk => "🇺🇦 Українська",
            Self::Ru => "Русский",
        }
    }

    /// Answers that confirm the summary in this language.
    pub fn affirmative_tokens(&self) -> &'static [&'static str] {
        match self {
            Self::En => &["yes", "y", "+"],
            Self::Uk => &["так", "т", "yes", "y", "+"],
            Self::Ru => &["да", "д", "yes", "y", "+"],
        }
    }

    /// Answers that reject the summary in this language.
    pub fn negative_tokens(&self) -> &'static [&'static str] {
        match self {
            Self::En => &["no", "n", "-"],
            Self::Uk => &["ні", "н", "no", "n", "-"],
            Self::Ru => &["нет", "н", "no", "n", "-"],
        }
    }

    /// Whether `text` is one of this language's affirmative answers.
    pub fn is_affirmative(&self, text: &str) -> bool {
        let answer = text.trim().to_lowercase();
        self.affirmative_tokens().contains(&answer.as_str())
    }

    /// Whether `text` is one of this language's negative answers.
    pub fn is_negative(&self, text: &str) -> bool {
        let answer = text.trim().to_lowercase();
        self.negative_tokens().contains(&answer.as_str())
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::En
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Identifies one user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    ChooseLanguage,
    Welcome,
    NameInvalid,
    NameAccepted,
    AgeInvalid,
    AgeAccepted,
    PhoneInvalid,
    ConfirmSummary,
    ConfirmClarify,
    Success,
    SubmitFailed,
    Restart,
    Cancelled,
    NothingToCancel,
    StartHint,
    Help,
    StatsDenied,
    StatsReport,
    StatsFailed,
    AdminNotification,
}

impl std::fmt::Display for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Localized string table with a fixed fallback language.
#[derive(Debug, Clone)]
pub struct StringTable {
    fallback: Language,
    entries: HashMap<(Language, MessageKey), String>,
}

impl StringTable {
    /// Create an empty table.
    pub fn new(fallback: Language) -> Self {
        Self {
            fallback,
            entries: HashMap::new(),
        }
    }

    /// The table shipped with the bot, covering every key in every language.
    pub fn builtin() -> Self {
        let mut table = Self::new(Language::En);
        for (language, key, text) in tables::ENTRIES {
            table.insert(*language, *key, *text);
        }
        table
    }

    /// Add or replace one entry.
    pub fn insert(&mut self, language: Language, key: MessageKey, text: impl Into<String>) {
        self.entries.insert((language, key), text.into());
    }

    /// The language consulted when the requested one lacks a key.
    pub fn fallback(&self) -> Language {
        self.fallback
    }

    /// Render `key` in `language`, replacing each `{name}` placeholder with
    /// its value from `substitutions`.
    pub fn lookup(&self, language: Language, key: MessageKey, substitutions: &[(&str, &str)]) -> String {
        let template = self
            .entries
            .get(&(language, key))
            .or_else(|| self.entries.get(&(self.fallback, key)));

        let Some(template) = template else {
            tracing::warn!(%language, %key, "No string for key in requested or fallback language");
            return key.to_string();
        };

        let mut text = template.clone();
        for (name, value) in substitutions {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }

    /// Shorthand for a lookup without substitutions.
    pub fn get(&self, language: Language, key: MessageKey) -> String {
        self.lookup(language, key, &[])
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Escape text for inclusion in a Telegram HTML message.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
