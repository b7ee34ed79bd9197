//! RegistrationMachine: turns inbound events into session transitions and
//! localized replies.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::channels::{Command, EventPayload, IncomingMessage, MenuOption, Reply};
use crate::i18n::{Language, MessageKey, StringTable};
use crate::notify::{AdminNotifier, AdminRoster};
use crate::store::RegistrationSink;

use super::record::{RegistrationRecord, StoredRegistration};
use super::session::{RegistrationSession, SessionSlot, SessionStore};
use super::state::RegistrationState;
use super::validators::{
    AgeRange, DEFAULT_MAX_NAME_LENGTH, normalize_phone, parse_age, sanitize, validate_name,
};

/// Prefix of the selection tags carried by the language menu.
pub const LANGUAGE_SELECTION_PREFIX: &str = "lang:";

/// Tunable policy of the conversation.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub age_range: AgeRange,
    pub max_name_length: usize,
    /// Language used before the user picks one.
    pub default_language: Language,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            age_range: AgeRange::default(),
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            default_language: Language::En,
        }
    }
}

/// What handling one event produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandleOutcome {
    /// Replies to send back, in order.
    pub replies: Vec<Reply>,
    /// State of the user's session afterwards. Terminal states are reported
    /// even though the session itself is gone; `None` means there was no
    /// session to act on.
    pub state: Option<RegistrationState>,
}

impl HandleOutcome {
    fn reply(reply: Reply, state: Option<RegistrationState>) -> Self {
        Self {
            replies: vec![reply],
            state,
        }
    }

    fn silent(state: Option<RegistrationState>) -> Self {
        Self {
            replies: Vec::new(),
            state,
        }
    }
}

/// Drives the registration conversation of every user.
pub struct RegistrationMachine {
    sessions: Arc<SessionStore>,
    strings: Arc<StringTable>,
    config: MachineConfig,
    sink: Arc<dyn RegistrationSink>,
    notifier: Arc<dyn AdminNotifier>,
    admins: AdminRoster,
}

impl RegistrationMachine {
    pub fn new(
        sessions: Arc<SessionStore>,
        strings: Arc<StringTable>,
        config: MachineConfig,
        sink: Arc<dyn RegistrationSink>,
        notifier: Arc<dyn AdminNotifier>,
        admins: AdminRoster,
    ) -> Self {
        Self {
            sessions,
            strings,
            config,
            sink,
            notifier,
            admins,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Handle one inbound event.
    ///
    /// The user's session slot stays locked until the event is fully handled,
    /// including the sink call on confirmation, so a user's events never
    /// interleave.
    pub async fn handle(&self, msg: &IncomingMessage) -> HandleOutcome {
        let mut slot = self.sessions.lock(&msg.user_id).await;
        if let Some(session) = slot.get_mut() {
            session.touch();
        }

        match &msg.payload {
            EventPayload::Command(command) => self.handle_command(&mut slot, msg, command).await,
            EventPayload::Selection(tag) => self.handle_selection(&mut slot, msg, tag),
            EventPayload::Text(text) => self.handle_text(&mut slot, msg, text).await,
        }
    }

    async fn handle_command(
        &self,
        slot: &mut SessionSlot,
        msg: &IncomingMessage,
        command: &Command,
    ) -> HandleOutcome {
        match command {
            Command::Start | Command::Register => {
                if slot.get().is_some() {
                    debug!(user_id = %msg.user_id, "Discarding previous registration session");
                }
                slot.create(self.config.default_language);
                info!(user_id = %msg.user_id, channel = %msg.channel, "Registration started");
                HandleOutcome::reply(self.language_prompt(), Some(RegistrationState::LanguageSelect))
            }
            Command::Cancel => self.cancel(slot, msg),
            Command::Help => {
                let language = self.language_of(slot);
                let min = self.config.age_range.min.to_string();
                let max = self.config.age_range.max.to_string();
                let text = self.strings.lookup(
                    language,
                    MessageKey::Help,
                    &[("min", min.as_str()), ("max", max.as_str())],
                );
                HandleOutcome::reply(Reply::html(text), current_state(slot))
            }
            Command::Stats => {
                let reply = self.stats_reply(msg, self.language_of(slot)).await;
                HandleOutcome::reply(reply, current_state(slot))
            }
            Command::Unknown(name) => {
                debug!(user_id = %msg.user_id, command = %name, "Ignoring unknown command");
                HandleOutcome::silent(current_state(slot))
            }
        }
    }

    fn handle_selection(&self, slot: &mut SessionSlot, msg: &IncomingMessage, tag: &str) -> HandleOutcome {
        let Some(session) = live_session(slot) else {
            return self.start_hint();
        };
        if session.state != RegistrationState::LanguageSelect {
            debug!(user_id = %msg.user_id, state = %session.state, "Ignoring selection outside language choice");
            return HandleOutcome::silent(Some(session.state));
        }

        let Some(language) = tag
            .strip_prefix(LANGUAGE_SELECTION_PREFIX)
            .and_then(Language::from_tag)
        else {
            debug!(user_id = %msg.user_id, tag = %tag, "Ignoring unsupported language selection");
            return HandleOutcome::silent(Some(session.state));
        };

        session.language = language;
        if let Err(e) = session.transition_to(RegistrationState::CollectName) {
            warn!(user_id = %msg.user_id, error = %e, "Language selection rejected");
            return HandleOutcome::silent(Some(session.state));
        }
        debug!(user_id = %msg.user_id, %language, "Language selected");
        HandleOutcome::reply(
            Reply::plain(self.strings.get(language, MessageKey::Welcome)),
            Some(session.state),
        )
    }

    async fn handle_text(&self, slot: &mut SessionSlot, msg: &IncomingMessage, text: &str) -> HandleOutcome {
        let Some(session) = live_session(slot) else {
            return self.start_hint();
        };

        let state = session.state;
        match state {
            RegistrationState::LanguageSelect => HandleOutcome::silent(Some(state)),
            RegistrationState::CollectName => self.collect_name(session, text),
            RegistrationState::CollectAge => self.collect_age(session, text),
            RegistrationState::CollectPhone => self.collect_phone(session, text),
            RegistrationState::Confirm => self.confirm(slot, msg, text).await,
            RegistrationState::Completed | RegistrationState::Cancelled => self.start_hint(),
        }
    }

    fn collect_name(&self, session: &mut RegistrationSession, text: &str) -> HandleOutcome {
        let language = session.language;
        let name = sanitize(text, self.config.max_name_length);
        if !validate_name(&name) {
            return HandleOutcome::reply(
                Reply::plain(self.strings.get(language, MessageKey::NameInvalid)),
                Some(session.state),
            );
        }

        if let Err(e) = session.transition_to(RegistrationState::CollectAge) {
            warn!(error = %e, "Name step transition rejected");
            return HandleOutcome::silent(Some(session.state));
        }
        let min = self.config.age_range.min.to_string();
        let max = self.config.age_range.max.to_string();
        let text = self.strings.lookup(
            language,
            MessageKey::NameAccepted,
            &[("name", name.as_str()), ("min", min.as_str()), ("max", max.as_str())],
        );
        session.name = Some(name);
        HandleOutcome::reply(Reply::plain(text), Some(session.state))
    }

    fn collect_age(&self, session: &mut RegistrationSession, text: &str) -> HandleOutcome {
        let language = session.language;
        let Some(age) = parse_age(text, &self.config.age_range) else {
            let min = self.config.age_range.min.to_string();
            let max = self.config.age_range.max.to_string();
            let text = self.strings.lookup(
                language,
                MessageKey::AgeInvalid,
                &[("min", min.as_str()), ("max", max.as_str())],
            );
            return HandleOutcome::reply(Reply::plain(text), Some(session.state));
        };

        if let Err(e) = session.transition_to(RegistrationState::CollectPhone) {
            warn!(error = %e, "Age step transition rejected");
            return HandleOutcome::silent(Some(session.state));
        }
        session.age = Some(age);
        HandleOutcome::reply(
            Reply::plain(self.strings.get(language, MessageKey::AgeAccepted)),
            Some(session.state),
        )
    }

    fn collect_phone(&self, session: &mut RegistrationSession, text: &str) -> HandleOutcome {
        let language = session.language;
        let Some(phone) = normalize_phone(text) else {
            return HandleOutcome::reply(
                Reply::plain(self.strings.get(language, MessageKey::PhoneInvalid)),
                Some(session.state),
            );
        };

        if let Err(e) = session.transition_to(RegistrationState::Confirm) {
            warn!(error = %e, "Phone step transition rejected");
            return HandleOutcome::silent(Some(session.state));
        }
        let name = session.name.clone().unwrap_or_default();
        let age = session.age.map(|a| a.to_string()).unwrap_or_default();
        let text = self.strings.lookup(
            language,
            MessageKey::ConfirmSummary,
            &[
                ("name", name.as_str()),
                ("age", age.as_str()),
                ("phone", phone.canonical.as_str()),
                ("phone_local", phone.local.as_str()),
            ],
        );
        session.phone = Some(phone);
        HandleOutcome::reply(Reply::plain(text), Some(session.state))
    }

    async fn confirm(&self, slot: &mut SessionSlot, msg: &IncomingMessage, text: &str) -> HandleOutcome {
        let Some(session) = slot.get_mut() else {
            return self.start_hint();
        };
        let language = session.language;

        if language.is_negative(text) {
            if let Err(e) = session.restart() {
                warn!(user_id = %msg.user_id, error = %e, "Restart rejected");
                return HandleOutcome::silent(Some(session.state));
            }
            debug!(user_id = %msg.user_id, "Registration restarted by user");
            return HandleOutcome::reply(
                Reply::plain(self.strings.get(language, MessageKey::Restart)),
                Some(session.state),
            );
        }

        if !language.is_affirmative(text) {
            return HandleOutcome::reply(
                Reply::plain(self.strings.get(language, MessageKey::ConfirmClarify)),
                Some(session.state),
            );
        }

        let record = session.to_record(msg.username.as_deref(), &msg.user_id);
        if let Err(e) = session.transition_to(RegistrationState::Completed) {
            warn!(user_id = %msg.user_id, error = %e, "Completion transition rejected");
        }
        // The session ends here whatever the sink does.
        slot.destroy();

        let Some(record) = record else {
            error!(user_id = %msg.user_id, "Confirmed session is missing fields");
            return self.submit_failed(language);
        };

        match self.submit(&record).await {
            Some(stored) => {
                info!(user_id = %record.user_id, "Registration completed");
                self.notify_admins(&stored).await;
                HandleOutcome::reply(
                    Reply::plain(self.strings.get(language, MessageKey::Success)),
                    Some(RegistrationState::Completed),
                )
            }
            None => self.submit_failed(language),
        }
    }

    /// Persist `record` once. Sink errors and panics are both reported as `None`.
    async fn submit(&self, record: &RegistrationRecord) -> Option<StoredRegistration> {
        match AssertUnwindSafe(self.sink.append(record)).catch_unwind().await {
            Ok(Ok(stored)) => Some(stored),
            Ok(Err(e)) => {
                error!(sink = self.sink.name(), user_id = %record.user_id, error = %e, "Failed to save registration");
                None
            }
            Err(_) => {
                error!(sink = self.sink.name(), user_id = %record.user_id, "Sink panicked while saving registration");
                None
            }
        }
    }

    async fn notify_admins(&self, stored: &StoredRegistration) {
        let notifier = &self.notifier;
        let sends = self.admins.iter().map(|admin| async move {
            match AssertUnwindSafe(notifier.notify(admin, stored)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(admin = %admin, error = %e, "Failed to notify admin"),
                Err(_) => error!(admin = %admin, "Notifier panicked while notifying admin"),
            }
        });
        join_all(sends).await;
    }

    fn cancel(&self, slot: &mut SessionSlot, msg: &IncomingMessage) -> HandleOutcome {
        let Some(session) = live_session(slot) else {
            return HandleOutcome::reply(
                Reply::plain(
                    self.strings
                        .get(self.config.default_language, MessageKey::NothingToCancel),
                ),
                None,
            );
        };

        let language = session.language;
        if let Err(e) = session.transition_to(RegistrationState::Cancelled) {
            warn!(user_id = %msg.user_id, error = %e, "Cancel transition rejected");
        }
        slot.destroy();
        info!(user_id = %msg.user_id, "Registration cancelled");
        HandleOutcome::reply(
            Reply::plain(self.strings.get(language, MessageKey::Cancelled)),
            Some(RegistrationState::Cancelled),
        )
    }

    async fn stats_reply(&self, msg: &IncomingMessage, language: Language) -> Reply {
        if !self.admins.contains(&msg.user_id) {
            warn!(user_id = %msg.user_id, "Stats requested by non-admin");
            return Reply::plain(self.strings.get(language, MessageKey::StatsDenied));
        }

        match self.sink.stats().await {
            Ok(stats) => {
                let total = stats.total.to_string();
                let today = stats.today.to_string();
                let week = stats.this_week.to_string();
                let month = stats.this_month.to_string();
                Reply::html(self.strings.lookup(
                    language,
                    MessageKey::StatsReport,
                    &[
                        ("total", total.as_str()),
                        ("today", today.as_str()),
                        ("week", week.as_str()),
                        ("month", month.as_str()),
                    ],
                ))
            }
            Err(e) => {
                error!(sink = self.sink.name(), error = %e, "Failed to load registration stats");
                Reply::plain(self.strings.get(language, MessageKey::StatsFailed))
            }
        }
    }

    /// Trilingual prompt with one menu option per supported language.
    fn language_prompt(&self) -> Reply {
        let menu = Language::ALL
            .iter()
            .map(|language| MenuOption {
                label: language.native_name().to_string(),
                tag: format!("{LANGUAGE_SELECTION_PREFIX}{}", language.tag()),
            })
            .collect();
        Reply::plain(
            self.strings
                .get(self.config.default_language, MessageKey::ChooseLanguage),
        )
        .with_menu(menu)
    }

    fn start_hint(&self) -> HandleOutcome {
        HandleOutcome::reply(
            Reply::plain(
                self.strings
                    .get(self.config.default_language, MessageKey::StartHint),
            ),
            None,
        )
    }

    fn submit_failed(&self, language: Language) -> HandleOutcome {
        HandleOutcome::reply(
            Reply::plain(self.strings.get(language, MessageKey::SubmitFailed)),
            Some(RegistrationState::Completed),
        )
    }

    fn language_of(&self, slot: &SessionSlot) -> Language {
        slot.get()
            .map(|s| s.language)
            .unwrap_or(self.config.default_language)
    }
}

fn live_session(slot: &mut SessionSlot) -> Option<&mut RegistrationSession> {
    slot.get_mut().filter(|s| !s.state.is_terminal())
}

fn current_state(slot: &SessionSlot) -> Option<RegistrationState> {
    slot.get().map(|s| s.state)
}
