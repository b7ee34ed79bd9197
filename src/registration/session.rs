//! Per-user registration sessions and the store that owns them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::i18n::Language;

use super::record::RegistrationRecord;
use super::state::RegistrationState;
use super::validators::PhoneNumber;

/// In-progress registration of one user.
#[derive(Debug, Clone)]
pub struct RegistrationSession {
    pub language: Language,
    pub state: RegistrationState,
    pub name: Option<String>,
    pub age: Option<u32>,
    pub phone: Option<PhoneNumber>,
    pub last_activity: Instant,
}

impl RegistrationSession {
    /// A fresh session waiting for a language choice.
    pub fn new(language: Language) -> Self {
        Self {
            language,
            state: RegistrationState::LanguageSelect,
            name: None,
            age: None,
            phone: None,
            last_activity: Instant::now(),
        }
    }

    /// Move to `target`, rejecting transitions the state machine forbids.
    pub fn transition_to(&mut self, target: RegistrationState) -> Result<(), String> {
        if !self.state.can_transition_to(target) {
            return Err(format!("Cannot transition from {} to {}", self.state, target));
        }
        debug!(from = %self.state, to = %target, "Registration state transition");
        self.state = target;
        Ok(())
    }

    /// Drop every collected field except the language and return to the
    /// name prompt.
    pub fn restart(&mut self) -> Result<(), String> {
        self.transition_to(RegistrationState::CollectName)?;
        self.name = None;
        self.age = None;
        self.phone = None;
        Ok(())
    }

    /// Record that the user just interacted with the session.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Build the record to persist. `None` until every field is collected.
    pub fn to_record(&self, username: Option<&str>, user_id: &str) -> Option<RegistrationRecord> {
        let name = self.name.as_deref()?;
        let age = self.age?;
        let phone = self.phone.as_ref()?;
        Some(RegistrationRecord::new(
            name,
            age,
            phone.canonical.as_str(),
            username,
            user_id,
        ))
    }
}

/// Holder for at most one session of one user.
///
/// The store hands out the slot behind a per-user lock; holding the guard
/// serializes every transition of that user's session.
#[derive(Debug, Default)]
pub struct SessionSlot {
    session: Option<RegistrationSession>,
}

impl SessionSlot {
    /// Start a new session, discarding any existing one.
    pub fn create(&mut self, language: Language) -> &mut RegistrationSession {
        self.session.insert(RegistrationSession::new(language))
    }

    /// The live session, if any.
    pub fn get(&self) -> Option<&RegistrationSession> {
        self.session.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut RegistrationSession> {
        self.session.as_mut()
    }

    /// End the session, returning it.
    pub fn destroy(&mut self) -> Option<RegistrationSession> {
        self.session.take()
    }

    pub fn is_empty(&self) -> bool {
        self.session.is_none()
    }
}

/// In-memory store of registration sessions keyed by user identifier.
#[derive(Debug, Default)]
pub struct SessionStore {
    slots: RwLock<HashMap<String, Arc<Mutex<SessionSlot>>>>,
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Lock the slot of `user_id`, creating an empty one if needed.
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<SessionSlot> {
        let existing = self.slots.read().await.get(user_id).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                let mut slots = self.slots.write().await;
                Arc::clone(slots.entry(user_id.to_string()).or_default())
            }
        };
        slot.lock_owned().await
    }

    /// Copy of a user's current session.
    pub async fn snapshot(&self, user_id: &str) -> Option<RegistrationSession> {
        let slot = self.slots.read().await.get(user_id).cloned()?;
        let guard = slot.lock().await;
        guard.get().cloned()
    }

    /// Number of users with a live session. Never waits on a slot: one
    /// that is busy handling an event counts as live.
    pub async fn active_count(&self) -> usize {
        self.slots
            .read()
            .await
            .values()
            .filter(|slot| slot.try_lock().map_or(true, |guard| !guard.is_empty()))
            .count()
    }

    /// Destroy sessions idle for longer than `max_idle` and forget empty
    /// slots. Slots busy handling an event are skipped. Returns the number of
    /// sessions destroyed.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let mut slots = self.slots.write().await;
        let mut pruned = 0;

        slots.retain(|user_id, slot| {
            let Ok(mut guard) = slot.try_lock() else {
                return true;
            };
            let idle = guard
                .get()
                .is_some_and(|s| s.last_activity.elapsed() >= max_idle);
            if idle {
                guard.destroy();
                pruned += 1;
                debug!(user_id = %user_id, "Pruned idle registration session");
            }
            // Someone may hold the slot without having locked it yet.
            !guard.is_empty() || Arc::strong_count(slot) > 1
        });

        if pruned > 0 {
            info!(pruned, "Idle registration sessions pruned");
        }
        pruned
    }
}

/// Spawn a background task pruning idle sessions every `interval`.
pub fn spawn_prune_task(
    store: Arc<SessionStore>,
    max_idle: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            store.prune_idle(max_idle).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_session() -> RegistrationSession {
        let mut session = RegistrationSession::new(Language::Uk);
        session.transition_to(RegistrationState::CollectName).unwrap();
        session.name = Some("Anna Li".into());
        session.transition_to(RegistrationState::CollectAge).unwrap();
        session.age = Some(25);
        session.transition_to(RegistrationState::CollectPhone).unwrap();
        session.phone = Some(PhoneNumber {
            canonical: "+380501234567".into(),
            local: "0501234567".into(),
        });
        session.transition_to(RegistrationState::Confirm).unwrap();
        session
    }

    #[test]
    fn transition_rejects_skips() {
        let mut session = RegistrationSession::new(Language::En);
        assert!(session.transition_to(RegistrationState::Confirm).is_err());
        assert_eq!(session.state, RegistrationState::LanguageSelect);
    }

    #[test]
    fn restart_keeps_only_language() {
        let mut session = complete_session();
        session.restart().unwrap();
        assert_eq!(session.state, RegistrationState::CollectName);
        assert_eq!(session.language, Language::Uk);
        assert!(session.name.is_none());
        assert!(session.age.is_none());
        assert!(session.phone.is_none());
    }

    #[test]
    fn record_uses_canonical_phone() {
        let record = complete_session().to_record(Some("anna"), "42").unwrap();
        assert_eq!(record.phone, "+380501234567");
        assert_eq!(record.age, 25);
        assert_eq!(record.username, "anna");
    }

    #[test]
    fn record_requires_all_fields() {
        let mut session = complete_session();
        session.age = None;
        assert!(session.to_record(None, "42").is_none());
    }

    #[tokio::test]
    async fn slot_lifecycle() {
        let store = SessionStore::new();
        {
            let mut slot = store.lock("1").await;
            assert!(slot.is_empty());
            slot.create(Language::Ru);
        }
        assert_eq!(store.snapshot("1").await.unwrap().language, Language::Ru);
        assert_eq!(store.active_count().await, 1);

        store.lock("1").await.destroy();
        assert!(store.snapshot("1").await.is_none());
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_user() {
        let store = SessionStore::new();
        store.lock("1").await.create(Language::En);
        store.lock("2").await.create(Language::Uk);

        store.lock("1").await.destroy();

        assert!(store.snapshot("1").await.is_none());
        assert_eq!(store.snapshot("2").await.unwrap().language, Language::Uk);
    }

    #[tokio::test]
    async fn prune_idle_destroys_stale_sessions() {
        let store = SessionStore::new();
        store.lock("1").await.create(Language::En);

        assert_eq!(store.prune_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(store.active_count().await, 1);

        assert_eq!(store.prune_idle(Duration::ZERO).await, 1);
        assert_eq!(store.active_count().await, 0);
        assert!(store.slots.read().await.is_empty());
    }

    #[tokio::test]
    async fn active_count_does_not_wait_for_busy_slots() {
        let store = SessionStore::new();
        let mut busy = store.lock("1").await;
        busy.create(Language::En);
        store.lock("2").await.create(Language::Uk);
        drop(store.lock("3").await);

        let count = tokio::time::timeout(Duration::from_secs(1), store.active_count())
            .await
            .expect("active_count blocked on a held slot");
        assert_eq!(count, 2);
        drop(busy);
    }

    #[tokio::test]
    async fn prune_skips_busy_slots() {
        let store = SessionStore::new();
        let mut guard = store.lock("1").await;
        guard.create(Language::En);

        assert_eq!(store.prune_idle(Duration::ZERO).await, 0);
        drop(guard);
        assert_eq!(store.prune_idle(Duration::ZERO).await, 1);
    }
}
