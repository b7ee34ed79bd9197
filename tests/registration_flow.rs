//! End-to-end registration conversations against real sinks.
//!
//! Each test drives the machine the way a chat transport would and checks
//! what ends up on disk and in the admins' inboxes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use worker_registration::channels::{EventPayload, IncomingMessage};
use worker_registration::error::{ChannelError, StorageError};
use worker_registration::i18n::{Language, MessageKey, StringTable};
use worker_registration::notify::{AdminNotifier, AdminRoster};
use worker_registration::registration::{
    HandleOutcome, MachineConfig, RegistrationMachine, RegistrationRecord, RegistrationState,
    SessionStore, StoredRegistration,
};
use worker_registration::store::{CsvSink, FallbackSink, RegistrationSink, RegistrationStats};

/// Collects every notification as `(recipient, name)`.
#[derive(Default)]
struct InboxNotifier {
    inbox: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl AdminNotifier for InboxNotifier {
    async fn notify(&self, recipient: &str, registration: &StoredRegistration) -> Result<(), ChannelError> {
        self.inbox
            .lock()
            .unwrap()
            .push((recipient.to_string(), registration.record.name.clone()));
        Ok(())
    }
}

/// A sink that is always down.
struct DownSink;

#[async_trait]
impl RegistrationSink for DownSink {
    fn name(&self) -> &str {
        "down"
    }

    async fn append(&self, _record: &RegistrationRecord) -> Result<StoredRegistration, StorageError> {
        Err(StorageError::RequestFailed {
            provider: "down".into(),
            reason: "503 Service Unavailable".into(),
        })
    }

    async fn stats(&self) -> Result<RegistrationStats, StorageError> {
        Err(StorageError::RequestFailed {
            provider: "down".into(),
            reason: "503 Service Unavailable".into(),
        })
    }
}

fn build(sink: Arc<dyn RegistrationSink>, notifier: Arc<InboxNotifier>) -> RegistrationMachine {
    RegistrationMachine::new(
        SessionStore::new(),
        Arc::new(StringTable::builtin()),
        MachineConfig::default(),
        sink,
        notifier,
        AdminRoster::parse("900,901"),
    )
}

async fn send(machine: &RegistrationMachine, user: &str, text: &str) -> HandleOutcome {
    let msg = IncomingMessage::new("test", user, EventPayload::from_text(text)).with_username("worker_ua");
    machine.handle(&msg).await
}

async fn choose(machine: &RegistrationMachine, user: &str, tag: &str) -> HandleOutcome {
    let msg = IncomingMessage::new("test", user, EventPayload::Selection(tag.to_string()));
    machine.handle(&msg).await
}

#[tokio::test]
async fn happy_path_writes_csv_and_notifies_admins() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = Arc::new(CsvSink::new(tmp.path().join("registrations.csv")));
    let notifier = Arc::new(InboxNotifier::default());
    let machine = build(csv.clone(), notifier.clone());
    let strings = StringTable::builtin();

    assert_eq!(
        send(&machine, "555", "/start").await.state,
        Some(RegistrationState::LanguageSelect)
    );
    assert_eq!(
        choose(&machine, "555", "lang:uk").await.state,
        Some(RegistrationState::CollectName)
    );
    assert_eq!(
        send(&machine, "555", "Олена Петренко").await.state,
        Some(RegistrationState::CollectAge)
    );
    assert_eq!(
        send(&machine, "555", "28").await.state,
        Some(RegistrationState::CollectPhone)
    );
    let summary = send(&machine, "555", "+380 67 123 45 67").await;
    assert_eq!(summary.state, Some(RegistrationState::Confirm));
    assert!(summary.replies[0].text.contains("+380671234567"));
    assert!(summary.replies[0].text.contains("0671234567"));

    let done = send(&machine, "555", "Так").await;
    assert_eq!(done.state, Some(RegistrationState::Completed));
    assert_eq!(done.replies[0].text, strings.get(Language::Uk, MessageKey::Success));

    let mut inbox = notifier.inbox.lock().unwrap().clone();
    inbox.sort();
    assert_eq!(
        inbox,
        vec![
            ("900".to_string(), "Олена Петренко".to_string()),
            ("901".to_string(), "Олена Петренко".to_string()),
        ]
    );

    let mut reader = csv::Reader::from_path(csv.path()).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][1], "Олена Петренко");
    assert_eq!(&rows[0][2], "28");
    assert_eq!(&rows[0][3], "+380671234567");
    assert_eq!(&rows[0][4], "worker_ua");
    assert_eq!(&rows[0][5], "555");
    assert_eq!(&rows[0][6], "New");

    let stats = csv.stats().await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.today, 1);
}

#[tokio::test]
async fn rejected_age_then_accepted() {
    let tmp = tempfile::tempdir().unwrap();
    let machine = build(
        Arc::new(CsvSink::new(tmp.path().join("r.csv"))),
        Arc::new(InboxNotifier::default()),
    );

    send(&machine, "1", "/register").await;
    choose(&machine, "1", "lang:en").await;
    send(&machine, "1", "John Smith").await;

    let rejected = send(&machine, "1", "15").await;
    assert_eq!(rejected.state, Some(RegistrationState::CollectAge));
    let rejected = send(&machine, "1", "twenty").await;
    assert_eq!(rejected.state, Some(RegistrationState::CollectAge));

    let accepted = send(&machine, "1", "20").await;
    assert_eq!(accepted.state, Some(RegistrationState::CollectPhone));
}

#[tokio::test]
async fn unavailable_primary_falls_back_to_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = Arc::new(CsvSink::new(tmp.path().join("fallback.csv")));
    let primary: Arc<dyn RegistrationSink> = Arc::new(DownSink);
    let sink = Arc::new(FallbackSink::new(Some(primary), csv.clone()));
    let notifier = Arc::new(InboxNotifier::default());
    let machine = build(sink, notifier.clone());

    send(&machine, "2", "/start").await;
    choose(&machine, "2", "lang:ru").await;
    send(&machine, "2", "Иван Иванов").await;
    send(&machine, "2", "33").await;
    send(&machine, "2", "0501112233").await;
    let done = send(&machine, "2", "да").await;

    assert_eq!(
        done.replies[0].text,
        StringTable::builtin().get(Language::Ru, MessageKey::Success)
    );
    assert_eq!(notifier.inbox.lock().unwrap().len(), 2);
    assert_eq!(csv.stats().await.unwrap().total, 1);
}

#[tokio::test]
async fn persistence_failure_clears_session_without_notifying() {
    let notifier = Arc::new(InboxNotifier::default());
    let machine = build(Arc::new(DownSink), notifier.clone());

    send(&machine, "3", "/start").await;
    choose(&machine, "3", "lang:en").await;
    send(&machine, "3", "Mary-Jane O'Neil").await;
    send(&machine, "3", "40").await;
    send(&machine, "3", "0931234567").await;
    let failed = send(&machine, "3", "yes").await;

    assert_eq!(
        failed.replies[0].text,
        StringTable::builtin().get(Language::En, MessageKey::SubmitFailed)
    );
    assert!(notifier.inbox.lock().unwrap().is_empty());
    assert!(machine.sessions().snapshot("3").await.is_none());

    // A stray "yes" after the failure no longer belongs to any session.
    let stray = send(&machine, "3", "yes").await;
    assert_eq!(stray.state, None);

    let restarted = send(&machine, "3", "/start").await;
    assert_eq!(restarted.state, Some(RegistrationState::LanguageSelect));
}

#[tokio::test]
async fn rejecting_the_summary_restarts_in_the_same_language() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = Arc::new(CsvSink::new(tmp.path().join("r.csv")));
    let machine = build(csv.clone(), Arc::new(InboxNotifier::default()));

    send(&machine, "4", "/start").await;
    choose(&machine, "4", "lang:uk").await;
    send(&machine, "4", "Тарас").await;
    send(&machine, "4", "30").await;
    send(&machine, "4", "0671234567").await;

    let restart = send(&machine, "4", "ні").await;
    assert_eq!(restart.state, Some(RegistrationState::CollectName));
    assert_eq!(
        restart.replies[0].text,
        StringTable::builtin().get(Language::Uk, MessageKey::Restart)
    );

    send(&machine, "4", "Тарас Шевченко").await;
    send(&machine, "4", "31").await;
    send(&machine, "4", "0671234567").await;
    send(&machine, "4", "так").await;

    let mut reader = csv::Reader::from_path(csv.path()).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][1], "Тарас Шевченко");
    assert_eq!(&rows[0][2], "31");
}
