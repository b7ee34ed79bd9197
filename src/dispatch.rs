//! Per-user sequential dispatch of inbound events.
//!
//! Each user gets a worker task with its own queue. A user's events are
//! handled strictly in arrival order while different users proceed
//! concurrently. Workers exit after sitting idle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::channels::{Channel, IncomingMessage, MessageStream};
use crate::registration::RegistrationMachine;

/// How long a user's worker waits for another event before exiting.
pub const DEFAULT_WORKER_IDLE: Duration = Duration::from_secs(300);

type WorkerMap = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<IncomingMessage>>>>;

/// Routes events from a channel to per-user workers.
pub struct Dispatcher {
    machine: Arc<RegistrationMachine>,
    channel: Arc<dyn Channel>,
    workers: WorkerMap,
    idle_timeout: Duration,
}

impl Dispatcher {
    pub fn new(machine: Arc<RegistrationMachine>, channel: Arc<dyn Channel>) -> Self {
        Self {
            machine,
            channel,
            workers: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout: DEFAULT_WORKER_IDLE,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Number of users with a live worker.
    pub fn active_workers(&self) -> usize {
        self.workers.lock().map(|w| w.len()).unwrap_or_default()
    }

    /// Queue `msg` on its user's worker, starting one if needed.
    pub fn dispatch(&self, msg: IncomingMessage) {
        let Ok(mut workers) = self.workers.lock() else {
            warn!(user_id = %msg.user_id, "Worker map poisoned, dropping event");
            return;
        };

        let msg = match workers.get(&msg.user_id) {
            Some(tx) => match tx.send(msg) {
                Ok(()) => return,
                // The worker died without deregistering; replace it.
                Err(mpsc::error::SendError(msg)) => msg,
            },
            None => msg,
        };

        let user_id = msg.user_id.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        // A fresh receiver is alive, so this cannot fail.
        let _ = tx.send(msg);
        workers.insert(user_id.clone(), tx);
        debug!(user_id = %user_id, "Started user worker");

        tokio::spawn(run_worker(
            user_id,
            rx,
            Arc::clone(&self.machine),
            Arc::clone(&self.channel),
            Arc::clone(&self.workers),
            self.idle_timeout,
        ));
    }

    /// Consume `stream` until it ends, dispatching every event.
    pub async fn run(&self, mut stream: MessageStream) {
        info!(channel = self.channel.name(), "Dispatcher started");
        while let Some(msg) = stream.next().await {
            self.dispatch(msg);
        }
        info!(channel = self.channel.name(), "Message stream ended");
    }
}

async fn run_worker(
    user_id: String,
    mut rx: mpsc::UnboundedReceiver<IncomingMessage>,
    machine: Arc<RegistrationMachine>,
    channel: Arc<dyn Channel>,
    workers: WorkerMap,
    idle_timeout: Duration,
) {
    loop {
        let msg = match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(_) => {
                // Deregister under the map lock so no event slips in between
                // the emptiness check and the exit.
                let Ok(mut map) = workers.lock() else {
                    break;
                };
                match rx.try_recv() {
                    Ok(msg) => {
                        drop(map);
                        msg
                    }
                    Err(_) => {
                        map.remove(&user_id);
                        debug!(user_id = %user_id, "User worker idle, exiting");
                        break;
                    }
                }
            }
        };

        let outcome = machine.handle(&msg).await;
        for reply in outcome.replies {
            if let Err(e) = channel.respond(&msg, reply).await {
                warn!(user_id = %user_id, channel = channel.name(), error = %e, "Failed to send reply");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::channels::{EventPayload, Reply};
    use crate::error::{ChannelError, StorageError};
    use crate::i18n::{Language, MessageKey, StringTable};
    use crate::notify::{AdminNotifier, AdminRoster};
    use crate::registration::{
        MachineConfig, RegistrationRecord, SessionStore, StoredRegistration,
    };
    use crate::store::{RegistrationSink, RegistrationStats};

    struct NullSink;

    #[async_trait]
    impl RegistrationSink for NullSink {
        fn name(&self) -> &str {
            "null"
        }

        async fn append(&self, record: &RegistrationRecord) -> Result<StoredRegistration, StorageError> {
            Ok(StoredRegistration::stamp_now(record.clone()))
        }

        async fn stats(&self) -> Result<RegistrationStats, StorageError> {
            Ok(RegistrationStats::default())
        }
    }

    struct NullNotifier;

    #[async_trait]
    impl AdminNotifier for NullNotifier {
        async fn notify(&self, _recipient: &str, _registration: &StoredRegistration) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    /// Records every reply as `(chat_id, text)`.
    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingChannel {
        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn respond(&self, msg: &IncomingMessage, reply: Reply) -> Result<(), ChannelError> {
            self.send_to(&msg.chat_id, reply).await
        }

        async fn send_to(&self, chat_id: &str, reply: Reply) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push((chat_id.to_string(), reply.text));
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn dispatcher(channel: Arc<RecordingChannel>, idle: Duration) -> Dispatcher {
        let machine = RegistrationMachine::new(
            SessionStore::new(),
            Arc::new(StringTable::builtin()),
            MachineConfig::default(),
            Arc::new(NullSink),
            Arc::new(NullNotifier),
            AdminRoster::default(),
        );
        Dispatcher::new(Arc::new(machine), channel).with_idle_timeout(idle)
    }

    fn text(user: &str, text: &str) -> IncomingMessage {
        IncomingMessage::new("test", user, EventPayload::from_text(text))
    }

    async fn wait_for_replies(channel: &RecordingChannel, count: usize) -> Vec<(String, String)> {
        for _ in 0..200 {
            let sent = channel.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        channel.sent()
    }

    #[tokio::test]
    async fn events_of_one_user_are_handled_in_order() {
        let channel = Arc::new(RecordingChannel::default());
        let dispatcher = dispatcher(channel.clone(), Duration::from_secs(5));

        dispatcher.dispatch(text("7", "/start"));
        dispatcher.dispatch(IncomingMessage::new(
            "test",
            "7",
            EventPayload::Selection("lang:en".into()),
        ));
        dispatcher.dispatch(text("7", "Anna Li"));
        dispatcher.dispatch(text("7", "25"));

        let sent = wait_for_replies(&channel, 4).await;
        assert_eq!(sent.len(), 4);
        let strings = StringTable::builtin();
        assert_eq!(sent[0].1, strings.get(Language::En, MessageKey::ChooseLanguage));
        assert_eq!(sent[1].1, strings.get(Language::En, MessageKey::Welcome));
        assert!(sent[2].1.contains("Anna Li"));
        assert_eq!(sent[3].1, strings.get(Language::En, MessageKey::AgeAccepted));
        assert!(sent.iter().all(|(chat, _)| chat == "7"));
    }

    #[tokio::test]
    async fn users_get_separate_workers() {
        let channel = Arc::new(RecordingChannel::default());
        let dispatcher = dispatcher(channel.clone(), Duration::from_secs(5));

        dispatcher.dispatch(text("1", "/start"));
        dispatcher.dispatch(text("2", "/start"));

        let sent = wait_for_replies(&channel, 2).await;
        assert_eq!(sent.len(), 2);
        assert_eq!(dispatcher.active_workers(), 2);
    }

    #[tokio::test]
    async fn idle_workers_exit_and_restart_on_demand() {
        let channel = Arc::new(RecordingChannel::default());
        let dispatcher = dispatcher(channel.clone(), Duration::from_millis(50));

        dispatcher.dispatch(text("7", "/start"));
        wait_for_replies(&channel, 1).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(dispatcher.active_workers(), 0);

        dispatcher.dispatch(text("7", "/cancel"));
        let sent = wait_for_replies(&channel, 2).await;
        assert_eq!(sent.len(), 2);
    }
}
