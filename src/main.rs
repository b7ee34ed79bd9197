use std::sync::Arc;
use std::time::Duration;

use worker_registration::channels::{Channel, CliChannel, TelegramChannel};
use worker_registration::config::BotConfig;
use worker_registration::dispatch::Dispatcher;
use worker_registration::error::StorageError;
use worker_registration::health::{self, HealthState};
use worker_registration::i18n::StringTable;
use worker_registration::logging;
use worker_registration::notify::ChannelNotifier;
use worker_registration::registration::{RegistrationMachine, SessionStore, spawn_prune_task};
use worker_registration::store::{
    CsvSink, FallbackSink, RegistrationSink, ServiceAccountKey, ServiceAccountTokens, SheetsSink,
};

/// How often idle sessions are swept.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on any single Google API request.
const GOOGLE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> worker_registration::error::Result<()> {
    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export BOT_TOKEN=123456:ABC...   (or CLI_MODE=true)");
        std::process::exit(1);
    });

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = logging::init(&config.log_level, config.log_dir.as_deref())?;

    eprintln!("📝 Worker Registration Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Ages: {}-{}, default language: {}",
        config.age_range.min, config.age_range.max, config.default_language
    );
    eprintln!("   Admins: {}", config.admins.len());
    eprintln!("   CSV fallback: {}", config.csv_path.display());

    // ── Persistence ─────────────────────────────────────────────────────
    let client = reqwest::Client::builder()
        .timeout(GOOGLE_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| StorageError::RequestFailed {
            provider: "google".into(),
            reason: format!("cannot build HTTP client: {e}"),
        })?;
    let primary = build_sheets_sink(&config, client.clone());
    eprintln!(
        "   Google Sheets: {}",
        if primary.is_some() { "enabled" } else { "disabled" }
    );
    let csv: Arc<dyn RegistrationSink> = Arc::new(CsvSink::new(config.csv_path.clone()));
    let sink: Arc<dyn RegistrationSink> = Arc::new(FallbackSink::new(primary, csv));

    // ── Channel ─────────────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = match (&config.bot_token, config.cli_mode) {
        (Some(token), false) => Arc::new(TelegramChannel::new(token.clone())),
        _ => Arc::new(CliChannel::new()),
    };
    if let Err(e) = channel.health_check().await {
        tracing::warn!(channel = channel.name(), error = %e, "Channel health check failed");
    }
    eprintln!("   Channel: {}\n", channel.name());

    // ── Conversation ────────────────────────────────────────────────────
    let strings = Arc::new(StringTable::builtin());
    let notifier = Arc::new(ChannelNotifier::new(
        Arc::clone(&channel),
        Arc::clone(&strings),
        config.default_language,
    ));
    let sessions = SessionStore::new();
    let machine = Arc::new(RegistrationMachine::new(
        Arc::clone(&sessions),
        strings,
        config.machine_config(),
        sink,
        notifier,
        config.admins.clone(),
    ));

    let _prune_handle = spawn_prune_task(
        Arc::clone(&sessions),
        config.session_idle_timeout,
        PRUNE_INTERVAL,
    );

    if let Some(port) = config.port {
        let state = HealthState {
            config: config.status(),
            sessions: Arc::clone(&sessions),
        };
        health::spawn_server(port, state).await?;
    }

    let stream = channel.start().await?;
    let dispatcher = Dispatcher::new(machine, Arc::clone(&channel));

    tokio::select! {
        () = dispatcher.run(stream) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, shutting down");
        }
    }

    channel.shutdown().await?;
    Ok(())
}

/// Build the Google Sheets sink when it is configured. Problems are logged
/// and leave the CSV file as the only sink.
fn build_sheets_sink(config: &BotConfig, client: reqwest::Client) -> Option<Arc<dyn RegistrationSink>> {
    let (Some(credentials), Some(sheets)) = (&config.google_credentials, config.sheets_config())
    else {
        tracing::info!("Google Sheets not configured, registrations go to CSV");
        return None;
    };

    let tokens = ServiceAccountKey::from_inline_or_path(credentials)
        .and_then(|key| ServiceAccountTokens::new(key, client.clone()));
    match tokens {
        Ok(tokens) => {
            let sink: Arc<dyn RegistrationSink> =
                Arc::new(SheetsSink::new(sheets, Arc::new(tokens), client));
            Some(sink)
        }
        Err(e) => {
            tracing::error!(error = %e, "Google Sheets credentials unusable, falling back to CSV");
            None
        }
    }
}
