//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;

use crate::error::ConfigError;
use crate::i18n::Language;
use crate::notify::AdminRoster;
use crate::registration::MachineConfig;
use crate::registration::validators::{
    AgeRange, DEFAULT_MAX_AGE, DEFAULT_MAX_NAME_LENGTH, DEFAULT_MIN_AGE,
};
use crate::store::SheetsConfig;
use crate::store::sheets::DEFAULT_SPREADSHEET_TITLE;

/// Default CSV fallback file.
pub const DEFAULT_CSV_PATH: &str = "registrations.csv";

/// Sessions untouched for this long are pruned.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

/// Bot configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token. Only optional in CLI mode.
    pub bot_token: Option<SecretString>,
    /// Run against stdin/stdout instead of Telegram.
    pub cli_mode: bool,
    pub admins: AdminRoster,
    /// Service-account credentials: inline JSON or a path to the JSON file.
    pub google_credentials: Option<String>,
    /// Spreadsheet id. Takes precedence over `sheet_name`.
    pub sheet_id: Option<String>,
    /// Spreadsheet title, looked up on Drive and created when missing.
    pub sheet_name: String,
    /// Address a newly created spreadsheet is shared with.
    pub admin_email: Option<String>,
    pub csv_path: PathBuf,
    pub max_name_length: usize,
    pub age_range: AgeRange,
    pub default_language: Language,
    pub session_idle_timeout: Duration,
    /// Port of the keep-alive HTTP endpoint; disabled when unset.
    pub port: Option<u16>,
    pub log_level: String,
    /// Directory for rolling log files; stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

/// What is configured, safe to expose over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigStatus {
    pub bot_token: bool,
    pub admin_count: usize,
    pub google_sheets: bool,
    pub cli_mode: bool,
}

impl BotConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through `lookup`, which returns the value of a variable if set.
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let cli_mode = get("CLI_MODE").is_some_and(|v| parse_bool(&v));

        let bot_token = get("BOT_TOKEN").map(SecretString::from);
        if bot_token.is_none() && !cli_mode {
            return Err(ConfigError::MissingRequired {
                key: "BOT_TOKEN".into(),
                hint: "Set the Telegram bot token, or CLI_MODE=true to run locally.".into(),
            });
        }

        let mut admins = AdminRoster::parse(&get("ADMIN_CHAT_IDS").unwrap_or_default());
        if let Some(single) = get("ADMIN_CHAT_ID") {
            admins.insert(&single);
        }

        let min_age: u32 = parse_or(&get, "MIN_AGE", DEFAULT_MIN_AGE)?;
        let max_age: u32 = parse_or(&get, "MAX_AGE", DEFAULT_MAX_AGE)?;
        if min_age >= max_age {
            return Err(ConfigError::InvalidValue {
                key: "MIN_AGE".into(),
                message: format!("must be below MAX_AGE ({min_age} >= {max_age})"),
            });
        }

        let max_name_length: usize = parse_or(&get, "MAX_NAME_LENGTH", DEFAULT_MAX_NAME_LENGTH)?;
        if max_name_length < 2 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_NAME_LENGTH".into(),
                message: "must be at least 2".into(),
            });
        }

        let default_language = match get("DEFAULT_LANGUAGE") {
            Some(tag) => Language::from_tag(&tag).ok_or_else(|| ConfigError::InvalidValue {
                key: "DEFAULT_LANGUAGE".into(),
                message: format!("unsupported language '{tag}', expected en, uk or ru"),
            })?,
            None => Language::default(),
        };

        let idle_secs: u64 = parse_or(&get, "SESSION_IDLE_TIMEOUT_SECS", DEFAULT_SESSION_IDLE_SECS)?;
        let port = get("PORT")
            .map(|v| {
                v.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                    key: "PORT".into(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            bot_token,
            cli_mode,
            admins,
            google_credentials: get("GOOGLE_SHEETS_CREDENTIALS"),
            sheet_id: get("GOOGLE_SHEET_ID"),
            sheet_name: get("GOOGLE_SHEET_NAME")
                .unwrap_or_else(|| DEFAULT_SPREADSHEET_TITLE.to_string()),
            admin_email: get("ADMIN_EMAIL"),
            csv_path: get("REGISTRATIONS_CSV")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_PATH)),
            max_name_length,
            age_range: AgeRange::new(min_age, max_age),
            default_language,
            session_idle_timeout: Duration::from_secs(idle_secs),
            port,
            log_level: get("LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }

    /// Whether Google Sheets credentials are present.
    pub fn sheets_configured(&self) -> bool {
        self.google_credentials.is_some()
    }

    /// Where the sheets sink writes, when Google Sheets is configured.
    pub fn sheets_config(&self) -> Option<SheetsConfig> {
        self.google_credentials.as_ref()?;
        Some(match &self.sheet_id {
            Some(id) => SheetsConfig::new(id.as_str()),
            None => SheetsConfig::by_title(self.sheet_name.as_str(), self.admin_email.clone()),
        })
    }

    pub fn machine_config(&self) -> MachineConfig {
        MachineConfig {
            age_range: self.age_range,
            max_name_length: self.max_name_length,
            default_language: self.default_language,
        }
    }

    pub fn status(&self) -> ConfigStatus {
        ConfigStatus {
            bot_token: self.bot_token.is_some(),
            admin_count: self.admins.len(),
            google_sheets: self.sheets_configured(),
            cli_mode: self.cli_mode,
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use crate::store::SpreadsheetRef;

    fn load(vars: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_with_token_only() {
        let config = load(&[("BOT_TOKEN", "123:ABC")]).unwrap();
        assert!(config.bot_token.is_some());
        assert!(!config.cli_mode);
        assert!(config.admins.is_empty());
        assert_eq!(config.age_range, AgeRange::new(16, 40));
        assert_eq!(config.max_name_length, 50);
        assert_eq!(config.default_language, Language::En);
        assert_eq!(config.csv_path, PathBuf::from("registrations.csv"));
        assert_eq!(config.session_idle_timeout, Duration::from_secs(3600));
        assert_eq!(config.port, None);
        assert_eq!(config.log_level, "info");
        assert!(!config.sheets_configured());
    }

    #[test]
    fn token_required_unless_cli_mode() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::MissingRequired { .. })
        ));
        assert!(matches!(
            load(&[("BOT_TOKEN", "   ")]),
            Err(ConfigError::MissingRequired { .. })
        ));
        let config = load(&[("CLI_MODE", "true")]).unwrap();
        assert!(config.cli_mode);
        assert!(config.bot_token.is_none());
    }

    #[test]
    fn admin_roster_merges_both_variables() {
        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("ADMIN_CHAT_IDS", "1, 2"),
            ("ADMIN_CHAT_ID", "3"),
        ])
        .unwrap();
        assert_eq!(config.admins.iter().collect::<Vec<_>>(), vec!["1", "2", "3"]);
    }

    #[test]
    fn age_bounds_are_validated() {
        let config = load(&[("BOT_TOKEN", "t"), ("MIN_AGE", "18"), ("MAX_AGE", "60")]).unwrap();
        assert_eq!(config.age_range, AgeRange::new(18, 60));

        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("MIN_AGE", "40"), ("MAX_AGE", "40")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("MIN_AGE", "abc")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn name_length_and_port_are_validated() {
        assert!(load(&[("BOT_TOKEN", "t"), ("MAX_NAME_LENGTH", "1")]).is_err());
        assert!(load(&[("BOT_TOKEN", "t"), ("PORT", "99999")]).is_err());
        let config = load(&[("BOT_TOKEN", "t"), ("PORT", "8080")]).unwrap();
        assert_eq!(config.port, Some(8080));
    }

    #[test]
    fn default_language_must_be_supported() {
        let config = load(&[("BOT_TOKEN", "t"), ("DEFAULT_LANGUAGE", "uk")]).unwrap();
        assert_eq!(config.default_language, Language::Uk);
        assert!(load(&[("BOT_TOKEN", "t"), ("DEFAULT_LANGUAGE", "de")]).is_err());
    }

    #[test]
    fn sheets_addressed_by_id_or_title() {
        let config = load(&[("BOT_TOKEN", "t"), ("GOOGLE_SHEET_ID", "sheet")]).unwrap();
        assert!(config.sheets_config().is_none());

        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("GOOGLE_SHEETS_CREDENTIALS", "/etc/creds.json"),
            ("GOOGLE_SHEET_ID", "sheet"),
            ("GOOGLE_SHEET_NAME", "Ignored"),
        ])
        .unwrap();
        assert_eq!(
            config.sheets_config().unwrap().spreadsheet,
            SpreadsheetRef::Id("sheet".into())
        );

        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("GOOGLE_SHEETS_CREDENTIALS", "/etc/creds.json"),
            ("ADMIN_EMAIL", "boss@example.com"),
        ])
        .unwrap();
        assert_eq!(
            config.sheets_config().unwrap().spreadsheet,
            SpreadsheetRef::Title {
                title: "Worker Registrations".into(),
                share_with: Some("boss@example.com".into()),
            }
        );
    }

    #[test]
    fn status_reports_configured_parts() {
        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("ADMIN_CHAT_ID", "1"),
            ("GOOGLE_SHEETS_CREDENTIALS", "/etc/creds.json"),
            ("GOOGLE_SHEET_ID", "sheet"),
        ])
        .unwrap();
        assert_eq!(
            config.status(),
            ConfigStatus {
                bot_token: true,
                admin_count: 1,
                google_sheets: true,
                cli_mode: false,
            }
        );
    }
}
