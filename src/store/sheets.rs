//! Google Sheets sink: appends registrations to a worksheet.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::registration::{RegistrationRecord, StoredRegistration};

use super::google_auth::TokenSource;
use super::stats::RegistrationStats;
use super::traits::RegistrationSink;

/// Default Sheets API root.
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/v4";
/// Default Drive API root, used to find and share spreadsheets by title.
pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Worksheet registrations are written to.
pub const DEFAULT_WORKSHEET: &str = "Registrations";
/// Spreadsheet title used when neither an id nor a title is configured.
pub const DEFAULT_SPREADSHEET_TITLE: &str = "Worker Registrations";

/// Header row written when the worksheet is created.
pub const SHEET_HEADER: [&str; 8] = [
    "Registered At",
    "Name",
    "Age",
    "Phone",
    "Telegram Username",
    "Telegram ID",
    "Status",
    "Comments",
];

const NEW_STATUS: &str = "New";
const PROVIDER: &str = "google-sheets";
const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// How the target spreadsheet is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetRef {
    /// A known spreadsheet id.
    Id(String),
    /// Looked up by title on Drive, created when missing. A created
    /// spreadsheet is shared as writer with `share_with`, if given.
    Title {
        title: String,
        share_with: Option<String>,
    },
}

/// Where the sheets sink writes.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet: SpreadsheetRef,
    pub worksheet: String,
    pub api_base: String,
    pub drive_api_base: String,
}

impl SheetsConfig {
    /// Write to the spreadsheet with this id.
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self::with_spreadsheet(SpreadsheetRef::Id(spreadsheet_id.into()))
    }

    /// Write to the spreadsheet with this title, creating it if needed.
    pub fn by_title(title: impl Into<String>, share_with: Option<String>) -> Self {
        Self::with_spreadsheet(SpreadsheetRef::Title {
            title: title.into(),
            share_with,
        })
    }

    fn with_spreadsheet(spreadsheet: SpreadsheetRef) -> Self {
        Self {
            spreadsheet,
            worksheet: DEFAULT_WORKSHEET.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            drive_api_base: DEFAULT_DRIVE_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
}

/// Drive search query matching a live spreadsheet titled `title`.
fn title_query(title: &str) -> String {
    let escaped = title.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}' and mimeType = '{SPREADSHEET_MIME_TYPE}' and trashed = false")
}

/// Appends registrations to a Google Sheets worksheet.
pub struct SheetsSink {
    config: SheetsConfig,
    tokens: Arc<dyn TokenSource>,
    client: reqwest::Client,
    spreadsheet_id: OnceCell<String>,
    worksheet_ready: OnceCell<()>,
}

impl SheetsSink {
    pub fn new(config: SheetsConfig, tokens: Arc<dyn TokenSource>, client: reqwest::Client) -> Self {
        Self {
            config,
            tokens,
            client,
            spreadsheet_id: OnceCell::new(),
            worksheet_ready: OnceCell::new(),
        }
    }

    /// Build a URL from path segments below `base`.
    fn url(base: &str, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = Url::parse(base).map_err(|e| StorageError::RequestFailed {
            provider: PROVIDER.into(),
            reason: format!("invalid API base {base}: {e}"),
        })?;
        url.path_segments_mut()
            .map_err(|()| StorageError::RequestFailed {
                provider: PROVIDER.into(),
                reason: format!("API base {base} cannot hold a path"),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn spreadsheet_url(&self, id: &str, suffix: &str) -> Result<Url, StorageError> {
        let id = format!("{id}{suffix}");
        Self::url(&self.config.api_base, &["spreadsheets", &id])
    }

    fn values_url(&self, id: &str, range: &str, suffix: &str) -> Result<Url, StorageError> {
        let range = format!("{}!{range}{suffix}", self.config.worksheet);
        Self::url(&self.config.api_base, &["spreadsheets", id, "values", &range])
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StorageError> {
        let token = self.tokens.access_token().await?;
        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StorageError::RequestFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::RequestFailed {
                provider: PROVIDER.into(),
                reason: format!("{status}: {body}"),
            });
        }
        Ok(resp)
    }

    async fn parse<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, StorageError> {
        resp.json().await.map_err(|e| StorageError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: e.to_string(),
        })
    }

    /// The id of the target spreadsheet, resolved once.
    async fn spreadsheet_id(&self) -> Result<&str, StorageError> {
        self.spreadsheet_id
            .get_or_try_init(|| async {
                match &self.config.spreadsheet {
                    SpreadsheetRef::Id(id) => Ok(id.clone()),
                    SpreadsheetRef::Title { title, share_with } => {
                        self.resolve_title(title, share_with.as_deref()).await
                    }
                }
            })
            .await
            .map(String::as_str)
    }

    /// Find the spreadsheet titled `title` on Drive, or create it.
    async fn resolve_title(&self, title: &str, share_with: Option<&str>) -> Result<String, StorageError> {
        let url = Self::url(&self.config.drive_api_base, &["files"])?;
        let query = title_query(title);
        let resp = self
            .send(self.client.get(url).query(&[
                ("q", query.as_str()),
                ("fields", "files(id)"),
                ("pageSize", "1"),
            ]))
            .await?;
        let found: DriveFileList = Self::parse(resp).await?;
        if let Some(file) = found.files.into_iter().next() {
            debug!(title, spreadsheet = %file.id, "Spreadsheet found by title");
            return Ok(file.id);
        }

        let body = serde_json::json!({ "properties": { "title": title } });
        let resp = self
            .send(self.client.post(Self::url(&self.config.api_base, &["spreadsheets"])?).json(&body))
            .await?;
        let created: CreatedSpreadsheet = Self::parse(resp).await?;
        info!(title, spreadsheet = %created.spreadsheet_id, "Spreadsheet created");

        if let Some(email) = share_with {
            if let Err(e) = self.share(&created.spreadsheet_id, email).await {
                warn!(spreadsheet = %created.spreadsheet_id, email, error = %e, "Failed to share spreadsheet");
            }
        }
        Ok(created.spreadsheet_id)
    }

    /// Grant `email` write access to the spreadsheet.
    async fn share(&self, id: &str, email: &str) -> Result<(), StorageError> {
        let url = Self::url(&self.config.drive_api_base, &["files", id, "permissions"])?;
        let body = serde_json::json!({
            "type": "user",
            "role": "writer",
            "emailAddress": email,
        });
        self.send(self.client.post(url).json(&body)).await?;
        info!(spreadsheet = %id, email, "Spreadsheet shared");
        Ok(())
    }

    /// Create the worksheet with its header row unless it already exists.
    async fn ensure_worksheet(&self, id: &str) -> Result<(), StorageError> {
        self.worksheet_ready
            .get_or_try_init(|| async {
                let url = self.spreadsheet_url(id, "")?;
                let resp = self
                    .send(self.client.get(url).query(&[("fields", "sheets.properties.title")]))
                    .await?;
                let meta: SpreadsheetMeta = Self::parse(resp).await?;

                let exists = meta
                    .sheets
                    .iter()
                    .any(|s| s.properties.title == self.config.worksheet);
                if exists {
                    debug!(worksheet = %self.config.worksheet, "Worksheet found");
                    return Ok(());
                }

                let body = serde_json::json!({
                    "requests": [{
                        "addSheet": {
                            "properties": {
                                "title": self.config.worksheet,
                                "gridProperties": { "rowCount": 1000, "columnCount": 10 }
                            }
                        }
                    }]
                });
                self.send(self.client.post(self.spreadsheet_url(id, ":batchUpdate")?).json(&body))
                    .await?;
                self.append_row(id, SHEET_HEADER.iter().map(|h| serde_json::json!(h)).collect())
                    .await?;

                info!(worksheet = %self.config.worksheet, "Worksheet created");
                Ok::<(), StorageError>(())
            })
            .await
            .map(|_| ())
    }

    /// Resolve the spreadsheet and make sure the worksheet exists.
    async fn prepare(&self) -> Result<&str, StorageError> {
        let id = self.spreadsheet_id().await?;
        self.ensure_worksheet(id).await?;
        Ok(id)
    }

    async fn append_row(&self, id: &str, row: Vec<serde_json::Value>) -> Result<(), StorageError> {
        let url = self.values_url(id, "A1", ":append")?;
        let body = serde_json::json!({ "values": [row] });
        self.send(
            self.client
                .post(url)
                .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
                .json(&body),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RegistrationSink for SheetsSink {
    fn name(&self) -> &str {
        "google-sheets"
    }

    async fn append(&self, record: &RegistrationRecord) -> Result<StoredRegistration, StorageError> {
        let id = self.prepare().await?;

        let stored = StoredRegistration::stamp_now(record.clone());
        let row = vec![
            serde_json::json!(stored.registered_at_display()),
            serde_json::json!(record.name),
            serde_json::json!(record.age),
            serde_json::json!(record.phone),
            serde_json::json!(record.username),
            serde_json::json!(record.user_id),
            serde_json::json!(NEW_STATUS),
            serde_json::json!(""),
        ];
        self.append_row(id, row).await?;

        info!(
            spreadsheet = %id,
            user_id = %record.user_id,
            "Registration appended to Google Sheets"
        );
        Ok(stored)
    }

    async fn stats(&self) -> Result<RegistrationStats, StorageError> {
        let id = self.prepare().await?;

        let resp = self
            .send(self.client.get(self.values_url(id, "A2:A", "")?))
            .await?;
        let range: ValueRange = Self::parse(resp).await?;

        let timestamps: Vec<String> = range
            .values
            .iter()
            .filter_map(|row| row.first())
            .filter_map(|cell| cell.as_str().map(str::to_string))
            .collect();

        Ok(RegistrationStats::from_timestamps(
            timestamps.iter().map(String::as_str),
            Local::now().date_naive(),
        ))
    }
}
