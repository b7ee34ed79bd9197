//! Persistence sinks for confirmed registrations.

pub mod csv_file;
pub mod fallback;
pub mod google_auth;
pub mod sheets;
pub mod stats;
pub mod traits;

pub use csv_file::CsvSink;
pub use fallback::FallbackSink;
pub use google_auth::{ServiceAccountKey, ServiceAccountTokens, StaticToken, TokenSource};
pub use sheets::{SheetsConfig, SheetsSink, SpreadsheetRef};
pub use stats::RegistrationStats;
pub use traits::RegistrationSink;
