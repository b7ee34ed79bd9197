//! Worker registration bot: a conversational sign-up form over chat.

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod i18n;
pub mod logging;
pub mod notify;
pub mod registration;
pub mod store;
