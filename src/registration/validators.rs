//! Field validators for the registration form.
//!
//! All functions here are pure: malformed input is the common case and is
//! reported through the return value, never through an error.

use std::sync::LazyLock;

use regex::Regex;

/// Lowest accepted age, inclusive.
pub const DEFAULT_MIN_AGE: u32 = 16;
/// Highest accepted age, inclusive.
pub const DEFAULT_MAX_AGE: u32 = 40;
/// Default cap applied to free-text input before validation.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 50;

/// Country prefix of the canonical phone form.
const INTERNATIONAL_PREFIX: &str = "+380";
/// Prefix substituted for `+38` when converting to the local form.
const COUNTRY_CODE: &str = "+38";

static INTERNATIONAL_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+380[0-9]{9}$").expect("valid international phone pattern"));
static LOCAL_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0[0-9]{9}$").expect("valid local phone pattern"));
static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{Latin}\p{Cyrillic} '’ʼ-]+$").expect("valid name pattern")
});

/// Inclusive range of accepted ages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

impl AgeRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, age: i64) -> bool {
        age >= i64::from(self.min) && age <= i64::from(self.max)
    }
}

impl Default for AgeRange {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_AGE, DEFAULT_MAX_AGE)
    }
}

/// A validated phone number in both of its accepted representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    /// International form, `+380XXXXXXXXX`.
    pub canonical: String,
    /// Local form, `0XXXXXXXXX`.
    pub local: String,
}

/// Check a full name.
///
/// Accepts at least two characters of Latin or Cyrillic letters, spaces,
/// hyphens and apostrophes. Tabs and line breaks are rejected.
pub fn validate_name(text: &str) -> bool {
    let name = text.trim();
    name.chars().count() >= 2 && NAME.is_match(name)
}

/// Parse `text` as an age and check it against `range`.
pub fn validate_age(text: &str, range: &AgeRange) -> bool {
    parse_age(text, range).is_some()
}

/// Parse an age, returning it only when it lies within `range`.
pub fn parse_age(text: &str, range: &AgeRange) -> Option<u32> {
    let age: i64 = text.trim().parse().ok()?;
    if !range.contains(age) {
        return None;
    }
    u32::try_from(age).ok()
}

/// Check a phone number against the national allow-list.
///
/// Spaces and hyphens are ignored. Only `+380` followed by nine digits or `0`
/// followed by nine digits is accepted; every other prefix is rejected.
pub fn validate_phone(text: &str) -> bool {
    let phone = strip_phone(text);
    INTERNATIONAL_PHONE.is_match(&phone) || LOCAL_PHONE.is_match(&phone)
}

/// Produce both representations of a valid phone number by prefix
/// substitution. Returns `None` for anything `validate_phone` rejects.
pub fn normalize_phone(text: &str) -> Option<PhoneNumber> {
    let phone = strip_phone(text);

    if LOCAL_PHONE.is_match(&phone) {
        return Some(PhoneNumber {
            canonical: format!("{COUNTRY_CODE}{phone}"),
            local: phone,
        });
    }

    if INTERNATIONAL_PHONE.is_match(&phone) {
        let subscriber = &phone[INTERNATIONAL_PREFIX.len()..];
        return Some(PhoneNumber {
            local: format!("0{subscriber}"),
            canonical: phone,
        });
    }

    None
}

/// Trim, cap at `max_len` characters, and drop characters that are unsafe
/// when rendered as markup.
pub fn sanitize(text: &str, max_len: usize) -> String {
    text.trim()
        .chars()
        .take(max_len)
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\''))
        .collect()
}

fn strip_phone(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}
