//! Deterministic identity keys for registrations that arrive without a submission id.

use chrono::{SecondsFormat, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::models::attendee::{AttendeeRecord, ExternalId};

/// Hex characters kept from the SHA-256 digest.
pub const KEY_HASH_LEN: usize = 24;
const KEY_SEPARATOR: &str = "|";
const FALLBACK_SUFFIX_LEN: usize = 8;

/// Builds the natural key: email, submitted-at, respondent id, phone, first name,
/// last name and date of birth, each trimmed and lower-cased, in that order.
/// Returns `None` when every part is empty.
pub fn natural_key(record: &AttendeeRecord) -> Option<String> {
    let part = |value: Option<String>| value.unwrap_or_default().trim().to_lowercase();
    let parts = [
        part(record.email_address.clone()),
        part(
            record
                .submitted_at
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ),
        part(record.respondent_id.as_ref().map(ToString::to_string)),
        part(record.phone_number.clone()),
        part(record.first_name.clone()),
        part(record.last_name.clone()),
        part(record.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string())),
    ];
    if parts.iter().all(String::is_empty) {
        return None;
    }
    Some(parts.join(KEY_SEPARATOR))
}

/// Truncated SHA-256 of the natural key. Pure function of its input.
pub fn hash_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(KEY_HASH_LEN);
    hex
}

/// Submission id for a record without one.
///
/// Deterministic whenever the natural key is non-empty. With no usable signal it
/// falls back to `gen-<millis>-<random>`, which re-imports will not reproduce.
pub fn build_submission_id(record: &AttendeeRecord) -> ExternalId {
    match natural_key(record) {
        Some(key) => ExternalId::Text(hash_key(&key)),
        None => ExternalId::Text(fallback_id()),
    }
}

/// Assigns a submission id when missing. Returns true if one was generated.
pub fn ensure_submission_id(record: &mut AttendeeRecord) -> bool {
    if record.submission_id.is_some() {
        return false;
    }
    record.submission_id = Some(build_submission_id(record));
    true
}

fn fallback_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(FALLBACK_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("gen-{}-{}", Utc::now().timestamp_millis(), suffix.to_lowercase())
}
