use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::dates::format_iso_date;

/// Stable dedup hash of `(account, date, amount, description)`.
///
/// Each part is length-prefixed so that no choice of description text can
/// make two different tuples hash the same input. Descriptions are compared
/// with surrounding whitespace trimmed and inner runs collapsed, since exports
/// of the same transaction differ only in padding.
pub fn compute(account_id: &str, posted_date: NaiveDate, amount_cents: i64, description: &str) -> String {
    let normalized_description = normalize_description(description);
    let parts = [
        account_id.to_string(),
        format_iso_date(&posted_date),
        amount_cents.to_string(),
        normalized_description,
    ];

    let mut hasher = Sha256::new();
    for part in &parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub(crate) fn normalize_description(description: &str) -> String {
    description.split_whitespace().collect::<Vec<_>>().join(" ")
}
