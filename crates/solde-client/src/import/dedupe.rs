use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use rusqlite::{Connection, params_from_iter};

use crate::ClientResult;
use crate::import::CanonicalTransaction;
use crate::state::map_sqlite_error;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum DedupeReason {
    Batch,
    ExistingStore,
}

impl DedupeReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::ExistingStore => "existing_store",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum MatchedOn {
    SourceRef,
    Fingerprint,
}

impl MatchedOn {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::SourceRef => "source_ref",
            Self::Fingerprint => "fingerprint",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DuplicateRecord {
    pub(crate) row: CanonicalTransaction,
    pub(crate) reason: DedupeReason,
    pub(crate) matched_on: MatchedOn,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct DedupeOutcome {
    pub(crate) insertable: Vec<CanonicalTransaction>,
    pub(crate) duplicates: Vec<DuplicateRecord>,
}

/// Account-scoped dedup keys: `(account_id, source_ref)` and
/// `(account_id, fingerprint)`.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeySet {
    source_refs: HashSet<(String, String)>,
    fingerprints: HashSet<(String, String)>,
}

impl KeySet {
    fn matched_on(&self, row: &CanonicalTransaction) -> Option<MatchedOn> {
        if let Some(source_ref) = &row.source_ref
            && self
                .source_refs
                .contains(&(row.account_id.clone(), source_ref.clone()))
        {
            return Some(MatchedOn::SourceRef);
        }
        if self
            .fingerprints
            .contains(&(row.account_id.clone(), row.fingerprint.clone()))
        {
            return Some(MatchedOn::Fingerprint);
        }
        None
    }

    fn insert(&mut self, account_id: &str, source_ref: Option<&str>, fingerprint: &str) {
        if let Some(source_ref) = source_ref {
            self.source_refs
                .insert((account_id.to_string(), source_ref.to_string()));
        }
        self.fingerprints
            .insert((account_id.to_string(), fingerprint.to_string()));
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.fingerprints.len()
    }
}

/// Loads every stored key for the accounts in the batch with one query.
///
/// Must run inside the import's write transaction so the keys cannot change
/// before the inserts that depend on them.
pub(crate) fn load_existing_keys(
    connection: &Connection,
    accounts: &BTreeSet<String>,
    db_path: &Path,
) -> ClientResult<KeySet> {
    let mut keys = KeySet::default();
    if accounts.is_empty() {
        return Ok(keys);
    }

    let placeholders = vec!["?"; accounts.len()].join(", ");
    let sql = format!(
        "SELECT account_id, source_ref, fingerprint
         FROM transactions
         WHERE account_id IN ({placeholders})"
    );
    let mut statement = connection
        .prepare(&sql)
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows = statement
        .query_map(params_from_iter(accounts.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    for row in rows {
        let (account_id, source_ref, fingerprint) =
            row.map_err(|error| map_sqlite_error(db_path, &error))?;
        keys.insert(&account_id, source_ref.as_deref(), &fingerprint);
    }

    Ok(keys)
}

/// Splits a batch into new rows and duplicates, in source order.
///
/// A row is a duplicate when its source ref or its fingerprint is already
/// stored for the account, or was claimed by an earlier row of this batch.
pub(crate) fn partition(rows: Vec<CanonicalTransaction>, existing: &KeySet) -> DedupeOutcome {
    let mut seen = KeySet::default();
    let mut outcome = DedupeOutcome::default();

    for row in rows {
        if let Some(matched_on) = existing.matched_on(&row) {
            outcome.duplicates.push(DuplicateRecord {
                row,
                reason: DedupeReason::ExistingStore,
                matched_on,
            });
            continue;
        }
        if let Some(matched_on) = seen.matched_on(&row) {
            outcome.duplicates.push(DuplicateRecord {
                row,
                reason: DedupeReason::Batch,
                matched_on,
            });
            continue;
        }

        seen.insert(&row.account_id, row.source_ref.as_deref(), &row.fingerprint);
        outcome.insertable.push(row);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{DedupeReason, KeySet, MatchedOn, partition};
    use crate::import::CanonicalTransaction;
    use crate::import::fingerprint;

    fn row(account: &str, day: u32, cents: i64, memo: &str, source_ref: Option<&str>) -> CanonicalTransaction {
        let posted_date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap_or_default();
        CanonicalTransaction {
            account_id: account.to_string(),
            posted_date,
            amount_cents: cents,
            description: memo.to_string(),
            source_ref: source_ref.map(str::to_string),
            fingerprint: fingerprint::compute(account, posted_date, cents, memo),
            source_row: i64::from(day),
        }
    }

    #[test]
    fn repeated_rows_within_a_batch_are_skipped() {
        let outcome = partition(
            vec![
                row("a", 1, -500, "BAKERY", None),
                row("a", 1, -500, "BAKERY", None),
                row("a", 2, 900, "REFUND", Some("F1")),
                row("a", 3, 100, "OTHER", Some("F1")),
            ],
            &KeySet::default(),
        );

        assert_eq!(outcome.insertable.len(), 2);
        assert_eq!(outcome.duplicates.len(), 2);
        assert_eq!(outcome.duplicates[0].reason, DedupeReason::Batch);
        assert_eq!(outcome.duplicates[0].matched_on, MatchedOn::Fingerprint);
        assert_eq!(outcome.duplicates[1].matched_on, MatchedOn::SourceRef);
    }

    #[test]
    fn stored_keys_are_scoped_by_account() {
        let mut existing = KeySet::default();
        let stored = row("a", 1, -500, "BAKERY", Some("F1"));
        existing.insert(&stored.account_id, stored.source_ref.as_deref(), &stored.fingerprint);

        let outcome = partition(
            vec![
                row("a", 9, 1, "DIFFERENT", Some("F1")),
                row("a", 1, -500, "BAKERY", None),
                row("b", 9, 1, "DIFFERENT", Some("F1")),
            ],
            &existing,
        );

        assert_eq!(existing.len(), 1);
        assert_eq!(outcome.insertable.len(), 1);
        assert_eq!(outcome.insertable[0].account_id, "b");
        assert!(
            outcome
                .duplicates
                .iter()
                .all(|duplicate| duplicate.reason == DedupeReason::ExistingStore)
        );
    }

    #[test]
    fn zero_amount_rows_are_kept() {
        let outcome = partition(vec![row("a", 4, 0, "FEE REVERSAL", None)], &KeySet::default());
        assert_eq!(outcome.insertable.len(), 1);
        assert!(outcome.duplicates.is_empty());
    }
}
