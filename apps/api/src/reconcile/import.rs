//! Batch Import Driver — chunked, sequential writes of normalized registrations,
//! followed by cross-linking into existing profiles.
//!
//! A failed chunk is recorded and the run moves on; partial progress is kept.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::models::attendee::AttendeeRecord;
use crate::reconcile::enrichment::diff_profile;
use crate::reconcile::identity_key::ensure_submission_id;
use crate::reconcile::upsert::{dedupe_by_submission_id, write_chunk, UniquenessPolicy};
use crate::store::AttendeeStore;

/// Keeps a single request comfortably under typical size and time limits.
pub const DEFAULT_CHUNK_SIZE: usize = 200;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub chunk_size: usize,
    pub uniqueness: UniquenessPolicy,
    pub enrich_profiles: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            uniqueness: UniquenessPolicy::BestEffort,
            enrich_profiles: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub chunk: usize,
    pub rows: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub parsed: usize,
    pub generated_ids: usize,
    pub collapsed_duplicates: usize,
    pub written: usize,
    pub skipped_existing: usize,
    pub row_errors: usize,
    pub profiles_enriched: usize,
    pub failed_chunks: Vec<ChunkFailure>,
}

impl ImportReport {
    /// True when at least one chunk could not be written at all.
    pub fn has_unrecoverable_errors(&self) -> bool {
        !self.failed_chunks.is_empty()
    }
}

pub async fn run_import(
    store: &dyn AttendeeStore,
    records: Vec<AttendeeRecord>,
    options: &ImportOptions,
) -> ImportReport {
    let mut report = ImportReport {
        parsed: records.len(),
        ..Default::default()
    };

    let mut records = records;
    for record in records.iter_mut() {
        if ensure_submission_id(record) {
            report.generated_ids += 1;
        }
    }
    let records = dedupe_by_submission_id(records);
    report.collapsed_duplicates = report.parsed - records.len();

    let chunk_size = options.chunk_size.max(1);
    let total_chunks = records.len().div_ceil(chunk_size);

    for (index, chunk) in records.chunks(chunk_size).enumerate() {
        info!(
            "Importing chunk {}/{} ({} rows)",
            index + 1,
            total_chunks,
            chunk.len()
        );
        match write_chunk(store, chunk, options.uniqueness).await {
            Ok(write) => {
                report.written += write.written;
                report.skipped_existing += write.skipped_existing;
                report.row_errors += write.row_errors;
                if options.enrich_profiles {
                    report.profiles_enriched += enrich_matching_profiles(store, chunk).await;
                }
            }
            Err(e) => {
                error!("Chunk {} failed: {e}", index + 1);
                report.failed_chunks.push(ChunkFailure {
                    chunk: index + 1,
                    rows: chunk.len(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Import finished: parsed={} written={} skipped={} row_errors={} enriched={} failed_chunks={}",
        report.parsed,
        report.written,
        report.skipped_existing,
        report.row_errors,
        report.profiles_enriched,
        report.failed_chunks.len()
    );
    report
}

/// Fills empty fields of profiles whose email matches a record in `chunk`.
/// Returns the number of profiles written. Failures are logged and skipped.
pub async fn enrich_matching_profiles(
    store: &dyn AttendeeStore,
    chunk: &[AttendeeRecord],
) -> usize {
    let mut latest: HashMap<String, &AttendeeRecord> = HashMap::new();
    for record in chunk {
        let Some(email) = record.email_key() else {
            continue;
        };
        let newer = latest
            .get(&email)
            .map_or(true, |current| record.submitted_at >= current.submitted_at);
        if newer {
            latest.insert(email, record);
        }
    }
    if latest.is_empty() {
        return 0;
    }

    let emails: Vec<String> = latest
        .keys()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let profiles = match store.find_profiles_by_emails(&emails).await {
        Ok(profiles) => profiles,
        Err(e) => {
            warn!("Profile lookup for enrichment failed: {e}");
            return 0;
        }
    };

    let mut enriched = 0;
    for profile in profiles {
        let Some(email) = profile.email.as_deref().map(|e| e.trim().to_lowercase()) else {
            continue;
        };
        let Some(source) = latest.get(&email) else {
            continue;
        };
        let patch = diff_profile(&profile, source);
        if patch.is_empty() {
            continue;
        }
        match store.update_profile(profile.id, &patch).await {
            Ok(true) => enriched += 1,
            Ok(false) => {}
            Err(e) => warn!("Enriching profile {} failed: {e}", profile.id),
        }
    }
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::{AuthIdentity, ProfileRecord};
    use crate::reconcile::csv_source::parse_csv;
    use crate::store::MemoryStore;
    use uuid::Uuid;

    const CSV: &str = "Submitted at,Email Address,First Name,Last Name,School\n\
        2025-01-01 10:00,a@b.com,A,B,Galena\n\
        2025-01-02 11:00,c@d.com,C,D,Reno High\n\
        2025-01-03 12:00,e@f.com,E,F,\n";

    fn records() -> Vec<AttendeeRecord> {
        parse_csv(CSV).unwrap().normalize()
    }

    #[tokio::test]
    async fn test_reimport_does_not_grow_with_unique_store() {
        let store = MemoryStore::new(true);
        run_import(&store, records(), &ImportOptions::default()).await;
        let once = store.distinct_submission_ids();
        run_import(&store, records(), &ImportOptions::default()).await;
        assert_eq!(once, 3);
        assert_eq!(store.distinct_submission_ids(), once);
        assert_eq!(store.attendees().len(), 3);
    }

    #[tokio::test]
    async fn test_reimport_does_not_grow_with_fallback() {
        let store = MemoryStore::new(false);
        let first = run_import(&store, records(), &ImportOptions::default()).await;
        let second = run_import(&store, records(), &ImportOptions::default()).await;
        assert_eq!(first.written, 3);
        assert_eq!(second.written, 0);
        assert_eq!(second.skipped_existing, 3);
        assert_eq!(store.attendees().len(), 3);
    }

    #[tokio::test]
    async fn test_chunking_and_report() {
        let store = MemoryStore::new(true);
        let options = ImportOptions {
            chunk_size: 2,
            ..Default::default()
        };
        let report = run_import(&store, records(), &options).await;
        assert_eq!(report.parsed, 3);
        assert_eq!(report.generated_ids, 3);
        assert_eq!(report.written, 3);
        assert!(!report.has_unrecoverable_errors());
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_abort_run() {
        let store = MemoryStore::new(false);
        let options = ImportOptions {
            chunk_size: 2,
            uniqueness: UniquenessPolicy::Require,
            ..Default::default()
        };
        let report = run_import(&store, records(), &options).await;
        assert_eq!(report.failed_chunks.len(), 2);
        assert_eq!(report.failed_chunks[1].rows, 1);
        assert!(report.has_unrecoverable_errors());
    }

    #[tokio::test]
    async fn test_duplicate_rows_in_file_collapse() {
        let store = MemoryStore::new(true);
        let mut input = records();
        input.push(input[0].clone());
        let report = run_import(&store, input, &ImportOptions::default()).await;
        assert_eq!(report.collapsed_duplicates, 1);
        assert_eq!(store.attendees().len(), 3);
    }

    #[tokio::test]
    async fn test_import_enriches_existing_profiles() {
        let store = MemoryStore::new(true);
        let identity = AuthIdentity {
            id: Uuid::new_v4(),
            email: "C@D.com".to_string(),
        };
        let mut profile = ProfileRecord::for_identity(&identity);
        profile.school = Some("Kept High".to_string());
        store.seed_profile(profile);

        let report = run_import(&store, records(), &ImportOptions::default()).await;
        assert_eq!(report.profiles_enriched, 1);

        let profile = store.profile(identity.id).unwrap();
        assert_eq!(profile.first_name.as_deref(), Some("C"));
        assert_eq!(profile.school.as_deref(), Some("Kept High"));
        assert!(profile.submission_id.is_some());

        let again = run_import(&store, records(), &ImportOptions::default()).await;
        assert_eq!(again.profiles_enriched, 0);
    }

    #[tokio::test]
    async fn test_enrichment_lookup_failure_is_tolerated() {
        let store = MemoryStore::new(true);
        store.fail_on("find_profiles_by_emails");
        let report = run_import(&store, records(), &ImportOptions::default()).await;
        assert_eq!(report.written, 3);
        assert_eq!(report.profiles_enriched, 0);
        assert!(!report.has_unrecoverable_errors());
    }
}
