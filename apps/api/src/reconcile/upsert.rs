//! Store upsert for imported registrations, with the select-then-insert fallback
//! used when the `attendees` table has no unique constraint on `submission_id`.
//!
//! The fallback is at-least-once: a row inserted by another writer between the
//! existence check and the insert is duplicated. Set `UniquenessPolicy::Require`
//! to fail the chunk instead.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::attendee::AttendeeRecord;
use crate::store::{AttendeeStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniquenessPolicy {
    /// Emulate uniqueness with select-then-insert when the store cannot enforce it.
    #[default]
    BestEffort,
    /// Treat a missing unique constraint as a chunk failure.
    Require,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePath {
    #[default]
    Upsert,
    SelectThenInsert,
    PerRow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChunkWrite {
    pub written: usize,
    pub skipped_existing: usize,
    pub row_errors: usize,
    pub path: WritePath,
}

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("attendees.submission_id has no unique constraint and uniqueness is required")]
    UniquenessRequired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Collapses records sharing a submission id. The last occurrence wins but keeps
/// the position of the first. Records without an id pass through.
pub fn dedupe_by_submission_id(records: Vec<AttendeeRecord>) -> Vec<AttendeeRecord> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<AttendeeRecord> = Vec::with_capacity(records.len());
    for record in records {
        match record.submission_id.as_ref().map(ToString::to_string) {
            Some(key) => match positions.get(&key) {
                Some(&index) => out[index] = record,
                None => {
                    positions.insert(key, out.len());
                    out.push(record);
                }
            },
            None => out.push(record),
        }
    }
    out
}

/// Writes one chunk. Every record is expected to carry a submission id.
pub async fn write_chunk(
    store: &dyn AttendeeStore,
    records: &[AttendeeRecord],
    policy: UniquenessPolicy,
) -> Result<ChunkWrite, ChunkError> {
    if records.is_empty() {
        return Ok(ChunkWrite::default());
    }
    match store.upsert_attendees(records).await {
        Ok(_) => Ok(ChunkWrite {
            written: records.len(),
            ..Default::default()
        }),
        Err(StoreError::MissingUniqueConstraint(detail)) => {
            if policy == UniquenessPolicy::Require {
                return Err(ChunkError::UniquenessRequired);
            }
            warn!("Upsert rejected ({detail}); falling back to select-then-insert");
            Ok(insert_missing(store, records).await)
        }
        Err(e) => Err(e.into()),
    }
}

async fn insert_missing(store: &dyn AttendeeStore, records: &[AttendeeRecord]) -> ChunkWrite {
    let ids: Vec<String> = records
        .iter()
        .filter_map(|r| r.submission_id.as_ref().map(ToString::to_string))
        .collect();

    let existing: HashSet<String> = match store.existing_submission_ids(&ids).await {
        Ok(existing) => existing,
        Err(e) => {
            warn!("Existence check failed ({e}); inserting row by row");
            return insert_each(store, records).await;
        }
    };

    let (present, fresh): (Vec<&AttendeeRecord>, Vec<&AttendeeRecord>) =
        records.iter().partition(|r| {
            r.submission_id
                .as_ref()
                .map(|id| existing.contains(&id.to_string()))
                .unwrap_or(false)
        });
    let fresh: Vec<AttendeeRecord> = fresh.into_iter().cloned().collect();
    debug!(
        "Select-then-insert: {} already present, {} new",
        present.len(),
        fresh.len()
    );

    if fresh.is_empty() {
        return ChunkWrite {
            skipped_existing: present.len(),
            path: WritePath::SelectThenInsert,
            ..Default::default()
        };
    }

    match store.insert_attendees(&fresh).await {
        Ok(written) => ChunkWrite {
            written,
            skipped_existing: present.len(),
            row_errors: 0,
            path: WritePath::SelectThenInsert,
        },
        Err(e) => {
            warn!("Batch insert failed ({e}); inserting row by row");
            let mut write = insert_each(store, &fresh).await;
            write.skipped_existing += present.len();
            write
        }
    }
}

async fn insert_each(store: &dyn AttendeeStore, records: &[AttendeeRecord]) -> ChunkWrite {
    let mut write = ChunkWrite {
        path: WritePath::PerRow,
        ..Default::default()
    };
    for record in records {
        let id = record
            .submission_id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        match store.insert_attendee(record).await {
            Ok(()) => write.written += 1,
            Err(StoreError::Duplicate(detail)) => {
                debug!("Skipping {id}: {detail}");
                write.skipped_existing += 1;
            }
            Err(e) => {
                warn!("Insert of {id} failed: {e}");
                write.row_errors += 1;
            }
        }
    }
    write
}
