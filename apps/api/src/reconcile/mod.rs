// Attendee Record Reconciliation
// Normalize raw rows, key them, upsert them, and fill profile gaps from them.
// All store access goes through `store::AttendeeStore`.

pub mod csv_source;
pub mod enrichment;
pub mod handlers;
pub mod identity_key;
pub mod import;
pub mod normalizer;
pub mod upsert;
