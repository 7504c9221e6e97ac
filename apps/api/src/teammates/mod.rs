// Teammate Resolver
// Resolves free-text teammate entries against registered profiles, with
// disambiguation when a name matches more than one person.

pub mod handlers;
pub mod resolver;

pub use resolver::{
    AddOutcome, PendingPick, ResolverConfig, TeammateResolver, TeammateToken, TokenStatus,
};

/// Splits the persisted comma-joined list. Blank entries and exact repeats are dropped.
pub fn split_teammates(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if !out.iter().any(|existing| existing == entry) {
            out.push(entry.to_string());
        }
    }
    out
}

pub fn join_teammates<'a>(entries: impl IntoIterator<Item = &'a str>) -> String {
    entries.into_iter().collect::<Vec<_>>().join(", ")
}
