//! Teammate token state machine.
//!
//! Token status: `unknown` (no lookup yet, or nothing matched) → `partial` (the
//! batch refresh matched more than one profile) → `found` (exactly one match, by
//! email equality, a single name hit, or an explicit pick).
//!
//! State sits behind a short-lived mutex that is never held across a store call.
//! Each input change bumps a generation counter; a lookup that returns after the
//! input has moved on is discarded instead of applied.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::models::profile::TeammateCandidate;
use crate::store::{AttendeeStore, StoreError};
use crate::teammates::{join_teammates, split_teammates};

/// Upper bound on name matches offered for disambiguation.
pub const MAX_CANDIDATES: usize = 6;
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(100);
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Found,
    Partial,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeammateToken {
    pub text: String,
    pub profile: Option<TeammateCandidate>,
    pub status: TokenStatus,
}

impl TeammateToken {
    fn unknown(text: String) -> Self {
        Self {
            text,
            profile: None,
            status: TokenStatus::Unknown,
        }
    }

    fn found(text: String, profile: TeammateCandidate) -> Self {
        Self {
            text,
            profile: Some(profile),
            status: TokenStatus::Found,
        }
    }
}

/// Candidates awaiting a user pick, keyed to the input that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingPick {
    pub query: String,
    pub candidates: Vec<TeammateCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(TokenStatus),
    /// More than one name matched; see `TeammateResolver::pending`.
    Ambiguous(usize),
    /// Blank input or a token with the same text already exists.
    Ignored,
    /// The input changed while the lookup was in flight.
    Stale,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    pub throttle: Duration,
    pub lookup_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            throttle: DEFAULT_THROTTLE,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

#[derive(Default)]
struct ResolverState {
    tokens: Vec<TeammateToken>,
    pending: Option<PendingPick>,
    input: String,
    generation: u64,
}

impl ResolverState {
    fn has_token(&self, text: &str) -> bool {
        self.tokens.iter().any(|t| t.text == text)
    }

    fn joined(&self) -> String {
        join_teammates(self.tokens.iter().map(|t| t.text.as_str()))
    }

    /// Returns the generation in effect for `input`.
    fn set_input(&mut self, input: &str) -> u64 {
        let input = input.trim();
        if self.input != input {
            self.input = input.to_string();
            self.generation += 1;
            if self.pending.as_ref().is_some_and(|p| p.query != input) {
                self.pending = None;
            }
        }
        self.generation
    }
}

enum Lookup {
    Email(Option<TeammateCandidate>),
    Name(Vec<TeammateCandidate>),
}

pub struct TeammateResolver {
    store: Arc<dyn AttendeeStore>,
    config: ResolverConfig,
    state: Mutex<ResolverState>,
    changes: watch::Sender<String>,
}

impl TeammateResolver {
    pub fn new(store: Arc<dyn AttendeeStore>, config: ResolverConfig) -> Self {
        let (changes, _) = watch::channel(String::new());
        Self {
            store,
            config,
            state: Mutex::new(ResolverState::default()),
            changes,
        }
    }

    /// Starts from a persisted comma-joined list. Every entry begins `unknown`.
    pub fn with_text(store: Arc<dyn AttendeeStore>, config: ResolverConfig, text: &str) -> Self {
        let resolver = Self::new(store, config);
        {
            let mut state = resolver.lock();
            state.tokens = split_teammates(text)
                .into_iter()
                .map(TeammateToken::unknown)
                .collect();
            resolver.changes.send_replace(state.joined());
        }
        resolver
    }

    /// Receives the comma-joined text after every add or remove.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.changes.subscribe()
    }

    pub fn tokens(&self) -> Vec<TeammateToken> {
        self.lock().tokens.clone()
    }

    pub fn pending(&self) -> Option<PendingPick> {
        self.lock().pending.clone()
    }

    pub fn joined(&self) -> String {
        self.lock().joined()
    }

    /// Records the current input text. Clearing or changing it drops pending
    /// candidates that belong to other text.
    pub fn set_input(&self, text: &str) {
        self.lock().set_input(text);
    }

    pub async fn add_token(&self, text: &str) -> AddOutcome {
        let text = text.trim().to_string();
        if text.is_empty() {
            return AddOutcome::Ignored;
        }
        let ticket = {
            let mut state = self.lock();
            if state.has_token(&text) {
                return AddOutcome::Ignored;
            }
            state.set_input(&text)
        };

        let lookup = self.lookup(&text).await;

        let mut state = self.lock();
        if state.has_token(&text) {
            return AddOutcome::Ignored;
        }
        let token = match lookup {
            Err(e) => {
                warn!("Teammate lookup for '{text}' failed: {e}");
                TeammateToken::unknown(text)
            }
            Ok(Lookup::Email(Some(candidate))) => TeammateToken::found(text, candidate),
            Ok(Lookup::Email(None)) => TeammateToken::unknown(text),
            Ok(Lookup::Name(mut candidates)) => match candidates.len() {
                0 => TeammateToken::unknown(text),
                1 => TeammateToken::found(text, candidates.remove(0)),
                n => {
                    if state.generation != ticket {
                        debug!("Discarding stale candidates for '{text}'");
                        return AddOutcome::Stale;
                    }
                    state.pending = Some(PendingPick {
                        query: text,
                        candidates,
                    });
                    return AddOutcome::Ambiguous(n);
                }
            },
        };
        let status = token.status;
        state.tokens.push(token);
        state.pending = None;
        self.publish(&state);
        AddOutcome::Added(status)
    }

    /// Resolves the pending pick with `candidate`. Returns false when there is
    /// nothing pending or the candidate's text is already a token.
    pub fn select_candidate(&self, candidate: &TeammateCandidate) -> bool {
        let mut state = self.lock();
        let Some(pending) = state.pending.take() else {
            return false;
        };
        let text = candidate
            .display_name()
            .or_else(|| candidate.email.clone())
            .unwrap_or(pending.query);
        if state.has_token(&text) {
            return false;
        }
        state.tokens.push(TeammateToken::found(text, candidate.clone()));
        self.publish(&state);
        true
    }

    pub fn remove_token(&self, text: &str) -> bool {
        let mut state = self.lock();
        let before = state.tokens.len();
        state.tokens.retain(|t| t.text != text);
        if state.tokens.len() == before {
            return false;
        }
        self.publish(&state);
        true
    }

    /// Re-resolves every token with a single combined lookup.
    /// On failure the tokens are left as they were and false is returned.
    /// Tokens added, picked or removed while the lookup is in flight are left as
    /// they are; only tokens unchanged since the lookup started are rewritten.
    pub async fn refresh_statuses(&self) -> bool {
        let snapshot: Vec<TeammateToken> = self.lock().tokens.clone();
        if snapshot.is_empty() {
            return true;
        }
        let (emails, names): (Vec<String>, Vec<String>) = snapshot
            .iter()
            .map(|t| t.text.clone())
            .partition(|t| t.contains('@'));

        let rows = match self
            .timed(self.store.lookup_teammates(&emails, &names))
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Teammate status refresh failed: {e}");
                return false;
            }
        };

        let mut state = self.lock();
        for token in state.tokens.iter_mut() {
            if !snapshot.contains(token) {
                debug!("Token '{}' changed during refresh; keeping it", token.text);
                continue;
            }
            let matches: Vec<&TeammateCandidate> = if token.text.contains('@') {
                rows.iter()
                    .filter(|c| c.email.as_deref() == Some(token.text.as_str()))
                    .collect()
            } else {
                rows.iter().filter(|c| c.name_contains(&token.text)).collect()
            };

            let picked = token
                .profile
                .as_ref()
                .and_then(|p| matches.iter().find(|c| c.id == p.id));
            let (status, profile) = match (picked, matches.len()) {
                (Some(c), _) => (TokenStatus::Found, Some((*c).clone())),
                (None, 0) => (TokenStatus::Unknown, None),
                (None, 1) => (TokenStatus::Found, Some(matches[0].clone())),
                (None, _) => (TokenStatus::Partial, None),
            };
            token.status = status;
            token.profile = profile;
        }
        true
    }

    /// Throttled live lookup for the picker. Returns `None` when a newer input
    /// superseded this one or the lookup failed.
    pub async fn suggest(&self, text: &str) -> Option<Vec<TeammateCandidate>> {
        let ticket = self.lock().set_input(text);
        tokio::time::sleep(self.config.throttle).await;
        if self.lock().generation != ticket {
            return None;
        }
        let text = text.trim();
        if text.is_empty() {
            return Some(Vec::new());
        }

        let candidates = match self.lookup(text).await {
            Ok(Lookup::Email(hit)) => hit.into_iter().collect(),
            Ok(Lookup::Name(candidates)) => candidates,
            Err(e) => {
                warn!("Teammate suggestion lookup failed: {e}");
                return None;
            }
        };

        if self.lock().generation != ticket {
            debug!("Discarding stale suggestions for '{text}'");
            return None;
        }
        Some(candidates)
    }

    /// Unthrottled single lookup with the status the text would get as a token.
    pub async fn search(
        &self,
        text: &str,
    ) -> Result<(TokenStatus, Vec<TeammateCandidate>), StoreError> {
        let candidates: Vec<TeammateCandidate> = match self.lookup(text.trim()).await? {
            Lookup::Email(hit) => hit.into_iter().collect(),
            Lookup::Name(candidates) => candidates,
        };
        let status = match candidates.len() {
            0 => TokenStatus::Unknown,
            1 => TokenStatus::Found,
            _ => TokenStatus::Partial,
        };
        Ok((status, candidates))
    }

    async fn lookup(&self, text: &str) -> Result<Lookup, StoreError> {
        if text.contains('@') {
            self.timed(self.store.find_profile_by_email(text))
                .await
                .map(Lookup::Email)
        } else {
            self.timed(self.store.search_profiles_by_name(text, MAX_CANDIDATES))
                .await
                .map(Lookup::Name)
        }
    }

    async fn timed<T>(
        &self,
        request: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.config.lookup_timeout, request)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    fn publish(&self, state: &ResolverState) {
        self.changes.send_replace(state.joined());
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
