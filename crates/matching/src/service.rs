use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use chrono::Utc;
use docmatch_core::{FoundRecord, ItemId, LostRecord, MatchCandidate, MatchId, NewMatch, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::match_engine::MatchEngine;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Match store unavailable: {0}")]
    Unavailable(String),
    #[error("Match store query failed: {0}")]
    Query(String),
}

/// Result of an atomic create-if-absent. The loser of a concurrent race
/// receives `AlreadyExists` with the row the winner wrote.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(MatchCandidate),
    AlreadyExists(MatchCandidate),
}

impl CreateOutcome {
    pub fn candidate(&self) -> &MatchCandidate {
        match self {
            CreateOutcome::Created(c) | CreateOutcome::AlreadyExists(c) => c,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Persistence for match candidates; at most one candidate per
/// `(lost_ref, found_ref)` pair.
pub trait MatchStore: Send + Sync {
    fn create_if_absent(&self, new: NewMatch) -> impl Future<Output = Result<CreateOutcome, StoreError>> + Send;

    fn list_candidates(&self) -> impl Future<Output = Result<Vec<MatchCandidate>, StoreError>> + Send;
}

#[derive(Debug, Default)]
struct StoreInner {
    next_id: i64,
    by_pair: HashMap<(ItemId, ItemId), MatchCandidate>,
}

/// Mutex-guarded map keyed by the pair.
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Unavailable("match store lock poisoned".into()))
    }
}

impl MatchStore for InMemoryMatchStore {
    async fn create_if_absent(&self, new: NewMatch) -> Result<CreateOutcome, StoreError> {
        let mut inner = self.lock()?;
        let pair = (new.lost_ref, new.found_ref);
        if let Some(existing) = inner.by_pair.get(&pair) {
            return Ok(CreateOutcome::AlreadyExists(existing.clone()));
        }
        inner.next_id += 1;
        let candidate = MatchCandidate::from_new(MatchId(inner.next_id), new, Utc::now());
        inner.by_pair.insert(pair, candidate.clone());
        Ok(CreateOutcome::Created(candidate))
    }

    async fn list_candidates(&self) -> Result<Vec<MatchCandidate>, StoreError> {
        let mut all: Vec<MatchCandidate> = self.lock()?.by_pair.values().cloned().collect();
        all.sort_by_key(|c| c.id.0);
        Ok(all)
    }
}

// ── Notifications ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    /// Declared the document lost.
    Owner,
    /// Reported finding it.
    Finder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFoundEvent {
    pub recipient: UserId,
    pub role: PartyRole,
    pub match_id: MatchId,
    pub lost_ref: ItemId,
    pub found_ref: ItemId,
    pub confidence_score: f32,
}

/// Receives one event per party when a candidate is first created.
/// Delivery is fire-and-forget.
pub trait MatchNotifier: Send + Sync {
    fn notify(&self, event: MatchFoundEvent);
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<MatchFoundEvent>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<MatchFoundEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MatchFoundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MatchNotifier for ChannelNotifier {
    fn notify(&self, event: MatchFoundEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(recipient = %e.0.recipient, "notification receiver dropped");
        }
    }
}

/// Writes events to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl MatchNotifier for LogNotifier {
    fn notify(&self, event: MatchFoundEvent) {
        info!(
            recipient = %event.recipient,
            role = ?event.role,
            match_id = %event.match_id,
            confidence = event.confidence_score,
            "match found"
        );
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<MatchFoundEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<MatchFoundEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl MatchNotifier for RecordingNotifier {
    fn notify(&self, event: MatchFoundEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

// ── Matching policy ──────────────────────────────────────────────────────────

/// Scores a new declaration against the open declarations of the opposite
/// kind and records every accepted pair exactly once.
pub struct MatchingService<S: MatchStore, N: MatchNotifier> {
    engine: MatchEngine,
    store: S,
    notifier: N,
}

impl<S: MatchStore, N: MatchNotifier> MatchingService<S, N> {
    pub fn new(engine: MatchEngine, store: S, notifier: N) -> Self {
        Self { engine, store, notifier }
    }

    pub fn engine(&self) -> &MatchEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Match a newly found document against the lost pool. Pairs the store
    /// fails to record are skipped.
    pub async fn match_found_item(
        &self,
        found: &FoundRecord,
        lost_pool: &[LostRecord],
    ) -> Vec<CreateOutcome> {
        if !found.is_open() {
            debug!(found = %found.id, status = %found.status, "found item not open, skipping");
            return Vec::new();
        }
        let mut outcomes = Vec::new();
        for lost in lost_pool.iter().filter(|l| l.is_open() && l.document_type == found.document_type) {
            if let Some(outcome) = self.consider_or_skip(lost, found).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Match a newly declared loss against the found pool.
    pub async fn match_lost_item(
        &self,
        lost: &LostRecord,
        found_pool: &[FoundRecord],
    ) -> Vec<CreateOutcome> {
        if !lost.is_open() {
            debug!(lost = %lost.id, status = %lost.status, "lost item not open, skipping");
            return Vec::new();
        }
        let mut outcomes = Vec::new();
        for found in found_pool.iter().filter(|f| f.is_open() && f.document_type == lost.document_type) {
            if let Some(outcome) = self.consider_or_skip(lost, found).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// A store failure on one pair is logged and the scan moves on.
    async fn consider_or_skip(&self, lost: &LostRecord, found: &FoundRecord) -> Option<CreateOutcome> {
        match self.consider(lost, found).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(lost = %lost.id, found = %found.id, error = %e, "could not record match candidate, skipping pair");
                None
            }
        }
    }

    async fn consider(&self, lost: &LostRecord, found: &FoundRecord) -> Result<Option<CreateOutcome>, StoreError> {
        let (score, criteria) = self.engine.score_with_criteria(lost, found);
        if !self.engine.is_accepted(score) {
            debug!(lost = %lost.id, found = %found.id, score, "pair below threshold");
            return Ok(None);
        }

        let new = NewMatch { lost_ref: lost.id, found_ref: found.id, confidence_score: score, match_criteria: criteria };
        let outcome = self.store.create_if_absent(new).await?;
        match &outcome {
            CreateOutcome::Created(candidate) => {
                info!(
                    match_id = %candidate.id,
                    lost = %lost.id,
                    found = %found.id,
                    score,
                    "match candidate created"
                );
                let parties = [(lost.owner, PartyRole::Owner), (found.owner, PartyRole::Finder)];
                for (recipient, role) in parties {
                    if let Some(recipient) = recipient {
                        self.notifier.notify(MatchFoundEvent {
                            recipient,
                            role,
                            match_id: candidate.id,
                            lost_ref: candidate.lost_ref,
                            found_ref: candidate.found_ref,
                            confidence_score: candidate.confidence_score,
                        });
                    }
                }
            }
            CreateOutcome::AlreadyExists(candidate) => {
                debug!(match_id = %candidate.id, "pair already matched");
            }
        }
        Ok(Some(outcome))
    }
}
