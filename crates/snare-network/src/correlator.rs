//! Request Correlator
//!
//! Joins the two observation points of one network transaction, keyed by
//! the browser's request id:
//!
//! 1. request sent → entry stored, fast-path verdict on the URL
//! 2. response headers → entry resolved, full verdict
//!
//! The table is bounded. When full, the oldest unresolved entry (by
//! insertion) is evicted; its phase 2 then finds nothing and is ignored.

use crate::classifier::{classify, classify_url, MatchRule, Verdict};
use crate::headers::Headers;
use crate::rules::RuleSet;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, trace};

/// Opaque browser-assigned transaction id
pub type RequestId = String;

/// A request seen at phase 1, waiting for its response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PendingRequest {
    pub id: RequestId,
    pub url: String,
    pub method: String,
    pub tab_id: i64,
    pub request_headers: Headers,
}

/// Phase-2 observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseMeta {
    pub id: RequestId,
    pub url: String,
    pub tab_id: i64,
    pub response_headers: Headers,
}

/// A request the classifier decided to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    pub url: String,
    pub method: String,
    pub tab_id: i64,
    pub request_headers: Headers,
    /// Empty when captured on the fast path
    pub response_headers: Headers,
    pub rule: MatchRule,
}

/// Result of a phase-1 observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase1Outcome {
    /// Fast path captured it; the entry is already gone
    Captured(CapturedRequest),
    /// Blocked host; the entry is already gone
    Vetoed,
    /// Stored, waiting for phase 2
    Pending,
}

/// Correlator statistics
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    pub observed: AtomicU64,
    pub captured: AtomicU64,
    pub vetoed: AtomicU64,
    pub evicted: AtomicU64,
    pub resolved: AtomicU64,
    pub errored: AtomicU64,
}

#[derive(Debug)]
struct Slot {
    seq: u64,
    request: PendingRequest,
}

/// Insertion-ordered table. `order` may hold stale ids; a stale entry is
/// one whose sequence number no longer matches the live slot.
#[derive(Debug, Default)]
struct PendingTable {
    slots: HashMap<RequestId, Slot>,
    order: VecDeque<(RequestId, u64)>,
    next_seq: u64,
}

impl PendingTable {
    fn insert(&mut self, request: PendingRequest, capacity: usize) -> Vec<RequestId> {
        let mut evicted = Vec::new();

        // A repeated phase 1 for a live id replaces it in place.
        if self.slots.remove(&request.id).is_none() {
            while self.slots.len() >= capacity {
                match self.pop_oldest() {
                    Some(id) => evicted.push(id),
                    None => break,
                }
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.push_back((request.id.clone(), seq));
        self.slots.insert(request.id.clone(), Slot { seq, request });

        if self.order.len() > capacity.saturating_mul(2).max(16) {
            self.compact();
        }
        evicted
    }

    fn pop_oldest(&mut self) -> Option<RequestId> {
        while let Some((id, seq)) = self.order.pop_front() {
            let live = self.slots.get(&id).is_some_and(|slot| slot.seq == seq);
            if live {
                self.slots.remove(&id);
                return Some(id);
            }
        }
        None
    }

    fn remove(&mut self, id: &str) -> Option<PendingRequest> {
        self.slots.remove(id).map(|slot| slot.request)
    }

    fn compact(&mut self) {
        let slots = &self.slots;
        self.order
            .retain(|(id, seq)| slots.get(id).is_some_and(|slot| slot.seq == *seq));
    }
}

/// Bounded two-phase correlator.
#[derive(Debug)]
pub struct RequestCorrelator {
    capacity: usize,
    table: Mutex<PendingTable>,
    stats: CorrelatorStats,
}

impl RequestCorrelator {
    /// Create a correlator holding at most `capacity` unresolved requests.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            table: Mutex::new(PendingTable::default()),
            stats: CorrelatorStats::default(),
        }
    }

    /// Phase 1: a request was sent.
    pub fn on_phase1(&self, request: PendingRequest, rules: &RuleSet) -> Phase1Outcome {
        self.stats.observed.fetch_add(1, Ordering::Relaxed);
        let verdict = classify_url(&request.url, rules);

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let id = request.id.clone();
        let evicted = table.insert(request, self.capacity);
        let decided = if verdict.is_decisive() {
            table.remove(&id)
        } else {
            None
        };
        drop(table);

        if !evicted.is_empty() {
            self.stats
                .evicted
                .fetch_add(evicted.len() as u64, Ordering::Relaxed);
            debug!(
                "Pending table full ({}), evicted {:?}",
                self.capacity, evicted
            );
        }

        match (verdict, decided) {
            (Verdict::Vetoed, _) => {
                self.stats.vetoed.fetch_add(1, Ordering::Relaxed);
                trace!("Request {} vetoed at phase 1", id);
                Phase1Outcome::Vetoed
            }
            (Verdict::Capture(rule), Some(request)) => {
                self.stats.captured.fetch_add(1, Ordering::Relaxed);
                trace!("Request {} captured at phase 1 by {}", id, rule);
                Phase1Outcome::Captured(CapturedRequest {
                    url: request.url,
                    method: request.method,
                    tab_id: request.tab_id,
                    request_headers: request.request_headers,
                    response_headers: Headers::new(),
                    rule,
                })
            }
            _ => Phase1Outcome::Pending,
        }
    }

    /// Phase 2: response headers arrived.
    ///
    /// Unknown ids (resolved, evicted, errored, never seen) are ignored.
    pub fn on_phase2(&self, response: ResponseMeta, rules: &RuleSet) -> Option<CapturedRequest> {
        let request = self
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&response.id)?;
        self.stats.resolved.fetch_add(1, Ordering::Relaxed);

        let url = if response.url.is_empty() {
            request.url
        } else {
            response.url
        };

        match classify(&url, &response.response_headers, rules) {
            Verdict::Capture(rule) => {
                self.stats.captured.fetch_add(1, Ordering::Relaxed);
                trace!("Request {} captured at phase 2 by {}", response.id, rule);
                Some(CapturedRequest {
                    url,
                    method: request.method,
                    tab_id: request.tab_id,
                    request_headers: request.request_headers,
                    response_headers: response.response_headers,
                    rule,
                })
            }
            Verdict::Vetoed => {
                self.stats.vetoed.fetch_add(1, Ordering::Relaxed);
                None
            }
            Verdict::Pass => None,
        }
    }

    /// The transaction failed; forget it.
    pub fn on_error(&self, id: &str) {
        let removed = self
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed.is_some() {
            self.stats.errored.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of unresolved requests.
    pub fn pending(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .contains_key(id)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &CorrelatorStats {
        &self.stats
    }
}
