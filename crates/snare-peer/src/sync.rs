//! Connection Sync
//!
//! Every exchange with the peer, heartbeat or write, goes through here and
//! refreshes connectivity the same way:
//!
//! - success → connected, rules and enabled flag replaced, video list stored
//! - failure → disconnected, rules left as they were
//!
//! No retries. The next heartbeat is the retry.

use crate::client::{Peer, PeerError};
use crate::link::Link;
use crate::wire::{PeerRequest, SyncPayload, VideoItem};
use snare_network::{RuleSet, RuleStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Owns connectivity and rule propagation.
pub struct ConnectionSync {
    peer: Arc<dyn Peer>,
    rules: Arc<RuleStore>,
    link: Arc<Link>,
    videos: RwLock<Vec<VideoItem>>,
    round_trips: AtomicU64,
}

impl ConnectionSync {
    pub fn new(peer: Arc<dyn Peer>, rules: Arc<RuleStore>, link: Arc<Link>) -> Self {
        Self {
            peer,
            rules,
            link,
            videos: RwLock::new(Vec::new()),
            round_trips: AtomicU64::new(0),
        }
    }

    /// `GET /sync`. Returns whether the peer answered.
    pub async fn heartbeat(&self) -> bool {
        self.exchange(PeerRequest::Sync).await.is_ok()
    }

    /// Send one request and fold the outcome into connectivity and rules.
    pub async fn exchange(&self, request: PeerRequest) -> Result<SyncPayload, PeerError> {
        let path = request.path();
        self.round_trips.fetch_add(1, Ordering::Relaxed);

        match self.peer.exchange(request).await {
            Ok(payload) => {
                self.apply(&payload);
                debug!("Peer {} ok (enabled: {})", path, payload.enabled);
                Ok(payload)
            }
            Err(e) => {
                self.link.on_failure();
                warn!("Peer {} failed: {}", path, e);
                Err(e)
            }
        }
    }

    fn apply(&self, payload: &SyncPayload) {
        self.rules
            .replace(RuleSet::compile(&payload.to_rule_source()));
        *self.videos.write().unwrap_or_else(PoisonError::into_inner) = payload.video_list.clone();
        self.link.on_success(payload.enabled);
    }

    /// Video list from the last successful round trip.
    pub fn videos(&self) -> Vec<VideoItem> {
        self.videos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn link(&self) -> &Arc<Link> {
        &self.link
    }

    pub fn rules(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }
}
