//! Agent
//!
//! Wires the correlator, the download gate and the connection sync to the
//! host. Monitoring is recomputed on every decision; in-flight handlers
//! re-read it at their delivery point and never get cancelled.

use crate::gate::{self, DownloadDecision, DownloadItem};
use crate::host::Host;
use crate::media;
use crate::message::{HostEvent, StatusSnapshot, TabChange, UiRequest};
use crate::preference::Preference;
use crate::tabs;
use async_trait::async_trait;
use snare_network::{
    CapturedRequest, PendingRequest, Phase1Outcome, RequestCorrelator, ResponseMeta, RuleStore,
};
use snare_peer::{
    Beat, ConnectionSync, Link, Peer, PeerError, PeerRequest, SyncPayload, VidRequest,
};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// The orchestrator.
pub struct Agent {
    host: Arc<dyn Host>,
    sync: ConnectionSync,
    correlator: RequestCorrelator,
    preference: Box<dyn Preference>,
}

impl Agent {
    pub fn new(
        host: Arc<dyn Host>,
        peer: Arc<dyn Peer>,
        preference: Box<dyn Preference>,
        pending_capacity: usize,
    ) -> Self {
        let user_disabled = preference.load();
        let link = Arc::new(Link::new(user_disabled));
        let rules = Arc::new(RuleStore::default());

        info!(
            "Agent initialized (pending capacity: {}, user disabled: {})",
            pending_capacity, user_disabled
        );

        Self {
            host,
            sync: ConnectionSync::new(peer, rules, link),
            correlator: RequestCorrelator::new(pending_capacity),
            preference,
        }
    }

    pub fn link(&self) -> &Arc<Link> {
        self.sync.link()
    }

    pub fn rules(&self) -> &Arc<RuleStore> {
        self.sync.rules()
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    /// enabled ∧ ¬user_disabled ∧ connected, right now.
    pub fn monitoring(&self) -> bool {
        self.link().monitoring()
    }

    /// Push the initial indicator and do a first heartbeat.
    pub async fn start(&self) {
        self.push_visible_state().await;
        self.heartbeat().await;
    }

    /// One `GET /sync`, then refresh the indicator.
    pub async fn heartbeat(&self) {
        self.sync.heartbeat().await;
        self.push_visible_state().await;
    }

    pub async fn handle_event(&self, event: HostEvent) {
        match event {
            HostEvent::RequestSent(request) => self.on_request_sent(request).await,
            HostEvent::ResponseReceived(response) => self.on_response_received(response).await,
            HostEvent::RequestError { id } => self.correlator.on_error(&id),
            HostEvent::DownloadCreated(item) => self.on_download_created(item).await,
            HostEvent::TabUpdated(change) => self.on_tab_updated(change).await,
            HostEvent::TabActivated { tab_id } => {
                trace!("Tab {} activated", tab_id);
                self.push_visible_state().await;
            }
        }
    }

    pub async fn handle_ui(&self, request: UiRequest) -> StatusSnapshot {
        match request {
            UiRequest::Status => {}
            UiRequest::Toggle { disabled } => self.toggle(disabled).await,
            UiRequest::Vid { id } => {
                let _ = self.exchange(PeerRequest::Vid(VidRequest { vid: id })).await;
            }
            UiRequest::Clear => {
                let _ = self.exchange(PeerRequest::Clear).await;
            }
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let link = self.link();
        StatusSnapshot {
            mode: link.visible_state(),
            monitoring: link.monitoring(),
            user_disabled: link.is_user_disabled(),
            videos: self.sync.videos(),
        }
    }

    async fn on_request_sent(&self, request: PendingRequest) {
        let rules = self.rules().snapshot();
        if let Phase1Outcome::Captured(captured) = self.correlator.on_phase1(request, &rules) {
            self.report(captured).await;
        }
    }

    async fn on_response_received(&self, response: ResponseMeta) {
        let rules = self.rules().snapshot();
        if let Some(captured) = self.correlator.on_phase2(response, &rules) {
            self.report(captured).await;
        }
    }

    /// Deliver a captured request, checking monitoring before the lookups
    /// and again after them.
    async fn report(&self, captured: CapturedRequest) {
        if !self.monitoring() {
            debug!("Monitoring off, dropping {}", captured.url);
            return;
        }

        let rule = captured.rule;
        let event = media::assemble(self.host.as_ref(), captured).await;

        if !self.monitoring() {
            debug!("Monitoring went off, dropping {}", event.url);
            return;
        }

        info!("Reporting media {} ({})", event.url, rule);
        let _ = self.exchange(PeerRequest::Media(event)).await;
    }

    async fn on_download_created(&self, item: DownloadItem) {
        let rules = self.rules().snapshot();
        match gate::decide(&item, self.monitoring(), &rules) {
            DownloadDecision::Ignore(reason) => {
                debug!("Download {} left to the browser: {}", item.id, reason);
            }
            DownloadDecision::Takeover => {
                let user_agent = self.host.user_agent();
                let request = gate::takeover(self.host.as_ref(), &item, &user_agent).await;
                let _ = self.exchange(PeerRequest::Download(request)).await;
            }
        }
    }

    async fn on_tab_updated(&self, change: TabChange) {
        let rules = self.rules().snapshot();
        if let Some(update) = tabs::watch(&rules, &change.url, change.title.as_deref()) {
            debug!("Watched tab {} retitled", change.tab_id);
            let _ = self.exchange(PeerRequest::TabUpdate(update)).await;
        }
    }

    async fn toggle(&self, disabled: bool) {
        if let Err(e) = self.preference.store(disabled) {
            warn!("Could not persist preference: {}", e);
        }
        self.link().set_user_disabled(disabled);
        info!("Monitoring {} by user", if disabled { "disabled" } else { "enabled" });
        self.push_visible_state().await;
    }

    /// Every peer round trip refreshes the indicator.
    async fn exchange(&self, request: PeerRequest) -> Result<SyncPayload, PeerError> {
        let result = self.sync.exchange(request).await;
        self.push_visible_state().await;
        result
    }

    async fn push_visible_state(&self) {
        let state = self.link().visible_state();
        if let Err(e) = self.host.set_visible_state(state).await {
            debug!("Could not set visible state {}: {}", state, e);
        }
    }
}

#[async_trait]
impl Beat for Agent {
    async fn beat(&self, _timer: usize) {
        self.heartbeat().await;
    }
}
