//! Test doubles for the host and the peer.

use crate::host::{Cookie, Host, HostError, TabInfo};
use async_trait::async_trait;
use snare_peer::{Link, Peer, PeerError, PeerRequest, SyncPayload, VisibleState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Records every call; answers from canned values.
#[derive(Default)]
pub(crate) struct FakeHost {
    calls: Mutex<Vec<String>>,
    states: Mutex<Vec<VisibleState>>,
    cookies: Mutex<Vec<Cookie>>,
    tab: Mutex<TabInfo>,
    failing: AtomicBool,
    /// Dropped to disconnected during the tab lookup
    drop_link_on_lookup: Mutex<Option<Arc<Link>>>,
}

impl FakeHost {
    pub(crate) const USER_AGENT: &'static str = "FakeBrowser/1.0";

    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_cookies(&self, cookies: &[(&str, &str)]) {
        *self.cookies.lock().unwrap() = cookies
            .iter()
            .map(|(name, value)| Cookie {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();
    }

    pub(crate) fn set_tab(&self, title: &str, url: &str) {
        *self.tab.lock().unwrap() = TabInfo {
            title: title.to_string(),
            url: url.to_string(),
        };
    }

    pub(crate) fn drop_link_on_lookup(&self, link: Arc<Link>) {
        *self.drop_link_on_lookup.lock().unwrap() = Some(link);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn states(&self) -> Vec<VisibleState> {
        self.states.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), HostError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            Err(HostError::Failed("scripted failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Host for FakeHost {
    async fn cancel_download(&self, id: i64) -> Result<(), HostError> {
        self.record(format!("cancel:{}", id))
    }

    async fn erase_download(&self, id: i64) -> Result<(), HostError> {
        self.record(format!("erase:{}", id))
    }

    async fn get_cookies(&self, url: &str) -> Result<Vec<Cookie>, HostError> {
        self.record(format!("cookies:{}", url))?;
        Ok(self.cookies.lock().unwrap().clone())
    }

    async fn get_tab(&self, tab_id: i64) -> Result<TabInfo, HostError> {
        if let Some(link) = self.drop_link_on_lookup.lock().unwrap().as_ref() {
            link.on_failure();
        }
        self.record(format!("tab:{}", tab_id))?;
        Ok(self.tab.lock().unwrap().clone())
    }

    async fn set_visible_state(&self, state: VisibleState) -> Result<(), HostError> {
        self.states.lock().unwrap().push(state);
        Ok(())
    }

    fn user_agent(&self) -> String {
        Self::USER_AGENT.to_string()
    }
}

/// Answers every request with the same payload, or fails when unset.
#[derive(Default)]
pub(crate) struct RecordingPeer {
    answer: Mutex<Option<SyncPayload>>,
    seen: Mutex<Vec<PeerRequest>>,
}

impl RecordingPeer {
    pub(crate) fn answering(payload: SyncPayload) -> Arc<Self> {
        let peer = Self::default();
        *peer.answer.lock().unwrap() = Some(payload);
        Arc::new(peer)
    }

    pub(crate) fn go_down(&self) {
        *self.answer.lock().unwrap() = None;
    }

    pub(crate) fn seen(&self) -> Vec<PeerRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub(crate) fn paths(&self) -> Vec<&'static str> {
        self.seen().iter().map(PeerRequest::path).collect()
    }
}

#[async_trait]
impl Peer for RecordingPeer {
    async fn exchange(&self, request: PeerRequest) -> Result<SyncPayload, PeerError> {
        self.seen.lock().unwrap().push(request);
        self.answer
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PeerError::ConnectionFailed("peer down".into()))
    }
}
