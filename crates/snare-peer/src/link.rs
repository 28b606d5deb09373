//! Link State
//!
//! Connectivity flags shared between the heartbeat, the event handlers and
//! the UI:
//!
//! - `connected`: the last peer round trip succeeded
//! - `enabled`: the peer's own on/off flag from that round trip
//! - `user_disabled`: the local preference
//!
//! Monitoring is derived from all three on every call and never cached.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// What the toolbar indicator shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisibleState {
    /// No successful round trip since the last failure
    Disconnected,
    /// Peer reachable but monitoring is off
    ConnectedDisabled,
    /// Monitoring
    Active,
}

impl VisibleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::ConnectedDisabled => "connectedDisabled",
            Self::Active => "active",
        }
    }
}

impl std::fmt::Display for VisibleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connectivity controller
#[derive(Debug, Default)]
pub struct Link {
    connected: AtomicBool,
    enabled: AtomicBool,
    user_disabled: AtomicBool,
}

impl Link {
    /// Start disconnected, with the persisted preference.
    pub fn new(user_disabled: bool) -> Self {
        Self {
            connected: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            user_disabled: AtomicBool::new(user_disabled),
        }
    }

    /// A round trip succeeded.
    pub fn on_success(&self, enabled: bool) {
        let was_connected = self.connected.swap(true, Ordering::SeqCst);
        self.enabled.store(enabled, Ordering::SeqCst);
        if !was_connected {
            info!("Peer link up (enabled: {})", enabled);
        }
    }

    /// A round trip failed. `enabled` keeps its last value.
    pub fn on_failure(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!("Peer link down");
        }
    }

    pub fn set_user_disabled(&self, disabled: bool) {
        debug!("User disabled: {}", disabled);
        self.user_disabled.store(disabled, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_user_disabled(&self) -> bool {
        self.user_disabled.load(Ordering::SeqCst)
    }

    /// enabled ∧ ¬user_disabled ∧ connected
    pub fn monitoring(&self) -> bool {
        self.is_enabled() && !self.is_user_disabled() && self.is_connected()
    }

    pub fn visible_state(&self) -> VisibleState {
        if !self.is_connected() {
            VisibleState::Disconnected
        } else if self.is_enabled() && !self.is_user_disabled() {
            VisibleState::Active
        } else {
            VisibleState::ConnectedDisabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disconnected() {
        let link = Link::new(false);
        assert!(!link.monitoring());
        assert_eq!(link.visible_state(), VisibleState::Disconnected);
    }

    #[test]
    fn test_monitoring_needs_all_three() {
        let link = Link::new(false);

        link.on_success(true);
        assert!(link.monitoring());
        assert_eq!(link.visible_state(), VisibleState::Active);

        link.set_user_disabled(true);
        assert!(!link.monitoring());
        assert_eq!(link.visible_state(), VisibleState::ConnectedDisabled);

        link.set_user_disabled(false);
        link.on_success(false);
        assert!(!link.monitoring());
        assert_eq!(link.visible_state(), VisibleState::ConnectedDisabled);
    }

    #[test]
    fn test_failure_keeps_enabled_flag() {
        let link = Link::new(false);
        link.on_success(true);
        link.on_failure();

        assert!(link.is_enabled());
        assert!(!link.monitoring());
        assert_eq!(link.visible_state(), VisibleState::Disconnected);

        link.on_success(true);
        assert!(link.monitoring());
    }

    #[test]
    fn test_visible_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&VisibleState::ConnectedDisabled).unwrap(),
            r#""connectedDisabled""#
        );
        assert_eq!(VisibleState::Active.to_string(), "active");
    }
}
