//! Message types between the browser host and the agent.

use crate::gate::DownloadItem;
use serde::{Deserialize, Serialize};
use snare_network::{PendingRequest, ResponseMeta};
use snare_peer::{VideoItem, VisibleState};

/// Events raised by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    /// Request sent (phase 1)
    RequestSent(PendingRequest),
    /// Response headers received (phase 2)
    ResponseReceived(ResponseMeta),
    /// Transaction failed
    RequestError { id: String },
    /// Native download created
    DownloadCreated(DownloadItem),
    /// Tab updated; `title` is set only when it changed
    TabUpdated(TabChange),
    /// Tab brought to front
    TabActivated {
        #[serde(rename = "tabId")]
        tab_id: i64,
    },
}

/// Tab update details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabChange {
    pub tab_id: i64,
    pub title: Option<String>,
    pub url: String,
}

/// Messages from the popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiRequest {
    /// Report current state
    Status,
    /// Switch monitoring off (`disabled = true`) or back on
    Toggle { disabled: bool },
    /// Ask the peer to download a listed video
    Vid { id: String },
    /// Clear the peer's video list
    Clear,
}

/// Everything the popup renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub mode: VisibleState,
    pub monitoring: bool,
    pub user_disabled: bool,
    pub videos: Vec<VideoItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_event_shapes() {
        let event: HostEvent = serde_json::from_str(
            r#"{"event":"requestSent","id":"7","url":"https://h/a.mp4","method":"GET","tabId":2}"#,
        )
        .unwrap();
        assert!(matches!(event, HostEvent::RequestSent(ref r) if r.tab_id == 2));

        let event: HostEvent =
            serde_json::from_str(r#"{"event":"downloadCreated","id":3,"url":"ftp://h/f.zip"}"#)
                .unwrap();
        assert!(matches!(event, HostEvent::DownloadCreated(ref d) if d.id == 3));

        let event: HostEvent =
            serde_json::from_str(r#"{"event":"tabActivated","tabId":9}"#).unwrap();
        assert_eq!(event, HostEvent::TabActivated { tab_id: 9 });

        let event: HostEvent =
            serde_json::from_str(r#"{"event":"tabUpdated","tabId":1,"url":"https://h/"}"#)
                .unwrap();
        assert!(matches!(event, HostEvent::TabUpdated(ref t) if t.title.is_none()));
    }

    #[test]
    fn test_ui_request_shapes() {
        let toggle: UiRequest =
            serde_json::from_str(r#"{"type":"toggle","disabled":true}"#).unwrap();
        assert_eq!(toggle, UiRequest::Toggle { disabled: true });

        let status: UiRequest = serde_json::from_str(r#"{"type":"status"}"#).unwrap();
        assert_eq!(status, UiRequest::Status);
    }

    #[test]
    fn test_snapshot_shape() {
        let snapshot = StatusSnapshot {
            mode: VisibleState::Active,
            monitoring: true,
            user_disabled: false,
            videos: Vec::new(),
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["mode"], "active");
        assert_eq!(value["userDisabled"], false);
    }
}
