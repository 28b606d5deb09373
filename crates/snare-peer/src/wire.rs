//! Peer wire format
//!
//! JSON bodies exchanged with the daemon. Every endpoint answers with a
//! [`SyncPayload`]; fields it leaves out read as empty or false.

use hyper::Method;
use serde::{Deserialize, Serialize};
use snare_network::{Headers, RuleSource};

/// Configuration and state pushed by the peer on every round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncPayload {
    pub enabled: bool,
    /// Download extensions for native takeover
    pub file_exts: Vec<String>,
    pub blocked_hosts: Vec<String>,
    /// Always-capture hosts
    pub matching_hosts: Vec<String>,
    pub media_types: Vec<String>,
    pub url_patterns: Vec<String>,
    /// Media extensions for request classification
    pub request_file_exts: Vec<String>,
    pub tabs_watcher: Vec<String>,
    pub video_list: Vec<VideoItem>,
}

impl SyncPayload {
    /// Map wire field names onto rule lists.
    pub fn to_rule_source(&self) -> RuleSource {
        RuleSource {
            media_extensions: self.request_file_exts.clone(),
            download_extensions: self.file_exts.clone(),
            blocked_hosts: self.blocked_hosts.clone(),
            capture_hosts: self.matching_hosts.clone(),
            media_types: self.media_types.clone(),
            url_patterns: self.url_patterns.clone(),
            tab_watchers: self.tabs_watcher.clone(),
        }
    }
}

/// One entry of the peer's detected-video list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoItem {
    pub id: String,
    pub text: String,
    pub info: String,
}

/// `POST /media`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEvent {
    pub url: String,
    /// Display name, usually the tab title
    pub file: String,
    pub request_headers: Headers,
    pub response_headers: Headers,
    pub cookie: String,
    pub method: String,
    pub user_agent: String,
    pub tab_url: String,
    /// Browser tab id in decimal
    pub tab_id: String,
}

/// `POST /download`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub url: String,
    pub cookie: String,
    pub request_headers: Headers,
    pub response_headers: Headers,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// `POST /tab-update`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabUpdate {
    pub tab_url: String,
    pub tab_title: String,
}

/// `POST /vid`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VidRequest {
    pub vid: String,
}

/// A request to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRequest {
    /// Heartbeat
    Sync,
    Media(MediaEvent),
    Download(DownloadRequest),
    TabUpdate(TabUpdate),
    Vid(VidRequest),
    Clear,
}

impl PeerRequest {
    pub fn method(&self) -> Method {
        match self {
            Self::Sync => Method::GET,
            _ => Method::POST,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Sync => "/sync",
            Self::Media(_) => "/media",
            Self::Download(_) => "/download",
            Self::TabUpdate(_) => "/tab-update",
            Self::Vid(_) => "/vid",
            Self::Clear => "/clear",
        }
    }

    /// JSON body, `None` for GET.
    pub fn body(&self) -> Result<Option<Vec<u8>>, serde_json::Error> {
        let body = match self {
            Self::Sync => return Ok(None),
            Self::Media(event) => serde_json::to_vec(event)?,
            Self::Download(request) => serde_json::to_vec(request)?,
            Self::TabUpdate(update) => serde_json::to_vec(update)?,
            Self::Vid(vid) => serde_json::to_vec(vid)?,
            Self::Clear => b"{}".to_vec(),
        };
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sync_payload_defaults() {
        let payload: SyncPayload = serde_json::from_str(r#"{"enabled": true}"#).unwrap();
        assert!(payload.enabled);
        assert!(payload.file_exts.is_empty());
        assert!(payload.video_list.is_empty());

        let empty: SyncPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, SyncPayload::default());
    }

    #[test]
    fn test_sync_payload_field_mapping() {
        let payload: SyncPayload = serde_json::from_value(json!({
            "enabled": true,
            "fileExts": ["ZIP"],
            "blockedHosts": ["ads.example"],
            "matchingHosts": ["googlevideo"],
            "mediaTypes": ["video/"],
            "urlPatterns": ["videoplayback"],
            "requestFileExts": ["M3U8"],
            "tabsWatcher": ["youtube.com"],
            "videoList": [{"id": "v1", "text": "Clip", "info": "video/mp4", "tab_id": "x"}]
        }))
        .unwrap();

        let source = payload.to_rule_source();
        assert_eq!(source.media_extensions, vec!["M3U8"]);
        assert_eq!(source.download_extensions, vec!["ZIP"]);
        assert_eq!(source.capture_hosts, vec!["googlevideo"]);
        assert_eq!(source.tab_watchers, vec!["youtube.com"]);
        assert_eq!(payload.video_list[0].id, "v1");
    }

    #[test]
    fn test_download_request_optional_fields() {
        let request = DownloadRequest {
            url: "ftp://h/f.zip".into(),
            filename: "f.zip".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&request).unwrap();

        assert!(value.get("fileSize").is_none());
        assert!(value.get("mimeType").is_none());
        assert_eq!(value["requestHeaders"], json!({}));

        let sized = DownloadRequest {
            file_size: Some(42),
            mime_type: Some("application/zip".into()),
            ..request
        };
        let value = serde_json::to_value(&sized).unwrap();
        assert_eq!(value["fileSize"], 42);
        assert_eq!(value["mimeType"], "application/zip");
    }

    #[test]
    fn test_media_event_wire_names() {
        let event = MediaEvent {
            url: "https://h/a.m3u8".into(),
            tab_id: "12".into(),
            tab_url: "https://h/watch".into(),
            user_agent: "UA".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["tabId"], "12");
        assert_eq!(value["tabUrl"], "https://h/watch");
        assert_eq!(value["userAgent"], "UA");
        assert_eq!(value["file"], "");
    }

    #[test]
    fn test_request_routes() {
        assert_eq!(PeerRequest::Sync.method(), Method::GET);
        assert_eq!(PeerRequest::Sync.body().unwrap(), None);
        assert_eq!(PeerRequest::Clear.path(), "/clear");
        assert_eq!(PeerRequest::Clear.body().unwrap(), Some(b"{}".to_vec()));

        let vid = PeerRequest::Vid(VidRequest { vid: "abc".into() });
        assert_eq!(vid.method(), Method::POST);
        assert_eq!(vid.body().unwrap(), Some(br#"{"vid":"abc"}"#.to_vec()));
    }
}
