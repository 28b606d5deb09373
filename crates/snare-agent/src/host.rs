//! Browser host seam.
//!
//! Every call the agent makes into the browser. All of them can fail or
//! time out; callers always have a fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snare_peer::VisibleState;
use thiserror::Error;

/// Host call errors
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Host call failed: {0}")]
    Failed(String),

    #[error("Host call timed out")]
    Timeout,

    #[error("Host channel closed")]
    Closed,
}

/// One browser cookie
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Tab metadata. Empty when the tab is gone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabInfo {
    pub title: String,
    pub url: String,
}

/// Calls into the browser.
#[async_trait]
pub trait Host: Send + Sync {
    async fn cancel_download(&self, id: i64) -> Result<(), HostError>;

    async fn erase_download(&self, id: i64) -> Result<(), HostError>;

    async fn get_cookies(&self, url: &str) -> Result<Vec<Cookie>, HostError>;

    /// Fails if the tab has been closed.
    async fn get_tab(&self, tab_id: i64) -> Result<TabInfo, HostError>;

    async fn set_visible_state(&self, state: VisibleState) -> Result<(), HostError>;

    fn user_agent(&self) -> String;
}

/// `name=value; name=value`
pub fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}
