//! Download Gate
//!
//! Decides whether a native download should be taken over by the peer, and
//! if so cancels it, erases its record and builds the reissue request.
//!
//! Ignore reasons are checked in this order:
//! 1. monitoring disabled
//! 2. scheme of the resolved URL not http, https or ftp
//! 3. blocked host
//! 4. neither filename nor URL path ends with a download extension

use crate::host::{cookie_header, Host};
use serde::{Deserialize, Serialize};
use snare_network::{Headers, RuleSet};
use snare_peer::DownloadRequest;
use tracing::{debug, info, warn};
use url::Url;

const TAKEOVER_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// A download the browser just created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadItem {
    pub id: i64,
    /// Pre-redirect URL
    pub url: String,
    /// Post-redirect URL, empty when unknown
    pub final_url: String,
    pub filename: String,
    pub referrer: String,
    /// Bytes; zero or negative when unknown
    pub file_size: i64,
    pub mime: String,
}

impl DownloadItem {
    /// `final_url` when known, else `url`.
    pub fn resolved_url(&self) -> &str {
        if self.final_url.is_empty() {
            &self.url
        } else {
            &self.final_url
        }
    }

    /// Explicit referrer, else the pre-redirect URL when a redirect happened.
    pub fn referer(&self) -> Option<&str> {
        if !self.referrer.is_empty() {
            Some(&self.referrer)
        } else if !self.final_url.is_empty() && !self.url.is_empty() && self.final_url != self.url
        {
            Some(&self.url)
        } else {
            None
        }
    }

    /// Last path component of `filename`.
    pub fn file_name(&self) -> &str {
        self.filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.filename)
    }
}

/// Why a download was left alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    MonitoringDisabled,
    InvalidUrl,
    UnsupportedScheme(String),
    BlockedHost(String),
    NoExtensionMatch,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MonitoringDisabled => write!(f, "monitoring disabled"),
            Self::InvalidUrl => write!(f, "invalid URL"),
            Self::UnsupportedScheme(scheme) => write!(f, "unsupported scheme '{}'", scheme),
            Self::BlockedHost(host) => write!(f, "blocked host '{}'", host),
            Self::NoExtensionMatch => write!(f, "no download extension match"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadDecision {
    Takeover,
    Ignore(IgnoreReason),
}

/// Pure decision against the current rules.
pub fn decide(item: &DownloadItem, monitoring: bool, rules: &RuleSet) -> DownloadDecision {
    if !monitoring {
        return DownloadDecision::Ignore(IgnoreReason::MonitoringDisabled);
    }

    let parsed = match Url::parse(item.resolved_url()) {
        Ok(parsed) => parsed,
        Err(_) => return DownloadDecision::Ignore(IgnoreReason::InvalidUrl),
    };

    if !TAKEOVER_SCHEMES.contains(&parsed.scheme()) {
        return DownloadDecision::Ignore(IgnoreReason::UnsupportedScheme(
            parsed.scheme().to_string(),
        ));
    }

    let host = parsed.host_str().unwrap_or("");
    if rules.blocked_hosts.matches(host) {
        return DownloadDecision::Ignore(IgnoreReason::BlockedHost(host.to_string()));
    }

    let extensions = &rules.download_extensions;
    if !extensions.matches_path(&item.filename) && !extensions.matches_path(parsed.path()) {
        return DownloadDecision::Ignore(IgnoreReason::NoExtensionMatch);
    }

    DownloadDecision::Takeover
}

/// Cancel, then erase, then build the reissue request.
///
/// Host failures are logged and never stop the takeover.
pub async fn takeover(host: &dyn Host, item: &DownloadItem, user_agent: &str) -> DownloadRequest {
    if let Err(e) = host.cancel_download(item.id).await {
        warn!("Cancel of download {} failed: {}", item.id, e);
    }
    if let Err(e) = host.erase_download(item.id).await {
        warn!("Erase of download {} failed: {}", item.id, e);
    }

    let url = item.resolved_url().to_string();
    let cookie = match host.get_cookies(&url).await {
        Ok(cookies) => cookie_header(&cookies),
        Err(e) => {
            debug!("No cookies for {}: {}", url, e);
            String::new()
        }
    };

    let mut request_headers = Headers::new();
    if let Some(referer) = item.referer() {
        request_headers.set("Referer", referer);
    }
    if !user_agent.is_empty() {
        request_headers.set("User-Agent", user_agent);
    }

    info!("Taking over download {} ({})", item.id, url);

    DownloadRequest {
        url,
        cookie,
        request_headers,
        response_headers: Headers::new(),
        filename: item.file_name().to_string(),
        file_size: u64::try_from(item.file_size).ok().filter(|size| *size > 0),
        mime_type: Some(item.mime.clone()).filter(|mime| !mime.is_empty()),
    }
}
