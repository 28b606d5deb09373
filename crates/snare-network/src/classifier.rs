//! Request Classifier
//!
//! Decides whether an observed request is media the peer wants to hear
//! about. Rules are evaluated in a fixed order and the first decisive one
//! wins:
//!
//! 0. blocked host substring → veto (beats everything below)
//! 1. path ends with a media extension
//! 2. URL matches a pattern
//! 3. content-type starts with a media type (needs headers)
//! 4. content-disposition names a media extension (needs headers)
//! 5. always-capture host substring
//!
//! The fast path runs before response headers exist and skips 3 and 4.

use crate::headers::Headers;
use crate::rules::RuleSet;
use serde::{Deserialize, Serialize};
use tracing::trace;
use url::Url;

/// Which rule produced a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchRule {
    /// Path suffix matched a media extension
    Extension,
    /// URL matched a configured pattern
    UrlPattern,
    /// Content-Type matched a media type prefix
    ContentType,
    /// Content-Disposition mentioned a media extension
    ContentDisposition,
    /// Hostname matched an always-capture host
    CaptureHost,
}

impl std::fmt::Display for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extension => write!(f, "extension"),
            Self::UrlPattern => write!(f, "url pattern"),
            Self::ContentType => write!(f, "content-type"),
            Self::ContentDisposition => write!(f, "content-disposition"),
            Self::CaptureHost => write!(f, "capture host"),
        }
    }
}

/// Outcome of classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Blocked host; never reported
    Vetoed,
    /// Report to the peer
    Capture(MatchRule),
    /// No rule applies (yet)
    Pass,
}

impl Verdict {
    pub fn is_capture(&self) -> bool {
        matches!(self, Verdict::Capture(_))
    }

    /// True when the request needs no further evaluation.
    pub fn is_decisive(&self) -> bool {
        !matches!(self, Verdict::Pass)
    }
}

/// Full classification with response headers.
pub fn classify(url: &str, response_headers: &Headers, rules: &RuleSet) -> Verdict {
    evaluate(url, Some(response_headers), rules)
}

/// Fast-path classification from the URL alone.
pub fn classify_url(url: &str, rules: &RuleSet) -> Verdict {
    evaluate(url, None, rules)
}

fn evaluate(url: &str, response_headers: Option<&Headers>, rules: &RuleSet) -> Verdict {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            trace!("Unparsable URL '{}': {}", url, e);
            return Verdict::Pass;
        }
    };
    let host = parsed.host_str().unwrap_or("");

    if rules.blocked_hosts.matches(host) {
        return Verdict::Vetoed;
    }

    if rules.media_extensions.matches_path(parsed.path()) {
        return Verdict::Capture(MatchRule::Extension);
    }

    if rules.url_patterns.is_match(url) {
        return Verdict::Capture(MatchRule::UrlPattern);
    }

    if let Some(headers) = response_headers {
        if headers
            .get_all("content-type")
            .any(|ct| rules.matches_media_type(ct))
        {
            return Verdict::Capture(MatchRule::ContentType);
        }

        if headers
            .get_all("content-disposition")
            .any(|cd| rules.media_extensions.mentioned_in(cd))
        {
            return Verdict::Capture(MatchRule::ContentDisposition);
        }
    }

    if rules.capture_hosts.matches(host) {
        return Verdict::Capture(MatchRule::CaptureHost);
    }

    Verdict::Pass
}
