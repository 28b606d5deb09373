//! Capture Rules
//!
//! The matching configuration pushed by the peer on every sync:
//! - Media extensions: `M3U8`, `MP4`, ... (path suffix, content-disposition)
//! - Download extensions: `ZIP`, `ISO`, ... (native download takeover)
//! - Blocked hosts: hostname substrings that veto everything
//! - Capture hosts: hostname substrings reported unconditionally
//! - Media types: content-type prefixes such as `video/`
//! - URL patterns: case-insensitive regular expressions
//! - Tab watchers: tab URL substrings whose title changes are reported
//!
//! A [`RuleSet`] is immutable once compiled. [`RuleStore`] swaps whole
//! snapshots so readers never observe a mix of two syncs.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors while compiling rules
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Malformed URL pattern '{pattern}': {source}")]
    MalformedPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Host matcher could not be built: {0}")]
    HostMatcher(String),
}

/// Raw rule lists as received from the peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSource {
    pub media_extensions: Vec<String>,
    pub download_extensions: Vec<String>,
    pub blocked_hosts: Vec<String>,
    pub capture_hosts: Vec<String>,
    pub media_types: Vec<String>,
    pub url_patterns: Vec<String>,
    pub tab_watchers: Vec<String>,
}

/// Uppercased file extensions without their leading dot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet(BTreeSet<String>);

impl ExtensionSet {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_uppercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        )
    }

    /// Does `path` end with `.EXT` for any configured extension?
    pub fn matches_path(&self, path: &str) -> bool {
        if self.0.is_empty() {
            return false;
        }
        let upper = path.to_uppercase();
        self.0.iter().any(|ext| {
            upper
                .strip_suffix(ext.as_str())
                .is_some_and(|rest| rest.ends_with('.'))
        })
    }

    /// Does `text` mention `.EXT` anywhere (content-disposition check)?
    pub fn mentioned_in(&self, text: &str) -> bool {
        if self.0.is_empty() {
            return false;
        }
        let upper = text.to_uppercase();
        self.0.iter().any(|ext| upper.contains(&format!(".{}", ext)))
    }

    pub fn contains(&self, ext: &str) -> bool {
        self.0.contains(&ext.trim_start_matches('.').to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Case-insensitive hostname substring matcher.
///
/// Built once per sync; checks are a single automaton pass over the host.
#[derive(Debug, Clone, Default)]
pub struct HostMatcher {
    patterns: Vec<String>,
    automaton: Option<AhoCorasick>,
}

impl HostMatcher {
    pub fn new<I, S>(hosts: I) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<String> = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        patterns.sort();
        patterns.dedup();

        if patterns.is_empty() {
            return Ok(Self::default());
        }

        let automaton = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostFirst)
            .build(&patterns)
            .map_err(|e| RuleError::HostMatcher(e.to_string()))?;

        Ok(Self {
            patterns,
            automaton: Some(automaton),
        })
    }

    #[inline]
    pub fn matches(&self, host: &str) -> bool {
        match &self.automaton {
            Some(automaton) => automaton.is_match(host),
            None => false,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl PartialEq for HostMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

impl Eq for HostMatcher {}

/// Compiled URL patterns. Malformed sources are dropped at compile time.
#[derive(Debug, Clone, Default)]
pub struct UrlPatterns {
    sources: Vec<String>,
    compiled: Vec<Regex>,
}

impl UrlPatterns {
    /// Compile every pattern, logging and skipping the ones that fail.
    pub fn compile<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.trim().is_empty() || set.sources.iter().any(|s| s == pattern) {
                continue;
            }
            match compile_pattern(pattern) {
                Ok(regex) => {
                    set.sources.push(pattern.to_string());
                    set.compiled.push(regex);
                }
                Err(e) => warn!("Dropping rule: {}", e),
            }
        }
        set
    }

    pub fn is_match(&self, url: &str) -> bool {
        self.compiled.iter().any(|re| re.is_match(url))
    }

    /// Pattern sources that compiled successfully.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

impl PartialEq for UrlPatterns {
    fn eq(&self, other: &Self) -> bool {
        self.sources == other.sources
    }
}

impl Eq for UrlPatterns {}

/// Compile a single case-insensitive URL pattern.
pub fn compile_pattern(pattern: &str) -> Result<Regex, RuleError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| RuleError::MalformedPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// One immutable snapshot of the capture configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub media_extensions: ExtensionSet,
    pub download_extensions: ExtensionSet,
    pub blocked_hosts: HostMatcher,
    pub capture_hosts: HostMatcher,
    /// Lowercased content-type prefixes
    pub media_types: BTreeSet<String>,
    pub url_patterns: UrlPatterns,
    pub tab_watchers: Vec<String>,
}

impl RuleSet {
    /// An empty rule set: nothing matches, nothing is vetoed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile raw lists. Never fails: broken entries are logged and dropped.
    pub fn compile(source: &RuleSource) -> Self {
        let blocked_hosts = HostMatcher::new(&source.blocked_hosts).unwrap_or_else(|e| {
            warn!("Blocked hosts ignored: {}", e);
            HostMatcher::default()
        });
        let capture_hosts = HostMatcher::new(&source.capture_hosts).unwrap_or_else(|e| {
            warn!("Capture hosts ignored: {}", e);
            HostMatcher::default()
        });

        let rules = Self {
            media_extensions: ExtensionSet::new(&source.media_extensions),
            download_extensions: ExtensionSet::new(&source.download_extensions),
            blocked_hosts,
            capture_hosts,
            media_types: source
                .media_types
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            url_patterns: UrlPatterns::compile(&source.url_patterns),
            tab_watchers: source
                .tab_watchers
                .iter()
                .filter(|w| !w.is_empty())
                .cloned()
                .collect(),
        };

        debug!(
            "Compiled rules: {} media exts, {} download exts, {} blocked, {} capture, {} types, {} patterns",
            rules.media_extensions.len(),
            rules.download_extensions.len(),
            rules.blocked_hosts.patterns().len(),
            rules.capture_hosts.patterns().len(),
            rules.media_types.len(),
            rules.url_patterns.len(),
        );

        rules
    }

    /// Does a content-type value start with a configured media type?
    pub fn matches_media_type(&self, content_type: &str) -> bool {
        if self.media_types.is_empty() {
            return false;
        }
        let lower = content_type.trim_start().to_lowercase();
        self.media_types.iter().any(|prefix| lower.starts_with(prefix.as_str()))
    }

    /// Is `tab_url` covered by a tab watcher substring?
    pub fn watches_tab(&self, tab_url: &str) -> bool {
        self.tab_watchers.iter().any(|w| tab_url.contains(w.as_str()))
    }
}

/// Holder of the current [`RuleSet`] snapshot.
///
/// Readers clone the `Arc` and keep a consistent view even if a sync
/// replaces the store while they are suspended.
#[derive(Debug, Default)]
pub struct RuleStore {
    current: RwLock<Arc<RuleSet>>,
}

impl RuleStore {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(rules)),
        }
    }

    /// The snapshot in force right now.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new snapshot wholesale. Returns whether its content changed.
    pub fn replace(&self, rules: RuleSet) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let changed = **current != rules;
        *current = Arc::new(rules);
        if changed {
            info!("Capture rules updated");
        }
        changed
    }
}
