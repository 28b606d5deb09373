//! snare Network Layer
//!
//! Classifies observed browser traffic against the rules supplied by the
//! download-manager peer.
//!
//! Architecture:
//! 1. Request sent → correlator stores it, fast-path check on the URL alone
//! 2. If decided (veto or capture) → entry dropped, no waiting for headers
//! 3. Response headers → correlator resolves the entry, full classifier runs
//! 4. Errors drop the entry; nothing is ever emitted for a failed transaction

mod classifier;
mod correlator;
mod headers;
mod rules;

pub use classifier::{classify, classify_url, MatchRule, Verdict};
pub use correlator::{
    CapturedRequest, CorrelatorStats, PendingRequest, Phase1Outcome, RequestCorrelator,
    RequestId, ResponseMeta,
};
pub use headers::Headers;
pub use rules::{ExtensionSet, HostMatcher, RuleError, RuleSet, RuleSource, RuleStore, UrlPatterns};
