//! snare Agent
//!
//! The orchestrator between the browser host and the download-manager peer.
//!
//! Architecture:
//! 1. Host events arrive (network lifecycle, downloads, tabs, UI)
//! 2. Network events → correlator/classifier → media report to the peer
//! 3. Download-created → DownloadGate → cancel, erase, reissue to the peer
//! 4. Heartbeats and every peer write refresh connectivity and rules
//! 5. Visible state is pushed back to the host after each change

mod agent;
mod config;
mod gate;
mod host;
mod media;
mod message;
mod preference;
mod tabs;

#[cfg(test)]
mod testing;

pub use agent::Agent;
pub use config::{
    AgentConfig, CaptureSection, ConfigError, HostSection, LogSection, PeerSection, SyncSection,
};
pub use gate::{decide, takeover, DownloadDecision, DownloadItem, IgnoreReason};
pub use host::{cookie_header, Cookie, Host, HostError, TabInfo};
pub use media::assemble;
pub use message::{HostEvent, StatusSnapshot, TabChange, UiRequest};
pub use preference::{FilePreference, MemoryPreference, Preference, PreferenceError};
pub use tabs::watch;
