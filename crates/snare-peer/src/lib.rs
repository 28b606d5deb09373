//! snare Peer Link
//!
//! Everything that talks to the download-manager daemon on loopback:
//! - Wire types for `/sync`, `/media`, `/download`, `/tab-update`, `/vid`, `/clear`
//! - HTTP/1.1 client with a hard per-request timeout
//! - Connectivity flags and the derived visible state
//! - ConnectionSync: every round trip refreshes connectivity and rules
//! - Redundant heartbeat timers that survive missed ticks

mod client;
mod link;
mod schedule;
mod sync;
mod wire;

pub use client::{HttpPeer, Peer, PeerConfig, PeerError, PeerStats};
pub use link::{Link, VisibleState};
pub use schedule::{Beat, Heartbeat, HeartbeatPlan};
pub use sync::ConnectionSync;
pub use wire::{
    DownloadRequest, MediaEvent, PeerRequest, SyncPayload, TabUpdate, VidRequest, VideoItem,
};
