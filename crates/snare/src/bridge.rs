//! Browser bridge
//!
//! Implements [`Host`] over the native-messaging channel and dispatches
//! inbound frames to the agent.
//!
//! Inbound frames (`type`):
//! - `hello { userAgent }`
//! - `event { payload: HostEvent }`, handled on its own task
//! - `ui { seq, payload: UiRequest }`, answered with `uiReply { seq, payload }`
//! - `reply { seq, result?, error? }` for an outstanding host call
//!
//! Outbound host calls are `call { seq, method, params }`; the indicator
//! update is a fire-and-forget `notify { method, params }`.

use crate::native::{read_frame, BridgeError, MAX_FRAME_BYTES};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use snare_agent::{Agent, Cookie, Host, HostError, HostEvent, StatusSnapshot, TabInfo, UiRequest};
use snare_peer::VisibleState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Inbound {
    Hello {
        #[serde(rename = "userAgent", default)]
        user_agent: String,
    },
    Event {
        payload: HostEvent,
    },
    Ui {
        seq: u64,
        payload: UiRequest,
    },
    Reply {
        seq: u64,
        #[serde(default)]
        result: Value,
        #[serde(default)]
        error: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Outbound<'a> {
    Call {
        seq: u64,
        method: &'a str,
        params: Value,
    },
    Notify {
        method: &'a str,
        params: Value,
    },
    UiReply {
        seq: u64,
        payload: &'a StatusSnapshot,
    },
}

type PendingReply = oneshot::Sender<Result<Value, String>>;

/// The browser, seen from the agent.
pub struct NativeHost {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    pending: Mutex<HashMap<u64, PendingReply>>,
    next_seq: AtomicU64,
    timeout: Duration,
    user_agent: RwLock<String>,
}

impl NativeHost {
    pub fn new(outbound: mpsc::UnboundedSender<Vec<u8>>, timeout: Duration) -> Self {
        Self {
            outbound,
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            timeout,
            user_agent: RwLock::new(String::new()),
        }
    }

    fn send(&self, frame: &Outbound<'_>) -> Result<(), BridgeError> {
        let bytes = serde_json::to_vec(frame)?;
        if bytes.len() > MAX_FRAME_BYTES {
            return Err(BridgeError::FrameTooLarge {
                len: bytes.len(),
                max: MAX_FRAME_BYTES,
            });
        }
        self.outbound.send(bytes).map_err(|_| BridgeError::Closed)
    }

    /// Send a call and wait for its reply, at most `timeout`.
    async fn call(&self, method: &str, params: Value) -> Result<Value, HostError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending_map().insert(seq, tx);

        if let Err(e) = self.send(&Outbound::Call { seq, method, params }) {
            self.pending_map().remove(&seq);
            debug!("Host call {} not sent: {}", method, e);
            return Err(HostError::Closed);
        }
        trace!("Host call {} #{}", method, seq);

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(HostError::Failed(message)),
            Ok(Err(_)) => Err(HostError::Closed),
            Err(_) => {
                self.pending_map().remove(&seq);
                Err(HostError::Timeout)
            }
        }
    }

    fn pending_map(&self) -> std::sync::MutexGuard<'_, HashMap<u64, PendingReply>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Complete an outstanding call. Late replies are dropped.
    pub fn resolve(&self, seq: u64, result: Result<Value, String>) {
        match self.pending_map().remove(&seq) {
            Some(waiter) => {
                let _ = waiter.send(result);
            }
            None => debug!("Reply #{} has no waiter", seq),
        }
    }

    pub fn set_user_agent(&self, user_agent: String) {
        *self.user_agent.write().unwrap_or_else(PoisonError::into_inner) = user_agent;
    }

    pub fn reply_ui(&self, seq: u64, snapshot: &StatusSnapshot) -> Result<(), BridgeError> {
        self.send(&Outbound::UiReply {
            seq,
            payload: snapshot,
        })
    }

    /// Fail every outstanding call.
    pub fn close(&self) {
        let abandoned = self.outstanding();
        if abandoned > 0 {
            debug!("Abandoning {} host calls", abandoned);
        }
        self.pending_map().clear();
    }

    pub fn outstanding(&self) -> usize {
        self.pending_map().len()
    }
}

#[async_trait]
impl Host for NativeHost {
    async fn cancel_download(&self, id: i64) -> Result<(), HostError> {
        self.call("cancelDownload", json!({ "id": id })).await.map(|_| ())
    }

    async fn erase_download(&self, id: i64) -> Result<(), HostError> {
        self.call("eraseDownload", json!({ "id": id })).await.map(|_| ())
    }

    async fn get_cookies(&self, url: &str) -> Result<Vec<Cookie>, HostError> {
        let value = self.call("getCookies", json!({ "url": url })).await?;
        serde_json::from_value(value).map_err(|e| HostError::Failed(e.to_string()))
    }

    async fn get_tab(&self, tab_id: i64) -> Result<TabInfo, HostError> {
        let value = self.call("getTab", json!({ "tabId": tab_id })).await?;
        serde_json::from_value(value).map_err(|e| HostError::Failed(e.to_string()))
    }

    async fn set_visible_state(&self, state: VisibleState) -> Result<(), HostError> {
        self.send(&Outbound::Notify {
            method: "setVisibleState",
            params: json!({ "mode": state }),
        })
        .map_err(|e| HostError::Failed(e.to_string()))
    }

    fn user_agent(&self) -> String {
        self.user_agent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Read frames until the browser closes the channel.
pub async fn serve<R: AsyncRead + Unpin>(
    mut reader: R,
    host: Arc<NativeHost>,
    agent: Arc<Agent>,
) -> Result<(), BridgeError> {
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Browser closed the channel");
                break;
            }
            Err(e @ BridgeError::FrameTooLarge { .. }) => {
                warn!("Dropped inbound frame: {}", e);
                continue;
            }
            Err(e) => {
                host.close();
                return Err(e);
            }
        };

        let inbound: Inbound = match serde_json::from_slice(&frame) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("Malformed frame: {}", e);
                continue;
            }
        };

        match inbound {
            Inbound::Hello { user_agent } => {
                debug!("Browser hello ({})", user_agent);
                host.set_user_agent(user_agent);
            }
            Inbound::Reply { seq, result, error } => {
                host.resolve(seq, error.map_or(Ok(result), Err));
            }
            Inbound::Event { payload } => {
                let agent = Arc::clone(&agent);
                tokio::spawn(async move {
                    agent.handle_event(payload).await;
                });
            }
            Inbound::Ui { seq, payload } => {
                let agent = Arc::clone(&agent);
                let host = Arc::clone(&host);
                tokio::spawn(async move {
                    let snapshot = agent.handle_ui(payload).await;
                    if let Err(e) = host.reply_ui(seq, &snapshot) {
                        debug!("UI reply #{} not sent: {}", seq, e);
                    }
                });
            }
        }
    }

    host.close();
    Ok(())
}
