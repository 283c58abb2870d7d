use rendezvous_core::domain::crdt::InstanceRecord;
use rendezvous_core::infrastructure::transport::FederationMessage;
use std::time::Duration;
use tokio::sync::mpsc;

/// Connection-side state for one federation peer.
pub struct PeerHandle {
    pub record: InstanceRecord,
    pub connected: bool,
    pub last_ping_ms: u64,
    pub retry_count: u32,
    /// Timestamp watermark for incremental sync to this peer.
    pub last_synced_ms: u64,
    pub sender: mpsc::Sender<FederationMessage>,
}

/// Reconnect backoff keyed on the retry count: 1s, 2s, 4s, ... capped at 60s.
pub fn backoff_delay(retry_count: u32) -> Duration {
    let secs = 1u64.checked_shl(retry_count.min(6)).unwrap_or(64).min(60);
    Duration::from_secs(secs)
}
