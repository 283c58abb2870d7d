//! Typed event channels replacing callback registration: one channel per
//! event kind, each delivering an immutable snapshot.

use rendezvous_core::domain::crdt::{FederationDocument, InstanceRecord};
use rendezvous_core::foundation::{InstanceId, PoolId};
use std::sync::Arc;
use tokio::sync::mpsc;

const EVENT_CAPACITY: usize = 64;

pub struct FederationEvents {
    pub peer_connected: mpsc::Receiver<InstanceRecord>,
    pub pool_announced: mpsc::Receiver<(PoolId, InstanceId)>,
    pub join_request_received: mpsc::Receiver<PoolId>,
    pub tokens_relayed: mpsc::Receiver<(PoolId, usize)>,
    pub results_received: mpsc::Receiver<(PoolId, usize)>,
    pub state_changed: mpsc::Receiver<Arc<FederationDocument>>,
}

#[derive(Clone)]
pub(crate) struct EventSenders {
    pub peer_connected: mpsc::Sender<InstanceRecord>,
    pub pool_announced: mpsc::Sender<(PoolId, InstanceId)>,
    pub join_request_received: mpsc::Sender<PoolId>,
    pub tokens_relayed: mpsc::Sender<(PoolId, usize)>,
    pub results_received: mpsc::Sender<(PoolId, usize)>,
    pub state_changed: mpsc::Sender<Arc<FederationDocument>>,
}

impl EventSenders {
    pub fn channel() -> (Self, FederationEvents) {
        let (peer_connected_tx, peer_connected) = mpsc::channel(EVENT_CAPACITY);
        let (pool_announced_tx, pool_announced) = mpsc::channel(EVENT_CAPACITY);
        let (join_request_tx, join_request_received) = mpsc::channel(EVENT_CAPACITY);
        let (tokens_relayed_tx, tokens_relayed) = mpsc::channel(EVENT_CAPACITY);
        let (results_received_tx, results_received) = mpsc::channel(EVENT_CAPACITY);
        let (state_changed_tx, state_changed) = mpsc::channel(EVENT_CAPACITY);
        (
            Self {
                peer_connected: peer_connected_tx,
                pool_announced: pool_announced_tx,
                join_request_received: join_request_tx,
                tokens_relayed: tokens_relayed_tx,
                results_received: results_received_tx,
                state_changed: state_changed_tx,
            },
            FederationEvents {
                peer_connected,
                pool_announced,
                join_request_received,
                tokens_relayed,
                results_received,
                state_changed,
            },
        )
    }
}

/// Events are best-effort: a slow or absent subscriber never stalls the
/// peer loops.
pub(crate) fn emit<T>(sender: &mpsc::Sender<T>, event: T) {
    let _ = sender.try_send(event);
}
