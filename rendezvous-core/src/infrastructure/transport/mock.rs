//! In-memory transport for tests and single-process federations: a hub of
//! endpoints connected by paired channels.

use crate::foundation::RendezvousError;
use crate::infrastructure::transport::messages::FederationMessage;
use crate::infrastructure::transport::traits::{FederationTransport, PeerChannel};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

const CHANNEL_CAPACITY: usize = 256;

pub struct MemoryHub {
    listeners: Mutex<HashMap<String, mpsc::Sender<PeerChannel>>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { listeners: Mutex::new(HashMap::new()) })
    }

    /// Bind an endpoint name and get its transport handle.
    pub async fn bind(self: &Arc<Self>, endpoint: &str) -> MemoryTransport {
        let (accept_tx, accept_rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.listeners.lock().await.insert(endpoint.to_string(), accept_tx);
        MemoryTransport { hub: Arc::clone(self), endpoint: endpoint.to_string(), incoming: Mutex::new(accept_rx) }
    }
}

pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    endpoint: String,
    incoming: Mutex<mpsc::Receiver<PeerChannel>>,
}

#[async_trait]
impl FederationTransport for MemoryTransport {
    async fn dial(&self, endpoint: &str) -> Result<PeerChannel, RendezvousError> {
        let listener = {
            let listeners = self.hub.listeners.lock().await;
            listeners
                .get(endpoint)
                .cloned()
                .ok_or_else(|| RendezvousError::TransportError {
                    operation: "dial".to_string(),
                    details: format!("no listener at {endpoint}"),
                })?
        };

        let (out_tx, out_rx) = mpsc::channel::<FederationMessage>(CHANNEL_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<FederationMessage>(CHANNEL_CAPACITY);

        let remote_side = PeerChannel { remote_endpoint: self.endpoint.clone(), sender: in_tx, receiver: out_rx };
        listener.send(remote_side).await.map_err(|_| RendezvousError::TransportError {
            operation: "dial".to_string(),
            details: format!("listener at {endpoint} is gone"),
        })?;

        Ok(PeerChannel { remote_endpoint: endpoint.to_string(), sender: out_tx, receiver: in_rx })
    }

    async fn accept(&self) -> Option<PeerChannel> {
        self.incoming.lock().await.recv().await
    }

    fn local_endpoint(&self) -> &str {
        &self.endpoint
    }
}
