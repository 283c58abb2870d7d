use crate::infrastructure::transport::messages::FederationMessage;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub type Result<T> = crate::foundation::Result<T>;

/// One bidirectional message stream to a peer.
pub struct PeerChannel {
    pub remote_endpoint: String,
    pub sender: mpsc::Sender<FederationMessage>,
    pub receiver: mpsc::Receiver<FederationMessage>,
}

/// Dial-and-accept transport between federation instances. Implementations
/// own framing and delivery; the manager owns handshakes, retries, and jitter.
#[async_trait]
pub trait FederationTransport: Send + Sync {
    async fn dial(&self, endpoint: &str) -> Result<PeerChannel>;
    /// Next inbound connection, or `None` once the listener is closed.
    async fn accept(&self) -> Option<PeerChannel>;
    fn local_endpoint(&self) -> &str;
}
