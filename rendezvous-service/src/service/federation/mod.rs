//! Federation runtime: one cooperative task per peer, a periodic CRDT sync
//! ticker, and the anonymous join/relay flows. Every mutation applies to the
//! local document first and then broadcasts; anonymous messages that fail
//! token verification are dropped silently.

mod events;
mod peers;

pub use events::FederationEvents;
pub use peers::{backoff_delay, PeerHandle};

use events::{emit, EventSenders};
use log::{debug, info, warn};
use rand::rngs::OsRng;
use rand::Rng;
use rendezvous_core::application::{Rendezvous, SubmissionRequest};
use rendezvous_core::domain::crdt::{FederationDocument, InstanceRecord, PoolSummary};
use rendezvous_core::domain::pool::Pool;
use rendezvous_core::domain::token::UnlinkableToken;
use rendezvous_core::foundation::{
    now_millis, InstanceId, MatchToken, MessageId, Nullifier, PoolId, RendezvousError, Result,
    JOIN_REQUEST_TIMEOUT_SECS, PROTOCOL_VERSION, RELAY_JITTER_MAX_SECS, RELAY_JITTER_MIN_SECS, SEND_JITTER_MAX_MS,
    SEND_JITTER_MIN_MS, VERIFIER_TIMEOUT_SECS,
};
use rendezvous_core::infrastructure::adapters::TokenAuthority;
use rendezvous_core::infrastructure::crypto::keys::AgreementKeypair;
use rendezvous_core::infrastructure::crypto::{random_bytes32, sealed};
use rendezvous_core::infrastructure::transport::{
    AnonymousPayload, FederationMessage, FederationPayload, FederationTransport, Handshake, JoinPayload, PeerChannel,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
pub struct FederationRuntimeConfig {
    pub sync_interval: Duration,
    /// Base jitter applied to every peer send, milliseconds.
    pub send_jitter_ms: (u64, u64),
    /// Additional jitter before anonymous token relays, seconds.
    pub relay_jitter_secs: (u64, u64),
    pub join_timeout: Duration,
    pub verifier_timeout: Duration,
}

impl Default for FederationRuntimeConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(rendezvous_core::foundation::FEDERATION_SYNC_INTERVAL_SECS),
            send_jitter_ms: (SEND_JITTER_MIN_MS, SEND_JITTER_MAX_MS),
            relay_jitter_secs: (RELAY_JITTER_MIN_SECS, RELAY_JITTER_MAX_SECS),
            join_timeout: Duration::from_secs(JOIN_REQUEST_TIMEOUT_SECS),
            verifier_timeout: Duration::from_secs(VERIFIER_TIMEOUT_SECS),
        }
    }
}

type JoinWaiter = oneshot::Sender<(bool, Option<String>)>;

pub struct FederationManager {
    instance: InstanceRecord,
    agreement: AgreementKeypair,
    facade: Arc<Rendezvous>,
    transport: Arc<dyn FederationTransport>,
    token_authority: Arc<dyn TokenAuthority>,
    document: Mutex<FederationDocument>,
    peers: AsyncMutex<HashMap<InstanceId, PeerHandle>>,
    pending_joins: AsyncMutex<HashMap<MessageId, JoinWaiter>>,
    events: EventSenders,
    config: FederationRuntimeConfig,
}

impl FederationManager {
    pub fn new(
        instance: InstanceRecord,
        agreement: AgreementKeypair,
        facade: Arc<Rendezvous>,
        transport: Arc<dyn FederationTransport>,
        token_authority: Arc<dyn TokenAuthority>,
        config: FederationRuntimeConfig,
    ) -> (Arc<Self>, FederationEvents) {
        let (events, streams) = EventSenders::channel();
        let mut document = FederationDocument::new();
        document.upsert_instance(instance.clone(), now_millis());
        let manager = Arc::new(Self {
            instance,
            agreement,
            facade,
            transport,
            token_authority,
            document: Mutex::new(document),
            peers: AsyncMutex::new(HashMap::new()),
            pending_joins: AsyncMutex::new(HashMap::new()),
            events,
            config,
        });
        (manager, streams)
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance.instance_id
    }

    pub fn document_snapshot(&self) -> FederationDocument {
        self.document.lock().expect("document lock").clone()
    }

    /// Launch the accept loop, one dial loop per configured peer, and the
    /// periodic sync ticker.
    pub fn spawn(self: &Arc<Self>, peer_endpoints: Vec<String>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let manager = Arc::clone(self);
        let mut accept_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = accept_shutdown.changed() => break,
                    channel = manager.transport.accept() => {
                        let Some(channel) = channel else { break };
                        let manager = Arc::clone(&manager);
                        let shutdown = accept_shutdown.clone();
                        tokio::spawn(async move {
                            manager.run_connection(channel, shutdown).await;
                        });
                    }
                }
            }
        }));

        for endpoint in peer_endpoints {
            let manager = Arc::clone(self);
            let mut dial_shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let mut retry_count = 0u32;
                loop {
                    if *dial_shutdown.borrow() {
                        break;
                    }
                    match manager.transport.dial(&endpoint).await {
                        Ok(channel) => {
                            retry_count = 0;
                            manager.run_connection(channel, dial_shutdown.clone()).await;
                        }
                        Err(err) => {
                            debug!("dial failed endpoint={} error={}", endpoint, err);
                        }
                    }
                    let delay = backoff_delay(retry_count);
                    retry_count = retry_count.saturating_add(1);
                    tokio::select! {
                        _ = dial_shutdown.changed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }));
        }

        let manager = Arc::clone(self);
        let mut tick_shutdown = shutdown;
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.sync_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick_shutdown.changed() => break,
                    _ = ticker.tick() => manager.sync_tick().await,
                }
            }
        }));

        handles
    }

    /// Drive one peer connection: exchange handshakes, then pump messages
    /// until disconnect or shutdown.
    async fn run_connection(self: &Arc<Self>, mut channel: PeerChannel, mut shutdown: watch::Receiver<bool>) {
        let handshake = FederationMessage::Handshake(Handshake {
            instance: self.instance.clone(),
            protocol_version: PROTOCOL_VERSION.to_string(),
        });
        if channel.sender.send(handshake).await.is_err() {
            return;
        }

        let reply = channel.sender.clone();
        let mut peer_id: Option<InstanceId> = None;
        loop {
            let message = tokio::select! {
                _ = shutdown.changed() => break,
                message = channel.receiver.recv() => message,
            };
            let Some(message) = message else { break };
            match message {
                FederationMessage::Handshake(handshake) => {
                    peer_id = Some(handshake.instance.instance_id.clone());
                    self.register_peer(handshake.instance, reply.clone()).await;
                }
                FederationMessage::Identified { sender, payload, .. } => {
                    self.handle_identified(sender, payload, &reply).await;
                }
                FederationMessage::Anonymous { message_id, auth_token, payload } => {
                    self.handle_anonymous(message_id, auth_token, payload, &reply).await;
                }
            }
        }

        if let Some(peer_id) = peer_id {
            let mut peers = self.peers.lock().await;
            if let Some(handle) = peers.get_mut(&peer_id) {
                handle.connected = false;
                handle.retry_count = handle.retry_count.saturating_add(1);
            }
            info!("peer disconnected instance_id={}", peer_id);
        }
    }

    async fn register_peer(self: &Arc<Self>, record: InstanceRecord, sender: mpsc::Sender<FederationMessage>) {
        let now = now_millis();
        {
            let mut document = self.document.lock().expect("document lock");
            document.upsert_instance(record.clone(), now);
        }
        {
            let mut peers = self.peers.lock().await;
            peers.insert(
                record.instance_id.clone(),
                PeerHandle { record: record.clone(), connected: true, last_ping_ms: now, retry_count: 0, last_synced_ms: 0, sender: sender.clone() },
            );
        }
        info!("peer connected instance_id={} endpoint={}", record.instance_id, record.endpoint);
        emit(&self.events.peer_connected, record.clone());

        // Initial sync immediately upon connection.
        let snapshot = self.document_snapshot();
        self.send_jittered(sender, identified(self.instance_id().clone(), FederationPayload::Sync(snapshot))).await;
    }

    async fn handle_identified(
        self: &Arc<Self>,
        sender_id: InstanceId,
        payload: FederationPayload,
        reply: &mpsc::Sender<FederationMessage>,
    ) {
        match payload {
            FederationPayload::Sync(remote) => {
                let (changed, snapshot) = {
                    let mut document = self.document.lock().expect("document lock");
                    let changed = document.merge(&remote);
                    (changed, Arc::new(document.clone()))
                };
                if changed {
                    debug!("document merged from={} pools={}", sender_id, snapshot.pools.len());
                    emit(&self.events.state_changed, snapshot);
                }
            }
            FederationPayload::PoolAnnounce { pool_id, entry } | FederationPayload::PoolUpdate { pool_id, entry } => {
                let changed = {
                    let mut document = self.document.lock().expect("document lock");
                    document.pool_entry(&pool_id).merge(&entry)
                };
                if changed {
                    emit(&self.events.pool_announced, (pool_id, sender_id));
                }
            }
            FederationPayload::ResultNotify { pool_id, matched_tokens } => {
                let count = matched_tokens.len();
                {
                    let mut document = self.document.lock().expect("document lock");
                    document.pool_entry(&pool_id).matched_tokens.set(matched_tokens, now_millis());
                }
                emit(&self.events.results_received, (pool_id, count));
            }
            FederationPayload::Ping => {
                let pong = identified(self.instance_id().clone(), FederationPayload::Pong);
                self.send_jittered(reply.clone(), pong).await;
            }
            FederationPayload::Pong => {
                let mut peers = self.peers.lock().await;
                if let Some(handle) = peers.get_mut(&sender_id) {
                    handle.last_ping_ms = now_millis();
                }
            }
            FederationPayload::JoinResponse { in_reply_to, accepted, reason } => {
                let waiter = self.pending_joins.lock().await.remove(&in_reply_to);
                if let Some(waiter) = waiter {
                    let _ = waiter.send((accepted, reason));
                }
            }
        }
    }

    async fn handle_anonymous(
        self: &Arc<Self>,
        message_id: MessageId,
        auth_token: Vec<u8>,
        payload: AnonymousPayload,
        reply: &mpsc::Sender<FederationMessage>,
    ) {
        if !self.verify_anonymous_token(&auth_token).await {
            debug!("anonymous message dropped message_id={} reason=token_verification", message_id);
            return;
        }

        match payload {
            AnonymousPayload::JoinRequest { pool_id, public_key, encrypted_payload } => {
                emit(&self.events.join_request_received, pool_id);
                let (accepted, reason) = match self.accept_join(&pool_id, public_key, &encrypted_payload).await {
                    Ok(()) => (true, None),
                    Err(err) => {
                        debug!("join request refused pool_id={} error={}", pool_id, err);
                        (false, Some(err.code().as_str().to_string()))
                    }
                };
                let response = identified(
                    self.instance_id().clone(),
                    FederationPayload::JoinResponse { in_reply_to: message_id, accepted, reason },
                );
                self.send_jittered(reply.clone(), response).await;
            }
            AnonymousPayload::TokenRelay { pool_id, match_tokens, nullifier } => {
                let count = match_tokens.len();
                let request = SubmissionRequest {
                    pool_id,
                    tokens: match_tokens,
                    commitments: None,
                    nullifier,
                    reveal_entries: Vec::new(),
                    proof: None,
                };
                match self.facade.submit(request).await {
                    Ok(_) => emit(&self.events.tokens_relayed, (pool_id, count)),
                    Err(err) => debug!("relayed submission refused pool_id={} error={}", pool_id, err),
                }
            }
        }
    }

    async fn accept_join(&self, pool_id: &PoolId, public_key: rendezvous_core::foundation::AgreementPublicKey, encrypted_payload: &[u8]) -> Result<()> {
        // Only the owner instance can decrypt; a misrouted request fails here.
        let plaintext = sealed::open(&self.agreement, encrypted_payload)?;
        let payload = JoinPayload::from_bytes(&plaintext)?;
        let proof = match &payload.issuance_proof {
            Some(bytes) => Some(UnlinkableToken::from_bytes(bytes)?),
            None => None,
        };
        self.facade
            .register_participant(pool_id, public_key, payload.display_name, payload.bio, Default::default(), proof.as_ref())
            .await?;
        Ok(())
    }

    async fn verify_anonymous_token(&self, auth_token: &[u8]) -> bool {
        let Ok(token) = UnlinkableToken::from_bytes(auth_token) else {
            return false;
        };
        // Expiry first, locally; then the verifier.
        if self.token_authority.is_expired(&token, now_millis()) {
            return false;
        }
        match tokio::time::timeout(self.config.verifier_timeout, self.token_authority.verify(&token)).await {
            Ok(Ok(verified)) => verified,
            Ok(Err(err)) => {
                warn!("token verification errored: {err}");
                false
            }
            Err(_) => {
                warn!("token verification timed out");
                false
            }
        }
    }

    // --- public operations ---

    /// Publish a locally-created pool into the federation document and to
    /// every connected peer.
    pub async fn announce_pool(&self, pool: &Pool) -> Result<()> {
        let now = now_millis();
        let summary = PoolSummary {
            name: pool.name.clone(),
            description: pool.description.clone(),
            status: pool.status,
            commit_deadline_ms: pool.commit_deadline_ms,
            reveal_deadline_ms: pool.reveal_deadline_ms,
            requires_invite: pool.requires_invite,
        };
        let entry = {
            let mut document = self.document.lock().expect("document lock");
            let entry = document.pool_entry(&pool.pool_id);
            entry.summary.set(summary, now);
            entry.owner_instance.set(self.instance.instance_id.clone(), now);
            entry.owner_agreement_key.set(self.agreement.public(), now);
            let entry = entry.clone();
            document.bump_clock(&self.instance.instance_id);
            entry
        };
        self.broadcast(FederationPayload::PoolAnnounce { pool_id: pool.pool_id, entry }).await;
        Ok(())
    }

    /// Record and broadcast a detection result for an owned pool.
    pub async fn publish_result(&self, pool_id: &PoolId, matched_tokens: Vec<MatchToken>) -> Result<()> {
        {
            let mut document = self.document.lock().expect("document lock");
            document.pool_entry(pool_id).matched_tokens.set(matched_tokens.clone(), now_millis());
            document.bump_clock(&self.instance.instance_id);
        }
        self.broadcast(FederationPayload::ResultNotify { pool_id: *pool_id, matched_tokens }).await;
        Ok(())
    }

    /// Anonymous cross-instance join: fetch a fresh token, seal the profile
    /// to the owner, send, and await the correlated response. The sender
    /// instance id is never transmitted.
    pub async fn request_join(&self, pool_id: &PoolId, public_key: rendezvous_core::foundation::AgreementPublicKey, payload: JoinPayload) -> Result<bool> {
        let (owner_instance, owner_key) = self.pool_owner(pool_id)?;
        if owner_instance == self.instance.instance_id {
            return Err(RendezvousError::InvalidInput("pool is owned by this instance; register locally".to_string()));
        }

        let token = self.token_authority.request_token("join").await?;
        let encrypted_payload = sealed::seal(&owner_key, &payload.to_bytes()?, &mut OsRng)?;
        let message_id = MessageId::new(random_bytes32(&mut OsRng));

        let (waiter_tx, waiter_rx) = oneshot::channel();
        self.pending_joins.lock().await.insert(message_id, waiter_tx);

        let message = FederationMessage::Anonymous {
            message_id,
            auth_token: token.to_bytes()?,
            payload: AnonymousPayload::JoinRequest { pool_id: *pool_id, public_key, encrypted_payload },
        };
        self.send_to_instance(&owner_instance, message).await?;

        match tokio::time::timeout(self.config.join_timeout, waiter_rx).await {
            Ok(Ok((accepted, reason))) => {
                if let Some(reason) = reason.filter(|_| !accepted) {
                    debug!("join refused pool_id={} reason={}", pool_id, reason);
                }
                Ok(accepted)
            }
            Ok(Err(_)) | Err(_) => {
                self.pending_joins.lock().await.remove(&message_id);
                Err(RendezvousError::TransportError {
                    operation: "join_request".to_string(),
                    details: "timed out waiting for join response".to_string(),
                })
            }
        }
    }

    /// Anonymous token relay with its own 5–60 s jitter window. Relays to a
    /// pool this instance owns are a no-op.
    pub async fn relay_tokens(&self, pool_id: &PoolId, match_tokens: Vec<MatchToken>, nullifier: Nullifier) -> Result<()> {
        let (owner_instance, _) = self.pool_owner(pool_id)?;
        if owner_instance == self.instance.instance_id {
            return Ok(());
        }

        let token = self.token_authority.request_token("relay").await?;
        let (min_secs, max_secs) = self.config.relay_jitter_secs;
        if max_secs > 0 {
            let delay = OsRng.gen_range(min_secs..=max_secs);
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        let message = FederationMessage::Anonymous {
            message_id: MessageId::new(random_bytes32(&mut OsRng)),
            auth_token: token.to_bytes()?,
            payload: AnonymousPayload::TokenRelay { pool_id: *pool_id, match_tokens, nullifier },
        };
        self.send_to_instance(&owner_instance, message).await
    }

    // --- internals ---

    fn pool_owner(&self, pool_id: &PoolId) -> Result<(InstanceId, rendezvous_core::foundation::AgreementPublicKey)> {
        let document = self.document.lock().expect("document lock");
        let entry = document.pools.get(pool_id).ok_or_else(|| RendezvousError::PoolNotFound(pool_id.to_string()))?;
        let owner = entry
            .owner_instance
            .value()
            .cloned()
            .ok_or_else(|| RendezvousError::PoolNotFound(format!("{pool_id} has no known owner instance")))?;
        let key = entry
            .owner_agreement_key
            .value()
            .copied()
            .ok_or_else(|| RendezvousError::PoolNotFound(format!("{pool_id} has no known owner key")))?;
        Ok((owner, key))
    }

    async fn sync_tick(self: &Arc<Self>) {
        let now = now_millis();
        let targets: Vec<(InstanceId, u64, mpsc::Sender<FederationMessage>)> = {
            let peers = self.peers.lock().await;
            peers
                .iter()
                .filter(|(_, handle)| handle.connected)
                .map(|(id, handle)| (id.clone(), handle.last_synced_ms, handle.sender.clone()))
                .collect()
        };

        for (peer_id, last_synced_ms, sender) in targets {
            let delta = {
                let document = self.document.lock().expect("document lock");
                document.delta_since(last_synced_ms)
            };
            if delta.is_empty() {
                continue;
            }
            debug!("sync tick peer={} pools={}", peer_id, delta.pools.len());
            self.send_jittered(sender, identified(self.instance_id().clone(), FederationPayload::Sync(delta))).await;
            let mut peers = self.peers.lock().await;
            if let Some(handle) = peers.get_mut(&peer_id) {
                handle.last_synced_ms = now;
            }
        }
    }

    async fn broadcast(&self, payload: FederationPayload) {
        let senders: Vec<mpsc::Sender<FederationMessage>> = {
            let peers = self.peers.lock().await;
            peers.values().filter(|handle| handle.connected).map(|handle| handle.sender.clone()).collect()
        };
        for sender in senders {
            let message = identified(self.instance.instance_id.clone(), payload.clone());
            self.send_jittered(sender, message).await;
        }
    }

    async fn send_to_instance(&self, instance_id: &InstanceId, message: FederationMessage) -> Result<()> {
        let sender = {
            let peers = self.peers.lock().await;
            peers
                .get(instance_id)
                .filter(|handle| handle.connected)
                .map(|handle| handle.sender.clone())
                .ok_or_else(|| RendezvousError::TransportError {
                    operation: "send".to_string(),
                    details: format!("no connected peer {instance_id}"),
                })?
        };
        self.send_jittered(sender, message).await;
        Ok(())
    }

    /// All peer sends carry a base jitter to decorrelate traffic timing.
    async fn send_jittered(&self, sender: mpsc::Sender<FederationMessage>, message: FederationMessage) {
        let (min_ms, max_ms) = self.config.send_jitter_ms;
        if max_ms > 0 {
            let delay = OsRng.gen_range(min_ms..=max_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if sender.send(message).await.is_err() {
            debug!("send failed: peer channel closed");
        }
    }
}

fn identified(sender: InstanceId, payload: FederationPayload) -> FederationMessage {
    FederationMessage::Identified { message_id: MessageId::new(random_bytes32(&mut OsRng)), sender, payload }
}
