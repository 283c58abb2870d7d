use crate::domain::crdt::{FederatedPool, FederationDocument, InstanceRecord};
use crate::foundation::{AgreementPublicKey, InstanceId, MatchToken, MessageId, Nullifier, PoolId, RendezvousError};
use serde::{Deserialize, Serialize};

/// Sent by each side when a peer connection opens.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Handshake {
    pub instance: InstanceRecord,
    pub protocol_version: String,
}

/// Payloads that carry a sender instance id.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum FederationPayload {
    Sync(FederationDocument),
    PoolAnnounce { pool_id: PoolId, entry: FederatedPool },
    PoolUpdate { pool_id: PoolId, entry: FederatedPool },
    ResultNotify { pool_id: PoolId, matched_tokens: Vec<MatchToken> },
    Ping,
    Pong,
    JoinResponse { in_reply_to: MessageId, accepted: bool, reason: Option<String> },
}

/// Payloads that carry an auth token instead of a sender. Dropped silently
/// when the token fails verification.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum AnonymousPayload {
    /// `public_key` stays cleartext: it is required for eligibility and
    /// routing. Everything else is opaque to any intermediary.
    JoinRequest { pool_id: PoolId, public_key: AgreementPublicKey, encrypted_payload: Vec<u8> },
    TokenRelay { pool_id: PoolId, match_tokens: Vec<MatchToken>, nullifier: Nullifier },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum FederationMessage {
    Handshake(Handshake),
    Identified { message_id: MessageId, sender: InstanceId, payload: FederationPayload },
    Anonymous { message_id: MessageId, auth_token: Vec<u8>, payload: AnonymousPayload },
}

impl FederationMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, RendezvousError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RendezvousError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FederationMessage::Handshake(_) => "handshake",
            FederationMessage::Identified { payload, .. } => match payload {
                FederationPayload::Sync(_) => "sync",
                FederationPayload::PoolAnnounce { .. } => "pool_announce",
                FederationPayload::PoolUpdate { .. } => "pool_update",
                FederationPayload::ResultNotify { .. } => "result_notify",
                FederationPayload::Ping => "ping",
                FederationPayload::Pong => "pong",
                FederationPayload::JoinResponse { .. } => "join_response",
            },
            FederationMessage::Anonymous { payload, .. } => match payload {
                AnonymousPayload::JoinRequest { .. } => "join_request",
                AnonymousPayload::TokenRelay { .. } => "token_relay",
            },
        }
    }
}

/// Plaintext of a join request, sealed to the pool owner's agreement key
/// before it leaves the sender.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JoinPayload {
    pub display_name: String,
    pub bio: Option<String>,
    pub issuance_proof: Option<Vec<u8>>,
}

impl JoinPayload {
    pub fn to_bytes(&self) -> Result<Vec<u8>, RendezvousError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RendezvousError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
