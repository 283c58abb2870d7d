use crate::foundation::{AgreementPublicKey, PoolId, TimestampMs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pool membership record. `(pool_id, public_key)` is unique. Deliberately
/// not linkable to any preference row: preferences are keyed by nullifier.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Participant {
    pub pool_id: PoolId,
    pub public_key: AgreementPublicKey,
    pub display_name: String,
    pub bio: Option<String>,
    pub profile: BTreeMap<String, String>,
    pub registered_at_ms: TimestampMs,
}
