use crate::domain::pool::{Pool, PoolStatus};
use crate::foundation::{RendezvousError, TimestampMs};

/// Effective status is a pure function of the stored status, the deadlines,
/// and the supplied clock. `Closed` is absorbing.
pub fn effective_status(pool: &Pool, now_ms: TimestampMs) -> PoolStatus {
    if pool.status == PoolStatus::Closed || now_ms >= pool.reveal_deadline_ms {
        return PoolStatus::Closed;
    }
    match pool.commit_deadline_ms {
        Some(commit_deadline) if now_ms < commit_deadline => PoolStatus::Commit,
        Some(_) => PoolStatus::Reveal,
        None => PoolStatus::Open,
    }
}

pub fn accepts_commits(effective: PoolStatus) -> bool {
    effective == PoolStatus::Commit
}

/// Direct (pre-revealed) submissions are accepted outside the commit window.
pub fn accepts_reveals(effective: PoolStatus) -> bool {
    matches!(effective, PoolStatus::Open | PoolStatus::Reveal)
}

pub fn accepts_submissions(effective: PoolStatus) -> bool {
    effective != PoolStatus::Closed
}

const VALID_TRANSITIONS: &[(PoolStatus, PoolStatus)] = &[
    (PoolStatus::Open, PoolStatus::Closed),
    (PoolStatus::Commit, PoolStatus::Reveal),
    (PoolStatus::Commit, PoolStatus::Closed),
    (PoolStatus::Reveal, PoolStatus::Closed),
];

/// Stored-status updates must follow the lifecycle; same-state writes are no-ops.
pub fn ensure_valid_transition(from: PoolStatus, to: PoolStatus) -> Result<(), RendezvousError> {
    if from == to || VALID_TRANSITIONS.contains(&(from, to)) {
        Ok(())
    } else {
        Err(RendezvousError::InvalidStateTransition { from: from.to_string(), to: to.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gate::Gate;
    use crate::foundation::{AgreementPublicKey, PoolId, SigningPublicKey};

    fn pool(status: PoolStatus, commit_deadline_ms: Option<u64>, reveal_deadline_ms: u64) -> Pool {
        Pool {
            pool_id: PoolId::new([1; 32]),
            name: "t".to_string(),
            description: None,
            creator_agreement_key: AgreementPublicKey::new([2; 32]),
            creator_signing_key: SigningPublicKey::new([3; 32]),
            commit_deadline_ms,
            reveal_deadline_ms,
            gate: Gate::Open,
            max_preferences: None,
            ephemeral: false,
            requires_invite: false,
            status,
            created_at_ms: 0,
            updated_at_ms: 0,
            psi_setup_at_ms: None,
        }
    }

    #[test]
    fn open_pool_without_commit_window() {
        let p = pool(PoolStatus::Open, None, 1_000);
        assert_eq!(effective_status(&p, 10), PoolStatus::Open);
        assert_eq!(effective_status(&p, 999), PoolStatus::Open);
        assert_eq!(effective_status(&p, 1_000), PoolStatus::Closed);
        assert_eq!(effective_status(&p, 2_000), PoolStatus::Closed);
    }

    #[test]
    fn commit_then_reveal_then_closed() {
        let p = pool(PoolStatus::Commit, Some(500), 1_000);
        assert_eq!(effective_status(&p, 499), PoolStatus::Commit);
        assert_eq!(effective_status(&p, 500), PoolStatus::Reveal);
        assert_eq!(effective_status(&p, 999), PoolStatus::Reveal);
        assert_eq!(effective_status(&p, 1_000), PoolStatus::Closed);
    }

    #[test]
    fn closed_is_absorbing() {
        let p = pool(PoolStatus::Closed, Some(500), 1_000);
        assert_eq!(effective_status(&p, 0), PoolStatus::Closed);
        assert_eq!(effective_status(&p, 499), PoolStatus::Closed);
    }

    #[test]
    fn phase_predicates() {
        assert!(accepts_commits(PoolStatus::Commit));
        assert!(!accepts_commits(PoolStatus::Open));
        assert!(accepts_reveals(PoolStatus::Open));
        assert!(accepts_reveals(PoolStatus::Reveal));
        assert!(!accepts_reveals(PoolStatus::Commit));
        assert!(!accepts_submissions(PoolStatus::Closed));
    }

    #[test]
    fn transition_table() {
        assert!(ensure_valid_transition(PoolStatus::Commit, PoolStatus::Reveal).is_ok());
        assert!(ensure_valid_transition(PoolStatus::Reveal, PoolStatus::Closed).is_ok());
        assert!(ensure_valid_transition(PoolStatus::Open, PoolStatus::Open).is_ok());
        assert!(ensure_valid_transition(PoolStatus::Closed, PoolStatus::Open).is_err());
        assert!(ensure_valid_transition(PoolStatus::Reveal, PoolStatus::Commit).is_err());
    }
}
