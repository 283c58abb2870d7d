//! Eligibility gates as a tagged union with a single evaluate function.
//! Extension is by adding a variant, not by subclassing.

use crate::foundation::{AgreementPublicKey, PoolId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Gate {
    /// Always eligible.
    Open,
    /// Participant key must appear in the set.
    AllowList { keys: Vec<AgreementPublicKey> },
    /// Requires a verified unlinkable-token proof from the named issuer.
    Token { issuer: String },
    /// Logical combination; short-circuits, empty child list fails.
    Composite { op: GateOp, children: Vec<Gate> },
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOp {
    And,
    Or,
}

/// Evaluation context. The proof itself is checked once up-front by the
/// caller; the tree only consumes the resulting [`ProofCheck`].
#[derive(Clone, Copy, Debug)]
pub struct GateContext<'a> {
    pub pool_id: &'a PoolId,
    pub participant_key: Option<&'a AgreementPublicKey>,
}

/// Outcome of verifying the context's token proof against the issuer adapter.
#[derive(Clone, Debug)]
pub struct ProofCheck {
    pub issuer: String,
    pub expired: bool,
    pub verified: bool,
}

/// Evaluation never fails; ineligibility is a value, not an error.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GateOutcome {
    pub eligible: bool,
    pub reason: String,
    pub detail: Option<String>,
}

impl GateOutcome {
    pub fn eligible(reason: impl Into<String>) -> Self {
        Self { eligible: true, reason: reason.into(), detail: None }
    }

    pub fn ineligible(reason: impl Into<String>) -> Self {
        Self { eligible: false, reason: reason.into(), detail: None }
    }

    pub fn ineligible_with(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { eligible: false, reason: reason.into(), detail: Some(detail.into()) }
    }
}

impl Gate {
    /// Structural validation applied at pool creation.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Gate::Open => Ok(()),
            Gate::AllowList { .. } => Ok(()),
            Gate::Token { issuer } => {
                if issuer.trim().is_empty() {
                    Err("token gate requires an issuer id".to_string())
                } else {
                    Ok(())
                }
            }
            Gate::Composite { children, .. } => {
                if children.is_empty() {
                    return Err("composite gate requires at least one child".to_string());
                }
                for child in children {
                    child.validate()?;
                }
                Ok(())
            }
        }
    }

    /// Walk the tree against an already-verified proof status.
    pub fn evaluate(&self, ctx: &GateContext<'_>, proof: Option<&ProofCheck>) -> GateOutcome {
        match self {
            Gate::Open => GateOutcome::eligible("open"),
            Gate::AllowList { keys } => match ctx.participant_key {
                Some(key) if keys.contains(key) => GateOutcome::eligible("allow_list"),
                Some(_) => GateOutcome::ineligible("key not in allow list"),
                None => GateOutcome::ineligible("allow list gate requires a participant key"),
            },
            Gate::Token { issuer } => match proof {
                None => GateOutcome::ineligible("token gate requires a proof"),
                Some(check) if check.issuer != *issuer => {
                    GateOutcome::ineligible_with("proof issuer mismatch", format!("expected {issuer}, got {}", check.issuer))
                }
                Some(check) if check.expired => GateOutcome::ineligible("proof expired"),
                Some(check) if !check.verified => GateOutcome::ineligible("proof verification failed"),
                Some(_) => GateOutcome::eligible("token"),
            },
            Gate::Composite { op, children } => {
                if children.is_empty() {
                    return GateOutcome::ineligible("empty composite gate");
                }
                match op {
                    GateOp::And => {
                        for child in children {
                            let outcome = child.evaluate(ctx, proof);
                            if !outcome.eligible {
                                return outcome;
                            }
                        }
                        GateOutcome::eligible("all children passed")
                    }
                    GateOp::Or => {
                        let mut last = GateOutcome::ineligible("empty composite gate");
                        for child in children {
                            last = child.evaluate(ctx, proof);
                            if last.eligible {
                                return last;
                            }
                        }
                        last
                    }
                }
            }
        }
    }
}
