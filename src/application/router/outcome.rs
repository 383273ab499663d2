//! What a routed signal did.

use std::fmt;
use std::time::Duration;

use crate::domain::id::{MessageId, Ticket};
use crate::domain::lifecycle::{Action, Lifecycle};
use crate::domain::position::Role;
use crate::error::Error;

/// Why a signal caused no broker action.
#[derive(Debug, Clone, PartialEq)]
pub enum IgnoreReason {
    LowConfidence { confidence: f64, floor: f64 },
    /// Same message delivered again with nothing new in it.
    Duplicate,
    /// Follow-up would not change any leg.
    NoChange,
    /// Follow-up for a message that was never tracked.
    UnknownTarget,
    NotOpen { state: Lifecycle },
    AlreadyClosed,
    Discarded,
    SymbolNotAllowed(String),
    MissingField(&'static str),
    /// Target level that matches no open leg.
    NoMatchingLeg { level: Option<u8> },
    /// Profit report with nothing to act on.
    Informational,
    EmptyCompound,
    NestedCompound,
    StaleTimer,
    NotPending { state: Lifecycle },
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowConfidence { confidence, floor } => {
                write!(f, "confidence {confidence:.2} below {floor:.2}")
            }
            Self::Duplicate => write!(f, "duplicate delivery"),
            Self::NoChange => write!(f, "no change"),
            Self::UnknownTarget => write!(f, "unknown target"),
            Self::NotOpen { state } => write!(f, "target is {state}"),
            Self::AlreadyClosed => write!(f, "already closed"),
            Self::Discarded => write!(f, "discarded"),
            Self::SymbolNotAllowed(symbol) => write!(f, "symbol {symbol} not allowed"),
            Self::MissingField(field) => write!(f, "missing {field}"),
            Self::NoMatchingLeg { level: Some(level) } => {
                write!(f, "no open leg for target {level}")
            }
            Self::NoMatchingLeg { level: None } => write!(f, "no open leg"),
            Self::Informational => write!(f, "informational"),
            Self::EmptyCompound => write!(f, "compound without steps"),
            Self::NestedCompound => write!(f, "nested compound"),
            Self::StaleTimer => write!(f, "stale timer"),
            Self::NotPending { state } => write!(f, "no longer pending ({state})"),
        }
    }
}

/// Result of routing one signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Opened {
        message_id: MessageId,
        tickets: Vec<Ticket>,
    },
    /// Placeholder recorded or updated; waiting for completion.
    Pending {
        message_id: MessageId,
        expires_in: Duration,
    },
    Modified {
        message_id: MessageId,
        legs: usize,
    },
    ProfitTaken {
        message_id: MessageId,
        level: Option<u8>,
        closed: Vec<Role>,
        breakeven: Option<Role>,
    },
    Closed {
        message_id: MessageId,
        legs: usize,
    },
    /// Part of each open leg closed; legs whose share covered the whole
    /// volume are listed under `closed`.
    PartiallyClosed {
        message_id: MessageId,
        percentage: u8,
        reduced: Vec<Role>,
        closed: Vec<Role>,
    },
    Discarded {
        message_id: MessageId,
    },
    Ignored {
        message_id: MessageId,
        reason: IgnoreReason,
    },
    Compound {
        message_id: MessageId,
        steps: Vec<Outcome>,
    },
    /// A compound step that failed. Top-level failures are errors instead.
    Failed {
        message_id: MessageId,
        action: Action,
        cause: String,
    },
}

impl Outcome {
    /// Message the outcome refers to.
    #[must_use]
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::Opened { message_id, .. }
            | Self::Pending { message_id, .. }
            | Self::Modified { message_id, .. }
            | Self::ProfitTaken { message_id, .. }
            | Self::Closed { message_id, .. }
            | Self::PartiallyClosed { message_id, .. }
            | Self::Discarded { message_id }
            | Self::Ignored { message_id, .. }
            | Self::Compound { message_id, .. }
            | Self::Failed { message_id, .. } => *message_id,
        }
    }

    /// Build a failed step from a routing error.
    #[must_use]
    pub fn failed(message_id: MessageId, fallback: Action, error: &Error) -> Self {
        match error {
            Error::Transition {
                message_id,
                action,
                source,
            } => Self::Failed {
                message_id: *message_id,
                action: *action,
                cause: source.to_string(),
            },
            other => Self::Failed {
                message_id,
                action: fallback,
                cause: other.to_string(),
            },
        }
    }

    /// Every failed step, flattened.
    #[must_use]
    pub fn failures(&self) -> Vec<(MessageId, Action, String)> {
        match self {
            Self::Failed {
                message_id,
                action,
                cause,
            } => vec![(*message_id, *action, cause.clone())],
            Self::Compound { steps, .. } => steps.iter().flat_map(Self::failures).collect(),
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened { tickets, .. } => {
                let tickets: Vec<String> = tickets.iter().map(ToString::to_string).collect();
                write!(f, "opened {}", tickets.join(", "))
            }
            Self::Pending { expires_in, .. } => {
                write!(f, "pending completion ({}s left)", expires_in.as_secs())
            }
            Self::Modified { legs, .. } => write!(f, "modified {legs} leg(s)"),
            Self::ProfitTaken {
                level,
                closed,
                breakeven,
                ..
            } => {
                let closed: Vec<String> = closed.iter().map(ToString::to_string).collect();
                match level {
                    Some(level) => write!(f, "target {level} hit")?,
                    None => write!(f, "profit update")?,
                }
                if !closed.is_empty() {
                    write!(f, ", closed {}", closed.join(", "))?;
                }
                if let Some(role) = breakeven {
                    write!(f, ", {role} at break-even")?;
                }
                Ok(())
            }
            Self::Closed { legs, .. } => write!(f, "closed {legs} leg(s)"),
            Self::PartiallyClosed {
                percentage,
                reduced,
                closed,
                ..
            } => {
                write!(f, "closed {percentage}%")?;
                if !reduced.is_empty() {
                    let reduced: Vec<String> = reduced.iter().map(ToString::to_string).collect();
                    write!(f, " of {}", reduced.join(", "))?;
                }
                if !closed.is_empty() {
                    let closed: Vec<String> = closed.iter().map(ToString::to_string).collect();
                    write!(f, ", closed {}", closed.join(", "))?;
                }
                Ok(())
            }
            Self::Discarded { .. } => write!(f, "discarded"),
            Self::Ignored { reason, .. } => write!(f, "ignored: {reason}"),
            Self::Compound { steps, .. } => {
                let steps: Vec<String> = steps.iter().map(ToString::to_string).collect();
                write!(f, "compound [{}]", steps.join("; "))
            }
            Self::Failed { action, cause, .. } => write!(f, "{action} failed: {cause}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_compact() {
        let outcome = Outcome::ProfitTaken {
            message_id: MessageId::new(501),
            level: Some(1),
            closed: vec![Role::Scalp],
            breakeven: Some(Role::Runner),
        };
        assert_eq!(
            outcome.to_string(),
            "target 1 hit, closed scalp, runner at break-even"
        );
    }

    #[test]
    fn failed_keeps_transition_action() {
        let err = Error::Persistence("disk".into()).in_transition(MessageId::new(4), Action::Close);
        let step = Outcome::failed(MessageId::new(9), Action::Open, &err);
        assert_eq!(
            step,
            Outcome::Failed {
                message_id: MessageId::new(4),
                action: Action::Close,
                cause: "persistence error: disk".into(),
            }
        );
    }
}
