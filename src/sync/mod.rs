//! Moving changes between replicas: the outgoing change queue, an
//! in-process pub/sub hub, and the host's serial-numbered update channel.

use crate::core::ActorId;
use crate::doc::Change;
use serde::{Deserialize, Serialize};

mod pubsub;
mod queue;

pub use pubsub::Publisher;
pub use queue::{ChangeQueue, ChangeSink, QueueState};

/// One batch delivered by the host. `max_serial` is the highest serial the
/// host knew of when the subscription started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostUpdate {
    pub serial: u64,
    pub max_serial: u64,
    pub payload: Vec<Change>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Replay of history that existed before this session started.
    CatchUp,
    Live,
}

/// Tracks whether incoming updates are catch-up replay or live traffic.
#[derive(Debug, Clone, Default)]
pub struct UpdateFeed {
    catch_up_until: Option<u64>,
    last_serial: u64,
}

impl UpdateFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every update with a serial up to `max_serial` is catch-up.
    pub fn begin_catch_up(&mut self, max_serial: u64) {
        self.catch_up_until = Some(max_serial);
    }

    /// Classifies `update`. Without an explicit `begin_catch_up`, the first
    /// update's `max_serial` sets the catch-up horizon.
    pub fn classify(&mut self, update: &HostUpdate) -> Delivery {
        let horizon = *self.catch_up_until.get_or_insert(update.max_serial);
        if update.serial <= self.last_serial {
            tracing::warn!(
                serial = update.serial,
                last = self.last_serial,
                "host update serial did not increase"
            );
        }
        self.last_serial = self.last_serial.max(update.serial);
        if update.serial <= horizon {
            Delivery::CatchUp
        } else {
            Delivery::Live
        }
    }

    pub fn last_serial(&self) -> u64 {
        self.last_serial
    }
}

/// Live rule: a change is skipped only when it is our own and the document
/// already reflects it. Catch-up never skips.
pub fn should_apply(
    delivery: Delivery,
    change: &Change,
    local: &ActorId,
    already_applied: impl FnOnce(&ActorId, u64) -> bool,
) -> bool {
    match delivery {
        Delivery::CatchUp => true,
        Delivery::Live => !(change.actor == *local && already_applied(&change.actor, change.seq)),
    }
}

/// Validation errors for incoming change batches
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Batch exceeds configured resource limits
    #[error("resource limit exceeded: {actual} > {limit}")]
    ResourceLimitExceeded { limit: usize, actual: usize },
    /// Change data is malformed
    #[error("malformed change {seq} from {actor}: {reason}")]
    MalformedChange {
        actor: ActorId,
        seq: u64,
        reason: String,
    },
}

/// Configuration for validation limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    pub max_changes_per_batch: usize,
    pub max_ops_per_change: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_changes_per_batch: 10_000,
            max_ops_per_change: 1_000_000,
        }
    }
}

/// Validate a batch of incoming changes before any of it is applied
pub fn validate_batch(changes: &[Change], limits: &ValidationLimits) -> Result<(), ValidationError> {
    if changes.len() > limits.max_changes_per_batch {
        return Err(ValidationError::ResourceLimitExceeded {
            limit: limits.max_changes_per_batch,
            actual: changes.len(),
        });
    }

    for change in changes {
        if change.ops.len() > limits.max_ops_per_change {
            return Err(ValidationError::ResourceLimitExceeded {
                limit: limits.max_ops_per_change,
                actual: change.ops.len(),
            });
        }

        let malformed = |reason: &str| ValidationError::MalformedChange {
            actor: change.actor.clone(),
            seq: change.seq,
            reason: reason.to_string(),
        };

        // Sequence numbers start at 1
        if change.seq == 0 {
            return Err(malformed("sequence number cannot be zero"));
        }

        // The counter after the last op must stay representable
        if change.start_op.checked_add(change.ops.len() as u64).is_none() {
            return Err(malformed("operation ids overflow"));
        }

        for (offset, op) in change.ops.iter().enumerate() {
            let id = op.id();
            if id.actor != change.actor {
                return Err(malformed("operation authored by another actor"));
            }
            if change.start_op.checked_add(offset as u64) != Some(id.counter) {
                return Err(malformed("operation ids are not contiguous"));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OpId, StateVector};
    use crate::doc::ChangeOp;

    fn change(actor: &str, seq: u64, start_op: u64, ops: usize) -> Change {
        Change {
            actor: ActorId::from(actor),
            seq,
            deps: StateVector::new(),
            start_op,
            ops: (0..ops as u64)
                .map(|i| ChangeOp::MakeList {
                    id: OpId::new(start_op + i, actor),
                    key: "content".to_string(),
                })
                .collect(),
        }
    }

    fn update(serial: u64, max_serial: u64) -> HostUpdate {
        HostUpdate {
            serial,
            max_serial,
            payload: Vec::new(),
        }
    }

    #[test]
    fn test_catch_up_then_live() {
        let mut feed = UpdateFeed::new();
        feed.begin_catch_up(2);
        assert_eq!(feed.classify(&update(1, 2)), Delivery::CatchUp);
        assert_eq!(feed.classify(&update(2, 2)), Delivery::CatchUp);
        assert_eq!(feed.classify(&update(3, 2)), Delivery::Live);
        assert_eq!(feed.last_serial(), 3);
    }

    #[test]
    fn test_first_update_sets_horizon() {
        let mut feed = UpdateFeed::new();
        assert_eq!(feed.classify(&update(1, 1)), Delivery::CatchUp);
        assert_eq!(feed.classify(&update(2, 5)), Delivery::Live);
    }

    #[test]
    fn test_live_skips_only_reflected_local_changes() {
        let local = ActorId::from("me");
        let mine = change("me", 1, 1, 0);
        let theirs = change("you", 1, 1, 0);

        assert!(should_apply(Delivery::CatchUp, &mine, &local, |_, _| true));
        assert!(!should_apply(Delivery::Live, &mine, &local, |_, _| true));
        assert!(should_apply(Delivery::Live, &mine, &local, |_, _| false));
        assert!(should_apply(Delivery::Live, &theirs, &local, |_, _| true));
    }

    #[test]
    fn test_validate_batch_limits() {
        let limits = ValidationLimits {
            max_changes_per_batch: 1,
            max_ops_per_change: 2,
        };
        let two = vec![change("a", 1, 1, 1), change("a", 2, 2, 1)];
        assert!(matches!(
            validate_batch(&two, &limits),
            Err(ValidationError::ResourceLimitExceeded { limit: 1, .. })
        ));
        let big = vec![change("a", 1, 1, 3)];
        assert!(matches!(
            validate_batch(&big, &limits),
            Err(ValidationError::ResourceLimitExceeded { limit: 2, .. })
        ));
        assert!(validate_batch(&[change("a", 1, 1, 2)], &limits).is_ok());
    }

    #[test]
    fn test_validate_batch_malformed() {
        let limits = ValidationLimits::default();
        assert!(matches!(
            validate_batch(&[change("a", 0, 1, 1)], &limits),
            Err(ValidationError::MalformedChange { .. })
        ));

        let mut forged = change("a", 1, 1, 1);
        forged.actor = ActorId::from("b");
        assert!(matches!(
            validate_batch(&[forged], &limits),
            Err(ValidationError::MalformedChange { .. })
        ));

        let mut gapped = change("a", 1, 1, 2);
        gapped.start_op = 5;
        assert!(matches!(
            validate_batch(&[gapped], &limits),
            Err(ValidationError::MalformedChange { .. })
        ));
    }

    #[test]
    fn test_validate_batch_rejects_counter_overflow() {
        let limits = ValidationLimits::default();
        let err = validate_batch(&[change("a", 1, u64::MAX, 1)], &limits).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MalformedChange {
                actor: ActorId::from("a"),
                seq: 1,
                reason: "operation ids overflow".to_string(),
            }
        );
        assert!(validate_batch(&[change("a", 1, u64::MAX - 1, 1)], &limits).is_ok());
    }

    #[test]
    fn test_host_update_json_shape() {
        let json = r#"{"serial":1,"max_serial":1,"payload":[]}"#;
        let parsed: HostUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, update(1, 1));
    }
}
