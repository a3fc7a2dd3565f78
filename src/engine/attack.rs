use serde::{Deserialize, Serialize};

use super::monster::MonsterId;

/// An attack command: every source launches its own pillow at the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRequest {
    pub source_ids: Vec<MonsterId>,
    pub destination_id: MonsterId,
}

impl AttackRequest {
    pub fn new(source_ids: Vec<MonsterId>, destination_id: MonsterId) -> Self {
        AttackRequest {
            source_ids,
            destination_id,
        }
    }

    pub fn single(source_id: MonsterId, destination_id: MonsterId) -> Self {
        Self::new(vec![source_id], destination_id)
    }
}
