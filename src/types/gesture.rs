//! Gesture probabilities and gesture definitions.

use serde::{Deserialize, Serialize};

use super::landscape::Side;

/// Largest number of probabilities the host returns per chunk pull.
pub const MAX_GESTURE_CHUNK_SIZE: usize = 20;

/// One pull of gesture probabilities for an entity.
///
/// The host splits an entity's probabilities into chunks; a pull at `offset` returns the
/// next run of values plus the entity's total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct GestureChunk {
    /// Glove id, or a user id when `is_user_id` is set.
    pub id: u32,
    pub is_user_id: bool,
    pub total_gesture_count: u32,
    pub probabilities: Vec<f32>,
}

/// Complete gesture probabilities for one hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct HandGestures {
    pub glove_id: u32,
    pub side: Side,
    pub probabilities: Vec<f32>,
    pub publish_time: u64,
}

impl HandGestures {
    /// Index and probability of the most likely gesture.
    pub fn strongest(&self) -> Option<(usize, f32)> {
        self.probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct GestureDefinition {
    pub id: u32,
    pub name: String,
}
