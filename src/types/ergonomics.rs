//! Ergonomics (finger joint angle) data.
//!
//! Each stream entry carries the full value array for both hands; the left hand reads
//! the first [`ERGONOMICS_VALUES_PER_HAND`] channels and the right hand the rest.

use serde::{Deserialize, Serialize};

pub const ERGONOMICS_VALUE_COUNT: usize = 40;
pub const ERGONOMICS_VALUES_PER_HAND: usize = ERGONOMICS_VALUE_COUNT / 2;

/// Channel names in host order, left hand first.
pub const ERGONOMICS_CHANNELS: [&str; ERGONOMICS_VALUE_COUNT] = [
    "LeftFingerThumbMCPSpread",
    "LeftFingerThumbMCPStretch",
    "LeftFingerThumbPIPStretch",
    "LeftFingerThumbDIPStretch",
    "LeftFingerIndexMCPSpread",
    "LeftFingerIndexMCPStretch",
    "LeftFingerIndexPIPStretch",
    "LeftFingerIndexDIPStretch",
    "LeftFingerMiddleMCPSpread",
    "LeftFingerMiddleMCPStretch",
    "LeftFingerMiddlePIPStretch",
    "LeftFingerMiddleDIPStretch",
    "LeftFingerRingMCPSpread",
    "LeftFingerRingMCPStretch",
    "LeftFingerRingPIPStretch",
    "LeftFingerRingDIPStretch",
    "LeftFingerPinkyMCPSpread",
    "LeftFingerPinkyMCPStretch",
    "LeftFingerPinkyPIPStretch",
    "LeftFingerPinkyDIPStretch",
    "RightFingerThumbMCPSpread",
    "RightFingerThumbMCPStretch",
    "RightFingerThumbPIPStretch",
    "RightFingerThumbDIPStretch",
    "RightFingerIndexMCPSpread",
    "RightFingerIndexMCPStretch",
    "RightFingerIndexPIPStretch",
    "RightFingerIndexDIPStretch",
    "RightFingerMiddleMCPSpread",
    "RightFingerMiddleMCPStretch",
    "RightFingerMiddlePIPStretch",
    "RightFingerMiddleDIPStretch",
    "RightFingerRingMCPSpread",
    "RightFingerRingMCPStretch",
    "RightFingerRingPIPStretch",
    "RightFingerRingDIPStretch",
    "RightFingerPinkyMCPSpread",
    "RightFingerPinkyMCPStretch",
    "RightFingerPinkyPIPStretch",
    "RightFingerPinkyDIPStretch",
];

/// One entity in an ergonomics stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ErgonomicsEntry {
    pub id: u32,
    pub is_user_id: bool,
    pub values: Vec<f32>,
}

/// Ergonomics event payload as delivered inline by the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ErgonomicsStream {
    pub entries: Vec<ErgonomicsEntry>,
    pub publish_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct HandErgonomics {
    pub glove_id: u32,
    pub values: Vec<f32>,
}

/// Paired left/right ergonomics.
///
/// A hand the latest event did not mention keeps its previous values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ErgonomicsSnapshot {
    pub left: Option<HandErgonomics>,
    pub right: Option<HandErgonomics>,
    pub publish_time: u64,
}

impl ErgonomicsSnapshot {
    /// Fills hands missing from this snapshot with the values in `previous`.
    pub fn carry_forward(mut self, previous: Option<&ErgonomicsSnapshot>) -> Self {
        if let Some(previous) = previous {
            if self.left.is_none() {
                self.left = previous.left.clone();
            }
            if self.right.is_none() {
                self.right = previous.right.clone();
            }
        }
        self
    }

    /// Left-hand channels of the left glove's entry.
    pub fn left_values(&self) -> Option<&[f32]> {
        self.left.as_ref().and_then(|hand| hand.values.get(..ERGONOMICS_VALUES_PER_HAND))
    }

    /// Right-hand channels of the right glove's entry.
    pub fn right_values(&self) -> Option<&[f32]> {
        self.right
            .as_ref()
            .and_then(|hand| hand.values.get(ERGONOMICS_VALUES_PER_HAND..ERGONOMICS_VALUE_COUNT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(glove_id: u32, value: f32) -> HandErgonomics {
        HandErgonomics { glove_id, values: vec![value; ERGONOMICS_VALUE_COUNT] }
    }

    #[test]
    fn missing_hand_is_carried_forward() {
        let previous = ErgonomicsSnapshot {
            left: Some(hand(1, 0.5)),
            right: Some(hand(2, 0.25)),
            publish_time: 10,
        };
        let update =
            ErgonomicsSnapshot { left: Some(hand(1, 0.75)), right: None, publish_time: 11 };

        let merged = update.carry_forward(Some(&previous));
        assert_eq!(merged.left, Some(hand(1, 0.75)));
        assert_eq!(merged.right, Some(hand(2, 0.25)));
        assert_eq!(merged.publish_time, 11);
    }

    #[test]
    fn hand_values_split_by_channel_half() {
        let mut left = hand(1, 0.0);
        left.values[0] = 1.0;
        left.values[ERGONOMICS_VALUES_PER_HAND] = 2.0;
        let snapshot =
            ErgonomicsSnapshot { left: Some(left.clone()), right: Some(left), publish_time: 0 };

        assert_eq!(snapshot.left_values().map(|v| (v.len(), v[0])), Some((20, 1.0)));
        assert_eq!(snapshot.right_values().map(|v| (v.len(), v[0])), Some((20, 2.0)));
        assert_eq!(ERGONOMICS_CHANNELS[ERGONOMICS_VALUES_PER_HAND], "RightFingerThumbMCPSpread");
    }
}
