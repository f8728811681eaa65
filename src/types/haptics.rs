//! Per-finger vibration commands for haptic gloves.

use serde::{Deserialize, Serialize};

pub const FINGERS_PER_HAND: usize = 5;

/// Vibration power per finger, thumb first, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FingerPowers([f32; FINGERS_PER_HAND]);

impl FingerPowers {
    pub const OFF: FingerPowers = FingerPowers([0.0; FINGERS_PER_HAND]);

    /// Clamps every power into `0.0..=1.0`. NaN becomes `0.0`.
    pub fn new(powers: [f32; FINGERS_PER_HAND]) -> Self {
        Self(powers.map(|power| if power.is_nan() { 0.0 } else { power.clamp(0.0, 1.0) }))
    }

    pub fn uniform(power: f32) -> Self {
        Self::new([power; FINGERS_PER_HAND])
    }

    /// Full power on the selected fingers, nothing on the rest.
    pub fn from_fingers(selected: [bool; FINGERS_PER_HAND]) -> Self {
        Self(selected.map(|on| if on { 1.0 } else { 0.0 }))
    }

    pub fn as_array(&self) -> &[f32; FINGERS_PER_HAND] {
        &self.0
    }

    pub fn is_off(&self) -> bool {
        self.0.iter().all(|power| *power == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powers_are_clamped() {
        let powers = FingerPowers::new([-1.0, 0.25, 1.5, f32::NAN, 1.0]);
        assert_eq!(powers.as_array(), &[0.0, 0.25, 1.0, 0.0, 1.0]);
        assert!(!powers.is_off());
        assert!(FingerPowers::uniform(-3.0).is_off());
    }

    #[test]
    fn selected_fingers_get_full_power() {
        let powers = FingerPowers::from_fingers([true, false, false, false, true]);
        assert_eq!(powers.as_array(), &[1.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(FingerPowers::default(), FingerPowers::OFF);
    }
}
