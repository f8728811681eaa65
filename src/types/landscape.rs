//! Device landscape: what the host currently knows about users and gloves.
//!
//! The landscape is the only source for the first left and first right glove ids, which
//! the gesture and ergonomics handlers use to decide which entity belongs to which hand.
//! Id `0` means "no glove on that side".

use serde::{Deserialize, Serialize};

use super::gesture::GestureDefinition;

/// Hand side tag carried by gloves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum Side {
    #[default]
    Invalid,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct GloveDevice {
    pub id: u32,
    pub side: Side,
    pub is_haptic: bool,
    pub battery_percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct LandscapeUser {
    pub id: u32,
    pub left_glove_id: u32,
    pub right_glove_id: u32,
}

/// Landscape payload as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Landscape {
    pub gloves: Vec<GloveDevice>,
    pub users: Vec<LandscapeUser>,
    /// Number of gesture definitions the host offers.
    pub gesture_count: u32,
}

/// Landscape plus the gesture definitions fetched alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct LandscapeSnapshot {
    pub landscape: Landscape,
    pub gestures: Vec<GestureDefinition>,
}

/// First left and first right glove ids, `0` when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct GloveIds {
    pub left: u32,
    pub right: u32,
}

impl GloveIds {
    pub const NONE: GloveIds = GloveIds { left: 0, right: 0 };

    /// Derives the ids from a landscape.
    ///
    /// Gloves are scanned in order; the first glove tagged left and the first glove tagged
    /// right win. No landscape yields [`GloveIds::NONE`].
    pub fn from_landscape(landscape: Option<&Landscape>) -> Self {
        let mut ids = GloveIds::NONE;
        let Some(landscape) = landscape else {
            return ids;
        };

        for glove in &landscape.gloves {
            match glove.side {
                Side::Left if ids.left == 0 => ids.left = glove.id,
                Side::Right if ids.right == 0 => ids.right = glove.id,
                _ => {}
            }
        }
        ids
    }

    pub fn for_side(&self, side: Side) -> Option<u32> {
        let id = match side {
            Side::Left => self.left,
            Side::Right => self.right,
            Side::Invalid => 0,
        };
        (id != 0).then_some(id)
    }
}
