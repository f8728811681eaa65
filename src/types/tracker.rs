//! Tracker snapshots.

use serde::{Deserialize, Serialize};

use super::skeleton::{Quat, Vec3};

/// Body location a tracker is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum TrackerKind {
    #[default]
    Unknown,
    Head,
    Waist,
    LeftHand,
    RightHand,
    LeftFoot,
    RightFoot,
    LeftUpperArm,
    RightUpperArm,
    LeftUpperLeg,
    RightUpperLeg,
    Controller,
    Camera,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TrackerData {
    /// Tracker serial or host-assigned name.
    pub id: String,
    pub kind: TrackerKind,
    pub position: Vec3,
    pub rotation: Quat,
    /// Whether the tracker is a head-mounted display.
    pub is_hmd: bool,
}

/// All trackers delivered by one stream event, in host order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TrackerCollection {
    pub trackers: Vec<TrackerData>,
    pub publish_time: u64,
}

impl TrackerCollection {
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    pub fn by_kind(&self, kind: TrackerKind) -> impl Iterator<Item = &TrackerData> {
        self.trackers.iter().filter(move |tracker| tracker.kind == kind)
    }
}
