//! Skeleton rig definitions uploaded to the host.

use serde::{Deserialize, Serialize};

use super::landscape::Side;
use super::skeleton::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum SkeletonKind {
    #[default]
    Hand,
    Body,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SkeletonSetup {
    pub name: String,
    pub kind: SkeletonKind,
    /// Retarget onto the target user's proportions.
    pub scale_to_target: bool,
    pub target_user_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct NodeSetup {
    pub id: u32,
    /// Equal to `id` for the root node.
    pub parent_id: u32,
    pub name: String,
    pub transform: Transform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ChainKind {
    Arm,
    Leg,
    Neck,
    Spine,
    FingerThumb,
    FingerIndex,
    FingerMiddle,
    FingerRing,
    FingerPinky,
    Pelvis,
    Head,
    Shoulder,
    Hand,
    Foot,
    Toe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ChainSetup {
    pub id: u32,
    pub kind: ChainKind,
    pub side: Side,
    pub node_ids: Vec<u32>,
}

/// A complete rig: setup, nodes and chains, uploaded in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SkeletonDefinition {
    pub setup: SkeletonSetup,
    pub nodes: Vec<NodeSetup>,
    pub chains: Vec<ChainSetup>,
}

/// Identifies a temporary skeleton held by the host for external tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TemporarySkeletonHandle {
    pub index: u32,
    pub session_id: u32,
}
