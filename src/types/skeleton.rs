//! Skeleton snapshots built from the skeleton and raw-skeleton streams.
//!
//! A [`SkeletonCollection`] is assembled in full on the callback thread, one
//! [`Skeleton`] per skeleton announced by the stream header, and only then handed to the
//! consumer. Node arrays are sized exactly to the node count the host declared.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Position, rotation and scale of a node in the configured coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self { position: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SkeletonNode {
    pub id: u32,
    pub transform: Transform,
}

/// Per-skeleton header pulled from the host before its nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SkeletonInfo {
    pub id: u32,
    pub nodes_count: u32,
    pub publish_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Skeleton {
    pub info: SkeletonInfo,
    pub nodes: Vec<SkeletonNode>,
}

impl Skeleton {
    pub fn id(&self) -> u32 {
        self.info.id
    }

    pub fn node(&self, id: u32) -> Option<&SkeletonNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// All skeletons delivered by one stream event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SkeletonCollection {
    pub skeletons: Vec<Skeleton>,
    pub publish_time: u64,
}

impl SkeletonCollection {
    pub fn len(&self) -> usize {
        self.skeletons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skeletons.is_empty()
    }

    pub fn find(&self, id: u32) -> Option<&Skeleton> {
        self.skeletons.iter().find(|skeleton| skeleton.id() == id)
    }
}
