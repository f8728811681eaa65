//! Core data types exchanged with a device host.
//!
//! Everything here is a plain value: snapshots are built whole on the host's callback
//! thread, handed across through a [`StreamBuffer`](crate::StreamBuffer) and never
//! mutated afterwards.
//!
//! ## Usage Example
//!
//! ```rust
//! use corelink::types::{GloveDevice, GloveIds, Landscape, Side};
//!
//! let landscape = Landscape {
//!     gloves: vec![
//!         GloveDevice { id: 21, side: Side::Right, is_haptic: true, battery_percentage: 80 },
//!         GloveDevice { id: 20, side: Side::Left, is_haptic: true, battery_percentage: 75 },
//!     ],
//!     ..Landscape::default()
//! };
//!
//! let ids = GloveIds::from_landscape(Some(&landscape));
//! assert_eq!((ids.left, ids.right), (20, 21));
//! ```

mod ergonomics;
mod gesture;
mod haptics;
mod host;
mod landscape;
mod rig;
mod skeleton;
mod system;
mod tracker;

pub use ergonomics::{
    ERGONOMICS_CHANNELS, ERGONOMICS_VALUE_COUNT, ERGONOMICS_VALUES_PER_HAND, ErgonomicsEntry,
    ErgonomicsSnapshot, ErgonomicsStream, HandErgonomics,
};
pub use gesture::{GestureChunk, GestureDefinition, HandGestures, MAX_GESTURE_CHUNK_SIZE};
pub use haptics::{FINGERS_PER_HAND, FingerPowers};
pub use host::{HostDescriptor, HostVersion, VersionCompatibility};
pub use landscape::{GloveDevice, GloveIds, Landscape, LandscapeSnapshot, LandscapeUser, Side};
pub use rig::{
    ChainKind, ChainSetup, NodeSetup, SkeletonDefinition, SkeletonKind, SkeletonSetup,
    TemporarySkeletonHandle,
};
pub use skeleton::{Quat, Skeleton, SkeletonCollection, SkeletonInfo, SkeletonNode, Transform, Vec3};
pub use system::{SystemMessage, SystemMessageKind};
pub use tracker::{TrackerCollection, TrackerData, TrackerKind};
