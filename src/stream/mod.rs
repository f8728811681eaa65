//! Stream hand-off between host callbacks and the consumer loop.
//!
//! Each stream kind owns one [`StreamBuffer`]. Callbacks publish complete snapshots; the
//! consumer takes them once per tick.

mod buffer;

pub use buffer::StreamBuffer;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{
    ErgonomicsSnapshot, HandGestures, LandscapeSnapshot, SkeletonCollection, SystemMessage,
    TemporarySkeletonHandle, TrackerCollection,
};

/// Stream categories delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum StreamKind {
    Skeleton,
    RawSkeleton,
    Tracker,
    Gesture,
    Ergonomics,
    Landscape,
    SystemMessage,
}

impl StreamKind {
    pub const ALL: [StreamKind; 7] = [
        StreamKind::Skeleton,
        StreamKind::RawSkeleton,
        StreamKind::Tracker,
        StreamKind::Gesture,
        StreamKind::Ergonomics,
        StreamKind::Landscape,
        StreamKind::SystemMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Skeleton => "skeleton",
            StreamKind::RawSkeleton => "raw skeleton",
            StreamKind::Tracker => "tracker",
            StreamKind::Gesture => "gesture",
            StreamKind::Ergonomics => "ergonomics",
            StreamKind::Landscape => "landscape",
            StreamKind::SystemMessage => "system message",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One buffer per stream kind, plus the modified-temporary-skeleton notification.
#[derive(Debug, Default)]
pub struct StreamBuffers {
    pub skeletons: StreamBuffer<SkeletonCollection>,
    pub raw_skeletons: StreamBuffer<SkeletonCollection>,
    pub trackers: StreamBuffer<TrackerCollection>,
    pub left_gestures: StreamBuffer<HandGestures>,
    pub right_gestures: StreamBuffer<HandGestures>,
    pub ergonomics: StreamBuffer<ErgonomicsSnapshot>,
    pub landscape: StreamBuffer<LandscapeSnapshot>,
    pub system_messages: StreamBuffer<SystemMessage>,
    /// Temporary skeleton the host last reported as modified.
    pub modified_temporary_skeleton: StreamBuffer<TemporarySkeletonHandle>,
}

impl StreamBuffers {
    /// Drops every pending value.
    pub fn clear(&self) {
        self.skeletons.clear();
        self.raw_skeletons.clear();
        self.trackers.clear();
        self.left_gestures.clear();
        self.right_gestures.clear();
        self.ergonomics.clear();
        self.landscape.clear();
        self.system_messages.clear();
        self.modified_temporary_skeleton.clear();
    }
}
