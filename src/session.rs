//! Consumer-side session state.
//!
//! [`SessionState`] is owned by the consumer loop and mutated only there. Once per tick
//! [`SessionState::refresh`] takes every pending snapshot out of the stream buffers; a
//! snapshot taken replaces the previously published one for its kind.

use bitflags::bitflags;
use tracing::trace;

use crate::stream::{StreamBuffers, StreamKind};
use crate::types::{
    ErgonomicsSnapshot, GloveIds, HandGestures, HostDescriptor, LandscapeSnapshot,
    SkeletonCollection, SystemMessage, TemporarySkeletonHandle, TrackerCollection,
    VersionCompatibility,
};

bitflags! {
    /// Stream kinds that received a new snapshot during a tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TickUpdates: u16 {
        const SKELETON = 1 << 0;
        const RAW_SKELETON = 1 << 1;
        const TRACKER = 1 << 2;
        const GESTURE = 1 << 3;
        const ERGONOMICS = 1 << 4;
        const LANDSCAPE = 1 << 5;
        const SYSTEM_MESSAGE = 1 << 6;
    }
}

impl From<StreamKind> for TickUpdates {
    fn from(kind: StreamKind) -> Self {
        match kind {
            StreamKind::Skeleton => TickUpdates::SKELETON,
            StreamKind::RawSkeleton => TickUpdates::RAW_SKELETON,
            StreamKind::Tracker => TickUpdates::TRACKER,
            StreamKind::Gesture => TickUpdates::GESTURE,
            StreamKind::Ergonomics => TickUpdates::ERGONOMICS,
            StreamKind::Landscape => TickUpdates::LANDSCAPE,
            StreamKind::SystemMessage => TickUpdates::SYSTEM_MESSAGE,
        }
    }
}

impl TickUpdates {
    pub fn has(&self, kind: StreamKind) -> bool {
        self.contains(kind.into())
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    skeletons: Option<SkeletonCollection>,
    raw_skeletons: Option<SkeletonCollection>,
    trackers: Option<TrackerCollection>,
    left_gestures: Option<HandGestures>,
    right_gestures: Option<HandGestures>,
    ergonomics: Option<ErgonomicsSnapshot>,
    landscape: Option<LandscapeSnapshot>,
    system_message: Option<SystemMessage>,
    modified_temporary_skeleton: Option<TemporarySkeletonHandle>,
    host: Option<HostDescriptor>,
    versions: Option<VersionCompatibility>,
    session_id: Option<u32>,
    glove_ids: GloveIds,
}

fn replace_from<T>(slot: &mut Option<T>, incoming: Option<T>) -> bool {
    match incoming {
        Some(value) => {
            *slot = Some(value);
            true
        }
        None => false,
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every pending snapshot and recomputes the derived glove ids.
    pub fn refresh(&mut self, buffers: &StreamBuffers) -> TickUpdates {
        let mut updates = TickUpdates::empty();

        if replace_from(&mut self.skeletons, buffers.skeletons.take()) {
            updates |= TickUpdates::SKELETON;
        }
        if replace_from(&mut self.raw_skeletons, buffers.raw_skeletons.take()) {
            updates |= TickUpdates::RAW_SKELETON;
        }
        if replace_from(&mut self.trackers, buffers.trackers.take()) {
            updates |= TickUpdates::TRACKER;
        }
        let left = replace_from(&mut self.left_gestures, buffers.left_gestures.take());
        let right = replace_from(&mut self.right_gestures, buffers.right_gestures.take());
        if left || right {
            updates |= TickUpdates::GESTURE;
        }
        if let Some(snapshot) = buffers.ergonomics.take() {
            self.ergonomics = Some(snapshot.carry_forward(self.ergonomics.as_ref()));
            updates |= TickUpdates::ERGONOMICS;
        }
        if replace_from(&mut self.landscape, buffers.landscape.take()) {
            updates |= TickUpdates::LANDSCAPE;
        }
        if replace_from(&mut self.system_message, buffers.system_messages.take()) {
            updates |= TickUpdates::SYSTEM_MESSAGE;
        }
        if let Some(handle) = buffers.modified_temporary_skeleton.take() {
            self.modified_temporary_skeleton = Some(handle);
        }

        self.recompute_glove_ids();
        if !updates.is_empty() {
            trace!(?updates, "Session refreshed");
        }
        updates
    }

    /// Re-derives the first left and right glove ids from the published landscape.
    pub fn recompute_glove_ids(&mut self) -> GloveIds {
        self.glove_ids =
            GloveIds::from_landscape(self.landscape.as_ref().map(|snapshot| &snapshot.landscape));
        self.glove_ids
    }

    pub fn record_connection(
        &mut self,
        host: HostDescriptor,
        session_id: Option<u32>,
        versions: Option<VersionCompatibility>,
    ) {
        self.host = Some(host);
        if session_id.is_some() {
            self.session_id = session_id;
        }
        if versions.is_some() {
            self.versions = versions;
        }
    }

    pub fn record_host(&mut self, host: HostDescriptor) {
        self.host = Some(host);
    }

    /// Removes and returns the handle of a temporary skeleton the host reported as modified.
    pub fn take_modified_temporary_skeleton(&mut self) -> Option<TemporarySkeletonHandle> {
        self.modified_temporary_skeleton.take()
    }

    pub fn skeletons(&self) -> Option<&SkeletonCollection> {
        self.skeletons.as_ref()
    }

    pub fn raw_skeletons(&self) -> Option<&SkeletonCollection> {
        self.raw_skeletons.as_ref()
    }

    pub fn trackers(&self) -> Option<&TrackerCollection> {
        self.trackers.as_ref()
    }

    pub fn left_gestures(&self) -> Option<&HandGestures> {
        self.left_gestures.as_ref()
    }

    pub fn right_gestures(&self) -> Option<&HandGestures> {
        self.right_gestures.as_ref()
    }

    pub fn ergonomics(&self) -> Option<&ErgonomicsSnapshot> {
        self.ergonomics.as_ref()
    }

    pub fn landscape(&self) -> Option<&LandscapeSnapshot> {
        self.landscape.as_ref()
    }

    pub fn system_message(&self) -> Option<&SystemMessage> {
        self.system_message.as_ref()
    }

    pub fn host(&self) -> Option<&HostDescriptor> {
        self.host.as_ref()
    }

    pub fn versions(&self) -> Option<&VersionCompatibility> {
        self.versions.as_ref()
    }

    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    pub fn glove_ids(&self) -> GloveIds {
        self.glove_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        GloveDevice, Landscape, Side, Skeleton, SkeletonInfo, SystemMessageKind,
    };

    fn landscape(gloves: &[(u32, Side)]) -> LandscapeSnapshot {
        LandscapeSnapshot {
            landscape: Landscape {
                gloves: gloves
                    .iter()
                    .map(|&(id, side)| GloveDevice {
                        id,
                        side,
                        is_haptic: false,
                        battery_percentage: 50,
                    })
                    .collect(),
                ..Landscape::default()
            },
            gestures: Vec::new(),
        }
    }

    fn skeletons(ids: &[u32]) -> SkeletonCollection {
        SkeletonCollection {
            skeletons: ids
                .iter()
                .map(|&id| Skeleton {
                    info: SkeletonInfo { id, nodes_count: 0, publish_time: 0 },
                    nodes: Vec::new(),
                })
                .collect(),
            publish_time: 0,
        }
    }

    #[test]
    fn refresh_moves_pending_snapshots_and_reports_updates() {
        let buffers = StreamBuffers::default();
        let mut session = SessionState::new();

        buffers.skeletons.publish(skeletons(&[1]));
        buffers.skeletons.publish(skeletons(&[2, 3]));
        buffers.system_messages.publish(SystemMessage {
            kind: SystemMessageKind::Unknown,
            text: "hello".into(),
            info: 0,
        });

        let updates = session.refresh(&buffers);
        assert_eq!(updates, TickUpdates::SKELETON | TickUpdates::SYSTEM_MESSAGE);
        assert!(updates.has(StreamKind::Skeleton));
        assert!(!updates.has(StreamKind::Tracker));
        assert_eq!(session.skeletons().map(|s| s.len()), Some(2));

        let next = session.refresh(&buffers);
        assert!(next.is_empty());
        assert_eq!(session.skeletons().map(|s| s.len()), Some(2));
    }

    #[test]
    fn glove_ids_follow_latest_landscape() {
        let buffers = StreamBuffers::default();
        let mut session = SessionState::new();

        session.refresh(&buffers);
        assert_eq!(session.glove_ids(), GloveIds::NONE);

        buffers.landscape.publish(landscape(&[(8, Side::Right), (4, Side::Left)]));
        let updates = session.refresh(&buffers);
        assert!(updates.contains(TickUpdates::LANDSCAPE));
        assert_eq!(session.glove_ids(), GloveIds { left: 4, right: 8 });

        buffers.landscape.publish(landscape(&[(9, Side::Left)]));
        session.refresh(&buffers);
        assert_eq!(session.glove_ids(), GloveIds { left: 9, right: 0 });
    }

    #[test]
    fn glove_id_recomputation_is_idempotent() {
        let buffers = StreamBuffers::default();
        let mut session = SessionState::new();
        buffers.landscape.publish(landscape(&[(2, Side::Left), (3, Side::Right), (5, Side::Left)]));
        session.refresh(&buffers);

        let first = session.recompute_glove_ids();
        let second = session.recompute_glove_ids();
        assert_eq!(first, second);
        assert_eq!(first, GloveIds { left: 2, right: 3 });
    }

    #[test]
    fn connection_record_keeps_known_session_id() {
        let mut session = SessionState::new();
        let host = HostDescriptor::new("core", "127.0.0.1", Default::default());

        session.record_connection(host.clone(), Some(42), None);
        session.record_connection(host.clone(), None, None);
        assert_eq!(session.session_id(), Some(42));
        assert_eq!(session.host(), Some(&host));
    }

    #[test]
    fn modified_temporary_skeleton_is_taken_once() {
        let buffers = StreamBuffers::default();
        let mut session = SessionState::new();
        buffers
            .modified_temporary_skeleton
            .publish(TemporarySkeletonHandle { index: 2, session_id: 42 });

        session.refresh(&buffers);
        assert_eq!(
            session.take_modified_temporary_skeleton(),
            Some(TemporarySkeletonHandle { index: 2, session_id: 42 })
        );
        assert_eq!(session.take_modified_temporary_skeleton(), None);
    }
}
