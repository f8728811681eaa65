//! Stream ingestion on host callback threads.
//!
//! The [`StreamIngestor`] has one handler per stream kind. A handler receives the event
//! header from the host, pulls the full payload through the host's accessor calls,
//! assembles an owned snapshot and publishes it to the stream's buffer. Any failed pull
//! drops the whole event: nothing partial is ever published, and whatever was already
//! pending stays pending.
//!
//! Connection and disconnection callbacks are not buffered. They travel to the consumer
//! as [`HostEvent`]s on an unbounded channel so none is lost and their order is kept.
//!
//! Callbacks are bound to a [`Weak`] reference to the ingestor. Once the ingestor is
//! dropped, late callbacks from the host are ignored.

mod sink;

#[cfg(test)]
mod tests;

pub use sink::{ErrorSink, TracingErrorSink};

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::sdk::{
    Callback, DeviceHost, GestureStreamInfo, HostCallback, SdkStatus, SkeletonStreamInfo,
    TrackerStreamInfo,
};
use crate::stream::{StreamBuffer, StreamBuffers, StreamKind};
use crate::types::{
    ERGONOMICS_VALUE_COUNT, ErgonomicsSnapshot, ErgonomicsStream, GestureChunk, GloveIds,
    HandErgonomics, HandGestures, HostDescriptor, Landscape, LandscapeSnapshot, Side, Skeleton,
    SkeletonCollection, SystemMessage, SystemMessageKind, TemporarySkeletonHandle,
    TrackerCollection, VersionCompatibility,
};
use crate::{ClientError, Result};

/// Upper bound on buffer space reserved from a host-reported count before any pull succeeds.
const PREALLOCATION_LIMIT: usize = 64;

/// Connection events forwarded from host callbacks to the consumer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Connected {
        host: HostDescriptor,
        session_id: Option<u32>,
        versions: Option<VersionCompatibility>,
    },
    Disconnected {
        host: HostDescriptor,
        at: Instant,
    },
}

#[derive(Debug, Clone, Copy)]
enum SkeletonSource {
    Animated,
    Raw,
}

impl SkeletonSource {
    fn kind(self) -> StreamKind {
        match self {
            SkeletonSource::Animated => StreamKind::Skeleton,
            SkeletonSource::Raw => StreamKind::RawSkeleton,
        }
    }
}

pub struct StreamIngestor<H: DeviceHost> {
    host: Arc<H>,
    buffers: StreamBuffers,
    // Left id in the high half, right id in the low half.
    glove_ids: AtomicU64,
    session_id: AtomicU32,
    events: mpsc::UnboundedSender<HostEvent>,
    errors: Arc<dyn ErrorSink>,
}

impl<H: DeviceHost> StreamIngestor<H> {
    pub fn new(host: Arc<H>, events: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self {
            host,
            buffers: StreamBuffers::default(),
            glove_ids: AtomicU64::new(0),
            session_id: AtomicU32::new(0),
            events,
            errors: Arc::new(TracingErrorSink),
        }
    }

    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.errors = sink;
        self
    }

    pub fn buffers(&self) -> &StreamBuffers {
        &self.buffers
    }

    /// Glove ids the gesture and ergonomics handlers pair hands with.
    pub fn glove_ids(&self) -> GloveIds {
        let packed = self.glove_ids.load(Ordering::Acquire);
        GloveIds { left: (packed >> 32) as u32, right: packed as u32 }
    }

    pub fn set_glove_ids(&self, ids: GloveIds) {
        let packed = (u64::from(ids.left) << 32) | u64::from(ids.right);
        self.glove_ids.store(packed, Ordering::Release);
    }

    /// Drops pending snapshots and per-session identifiers.
    pub fn reset(&self) {
        self.buffers.clear();
        self.set_glove_ids(GloveIds::NONE);
        self.session_id.store(0, Ordering::Release);
    }

    /// Registers all nine host callbacks, each bound to this ingestor.
    pub fn register(self: &Arc<Self>) -> Result<()> {
        let callbacks = [
            HostCallback::Connected(self.bind(Self::on_connected)),
            HostCallback::Disconnected(self.bind(Self::on_disconnected)),
            HostCallback::Skeleton(self.bind(Self::on_skeleton_stream)),
            HostCallback::RawSkeleton(self.bind(Self::on_raw_skeleton_stream)),
            HostCallback::Tracker(self.bind(Self::on_tracker_stream)),
            HostCallback::Gesture(self.bind(Self::on_gesture_stream)),
            HostCallback::Ergonomics(self.bind(Self::on_ergonomics_stream)),
            HostCallback::Landscape(self.bind(Self::on_landscape)),
            HostCallback::SystemMessage(self.bind(Self::on_system_message)),
        ];

        for callback in callbacks {
            let name = callback.name();
            self.host.register_callback(callback).map_err(|status| {
                let step = format!("registering the {name} callback");
                ClientError::initialization_failed(step, status)
            })?;
        }
        debug!("Registered host callbacks");
        Ok(())
    }

    fn bind<T: 'static>(self: &Arc<Self>, handler: fn(&Self, &T)) -> Callback<T> {
        let ingestor: Weak<Self> = Arc::downgrade(self);
        Box::new(move |payload: &T| {
            if let Some(ingestor) = ingestor.upgrade() {
                handler(&ingestor, payload);
            }
        })
    }

    pub fn on_connected(&self, host: &HostDescriptor) {
        let versions = match self.host.versions() {
            Ok(versions) => {
                if !versions.compatible {
                    warn!(
                        sdk = %versions.sdk_version,
                        host_version = %versions.host_version,
                        "Host and SDK versions are not compatible"
                    );
                }
                Some(versions)
            }
            Err(status) => {
                warn!(%status, "Failed to read host versions");
                None
            }
        };

        let session_id = match self.host.session_id() {
            Ok(0) => {
                warn!("Host assigned no session id");
                None
            }
            Ok(id) => Some(id),
            Err(status) => {
                warn!(%status, "Failed to read session id");
                None
            }
        };
        if let Some(id) = session_id {
            self.session_id.store(id, Ordering::Release);
        }

        info!(host = %host.name, ?session_id, "Host connected");
        self.forward(HostEvent::Connected { host: host.clone(), session_id, versions });
    }

    pub fn on_disconnected(&self, host: &HostDescriptor) {
        let at = Instant::now();
        info!(host = %host.name, "Host disconnected");
        self.forward(HostEvent::Disconnected { host: host.clone(), at });
    }

    pub fn on_skeleton_stream(&self, info: &SkeletonStreamInfo) {
        let snapshot = self.pull_skeletons(info, SkeletonSource::Animated);
        self.deliver(StreamKind::Skeleton, &self.buffers.skeletons, snapshot);
    }

    pub fn on_raw_skeleton_stream(&self, info: &SkeletonStreamInfo) {
        let snapshot = self.pull_skeletons(info, SkeletonSource::Raw);
        self.deliver(StreamKind::RawSkeleton, &self.buffers.raw_skeletons, snapshot);
    }

    pub fn on_tracker_stream(&self, info: &TrackerStreamInfo) {
        let snapshot = self.pull_trackers(info);
        self.deliver(StreamKind::Tracker, &self.buffers.trackers, snapshot);
    }

    pub fn on_gesture_stream(&self, info: &GestureStreamInfo) {
        match self.pull_gestures(info) {
            Ok(hands) => {
                for hand in hands {
                    let buffer = match hand.side {
                        Side::Left => &self.buffers.left_gestures,
                        _ => &self.buffers.right_gestures,
                    };
                    buffer.publish(hand);
                }
            }
            Err(error) => self.errors.report(StreamKind::Gesture, &error),
        }
    }

    pub fn on_ergonomics_stream(&self, stream: &ErgonomicsStream) {
        let snapshot = self.pair_ergonomics(stream);
        self.deliver(StreamKind::Ergonomics, &self.buffers.ergonomics, snapshot);
    }

    pub fn on_landscape(&self, landscape: &Landscape) {
        let snapshot = self.pull_landscape(landscape);
        self.deliver(StreamKind::Landscape, &self.buffers.landscape, snapshot);
    }

    pub fn on_system_message(&self, message: &SystemMessage) {
        if message.kind == SystemMessageKind::TemporarySkeletonModified {
            let handle = TemporarySkeletonHandle {
                index: message.info,
                session_id: self.session_id.load(Ordering::Acquire),
            };
            debug!(index = handle.index, "Temporary skeleton modified by host");
            self.buffers.modified_temporary_skeleton.publish(handle);
            return;
        }
        self.buffers.system_messages.publish(message.clone());
    }

    fn deliver<T>(&self, kind: StreamKind, buffer: &StreamBuffer<T>, snapshot: Result<T>) {
        match snapshot {
            Ok(value) => {
                if buffer.publish(value) {
                    trace!(%kind, "Replaced unconsumed snapshot");
                }
            }
            Err(error) => self.errors.report(kind, &error),
        }
    }

    fn forward(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            debug!("Consumer loop gone, host event discarded");
        }
    }

    fn pull_skeletons(
        &self,
        info: &SkeletonStreamInfo,
        source: SkeletonSource,
    ) -> Result<SkeletonCollection> {
        let kind = source.kind();
        let mut skeletons =
            Vec::with_capacity((info.skeletons_count as usize).min(PREALLOCATION_LIMIT));

        for index in 0..info.skeletons_count {
            let meta = match source {
                SkeletonSource::Animated => self.host.skeleton_info(index),
                SkeletonSource::Raw => self.host.raw_skeleton_info(index),
            }
            .map_err(|status| {
                ClientError::stream_pull_failed(kind, format!("header of skeleton {index}"), status)
            })?;

            let nodes = match source {
                SkeletonSource::Animated => self.host.skeleton_nodes(index, meta.nodes_count),
                SkeletonSource::Raw => self.host.raw_skeleton_nodes(index, meta.nodes_count),
            }
            .map_err(|status| {
                let context = format!("nodes of skeleton {}", meta.id);
                ClientError::stream_pull_failed(kind, context, status)
            })?;

            if nodes.len() != meta.nodes_count as usize {
                return Err(ClientError::stream_pull_failed(
                    kind,
                    format!(
                        "skeleton {} returned {} of {} nodes",
                        meta.id,
                        nodes.len(),
                        meta.nodes_count
                    ),
                    SdkStatus::ArgumentSizeMismatch,
                ));
            }
            skeletons.push(Skeleton { info: meta, nodes });
        }

        debug!(%kind, count = skeletons.len(), "Skeletons ingested");
        Ok(SkeletonCollection { skeletons, publish_time: info.publish_time })
    }

    fn pull_trackers(&self, info: &TrackerStreamInfo) -> Result<TrackerCollection> {
        let trackers = (0..info.trackers_count)
            .map(|index| {
                self.host.tracker_data(index).map_err(|status| {
                    ClientError::stream_pull_failed(
                        StreamKind::Tracker,
                        format!("tracker {index}"),
                        status,
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TrackerCollection { trackers, publish_time: info.publish_time })
    }

    /// Pulls complete probabilities for the first left and first right glove.
    fn pull_gestures(&self, info: &GestureStreamInfo) -> Result<Vec<HandGestures>> {
        let ids = self.glove_ids();
        let mut hands: Vec<HandGestures> = Vec::with_capacity(2);

        for index in 0..info.entity_count {
            let first = self.pull_gesture_chunk(index, 0)?;
            if first.is_user_id {
                continue;
            }

            let side = if ids.for_side(Side::Left) == Some(first.id) {
                Side::Left
            } else if ids.for_side(Side::Right) == Some(first.id) {
                Side::Right
            } else {
                continue;
            };
            if hands.iter().any(|hand| hand.side == side) {
                continue;
            }

            let glove_id = first.id;
            let probabilities = self.collect_gesture_chunks(index, first)?;
            hands.push(HandGestures {
                glove_id,
                side,
                probabilities,
                publish_time: info.publish_time,
            });
        }
        Ok(hands)
    }

    /// Keeps pulling at the cumulative offset until the entity's total is reached.
    fn collect_gesture_chunks(&self, index: u32, first: GestureChunk) -> Result<Vec<f32>> {
        let total = first.total_gesture_count as usize;
        let mut probabilities = first.probabilities;
        probabilities.reserve(total.saturating_sub(probabilities.len()).min(PREALLOCATION_LIMIT));

        while probabilities.len() < total {
            let chunk = self.pull_gesture_chunk(index, probabilities.len() as u32)?;
            if chunk.probabilities.is_empty() {
                let received = probabilities.len();
                return Err(ClientError::stream_pull_failed(
                    StreamKind::Gesture,
                    format!("entity {index} stopped at {received} of {total} probabilities"),
                    SdkStatus::ArgumentSizeMismatch,
                ));
            }
            probabilities.extend(chunk.probabilities);
        }

        probabilities.truncate(total);
        Ok(probabilities)
    }

    fn pull_gesture_chunk(&self, index: u32, offset: u32) -> Result<GestureChunk> {
        self.host.gesture_chunk(index, offset).map_err(|status| {
            ClientError::stream_pull_failed(
                StreamKind::Gesture,
                format!("entity {index} at offset {offset}"),
                status,
            )
        })
    }

    /// Maps the first left and first right glove entries to their hands.
    ///
    /// A hand absent from this event is left `None`; the consumer carries the previous
    /// values forward.
    fn pair_ergonomics(&self, stream: &ErgonomicsStream) -> Result<ErgonomicsSnapshot> {
        let ids = self.glove_ids();
        let mut snapshot =
            ErgonomicsSnapshot { left: None, right: None, publish_time: stream.publish_time };

        for entry in stream.entries.iter().filter(|entry| !entry.is_user_id) {
            let slot = if ids.for_side(Side::Left) == Some(entry.id) {
                &mut snapshot.left
            } else if ids.for_side(Side::Right) == Some(entry.id) {
                &mut snapshot.right
            } else {
                continue;
            };

            if entry.values.len() != ERGONOMICS_VALUE_COUNT {
                return Err(ClientError::stream_pull_failed(
                    StreamKind::Ergonomics,
                    format!("glove {} carried {} values", entry.id, entry.values.len()),
                    SdkStatus::ArgumentSizeMismatch,
                ));
            }
            if slot.is_none() {
                *slot = Some(HandErgonomics { glove_id: entry.id, values: entry.values.clone() });
            }
        }
        Ok(snapshot)
    }

    /// Copies the landscape and fetches the gesture definitions sized to it.
    fn pull_landscape(&self, landscape: &Landscape) -> Result<LandscapeSnapshot> {
        let expected = landscape.gesture_count;
        let gestures = if expected == 0 {
            Vec::new()
        } else {
            self.host.gesture_landscape(expected).map_err(|status| {
                ClientError::stream_pull_failed(
                    StreamKind::Landscape,
                    format!("{expected} gesture definitions"),
                    status,
                )
            })?
        };

        if gestures.len() != expected as usize {
            return Err(ClientError::stream_pull_failed(
                StreamKind::Landscape,
                format!("expected {expected} gesture definitions, got {}", gestures.len()),
                SdkStatus::ArgumentSizeMismatch,
            ));
        }

        debug!(gloves = landscape.gloves.len(), gestures = gestures.len(), "Landscape ingested");
        Ok(LandscapeSnapshot { landscape: landscape.clone(), gestures })
    }
}
