//! The device-host SDK seam.
//!
//! [`DeviceHost`] is the boundary between this crate and the vendor SDK that talks to the
//! device host. Implementations are synchronous and may block; the client moves blocking
//! calls (discovery, connect) off the async runtime.
//!
//! Stream events arrive through callbacks registered with
//! [`DeviceHost::register_callback`]. The host invokes them on its own threads, possibly
//! concurrently with each other, and expects them to return quickly: a callback may pull
//! the data belonging to the event it is handling, then it must hand off and return.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::types::{
    ChainSetup, ErgonomicsStream, FingerPowers, GestureChunk, GestureDefinition, GloveIds,
    HostDescriptor, Landscape, NodeSetup, Side, SkeletonInfo, SkeletonNode, SkeletonSetup,
    SystemMessage, TemporarySkeletonHandle, TrackerData, VersionCompatibility,
};

/// Non-success status codes returned by the device-host SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkStatus {
    Error,
    InvalidArgument,
    ArgumentSizeMismatch,
    /// The host is reachable but declined the session.
    NotConnected,
    NotAvailable,
    InternalError,
    Timeout,
    Unknown(i32),
}

impl fmt::Display for SdkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdkStatus::Error => write!(f, "sdk error"),
            SdkStatus::InvalidArgument => write!(f, "invalid argument"),
            SdkStatus::ArgumentSizeMismatch => write!(f, "argument size mismatch"),
            SdkStatus::NotConnected => write!(f, "not connected"),
            SdkStatus::NotAvailable => write!(f, "not available"),
            SdkStatus::InternalError => write!(f, "internal error"),
            SdkStatus::Timeout => write!(f, "timed out"),
            SdkStatus::Unknown(code) => write!(f, "unknown status code {code}"),
        }
    }
}

impl std::error::Error for SdkStatus {}

/// Result of a single SDK call.
pub type SdkResult<T> = std::result::Result<T, SdkStatus>;

/// Session type announced to the host at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum SessionKind {
    #[default]
    CoreSdk,
    UnityPlugin,
    UnrealPlugin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum Handedness {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum AxisPolarity {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum AxisView {
    XFromViewer,
    XToViewer,
    YFromViewer,
    YToViewer,
    ZFromViewer,
    ZToViewer,
}

/// Coordinate system every transform from the host is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct CoordinateSystem {
    pub handedness: Handedness,
    pub up_axis: AxisPolarity,
    pub view_axis: AxisView,
    /// Metres per unit.
    pub unit_scale: f32,
    /// World space when true, local (parent-relative) node space otherwise.
    pub world_space: bool,
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self {
            handedness: Handedness::Right,
            up_axis: AxisPolarity::PositiveZ,
            view_axis: AxisView::XFromViewer,
            unit_scale: 1.0,
            world_space: true,
        }
    }
}

/// Header of a skeleton or raw-skeleton stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkeletonStreamInfo {
    pub skeletons_count: u32,
    pub publish_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerStreamInfo {
    pub trackers_count: u32,
    pub publish_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureStreamInfo {
    /// Number of entities (gloves or users) with gesture data in this event.
    pub entity_count: u32,
    pub publish_time: u64,
}

/// A boxed callback the host may invoke from any of its threads.
pub type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// One registrable host callback.
pub enum HostCallback {
    Connected(Callback<HostDescriptor>),
    Disconnected(Callback<HostDescriptor>),
    Skeleton(Callback<SkeletonStreamInfo>),
    RawSkeleton(Callback<SkeletonStreamInfo>),
    Tracker(Callback<TrackerStreamInfo>),
    Gesture(Callback<GestureStreamInfo>),
    Ergonomics(Callback<ErgonomicsStream>),
    Landscape(Callback<Landscape>),
    SystemMessage(Callback<SystemMessage>),
}

impl HostCallback {
    pub fn name(&self) -> &'static str {
        match self {
            HostCallback::Connected(_) => "connected",
            HostCallback::Disconnected(_) => "disconnected",
            HostCallback::Skeleton(_) => "skeleton stream",
            HostCallback::RawSkeleton(_) => "raw skeleton stream",
            HostCallback::Tracker(_) => "tracker stream",
            HostCallback::Gesture(_) => "gesture stream",
            HostCallback::Ergonomics(_) => "ergonomics stream",
            HostCallback::Landscape(_) => "landscape stream",
            HostCallback::SystemMessage(_) => "system message",
        }
    }
}

impl fmt::Debug for HostCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostCallback").field(&self.name()).finish()
    }
}

/// Operations the client needs from a device-host SDK.
///
/// Pull operations (`skeleton_info`, `tracker_data`, `gesture_chunk`, ...) are only
/// meaningful from inside the stream callback they belong to; the host keeps the
/// underlying event data alive for the duration of that callback.
pub trait DeviceHost: Send + Sync + 'static {
    fn initialize(&self, kind: SessionKind) -> SdkResult<()>;

    /// Tears the SDK down. Registered callbacks are dropped.
    fn shutdown(&self) -> SdkResult<()>;

    fn set_coordinate_system(&self, system: &CoordinateSystem) -> SdkResult<()>;

    /// Registers a callback, replacing any earlier callback of the same kind.
    fn register_callback(&self, callback: HostCallback) -> SdkResult<()>;

    /// Blocks for up to `timeout` and returns how many hosts answered.
    fn look_for_hosts(&self, timeout: Duration, local_only: bool) -> SdkResult<u32>;

    /// Returns the hosts found by the last lookup. `count` is the value it returned.
    fn available_hosts(&self, count: u32) -> SdkResult<Vec<HostDescriptor>>;

    /// Blocks until the host accepts or declines. A reachable host that declines reports
    /// [`SdkStatus::NotConnected`].
    fn connect_to_host(&self, host: &HostDescriptor) -> SdkResult<()>;

    /// Connects straight to the SDK's preconfigured address without discovery.
    fn connect_to_preset_address(&self) -> SdkResult<()>;

    fn session_id(&self) -> SdkResult<u32>;

    fn versions(&self) -> SdkResult<VersionCompatibility>;

    fn skeleton_info(&self, index: u32) -> SdkResult<SkeletonInfo>;

    fn skeleton_nodes(&self, index: u32, count: u32) -> SdkResult<Vec<SkeletonNode>>;

    fn raw_skeleton_info(&self, index: u32) -> SdkResult<SkeletonInfo>;

    fn raw_skeleton_nodes(&self, index: u32, count: u32) -> SdkResult<Vec<SkeletonNode>>;

    fn tracker_data(&self, index: u32) -> SdkResult<TrackerData>;

    /// Pulls the next run of probabilities for entity `index`, starting at `offset`.
    fn gesture_chunk(&self, index: u32, offset: u32) -> SdkResult<GestureChunk>;

    fn gesture_landscape(&self, count: u32) -> SdkResult<Vec<GestureDefinition>>;

    /// Starts a skeleton setup and returns its setup index.
    fn create_skeleton_setup(&self, setup: &SkeletonSetup) -> SdkResult<u32>;

    fn add_node(&self, setup_index: u32, node: &NodeSetup) -> SdkResult<()>;

    fn add_chain(&self, setup_index: u32, chain: &ChainSetup) -> SdkResult<()>;

    /// Loads a completed setup and returns the host's skeleton id.
    fn load_skeleton(&self, setup_index: u32) -> SdkResult<u32>;

    fn unload_skeleton(&self, skeleton_id: u32) -> SdkResult<()>;

    fn get_temporary_skeleton(&self, handle: TemporarySkeletonHandle) -> SdkResult<()>;

    fn clear_temporary_skeleton(&self, handle: TemporarySkeletonHandle) -> SdkResult<()>;

    /// Ids of the dongles that can drive glove haptics.
    fn haptic_dongle_ids(&self) -> SdkResult<Vec<u32>>;

    /// Gloves paired with a dongle. A side without a glove reports `0`.
    fn gloves_for_dongle(&self, dongle_id: u32) -> SdkResult<GloveIds>;

    fn vibrate_fingers(&self, dongle_id: u32, side: Side, powers: &FingerPowers) -> SdkResult<()>;

    fn skeleton_glove_supports_haptics(&self, skeleton_id: u32, side: Side) -> SdkResult<bool>;

    fn vibrate_fingers_for_skeleton(
        &self,
        skeleton_id: u32,
        side: Side,
        powers: &FingerPowers,
    ) -> SdkResult<()>;

    /// Feeds externally tracked devices to the host.
    fn send_tracker_data(&self, trackers: &[TrackerData]) -> SdkResult<()>;
}
