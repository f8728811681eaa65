//! Scripted in-memory device host for tests and benchmarks.
//!
//! [`FakeDeviceHost`] implements [`DeviceHost`] entirely in memory. Tests stage stream
//! payloads and fire the registered callbacks from whichever thread they like, script the
//! outcome of discovery and connect calls, and inspect the calls the client made.
//!
//! Callbacks are always invoked with the internal lock released, so a callback can pull
//! from the host the way it would from a real SDK.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::ClientError;
use crate::ingest::ErrorSink;
use crate::sdk::{
    CoordinateSystem, DeviceHost, GestureStreamInfo, HostCallback, SdkResult, SdkStatus,
    SessionKind, SkeletonStreamInfo, TrackerStreamInfo,
};
use crate::stream::StreamKind;
use crate::types::{
    ChainSetup, ErgonomicsStream, FingerPowers, GestureChunk, GestureDefinition, GloveIds,
    HostDescriptor, HostVersion, Landscape, MAX_GESTURE_CHUNK_SIZE, NodeSetup, Quat, Side,
    Skeleton, SkeletonInfo, SkeletonNode, SkeletonSetup, SystemMessage, TemporarySkeletonHandle,
    TrackerData, TrackerKind, Transform, Vec3, VersionCompatibility,
};

type Shared<T> = Option<Arc<dyn Fn(&T) + Send + Sync>>;

#[derive(Default)]
struct Callbacks {
    connected: Shared<HostDescriptor>,
    disconnected: Shared<HostDescriptor>,
    skeleton: Shared<SkeletonStreamInfo>,
    raw_skeleton: Shared<SkeletonStreamInfo>,
    tracker: Shared<TrackerStreamInfo>,
    gesture: Shared<GestureStreamInfo>,
    ergonomics: Shared<ErgonomicsStream>,
    landscape: Shared<Landscape>,
    system_message: Shared<SystemMessage>,
}

impl Callbacks {
    fn count(&self) -> usize {
        [
            self.connected.is_some(),
            self.disconnected.is_some(),
            self.skeleton.is_some(),
            self.raw_skeleton.is_some(),
            self.tracker.is_some(),
            self.gesture.is_some(),
            self.ergonomics.is_some(),
            self.landscape.is_some(),
            self.system_message.is_some(),
        ]
        .into_iter()
        .filter(|registered| *registered)
        .count()
    }
}

/// Gesture probabilities staged for one entity.
#[derive(Debug, Clone)]
pub struct StagedGestures {
    pub id: u32,
    pub is_user_id: bool,
    pub probabilities: Vec<f32>,
}

struct FakeState {
    callbacks: Callbacks,
    calls: Vec<String>,

    initialize_status: Option<SdkStatus>,
    shutdown_status: Option<SdkStatus>,
    coordinate_status: Option<SdkStatus>,
    failing_registration: Option<&'static str>,

    hosts: Vec<HostDescriptor>,
    discovery_status: Option<SdkStatus>,
    connect_script: VecDeque<SdkResult<()>>,
    connect_default: SdkResult<()>,
    acknowledge_connections: bool,
    session_id: u32,
    versions: VersionCompatibility,

    skeletons: Vec<Skeleton>,
    raw_skeletons: Vec<Skeleton>,
    trackers: Vec<TrackerData>,
    gestures: Vec<StagedGestures>,
    gesture_chunk_size: usize,
    claimed_gesture_total: Option<u32>,
    gesture_definitions: Vec<GestureDefinition>,
    failing_pull: Option<(StreamKind, u32)>,

    failing_rig_step: Option<(&'static str, SdkStatus)>,
    next_skeleton_id: u32,

    haptic_dongles: Vec<(u32, GloveIds)>,
    haptic_skeleton_hands: Vec<(u32, Side)>,
    failing_output: Option<(&'static str, SdkStatus)>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            callbacks: Callbacks::default(),
            calls: Vec::new(),
            initialize_status: None,
            shutdown_status: None,
            coordinate_status: None,
            failing_registration: None,
            hosts: Vec::new(),
            discovery_status: None,
            connect_script: VecDeque::new(),
            connect_default: Ok(()),
            acknowledge_connections: true,
            session_id: 7,
            versions: VersionCompatibility {
                sdk_version: "2.0.0".into(),
                host_version: "2.0.0".into(),
                compatible: true,
            },
            skeletons: Vec::new(),
            raw_skeletons: Vec::new(),
            trackers: Vec::new(),
            gestures: Vec::new(),
            gesture_chunk_size: MAX_GESTURE_CHUNK_SIZE,
            claimed_gesture_total: None,
            gesture_definitions: Vec::new(),
            failing_pull: None,
            failing_rig_step: None,
            next_skeleton_id: 100,
            haptic_dongles: Vec::new(),
            haptic_skeleton_hands: Vec::new(),
            failing_output: None,
        }
    }
}

/// In-memory [`DeviceHost`].
#[derive(Default)]
pub struct FakeDeviceHost {
    state: Mutex<FakeState>,
    publish_time: AtomicU64,
}

impl FakeDeviceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(state: &mut FakeState, call: impl Into<String>) {
        state.calls.push(call.into());
    }

    fn next_publish_time(&self) -> u64 {
        self.publish_time.fetch_add(1, Ordering::Relaxed) + 1
    }

    // Scripting

    pub fn set_hosts(&self, hosts: Vec<HostDescriptor>) {
        self.lock().hosts = hosts;
    }

    pub fn fail_discovery(&self, status: Option<SdkStatus>) {
        self.lock().discovery_status = status;
    }

    /// Queues outcomes for the next connect calls. Once drained, connects use the default.
    pub fn script_connects(&self, outcomes: impl IntoIterator<Item = SdkResult<()>>) {
        self.lock().connect_script.extend(outcomes);
    }

    pub fn set_connect_default(&self, outcome: SdkResult<()>) {
        self.lock().connect_default = outcome;
    }

    /// Whether a successful connect fires the connected callback.
    pub fn acknowledge_connections(&self, acknowledge: bool) {
        self.lock().acknowledge_connections = acknowledge;
    }

    pub fn set_session_id(&self, id: u32) {
        self.lock().session_id = id;
    }

    pub fn set_versions(&self, versions: VersionCompatibility) {
        self.lock().versions = versions;
    }

    pub fn fail_initialize(&self, status: Option<SdkStatus>) {
        self.lock().initialize_status = status;
    }

    pub fn fail_shutdown(&self, status: Option<SdkStatus>) {
        self.lock().shutdown_status = status;
    }

    pub fn fail_coordinate_system(&self, status: Option<SdkStatus>) {
        self.lock().coordinate_status = status;
    }

    /// Fails registration of the callback with this [`HostCallback::name`].
    pub fn fail_registration(&self, name: Option<&'static str>) {
        self.lock().failing_registration = name;
    }

    /// Fails pulls of entity `index` for `kind`.
    pub fn fail_pull(&self, target: Option<(StreamKind, u32)>) {
        self.lock().failing_pull = target;
    }

    pub fn set_gesture_chunk_size(&self, size: usize) {
        self.lock().gesture_chunk_size = size;
    }

    /// Reports `total` as every entity's gesture count regardless of what is staged.
    pub fn claim_gesture_total(&self, total: Option<u32>) {
        self.lock().claimed_gesture_total = total;
    }

    pub fn fail_rig_step(&self, step: Option<(&'static str, SdkStatus)>) {
        self.lock().failing_rig_step = step;
    }

    /// Adds a haptics dongle paired with `gloves`.
    pub fn add_haptic_dongle(&self, dongle_id: u32, gloves: GloveIds) {
        self.lock().haptic_dongles.push((dongle_id, gloves));
    }

    /// Marks the glove on `side` of skeleton `skeleton_id` as haptic.
    pub fn set_skeleton_haptics(&self, skeleton_id: u32, side: Side) {
        self.lock().haptic_skeleton_hands.push((skeleton_id, side));
    }

    /// Fails the output call with this name (`haptic_dongle_ids`, `vibrate_fingers`, ...).
    pub fn fail_output(&self, call: Option<(&'static str, SdkStatus)>) {
        self.lock().failing_output = call;
    }

    // Inspection

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.lock().calls.iter().filter(|call| call.starts_with(prefix)).count()
    }

    pub fn registered_callbacks(&self) -> usize {
        self.lock().callbacks.count()
    }

    // Event emission

    pub fn emit_connected(&self, host: &HostDescriptor) {
        let callback = self.lock().callbacks.connected.clone();
        if let Some(callback) = callback {
            callback(host);
        }
    }

    pub fn emit_disconnected(&self, host: &HostDescriptor) {
        let callback = self.lock().callbacks.disconnected.clone();
        if let Some(callback) = callback {
            callback(host);
        }
    }

    pub fn emit_skeletons(&self, skeletons: Vec<Skeleton>) {
        let info = SkeletonStreamInfo {
            skeletons_count: skeletons.len() as u32,
            publish_time: self.next_publish_time(),
        };
        let callback = {
            let mut state = self.lock();
            state.skeletons = skeletons;
            state.callbacks.skeleton.clone()
        };
        if let Some(callback) = callback {
            callback(&info);
        }
    }

    pub fn emit_raw_skeletons(&self, skeletons: Vec<Skeleton>) {
        let info = SkeletonStreamInfo {
            skeletons_count: skeletons.len() as u32,
            publish_time: self.next_publish_time(),
        };
        let callback = {
            let mut state = self.lock();
            state.raw_skeletons = skeletons;
            state.callbacks.raw_skeleton.clone()
        };
        if let Some(callback) = callback {
            callback(&info);
        }
    }

    pub fn emit_trackers(&self, trackers: Vec<TrackerData>) {
        let info = TrackerStreamInfo {
            trackers_count: trackers.len() as u32,
            publish_time: self.next_publish_time(),
        };
        let callback = {
            let mut state = self.lock();
            state.trackers = trackers;
            state.callbacks.tracker.clone()
        };
        if let Some(callback) = callback {
            callback(&info);
        }
    }

    pub fn emit_gestures(&self, entities: Vec<StagedGestures>) {
        let info = GestureStreamInfo {
            entity_count: entities.len() as u32,
            publish_time: self.next_publish_time(),
        };
        let callback = {
            let mut state = self.lock();
            state.gestures = entities;
            state.callbacks.gesture.clone()
        };
        if let Some(callback) = callback {
            callback(&info);
        }
    }

    pub fn emit_ergonomics(&self, stream: ErgonomicsStream) {
        let callback = self.lock().callbacks.ergonomics.clone();
        if let Some(callback) = callback {
            callback(&stream);
        }
    }

    pub fn emit_landscape(&self, landscape: Landscape, definitions: Vec<GestureDefinition>) {
        let callback = {
            let mut state = self.lock();
            state.gesture_definitions = definitions;
            state.callbacks.landscape.clone()
        };
        if let Some(callback) = callback {
            callback(&landscape);
        }
    }

    pub fn emit_system_message(&self, message: SystemMessage) {
        let callback = self.lock().callbacks.system_message.clone();
        if let Some(callback) = callback {
            callback(&message);
        }
    }

    fn check_pull(state: &FakeState, kind: StreamKind, index: u32) -> SdkResult<()> {
        if state.failing_pull == Some((kind, index)) {
            return Err(SdkStatus::Error);
        }
        Ok(())
    }

    fn connect_outcome(&self, target: Option<&HostDescriptor>, call: String) -> SdkResult<()> {
        let (outcome, acknowledge, host) = {
            let mut state = self.lock();
            Self::record(&mut state, call);
            let outcome = match state.connect_script.pop_front() {
                Some(outcome) => outcome,
                None => state.connect_default,
            };
            let host = target
                .cloned()
                .or_else(|| state.hosts.first().cloned())
                .unwrap_or_else(|| sample_host("preset"));
            (outcome, state.acknowledge_connections, host)
        };
        if outcome.is_ok() && acknowledge {
            self.emit_connected(&host);
        }
        outcome
    }

    fn output(&self, call: &'static str, detail: String) -> SdkResult<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        Self::record(&mut state, format!("{call}:{detail}"));
        match state.failing_output {
            Some((failing, status)) if failing == call => Err(status),
            _ => Ok(state),
        }
    }

    fn rig_step(&self, step: &'static str) -> SdkResult<()> {
        let mut state = self.lock();
        Self::record(&mut state, format!("rig:{step}"));
        match state.failing_rig_step {
            Some((failing, status)) if failing == step => Err(status),
            _ => Ok(()),
        }
    }
}

impl DeviceHost for FakeDeviceHost {
    fn initialize(&self, kind: SessionKind) -> SdkResult<()> {
        let mut state = self.lock();
        Self::record(&mut state, format!("initialize:{kind:?}"));
        state.initialize_status.map_or(Ok(()), Err)
    }

    fn shutdown(&self) -> SdkResult<()> {
        let mut state = self.lock();
        Self::record(&mut state, "shutdown");
        if let Some(status) = state.shutdown_status {
            return Err(status);
        }
        state.callbacks = Callbacks::default();
        Ok(())
    }

    fn set_coordinate_system(&self, _system: &CoordinateSystem) -> SdkResult<()> {
        let mut state = self.lock();
        Self::record(&mut state, "set_coordinate_system");
        state.coordinate_status.map_or(Ok(()), Err)
    }

    fn register_callback(&self, callback: HostCallback) -> SdkResult<()> {
        let mut state = self.lock();
        if state.failing_registration == Some(callback.name()) {
            return Err(SdkStatus::InternalError);
        }
        let callbacks = &mut state.callbacks;
        match callback {
            HostCallback::Connected(f) => callbacks.connected = Some(Arc::from(f)),
            HostCallback::Disconnected(f) => callbacks.disconnected = Some(Arc::from(f)),
            HostCallback::Skeleton(f) => callbacks.skeleton = Some(Arc::from(f)),
            HostCallback::RawSkeleton(f) => callbacks.raw_skeleton = Some(Arc::from(f)),
            HostCallback::Tracker(f) => callbacks.tracker = Some(Arc::from(f)),
            HostCallback::Gesture(f) => callbacks.gesture = Some(Arc::from(f)),
            HostCallback::Ergonomics(f) => callbacks.ergonomics = Some(Arc::from(f)),
            HostCallback::Landscape(f) => callbacks.landscape = Some(Arc::from(f)),
            HostCallback::SystemMessage(f) => callbacks.system_message = Some(Arc::from(f)),
        }
        Ok(())
    }

    fn look_for_hosts(&self, _timeout: Duration, local_only: bool) -> SdkResult<u32> {
        let mut state = self.lock();
        Self::record(&mut state, format!("look_for_hosts:local={local_only}"));
        if let Some(status) = state.discovery_status {
            return Err(status);
        }
        Ok(state.hosts.len() as u32)
    }

    fn available_hosts(&self, count: u32) -> SdkResult<Vec<HostDescriptor>> {
        let state = self.lock();
        if count as usize > state.hosts.len() {
            return Err(SdkStatus::ArgumentSizeMismatch);
        }
        Ok(state.hosts[..count as usize].to_vec())
    }

    fn connect_to_host(&self, host: &HostDescriptor) -> SdkResult<()> {
        self.connect_outcome(Some(host), format!("connect_to_host:{}", host.name))
    }

    fn connect_to_preset_address(&self) -> SdkResult<()> {
        self.connect_outcome(None, "connect_to_preset_address".to_string())
    }

    fn session_id(&self) -> SdkResult<u32> {
        Ok(self.lock().session_id)
    }

    fn versions(&self) -> SdkResult<VersionCompatibility> {
        Ok(self.lock().versions.clone())
    }

    fn skeleton_info(&self, index: u32) -> SdkResult<SkeletonInfo> {
        let state = self.lock();
        state.skeletons.get(index as usize).map(|s| s.info).ok_or(SdkStatus::InvalidArgument)
    }

    fn skeleton_nodes(&self, index: u32, count: u32) -> SdkResult<Vec<SkeletonNode>> {
        let state = self.lock();
        Self::check_pull(&state, StreamKind::Skeleton, index)?;
        let skeleton = state.skeletons.get(index as usize).ok_or(SdkStatus::InvalidArgument)?;
        if skeleton.nodes.len() != count as usize {
            return Err(SdkStatus::ArgumentSizeMismatch);
        }
        Ok(skeleton.nodes.clone())
    }

    fn raw_skeleton_info(&self, index: u32) -> SdkResult<SkeletonInfo> {
        let state = self.lock();
        state.raw_skeletons.get(index as usize).map(|s| s.info).ok_or(SdkStatus::InvalidArgument)
    }

    fn raw_skeleton_nodes(&self, index: u32, count: u32) -> SdkResult<Vec<SkeletonNode>> {
        let state = self.lock();
        Self::check_pull(&state, StreamKind::RawSkeleton, index)?;
        let skeleton = state.raw_skeletons.get(index as usize).ok_or(SdkStatus::InvalidArgument)?;
        if skeleton.nodes.len() != count as usize {
            return Err(SdkStatus::ArgumentSizeMismatch);
        }
        Ok(skeleton.nodes.clone())
    }

    fn tracker_data(&self, index: u32) -> SdkResult<TrackerData> {
        let state = self.lock();
        Self::check_pull(&state, StreamKind::Tracker, index)?;
        state.trackers.get(index as usize).cloned().ok_or(SdkStatus::InvalidArgument)
    }

    fn gesture_chunk(&self, index: u32, offset: u32) -> SdkResult<GestureChunk> {
        let mut state = self.lock();
        Self::record(&mut state, format!("gesture_chunk:{index}@{offset}"));
        Self::check_pull(&state, StreamKind::Gesture, index)?;
        let entity = state.gestures.get(index as usize).ok_or(SdkStatus::InvalidArgument)?;
        let start = (offset as usize).min(entity.probabilities.len());
        let end = (start + state.gesture_chunk_size).min(entity.probabilities.len());
        Ok(GestureChunk {
            id: entity.id,
            is_user_id: entity.is_user_id,
            total_gesture_count: state
                .claimed_gesture_total
                .unwrap_or(entity.probabilities.len() as u32),
            probabilities: entity.probabilities[start..end].to_vec(),
        })
    }

    fn gesture_landscape(&self, count: u32) -> SdkResult<Vec<GestureDefinition>> {
        let state = self.lock();
        Self::check_pull(&state, StreamKind::Landscape, 0)?;
        Ok(state.gesture_definitions.iter().take(count as usize).cloned().collect())
    }

    fn create_skeleton_setup(&self, setup: &SkeletonSetup) -> SdkResult<u32> {
        self.rig_step("create")?;
        let mut state = self.lock();
        Self::record(&mut state, format!("create_skeleton_setup:{}", setup.name));
        Ok(0)
    }

    fn add_node(&self, _setup_index: u32, _node: &NodeSetup) -> SdkResult<()> {
        self.rig_step("add_node")
    }

    fn add_chain(&self, _setup_index: u32, _chain: &ChainSetup) -> SdkResult<()> {
        self.rig_step("add_chain")
    }

    fn load_skeleton(&self, _setup_index: u32) -> SdkResult<u32> {
        self.rig_step("load")?;
        let mut state = self.lock();
        state.next_skeleton_id += 1;
        Ok(state.next_skeleton_id)
    }

    fn unload_skeleton(&self, _skeleton_id: u32) -> SdkResult<()> {
        self.rig_step("unload")
    }

    fn get_temporary_skeleton(&self, handle: TemporarySkeletonHandle) -> SdkResult<()> {
        let mut state = self.lock();
        let call = format!("get_temporary_skeleton:{}:{}", handle.index, handle.session_id);
        Self::record(&mut state, call);
        Ok(())
    }

    fn clear_temporary_skeleton(&self, handle: TemporarySkeletonHandle) -> SdkResult<()> {
        let mut state = self.lock();
        Self::record(&mut state, format!("clear_temporary_skeleton:{}", handle.index));
        Ok(())
    }

    fn haptic_dongle_ids(&self) -> SdkResult<Vec<u32>> {
        let state = self.output("haptic_dongle_ids", String::new())?;
        Ok(state.haptic_dongles.iter().map(|(id, _)| *id).collect())
    }

    fn gloves_for_dongle(&self, dongle_id: u32) -> SdkResult<GloveIds> {
        let state = self.output("gloves_for_dongle", dongle_id.to_string())?;
        state
            .haptic_dongles
            .iter()
            .find(|(id, _)| *id == dongle_id)
            .map(|(_, gloves)| *gloves)
            .ok_or(SdkStatus::InvalidArgument)
    }

    fn vibrate_fingers(&self, dongle_id: u32, side: Side, powers: &FingerPowers) -> SdkResult<()> {
        self.output("vibrate_fingers", format!("{dongle_id}:{side:?}:{:?}", powers.as_array()))
            .map(drop)
    }

    fn skeleton_glove_supports_haptics(&self, skeleton_id: u32, side: Side) -> SdkResult<bool> {
        let detail = format!("{skeleton_id}:{side:?}");
        let state = self.output("skeleton_glove_supports_haptics", detail)?;
        Ok(state.haptic_skeleton_hands.contains(&(skeleton_id, side)))
    }

    fn vibrate_fingers_for_skeleton(
        &self,
        skeleton_id: u32,
        side: Side,
        powers: &FingerPowers,
    ) -> SdkResult<()> {
        let detail = format!("{skeleton_id}:{side:?}:{:?}", powers.as_array());
        self.output("vibrate_fingers_for_skeleton", detail).map(drop)
    }

    fn send_tracker_data(&self, trackers: &[TrackerData]) -> SdkResult<()> {
        let ids: Vec<&str> = trackers.iter().map(|tracker| tracker.id.as_str()).collect();
        self.output("send_tracker_data", ids.join(",")).map(drop)
    }
}

/// Collects reported ingestion failures.
#[derive(Debug, Default)]
pub struct RecordingErrorSink {
    reports: Mutex<Vec<(StreamKind, String)>>,
}

impl RecordingErrorSink {
    pub fn reports(&self) -> Vec<(StreamKind, String)> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ErrorSink for RecordingErrorSink {
    fn report(&self, kind: StreamKind, error: &ClientError) {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).push((kind, error.to_string()));
    }
}

pub fn sample_host(name: &str) -> HostDescriptor {
    HostDescriptor::new(name, format!("{name}.studio.local"), HostVersion::new(2, 5, 0))
}

/// A skeleton with `node_count` nodes laid out along the X axis.
pub fn sample_skeleton(id: u32, node_count: u32) -> Skeleton {
    let nodes = (0..node_count)
        .map(|node| SkeletonNode {
            id: node,
            transform: Transform {
                position: Vec3::new(node as f32 * 0.01, 0.0, 0.0),
                ..Transform::default()
            },
        })
        .collect();
    Skeleton { info: SkeletonInfo { id, nodes_count: node_count, publish_time: 0 }, nodes }
}

pub fn sample_tracker(id: &str, kind: TrackerKind) -> TrackerData {
    TrackerData {
        id: id.to_string(),
        kind,
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        is_hmd: kind == TrackerKind::Head,
    }
}
