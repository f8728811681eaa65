//! The consumer loop.
//!
//! [`Client`] owns everything the tick thread touches: the [`SessionState`], the
//! [`ConnectionLifecycle`] and the receiving ends of the host-event and command channels.
//! Host callbacks never reach it directly. They publish into the ingestor's stream buffers
//! and forward connection changes as [`HostEvent`]s, which [`Client::step`] drains at the
//! start of every tick.
//!
//! Blocking SDK calls (discovery, connecting) run on the blocking pool so cancellation and
//! other tasks keep making progress while the host is slow to answer.

use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ClientConfig, ReconnectPolicy};
use crate::ingest::{ErrorSink, HostEvent, StreamIngestor, TracingErrorSink};
use crate::lifecycle::{
    ConnectTarget, ConnectionLifecycle, ConnectionMode, LifecycleEvent, LifecycleState,
    ReconnectBudget,
};
use crate::sdk::{DeviceHost, SdkResult, SdkStatus};
use crate::session::{SessionState, TickUpdates};
use crate::types::{
    FingerPowers, HostDescriptor, Side, SkeletonDefinition, TemporarySkeletonHandle, TrackerData,
};
use crate::{ClientError, Result};

/// Consecutive failed ticks tolerated before [`Client::run`] gives up.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Pending operator commands. Commands beyond this are rejected by [`ClientHandle::send`].
const COMMAND_CAPACITY: usize = 16;

/// Operator input for the states that wait on a decision.
///
/// A command is consumed by the tick that receives it. Commands that do not apply to the
/// current state are logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectMode(ConnectionMode),
    PickHost(usize),
    /// Leave `NoHostsFound` or the host list and start over.
    Retry,
    /// Start a bounded reconnection from `Disconnected`.
    Reconnect,
    /// Restart the session and go back to choosing a connection mode.
    PickNewHost,
}

/// Snapshot of the client published after every tick.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "tauri", derive(serde::Serialize, specta::Type))]
pub struct LifecycleStatus {
    pub state: String,
    pub mode: Option<ConnectionMode>,
    pub host: Option<String>,
    pub session_id: Option<u32>,
    /// Number of hosts offered while selecting one.
    pub hosts_found: usize,
    pub reconnect_attempt: Option<u32>,
    pub last_error: Option<String>,
}

impl Default for LifecycleStatus {
    fn default() -> Self {
        Self {
            state: LifecycleState::SelectingConnectionMode.name().to_string(),
            mode: None,
            host: None,
            session_id: None,
            hosts_found: 0,
            reconnect_attempt: None,
            last_error: None,
        }
    }
}

/// Receives the session once per tick while a host is connected.
pub trait TickHandler: Send {
    fn on_tick(&mut self, session: &SessionState, state: &LifecycleState, updates: TickUpdates);
}

impl<F> TickHandler for F
where
    F: FnMut(&SessionState, &LifecycleState, TickUpdates) + Send,
{
    fn on_tick(&mut self, session: &SessionState, state: &LifecycleState, updates: TickUpdates) {
        self(session, state, updates)
    }
}

/// How a reconnection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    Reconnected { attempts: u32 },
    Exhausted { attempts: u32, elapsed: Duration },
    Cancelled,
}

/// Cloneable control surface for a running [`Client`].
#[derive(Debug, Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<LifecycleStatus>,
    cancel: CancellationToken,
}

impl ClientHandle {
    /// Queues a command for the next tick. Returns `false` if the queue is full or the
    /// client has stopped.
    pub fn send(&self, command: Command) -> bool {
        match self.commands.try_send(command) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Command rejected");
                false
            }
        }
    }

    pub fn status(&self) -> LifecycleStatus {
        self.status.borrow().clone()
    }

    /// Stream of status snapshots, starting with the current one.
    pub fn status_updates(&self) -> impl Stream<Item = LifecycleStatus> + use<> {
        WatchStream::new(self.status.clone())
    }

    /// Stops the loop at the next tick boundary or reconnection pause.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Session client driving one [`DeviceHost`].
pub struct Client<H: DeviceHost> {
    host: Arc<H>,
    config: ClientConfig,
    ingestor: Arc<StreamIngestor<H>>,
    session: SessionState,
    lifecycle: ConnectionLifecycle,
    events: mpsc::UnboundedReceiver<HostEvent>,
    commands: mpsc::Receiver<Command>,
    status: watch::Sender<LifecycleStatus>,
    cancel: CancellationToken,
    auto_reconnect_suppressed: bool,
    last_error: Option<String>,
}

impl<H: DeviceHost> Client<H> {
    /// Initializes the SDK, registers every host callback and applies the coordinate
    /// system. Ingestion failures are logged.
    pub fn initialize(host: Arc<H>, config: ClientConfig) -> Result<(Self, ClientHandle)> {
        Self::initialize_with_sink(host, config, Arc::new(TracingErrorSink))
    }

    pub fn initialize_with_sink(
        host: Arc<H>,
        config: ClientConfig,
        errors: Arc<dyn ErrorSink>,
    ) -> Result<(Self, ClientHandle)> {
        config.validate()?;

        let (event_tx, events) = mpsc::unbounded_channel();
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (status_tx, status_rx) = watch::channel(LifecycleStatus::default());
        let cancel = CancellationToken::new();
        let ingestor =
            Arc::new(StreamIngestor::new(Arc::clone(&host), event_tx).with_error_sink(errors));

        let client = Self {
            host,
            config,
            ingestor,
            session: SessionState::new(),
            lifecycle: ConnectionLifecycle::new(),
            events,
            commands,
            status: status_tx,
            cancel: cancel.clone(),
            auto_reconnect_suppressed: false,
            last_error: None,
        };
        client.start_sdk()?;
        client.publish_status();

        let handle = ClientHandle { commands: command_tx, status: status_rx, cancel };
        Ok((client, handle))
    }

    fn start_sdk(&self) -> Result<()> {
        self.host
            .initialize(self.config.session_kind)
            .map_err(|status| ClientError::initialization_failed("initializing the SDK", status))?;
        self.ingestor.register()?;
        self.host.set_coordinate_system(&self.config.coordinate_system).map_err(|status| {
            ClientError::initialization_failed("setting the coordinate system", status)
        })?;
        info!(kind = ?self.config.session_kind, "Host SDK initialized");
        Ok(())
    }

    /// Shuts the SDK down and initializes it again with a fresh session.
    ///
    /// Stream buffers, glove ids and queued host events from the old session are dropped.
    pub fn restart(&mut self) -> Result<()> {
        info!("Restarting host session");
        self.host.shutdown().map_err(|status| ClientError::Shutdown { status })?;
        self.ingestor.reset();
        self.session = SessionState::new();
        while self.events.try_recv().is_ok() {}
        self.start_sdk()
            .map_err(|e| ClientError::restart_failed("re-initializing the SDK", e))
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.host.shutdown().map_err(|status| ClientError::Shutdown { status })?;
        self.ingestor.reset();
        info!("Host SDK shut down");
        Ok(())
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn state(&self) -> &LifecycleState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &ConnectionLifecycle {
        &self.lifecycle
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn ingestor(&self) -> &Arc<StreamIngestor<H>> {
        &self.ingestor
    }

    /// Builds a skeleton on the host from `definition` and loads it.
    ///
    /// Returns the host's id for the loaded skeleton.
    pub fn load_skeleton(&self, definition: &SkeletonDefinition) -> Result<u32> {
        let setup = self
            .host
            .create_skeleton_setup(&definition.setup)
            .map_err(rig_error("create setup"))?;
        for node in &definition.nodes {
            self.host.add_node(setup, node).map_err(rig_error("add node"))?;
        }
        for chain in &definition.chains {
            self.host.add_chain(setup, chain).map_err(rig_error("add chain"))?;
        }
        let id = self.host.load_skeleton(setup).map_err(rig_error("load"))?;
        info!(
            name = %definition.setup.name,
            skeleton_id = id,
            nodes = definition.nodes.len(),
            chains = definition.chains.len(),
            "Skeleton loaded"
        );
        Ok(id)
    }

    pub fn unload_skeleton(&self, skeleton_id: u32) -> Result<()> {
        self.host.unload_skeleton(skeleton_id).map_err(rig_error("unload"))?;
        info!(skeleton_id, "Skeleton unloaded");
        Ok(())
    }

    pub fn clear_temporary_skeleton(&self, handle: TemporarySkeletonHandle) -> Result<()> {
        self.host
            .clear_temporary_skeleton(handle)
            .map_err(rig_error("clear temporary skeleton"))
    }

    /// Vibrates the fingers of the first glove on `side` through the dongle it is paired with.
    ///
    /// Returns `false` without calling the host when there is no glove on that side, the
    /// latest landscape does not mark it haptic, or no haptics dongle carries it.
    pub fn vibrate_fingers(&self, side: Side, powers: FingerPowers) -> Result<bool> {
        let Some(glove_id) = self.session.glove_ids().for_side(side) else {
            debug!(?side, "No glove to vibrate");
            return Ok(false);
        };
        let haptic = self
            .session
            .landscape()
            .and_then(|snapshot| snapshot.landscape.gloves.iter().find(|g| g.id == glove_id))
            .is_some_and(|glove| glove.is_haptic);
        if !haptic {
            debug!(glove_id, "Glove has no haptics");
            return Ok(false);
        }

        let dongles = self.host.haptic_dongle_ids().map_err(output_error("list haptics dongles"))?;
        let mut dongle = None;
        for dongle_id in dongles {
            let gloves = self
                .host
                .gloves_for_dongle(dongle_id)
                .map_err(output_error("read dongle gloves"))?;
            if gloves.left == glove_id || gloves.right == glove_id {
                dongle = Some(dongle_id);
                break;
            }
        }
        let Some(dongle_id) = dongle else {
            debug!(glove_id, "No haptics dongle carries the glove");
            return Ok(false);
        };

        self.host
            .vibrate_fingers(dongle_id, side, &powers)
            .map_err(output_error("vibrate fingers"))?;
        trace!(glove_id, dongle_id, ?powers, "Sent haptics command");
        Ok(true)
    }

    /// Vibrates the glove on `side` of a loaded skeleton.
    ///
    /// Returns `false` when the host reports that glove has no haptics.
    pub fn vibrate_skeleton_fingers(
        &self,
        skeleton_id: u32,
        side: Side,
        powers: FingerPowers,
    ) -> Result<bool> {
        if side == Side::Invalid {
            return Ok(false);
        }
        let supported = self
            .host
            .skeleton_glove_supports_haptics(skeleton_id, side)
            .map_err(output_error("query skeleton haptics"))?;
        if !supported {
            debug!(skeleton_id, ?side, "Skeleton glove has no haptics");
            return Ok(false);
        }
        self.host
            .vibrate_fingers_for_skeleton(skeleton_id, side, &powers)
            .map_err(output_error("vibrate skeleton fingers"))?;
        Ok(true)
    }

    /// Feeds externally tracked devices to the host. An empty slice is not sent.
    pub fn send_tracker_data(&self, trackers: &[TrackerData]) -> Result<()> {
        if trackers.is_empty() {
            return Ok(());
        }
        self.host.send_tracker_data(trackers).map_err(output_error("send tracker data"))?;
        trace!(count = trackers.len(), "Sent tracker data");
        Ok(())
    }

    /// Runs one tick: drain host events, refresh the session, then act on the state.
    ///
    /// Recoverable problems (failed discovery, a bad host index, refused connections) are
    /// handled here and recorded in the published status. Errors are returned for
    /// everything else, including a connect call that failed for a reason other than a
    /// refusal; the state is left where it was.
    pub async fn step<T: TickHandler>(&mut self, handler: &mut T) -> Result<()> {
        let result = self.tick(handler).await;
        if let Err(error) = &result {
            self.last_error = Some(error.to_string());
        }
        self.publish_status();
        result
    }

    async fn tick<T: TickHandler>(&mut self, handler: &mut T) -> Result<()> {
        self.drain_host_events()?;
        let updates = self.session.refresh(self.ingestor.buffers());
        self.ingestor.set_glove_ids(self.session.glove_ids());
        let command = self.commands.try_recv().ok();

        let state = self.lifecycle.state().clone();
        match state {
            LifecycleState::SelectingConnectionMode => {
                let mode = match command {
                    Some(Command::SelectMode(mode)) => Some(mode),
                    other => {
                        ignore(other, &state);
                        self.config.startup_mode
                    }
                };
                if let Some(mode) = mode {
                    self.lifecycle.apply(LifecycleEvent::ModeSelected(mode))?;
                }
            }
            LifecycleState::DiscoveringHosts { mode } => {
                ignore(command, &state);
                let event = match self.discover(mode).await {
                    Ok(hosts) => LifecycleEvent::HostsDiscovered(hosts),
                    Err(error) if error.is_retryable() => {
                        warn!(%error, "Host discovery failed");
                        self.last_error = Some(error.to_string());
                        LifecycleEvent::DiscoveryFailed
                    }
                    Err(error) => return Err(error),
                };
                self.lifecycle.apply(event)?;
            }
            LifecycleState::NoHostsFound { since } => {
                let retry_due = self
                    .config
                    .retry_discovery_after()
                    .is_some_and(|after| since.elapsed() >= after);
                match command {
                    Some(Command::Retry) => {
                        self.lifecycle.apply(LifecycleEvent::RetryRequested)?;
                    }
                    other => {
                        ignore(other, &state);
                        if retry_due {
                            debug!("Retrying discovery");
                            self.lifecycle.apply(LifecycleEvent::RetryRequested)?;
                        }
                    }
                }
            }
            LifecycleState::SelectingHost { .. } => match command {
                Some(Command::PickHost(index)) => self.pick_host(index)?,
                Some(Command::Retry) => {
                    self.lifecycle.apply(LifecycleEvent::RetryRequested)?;
                }
                other => {
                    ignore(other, &state);
                    if self.config.auto_pick_first_host {
                        self.pick_host(0)?;
                    }
                }
            },
            LifecycleState::Connecting { ref target } => {
                ignore(command, &state);
                self.connect(target.clone()).await?;
            }
            LifecycleState::Active => {
                ignore(command, &state);
                self.retrieve_temporary_skeleton();
                handler.on_tick(&self.session, self.lifecycle.state(), updates);
            }
            LifecycleState::Disconnected { .. } => match command {
                Some(Command::Reconnect) => {
                    let policy = self.config.manual_reconnect;
                    self.reconnect(policy).await?;
                }
                Some(Command::PickNewHost) => {
                    self.restart()?;
                    self.lifecycle.apply(LifecycleEvent::NewHostRequested)?;
                    self.auto_reconnect_suppressed = false;
                }
                other => {
                    ignore(other, &state);
                    let automatic = self
                        .lifecycle
                        .mode()
                        .is_some_and(|mode| mode.reconnects_automatically());
                    if automatic && !self.auto_reconnect_suppressed {
                        let policy = self.config.reconnect;
                        self.reconnect(policy).await?;
                    }
                }
            },
            LifecycleState::Reconnecting { .. } => {
                ignore(command, &state);
                trace!("Reconnection in progress");
            }
        }
        Ok(())
    }

    fn drain_host_events(&mut self) -> Result<()> {
        while let Ok(event) = self.events.try_recv() {
            match event {
                HostEvent::Connected { host, session_id, versions } => {
                    debug!(%host, ?session_id, "Recording host connection");
                    self.session.record_connection(host.clone(), session_id, versions);
                    self.lifecycle.apply(LifecycleEvent::HostConnected(host))?;
                    self.auto_reconnect_suppressed = false;
                }
                HostEvent::Disconnected { host, at } => {
                    debug!(%host, "Recording host disconnection");
                    self.session.record_host(host.clone());
                    self.lifecycle.apply(LifecycleEvent::HostDisconnected { host, at })?;
                }
            }
        }
        Ok(())
    }

    fn pick_host(&mut self, index: usize) -> Result<()> {
        match self.lifecycle.apply(LifecycleEvent::HostPicked(index)) {
            Ok(_) => Ok(()),
            Err(error @ ClientError::InvalidHostIndex { .. }) => {
                warn!(%error, "Ignoring host selection");
                self.last_error = Some(error.to_string());
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn discover(&self, mode: ConnectionMode) -> Result<Vec<HostDescriptor>> {
        let host = Arc::clone(&self.host);
        let timeout = self.config.discovery.timeout();
        let local_only = mode.local_only();
        info!(?mode, ?timeout, "Looking for hosts");

        let hosts = tokio::task::spawn_blocking(move || discover_hosts(&*host, timeout, local_only))
            .await
            .map_err(|e| ClientError::discovery_failed(format!("lookup task failed: {e}"), None))??;
        info!(count = hosts.len(), "Host discovery finished");
        Ok(hosts)
    }

    async fn connect(&mut self, target: ConnectTarget) -> Result<()> {
        info!(%target, "Connecting");
        let host = Arc::clone(&self.host);
        let call_target = target.clone();
        let outcome = tokio::task::spawn_blocking(move || connect_to(&*host, &call_target))
            .await
            .map_err(|e| {
                warn!(error = %e, "Connect task failed");
                ClientError::connection_failed(target.to_string(), SdkStatus::InternalError)
            })?;

        let event = match outcome {
            Ok(()) => LifecycleEvent::ConnectSucceeded,
            Err(SdkStatus::NotConnected) => {
                let error = ClientError::connection_refused(target.to_string());
                warn!(%error, "Connection refused");
                self.last_error = Some(error.to_string());
                LifecycleEvent::ConnectRefused
            }
            Err(status) => LifecycleEvent::ConnectFailed(status),
        };
        self.lifecycle.apply(event)?;
        Ok(())
    }

    /// Restarts the session and retries the previous connection until it succeeds, the
    /// policy's budget runs out or the client is cancelled.
    ///
    /// Only valid from `Disconnected`; anywhere else it fails with
    /// [`ClientError::InvalidTransition`] before the session is touched. An exhausted budget
    /// leaves the lifecycle in `Disconnected` and suppresses automatic reconnection until the
    /// host comes back or the operator intervenes. Cancellation also returns to
    /// `Disconnected`.
    pub async fn reconnect(&mut self, policy: ReconnectPolicy) -> Result<ReconnectOutcome> {
        self.lifecycle.check(&LifecycleEvent::ReconnectStarted)?;
        let mode = self.lifecycle.mode();
        info!(
            ?mode,
            max_attempts = policy.max_attempts,
            max_duration_ms = policy.max_duration_ms,
            "Starting reconnection"
        );
        self.restart()?;
        self.lifecycle.apply(LifecycleEvent::ReconnectStarted)?;
        self.publish_status();

        let cancel = self.cancel.clone();
        let mut budget = ReconnectBudget::new(&policy, Instant::now());
        loop {
            let connected = self.reconnect_attempt(mode).await;
            budget.record_attempt();
            if connected {
                self.lifecycle.apply(LifecycleEvent::ReconnectSucceeded)?;
                self.auto_reconnect_suppressed = false;
                info!(attempts = budget.attempts(), "Reconnected");
                return Ok(ReconnectOutcome::Reconnected { attempts: budget.attempts() });
            }

            let now = Instant::now();
            if !budget.has_remaining(now) {
                let attempts = budget.attempts();
                let elapsed = budget.elapsed(now);
                let error = ClientError::ReconnectionExhausted { attempts, elapsed };
                warn!(%error, "Giving up reconnection");
                self.last_error = Some(error.to_string());
                self.lifecycle.apply(LifecycleEvent::ReconnectExhausted)?;
                self.auto_reconnect_suppressed = true;
                return Ok(ReconnectOutcome::Exhausted { attempts, elapsed });
            }

            self.lifecycle.apply(LifecycleEvent::ReconnectAttemptFailed)?;
            self.publish_status();
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(attempts = budget.attempts(), "Reconnection cancelled");
                    self.lifecycle.apply(LifecycleEvent::ReconnectCancelled)?;
                    self.publish_status();
                    return Ok(ReconnectOutcome::Cancelled);
                }
                _ = tokio::time::sleep(policy.interval()) => {}
            }
        }
    }

    async fn reconnect_attempt(&self, mode: Option<ConnectionMode>) -> bool {
        let host = Arc::clone(&self.host);
        let last_host = self.lifecycle.last_host().cloned();
        let timeout = self.config.discovery.timeout();

        let result = tokio::task::spawn_blocking(move || -> Result<()> {
            match mode {
                Some(ConnectionMode::Direct) => connect_to(&*host, &ConnectTarget::PresetAddress)
                    .map_err(|status| ClientError::connection_failed("preset address", status)),
                Some(ConnectionMode::Local) => {
                    let hosts = discover_hosts(&*host, timeout, true)?;
                    let first = hosts.into_iter().next().ok_or_else(|| {
                        ClientError::discovery_failed("no local host answered", None)
                    })?;
                    host.connect_to_host(&first)
                        .map_err(|status| ClientError::connection_failed(first.to_string(), status))
                }
                Some(ConnectionMode::Networked) | None => match last_host {
                    Some(previous) => host.connect_to_host(&previous).map_err(|status| {
                        ClientError::connection_failed(previous.to_string(), status)
                    }),
                    None => Err(ClientError::connection_failed(
                        "previous host",
                        SdkStatus::NotAvailable,
                    )),
                },
            }
        })
        .await;

        match result {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                debug!(%error, "Reconnection attempt failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Reconnection task failed");
                false
            }
        }
    }

    fn retrieve_temporary_skeleton(&mut self) {
        let Some(mut handle) = self.session.take_modified_temporary_skeleton() else {
            return;
        };
        if handle.session_id == 0 {
            handle.session_id = self.session.session_id().unwrap_or_default();
        }
        match self.host.get_temporary_skeleton(handle) {
            Ok(()) => debug!(index = handle.index, "Retrieved modified temporary skeleton"),
            Err(status) => {
                warn!(index = handle.index, %status, "Failed to retrieve temporary skeleton")
            }
        }
    }

    fn publish_status(&self) {
        let state = self.lifecycle.state();
        let status = LifecycleStatus {
            state: state.name().to_string(),
            mode: self.lifecycle.mode(),
            host: self
                .session
                .host()
                .or(self.lifecycle.last_host())
                .map(ToString::to_string),
            session_id: self.session.session_id(),
            hosts_found: match state {
                LifecycleState::SelectingHost { hosts } => hosts.len(),
                _ => 0,
            },
            reconnect_attempt: match state {
                LifecycleState::Reconnecting { attempt, .. } => Some(*attempt),
                _ => None,
            },
            last_error: self.last_error.clone(),
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    /// Ticks until cancelled or a fatal error, then shuts the SDK down.
    ///
    /// Retryable errors are logged and the next tick tries again; after
    /// `MAX_CONSECUTIVE_ERRORS` of them in a row the loop stops with the last one.
    pub async fn run<T: TickHandler>(mut self, mut handler: T) -> Result<()> {
        let cancel = self.cancel.clone();
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick_ms = self.config.tick_interval_ms, "Client loop started");

        let mut error_count = 0u32;
        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Client loop cancelled");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    match self.step(&mut handler).await {
                        Ok(()) => error_count = 0,
                        Err(e) if e.is_retryable() && error_count + 1 < MAX_CONSECUTIVE_ERRORS => {
                            error_count += 1;
                            warn!(
                                "Tick failed ({}/{}): {}",
                                error_count, MAX_CONSECUTIVE_ERRORS, e
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "Client loop stopped");
                            break Err(e);
                        }
                    }
                }
            }
        };

        let shutdown = self.shutdown();
        info!("Client loop ended");
        result.and(shutdown)
    }

    /// Runs the loop on a new task.
    pub fn spawn<T: TickHandler + 'static>(self, handler: T) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run(handler))
    }
}

fn rig_error(step: &'static str) -> impl Fn(SdkStatus) -> ClientError {
    move |status| ClientError::Rig { step, status }
}

fn output_error(operation: &'static str) -> impl Fn(SdkStatus) -> ClientError {
    move |status| ClientError::Output { operation, status }
}

fn ignore(command: Option<Command>, state: &LifecycleState) {
    if let Some(command) = command {
        debug!(?command, %state, "Command does not apply here");
    }
}

fn discover_hosts<H: DeviceHost + ?Sized>(
    host: &H,
    timeout: Duration,
    local_only: bool,
) -> Result<Vec<HostDescriptor>> {
    let count = host
        .look_for_hosts(timeout, local_only)
        .map_err(|status| ClientError::discovery_failed("host lookup failed", Some(status)))?;
    if count == 0 {
        return Ok(Vec::new());
    }
    let hosts = host.available_hosts(count).map_err(|status| ClientError::HostList {
        reason: format!("reading {count} hosts failed: {status}"),
    })?;
    if hosts.len() != count as usize {
        return Err(ClientError::HostList {
            reason: format!("host reported {count} hosts but returned {}", hosts.len()),
        });
    }
    Ok(hosts)
}

fn connect_to<H: DeviceHost + ?Sized>(host: &H, target: &ConnectTarget) -> SdkResult<()> {
    match target {
        ConnectTarget::Host(descriptor) => host.connect_to_host(descriptor),
        ConnectTarget::PresetAddress => host.connect_to_preset_address(),
    }
}
