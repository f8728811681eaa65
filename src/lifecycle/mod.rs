//! Connection lifecycle state machine.
//!
//! [`ConnectionLifecycle`] is pure: it performs no I/O and never sleeps. The client feeds it
//! [`LifecycleEvent`]s produced by discovery, connect calls, operator commands and host
//! callbacks, and acts on the resulting [`LifecycleState`].
//!
//! ```text
//! SelectingConnectionMode ──▶ DiscoveringHosts ──▶ NoHostsFound ──(retry)──▶ SelectingConnectionMode
//!          │                        │
//!          │ (direct)               ├──(local)──▶ Connecting ──▶ Active ──▶ Disconnected ◀─┐
//!          └────────────────────────┼─────────────────▲                        │          │
//!                                   └──▶ SelectingHost ┘                        ▼          │
//!                                                                          Reconnecting ──┘
//! ```
//!
//! Transitions are committed only when they succeed. A (state, event) pair that is not
//! defined yields [`ClientError::InvalidTransition`] and leaves the state untouched.

mod budget;

pub use budget::ReconnectBudget;

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::sdk::SdkStatus;
use crate::types::HostDescriptor;
use crate::{ClientError, Result};

/// How the client reaches its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ConnectionMode {
    /// Discover hosts on this machine and connect to the first one.
    Local,
    /// Discover hosts on the network and let the operator pick one.
    Networked,
    /// Connect to the SDK's preconfigured address without discovery.
    Direct,
}

impl ConnectionMode {
    pub fn local_only(&self) -> bool {
        matches!(self, ConnectionMode::Local)
    }

    /// Whether losing the host starts reconnection without operator input.
    pub fn reconnects_automatically(&self) -> bool {
        matches!(self, ConnectionMode::Local | ConnectionMode::Direct)
    }
}

/// What a `Connecting` state connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    Host(HostDescriptor),
    PresetAddress,
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::Host(host) => write!(f, "{host}"),
            ConnectTarget::PresetAddress => f.write_str("preset address"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    SelectingConnectionMode,
    DiscoveringHosts { mode: ConnectionMode },
    NoHostsFound { since: Instant },
    SelectingHost { hosts: Vec<HostDescriptor> },
    Connecting { target: ConnectTarget },
    Active,
    Disconnected { since: Instant },
    Reconnecting { attempt: u32, disconnected_at: Instant },
}

impl LifecycleState {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::SelectingConnectionMode => "SelectingConnectionMode",
            LifecycleState::DiscoveringHosts { .. } => "DiscoveringHosts",
            LifecycleState::NoHostsFound { .. } => "NoHostsFound",
            LifecycleState::SelectingHost { .. } => "SelectingHost",
            LifecycleState::Connecting { .. } => "Connecting",
            LifecycleState::Active => "Active",
            LifecycleState::Disconnected { .. } => "Disconnected",
            LifecycleState::Reconnecting { .. } => "Reconnecting",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    ModeSelected(ConnectionMode),
    HostsDiscovered(Vec<HostDescriptor>),
    DiscoveryFailed,
    RetryRequested,
    HostPicked(usize),
    ConnectSucceeded,
    /// The host was reachable but declined the session.
    ConnectRefused,
    ConnectFailed(SdkStatus),
    /// Host-side connection acknowledgement, delivered out of band.
    HostConnected(HostDescriptor),
    /// Host-side disconnection, delivered out of band.
    HostDisconnected { host: HostDescriptor, at: Instant },
    ReconnectStarted,
    ReconnectAttemptFailed,
    ReconnectSucceeded,
    ReconnectExhausted,
    /// The reconnection loop was abandoned before its budget ran out.
    ReconnectCancelled,
    NewHostRequested,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::ModeSelected(_) => "ModeSelected",
            LifecycleEvent::HostsDiscovered(_) => "HostsDiscovered",
            LifecycleEvent::DiscoveryFailed => "DiscoveryFailed",
            LifecycleEvent::RetryRequested => "RetryRequested",
            LifecycleEvent::HostPicked(_) => "HostPicked",
            LifecycleEvent::ConnectSucceeded => "ConnectSucceeded",
            LifecycleEvent::ConnectRefused => "ConnectRefused",
            LifecycleEvent::ConnectFailed(_) => "ConnectFailed",
            LifecycleEvent::HostConnected(_) => "HostConnected",
            LifecycleEvent::HostDisconnected { .. } => "HostDisconnected",
            LifecycleEvent::ReconnectStarted => "ReconnectStarted",
            LifecycleEvent::ReconnectAttemptFailed => "ReconnectAttemptFailed",
            LifecycleEvent::ReconnectSucceeded => "ReconnectSucceeded",
            LifecycleEvent::ReconnectExhausted => "ReconnectExhausted",
            LifecycleEvent::ReconnectCancelled => "ReconnectCancelled",
            LifecycleEvent::NewHostRequested => "NewHostRequested",
        }
    }
}

/// The lifecycle state plus the context that outlives individual states.
#[derive(Debug, Clone)]
pub struct ConnectionLifecycle {
    state: LifecycleState,
    mode: Option<ConnectionMode>,
    last_host: Option<HostDescriptor>,
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionLifecycle {
    pub fn new() -> Self {
        Self { state: LifecycleState::SelectingConnectionMode, mode: None, last_host: None }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// Mode chosen in `SelectingConnectionMode`, kept until a new host is requested.
    pub fn mode(&self) -> Option<ConnectionMode> {
        self.mode
    }

    /// The host most recently connected to, disconnected from, or targeted.
    pub fn last_host(&self) -> Option<&HostDescriptor> {
        self.last_host.as_ref()
    }

    /// Fails exactly when [`apply`](Self::apply) would reject `event`, without applying it.
    pub fn check(&self, event: &LifecycleEvent) -> Result<()> {
        self.next_state(event).map(drop)
    }

    /// Applies `event` and returns the new state.
    ///
    /// On error the state and context are unchanged.
    pub fn apply(&mut self, event: LifecycleEvent) -> Result<&LifecycleState> {
        let next = self.next_state(&event)?;

        match event {
            LifecycleEvent::ModeSelected(mode) => self.mode = Some(mode),
            LifecycleEvent::HostConnected(host) | LifecycleEvent::HostDisconnected { host, .. } => {
                self.last_host = Some(host);
            }
            LifecycleEvent::NewHostRequested => {
                self.mode = None;
            }
            LifecycleEvent::ConnectSucceeded => {
                if let LifecycleState::Connecting { target: ConnectTarget::Host(host) } =
                    &self.state
                {
                    self.last_host = Some(host.clone());
                }
            }
            _ => {}
        }

        if next != self.state {
            info!(from = self.state.name(), to = next.name(), "Lifecycle transition");
        } else {
            debug!(state = next.name(), "Lifecycle event left state unchanged");
        }
        self.state = next;
        Ok(&self.state)
    }

    fn next_state(&self, event: &LifecycleEvent) -> Result<LifecycleState> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        let next = match (&self.state, event) {
            (S::SelectingConnectionMode, E::ModeSelected(mode)) => match mode {
                ConnectionMode::Direct => S::Connecting { target: ConnectTarget::PresetAddress },
                mode => S::DiscoveringHosts { mode: *mode },
            },

            (S::DiscoveringHosts { mode }, E::HostsDiscovered(hosts)) => match hosts.first() {
                None => S::NoHostsFound { since: Instant::now() },
                Some(first) if mode.local_only() => {
                    S::Connecting { target: ConnectTarget::Host(first.clone()) }
                }
                Some(_) => S::SelectingHost { hosts: hosts.clone() },
            },
            (S::DiscoveringHosts { .. }, E::DiscoveryFailed) => {
                S::NoHostsFound { since: Instant::now() }
            }

            (S::NoHostsFound { .. } | S::SelectingHost { .. }, E::RetryRequested) => {
                S::SelectingConnectionMode
            }

            (S::SelectingHost { hosts }, E::HostPicked(index)) => match hosts.get(*index) {
                Some(host) => S::Connecting { target: ConnectTarget::Host(host.clone()) },
                None => {
                    return Err(ClientError::InvalidHostIndex {
                        index: *index,
                        available: hosts.len(),
                    });
                }
            },

            (S::Connecting { .. }, E::ConnectSucceeded) => S::Active,
            (S::Connecting { .. }, E::ConnectRefused) => S::NoHostsFound { since: Instant::now() },
            (S::Connecting { target }, E::ConnectFailed(status)) => {
                return Err(ClientError::connection_failed(target.to_string(), *status));
            }

            // Host acknowledgements are accepted in every state. Only a lost session is
            // resumed by them.
            (S::Disconnected { .. } | S::Reconnecting { .. }, E::HostConnected(_)) => S::Active,
            (state, E::HostConnected(_)) => state.clone(),

            (S::Active, E::HostDisconnected { at, .. }) => S::Disconnected { since: *at },
            (state, E::HostDisconnected { .. }) => state.clone(),

            (S::Disconnected { since }, E::ReconnectStarted) => {
                S::Reconnecting { attempt: 1, disconnected_at: *since }
            }
            (S::Reconnecting { attempt, disconnected_at }, E::ReconnectAttemptFailed) => {
                S::Reconnecting { attempt: attempt + 1, disconnected_at: *disconnected_at }
            }
            (S::Reconnecting { .. }, E::ReconnectSucceeded) => S::Active,
            (
                S::Reconnecting { disconnected_at, .. },
                E::ReconnectExhausted | E::ReconnectCancelled,
            ) => S::Disconnected { since: *disconnected_at },
            (S::Disconnected { .. }, E::NewHostRequested) => S::SelectingConnectionMode,

            (state, event) => {
                return Err(ClientError::InvalidTransition {
                    state: state.name(),
                    event: event.name(),
                });
            }
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HostVersion;

    fn host(name: &str) -> HostDescriptor {
        HostDescriptor::new(name, format!("{name}.local"), HostVersion::new(2, 0, 0))
    }

    fn lifecycle_in(state: LifecycleState) -> ConnectionLifecycle {
        ConnectionLifecycle { state, mode: Some(ConnectionMode::Networked), last_host: None }
    }

    fn all_states() -> Vec<LifecycleState> {
        let now = Instant::now();
        vec![
            LifecycleState::SelectingConnectionMode,
            LifecycleState::DiscoveringHosts { mode: ConnectionMode::Networked },
            LifecycleState::NoHostsFound { since: now },
            LifecycleState::SelectingHost { hosts: vec![host("a")] },
            LifecycleState::Connecting { target: ConnectTarget::PresetAddress },
            LifecycleState::Active,
            LifecycleState::Disconnected { since: now },
            LifecycleState::Reconnecting { attempt: 1, disconnected_at: now },
        ]
    }

    fn all_events() -> Vec<LifecycleEvent> {
        vec![
            LifecycleEvent::ModeSelected(ConnectionMode::Networked),
            LifecycleEvent::HostsDiscovered(vec![host("a")]),
            LifecycleEvent::DiscoveryFailed,
            LifecycleEvent::RetryRequested,
            LifecycleEvent::HostPicked(0),
            LifecycleEvent::ConnectSucceeded,
            LifecycleEvent::ConnectRefused,
            LifecycleEvent::ConnectFailed(SdkStatus::Error),
            LifecycleEvent::HostConnected(host("a")),
            LifecycleEvent::HostDisconnected { host: host("a"), at: Instant::now() },
            LifecycleEvent::ReconnectStarted,
            LifecycleEvent::ReconnectAttemptFailed,
            LifecycleEvent::ReconnectSucceeded,
            LifecycleEvent::ReconnectExhausted,
            LifecycleEvent::ReconnectCancelled,
            LifecycleEvent::NewHostRequested,
        ]
    }

    #[test]
    fn networked_discovery_reaches_active() {
        let mut lifecycle = ConnectionLifecycle::new();
        lifecycle.apply(LifecycleEvent::ModeSelected(ConnectionMode::Networked)).unwrap();
        lifecycle.apply(LifecycleEvent::HostsDiscovered(vec![host("a"), host("b")])).unwrap();
        assert!(matches!(
            lifecycle.state(),
            LifecycleState::SelectingHost { hosts } if hosts.len() == 2
        ));

        lifecycle.apply(LifecycleEvent::HostPicked(1)).unwrap();
        assert_eq!(
            lifecycle.state(),
            &LifecycleState::Connecting { target: ConnectTarget::Host(host("b")) }
        );

        lifecycle.apply(LifecycleEvent::ConnectSucceeded).unwrap();
        assert!(lifecycle.state().is_active());
        assert_eq!(lifecycle.last_host(), Some(&host("b")));
        assert_eq!(lifecycle.mode(), Some(ConnectionMode::Networked));
    }

    #[test]
    fn local_mode_connects_to_first_host_without_selection() {
        let mut lifecycle = ConnectionLifecycle::new();
        lifecycle.apply(LifecycleEvent::ModeSelected(ConnectionMode::Local)).unwrap();
        lifecycle.apply(LifecycleEvent::HostsDiscovered(vec![host("a"), host("b")])).unwrap();

        assert_eq!(
            lifecycle.state(),
            &LifecycleState::Connecting { target: ConnectTarget::Host(host("a")) }
        );
    }

    #[test]
    fn direct_mode_skips_discovery() {
        let mut lifecycle = ConnectionLifecycle::new();
        lifecycle.apply(LifecycleEvent::ModeSelected(ConnectionMode::Direct)).unwrap();

        assert_eq!(
            lifecycle.state(),
            &LifecycleState::Connecting { target: ConnectTarget::PresetAddress }
        );
    }

    #[test]
    fn empty_or_failed_discovery_leads_to_no_hosts_found() {
        let outcomes =
            [LifecycleEvent::HostsDiscovered(Vec::new()), LifecycleEvent::DiscoveryFailed];
        for event in outcomes {
            let mut lifecycle = lifecycle_in(LifecycleState::DiscoveringHosts {
                mode: ConnectionMode::Networked,
            });
            lifecycle.apply(event).unwrap();
            assert!(matches!(lifecycle.state(), LifecycleState::NoHostsFound { .. }));

            lifecycle.apply(LifecycleEvent::RetryRequested).unwrap();
            assert_eq!(lifecycle.state(), &LifecycleState::SelectingConnectionMode);
        }
    }

    #[test]
    fn refused_connection_routes_to_no_hosts_found() {
        let mut lifecycle =
            lifecycle_in(LifecycleState::Connecting { target: ConnectTarget::Host(host("a")) });
        lifecycle.apply(LifecycleEvent::ConnectRefused).unwrap();
        assert!(matches!(lifecycle.state(), LifecycleState::NoHostsFound { .. }));
    }

    #[test]
    fn generic_connect_failure_is_surfaced_and_state_kept() {
        let connecting = LifecycleState::Connecting { target: ConnectTarget::Host(host("a")) };
        let mut lifecycle = lifecycle_in(connecting.clone());

        let err =
            lifecycle.apply(LifecycleEvent::ConnectFailed(SdkStatus::InternalError)).unwrap_err();
        assert!(matches!(err, ClientError::Connection { status: SdkStatus::InternalError, .. }));
        assert_eq!(lifecycle.state(), &connecting);
    }

    #[test]
    fn out_of_range_host_index_is_recoverable() {
        let selecting = LifecycleState::SelectingHost { hosts: vec![host("a")] };
        let mut lifecycle = lifecycle_in(selecting.clone());

        let err = lifecycle.apply(LifecycleEvent::HostPicked(3)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidHostIndex { index: 3, available: 1 }));
        assert!(err.is_retryable());
        assert_eq!(lifecycle.state(), &selecting);
    }

    #[test]
    fn disconnect_timestamps_and_repeat_is_idempotent() {
        let mut lifecycle = lifecycle_in(LifecycleState::Active);
        let first = Instant::now();
        lifecycle
            .apply(LifecycleEvent::HostDisconnected { host: host("a"), at: first })
            .unwrap();
        assert_eq!(lifecycle.state(), &LifecycleState::Disconnected { since: first });

        let later = first + std::time::Duration::from_millis(50);
        lifecycle
            .apply(LifecycleEvent::HostDisconnected { host: host("b"), at: later })
            .unwrap();
        assert_eq!(lifecycle.state(), &LifecycleState::Disconnected { since: first });
        assert_eq!(lifecycle.last_host(), Some(&host("b")));
    }

    #[test]
    fn reconnect_sub_loop_counts_attempts_and_returns_to_disconnected() {
        let since = Instant::now();
        let mut lifecycle = lifecycle_in(LifecycleState::Disconnected { since });

        lifecycle.apply(LifecycleEvent::ReconnectStarted).unwrap();
        lifecycle.apply(LifecycleEvent::ReconnectAttemptFailed).unwrap();
        lifecycle.apply(LifecycleEvent::ReconnectAttemptFailed).unwrap();
        assert_eq!(
            lifecycle.state(),
            &LifecycleState::Reconnecting { attempt: 3, disconnected_at: since }
        );

        lifecycle.apply(LifecycleEvent::ReconnectExhausted).unwrap();
        assert_eq!(lifecycle.state(), &LifecycleState::Disconnected { since });
    }

    #[test]
    fn cancelled_reconnection_returns_to_disconnected() {
        let since = Instant::now();
        let mut lifecycle = lifecycle_in(LifecycleState::Disconnected { since });
        lifecycle.apply(LifecycleEvent::ReconnectStarted).unwrap();
        lifecycle.apply(LifecycleEvent::ReconnectAttemptFailed).unwrap();

        lifecycle.apply(LifecycleEvent::ReconnectCancelled).unwrap();
        assert_eq!(lifecycle.state(), &LifecycleState::Disconnected { since });

        let mut active = lifecycle_in(LifecycleState::Active);
        assert!(active.apply(LifecycleEvent::ReconnectCancelled).is_err());
    }

    #[test]
    fn host_connected_resumes_lost_sessions_only() {
        let now = Instant::now();
        for state in [
            LifecycleState::Disconnected { since: now },
            LifecycleState::Reconnecting { attempt: 2, disconnected_at: now },
        ] {
            let mut lifecycle = lifecycle_in(state);
            lifecycle.apply(LifecycleEvent::HostConnected(host("a"))).unwrap();
            assert!(lifecycle.state().is_active());
            assert_eq!(lifecycle.last_host(), Some(&host("a")));
        }

        let connecting = LifecycleState::Connecting { target: ConnectTarget::PresetAddress };
        let mut lifecycle = lifecycle_in(connecting.clone());
        lifecycle.apply(LifecycleEvent::HostConnected(host("a"))).unwrap();
        assert_eq!(lifecycle.state(), &connecting);
    }

    #[test]
    fn new_host_request_clears_mode() {
        let mut lifecycle = lifecycle_in(LifecycleState::Disconnected { since: Instant::now() });
        lifecycle.apply(LifecycleEvent::NewHostRequested).unwrap();

        assert_eq!(lifecycle.state(), &LifecycleState::SelectingConnectionMode);
        assert_eq!(lifecycle.mode(), None);
    }

    #[test]
    fn every_state_event_pair_yields_one_state_or_a_reported_error() {
        for state in all_states() {
            for event in all_events() {
                let mut lifecycle = lifecycle_in(state.clone());
                let name = event.name();
                let accepted = lifecycle.check(&event).is_ok();
                assert_eq!(lifecycle.state(), &state);
                let mut trial = lifecycle.clone();
                let applied = trial.apply(event.clone()).is_ok();
                assert_eq!(applied, accepted, "{} + {name}", state.name());

                match lifecycle.apply(event) {
                    Ok(_) => {}
                    Err(ClientError::InvalidTransition { state: s, event: e }) => {
                        assert_eq!(s, state.name());
                        assert_eq!(e, name);
                        assert_eq!(lifecycle.state(), &state);
                    }
                    Err(ClientError::Connection { .. }) => {
                        assert_eq!(name, "ConnectFailed");
                        assert_eq!(lifecycle.state(), &state);
                    }
                    Err(other) => panic!("{} + {} produced {other}", state.name(), name),
                }
            }
        }
    }

    #[test]
    fn undefined_pairs_are_fatal() {
        let mut lifecycle = lifecycle_in(LifecycleState::Active);
        let err = lifecycle.apply(LifecycleEvent::HostPicked(0)).unwrap_err();

        assert!(matches!(
            err,
            ClientError::InvalidTransition { state: "Active", event: "HostPicked" }
        ));
        assert!(err.is_fatal());
    }
}
