//! Error types for the device-host session client.
//!
//! This module provides the error handling for the whole client. Every failure is
//! represented as an explicit [`ClientError`] value; nothing panics past its own
//! boundary.
//!
//! ## Error Categories
//!
//! - **Initialization Errors**: SDK start-up, callback registration, coordinate system
//! - **Discovery Errors**: host lookup failed or timed out
//! - **Connection Errors**: a host refused the session, or the connect call failed
//! - **Stream Errors**: a per-event pull from the host failed (the event is dropped)
//! - **Reconnection Errors**: the retry budget ran out
//! - **Lifecycle Errors**: an event arrived that the current state does not define
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use corelink::ClientError;
//!
//! let error = ClientError::connection_refused("studio-core");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::sdk::SdkStatus;
use crate::stream::StreamKind;

/// Result type alias for client operations.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Main error type for client operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClientError {
    #[error("Initialization failed while {step}: {status}")]
    Initialization { step: String, status: SdkStatus },

    #[error("Host discovery failed: {reason}")]
    Discovery { reason: String, status: Option<SdkStatus> },

    #[error("Host list is unusable: {reason}")]
    HostList { reason: String },

    #[error("Host {host} is reachable but refused the connection")]
    ConnectionRefused { host: String },

    #[error("Failed to connect to {target}: {status}")]
    Connection { target: String, status: SdkStatus },

    #[error("Failed to pull {kind} data: {context}")]
    StreamPull {
        kind: StreamKind,
        context: String,
        #[source]
        source: SdkStatus,
    },

    #[error("Reconnection gave up after {attempts} attempts in {elapsed:?}")]
    ReconnectionExhausted { attempts: u32, elapsed: Duration },

    #[error("Event '{event}' is not defined in state '{state}'")]
    InvalidTransition { state: &'static str, event: &'static str },

    #[error("Host index {index} is out of range ({available} hosts found)")]
    InvalidHostIndex { index: usize, available: usize },

    #[error("Failed to shut down the host SDK: {status}")]
    Shutdown { status: SdkStatus },

    #[error("Failed to restart the host session: {reason}")]
    Restart {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Skeleton setup failed at step '{step}': {status}")]
    Rig { step: &'static str, status: SdkStatus },

    #[error("Failed to {operation}: {status}")]
    Output { operation: &'static str, status: SdkStatus },

    #[error("Configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ClientError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Non-retryable errors are the pre-session and plumbing failures that end
    /// the current run.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Discovery { .. } => true,
            ClientError::ConnectionRefused { .. } => true,
            ClientError::Connection { .. } => true,
            ClientError::StreamPull { .. } => true,
            ClientError::ReconnectionExhausted { .. } => true,
            ClientError::InvalidHostIndex { .. } => true,
            ClientError::Rig { .. } => true,
            ClientError::Output { .. } => true,
            ClientError::Initialization { .. } => false,
            ClientError::HostList { .. } => false,
            ClientError::InvalidTransition { .. } => false,
            ClientError::Shutdown { .. } => false,
            ClientError::Restart { .. } => false,
            ClientError::Config { .. } => false,
        }
    }

    /// Returns whether this error ends the current run.
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ClientError::Initialization { .. } => vec![
                "Check that the host SDK library is installed and loadable",
                "Verify the coordinate system settings are valid",
                "Restart the client process",
            ],
            ClientError::Discovery { .. } => vec![
                "Ensure the device host is running",
                "Increase the discovery timeout",
                "Check that the network allows host discovery broadcasts",
            ],
            ClientError::HostList { .. } => vec![
                "Restart the device host",
                "Check host SDK and host versions are compatible",
            ],
            ClientError::ConnectionRefused { .. } => vec![
                "Retry discovery and pick the host again",
                "Check the host accepts new client sessions",
            ],
            ClientError::Connection { .. } => vec![
                "Verify the host address or preset address",
                "Check host SDK and host versions are compatible",
                "Retry the connection",
            ],
            ClientError::StreamPull { .. } => vec![
                "Wait for the next stream event",
                "Check the connection to the host is still active",
            ],
            ClientError::ReconnectionExhausted { .. } => vec![
                "Retry the reconnection manually",
                "Pick a new host",
                "Raise the reconnection attempt or duration budget",
            ],
            ClientError::InvalidTransition { .. } => vec![
                "Report the state and event pair as a bug",
                "Restart the client",
            ],
            ClientError::InvalidHostIndex { .. } => vec![
                "Pick an index from the listed hosts",
                "Retry discovery",
            ],
            ClientError::Shutdown { .. } => vec![
                "Terminate the client process",
                "Restart the device host",
            ],
            ClientError::Restart { .. } => vec![
                "Terminate and relaunch the client",
                "Check the host SDK can be re-initialized in this process",
            ],
            ClientError::Rig { .. } => vec![
                "Check node parent ids and chain node ids are consistent",
                "Verify the session is connected before uploading skeletons",
            ],
            ClientError::Output { .. } => vec![
                "Verify the session is connected",
                "Check the glove or dongle is still paired",
            ],
            ClientError::Config { .. } => vec![
                "Check the configuration file exists and is valid YAML",
                "Check durations are positive where required",
            ],
        }
    }

    /// Helper constructor for initialization failures.
    pub fn initialization_failed(step: impl Into<String>, status: SdkStatus) -> Self {
        ClientError::Initialization { step: step.into(), status }
    }

    /// Helper constructor for discovery failures.
    pub fn discovery_failed(reason: impl Into<String>, status: Option<SdkStatus>) -> Self {
        ClientError::Discovery { reason: reason.into(), status }
    }

    /// Helper constructor for refused connections.
    pub fn connection_refused(host: impl Into<String>) -> Self {
        ClientError::ConnectionRefused { host: host.into() }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(target: impl Into<String>, status: SdkStatus) -> Self {
        ClientError::Connection { target: target.into(), status }
    }

    /// Helper constructor for stream pull failures.
    pub fn stream_pull_failed(
        kind: StreamKind,
        context: impl Into<String>,
        source: SdkStatus,
    ) -> Self {
        ClientError::StreamPull { kind, context: context.into(), source }
    }

    /// Helper constructor for restart failures with a source.
    pub fn restart_failed(reason: impl Into<String>, source: ClientError) -> Self {
        ClientError::Restart { reason: reason.into(), source: Some(Box::new(source)) }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        ClientError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_error_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        ClientError::Config { reason: reason.into(), source: Some(source) }
    }
}
