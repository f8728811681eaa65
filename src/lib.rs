//! Session client for motion-capture device hosts.
//!
//! Corelink connects to a device host (the service that owns gloves, trackers and
//! retargeted skeletons), keeps that connection alive, and hands the host's data streams
//! to a single consumer loop without ever blocking the host's callback threads.
//!
//! # Features
//!
//! - **Latest-wins hand-off**: each stream kind has one slot; a newer snapshot replaces an
//!   untaken one, so a slow consumer sees fresh data instead of a backlog
//! - **Connection lifecycle**: discovery, host selection, refusals and disconnects modelled
//!   as an explicit state machine
//! - **Bounded reconnection**: attempt and time budgets, automatic or operator-driven
//! - **Output**: finger haptics for the first glove on each hand or a loaded skeleton,
//!   and tracker data fed back to the host
//! - **Host abstraction**: everything goes through the [`DeviceHost`] trait, so the client
//!   runs the same against a vendor SDK binding or an in-memory fake
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use corelink::{Client, ClientConfig, DeviceHost, LifecycleState, SessionState, TickUpdates};
//!
//! async fn stream<H: DeviceHost>(host: Arc<H>) -> corelink::Result<()> {
//!     let (client, handle) = Client::initialize(host, ClientConfig::headless())?;
//!
//!     let task = client.spawn(|session: &SessionState, _: &LifecycleState, updates: TickUpdates| {
//!         if updates.contains(TickUpdates::SKELETON) {
//!             if let Some(skeletons) = session.skeletons() {
//!                 println!("{} skeletons", skeletons.len());
//!             }
//!         }
//!     });
//!
//!     tokio::time::sleep(Duration::from_secs(60)).await;
//!     handle.shutdown();
//!     task.await.expect("client task")
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Host boundary
pub mod config;
pub mod sdk;

// Stream hand-off and connection management
pub mod client;
pub mod ingest;
pub mod lifecycle;
pub mod session;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

pub use client::{Client, ClientHandle, Command, LifecycleStatus, ReconnectOutcome, TickHandler};
pub use config::{ClientConfig, DiscoveryConfig, ReconnectPolicy};
pub use ingest::{ErrorSink, HostEvent, StreamIngestor, TracingErrorSink};
pub use lifecycle::{
    ConnectTarget, ConnectionLifecycle, ConnectionMode, LifecycleEvent, LifecycleState,
    ReconnectBudget,
};
pub use sdk::{CoordinateSystem, DeviceHost, HostCallback, SdkResult, SdkStatus, SessionKind};
pub use session::{SessionState, TickUpdates};
pub use stream::{StreamBuffer, StreamBuffers, StreamKind};
