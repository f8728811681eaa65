//! Device host identity and version information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic version reported by a device host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl HostVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A device host found during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct HostDescriptor {
    /// Host name as advertised by the host.
    pub name: String,
    /// Network address, `"localhost"` style for local hosts.
    pub address: String,
    pub version: HostVersion,
}

impl HostDescriptor {
    pub fn new(name: impl Into<String>, address: impl Into<String>, version: HostVersion) -> Self {
        Self { name: name.into(), address: address.into(), version }
    }
}

impl fmt::Display for HostDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, v{})", self.name, self.address, self.version)
    }
}

/// SDK and host versions reported after a connection is established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct VersionCompatibility {
    pub sdk_version: String,
    pub host_version: String,
    /// Whether the host accepts this SDK version without degraded behaviour.
    pub compatible: bool,
}
