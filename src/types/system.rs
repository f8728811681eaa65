//! Host system messages.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum SystemMessageKind {
    #[default]
    Unknown,
    LibDebugReplugged,
    LibDebugRetargeted,
    TemporarySkeletonModified,
    Other(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SystemMessage {
    pub kind: SystemMessageKind,
    pub text: String,
    /// Kind-specific payload. For [`SystemMessageKind::TemporarySkeletonModified`] this is
    /// the index of the modified temporary skeleton.
    pub info: u32,
}
