use serde::{Deserialize, Serialize};

use crate::path::FsPath;

/// Aggregate counts for a subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSummary {
    pub path: FsPath,
    pub files_count: u64,
    pub directories_count: u64,
    pub total_length: u64,
}

/// Capacity report of the whole filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsStatus {
    pub used_space: u64,
    pub total_space: u64,
}

impl FsStatus {
    pub fn free_space(&self) -> u64 {
        self.total_space.saturating_sub(self.used_space)
    }
}

/// What the coordinator reports about itself when a client connects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub fs_name: String,
    pub block_size: u64,
    /// Server-side sampling override, `None` to leave the default
    pub sampling: Option<bool>,
    /// URI of the secondary filesystem in dual modes
    pub secondary_uri: Option<String>,
}
