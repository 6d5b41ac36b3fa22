use serde::{Deserialize, Serialize};

use crate::path::FsPath;
use crate::props::Properties;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Directory,
}

/// Metadata snapshot of a file or directory
///
/// Times are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: FsPath,
    pub kind: FileKind,
    /// Length in bytes, always zero for directories
    pub length: u64,
    pub block_size: u32,
    /// Number of consecutive blocks placed on the same node
    pub group_block_size: u64,
    pub access_time: i64,
    pub modification_time: i64,
    pub properties: Properties,
}

impl FileInfo {
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Number of blocks the content spans
    pub fn block_count(&self) -> u64 {
        if self.block_size == 0 {
            return 0;
        }
        self.length.div_ceil(u64::from(self.block_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(length: u64, block_size: u32) -> FileInfo {
        FileInfo {
            path: FsPath::new("/f").unwrap(),
            kind: FileKind::File,
            length,
            block_size,
            group_block_size: 1,
            access_time: 0,
            modification_time: 0,
            properties: Properties::new(),
        }
    }

    #[test]
    fn block_count_rounds_up() {
        assert_eq!(file(0, 64).block_count(), 0);
        assert_eq!(file(64, 64).block_count(), 1);
        assert_eq!(file(65, 64).block_count(), 2);
        assert_eq!(file(65, 0).block_count(), 0);
        assert!(file(1, 1).is_file());
    }
}
