use serde::{Deserialize, Serialize};

/// Where a byte range of a file is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocation {
    pub start: u64,
    pub length: u64,
    /// Host names able to serve the range
    pub hosts: Vec<String>,
    pub node_ids: Vec<String>,
}

impl BlockLocation {
    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.length)
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end()
    }
}
