use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use ripplefs_core::FsPath;

use crate::error::{ClientError, Result};
use crate::lock;
use crate::notifier::StreamEventListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamMode {
    Read,
    Write,
}

/// Client-side handle of an open server stream
///
/// A plain value: copies refer to the same stream, and all of them go stale
/// once the stream is closed or the connection is lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    local_id: u64,
    server_id: u64,
    path: FsPath,
    mode: StreamMode,
    prefetch: Option<u32>,
    length: Option<u64>,
}

impl StreamDescriptor {
    pub(crate) fn new(
        local_id: u64,
        server_id: u64,
        path: FsPath,
        mode: StreamMode,
        prefetch: Option<u32>,
        length: Option<u64>,
    ) -> Self {
        Self {
            local_id,
            server_id,
            path,
            mode,
            prefetch,
            length,
        }
    }

    pub fn local_id(&self) -> u64 {
        self.local_id
    }

    pub fn server_id(&self) -> u64 {
        self.server_id
    }

    pub fn path(&self) -> &FsPath {
        &self.path
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Read-ahead setting requested on open, read streams only
    pub fn prefetch(&self) -> Option<u32> {
        self.prefetch
    }

    /// File length reported on open, read streams only
    pub fn length(&self) -> Option<u64> {
        self.length
    }
}

pub(crate) struct StreamEntry {
    pub(crate) descriptor: StreamDescriptor,
    pub(crate) listeners: Vec<Box<dyn StreamEventListener>>,
}

/// Open streams keyed by local id, each with its failure listeners
pub(crate) struct StreamRegistry {
    next_local_id: AtomicU64,
    streams: Mutex<HashMap<u64, StreamEntry>>,
}

impl StreamRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_local_id: AtomicU64::new(1),
            streams: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn allocate_id(&self) -> u64 {
        self.next_local_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register(&self, descriptor: StreamDescriptor) {
        lock(&self.streams).insert(
            descriptor.local_id,
            StreamEntry {
                descriptor,
                listeners: Vec::new(),
            },
        );
    }

    pub(crate) fn lookup(&self, local_id: u64) -> Result<StreamDescriptor> {
        lock(&self.streams)
            .get(&local_id)
            .map(|entry| entry.descriptor.clone())
            .ok_or(ClientError::StaleHandle(local_id))
    }

    /// Remove a stream and drop its listeners; `false` if it was already gone
    pub(crate) fn unregister(&self, local_id: u64) -> bool {
        lock(&self.streams).remove(&local_id).is_some()
    }

    /// Attach a listener, handing it back if the stream is unknown
    pub(crate) fn add_listener(
        &self,
        local_id: u64,
        listener: Box<dyn StreamEventListener>,
    ) -> std::result::Result<(), Box<dyn StreamEventListener>> {
        match lock(&self.streams).get_mut(&local_id) {
            Some(entry) => {
                entry.listeners.push(listener);
                Ok(())
            }
            None => Err(listener),
        }
    }

    /// Detach and return every listener of a stream
    pub(crate) fn take_listeners(&self, local_id: u64) -> Vec<Box<dyn StreamEventListener>> {
        lock(&self.streams)
            .get_mut(&local_id)
            .map(|entry| std::mem::take(&mut entry.listeners))
            .unwrap_or_default()
    }

    /// Detach the listeners of the stream with the given server-side id
    pub(crate) fn take_listeners_by_server_id(
        &self,
        server_id: u64,
    ) -> Vec<Box<dyn StreamEventListener>> {
        lock(&self.streams)
            .values_mut()
            .find(|entry| entry.descriptor.server_id == server_id)
            .map(|entry| std::mem::take(&mut entry.listeners))
            .unwrap_or_default()
    }

    /// Empty the registry, returning what it held
    pub(crate) fn drain(&self) -> Vec<StreamEntry> {
        lock(&self.streams).drain().map(|(_, entry)| entry).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.streams).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::StreamEvent;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn descriptor(registry: &StreamRegistry, server_id: u64) -> StreamDescriptor {
        StreamDescriptor::new(
            registry.allocate_id(),
            server_id,
            FsPath::new("/f").unwrap(),
            StreamMode::Read,
            None,
            Some(0),
        )
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Box<dyn StreamEventListener> {
        let counter = counter.clone();
        Box::new(move |_: &StreamEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn lookup_after_unregister_is_stale() {
        let registry = StreamRegistry::new();
        let desc = descriptor(&registry, 10);
        registry.register(desc.clone());

        assert_eq!(registry.lookup(desc.local_id()).unwrap(), desc);
        assert!(registry.unregister(desc.local_id()));
        assert!(!registry.unregister(desc.local_id()));
        assert_eq!(
            registry.lookup(desc.local_id()),
            Err(ClientError::StaleHandle(desc.local_id()))
        );
    }

    #[test]
    fn listener_on_unknown_stream_is_returned() {
        let registry = StreamRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let rejected = registry.add_listener(42, counting(&counter));
        assert!(rejected.is_err());
    }

    #[test]
    fn listeners_are_taken_once() {
        let registry = StreamRegistry::new();
        let desc = descriptor(&registry, 77);
        registry.register(desc.clone());
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(registry.add_listener(desc.local_id(), counting(&counter)).is_ok());
        assert!(registry.add_listener(desc.local_id(), counting(&counter)).is_ok());

        assert_eq!(registry.take_listeners_by_server_id(77).len(), 2);
        assert!(registry.take_listeners_by_server_id(77).is_empty());
        assert!(registry.take_listeners(desc.local_id()).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn drain_empties_the_registry() {
        let registry = StreamRegistry::new();
        for server_id in 0..3 {
            registry.register(descriptor(&registry, server_id));
        }
        assert_eq!(registry.drain().len(), 3);
        assert_eq!(registry.len(), 0);
        assert!(registry.drain().is_empty());
    }
}
