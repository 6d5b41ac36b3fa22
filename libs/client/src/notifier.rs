//! Once-only failure notifications for open streams
//!
//! Listeners are always invoked after every registry and dispatcher lock has
//! been released, so a listener may call straight back into the client.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error};

use crate::client::FsClient;
use crate::registry::{StreamDescriptor, StreamRegistry};

/// What happened to a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The connection died, or was already down when the listener registered
    ConnectionLost,
    /// The server reported a failure for this stream
    RemoteError { message: String },
}

/// Receives at most one [`StreamEvent`]
pub trait StreamEventListener: Send + Sync {
    fn on_event(&self, event: &StreamEvent);
}

impl<F> StreamEventListener for F
where
    F: Fn(&StreamEvent) + Send + Sync,
{
    fn on_event(&self, event: &StreamEvent) {
        self(event)
    }
}

impl FsClient {
    /// Watch a stream for connection loss or server-side failure
    ///
    /// If the connection is already down the listener runs before this
    /// returns. A listener for a stream that was closed on a live connection
    /// is dropped without being called.
    pub fn add_event_listener(
        &self,
        desc: &StreamDescriptor,
        listener: impl StreamEventListener + 'static,
    ) {
        let listener: Box<dyn StreamEventListener> = Box::new(listener);
        let conn = self.connection();
        match conn.if_live(listener, |listener| {
            conn.registry().add_listener(desc.local_id(), listener)
        }) {
            Ok(Ok(())) => {}
            Ok(Err(_unknown)) => {
                debug!(stream = desc.local_id(), "Stream already closed, listener dropped");
            }
            Err(listener) => {
                debug!(stream = desc.local_id(), "Connection already down, notifying inline");
                deliver(listener.as_ref(), &StreamEvent::ConnectionLost);
            }
        }
    }

    /// Drop every listener of a stream; a no-op when there are none
    pub fn remove_event_listener(&self, desc: &StreamDescriptor) {
        let removed = self.connection().registry().take_listeners(desc.local_id());
        debug!(stream = desc.local_id(), removed = removed.len(), "Removed stream listeners");
    }
}

/// Tell every listener of every stream that the connection is gone and
/// forget all streams
pub(crate) fn notify_connection_lost(registry: &StreamRegistry) {
    let entries = registry.drain();
    let listeners: usize = entries.iter().map(|entry| entry.listeners.len()).sum();
    debug!(streams = entries.len(), listeners, "Notifying stream listeners of connection loss");

    for entry in entries {
        for listener in entry.listeners {
            deliver(listener.as_ref(), &StreamEvent::ConnectionLost);
        }
    }
}

/// Deliver a server-side stream failure to that stream's listeners
pub(crate) fn notify_stream_error(registry: &StreamRegistry, server_id: u64, message: &str) {
    let listeners = registry.take_listeners_by_server_id(server_id);
    if listeners.is_empty() {
        debug!(server_stream = server_id, message, "Stream notice with no listeners");
        return;
    }

    let event = StreamEvent::RemoteError {
        message: message.to_string(),
    };
    for listener in listeners {
        deliver(listener.as_ref(), &event);
    }
}

fn deliver(listener: &dyn StreamEventListener, event: &StreamEvent) {
    if panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
        error!(?event, "Stream event listener panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StreamMode;
    use ripplefs_core::FsPath;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn open_stream(registry: &StreamRegistry, server_id: u64) -> StreamDescriptor {
        let desc = StreamDescriptor::new(
            registry.allocate_id(),
            server_id,
            FsPath::new("/x").unwrap(),
            StreamMode::Write,
            None,
            None,
        );
        registry.register(desc.clone());
        desc
    }

    #[test]
    fn connection_loss_fires_each_listener_once() {
        let registry = StreamRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        for server_id in 0..2 {
            let desc = open_stream(&registry, server_id);
            let fired = fired.clone();
            let added = registry.add_listener(
                desc.local_id(),
                Box::new(move |event: &StreamEvent| {
                    assert_eq!(event, &StreamEvent::ConnectionLost);
                    fired.fetch_add(1, Ordering::SeqCst);
                }),
            );
            assert!(added.is_ok());
        }

        notify_connection_lost(&registry);
        notify_connection_lost(&registry);

        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn stream_error_reaches_only_that_stream() {
        let registry = StreamRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for server_id in [5, 6] {
            let desc = open_stream(&registry, server_id);
            let seen = seen.clone();
            let added = registry.add_listener(
                desc.local_id(),
                Box::new(move |event: &StreamEvent| {
                    seen.lock().unwrap().push((server_id, event.clone()));
                }),
            );
            assert!(added.is_ok());
        }

        notify_stream_error(&registry, 6, "disk full");
        notify_stream_error(&registry, 6, "disk full again");

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(
                6,
                StreamEvent::RemoteError {
                    message: "disk full".to_string()
                }
            )]
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_sweep() {
        let registry = StreamRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let first = open_stream(&registry, 1);
        let second = open_stream(&registry, 2);
        assert!(registry
            .add_listener(first.local_id(), Box::new(|_: &StreamEvent| panic!("boom")))
            .is_ok());
        let counter = fired.clone();
        assert!(registry
            .add_listener(
                second.local_id(),
                Box::new(move |_: &StreamEvent| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .is_ok());

        notify_connection_lost(&registry);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
