use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use ripplefs_fabric::codec::Codec;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::protocol::{Reply, ReplyBody, ReplyKind, NO_REPLY_ID};

/// A command waiting for its reply
struct Pending {
    expected: ReplyKind,
    slot: oneshot::Sender<Result<Reply>>,
}

/// Correlates replies with the commands that are still in flight
///
/// Ids come from one monotonically increasing counter and are never reused.
pub(crate) struct Dispatcher {
    next_id: AtomicU64,
    pending: DashMap<u64, Pending>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(NO_REPLY_ID + 1),
            pending: DashMap::new(),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Track `id` and hand back the caller's side of its result slot
    pub(crate) fn insert(&self, id: u64, expected: ReplyKind) -> PendingCommand {
        let (slot, rx) = oneshot::channel();
        self.pending.insert(id, Pending { expected, slot });
        PendingCommand { id, rx }
    }

    /// Forget `id` without resolving it
    pub(crate) fn discard(&self, id: u64) {
        self.pending.remove(&id);
    }

    /// Route a reply body to the command it belongs to
    pub(crate) fn complete<C: Codec>(&self, id: u64, body: &[u8], codec: &C) {
        let Some((_, pending)) = self.pending.remove(&id) else {
            warn!(id, "Reply for unknown command id");
            return;
        };

        let result = match codec.decode::<ReplyBody>(body) {
            Ok(Ok(reply)) if reply.kind() == pending.expected => Ok(reply),
            Ok(Ok(reply)) => {
                warn!(id, expected = ?pending.expected, got = ?reply.kind(), "Reply of wrong kind");
                Err(ClientError::Protocol(format!(
                    "command {id} expected a {:?} reply, got {:?}",
                    pending.expected,
                    reply.kind()
                )))
            }
            Ok(Err(remote)) => Err(ClientError::Remote(remote)),
            Err(e) => {
                warn!(id, error = %e, "Undecodable reply body");
                Err(ClientError::Protocol(format!(
                    "undecodable reply to command {id}: {e}"
                )))
            }
        };

        if pending.slot.send(result).is_err() {
            debug!(id, "Caller detached before the reply arrived, discarding");
        }
    }

    /// Resolve every in-flight command with [`ClientError::ConnectionLost`]
    pub(crate) fn fail_all(&self, reason: &str) -> usize {
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending
                    .slot
                    .send(Err(ClientError::ConnectionLost(reason.to_string())));
                failed += 1;
            }
        }
        failed
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

/// Caller-side handle for one issued command
#[derive(Debug)]
pub struct PendingCommand {
    id: u64,
    rx: oneshot::Receiver<Result<Reply>>,
}

impl PendingCommand {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the reply
    ///
    /// On timeout only this caller gives up: the command stays registered
    /// until its reply arrives (and is dropped) or the connection fails.
    pub async fn wait(self, timeout: Option<Duration>) -> Result<Reply> {
        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.rx)
                .await
                .map_err(|_| ClientError::Timeout(limit))?,
            None => self.rx.await,
        };
        outcome.unwrap_or_else(|_| {
            Err(ClientError::ConnectionLost(
                "reply slot dropped without a result".to_string(),
            ))
        })
    }
}
