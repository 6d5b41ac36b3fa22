use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;

/// Source of candidate coordinator endpoints
#[async_trait::async_trait]
pub trait AddressResolver: Send + Sync {
    /// Every endpoint currently known to the resolver
    async fn registered_addresses(&self) -> Result<BTreeSet<SocketAddr>>;

    /// Announce endpoints; resolvers whose membership is managed elsewhere
    /// accept and ignore this
    async fn register_addresses(&self, addrs: &[SocketAddr]) -> Result<()>;

    /// Withdraw endpoints
    async fn unregister_addresses(&self, addrs: &[SocketAddr]) -> Result<()>;
}

/// Resolver over an in-memory address set
#[derive(Debug, Default)]
pub struct StaticAddressResolver {
    addrs: Mutex<BTreeSet<SocketAddr>>,
}

impl StaticAddressResolver {
    pub fn new(addrs: impl IntoIterator<Item = SocketAddr>) -> Self {
        Self {
            addrs: Mutex::new(addrs.into_iter().collect()),
        }
    }
}

#[async_trait::async_trait]
impl AddressResolver for StaticAddressResolver {
    async fn registered_addresses(&self) -> Result<BTreeSet<SocketAddr>> {
        Ok(lock(&self.addrs).clone())
    }

    async fn register_addresses(&self, addrs: &[SocketAddr]) -> Result<()> {
        lock(&self.addrs).extend(addrs.iter().copied());
        Ok(())
    }

    async fn unregister_addresses(&self, addrs: &[SocketAddr]) -> Result<()> {
        let mut known = lock(&self.addrs);
        for addr in addrs {
            known.remove(addr);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
