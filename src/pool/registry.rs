//! Named pools and the per-request set of checked-out handles.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::pool::resource_pool::{PoolError, PoolStats, PooledHandle, ResourcePool};

/// A checked-out handle with its resource type erased.
pub trait ErasedHandle: Send + Sync {
    fn id(&self) -> u64;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn release(self: Box<Self>);
    fn discard(self: Box<Self>);
}

impl<T: Send + Sync + 'static> ErasedHandle for PooledHandle<T> {
    fn id(&self) -> u64 {
        PooledHandle::id(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn release(self: Box<Self>) {
        (*self).release();
    }

    fn discard(self: Box<Self>) {
        (*self).discard();
    }
}

/// A pool of any resource type, addressed by its logical name.
#[async_trait]
pub trait PoolSource: Send + Sync {
    fn name(&self) -> &str;
    async fn checkout(&self) -> Result<Box<dyn ErasedHandle>, PoolError>;
    fn stats(&self) -> PoolStats;
    fn close(&self);
}

#[async_trait]
impl<T: Send + Sync + 'static> PoolSource for ResourcePool<T> {
    fn name(&self) -> &str {
        ResourcePool::name(self)
    }

    async fn checkout(&self) -> Result<Box<dyn ErasedHandle>, PoolError> {
        let handle = self.acquire().await?;
        Ok(Box::new(handle))
    }

    fn stats(&self) -> PoolStats {
        ResourcePool::stats(self)
    }

    fn close(&self) {
        ResourcePool::close(self)
    }
}

/// Process-wide registry of pools, checked out in registration order.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    pools: Vec<Arc<dyn PoolSource>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool under its own name.
    pub fn register<T: Send + Sync + 'static>(&mut self, pool: ResourcePool<T>) -> &mut Self {
        self.pools.push(Arc::new(pool));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PoolSource>> {
        self.pools.iter().find(|p| p.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pools.iter().map(|p| p.name())
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Check out one handle from every pool into `set`.
    ///
    /// Stops at the first failure; handles already placed in `set` stay
    /// there for the caller to return.
    pub async fn acquire_into(&self, set: &mut ResourceSet) -> Result<(), PoolError> {
        for pool in &self.pools {
            let handle = pool.checkout().await?;
            set.insert(pool.name(), handle);
        }
        Ok(())
    }

    pub fn stats(&self) -> Vec<(String, PoolStats)> {
        self.pools
            .iter()
            .map(|p| (p.name().to_string(), p.stats()))
            .collect()
    }

    pub fn close_all(&self) {
        for pool in &self.pools {
            pool.close();
        }
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Handles checked out for one request, looked up by logical name.
///
/// Anything still held when the set is dropped goes back to its pool.
#[derive(Default)]
pub struct ResourceSet {
    handles: Vec<(String, Box<dyn ErasedHandle>)>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, handle: Box<dyn ErasedHandle>) {
        self.handles.push((name.to_string(), handle));
    }

    fn handle(&self, name: &str) -> Option<&dyn ErasedHandle> {
        self.handles
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| h.as_ref())
    }

    /// Borrow the resource named `name` as a `T`.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.handle(name)?
            .as_any()
            .downcast_ref::<PooledHandle<T>>()
            .map(|h| &**h)
    }

    pub fn get_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.handles
            .iter_mut()
            .find(|(n, _)| n == name)?
            .1
            .as_any_mut()
            .downcast_mut::<PooledHandle<T>>()
            .map(|h| &mut **h)
    }

    /// Instance id of the named handle.
    pub fn instance_id(&self, name: &str) -> Option<u64> {
        self.handle(name).map(|h| h.id())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handle(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Return every handle: the `faulted` one is discarded, the rest released.
    pub fn finish(&mut self, faulted: Option<&str>) {
        for (name, handle) in self.handles.drain(..) {
            if faulted == Some(name.as_str()) {
                tracing::warn!(resource = %name, instance = handle.id(), "Discarding faulted resource");
                handle.discard();
            } else {
                handle.release();
            }
        }
    }

    pub fn release_all(&mut self) {
        self.finish(None);
    }
}

impl fmt::Debug for ResourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.handles.iter().map(|(n, h)| (n, h.id())))
            .finish()
    }
}
