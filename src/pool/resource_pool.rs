//! Bounded checkout pool for one resource kind.
//!
//! # Responsibilities
//! - Hand out instances exclusively, one caller at a time
//! - Construct instances lazily up to capacity
//! - Take instances back (release) or destroy them (discard)
//!
//! # Design Decisions
//! - A semaphore bounds outstanding checkouts; a mutex guards the idle stack
//!   and counters. The semaphore permit lives inside the handle, so a slot is
//!   only freed after the instance is back in the pool.
//! - Instances alive = outstanding + available, never above capacity
//! - Handles return themselves on drop, so cancelled requests cannot leak

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Boxed error produced by resource construction.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Builds new instances for a pool.
#[async_trait]
pub trait ResourceFactory<T>: Send + Sync {
    async fn create(&self) -> Result<T, BoxError>;
}

/// Errors surfaced by pool checkout.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool `{pool}` exhausted: no instance available within {waited:?}")]
    Exhausted { pool: String, waited: Duration },

    #[error("pool `{pool}` is closed")]
    Closed { pool: String },

    #[error("pool `{pool}` could not construct an instance: {source}")]
    Construction {
        pool: String,
        #[source]
        source: BoxError,
    },
}

/// Point-in-time view of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub capacity: usize,
    /// Instances currently checked out (or being constructed for a caller).
    pub outstanding: usize,
    /// Idle instances ready for reuse.
    pub available: usize,
    /// Instances ever constructed.
    pub created: u64,
    /// Instances ever destroyed (discarded or dropped at teardown).
    pub destroyed: u64,
}

struct Slot<T> {
    id: u64,
    value: T,
}

struct PoolState<T> {
    available: Vec<Slot<T>>,
    outstanding: usize,
    created: u64,
    destroyed: u64,
    closed: bool,
}

struct PoolInner<T> {
    name: String,
    capacity: usize,
    acquire_timeout: Duration,
    factory: Box<dyn ResourceFactory<T>>,
    state: Mutex<PoolState<T>>,
    permits: Arc<Semaphore>,
    next_id: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Disposition {
    Release,
    Discard,
}

impl<T> PoolInner<T> {
    fn lock(&self) -> MutexGuard<'_, PoolState<T>> {
        self.state.lock().expect("pool state mutex poisoned")
    }

    fn closed_error(&self) -> PoolError {
        PoolError::Closed {
            pool: self.name.clone(),
        }
    }

    /// Take an instance back from a handle.
    fn give_back(&self, slot: Slot<T>, disposition: Disposition) {
        let destroyed = {
            let mut state = self.lock();
            match state.outstanding.checked_sub(1) {
                Some(n) => state.outstanding = n,
                None => {
                    tracing::error!(
                        pool = %self.name,
                        instance = slot.id,
                        "Instance returned while nothing was checked out; ignoring"
                    );
                    return;
                }
            }

            if disposition == Disposition::Discard || state.closed {
                state.destroyed += 1;
                Some(slot)
            } else {
                state.available.push(slot);
                None
            }
        };

        if let Some(slot) = destroyed {
            tracing::debug!(
                pool = %self.name,
                instance = slot.id,
                discarded = disposition == Disposition::Discard,
                "Instance destroyed"
            );
        }
    }
}

/// Undoes an outstanding reservation unless the checkout completes.
struct Reservation<T> {
    inner: Arc<PoolInner<T>>,
    armed: bool,
}

impl<T> Drop for Reservation<T> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.inner.lock();
            state.outstanding = state.outstanding.saturating_sub(1);
        }
    }
}

/// A bounded pool of `T` instances.
pub struct ResourcePool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for ResourcePool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("name", &self.inner.name)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T: Send + 'static> ResourcePool<T> {
    /// Create a pool. No instance is constructed until first checkout.
    ///
    /// A zero `acquire_timeout` makes [`acquire`](Self::acquire) fail fast
    /// like [`try_acquire`](Self::try_acquire).
    pub fn new<F>(
        name: impl Into<String>,
        capacity: usize,
        acquire_timeout: Duration,
        factory: F,
    ) -> Self
    where
        F: ResourceFactory<T> + 'static,
    {
        let name = name.into();
        tracing::debug!(pool = %name, capacity, ?acquire_timeout, "Pool created");

        Self {
            inner: Arc::new(PoolInner {
                name,
                capacity,
                acquire_timeout,
                factory: Box::new(factory),
                state: Mutex::new(PoolState {
                    available: Vec::with_capacity(capacity),
                    outstanding: 0,
                    created: 0,
                    destroyed: 0,
                    closed: false,
                }),
                permits: Arc::new(Semaphore::new(capacity)),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Check out an instance, waiting up to the configured timeout.
    pub async fn acquire(&self) -> Result<PooledHandle<T>, PoolError> {
        let waited = self.inner.acquire_timeout;
        if waited.is_zero() {
            return self.try_acquire().await;
        }

        let pending = Arc::clone(&self.inner.permits).acquire_owned();
        let permit = match tokio::time::timeout(waited, pending).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(self.inner.closed_error()),
            Err(_) => {
                tracing::warn!(pool = %self.inner.name, ?waited, "Pool exhausted");
                return Err(PoolError::Exhausted {
                    pool: self.inner.name.clone(),
                    waited,
                });
            }
        };

        self.checkout(permit).await
    }

    /// Check out an instance without waiting for one to be returned.
    ///
    /// May still await construction of a fresh instance.
    pub async fn try_acquire(&self) -> Result<PooledHandle<T>, PoolError> {
        let permit = match Arc::clone(&self.inner.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                tracing::warn!(pool = %self.inner.name, "Pool exhausted");
                return Err(PoolError::Exhausted {
                    pool: self.inner.name.clone(),
                    waited: Duration::ZERO,
                });
            }
            Err(TryAcquireError::Closed) => return Err(self.inner.closed_error()),
        };

        self.checkout(permit).await
    }

    async fn checkout(&self, permit: OwnedSemaphorePermit) -> Result<PooledHandle<T>, PoolError> {
        let idle = {
            let mut state = self.inner.lock();
            if state.closed {
                return Err(self.inner.closed_error());
            }
            state.outstanding += 1;
            state.available.pop()
        };

        let mut reservation = Reservation {
            inner: Arc::clone(&self.inner),
            armed: true,
        };

        let slot = match idle {
            Some(slot) => slot,
            None => {
                let value = self.inner.factory.create().await.map_err(|source| {
                    tracing::error!(pool = %self.inner.name, error = %source, "Instance construction failed");
                    PoolError::Construction {
                        pool: self.inner.name.clone(),
                        source,
                    }
                })?;
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                self.inner.lock().created += 1;
                tracing::debug!(pool = %self.inner.name, instance = id, "Instance constructed");
                Slot { id, value }
            }
        };

        reservation.armed = false;
        Ok(PooledHandle {
            slot: Some(slot),
            pool: Arc::clone(&self.inner),
            permit: Some(permit),
        })
    }

    /// Return an instance for reuse.
    pub fn release(&self, handle: PooledHandle<T>) {
        self.warn_if_foreign(&handle);
        handle.release();
    }

    /// Destroy an instance known to be broken.
    pub fn discard(&self, handle: PooledHandle<T>) {
        self.warn_if_foreign(&handle);
        handle.discard();
    }

    fn warn_if_foreign(&self, handle: &PooledHandle<T>) {
        if !Arc::ptr_eq(&self.inner, &handle.pool) {
            tracing::error!(
                pool = %self.inner.name,
                origin = %handle.pool.name,
                "Handle returned to the wrong pool; routing it to its origin"
            );
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        PoolStats {
            capacity: self.inner.capacity,
            outstanding: state.outstanding,
            available: state.available.len(),
            created: state.created,
            destroyed: state.destroyed,
        }
    }

    /// Tear the pool down.
    ///
    /// Idle instances are dropped now; checked-out instances are dropped when
    /// their handles come back. Later checkouts fail with `Closed`.
    pub fn close(&self) {
        let drained = {
            let mut state = self.inner.lock();
            state.closed = true;
            let drained: Vec<Slot<T>> = state.available.drain(..).collect();
            state.destroyed += drained.len() as u64;
            drained
        };
        self.inner.permits.close();

        tracing::info!(
            pool = %self.inner.name,
            dropped = drained.len(),
            "Pool closed"
        );
    }
}

/// Exclusive ownership of one pooled instance.
///
/// Consumed by [`release`](Self::release) or [`discard`](Self::discard);
/// dropping it releases.
pub struct PooledHandle<T> {
    slot: Option<Slot<T>>,
    pool: Arc<PoolInner<T>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl<T> PooledHandle<T> {
    /// Identity of the underlying instance, stable across checkouts.
    pub fn id(&self) -> u64 {
        self.slot().id
    }

    pub fn pool_name(&self) -> &str {
        &self.pool.name
    }

    pub fn release(mut self) {
        self.finish(Disposition::Release);
    }

    pub fn discard(mut self) {
        self.finish(Disposition::Discard);
    }

    fn slot(&self) -> &Slot<T> {
        match &self.slot {
            Some(slot) => slot,
            None => unreachable!("pooled handle used after being returned"),
        }
    }

    fn finish(&mut self, disposition: Disposition) {
        if let Some(slot) = self.slot.take() {
            self.pool.give_back(slot, disposition);
        }
        // Permit goes last so a waiter finds the instance already idle.
        self.permit.take();
    }
}

impl<T> Deref for PooledHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot().value
    }
}

impl<T> DerefMut for PooledHandle<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.slot {
            Some(slot) => &mut slot.value,
            None => unreachable!("pooled handle used after being returned"),
        }
    }
}

impl<T> Drop for PooledHandle<T> {
    fn drop(&mut self) {
        self.finish(Disposition::Release);
    }
}

impl<T> fmt::Debug for PooledHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledHandle")
            .field("pool", &self.pool.name)
            .field("instance", &self.slot.as_ref().map(|s| s.id))
            .finish()
    }
}
