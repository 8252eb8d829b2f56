//! A fixed-size pool of ready-to-use annotation engine instances.
//!
//! The first instance is built from the engine definition artifact; the
//! remaining ones are structural duplicates of it, so the expensive
//! initialization (loading models and resources) happens only once. A leased
//! engine is owned by exactly one caller at a time and returns to the pool
//! when the lease is dropped, whatever the exit path.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::engine::{EngineFactory, TextEngine};
use crate::error::{Result, ServiceError};

struct PoolSlot<E> {
    name: String,
    engine: E,
}

struct PoolInner<E> {
    permits: Semaphore,
    idle: Mutex<Vec<PoolSlot<E>>>,
    acquired_total: AtomicU64,
    size: usize,
}

/// Pool of engine instances shared by concurrent processing calls.
pub struct EnginePool<E: TextEngine> {
    inner: Arc<PoolInner<E>>,
}

impl<E: TextEngine> EnginePool<E> {
    /// Builds a pool of `size` independent engines (at least one): the first
    /// from the definition at `app_path`, the rest duplicated from it.
    pub fn build<F>(factory: &F, app_path: &Path, size: usize) -> Result<Self>
    where
        F: EngineFactory<Engine = E>,
    {
        let size = size.max(1);

        let template = factory.build_from_definition(app_path)?;
        let mut slots = vec![PoolSlot {
            name: "engine-0".to_string(),
            engine: template,
        }];

        // independent duplicates for thread-safe parallel processing
        for i in 1..size {
            let duplicate = factory.duplicate(&slots[0].engine)?;
            slots.push(PoolSlot {
                name: format!("engine-{}", i),
                engine: duplicate,
            });
        }

        info!(pool_size = size, "Engine pool initialized");

        Ok(EnginePool {
            inner: Arc::new(PoolInner {
                permits: Semaphore::new(size),
                idle: Mutex::new(slots),
                acquired_total: AtomicU64::new(0),
                size,
            }),
        })
    }

    /// Borrows an engine, suspending until one is available. Fails only with
    /// `PoolClosed` once the pool has been shut down. Dropping the returned
    /// future while it is still waiting has no side effects.
    pub async fn acquire(&self) -> Result<EngineLease<E>> {
        let permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|_| ServiceError::PoolClosed)?;

        let slot = {
            let mut idle = lock_idle(&self.inner.idle);
            match idle.pop() {
                Some(slot) => slot,
                None => return Err(ServiceError::PoolClosed),
            }
        };
        // the slot now carries the permit; it is re-added on lease drop
        permit.forget();

        self.inner.acquired_total.fetch_add(1, Ordering::Relaxed);
        debug!(engine = %slot.name, "Engine acquired from pool");

        Ok(EngineLease {
            slot: Some(slot),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Shuts the pool down: pending and future `acquire` calls fail with
    /// `PoolClosed`. Engines currently on loan are still returned normally.
    pub fn close(&self) {
        self.inner.permits.close();
        info!("Engine pool closed");
    }

    /// Number of engines currently idle in the pool.
    pub fn available(&self) -> usize {
        lock_idle(&self.inner.idle).len()
    }

    /// Total number of successful acquisitions so far.
    pub fn acquired_total(&self) -> u64 {
        self.inner.acquired_total.load(Ordering::Relaxed)
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }
}

impl<E: TextEngine> Clone for EnginePool<E> {
    fn clone(&self) -> Self {
        EnginePool {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn lock_idle<E>(idle: &Mutex<Vec<PoolSlot<E>>>) -> std::sync::MutexGuard<'_, Vec<PoolSlot<E>>> {
    // a poisoned lock only means another caller panicked mid-push/pop;
    // the Vec itself is still consistent
    match idle.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Exclusive loan of one pooled engine. Dereferences to the engine itself
/// and returns it to the pool on drop -- success, error or panic alike.
pub struct EngineLease<E: TextEngine> {
    slot: Option<PoolSlot<E>>,
    pool: Arc<PoolInner<E>>,
}

impl<E: TextEngine> EngineLease<E> {
    /// Stable name of the leased engine slot, for log correlation.
    pub fn name(&self) -> &str {
        match &self.slot {
            Some(slot) => &slot.name,
            None => unreachable!("lease accessed after drop"),
        }
    }
}

impl<E: TextEngine> Deref for EngineLease<E> {
    type Target = E;

    fn deref(&self) -> &E {
        match &self.slot {
            Some(slot) => &slot.engine,
            None => unreachable!("lease accessed after drop"),
        }
    }
}

impl<E: TextEngine> DerefMut for EngineLease<E> {
    fn deref_mut(&mut self) -> &mut E {
        match &mut self.slot {
            Some(slot) => &mut slot.engine,
            None => unreachable!("lease accessed after drop"),
        }
    }
}

impl<E: TextEngine> Drop for EngineLease<E> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            debug!(engine = %slot.name, "Engine returned to pool");
            lock_idle(&self.pool.idle).push(slot);
            self.pool.permits.add_permits(1);
        }
    }
}
