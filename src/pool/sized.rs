//! Sized pool
//!
//! Up to `capacity` clients, created lazily by a factory.
//!
//! ## Slot Accounting
//! `created` counts clients that exist or are being constructed. A slot is
//! reserved under the lock before construction starts (construction itself
//! runs unlocked) and handed back if construction fails or panics, so a
//! broken factory never shrinks the pool.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::{ClientSource, Home, Lease};
use crate::client::Closeable;
use crate::config::Config;
use crate::error::{DriverError, Result};
use crate::network::Session;

type Factory<C> = dyn Fn() -> Result<C> + Send + Sync;

struct PoolState<C> {
    idle: Vec<C>,
    created: usize,
    closed: bool,
}

struct PoolInner<C> {
    capacity: usize,
    factory: Box<Factory<C>>,
    state: Mutex<PoolState<C>>,
    changed: Condvar,
}

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    /// Clients alive or under construction
    pub created: usize,
    pub idle: usize,
    pub closed: bool,
}

/// Pool of at most `capacity` clients
pub struct SizedPool<C> {
    inner: Arc<PoolInner<C>>,
}

impl SizedPool<Session> {
    /// Pool of TCP sessions to `config`'s server
    pub fn connect(config: Config, capacity: usize) -> Self {
        SizedPool::new(capacity, move || Session::connect(&config))
    }
}

impl<C: Closeable + Send + 'static> SizedPool<C> {
    /// A capacity of 0 makes every acquire block until close.
    pub fn new<F>(capacity: usize, factory: F) -> Self
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(PoolInner {
                capacity,
                factory: Box::new(factory),
                state: Mutex::new(PoolState {
                    idle: Vec::with_capacity(capacity),
                    created: 0,
                    closed: false,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            capacity: self.inner.capacity,
            created: state.created,
            idle: state.idle.len(),
            closed: state.closed,
        }
    }

    fn create(&self) -> Result<Lease<C>> {
        let mut reservation = SlotReservation {
            inner: &self.inner,
            filled: false,
        };

        let mut client = match (self.inner.factory)() {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!("Failed to create pooled client: {}", err);
                return Err(err);
            }
        };

        let state = self.inner.state.lock();
        if state.closed {
            drop(state);
            client.close();
            return Err(DriverError::PoolClosed);
        }
        let created = state.created;
        drop(state);
        reservation.filled = true;

        tracing::debug!("Created pooled client {}/{}", created, self.inner.capacity);
        Ok(Lease::new(self.inner.clone(), client))
    }
}

/// A slot counted in `created` whose client is still being built.
///
/// Dropped unfilled (factory error, factory panic, pool closed meanwhile) it
/// hands the slot back and wakes one waiter.
struct SlotReservation<'a, C> {
    inner: &'a PoolInner<C>,
    filled: bool,
}

impl<C> Drop for SlotReservation<'_, C> {
    fn drop(&mut self) {
        if !self.filled {
            self.inner.state.lock().created -= 1;
            self.inner.changed.notify_one();
        }
    }
}

impl<C> Clone for SizedPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Closeable + Send + 'static> ClientSource<C> for SizedPool<C> {
    fn acquire(&self) -> Result<Lease<C>> {
        let mut state = self.inner.state.lock();
        loop {
            if state.closed {
                return Err(DriverError::PoolClosed);
            }
            if let Some(client) = state.idle.pop() {
                drop(state);
                tracing::trace!("Lent idle client");
                return Ok(Lease::new(self.inner.clone(), client));
            }
            if state.created < self.inner.capacity {
                state.created += 1;
                break;
            }
            self.inner.changed.wait(&mut state);
        }
        drop(state);

        self.create()
    }

    fn close(&self) {
        let idle = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.created -= state.idle.len();
            std::mem::take(&mut state.idle)
        };
        self.inner.changed.notify_all();

        let count = idle.len();
        for mut client in idle {
            client.close();
        }
        tracing::debug!("Closed pool and {} idle clients", count);
    }

    fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}

impl<C: Closeable + Send> Home<C> for PoolInner<C> {
    fn restore(&self, mut client: C) {
        let mut state = self.state.lock();
        if state.closed || client.is_closed() {
            // Closed pool, or a session a fatal failure made unusable:
            // discard it and free its slot.
            state.created -= 1;
            drop(state);
            client.close();
            tracing::debug!("Discarded returned client");
        } else {
            state.idle.push(client);
            drop(state);
        }
        self.changed.notify_one();
    }
}
