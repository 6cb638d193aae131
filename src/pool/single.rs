//! Single-connection source
//!
//! Lends one client to one borrower at a time; other callers block until it
//! comes back.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::{ClientSource, Home, Lease};
use crate::client::Closeable;
use crate::error::{DriverError, Result};

struct SingleState<C> {
    /// `None` while lent out or after close
    client: Option<C>,
    closed: bool,
}

struct SingleInner<C> {
    state: Mutex<SingleState<C>>,
    returned: Condvar,
}

/// Source wrapping exactly one client
pub struct SingleSource<C> {
    inner: Arc<SingleInner<C>>,
}

impl<C: Closeable + Send + 'static> SingleSource<C> {
    pub fn new(client: C) -> Self {
        Self {
            inner: Arc::new(SingleInner {
                state: Mutex::new(SingleState {
                    client: Some(client),
                    closed: false,
                }),
                returned: Condvar::new(),
            }),
        }
    }

    /// Whether the client is currently lent out
    pub fn is_lent(&self) -> bool {
        let state = self.inner.state.lock();
        !state.closed && state.client.is_none()
    }
}

impl<C> Clone for SingleSource<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Closeable + Send + 'static> ClientSource<C> for SingleSource<C> {
    fn acquire(&self) -> Result<Lease<C>> {
        let mut state = self.inner.state.lock();
        loop {
            if state.closed {
                return Err(DriverError::PoolClosed);
            }
            if let Some(client) = state.client.take() {
                drop(state);
                tracing::debug!("Lent single client");
                return Ok(Lease::new(self.inner.clone(), client));
            }
            self.inner.returned.wait(&mut state);
        }
    }

    fn close(&self) {
        let idle = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.client.take()
        };
        self.inner.returned.notify_all();

        if let Some(mut client) = idle {
            client.close();
        }
        tracing::debug!("Closed single client source");
    }

    fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}

impl<C: Closeable + Send> Home<C> for SingleInner<C> {
    fn restore(&self, mut client: C) {
        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            client.close();
            return;
        }
        state.client = Some(client);
        drop(state);
        self.returned.notify_one();
    }
}
