//! Lease handle
//!
//! A lease owns its client until released. Release happens explicitly via
//! [`Lease::release`] / [`Closeable::close`], or implicitly on drop.

use std::fmt;
use std::sync::Arc;

use super::Home;
use crate::client::{Client, Closeable};
use crate::cursor::ResultCursor;
use crate::error::{DriverError, Result};
use crate::protocol::{Iter, Param, UpdateOp};

/// Exclusive, borrowed handle to a pooled client
pub struct Lease<C: Closeable> {
    home: Arc<dyn Home<C>>,
    /// `None` once released
    client: Option<C>,
}

impl<C: Closeable> Lease<C> {
    pub(crate) fn new(home: Arc<dyn Home<C>>, client: C) -> Self {
        Self {
            home,
            client: Some(client),
        }
    }

    /// The leased client. Fails with [`DriverError::ConnectionClosed`]
    /// after release.
    pub fn get(&self) -> Result<&C> {
        self.client.as_ref().ok_or(DriverError::ConnectionClosed)
    }

    pub fn get_mut(&mut self) -> Result<&mut C> {
        self.client.as_mut().ok_or(DriverError::ConnectionClosed)
    }

    /// Return the client to its source. Idempotent.
    pub fn release(&mut self) {
        if let Some(client) = self.client.take() {
            self.home.restore(client);
        }
    }

    pub fn is_released(&self) -> bool {
        self.client.is_none()
    }
}

impl<C: Closeable> Drop for Lease<C> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<C: Closeable> fmt::Debug for Lease<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("released", &self.is_released())
            .finish()
    }
}

impl<C: Closeable> Closeable for Lease<C> {
    /// Releases the lease; the client itself stays with its source.
    fn close(&mut self) {
        self.release();
    }

    fn is_closed(&self) -> bool {
        self.client.as_ref().map_or(true, C::is_closed)
    }
}

impl<C: Client> Client for Lease<C> {
    fn select(&mut self, space: u32, index: u32, limit: u32, offset: u32, iter: Iter) -> Result<()> {
        self.get_mut()?.select(space, index, limit, offset, iter)
    }

    fn insert(&mut self, space: u32) -> Result<()> {
        self.get_mut()?.insert(space)
    }

    fn replace(&mut self, space: u32) -> Result<()> {
        self.get_mut()?.replace(space)
    }

    fn update(&mut self, space: u32, index: u32) -> Result<()> {
        self.get_mut()?.update(space, index)
    }

    fn upsert(&mut self, space: u32) -> Result<()> {
        self.get_mut()?.upsert(space)
    }

    fn delete(&mut self, space: u32, index: u32) -> Result<()> {
        self.get_mut()?.delete(space, index)
    }

    fn eval(&mut self, expression: &str) -> Result<()> {
        self.get_mut()?.eval(expression)
    }

    fn call(&mut self, function: &str) -> Result<()> {
        self.get_mut()?.call(function)
    }

    fn sql(&mut self, query: &str) -> Result<()> {
        self.get_mut()?.sql(query)
    }

    fn set_int(&mut self, value: i32) -> Result<()> {
        self.get_mut()?.set_int(value)
    }

    fn set_long(&mut self, value: i64) -> Result<()> {
        self.get_mut()?.set_long(value)
    }

    fn set_float(&mut self, value: f32) -> Result<()> {
        self.get_mut()?.set_float(value)
    }

    fn set_double(&mut self, value: f64) -> Result<()> {
        self.get_mut()?.set_double(value)
    }

    fn set_boolean(&mut self, value: bool) -> Result<()> {
        self.get_mut()?.set_boolean(value)
    }

    fn set_string(&mut self, value: Option<&str>) -> Result<()> {
        self.get_mut()?.set_string(value)
    }

    fn set_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.get_mut()?.set_bytes(value)
    }

    fn set_null(&mut self) -> Result<()> {
        self.get_mut()?.set_null()
    }

    fn change(&mut self, op: UpdateOp, field: i32, operand: Param) -> Result<()> {
        self.get_mut()?.change(op, field, operand)
    }

    fn execute(&mut self) -> Result<&mut ResultCursor> {
        self.get_mut()?.execute()
    }

    fn execute_update(&mut self) -> Result<u64> {
        self.get_mut()?.execute_update()
    }

    fn add_batch(&mut self) -> Result<()> {
        self.get_mut()?.add_batch()
    }

    fn execute_batch(&mut self) -> Result<()> {
        self.get_mut()?.execute_batch()
    }

    fn execute_batch_update(&mut self) -> Result<Vec<u64>> {
        self.get_mut()?.execute_batch_update()
    }

    fn consume_last_result(&mut self) -> Result<()> {
        self.get_mut()?.consume_last_result()
    }

    fn ping(&mut self) -> Result<()> {
        self.get_mut()?.ping()
    }

    fn version(&self) -> Result<&str> {
        self.get()?.version()
    }
}
