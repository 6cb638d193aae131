//! Client capability surface
//!
//! [`Client`] is implemented by [`Session`](crate::Session) and by pool
//! [`Lease`](crate::pool::Lease)s, so code written against it works with a
//! dedicated session or a pooled one.
//!
//! ## Call Sequence
//! ```text
//! select / insert / update / eval / sql ...   (open a command)
//!   set_int / set_string / change ...         (arguments, update ops)
//! execute()        → ResultCursor             (send, await one response)
//!   | add_batch()  → pipelined, no wait
//!   | execute_batch() drains every pipelined response in order
//! ```

use crate::cursor::ResultCursor;
use crate::error::Result;
use crate::protocol::{Iter, Param, UpdateOp};

/// Something that owns a connection and can be closed
pub trait Closeable {
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Operations exposed by a protocol session
pub trait Client: Closeable {
    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    fn select(&mut self, space: u32, index: u32, limit: u32, offset: u32, iter: Iter)
        -> Result<()>;

    /// Every tuple of a space, through its primary index
    fn select_all(&mut self, space: u32, limit: u32, offset: u32) -> Result<()> {
        self.select(space, 0, limit, offset, Iter::All)
    }

    fn insert(&mut self, space: u32) -> Result<()>;

    fn replace(&mut self, space: u32) -> Result<()>;

    /// Key fields first, then update operations via [`Client::change`]
    fn update(&mut self, space: u32, index: u32) -> Result<()>;

    /// Tuple fields first, then update operations via [`Client::change`]
    fn upsert(&mut self, space: u32) -> Result<()>;

    fn delete(&mut self, space: u32, index: u32) -> Result<()>;

    fn eval(&mut self, expression: &str) -> Result<()>;

    fn call(&mut self, function: &str) -> Result<()>;

    fn sql(&mut self, query: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Arguments
    // -------------------------------------------------------------------------

    fn set_int(&mut self, value: i32) -> Result<()>;

    fn set_long(&mut self, value: i64) -> Result<()>;

    fn set_float(&mut self, value: f32) -> Result<()>;

    fn set_double(&mut self, value: f64) -> Result<()>;

    fn set_boolean(&mut self, value: bool) -> Result<()>;

    fn set_string(&mut self, value: Option<&str>) -> Result<()>;

    fn set_bytes(&mut self, value: &[u8]) -> Result<()>;

    fn set_null(&mut self) -> Result<()>;

    /// Append an update operation `[op, field, operand]`
    fn change(&mut self, op: UpdateOp, field: i32, operand: Param) -> Result<()>;

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    /// Send the open command and wait for its rows
    fn execute(&mut self) -> Result<&mut ResultCursor>;

    /// Send the open command and return the affected row count
    fn execute_update(&mut self) -> Result<u64>;

    /// Send the open command without waiting for the response
    fn add_batch(&mut self) -> Result<()>;

    /// Read every pipelined response; rows are discarded
    fn execute_batch(&mut self) -> Result<()>;

    /// Read every pipelined response and return per-item affected counts
    fn execute_batch_update(&mut self) -> Result<Vec<u64>>;

    /// Drain the rows of the last result
    fn consume_last_result(&mut self) -> Result<()>;

    fn ping(&mut self) -> Result<()>;

    /// Server banner received in the greeting
    fn version(&self) -> Result<&str>;
}
