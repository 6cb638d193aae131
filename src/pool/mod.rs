//! # Connection Sources
//!
//! Lend exclusive [`Lease`]s over protocol sessions to concurrent callers.
//!
//! ## Variants
//! - [`SingleSource`]: one session, one borrower at a time
//! - [`SizedPool`]: up to N sessions, created lazily by a factory
//!
//! ## Wake-up Rules
//! 1. A release wakes at most one blocked acquirer (one slot became free).
//! 2. Close wakes every blocked acquirer; each fails with [`POOL_CLOSED`].
//! 3. A failed session construction gives its slot back before returning.
//!
//! [`POOL_CLOSED`]: crate::error::POOL_CLOSED

mod lease;
mod single;
mod sized;

pub use lease::Lease;
pub use single::SingleSource;
pub use sized::{PoolStats, SizedPool};

use crate::client::Closeable;
use crate::error::Result;

/// Something that lends clients
pub trait ClientSource<C: Closeable> {
    /// Borrow a client, blocking until one is free or the source is closed
    fn acquire(&self) -> Result<Lease<C>>;

    /// Close the source: wake every waiter and close idle clients
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Where a lease returns its client on release
pub(crate) trait Home<C>: Send + Sync {
    fn restore(&self, client: C);
}
