//! # tntdriver
//!
//! A blocking client driver for the Tarantool binary protocol (IPROTO) with:
//! - MessagePack request encoding and lazy response decoding
//! - Sync-correlated request/response matching
//! - Pipelined batches
//! - Thread-safe connection sources lending exclusive leases
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Callers (threads)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ acquire / release
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │          Connection Source (SingleSource | SizedPool)        │
//! │              (Mutex + Condvar, lends Leases)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Protocol Session                          │
//! │          (sync counter, state machine, batching)             │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │ Command Builder │                │  Result Cursor  │
//!   │  (args, ops)    │                │  (lazy rows)    │
//!   └────────┬────────┘                └────────▲────────┘
//!            │                                  │
//!            ▼                                  │
//!   ┌──────────────────────────────────────────────────────┐
//!   │                Wire Codec (TCP socket)                │
//!   └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use tntdriver::{Client, Config, Session};
//!
//! # fn main() -> tntdriver::Result<()> {
//! let mut session = Session::connect(&Config::default())?;
//! session.select_all(512, 10, 0)?;
//! let cursor = session.execute()?;
//! while cursor.next()? {
//!     println!("{:?}", cursor.values()?);
//! }
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod cursor;
pub mod client;
pub mod network;
pub mod pool;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DriverError, ErrorKind, Result, CONNECTION_CLOSED, POOL_CLOSED};
pub use config::{Config, ConfigBuilder};
pub use client::{Client, Closeable};
pub use cursor::ResultCursor;
pub use network::{Session, SessionState};
pub use pool::{ClientSource, Lease, PoolStats, SingleSource, SizedPool};
pub use protocol::{Iter, Param, UpdateOp};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tntdriver
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
