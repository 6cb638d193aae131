//! Network Module
//!
//! Client-side protocol sessions over TCP.
//!
//! ## Architecture
//! - One session owns one socket; no background threads
//! - Requests may be pipelined, responses are read in order
//! - Any I/O or protocol failure makes the session unusable

mod session;

pub use session::{Session, SessionState};
