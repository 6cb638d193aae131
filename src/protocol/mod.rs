//! Protocol Module
//!
//! Defines the IPROTO wire protocol spoken with the server.
//!
//! ## Request Format
//! ```text
//! ┌──────────────┬────────────────────────┬───────────────────────────────┐
//! │ 0xce Size(4) │ {code: int, sync: int} │ {space, index, key, tuple ...} │
//! └──────────────┴────────────────────────┴───────────────────────────────┘
//! ```
//!
//! ## Response Format
//! ```text
//! ┌──────────────┬────────────────────────┬───────────────────────────────┐
//! │ 0xce Size(4) │ {code: int, sync: int} │ {data: [[..]..]} | {error: s} │
//! └──────────────┴────────────────────────┴───────────────────────────────┘
//! ```
//!
//! SQL responses may additionally carry column metadata or an SQL info map
//! with the affected row count.

mod codec;
mod command;
mod constants;
mod response;

pub use codec::{
    decode_request, encode_response, read_frame, read_greeting, read_key, read_string,
    skip_value, write_frame, Greeting, RequestHeader, MAX_NESTING_DEPTH, SIZE_PREFIX_LEN,
};
pub use command::{ArgSection, CommandBuilder, Param, UpdateOp};
pub(crate) use command::{KEY_ARGS, TUPLE_ARGS, UPDATE_OPS, UPSERT_OPS};
pub use constants::*;
pub use response::{
    decode_header, decode_response, DataSection, Response, ResponseBody, ResponseHeader,
};
