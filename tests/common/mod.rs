//! Shared test fixtures
//!
//! An in-memory stream that replays a greeting plus canned response frames,
//! and builders for the response bodies a server would send.

#![allow(dead_code)]

use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use rmpv::Value;
use tntdriver::protocol::{
    decode_request, decode_response, encode_response, read_frame, RequestHeader,
    SIZE_PREFIX_LEN, GREETING_LINE_SIZE, GREETING_SIZE, KEY_DATA, KEY_ERROR, KEY_ERROR_EXT, KEY_METADATA,
    KEY_SQL_INFO,
};
use tntdriver::{Closeable, ResultCursor, Session};

pub const BANNER: &str = "Tarantool 2.11.1 (Binary) 7c0b8e9a-1c2d-4e5f-8a9b-0c1d2e3f4a5b";

/// 128-byte greeting carrying [`BANNER`]
pub fn greeting() -> Vec<u8> {
    let mut bytes = vec![b' '; GREETING_SIZE];
    bytes[..BANNER.len()].copy_from_slice(BANNER.as_bytes());
    bytes[GREETING_LINE_SIZE - 1] = b'\n';
    bytes[GREETING_SIZE - 1] = b'\n';
    bytes
}

// =============================================================================
// Scripted Stream
// =============================================================================

/// Bytes the session wrote, shared with the test
pub type Written = Arc<Mutex<Vec<u8>>>;

/// Replays a fixed input and records everything written
pub struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    written: Written,
}

impl ScriptedStream {
    /// Greeting followed by `frames`
    pub fn new(frames: &[Vec<u8>]) -> (Self, Written) {
        let mut input = greeting();
        for frame in frames {
            input.extend_from_slice(frame);
        }
        let written = Written::default();
        let stream = Self {
            input: Cursor::new(input),
            written: Arc::clone(&written),
        };
        (stream, written)
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Session over a scripted stream that will answer with `frames`
pub fn session(frames: &[Vec<u8>]) -> (Session<ScriptedStream>, Written) {
    let (stream, written) = ScriptedStream::new(frames);
    let session = Session::from_stream(stream).unwrap();
    (session, written)
}

/// Decode every request frame the session wrote
pub fn sent(written: &Written) -> Vec<(RequestHeader, Value)> {
    let bytes = written.lock().clone();
    let mut rd = &bytes[..];
    let mut requests = Vec::new();
    while !rd.is_empty() {
        let frame = read_frame(&mut rd).unwrap();
        requests.push(decode_request(&frame).unwrap());
    }
    requests
}

/// Value stored under an integer key of a body map
pub fn entry(body: &Value, key: u8) -> Option<&Value> {
    body.as_map()?
        .iter()
        .find(|(k, _)| k.as_u64() == Some(u64::from(key)))
        .map(|(_, v)| v)
}

// =============================================================================
// Response Builders
// =============================================================================

fn map(entries: Vec<(u8, Value)>) -> Value {
    Value::Map(entries.into_iter().map(|(k, v)| (Value::from(k), v)).collect())
}

pub fn row(fields: Vec<Value>) -> Value {
    Value::Array(fields)
}

pub fn data_body(rows: Vec<Value>) -> Value {
    map(vec![(KEY_DATA, Value::Array(rows))])
}

pub fn error_body(message: &str) -> Value {
    map(vec![(KEY_ERROR, Value::from(message))])
}

/// Error message plus the extended error stack newer servers attach
pub fn error_ext_body(message: &str) -> Value {
    let stack = map(vec![(0x00, Value::Array(vec![map(vec![
        (0x00, Value::from("ClientError")),
        (0x03, Value::from(message)),
    ])]))]);
    map(vec![(KEY_ERROR, Value::from(message)), (KEY_ERROR_EXT, stack)])
}

pub fn empty_body() -> Value {
    Value::Map(Vec::new())
}

pub fn sql_info_body(count: u64) -> Value {
    map(vec![(KEY_SQL_INFO, map(vec![(0x00, Value::from(count))]))])
}

pub fn sql_rows_body(columns: &[&str], rows: Vec<Value>) -> Value {
    let metadata = columns
        .iter()
        .map(|name| map(vec![(0x00, Value::from(*name))]))
        .collect();
    map(vec![
        (KEY_METADATA, Value::Array(metadata)),
        (KEY_DATA, Value::Array(rows)),
    ])
}

/// Complete response frame (size prefix included)
pub fn frame(code: u32, sync: u64, body: &Value) -> Vec<u8> {
    let mut encoded = Vec::new();
    rmpv::encode::write_value(&mut encoded, body).unwrap();
    encode_response(code, sync, &encoded).unwrap()
}

pub fn ok(sync: u64, body: Value) -> Vec<u8> {
    frame(0, sync, &body)
}

pub fn remote_error(sync: u64, errcode: u32, message: &str) -> Vec<u8> {
    frame(0x8000 | errcode, sync, &error_body(message))
}

/// Response frame with no body map at all
pub fn header_only(sync: u64) -> Vec<u8> {
    encode_response(0, sync, &[]).unwrap()
}

/// Cursor over the data section of `body`
pub fn cursor(body: Value) -> ResultCursor {
    let full = frame(0, 1, &body);
    let response = decode_response(Bytes::from(full[SIZE_PREFIX_LEN..].to_vec())).unwrap();
    ResultCursor::new(response.body.data.unwrap())
}

// =============================================================================
// Dummy Client
// =============================================================================

/// Pool payload that only records whether it was closed
#[derive(Debug)]
pub struct DummyClient {
    pub id: usize,
    closed: Arc<AtomicBool>,
}

impl DummyClient {
    pub fn new(id: usize) -> (Self, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let client = Self {
            id,
            closed: Arc::clone(&closed),
        };
        (client, closed)
    }
}

impl Closeable for DummyClient {
    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
