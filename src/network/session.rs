//! Protocol Session
//!
//! Owns one connection and speaks IPROTO over it.
//!
//! ## State Machine
//! ```text
//!            begin                 execute (send + await)
//!   Idle ─────────────▶ CommandOpen ───────────────────────▶ Idle + ResultCursor
//!     ▲                     │
//!     │     add_batch       │  (frame buffered, response pending)
//!     └─────────────────────┘
//!
//!   any I/O or protocol failure ──▶ Poisoned     close ──▶ Closed
//! ```
//!
//! ## Sync Correlation
//! The sync counter starts at 0 and is incremented once per request. A single
//! response must carry exactly the sync just sent; pipelined responses must
//! never exceed the highest sync issued and never go backwards.

use std::collections::VecDeque;
use std::io::{BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use bytes::BytesMut;

use crate::client::{Client, Closeable};
use crate::config::Config;
use crate::cursor::ResultCursor;
use crate::error::{DriverError, Result};
use crate::protocol::{
    decode_response, read_frame, read_greeting, write_frame, ArgSection, CommandBuilder,
    Greeting, Iter, Param, RequestType, Response, UpdateOp, KEY_ARGS, KEY_EXPRESSION, KEY_FUNCTION_NAME,
    KEY_INDEX, KEY_ITERATOR, KEY_LIMIT, KEY_OFFSET, KEY_SPACE, KEY_SQL_TEXT, TUPLE_ARGS,
    UPDATE_OPS, UPSERT_OPS,
};

/// Lifecycle state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Ready to open a command
    Idle,
    /// A command is being assembled
    CommandOpen(RequestType),
    /// Closed by the owner
    Closed,
    /// A fatal failure desynchronised the stream; the cause is kept
    Poisoned(String),
}

#[derive(Debug, Clone, Copy)]
enum SyncCheck {
    Exact(u64),
    AtMost { floor: u64, ceiling: u64 },
}

impl SyncCheck {
    fn verify(self, sync: u64) -> Result<()> {
        match self {
            SyncCheck::Exact(expected) if sync != expected => Err(DriverError::protocol(format!(
                "Expected sync = {} and came {}",
                expected, sync
            ))),
            SyncCheck::AtMost { ceiling, .. } if sync > ceiling => Err(DriverError::protocol(
                format!("Expected sync <= {} and came {}", ceiling, sync),
            )),
            SyncCheck::AtMost { floor, .. } if sync < floor => Err(DriverError::protocol(
                format!("Pipelined response {} arrived after {}", sync, floor),
            )),
            _ => Ok(()),
        }
    }
}

/// One live protocol connection plus its encode/decode state
pub struct Session<S = TcpStream> {
    /// Buffered reader; writes go straight to the inner stream.
    /// `None` once closed.
    reader: Option<BufReader<S>>,
    /// Framed requests not yet written to the socket
    out: BytesMut,
    command: CommandBuilder,
    sync: u64,
    /// Sync of the last request framed for sending; an open command's
    /// sync is above it
    framed_sync: u64,
    state: SessionState,
    last: Option<ResultCursor>,
    /// Request types of pipelined requests awaiting responses, oldest first
    in_flight: VecDeque<RequestType>,
    greeting: Greeting,
    peer: String,
}

impl Session<TcpStream> {
    /// Connect to `config.host:config.port` and consume the greeting
    pub fn connect(config: &Config) -> Result<Self> {
        let stream = connect_stream(config)?;
        if let Some(timeout) = config.read_timeout() {
            stream.set_read_timeout(Some(timeout))?;
        }
        if let Some(timeout) = config.write_timeout() {
            stream.set_write_timeout(Some(timeout))?;
        }
        // Requests are small; do not let Nagle delay them.
        stream.set_nodelay(true)?;

        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| config.addr());

        if config.user.is_some() {
            tracing::warn!(
                "Credentials configured for {} but authentication is not negotiated",
                peer
            );
        }

        Self::handshake(stream, peer)
    }
}

impl<S: Read + Write> Session<S> {
    /// Wrap an already connected stream and consume the greeting
    pub fn from_stream(stream: S) -> Result<Self> {
        Self::handshake(stream, "stream".to_string())
    }

    fn handshake(stream: S, peer: String) -> Result<Self> {
        let mut reader = BufReader::new(stream);
        let greeting = read_greeting(&mut reader)?;
        tracing::debug!("Connected to {}: {}", peer, greeting.banner());

        Ok(Self {
            reader: Some(reader),
            out: BytesMut::with_capacity(256),
            command: CommandBuilder::new(),
            sync: 0,
            framed_sync: 0,
            state: SessionState::Idle,
            last: None,
            in_flight: VecDeque::new(),
            greeting,
            peer,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Sync of the most recently issued request
    pub fn sync(&self) -> u64 {
        self.sync
    }

    /// Number of pipelined requests whose responses are still pending
    pub fn pending_batch(&self) -> usize {
        self.in_flight.len()
    }

    pub fn greeting(&self) -> &Greeting {
        &self.greeting
    }

    /// The cursor returned by the last `execute`, if any
    pub fn last_result(&mut self) -> Option<&mut ResultCursor> {
        self.last.as_mut()
    }

    // =========================================================================
    // Command Lifecycle
    // =========================================================================

    fn begin(&mut self, code: RequestType) -> Result<()> {
        match &self.state {
            SessionState::Idle => {}
            SessionState::CommandOpen(open) => {
                return Err(DriverError::usage(format!(
                    "{:?} command has not been executed yet",
                    open
                )));
            }
            SessionState::Closed => return Err(DriverError::ConnectionClosed),
            SessionState::Poisoned(cause) => return Err(DriverError::Poisoned(cause.clone())),
        }

        if self.last.as_ref().is_some_and(ResultCursor::has_next) {
            return Err(DriverError::usage("Sending next without reading previous"));
        }
        self.last = None;

        self.sync += 1;
        self.command.begin(code, self.sync)?;
        self.state = SessionState::CommandOpen(code);
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        match &self.state {
            SessionState::Closed => Err(DriverError::ConnectionClosed),
            SessionState::Poisoned(cause) => Err(DriverError::Poisoned(cause.clone())),
            _ => Ok(()),
        }
    }

    /// Finish the open command and frame it into the output buffer
    fn flush_command(&mut self) -> Result<RequestType> {
        let code = match self.state {
            SessionState::CommandOpen(code) => code,
            _ => {
                self.ensure_usable()?;
                return Err(DriverError::usage("no command is open"));
            }
        };

        let packet = self.command.finish()?;
        write_frame(packet, &mut self.out)?;
        self.framed_sync = self.sync;
        self.state = SessionState::Idle;
        Ok(code)
    }

    fn send(&mut self) -> Result<()> {
        let reader = self.reader.as_mut().ok_or(DriverError::ConnectionClosed)?;
        let stream = reader.get_mut();
        stream.write_all(&self.out)?;
        stream.flush()?;

        tracing::trace!("Sent {} bytes to {}", self.out.len(), self.peer);
        self.out.clear();
        Ok(())
    }

    fn receive(&mut self, check: SyncCheck) -> Result<Response> {
        let reader = self.reader.as_mut().ok_or(DriverError::ConnectionClosed)?;
        let frame = read_frame(reader)?;
        let response = decode_response(frame)?;
        check.verify(response.header.sync)?;

        tracing::trace!(
            "Received response sync={} code={:#x} from {}",
            response.header.sync,
            response.header.code,
            self.peer
        );
        Ok(response)
    }

    /// Poison the session when `result` carries a fatal failure
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            let usable = matches!(self.state, SessionState::Idle | SessionState::CommandOpen(_));
            if err.is_fatal() && usable {
                tracing::warn!("Session with {} is unusable: {}", self.peer, err);
                self.state = SessionState::Poisoned(err.to_string());
                self.command.abandon();
                self.last = None;
                self.in_flight.clear();
                self.out.clear();
            }
        }
        result
    }

    fn execute_inner(&mut self) -> Result<ResultCursor> {
        if !self.in_flight.is_empty() {
            self.drain_batch()?;
        }

        let code = self.flush_command()?;
        self.send()?;
        let response = self.receive(SyncCheck::Exact(self.sync))?;
        into_cursor(code, response)
    }

    fn drain_batch(&mut self) -> Result<Vec<u64>> {
        self.ensure_usable()?;
        if self.in_flight.is_empty() {
            return Ok(Vec::new());
        }

        self.send()?;

        let mut counts = Vec::with_capacity(self.in_flight.len());
        let mut first_error = None;
        let mut floor = 0;
        while let Some(&code) = self.in_flight.front() {
            let response = self.receive(SyncCheck::AtMost {
                floor,
                ceiling: self.framed_sync,
            })?;
            floor = response.header.sync;
            self.in_flight.pop_front();

            // Keep draining after a remote error so the stream stays in sync.
            match into_cursor(code, response) {
                Ok(cursor) => counts.push(affected(&cursor)),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        tracing::debug!("Drained {} pipelined responses from {}", counts.len(), self.peer);
        match first_error {
            Some(err) => Err(err),
            None => Ok(counts),
        }
    }

    fn ping_inner(&mut self) -> Result<()> {
        if !self.in_flight.is_empty() {
            self.drain_batch()?;
        }

        self.begin(RequestType::Ping)?;
        self.command.empty_body()?;
        self.flush_command()?;
        self.send()?;

        let response = self.receive(SyncCheck::Exact(self.sync))?;
        if !response.body.is_empty() {
            return Err(DriverError::protocol(format!(
                "{} body size came from ping",
                response.body.entries
            )));
        }
        Ok(())
    }

    fn space_command(&mut self, code: RequestType, space: u32, index: Option<u32>) -> Result<()> {
        let (args, ops) = match code {
            RequestType::Update => (KEY_ARGS, UPDATE_OPS),
            RequestType::Upsert => (TUPLE_ARGS, UPSERT_OPS),
            RequestType::Delete => (KEY_ARGS, None),
            _ => (TUPLE_ARGS, None),
        };

        self.begin(code)?;
        let fixed = 1 + u32::from(index.is_some());
        self.command.body(fixed, args, ops)?;
        self.command.uint_field(KEY_SPACE, space.into())?;
        if let Some(index) = index {
            self.command.uint_field(KEY_INDEX, index.into())?;
        }
        Ok(())
    }

    fn text_command(&mut self, code: RequestType, key: u8, text: &str, args: ArgSection) -> Result<()> {
        self.begin(code)?;
        self.command.body(1, args, None)?;
        self.command.str_field(key, text)
    }
}

// =============================================================================
// Response Classification
// =============================================================================

/// Turn a response into a cursor, or the error it carries
fn into_cursor(code: RequestType, response: Response) -> Result<ResultCursor> {
    let Response { header, body } = response;

    // Outside SQL a body holds one entry; only the error message may bring
    // its extended stack along.
    let error_pair = body.entries == 2 && body.error.is_some() && body.error_ext;
    if !code.is_sql() && body.entries != 1 && !error_pair {
        return Err(DriverError::protocol(format!("Body size is {}", body.entries)));
    }

    if let Some(message) = body.error {
        return Err(DriverError::Remote {
            code: header.error_code(),
            message,
        });
    }
    if header.is_error() {
        return Err(DriverError::Remote {
            code: header.error_code(),
            message: "request failed without an error message".to_string(),
        });
    }

    if code.is_sql() {
        let mut cursor = match (body.data, body.row_count) {
            (Some(data), _) => ResultCursor::new(data),
            (None, Some(_)) => ResultCursor::empty(),
            (None, None) => {
                return Err(DriverError::protocol(format!(
                    "SQL response has neither data nor info ({} body entries)",
                    body.entries
                )));
            }
        };
        if let Some(columns) = body.columns {
            cursor = cursor.with_columns(columns);
        }
        if let Some(count) = body.row_count {
            cursor = cursor.with_affected_rows(count);
        }
        return Ok(cursor);
    }

    body.data
        .map(ResultCursor::new)
        .ok_or_else(|| DriverError::protocol("response body carries no data"))
}

fn affected(cursor: &ResultCursor) -> u64 {
    cursor
        .affected_rows()
        .unwrap_or_else(|| u64::from(cursor.size()))
}

fn connect_stream(config: &Config) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in (config.host.as_str(), config.port).to_socket_addrs()? {
        let attempt = match config.connect_timeout() {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(match last_err {
        Some(err) => DriverError::Io(err),
        None => DriverError::Config(format!("{} did not resolve to an address", config.addr())),
    })
}

// =============================================================================
// Client Implementation
// =============================================================================

impl<S: Read + Write> Closeable for Session<S> {
    fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!("Closed session with {}", self.peer);
        }
        self.state = SessionState::Closed;
        self.command.abandon();
        self.last = None;
        self.in_flight.clear();
        self.out.clear();
    }

    fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed | SessionState::Poisoned(_))
    }
}

impl<S: Read + Write> Client for Session<S> {
    fn select(&mut self, space: u32, index: u32, limit: u32, offset: u32, iter: Iter) -> Result<()> {
        self.begin(RequestType::Select)?;
        let command = &mut self.command;
        command.body(5, KEY_ARGS, None)?;
        command.uint_field(KEY_SPACE, space.into())?;
        command.uint_field(KEY_INDEX, index.into())?;
        command.uint_field(KEY_ITERATOR, iter as u64)?;
        command.uint_field(KEY_LIMIT, limit.into())?;
        command.uint_field(KEY_OFFSET, offset.into())
    }

    fn insert(&mut self, space: u32) -> Result<()> {
        self.space_command(RequestType::Insert, space, None)
    }

    fn replace(&mut self, space: u32) -> Result<()> {
        self.space_command(RequestType::Replace, space, None)
    }

    fn update(&mut self, space: u32, index: u32) -> Result<()> {
        self.space_command(RequestType::Update, space, Some(index))
    }

    fn upsert(&mut self, space: u32) -> Result<()> {
        self.space_command(RequestType::Upsert, space, None)
    }

    fn delete(&mut self, space: u32, index: u32) -> Result<()> {
        self.space_command(RequestType::Delete, space, Some(index))
    }

    fn eval(&mut self, expression: &str) -> Result<()> {
        self.text_command(RequestType::Eval, KEY_EXPRESSION, expression, TUPLE_ARGS)
    }

    fn call(&mut self, function: &str) -> Result<()> {
        self.text_command(RequestType::Call, KEY_FUNCTION_NAME, function, TUPLE_ARGS)
    }

    fn sql(&mut self, query: &str) -> Result<()> {
        self.text_command(RequestType::Execute, KEY_SQL_TEXT, query, ArgSection::SqlBind)
    }

    fn set_int(&mut self, value: i32) -> Result<()> {
        self.command.set_int(value)
    }

    fn set_long(&mut self, value: i64) -> Result<()> {
        self.command.set_long(value)
    }

    fn set_float(&mut self, value: f32) -> Result<()> {
        self.command.set_float(value)
    }

    fn set_double(&mut self, value: f64) -> Result<()> {
        self.command.set_double(value)
    }

    fn set_boolean(&mut self, value: bool) -> Result<()> {
        self.command.set_boolean(value)
    }

    fn set_string(&mut self, value: Option<&str>) -> Result<()> {
        self.command.set_string(value)
    }

    fn set_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.command.set_bytes(value)
    }

    fn set_null(&mut self) -> Result<()> {
        self.command.set_null()
    }

    fn change(&mut self, op: UpdateOp, field: i32, operand: Param) -> Result<()> {
        self.command.append_update_op(op, field, &operand)
    }

    fn execute(&mut self) -> Result<&mut ResultCursor> {
        let result = self.execute_inner();
        let cursor = self.guard(result)?;
        Ok(self.last.insert(cursor))
    }

    fn execute_update(&mut self) -> Result<u64> {
        let result = self.execute_inner();
        let cursor = self.guard(result)?;
        Ok(affected(&cursor))
    }

    fn add_batch(&mut self) -> Result<()> {
        let code = self.flush_command()?;
        self.in_flight.push_back(code);
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<()> {
        self.execute_batch_update().map(drop)
    }

    fn execute_batch_update(&mut self) -> Result<Vec<u64>> {
        let result = self.drain_batch();
        self.guard(result)
    }

    fn consume_last_result(&mut self) -> Result<()> {
        if let Some(cursor) = self.last.as_mut() {
            cursor.consume();
        }
        Ok(())
    }

    fn ping(&mut self) -> Result<()> {
        let result = self.ping_inner();
        self.guard(result)
    }

    fn version(&self) -> Result<&str> {
        self.ensure_usable()?;
        Ok(self.greeting.banner())
    }
}
