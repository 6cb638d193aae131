//! Result Cursor
//!
//! Forward-only view over the rows of one response.
//!
//! ## Responsibilities
//! - Decode rows lazily, one per `next()`
//! - Typed field access with relational null semantics: a null read through a
//!   numeric accessor yields zero (`false` for booleans), through a string or
//!   bytes accessor yields `None`
//! - Column name lookup for SQL results
//! - Track whether all rows were consumed
//!
//! The whole frame is already off the socket when a cursor exists, so
//! abandoning rows never desynchronises the session.

use std::collections::HashMap;
use std::ops::Range;

use bytes::Bytes;
use rmpv::Value;
use serde::de::DeserializeOwned;

use crate::error::{DriverError, Result};
use crate::protocol::DataSection;

/// Current row: decoded fields plus their raw location in the frame
#[derive(Debug)]
struct Row {
    fields: Vec<Value>,
    raw: Range<usize>,
}

/// Column names of an SQL result
#[derive(Debug)]
struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        // First occurrence wins for duplicate labels
        for (position, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(position);
        }
        Self { names, index }
    }
}

/// Lazy, forward-only cursor over response rows
#[derive(Debug)]
pub struct ResultCursor {
    frame: Bytes,
    /// Offset of the next undecoded row
    pos: usize,
    remaining: u32,
    size: u32,
    current: Option<Row>,
    columns: Option<Columns>,
    affected_rows: Option<u64>,
}

impl ResultCursor {
    /// Cursor over the rows of a data section
    pub fn new(data: DataSection) -> Self {
        let (frame, pos, size) = data.into_parts();
        Self {
            frame,
            pos,
            remaining: size,
            size,
            current: None,
            columns: None,
            affected_rows: None,
        }
    }

    /// Cursor without rows (e.g. SQL statements that only report a row count)
    pub fn empty() -> Self {
        Self {
            frame: Bytes::new(),
            pos: 0,
            remaining: 0,
            size: 0,
            current: None,
            columns: None,
            affected_rows: None,
        }
    }

    /// Attach SQL column names
    pub fn with_columns(mut self, names: Vec<String>) -> Self {
        self.columns = Some(Columns::new(names));
        self
    }

    /// Attach the affected row count reported by the server
    pub fn with_affected_rows(mut self, count: u64) -> Self {
        self.affected_rows = Some(count);
        self
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Advance to the next row. Returns false once all rows were read.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            self.current = None;
            return Ok(false);
        }

        let start = self.pos;
        let mut rd = &self.frame[start..];
        let value = rmpv::decode::read_value(&mut rd)?;
        let end = self.frame.len() - rd.len();

        self.pos = end;
        self.remaining -= 1;

        // Scalar rows (e.g. eval results) behave as single-field rows
        let fields = match value {
            Value::Array(fields) => fields,
            other => vec![other],
        };
        self.current = Some(Row {
            fields,
            raw: start..end,
        });
        Ok(true)
    }

    /// Whether unread rows remain
    pub fn has_next(&self) -> bool {
        self.remaining > 0
    }

    /// Drop all remaining rows without decoding them
    pub fn consume(&mut self) {
        self.remaining = 0;
        self.current = None;
    }

    pub fn is_consumed(&self) -> bool {
        self.remaining == 0
    }

    /// Total number of rows in the response
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Affected row count, for SQL statements that report one
    pub fn affected_rows(&self) -> Option<u64> {
        self.affected_rows
    }

    // =========================================================================
    // Columns
    // =========================================================================

    /// Column names, for SQL results
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_ref().map(|c| c.names.as_slice())
    }

    /// Resolve a column name to its position (SQL results only)
    pub fn get_index(&self, name: &str) -> Result<usize> {
        let columns = self.columns.as_ref().ok_or_else(|| {
            DriverError::usage("column names are only available for SQL results")
        })?;
        columns
            .index
            .get(name)
            .copied()
            .ok_or_else(|| DriverError::usage(format!("no column named '{}'", name)))
    }

    // =========================================================================
    // Field Access
    // =========================================================================

    /// Number of fields in the current row
    pub fn field_count(&self) -> Result<usize> {
        Ok(self.row()?.fields.len())
    }

    /// Raw value of a field in the current row
    pub fn value(&self, pos: usize) -> Result<&Value> {
        let row = self.row()?;
        row.fields.get(pos).ok_or_else(|| {
            DriverError::usage(format!(
                "field {} out of range for a row of {} fields",
                pos,
                row.fields.len()
            ))
        })
    }

    /// All fields of the current row
    pub fn values(&self) -> Result<&[Value]> {
        Ok(&self.row()?.fields)
    }

    pub fn is_null(&self, pos: usize) -> Result<bool> {
        Ok(self.value(pos)?.is_nil())
    }

    pub fn get_long(&self, pos: usize) -> Result<i64> {
        match self.value(pos)? {
            Value::Nil => Ok(0),
            Value::Integer(i) => i
                .as_i64()
                .ok_or_else(|| mismatch(pos, "i64", &Value::Integer(*i))),
            other => Err(mismatch(pos, "integer", other)),
        }
    }

    pub fn get_int(&self, pos: usize) -> Result<i32> {
        let value = self.get_long(pos)?;
        i32::try_from(value).map_err(|_| DriverError::TypeMismatch {
            position: pos,
            expected: "i32",
            found: value.to_string(),
        })
    }

    pub fn get_double(&self, pos: usize) -> Result<f64> {
        match self.value(pos)? {
            Value::Nil => Ok(0.0),
            Value::F64(v) => Ok(*v),
            Value::F32(v) => Ok(f64::from(*v)),
            Value::Integer(i) => i
                .as_f64()
                .ok_or_else(|| mismatch(pos, "number", &Value::Integer(*i))),
            other => Err(mismatch(pos, "number", other)),
        }
    }

    pub fn get_float(&self, pos: usize) -> Result<f32> {
        match self.value(pos)? {
            Value::F32(v) => Ok(*v),
            _ => self.get_double(pos).map(|v| v as f32),
        }
    }

    pub fn get_boolean(&self, pos: usize) -> Result<bool> {
        match self.value(pos)? {
            Value::Nil => Ok(false),
            Value::Boolean(v) => Ok(*v),
            other => Err(mismatch(pos, "boolean", other)),
        }
    }

    pub fn get_string(&self, pos: usize) -> Result<Option<&str>> {
        match self.value(pos)? {
            Value::Nil => Ok(None),
            Value::String(s) => s
                .as_str()
                .map(Some)
                .ok_or_else(|| mismatch(pos, "UTF-8 string", &Value::String(s.clone()))),
            other => Err(mismatch(pos, "string", other)),
        }
    }

    pub fn get_bytes(&self, pos: usize) -> Result<Option<&[u8]>> {
        match self.value(pos)? {
            Value::Nil => Ok(None),
            Value::Binary(b) => Ok(Some(b)),
            Value::String(s) => Ok(Some(s.as_bytes())),
            other => Err(mismatch(pos, "bytes", other)),
        }
    }

    /// Decode the current row into a serde type (tuples, structs, `Vec`s)
    pub fn row_as<T: DeserializeOwned>(&self) -> Result<T> {
        let row = self.row()?;
        Ok(rmp_serde::from_slice(&self.frame[row.raw.clone()])?)
    }

    fn row(&self) -> Result<&Row> {
        self.current
            .as_ref()
            .ok_or_else(|| DriverError::usage("next() must return true before fields are read"))
    }
}

fn mismatch(position: usize, expected: &'static str, found: &Value) -> DriverError {
    DriverError::TypeMismatch {
        position,
        expected,
        found: found.to_string(),
    }
}
