//! Command builder
//!
//! Accumulates a pending request before it is flushed onto the wire.
//!
//! ## Lifecycle
//! ```text
//!   idle ──begin──▶ header written ──body──▶ fixed fields written
//!                                               │
//!                         set_* / append_update_op (argument sections)
//!                                               │
//!   idle ◀──────────────finish───────────────────┘
//! ```
//!
//! Positional arguments are buffered separately from the packet because the
//! MessagePack array header needs their final count.

use rmp::encode;

use crate::error::{DriverError, Result};

use super::constants::{
    RequestType, KEY_CODE, KEY_KEY, KEY_OPS, KEY_SQL_BIND, KEY_SYNC, KEY_TUPLE,
};

// =============================================================================
// Argument Values
// =============================================================================

/// A single positional argument or update operand
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Param {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Param::Int(_) | Param::Float(_) | Param::Double(_))
    }

    /// Append the MessagePack encoding of this value
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Param::Null => encode::write_nil(buf)?,
            Param::Bool(v) => encode::write_bool(buf, *v)?,
            Param::Int(v) => {
                encode::write_sint(buf, *v)?;
            }
            Param::Float(v) => encode::write_f32(buf, *v)?,
            Param::Double(v) => encode::write_f64(buf, *v)?,
            Param::Str(v) => encode::write_str(buf, v)?,
            Param::Bytes(v) => encode::write_bin(buf, v)?,
        }
        Ok(())
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(v.into())
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<f32> for Param {
    fn from(v: f32) -> Self {
        Param::Float(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Double(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Str(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Str(v)
    }
}

impl From<&[u8]> for Param {
    fn from(v: &[u8]) -> Self {
        Param::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Param {
    fn from(v: Vec<u8>) -> Self {
        Param::Bytes(v)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map_or(Param::Null, Into::into)
    }
}

// =============================================================================
// Update Operations
// =============================================================================

/// Field mutation used by update and upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Add,
    Subtract,
    BitAnd,
    BitOr,
    BitXor,
    Assign,
    Insert,
    Delete,
}

impl UpdateOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UpdateOp::Add => "+",
            UpdateOp::Subtract => "-",
            UpdateOp::BitAnd => "&",
            UpdateOp::BitOr => "|",
            UpdateOp::BitXor => "^",
            UpdateOp::Assign => "=",
            UpdateOp::Insert => "!",
            UpdateOp::Delete => "#",
        }
    }

    /// Arithmetic, bitwise and delete operators take a numeric operand.
    pub fn requires_numeric(self) -> bool {
        !matches!(self, UpdateOp::Assign | UpdateOp::Insert)
    }
}

// =============================================================================
// Argument Sections
// =============================================================================

/// Body entry an argument array is written under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSection {
    Key,
    Tuple,
    Ops,
    SqlBind,
}

impl ArgSection {
    pub fn body_key(self) -> u8 {
        match self {
            ArgSection::Key => KEY_KEY,
            ArgSection::Tuple => KEY_TUPLE,
            ArgSection::Ops => KEY_OPS,
            ArgSection::SqlBind => KEY_SQL_BIND,
        }
    }
}

#[derive(Debug)]
struct ArgList {
    section: ArgSection,
    count: u32,
    buf: Vec<u8>,
}

impl ArgList {
    fn new(section: ArgSection) -> Self {
        Self {
            section,
            count: 0,
            buf: Vec::new(),
        }
    }

    fn write_section(&self, packet: &mut Vec<u8>) -> Result<()> {
        encode::write_uint(packet, self.section.body_key().into())?;
        encode::write_array_len(packet, self.count)?;
        packet.extend_from_slice(&self.buf);
        Ok(())
    }
}

/// Argument state of the open command.
///
/// The only transition is `Fields` → `Ops`, taken on the first update
/// operation. It never goes back.
#[derive(Debug)]
enum PendingArgs {
    Fields {
        list: ArgList,
        /// Section update operations move to, if the command accepts them
        ops: Option<ArgSection>,
    },
    Ops(ArgList),
}

// =============================================================================
// Builder
// =============================================================================

/// Accumulates one request: header, fixed body fields and argument sections
#[derive(Debug, Default)]
pub struct CommandBuilder {
    packet: Vec<u8>,
    code: Option<RequestType>,
    args: Option<PendingArgs>,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.code.is_some()
    }

    /// Request type of the open command
    pub fn code(&self) -> Option<RequestType> {
        self.code
    }

    /// Open a command and write its two-entry header
    pub fn begin(&mut self, code: RequestType, sync: u64) -> Result<()> {
        if let Some(open) = self.code {
            return Err(DriverError::usage(format!(
                "{:?} command has not been executed yet",
                open
            )));
        }

        self.packet.clear();
        self.args = None;

        encode::write_map_len(&mut self.packet, 2)?;
        encode::write_uint(&mut self.packet, KEY_CODE.into())?;
        encode::write_uint(&mut self.packet, code as u64)?;
        encode::write_uint(&mut self.packet, KEY_SYNC.into())?;
        encode::write_uint(&mut self.packet, sync)?;

        self.code = Some(code);
        Ok(())
    }

    /// Write the body map header.
    ///
    /// The map holds `fixed` scalar fields, the `args` section and, when
    /// given, the section update operations are written to.
    pub fn body(&mut self, fixed: u32, args: ArgSection, ops: Option<ArgSection>) -> Result<()> {
        self.ensure_open()?;
        let sections = 1 + u32::from(ops.is_some());
        encode::write_map_len(&mut self.packet, fixed + sections)?;
        self.args = Some(PendingArgs::Fields {
            list: ArgList::new(args),
            ops,
        });
        Ok(())
    }

    /// Write an empty body map (commands without arguments)
    pub fn empty_body(&mut self) -> Result<()> {
        self.ensure_open()?;
        encode::write_map_len(&mut self.packet, 0)?;
        Ok(())
    }

    pub fn uint_field(&mut self, key: u8, value: u64) -> Result<()> {
        self.ensure_open()?;
        encode::write_uint(&mut self.packet, key.into())?;
        encode::write_uint(&mut self.packet, value)?;
        Ok(())
    }

    pub fn str_field(&mut self, key: u8, value: &str) -> Result<()> {
        self.ensure_open()?;
        encode::write_uint(&mut self.packet, key.into())?;
        encode::write_str(&mut self.packet, value)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Positional values
    // -------------------------------------------------------------------------

    pub fn set_int(&mut self, value: i32) -> Result<()> {
        self.push_field(|buf| Param::Int(value.into()).write(buf))
    }

    pub fn set_long(&mut self, value: i64) -> Result<()> {
        self.push_field(|buf| Param::Int(value).write(buf))
    }

    pub fn set_float(&mut self, value: f32) -> Result<()> {
        self.push_field(|buf| Param::Float(value).write(buf))
    }

    pub fn set_double(&mut self, value: f64) -> Result<()> {
        self.push_field(|buf| Param::Double(value).write(buf))
    }

    pub fn set_boolean(&mut self, value: bool) -> Result<()> {
        self.push_field(|buf| Param::Bool(value).write(buf))
    }

    /// `None` is written as nil
    pub fn set_string(&mut self, value: Option<&str>) -> Result<()> {
        self.push_field(|buf| {
            match value {
                Some(s) => encode::write_str(buf, s)?,
                None => encode::write_nil(buf)?,
            }
            Ok(())
        })
    }

    pub fn set_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.push_field(|buf| {
            encode::write_bin(buf, value)?;
            Ok(())
        })
    }

    pub fn set_null(&mut self) -> Result<()> {
        self.push_field(|buf| Param::Null.write(buf))
    }

    pub fn set_param(&mut self, value: &Param) -> Result<()> {
        self.push_field(|buf| value.write(buf))
    }

    fn push_field(&mut self, write: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> Result<()> {
        let code = self.code;
        let list = match self.args.as_mut() {
            Some(PendingArgs::Fields { list, .. }) => list,
            Some(PendingArgs::Ops(_)) => {
                return Err(DriverError::usage(
                    "update operations have started; plain fields are no longer accepted",
                ));
            }
            None => return Err(no_arguments(code)),
        };
        write(&mut list.buf)?;
        list.count += 1;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Update operations
    // -------------------------------------------------------------------------

    /// Append `[op, field, operand]` to the operation list.
    ///
    /// The first call closes the field section (the key for update, the tuple
    /// for upsert) and reopens the buffer under the operations section.
    pub fn append_update_op(&mut self, op: UpdateOp, field: i32, operand: &Param) -> Result<()> {
        if op.requires_numeric() && !operand.is_numeric() {
            return Err(DriverError::usage(format!(
                "update operator '{}' needs a numeric operand, got {:?}",
                op.symbol(),
                operand
            )));
        }

        let list = self.ops_list()?;
        encode::write_array_len(&mut list.buf, 3)?;
        encode::write_str(&mut list.buf, op.symbol())?;
        encode::write_sint(&mut list.buf, field.into())?;
        operand.write(&mut list.buf)?;
        list.count += 1;
        Ok(())
    }

    fn ops_list(&mut self) -> Result<&mut ArgList> {
        let code = self.code;
        if let Some(PendingArgs::Fields {
            list,
            ops: Some(section),
        }) = &self.args
        {
            let section = *section;
            list.write_section(&mut self.packet)?;
            self.args = Some(PendingArgs::Ops(ArgList::new(section)));
        }

        match self.args.as_mut() {
            Some(PendingArgs::Ops(list)) => Ok(list),
            Some(PendingArgs::Fields { .. }) => Err(DriverError::usage(
                "this command does not accept update operations",
            )),
            None => Err(no_arguments(code)),
        }
    }

    // -------------------------------------------------------------------------
    // Flush
    // -------------------------------------------------------------------------

    /// Write the outstanding argument sections and return the finished packet.
    ///
    /// The builder is idle afterwards.
    pub fn finish(&mut self) -> Result<&[u8]> {
        self.ensure_open()?;
        match self.args.take() {
            Some(PendingArgs::Fields { list, ops }) => {
                list.write_section(&mut self.packet)?;
                if let Some(section) = ops {
                    ArgList::new(section).write_section(&mut self.packet)?;
                }
            }
            Some(PendingArgs::Ops(list)) => list.write_section(&mut self.packet)?,
            None => {}
        }
        self.code = None;
        Ok(&self.packet)
    }

    /// Drop the open command without sending it
    pub fn abandon(&mut self) {
        self.code = None;
        self.args = None;
        self.packet.clear();
    }

    fn ensure_open(&self) -> Result<()> {
        if self.code.is_none() {
            return Err(DriverError::usage("no command is open"));
        }
        Ok(())
    }
}

fn no_arguments(code: Option<RequestType>) -> DriverError {
    match code {
        Some(code) => DriverError::usage(format!("{:?} takes no arguments", code)),
        None => DriverError::usage("no command is open"),
    }
}

/// Select, delete: fields form the key
pub(crate) const KEY_ARGS: ArgSection = ArgSection::Key;

/// Insert, replace, eval, call: fields form the tuple
pub(crate) const TUPLE_ARGS: ArgSection = ArgSection::Tuple;

/// Update: key, then operations under the tuple entry
pub(crate) const UPDATE_OPS: Option<ArgSection> = Some(ArgSection::Tuple);

/// Upsert: tuple, then operations under the ops entry
pub(crate) const UPSERT_OPS: Option<ArgSection> = Some(ArgSection::Ops);
