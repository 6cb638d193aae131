//! Response definitions
//!
//! Decodes a response frame into its header and a classified body. Row data is
//! located and bounds-checked here but decoded lazily by the result cursor.

use bytes::Bytes;
use rmp::decode;

use crate::error::{DriverError, Result};

use super::codec::{read_key, read_string, skip_value};
use super::constants::{
    ERROR_CODE_FLAG, KEY_CODE, KEY_DATA, KEY_ERROR, KEY_ERROR_EXT, KEY_FIELD_NAME, KEY_METADATA,
    KEY_SCHEMA_VERSION, KEY_SQL_INFO, KEY_SQL_ROW_COUNT, KEY_SYNC,
};

/// Decoded response header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// 0 on success, `0x8000 | errcode` on failure
    pub code: u32,
    pub sync: u64,
    pub schema_version: Option<u64>,
}

impl ResponseHeader {
    pub fn is_error(&self) -> bool {
        self.code & ERROR_CODE_FLAG != 0
    }

    /// Server error number (without the error flag)
    pub fn error_code(&self) -> u32 {
        self.code & !ERROR_CODE_FLAG
    }
}

/// Location of the row array inside a response frame
#[derive(Debug, Clone)]
pub struct DataSection {
    frame: Bytes,
    offset: usize,
    rows: u32,
}

impl DataSection {
    /// Number of rows in the section
    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub(crate) fn into_parts(self) -> (Bytes, usize, u32) {
        (self.frame, self.offset, self.rows)
    }
}

/// Classified response body
#[derive(Debug, Clone, Default)]
pub struct ResponseBody {
    /// Number of entries in the body map (0 when the body is absent)
    pub entries: u32,
    pub data: Option<DataSection>,
    pub error: Option<String>,
    /// Whether the extended error stack accompanied the message
    pub error_ext: bool,
    /// Column names from SQL metadata
    pub columns: Option<Vec<String>>,
    /// Affected row count from SQL info
    pub row_count: Option<u64>,
}

impl ResponseBody {
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

/// A complete decoded response
#[derive(Debug, Clone)]
pub struct Response {
    pub header: ResponseHeader,
    pub body: ResponseBody,
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a response frame (size prefix stripped)
pub fn decode_response(frame: Bytes) -> Result<Response> {
    let mut rd: &[u8] = &frame;
    let header = decode_header(&mut rd)?;

    let body = if rd.is_empty() {
        ResponseBody::default()
    } else {
        decode_body(&frame, &mut rd)?
    };

    if !rd.is_empty() {
        return Err(DriverError::protocol(format!(
            "{} trailing bytes after response body",
            rd.len()
        )));
    }

    Ok(Response { header, body })
}

/// Decode the header map. A missing sync is a protocol violation.
pub fn decode_header(rd: &mut &[u8]) -> Result<ResponseHeader> {
    let entries = decode::read_map_len(rd)?;

    let mut code: Option<u32> = None;
    let mut sync: Option<u64> = None;
    let mut schema_version: Option<u64> = None;
    for _ in 0..entries {
        match read_key(rd)? {
            KEY_CODE => code = Some(decode::read_int(rd)?),
            KEY_SYNC => sync = Some(decode::read_int(rd)?),
            KEY_SCHEMA_VERSION => schema_version = Some(decode::read_int(rd)?),
            _ => skip_value(rd)?,
        }
    }

    Ok(ResponseHeader {
        code: code.unwrap_or(0),
        sync: sync.ok_or_else(|| DriverError::protocol("response header has no sync"))?,
        schema_version,
    })
}

fn decode_body(frame: &Bytes, rd: &mut &[u8]) -> Result<ResponseBody> {
    let entries = decode::read_map_len(rd)?;
    let mut body = ResponseBody {
        entries,
        ..ResponseBody::default()
    };

    for _ in 0..entries {
        match read_key(rd)? {
            KEY_DATA => {
                let rows = decode::read_array_len(rd)?;
                let offset = frame.len() - rd.len();
                for _ in 0..rows {
                    skip_value(rd)?;
                }
                body.data = Some(DataSection {
                    frame: frame.clone(),
                    offset,
                    rows,
                });
            }
            KEY_ERROR => body.error = Some(read_string(rd)?),
            // Structured error stack; the plain message above is enough.
            KEY_ERROR_EXT => {
                skip_value(rd)?;
                body.error_ext = true;
            }
            KEY_METADATA => body.columns = Some(decode_metadata(rd)?),
            KEY_SQL_INFO => body.row_count = decode_sql_info(rd)?,
            other => {
                return Err(DriverError::protocol(format!(
                    "Unknown body key 0x{:02x}",
                    other
                )));
            }
        }
    }

    Ok(body)
}

fn decode_metadata(rd: &mut &[u8]) -> Result<Vec<String>> {
    let count = decode::read_array_len(rd)?;
    let mut names = Vec::with_capacity(count as usize);

    for position in 0..count {
        let fields = decode::read_map_len(rd)?;
        let mut name = None;
        for _ in 0..fields {
            match read_key(rd)? {
                KEY_FIELD_NAME => name = Some(read_string(rd)?),
                _ => skip_value(rd)?,
            }
        }
        names.push(name.ok_or_else(|| {
            DriverError::protocol(format!("column {} has no name in metadata", position))
        })?);
    }

    Ok(names)
}

fn decode_sql_info(rd: &mut &[u8]) -> Result<Option<u64>> {
    let fields = decode::read_map_len(rd)?;
    let mut row_count = None;
    for _ in 0..fields {
        match read_key(rd)? {
            KEY_SQL_ROW_COUNT => row_count = Some(decode::read_int(rd)?),
            _ => skip_value(rd)?,
        }
    }
    Ok(row_count)
}
