//! Protocol codec
//!
//! Framing and low-level MessagePack helpers shared by requests and responses.
//!
//! ## Wire Format
//!
//! ### Frame
//! ```text
//! ┌──────────┬────────────────┬──────────────────┬──────────────────┐
//! │ 0xce (1) │ Size (4, BE)   │  Header map      │  Body map        │
//! └──────────┴────────────────┴──────────────────┴──────────────────┘
//! ```
//! Size counts the header and body bytes only.
//!
//! ### Greeting
//! 128 bytes sent by the server on connect: a 64-byte banner line followed by
//! a 64-byte salt line.

use std::io::Read;

use bytes::{BufMut, Bytes, BytesMut};
use rmp::{decode, encode, Marker};

use crate::error::{DriverError, Result};

use super::constants::{
    GREETING_LINE_SIZE, GREETING_SIZE, KEY_CODE, KEY_SYNC, MAX_FRAME_SIZE,
};

/// Size prefix length: uint32 marker + 4 bytes
pub const SIZE_PREFIX_LEN: usize = 5;

// =============================================================================
// Framing
// =============================================================================

/// Append a size-prefixed frame carrying `packet` to `out`
pub fn write_frame(packet: &[u8], out: &mut BytesMut) -> Result<()> {
    let size = u32::try_from(packet.len()).map_err(|_| {
        DriverError::usage(format!("request of {} bytes is too large", packet.len()))
    })?;

    out.reserve(SIZE_PREFIX_LEN + packet.len());
    out.put_u8(0xce);
    out.put_u32(size);
    out.extend_from_slice(packet);
    Ok(())
}

/// Read one complete frame (header and body bytes, prefix stripped)
///
/// Blocks until the whole frame has arrived.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Bytes> {
    let size = read_frame_size(reader)?;
    if size > MAX_FRAME_SIZE {
        return Err(DriverError::protocol(format!(
            "Frame too large: {} bytes (max {})",
            size, MAX_FRAME_SIZE
        )));
    }

    let mut frame = vec![0u8; size as usize];
    reader.read_exact(&mut frame)?;
    Ok(Bytes::from(frame))
}

fn read_frame_size<R: Read>(reader: &mut R) -> Result<u32> {
    let mut marker = [0u8; 1];
    reader.read_exact(&mut marker)?;

    match Marker::from_u8(marker[0]) {
        Marker::FixPos(n) => Ok(n.into()),
        Marker::U8 => {
            let mut buf = [0u8; 1];
            reader.read_exact(&mut buf)?;
            Ok(buf[0].into())
        }
        Marker::U16 => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf)?;
            Ok(u16::from_be_bytes(buf).into())
        }
        Marker::U32 => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            Ok(u32::from_be_bytes(buf))
        }
        other => Err(DriverError::protocol(format!(
            "expected frame size, found marker {:?}",
            other
        ))),
    }
}

// =============================================================================
// Greeting
// =============================================================================

/// Server identity sent before any request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    banner: String,
}

impl Greeting {
    pub fn parse(bytes: &[u8; GREETING_SIZE]) -> Result<Self> {
        let line = &bytes[..GREETING_LINE_SIZE];
        // Only informational; undecodable bytes become U+FFFD.
        let banner = String::from_utf8_lossy(line)
            .trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
            .to_string();
        Ok(Self { banner })
    }

    /// Full banner line, e.g. `Tarantool 2.11.1 (Binary) 7c0b…`
    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Version token of the banner
    pub fn version(&self) -> Option<&str> {
        self.banner.split_whitespace().nth(1)
    }
}

/// Read and parse the fixed-size greeting
pub fn read_greeting<R: Read>(reader: &mut R) -> Result<Greeting> {
    let mut buf = [0u8; GREETING_SIZE];
    reader.read_exact(&mut buf)?;
    Greeting::parse(&buf)
}

// =============================================================================
// Request Decoding
// =============================================================================

/// Header fields of an encoded request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub code: u64,
    pub sync: u64,
}

/// Decode a request frame (prefix stripped) into its header and body value
///
/// A request without a body map decodes to `Value::Nil`.
pub fn decode_request(frame: &[u8]) -> Result<(RequestHeader, rmpv::Value)> {
    let mut rd = frame;
    let entries = decode::read_map_len(&mut rd)?;

    let mut code: Option<u64> = None;
    let mut sync: Option<u64> = None;
    for _ in 0..entries {
        match read_key(&mut rd)? {
            KEY_CODE => code = Some(decode::read_int(&mut rd)?),
            KEY_SYNC => sync = Some(decode::read_int(&mut rd)?),
            _ => skip_value(&mut rd)?,
        }
    }

    let header = RequestHeader {
        code: code.ok_or_else(|| DriverError::protocol("request header has no code"))?,
        sync: sync.ok_or_else(|| DriverError::protocol("request header has no sync"))?,
    };

    let body = if rd.is_empty() {
        rmpv::Value::Nil
    } else {
        rmpv::decode::read_value(&mut rd)?
    };
    Ok((header, body))
}

// =============================================================================
// Response Encoding
// =============================================================================

/// Build a complete response frame from a response code, a sync and an
/// already encoded body map
pub fn encode_response(code: u32, sync: u64, body: &[u8]) -> Result<Vec<u8>> {
    let mut packet = Vec::with_capacity(16 + body.len());
    encode::write_map_len(&mut packet, 2)?;
    encode::write_uint(&mut packet, KEY_CODE.into())?;
    encode::write_uint(&mut packet, code.into())?;
    encode::write_uint(&mut packet, KEY_SYNC.into())?;
    encode::write_uint(&mut packet, sync)?;
    packet.extend_from_slice(body);

    let mut out = BytesMut::with_capacity(SIZE_PREFIX_LEN + packet.len());
    write_frame(&packet, &mut out)?;
    Ok(out.to_vec())
}

// =============================================================================
// Decoding Helpers
// =============================================================================

/// Read an integer map key that fits in a byte
pub fn read_key(rd: &mut &[u8]) -> Result<u8> {
    let key: u64 = decode::read_int(rd)?;
    u8::try_from(key).map_err(|_| DriverError::protocol(format!("map key {} out of range", key)))
}

/// Read a UTF-8 string value
pub fn read_string(rd: &mut &[u8]) -> Result<String> {
    let len = decode::read_str_len(rd)? as usize;
    let bytes = take(rd, len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| DriverError::protocol("string is not UTF-8"))
}

/// Deepest array/map nesting a skipped value may have
pub const MAX_NESTING_DEPTH: usize = 1024;

/// Advance past one complete MessagePack value without decoding it
pub fn skip_value(rd: &mut &[u8]) -> Result<()> {
    skip_nested(rd, MAX_NESTING_DEPTH)
}

fn skip_nested(rd: &mut &[u8], depth: usize) -> Result<()> {
    let marker =
        decode::read_marker(rd).map_err(|_| DriverError::protocol("truncated value"))?;

    match marker {
        Marker::FixPos(_) | Marker::FixNeg(_) | Marker::Null | Marker::True | Marker::False => {
            Ok(())
        }
        Marker::U8 | Marker::I8 => skip(rd, 1),
        Marker::U16 | Marker::I16 => skip(rd, 2),
        Marker::U32 | Marker::I32 | Marker::F32 => skip(rd, 4),
        Marker::U64 | Marker::I64 | Marker::F64 => skip(rd, 8),
        Marker::FixStr(len) => skip(rd, len.into()),
        Marker::Str8 | Marker::Bin8 => {
            let len = read_len(rd, 1)?;
            skip(rd, len)
        }
        Marker::Str16 | Marker::Bin16 => {
            let len = read_len(rd, 2)?;
            skip(rd, len)
        }
        Marker::Str32 | Marker::Bin32 => {
            let len = read_len(rd, 4)?;
            skip(rd, len)
        }
        Marker::FixArray(len) => skip_values(rd, len.into(), depth),
        Marker::Array16 => {
            let len = read_len(rd, 2)?;
            skip_values(rd, len, depth)
        }
        Marker::Array32 => {
            let len = read_len(rd, 4)?;
            skip_values(rd, len, depth)
        }
        Marker::FixMap(len) => skip_values(rd, 2 * usize::from(len), depth),
        Marker::Map16 => {
            let len = read_len(rd, 2)?;
            skip_values(rd, 2 * len, depth)
        }
        Marker::Map32 => {
            let len = read_len(rd, 4)?;
            skip_values(rd, 2 * len, depth)
        }
        Marker::FixExt1 => skip(rd, 2),
        Marker::FixExt2 => skip(rd, 3),
        Marker::FixExt4 => skip(rd, 5),
        Marker::FixExt8 => skip(rd, 9),
        Marker::FixExt16 => skip(rd, 17),
        Marker::Ext8 => {
            let len = read_len(rd, 1)?;
            skip(rd, len + 1)
        }
        Marker::Ext16 => {
            let len = read_len(rd, 2)?;
            skip(rd, len + 1)
        }
        Marker::Ext32 => {
            let len = read_len(rd, 4)?;
            skip(rd, len + 1)
        }
        Marker::Reserved => Err(DriverError::protocol("reserved MessagePack marker")),
    }
}

/// Skip the items of a container whose marker sat at `depth`
fn skip_values(rd: &mut &[u8], count: usize, depth: usize) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    let depth = depth
        .checked_sub(1)
        .ok_or_else(|| DriverError::protocol("value nested too deeply"))?;
    for _ in 0..count {
        skip_nested(rd, depth)?;
    }
    Ok(())
}

fn read_len(rd: &mut &[u8], width: usize) -> Result<usize> {
    let bytes = take(rd, width)?;
    Ok(bytes.iter().fold(0usize, |acc, b| (acc << 8) | usize::from(*b)))
}

fn skip(rd: &mut &[u8], len: usize) -> Result<()> {
    take(rd, len).map(|_| ())
}

fn take<'a>(rd: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if rd.len() < len {
        return Err(DriverError::protocol(format!(
            "truncated value: need {} bytes, {} left",
            len,
            rd.len()
        )));
    }
    let (head, tail) = rd.split_at(len);
    *rd = tail;
    Ok(head)
}
