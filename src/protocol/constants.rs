//! IPROTO constants
//!
//! Numeric map keys and request codes shared by requests and responses.

// =============================================================================
// Framing
// =============================================================================

/// Size of the greeting the server sends on connect
pub const GREETING_SIZE: usize = 128;

/// Length of each greeting line (banner, then salt)
pub const GREETING_LINE_SIZE: usize = 64;

/// Maximum accepted response frame (256 MB)
pub const MAX_FRAME_SIZE: u32 = 256 * 1024 * 1024;

// =============================================================================
// Header Keys
// =============================================================================

pub const KEY_CODE: u8 = 0x00;
pub const KEY_SYNC: u8 = 0x01;
pub const KEY_SCHEMA_VERSION: u8 = 0x05;

/// Bit set in the response code when the request failed
pub const ERROR_CODE_FLAG: u32 = 0x8000;

// =============================================================================
// Body Keys
// =============================================================================

pub const KEY_SPACE: u8 = 0x10;
pub const KEY_INDEX: u8 = 0x11;
pub const KEY_LIMIT: u8 = 0x12;
pub const KEY_OFFSET: u8 = 0x13;
pub const KEY_ITERATOR: u8 = 0x14;
pub const KEY_KEY: u8 = 0x20;
pub const KEY_TUPLE: u8 = 0x21;
pub const KEY_FUNCTION_NAME: u8 = 0x22;
pub const KEY_EXPRESSION: u8 = 0x27;
pub const KEY_OPS: u8 = 0x28;
pub const KEY_DATA: u8 = 0x30;
pub const KEY_ERROR: u8 = 0x31;
pub const KEY_METADATA: u8 = 0x32;
pub const KEY_SQL_TEXT: u8 = 0x40;
pub const KEY_SQL_BIND: u8 = 0x41;
pub const KEY_SQL_INFO: u8 = 0x42;
/// Structured error stack sent alongside [`KEY_ERROR`]
pub const KEY_ERROR_EXT: u8 = 0x52;

/// Column name inside a metadata entry
pub const KEY_FIELD_NAME: u8 = 0x00;

/// Affected row count inside the SQL info map
pub const KEY_SQL_ROW_COUNT: u8 = 0x00;

// =============================================================================
// Request Types
// =============================================================================

/// Request type codes written under [`KEY_CODE`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    Select = 1,
    Insert = 2,
    Replace = 3,
    Update = 4,
    Delete = 5,
    Eval = 8,
    Upsert = 9,
    Call = 10,
    Execute = 11,
    Ping = 64,
}

impl RequestType {
    pub fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            1 => RequestType::Select,
            2 => RequestType::Insert,
            3 => RequestType::Replace,
            4 => RequestType::Update,
            5 => RequestType::Delete,
            8 => RequestType::Eval,
            9 => RequestType::Upsert,
            10 => RequestType::Call,
            11 => RequestType::Execute,
            64 => RequestType::Ping,
            _ => return None,
        })
    }

    /// SQL requests may answer with metadata, data and SQL info sections.
    pub fn is_sql(self) -> bool {
        self == RequestType::Execute
    }
}

// =============================================================================
// Select Iterators
// =============================================================================

/// Index iterator used by select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Iter {
    #[default]
    Eq = 0,
    Req = 1,
    All = 2,
    Lt = 3,
    Le = 4,
    Ge = 5,
    Gt = 6,
    BitsAllSet = 7,
    BitsAnySet = 8,
    BitsAllNotSet = 9,
    Overlaps = 10,
    Neighbor = 11,
}
