//! Error types for BIFF record decoding, encoding and sheet mutation

use thiserror::Error;

use crate::common::binary::BinaryError;
use crate::xls::shift::Axis;

/// Result type alias for XLS operations
pub type XlsResult<T> = Result<T, XlsError>;

/// Errors raised by the record codec, the string codec and the sheet engine
#[derive(Debug, Error)]
pub enum XlsError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes remain in the stream than a record header or payload declares
    #[error(
        "Truncated record 0x{record_type:04X} at offset {offset}: declared {declared} bytes, {available} available"
    )]
    TruncatedRecord {
        /// Record type (0 when the header itself is cut short)
        record_type: u16,
        /// Byte offset of the record header in the stream
        offset: usize,
        /// Number of bytes the header declared
        declared: usize,
        /// Number of bytes actually left
        available: usize,
    },

    /// A record payload does not match the layout of its type
    #[error("Invalid record 0x{record_type:04X} at offset {offset}: {message}")]
    InvalidRecord {
        /// Record type
        record_type: u16,
        /// Byte offset of the record header in the stream
        offset: usize,
        /// Error description
        message: String,
    },

    /// A string payload could not be decoded
    #[error("Malformed string at offset {offset}: {reason}")]
    MalformedString {
        /// Offset of the string inside the payload being decoded
        offset: usize,
        /// Error description
        reason: String,
    },

    /// The sheet already holds the maximum number of rows or columns
    #[error("{axis} capacity exceeded: the format allows at most {limit}")]
    CapacityExceeded {
        /// Axis that ran out of room
        axis: Axis,
        /// Format ceiling for that axis
        limit: u32,
    },

    /// The style registry cannot hold another entry
    #[error("Style table is full ({limit} entries)")]
    StyleTableFull {
        /// Maximum number of registered styles
        limit: usize,
    },

    /// Text cannot be represented in the requested string encoding
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<BinaryError> for XlsError {
    fn from(err: BinaryError) -> Self {
        XlsError::InvalidData(err.to_string())
    }
}

impl XlsError {
    /// Attach the position of the offending record to a payload-level error.
    ///
    /// Payload parsers only see the record body; the reader calls this to
    /// turn a bare `InvalidData` into an `InvalidRecord` that names the
    /// record type and its offset in the stream.
    pub(crate) fn in_record(self, record_type: u16, offset: usize) -> Self {
        match self {
            XlsError::InvalidData(message) | XlsError::Encoding(message) => {
                XlsError::InvalidRecord {
                    record_type,
                    offset,
                    message,
                }
            },
            XlsError::MalformedString { reason, .. } => XlsError::InvalidRecord {
                record_type,
                offset,
                message: reason,
            },
            other => other,
        }
    }
}
