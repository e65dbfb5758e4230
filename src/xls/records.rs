//! BIFF record framing
//!
//! Every record in a workbook stream is framed the same way:
//!
//! ```text
//! [type: u16][length: u16][payload: length bytes]
//! ```
//!
//! both fields little-endian. This module reads and writes that framing and
//! nothing else: payload layouts belong to the typed records built on top of
//! it. Decoding never trusts the declared length; a payload that runs past
//! the end of the input is reported as [`XlsError::TruncatedRecord`] with the
//! record type and the header offset.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::common::binary;
use crate::xls::error::{XlsError, XlsResult};

/// Size of a record header in bytes
pub const RECORD_HEADER_LEN: usize = 4;

/// Largest payload the 16-bit length field can describe
pub const MAX_RECORD_DATA_LEN: usize = u16::MAX as usize;

/// Record type tags used by this crate.
///
/// Reference: [MS-XLS] 2.3 Record Enumeration.
pub mod types {
    pub const BOF: u16 = 0x0809;
    pub const EOF: u16 = 0x000A;
    pub const DIMENSIONS: u16 = 0x0200;
    pub const ROW: u16 = 0x0208;
    pub const COLINFO: u16 = 0x007D;
    pub const BLANK: u16 = 0x0201;
    pub const NUMBER: u16 = 0x0203;
    pub const LABEL: u16 = 0x0204;
    pub const BOOLERR: u16 = 0x0205;
    pub const HORIZONTALPAGEBREAKS: u16 = 0x001B;
    pub const VERTICALPAGEBREAKS: u16 = 0x001A;
    pub const MERGEDCELLS: u16 = 0x00E5;

    /// BOF substream type for a worksheet
    pub const BOF_WORKSHEET: u16 = 0x0010;
}

/// Payload layout generation.
///
/// `Legacy` is BIFF5/BIFF7 (Excel 5.0/95): 8-bit code-page strings and
/// two-byte page break entries. `Current` is BIFF8 (Excel 97-2003).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FormatVersion {
    Legacy,
    #[default]
    Current,
}

impl FormatVersion {
    /// Map the `vers` field of a BOF record to a payload layout.
    pub fn from_bof_version(version: u16) -> Option<Self> {
        match version {
            0x0500 => Some(FormatVersion::Legacy),
            0x0600 => Some(FormatVersion::Current),
            _ => None,
        }
    }

    /// The `vers` value written into BOF records.
    pub fn bof_version(self) -> u16 {
        match self {
            FormatVersion::Legacy => 0x0500,
            FormatVersion::Current => 0x0600,
        }
    }
}

/// BIFF record header (4 bytes: type + length)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub record_type: u16,
    pub data_len: u16,
}

impl RecordHeader {
    /// Parse a record header from the start of `data`
    pub fn parse(data: &[u8]) -> XlsResult<Self> {
        Ok(RecordHeader {
            record_type: binary::read_u16_le(data, 0)?,
            data_len: binary::read_u16_le(data, 2)?,
        })
    }

    /// Header bytes as they appear on disk
    pub fn to_bytes(self) -> [u8; RECORD_HEADER_LEN] {
        let t = self.record_type.to_le_bytes();
        let l = self.data_len.to_le_bytes();
        [t[0], t[1], l[0], l[1]]
    }
}

/// A BIFF record with header and data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub header: RecordHeader,
    pub data: Vec<u8>,
    /// Byte offset of the header in the source stream; 0 for built records.
    pub offset: usize,
}

impl Record {
    /// Build a record around a payload.
    ///
    /// # Panics
    ///
    /// Panics if `data` is longer than [`MAX_RECORD_DATA_LEN`]. Payload
    /// builders in this crate size their output up front, so an oversized
    /// payload is a bug in the caller rather than bad input.
    pub fn new(record_type: u16, data: Vec<u8>) -> Self {
        assert!(
            data.len() <= MAX_RECORD_DATA_LEN,
            "record 0x{record_type:04X} payload of {} bytes exceeds the 16-bit length field",
            data.len()
        );
        Record {
            header: RecordHeader {
                record_type,
                data_len: data.len() as u16,
            },
            data,
            offset: 0,
        }
    }

    /// Record type tag
    #[inline]
    pub fn record_type(&self) -> u16 {
        self.header.record_type
    }

    /// Decode the record whose header starts at `offset` in `bytes`.
    pub fn decode(bytes: &[u8], offset: usize) -> XlsResult<Self> {
        let available = bytes.len().saturating_sub(offset);
        if available < RECORD_HEADER_LEN {
            return Err(XlsError::TruncatedRecord {
                record_type: peek_type(&bytes[offset.min(bytes.len())..]),
                offset,
                declared: RECORD_HEADER_LEN,
                available,
            });
        }

        let header = RecordHeader::parse(&bytes[offset..])?;
        let start = offset + RECORD_HEADER_LEN;
        let declared = header.data_len as usize;
        let remaining = bytes.len() - start;
        if remaining < declared {
            return Err(XlsError::TruncatedRecord {
                record_type: header.record_type,
                offset,
                declared,
                available: remaining,
            });
        }

        Ok(Record {
            header,
            data: bytes[start..start + declared].to_vec(),
            offset,
        })
    }

    /// Total encoded size: header plus payload
    #[inline]
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_LEN + self.data.len()
    }

    /// Serialize header and payload
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    /// Serialize header and payload into `writer`
    pub fn write_to<W: Write>(&self, writer: &mut W) -> XlsResult<()> {
        write_record_header(writer, self.header.record_type, self.header.data_len)?;
        writer.write_all(&self.data)?;
        Ok(())
    }
}

/// Write a BIFF record header
///
/// # Arguments
///
/// * `writer` - Output writer
/// * `record_type` - BIFF record type (e.g., 0x0809 for BOF)
/// * `data_len` - Length of record data in bytes
#[inline]
pub(crate) fn write_record_header<W: Write>(
    writer: &mut W,
    record_type: u16,
    data_len: u16,
) -> XlsResult<()> {
    writer.write_all(&record_type.to_le_bytes())?;
    writer.write_all(&data_len.to_le_bytes())?;
    Ok(())
}

fn peek_type(rest: &[u8]) -> u16 {
    binary::read_u16_le(rest, 0).unwrap_or(0)
}

/// Iterator over the records of an in-memory stream.
///
/// Stops after the first error so a corrupt tail is reported once.
#[derive(Debug)]
pub struct RecordCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> RecordCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        RecordCursor {
            bytes,
            pos: 0,
            failed: false,
        }
    }

    /// Offset of the next record header
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for RecordCursor<'_> {
    type Item = XlsResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.bytes.len() {
            return None;
        }

        match Record::decode(self.bytes, self.pos) {
            Ok(record) => {
                self.pos += record.encoded_len();
                Some(Ok(record))
            },
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            },
        }
    }
}

/// Iterator over BIFF records in a stream
#[derive(Debug)]
pub struct RecordIter<R> {
    reader: R,
    current_pos: usize,
    failed: bool,
}

impl<R: Read> RecordIter<R> {
    pub fn new(reader: R) -> Self {
        RecordIter {
            reader,
            current_pos: 0,
            failed: false,
        }
    }

    fn read_record(&mut self) -> XlsResult<Option<Record>> {
        let offset = self.current_pos;

        let mut head = [0u8; RECORD_HEADER_LEN];
        let got = read_full(&mut self.reader, &mut head)?;
        if got == 0 {
            return Ok(None);
        }
        if got < RECORD_HEADER_LEN {
            return Err(XlsError::TruncatedRecord {
                record_type: peek_type(&head[..got]),
                offset,
                declared: RECORD_HEADER_LEN,
                available: got,
            });
        }

        let header = RecordHeader::parse(&head)?;
        let mut data = vec![0u8; header.data_len as usize];
        let got = read_full(&mut self.reader, &mut data)?;
        if got < data.len() {
            return Err(XlsError::TruncatedRecord {
                record_type: header.record_type,
                offset,
                declared: data.len(),
                available: got,
            });
        }

        self.current_pos += RECORD_HEADER_LEN + data.len();
        Ok(Some(Record {
            header,
            data,
            offset,
        }))
    }
}

impl<R: Read> Iterator for RecordIter<R> {
    type Item = XlsResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.read_record() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            },
        }
    }
}

/// Like `read_exact`, but reports how many bytes arrived before EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_frames_type_and_length() {
        let record = Record::new(types::EOF, Vec::new());
        assert_eq!(record.encode(), vec![0x0A, 0x00, 0x00, 0x00]);

        let record = Record::new(0x1234, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(record.encode(), vec![0x34, 0x12, 0x03, 0x00, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_decode_reports_truncated_payload() {
        // Header declares 14 bytes but only 6 follow.
        let bytes = [0x1B, 0x00, 0x0E, 0x00, 1, 2, 3, 4, 5, 6];
        match Record::decode(&bytes, 0) {
            Err(XlsError::TruncatedRecord {
                record_type,
                offset,
                declared,
                available,
            }) => {
                assert_eq!(record_type, types::HORIZONTALPAGEBREAKS);
                assert_eq!(offset, 0);
                assert_eq!(declared, 14);
                assert_eq!(available, 6);
            },
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_reports_truncated_header() {
        let bytes = [0x0A, 0x00, 0x00, 0x00, 0x09];
        let err = Record::decode(&bytes, 4).unwrap_err();
        assert!(matches!(
            err,
            XlsError::TruncatedRecord {
                offset: 4,
                declared: 4,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_cursor_walks_records_and_offsets() {
        let mut stream = Record::new(types::BOF, vec![0; 16]).encode();
        stream.extend(Record::new(types::EOF, Vec::new()).encode());

        let records: Vec<Record> = RecordCursor::new(&stream)
            .collect::<XlsResult<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type(), types::BOF);
        assert_eq!(records[1].offset, 20);
    }

    #[test]
    fn test_cursor_stops_after_error() {
        let mut stream = Record::new(types::EOF, Vec::new()).encode();
        stream.extend_from_slice(&[0x03, 0x02, 0x0E, 0x00, 0x00]);

        let mut cursor = RecordCursor::new(&stream);
        assert!(cursor.next().unwrap().is_ok());
        let err = cursor.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            XlsError::TruncatedRecord {
                record_type: types::NUMBER,
                offset: 4,
                ..
            }
        ));
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_record_iter_reads_from_stream() {
        let mut stream = Record::new(types::DIMENSIONS, vec![0; 14]).encode();
        stream.extend_from_slice(&[0x1A, 0x00, 0x08, 0x00, 0x01]);

        let mut iter = RecordIter::new(Cursor::new(stream));
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.record_type(), types::DIMENSIONS);
        let err = iter.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            XlsError::TruncatedRecord {
                record_type: types::VERTICALPAGEBREAKS,
                offset: 18,
                declared: 8,
                available: 1,
            }
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    #[should_panic(expected = "exceeds the 16-bit length field")]
    fn test_oversized_payload_panics() {
        let _ = Record::new(0x003C, vec![0; MAX_RECORD_DATA_LEN + 1]);
    }

    #[test]
    fn test_format_version_from_bof() {
        assert_eq!(FormatVersion::from_bof_version(0x0600), Some(FormatVersion::Current));
        assert_eq!(FormatVersion::from_bof_version(0x0500), Some(FormatVersion::Legacy));
        assert_eq!(FormatVersion::from_bof_version(0x0400), None);
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            record_type in any::<u16>(),
            data in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let record = Record::new(record_type, data);
            let bytes = record.encode();
            let decoded = Record::decode(&bytes, 0).unwrap();
            prop_assert_eq!(&decoded, &record);
            prop_assert_eq!(decoded.encode(), bytes);
        }
    }
}
