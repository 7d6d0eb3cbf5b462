//! Record codec for the WAL and table wire format
//!
//! Every entry on disk is a single frame: a fixed 13-byte header followed by
//! the key and value bytes, contiguous, little-endian, no padding, no
//! checksum.
//!
//! Frame layout:
//! - 1 byte: operation tag
//! - 4 bytes: key length
//! - 8 bytes: value length
//! - N bytes: key
//! - N bytes: value

use crate::{Result, SiltError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Fixed frame header length
pub const HEADER_LEN: usize = 13;

/// Tag byte marking an undecodable frame
pub const TAG_INVALID: u8 = 0x00;

/// Operation tag of a record frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Insert a key-value pair
    Add = 0xF0,
    /// Update a key-value pair
    Put = 0xF1,
    /// Remove a key
    Del = 0xF2,
}

impl TryFrom<u8> for RecordKind {
    type Error = SiltError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0xF0 => Ok(RecordKind::Add),
            0xF1 => Ok(RecordKind::Put),
            0xF2 => Ok(RecordKind::Del),
            _ => Err(SiltError::InvalidRecordKind(value)),
        }
    }
}

/// One decoded frame, borrowing key and value from the input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Operation tag
    pub kind: RecordKind,
    /// Key bytes
    pub key: &'a [u8],
    /// Value bytes (empty for deletes)
    pub value: &'a [u8],
}

/// Encode one frame
///
/// The key length is written as a full 32-bit field; callers are responsible
/// for bounding key sizes to what the field can represent.
pub fn encode(kind: RecordKind, key: &[u8], value: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + key.len() + value.len());
    buf.put_u8(kind as u8);
    buf.put_u32_le(key.len() as u32);
    buf.put_u64_le(value.len() as u64);
    buf.put_slice(key);
    buf.put_slice(value);
    buf.freeze()
}

/// Decode exactly one frame from the front of `data`
///
/// Returns the record and the number of bytes consumed, so a caller can walk
/// a buffer of concatenated frames. Fails with `TruncatedRecord` when fewer
/// bytes are available than the header declares.
pub fn decode(data: &[u8]) -> Result<(Record<'_>, usize)> {
    if data.len() < HEADER_LEN {
        return Err(SiltError::TruncatedRecord {
            expected: HEADER_LEN as u64,
            available: data.len() as u64,
        });
    }

    let mut header = &data[..HEADER_LEN];
    let tag = header.get_u8();
    let key_len = header.get_u32_le() as u64;
    let value_len = header.get_u64_le();

    let total = HEADER_LEN as u64 + key_len + value_len;
    if (data.len() as u64) < total {
        return Err(SiltError::TruncatedRecord {
            expected: total,
            available: data.len() as u64,
        });
    }

    let kind = RecordKind::try_from(tag)?;
    let key_end = HEADER_LEN + key_len as usize;
    let value_end = key_end + value_len as usize;

    Ok((
        Record {
            kind,
            key: &data[HEADER_LEN..key_end],
            value: &data[key_end..value_end],
        },
        value_end,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for kind in [RecordKind::Add, RecordKind::Put, RecordKind::Del] {
            let frame = encode(kind, b"mykey", b"this is my value");
            let (record, consumed) = decode(&frame).unwrap();
            assert_eq!(consumed, frame.len());
            assert_eq!(record.kind, kind);
            assert_eq!(record.key, b"mykey");
            assert_eq!(record.value, b"this is my value");
        }
    }

    #[test]
    fn test_round_trip_empty_value() {
        let frame = encode(RecordKind::Del, b"gone", b"");
        let (record, consumed) = decode(&frame).unwrap();
        assert_eq!(consumed, HEADER_LEN + 4);
        assert_eq!(record.key, b"gone");
        assert!(record.value.is_empty());
    }

    #[test]
    fn test_round_trip_binary() {
        let key = vec![0x00, 0xFF, 0x7F, 0x80];
        let value: Vec<u8> = (0..=255).collect();
        let frame = encode(RecordKind::Put, &key, &value);
        let (record, _) = decode(&frame).unwrap();
        assert_eq!(record.key, &key[..]);
        assert_eq!(record.value, &value[..]);
    }

    #[test]
    fn test_header_layout() {
        let frame = encode(RecordKind::Put, b"abc", b"xy");
        assert_eq!(frame[0], 0xF1);
        assert_eq!(&frame[1..5], &3u32.to_le_bytes());
        assert_eq!(&frame[5..13], &2u64.to_le_bytes());
        assert_eq!(&frame[13..16], b"abc");
        assert_eq!(&frame[16..18], b"xy");
    }

    #[test]
    fn test_decode_short_header() {
        let err = decode(&[0xF1, 0x01]).unwrap_err();
        assert!(matches!(err, SiltError::TruncatedRecord { available: 2, .. }));
    }

    #[test]
    fn test_decode_short_payload() {
        let frame = encode(RecordKind::Put, b"abcdef", b"value");
        let err = decode(&frame[..frame.len() - 3]).unwrap_err();
        assert!(matches!(err, SiltError::TruncatedRecord { .. }));
    }

    #[test]
    fn test_decode_invalid_kind() {
        let mut frame = encode(RecordKind::Add, b"k", b"v").to_vec();
        frame[0] = TAG_INVALID;
        let err = decode(&frame).unwrap_err();
        assert!(matches!(err, SiltError::InvalidRecordKind(0x00)));
    }

    #[test]
    fn test_decode_consumes_one_frame() {
        let mut data = encode(RecordKind::Add, b"first", b"1").to_vec();
        data.extend_from_slice(&encode(RecordKind::Put, b"second", b"2"));

        let (first, consumed) = decode(&data).unwrap();
        assert_eq!(first.key, b"first");

        let (second, _) = decode(&data[consumed..]).unwrap();
        assert_eq!(second.kind, RecordKind::Put);
        assert_eq!(second.key, b"second");
    }
}
