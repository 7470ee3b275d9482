//! Utility functions and types for decoding Protobuf wire data.
//!
//! Every consumer takes a mutable byte slice, advances it past what it
//! decoded, and returns the value or a [`DecodeError`] when the input is
//! malformed.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

/// A wire-format decoding error.
///
/// Indicates that a byte region does not contain a valid Protobuf field
/// stream. The description should be considered 'best effort': in general it
/// is not possible to exactly pinpoint why data is malformed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeError {
    description: Cow<'static, str>,
}

impl DecodeError {
    pub(crate) fn new<S>(description: S) -> DecodeError
    where
        S: Into<Cow<'static, str>>,
    {
        DecodeError {
            description: description.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode wire data: ")?;
        f.write_str(&self.description)
    }
}

impl Error for DecodeError {}

/// The wire type of a Protobuf field key.
///
/// The integer value is equivalent with the encoded value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    SixtyFourBit = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    ThirtyTwoBit = 5,
}

impl TryFrom<u64> for WireType {
    type Error = DecodeError;

    fn try_from(value: u64) -> Result<WireType, DecodeError> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::SixtyFourBit),
            2 => Ok(WireType::LengthDelimited),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::ThirtyTwoBit),
            _ => Err(DecodeError::new(format!(
                "invalid wire type value: {}",
                value
            ))),
        }
    }
}

/// Decodes a LEB128-encoded variable length integer from the slice.
pub fn decode_varint(buf: &mut &[u8]) -> Result<u64, DecodeError> {
    let bytes = *buf;
    let mut value = 0u64;
    for (count, &byte) in bytes.iter().enumerate() {
        // Varints are never more than 10 bytes.
        if count == 10 {
            return Err(DecodeError::new("invalid varint"));
        }
        value |= u64::from(byte & 0x7f) << (count * 7);
        if byte < 0x80 {
            *buf = &bytes[count + 1..];
            return Ok(value);
        }
    }
    Err(DecodeError::new("buffer underflow"))
}

/// Decodes a Protobuf field key, which consists of a wire type designator
/// and the field tag.
pub fn decode_key(buf: &mut &[u8]) -> Result<(u32, WireType), DecodeError> {
    let key = decode_varint(buf)?;
    if key > u64::from(u32::MAX) {
        return Err(DecodeError::new(format!("invalid key value: {}", key)));
    }
    let wire_type = WireType::try_from(key & 0x07)?;
    let tag = (key >> 3) as u32;
    if tag == 0 {
        return Err(DecodeError::new("invalid tag value: 0"));
    }
    Ok((tag, wire_type))
}

/// Decodes a little-endian 32-bit fixed-width integer.
pub fn decode_fixed32(buf: &mut &[u8]) -> Result<u32, DecodeError> {
    let bytes = *buf;
    if bytes.len() < 4 {
        return Err(DecodeError::new("buffer underflow"));
    }
    let (value, rest) = bytes.split_at(4);
    let mut le = [0u8; 4];
    le.copy_from_slice(value);
    *buf = rest;
    Ok(u32::from_le_bytes(le))
}

/// Decodes a little-endian 64-bit fixed-width integer.
pub fn decode_fixed64(buf: &mut &[u8]) -> Result<u64, DecodeError> {
    let bytes = *buf;
    if bytes.len() < 8 {
        return Err(DecodeError::new("buffer underflow"));
    }
    let (value, rest) = bytes.split_at(8);
    let mut le = [0u8; 8];
    le.copy_from_slice(value);
    *buf = rest;
    Ok(u64::from_le_bytes(le))
}

/// Decodes a length-delimited byte run: a varint length prefix followed by
/// that many bytes, returned as a subslice of the input.
pub fn decode_length_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = decode_varint(buf)?;
    let bytes = *buf;
    if len > bytes.len() as u64 {
        return Err(DecodeError::new("buffer underflow"));
    }
    let (value, rest) = bytes.split_at(len as usize);
    *buf = rest;
    Ok(value)
}

/// Consumes a group's fields up to the end-group key matching `tag`,
/// returning the enclosed bytes. Groups nest.
pub fn decode_group<'a>(tag: u32, buf: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let start = *buf;
    loop {
        let remaining = buf.len();
        let (field_tag, wire_type) = decode_key(buf)?;
        if wire_type == WireType::EndGroup {
            if field_tag != tag {
                return Err(DecodeError::new("unexpected end group tag"));
            }
            let key_len = remaining - buf.len();
            let body_len = start.len() - buf.len() - key_len;
            return Ok(&start[..body_len]);
        }
        skip_field(field_tag, wire_type, buf)?;
    }
}

/// Skips one field's payload according to its wire type.
pub fn skip_field(tag: u32, wire_type: WireType, buf: &mut &[u8]) -> Result<(), DecodeError> {
    match wire_type {
        WireType::Varint => {
            decode_varint(buf)?;
        }
        WireType::SixtyFourBit => {
            decode_fixed64(buf)?;
        }
        WireType::LengthDelimited => {
            decode_length_delimited(buf)?;
        }
        WireType::StartGroup => {
            decode_group(tag, buf)?;
        }
        WireType::EndGroup => return Err(DecodeError::new("unexpected end group tag")),
        WireType::ThirtyTwoBit => {
            decode_fixed32(buf)?;
        }
    }
    Ok(())
}

/// Decodes a zig-zag-encoded unsigned integer into the signed value it
/// stands for.
pub fn decode_zigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ (-((value & 1) as i64))
}
