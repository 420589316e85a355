//! Primitive cell and key component values
//!
//! `PrimitiveValue` is what a column holds once decoded. The same type is used
//! for document key components, where it is written with an order-preserving
//! encoding so that byte comparison of encoded keys equals logical comparison.
//!
//! ## Key encoding
//!
//! | Type   | Encoding                                                  |
//! |--------|-----------------------------------------------------------|
//! | Null   | tag                                                       |
//! | Bool   | `F` or `T` tag                                            |
//! | Int32  | tag, sign-flipped u32 big-endian                          |
//! | Int64  | tag, sign-flipped u64 big-endian                          |
//! | Double | tag, sign-aware flipped IEEE-754 bits big-endian          |
//! | String | tag, bytes with `0x00` escaped as `0x00 0x01`, `0x00 0x00` |
//! | Binary | same as String                                            |
//!
//! ## Value payload encoding
//!
//! Inside value blobs the trailing variable-length types are written raw
//! (the blob length delimits them) and fixed-width types are big-endian.

use std::cmp::Ordering;
use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{DocDbError, DocResult};
use crate::schema::DataType;
use crate::value_type::ValueType;

const SIGN_BIT_32: u32 = 1 << 31;
const SIGN_BIT_64: u64 = 1 << 63;

/// A decoded primitive value
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    /// Absent or deleted column
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Opaque bytes
    Binary(Vec<u8>),
}

impl PrimitiveValue {
    /// Whether this is `Null`
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, PrimitiveValue::Null)
    }

    /// The schema type of this value, `None` for `Null`
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            PrimitiveValue::Null => None,
            PrimitiveValue::Bool(_) => Some(DataType::Bool),
            PrimitiveValue::Int32(_) => Some(DataType::Int32),
            PrimitiveValue::Int64(_) => Some(DataType::Int64),
            PrimitiveValue::Double(_) => Some(DataType::Double),
            PrimitiveValue::String(_) => Some(DataType::String),
            PrimitiveValue::Binary(_) => Some(DataType::Binary),
        }
    }

    /// Whether this value can be stored in a column of `data_type`
    ///
    /// `Null` matches every type; nullability is checked by the caller.
    pub fn matches_type(&self, data_type: DataType) -> bool {
        self.data_type().map_or(true, |t| t == data_type)
    }

    fn tag(&self) -> ValueType {
        match self {
            PrimitiveValue::Null => ValueType::Null,
            PrimitiveValue::Bool(false) => ValueType::False,
            PrimitiveValue::Bool(true) => ValueType::True,
            PrimitiveValue::Int32(_) => ValueType::Int32,
            PrimitiveValue::Int64(_) => ValueType::Int64,
            PrimitiveValue::Double(_) => ValueType::Double,
            PrimitiveValue::String(_) => ValueType::String,
            PrimitiveValue::Binary(_) => ValueType::Binary,
        }
    }

    // =========================================================================
    // Key encoding
    // =========================================================================

    /// Compare as the key encodings of `self` and `other` would compare
    ///
    /// Values of different types order by their type tag.
    pub fn key_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PrimitiveValue::Int32(a), PrimitiveValue::Int32(b)) => a.cmp(b),
            (PrimitiveValue::Int64(a), PrimitiveValue::Int64(b)) => a.cmp(b),
            (PrimitiveValue::Double(a), PrimitiveValue::Double(b)) => {
                encode_double_bits(*a).cmp(&encode_double_bits(*b))
            }
            // The escaping keeps unescaped byte order.
            (PrimitiveValue::String(a), PrimitiveValue::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (PrimitiveValue::Binary(a), PrimitiveValue::Binary(b)) => a.cmp(b),
            _ => self.tag().as_byte().cmp(&other.tag().as_byte()),
        }
    }

    /// Append the order-preserving key encoding of this value
    pub fn append_to_key(&self, out: &mut Vec<u8>) {
        out.push(self.tag().as_byte());
        match self {
            PrimitiveValue::Null | PrimitiveValue::Bool(_) => {}
            PrimitiveValue::Int32(v) => {
                let mut buf = [0u8; 4];
                BigEndian::write_u32(&mut buf, (*v as u32) ^ SIGN_BIT_32);
                out.extend_from_slice(&buf);
            }
            PrimitiveValue::Int64(v) => {
                let mut buf = [0u8; 8];
                BigEndian::write_u64(&mut buf, (*v as u64) ^ SIGN_BIT_64);
                out.extend_from_slice(&buf);
            }
            PrimitiveValue::Double(v) => {
                let mut buf = [0u8; 8];
                BigEndian::write_u64(&mut buf, encode_double_bits(*v));
                out.extend_from_slice(&buf);
            }
            PrimitiveValue::String(s) => append_escaped(out, s.as_bytes()),
            PrimitiveValue::Binary(b) => append_escaped(out, b),
        }
    }

    /// Decode one key component from the front of `input`, advancing it
    pub fn decode_from_key(input: &mut &[u8]) -> DocResult<Self> {
        let (&tag_byte, rest) = input
            .split_first()
            .ok_or_else(|| DocDbError::malformed_key("missing key component"))?;
        let tag = ValueType::from_byte(tag_byte).ok_or_else(|| {
            DocDbError::malformed_key(format!("unknown key component tag 0x{:02x}", tag_byte))
        })?;
        *input = rest;

        let value = match tag {
            ValueType::Null => PrimitiveValue::Null,
            ValueType::False => PrimitiveValue::Bool(false),
            ValueType::True => PrimitiveValue::Bool(true),
            ValueType::Int32 => {
                let raw = take_fixed(input, 4, "int32 key component")?;
                PrimitiveValue::Int32((BigEndian::read_u32(raw) ^ SIGN_BIT_32) as i32)
            }
            ValueType::Int64 => {
                let raw = take_fixed(input, 8, "int64 key component")?;
                PrimitiveValue::Int64((BigEndian::read_u64(raw) ^ SIGN_BIT_64) as i64)
            }
            ValueType::Double => {
                let raw = take_fixed(input, 8, "double key component")?;
                PrimitiveValue::Double(decode_double_bits(BigEndian::read_u64(raw)))
            }
            ValueType::String => {
                let bytes = take_escaped(input)?;
                let s = String::from_utf8(bytes)
                    .map_err(|_| DocDbError::malformed_key("string key component is not UTF-8"))?;
                PrimitiveValue::String(s)
            }
            ValueType::Binary => PrimitiveValue::Binary(take_escaped(input)?),
            other => {
                return Err(DocDbError::malformed_key(format!(
                    "{:?} is not a primitive key component",
                    other
                )))
            }
        };
        Ok(value)
    }

    // =========================================================================
    // Value payload encoding
    // =========================================================================

    /// Append the value-blob encoding (type byte + payload)
    pub fn append_to_value(&self, out: &mut Vec<u8>) {
        out.push(self.tag().as_byte());
        match self {
            PrimitiveValue::Null | PrimitiveValue::Bool(_) => {}
            PrimitiveValue::Int32(v) => {
                let mut buf = [0u8; 4];
                BigEndian::write_i32(&mut buf, *v);
                out.extend_from_slice(&buf);
            }
            PrimitiveValue::Int64(v) => {
                let mut buf = [0u8; 8];
                BigEndian::write_i64(&mut buf, *v);
                out.extend_from_slice(&buf);
            }
            PrimitiveValue::Double(v) => {
                let mut buf = [0u8; 8];
                BigEndian::write_f64(&mut buf, *v);
                out.extend_from_slice(&buf);
            }
            PrimitiveValue::String(s) => out.extend_from_slice(s.as_bytes()),
            PrimitiveValue::Binary(b) => out.extend_from_slice(b),
        }
    }

    /// Decode a value payload whose type byte has already been consumed
    ///
    /// `payload` must be exactly the rest of the value blob.
    pub fn decode_value_payload(tag: ValueType, payload: &[u8]) -> DocResult<Self> {
        let expect_len = |n: usize| -> DocResult<()> {
            if payload.len() != n {
                return Err(DocDbError::malformed_value(format!(
                    "{:?} payload has {} bytes, expected {}",
                    tag,
                    payload.len(),
                    n
                )));
            }
            Ok(())
        };

        let value = match tag {
            ValueType::Null => {
                expect_len(0)?;
                PrimitiveValue::Null
            }
            ValueType::False => {
                expect_len(0)?;
                PrimitiveValue::Bool(false)
            }
            ValueType::True => {
                expect_len(0)?;
                PrimitiveValue::Bool(true)
            }
            ValueType::Int32 => {
                expect_len(4)?;
                PrimitiveValue::Int32(BigEndian::read_i32(payload))
            }
            ValueType::Int64 => {
                expect_len(8)?;
                PrimitiveValue::Int64(BigEndian::read_i64(payload))
            }
            ValueType::Double => {
                expect_len(8)?;
                PrimitiveValue::Double(BigEndian::read_f64(payload))
            }
            ValueType::String => {
                let s = std::str::from_utf8(payload)
                    .map_err(|_| DocDbError::malformed_value("string value is not UTF-8"))?;
                PrimitiveValue::String(s.to_string())
            }
            ValueType::Binary => PrimitiveValue::Binary(payload.to_vec()),
            other => {
                return Err(DocDbError::malformed_value(format!(
                    "{:?} is not a primitive value type",
                    other
                )))
            }
        };
        Ok(value)
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Null => write!(f, "null"),
            PrimitiveValue::Bool(v) => write!(f, "{}", v),
            PrimitiveValue::Int32(v) => write!(f, "{}", v),
            PrimitiveValue::Int64(v) => write!(f, "{}", v),
            PrimitiveValue::Double(v) => write!(f, "{}", v),
            PrimitiveValue::String(s) => write!(f, "\"{}\"", s),
            PrimitiveValue::Binary(b) => {
                write!(f, "0x")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl From<i32> for PrimitiveValue {
    fn from(v: i32) -> Self {
        PrimitiveValue::Int32(v)
    }
}

impl From<i64> for PrimitiveValue {
    fn from(v: i64) -> Self {
        PrimitiveValue::Int64(v)
    }
}

impl From<f64> for PrimitiveValue {
    fn from(v: f64) -> Self {
        PrimitiveValue::Double(v)
    }
}

impl From<bool> for PrimitiveValue {
    fn from(v: bool) -> Self {
        PrimitiveValue::Bool(v)
    }
}

impl From<&str> for PrimitiveValue {
    fn from(v: &str) -> Self {
        PrimitiveValue::String(v.to_string())
    }
}

impl From<String> for PrimitiveValue {
    fn from(v: String) -> Self {
        PrimitiveValue::String(v)
    }
}

impl From<Vec<u8>> for PrimitiveValue {
    fn from(v: Vec<u8>) -> Self {
        PrimitiveValue::Binary(v)
    }
}

// ============================================================================
// Encoding helpers
// ============================================================================

fn encode_double_bits(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits & SIGN_BIT_64 != 0 {
        !bits
    } else {
        bits ^ SIGN_BIT_64
    }
}

fn decode_double_bits(encoded: u64) -> f64 {
    let bits = if encoded & SIGN_BIT_64 != 0 {
        encoded ^ SIGN_BIT_64
    } else {
        !encoded
    };
    f64::from_bits(bits)
}

fn append_escaped(out: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        out.push(b);
        if b == 0x00 {
            out.push(0x01);
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
}

fn take_escaped(input: &mut &[u8]) -> DocResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut pos = 0;
    let bytes = *input;
    loop {
        match bytes.get(pos) {
            None => return Err(DocDbError::malformed_key("unterminated string key component")),
            Some(0x00) => match bytes.get(pos + 1) {
                Some(0x00) => {
                    *input = &bytes[pos + 2..];
                    return Ok(result);
                }
                Some(0x01) => {
                    result.push(0x00);
                    pos += 2;
                }
                _ => return Err(DocDbError::malformed_key("invalid escape in string key component")),
            },
            Some(&b) => {
                result.push(b);
                pos += 1;
            }
        }
    }
}

pub(crate) fn take_fixed<'a>(input: &mut &'a [u8], n: usize, what: &str) -> DocResult<&'a [u8]> {
    if input.len() < n {
        return Err(DocDbError::malformed_key(format!(
            "truncated {}: need {} bytes, have {}",
            what,
            n,
            input.len()
        )));
    }
    let (head, tail) = input.split_at(n);
    *input = tail;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key_bytes(v: &PrimitiveValue) -> Vec<u8> {
        let mut out = Vec::new();
        v.append_to_key(&mut out);
        out
    }

    #[test]
    fn test_int64_key_order() {
        let values = [i64::MIN, -5, -1, 0, 1, 7, i64::MAX];
        for pair in values.windows(2) {
            let a = key_bytes(&PrimitiveValue::Int64(pair[0]));
            let b = key_bytes(&PrimitiveValue::Int64(pair[1]));
            assert!(a < b, "{} should sort before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_double_key_order() {
        let values = [f64::NEG_INFINITY, -2.5, -0.5, 0.0, 0.25, 3.0, f64::INFINITY];
        for pair in values.windows(2) {
            assert!(key_bytes(&PrimitiveValue::Double(pair[0])) < key_bytes(&PrimitiveValue::Double(pair[1])));
        }
    }

    #[test]
    fn test_string_key_prefix_order() {
        let a = key_bytes(&PrimitiveValue::from("a"));
        let ab = key_bytes(&PrimitiveValue::from("ab"));
        let b = key_bytes(&PrimitiveValue::from("b"));
        assert!(a < ab);
        assert!(ab < b);
    }

    #[test]
    fn test_string_with_nul_roundtrip() {
        let v = PrimitiveValue::from("a\u{0}b");
        let bytes = key_bytes(&v);
        let mut input = bytes.as_slice();
        assert_eq!(PrimitiveValue::decode_from_key(&mut input).unwrap(), v);
        assert!(input.is_empty());
    }

    #[test]
    fn test_decode_leaves_remaining_input() {
        let mut bytes = key_bytes(&PrimitiveValue::Int32(-3));
        bytes.push(b'!');
        let mut input = bytes.as_slice();
        assert_eq!(
            PrimitiveValue::decode_from_key(&mut input).unwrap(),
            PrimitiveValue::Int32(-3)
        );
        assert_eq!(input, b"!");
    }

    #[test]
    fn test_truncated_key_component() {
        let mut input: &[u8] = &[b'I', 0x80, 0x00];
        let err = PrimitiveValue::decode_from_key(&mut input).unwrap_err();
        assert!(matches!(err, DocDbError::MalformedKey(_)));
    }

    #[test]
    fn test_unterminated_string_component() {
        let mut input: &[u8] = &[b'S', b'a', b'b'];
        assert!(matches!(
            PrimitiveValue::decode_from_key(&mut input),
            Err(DocDbError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_structural_tag_is_not_a_component() {
        let mut input: &[u8] = &[b'X'];
        assert!(PrimitiveValue::decode_from_key(&mut input).is_err());
    }

    #[test]
    fn test_value_payload_length_checked() {
        let err = PrimitiveValue::decode_value_payload(ValueType::Int64, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, DocDbError::MalformedValue(_)));
    }

    #[test]
    fn test_value_payload_string_raw() {
        let mut out = Vec::new();
        PrimitiveValue::from("hello").append_to_value(&mut out);
        assert_eq!(out[0], b'S');
        assert_eq!(&out[1..], b"hello");
        assert_eq!(
            PrimitiveValue::decode_value_payload(ValueType::String, &out[1..]).unwrap(),
            PrimitiveValue::from("hello")
        );
    }

    #[test]
    fn test_matches_type() {
        assert!(PrimitiveValue::Int64(1).matches_type(DataType::Int64));
        assert!(!PrimitiveValue::Int64(1).matches_type(DataType::Int32));
        assert!(PrimitiveValue::Null.matches_type(DataType::String));
    }

    #[test]
    fn test_display() {
        assert_eq!(PrimitiveValue::from("x").to_string(), "\"x\"");
        assert_eq!(PrimitiveValue::Binary(vec![0xab, 0x01]).to_string(), "0xab01");
        assert_eq!(PrimitiveValue::Null.to_string(), "null");
    }

    proptest! {
        #[test]
        fn prop_int64_key_order_matches_numeric(a in any::<i64>(), b in any::<i64>()) {
            let ka = key_bytes(&PrimitiveValue::Int64(a));
            let kb = key_bytes(&PrimitiveValue::Int64(b));
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        }

        #[test]
        fn prop_string_key_order_matches_bytes(a in ".{0,12}", b in ".{0,12}") {
            let ka = key_bytes(&PrimitiveValue::from(a.as_str()));
            let kb = key_bytes(&PrimitiveValue::from(b.as_str()));
            prop_assert_eq!(a.as_bytes().cmp(b.as_bytes()), ka.cmp(&kb));
        }
    }
}
