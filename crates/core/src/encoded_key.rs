//! Store-native composite primary keys
//!
//! `EncodedKey` is the memcmp-comparable primary key representation used by
//! row-oriented scan specs. Unlike a `DocKey` it carries no type tags, so it
//! can only be interpreted through a `Schema`:
//!
//! - integers: sign-flipped big-endian
//! - booleans: one byte
//! - doubles: sign-aware flipped IEEE-754 bits
//! - strings/binary: raw bytes for the last key column, otherwise `0x00`
//!   escaped as `0x00 0x01` and terminated by `0x00 0x00`

use byteorder::{BigEndian, ByteOrder};

use crate::doc_key::DocKey;
use crate::error::{DocDbError, DocResult};
use crate::primitive_value::PrimitiveValue;
use crate::schema::{DataType, Schema};

/// Composite primary key in the store-native encoding
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EncodedKey {
    encoded: Vec<u8>,
}

impl EncodedKey {
    /// Wrap already-encoded bytes
    pub fn from_raw(encoded: Vec<u8>) -> Self {
        EncodedKey { encoded }
    }

    /// Encode the full primary key `values` for `schema`
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the value count or any value type disagrees with
    /// the key columns.
    pub fn from_values(schema: &Schema, values: &[PrimitiveValue]) -> DocResult<Self> {
        let key_columns = schema.key_columns();
        if values.len() != key_columns.len() {
            return Err(DocDbError::schema_mismatch(format!(
                "encoded key needs {} columns, got {}",
                key_columns.len(),
                values.len()
            )));
        }

        let mut encoded = Vec::new();
        for (i, (value, column)) in values.iter().zip(key_columns).enumerate() {
            let is_last = i + 1 == key_columns.len();
            let mismatch = || {
                DocDbError::schema_mismatch(format!(
                    "value {} does not fit key column {} {}",
                    value, column.name, column.data_type
                ))
            };
            match (value, column.data_type) {
                (PrimitiveValue::Bool(v), DataType::Bool) => encoded.push(u8::from(*v)),
                (PrimitiveValue::Int32(v), DataType::Int32) => {
                    let mut buf = [0u8; 4];
                    BigEndian::write_u32(&mut buf, (*v as u32) ^ (1 << 31));
                    encoded.extend_from_slice(&buf);
                }
                (PrimitiveValue::Int64(v), DataType::Int64) => {
                    let mut buf = [0u8; 8];
                    BigEndian::write_u64(&mut buf, (*v as u64) ^ (1 << 63));
                    encoded.extend_from_slice(&buf);
                }
                (PrimitiveValue::Double(v), DataType::Double) => {
                    let bits = v.to_bits();
                    let flipped = if bits >> 63 == 1 { !bits } else { bits ^ (1 << 63) };
                    let mut buf = [0u8; 8];
                    BigEndian::write_u64(&mut buf, flipped);
                    encoded.extend_from_slice(&buf);
                }
                (PrimitiveValue::String(s), DataType::String) => {
                    append_bytes(&mut encoded, s.as_bytes(), is_last)
                }
                (PrimitiveValue::Binary(b), DataType::Binary) => append_bytes(&mut encoded, b, is_last),
                _ => return Err(mismatch()),
            }
        }
        Ok(EncodedKey { encoded })
    }

    /// The encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }
}

fn append_bytes(out: &mut Vec<u8>, bytes: &[u8], is_last: bool) {
    if is_last {
        out.extend_from_slice(bytes);
        return;
    }
    for &b in bytes {
        out.push(b);
        if b == 0 {
            out.push(1);
        }
    }
    out.extend_from_slice(&[0, 0]);
}

impl DocKey {
    /// Convert a store-native primary key into a document key
    ///
    /// Pure and schema-aware: every key column of `schema` is decoded in order.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the bytes are truncated, malformed for a column
    /// type, or longer than the key columns account for.
    pub fn from_encoded_key(key: &EncodedKey, schema: &Schema) -> DocResult<DocKey> {
        let mut input = key.as_bytes();
        let key_columns = schema.key_columns();
        let mut components = Vec::with_capacity(key_columns.len());

        for (i, column) in key_columns.iter().enumerate() {
            let is_last = i + 1 == key_columns.len();
            let truncated = || {
                DocDbError::schema_mismatch(format!(
                    "encoded key truncated at key column {}",
                    column.name
                ))
            };
            let component = match column.data_type {
                DataType::Bool => {
                    let (&b, rest) = input.split_first().ok_or_else(truncated)?;
                    input = rest;
                    match b {
                        0 => PrimitiveValue::Bool(false),
                        1 => PrimitiveValue::Bool(true),
                        other => {
                            return Err(DocDbError::schema_mismatch(format!(
                                "invalid bool byte 0x{:02x} for key column {}",
                                other, column.name
                            )))
                        }
                    }
                }
                DataType::Int32 => {
                    let raw = take(&mut input, 4).ok_or_else(truncated)?;
                    PrimitiveValue::Int32((BigEndian::read_u32(raw) ^ (1 << 31)) as i32)
                }
                DataType::Int64 => {
                    let raw = take(&mut input, 8).ok_or_else(truncated)?;
                    PrimitiveValue::Int64((BigEndian::read_u64(raw) ^ (1 << 63)) as i64)
                }
                DataType::Double => {
                    let raw = take(&mut input, 8).ok_or_else(truncated)?;
                    let flipped = BigEndian::read_u64(raw);
                    let bits = if flipped >> 63 == 1 { flipped ^ (1 << 63) } else { !flipped };
                    PrimitiveValue::Double(f64::from_bits(bits))
                }
                DataType::String => {
                    let bytes = take_bytes(&mut input, is_last).ok_or_else(truncated)?;
                    let s = String::from_utf8(bytes).map_err(|_| {
                        DocDbError::schema_mismatch(format!(
                            "key column {} is not valid UTF-8",
                            column.name
                        ))
                    })?;
                    PrimitiveValue::String(s)
                }
                DataType::Binary => {
                    PrimitiveValue::Binary(take_bytes(&mut input, is_last).ok_or_else(truncated)?)
                }
            };
            components.push(component);
        }

        if !input.is_empty() {
            return Err(DocDbError::schema_mismatch(format!(
                "{} bytes left after decoding {} key columns",
                input.len(),
                key_columns.len()
            )));
        }
        Ok(DocKey::new(components))
    }
}

fn take<'a>(input: &mut &'a [u8], n: usize) -> Option<&'a [u8]> {
    if input.len() < n {
        return None;
    }
    let (head, tail) = input.split_at(n);
    *input = tail;
    Some(head)
}

fn take_bytes(input: &mut &[u8], is_last: bool) -> Option<Vec<u8>> {
    if is_last {
        let bytes = input.to_vec();
        *input = &[];
        return Some(bytes);
    }
    let bytes = *input;
    let mut result = Vec::new();
    let mut pos = 0;
    loop {
        match (bytes.get(pos), bytes.get(pos + 1)) {
            (Some(0), Some(0)) => {
                *input = &bytes[pos + 2..];
                return Some(result);
            }
            (Some(0), Some(1)) => {
                result.push(0);
                pos += 2;
            }
            (Some(0), _) | (None, _) => return None,
            (Some(&b), _) => {
                result.push(b);
                pos += 1;
            }
        }
    }
}
