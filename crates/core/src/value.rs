//! Versioned cell value with TTL
//!
//! A `Value` is what one physical key-value pair holds: a primitive cell
//! payload, a tombstone or a row existence marker, plus an optional TTL. The
//! write time lives in the key; decoding attaches it so that expiry can be
//! evaluated from the value alone.
//!
//! # Format
//!
//! ```text
//! ┌──────────────────────────────────┬──────────────┬─────────────────────┐
//! │ 't' + ttl micros (u64 BE), opt.  │ type (1 byte)│ payload (variable)  │
//! └──────────────────────────────────┴──────────────┴─────────────────────┘
//! ```

use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{DocDbError, DocResult};
use crate::hybrid_time::HybridTime;
use crate::primitive_value::PrimitiveValue;
use crate::value_type::ValueType;

/// What a physical entry carries
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// A regular column value
    Primitive(PrimitiveValue),
    /// Deletion of a row (row-level entry) or a column
    Tombstone,
    /// Row existence, independent of any column value
    RowMarker,
}

/// A decoded physical value
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    kind: ValueKind,
    ttl: Option<Duration>,
    write_time: HybridTime,
}

impl Value {
    /// A regular column value without TTL
    pub fn primitive(value: impl Into<PrimitiveValue>) -> Self {
        Value::from_kind(ValueKind::Primitive(value.into()))
    }

    /// A deletion marker
    pub fn tombstone() -> Self {
        Value::from_kind(ValueKind::Tombstone)
    }

    /// A row existence marker
    pub fn row_marker() -> Self {
        Value::from_kind(ValueKind::RowMarker)
    }

    fn from_kind(kind: ValueKind) -> Self {
        Value {
            kind,
            ttl: None,
            write_time: HybridTime::MIN,
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the write time
    pub fn with_write_time(mut self, write_time: HybridTime) -> Self {
        self.write_time = write_time;
        self
    }

    /// The value kind
    #[inline]
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// The primitive payload, if this is a regular value
    pub fn primitive_value(&self) -> Option<&PrimitiveValue> {
        match &self.kind {
            ValueKind::Primitive(v) => Some(v),
            _ => None,
        }
    }

    /// Consume and return the primitive payload
    pub fn into_primitive_value(self) -> Option<PrimitiveValue> {
        match self.kind {
            ValueKind::Primitive(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this is a deletion marker
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        matches!(self.kind, ValueKind::Tombstone)
    }

    /// Whether this signals row existence rather than a column
    #[inline]
    pub fn is_row_marker(&self) -> bool {
        matches!(self.kind, ValueKind::RowMarker)
    }

    /// Write time of this version
    #[inline]
    pub fn write_time(&self) -> HybridTime {
        self.write_time
    }

    /// Time-to-live, if any
    #[inline]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// The instant after which the value is expired, `None` without TTL
    pub fn expiry_time(&self) -> Option<HybridTime> {
        self.ttl.map(|ttl| self.write_time.saturating_add(ttl))
    }

    /// Whether the value has expired as of `read_time`
    ///
    /// Expired iff `write_time + ttl < read_time`; values without TTL never
    /// expire.
    pub fn is_expired(&self, read_time: HybridTime) -> bool {
        match self.expiry_time() {
            Some(expiry) => expiry < read_time,
            None => false,
        }
    }

    /// Encode the value blob
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        if let Some(ttl) = self.ttl {
            out.push(ValueType::Ttl.as_byte());
            let mut buf = [0u8; 8];
            BigEndian::write_u64(&mut buf, u64::try_from(ttl.as_micros()).unwrap_or(u64::MAX));
            out.extend_from_slice(&buf);
        }
        match &self.kind {
            ValueKind::Primitive(v) => v.append_to_value(&mut out),
            ValueKind::Tombstone => out.push(ValueType::Tombstone.as_byte()),
            ValueKind::RowMarker => out.push(ValueType::ObjectMarker.as_byte()),
        }
        out
    }

    /// Decode a physical value blob written at `write_time`
    ///
    /// # Errors
    ///
    /// `MalformedValue` on an empty or truncated blob or an unknown type byte.
    pub fn decode(raw: &[u8], write_time: HybridTime) -> DocResult<Self> {
        let mut input = raw;
        let mut ttl = None;

        if input.first() == Some(&ValueType::Ttl.as_byte()) {
            if input.len() < 9 {
                return Err(DocDbError::malformed_value("truncated TTL"));
            }
            ttl = Some(Duration::from_micros(BigEndian::read_u64(&input[1..9])));
            input = &input[9..];
        }

        let (&tag_byte, payload) = input
            .split_first()
            .ok_or_else(|| DocDbError::malformed_value("empty value"))?;
        let tag = ValueType::from_byte(tag_byte).ok_or_else(|| {
            DocDbError::malformed_value(format!("unknown value type 0x{:02x}", tag_byte))
        })?;

        let kind = match tag {
            ValueType::Tombstone | ValueType::ObjectMarker => {
                if !payload.is_empty() {
                    return Err(DocDbError::malformed_value(format!(
                        "{:?} carries {} payload bytes",
                        tag,
                        payload.len()
                    )));
                }
                if tag == ValueType::Tombstone {
                    ValueKind::Tombstone
                } else {
                    ValueKind::RowMarker
                }
            }
            t if t.is_primitive() => ValueKind::Primitive(PrimitiveValue::decode_value_payload(t, payload)?),
            other => {
                return Err(DocDbError::malformed_value(format!(
                    "{:?} cannot start a value",
                    other
                )))
            }
        };

        Ok(Value {
            kind,
            ttl,
            write_time,
        })
    }
}
