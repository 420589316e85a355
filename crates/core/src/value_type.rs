//! Type tag bytes of the physical key and value format
//!
//! Every encoded key component and every value blob starts with one of these
//! bytes. The numeric order of the structural tags is load-bearing:
//!
//! - `GroupEnd` sorts below every primitive tag, so a shorter document key
//!   sorts before any key that extends it
//! - `HybridTime` sorts below `ColumnId`, so the row-level entry of a
//!   document sorts before every column of that document
//!
//! Changing any byte is a breaking change of the on-disk format.

/// Tag byte of the physical format
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// Terminates the component list of a document key
    GroupEnd = b'!',
    /// Precedes the inverted write time at the end of a sub-document key
    HybridTime = b'#',
    /// Null primitive
    Null = b'$',
    /// Binary primitive
    Binary = b'B',
    /// Double primitive
    Double = b'D',
    /// Boolean false
    False = b'F',
    /// 32-bit integer primitive
    Int32 = b'H',
    /// 64-bit integer primitive
    Int64 = b'I',
    /// Column subkey of a sub-document key
    ColumnId = b'K',
    /// UTF-8 string primitive
    String = b'S',
    /// Boolean true
    True = b'T',
    /// Deletion marker for a row or a column
    Tombstone = b'X',
    /// Optional TTL prefix of a value blob
    Ttl = b't',
    /// Row existence marker
    ObjectMarker = b'{',
}

impl ValueType {
    /// Raw tag byte
    #[inline]
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Parse a tag byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'!' => Some(ValueType::GroupEnd),
            b'#' => Some(ValueType::HybridTime),
            b'$' => Some(ValueType::Null),
            b'B' => Some(ValueType::Binary),
            b'D' => Some(ValueType::Double),
            b'F' => Some(ValueType::False),
            b'H' => Some(ValueType::Int32),
            b'I' => Some(ValueType::Int64),
            b'K' => Some(ValueType::ColumnId),
            b'S' => Some(ValueType::String),
            b'T' => Some(ValueType::True),
            b'X' => Some(ValueType::Tombstone),
            b't' => Some(ValueType::Ttl),
            b'{' => Some(ValueType::ObjectMarker),
            _ => None,
        }
    }

    /// Whether this tag starts a primitive value
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            ValueType::Null
                | ValueType::Binary
                | ValueType::Double
                | ValueType::False
                | ValueType::Int32
                | ValueType::Int64
                | ValueType::String
                | ValueType::True
        )
    }
}
