//! Document keys and sub-document keys
//!
//! A logical row is identified by a `DocKey` (its primary key components). Every
//! physical entry of that row is addressed by a `SubDocKey`: the document key,
//! an optional column subkey and the write `HybridTime` of that version.
//!
//! # Format
//!
//! ```text
//! DocKey:
//! ┌─────────────────────────────┬──────────────────┐
//! │ Components (tagged, ordered) │ GroupEnd '!'     │
//! └─────────────────────────────┴──────────────────┘
//!
//! SubDocKey:
//! ┌──────────┬──────────────────────────────┬───────────┬──────────────────────┐
//! │ DocKey   │ 'K' + column id (u32 BE)     │ '#'       │ !write_time (u64 BE) │
//! │          │ (absent for row-level entry) │           │                      │
//! └──────────┴──────────────────────────────┴───────────┴──────────────────────┘
//! ```
//!
//! The write time is stored bitwise-inverted so that, for one (row, column)
//! pair, the most recent version is the first physical key. The DocKey
//! encoding is prefix-free: every SubDocKey of a document starts with the
//! document's encoded bytes, and no other document's keys do.
//!
//! Comparison of `DocKey` and `SubDocKey` agrees with comparison of their
//! encoded bytes, which is also the order of the underlying store, without
//! encoding either side.

use std::cmp::Ordering;
use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{DocDbError, DocResult};
use crate::hybrid_time::HybridTime;
use crate::primitive_value::{take_fixed, PrimitiveValue};
use crate::schema::{ColumnId, Schema};
use crate::value_type::ValueType;

// ============================================================================
// DocKey
// ============================================================================

/// Encoded primary-key identity of a logical row
#[derive(Debug, Clone, Default)]
pub struct DocKey {
    components: Vec<PrimitiveValue>,
}

impl DocKey {
    /// Create a document key from its components
    pub fn new(components: Vec<PrimitiveValue>) -> Self {
        DocKey { components }
    }

    /// The key components, in key column order
    pub fn components(&self) -> &[PrimitiveValue] {
        &self.components
    }

    /// Whether the key has no components
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Append the encoded form to `out`
    pub fn append_to(&self, out: &mut Vec<u8>) {
        for component in &self.components {
            component.append_to_key(out);
        }
        out.push(ValueType::GroupEnd.as_byte());
    }

    /// Encode the key
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        self.append_to(&mut out);
        out
    }

    /// Decode a document key from the front of `input`, advancing it
    pub fn decode_from(input: &mut &[u8]) -> DocResult<Self> {
        let mut components = Vec::new();
        loop {
            match input.first() {
                None => return Err(DocDbError::malformed_key("document key is missing its group end")),
                Some(&b) if b == ValueType::GroupEnd.as_byte() => {
                    *input = &input[1..];
                    return Ok(DocKey { components });
                }
                Some(_) => components.push(PrimitiveValue::decode_from_key(input)?),
            }
        }
    }

    /// Decode a document key that must occupy all of `bytes`
    pub fn decode(bytes: &[u8]) -> DocResult<Self> {
        let mut input = bytes;
        let doc_key = DocKey::decode_from(&mut input)?;
        if !input.is_empty() {
            return Err(DocDbError::malformed_key(format!(
                "{} trailing bytes after document key",
                input.len()
            )));
        }
        Ok(doc_key)
    }

    /// Length of the encoded document key at the front of a physical key
    pub fn encoded_prefix_len(raw: &[u8]) -> DocResult<usize> {
        let mut input = raw;
        DocKey::decode_from(&mut input)?;
        Ok(raw.len() - input.len())
    }

    /// Check the components against the key columns of `schema`
    ///
    /// A key may be a prefix of the full primary key (range bounds are), but
    /// every present component must be non-null and of the key column's type.
    pub fn validate_against(&self, schema: &Schema) -> DocResult<()> {
        let key_columns = schema.key_columns();
        if self.components.len() > key_columns.len() {
            return Err(DocDbError::schema_mismatch(format!(
                "document key has {} components but schema has {} key columns",
                self.components.len(),
                key_columns.len()
            )));
        }
        for (component, column) in self.components.iter().zip(key_columns) {
            if component.is_null() || !component.matches_type(column.data_type) {
                return Err(DocDbError::schema_mismatch(format!(
                    "key component {} does not fit key column {} {}",
                    component, column.name, column.data_type
                )));
            }
        }
        Ok(())
    }
}

impl PartialEq for DocKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DocKey {}

impl Ord for DocKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(&other.components) {
            match a.key_cmp(b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        // GroupEnd sorts below every component tag.
        self.components.len().cmp(&other.components.len())
    }
}

impl PartialOrd for DocKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocKey([")?;
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, "])")
    }
}

// ============================================================================
// SubDocKey
// ============================================================================

/// One physical version of one cell or row-level marker
#[derive(Debug, Clone)]
pub struct SubDocKey {
    doc_key: DocKey,
    column: Option<ColumnId>,
    hybrid_time: HybridTime,
}

impl SubDocKey {
    /// Key of a row-level entry (row marker or row tombstone)
    pub fn row(doc_key: DocKey, hybrid_time: HybridTime) -> Self {
        SubDocKey {
            doc_key,
            column: None,
            hybrid_time,
        }
    }

    /// Key of a column version
    pub fn column(doc_key: DocKey, column: ColumnId, hybrid_time: HybridTime) -> Self {
        SubDocKey {
            doc_key,
            column: Some(column),
            hybrid_time,
        }
    }

    /// The document key prefix
    pub fn doc_key(&self) -> &DocKey {
        &self.doc_key
    }

    /// Consume and return the document key
    pub fn into_doc_key(self) -> DocKey {
        self.doc_key
    }

    /// The column subkey, `None` for the row-level entry
    pub fn column_id(&self) -> Option<ColumnId> {
        self.column
    }

    /// Whether this addresses the row-level entry
    pub fn is_row_level(&self) -> bool {
        self.column.is_none()
    }

    /// Write time of this version
    pub fn hybrid_time(&self) -> HybridTime {
        self.hybrid_time
    }

    /// Encode the key
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        self.doc_key.append_to(&mut out);
        if let Some(column) = self.column {
            out.push(ValueType::ColumnId.as_byte());
            let mut buf = [0u8; 4];
            BigEndian::write_u32(&mut buf, column.0);
            out.extend_from_slice(&buf);
        }
        out.push(ValueType::HybridTime.as_byte());
        let mut buf = [0u8; 8];
        BigEndian::write_u64(&mut buf, !self.hybrid_time.as_raw());
        out.extend_from_slice(&buf);
        out
    }

    /// Parse a physical store key
    ///
    /// # Errors
    ///
    /// `MalformedKey` on truncated, unknown or trailing bytes.
    pub fn decode(raw: &[u8]) -> DocResult<Self> {
        let mut input = raw;
        let doc_key = DocKey::decode_from(&mut input)?;

        let column = match input.first().copied().and_then(ValueType::from_byte) {
            Some(ValueType::ColumnId) => {
                input = &input[1..];
                let id = take_fixed(&mut input, 4, "column id")?;
                Some(ColumnId(BigEndian::read_u32(id)))
            }
            Some(ValueType::HybridTime) => None,
            _ => {
                return Err(DocDbError::malformed_key(format!(
                    "expected column id or hybrid time after {}",
                    doc_key
                )))
            }
        };

        match input.first() {
            Some(&b) if b == ValueType::HybridTime.as_byte() => input = &input[1..],
            _ => return Err(DocDbError::malformed_key("sub-document key is missing its hybrid time")),
        }
        let ht = take_fixed(&mut input, 8, "hybrid time")?;
        let hybrid_time = HybridTime::from_raw(!BigEndian::read_u64(ht));

        if !input.is_empty() {
            return Err(DocDbError::malformed_key(format!(
                "{} trailing bytes after sub-document key",
                input.len()
            )));
        }

        Ok(SubDocKey {
            doc_key,
            column,
            hybrid_time,
        })
    }

    /// Whether `other` addresses the same cell (document and column)
    pub fn same_cell(&self, other: &SubDocKey) -> bool {
        self.column == other.column && self.doc_key == other.doc_key
    }
}

impl PartialEq for SubDocKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SubDocKey {}

impl Ord for SubDocKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Row level (no column) first, then newest version first.
        self.doc_key
            .cmp(&other.doc_key)
            .then(self.column.cmp(&other.column))
            .then(other.hybrid_time.cmp(&self.hybrid_time))
    }
}

impl PartialOrd for SubDocKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SubDocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubDocKey({}, ", self.doc_key)?;
        match self.column {
            Some(column) => write!(f, "[ColumnId({})], ", column)?,
            None => write!(f, "[], ")?,
        }
        write!(f, "{})", self.hybrid_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, DataType};
    use proptest::prelude::*;

    fn dk(id: i64) -> DocKey {
        DocKey::new(vec![PrimitiveValue::Int64(id)])
    }

    fn ht(micros: u64) -> HybridTime {
        HybridTime::from_micros(micros)
    }

    fn component() -> impl Strategy<Value = PrimitiveValue> {
        prop_oneof![
            Just(PrimitiveValue::Null),
            any::<bool>().prop_map(PrimitiveValue::Bool),
            (-3i32..3).prop_map(PrimitiveValue::Int32),
            any::<i64>().prop_map(PrimitiveValue::Int64),
            any::<f64>().prop_map(PrimitiveValue::Double),
            "[a\\x00b]{0,3}".prop_map(PrimitiveValue::String),
            prop::collection::vec(0u8..3, 0..3).prop_map(PrimitiveValue::Binary),
        ]
    }

    #[test]
    fn test_prefix_key_sorts_before_extension() {
        let prefix = DocKey::new(vec![PrimitiveValue::from("a")]);
        let full = DocKey::new(vec![PrimitiveValue::from("a"), PrimitiveValue::Int64(i64::MIN)]);
        assert!(prefix < full);
        assert!(prefix.encode() < full.encode());
        assert_ne!(prefix, full);
    }

    #[test]
    fn test_sub_doc_key_decode_inverse() {
        let key = SubDocKey::column(
            DocKey::new(vec![PrimitiveValue::from("user"), PrimitiveValue::Int32(7)]),
            ColumnId(3),
            ht(100),
        );
        let decoded = SubDocKey::decode(&key.encode()).unwrap();
        assert_eq!(decoded, key);
        assert_eq!(decoded.column_id(), Some(ColumnId(3)));
        assert_eq!(decoded.hybrid_time(), ht(100));
    }

    #[test]
    fn test_row_level_sorts_before_columns() {
        let row = SubDocKey::row(dk(1), ht(1));
        let col = SubDocKey::column(dk(1), ColumnId(0), ht(1_000));
        assert!(row.encode() < col.encode());
        assert!(row < col);
    }

    #[test]
    fn test_newer_versions_sort_first() {
        let newer = SubDocKey::column(dk(1), ColumnId(1), ht(100));
        let older = SubDocKey::column(dk(1), ColumnId(1), ht(50));
        assert!(newer < older);
    }

    #[test]
    fn test_document_order_dominates() {
        let a_old = SubDocKey::column(dk(1), ColumnId(9), ht(1));
        let b_new = SubDocKey::row(dk(2), ht(1_000));
        assert!(a_old < b_new);
    }

    #[test]
    fn test_column_order() {
        let c1 = SubDocKey::column(dk(1), ColumnId(1), ht(1));
        let c2 = SubDocKey::column(dk(1), ColumnId(2), ht(100));
        assert!(c1 < c2);
    }

    #[test]
    fn test_doc_key_prefix_of_sub_doc_key() {
        let doc = DocKey::new(vec![PrimitiveValue::from("a")]);
        let longer = DocKey::new(vec![PrimitiveValue::from("ab")]);
        let key = SubDocKey::column(longer, ColumnId(1), ht(1)).encode();
        // "a" must not claim keys of "ab"
        assert!(!key.starts_with(&doc.encode()));
        let own = SubDocKey::row(doc.clone(), ht(1)).encode();
        assert!(own.starts_with(&doc.encode()));
        assert_eq!(DocKey::encoded_prefix_len(&own).unwrap(), doc.encode().len());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut raw = SubDocKey::row(dk(1), ht(1)).encode();
        raw.push(0);
        assert!(matches!(SubDocKey::decode(&raw), Err(DocDbError::MalformedKey(_))));
    }

    #[test]
    fn test_decode_rejects_missing_hybrid_time() {
        let raw = dk(1).encode();
        assert!(matches!(SubDocKey::decode(&raw), Err(DocDbError::MalformedKey(_))));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(SubDocKey::decode(&[0xde, 0xad, 0xbe, 0xef]).is_err());
        assert!(SubDocKey::decode(&[]).is_err());
    }

    #[test]
    fn test_validate_against_schema() {
        let schema = Schema::new(
            vec![
                ColumnSchema::not_null(0, "tenant", DataType::String),
                ColumnSchema::not_null(1, "id", DataType::Int64),
                ColumnSchema::new(2, "v", DataType::String),
            ],
            2,
        )
        .unwrap();

        let full = DocKey::new(vec![PrimitiveValue::from("t"), PrimitiveValue::Int64(1)]);
        assert!(full.validate_against(&schema).is_ok());

        let prefix = DocKey::new(vec![PrimitiveValue::from("t")]);
        assert!(prefix.validate_against(&schema).is_ok());

        let wrong_type = DocKey::new(vec![PrimitiveValue::Int64(1)]);
        assert!(matches!(
            wrong_type.validate_against(&schema),
            Err(DocDbError::SchemaMismatch(_))
        ));

        let too_long = DocKey::new(vec![
            PrimitiveValue::from("t"),
            PrimitiveValue::Int64(1),
            PrimitiveValue::Int64(2),
        ]);
        assert!(too_long.validate_against(&schema).is_err());
    }

    #[test]
    fn test_display() {
        let key = SubDocKey::column(dk(5), ColumnId(2), ht(10));
        let s = key.to_string();
        assert!(s.contains("DocKey([5])"));
        assert!(s.contains("ColumnId(2)"));
    }

    proptest! {
        #[test]
        fn prop_sub_doc_key_order_is_logical(
            a in any::<i64>(), b in any::<i64>(),
            ca in proptest::option::of(0u32..4), cb in proptest::option::of(0u32..4),
            ta in any::<u32>(), tb in any::<u32>(),
        ) {
            let ka = SubDocKey { doc_key: dk(a), column: ca.map(ColumnId), hybrid_time: ht(ta as u64) };
            let kb = SubDocKey { doc_key: dk(b), column: cb.map(ColumnId), hybrid_time: ht(tb as u64) };
            // None (row level) sorts before Some(column); newer time sorts first.
            let expected = a.cmp(&b)
                .then(ca.cmp(&cb))
                .then((tb as u64).cmp(&(ta as u64)));
            prop_assert_eq!(ka.encode().cmp(&kb.encode()), expected);
            prop_assert_eq!(ka.cmp(&kb), expected);
        }

        #[test]
        fn prop_doc_key_order_matches_encoding(
            a in prop::collection::vec(component(), 0..4),
            b in prop::collection::vec(component(), 0..4),
        ) {
            let ka = DocKey::new(a);
            let kb = DocKey::new(b);
            prop_assert_eq!(ka.cmp(&kb), ka.encode().cmp(&kb.encode()));
            prop_assert_eq!(ka == kb, ka.encode() == kb.encode());
        }
    }
}
