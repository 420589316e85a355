//! Scan specifications
//!
//! A scan spec supplies the key range of a scan. Two flavours exist:
//!
//! - `ScanSpec`: bounds as store-native `EncodedKey`s, interpreted through
//!   the table schema
//! - `DocScanSpec`: bounds as `DocKey`s, which may be key prefixes
//!
//! Both resolve to `DocKeyBounds` through the `ScanBounds` trait. The lower
//! bound is inclusive and the upper bound exclusive. Predicates are the
//! caller's concern and are not represented here.

use docrow_core::{DocKey, DocResult, EncodedKey, Schema};

/// Document key range of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocKeyBounds {
    /// Inclusive lower bound; `None` starts at the beginning of the key space
    pub lower: Option<DocKey>,
    /// Exclusive upper bound; `None` scans to the end of the key space
    pub exclusive_upper: Option<DocKey>,
}

impl DocKeyBounds {
    /// Whether the range cannot contain any document
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.exclusive_upper) {
            (Some(lower), Some(upper)) => lower >= upper,
            _ => false,
        }
    }

    /// Physical key the scan seeks to
    pub fn seek_key(&self) -> Vec<u8> {
        self.lower.as_ref().map(DocKey::encode).unwrap_or_default()
    }

    /// Encoded exclusive upper bound, compared against document key prefixes
    pub fn encoded_upper(&self) -> Option<Vec<u8>> {
        self.exclusive_upper.as_ref().map(DocKey::encode)
    }
}

/// Anything that can supply the key range of a row scan
pub trait ScanBounds {
    /// Resolve the bounds against the table schema
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if a bound does not fit the schema's key columns.
    fn doc_bounds(&self, schema: &Schema) -> DocResult<DocKeyBounds>;
}

/// Scan range in store-native primary key encoding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSpec {
    lower: Option<EncodedKey>,
    exclusive_upper: Option<EncodedKey>,
}

impl ScanSpec {
    /// Scan the whole table
    pub fn full() -> Self {
        Self::default()
    }

    /// Start at `key` (inclusive)
    pub fn with_lower_bound(mut self, key: EncodedKey) -> Self {
        self.lower = Some(key);
        self
    }

    /// Stop before `key`
    pub fn with_exclusive_upper_bound(mut self, key: EncodedKey) -> Self {
        self.exclusive_upper = Some(key);
        self
    }

    /// Inclusive lower bound
    pub fn lower_bound(&self) -> Option<&EncodedKey> {
        self.lower.as_ref()
    }

    /// Exclusive upper bound
    pub fn exclusive_upper_bound(&self) -> Option<&EncodedKey> {
        self.exclusive_upper.as_ref()
    }
}

impl ScanBounds for ScanSpec {
    fn doc_bounds(&self, schema: &Schema) -> DocResult<DocKeyBounds> {
        let convert = |key: &EncodedKey| DocKey::from_encoded_key(key, schema);
        Ok(DocKeyBounds {
            lower: self.lower.as_ref().map(convert).transpose()?,
            exclusive_upper: self.exclusive_upper.as_ref().map(convert).transpose()?,
        })
    }
}

/// Scan range in document keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocScanSpec {
    lower: Option<DocKey>,
    exclusive_upper: Option<DocKey>,
}

impl DocScanSpec {
    /// Scan the whole table
    pub fn full() -> Self {
        Self::default()
    }

    /// Start at `key` (inclusive); a key prefix starts at its first document
    pub fn with_lower_bound(mut self, key: DocKey) -> Self {
        self.lower = Some(key);
        self
    }

    /// Stop before `key`; a key prefix stops before its first document
    pub fn with_exclusive_upper_bound(mut self, key: DocKey) -> Self {
        self.exclusive_upper = Some(key);
        self
    }

    /// Inclusive lower bound
    pub fn lower_bound(&self) -> Option<&DocKey> {
        self.lower.as_ref()
    }

    /// Exclusive upper bound
    pub fn exclusive_upper_bound(&self) -> Option<&DocKey> {
        self.exclusive_upper.as_ref()
    }
}

impl ScanBounds for DocScanSpec {
    fn doc_bounds(&self, schema: &Schema) -> DocResult<DocKeyBounds> {
        for key in self.lower.iter().chain(self.exclusive_upper.iter()) {
            key.validate_against(schema)?;
        }
        Ok(DocKeyBounds {
            lower: self.lower.clone(),
            exclusive_upper: self.exclusive_upper.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrow_core::{ColumnSchema, DataType, DocDbError, PrimitiveValue};

    fn schema() -> Schema {
        Schema::new(
            vec![
                ColumnSchema::not_null(0, "tenant", DataType::String),
                ColumnSchema::not_null(1, "id", DataType::Int64),
                ColumnSchema::new(2, "v", DataType::Int32),
            ],
            2,
        )
        .unwrap()
    }

    fn key(tenant: &str, id: i64) -> DocKey {
        DocKey::new(vec![PrimitiveValue::from(tenant), PrimitiveValue::Int64(id)])
    }

    #[test]
    fn test_full_scan_is_unbounded() {
        let bounds = ScanSpec::full().doc_bounds(&schema()).unwrap();
        assert_eq!(bounds, DocKeyBounds::default());
        assert!(!bounds.is_empty());
        assert!(bounds.seek_key().is_empty());
        assert!(bounds.encoded_upper().is_none());
    }

    #[test]
    fn test_encoded_bounds_convert_to_doc_keys() {
        let schema = schema();
        let lower = EncodedKey::from_values(&schema, &[PrimitiveValue::from("a"), PrimitiveValue::Int64(1)]).unwrap();
        let upper = EncodedKey::from_values(&schema, &[PrimitiveValue::from("a"), PrimitiveValue::Int64(9)]).unwrap();

        let bounds = ScanSpec::full()
            .with_lower_bound(lower)
            .with_exclusive_upper_bound(upper)
            .doc_bounds(&schema)
            .unwrap();
        assert_eq!(bounds.lower, Some(key("a", 1)));
        assert_eq!(bounds.exclusive_upper, Some(key("a", 9)));
        assert_eq!(bounds.seek_key(), key("a", 1).encode());
    }

    #[test]
    fn test_malformed_encoded_bound() {
        let spec = ScanSpec::full().with_lower_bound(EncodedKey::from_raw(vec![0x01]));
        assert!(matches!(spec.doc_bounds(&schema()), Err(DocDbError::SchemaMismatch(_))));
    }

    #[test]
    fn test_doc_bounds_allow_prefix() {
        let prefix = DocKey::new(vec![PrimitiveValue::from("b")]);
        let bounds = DocScanSpec::full()
            .with_exclusive_upper_bound(prefix.clone())
            .doc_bounds(&schema())
            .unwrap();
        assert_eq!(bounds.exclusive_upper, Some(prefix.clone()));

        // Every document of tenant "b" sorts at or after the prefix.
        assert!(key("b", i64::MIN).encode() > prefix.encode());
        assert!(key("a", i64::MAX).encode() < prefix.encode());
    }

    #[test]
    fn test_doc_bounds_reject_wrong_type() {
        let bad = DocKey::new(vec![PrimitiveValue::Int64(1)]);
        let spec = DocScanSpec::full().with_lower_bound(bad);
        assert!(matches!(spec.doc_bounds(&schema()), Err(DocDbError::SchemaMismatch(_))));
    }

    #[test]
    fn test_empty_range() {
        let same = DocKeyBounds {
            lower: Some(key("a", 1)),
            exclusive_upper: Some(key("a", 1)),
        };
        assert!(same.is_empty());

        let inverted = DocKeyBounds {
            lower: Some(key("a", 5)),
            exclusive_upper: Some(key("a", 1)),
        };
        assert!(inverted.is_empty());
    }
}
