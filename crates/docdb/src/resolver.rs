//! Column validity resolution for one document
//!
//! The resolver consumes the run of physical entries that share one
//! `DocKey`, in key order, and decides for every schema column whether a
//! visible value exists as of the read time.
//!
//! # Rules
//!
//! Key order puts the row-level entry first and, per cell, the newest
//! version first. For each entry:
//!
//! 1. Versions written after the read time are invisible.
//! 2. Row-level entries: the newest visible tombstone sets the row delete
//!    time. A visible, unexpired row marker newer than any row tombstone
//!    confirms the row.
//! 3. Column entries: the newest visible version decides the column; older
//!    versions are shadowed. The version is valid iff it is not a
//!    tombstone, was written after the row delete time (a value written at
//!    exactly the delete time is deleted) and has not expired. An invalid
//!    deciding version leaves the column null.
//!
//! The row is found iff some column holds a valid value or the row marker
//! is valid. Key columns come from the `DocKey` itself.

use docrow_core::{
    DocDbError, DocKey, DocResult, HybridTime, PrimitiveValue, Schema, SubDocKey, Value,
    ValueKind,
};

/// What happened to one physical entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The entry took part in resolution
    Applied,
    /// Written after the read time
    NewerThanRead,
    /// An older version of an already decided cell
    Shadowed,
    /// Addresses a column the schema does not know, or a key column
    Ignored,
}

impl Observation {
    /// Whether the entry counts as a skipped version
    pub fn is_skipped_version(&self) -> bool {
        matches!(self, Observation::NewerThanRead | Observation::Shadowed)
    }
}

/// Outcome of resolving one document
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRow {
    doc_key: DocKey,
    values: Vec<PrimitiveValue>,
    column_found: bool,
    row_marker_found: bool,
}

impl ResolvedRow {
    /// The document key
    pub fn doc_key(&self) -> &DocKey {
        &self.doc_key
    }

    /// Values in full schema order; `Null` where no valid value exists
    pub fn values(&self) -> &[PrimitiveValue] {
        &self.values
    }

    /// Value of the schema column at `idx`
    pub fn value(&self, idx: usize) -> Option<&PrimitiveValue> {
        self.values.get(idx)
    }

    /// Whether any non-key column holds a valid value
    pub fn column_found(&self) -> bool {
        self.column_found
    }

    /// Whether a valid row marker was seen
    pub fn row_marker_found(&self) -> bool {
        self.row_marker_found
    }

    /// Whether the row exists as of the read time
    pub fn exists(&self) -> bool {
        self.column_found || self.row_marker_found
    }
}

#[derive(Debug, Clone)]
enum Cell {
    Pending,
    Decided(Option<PrimitiveValue>),
}

/// Incremental resolver for the entries of one document
#[derive(Debug)]
pub struct ColumnValidityResolver<'a> {
    schema: &'a Schema,
    read_time: HybridTime,
    doc_key: DocKey,
    row_level_done: bool,
    row_delete_time: Option<HybridTime>,
    row_marker_found: bool,
    cells: Vec<Cell>,
}

impl<'a> ColumnValidityResolver<'a> {
    /// Start resolving `doc_key` as of `read_time`
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the key does not carry exactly the schema's key
    /// columns.
    pub fn new(schema: &'a Schema, read_time: HybridTime, doc_key: DocKey) -> DocResult<Self> {
        doc_key.validate_against(schema)?;
        if doc_key.components().len() != schema.num_key_columns() {
            return Err(DocDbError::schema_mismatch(format!(
                "{} has {} components, schema has {} key columns",
                doc_key,
                doc_key.components().len(),
                schema.num_key_columns()
            )));
        }
        Ok(ColumnValidityResolver {
            schema,
            read_time,
            doc_key,
            row_level_done: false,
            row_delete_time: None,
            row_marker_found: false,
            cells: vec![Cell::Pending; schema.num_columns()],
        })
    }

    /// The document being resolved
    pub fn doc_key(&self) -> &DocKey {
        &self.doc_key
    }

    /// Row delete time observed so far
    pub fn row_delete_time(&self) -> Option<HybridTime> {
        self.row_delete_time
    }

    /// Feed one physical entry with its undecoded value blob
    ///
    /// The blob is decoded only when the entry takes part in resolution.
    ///
    /// # Errors
    ///
    /// `MalformedValue` on a corrupt blob, `SchemaMismatch` when a value does
    /// not fit its column, `InvalidState` if the key belongs to another
    /// document.
    pub fn observe_raw(&mut self, key: &SubDocKey, raw_value: &[u8]) -> DocResult<Observation> {
        match self.classify(key)? {
            Slot::Skip(observation) => Ok(observation),
            slot => {
                let value = Value::decode(raw_value, key.hybrid_time())?;
                self.apply(slot, value)
            }
        }
    }

    /// Feed one decoded physical entry
    ///
    /// The value's write time is taken from the key.
    pub fn observe(&mut self, key: &SubDocKey, value: Value) -> DocResult<Observation> {
        match self.classify(key)? {
            Slot::Skip(observation) => Ok(observation),
            slot => self.apply(slot, value.with_write_time(key.hybrid_time())),
        }
    }

    fn classify(&self, key: &SubDocKey) -> DocResult<Slot> {
        if key.doc_key() != &self.doc_key {
            return Err(DocDbError::invalid_state(format!(
                "{} fed to resolver of {}",
                key, self.doc_key
            )));
        }
        if key.hybrid_time() > self.read_time {
            return Ok(Slot::Skip(Observation::NewerThanRead));
        }
        let Some(column_id) = key.column_id() else {
            if self.row_level_done {
                return Ok(Slot::Skip(Observation::Shadowed));
            }
            return Ok(Slot::Row);
        };
        let Some(idx) = self.schema.find_column_by_id(column_id) else {
            return Ok(Slot::Skip(Observation::Ignored));
        };
        if self.schema.is_key_column(idx) {
            return Ok(Slot::Skip(Observation::Ignored));
        }
        match self.cells[idx] {
            Cell::Pending => Ok(Slot::Column(idx)),
            Cell::Decided(_) => Ok(Slot::Skip(Observation::Shadowed)),
        }
    }

    fn apply(&mut self, slot: Slot, value: Value) -> DocResult<Observation> {
        match slot {
            Slot::Row => self.apply_row_level(value)?,
            Slot::Column(idx) => self.apply_column(idx, value)?,
            Slot::Skip(observation) => return Ok(observation),
        }
        Ok(Observation::Applied)
    }

    fn apply_row_level(&mut self, value: Value) -> DocResult<()> {
        match value.kind() {
            ValueKind::Tombstone => {
                self.row_delete_time = Some(value.write_time());
                self.row_level_done = true;
            }
            ValueKind::RowMarker => {
                if !value.is_expired(self.read_time) {
                    self.row_marker_found = true;
                }
            }
            ValueKind::Primitive(v) => {
                return Err(DocDbError::malformed_value(format!(
                    "row-level entry of {} holds primitive {}",
                    self.doc_key, v
                )))
            }
        }
        Ok(())
    }

    fn apply_column(&mut self, idx: usize, value: Value) -> DocResult<()> {
        let deleted_by_row = self
            .row_delete_time
            .is_some_and(|delete_time| value.write_time() <= delete_time);
        if value.is_tombstone() || deleted_by_row || value.is_expired(self.read_time) {
            self.cells[idx] = Cell::Decided(None);
            return Ok(());
        }

        let column = &self.schema.columns()[idx];
        let primitive = match value.into_primitive_value() {
            Some(v) => v,
            None => {
                return Err(DocDbError::malformed_value(format!(
                    "row marker stored under column {} of {}",
                    column.name, self.doc_key
                )))
            }
        };
        if !primitive.is_null() && !primitive.matches_type(column.data_type) {
            return Err(DocDbError::schema_mismatch(format!(
                "value {} does not fit column {} {}",
                primitive, column.name, column.data_type
            )));
        }
        self.cells[idx] = Cell::Decided((!primitive.is_null()).then_some(primitive));
        Ok(())
    }

    /// Finish the document and produce the resolved row
    pub fn finish(self) -> ResolvedRow {
        let mut column_found = false;
        let mut values = Vec::with_capacity(self.cells.len());
        let mut key_components = self.doc_key.components().iter();
        for (idx, cell) in self.cells.into_iter().enumerate() {
            if self.schema.is_key_column(idx) {
                values.push(key_components.next().cloned().unwrap_or(PrimitiveValue::Null));
                continue;
            }
            match cell {
                Cell::Decided(Some(v)) => {
                    column_found = true;
                    values.push(v);
                }
                _ => values.push(PrimitiveValue::Null),
            }
        }
        ResolvedRow {
            doc_key: self.doc_key,
            values,
            column_found,
            row_marker_found: self.row_marker_found,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Row,
    Column(usize),
    Skip(Observation),
}

/// Resolve a complete run of decoded entries of one document
pub fn resolve_run<I>(
    schema: &Schema,
    read_time: HybridTime,
    doc_key: DocKey,
    entries: I,
) -> DocResult<ResolvedRow>
where
    I: IntoIterator<Item = (SubDocKey, Value)>,
{
    let mut resolver = ColumnValidityResolver::new(schema, read_time, doc_key)?;
    for (key, value) in entries {
        resolver.observe(&key, value)?;
    }
    Ok(resolver.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrow_core::{ColumnId, ColumnSchema, DataType};
    use std::time::Duration;

    const A: ColumnId = ColumnId(1);
    const B: ColumnId = ColumnId(2);

    fn schema() -> Schema {
        Schema::new(
            vec![
                ColumnSchema::not_null(0, "k", DataType::String),
                ColumnSchema::new(1, "a", DataType::String),
                ColumnSchema::new(2, "b", DataType::Int64),
            ],
            1,
        )
        .unwrap()
    }

    fn ht(micros: u64) -> HybridTime {
        HybridTime::from_micros(micros)
    }

    fn k1() -> DocKey {
        DocKey::new(vec![PrimitiveValue::from("K1")])
    }

    fn col(id: ColumnId, t: u64) -> SubDocKey {
        SubDocKey::column(k1(), id, ht(t))
    }

    fn row(t: u64) -> SubDocKey {
        SubDocKey::row(k1(), ht(t))
    }

    fn resolve(read: u64, mut entries: Vec<(SubDocKey, Value)>) -> ResolvedRow {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        resolve_run(&schema(), ht(read), k1(), entries).unwrap()
    }

    fn scenario() -> Vec<(SubDocKey, Value)> {
        vec![
            (col(A, 100), Value::primitive("x")),
            (col(A, 50), Value::primitive("y")),
            (row(80), Value::tombstone()),
        ]
    }

    #[test]
    fn test_newer_value_survives_older_row_tombstone() {
        let resolved = resolve(100, scenario());
        assert!(resolved.exists());
        assert_eq!(resolved.values()[1], PrimitiveValue::from("x"));
        assert_eq!(resolved.values()[0], PrimitiveValue::from("K1"));
    }

    #[test]
    fn test_read_before_tombstone_sees_older_value() {
        let resolved = resolve(70, scenario());
        assert!(resolved.exists());
        assert_eq!(resolved.values()[1], PrimitiveValue::from("y"));
    }

    #[test]
    fn test_read_between_tombstone_and_newer_value() {
        let resolved = resolve(90, scenario());
        assert!(!resolved.exists(), "A@50 is deleted by the tombstone at 80");
        assert_eq!(resolved.values()[1], PrimitiveValue::Null);
    }

    #[test]
    fn test_nothing_visible() {
        let resolved = resolve(40, scenario());
        assert!(!resolved.exists());
        assert!(!resolved.column_found());
        assert!(!resolved.row_marker_found());
    }

    #[test]
    fn test_value_at_tombstone_time_is_deleted() {
        let resolved = resolve(
            200,
            vec![(row(80), Value::tombstone()), (col(A, 80), Value::primitive("same"))],
        );
        assert_eq!(resolved.values()[1], PrimitiveValue::Null);
        assert!(!resolved.exists());
    }

    #[test]
    fn test_only_newest_version_emitted() {
        let resolved = resolve(
            500,
            vec![(col(B, 300), Value::primitive(3i64)), (col(B, 200), Value::primitive(2i64))],
        );
        assert_eq!(resolved.values()[2], PrimitiveValue::Int64(3));
    }

    #[test]
    fn test_column_tombstone_does_not_resurrect_older() {
        let resolved = resolve(
            500,
            vec![(col(B, 300), Value::tombstone()), (col(B, 200), Value::primitive(2i64))],
        );
        assert_eq!(resolved.values()[2], PrimitiveValue::Null);
        assert!(!resolved.exists());
    }

    #[test]
    fn test_ttl_boundaries() {
        let entries = || vec![(col(A, 100), Value::primitive("v").with_ttl(Duration::from_micros(10)))];
        assert!(resolve(105, entries()).exists());
        assert!(resolve(110, entries()).exists());

        let expired = resolve(111, entries());
        assert!(!expired.exists());
        assert_eq!(expired.values()[1], PrimitiveValue::Null);
    }

    #[test]
    fn test_row_marker_alone_confirms_row() {
        let resolved = resolve(100, vec![(row(10), Value::row_marker())]);
        assert!(resolved.exists());
        assert!(resolved.row_marker_found());
        assert!(!resolved.column_found());
        assert_eq!(resolved.values()[1], PrimitiveValue::Null);
    }

    #[test]
    fn test_expired_row_marker() {
        let resolved = resolve(
            100,
            vec![(row(10), Value::row_marker().with_ttl(Duration::from_micros(5)))],
        );
        assert!(!resolved.exists());
    }

    #[test]
    fn test_marker_after_tombstone() {
        let resolved = resolve(
            100,
            vec![
                (row(60), Value::row_marker()),
                (row(50), Value::tombstone()),
                (col(A, 40), Value::primitive("old")),
                (col(B, 55), Value::primitive(7i64)),
            ],
        );
        assert!(resolved.row_marker_found());
        assert_eq!(resolved.values()[1], PrimitiveValue::Null);
        assert_eq!(resolved.values()[2], PrimitiveValue::Int64(7));
    }

    #[test]
    fn test_marker_older_than_tombstone_is_ignored() {
        let schema = schema();
        let mut resolver = ColumnValidityResolver::new(&schema, ht(100), k1()).unwrap();
        assert_eq!(resolver.observe(&row(60), Value::tombstone()).unwrap(), Observation::Applied);
        assert_eq!(resolver.observe(&row(50), Value::row_marker()).unwrap(), Observation::Shadowed);
        assert_eq!(resolver.row_delete_time(), Some(ht(60)));
        assert!(!resolver.finish().exists());
    }

    #[test]
    fn test_unknown_column_ignored() {
        let schema = schema();
        let mut resolver = ColumnValidityResolver::new(&schema, ht(100), k1()).unwrap();
        let key = SubDocKey::column(k1(), ColumnId(99), ht(10));
        let obs = resolver.observe(&key, Value::primitive(1i64)).unwrap();
        assert_eq!(obs, Observation::Ignored);
        assert!(!resolver.finish().exists());
    }

    #[test]
    fn test_observations() {
        let schema = schema();
        let mut resolver = ColumnValidityResolver::new(&schema, ht(100), k1()).unwrap();
        let v = Value::primitive("v").encode();
        assert_eq!(resolver.observe_raw(&col(A, 150), &v).unwrap(), Observation::NewerThanRead);
        assert_eq!(resolver.observe_raw(&col(A, 90), &v).unwrap(), Observation::Applied);
        assert_eq!(resolver.observe_raw(&col(A, 80), &v).unwrap(), Observation::Shadowed);
        assert!(Observation::Shadowed.is_skipped_version());
        assert!(!Observation::Ignored.is_skipped_version());
    }

    #[test]
    fn test_skipped_versions_are_not_decoded() {
        let schema = schema();
        let mut resolver = ColumnValidityResolver::new(&schema, ht(100), k1()).unwrap();
        let obs = resolver.observe_raw(&col(A, 150), &[0xff]).unwrap();
        assert_eq!(obs, Observation::NewerThanRead);
    }

    #[test]
    fn test_malformed_value() {
        let schema = schema();
        let mut resolver = ColumnValidityResolver::new(&schema, ht(100), k1()).unwrap();
        let err = resolver.observe_raw(&col(A, 10), &[0xff]).unwrap_err();
        assert!(matches!(err, DocDbError::MalformedValue(_)));
    }

    #[test]
    fn test_value_type_mismatch() {
        let schema = schema();
        let mut resolver = ColumnValidityResolver::new(&schema, ht(100), k1()).unwrap();
        let err = resolver.observe(&col(B, 10), Value::primitive("not a number")).unwrap_err();
        assert!(matches!(err, DocDbError::SchemaMismatch(_)));
    }

    #[test]
    fn test_key_from_other_document() {
        let schema = schema();
        let mut resolver = ColumnValidityResolver::new(&schema, ht(100), k1()).unwrap();
        let other = SubDocKey::row(DocKey::new(vec![PrimitiveValue::from("K2")]), ht(10));
        let err = resolver.observe(&other, Value::row_marker()).unwrap_err();
        assert!(matches!(err, DocDbError::InvalidState(_)));
    }

    #[test]
    fn test_incomplete_doc_key_rejected() {
        let schema = schema();
        let err = ColumnValidityResolver::new(&schema, ht(1), DocKey::default()).unwrap_err();
        assert!(matches!(err, DocDbError::SchemaMismatch(_)));
    }
}
