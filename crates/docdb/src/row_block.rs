//! Output containers filled by the row iterator
//!
//! - `RowBlock`: projection-shaped rows, one appended per `next_block`
//! - `ValueMap`: column name to value, refilled per `next_row`

use std::collections::BTreeMap;

use docrow_core::{DocDbError, DocResult, PrimitiveValue, Schema};

/// Column name to value mapping for ad hoc row consumption
///
/// Null columns are present with `PrimitiveValue::Null`.
pub type ValueMap = BTreeMap<String, PrimitiveValue>;

/// A block of rows shaped by a projection schema
#[derive(Debug, Clone)]
pub struct RowBlock {
    schema: Schema,
    rows: Vec<Vec<PrimitiveValue>>,
}

impl RowBlock {
    /// Create an empty block for rows of `schema`
    pub fn new(schema: Schema) -> Self {
        RowBlock {
            schema,
            rows: Vec::new(),
        }
    }

    /// Schema of every row in the block
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Append one row
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the row width differs from the block schema.
    pub fn push_row(&mut self, row: Vec<PrimitiveValue>) -> DocResult<()> {
        if row.len() != self.schema.num_columns() {
            return Err(DocDbError::schema_mismatch(format!(
                "row has {} values but block schema has {} columns",
                row.len(),
                self.schema.num_columns()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether the block holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at `idx`
    pub fn row(&self, idx: usize) -> Option<&[PrimitiveValue]> {
        self.rows.get(idx).map(Vec::as_slice)
    }

    /// Value of column `name` in row `idx`
    pub fn value(&self, idx: usize, name: &str) -> Option<&PrimitiveValue> {
        let col = self.schema.find_column(name)?;
        self.rows.get(idx)?.get(col)
    }

    /// All rows in insertion order
    pub fn rows(&self) -> impl Iterator<Item = &[PrimitiveValue]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Remove all rows, keeping the schema
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
