//! Table schema and projection
//!
//! A `Schema` lists every column of a table with the primary key columns
//! first. A projection is itself a `Schema` whose columns are a subset of the
//! full schema, in the order the caller wants them materialized.

use std::fmt;

use crate::error::{DocDbError, DocResult};

/// Column identifier, stable across schema versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnId(pub u32);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean
    Bool,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit float
    Double,
    /// UTF-8 string
    String,
    /// Opaque bytes
    Binary,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "bool",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Double => "double",
            DataType::String => "string",
            DataType::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// Definition of a single column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    /// Stable column id, used in physical keys
    pub id: ColumnId,
    /// Column name, used by name-value outputs
    pub name: String,
    /// Column type
    pub data_type: DataType,
    /// Whether the column may be null
    pub nullable: bool,
}

impl ColumnSchema {
    /// Create a nullable column
    pub fn new(id: u32, name: impl Into<String>, data_type: DataType) -> Self {
        ColumnSchema {
            id: ColumnId(id),
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Create a non-nullable column (used for key columns)
    pub fn not_null(id: u32, name: impl Into<String>, data_type: DataType) -> Self {
        ColumnSchema {
            nullable: false,
            ..ColumnSchema::new(id, name, data_type)
        }
    }
}

/// Ordered set of columns with the key columns first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
    num_key_columns: usize,
}

impl Schema {
    /// Create a schema
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if `num_key_columns` exceeds the column count, or if
    /// column ids or names repeat.
    pub fn new(columns: Vec<ColumnSchema>, num_key_columns: usize) -> DocResult<Self> {
        if num_key_columns > columns.len() {
            return Err(DocDbError::schema_mismatch(format!(
                "{} key columns declared but only {} columns",
                num_key_columns,
                columns.len()
            )));
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.id == col.id || c.name == col.name) {
                return Err(DocDbError::schema_mismatch(format!(
                    "duplicate column {} ({})",
                    col.name, col.id
                )));
            }
        }
        Ok(Schema {
            columns,
            num_key_columns,
        })
    }

    /// Create a projection schema (no key prefix semantics)
    pub fn projection(columns: Vec<ColumnSchema>) -> DocResult<Self> {
        Schema::new(columns, 0)
    }

    /// All columns in order
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of leading primary key columns
    pub fn num_key_columns(&self) -> usize {
        self.num_key_columns
    }

    /// The primary key columns
    pub fn key_columns(&self) -> &[ColumnSchema] {
        &self.columns[..self.num_key_columns]
    }

    /// The non-key columns
    pub fn value_columns(&self) -> &[ColumnSchema] {
        &self.columns[self.num_key_columns..]
    }

    /// Index of the column with `id`
    pub fn find_column_by_id(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    /// Index of the column named `name`
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Column at `idx`
    pub fn column(&self, idx: usize) -> Option<&ColumnSchema> {
        self.columns.get(idx)
    }

    /// Whether the column at `idx` is a key column
    pub fn is_key_column(&self, idx: usize) -> bool {
        idx < self.num_key_columns
    }

    /// Check that every projected column exists in this schema
    ///
    /// Columns are matched by id; names and types must agree.
    pub fn validate_projection(&self, projection: &Schema) -> DocResult<()> {
        for col in projection.columns() {
            let idx = self.find_column_by_id(col.id).ok_or_else(|| {
                DocDbError::schema_mismatch(format!(
                    "projected column {} ({}) not in schema",
                    col.name, col.id
                ))
            })?;
            let full = &self.columns[idx];
            if full.name != col.name || full.data_type != col.data_type {
                return Err(DocDbError::schema_mismatch(format!(
                    "projected column {} {} disagrees with schema column {} {}",
                    col.name, col.data_type, full.name, full.data_type
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema [")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}[{}] {}", col.name, col.id, col.data_type)?;
            if self.is_key_column(i) {
                write!(f, " KEY")?;
            }
        }
        write!(f, "]")
    }
}
