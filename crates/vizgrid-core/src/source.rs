//! The read interface shared by tables and views
//!
//! [`DataTable`](crate::DataTable) and [`DataView`](crate::DataView) both implement
//! [`DataSource`]. A view holds its source as a [`SharedSource`], so a view can wrap
//! a table or another view, and mutations of the shared table are visible through
//! every view built on it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::cell::ColumnDescription;
use crate::error::Result;
use crate::format::{DefaultFormatter, Formatter};
use crate::value::{ColumnType, Properties, PropertyValue, Value};

/// A shared, mutable handle to any table-like source
pub type SharedSource = Rc<RefCell<dyn DataSource>>;

/// Wrap a table or view so it can be used as a view source
pub fn shared<S: DataSource + 'static>(source: S) -> Rc<RefCell<S>> {
    Rc::new(RefCell::new(source))
}

/// Reference to a column by position or by id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    /// Column position
    Index(usize),
    /// Column id; the first column with this id is used
    Id(String),
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

impl From<&str> for ColumnRef {
    fn from(id: &str) -> Self {
        ColumnRef::Id(id.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(id: String) -> Self {
        ColumnRef::Id(id)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "{}", i),
            ColumnRef::Id(id) => write!(f, "'{}'", id),
        }
    }
}

/// Read capability common to concrete tables and views
pub trait DataSource {
    /// Number of columns
    fn number_of_columns(&self) -> usize;

    /// Number of rows
    fn number_of_rows(&self) -> usize;

    /// Column id
    fn get_column_id(&self, col: usize) -> Result<String>;

    /// Column label
    fn get_column_label(&self, col: usize) -> Result<String>;

    /// Column declared type
    fn get_column_type(&self, col: usize) -> Result<ColumnType>;

    /// Column format pattern
    fn get_column_pattern(&self, col: usize) -> Result<Option<String>>;

    /// Column role
    fn get_column_role(&self, col: usize) -> Result<Option<String>>;

    /// Column properties (empty for an unknown column)
    fn get_column_properties(&self, col: usize) -> Properties;

    /// Cell value
    fn get_value(&self, row: usize, col: usize) -> Result<Value>;

    /// Cell formatted value, formatting with `formatter` when no explicit one is stored
    fn get_formatted_value_with(
        &self,
        row: usize,
        col: usize,
        formatter: &dyn Formatter,
    ) -> Result<String>;

    /// Formatted string a copy of this cell must carry: the explicit one, or a
    /// formatter result already observed that differs from the default rendering
    fn get_stored_formatted_value(&self, row: usize, col: usize) -> Result<Option<String>>;

    /// Cell properties (empty for an unknown cell)
    fn get_properties(&self, row: usize, col: usize) -> Properties;

    /// Row properties (empty for an unknown row)
    fn get_row_properties(&self, row: usize) -> Properties;

    /// Table-level properties
    fn get_table_properties(&self) -> Properties;

    /// Resolve a column reference to a position in this source
    fn get_column_index(&self, column: &ColumnRef) -> Option<usize>;

    /// Resolve a column one level down (identity for a concrete table)
    fn get_table_column_index(&self, col: usize) -> Option<usize>;

    /// Resolve a row one level down (identity for a concrete table)
    fn get_table_row_index(&self, row: usize) -> Option<usize>;

    /// Resolve a column through every view down to the root table
    fn get_underlying_table_column_index(&self, col: usize) -> Option<usize>;

    /// Resolve a row through every view down to the root table
    fn get_underlying_table_row_index(&self, row: usize) -> Option<usize>;

    /// Counter that changes whenever anything observable through this source changes
    fn revision(&self) -> u64;

    /// Cell formatted value using the default formatter
    fn get_formatted_value(&self, row: usize, col: usize) -> Result<String> {
        self.get_formatted_value_with(row, col, &DefaultFormatter)
    }

    /// Single column property
    fn get_column_property(&self, col: usize, name: &str) -> Option<PropertyValue> {
        self.get_column_properties(col).remove(name)
    }

    /// Single cell property
    fn get_property(&self, row: usize, col: usize, name: &str) -> Option<PropertyValue> {
        self.get_properties(row, col).remove(name)
    }

    /// Single row property
    fn get_row_property(&self, row: usize, name: &str) -> Option<PropertyValue> {
        self.get_row_properties(row).remove(name)
    }

    /// Single table property
    fn get_table_property(&self, name: &str) -> Option<PropertyValue> {
        self.get_table_properties().remove(name)
    }

    /// All column metadata at once
    fn get_column_description(&self, col: usize) -> Result<ColumnDescription> {
        Ok(ColumnDescription {
            id: self.get_column_id(col)?,
            label: self.get_column_label(col)?,
            column_type: self.get_column_type(col)?,
            pattern: self.get_column_pattern(col)?,
            role: self.get_column_role(col)?,
            properties: self.get_column_properties(col),
        })
    }
}
