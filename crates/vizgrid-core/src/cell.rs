//! Cell, row and column storage types

use std::cell::OnceCell;

use crate::format::{DefaultFormatter, Formatter};
use crate::value::{ColumnType, Properties, PropertyValue, Value};

/// Complete data for a single cell
#[derive(Debug, Clone, Default)]
pub struct Cell {
    /// The cell's value
    pub value: Value,
    /// Explicitly set formatted value
    pub formatted: Option<String>,
    /// Cell-level properties
    pub properties: Option<Properties>,
    /// Formatter output, filled on first read when `formatted` is absent
    cached_format: OnceCell<String>,
}

impl Cell {
    /// Create a new cell holding a value
    pub fn new<V: Into<Value>>(value: V) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Create a null cell
    pub fn null() -> Self {
        Self::default()
    }

    /// Set the explicit formatted value
    pub fn with_formatted<S: Into<String>>(mut self, formatted: S) -> Self {
        self.formatted = Some(formatted.into());
        self
    }

    /// Set the cell properties
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Replace the value, dropping any formatted value derived from the old one
    pub(crate) fn set_value(&mut self, value: Value) {
        self.value = value;
        self.formatted = None;
        self.cached_format = OnceCell::new();
    }

    /// Replace the explicit formatted value
    pub(crate) fn set_formatted(&mut self, formatted: Option<String>) {
        self.formatted = formatted;
        self.cached_format = OnceCell::new();
    }

    /// Formatted value: the explicit one if set, else the formatter's output (cached)
    pub fn formatted_value(&self, formatter: &dyn Formatter) -> String {
        if let Some(f) = &self.formatted {
            return f.clone();
        }
        self.cached_format
            .get_or_init(|| formatter.format_value(&self.value))
            .clone()
    }

    /// Formatted string a copy of this cell must carry to read back the same
    ///
    /// The explicit one if set, else a cached formatter result that differs
    /// from the default rendering of the value.
    pub fn stored_formatted(&self) -> Option<String> {
        if let Some(f) = &self.formatted {
            return Some(f.clone());
        }
        self.cached_format
            .get()
            .filter(|f| f.as_str() != DefaultFormatter.format_value(&self.value))
            .cloned()
    }

    /// Look up a single cell property
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.as_ref().and_then(|p| p.get(name))
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.formatted == other.formatted
            && self.properties == other.properties
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        Cell::new(value)
    }
}

/// A table row: one cell per column plus row-level properties
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub(crate) cells: Vec<Cell>,
    pub(crate) properties: Properties,
}

impl Row {
    /// Create a row of `width` null cells
    pub fn empty(width: usize) -> Self {
        Self {
            cells: vec![Cell::null(); width],
            properties: Properties::new(),
        }
    }

    /// Cells in column order
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Row-level properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescription {
    /// Column id (not required to be unique)
    pub id: String,
    /// Display label
    pub label: String,
    /// Declared type
    pub column_type: ColumnType,
    /// Format pattern handed to formatters
    pub pattern: Option<String>,
    /// Column role (e.g. "annotation", "interval")
    pub role: Option<String>,
    /// Column-level properties
    pub properties: Properties,
}

impl ColumnDescription {
    /// Create a column of the given type with empty id and label
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            id: String::new(),
            label: String::new(),
            column_type,
            pattern: None,
            role: None,
            properties: Properties::new(),
        }
    }

    /// Set the id
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Set the label
    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = label.into();
        self
    }

    /// Set the pattern
    pub fn with_pattern<S: Into<String>>(mut self, pattern: S) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set the role
    pub fn with_role<S: Into<String>>(mut self, role: S) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Add a property
    pub fn with_property<S: Into<String>>(mut self, name: S, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DefaultFormatter;

    #[test]
    fn test_formatted_value_is_cached_until_value_changes() {
        let mut cell = Cell::new(1.5);
        let upper = |v: &Value| format!("<{}>", v);

        assert_eq!(cell.formatted_value(&upper), "<1.5>");
        // Cached result wins over a different formatter
        assert_eq!(cell.formatted_value(&DefaultFormatter), "<1.5>");

        cell.set_value(Value::Number(2.0));
        assert_eq!(cell.formatted_value(&DefaultFormatter), "2");
    }

    #[test]
    fn test_explicit_formatted_value() {
        let cell = Cell::new(1000.0).with_formatted("$1,000");
        assert_eq!(cell.formatted_value(&DefaultFormatter), "$1,000");
    }

    #[test]
    fn test_column_description_defaults() {
        let col = ColumnDescription::new(ColumnType::Number).with_label("Sales");
        assert_eq!(col.id, "");
        assert_eq!(col.label, "Sales");
        assert!(col.pattern.is_none());
    }
}
