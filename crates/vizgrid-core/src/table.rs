//! Concrete data table
//!
//! [`DataTable`] owns ordered columns and rows and defines the canonical
//! (table-space) index space that every view ultimately resolves to.

use std::cell::RefCell;
use std::ops::Range;

use ahash::AHashMap;

use crate::cell::{Cell, ColumnDescription, Row};
use crate::error::{Error, Result};
use crate::format::Formatter;
use crate::query::{DataSourceExt, SortColumn};
use crate::source::{ColumnRef, DataSource};
use crate::value::{ColumnType, Properties, PropertyValue, Value};

/// An in-memory table of typed columns and rows
///
/// Invariant: every row holds exactly one cell per column.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    /// Columns in order
    columns: Vec<ColumnDescription>,
    /// Rows in order
    rows: Vec<Row>,
    /// Table-level properties
    properties: Properties,
    /// Column id → first matching index; `None` until rebuilt after a column change
    id_index: RefCell<Option<AHashMap<String, usize>>>,
    /// Bumped on every mutation
    revision: u64,
}

impl DataTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table with the given columns
    pub fn with_columns<I: IntoIterator<Item = ColumnDescription>>(columns: I) -> Self {
        let mut table = Self::new();
        for column in columns {
            table.add_column(column);
        }
        table
    }

    /// Column descriptions in order
    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    /// Rows in order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    // === Column structure ===

    /// Append a column; every existing row gets a null cell
    pub fn add_column(&mut self, column: ColumnDescription) -> usize {
        let index = self.columns.len();
        self.insert_column_unchecked(index, column);
        index
    }

    /// Insert a column before `index` (`index == number_of_columns()` appends)
    pub fn insert_column(&mut self, index: usize, column: ColumnDescription) -> Result<()> {
        if index > self.columns.len() {
            return Err(Error::ColumnOutOfRange(index, self.columns.len()));
        }
        self.insert_column_unchecked(index, column);
        Ok(())
    }

    fn insert_column_unchecked(&mut self, index: usize, column: ColumnDescription) {
        log::debug!(
            "inserting {} column '{}' at {}",
            column.column_type,
            column.id,
            index
        );
        self.columns.insert(index, column);
        for row in &mut self.rows {
            row.cells.insert(index, Cell::null());
        }
        self.columns_changed();
    }

    /// Remove a single column
    pub fn remove_column(&mut self, index: usize) -> Result<()> {
        self.remove_columns(index, 1)
    }

    /// Remove `count` columns starting at `index`
    pub fn remove_columns(&mut self, index: usize, count: usize) -> Result<()> {
        let end = self.checked_span(index, count, self.columns.len(), Error::ColumnOutOfRange)?;
        log::debug!("removing columns {}..{}", index, end);
        self.columns.drain(index..end);
        for row in &mut self.rows {
            row.cells.drain(index..end);
        }
        self.columns_changed();
        Ok(())
    }

    fn columns_changed(&mut self) {
        *self.id_index.get_mut() = None;
        self.touch();
    }

    // === Row structure ===

    /// Append a row; omitted trailing cells are null
    pub fn add_row(&mut self, cells: Vec<Cell>) -> Result<usize> {
        let row = self.build_row(cells)?;
        self.rows.push(row);
        self.touch();
        Ok(self.rows.len() - 1)
    }

    /// Append a row of plain values
    pub fn add_row_values<I, V>(&mut self, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.add_row(values.into_iter().map(|v| Cell::new(v)).collect())
    }

    /// Append `count` rows of null cells, returning the new row indices
    pub fn add_rows(&mut self, count: usize) -> Range<usize> {
        let start = self.rows.len();
        let width = self.columns.len();
        self.rows.extend((0..count).map(|_| Row::empty(width)));
        self.touch();
        start..self.rows.len()
    }

    /// Append several rows of cells, returning the new row indices
    ///
    /// Nothing is appended if any row is invalid.
    pub fn add_rows_from<I>(&mut self, rows: I) -> Result<Range<usize>>
    where
        I: IntoIterator<Item = Vec<Cell>>,
    {
        let built = rows
            .into_iter()
            .map(|cells| self.build_row(cells))
            .collect::<Result<Vec<_>>>()?;
        let start = self.rows.len();
        self.rows.extend(built);
        self.touch();
        Ok(start..self.rows.len())
    }

    /// Insert `count` rows of null cells before `index`
    pub fn insert_rows(&mut self, index: usize, count: usize) -> Result<()> {
        if index > self.rows.len() {
            return Err(Error::RowOutOfRange(index, self.rows.len()));
        }
        let width = self.columns.len();
        self.rows
            .splice(index..index, (0..count).map(|_| Row::empty(width)));
        self.touch();
        Ok(())
    }

    /// Remove a single row
    pub fn remove_row(&mut self, index: usize) -> Result<()> {
        self.remove_rows(index, 1)
    }

    /// Remove `count` rows starting at `index`
    pub fn remove_rows(&mut self, index: usize, count: usize) -> Result<()> {
        let end = self.checked_span(index, count, self.rows.len(), Error::RowOutOfRange)?;
        log::debug!("removing rows {}..{}", index, end);
        self.rows.drain(index..end);
        self.touch();
        Ok(())
    }

    fn build_row(&self, mut cells: Vec<Cell>) -> Result<Row> {
        if cells.len() > self.columns.len() {
            return Err(Error::config(format!(
                "Row has {} cells but the table has {} columns",
                cells.len(),
                self.columns.len()
            )));
        }
        for (col, cell) in cells.iter_mut().enumerate() {
            cell.value = std::mem::take(&mut cell.value).truncated_to_millis();
            self.check_value(col, &cell.value)?;
        }
        cells.resize_with(self.columns.len(), Cell::null);
        Ok(Row {
            cells,
            properties: Properties::new(),
        })
    }

    fn checked_span(
        &self,
        index: usize,
        count: usize,
        len: usize,
        err: fn(usize, usize) -> Error,
    ) -> Result<usize> {
        match index.checked_add(count) {
            Some(end) if end <= len => Ok(end),
            _ => Err(err(index + count.saturating_sub(1), len)),
        }
    }

    // === Cell access ===

    /// Get a cell
    pub fn get_cell(&self, row: usize, col: usize) -> Result<&Cell> {
        self.check_column(col)?;
        self.rows
            .get(row)
            .map(|r| &r.cells[col])
            .ok_or(Error::RowOutOfRange(row, self.rows.len()))
    }

    fn cell_mut(&mut self, row: usize, col: usize) -> Result<&mut Cell> {
        self.check_column(col)?;
        let count = self.rows.len();
        self.rows
            .get_mut(row)
            .map(|r| &mut r.cells[col])
            .ok_or(Error::RowOutOfRange(row, count))
    }

    /// Set a cell value; clears any formatted value
    ///
    /// Times are kept to millisecond precision.
    pub fn set_value<V: Into<Value>>(&mut self, row: usize, col: usize, value: V) -> Result<()> {
        let value = value.into().truncated_to_millis();
        self.check_value(col, &value)?;
        self.cell_mut(row, col)?.set_value(value);
        self.touch();
        Ok(())
    }

    /// Set (or clear) the explicit formatted value of a cell
    pub fn set_formatted_value(
        &mut self,
        row: usize,
        col: usize,
        formatted: Option<String>,
    ) -> Result<()> {
        self.cell_mut(row, col)?.set_formatted(formatted);
        self.touch();
        Ok(())
    }

    /// Replace a cell's value, formatted value and properties
    pub fn set_cell<V: Into<Value>>(
        &mut self,
        row: usize,
        col: usize,
        value: V,
        formatted: Option<String>,
        properties: Option<Properties>,
    ) -> Result<()> {
        let value = value.into().truncated_to_millis();
        self.check_value(col, &value)?;
        let cell = self.cell_mut(row, col)?;
        cell.set_value(value);
        cell.set_formatted(formatted);
        if properties.is_some() {
            cell.properties = properties;
        }
        self.touch();
        Ok(())
    }

    fn check_column(&self, col: usize) -> Result<()> {
        if col < self.columns.len() {
            Ok(())
        } else {
            Err(Error::ColumnOutOfRange(col, self.columns.len()))
        }
    }

    fn check_value(&self, col: usize, value: &Value) -> Result<()> {
        let expected = self
            .columns
            .get(col)
            .ok_or(Error::ColumnOutOfRange(col, self.columns.len()))?
            .column_type;
        if value.fits(expected) {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                column: col,
                expected,
                actual: value.type_name(),
            })
        }
    }

    // === Properties ===

    /// Set one cell property
    pub fn set_property<S: Into<String>>(
        &mut self,
        row: usize,
        col: usize,
        name: S,
        value: PropertyValue,
    ) -> Result<()> {
        self.cell_mut(row, col)?
            .properties
            .get_or_insert_with(Properties::new)
            .insert(name.into(), value);
        self.touch();
        Ok(())
    }

    /// Replace all cell properties
    pub fn set_properties(&mut self, row: usize, col: usize, properties: Properties) -> Result<()> {
        self.cell_mut(row, col)?.properties = Some(properties);
        self.touch();
        Ok(())
    }

    /// Set one row property
    pub fn set_row_property<S: Into<String>>(
        &mut self,
        row: usize,
        name: S,
        value: PropertyValue,
    ) -> Result<()> {
        self.row_mut(row)?.properties.insert(name.into(), value);
        self.touch();
        Ok(())
    }

    /// Replace all row properties
    pub fn set_row_properties(&mut self, row: usize, properties: Properties) -> Result<()> {
        self.row_mut(row)?.properties = properties;
        self.touch();
        Ok(())
    }

    fn row_mut(&mut self, row: usize) -> Result<&mut Row> {
        let count = self.rows.len();
        self.rows
            .get_mut(row)
            .ok_or(Error::RowOutOfRange(row, count))
    }

    /// Set one column property
    pub fn set_column_property<S: Into<String>>(
        &mut self,
        col: usize,
        name: S,
        value: PropertyValue,
    ) -> Result<()> {
        self.column_mut(col)?.properties.insert(name.into(), value);
        self.touch();
        Ok(())
    }

    /// Replace all column properties
    pub fn set_column_properties(&mut self, col: usize, properties: Properties) -> Result<()> {
        self.column_mut(col)?.properties = properties;
        self.touch();
        Ok(())
    }

    /// Set one table property
    pub fn set_table_property<S: Into<String>>(&mut self, name: S, value: PropertyValue) {
        self.properties.insert(name.into(), value);
        self.touch();
    }

    /// Replace all table properties
    pub fn set_table_properties(&mut self, properties: Properties) {
        self.properties = properties;
        self.touch();
    }

    // === Column metadata ===

    /// Set a column id
    pub fn set_column_id<S: Into<String>>(&mut self, col: usize, id: S) -> Result<()> {
        self.column_mut(col)?.id = id.into();
        self.columns_changed();
        Ok(())
    }

    /// Set a column label
    pub fn set_column_label<S: Into<String>>(&mut self, col: usize, label: S) -> Result<()> {
        self.column_mut(col)?.label = label.into();
        self.touch();
        Ok(())
    }

    /// Set (or clear) a column pattern
    pub fn set_column_pattern(&mut self, col: usize, pattern: Option<String>) -> Result<()> {
        self.column_mut(col)?.pattern = pattern;
        self.touch();
        Ok(())
    }

    /// Set (or clear) a column role
    pub fn set_column_role(&mut self, col: usize, role: Option<String>) -> Result<()> {
        self.column_mut(col)?.role = role;
        self.touch();
        Ok(())
    }

    fn column_mut(&mut self, col: usize) -> Result<&mut ColumnDescription> {
        let count = self.columns.len();
        self.columns
            .get_mut(col)
            .ok_or(Error::ColumnOutOfRange(col, count))
    }

    fn column(&self, col: usize) -> Result<&ColumnDescription> {
        self.columns
            .get(col)
            .ok_or(Error::ColumnOutOfRange(col, self.columns.len()))
    }

    fn index_of_id(&self, id: &str) -> Option<usize> {
        let mut index = self.id_index.borrow_mut();
        let map = index.get_or_insert_with(|| {
            let mut map = AHashMap::with_capacity(self.columns.len());
            for (i, column) in self.columns.iter().enumerate() {
                map.entry(column.id.clone()).or_insert(i);
            }
            map
        });
        map.get(id).copied()
    }

    // === Sorting ===

    /// Reorder the rows in place
    pub fn sort(&mut self, columns: &[SortColumn]) -> Result<()> {
        let order = self.get_sorted_rows(columns)?;
        let mut old: Vec<Option<Row>> = std::mem::take(&mut self.rows)
            .into_iter()
            .map(Some)
            .collect();
        self.rows = order.into_iter().filter_map(|i| old[i].take()).collect();
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

impl PartialEq for DataTable {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.rows == other.rows
            && self.properties == other.properties
    }
}

impl DataSource for DataTable {
    fn number_of_columns(&self) -> usize {
        self.columns.len()
    }

    fn number_of_rows(&self) -> usize {
        self.rows.len()
    }

    fn get_column_id(&self, col: usize) -> Result<String> {
        Ok(self.column(col)?.id.clone())
    }

    fn get_column_label(&self, col: usize) -> Result<String> {
        Ok(self.column(col)?.label.clone())
    }

    fn get_column_type(&self, col: usize) -> Result<ColumnType> {
        Ok(self.column(col)?.column_type)
    }

    fn get_column_pattern(&self, col: usize) -> Result<Option<String>> {
        Ok(self.column(col)?.pattern.clone())
    }

    fn get_column_role(&self, col: usize) -> Result<Option<String>> {
        Ok(self.column(col)?.role.clone())
    }

    fn get_column_properties(&self, col: usize) -> Properties {
        self.columns
            .get(col)
            .map(|c| c.properties.clone())
            .unwrap_or_default()
    }

    fn get_value(&self, row: usize, col: usize) -> Result<Value> {
        Ok(self.get_cell(row, col)?.value.clone())
    }

    fn get_formatted_value_with(
        &self,
        row: usize,
        col: usize,
        formatter: &dyn Formatter,
    ) -> Result<String> {
        Ok(self.get_cell(row, col)?.formatted_value(formatter))
    }

    fn get_stored_formatted_value(&self, row: usize, col: usize) -> Result<Option<String>> {
        Ok(self.get_cell(row, col)?.stored_formatted())
    }

    fn get_properties(&self, row: usize, col: usize) -> Properties {
        self.rows
            .get(row)
            .and_then(|r| r.cells.get(col))
            .and_then(|c| c.properties.clone())
            .unwrap_or_default()
    }

    fn get_row_properties(&self, row: usize) -> Properties {
        self.rows
            .get(row)
            .map(|r| r.properties.clone())
            .unwrap_or_default()
    }

    fn get_table_properties(&self) -> Properties {
        self.properties.clone()
    }

    fn get_column_index(&self, column: &ColumnRef) -> Option<usize> {
        match column {
            ColumnRef::Index(i) => (*i < self.columns.len()).then_some(*i),
            ColumnRef::Id(id) => self.index_of_id(id),
        }
    }

    fn get_table_column_index(&self, col: usize) -> Option<usize> {
        (col < self.columns.len()).then_some(col)
    }

    fn get_table_row_index(&self, row: usize) -> Option<usize> {
        (row < self.rows.len()).then_some(row)
    }

    fn get_underlying_table_column_index(&self, col: usize) -> Option<usize> {
        self.get_table_column_index(col)
    }

    fn get_underlying_table_row_index(&self, row: usize) -> Option<usize> {
        self.get_table_row_index(row)
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn get_column_property(&self, col: usize, name: &str) -> Option<PropertyValue> {
        self.columns.get(col)?.properties.get(name).cloned()
    }

    fn get_property(&self, row: usize, col: usize, name: &str) -> Option<PropertyValue> {
        self.rows.get(row)?.cells.get(col)?.property(name).cloned()
    }

    fn get_row_property(&self, row: usize, name: &str) -> Option<PropertyValue> {
        self.rows.get(row)?.properties.get(name).cloned()
    }

    fn get_table_property(&self, name: &str) -> Option<PropertyValue> {
        self.properties.get(name).cloned()
    }
}
