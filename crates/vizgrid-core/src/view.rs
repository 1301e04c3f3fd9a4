//! Virtual views over tables and other views
//!
//! A [`DataView`] re-indexes its source: it can reorder, duplicate, hide and compute
//! columns, and select rows in any order, without copying data. Every read
//! translates the view index into the source index and delegates, so changes to the
//! source are visible immediately through any chain of views.
//!
//! Column and row selections start out [`Selection::Unset`] (full passthrough) and
//! track a growing source until the caller fixes an explicit list.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::calc::{CalcOutput, CalculatedColumn, ResolvedCalc};
use crate::error::{Error, Result};
use crate::format::Formatter;
use crate::source::{ColumnRef, DataSource, SharedSource};
use crate::table::DataTable;
use crate::value::{ColumnType, Properties, PropertyValue, Value};

/// Column or row configuration of a view
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection<T> {
    /// Everything in the source, in source order
    #[default]
    Unset,
    /// An explicit list of entries
    Explicit(Vec<T>),
}

/// One requested output column of a view
#[derive(Debug, Clone)]
pub enum ColumnSelector {
    /// A source column, by index or id
    Source(ColumnRef),
    /// A column computed per row
    Calculated(CalculatedColumn),
}

impl From<usize> for ColumnSelector {
    fn from(index: usize) -> Self {
        ColumnSelector::Source(ColumnRef::Index(index))
    }
}

impl From<&str> for ColumnSelector {
    fn from(id: &str) -> Self {
        ColumnSelector::Source(ColumnRef::Id(id.to_string()))
    }
}

impl From<ColumnRef> for ColumnSelector {
    fn from(column: ColumnRef) -> Self {
        ColumnSelector::Source(column)
    }
}

impl From<CalculatedColumn> for ColumnSelector {
    fn from(calc: CalculatedColumn) -> Self {
        ColumnSelector::Calculated(calc)
    }
}

/// A resolved view column
#[derive(Debug, Clone)]
pub(crate) enum ViewColumn {
    /// Passthrough to a source column, with properties local to this view column
    Source {
        index: usize,
        properties: Properties,
    },
    /// Computed column
    Calculated(Box<ResolvedCalc>),
}

impl ViewColumn {
    fn passthrough(index: usize) -> Self {
        ViewColumn::Source {
            index,
            properties: Properties::new(),
        }
    }

    fn source_index(&self) -> Option<usize> {
        match self {
            ViewColumn::Source { index, .. } => Some(*index),
            ViewColumn::Calculated(_) => None,
        }
    }
}

/// Where a view column's data comes from
enum Slot<'a> {
    Source(usize, Option<&'a Properties>),
    Calculated(&'a ResolvedCalc),
}

/// Calculated cells, valid for one (generation, source revision) stamp
#[derive(Debug, Default)]
struct CalcCache {
    stamp: (u64, u64),
    entries: AHashMap<(usize, usize), CalcOutput>,
}

/// A non-copying, re-indexed facade over a table or another view
pub struct DataView {
    source: SharedSource,
    columns: Selection<ViewColumn>,
    rows: Selection<usize>,
    /// Bumped whenever the column or row selection changes
    generation: u64,
    /// Bumped on any change made through this view
    local_revision: u64,
    cache: RefCell<CalcCache>,
    /// Properties set on calculated cells, keyed by (view column, view row)
    cell_properties: AHashMap<(usize, usize), Properties>,
    /// View-local column properties while the column selection is unset
    unset_column_properties: AHashMap<usize, Properties>,
}

impl DataView {
    /// Create a full-passthrough view over a table or view
    pub fn new<S: DataSource + 'static>(source: Rc<RefCell<S>>) -> Self {
        Self::from_shared(source)
    }

    /// Create a full-passthrough view over an already type-erased source
    pub fn from_shared(source: SharedSource) -> Self {
        Self {
            source,
            columns: Selection::Unset,
            rows: Selection::Unset,
            generation: 0,
            local_revision: 0,
            cache: RefCell::new(CalcCache::default()),
            cell_properties: AHashMap::new(),
            unset_column_properties: AHashMap::new(),
        }
    }

    /// The source this view reads from
    pub fn source(&self) -> &SharedSource {
        &self.source
    }

    /// Current column configuration
    pub(crate) fn column_selection(&self) -> &Selection<ViewColumn> {
        &self.columns
    }

    /// View-local column properties set while the column selection is unset
    pub(crate) fn unset_column_properties(&self) -> &AHashMap<usize, Properties> {
        &self.unset_column_properties
    }

    /// Current row configuration
    pub fn row_selection(&self) -> &Selection<usize> {
        &self.rows
    }

    // === Configuration ===

    /// Replace the column configuration
    ///
    /// Every selector is validated against the source before anything changes.
    pub fn set_columns<I, S>(&mut self, selectors: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<ColumnSelector>,
    {
        let resolved = {
            let source = self.source.borrow();
            selectors
                .into_iter()
                .map(|s| match s.into() {
                    ColumnSelector::Source(column) => source
                        .get_column_index(&column)
                        .map(ViewColumn::passthrough)
                        .ok_or_else(|| Error::config(format!("Invalid column {column}"))),
                    ColumnSelector::Calculated(calc) => calc
                        .resolve(&*source)
                        .map(|calc| ViewColumn::Calculated(Box::new(calc))),
                })
                .collect::<Result<Vec<_>>>()?
        };
        self.columns = Selection::Explicit(resolved);
        self.unset_column_properties.clear();
        self.selection_changed("columns");
        Ok(())
    }

    /// Replace the row configuration with source row indices
    pub fn set_rows<I: IntoIterator<Item = usize>>(&mut self, rows: I) -> Result<()> {
        let count = self.source.borrow().number_of_rows();
        let rows: Vec<usize> = rows.into_iter().collect();
        if let Some(bad) = rows.iter().find(|&&r| r >= count) {
            return Err(Error::config(format!(
                "Invalid row index {bad} (source has {count} rows)"
            )));
        }
        self.rows = Selection::Explicit(rows);
        self.selection_changed("rows");
        Ok(())
    }

    /// Select the inclusive range of source rows `min..=max`
    pub fn set_row_range(&mut self, min: usize, max: usize) -> Result<()> {
        if min > max {
            return Err(Error::config(format!("Invalid row range {min}..={max}")));
        }
        self.set_rows(min..=max)
    }

    /// Remove every passthrough column that shows one of the given source columns
    ///
    /// Columns are source indices or ids. Those that do not resolve, or are not
    /// currently shown, are ignored.
    pub fn hide_columns<I, C>(&mut self, source_columns: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        let hidden: Vec<usize> = {
            let source = self.source.borrow();
            source_columns
                .into_iter()
                .filter_map(|c| source.get_column_index(&c.into()))
                .collect()
        };
        let mut columns = self.explicit_columns();
        let before = columns.len();
        columns.retain(|c| !c.source_index().map_or(false, |i| hidden.contains(&i)));
        let changed = columns.len() != before;
        self.columns = Selection::Explicit(columns);
        self.unset_column_properties.clear();
        if changed {
            self.selection_changed("columns");
        }
    }

    /// Remove every view row that shows one of the given source rows
    ///
    /// Source rows not currently shown are ignored.
    pub fn hide_rows(&mut self, source_rows: &[usize]) {
        let mut rows = self.explicit_rows();
        let before = rows.len();
        rows.retain(|r| !source_rows.contains(r));
        let changed = rows.len() != before;
        self.rows = Selection::Explicit(rows);
        if changed {
            self.selection_changed("rows");
        }
    }

    /// Hide the inclusive range of source rows `min..=max`
    pub fn hide_row_range(&mut self, min: usize, max: usize) -> Result<()> {
        if min > max {
            return Err(Error::config(format!("Invalid row range {min}..={max}")));
        }
        let rows: Vec<usize> = (min..=max).collect();
        self.hide_rows(&rows);
        Ok(())
    }

    fn explicit_columns(&self) -> Vec<ViewColumn> {
        match &self.columns {
            Selection::Explicit(columns) => columns.clone(),
            Selection::Unset => (0..self.source.borrow().number_of_columns())
                .map(|index| ViewColumn::Source {
                    index,
                    properties: self
                        .unset_column_properties
                        .get(&index)
                        .cloned()
                        .unwrap_or_default(),
                })
                .collect(),
        }
    }

    fn explicit_rows(&self) -> Vec<usize> {
        match &self.rows {
            Selection::Explicit(rows) => rows.clone(),
            Selection::Unset => (0..self.source.borrow().number_of_rows()).collect(),
        }
    }

    fn selection_changed(&mut self, what: &str) {
        self.generation += 1;
        self.local_revision += 1;
        self.cell_properties.clear();
        log::debug!(
            "view {} changed (generation {}): {} columns, {} rows",
            what,
            self.generation,
            self.number_of_columns(),
            self.number_of_rows()
        );
    }

    /// Source column for each view column (`None` for calculated columns)
    pub fn get_view_columns(&self) -> Vec<Option<usize>> {
        (0..self.number_of_columns())
            .map(|c| self.get_table_column_index(c))
            .collect()
    }

    /// Source row for each view row
    pub fn get_view_rows(&self) -> Vec<usize> {
        self.explicit_rows()
    }

    /// First view column showing `source_col`
    pub fn get_view_column_index(&self, source_col: usize) -> Option<usize> {
        (0..self.number_of_columns()).find(|&c| self.get_table_column_index(c) == Some(source_col))
    }

    /// First view row showing `source_row`
    pub fn get_view_row_index(&self, source_row: usize) -> Option<usize> {
        match &self.rows {
            Selection::Explicit(rows) => rows.iter().position(|&r| r == source_row),
            Selection::Unset => {
                (source_row < self.source.borrow().number_of_rows()).then_some(source_row)
            }
        }
    }

    // === View-local properties ===

    /// Set a property on a view column, local to this view
    ///
    /// An unset column selection stays unset and keeps tracking the source.
    pub fn set_column_property<S: Into<String>>(
        &mut self,
        col: usize,
        name: S,
        value: PropertyValue,
    ) -> Result<()> {
        self.column_properties_mut(col)?.insert(name.into(), value);
        self.local_revision += 1;
        Ok(())
    }

    /// Replace the view-local properties of a view column
    pub fn set_column_properties(&mut self, col: usize, properties: Properties) -> Result<()> {
        *self.column_properties_mut(col)? = properties;
        self.local_revision += 1;
        Ok(())
    }

    fn column_properties_mut(&mut self, col: usize) -> Result<&mut Properties> {
        match &mut self.columns {
            Selection::Unset => {
                let count = self.source.borrow().number_of_columns();
                if col >= count {
                    return Err(Error::ColumnOutOfRange(col, count));
                }
                Ok(self.unset_column_properties.entry(col).or_default())
            }
            Selection::Explicit(columns) => {
                let count = columns.len();
                match columns.get_mut(col) {
                    Some(ViewColumn::Source { properties, .. }) => Ok(properties),
                    Some(ViewColumn::Calculated(calc)) => Ok(&mut calc.properties),
                    None => Err(Error::ColumnOutOfRange(col, count)),
                }
            }
        }
    }

    /// Set a property on a calculated cell
    ///
    /// Passthrough cells belong to the source and cannot be changed through the view.
    pub fn set_property<S: Into<String>>(
        &mut self,
        row: usize,
        col: usize,
        name: S,
        value: PropertyValue,
    ) -> Result<()> {
        self.check_row(row)?;
        match self.slot(col)? {
            Slot::Calculated(_) => {}
            Slot::Source(..) => {
                return Err(Error::ReadOnly(format!(
                    "cell ({row}, {col}) belongs to the source; set its property there"
                )))
            }
        }
        self.cell_properties
            .entry((col, row))
            .or_default()
            .insert(name.into(), value);
        self.local_revision += 1;
        Ok(())
    }

    // === Materialization ===

    /// Copy the view's current contents into a new, independent table
    pub fn to_data_table(&self) -> Result<DataTable> {
        crate::materialize::to_data_table(self)
    }

    // === Index resolution ===

    fn slot(&self, col: usize) -> Result<Slot<'_>> {
        match &self.columns {
            Selection::Unset => {
                let count = self.source.borrow().number_of_columns();
                if col < count {
                    Ok(Slot::Source(col, self.unset_column_properties.get(&col)))
                } else {
                    Err(Error::ColumnOutOfRange(col, count))
                }
            }
            Selection::Explicit(columns) => match columns.get(col) {
                Some(ViewColumn::Source { index, properties }) => {
                    Ok(Slot::Source(*index, Some(properties)))
                }
                Some(ViewColumn::Calculated(calc)) => Ok(Slot::Calculated(calc)),
                None => Err(Error::ColumnOutOfRange(col, columns.len())),
            },
        }
    }

    fn source_row(&self, row: usize) -> Result<usize> {
        match &self.rows {
            Selection::Unset => {
                let count = self.source.borrow().number_of_rows();
                if row < count {
                    Ok(row)
                } else {
                    Err(Error::RowOutOfRange(row, count))
                }
            }
            Selection::Explicit(rows) => rows
                .get(row)
                .copied()
                .ok_or(Error::RowOutOfRange(row, rows.len())),
        }
    }

    fn check_row(&self, row: usize) -> Result<()> {
        self.source_row(row).map(|_| ())
    }

    /// Value of a source column in the source row behind view row `row`
    pub(crate) fn source_value(&self, row: usize, source_col: usize) -> Result<Value> {
        let source_row = self.source_row(row)?;
        self.source.borrow().get_value(source_row, source_col)
    }

    /// Nearest non-null value of `source_col` scanning view rows in `scan` order
    ///
    /// `scan` starts at `row`. A neighbor whose fill is already cached ends the scan
    /// early, and every row passed is cached with the result, so filling a whole
    /// column is linear.
    pub(crate) fn fill<I>(
        &self,
        row: usize,
        col: usize,
        source_col: usize,
        scan: I,
    ) -> Result<Value>
    where
        I: Iterator<Item = usize>,
    {
        let stamp = (self.generation, self.source.borrow().revision());
        let mut passed = Vec::new();
        let mut found = Value::Null;
        for r in scan {
            if r != row {
                let cache = self.cache.borrow();
                if let Some(hit) = cache.entries.get(&(col, r)).filter(|_| cache.stamp == stamp) {
                    found = hit.value.clone();
                    break;
                }
            }
            passed.push(r);
            let value = self.source_value(r, source_col)?;
            if !value.is_null() {
                found = value;
                break;
            }
        }

        let mut cache = self.cache.borrow_mut();
        if cache.stamp == stamp {
            for r in passed.into_iter().filter(|&r| r != row) {
                cache
                    .entries
                    .entry((col, r))
                    .or_insert_with(|| CalcOutput::new(found.clone()));
            }
        }
        Ok(found)
    }

    fn calculated(&self, row: usize, col: usize, calc: &ResolvedCalc) -> Result<CalcOutput> {
        self.check_row(row)?;
        let stamp = (self.generation, self.source.borrow().revision());
        {
            let mut cache = self.cache.borrow_mut();
            if cache.stamp != stamp {
                if !cache.entries.is_empty() {
                    log::trace!(
                        "dropping {} cached calculated cells (stamp {:?} -> {:?})",
                        cache.entries.len(),
                        cache.stamp,
                        stamp
                    );
                }
                cache.entries.clear();
                cache.stamp = stamp;
            }
            if let Some(hit) = cache.entries.get(&(col, row)) {
                return Ok(hit.clone());
            }
        }

        // The cache is not borrowed here: custom functions may read other
        // calculated columns of this view.
        let output = calc.evaluate(self, row, col)?;

        let mut cache = self.cache.borrow_mut();
        if cache.stamp == stamp {
            cache.entries.insert((col, row), output.clone());
        }
        Ok(output)
    }
}

impl fmt::Debug for DataView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataView")
            .field("columns", &self.columns)
            .field("rows", &self.rows)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl DataSource for DataView {
    fn number_of_columns(&self) -> usize {
        match &self.columns {
            Selection::Unset => self.source.borrow().number_of_columns(),
            Selection::Explicit(columns) => columns.len(),
        }
    }

    fn number_of_rows(&self) -> usize {
        match &self.rows {
            Selection::Unset => self.source.borrow().number_of_rows(),
            Selection::Explicit(rows) => rows.len(),
        }
    }

    fn get_column_id(&self, col: usize) -> Result<String> {
        match self.slot(col)? {
            Slot::Source(index, _) => self.source.borrow().get_column_id(index),
            Slot::Calculated(calc) => Ok(calc.id.clone()),
        }
    }

    fn get_column_label(&self, col: usize) -> Result<String> {
        match self.slot(col)? {
            Slot::Source(index, _) => self.source.borrow().get_column_label(index),
            Slot::Calculated(calc) => Ok(calc.label.clone()),
        }
    }

    fn get_column_type(&self, col: usize) -> Result<ColumnType> {
        match self.slot(col)? {
            Slot::Source(index, _) => self.source.borrow().get_column_type(index),
            Slot::Calculated(calc) => Ok(calc.column_type),
        }
    }

    fn get_column_pattern(&self, col: usize) -> Result<Option<String>> {
        match self.slot(col)? {
            Slot::Source(index, _) => self.source.borrow().get_column_pattern(index),
            Slot::Calculated(calc) => Ok(calc.pattern.clone()),
        }
    }

    fn get_column_role(&self, col: usize) -> Result<Option<String>> {
        match self.slot(col)? {
            Slot::Source(index, _) => self.source.borrow().get_column_role(index),
            Slot::Calculated(calc) => Ok(calc.role.clone()),
        }
    }

    fn get_column_properties(&self, col: usize) -> Properties {
        match self.slot(col) {
            Ok(Slot::Source(index, local)) => {
                let mut properties = self.source.borrow().get_column_properties(index);
                if let Some(local) = local {
                    properties.extend(local.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                properties
            }
            Ok(Slot::Calculated(calc)) => calc.properties.clone(),
            Err(_) => Properties::new(),
        }
    }

    fn get_value(&self, row: usize, col: usize) -> Result<Value> {
        match self.slot(col)? {
            Slot::Source(index, _) => self.source_value(row, index),
            Slot::Calculated(calc) => Ok(self.calculated(row, col, calc)?.value),
        }
    }

    fn get_formatted_value_with(
        &self,
        row: usize,
        col: usize,
        formatter: &dyn Formatter,
    ) -> Result<String> {
        match self.slot(col)? {
            Slot::Source(index, _) => {
                let source_row = self.source_row(row)?;
                self.source
                    .borrow()
                    .get_formatted_value_with(source_row, index, formatter)
            }
            Slot::Calculated(calc) => {
                let output = self.calculated(row, col, calc)?;
                Ok(output
                    .formatted
                    .unwrap_or_else(|| formatter.format_value(&output.value)))
            }
        }
    }

    fn get_stored_formatted_value(&self, row: usize, col: usize) -> Result<Option<String>> {
        match self.slot(col)? {
            Slot::Source(index, _) => {
                let source_row = self.source_row(row)?;
                self.source
                    .borrow()
                    .get_stored_formatted_value(source_row, index)
            }
            Slot::Calculated(calc) => Ok(self.calculated(row, col, calc)?.formatted),
        }
    }

    fn get_properties(&self, row: usize, col: usize) -> Properties {
        match self.slot(col) {
            Ok(Slot::Source(index, _)) => match self.source_row(row) {
                Ok(source_row) => self.source.borrow().get_properties(source_row, index),
                Err(_) => Properties::new(),
            },
            Ok(Slot::Calculated(calc)) => {
                let mut properties = self
                    .calculated(row, col, calc)
                    .ok()
                    .and_then(|o| o.properties)
                    .unwrap_or_default();
                if let Some(local) = self.cell_properties.get(&(col, row)) {
                    properties.extend(local.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                properties
            }
            Err(_) => Properties::new(),
        }
    }

    fn get_row_properties(&self, row: usize) -> Properties {
        match self.source_row(row) {
            Ok(source_row) => self.source.borrow().get_row_properties(source_row),
            Err(_) => Properties::new(),
        }
    }

    fn get_table_properties(&self) -> Properties {
        self.source.borrow().get_table_properties()
    }

    fn get_column_index(&self, column: &ColumnRef) -> Option<usize> {
        match column {
            ColumnRef::Index(i) => (*i < self.number_of_columns()).then_some(*i),
            ColumnRef::Id(id) => (0..self.number_of_columns())
                .find(|&c| self.get_column_id(c).map_or(false, |cid| &cid == id)),
        }
    }

    fn get_table_column_index(&self, col: usize) -> Option<usize> {
        match self.slot(col).ok()? {
            Slot::Source(index, _) => Some(index),
            Slot::Calculated(_) => None,
        }
    }

    fn get_table_row_index(&self, row: usize) -> Option<usize> {
        self.source_row(row).ok()
    }

    fn get_underlying_table_column_index(&self, col: usize) -> Option<usize> {
        let index = self.get_table_column_index(col)?;
        self.source
            .borrow()
            .get_underlying_table_column_index(index)
    }

    fn get_underlying_table_row_index(&self, row: usize) -> Option<usize> {
        let index = self.get_table_row_index(row)?;
        self.source.borrow().get_underlying_table_row_index(index)
    }

    fn revision(&self) -> u64 {
        self.local_revision + self.source.borrow().revision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::ErrorType;
    use crate::cell::ColumnDescription;
    use crate::source::shared;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell as Counter;

    fn table_with_columns(n: usize) -> Rc<RefCell<DataTable>> {
        let mut table = DataTable::new();
        for c in 0..n {
            table.add_column(
                ColumnDescription::new(ColumnType::Number)
                    .with_id(format!("c{c}"))
                    .with_label(format!("Column {c}")),
            );
        }
        for r in 0..4 {
            table
                .add_row_values((0..n).map(|c| Value::from((r * 10 + c) as f64)))
                .unwrap();
        }
        shared(table)
    }

    #[test]
    fn test_passthrough_by_default() {
        let table = table_with_columns(3);
        let view = DataView::new(table.clone());
        assert_eq!(view.number_of_columns(), 3);
        assert_eq!(view.number_of_rows(), 4);
        assert_eq!(view.get_value(2, 1).unwrap(), Value::Number(21.0));
        assert_eq!(view.get_column_label(2).unwrap(), "Column 2");

        // An unset view tracks new source rows
        table.borrow_mut().add_rows(2);
        assert_eq!(view.number_of_rows(), 6);
    }

    #[test]
    fn test_set_columns_reorder_and_duplicate() {
        let table = table_with_columns(3);
        let mut view = DataView::new(table);
        view.set_columns([ColumnSelector::from(2usize), "c0".into(), 2usize.into()])
            .unwrap();
        assert_eq!(view.number_of_columns(), 3);
        assert_eq!(view.get_value(1, 0).unwrap(), Value::Number(12.0));
        assert_eq!(view.get_value(1, 1).unwrap(), Value::Number(10.0));
        assert_eq!(view.get_view_columns(), vec![Some(2), Some(0), Some(2)]);
        assert_eq!(view.get_view_column_index(2), Some(0));
        assert_eq!(view.get_view_column_index(1), None);
    }

    #[test]
    fn test_duplicated_columns_carry_distinct_properties() {
        let table = table_with_columns(2);
        let mut view = DataView::new(table);
        view.set_columns([0usize, 0]).unwrap();
        view.set_column_property(0, "color", json!("red")).unwrap();
        view.set_column_property(1, "color", json!("blue")).unwrap();
        assert_eq!(view.get_value(3, 0).unwrap(), view.get_value(3, 1).unwrap());
        assert_eq!(view.get_column_property(0, "color"), Some(json!("red")));
        assert_eq!(view.get_column_property(1, "color"), Some(json!("blue")));
    }

    #[test]
    fn test_column_property_keeps_unset_view_tracking() {
        let table = table_with_columns(2);
        let mut view = DataView::new(table.clone());
        view.set_column_property(1, "color", json!("red")).unwrap();
        assert_eq!(view.get_column_property(1, "color"), Some(json!("red")));
        assert!(view.set_column_property(2, "color", json!("red")).is_err());

        table
            .borrow_mut()
            .add_column(ColumnDescription::new(ColumnType::String).with_id("late"));
        assert_eq!(view.number_of_columns(), 3);
        assert_eq!(view.get_column_id(2).unwrap(), "late");
        assert_eq!(view.get_column_property(1, "color"), Some(json!("red")));

        // Properties follow their columns once the selection is fixed
        view.hide_columns([0usize]);
        assert_eq!(view.get_view_columns(), vec![Some(1), Some(2)]);
        assert_eq!(view.get_column_property(0, "color"), Some(json!("red")));
        assert_eq!(view.get_column_property(1, "color"), None);
    }

    #[test]
    fn test_set_columns_rejects_invalid_source_column() {
        let table = table_with_columns(2);
        let mut view = DataView::new(table);
        assert!(matches!(view.set_columns([5usize]), Err(Error::Configuration(_))));
        assert!(matches!(view.set_columns(["missing"]), Err(Error::Configuration(_))));
        // A failed call leaves the configuration untouched
        assert_eq!(view.number_of_columns(), 2);
    }

    #[test]
    fn test_set_rows_and_range() {
        let table = table_with_columns(1);
        let mut view = DataView::new(table);
        view.set_rows([3, 0, 3]).unwrap();
        assert_eq!(view.number_of_rows(), 3);
        assert_eq!(view.get_value(0, 0).unwrap(), Value::Number(30.0));
        assert_eq!(view.get_value(2, 0).unwrap(), Value::Number(30.0));
        assert_eq!(view.get_view_row_index(3), Some(0));
        assert_eq!(view.get_view_row_index(1), None);

        view.set_row_range(1, 2).unwrap();
        assert_eq!(view.get_view_rows(), vec![1, 2]);
        assert!(view.set_rows([9]).is_err());
        assert!(view.set_row_range(2, 1).is_err());
    }

    #[test]
    fn test_hide_columns_ignores_missing_and_is_idempotent() {
        let table = table_with_columns(5);
        let mut view = DataView::new(table);
        view.set_columns([0usize, 2]).unwrap();
        view.hide_columns([1usize, 6]);
        assert_eq!(view.get_view_columns(), vec![Some(0), Some(2)]);

        view.hide_columns([0usize]);
        view.hide_columns([0usize]);
        assert_eq!(view.get_view_columns(), vec![Some(2)]);
    }

    #[test]
    fn test_hide_columns_by_id() {
        let table = table_with_columns(3);
        let mut view = DataView::new(table);
        view.set_columns([2usize, 1, 2]).unwrap();
        view.hide_columns(["c2", "missing"]);
        assert_eq!(view.get_view_columns(), vec![Some(1)]);
        view.hide_columns([ColumnRef::Id("c2".into())]);
        assert_eq!(view.get_view_columns(), vec![Some(1)]);
    }

    #[test]
    fn test_hide_on_unset_view_materializes_passthrough() {
        let table = table_with_columns(3);
        let mut view = DataView::new(table.clone());
        view.hide_columns([1usize]);
        view.hide_rows(&[0, 2]);
        view.hide_row_range(10, 12).unwrap();
        assert_eq!(view.get_view_columns(), vec![Some(0), Some(2)]);
        assert_eq!(view.get_view_rows(), vec![1, 3]);

        // Explicit now: new source rows are not picked up
        table.borrow_mut().add_rows(1);
        assert_eq!(view.number_of_rows(), 2);
    }

    #[test]
    fn test_out_of_range_reads() {
        let table = table_with_columns(2);
        let mut view = DataView::new(table);
        view.set_rows([1]).unwrap();
        assert!(matches!(view.get_value(1, 0), Err(Error::RowOutOfRange(1, 1))));
        assert!(matches!(
            view.get_value(0, 2),
            Err(Error::ColumnOutOfRange(2, 2))
        ));
        assert!(view.get_properties(5, 5).is_empty());
    }

    #[test]
    fn test_source_mutation_visible_through_view() {
        let table = table_with_columns(2);
        let mut view = DataView::new(table.clone());
        view.set_columns([1usize]).unwrap();
        view.set_rows([2]).unwrap();
        table.borrow_mut().set_value(2, 1, 99).unwrap();
        assert_eq!(view.get_value(0, 0).unwrap(), Value::Number(99.0));
    }

    #[test]
    fn test_stale_explicit_rows_fail_on_read() {
        let table = table_with_columns(1);
        let mut view = DataView::new(table.clone());
        view.set_rows([3]).unwrap();
        table.borrow_mut().remove_row(3).unwrap();
        assert_eq!(view.number_of_rows(), 1);
        assert!(matches!(view.get_value(0, 0), Err(Error::RowOutOfRange(3, 3))));
        assert_eq!(view.get_underlying_table_row_index(0), None);
    }

    #[test]
    fn test_stringify_calc() {
        let mut table = DataTable::with_columns([ColumnDescription::new(ColumnType::Number)]);
        for v in [1, 2, 3] {
            table.add_row_values([v]).unwrap();
        }
        let mut view = DataView::new(shared(table));
        view.set_columns([CalculatedColumn::named("stringify")
            .with_type(ColumnType::String)
            .with_source_column(0usize)])
            .unwrap();
        assert_eq!(view.get_value(0, 0).unwrap(), Value::from("1"));
        assert_eq!(view.get_value(2, 0).unwrap(), Value::from("3"));
        assert_eq!(view.get_table_column_index(0), None);
        assert_eq!(view.get_underlying_table_column_index(0), None);
    }

    #[test]
    fn test_predefined_self_typing() {
        let table = table_with_columns(1);
        let mut view = DataView::new(table);
        view.set_columns([
            ColumnSelector::from(CalculatedColumn::named("identity").with_source_column(0usize)),
            CalculatedColumn::named("emptyString").into(),
            CalculatedColumn::named("stringify").with_source_column("c0").into(),
        ])
        .unwrap();
        assert_eq!(view.get_column_type(0).unwrap(), ColumnType::Number);
        assert_eq!(view.get_column_type(1).unwrap(), ColumnType::String);
        assert_eq!(view.get_column_type(2).unwrap(), ColumnType::String);
        assert_eq!(view.get_value(1, 0).unwrap(), Value::Number(10.0));
        assert_eq!(view.get_value(1, 1).unwrap(), Value::from(""));
    }

    #[test]
    fn test_calc_configuration_errors() {
        let table = table_with_columns(1);
        let mut view = DataView::new(table);
        let unknown =
            view.set_columns([CalculatedColumn::named("sparkle").with_source_column(0usize)]);
        assert!(matches!(unknown, Err(Error::Configuration(_))));

        let no_source = view.set_columns([CalculatedColumn::named("identity")]);
        assert!(matches!(no_source, Err(Error::Configuration(_))));

        let calls = Rc::new(Counter::new(0));
        let seen = calls.clone();
        let untyped = view.set_columns([CalculatedColumn::custom(move |_, _| {
            seen.set(seen.get() + 1);
            Ok(CalcOutput::new(1.0))
        })]);
        assert!(matches!(untyped, Err(Error::Configuration(_))));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_fill_from_top_and_bottom() {
        let mut table = DataTable::with_columns([ColumnDescription::new(ColumnType::Number)]);
        for v in [None, Some(1.0), None, None, Some(4.0), None] {
            table.add_row_values([Value::from(v)]).unwrap();
        }
        let mut view = DataView::new(shared(table));
        view.set_columns([
            CalculatedColumn::named("fillFromTop").with_source_column(0usize),
            CalculatedColumn::named("fillFromBottom").with_source_column(0usize),
        ])
        .unwrap();
        let top: Vec<Value> = (0..6).map(|r| view.get_value(r, 0).unwrap()).collect();
        let bottom: Vec<Value> = (0..6).map(|r| view.get_value(r, 1).unwrap()).collect();
        assert_eq!(
            top,
            [None, Some(1.0), Some(1.0), Some(1.0), Some(4.0), Some(4.0)].map(Value::from)
        );
        assert_eq!(
            bottom,
            [Some(1.0), Some(1.0), Some(4.0), Some(4.0), Some(4.0), None].map(Value::from)
        );

        // Only visible rows count
        view.set_rows([0, 2, 3, 5]).unwrap();
        assert_eq!(view.get_value(2, 0).unwrap(), Value::Null);
        assert_eq!(view.get_value(0, 1).unwrap(), Value::Null);
    }

    #[test]
    fn test_fill_over_long_null_run() {
        let mut table = DataTable::with_columns([ColumnDescription::new(ColumnType::Number)]);
        table.add_row_values([1]).unwrap();
        table.add_rows(20_000);
        table.add_row_values([2]).unwrap();
        let mut view = DataView::new(shared(table));
        view.set_columns([
            CalculatedColumn::named("fillFromTop").with_source_column(0usize),
            CalculatedColumn::named("fillFromBottom").with_source_column(0usize),
        ])
        .unwrap();

        let snapshot = view.to_data_table().unwrap();
        let last = snapshot.number_of_rows() - 1;
        assert_eq!(last, 20_001);
        assert_eq!(snapshot.get_value(last - 1, 0).unwrap(), Value::Number(1.0));
        assert_eq!(snapshot.get_value(last, 0).unwrap(), Value::Number(2.0));
        assert_eq!(snapshot.get_value(0, 1).unwrap(), Value::Number(1.0));
        assert_eq!(snapshot.get_value(1, 1).unwrap(), Value::Number(2.0));

        // Bottom-up reads after a reconfiguration
        view.hide_rows(&[0]);
        let last = view.number_of_rows() - 1;
        for r in (0..=last).rev() {
            let expected = if r == last { Value::Number(2.0) } else { Value::Null };
            assert_eq!(view.get_value(r, 0).unwrap(), expected);
            assert_eq!(view.get_value(r, 1).unwrap(), Value::Number(2.0));
        }
    }

    #[test]
    fn test_error_calc() {
        let table = table_with_columns(1);
        let mut view = DataView::new(table);
        view.set_columns([
            ColumnSelector::from(0usize),
            CalculatedColumn::named("error")
                .with_source_column(0usize)
                .with_error(-5.0, ErrorType::Constant)
                .with_role("interval")
                .into(),
            CalculatedColumn::named("error")
                .with_source_column(0usize)
                .with_error(10.0, ErrorType::Percent)
                .with_role("interval")
                .into(),
        ])
        .unwrap();
        assert_eq!(view.get_value(2, 1).unwrap(), Value::Number(15.0));
        assert_eq!(view.get_value(2, 2).unwrap(), Value::Number(22.0));
        assert_eq!(view.get_column_role(1).unwrap().as_deref(), Some("interval"));
        assert!(view
            .set_columns([CalculatedColumn::named("error").with_source_column(0usize)])
            .is_err());
    }

    #[test]
    fn test_custom_calc_reads_other_columns_and_is_cached() {
        let table = table_with_columns(2);
        let calls = Rc::new(Counter::new(0));
        let seen = calls.clone();
        let mut view = DataView::new(table.clone());
        view.set_columns([
            ColumnSelector::from(0usize),
            CalculatedColumn::named("identity").with_source_column(1usize).into(),
            CalculatedColumn::custom(move |view, row| {
                seen.set(seen.get() + 1);
                let a = view.get_value(row, 0)?.as_number().unwrap_or(0.0);
                let b = view.get_value(row, 1)?.as_number().unwrap_or(0.0);
                Ok(CalcOutput::new(a + b).with_formatted(format!("{a}+{b}")))
            })
            .with_type(ColumnType::Number)
            .into(),
        ])
        .unwrap();

        assert_eq!(view.get_value(1, 2).unwrap(), Value::Number(21.0));
        assert_eq!(view.get_formatted_value(1, 2).unwrap(), "10+11");
        assert_eq!(calls.get(), 1);

        // Source mutation invalidates the cache
        table.borrow_mut().set_value(1, 0, 100).unwrap();
        assert_eq!(view.get_value(1, 2).unwrap(), Value::Number(111.0));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_cache_invalidated_on_row_change() {
        let table = table_with_columns(1);
        let mut view = DataView::new(table);
        view.set_columns([CalculatedColumn::named("stringify").with_source_column(0usize)])
            .unwrap();
        assert_eq!(view.get_value(0, 0).unwrap(), Value::from("0"));
        view.set_rows([3, 2]).unwrap();
        assert_eq!(view.get_value(0, 0).unwrap(), Value::from("30"));
        view.hide_rows(&[3]);
        assert_eq!(view.get_value(0, 0).unwrap(), Value::from("20"));
    }

    #[test]
    fn test_custom_error_propagates_unmodified() {
        #[derive(Debug)]
        struct Boom;
        impl fmt::Display for Boom {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("boom")
            }
        }
        impl std::error::Error for Boom {}

        let table = table_with_columns(1);
        let mut view = DataView::new(table);
        view.set_columns([CalculatedColumn::custom(|_, _| Err(Boom.into()))
            .with_type(ColumnType::Number)])
            .unwrap();
        let err = view.get_value(0, 0).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(err.as_calculation().unwrap().is::<Boom>());
    }

    #[test]
    fn test_custom_output_type_checked() {
        let table = table_with_columns(1);
        let mut view = DataView::new(table);
        view.set_columns([CalculatedColumn::custom(|_, _| Ok(CalcOutput::new("text")))
            .with_type(ColumnType::Number)])
            .unwrap();
        assert!(matches!(view.get_value(0, 0), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_calculated_cell_properties() {
        let table = table_with_columns(1);
        let mut view = DataView::new(table);
        view.set_columns([
            ColumnSelector::from(0usize),
            CalculatedColumn::custom(|_, row| {
                let mut p = Properties::new();
                p.insert("row".into(), json!(row));
                Ok(CalcOutput::new(true).with_properties(p))
            })
            .with_type(ColumnType::Boolean)
            .into(),
        ])
        .unwrap();
        assert_eq!(view.get_property(2, 1, "row"), Some(json!(2)));
        view.set_property(2, 1, "style", json!("bold")).unwrap();
        assert_eq!(view.get_property(2, 1, "style"), Some(json!("bold")));
        assert!(matches!(
            view.set_property(2, 0, "style", json!("bold")),
            Err(Error::ReadOnly(_))
        ));
    }

    #[test]
    fn test_nested_view_resolution() {
        let mut table = DataTable::with_columns([ColumnDescription::new(ColumnType::Number)]);
        for v in 0..6 {
            table.add_row_values([v]).unwrap();
        }
        let mut view = DataView::new(shared(table));
        view.set_rows([3, 1, 5]).unwrap();
        let view = shared(view);
        let mut nested = DataView::new(view.clone());
        nested.set_rows([2, 0, 1]).unwrap();

        let rows: Vec<Option<usize>> = (0..3)
            .map(|r| nested.get_underlying_table_row_index(r))
            .collect();
        assert_eq!(rows, vec![Some(5), Some(3), Some(1)]);
        assert_eq!(nested.get_table_row_index(0), Some(2));
        assert_eq!(nested.get_value(0, 0).unwrap(), Value::Number(5.0));

        // Reconfiguring the inner view shows through the outer one
        view.borrow_mut().set_rows([0, 4, 2]).unwrap();
        assert_eq!(nested.get_value(0, 0).unwrap(), Value::Number(2.0));
    }
}
