//! Row queries available on every data source

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};
use crate::source::DataSource;
use crate::value::Value;

/// One key of a multi-column sort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumn {
    /// Column position
    pub column: usize,
    /// Sort largest first
    pub descending: bool,
}

impl SortColumn {
    /// Ascending sort on a column
    pub fn ascending(column: usize) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    /// Descending sort on a column
    pub fn descending(column: usize) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

impl From<usize> for SortColumn {
    fn from(column: usize) -> Self {
        SortColumn::ascending(column)
    }
}

/// Condition a row's value must satisfy
pub enum FilterCondition {
    /// Value equals the given one
    Equals(Value),
    /// Value lies within the inclusive bounds; a missing bound is open
    Range {
        min: Option<Value>,
        max: Option<Value>,
    },
    /// Arbitrary predicate over the value
    Test(Box<dyn Fn(&Value) -> bool>),
}

impl fmt::Debug for FilterCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterCondition::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            FilterCondition::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            FilterCondition::Test(_) => f.write_str("Test(..)"),
        }
    }
}

/// A filter on a single column
#[derive(Debug)]
pub struct RowFilter {
    /// Column position
    pub column: usize,
    /// Condition on the column's value
    pub condition: FilterCondition,
}

impl RowFilter {
    /// Rows whose value equals `value`
    pub fn equals<V: Into<Value>>(column: usize, value: V) -> Self {
        Self {
            column,
            condition: FilterCondition::Equals(value.into()),
        }
    }

    /// Rows whose value lies in `[min, max]`
    pub fn range(column: usize, min: Option<Value>, max: Option<Value>) -> Self {
        Self {
            column,
            condition: FilterCondition::Range { min, max },
        }
    }

    /// Rows whose value passes `test`
    pub fn test<F: Fn(&Value) -> bool + 'static>(column: usize, test: F) -> Self {
        Self {
            column,
            condition: FilterCondition::Test(Box::new(test)),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match &self.condition {
            FilterCondition::Equals(expected) => value == expected,
            FilterCondition::Range { min, max } => {
                if value.is_null() {
                    return false;
                }
                let above = min
                    .as_ref()
                    .map_or(true, |m| value.total_cmp(m) != Ordering::Less);
                let below = max
                    .as_ref()
                    .map_or(true, |m| value.total_cmp(m) != Ordering::Greater);
                above && below
            }
            FilterCondition::Test(test) => test(value),
        }
    }
}

/// Queries over any [`DataSource`]
pub trait DataSourceExt: DataSource {
    /// Indices of the rows matching every filter
    fn get_filtered_rows(&self, filters: &[RowFilter]) -> Result<Vec<usize>> {
        for filter in filters {
            self.check_query_column(filter.column)?;
        }
        let mut rows = Vec::new();
        'rows: for row in 0..self.number_of_rows() {
            for filter in filters {
                if !filter.matches(&self.get_value(row, filter.column)?) {
                    continue 'rows;
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Row indices in sorted order (stable; the source is not modified)
    fn get_sorted_rows(&self, columns: &[SortColumn]) -> Result<Vec<usize>> {
        for key in columns {
            self.check_query_column(key.column)?;
        }
        let keyed = (0..self.number_of_rows())
            .map(|row| {
                let keys = columns
                    .iter()
                    .map(|key| self.get_value(row, key.column))
                    .collect::<Result<Vec<_>>>()?;
                Ok((row, keys))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut keyed = keyed;
        keyed.sort_by(|(_, a), (_, b)| {
            for ((x, y), key) in a.iter().zip(b).zip(columns) {
                let ord = x.total_cmp(y);
                let ord = if key.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(keyed.into_iter().map(|(row, _)| row).collect())
    }

    /// Distinct values of a column in ascending order
    fn get_distinct_values(&self, col: usize) -> Result<Vec<Value>> {
        self.check_query_column(col)?;
        let mut values = (0..self.number_of_rows())
            .map(|row| self.get_value(row, col))
            .collect::<Result<Vec<_>>>()?;
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
        Ok(values)
    }

    /// Smallest and largest non-null values of a column
    fn get_column_range(&self, col: usize) -> Result<Option<(Value, Value)>> {
        self.check_query_column(col)?;
        let mut range: Option<(Value, Value)> = None;
        for row in 0..self.number_of_rows() {
            let value = self.get_value(row, col)?;
            if value.is_null() {
                continue;
            }
            range = Some(match range {
                None => (value.clone(), value),
                Some((min, max)) => {
                    let min = if value.total_cmp(&min) == Ordering::Less {
                        value.clone()
                    } else {
                        min
                    };
                    let max = if value.total_cmp(&max) == Ordering::Greater {
                        value
                    } else {
                        max
                    };
                    (min, max)
                }
            });
        }
        Ok(range)
    }

    #[doc(hidden)]
    fn check_query_column(&self, col: usize) -> Result<()> {
        let count = self.number_of_columns();
        if col < count {
            Ok(())
        } else {
            Err(Error::ColumnOutOfRange(col, count))
        }
    }
}

impl<T: DataSource + ?Sized> DataSourceExt for T {}
