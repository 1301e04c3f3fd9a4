//! # vizgrid
//!
//! A tabular data model for charts: concrete in-memory tables plus composable,
//! non-copying views over them.
//!
//! ## Features
//!
//! - [`DataTable`]: typed columns, rows, formatted values and properties at every level
//! - [`DataView`]: reorder, duplicate, hide and compute columns; select rows in any order;
//!   stack views on views and resolve indices down to the root table
//! - Calculated columns, predefined or custom, evaluated lazily and never stale
//! - JSON interchange for tables and view configurations
//! - CSV import and export
//!
//! ## Example
//!
//! ```rust
//! use vizgrid::prelude::*;
//!
//! let mut table = DataTable::with_columns([
//!     ColumnDescription::new(ColumnType::String).with_id("fruit"),
//!     ColumnDescription::new(ColumnType::Number).with_id("kg"),
//! ]);
//! table.add_row_values([Value::from("apple"), Value::from(3)]).unwrap();
//! table.add_row_values([Value::from("pear"), Value::from(5)]).unwrap();
//!
//! let table = shared(table);
//! let mut view = DataView::new(table.clone());
//! view.set_columns(["kg", "fruit"]).unwrap();
//! view.hide_rows(&[0]);
//!
//! assert_eq!(view.get_value(0, 1).unwrap(), Value::from("pear"));
//! assert_eq!(view.get_underlying_table_row_index(0), Some(1));
//!
//! let snapshot = view.to_data_table().unwrap();
//! let json = snapshot.to_json().unwrap();
//! assert_eq!(DataTable::from_json(&json).unwrap(), snapshot);
//! ```

pub mod prelude;

use std::path::Path;

// Storage types
pub use vizgrid_core::{Cell, ColumnDescription, ColumnType, Properties, PropertyValue, Row, Value};

// Sources, tables and views
pub use vizgrid_core::{
    shared, ColumnRef, ColumnSelector, DataSource, DataTable, DataView, Selection, SharedSource,
};

// Calculated columns
pub use vizgrid_core::{calc, BoxError, Calc, CalcFn, CalcOutput, CalculatedColumn, ErrorType};

// Queries, formatting, copies and JSON
pub use vizgrid_core::{
    json, to_data_table, DataSourceExt, DefaultFormatter, FilterCondition, Formatter, RowFilter,
    SortColumn,
};

// Error types
pub use vizgrid_core::{Error, Result};

pub use vizgrid_csv::{
    CsvError, CsvReadOptions, CsvReader, CsvResult, CsvWriteOptions, CsvWriter, LineTerminator,
};

/// Errors from loading or saving tables as files
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Table model or JSON error
    #[error(transparent)]
    Core(#[from] Error),

    /// CSV error
    #[error(transparent)]
    Csv(#[from] CsvError),

    /// The file extension is not a known table format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Extension trait adding file I/O to [`DataTable`]
///
/// The format follows the file extension: `.json` for the table JSON literal,
/// `.csv` and `.tsv` with default options.
pub trait TableFileExt: Sized {
    /// Load a table from a file
    fn open<P: AsRef<Path>>(path: P) -> std::result::Result<Self, FileError>;

    /// Save the table to a file
    fn save<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), FileError>;
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

impl TableFileExt for DataTable {
    fn open<P: AsRef<Path>>(path: P) -> std::result::Result<Self, FileError> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            Some("json") => Ok(DataTable::from_json(&std::fs::read_to_string(path)?)?),
            Some(ext @ ("csv" | "tsv")) => {
                let mut options = CsvReadOptions::default();
                if ext == "tsv" {
                    options = options.with_delimiter(b'\t');
                }
                Ok(CsvReader::read_file(path, &options)?)
            }
            _ => Err(FileError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), FileError> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            Some("json") => Ok(std::fs::write(path, self.to_json()?)?),
            Some("csv") => Ok(CsvWriter::write_file(self, path, &CsvWriteOptions::default())?),
            Some("tsv") => Ok(CsvWriter::write_file(
                self,
                path,
                &CsvWriteOptions::default().with_delimiter(b'\t'),
            )?),
            _ => Err(FileError::UnsupportedFormat(path.display().to_string())),
        }
    }
}
