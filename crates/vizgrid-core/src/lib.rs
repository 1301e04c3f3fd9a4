//! # vizgrid-core
//!
//! Core data model for the vizgrid charting table library.
//!
//! This crate provides:
//! - [`Value`] and [`ColumnType`] - Typed cell values and the closed set of column types
//! - [`DataTable`] - A concrete, mutable in-memory table
//! - [`DataView`] - A non-copying view that reorders, filters, hides, duplicates and
//!   computes columns and rows over a table or over another view
//! - [`DataSource`] - The read interface both of them implement
//! - JSON interchange for tables and view configurations
//!
//! ## Example
//!
//! ```rust
//! use vizgrid_core::{
//!     shared, CalculatedColumn, ColumnDescription, ColumnType, DataSource, DataTable, DataView,
//!     Value,
//! };
//!
//! let mut table = DataTable::with_columns([
//!     ColumnDescription::new(ColumnType::String).with_id("city"),
//!     ColumnDescription::new(ColumnType::Number).with_id("population"),
//! ]);
//! table.add_row_values([Value::from("Oslo"), Value::from(709_000)]).unwrap();
//! table.add_row_values([Value::from("Bergen"), Value::from(291_000)]).unwrap();
//!
//! let table = shared(table);
//! let mut view = DataView::new(table.clone());
//! let stringify = CalculatedColumn::named("stringify").with_source_column("population");
//! view.set_columns([stringify]).unwrap();
//! view.set_rows([1]).unwrap();
//! assert_eq!(view.get_value(0, 0).unwrap(), Value::from("291000"));
//!
//! // Changes to the table show through the view
//! table.borrow_mut().set_value(1, 1, 300_000).unwrap();
//! assert_eq!(view.get_value(0, 0).unwrap(), Value::from("300000"));
//! ```

pub mod calc;
pub mod cell;
pub mod error;
pub mod format;
pub mod json;
pub mod materialize;
pub mod query;
pub mod source;
pub mod table;
pub mod value;
pub mod view;

pub use calc::{Calc, CalcFn, CalcOutput, CalculatedColumn, ErrorType};
pub use cell::{Cell, ColumnDescription, Row};
pub use error::{BoxError, Error, Result};
pub use format::{DefaultFormatter, Formatter};
pub use materialize::to_data_table;
pub use query::{DataSourceExt, FilterCondition, RowFilter, SortColumn};
pub use source::{shared, ColumnRef, DataSource, SharedSource};
pub use table::DataTable;
pub use value::{ColumnType, Properties, PropertyValue, Value};
pub use view::{ColumnSelector, DataView, Selection};
