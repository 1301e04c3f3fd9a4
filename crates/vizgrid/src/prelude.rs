//! Prelude module - common imports for vizgrid users
//!
//! ```rust
//! use vizgrid::prelude::*;
//! ```

pub use crate::{
    shared,
    // Calculated columns
    CalcOutput,
    CalculatedColumn,
    // Storage types
    Cell,
    ColumnDescription,
    ColumnRef,
    ColumnSelector,
    ColumnType,
    // Extension traits
    DataSource,
    DataSourceExt,
    // Main types
    DataTable,
    DataView,
    // Error types
    Error,
    ErrorType,
    Result,
    RowFilter,
    SortColumn,
    CsvReadOptions,
    CsvReader,
    CsvWriteOptions,
    CsvWriter,
    TableFileExt,
    Value,
};
