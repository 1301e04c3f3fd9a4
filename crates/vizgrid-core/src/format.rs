//! Formatter collaborator interface
//!
//! Concrete number/date formatting lives outside this crate. Tables and views only
//! call [`Formatter::format_value`] when a cell has no explicit formatted value.

use crate::value::Value;

/// Turns a cell value into its display string
pub trait Formatter {
    /// Format a single value
    fn format_value(&self, value: &Value) -> String;
}

/// Formatter used when none is supplied: the value's `Display` form
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatter;

impl Formatter for DefaultFormatter {
    fn format_value(&self, value: &Value) -> String {
        value.to_string()
    }
}

impl<F> Formatter for F
where
    F: Fn(&Value) -> String,
{
    fn format_value(&self, value: &Value) -> String {
        self(value)
    }
}
