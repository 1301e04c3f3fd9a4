//! Calculated columns
//!
//! A view column can be computed per row instead of read from the source, either by
//! one of the predefined functions or by a user callback. Specs are validated when
//! they are handed to [`DataView::set_columns`](crate::DataView::set_columns); the
//! evaluation itself happens lazily on first read and is cached by the view.

use std::fmt;
use std::rc::Rc;

use crate::error::{BoxError, Error, Result};
use crate::source::{ColumnRef, DataSource};
use crate::value::{ColumnType, Properties, PropertyValue, Value};
use crate::view::DataView;

/// User callback computing one cell of a calculated column
///
/// Called with the owning view and the view-space row index.
pub type CalcFn = Rc<dyn Fn(&DataView, usize) -> std::result::Result<CalcOutput, BoxError>>;

/// Result of evaluating a calculated cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalcOutput {
    /// Cell value
    pub value: Value,
    /// Explicit formatted value
    pub formatted: Option<String>,
    /// Cell properties
    pub properties: Option<Properties>,
}

impl CalcOutput {
    /// Output holding only a value
    pub fn new<V: Into<Value>>(value: V) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Set the formatted value
    pub fn with_formatted<S: Into<String>>(mut self, formatted: S) -> Self {
        self.formatted = Some(formatted.into());
        self
    }

    /// Set the cell properties
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }
}

impl From<Value> for CalcOutput {
    fn from(value: Value) -> Self {
        CalcOutput::new(value)
    }
}

/// How the `error` function applies its magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorType {
    /// `value + magnitude`
    #[default]
    Constant,
    /// `value * (1 + magnitude / 100)`
    Percent,
}

impl ErrorType {
    /// Interchange name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Constant => "constant",
            ErrorType::Percent => "percent",
        }
    }

    /// Parse an interchange name
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "constant" => Ok(ErrorType::Constant),
            "percent" => Ok(ErrorType::Percent),
            other => Err(Error::config(format!("Unknown error type: {other}"))),
        }
    }
}

/// The function behind a calculated column
#[derive(Clone)]
pub enum Calc {
    /// A predefined function by name (`identity`, `emptyString`, `stringify`,
    /// `fillFromTop`, `fillFromBottom`, `error`)
    Named(String),
    /// A user callback
    Custom(CalcFn),
}

impl fmt::Debug for Calc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calc::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Calc::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Specification of a calculated view column
#[derive(Debug, Clone)]
pub struct CalculatedColumn {
    /// Function computing the cells
    pub calc: Calc,
    /// Source column read by predefined functions
    pub source_column: Option<ColumnRef>,
    /// Declared type; required for custom functions
    pub column_type: Option<ColumnType>,
    /// Column id
    pub id: Option<String>,
    /// Column label
    pub label: Option<String>,
    /// Column role
    pub role: Option<String>,
    /// Column pattern
    pub pattern: Option<String>,
    /// Column properties
    pub properties: Properties,
    /// Offset used by `error`
    pub magnitude: Option<f64>,
    /// How `error` applies `magnitude`
    pub error_type: Option<ErrorType>,
}

impl CalculatedColumn {
    fn with_calc(calc: Calc) -> Self {
        Self {
            calc,
            source_column: None,
            column_type: None,
            id: None,
            label: None,
            role: None,
            pattern: None,
            properties: Properties::new(),
            magnitude: None,
            error_type: None,
        }
    }

    /// A column computed by a predefined function
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self::with_calc(Calc::Named(name.into()))
    }

    /// A column computed by a user callback
    pub fn custom<F>(func: F) -> Self
    where
        F: Fn(&DataView, usize) -> std::result::Result<CalcOutput, BoxError> + 'static,
    {
        Self::with_calc(Calc::Custom(Rc::new(func)))
    }

    /// Set the source column
    pub fn with_source_column<C: Into<ColumnRef>>(mut self, column: C) -> Self {
        self.source_column = Some(column.into());
        self
    }

    /// Set the declared type
    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    /// Set the id
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the label
    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the role
    pub fn with_role<S: Into<String>>(mut self, role: S) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the pattern
    pub fn with_pattern<S: Into<String>>(mut self, pattern: S) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Add a column property
    pub fn with_property<S: Into<String>>(mut self, name: S, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Set the `error` magnitude and how it is applied
    pub fn with_error(mut self, magnitude: f64, error_type: ErrorType) -> Self {
        self.magnitude = Some(magnitude);
        self.error_type = Some(error_type);
        self
    }

    /// Validate against a source and resolve column references
    pub(crate) fn resolve(&self, source: &dyn DataSource) -> Result<ResolvedCalc> {
        let kind = match &self.calc {
            Calc::Custom(func) => CalcKind::Custom(func.clone()),
            Calc::Named(name) => {
                let func = Predefined::from_name(name, self)?;
                let source_col = match (&self.source_column, func.needs_source()) {
                    (Some(column), _) => Some(source.get_column_index(column).ok_or_else(|| {
                        Error::config(format!("Invalid source column {column} for '{name}'"))
                    })?),
                    (None, true) => {
                        return Err(Error::config(format!(
                            "Calculated column '{name}' requires a source column"
                        )))
                    }
                    (None, false) => None,
                };
                if let (Predefined::Error { .. }, Some(col)) = (&func, source_col) {
                    let ty = source.get_column_type(col)?;
                    if ty != ColumnType::Number {
                        return Err(Error::config(format!(
                            "'error' needs a number source column, column {col} is {ty}"
                        )));
                    }
                }
                CalcKind::Predefined { func, source_col }
            }
        };

        let column_type = match (self.column_type, &kind) {
            (Some(ty), _) => ty,
            (None, CalcKind::Predefined { func, source_col }) => {
                func.self_type(source, *source_col)?
            }
            (None, CalcKind::Custom(_)) => {
                return Err(Error::config(
                    "Calculated column with a custom function requires a type",
                ))
            }
        };

        Ok(ResolvedCalc {
            kind,
            column_type,
            id: self.id.clone().unwrap_or_default(),
            label: self.label.clone().unwrap_or_default(),
            role: self.role.clone(),
            pattern: self.pattern.clone(),
            properties: self.properties.clone(),
        })
    }
}

/// Predefined calculated column functions
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Predefined {
    Identity,
    EmptyString,
    Stringify,
    FillFromTop,
    FillFromBottom,
    Error { magnitude: f64, error_type: ErrorType },
}

impl Predefined {
    fn from_name(name: &str, calc: &CalculatedColumn) -> Result<Self> {
        Ok(match name {
            "identity" => Predefined::Identity,
            "emptyString" => Predefined::EmptyString,
            "stringify" => Predefined::Stringify,
            "fillFromTop" => Predefined::FillFromTop,
            "fillFromBottom" => Predefined::FillFromBottom,
            "error" => Predefined::Error {
                magnitude: calc
                    .magnitude
                    .ok_or_else(|| Error::config("'error' requires a magnitude"))?,
                error_type: calc.error_type.unwrap_or_default(),
            },
            other => {
                return Err(Error::config(format!(
                    "Unknown calculated column function: '{other}'"
                )))
            }
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Predefined::Identity => "identity",
            Predefined::EmptyString => "emptyString",
            Predefined::Stringify => "stringify",
            Predefined::FillFromTop => "fillFromTop",
            Predefined::FillFromBottom => "fillFromBottom",
            Predefined::Error { .. } => "error",
        }
    }

    fn needs_source(&self) -> bool {
        !matches!(self, Predefined::EmptyString)
    }

    fn self_type(&self, source: &dyn DataSource, source_col: Option<usize>) -> Result<ColumnType> {
        match (self, source_col) {
            (Predefined::EmptyString | Predefined::Stringify, _) => Ok(ColumnType::String),
            (Predefined::Error { .. }, _) => Ok(ColumnType::Number),
            (_, Some(col)) => source.get_column_type(col),
            (_, None) => Err(Error::config(format!("'{}' requires a source column", self.name()))),
        }
    }
}

#[derive(Clone)]
pub(crate) enum CalcKind {
    Predefined {
        func: Predefined,
        source_col: Option<usize>,
    },
    Custom(CalcFn),
}

/// A calculated column validated against its view's source
#[derive(Clone)]
pub(crate) struct ResolvedCalc {
    pub(crate) kind: CalcKind,
    pub(crate) column_type: ColumnType,
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) role: Option<String>,
    pub(crate) pattern: Option<String>,
    pub(crate) properties: Properties,
}

impl fmt::Debug for ResolvedCalc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            CalcKind::Predefined { func, .. } => func.name(),
            CalcKind::Custom(_) => "custom",
        };
        f.debug_struct("ResolvedCalc")
            .field("kind", &kind)
            .field("column_type", &self.column_type)
            .field("id", &self.id)
            .finish()
    }
}

impl ResolvedCalc {
    /// Compute the cell at `row` (view-space) of view column `col`
    pub(crate) fn evaluate(&self, view: &DataView, row: usize, col: usize) -> Result<CalcOutput> {
        let output = match &self.kind {
            CalcKind::Custom(func) => func(view, row)?,
            CalcKind::Predefined { func, source_col } => {
                let src = source_col.unwrap_or_default();
                CalcOutput::new(match func {
                    Predefined::Identity => view.source_value(row, src)?,
                    Predefined::EmptyString => Value::string(""),
                    Predefined::Stringify => {
                        Value::String(view.source_value(row, src)?.to_string())
                    }
                    Predefined::FillFromTop => view.fill(row, col, src, (0..=row).rev())?,
                    Predefined::FillFromBottom => {
                        view.fill(row, col, src, row..view.number_of_rows())?
                    }
                    Predefined::Error {
                        magnitude,
                        error_type,
                    } => match view.source_value(row, src)? {
                        Value::Number(n) => Value::Number(match error_type {
                            ErrorType::Constant => n + magnitude,
                            ErrorType::Percent => n * (1.0 + magnitude / 100.0),
                        }),
                        _ => Value::Null,
                    },
                })
            }
        };
        if !output.value.fits(self.column_type) {
            return Err(Error::TypeMismatch {
                column: col,
                expected: self.column_type,
                actual: output.value.type_name(),
            });
        }
        Ok(output)
    }

    /// Predefined function and source column, if this is not a custom column
    pub(crate) fn predefined(&self) -> Option<(Predefined, Option<usize>)> {
        match &self.kind {
            CalcKind::Predefined { func, source_col } => Some((*func, *source_col)),
            CalcKind::Custom(_) => None,
        }
    }
}
