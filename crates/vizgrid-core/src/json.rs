//! JSON interchange for tables and view configurations
//!
//! Tables use the literal format
//! `{cols: [{id, label, type, pattern?, role?, p?}], rows: [{c: [{v, f?, p?}], p?}], p?}`.
//! Dates are written as `"Date(y, m, d)"` or `"Date(y, m, d, h, mi, s, ms)"` with a
//! zero-based month, and times of day as `[h, m, s, ms]`.
//!
//! Views serialize their configuration only, never their data:
//! `{view: true, columns: [...] | null, rows: [...] | null, columnProperties?}`, where
//! `columnProperties` maps source columns to view-local properties of an unset
//! column selection.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::{Datelike, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::calc::{CalculatedColumn, ErrorType, Predefined};
use crate::cell::{Cell, ColumnDescription};
use crate::error::{Error, Result};
use crate::source::{ColumnRef, DataSource, SharedSource};
use crate::table::DataTable;
use crate::value::{ColumnType, Properties, Value};
use crate::view::{ColumnSelector, DataView, Selection, ViewColumn};

// === Wire types ===

#[derive(Debug, Serialize, Deserialize)]
struct TableJson {
    #[serde(default)]
    cols: Vec<ColumnJson>,
    #[serde(default)]
    rows: Vec<RowJson>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    p: Properties,
}

#[derive(Debug, Serialize, Deserialize)]
struct ColumnJson {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(rename = "type", default)]
    column_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    p: Properties,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RowJson {
    Full {
        c: Vec<Option<CellJson>>,
        #[serde(default, skip_serializing_if = "Properties::is_empty")]
        p: Properties,
    },
    /// Plain array of values
    Bare(Vec<Json>),
}

#[derive(Debug, Serialize, Deserialize)]
struct CellJson {
    #[serde(default)]
    v: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    f: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    p: Option<Properties>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ViewJson {
    #[serde(default = "default_true")]
    view: bool,
    #[serde(default)]
    columns: Option<Vec<ViewColumnJson>>,
    #[serde(default)]
    rows: Option<Vec<usize>>,
    #[serde(
        rename = "columnProperties",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    column_properties: BTreeMap<usize, Properties>,
}

fn default_true() -> bool {
    true
}

// Calc must come before Source: a calc object also carries `sourceColumn` and `p`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ViewColumnJson {
    Passthrough(ColumnRef),
    Calc(CalcJson),
    Source(SourceColumnJson),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceColumnJson {
    source_column: ColumnRef,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    p: Properties,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalcJson {
    calc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_column: Option<ColumnRef>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    column_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    p: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    magnitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_type: Option<String>,
}

// === Values ===

/// Encode a value in its interchange form
///
/// Numbers that JSON cannot hold (NaN, infinities) encode as `null`; tables and
/// calculated columns never store them.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Number(n) => {
            let negative_zero = *n == 0.0 && n.is_sign_negative();
            if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 && !negative_zero {
                Json::from(*n as i64)
            } else {
                serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number)
            }
        }
        Value::String(s) => Json::String(s.clone()),
        Value::Date(d) => Json::String(format!(
            "Date({}, {}, {})",
            d.year(),
            d.month0(),
            d.day()
        )),
        Value::DateTime(dt) => Json::String(format!(
            "Date({}, {}, {}, {}, {}, {}, {})",
            dt.year(),
            dt.month0(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            dt.nanosecond() / 1_000_000
        )),
        Value::TimeOfDay(_) => match value.time_parts() {
            Some(parts) => Json::from(parts.to_vec()),
            None => Json::Null,
        },
    }
}

/// Decode an interchange value for a column of type `column_type`
pub fn value_from_json(json: &Json, column_type: ColumnType, column: usize) -> Result<Value> {
    let mismatch = || Error::TypeMismatch {
        column,
        expected: column_type,
        actual: json_type_name(json),
    };
    if json.is_null() {
        return Ok(Value::Null);
    }
    match column_type {
        ColumnType::Boolean => json.as_bool().map(Value::Boolean).ok_or_else(mismatch),
        ColumnType::Number => json.as_f64().map(Value::Number).ok_or_else(mismatch),
        ColumnType::String => json
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(mismatch),
        ColumnType::Date => {
            let parts = json.as_str().and_then(parse_date_parts).ok_or_else(mismatch)?;
            date_from_parts(&parts).map(Value::Date).ok_or_else(mismatch)
        }
        ColumnType::DateTime => {
            let parts = json.as_str().and_then(parse_date_parts).ok_or_else(mismatch)?;
            datetime_from_parts(&parts).map(Value::DateTime).ok_or_else(mismatch)
        }
        ColumnType::TimeOfDay => time_from_json(json).ok_or_else(mismatch),
        ColumnType::Function => {
            value_from_json(json, infer_type(json), column).or_else(|_| Ok(Value::Null))
        }
    }
}

fn json_type_name(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Column type suggested by a single interchange value
fn infer_type(json: &Json) -> ColumnType {
    match json {
        Json::Bool(_) => ColumnType::Boolean,
        Json::Number(_) => ColumnType::Number,
        Json::Array(_) if time_from_json(json).is_some() => ColumnType::TimeOfDay,
        Json::String(s) => match parse_date_parts(s) {
            Some(parts) if parts.len() <= 3 => ColumnType::Date,
            Some(_) => ColumnType::DateTime,
            None => ColumnType::String,
        },
        _ => ColumnType::String,
    }
}

/// Split `"Date(2020, 0, 15)"` into its numeric arguments
fn parse_date_parts(s: &str) -> Option<Vec<i64>> {
    let inner = s
        .trim()
        .trim_start_matches("new ")
        .strip_prefix("Date(")?
        .strip_suffix(')')?;
    let parts = inner
        .split(',')
        .map(|p| p.trim().parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;
    (3..=7).contains(&parts.len()).then_some(parts)
}

fn date_from_parts(parts: &[i64]) -> Option<NaiveDate> {
    let year = i32::try_from(parts[0]).ok()?;
    let month = u32::try_from(parts[1] + 1).ok()?;
    let day = u32::try_from(parts[2]).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn datetime_from_parts(parts: &[i64]) -> Option<chrono::NaiveDateTime> {
    let date = date_from_parts(parts)?;
    let part = |i: usize| u32::try_from(parts.get(i).copied().unwrap_or(0)).ok();
    date.and_hms_milli_opt(part(3)?, part(4)?, part(5)?, part(6)?)
}

fn time_from_json(json: &Json) -> Option<Value> {
    let items = json.as_array()?;
    if !(3..=4).contains(&items.len()) {
        return None;
    }
    let parts = items
        .iter()
        .map(|v| v.as_u64().and_then(|n| u32::try_from(n).ok()))
        .collect::<Option<Vec<_>>>()?;
    Value::time_of_day(parts[0], parts[1], parts[2], parts.get(3).copied().unwrap_or(0))
}

// === Tables ===

fn table_to_wire(source: &dyn DataSource) -> Result<TableJson> {
    let cols = (0..source.number_of_columns())
        .map(|col| {
            let desc = source.get_column_description(col)?;
            Ok(ColumnJson {
                id: Some(desc.id),
                label: Some(desc.label),
                column_type: Some(desc.column_type.as_str().to_string()),
                pattern: desc.pattern,
                role: desc.role,
                p: desc.properties,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let rows = (0..source.number_of_rows())
        .map(|row| {
            let c = (0..source.number_of_columns())
                .map(|col| {
                    let properties = source.get_properties(row, col);
                    Ok(Some(CellJson {
                        v: value_to_json(&source.get_value(row, col)?),
                        f: source.get_stored_formatted_value(row, col)?,
                        p: (!properties.is_empty()).then_some(properties),
                    }))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(RowJson::Full {
                c,
                p: source.get_row_properties(row),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TableJson {
        cols,
        rows,
        p: source.get_table_properties(),
    })
}

fn table_from_wire(wire: TableJson) -> Result<DataTable> {
    let first_row: Option<Vec<&Json>> = wire.rows.first().map(|row| match row {
        RowJson::Full { c, .. } => c
            .iter()
            .map(|cell| cell.as_ref().map_or(&Json::Null, |cell| &cell.v))
            .collect(),
        RowJson::Bare(values) => values.iter().collect(),
    });

    let columns = wire
        .cols
        .into_iter()
        .enumerate()
        .map(|(i, col)| {
            let column_type = match col.column_type {
                Some(name) => name.parse()?,
                None => first_row
                    .as_ref()
                    .and_then(|row| row.get(i))
                    .map_or(ColumnType::String, |v| infer_type(v)),
            };
            Ok(ColumnDescription {
                id: col.id.unwrap_or_default(),
                label: col.label.unwrap_or_default(),
                column_type,
                pattern: col.pattern,
                role: col.role,
                properties: col.p,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let types: Vec<ColumnType> = columns.iter().map(|c| c.column_type).collect();
    let mut table = DataTable::with_columns(columns);

    let mut row_properties = Vec::new();
    let rows = wire
        .rows
        .into_iter()
        .enumerate()
        .map(|(r, row)| {
            let cells = match row {
                RowJson::Full { c, p } => {
                    if !p.is_empty() {
                        row_properties.push((r, p));
                    }
                    c.into_iter()
                        .enumerate()
                        .map(|(col, cell)| match cell {
                            None => Ok(Cell::null()),
                            Some(cell) => {
                                let mut out = Cell::new(value_from_json(
                                    &cell.v,
                                    column_type_at(&types, col)?,
                                    col,
                                )?);
                                out.formatted = cell.f;
                                out.properties = cell.p;
                                Ok(out)
                            }
                        })
                        .collect::<Result<Vec<_>>>()?
                }
                RowJson::Bare(values) => values
                    .iter()
                    .enumerate()
                    .map(|(col, v)| {
                        Ok(Cell::new(value_from_json(v, column_type_at(&types, col)?, col)?))
                    })
                    .collect::<Result<Vec<_>>>()?,
            };
            Ok(cells)
        })
        .collect::<Result<Vec<_>>>()?;
    table.add_rows_from(rows)?;

    for (row, properties) in row_properties {
        table.set_row_properties(row, properties)?;
    }
    table.set_table_properties(wire.p);
    Ok(table)
}

fn column_type_at(types: &[ColumnType], col: usize) -> Result<ColumnType> {
    types.get(col).copied().ok_or_else(|| {
        Error::config(format!(
            "Row has more cells than the {} declared columns",
            types.len()
        ))
    })
}

impl DataTable {
    /// Serialize to the JSON literal format
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&table_to_wire(self)?)?)
    }

    /// Serialize to a JSON value
    pub fn to_json_value(&self) -> Result<Json> {
        Ok(serde_json::to_value(table_to_wire(self)?)?)
    }

    /// Build a table from the JSON literal format
    ///
    /// Columns without a `type` take the type suggested by the first row, or
    /// `string` when there is none.
    pub fn from_json(json: &str) -> Result<Self> {
        table_from_wire(serde_json::from_str(json)?)
    }

    /// Build a table from a JSON value
    pub fn from_json_value(json: Json) -> Result<Self> {
        table_from_wire(serde_json::from_value(json)?)
    }
}

/// Serialize the current contents of any source as table JSON
pub fn source_to_json(source: &dyn DataSource) -> Result<String> {
    Ok(serde_json::to_string(&table_to_wire(source)?)?)
}

// === Views ===

fn view_to_wire(view: &DataView) -> Result<ViewJson> {
    let mut column_properties = BTreeMap::new();
    let columns = match view.column_selection() {
        Selection::Unset => {
            column_properties.extend(
                view.unset_column_properties()
                    .iter()
                    .filter(|(_, p)| !p.is_empty())
                    .map(|(col, p)| (*col, p.clone())),
            );
            None
        }
        Selection::Explicit(columns) => Some(
            columns
                .iter()
                .map(view_column_to_wire)
                .collect::<Result<Vec<_>>>()?,
        ),
    };
    let rows = match view.row_selection() {
        Selection::Unset => None,
        Selection::Explicit(rows) => Some(rows.clone()),
    };
    Ok(ViewJson {
        view: true,
        columns,
        rows,
        column_properties,
    })
}

fn view_column_to_wire(column: &ViewColumn) -> Result<ViewColumnJson> {
    match column {
        ViewColumn::Source { index, properties } if properties.is_empty() => {
            Ok(ViewColumnJson::Passthrough(ColumnRef::Index(*index)))
        }
        ViewColumn::Source { index, properties } => Ok(ViewColumnJson::Source(SourceColumnJson {
            source_column: ColumnRef::Index(*index),
            p: properties.clone(),
        })),
        ViewColumn::Calculated(calc) => {
            let (func, source_col) = calc.predefined().ok_or_else(|| {
                Error::config("Calculated columns with custom functions cannot be serialized")
            })?;
            let non_empty = |s: &String| (!s.is_empty()).then(|| s.clone());
            let (magnitude, error_type) = match func {
                Predefined::Error {
                    magnitude,
                    error_type,
                } => (Some(magnitude), Some(error_type.as_str().to_string())),
                _ => (None, None),
            };
            Ok(ViewColumnJson::Calc(CalcJson {
                calc: func.name().to_string(),
                source_column: source_col.map(ColumnRef::Index),
                column_type: Some(calc.column_type.as_str().to_string()),
                label: non_empty(&calc.label),
                id: non_empty(&calc.id),
                role: calc.role.clone(),
                pattern: calc.pattern.clone(),
                p: calc.properties.clone(),
                magnitude,
                error_type,
            }))
        }
    }
}

fn calc_from_wire(wire: CalcJson) -> Result<CalculatedColumn> {
    let mut column = CalculatedColumn::named(wire.calc);
    column.source_column = wire.source_column;
    column.column_type = wire.column_type.as_deref().map(ColumnType::parse).transpose()?;
    column.id = wire.id;
    column.label = wire.label;
    column.role = wire.role;
    column.pattern = wire.pattern;
    column.properties = wire.p;
    column.magnitude = wire.magnitude;
    column.error_type = wire.error_type.as_deref().map(ErrorType::parse).transpose()?;
    Ok(column)
}

fn view_from_wire(view: &mut DataView, wire: ViewJson) -> Result<()> {
    if !wire.view {
        return Err(Error::config("JSON does not describe a view"));
    }
    if let Some(columns) = wire.columns {
        let mut local = Vec::new();
        let selectors = columns
            .into_iter()
            .enumerate()
            .map(|(i, column)| match column {
                ViewColumnJson::Passthrough(column) => Ok(ColumnSelector::Source(column)),
                ViewColumnJson::Source(column) => {
                    if !column.p.is_empty() {
                        local.push((i, column.p));
                    }
                    Ok(ColumnSelector::Source(column.source_column))
                }
                ViewColumnJson::Calc(calc) => calc_from_wire(calc).map(ColumnSelector::Calculated),
            })
            .collect::<Result<Vec<_>>>()?;
        view.set_columns(selectors)?;
        for (col, properties) in local {
            view.set_column_properties(col, properties)?;
        }
    }
    for (col, properties) in wire.column_properties {
        view.set_column_properties(col, properties)?;
    }
    if let Some(rows) = wire.rows {
        view.set_rows(rows)?;
    }
    Ok(())
}

impl DataView {
    /// Serialize the view configuration (not its data)
    ///
    /// Fails for views with custom calculated columns.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&view_to_wire(self)?)?)
    }

    /// Serialize the view configuration to a JSON value
    pub fn to_json_value(&self) -> Result<Json> {
        Ok(serde_json::to_value(view_to_wire(self)?)?)
    }

    /// Rebuild a view from its configuration over a caller-supplied source
    pub fn from_json<S: DataSource + 'static>(source: Rc<RefCell<S>>, json: &str) -> Result<Self> {
        Self::from_json_shared(source, json)
    }

    /// Rebuild a view from its configuration over a type-erased source
    pub fn from_json_shared(source: SharedSource, json: &str) -> Result<Self> {
        Self::from_json_value_shared(source, serde_json::from_str(json)?)
    }

    /// Rebuild a view from a JSON value over a caller-supplied source
    pub fn from_json_value<S: DataSource + 'static>(
        source: Rc<RefCell<S>>,
        json: Json,
    ) -> Result<Self> {
        Self::from_json_value_shared(source, json)
    }

    /// Rebuild a view from a JSON value over a type-erased source
    pub fn from_json_value_shared(source: SharedSource, json: Json) -> Result<Self> {
        let wire = serde_json::from_value(json)?;
        let mut view = DataView::from_shared(source);
        view_from_wire(&mut view, wire)?;
        Ok(view)
    }
}
