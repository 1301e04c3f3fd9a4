//! CSV reader

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use vizgrid_core::{Cell, ColumnDescription, ColumnType, DataTable, Value};

use crate::error::{CsvError, CsvResult};
use crate::options::CsvReadOptions;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// CSV file reader
pub struct CsvReader;

impl CsvReader {
    /// Read a CSV file into a table
    pub fn read_file<P: AsRef<Path>>(path: P, options: &CsvReadOptions) -> CsvResult<DataTable> {
        let file = File::open(path)?;
        Self::read(file, options)
    }

    /// Read CSV from a reader into a table
    ///
    /// Header fields become column ids and labels. Column types come from
    /// `options.column_types`, then from detection, then default to string.
    pub fn read<R: Read>(reader: R, options: &CsvReadOptions) -> CsvResult<DataTable> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .has_headers(options.has_header)
            .flexible(true)
            .trim(if options.trim {
                csv::Trim::All
            } else {
                csv::Trim::None
            })
            .from_reader(reader);

        let headers: Vec<String> = if options.has_header {
            csv_reader.headers()?.iter().map(String::from).collect()
        } else {
            Vec::new()
        };
        let records = csv_reader
            .records()
            .collect::<Result<Vec<_>, _>>()?;

        let width = records
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(headers.len()))
            .max()
            .unwrap_or(0);

        let columns: Vec<ColumnDescription> = (0..width)
            .map(|col| {
                let name = headers.get(col).cloned().unwrap_or_default();
                ColumnDescription::new(Self::column_type(col, &records, options))
                    .with_id(name.clone())
                    .with_label(name)
            })
            .collect();
        let types: Vec<ColumnType> = columns.iter().map(|c| c.column_type).collect();
        let mut table = DataTable::with_columns(columns);

        for (row, record) in records.iter().enumerate() {
            let cells = record
                .iter()
                .enumerate()
                .map(|(col, field)| {
                    Self::parse_field(field, types[col])
                        .map(Cell::new)
                        .map_err(|message| CsvError::Parse {
                            row,
                            column: col,
                            message,
                        })
                })
                .collect::<CsvResult<Vec<_>>>()?;
            table.add_row(cells)?;
        }

        log::debug!("read {} rows x {} columns from CSV", records.len(), width);
        Ok(table)
    }

    /// Type of a column: explicit, detected, or string
    fn column_type(
        col: usize,
        records: &[csv::StringRecord],
        options: &CsvReadOptions,
    ) -> ColumnType {
        if let Some(column_type) = options.column_types.get(col) {
            return *column_type;
        }
        if !options.auto_detect_types {
            return ColumnType::String;
        }

        let mut detected: Option<ColumnType> = None;
        for (row, record) in records.iter().enumerate() {
            let field = record.get(col).unwrap_or("");
            if field.is_empty() {
                continue;
            }
            let this = Self::detect_type(field);
            match detected {
                None => detected = Some(this),
                Some(previous) if previous == this => {}
                Some(previous) => {
                    log::warn!(
                        "column {} mixes {} and {} (row {}); reading it as string",
                        col,
                        previous,
                        this,
                        row
                    );
                    return ColumnType::String;
                }
            }
        }
        detected.unwrap_or(ColumnType::String)
    }

    /// Detect the type of a single non-empty field
    fn detect_type(field: &str) -> ColumnType {
        if field.eq_ignore_ascii_case("true") || field.eq_ignore_ascii_case("false") {
            return ColumnType::Boolean;
        }
        if field.parse::<f64>().map_or(false, f64::is_finite) {
            return ColumnType::Number;
        }
        if NaiveDate::parse_from_str(field, DATE_FORMAT).is_ok() {
            return ColumnType::Date;
        }
        if parse_datetime(field).is_some() {
            return ColumnType::DateTime;
        }
        if NaiveTime::parse_from_str(field, TIME_FORMAT).is_ok() {
            return ColumnType::TimeOfDay;
        }
        ColumnType::String
    }

    /// Read a field as `column_type`; empty fields are null
    fn parse_field(field: &str, column_type: ColumnType) -> Result<Value, String> {
        if field.is_empty() {
            return Ok(Value::Null);
        }
        let invalid = || format!("'{}' is not a valid {}", field, column_type);
        match column_type {
            ColumnType::Boolean => {
                if field.eq_ignore_ascii_case("true") {
                    Ok(Value::Boolean(true))
                } else if field.eq_ignore_ascii_case("false") {
                    Ok(Value::Boolean(false))
                } else {
                    Err(invalid())
                }
            }
            ColumnType::Number => field
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Value::Number)
                .ok_or_else(invalid),
            ColumnType::Date => NaiveDate::parse_from_str(field, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| invalid()),
            ColumnType::DateTime => parse_datetime(field).map(Value::DateTime).ok_or_else(invalid),
            ColumnType::TimeOfDay => NaiveTime::parse_from_str(field, TIME_FORMAT)
                .map(Value::TimeOfDay)
                .map_err(|_| invalid()),
            ColumnType::String | ColumnType::Function => Ok(Value::string(field)),
        }
    }
}

fn parse_datetime(field: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(field, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vizgrid_core::DataSource;

    #[test]
    fn test_read_with_type_detection() {
        let data = "name,score,passed,day,at\n\
                    ann,1.5,true,2024-03-01,08:30:00\n\
                    bob,,FALSE,2024-03-02,17:00:00\n";
        let table = CsvReader::read(data.as_bytes(), &CsvReadOptions::default()).unwrap();

        assert_eq!(table.number_of_columns(), 5);
        assert_eq!(table.number_of_rows(), 2);
        assert_eq!(table.get_column_id(1).unwrap(), "score");
        assert_eq!(table.get_column_label(1).unwrap(), "score");
        let types: Vec<ColumnType> = (0..5).map(|c| table.get_column_type(c).unwrap()).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::String,
                ColumnType::Number,
                ColumnType::Boolean,
                ColumnType::Date,
                ColumnType::TimeOfDay,
            ]
        );
        assert_eq!(table.get_value(0, 1).unwrap(), Value::Number(1.5));
        assert_eq!(table.get_value(1, 1).unwrap(), Value::Null);
        assert_eq!(table.get_value(1, 2).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_mixed_column_falls_back_to_string() {
        let data = "a\n1\nx\n";
        let table = CsvReader::read(data.as_bytes(), &CsvReadOptions::default()).unwrap();
        assert_eq!(table.get_column_type(0).unwrap(), ColumnType::String);
        assert_eq!(table.get_value(0, 0).unwrap(), Value::from("1"));
    }

    #[test]
    fn test_explicit_types_and_no_header() {
        let options = CsvReadOptions::new()
            .with_header(false)
            .with_delimiter(b';')
            .with_column_types([ColumnType::String]);
        let table = CsvReader::read("007;2\n008;3\n".as_bytes(), &options).unwrap();
        assert_eq!(table.get_value(0, 0).unwrap(), Value::from("007"));
        assert_eq!(table.get_value(1, 1).unwrap(), Value::Number(3.0));
        assert_eq!(table.get_column_id(0).unwrap(), "");
    }

    #[test]
    fn test_explicit_type_parse_error() {
        let options = CsvReadOptions::new().with_column_types([ColumnType::Number]);
        let err = CsvReader::read("n\n1\nlots\n".as_bytes(), &options).unwrap_err();
        assert!(matches!(err, CsvError::Parse { row: 1, column: 0, .. }));
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        let options = CsvReadOptions::new().with_column_types([ColumnType::Number]);
        let err = CsvReader::read("n\n1\ninf\n".as_bytes(), &options).unwrap_err();
        assert!(matches!(err, CsvError::Parse { row: 1, column: 0, .. }));
    }

    #[test]
    fn test_times_keep_millisecond_precision() {
        let table =
            CsvReader::read("t\n08:30:00.0125\n".as_bytes(), &CsvReadOptions::default()).unwrap();
        assert_eq!(table.get_column_type(0).unwrap(), ColumnType::TimeOfDay);
        assert_eq!(
            table.get_value(0, 0).unwrap(),
            Value::time_of_day(8, 30, 0, 12).unwrap()
        );
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let data = "a,b,c\n1\n2,3,4\n";
        let table = CsvReader::read(data.as_bytes(), &CsvReadOptions::default()).unwrap();
        assert_eq!(table.number_of_columns(), 3);
        assert_eq!(table.get_value(0, 2).unwrap(), Value::Null);
        assert_eq!(table.get_value(1, 2).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn test_detect_type() {
        assert_eq!(CsvReader::detect_type("True"), ColumnType::Boolean);
        assert_eq!(CsvReader::detect_type("-3e2"), ColumnType::Number);
        assert_eq!(CsvReader::detect_type("NaN"), ColumnType::String);
        assert_eq!(CsvReader::detect_type("2024-01-02 03:04:05"), ColumnType::DateTime);
        assert_eq!(CsvReader::detect_type("2024-01-02T03:04:05.250"), ColumnType::DateTime);
        assert_eq!(CsvReader::detect_type("hello"), ColumnType::String);
    }
}
