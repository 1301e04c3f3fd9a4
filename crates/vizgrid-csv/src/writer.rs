//! CSV writer

use std::fs::File;
use std::io::Write;
use std::path::Path;

use vizgrid_core::DataSource;

use crate::error::CsvResult;
use crate::options::{CsvWriteOptions, LineTerminator};

/// CSV file writer
pub struct CsvWriter;

impl CsvWriter {
    /// Write a table or view to a CSV file
    pub fn write_file<P: AsRef<Path>>(
        source: &dyn DataSource,
        path: P,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let file = File::create(path)?;
        Self::write(source, file, options)
    }

    /// Write a table or view to a writer
    ///
    /// The header uses column labels, falling back to ids. Null cells are empty fields.
    pub fn write<W: Write>(
        source: &dyn DataSource,
        writer: W,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let terminator = match options.line_terminator {
            LineTerminator::LF => csv::Terminator::Any(b'\n'),
            LineTerminator::CRLF => csv::Terminator::CRLF,
            LineTerminator::CR => csv::Terminator::Any(b'\r'),
        };

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .terminator(terminator)
            .from_writer(writer);

        let columns = source.number_of_columns();
        if options.write_header {
            let header = (0..columns)
                .map(|col| {
                    let label = source.get_column_label(col)?;
                    if label.is_empty() {
                        source.get_column_id(col)
                    } else {
                        Ok(label)
                    }
                })
                .collect::<vizgrid_core::Result<Vec<_>>>()?;
            csv_writer.write_record(&header)?;
        }

        for row in 0..source.number_of_rows() {
            let record = (0..columns)
                .map(|col| {
                    if options.formatted {
                        source.get_formatted_value(row, col)
                    } else {
                        source.get_value(row, col).map(|v| v.to_string())
                    }
                })
                .collect::<vizgrid_core::Result<Vec<_>>>()?;
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CsvReadOptions, CsvReader};
    use pretty_assertions::assert_eq;
    use vizgrid_core::{shared, Cell, ColumnDescription, ColumnType, DataTable, DataView, Value};

    fn scores() -> DataTable {
        let mut table = DataTable::with_columns([
            ColumnDescription::new(ColumnType::String)
                .with_id("name")
                .with_label("Name"),
            ColumnDescription::new(ColumnType::Number).with_id("score"),
        ]);
        table
            .add_row(vec![Cell::new("ann, jr"), Cell::new(0.25).with_formatted("25%")])
            .unwrap();
        table.add_row(vec![Cell::new("bob")]).unwrap();
        table
    }

    #[test]
    fn test_write_raw_values() {
        let mut buf = Vec::new();
        CsvWriter::write(&scores(), &mut buf, &CsvWriteOptions::default()).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Name,score\n\"ann, jr\",0.25\nbob,\n"
        );
    }

    #[test]
    fn test_write_formatted_without_header() {
        let options = CsvWriteOptions::new()
            .with_header(false)
            .with_formatted(true)
            .with_delimiter(b'\t')
            .with_line_terminator(LineTerminator::CRLF);
        let mut buf = Vec::new();
        CsvWriter::write(&scores(), &mut buf, &options).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "ann, jr\t25%\r\nbob\t\r\n");
    }

    #[test]
    fn test_write_view_to_file_and_read_back() {
        let mut view = DataView::new(shared(scores()));
        view.set_columns([1usize]).unwrap();
        view.set_rows([0]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.csv");
        CsvWriter::write_file(&view, &path, &CsvWriteOptions::default()).unwrap();

        let table = CsvReader::read_file(&path, &CsvReadOptions::default()).unwrap();
        assert_eq!(table.number_of_rows(), 1);
        assert_eq!(table.get_column_id(0).unwrap(), "score");
        assert_eq!(table.get_value(0, 0).unwrap(), Value::Number(0.25));
    }
}
