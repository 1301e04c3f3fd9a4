//! Copying any data source into a standalone table

use crate::cell::Cell;
use crate::error::Result;
use crate::source::DataSource;
use crate::table::DataTable;

/// Snapshot a table or view into a new [`DataTable`]
///
/// Calculated columns are evaluated, and the result shares nothing with `source`.
/// Explicit formatted values are kept, as are formatter results already read
/// through the source that differ from the default rendering.
pub fn to_data_table(source: &dyn DataSource) -> Result<DataTable> {
    let columns = (0..source.number_of_columns())
        .map(|col| source.get_column_description(col))
        .collect::<Result<Vec<_>>>()?;
    let mut table = DataTable::with_columns(columns);

    let width = source.number_of_columns();
    let rows = (0..source.number_of_rows())
        .map(|row| {
            (0..width)
                .map(|col| {
                    let mut cell = Cell::new(source.get_value(row, col)?);
                    cell.formatted = source.get_stored_formatted_value(row, col)?;
                    let properties = source.get_properties(row, col);
                    if !properties.is_empty() {
                        cell.properties = Some(properties);
                    }
                    Ok(cell)
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    table.add_rows_from(rows)?;

    for row in 0..source.number_of_rows() {
        let properties = source.get_row_properties(row);
        if !properties.is_empty() {
            table.set_row_properties(row, properties)?;
        }
    }
    table.set_table_properties(source.get_table_properties());
    log::debug!(
        "materialized {} columns x {} rows",
        table.number_of_columns(),
        table.number_of_rows()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::{CalcOutput, CalculatedColumn};
    use crate::cell::ColumnDescription;
    use crate::source::shared;
    use crate::value::{ColumnType, Value};
    use crate::view::DataView;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn source_table() -> DataTable {
        let mut table = DataTable::with_columns([
            ColumnDescription::new(ColumnType::String).with_id("name"),
            ColumnDescription::new(ColumnType::Number)
                .with_id("score")
                .with_pattern("#,##0")
                .with_property("unit", json!("pts")),
        ]);
        table
            .add_row(vec![
                Cell::new("ann"),
                Cell::new(1200).with_formatted("1,200"),
            ])
            .unwrap();
        table.add_row_values([Value::from("bob"), Value::from(7)]).unwrap();
        table.set_property(1, 0, "style", json!("bold")).unwrap();
        table.set_row_property(0, "first", json!(true)).unwrap();
        table.set_table_property("title", json!("scores"));
        table
    }

    #[test]
    fn test_table_copy_is_equal() {
        let table = source_table();
        let copy = to_data_table(&table).unwrap();
        assert_eq!(copy, table);
        assert_eq!(copy.get_formatted_value(0, 1).unwrap(), "1,200");
        assert_eq!(copy.get_formatted_value(1, 1).unwrap(), "7");
        assert_eq!(copy.get_stored_formatted_value(1, 1).unwrap(), None);
    }

    #[test]
    fn test_view_snapshot_is_disconnected() {
        let table = shared(source_table());
        let mut view = DataView::new(table.clone());
        view.set_columns([
            crate::view::ColumnSelector::from(1usize),
            CalculatedColumn::custom(|view, row| {
                let score = view.get_value(row, 0)?;
                Ok(CalcOutput::new(format!("<{score}>")).with_formatted("tag"))
            })
            .with_type(ColumnType::String)
            .with_id("tag")
            .into(),
        ])
        .unwrap();
        view.set_rows([1, 0]).unwrap();
        view.set_column_property(0, "unit", json!("points")).unwrap();

        let snapshot = view.to_data_table().unwrap();
        assert_eq!(snapshot.number_of_columns(), 2);
        assert_eq!(snapshot.get_column_id(1).unwrap(), "tag");
        assert_eq!(snapshot.get_column_type(1).unwrap(), ColumnType::String);
        assert_eq!(snapshot.get_column_pattern(0).unwrap().as_deref(), Some("#,##0"));
        assert_eq!(snapshot.get_column_property(0, "unit"), Some(json!("points")));
        assert_eq!(snapshot.get_value(0, 1).unwrap(), Value::from("<7>"));
        assert_eq!(snapshot.get_formatted_value(1, 0).unwrap(), "1,200");
        assert_eq!(snapshot.get_formatted_value(1, 1).unwrap(), "tag");
        assert_eq!(snapshot.get_row_property(1, "first"), Some(json!(true)));
        assert_eq!(snapshot.get_table_property("title"), Some(json!("scores")));

        table.borrow_mut().set_value(1, 1, 8).unwrap();
        assert_eq!(snapshot.get_value(0, 0).unwrap(), Value::Number(7.0));
        assert_eq!(view.get_value(0, 0).unwrap(), Value::Number(8.0));
    }
}
