use serde::de::DeserializeOwned;
use std::fmt::Display;

/// A typed table that can be loaded from a delimited file.
pub trait Schema: DeserializeOwned {
    /// Columns the loader requires, each listed with every accepted spelling.
    /// The first spelling is the one reported when the column is missing.
    const COLUMNS: &'static [&'static [&'static str]];
}

/// A row that can be written as a delimited record.
///
/// Entity rows put their key in column 0; joins append only the remaining
/// attribute columns so the key appears once in the output.
pub trait TableRow {
    fn header() -> Vec<&'static str>;

    fn cells(&self) -> Vec<String>;

    /// Header without the leading key column.
    fn attribute_header() -> Vec<&'static str> {
        Self::header().into_iter().skip(1).collect()
    }
}

/// Attribute cells of a joined row, or blanks when the join found no match.
pub fn attribute_cells<T: TableRow>(row: Option<&T>) -> Vec<String> {
    match row {
        Some(r) => r.cells().into_iter().skip(1).collect(),
        None => vec![String::new(); T::attribute_header().len()],
    }
}

/// Render a nullable value; null becomes an empty cell.
pub fn cell<T: Display>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}
