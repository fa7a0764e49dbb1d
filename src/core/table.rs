//! Flattening of records into comma-separated text.
//!
//! Text cells are always quoted, numbers and booleans never are, and the header
//! is the raw column paths. Quoting is decided by the JSON type of the value,
//! not by its contents, so a string `"42"` still renders as `"42"`.

use crate::core::field_path::ColumnSet;
use crate::domain::model::Record;
use serde_json::{Number, Value};
use std::fmt;

pub const DELIMITER: &str = ",";
pub const LINE_SEPARATOR: &str = "\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Text(String),
    /// Rendered verbatim, unquoted.
    Literal(String),
}

impl Cell {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Cell::Empty,
            Some(Value::String(s)) => Cell::Text(s.clone()),
            Some(Value::Number(n)) => Cell::Literal(render_number(n)),
            Some(Value::Bool(b)) => Cell::Literal(b.to_string()),
            Some(container) => Cell::Text(container.to_string()),
        }
    }
}

/// Integral floats print without a fractional part, so `10.0` renders as `10`
/// the same way an integer would. Magnitudes from 1e21 keep exponent form.
fn render_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => {
            if f == 0.0 {
                "0".to_string()
            } else {
                format!("{:.0}", f)
            }
        }
        _ => n.to_string(),
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(text) => write!(f, "\"{}\"", text.replace('"', "\"\"")),
            Cell::Literal(literal) => f.write_str(literal),
        }
    }
}

pub type Row = Vec<Cell>;

#[derive(Debug, Clone)]
pub struct Table<'c> {
    columns: &'c ColumnSet,
    rows: Vec<Row>,
}

impl<'c> Table<'c> {
    pub fn build(records: &[Record], columns: &'c ColumnSet) -> Self {
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|path| Cell::from_value(path.resolve(record)))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    fn header(&self) -> String {
        self.columns
            .iter()
            .map(|path| path.as_str())
            .collect::<Vec<_>>()
            .join(DELIMITER)
    }
}

impl fmt::Display for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header())?;
        for row in &self.rows {
            f.write_str(LINE_SEPARATOR)?;
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    f.write_str(DELIMITER)?;
                }
                write!(f, "{}", cell)?;
            }
        }
        Ok(())
    }
}

/// Renders `records` as a header line plus one line per record, without a trailing newline.
pub fn serialize(records: &[Record], columns: &ColumnSet) -> String {
    Table::build(records, columns).to_string()
}
