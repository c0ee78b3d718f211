//! Turns a [`Table`] into plain strings that can be written to a spreadsheet
//! without leaking `NaN`, raw datetimes, nested values or line breaks.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::{Cell, Column, ColumnKind, Structured, Table};

/// How datetime cells are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DatetimePrecision {
    /// `YYYY-MM-DD`
    Date,
    /// `YYYY-MM-DD HH:MM`
    DateTime,
}

impl DatetimePrecision {
    fn pattern(&self) -> &'static str {
        match self {
            DatetimePrecision::Date => "%Y-%m-%d",
            DatetimePrecision::DateTime => "%Y-%m-%d %H:%M",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Cannot serialize cell at row {row} of column '{column}': {reason}")]
    Serialization {
        column: String,
        row: usize,
        reason: String,
    },
}

/// Fully stringified table, stored row-major.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl NormalizedTable {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.headers.iter().position(|header| header == name)?;
        Some(self.rows.iter().map(|row| row[index].as_str()).collect())
    }

    /// Rows ready for a values update, optionally preceded by the header row.
    pub fn to_values(&self, include_header: bool) -> Vec<Vec<String>> {
        let header = include_header.then(|| self.headers.clone());
        header.into_iter().chain(self.rows.iter().cloned()).collect()
    }
}

/// Normalizes every cell of `table` into its display string.
///
/// Structured cells become JSON (nested NaN as `""`), datetimes are formatted
/// with `precision`, missing numbers become `"0"`, other missing values `""`,
/// and line breaks are removed from every cell.
pub fn normalize(
    table: &Table,
    precision: DatetimePrecision,
) -> Result<NormalizedTable, NormalizeError> {
    let headers = table.headers().into_iter().map(str::to_owned).collect();

    let columns = table
        .columns()
        .iter()
        .map(|column| normalize_column(column, precision))
        .collect::<Result<Vec<_>, _>>()?;

    let mut cells: Vec<_> = columns.into_iter().map(Vec::into_iter).collect();
    let rows = (0..table.row_count())
        .map(|_| cells.iter_mut().filter_map(Iterator::next).collect())
        .collect();

    Ok(NormalizedTable { headers, rows })
}

fn normalize_column(
    column: &Column,
    precision: DatetimePrecision,
) -> Result<Vec<String>, NormalizeError> {
    column
        .cells()
        .iter()
        .enumerate()
        .map(|(row, cell)| {
            render_cell(column.kind(), cell, precision)
                .map(strip_line_breaks)
                .map_err(|reason| NormalizeError::Serialization {
                    column: column.name().to_owned(),
                    row,
                    reason,
                })
        })
        .collect()
}

fn render_cell(kind: ColumnKind, cell: &Cell, precision: DatetimePrecision) -> Result<String, String> {
    let rendered = match cell {
        Cell::Structured(value) => structured_to_json(value)?,
        Cell::Null => missing(kind).to_owned(),
        Cell::Float(value) if value.is_nan() => missing(kind).to_owned(),
        Cell::Float(value) => format_float(*value),
        // Beyond 2^53 the integer is rounded like any other float column value.
        Cell::Int(value) if kind == ColumnKind::Float => format_float(*value as f64),
        Cell::Int(value) => value.to_string(),
        Cell::Bool(true) => "True".to_owned(),
        Cell::Bool(false) => "False".to_owned(),
        Cell::Text(text) => text.clone(),
        Cell::DateTime(datetime) => datetime.format(precision.pattern()).to_string(),
    };

    Ok(rendered)
}

fn missing(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Float | ColumnKind::Integer => "0",
        ColumnKind::Boolean | ColumnKind::DateTime | ColumnKind::Object => "",
    }
}

/// Shortest round-trip form, always with a fractional part (`3.0`, `1.5`).
/// Shortest round-trip text, with a signed two-digit exponent (`1e+16`,
/// `1.5e-07`) once the value leaves the plain decimal range.
fn format_float(value: f64) -> String {
    let text = format!("{value:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

fn strip_line_breaks(text: String) -> String {
    if text.contains(['\n', '\r']) {
        text.replace(|c: char| c == '\n' || c == '\r', "")
    } else {
        text
    }
}

fn structured_to_json(value: &Structured) -> Result<String, String> {
    let json = to_json_value(value)?;
    serde_json::to_string(&json).map_err(|error| error.to_string())
}

fn to_json_value(value: &Structured) -> Result<Value, String> {
    let json = match value {
        Structured::Null => Value::Null,
        Structured::Bool(value) => Value::Bool(*value),
        Structured::Int(value) => Value::from(*value),
        Structured::Number(value) if value.is_nan() => Value::String(String::new()),
        Structured::Number(value) => Number::from_f64(*value)
            .map(Value::Number)
            .ok_or_else(|| format!("{value} cannot be represented in JSON"))?,
        Structured::Text(text) => Value::String(text.clone()),
        Structured::List(items) => Value::Array(
            items
                .iter()
                .map(to_json_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Structured::Map(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), to_json_value(value)?);
            }
            Value::Object(map)
        }
    };

    Ok(json)
}
