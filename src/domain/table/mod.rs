//! In-memory tables with an explicit type tag per column.

pub mod normalize;

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde_json::Value;
use thiserror::Error;

/// A single table cell. `Float(NaN)` counts as missing, like `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Structured(Structured),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(value) => value.is_nan(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::DateTime(value)
    }
}

impl From<Structured> for Cell {
    fn from(value: Structured) -> Self {
        Cell::Structured(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Null, Into::into)
    }
}

/// Cells read back from a spreadsheet: numbers stay numeric, arrays and
/// objects become structured values.
impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(value) => Cell::Bool(value),
            Value::Number(number) => match number.as_i64() {
                Some(value) => Cell::Int(value),
                None => number.as_f64().map_or(Cell::Null, Cell::Float),
            },
            Value::String(text) => Cell::Text(text),
            other => Cell::Structured(other.into()),
        }
    }
}

/// Nested value stored in a single cell. Unlike `serde_json::Value` it can
/// hold NaN, which is how missing numbers show up in nested data.
#[derive(Debug, Clone, PartialEq)]
pub enum Structured {
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    Text(String),
    List(Vec<Structured>),
    Map(Vec<(String, Structured)>),
}

impl Structured {
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Structured)>,
        K: Into<String>,
    {
        Structured::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }
}

impl From<Value> for Structured {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Structured::Null,
            Value::Bool(value) => Structured::Bool(value),
            Value::Number(number) => match number.as_i64() {
                Some(value) => Structured::Int(value),
                None => number.as_f64().map_or(Structured::Null, Structured::Number),
            },
            Value::String(text) => Structured::Text(text),
            Value::Array(items) => Structured::List(items.into_iter().map(Into::into).collect()),
            Value::Object(entries) => Structured::map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Structured::from(value))),
            ),
        }
    }
}

/// Type tag of a column. Decides how missing values and datetimes are
/// rendered by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ColumnKind {
    Float,
    Integer,
    Boolean,
    DateTime,
    Object,
}

impl ColumnKind {
    /// Infers the tag from the cells. Integers with gaps become `Float`, the
    /// way numeric columns with missing values behave in a spreadsheet export.
    pub fn infer(cells: &[Cell]) -> Self {
        let mut values = cells.iter().filter(|cell| !cell.is_null()).peekable();
        if values.peek().is_none() {
            return ColumnKind::Object;
        }

        let has_nulls = cells.iter().any(Cell::is_null);
        let (mut ints, mut floats, mut bools, mut datetimes, mut others) = (0, 0, 0, 0, 0);
        for cell in values {
            match cell {
                Cell::Int(_) => ints += 1,
                Cell::Float(_) => floats += 1,
                Cell::Bool(_) => bools += 1,
                Cell::DateTime(_) => datetimes += 1,
                _ => others += 1,
            }
        }

        match (ints, floats, bools, datetimes, others) {
            (_, _, 0, 0, 0) if floats > 0 || has_nulls => ColumnKind::Float,
            (_, 0, 0, 0, 0) => ColumnKind::Integer,
            (0, 0, _, 0, 0) => ColumnKind::Boolean,
            (0, 0, 0, _, 0) => ColumnKind::DateTime,
            _ => ColumnKind::Object,
        }
    }

    pub fn accepts(&self, cell: &Cell) -> bool {
        match (self, cell) {
            (_, Cell::Null) | (ColumnKind::Object, _) => true,
            (ColumnKind::Float, Cell::Float(_) | Cell::Int(_)) => true,
            (ColumnKind::Integer, Cell::Int(_)) => true,
            (ColumnKind::Boolean, Cell::Bool(_)) => true,
            (ColumnKind::DateTime, Cell::DateTime(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("Column '{column}' has {found} rows, expected {expected}")]
    RaggedColumns {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Column '{0}' appears more than once")]
    DuplicateColumn(String),
    #[error("Column '{0}' does not exist")]
    UnknownColumn(String),
    #[error("Cell at row {row} of column '{column}' is not a valid {expected} value")]
    KindMismatch {
        column: String,
        row: usize,
        expected: ColumnKind,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    cells: Vec<Cell>,
}

impl Column {
    /// Builds a column, inferring its kind once from the cells.
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        let kind = ColumnKind::infer(&cells);
        Column {
            name: name.into(),
            kind,
            cells,
        }
    }

    /// Builds a column with a caller supplied kind, checking every cell.
    pub fn typed(
        name: impl Into<String>,
        kind: ColumnKind,
        cells: Vec<Cell>,
    ) -> Result<Self, TableError> {
        let name = name.into();
        if let Some(row) = cells.iter().position(|cell| !kind.accepts(cell)) {
            return Err(TableError::KindMismatch {
                column: name,
                row,
                expected: kind,
            });
        }

        Ok(Column { name, kind, cells })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Ordered, rectangular collection of named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(TableError::DuplicateColumn(column.name().to_owned()));
            }
        }

        if let Some(first) = columns.first() {
            if let Some(ragged) = columns.iter().find(|column| column.len() != first.len()) {
                return Err(TableError::RaggedColumns {
                    column: ragged.name().to_owned(),
                    expected: first.len(),
                    found: ragged.len(),
                });
            }
        }

        Ok(Table { columns })
    }

    /// Builds a table from key/value records. Columns are the union of all
    /// keys in first-seen order; a key missing from a record becomes `Null`.
    /// A key repeated inside one record keeps its last value.
    pub fn from_records<I, R, K>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, Cell)>,
        K: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut rows: Vec<HashMap<String, Cell>> = Vec::new();

        for record in records {
            let mut row = HashMap::new();
            for (key, cell) in record {
                let key = key.into();
                if seen.insert(key.clone()) {
                    names.push(key.clone());
                }
                row.insert(key, cell);
            }
            rows.push(row);
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let cells = rows
                    .iter_mut()
                    .map(|row| row.remove(&name).unwrap_or(Cell::Null))
                    .collect();
                Column::new(name, cells)
            })
            .collect();

        Table { columns }
    }

    /// Stacks tables vertically over the union of their columns.
    pub fn concat<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = Table>,
    {
        let tables: Vec<Table> = tables.into_iter().collect();

        let mut names: Vec<&str> = Vec::new();
        for table in &tables {
            for name in table.headers() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let columns = names
            .iter()
            .map(|name| {
                let cells = tables
                    .iter()
                    .flat_map(|table| match table.column(name) {
                        Some(column) => column.cells().to_vec(),
                        None => vec![Cell::Null; table.row_count()],
                    })
                    .collect();
                Column::new(*name, cells)
            })
            .collect();

        Table { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name() == name)
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Keeps the named columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table, TableError> {
        let columns = names
            .iter()
            .map(|name| {
                self.column(name.as_ref())
                    .cloned()
                    .ok_or_else(|| TableError::UnknownColumn(name.as_ref().to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Table::new(columns)
    }

    /// Keeps the rows for which `predicate` returns true. Column kinds are
    /// preserved.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Table
    where
        F: FnMut(&RowView<'_>) -> bool,
    {
        let keep: Vec<usize> = (0..self.row_count())
            .filter(|&index| predicate(&RowView { table: self, index }))
            .collect();

        let columns = self
            .columns
            .iter()
            .map(|column| Column {
                name: column.name.clone(),
                kind: column.kind,
                cells: keep.iter().map(|&index| column.cells[index].clone()).collect(),
            })
            .collect();

        Table { columns }
    }
}

/// Borrowed view of one table row.
pub struct RowView<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> RowView<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, column: &str) -> Option<&'a Cell> {
        self.table
            .column(column)
            .and_then(|column| column.cells().get(self.index))
    }
}
