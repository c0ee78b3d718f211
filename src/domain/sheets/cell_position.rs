use std::str::FromStr;

use thiserror::Error;

use super::{
    a1_notation::{A1Notation, ToA1Notation},
    column::{parse_col, Column, ColumnParseError},
    row::Row,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPosition {
    pub col: Column,
    pub row: Row,
}

impl CellPosition {
    pub fn new(col: Column, row: Row) -> Self {
        CellPosition { col, row }
    }

    /// From 1-based row and column numbers, like `rowcol_to_a1` helpers.
    pub fn from_numbers(row: u32, col: u32) -> Self {
        CellPosition {
            col: Column::from_number(col),
            row: Row::from_row(row),
        }
    }

    /// `A1`.
    pub fn origin() -> Self {
        CellPosition::from_numbers(1, 1)
    }
}

impl ToA1Notation for CellPosition {
    fn to_a1_notation(&self, sheet_name: Option<&str>) -> A1Notation {
        let local = format!("{}{}", self.col, self.row);
        match sheet_name {
            Some(sheet_name) => A1Notation::in_sheet(sheet_name, &local),
            None => A1Notation::from(local),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellPositionParseError {
    #[error("Error parsing column: {0}")]
    Column(#[from] ColumnParseError),
    #[error("Error parsing row in '{0}'")]
    Row(String),
}

impl FromStr for CellPosition {
    type Err = CellPositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| CellPositionParseError::Row(s.to_owned()))?;
        let (col, row) = s.split_at(split);

        Ok(CellPosition {
            col: parse_col(col)?,
            row: row
                .parse::<Row>()
                .map_err(|_| CellPositionParseError::Row(s.to_owned()))?,
        })
    }
}
