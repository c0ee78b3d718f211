use std::{fmt::Formatter, str::FromStr};

use thiserror::Error;

/// Spreadsheet column, stored zero-based and displayed as letters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Column {
    index: u32,
}

impl Column {
    pub fn from_index(index: u32) -> Self {
        Column { index }
    }

    /// From a 1-based column number. Zero saturates to column `A`.
    pub fn from_number(number: u32) -> Self {
        Column {
            index: number.saturating_sub(1),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn number(&self) -> u32 {
        self.index.saturating_add(1)
    }

    /// Column letters, `A` for the first column.
    /// # Examples
    /// ```
    /// use sheets_relay::domain::sheets::column::Column;
    /// assert_eq!(Column::from_number(1).letters(), "A");
    /// assert_eq!(Column::from_number(27).letters(), "AA");
    /// assert_eq!(Column::from_number(703).letters(), "AAA");
    /// ```
    pub fn letters(&self) -> String {
        number_to_letters(self.number())
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letters())
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Column(index: {}, letters: {})", self.index, self)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ColumnParseError {
    #[error("Column is empty")]
    Empty,
    #[error("Non-alphabetic character in column")]
    NonAlphabeticCharacter,
}

impl FromStr for Column {
    type Err = ColumnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_col(s)
    }
}

pub fn parse_col<T: AsRef<str>>(col_str: T) -> Result<Column, ColumnParseError> {
    let col_str = col_str.as_ref();
    if col_str.is_empty() {
        return Err(ColumnParseError::Empty);
    }
    if col_str.chars().any(|c| !c.is_ascii_alphabetic()) {
        return Err(ColumnParseError::NonAlphabeticCharacter);
    }

    let number = col_str
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .fold(0u32, |acc, c| {
            acc.saturating_mul(26)
                .saturating_add(c as u32 - 'A' as u32 + 1)
        });

    Ok(Column::from_number(number))
}

fn number_to_letters(number: u32) -> String {
    let mut number = number;
    let mut result = Vec::new();
    while number > 0 {
        let remainder = (number - 1) % 26;
        result.push((remainder as u8 + b'A') as char);
        number = (number - 1) / 26;
    }
    result.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(Column::from_number(1).to_string(), "A");
        assert_eq!(Column::from_number(26).to_string(), "Z");
        assert_eq!(Column::from_number(27).to_string(), "AA");
        assert_eq!(Column::from_number(52).to_string(), "AZ");
        assert_eq!(Column::from_number(53).to_string(), "BA");
        assert_eq!(Column::from_number(26 * 26 + 26).to_string(), "ZZ");
        assert_eq!(Column::from_index(0).to_string(), "A");
    }

    #[test]
    fn test_parse_col_valid() {
        assert_eq!(parse_col("A").unwrap(), Column::from_number(1));
        assert_eq!(parse_col("z").unwrap(), Column::from_number(26));
        assert_eq!(parse_col("AB").unwrap(), Column::from_number(28));
        assert_eq!(parse_col("zZz").unwrap(), Column::from_number(26 * 26 * 26 + 26 * 26 + 26));
    }

    #[test]
    fn test_parse_col_invalid() {
        assert_eq!(parse_col("A1"), Err(ColumnParseError::NonAlphabeticCharacter));
        assert_eq!(parse_col("$"), Err(ColumnParseError::NonAlphabeticCharacter));
        assert_eq!(parse_col(""), Err(ColumnParseError::Empty));
    }

    #[test]
    fn test_letters_round_trip_through_parse() {
        for number in [1, 26, 27, 702, 703, 18278] {
            let column = Column::from_number(number);
            assert_eq!(column.letters().parse::<Column>().unwrap(), column);
        }
    }
}
