use std::{fmt::Formatter, num::ParseIntError, str::FromStr};

/// Spreadsheet row, stored zero-based.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Row {
    index: u32,
}

impl Row {
    pub fn from_index(index: u32) -> Self {
        Row { index }
    }

    /// From a 1-based row number. Zero saturates to the first row.
    pub fn from_row(row: u32) -> Self {
        Row {
            index: row.saturating_sub(1),
        }
    }

    /// Returns the 1-based row number.
    /// # Examples
    /// ```
    /// use sheets_relay::domain::sheets::row::Row;
    /// assert_eq!(Row::from_index(0).number(), 1);
    /// assert_eq!(Row::from_row(26).number(), 26);
    /// ```
    pub fn number(&self) -> u32 {
        self.index.saturating_add(1)
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row(index: {}, row: {})", self.index(), self.number())
    }
}

impl FromStr for Row {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Row::from_row(s.parse::<u32>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_display() {
        assert_eq!(Row::from_index(0).to_string(), "1");
        assert_eq!(Row::from_row(101).to_string(), "101");
    }

    #[test]
    fn test_row_debug() {
        assert_eq!(format!("{:?}", Row::from_index(4)), "Row(index: 4, row: 5)");
    }

    #[test]
    fn test_zero_row_saturates() {
        assert_eq!(Row::from_row(0), Row::from_index(0));
    }

    #[test]
    fn test_row_from_str() {
        assert_eq!("5".parse::<Row>().unwrap(), Row::from_row(5));
        assert!("abc".parse::<Row>().is_err());
    }
}
