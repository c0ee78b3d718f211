use super::{
    a1_notation::{A1Notation, ToA1Notation},
    cell_position::CellPosition,
};

/// Rectangular block of cells, both corners inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellPosition,
    pub end: CellPosition,
}

impl CellRange {
    pub fn new(start: CellPosition, end: CellPosition) -> Self {
        CellRange { start, end }
    }

    pub fn row_count(&self) -> u32 {
        self.end.row.index().saturating_sub(self.start.row.index()) + 1
    }

    pub fn column_count(&self) -> u32 {
        self.end.col.index().saturating_sub(self.start.col.index()) + 1
    }
}

impl ToA1Notation for CellRange {
    fn to_a1_notation(&self, sheet_name: Option<&str>) -> A1Notation {
        let local = format!(
            "{}:{}",
            self.start.to_a1_notation(None),
            self.end.to_a1_notation(None)
        );
        match sheet_name {
            Some(sheet_name) => A1Notation::in_sheet(sheet_name, &local),
            None => A1Notation::from(local),
        }
    }
}
