use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    error_chain::BoxError,
    sheets::{a1_notation::A1Notation, cell_range::CellRange},
};

/// A worksheet (tab) of a spreadsheet, with the grid size last seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorksheetRef {
    pub spreadsheet_id: String,
    pub sheet_id: i32,
    pub title: String,
    pub row_count: u32,
    pub col_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpreadsheetInfo {
    pub spreadsheet_id: String,
    pub title: String,
    pub worksheets: Vec<WorksheetRef>,
}

/// How cell values are rendered when read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueRender {
    FormattedValue,
    Formula,
}

/// Row-major cell values as returned by the store.
pub type Values = Vec<Vec<Value>>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Worksheet '{title}' not found in spreadsheet {spreadsheet_id}")]
    WorksheetNotFound {
        spreadsheet_id: String,
        title: String,
    },
    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("{operation} response is missing '{field}'")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },
}

impl StoreError {
    pub fn remote<E: Into<BoxError>>(operation: &'static str, source: E) -> Self {
        StoreError::Remote {
            operation,
            source: source.into(),
        }
    }
}

/// Spreadsheet backend. Row and column counts are grid sizes, indices are
/// zero-based and half-open like the Sheets API dimension ranges.
#[async_trait::async_trait]
pub trait TabularStore: Send + Sync {
    async fn open_by_id(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, StoreError>;

    async fn list_worksheets(&self, spreadsheet_id: &str) -> Result<Vec<WorksheetRef>, StoreError> {
        Ok(self.open_by_id(spreadsheet_id).await?.worksheets)
    }

    async fn get_worksheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
    ) -> Result<WorksheetRef, StoreError> {
        self.list_worksheets(spreadsheet_id)
            .await?
            .into_iter()
            .find(|worksheet| worksheet.title == title)
            .ok_or_else(|| StoreError::WorksheetNotFound {
                spreadsheet_id: spreadsheet_id.to_owned(),
                title: title.to_owned(),
            })
    }

    async fn read_values(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        render: ValueRender,
    ) -> Result<Values, StoreError>;

    /// Writes `rows` starting at the top left cell of `range`, parsed as if
    /// typed by a user.
    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError>;

    /// Inserts `rows` after the table found at `range`.
    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError>;

    async fn resize(
        &self,
        worksheet: &WorksheetRef,
        row_count: u32,
        col_count: u32,
    ) -> Result<(), StoreError>;

    async fn delete_rows(
        &self,
        worksheet: &WorksheetRef,
        start_index: u32,
        end_index: u32,
    ) -> Result<(), StoreError>;

    async fn clear_ranges(
        &self,
        spreadsheet_id: &str,
        ranges: &[A1Notation],
    ) -> Result<(), StoreError>;

    /// Pastes `source` (values, formulas and formats) over `destination`,
    /// repeating it to fill the destination.
    async fn copy_range(
        &self,
        worksheet: &WorksheetRef,
        source: &CellRange,
        destination: &CellRange,
    ) -> Result<(), StoreError>;

    async fn create_worksheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        row_count: u32,
        col_count: u32,
    ) -> Result<WorksheetRef, StoreError>;
}
