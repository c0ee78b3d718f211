//! In-memory [`TabularStore`] used by the application tests.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::domain::sheets::{
    a1_notation::{A1Notation, ToA1Notation},
    cell_position::CellPosition,
    cell_range::CellRange,
};
use crate::ports::tabular_store::{
    SpreadsheetInfo, StoreError, TabularStore, ValueRender, Values, WorksheetRef,
};

struct FakeSpreadsheet {
    title: String,
    worksheets: Vec<FakeWorksheet>,
}

struct FakeWorksheet {
    reference: WorksheetRef,
    values: Values,
}

#[derive(Default)]
struct State {
    spreadsheets: HashMap<String, FakeSpreadsheet>,
    calls: Vec<String>,
    failures: Vec<&'static str>,
    next_sheet_id: i32,
}

impl State {
    fn check(&mut self, operation: &'static str) -> Result<(), StoreError> {
        match self.failures.iter().position(|failing| *failing == operation) {
            Some(index) => {
                self.failures.remove(index);
                Err(StoreError::remote(operation, "backend unavailable"))
            }
            None => Ok(()),
        }
    }

    fn worksheet_mut(
        &mut self,
        spreadsheet_id: &str,
        title: &str,
    ) -> Result<&mut FakeWorksheet, StoreError> {
        self.spreadsheets
            .get_mut(spreadsheet_id)
            .and_then(|spreadsheet| {
                spreadsheet
                    .worksheets
                    .iter_mut()
                    .find(|worksheet| worksheet.reference.title == title)
            })
            .ok_or_else(|| StoreError::WorksheetNotFound {
                spreadsheet_id: spreadsheet_id.to_owned(),
                title: title.to_owned(),
            })
    }

    fn worksheet_for_range(
        &mut self,
        spreadsheet_id: &str,
        range: &A1Notation,
    ) -> Result<&mut FakeWorksheet, StoreError> {
        let title = range.sheet_title().unwrap_or_default();
        self.worksheet_mut(spreadsheet_id, &title)
    }
}

#[derive(Default)]
pub(crate) struct InMemoryStore {
    state: Mutex<State>,
}

fn to_values(rows: &[Vec<String>]) -> Values {
    rows.iter()
        .map(|row| row.iter().cloned().map(Value::String).collect())
        .collect()
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spreadsheet(self, spreadsheet_id: &str, title: &str) -> Self {
        self.state.lock().unwrap().spreadsheets.insert(
            spreadsheet_id.to_owned(),
            FakeSpreadsheet {
                title: title.to_owned(),
                worksheets: Vec::new(),
            },
        );
        self
    }

    pub fn with_worksheet(
        self,
        spreadsheet_id: &str,
        title: &str,
        row_count: u32,
        col_count: u32,
        values: Values,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_sheet_id += 1;
            let sheet_id = state.next_sheet_id;
            let spreadsheet = state.spreadsheets.get_mut(spreadsheet_id).unwrap();
            spreadsheet.worksheets.push(FakeWorksheet {
                reference: WorksheetRef {
                    spreadsheet_id: spreadsheet_id.to_owned(),
                    sheet_id,
                    title: title.to_owned(),
                    row_count,
                    col_count,
                },
                values,
            });
        }
        self
    }

    /// Makes the next call of `operation` fail.
    pub fn fail_on(&self, operation: &'static str) {
        self.state.lock().unwrap().failures.push(operation);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn values(&self, spreadsheet_id: &str, title: &str) -> Values {
        let mut state = self.state.lock().unwrap();
        state
            .worksheet_mut(spreadsheet_id, title)
            .map(|worksheet| worksheet.values.clone())
            .unwrap_or_default()
    }

    pub fn worksheet(&self, spreadsheet_id: &str, title: &str) -> Option<WorksheetRef> {
        let mut state = self.state.lock().unwrap();
        state
            .worksheet_mut(spreadsheet_id, title)
            .ok()
            .map(|worksheet| worksheet.reference.clone())
    }
}

#[async_trait::async_trait]
impl TabularStore for InMemoryStore {
    async fn open_by_id(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("open_by_id {spreadsheet_id}"));
        state.check("open_by_id")?;

        let spreadsheet = state
            .spreadsheets
            .get(spreadsheet_id)
            .ok_or_else(|| StoreError::remote("open_by_id", "spreadsheet not found"))?;

        Ok(SpreadsheetInfo {
            spreadsheet_id: spreadsheet_id.to_owned(),
            title: spreadsheet.title.clone(),
            worksheets: spreadsheet
                .worksheets
                .iter()
                .map(|worksheet| worksheet.reference.clone())
                .collect(),
        })
    }

    async fn read_values(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        render: ValueRender,
    ) -> Result<Values, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("read_values {range} {render}"));
        state.check("read_values")?;

        Ok(state.worksheet_for_range(spreadsheet_id, range)?.values.clone())
    }

    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("update_range {range} rows={}", rows.len()));
        state.check("update_range")?;

        let start = range
            .local()
            .split(':')
            .next()
            .and_then(|cell| cell.parse::<CellPosition>().ok())
            .unwrap_or_else(CellPosition::origin);
        let worksheet = state.worksheet_for_range(spreadsheet_id, range)?;

        for (offset, row) in to_values(rows).into_iter().enumerate() {
            let row_index = start.row.index() as usize + offset;
            if worksheet.values.len() <= row_index {
                worksheet.values.resize(row_index + 1, Vec::new());
            }
            let target = &mut worksheet.values[row_index];
            let col_index = start.col.index() as usize;
            if target.len() < col_index + row.len() {
                target.resize(col_index + row.len(), Value::String(String::new()));
            }
            for (col_offset, value) in row.into_iter().enumerate() {
                target[col_index + col_offset] = value;
            }
        }

        let used_rows = worksheet.values.len() as u32;
        worksheet.reference.row_count = worksheet.reference.row_count.max(used_rows);
        Ok(())
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("append_rows {range} rows={}", rows.len()));
        state.check("append_rows")?;

        let worksheet = state.worksheet_for_range(spreadsheet_id, range)?;
        worksheet.values.extend(to_values(rows));
        worksheet.reference.row_count += rows.len() as u32;
        Ok(())
    }

    async fn resize(
        &self,
        worksheet: &WorksheetRef,
        row_count: u32,
        col_count: u32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!(
            "resize {} {}x{}",
            worksheet.title, row_count, col_count
        ));
        state.check("resize")?;

        let stored = state.worksheet_mut(&worksheet.spreadsheet_id, &worksheet.title)?;
        stored.values.truncate(row_count as usize);
        for row in stored.values.iter_mut() {
            row.truncate(col_count as usize);
        }
        stored.reference.row_count = row_count;
        stored.reference.col_count = col_count;
        Ok(())
    }

    async fn delete_rows(
        &self,
        worksheet: &WorksheetRef,
        start_index: u32,
        end_index: u32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!(
            "delete_rows {} {}..{}",
            worksheet.title, start_index, end_index
        ));
        state.check("delete_rows")?;

        let stored = state.worksheet_mut(&worksheet.spreadsheet_id, &worksheet.title)?;
        let len = stored.values.len();
        let start = (start_index as usize).min(len);
        let end = (end_index as usize).min(len);
        stored.values.drain(start..end);
        stored.reference.row_count -= end_index - start_index;
        Ok(())
    }

    async fn clear_ranges(
        &self,
        spreadsheet_id: &str,
        ranges: &[A1Notation],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let listed = ranges
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        state.calls.push(format!("clear_ranges {listed}"));
        state.check("clear_ranges")?;

        for range in ranges {
            state.worksheet_for_range(spreadsheet_id, range)?.values.clear();
        }
        Ok(())
    }

    async fn copy_range(
        &self,
        worksheet: &WorksheetRef,
        source: &CellRange,
        destination: &CellRange,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!(
            "copy_range {} {} -> {}",
            worksheet.title,
            source.to_a1_notation(None),
            destination.to_a1_notation(None)
        ));
        state.check("copy_range")
    }

    async fn create_worksheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        row_count: u32,
        col_count: u32,
    ) -> Result<WorksheetRef, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!(
            "create_worksheet {title} {row_count}x{col_count}"
        ));
        state.check("create_worksheet")?;

        state.next_sheet_id += 1;
        let reference = WorksheetRef {
            spreadsheet_id: spreadsheet_id.to_owned(),
            sheet_id: state.next_sheet_id,
            title: title.to_owned(),
            row_count,
            col_count,
        };
        let spreadsheet = state
            .spreadsheets
            .get_mut(spreadsheet_id)
            .ok_or_else(|| StoreError::remote("create_worksheet", "spreadsheet not found"))?;
        spreadsheet.worksheets.push(FakeWorksheet {
            reference: reference.clone(),
            values: Vec::new(),
        });
        Ok(reference)
    }
}
