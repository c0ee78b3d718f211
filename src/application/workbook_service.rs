//! Spreadsheet I/O on top of a [`TabularStore`]: reading tabs as tables,
//! writing normalized tables back, and the tab housekeeping around writes.
//!
//! Every remote call is preceded by the [`RequestThrottle`] pause, and every
//! failure is returned as an [`ExceptionChain`] carrying the parameters of the
//! operation that failed.

use serde_json::Value;
use tracing::instrument;

use crate::domain::error_chain::{ExceptionChain, LocalState, WrapErr};
use crate::domain::sheets::{
    a1_notation::{A1Notation, ToA1Notation},
    cell_position::CellPosition,
    cell_range::CellRange,
    column::Column as SheetColumn,
    row::Row,
};
use crate::domain::table::{
    normalize::{normalize, DatetimePrecision},
    Cell, Column, Table, TableError,
};
use crate::ports::tabular_store::{StoreError, TabularStore, ValueRender, WorksheetRef};

use super::throttle::RequestThrottle;

/// Size of a tab created on demand.
pub const NEW_TAB_ROWS: u32 = 100;
pub const NEW_TAB_COLS: u32 = 26;

/// Tab holding the users allowed to request updates.
pub const USERS_TAB: &str = "Users";

/// What to clear before a table is written over a tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ClearOption {
    /// Trim rows past the table and clear the data columns, keeping any
    /// formula columns to the right, which are then copied down.
    #[default]
    Columns,
    /// Shrink the tab to exactly the table.
    All,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub clear: ClearOption,
}

impl WriteOptions {
    pub fn clear(clear: ClearOption) -> Self {
        WriteOptions { clear }
    }
}

pub struct WorkbookService<S> {
    store: S,
    throttle: RequestThrottle,
    data_library_id: Option<String>,
}

impl<S: TabularStore> WorkbookService<S> {
    pub fn new(store: S, throttle: RequestThrottle) -> Self {
        WorkbookService {
            store,
            throttle,
            data_library_id: None,
        }
    }

    /// Spreadsheet whose `Users` tab authorizes update requests.
    pub fn with_data_library(mut self, spreadsheet_id: impl Into<String>) -> Self {
        self.data_library_id = Some(spreadsheet_id.into());
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self))]
    pub async fn get_spreadsheet_tab(
        &self,
        spreadsheet_id: &str,
        tab: &str,
    ) -> Result<WorksheetRef, ExceptionChain> {
        self.throttle.wait().await;
        self.store
            .get_worksheet(spreadsheet_id, tab)
            .await
            .wrap_err_with("get_spreadsheet_tab", || {
                LocalState::new()
                    .with("spreadsheet_id", spreadsheet_id)
                    .with("tab", tab)
            })
    }

    /// Reads a tab as records: the first row holds the headers.
    #[instrument(skip(self), fields(tab = %worksheet.title))]
    pub async fn get_data_from_tab(&self, worksheet: &WorksheetRef) -> Result<Table, ExceptionChain> {
        self.throttle.wait().await;
        let locals = || LocalState::new().with("worksheet", worksheet);

        let values = self
            .store
            .read_values(
                &worksheet.spreadsheet_id,
                &A1Notation::whole_sheet(&worksheet.title),
                ValueRender::FormattedValue,
            )
            .await
            .wrap_err_with("get_data_from_tab", locals)?;

        table_from_values(values).wrap_err_with("get_data_from_tab", locals)
    }

    pub async fn get_spreadsheet_tab_data(
        &self,
        spreadsheet_id: &str,
        tab: &str,
    ) -> Result<Table, ExceptionChain> {
        let worksheet = self.get_spreadsheet_tab(spreadsheet_id, tab).await?;
        self.get_data_from_tab(&worksheet).await
    }

    #[instrument(skip(self))]
    pub async fn get_workbook_title(&self, spreadsheet_id: &str) -> Result<String, ExceptionChain> {
        self.throttle.wait().await;
        let spreadsheet = self
            .store
            .open_by_id(spreadsheet_id)
            .await
            .wrap_err_with("get_workbook_title", || {
                LocalState::new().with("spreadsheet_id", spreadsheet_id)
            })?;
        Ok(spreadsheet.title)
    }

    #[instrument(skip(self))]
    pub async fn list_worksheets(
        &self,
        spreadsheet_id: &str,
    ) -> Result<Vec<WorksheetRef>, ExceptionChain> {
        self.throttle.wait().await;
        self.store
            .list_worksheets(spreadsheet_id)
            .await
            .wrap_err_with("list_worksheets", || {
                LocalState::new().with("spreadsheet_id", spreadsheet_id)
            })
    }

    /// Writes `message` into the single cell `range` of `tab`.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        spreadsheet_id: &str,
        tab: &str,
        range: &str,
        message: &str,
    ) -> Result<(), ExceptionChain> {
        let worksheet = self.get_spreadsheet_tab(spreadsheet_id, tab).await?;

        self.throttle.wait().await;
        self.store
            .update_range(
                spreadsheet_id,
                &A1Notation::in_sheet(&worksheet.title, range),
                &[vec![message.to_owned()]],
            )
            .await
            .wrap_err_with("update_status", || {
                LocalState::new()
                    .with("spreadsheet_id", spreadsheet_id)
                    .with("tab", tab)
                    .with("range", range)
                    .with("message", message)
            })
    }

    /// Replaces the contents of `tab` with `table`, creating the tab when it
    /// does not exist. Datetimes are written as dates.
    #[instrument(skip(self, table), fields(rows = table.row_count(), columns = table.column_count()))]
    pub async fn write_spreadsheet_tab(
        &self,
        spreadsheet_id: &str,
        tab: &str,
        table: &Table,
        options: WriteOptions,
    ) -> Result<(), ExceptionChain> {
        let locals = || {
            LocalState::new()
                .with("spreadsheet_id", spreadsheet_id)
                .with("tab", tab)
                .with("shape", &[table.row_count(), table.column_count()])
                .with("clear", &options.clear.to_string())
        };

        let normalized =
            normalize(table, DatetimePrecision::Date).wrap_err_with("write_spreadsheet_tab", locals)?;
        let mut worksheet = self.ensure_worksheet(spreadsheet_id, tab).await?;

        match options.clear {
            ClearOption::Columns => self.clear_columns(table, &mut worksheet).await?,
            ClearOption::All => self.clear_all(table, &mut worksheet).await?,
            ClearOption::None => {}
        }

        self.throttle.wait().await;
        let rows = normalized.to_values(true);
        self.store
            .update_range(
                spreadsheet_id,
                &CellPosition::origin().to_a1_notation(Some(&worksheet.title)),
                &rows,
            )
            .await
            .wrap_err_with("write_spreadsheet_tab", locals)?;
        worksheet.row_count = worksheet.row_count.max(rows.len() as u32);

        if options.clear == ClearOption::Columns {
            self.copy_formulas_down(table, &worksheet).await?;
        }

        tracing::info!(
            "Wrote {} rows to '{}' ({})",
            normalized.row_count(),
            worksheet.title,
            spreadsheet_id
        );
        Ok(())
    }

    /// Adds the rows of `table` after the last used row of `tab`; an empty
    /// tab gets the header row too. Datetimes keep their time of day.
    #[instrument(skip(self, table), fields(rows = table.row_count(), columns = table.column_count()))]
    pub async fn append_data_to_tab(
        &self,
        spreadsheet_id: &str,
        tab: &str,
        table: &Table,
    ) -> Result<(), ExceptionChain> {
        let locals = || {
            LocalState::new()
                .with("spreadsheet_id", spreadsheet_id)
                .with("tab", tab)
                .with("shape", &[table.row_count(), table.column_count()])
        };

        let normalized = normalize(table, DatetimePrecision::DateTime)
            .wrap_err_with("append_data_to_tab", locals)?;
        let worksheet = self.ensure_worksheet(spreadsheet_id, tab).await?;

        self.throttle.wait().await;
        let existing_rows = self
            .store
            .read_values(
                spreadsheet_id,
                &A1Notation::whole_sheet(&worksheet.title),
                ValueRender::FormattedValue,
            )
            .await
            .wrap_err_with("append_data_to_tab", locals)?
            .len();

        self.throttle.wait().await;
        if existing_rows == 0 {
            self.store
                .update_range(
                    spreadsheet_id,
                    &CellPosition::origin().to_a1_notation(Some(&worksheet.title)),
                    &normalized.to_values(true),
                )
                .await
                .wrap_err_with("append_data_to_tab", locals)
        } else {
            let after_last = CellPosition::new(
                SheetColumn::from_number(1),
                Row::from_row(existing_rows as u32 + 1),
            );
            self.store
                .append_rows(
                    spreadsheet_id,
                    &after_last.to_a1_notation(Some(&worksheet.title)),
                    &normalized.to_values(false),
                )
                .await
                .wrap_err_with("append_data_to_tab", || {
                    locals().with("existing_rows", &existing_rows)
                })
        }
    }

    /// Shrinks the tab to the table plus its header row.
    #[instrument(skip(self, table), fields(tab = %worksheet.title))]
    pub async fn clear_all(
        &self,
        table: &Table,
        worksheet: &mut WorksheetRef,
    ) -> Result<(), ExceptionChain> {
        let row_count = table.row_count() as u32 + 1;
        let col_count = (table.column_count() as u32).max(1);

        self.throttle.wait().await;
        self.store
            .resize(worksheet, row_count, col_count)
            .await
            .wrap_err_with("clear_all", || {
                LocalState::new()
                    .with("worksheet", &*worksheet)
                    .with("row_count", &row_count)
                    .with("col_count", &col_count)
            })?;

        worksheet.row_count = row_count;
        worksheet.col_count = col_count;
        Ok(())
    }

    /// Deletes the rows below the table and clears the cells the table is
    /// about to cover, leaving columns to its right untouched.
    #[instrument(skip(self, table), fields(tab = %worksheet.title))]
    pub async fn clear_columns(
        &self,
        table: &Table,
        worksheet: &mut WorksheetRef,
    ) -> Result<(), ExceptionChain> {
        let data_rows = table.row_count() as u32 + 1;
        let data_columns = (table.column_count() as u32).max(1);

        if worksheet.row_count > data_rows {
            self.throttle.wait().await;
            self.store
                .delete_rows(worksheet, data_rows, worksheet.row_count)
                .await
                .wrap_err_with("clear_columns", || {
                    LocalState::new()
                        .with("worksheet", &*worksheet)
                        .with("data_rows", &data_rows)
                })?;
            worksheet.row_count = data_rows;
        }

        let range = CellRange::new(
            CellPosition::origin(),
            CellPosition::from_numbers(worksheet.row_count.max(1), data_columns),
        )
        .to_a1_notation(Some(&worksheet.title));

        self.throttle.wait().await;
        self.store
            .clear_ranges(&worksheet.spreadsheet_id, std::slice::from_ref(&range))
            .await
            .wrap_err_with("clear_columns", || {
                LocalState::new()
                    .with("worksheet", &*worksheet)
                    .with("range", range.as_ref())
            })
    }

    /// Copies row 2 of the columns right of the table down to the last row,
    /// so formula columns keep up with the freshly written data.
    #[instrument(skip(self, table), fields(tab = %worksheet.title))]
    pub async fn copy_formulas_down(
        &self,
        table: &Table,
        worksheet: &WorksheetRef,
    ) -> Result<(), ExceptionChain> {
        let column_count = table.column_count() as u32;
        if worksheet.col_count <= column_count || worksheet.row_count < 3 {
            return Ok(());
        }

        let first = column_count + 1;
        let last = worksheet.col_count;
        let source = CellRange::new(
            CellPosition::from_numbers(2, first),
            CellPosition::from_numbers(2, last),
        );
        let destination = CellRange::new(
            CellPosition::from_numbers(3, first),
            CellPosition::from_numbers(worksheet.row_count, last),
        );

        self.throttle.wait().await;
        self.store
            .copy_range(worksheet, &source, &destination)
            .await
            .wrap_err_with("copy_formulas_down", || {
                LocalState::new()
                    .with("df_shape", &[table.row_count(), table.column_count()])
                    .with("sheet_col_count", &worksheet.col_count)
                    .with("source_range", source.to_a1_notation(None).as_ref())
                    .with("dest_range", destination.to_a1_notation(None).as_ref())
            })
    }

    /// First row of the given block, rendered as formulas. Columns and rows
    /// are 1-based.
    #[instrument(skip(self), fields(tab = %worksheet.title))]
    pub async fn get_formulas_from_range(
        &self,
        worksheet: &WorksheetRef,
        start_col: u32,
        row1: u32,
        end_col: u32,
        row2: u32,
    ) -> Result<Vec<Value>, ExceptionChain> {
        let range = CellRange::new(
            CellPosition::from_numbers(row1, start_col),
            CellPosition::from_numbers(row2, end_col),
        )
        .to_a1_notation(Some(&worksheet.title));

        self.throttle.wait().await;
        let values = self
            .store
            .read_values(&worksheet.spreadsheet_id, &range, ValueRender::Formula)
            .await
            .wrap_err_with("get_formulas_from_range", || {
                LocalState::new()
                    .with("worksheet", worksheet)
                    .with("range", range.as_ref())
            })?;

        Ok(values.into_iter().next().unwrap_or_default())
    }

    /// True when `workbook` names a user listed in the data library `Users`
    /// tab with `allow_update` set to `TRUE`.
    #[instrument(skip(self, workbook))]
    pub async fn authorize_request(&self, workbook: &Value) -> Result<bool, ExceptionChain> {
        let Some(user) = workbook.get("user") else {
            tracing::warn!("No user in workbook: {}", workbook);
            return Ok(false);
        };

        let library_id = self.data_library_id.as_deref().ok_or_else(|| {
            ExceptionChain::wrap(
                "no data library spreadsheet is configured",
                "authorize_request",
                LocalState::new().with("workbook", workbook),
            )
        })?;

        let users = self.get_spreadsheet_tab_data(library_id, USERS_TAB).await?;
        let user = value_text(user);

        for index in 0..users.row_count() {
            let cell_at = |name: &str| {
                users
                    .column(name)
                    .and_then(|column| column.cells().get(index))
                    .and_then(cell_text)
            };
            let listed = cell_at("user");
            let allow_update = cell_at("allow_update");
            tracing::debug!("{}, {:?}, {:?}", user, listed, allow_update);

            if listed.as_deref() == Some(user.as_str()) && allow_update.as_deref() == Some("TRUE") {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The tab named `tab`, created with the default size when missing.
    #[instrument(skip(self))]
    pub async fn ensure_worksheet(
        &self,
        spreadsheet_id: &str,
        tab: &str,
    ) -> Result<WorksheetRef, ExceptionChain> {
        self.throttle.wait().await;
        match self.store.get_worksheet(spreadsheet_id, tab).await {
            Ok(worksheet) => Ok(worksheet),
            Err(StoreError::WorksheetNotFound { .. }) => {
                tracing::info!("Creating tab '{}' in {}", tab, spreadsheet_id);
                self.throttle.wait().await;
                self.store
                    .create_worksheet(spreadsheet_id, tab, NEW_TAB_ROWS, NEW_TAB_COLS)
                    .await
                    .wrap_err_with("ensure_worksheet", || {
                        LocalState::new()
                            .with("spreadsheet_id", spreadsheet_id)
                            .with("tab", tab)
                            .with("created", &true)
                    })
            }
            Err(error) => Err(ExceptionChain::wrap(
                error,
                "ensure_worksheet",
                LocalState::new()
                    .with("spreadsheet_id", spreadsheet_id)
                    .with("tab", tab),
            )),
        }
    }
}

/// Turns raw tab values into a table: the first row names the columns, short
/// rows are padded with empty text and numeric text becomes numbers.
pub fn table_from_values(values: Vec<Vec<Value>>) -> Result<Table, TableError> {
    let mut rows = values.into_iter();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let rows: Vec<Vec<Value>> = rows.collect();

    let columns = header
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let cells = rows
                .iter()
                .map(|row| row.get(index).cloned().map_or(Cell::Text(String::new()), numericise))
                .collect();
            Column::new(value_text(name), cells)
        })
        .collect();

    Table::new(columns)
}

fn numericise(value: Value) -> Cell {
    match value {
        Value::String(text) => {
            if let Ok(int) = text.parse::<i64>() {
                Cell::Int(int)
            } else if let Some(float) = text.parse::<f64>().ok().filter(|float| float.is_finite()) {
                Cell::Float(float)
            } else {
                Cell::Text(text)
            }
        }
        Value::Null => Cell::Text(String::new()),
        other => other.into(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// A cell as the spreadsheet would display it.
fn cell_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Text(text) => Some(text.clone()),
        Cell::Int(value) => Some(value.to_string()),
        Cell::Float(value) if !value.is_nan() => Some(value.to_string()),
        Cell::Bool(true) => Some("TRUE".to_owned()),
        Cell::Bool(false) => Some("FALSE".to_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::InMemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn strings(rows: &[&[&str]]) -> Vec<Vec<Value>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| json!(cell)).collect())
            .collect()
    }

    fn people() -> Table {
        Table::new(vec![
            Column::new("id", vec![Cell::Int(1), Cell::Int(2)]),
            Column::new("name", vec![Cell::from("ada\nlovelace"), Cell::Null]),
            Column::new("score", vec![Cell::Float(1.5), Cell::Float(f64::NAN)]),
        ])
        .unwrap()
    }

    fn service(store: InMemoryStore) -> WorkbookService<InMemoryStore> {
        WorkbookService::new(store, RequestThrottle::disabled())
    }

    #[test]
    fn test_table_from_values() {
        let table = table_from_values(strings(&[
            &["user", "allow_update", "score"],
            &["ada", "TRUE", "12"],
            &["bob", "FALSE"],
        ]))
        .unwrap();

        assert_eq!(table.headers(), vec!["user", "allow_update", "score"]);
        assert_eq!(
            table.column("score").unwrap().cells(),
            &[Cell::Int(12), Cell::from("")]
        );
        assert_eq!(
            table.column("allow_update").unwrap().cells(),
            &[Cell::from("TRUE"), Cell::from("FALSE")]
        );
        assert!(table_from_values(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_table_from_values_numeric_text() {
        let table = table_from_values(strings(&[&["a"], &["2.5"], &["nan"], &["x"]])).unwrap();
        assert_eq!(
            table.column("a").unwrap().cells(),
            &[Cell::Float(2.5), Cell::from("nan"), Cell::from("x")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_before_each_remote_call() {
        let store = InMemoryStore::new().with_spreadsheet("ssid", "Roster");
        let service = WorkbookService::new(store, RequestThrottle::new(Duration::from_secs(1)));
        let start = tokio::time::Instant::now();

        assert_eq!(service.get_workbook_title("ssid").await.unwrap(), "Roster");
        service.list_worksheets("ssid").await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_waits_before_every_store_call() {
        let store = InMemoryStore::new()
            .with_spreadsheet("ssid", "Roster")
            .with_worksheet("ssid", "Log", 100, 26, strings(&[&["id"], &["0"]]));
        let service = WorkbookService::new(store, RequestThrottle::new(Duration::from_secs(1)));
        let table = Table::new(vec![Column::new("id", vec![Cell::Int(7)])]).unwrap();
        let start = tokio::time::Instant::now();

        service.append_data_to_tab("ssid", "Log", &table).await.unwrap();

        let calls = service.store().calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[2].starts_with("append_rows"));
        assert!(start.elapsed() >= Duration::from_secs(calls.len() as u64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_waits_before_every_store_call() {
        let store = InMemoryStore::new()
            .with_spreadsheet("ssid", "Roster")
            .with_worksheet("ssid", "People", 50, 26, Vec::new());
        let service = WorkbookService::new(store, RequestThrottle::new(Duration::from_secs(1)));
        let start = tokio::time::Instant::now();

        service
            .write_spreadsheet_tab("ssid", "People", &people(), WriteOptions::default())
            .await
            .unwrap();

        let calls = service.store().calls();
        assert!(calls.iter().any(|call| call.starts_with("copy_range")));
        assert!(start.elapsed() >= Duration::from_secs(calls.len() as u64));
    }

    #[tokio::test]
    async fn test_write_creates_missing_tab_and_normalizes() {
        let store = InMemoryStore::new().with_spreadsheet("ssid", "Roster");
        let service = service(store);

        service
            .write_spreadsheet_tab("ssid", "People", &people(), WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(
            service.store().values("ssid", "People"),
            strings(&[
                &["id", "name", "score"],
                &["1", "adalovelace", "1.5"],
                &["2", "", "0"],
            ])
        );
        let calls = service.store().calls();
        assert!(calls.contains(&"create_worksheet People 100x26".to_owned()));
        assert!(calls.contains(&"delete_rows People 3..100".to_owned()));
        assert!(calls.contains(&"clear_ranges 'People'!A1:C3".to_owned()));
        assert!(calls.contains(&"update_range 'People'!A1 rows=3".to_owned()));
        assert!(calls.contains(&"copy_range People D2:Z2 -> D3:Z3".to_owned()));
    }

    #[tokio::test]
    async fn test_write_with_clear_all_resizes() {
        let store = InMemoryStore::new()
            .with_spreadsheet("ssid", "Roster")
            .with_worksheet("ssid", "People", 50, 10, strings(&[&["old"], &["x"]]));
        let service = service(store);

        service
            .write_spreadsheet_tab("ssid", "People", &people(), WriteOptions::clear(ClearOption::All))
            .await
            .unwrap();

        let calls = service.store().calls();
        assert!(calls.contains(&"resize People 3x3".to_owned()));
        assert!(!calls.iter().any(|call| call.starts_with("copy_range")));
        let worksheet = service.store().worksheet("ssid", "People").unwrap();
        assert_eq!((worksheet.row_count, worksheet.col_count), (3, 3));
    }

    #[tokio::test]
    async fn test_write_without_clearing() {
        let store = InMemoryStore::new()
            .with_spreadsheet("ssid", "Roster")
            .with_worksheet("ssid", "People", 50, 3, Vec::new());
        let service = service(store);

        service
            .write_spreadsheet_tab("ssid", "People", &people(), WriteOptions::clear(ClearOption::None))
            .await
            .unwrap();

        let calls = service.store().calls();
        assert!(!calls.iter().any(|call| call.starts_with("clear_ranges")
            || call.starts_with("resize")
            || call.starts_with("delete_rows")));
    }

    #[tokio::test]
    async fn test_append_to_empty_tab_writes_headers() {
        let store = InMemoryStore::new()
            .with_spreadsheet("ssid", "Roster")
            .with_worksheet("ssid", "Log", 100, 26, Vec::new());
        let service = service(store);

        service
            .append_data_to_tab("ssid", "Log", &people())
            .await
            .unwrap();

        assert_eq!(service.store().values("ssid", "Log").len(), 3);
        assert!(service
            .store()
            .calls()
            .contains(&"update_range 'Log'!A1 rows=3".to_owned()));
    }

    #[tokio::test]
    async fn test_append_after_existing_rows() {
        let store = InMemoryStore::new()
            .with_spreadsheet("ssid", "Roster")
            .with_worksheet(
                "ssid",
                "Log",
                100,
                26,
                strings(&[&["id", "name", "score"], &["0", "eve", "3.0"]]),
            );
        let service = service(store);

        service
            .append_data_to_tab("ssid", "Log", &people())
            .await
            .unwrap();

        let values = service.store().values("ssid", "Log");
        assert_eq!(values.len(), 4);
        assert_eq!(values[2], strings(&[&["1", "adalovelace", "1.5"]])[0]);
        assert!(service
            .store()
            .calls()
            .contains(&"append_rows 'Log'!A3 rows=2".to_owned()));
    }

    #[tokio::test]
    async fn test_append_formats_datetimes_with_time() {
        let at = chrono::NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 0)
            .unwrap();
        let table = Table::new(vec![Column::new("at", vec![Cell::DateTime(at)])]).unwrap();
        let store = InMemoryStore::new()
            .with_spreadsheet("ssid", "Roster")
            .with_worksheet("ssid", "Log", 100, 26, Vec::new());
        let service = service(store);

        service.append_data_to_tab("ssid", "Log", &table).await.unwrap();

        assert_eq!(
            service.store().values("ssid", "Log"),
            strings(&[&["at"], &["2024-03-05 14:07"]])
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_wrapped_with_parameters() {
        let store = InMemoryStore::new()
            .with_spreadsheet("ssid", "Roster")
            .with_worksheet("ssid", "People", 100, 26, Vec::new());
        store.fail_on("update_range");
        let service = service(store);

        let chain = service
            .update_status("ssid", "People", "B2", "Done")
            .await
            .unwrap_err();

        assert_eq!(chain.call_stack().len(), 1);
        assert_eq!(chain.origin().function, "update_status");
        assert_eq!(chain.local_state().get("range"), Some(&json!("B2")));
        assert_eq!(chain.local_state().get("message"), Some(&json!("Done")));
        assert!(chain.to_string().contains("backend unavailable"));
    }

    #[tokio::test]
    async fn test_missing_tab_is_reported() {
        let store = InMemoryStore::new().with_spreadsheet("ssid", "Roster");
        let service = service(store);

        let chain = service
            .get_spreadsheet_tab("ssid", "Nope")
            .await
            .unwrap_err();

        assert!(chain
            .original_error()
            .downcast_ref::<StoreError>()
            .is_some_and(|error| matches!(error, StoreError::WorksheetNotFound { .. })));
        assert_eq!(chain.local_state().get("tab"), Some(&json!("Nope")));
    }

    #[tokio::test]
    async fn test_update_status_writes_single_cell() {
        let store = InMemoryStore::new()
            .with_spreadsheet("ssid", "Roster")
            .with_worksheet("ssid", "Status", 10, 5, Vec::new());
        let service = service(store);

        service
            .update_status("ssid", "Status", "B2", "Running")
            .await
            .unwrap();

        let values = service.store().values("ssid", "Status");
        assert_eq!(values[1], vec![json!(""), json!("Running")]);
    }

    #[tokio::test]
    async fn test_formulas_use_the_worksheet_title() {
        let store = InMemoryStore::new()
            .with_spreadsheet("ssid", "Roster")
            .with_worksheet(
                "ssid",
                "Scores",
                10,
                5,
                strings(&[&["=A1+1", "=B1*2"], &["=A2+1", "=B2*2"]]),
            );
        let service = service(store);
        let worksheet = service.get_spreadsheet_tab("ssid", "Scores").await.unwrap();

        let formulas = service
            .get_formulas_from_range(&worksheet, 4, 2, 5, 9)
            .await
            .unwrap();

        assert_eq!(formulas, vec![json!("=A1+1"), json!("=B1*2")]);
        assert!(service
            .store()
            .calls()
            .contains(&"read_values 'Scores'!D2:E9 FORMULA".to_owned()));
    }

    #[tokio::test]
    async fn test_authorize_request() {
        let store = InMemoryStore::new()
            .with_spreadsheet("library", "Data library")
            .with_worksheet(
                "library",
                USERS_TAB,
                10,
                2,
                strings(&[
                    &["user", "allow_update"],
                    &["ada", "TRUE"],
                    &["bob", "FALSE"],
                ]),
            );
        let service = service(store).with_data_library("library");

        assert!(service.authorize_request(&json!({"user": "ada"})).await.unwrap());
        assert!(!service.authorize_request(&json!({"user": "bob"})).await.unwrap());
        assert!(!service.authorize_request(&json!({"user": "eve"})).await.unwrap());
        assert!(!service.authorize_request(&json!({"title": "x"})).await.unwrap());
    }

    #[tokio::test]
    async fn test_authorize_without_library_fails() {
        let service = service(InMemoryStore::new());
        let chain = service
            .authorize_request(&json!({"user": "ada"}))
            .await
            .unwrap_err();
        assert_eq!(chain.origin().function, "authorize_request");
    }

    #[test]
    fn test_clear_option_names() {
        assert_eq!(ClearOption::default(), ClearOption::Columns);
        assert_eq!("all".parse::<ClearOption>().unwrap(), ClearOption::All);
        assert_eq!(ClearOption::None.to_string(), "none");
    }
}
