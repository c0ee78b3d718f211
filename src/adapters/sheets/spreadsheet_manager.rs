use google_sheets4::{
    api::{
        AddSheetRequest, BatchClearValuesRequest, BatchUpdateSpreadsheetRequest,
        BatchUpdateSpreadsheetResponse, CopyPasteRequest, DeleteDimensionRequest, DimensionRange,
        GridProperties, GridRange, Request, SheetProperties, UpdateSheetPropertiesRequest,
        ValueRange,
    },
    FieldMask, Sheets,
};
use std::fmt::Debug;
use tracing::instrument;

use crate::domain::sheets::{a1_notation::A1Notation, cell_range::CellRange};
use crate::ports::tabular_store::{
    SpreadsheetInfo, StoreError, TabularStore, ValueRender, Values, WorksheetRef,
};

use super::{
    auth::GoogleCredentials,
    http_client::{HttpClient, HttpsConnector},
    value_range_factory::ValueRangeFactory,
};

/// [`TabularStore`] backed by the Google Sheets v4 API.
pub struct SpreadsheetManager {
    hub: Sheets<HttpsConnector>,
}

impl Debug for SpreadsheetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SpreadsheetManager")
    }
}

impl SpreadsheetManager {
    pub fn new(client: HttpClient, credentials: &GoogleCredentials) -> Self {
        SpreadsheetManager {
            hub: Sheets::new(client, credentials.authenticator()),
        }
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        operation: &'static str,
        request: Request,
    ) -> Result<BatchUpdateSpreadsheetResponse, StoreError> {
        let request = BatchUpdateSpreadsheetRequest {
            requests: Some(vec![request]),
            ..Default::default()
        };

        let (_, response) = self
            .hub
            .spreadsheets()
            .batch_update(request, spreadsheet_id)
            .doit()
            .await
            .map_err(|e| StoreError::remote(operation, e))?;

        Ok(response)
    }
}

fn worksheet_from_properties(
    spreadsheet_id: &str,
    properties: SheetProperties,
    operation: &'static str,
) -> Result<WorksheetRef, StoreError> {
    let grid = properties.grid_properties.unwrap_or_default();

    Ok(WorksheetRef {
        spreadsheet_id: spreadsheet_id.to_owned(),
        sheet_id: properties.sheet_id.ok_or(StoreError::MissingField {
            operation,
            field: "sheetId",
        })?,
        title: properties.title.ok_or(StoreError::MissingField {
            operation,
            field: "title",
        })?,
        row_count: grid.row_count.unwrap_or(0).max(0) as u32,
        col_count: grid.column_count.unwrap_or(0).max(0) as u32,
    })
}

fn grid_range(worksheet: &WorksheetRef, range: &CellRange) -> GridRange {
    GridRange {
        sheet_id: Some(worksheet.sheet_id),
        start_row_index: Some(range.start.row.index() as i32),
        end_row_index: Some(range.end.row.index() as i32 + 1),
        start_column_index: Some(range.start.col.index() as i32),
        end_column_index: Some(range.end.col.index() as i32 + 1),
    }
}

#[async_trait::async_trait]
impl TabularStore for SpreadsheetManager {
    #[instrument(skip(self))]
    async fn open_by_id(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, StoreError> {
        let (_, spreadsheet) = self
            .hub
            .spreadsheets()
            .get(spreadsheet_id)
            .doit()
            .await
            .map_err(|e| StoreError::remote("open_by_id", e))?;

        let title = spreadsheet
            .properties
            .and_then(|properties| properties.title)
            .ok_or(StoreError::MissingField {
                operation: "open_by_id",
                field: "properties.title",
            })?;

        let worksheets = spreadsheet
            .sheets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|sheet| sheet.properties)
            .map(|properties| worksheet_from_properties(spreadsheet_id, properties, "open_by_id"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SpreadsheetInfo {
            spreadsheet_id: spreadsheet_id.to_owned(),
            title,
            worksheets,
        })
    }

    #[instrument(skip(self))]
    async fn read_values(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        render: ValueRender,
    ) -> Result<Values, StoreError> {
        let (_, value_range) = self
            .hub
            .spreadsheets()
            .values_get(spreadsheet_id, range.as_ref())
            .value_render_option(render.as_ref())
            .doit()
            .await
            .map_err(|e| StoreError::remote("read_values", e))?;

        Ok(value_range.values.unwrap_or_default())
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError> {
        self.hub
            .spreadsheets()
            .values_update(ValueRange::from_rows(rows), spreadsheet_id, range.as_ref())
            .value_input_option("USER_ENTERED")
            .doit()
            .await
            .map_err(|e| StoreError::remote("update_range", e))?;

        Ok(())
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError> {
        self.hub
            .spreadsheets()
            .values_append(ValueRange::from_rows(rows), spreadsheet_id, range.as_ref())
            .value_input_option("USER_ENTERED")
            .insert_data_option("INSERT_ROWS")
            .doit()
            .await
            .map_err(|e| StoreError::remote("append_rows", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn resize(
        &self,
        worksheet: &WorksheetRef,
        row_count: u32,
        col_count: u32,
    ) -> Result<(), StoreError> {
        let request = Request {
            update_sheet_properties: Some(UpdateSheetPropertiesRequest {
                properties: Some(SheetProperties {
                    sheet_id: Some(worksheet.sheet_id),
                    grid_properties: Some(GridProperties {
                        row_count: Some(row_count as i32),
                        column_count: Some(col_count as i32),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                fields: Some(FieldMask::new(&[
                    "gridProperties.rowCount",
                    "gridProperties.columnCount",
                ])),
            }),
            ..Default::default()
        };

        self.batch_update(&worksheet.spreadsheet_id, "resize", request)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_rows(
        &self,
        worksheet: &WorksheetRef,
        start_index: u32,
        end_index: u32,
    ) -> Result<(), StoreError> {
        let request = Request {
            delete_dimension: Some(DeleteDimensionRequest {
                range: Some(DimensionRange {
                    sheet_id: Some(worksheet.sheet_id),
                    dimension: Some("ROWS".to_string()),
                    start_index: Some(start_index as i32),
                    end_index: Some(end_index as i32),
                }),
            }),
            ..Default::default()
        };

        self.batch_update(&worksheet.spreadsheet_id, "delete_rows", request)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_ranges(
        &self,
        spreadsheet_id: &str,
        ranges: &[A1Notation],
    ) -> Result<(), StoreError> {
        let request = BatchClearValuesRequest {
            ranges: Some(ranges.iter().map(ToString::to_string).collect()),
        };

        self.hub
            .spreadsheets()
            .values_batch_clear(request, spreadsheet_id)
            .doit()
            .await
            .map_err(|e| StoreError::remote("clear_ranges", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn copy_range(
        &self,
        worksheet: &WorksheetRef,
        source: &CellRange,
        destination: &CellRange,
    ) -> Result<(), StoreError> {
        let request = Request {
            copy_paste: Some(CopyPasteRequest {
                source: Some(grid_range(worksheet, source)),
                destination: Some(grid_range(worksheet, destination)),
                paste_type: Some("PASTE_NORMAL".to_string()),
                paste_orientation: Some("NORMAL".to_string()),
            }),
            ..Default::default()
        };

        self.batch_update(&worksheet.spreadsheet_id, "copy_range", request)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_worksheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        row_count: u32,
        col_count: u32,
    ) -> Result<WorksheetRef, StoreError> {
        let request = Request {
            add_sheet: Some(AddSheetRequest {
                properties: Some(SheetProperties {
                    title: Some(title.to_owned()),
                    grid_properties: Some(GridProperties {
                        row_count: Some(row_count as i32),
                        column_count: Some(col_count as i32),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        };

        let response = self
            .batch_update(spreadsheet_id, "create_worksheet", request)
            .await?;

        let properties = response
            .replies
            .unwrap_or_default()
            .into_iter()
            .find_map(|reply| reply.add_sheet.and_then(|added| added.properties))
            .ok_or(StoreError::MissingField {
                operation: "create_worksheet",
                field: "replies.addSheet.properties",
            })?;

        worksheet_from_properties(spreadsheet_id, properties, "create_worksheet")
    }
}
