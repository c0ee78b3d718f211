use std::sync::Arc;

use error_stack::{report, ResultExt};
use tracing::instrument;

use crate::adapters::xml::record_reader;
use crate::config::RecordExportConfig;
use crate::domain::table::{Table, TableError};
use crate::ports::routine::{Routine, RoutineError};
use crate::ports::tabular_store::TabularStore;

use super::workbook_service::{ClearOption, WorkbookService, WriteOptions};

/// Uploads a set of XML record exports to one spreadsheet tab.
pub struct RecordExportRoutine<S> {
    config: RecordExportConfig,
    service: Arc<WorkbookService<S>>,
}

impl<S: TabularStore> RecordExportRoutine<S> {
    pub fn new(config: RecordExportConfig, service: Arc<WorkbookService<S>>) -> Self {
        RecordExportRoutine { config, service }
    }
}

/// Stacks the exports, drops rows whose `key_column` is missing or holds one
/// of `excluded_values`, and keeps `columns` in order.
pub fn prepare(
    tables: Vec<Table>,
    columns: &[String],
    key_column: &str,
    excluded_values: &[String],
) -> Result<Table, TableError> {
    let combined = Table::concat(tables);
    if combined.column(key_column).is_none() {
        return Err(TableError::UnknownColumn(key_column.to_owned()));
    }

    combined
        .filter_rows(|row| match row.get(key_column) {
            Some(cell) if !cell.is_null() => cell
                .as_text()
                .map_or(true, |text| !excluded_values.iter().any(|excluded| excluded == text)),
            _ => false,
        })
        .select(columns)
}

#[async_trait::async_trait]
impl<S: TabularStore> Routine for RecordExportRoutine<S> {
    fn name(&self) -> &str {
        &self.config.name
    }

    #[instrument(skip(self), fields(routine = %self.config.name))]
    async fn run(&self) -> error_stack::Result<(), RoutineError> {
        let mut tables = Vec::with_capacity(self.config.sources.len());
        for source in &self.config.sources {
            let table = record_reader::read_file(source)
                .await
                .change_context_lazy(|| RoutineError::load_failed(&self.config.name))?;
            tracing::info!("Loaded {} records from {}", table.row_count(), source.display());
            tables.push(table);
        }

        let table = prepare(
            tables,
            &self.config.columns,
            &self.config.key_column,
            &self.config.excluded_values,
        )
        .change_context_lazy(|| RoutineError::shape_failed(&self.config.name))?;

        self.service
            .write_spreadsheet_tab(
                &self.config.spreadsheet_id,
                &self.config.tab,
                &table,
                WriteOptions::clear(ClearOption::All),
            )
            .await
            .map_err(|chain| {
                report!(chain).change_context(RoutineError::write_failed(&self.config.name))
            })?;

        Ok(())
    }
}
