use std::sync::Arc;

use error_stack::report;
use thiserror::Error;
use tracing::{error, info, instrument, Instrument};

use crate::application::record_export::RecordExportRoutine;
use crate::application::workbook_service::WorkbookService;
use crate::config::RecordExportConfig;
use crate::domain::error_chain::ExceptionChain;
use crate::ports::routine::Routine;
use crate::ports::tabular_store::TabularStore;

pub const USAGE: &str = "\
Usage: sheets-relay <command>

Commands:
  export                               Run the configured XML record exports
  title <spreadsheet_id>               Print the title of a spreadsheet
  tabs <spreadsheet_id>                List the tabs of a spreadsheet
  status <spreadsheet_id> <tab> <range> <message>
                                       Write a status message into one cell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Export,
    Title {
        spreadsheet_id: String,
    },
    Tabs {
        spreadsheet_id: String,
    },
    Status {
        spreadsheet_id: String,
        tab: String,
        range: String,
        message: String,
    },
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid command: {details}")]
    InvalidCommand { details: String },
    #[error("Setup failed")]
    Setup,
    #[error("Command execution failed: {details}")]
    ExecutionFailed { details: String },
}

/// Parses the process arguments, program name included.
pub fn parse_args(args: &[String]) -> Result<Command, CommandError> {
    let arg = |index: usize, name: &str| {
        args.get(index)
            .cloned()
            .ok_or_else(|| CommandError::InvalidCommand {
                details: format!("{} required\n\n{}", name, USAGE),
            })
    };

    match args.get(1).map(|s| s.as_str()) {
        Some("export") => Ok(Command::Export),
        Some("title") => Ok(Command::Title {
            spreadsheet_id: arg(2, "Spreadsheet id")?,
        }),
        Some("tabs") => Ok(Command::Tabs {
            spreadsheet_id: arg(2, "Spreadsheet id")?,
        }),
        Some("status") => {
            let message = args.get(5..).unwrap_or_default().join(" ");
            if args.len() > 4 && message.is_empty() {
                return Err(CommandError::InvalidCommand {
                    details: format!("Message required\n\n{}", USAGE),
                });
            }
            Ok(Command::Status {
                spreadsheet_id: arg(2, "Spreadsheet id")?,
                tab: arg(3, "Tab name")?,
                range: arg(4, "Range")?,
                message,
            })
        }
        Some(other) => Err(CommandError::InvalidCommand {
            details: format!("Unknown command '{}'\n\n{}", other, USAGE),
        }),
        None => Err(CommandError::InvalidCommand {
            details: USAGE.to_string(),
        }),
    }
}

fn execution_failed(chain: ExceptionChain, details: String) -> error_stack::Report<CommandError> {
    report!(chain).change_context(CommandError::ExecutionFailed { details })
}

/// Runs `command` and returns the text to show the user. A failure caused by
/// a remote call keeps its [`ExceptionChain`] inside the report.
#[instrument(skip(service, exports))]
pub async fn execute<S: TabularStore + 'static>(
    command: Command,
    service: &Arc<WorkbookService<S>>,
    exports: &[RecordExportConfig],
) -> error_stack::Result<String, CommandError> {
    match command {
        Command::Export => {
            let routines: Vec<Box<dyn Routine>> = exports
                .iter()
                .map(|config| {
                    Box::new(RecordExportRoutine::new(config.clone(), Arc::clone(service)))
                        as Box<dyn Routine>
                })
                .collect();

            if routines.is_empty() {
                return Ok("No exports configured".to_string());
            }

            let mut output = "\nRoutine Results:\n".to_string();
            let mut failures = Vec::new();
            for (index, routine) in routines.iter().enumerate() {
                let result = routine
                    .run()
                    .instrument(tracing::span!(
                        tracing::Level::INFO,
                        "routine",
                        routine = routine.name(),
                        index = index,
                        len = routines.len()
                    ))
                    .await;

                match result {
                    Ok(()) => {
                        info!("✅ {}: OK", routine.name());
                        output.push_str(&format!("✅ {}: OK\n", routine.name()));
                    }
                    Err(report) => {
                        error!("❌ {}: {:?}", routine.name(), report);
                        failures.push(report);
                    }
                }
            }

            let failed = failures.len();
            match failures.into_iter().next() {
                Some(first) => Err(first.change_context(CommandError::ExecutionFailed {
                    details: format!("{} of {} exports failed", failed, routines.len()),
                })),
                None => Ok(output),
            }
        }
        Command::Title { spreadsheet_id } => service
            .get_workbook_title(&spreadsheet_id)
            .await
            .map_err(|chain| execution_failed(chain, format!("title of {}", spreadsheet_id))),
        Command::Tabs { spreadsheet_id } => {
            let worksheets = service
                .list_worksheets(&spreadsheet_id)
                .await
                .map_err(|chain| execution_failed(chain, format!("tabs of {}", spreadsheet_id)))?;

            Ok(worksheets
                .iter()
                .map(|worksheet| {
                    format!(
                        "{} ({} x {})",
                        worksheet.title, worksheet.row_count, worksheet.col_count
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Command::Status {
            spreadsheet_id,
            tab,
            range,
            message,
        } => {
            service
                .update_status(&spreadsheet_id, &tab, &range, &message)
                .await
                .map_err(|chain| execution_failed(chain, format!("status of {}", tab)))?;
            Ok(format!("Status written to '{}'!{}", tab, range))
        }
    }
}
