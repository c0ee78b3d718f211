pub mod notifier;
pub mod record_export;
pub mod throttle;
pub mod workbook_service;

#[cfg(test)]
pub(crate) mod testing;
