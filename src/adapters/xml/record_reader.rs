//! Reads flat XML exports where every `<RECORD>` element is one row and its
//! child elements are the cells.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use thiserror::Error;
use tracing::instrument;

use crate::domain::table::{Cell, Table};

const RECORD: &[u8] = b"RECORD";

#[derive(Error, Debug)]
pub enum XmlReadError {
    #[error("Failed to read XML file '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed XML at byte {position}: {reason}")]
    Malformed { position: u64, reason: String },
}

struct OpenRecord {
    depth: usize,
    slot: usize,
    fields: Vec<(String, Cell)>,
}

struct OpenField {
    depth: usize,
    name: String,
    text: Option<String>,
}

/// Parses `xml` into a table. Columns are the union of child names in
/// first-seen order; empty children and absent children are `Null`. Cell
/// text is kept verbatim, surrounding whitespace included.
pub fn read_records(xml: &str) -> Result<Table, XmlReadError> {
    let mut reader = XmlReader::from_str(xml);

    let mut depth = 0usize;
    let mut slots: Vec<Vec<(String, Cell)>> = Vec::new();
    let mut records: Vec<OpenRecord> = Vec::new();
    let mut field: Option<OpenField> = None;

    loop {
        let event = reader.read_event().map_err(|e| XmlReadError::Malformed {
            position: reader.error_position() as u64,
            reason: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                if e.name().as_ref() == RECORD {
                    records.push(OpenRecord {
                        depth,
                        slot: slots.len(),
                        fields: Vec::new(),
                    });
                    slots.push(Vec::new());
                } else if field.is_none() && is_record_child(&records, depth) {
                    field = Some(OpenField {
                        depth,
                        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                        text: None,
                    });
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if e.name().as_ref() == RECORD {
                    slots.push(Vec::new());
                } else if field.is_none() && is_record_child(&records, depth) {
                    if let Some(record) = records.last_mut() {
                        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        record.fields.push((name, Cell::Null));
                    }
                }
            }
            Event::Text(e) => {
                if let Some(open) = field.as_mut().filter(|open| open.depth + 1 == depth) {
                    let text = e.unescape().map_err(|e| XmlReadError::Malformed {
                        position: reader.buffer_position() as u64,
                        reason: e.to_string(),
                    })?;
                    open.text.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(open) = field.as_mut().filter(|open| open.depth + 1 == depth) {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    open.text.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);

                if field.as_ref().is_some_and(|open| open.depth == depth) {
                    if let (Some(open), Some(record)) = (field.take(), records.last_mut()) {
                        let cell = match open.text {
                            Some(text) if !text.is_empty() => Cell::Text(text),
                            _ => Cell::Null,
                        };
                        record.fields.push((open.name, cell));
                    }
                } else if records.last().is_some_and(|record| record.depth == depth) {
                    if let Some(record) = records.pop() {
                        slots[record.slot] = record.fields;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Table::from_records(slots))
}

fn is_record_child(records: &[OpenRecord], depth: usize) -> bool {
    records
        .last()
        .is_some_and(|record| record.depth + 1 == depth)
}

#[instrument]
pub async fn read_file(path: &Path) -> Result<Table, XmlReadError> {
    let xml = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| XmlReadError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let table = read_records(&xml)?;
    tracing::debug!(
        rows = table.row_count(),
        columns = table.column_count(),
        "Read XML records"
    );
    Ok(table)
}
