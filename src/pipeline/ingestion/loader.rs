use crate::config::RunContext;
use crate::constants::{
    COL_EMAIL, COL_NAME, COL_PHONE, COL_PROFILE_URL, COL_SKILLSBOOST_EMAIL, COL_TERMS,
    REQUIRED_COLUMNS,
};
use crate::error::{QualifierError, Result};
use crate::observability::metrics;
use crate::types::RegistrationRecord;
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Input cells as they appeared in the file, echoed into the report untouched.
/// The named fields are lookups into `cells`, which holds every column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub row_number: usize,
    pub cells: Vec<String>,
    pub name: String,
    pub email: String,
    pub skillsboost_email: String,
    pub phone: String,
    pub profile_url: String,
    pub terms: String,
}

/// What the loader made of one input row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// All required fields present; terms may still be declined
    Valid(RegistrationRecord),
    /// One or more of name, email or phone is blank
    Incomplete { missing: Vec<&'static str> },
    /// Wrong column count or unreadable; excluded from status counts
    Malformed { reason: String },
}

/// A loaded export: cleaned header plus one entry per data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSheet {
    pub headers: Vec<String>,
    pub rows: Vec<LoadedRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRow {
    pub raw: RawRow,
    pub outcome: RowOutcome,
}

impl LoadedRow {
    pub fn record(&self) -> Option<&RegistrationRecord> {
        match &self.outcome {
            RowOutcome::Valid(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self.outcome, RowOutcome::Malformed { .. })
    }
}

/// Strip BOMs, non-breaking and zero-width spaces that spreadsheet exports leave in headers
pub fn clean_header(raw: &str) -> String {
    raw.replace(['\u{feff}', '\u{200b}'], "")
        .replace('\u{a0}', " ")
        .trim()
        .to_string()
}

/// Column name → index lookup built from a cleaned header row
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    columns: HashMap<String, usize>,
    width: usize,
}

impl HeaderIndex {
    pub fn new(headers: &StringRecord, required: &[&str]) -> Result<Self> {
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (clean_header(name), idx))
            .collect();
        if let Some(missing) = required.iter().find(|name| !columns.contains_key(**name)) {
            return Err(QualifierError::MissingColumn(missing.to_string()));
        }
        Ok(Self {
            columns,
            width: headers.len(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Cell value for `column`, empty when the column or cell is absent
    pub fn get(&self, record: &StringRecord, column: &str) -> String {
        self.columns
            .get(column)
            .and_then(|idx| record.get(*idx))
            .unwrap_or_default()
            .to_string()
    }
}

fn raw_row(index: &HeaderIndex, record: &StringRecord, row_number: usize) -> RawRow {
    RawRow {
        row_number,
        cells: record.iter().map(str::to_string).collect(),
        name: index.get(record, COL_NAME),
        email: index.get(record, COL_EMAIL),
        skillsboost_email: index.get(record, COL_SKILLSBOOST_EMAIL),
        phone: index.get(record, COL_PHONE),
        profile_url: index.get(record, COL_PROFILE_URL),
        terms: index.get(record, COL_TERMS),
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Check required fields and consent on one raw row
pub fn validate_row(raw: &RawRow, ctx: &RunContext) -> RowOutcome {
    let mut missing = Vec::new();
    if non_blank(&raw.name).is_none() {
        missing.push(COL_NAME);
    }
    if non_blank(&raw.email).is_none() {
        missing.push(COL_EMAIL);
    }
    if non_blank(&raw.phone).is_none() {
        missing.push(COL_PHONE);
    }
    if !missing.is_empty() {
        return RowOutcome::Incomplete { missing };
    }

    let phrase = ctx.acceptance_phrase.trim().to_lowercase();
    let terms_accepted = !phrase.is_empty() && raw.terms.to_lowercase().contains(&phrase);

    RowOutcome::Valid(RegistrationRecord {
        row_number: raw.row_number,
        name: raw.name.trim().to_string(),
        email: raw.email.trim().to_string(),
        skillsboost_email: raw.skillsboost_email.trim().to_string(),
        phone: raw.phone.trim().to_string(),
        profile_url: non_blank(&raw.profile_url),
        terms_accepted,
    })
}

/// Read registration rows from CSV. Rows come back in input order, one per
/// data line, including malformed ones. Extra columns are kept.
#[instrument(skip(reader, ctx))]
pub fn load_registrations<R: Read>(reader: R, ctx: &RunContext) -> Result<RegistrationSheet> {
    let mut csv_reader = ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let index = HeaderIndex::new(&headers, &REQUIRED_COLUMNS)?;

    let mut rows = Vec::new();
    for (offset, result) in csv_reader.records().enumerate() {
        let row_number = offset + 1;
        let loaded = match result {
            Ok(record) if record.len() != index.width() => {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                let reason = format!(
                    "Malformed row: expected {} columns, found {}",
                    index.width(),
                    record.len()
                );
                warn!(line, row_number, "{}", reason);
                LoadedRow {
                    raw: raw_row(&index, &record, row_number),
                    outcome: RowOutcome::Malformed { reason },
                }
            }
            Ok(record) => {
                let raw = raw_row(&index, &record, row_number);
                let outcome = validate_row(&raw, ctx);
                LoadedRow { raw, outcome }
            }
            Err(e) => {
                let reason = format!("Unreadable row: {}", e);
                warn!(row_number, "{}", reason);
                LoadedRow {
                    raw: RawRow {
                        row_number,
                        ..RawRow::default()
                    },
                    outcome: RowOutcome::Malformed { reason },
                }
            }
        };
        if loaded.is_malformed() {
            metrics::row_skipped();
        } else {
            metrics::row_loaded();
        }
        rows.push(loaded);
    }

    info!("Loaded {} rows", rows.len());
    Ok(RegistrationSheet {
        headers: headers.iter().map(clean_header).collect(),
        rows,
    })
}

pub fn load_registrations_from_path(path: &Path, ctx: &RunContext) -> Result<RegistrationSheet> {
    let file = File::open(path)?;
    load_registrations(file, ctx)
}
