// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Quote-tolerant CSV loading into [`ContractorRecord`]s.
//!
//! The kiosk writes its CSV by hand and operators sometimes edit it in a
//! spreadsheet, so the reader accepts both `"double"` and `'single'` quoted
//! fields, a configurable delimiter, and either a header row (matched against
//! a synonym table) or fixed positional columns.
//!
//! Loading is soft: a missing or empty file yields no records, unmappable rows
//! are counted and skipped, and only genuine I/O failures surface as errors.
//!
//! # Example
//!
//! ```
//! use lead_sync::storage::csv::{parse_str, split_line};
//!
//! assert_eq!(split_line(r#"a,"b,c",'d'"#, ','), vec!["a", "b,c", "d"]);
//!
//! let load = parse_str("Phone,Name\n0501,Ada\n", true, ',');
//! assert_eq!(load.records.len(), 1);
//! assert_eq!(load.records[0].mobile_number, "0501");
//! assert_eq!(load.records[0].name, "Ada");
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::record::ContractorRecord;
use super::traits::{CsvLoad, StoreError};

/// Load records from `path`.
///
/// Returns an empty [`CsvLoad`] when the file does not exist or holds no
/// lines. Read failures on an existing file are returned as [`StoreError`].
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load(path: impl AsRef<Path>, has_header: bool, delimiter: char) -> Result<CsvLoad, StoreError> {
    let path = path.as_ref();
    check_delimiter(delimiter)?;

    if !path.exists() {
        warn!("CSV file not found");
        return Ok(CsvLoad::empty());
    }

    let content = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    let load = parse_str(&content, has_header, delimiter);
    info!(
        records = load.records.len(),
        failed_rows = load.failed_rows,
        "Loaded records from CSV"
    );
    Ok(load)
}

fn check_delimiter(delimiter: char) -> Result<(), StoreError> {
    if delimiter == '"' || delimiter == '\'' {
        return Err(StoreError::InvalidDelimiter(delimiter));
    }
    Ok(())
}

/// Parse CSV text. Pure and deterministic: the same input always yields the
/// same ordered records. A leading UTF-8 byte-order mark is ignored.
#[must_use]
pub fn parse_str(content: &str, has_header: bool, delimiter: char) -> CsvLoad {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split(['\r', '\n']).filter(|l| !l.is_empty());

    let headers: Option<Vec<Option<usize>>> = if has_header {
        match lines.next() {
            Some(header_line) => Some(resolve_headers(&split_line(header_line, delimiter))),
            None => return CsvLoad::empty(),
        }
    } else {
        None
    };

    let mut load = CsvLoad::empty();
    for (index, raw) in lines.enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let values = split_line(line, delimiter);
        match map_row(&values, headers.as_deref()) {
            Some(record) => load.records.push(record),
            None => {
                load.failed_rows += 1;
                debug!(row = index, "Dropped unmappable CSV row");
            }
        }
    }

    if load.failed_rows > 0 {
        warn!(failed_rows = load.failed_rows, "Some CSV rows could not be mapped");
    }
    load
}

/// Split one line into cleaned field values.
///
/// Double and single quote runs are tracked independently; the delimiter only
/// separates fields outside both. A doubled quote inside a run of the same
/// kind is one literal quote character.
#[must_use]
pub fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_double = false;
    let mut in_single = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        if c == '"' && in_double && next == Some('"') {
            current.push('"');
            chars.next();
        } else if c == '\'' && in_single && next == Some('\'') {
            current.push('\'');
            chars.next();
        } else if c == '"' && !in_single {
            in_double = !in_double;
            current.push(c);
        } else if c == '\'' && !in_double {
            in_single = !in_single;
            current.push(c);
        } else if c == delimiter && !in_double && !in_single {
            values.push(clean_value(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    values.push(clean_value(&current));
    values
}

/// Trim and strip one layer of matching surrounding quotes.
fn clean_value(raw: &str) -> String {
    let value = raw.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 {
            if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
                return inner.to_string();
            }
        }
    }
    value.to_string()
}

/// Map a header cell onto its canonical field position.
#[must_use]
pub fn resolve_header(header: &str) -> Option<usize> {
    let position = match header.trim().to_lowercase().as_str() {
        "name" => 0,
        "mobile_number" | "mobile number" | "phone" => 1,
        "email" => 2,
        "company_name" | "company name" | "company" => 3,
        "head_office_location" | "head office location" | "office location" => 4,
        "project_name" | "project name" | "project" => 5,
        "project_location" | "project location" => 6,
        "account_type" | "account type" | "type" => 7,
        "signature" => 8,
        "application_type" | "application type" => 9,
        "sales_comment" | "sales comment" | "comment" => 10,
        _ => return None,
    };
    Some(position)
}

fn resolve_headers(headers: &[String]) -> Vec<Option<usize>> {
    let mut unknown = BTreeSet::new();
    let resolved = headers
        .iter()
        .map(|h| {
            let position = resolve_header(h);
            if position.is_none() {
                unknown.insert(h.trim().to_lowercase());
            }
            position
        })
        .collect();
    for header in unknown {
        warn!(header = %header, "Unrecognized CSV header ignored");
    }
    resolved
}

/// Build a record from one row. `None` when the row carries no mapped data.
fn map_row(values: &[String], headers: Option<&[Option<usize>]>) -> Option<ContractorRecord> {
    let mut record = ContractorRecord::default();
    match headers {
        Some(headers) => {
            for (value, position) in values.iter().zip(headers) {
                if let Some(slot) = position.and_then(|p| record.field_mut(p)) {
                    slot.clone_from(value);
                }
            }
        }
        None => {
            for (position, value) in values.iter().enumerate() {
                if let Some(slot) = record.field_mut(position) {
                    slot.clone_from(value);
                }
            }
        }
    }

    if record.is_blank() {
        return None;
    }
    Some(record)
}

/// Records whose account type equals `account_type`, ignoring case.
#[must_use]
pub fn filter_by_account_type(records: &[ContractorRecord], account_type: &str) -> Vec<ContractorRecord> {
    let wanted = account_type.to_lowercase();
    records
        .iter()
        .filter(|r| r.account_type.to_lowercase() == wanted)
        .cloned()
        .collect()
}

/// Records whose head office or project location contains `location`.
#[must_use]
pub fn filter_by_location(records: &[ContractorRecord], location: &str) -> Vec<ContractorRecord> {
    records
        .iter()
        .filter(|r| r.head_office_location.contains(location) || r.project_location.contains(location))
        .cloned()
        .collect()
}

/// One column projected across all records; empty for unknown column names.
#[must_use]
pub fn column(records: &[ContractorRecord], name: &str) -> Vec<String> {
    match resolve_header(name) {
        Some(position) => records.iter().map(|r| r.fields()[position].to_string()).collect(),
        None => Vec::new(),
    }
}
