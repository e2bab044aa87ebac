// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Append-only producer of the pending CSV.
//!
//! Each completed registration becomes one escaped row. The file is created
//! with a header on first use and recreated after the sync pipeline moves the
//! processed file away (see [`FileResetHook`]).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::record::ContractorRecord;
use super::csv::split_line;
use super::traits::{FileResetHook, StoreError};

pub const CSV_HEADER: &str = "Name,Mobile_Number,Email,Company_Name,Head_Office_Location,Project_Name,Project_Location,Account_Type,Signature,Application_Type,Sales_Comment";

/// What happened to an append request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Saved,
    /// Name or mobile number was empty
    MissingRequired,
    DuplicateMobile,
    DuplicateEmail,
}

pub struct LeadWriter {
    path: PathBuf,
    // Serializes check-then-append across threads
    lock: Mutex<()>,
}

impl LeadWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with its header row if it does not exist yet.
    pub fn ensure_file(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }
        let mut file = std::fs::File::create(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        writeln!(file, "{CSV_HEADER}").map_err(|e| StoreError::io(&self.path, e))?;
        info!(path = %self.path.display(), "Created CSV with header");
        Ok(())
    }

    /// Validate and append one registration.
    pub fn append(&self, record: &ContractorRecord) -> Result<AppendOutcome, StoreError> {
        let fields = record.fields().map(single_line);
        let name = fields[0].as_str();
        let mobile = fields[1].as_str();
        if name.is_empty() || mobile.is_empty() {
            warn!("Name and mobile number are required");
            return Ok(AppendOutcome::MissingRequired);
        }

        let _guard = self.lock.lock();
        self.ensure_file()?;

        if self.mobile_exists(mobile)? {
            warn!(mobile = %mobile, "Mobile number already registered");
            return Ok(AppendOutcome::DuplicateMobile);
        }
        let email = fields[2].as_str();
        if !email.is_empty() && self.email_exists(email)? {
            warn!(email = %email, "Email already registered");
            return Ok(AppendOutcome::DuplicateEmail);
        }

        let line = fields.iter().map(|f| escape_field(f)).collect::<Vec<_>>().join(",");
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        writeln!(file, "{line}").map_err(|e| StoreError::io(&self.path, e))?;

        info!(name = %name, "Registration saved");
        Ok(AppendOutcome::Saved)
    }

    pub fn mobile_exists(&self, mobile: &str) -> Result<bool, StoreError> {
        let mobile = mobile.trim();
        self.any_row(|values| values.get(1).is_some_and(|v| v.trim() == mobile))
    }

    pub fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let email = email.trim().to_lowercase();
        self.any_row(|values| values.get(2).is_some_and(|v| v.trim().to_lowercase() == email))
    }

    fn any_row(&self, mut predicate: impl FnMut(&[String]) -> bool) -> Result<bool, StoreError> {
        if !self.path.exists() {
            return Ok(false);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        Ok(content
            .lines()
            .skip(1)
            .filter(|l| !l.trim().is_empty())
            .any(|line| predicate(&split_line(line, ','))))
    }
}

impl FileResetHook for LeadWriter {
    fn reset_file(&self) {
        let _guard = self.lock.lock();
        if let Err(e) = self.ensure_file() {
            error!(error = %e, "Failed to recreate CSV after rename");
        }
    }
}

/// Collapse line breaks into single spaces and trim.
///
/// The reader treats every line break as a row boundary, so a field must
/// never carry one into the file.
#[must_use]
pub fn single_line(field: &str) -> String {
    field
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a field when it contains a delimiter or quote.
///
/// Single quotes are quoted too: the reader treats a bare `'` as the start of
/// a quoted run.
#[must_use]
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\'']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
