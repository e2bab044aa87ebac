// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Lead records and their wire encoding.
//!
//! A [`ContractorRecord`] is one row of the kiosk's registration CSV. The
//! remote API names one field differently (`application_type` → `app_type`),
//! so records are projected into a borrowed [`WireRecord`] right before
//! serialization.
//!
//! Arrays are assembled as text from independently serialized objects. The
//! receiving endpoint was written against that exact shape, so the body is
//! `[` + objects joined by `,` + `]` with no whitespace and no trailing comma.
//!
//! # Example
//!
//! ```
//! use lead_sync::{ContractorRecord, encode_array};
//!
//! let a = ContractorRecord { name: "Ada".into(), ..Default::default() };
//! let b = ContractorRecord { name: "Grace".into(), ..Default::default() };
//!
//! let body = encode_array(&[a, b]).unwrap();
//! assert!(body.starts_with("[{\"name\":\"Ada\""));
//! assert!(body.ends_with("}]"));
//! assert!(!body.contains(",]"));
//! ```

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One lead/contact record captured at the kiosk.
///
/// Every field is a plain `String` that defaults to empty, so serialization
/// never emits `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractorRecord {
    pub name: String,
    pub mobile_number: String,
    pub email: String,
    pub company_name: String,
    pub head_office_location: String,
    pub project_name: String,
    pub project_location: String,
    pub account_type: String,
    pub signature: String,
    pub application_type: String,
    pub sales_comment: String,
}

/// Canonical column order used for positional rows and the CSV header.
pub const FIELD_COUNT: usize = 11;

impl ContractorRecord {
    /// Project into the API's naming convention.
    #[must_use]
    pub fn to_wire(&self) -> WireRecord<'_> {
        WireRecord {
            name: &self.name,
            mobile_number: &self.mobile_number,
            email: &self.email,
            company_name: &self.company_name,
            head_office_location: &self.head_office_location,
            project_name: &self.project_name,
            project_location: &self.project_location,
            account_type: &self.account_type,
            signature: &self.signature,
            app_type: &self.application_type,
            sales_comment: &self.sales_comment,
        }
    }

    /// Mutable access to a field by canonical position (0..11).
    pub(crate) fn field_mut(&mut self, position: usize) -> Option<&mut String> {
        let slot = match position {
            0 => &mut self.name,
            1 => &mut self.mobile_number,
            2 => &mut self.email,
            3 => &mut self.company_name,
            4 => &mut self.head_office_location,
            5 => &mut self.project_name,
            6 => &mut self.project_location,
            7 => &mut self.account_type,
            8 => &mut self.signature,
            9 => &mut self.application_type,
            10 => &mut self.sales_comment,
            _ => return None,
        };
        Some(slot)
    }

    /// Fields in canonical order.
    #[must_use]
    pub fn fields(&self) -> [&str; FIELD_COUNT] {
        [
            &self.name,
            &self.mobile_number,
            &self.email,
            &self.company_name,
            &self.head_office_location,
            &self.project_name,
            &self.project_location,
            &self.account_type,
            &self.signature,
            &self.application_type,
            &self.sales_comment,
        ]
    }

    /// True when no field carries data.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.fields().iter().all(|f| f.is_empty())
    }
}

/// Wire shape of a record. Field order is the serialization order.
#[derive(Debug, Serialize)]
pub struct WireRecord<'a> {
    pub name: &'a str,
    pub mobile_number: &'a str,
    pub email: &'a str,
    pub company_name: &'a str,
    pub head_office_location: &'a str,
    pub project_name: &'a str,
    pub project_location: &'a str,
    pub account_type: &'a str,
    pub signature: &'a str,
    pub app_type: &'a str,
    pub sales_comment: &'a str,
}

/// Serialize a single record as a JSON object.
pub fn encode_record(record: &ContractorRecord) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&record.to_wire())?)
}

/// Serialize records as a JSON array assembled from per-object text.
pub fn encode_array(records: &[ContractorRecord]) -> Result<String, CodecError> {
    let mut out = String::with_capacity(records.len() * 256 + 2);
    out.push('[');
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&encode_record(record)?);
    }
    out.push(']');
    Ok(out)
}
