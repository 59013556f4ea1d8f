//! Canonical missing-value and record-completeness predicates.
//!
//! Upload, edit, and display paths all route through these two predicates;
//! there is deliberately no second definition of "missing" anywhere else.

use crate::record::StudentRecord;

/// Placeholder strings that count as missing, compared case-insensitively
/// after trimming. "-1" covers the numeric sentinel leaking in as text from
/// legacy exports.
const PLACEHOLDER_STRINGS: &[&str] = &["", "incomplete", "n/a", "na", "none", "-1"];

/// True when a text value is absent or a known placeholder.
pub fn is_missing_text(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => {
            let lowered = v.trim().to_lowercase();
            PLACEHOLDER_STRINGS.contains(&lowered.as_str())
        }
    }
}

/// True when a numeric value is absent or not strictly positive.
pub fn is_missing_number(value: Option<f64>) -> bool {
    match value {
        None => true,
        Some(v) => !v.is_finite() || v <= 0.0,
    }
}

/// A record is complete when every required text field is non-placeholder
/// and both numeric fields are strictly positive. Only complete records
/// participate in clustering; the same predicate decides whether an edit
/// should trigger reclustering.
pub fn is_complete(record: &StudentRecord) -> bool {
    let text_fields = [
        record.firstname.as_deref(),
        record.lastname.as_deref(),
        record.sex.as_deref(),
        record.program.as_deref(),
        record.municipality.as_deref(),
        record.shs_type.as_deref(),
    ];

    if text_fields.iter().any(|f| is_missing_text(*f)) {
        return false;
    }

    !is_missing_number(record.income) && !is_missing_number(record.gwa)
}

/// Indices of the complete records, preserving input order.
pub fn complete_indices(records: &[StudentRecord]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| is_complete(r))
        .map(|(i, _)| i)
        .collect()
}
