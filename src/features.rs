//! Feature schema and encoder: student records to a fixed-width matrix.
//!
//! Categorical codes are fixed (never re-derived per batch), and program
//! one-hot columns come from a registry captured when a dataset is first
//! uploaded, with a trailing OTHER bucket for values outside it. Centroid
//! dimensionality therefore stays stable across reclustering runs of the
//! same dataset.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::completeness::is_missing_text;
use crate::error::SegmentError;
use crate::record::{classify_location, StudentRecord};
use crate::Result;

/// Number of columns ahead of the program one-hot block:
/// gwa, income, sex_code, shs_code, location_code.
pub const BASE_COLUMNS: usize = 5;

/// Canonical set of program values for one-hot encoding.
///
/// Captured once per dataset and persisted with it, so every recluster of
/// that dataset sees the same column layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRegistry {
    programs: Vec<String>,
}

impl ProgramRegistry {
    /// Build a registry from the distinct program values in a batch,
    /// canonicalized and sorted for a deterministic column order.
    pub fn from_records(records: &[StudentRecord]) -> Self {
        let mut programs: Vec<String> = records
            .iter()
            .filter_map(|r| r.program.as_deref())
            .filter(|p| !is_missing_text(Some(p)))
            .map(canonical_program)
            .collect();
        programs.sort();
        programs.dedup();
        Self { programs }
    }

    pub fn programs(&self) -> &[String] {
        &self.programs
    }

    /// One-hot position of a program, or `None` for the OTHER bucket.
    pub fn position(&self, program: &str) -> Option<usize> {
        let canon = canonical_program(program);
        self.programs.iter().position(|p| *p == canon)
    }
}

/// Canonical form used for program comparison: trimmed, uppercased, inner
/// whitespace collapsed.
pub fn canonical_program(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Column layout for the encoder: fixed base columns plus the registry's
/// program block and an OTHER bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    registry: ProgramRegistry,
}

impl FeatureSchema {
    pub fn new(registry: ProgramRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProgramRegistry {
        &self.registry
    }

    /// Total matrix width: base columns + one-hot programs + OTHER.
    pub fn width(&self) -> usize {
        BASE_COLUMNS + self.registry.programs().len() + 1
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec![
            "gwa".to_string(),
            "income".to_string(),
            "sex_code".to_string(),
            "shs_code".to_string(),
            "location_code".to_string(),
        ];
        for program in self.registry.programs() {
            names.push(format!("program_{program}"));
        }
        names.push("program_OTHER".to_string());
        names
    }

    /// Encode a batch of records into a row-per-record matrix.
    pub fn encode(&self, records: &[&StudentRecord]) -> Array2<f64> {
        let width = self.width();
        let mut matrix = Array2::zeros((records.len(), width));

        for (row, record) in records.iter().enumerate() {
            matrix[[row, 0]] = record.gwa.unwrap_or(0.0);
            matrix[[row, 1]] = record.income.unwrap_or(0.0);
            matrix[[row, 2]] = sex_code(record.sex.as_deref());
            matrix[[row, 3]] = shs_code(record.shs_type.as_deref());
            matrix[[row, 4]] = classify_location(record.municipality.as_deref()).code();

            let other_col = width - 1;
            match record.program.as_deref() {
                Some(p) if !is_missing_text(Some(p)) => {
                    match self.registry.position(p) {
                        Some(pos) => matrix[[row, BASE_COLUMNS + pos]] = 1.0,
                        None => matrix[[row, other_col]] = 1.0,
                    }
                }
                _ => matrix[[row, other_col]] = 1.0,
            }
        }

        matrix
    }
}

/// Binary sex code: Male=0, Female=1, anything else -1.
pub fn sex_code(sex: Option<&str>) -> f64 {
    match sex.map(|s| s.trim().to_lowercase()) {
        Some(ref s) if s == "male" || s == "m" => 0.0,
        Some(ref s) if s == "female" || s == "f" => 1.0,
        _ => -1.0,
    }
}

/// SHS type code: Public=0, Private=1, anything else -1.
pub fn shs_code(shs_type: Option<&str>) -> f64 {
    match shs_type.map(|s| s.trim().to_lowercase()) {
        Some(ref s) if s == "public" => 0.0,
        Some(ref s) if s == "private" => 1.0,
        _ => -1.0,
    }
}

/// Reject matrices with nothing to cluster on: no rows, no columns, or
/// every entry zero (which happens when all source fields were missing).
pub fn ensure_usable(matrix: &Array2<f64>) -> Result<()> {
    if matrix.nrows() == 0 {
        return Err(SegmentError::EmptyInput);
    }
    if matrix.ncols() == 0 || matrix.iter().all(|v| *v == 0.0) {
        return Err(SegmentError::NoUsableFeatures);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(program: &str, municipality: &str) -> StudentRecord {
        StudentRecord {
            id: 0,
            firstname: Some("Ana".to_string()),
            lastname: Some("Reyes".to_string()),
            sex: Some("Female".to_string()),
            program: Some(program.to_string()),
            municipality: Some(municipality.to_string()),
            income: Some(25_000.0),
            shs_type: Some("Public".to_string()),
            gwa: Some(92.0),
            all_pass: true,
            conduct_issue: false,
        }
    }

    #[test]
    fn registry_is_sorted_and_deduplicated() {
        let records = vec![record("bsit", "Pila"), record("BSIT", "Pila"), record("BSED", "Pila")];
        let registry = ProgramRegistry::from_records(&records);
        assert_eq!(registry.programs(), ["BSED".to_string(), "BSIT".to_string()]);
    }

    #[test]
    fn schema_width_is_stable_for_a_registry() {
        let records = vec![record("BSIT", "Pila"), record("BSED", "Pila")];
        let schema = FeatureSchema::new(ProgramRegistry::from_records(&records));
        assert_eq!(schema.width(), BASE_COLUMNS + 3);
        assert_eq!(schema.column_names().last().unwrap(), "program_OTHER");

        // A later batch with unseen programs keeps the same width.
        let strangers = vec![record("BSCRIM", "Pila")];
        let refs: Vec<&StudentRecord> = strangers.iter().collect();
        let matrix = schema.encode(&refs);
        assert_eq!(matrix.ncols(), schema.width());
        assert_eq!(matrix[[0, schema.width() - 1]], 1.0); // OTHER bucket
    }

    #[test]
    fn encoding_fills_expected_columns() {
        let records = vec![record("BSIT", "Majayjay")];
        let schema = FeatureSchema::new(ProgramRegistry::from_records(&records));
        let refs: Vec<&StudentRecord> = records.iter().collect();
        let matrix = schema.encode(&refs);

        assert_eq!(matrix[[0, 0]], 92.0);
        assert_eq!(matrix[[0, 1]], 25_000.0);
        assert_eq!(matrix[[0, 2]], 1.0); // Female
        assert_eq!(matrix[[0, 3]], 0.0); // Public
        assert_eq!(matrix[[0, 4]], 0.0); // Upland
        assert_eq!(matrix[[0, BASE_COLUMNS]], 1.0); // program_BSIT
    }

    #[test]
    fn unrecognized_codes_map_to_minus_one() {
        assert_eq!(sex_code(Some("Male")), 0.0);
        assert_eq!(sex_code(Some("F")), 1.0);
        assert_eq!(sex_code(Some("Other")), -1.0);
        assert_eq!(sex_code(None), -1.0);
        assert_eq!(shs_code(Some("public")), 0.0);
        assert_eq!(shs_code(Some("Private")), 1.0);
        assert_eq!(shs_code(Some("unknown")), -1.0);
    }

    #[test]
    fn all_zero_matrix_is_rejected() {
        let matrix = Array2::<f64>::zeros((3, 4));
        assert!(matches!(
            ensure_usable(&matrix),
            Err(SegmentError::NoUsableFeatures)
        ));
        let empty = Array2::<f64>::zeros((0, 4));
        assert!(matches!(ensure_usable(&empty), Err(SegmentError::EmptyInput)));
    }
}
