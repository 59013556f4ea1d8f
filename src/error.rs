//! Error types for the segmentation core.

use thiserror::Error;

/// Errors surfaced by the clustering pipeline and its store.
///
/// Input-class variants reject a request before anything is persisted.
/// `Computation` covers numerical failures that survive the zero-variance
/// guards. `Persistence` wraps failures from the backing store.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// No records were supplied at all.
    #[error("no student records supplied")]
    EmptyInput,

    /// Too few complete records to cluster.
    #[error("not enough complete records: need at least {required}, found {actual}")]
    InsufficientRecords {
        /// Minimum usable records required
        required: usize,
        /// Complete records actually present
        actual: usize,
    },

    /// Requested k falls outside [2, usable records].
    #[error("k out of range: requested {requested}, usable records {usable}")]
    InvalidK {
        /// The k the caller asked for
        requested: usize,
        /// Number of rows eligible for clustering
        usable: usize,
    },

    /// Every encoded feature column was empty or zero.
    #[error("no usable feature columns after encoding")]
    NoUsableFeatures,

    /// No dataset has been uploaded yet.
    #[error("no active dataset")]
    NoActiveDataset,

    /// Unknown dataset id.
    #[error("dataset not found: {0}")]
    DatasetNotFound(u64),

    /// Unknown student id within a dataset.
    #[error("student not found: {0}")]
    StudentNotFound(u64),

    /// The dataset exists but carries no cluster model.
    #[error("no cluster model for dataset {0}")]
    ModelNotFound(u64),

    /// Numerical failure inside scaling or fitting.
    #[error("computation failed: {0}")]
    Computation(String),

    /// Backing store read/write failure.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl SegmentError {
    /// Create a Computation error.
    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation(message.into())
    }

    /// Create a Persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// True for errors that reject the request without side effects.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput
                | Self::InsufficientRecords { .. }
                | Self::InvalidK { .. }
                | Self::NoUsableFeatures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_classified() {
        assert!(SegmentError::EmptyInput.is_input_error());
        assert!(SegmentError::InvalidK {
            requested: 1,
            usable: 10
        }
        .is_input_error());
        assert!(!SegmentError::persistence("disk gone").is_input_error());
    }

    #[test]
    fn display_messages_carry_context() {
        let err = SegmentError::InvalidK {
            requested: 12,
            usable: 8,
        };
        assert_eq!(
            err.to_string(),
            "k out of range: requested 12, usable records 8"
        );
    }
}
