//! StudentSeg: student segmentation core for institutional dashboards
//!
//! This library groups students into interpretable clusters from mixed
//! academic, socioeconomic, and categorical attributes. The pipeline runs
//! completeness filtering, feature encoding, standardization, optional
//! elbow-based k selection, deterministic k-means, and centroid-based
//! cluster labeling. Persistence sits behind a store trait so the
//! surrounding application (HTTP layer, exports) stays a thin consumer.

pub mod cli;
pub mod completeness;
pub mod describe;
pub mod engine;
pub mod error;
pub mod features;
pub mod model;
pub mod record;
pub mod scaler;
pub mod selection;
pub mod store;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use engine::{ClusterEngine, ClusterView, EngineConfig, UploadOutcome};
pub use error::SegmentError;
pub use model::{fit_kmeans, KMeansModel, KMeansParams};
pub use record::{RawStudentRecord, StudentRecord};
pub use store::{ClusterStore, MemoryStore};

/// Common result type used throughout the clustering core
pub type Result<T> = std::result::Result<T, SegmentError>;
