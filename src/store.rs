//! Persistence adapter: dataset, cluster-model, and assignment records.
//!
//! The clustering core only ever talks to the `ClusterStore` trait; the
//! in-memory implementation here backs the CLI and tests, while a relational
//! adapter can implement the same contract. `replace_model` is the atomic
//! swap point: the previous model and assignments for a dataset disappear
//! only when the replacement is fully materialized.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SegmentError;
use crate::features::ProgramRegistry;
use crate::record::{StudentId, StudentRecord};
use crate::Result;

pub type DatasetId = u64;
pub type ModelId = u64;

/// An uploaded snapshot of student records plus the feature registry
/// captured at upload time.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub uploaded_at: DateTime<Utc>,
    pub records: Vec<StudentRecord>,
    pub registry: ProgramRegistry,
}

/// The active cluster model for a dataset. Centroids keep only the
/// (gwa, income) pair of each centroid, in original units, for 2-D plotting.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterModel {
    pub id: ModelId,
    pub dataset_id: DatasetId,
    pub k: usize,
    pub centroids: Vec<(f64, f64)>,
    pub labels: BTreeMap<usize, String>,
    pub created_at: DateTime<Utc>,
}

/// Model contents before an id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewClusterModel {
    pub k: usize,
    pub centroids: Vec<(f64, f64)>,
    pub labels: BTreeMap<usize, String>,
}

/// One student's membership under a specific model. Incomplete records get
/// no assignment row at all (the view layer surfaces them as Unclustered).
#[derive(Debug, Clone, Serialize)]
pub struct ClusterAssignment {
    pub student_id: StudentId,
    pub model_id: ModelId,
    pub cluster_number: usize,
}

/// Assignment content before the model id exists.
#[derive(Debug, Clone)]
pub struct AssignmentDraft {
    pub student_id: StudentId,
    pub cluster_number: usize,
}

/// A dataset together with its model and assignments, read in one critical
/// section. The assignments always belong to the contained model.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub dataset: Dataset,
    pub model: Option<ClusterModel>,
    pub assignments: Vec<ClusterAssignment>,
}

/// Storage contract for the clustering core.
pub trait ClusterStore: Send + Sync {
    /// Persist a new dataset and make it the active one.
    fn insert_dataset(
        &self,
        name: &str,
        records: Vec<StudentRecord>,
        registry: ProgramRegistry,
    ) -> Result<DatasetId>;

    /// The dataset all cluster operations act on, if any. Updated only on
    /// successful upload; never derived ad hoc by callers.
    fn active_dataset_id(&self) -> Result<Option<DatasetId>>;

    fn dataset(&self, id: DatasetId) -> Result<Dataset>;

    /// Overwrite one student record, returning the previous version.
    fn update_record(
        &self,
        dataset_id: DatasetId,
        student_id: StudentId,
        record: StudentRecord,
    ) -> Result<StudentRecord>;

    /// Atomically replace the dataset's model and all its assignments.
    fn replace_model(
        &self,
        dataset_id: DatasetId,
        model: NewClusterModel,
        assignments: Vec<AssignmentDraft>,
    ) -> Result<ModelId>;

    fn model(&self, dataset_id: DatasetId) -> Result<Option<ClusterModel>>;

    fn assignments(&self, dataset_id: DatasetId) -> Result<Vec<ClusterAssignment>>;

    /// Read the active dataset with its model and assignments atomically,
    /// so a concurrent model swap cannot split the view mid-read.
    fn active_snapshot(&self) -> Result<Option<StoreSnapshot>>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_dataset_id: DatasetId,
    next_model_id: ModelId,
    datasets: BTreeMap<DatasetId, Dataset>,
    models: BTreeMap<DatasetId, ClusterModel>,
    assignments: BTreeMap<DatasetId, Vec<ClusterAssignment>>,
    active: Option<DatasetId>,
}

/// In-memory store used by the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| SegmentError::persistence("store lock poisoned"))
    }
}

impl ClusterStore for MemoryStore {
    fn insert_dataset(
        &self,
        name: &str,
        records: Vec<StudentRecord>,
        registry: ProgramRegistry,
    ) -> Result<DatasetId> {
        let mut inner = self.lock()?;
        inner.next_dataset_id += 1;
        let id = inner.next_dataset_id;
        inner.datasets.insert(
            id,
            Dataset {
                id,
                name: name.to_string(),
                uploaded_at: Utc::now(),
                records,
                registry,
            },
        );
        inner.active = Some(id);
        Ok(id)
    }

    fn active_dataset_id(&self) -> Result<Option<DatasetId>> {
        Ok(self.lock()?.active)
    }

    fn dataset(&self, id: DatasetId) -> Result<Dataset> {
        self.lock()?
            .datasets
            .get(&id)
            .cloned()
            .ok_or(SegmentError::DatasetNotFound(id))
    }

    fn update_record(
        &self,
        dataset_id: DatasetId,
        student_id: StudentId,
        record: StudentRecord,
    ) -> Result<StudentRecord> {
        let mut inner = self.lock()?;
        let dataset = inner
            .datasets
            .get_mut(&dataset_id)
            .ok_or(SegmentError::DatasetNotFound(dataset_id))?;
        let slot = dataset
            .records
            .iter_mut()
            .find(|r| r.id == student_id)
            .ok_or(SegmentError::StudentNotFound(student_id))?;
        Ok(std::mem::replace(slot, record))
    }

    fn replace_model(
        &self,
        dataset_id: DatasetId,
        model: NewClusterModel,
        assignments: Vec<AssignmentDraft>,
    ) -> Result<ModelId> {
        let mut inner = self.lock()?;
        if !inner.datasets.contains_key(&dataset_id) {
            return Err(SegmentError::DatasetNotFound(dataset_id));
        }

        inner.next_model_id += 1;
        let model_id = inner.next_model_id;

        let rows = assignments
            .into_iter()
            .map(|a| ClusterAssignment {
                student_id: a.student_id,
                model_id,
                cluster_number: a.cluster_number,
            })
            .collect();

        // Single critical section: old model and rows vanish exactly when
        // the replacements land.
        inner.models.insert(
            dataset_id,
            ClusterModel {
                id: model_id,
                dataset_id,
                k: model.k,
                centroids: model.centroids,
                labels: model.labels,
                created_at: Utc::now(),
            },
        );
        inner.assignments.insert(dataset_id, rows);

        Ok(model_id)
    }

    fn model(&self, dataset_id: DatasetId) -> Result<Option<ClusterModel>> {
        Ok(self.lock()?.models.get(&dataset_id).cloned())
    }

    fn assignments(&self, dataset_id: DatasetId) -> Result<Vec<ClusterAssignment>> {
        Ok(self
            .lock()?
            .assignments
            .get(&dataset_id)
            .cloned()
            .unwrap_or_default())
    }

    fn active_snapshot(&self) -> Result<Option<StoreSnapshot>> {
        let inner = self.lock()?;
        let id = match inner.active {
            Some(id) => id,
            None => return Ok(None),
        };
        let dataset = inner
            .datasets
            .get(&id)
            .cloned()
            .ok_or(SegmentError::DatasetNotFound(id))?;
        Ok(Some(StoreSnapshot {
            dataset,
            model: inner.models.get(&id).cloned(),
            assignments: inner.assignments.get(&id).cloned().unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawStudentRecord;

    fn records(n: usize) -> Vec<StudentRecord> {
        (0..n)
            .map(|i| RawStudentRecord::default().normalize(i as StudentId + 1))
            .collect()
    }

    fn model_with_k(k: usize) -> NewClusterModel {
        NewClusterModel {
            k,
            centroids: vec![(90.0, 20_000.0); k],
            labels: BTreeMap::new(),
        }
    }

    #[test]
    fn upload_sets_active_pointer() {
        let store = MemoryStore::new();
        assert_eq!(store.active_dataset_id().unwrap(), None);

        let first = store
            .insert_dataset("a.csv", records(3), ProgramRegistry::from_records(&[]))
            .unwrap();
        assert_eq!(store.active_dataset_id().unwrap(), Some(first));

        let second = store
            .insert_dataset("b.csv", records(3), ProgramRegistry::from_records(&[]))
            .unwrap();
        assert_eq!(store.active_dataset_id().unwrap(), Some(second));
        assert_ne!(first, second);
    }

    #[test]
    fn replace_model_swaps_assignments_wholesale() {
        let store = MemoryStore::new();
        let dataset = store
            .insert_dataset("a.csv", records(2), ProgramRegistry::from_records(&[]))
            .unwrap();

        let first = store
            .replace_model(
                dataset,
                model_with_k(2),
                vec![AssignmentDraft {
                    student_id: 1,
                    cluster_number: 0,
                }],
            )
            .unwrap();

        let second = store
            .replace_model(
                dataset,
                model_with_k(3),
                vec![
                    AssignmentDraft {
                        student_id: 1,
                        cluster_number: 2,
                    },
                    AssignmentDraft {
                        student_id: 2,
                        cluster_number: 1,
                    },
                ],
            )
            .unwrap();
        assert_ne!(first, second);

        let model = store.model(dataset).unwrap().unwrap();
        assert_eq!(model.id, second);
        assert_eq!(model.k, 3);

        let rows = store.assignments(dataset).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.model_id == second));
    }

    #[test]
    fn update_record_returns_previous_version() {
        let store = MemoryStore::new();
        let dataset = store
            .insert_dataset("a.csv", records(1), ProgramRegistry::from_records(&[]))
            .unwrap();

        let mut edited = RawStudentRecord::default().normalize(1);
        edited.firstname = Some("Ana".to_string());
        let previous = store.update_record(dataset, 1, edited).unwrap();
        assert_eq!(previous.firstname, None);

        let stored = store.dataset(dataset).unwrap();
        assert_eq!(stored.records[0].firstname.as_deref(), Some("Ana"));
    }

    #[test]
    fn snapshot_pairs_model_with_its_assignments() {
        let store = MemoryStore::new();
        assert!(store.active_snapshot().unwrap().is_none());

        let dataset = store
            .insert_dataset("a.csv", records(2), ProgramRegistry::from_records(&[]))
            .unwrap();
        store
            .replace_model(
                dataset,
                model_with_k(2),
                vec![
                    AssignmentDraft {
                        student_id: 1,
                        cluster_number: 0,
                    },
                    AssignmentDraft {
                        student_id: 2,
                        cluster_number: 1,
                    },
                ],
            )
            .unwrap();

        let snapshot = store.active_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.dataset.id, dataset);
        let model = snapshot.model.unwrap();
        assert_eq!(snapshot.assignments.len(), 2);
        assert!(snapshot.assignments.iter().all(|a| a.model_id == model.id));
    }

    #[test]
    fn unknown_ids_surface_as_errors() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.dataset(99),
            Err(SegmentError::DatasetNotFound(99))
        ));
        let dataset = store
            .insert_dataset("a.csv", records(1), ProgramRegistry::from_records(&[]))
            .unwrap();
        assert!(matches!(
            store.update_record(dataset, 42, RawStudentRecord::default().normalize(42)),
            Err(SegmentError::StudentNotFound(42))
        ));
    }
}
