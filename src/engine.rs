//! Pipeline orchestration: upload, recluster, edit-triggered reclustering,
//! and read-side views.
//!
//! Every clustering run is compute-then-swap: the pipeline runs to
//! completion on a snapshot of the records, and only then does the store
//! replace the dataset's model and assignments in one atomic step. A failed
//! run therefore never disturbs the previous valid model. Concurrent
//! recluster requests for the same dataset serialize on a per-dataset lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::completeness::{complete_indices, is_complete};
use crate::describe::describe_cluster;
use crate::error::SegmentError;
use crate::features::{ensure_usable, FeatureSchema, ProgramRegistry};
use crate::model::{fit_kmeans, KMeansParams};
use crate::record::{StudentId, StudentRecord};
use crate::scaler::StandardScaler;
use crate::selection::{elbow, ElbowReport};
use crate::store::{AssignmentDraft, ClusterStore, DatasetId, ModelId, NewClusterModel};
use crate::Result;

/// Engine-wide tuning: k-means parameters shared by sweeps and final fits.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    pub params: KMeansParams,
}

/// Why an edit caused reclustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReclusterReason {
    BecameComplete,
    BecameIncomplete,
}

/// Emitted when a record edit changed completeness and the dataset was
/// reclustered as a consequence.
#[derive(Debug, Clone, Serialize)]
pub struct ReclusterEvent {
    pub dataset_id: DatasetId,
    pub student_id: StudentId,
    pub reason: ReclusterReason,
    pub model_id: ModelId,
}

/// Result of a dataset upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub dataset_id: DatasetId,
    pub model_id: ModelId,
    pub k: usize,
    pub total_records: usize,
    pub clustered_records: usize,
}

/// Result of an explicit recluster request.
#[derive(Debug, Clone, Serialize)]
pub struct ReclusterOutcome {
    pub dataset_id: DatasetId,
    pub model_id: ModelId,
    pub k: usize,
}

/// Result of a record edit; `event` is present when the edit triggered
/// reclustering.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub previous: StudentRecord,
    pub event: Option<ReclusterEvent>,
}

/// One student as rendered for dashboards and exports.
#[derive(Debug, Clone, Serialize)]
pub struct StudentView {
    pub id: StudentId,
    pub name: String,
    pub sex: String,
    pub program: String,
    pub municipality: String,
    pub shs_type: String,
    pub income_display: String,
    pub gwa_display: String,
    pub income_bracket: String,
    pub honors: String,
    pub location: String,
    pub cluster_number: Option<usize>,
    pub cluster_label: Option<String>,
}

/// A point on the 2-D GWA/income scatter.
#[derive(Debug, Clone, Serialize)]
pub struct PlotPoint {
    pub x: f64,
    pub y: f64,
    pub cluster: Option<usize>,
    pub hover: String,
}

/// Read-side snapshot of the active dataset's clustering.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterView {
    pub dataset_id: DatasetId,
    pub model_id: ModelId,
    pub k: usize,
    pub clusters: BTreeMap<usize, Vec<StudentView>>,
    /// Records excluded from clustering; surfaced explicitly instead of
    /// inheriting a stale cluster number.
    pub unclustered: Vec<StudentView>,
    pub labels: BTreeMap<usize, String>,
    pub centroids: Vec<(f64, f64)>,
    pub plot: Vec<PlotPoint>,
}

/// Per-category counts for the active dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_students: usize,
    pub sex_distribution: BTreeMap<String, usize>,
    pub program_distribution: BTreeMap<String, usize>,
    pub municipality_distribution: BTreeMap<String, usize>,
    pub income_distribution: BTreeMap<String, usize>,
    pub shs_distribution: BTreeMap<String, usize>,
    pub honors_distribution: BTreeMap<String, usize>,
}

struct PipelineOutput {
    k: usize,
    drafts: Vec<AssignmentDraft>,
    centroids: Vec<(f64, f64)>,
    labels: BTreeMap<usize, String>,
    clustered: usize,
}

/// The clustering engine over a persistence adapter.
pub struct ClusterEngine<S: ClusterStore> {
    store: S,
    config: EngineConfig,
    locks: Mutex<HashMap<DatasetId, Arc<Mutex<()>>>>,
}

impl<S: ClusterStore> ClusterEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upload a new dataset: run the full pipeline on its records, persist
    /// dataset + model + assignments, and make it active. Nothing is
    /// persisted when the pipeline rejects the input.
    pub fn upload(
        &self,
        name: &str,
        records: Vec<StudentRecord>,
        k: Option<usize>,
    ) -> Result<UploadOutcome> {
        let registry = ProgramRegistry::from_records(&records);
        let output = self.run_pipeline(&records, &registry, k)?;

        let total_records = records.len();
        let dataset_id = self.store.insert_dataset(name, records, registry)?;
        let model_id = self.store.replace_model(
            dataset_id,
            NewClusterModel {
                k: output.k,
                centroids: output.centroids,
                labels: output.labels,
            },
            output.drafts,
        )?;

        Ok(UploadOutcome {
            dataset_id,
            model_id,
            k: output.k,
            total_records,
            clustered_records: output.clustered,
        })
    }

    /// Recluster the active dataset, auto-selecting k when not supplied.
    pub fn recluster(&self, k: Option<usize>) -> Result<ReclusterOutcome> {
        let dataset_id = self
            .store
            .active_dataset_id()?
            .ok_or(SegmentError::NoActiveDataset)?;
        self.recluster_dataset(dataset_id, k)
    }

    fn recluster_dataset(&self, dataset_id: DatasetId, k: Option<usize>) -> Result<ReclusterOutcome> {
        let lock = self.dataset_lock(dataset_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| SegmentError::persistence("dataset lock poisoned"))?;

        let dataset = self.store.dataset(dataset_id)?;
        let output = self.run_pipeline(&dataset.records, &dataset.registry, k)?;
        let model_id = self.store.replace_model(
            dataset_id,
            NewClusterModel {
                k: output.k,
                centroids: output.centroids,
                labels: output.labels,
            },
            output.drafts,
        )?;

        Ok(ReclusterOutcome {
            dataset_id,
            model_id,
            k: output.k,
        })
    }

    /// Apply an edit to one record. When the edit flips the record's
    /// completeness, the dataset is reclustered exactly once and the event
    /// is returned alongside the previous record version.
    pub fn edit_record(
        &self,
        dataset_id: DatasetId,
        student_id: StudentId,
        record: StudentRecord,
    ) -> Result<EditOutcome> {
        let now_complete = is_complete(&record);
        let previous = self.store.update_record(dataset_id, student_id, record)?;
        let was_complete = is_complete(&previous);

        if was_complete == now_complete {
            return Ok(EditOutcome {
                previous,
                event: None,
            });
        }

        // Keep the current k when it is still valid for the new membership;
        // otherwise fall back to auto-selection.
        let dataset = self.store.dataset(dataset_id)?;
        let usable = complete_indices(&dataset.records).len();
        let k = self
            .store
            .model(dataset_id)?
            .map(|m| m.k)
            .filter(|k| *k >= 2 && *k <= usable);

        let outcome = self.recluster_dataset(dataset_id, k)?;
        Ok(EditOutcome {
            previous,
            event: Some(ReclusterEvent {
                dataset_id,
                student_id,
                reason: if now_complete {
                    ReclusterReason::BecameComplete
                } else {
                    ReclusterReason::BecameIncomplete
                },
                model_id: outcome.model_id,
            }),
        })
    }

    /// WCSS sweep and k recommendation for a candidate batch; persists
    /// nothing.
    pub fn elbow_preview(&self, records: &[StudentRecord]) -> Result<ElbowReport> {
        if records.is_empty() {
            return Err(SegmentError::EmptyInput);
        }
        let indices = complete_indices(records);
        let complete: Vec<&StudentRecord> = indices.iter().map(|&i| &records[i]).collect();
        if complete.len() < 2 {
            return Err(SegmentError::InsufficientRecords {
                required: 2,
                actual: complete.len(),
            });
        }

        let registry = ProgramRegistry::from_records(records);
        let schema = FeatureSchema::new(registry);
        let matrix = schema.encode(&complete);
        ensure_usable(&matrix)?;
        let (scaled, _) = StandardScaler::fit_transform(&matrix)?;
        elbow(&scaled, &self.config.params)
    }

    /// Snapshot of the active dataset's clusters for dashboards and exports.
    /// Dataset, model, and assignments come from one atomic store read, so a
    /// concurrent recluster can never split the view across two models.
    pub fn cluster_view(&self) -> Result<ClusterView> {
        let snapshot = self
            .store
            .active_snapshot()?
            .ok_or(SegmentError::NoActiveDataset)?;
        let dataset = snapshot.dataset;
        let model = snapshot
            .model
            .ok_or(SegmentError::ModelNotFound(dataset.id))?;
        let assignments = snapshot.assignments;

        let by_student: HashMap<StudentId, usize> = assignments
            .iter()
            .map(|a| (a.student_id, a.cluster_number))
            .collect();

        let mut clusters: BTreeMap<usize, Vec<StudentView>> = BTreeMap::new();
        let mut unclustered = Vec::new();
        let mut plot = Vec::new();

        for record in &dataset.records {
            let cluster = by_student.get(&record.id).copied();
            let view = student_view(record, cluster, &model.labels);

            if let (Some(x), Some(y)) = (record.gwa, record.income) {
                plot.push(PlotPoint {
                    x,
                    y,
                    cluster,
                    hover: hover_text(record),
                });
            }

            match cluster {
                Some(c) => clusters.entry(c).or_default().push(view),
                None => unclustered.push(view),
            }
        }

        Ok(ClusterView {
            dataset_id: dataset.id,
            model_id: model.id,
            k: model.k,
            clusters,
            unclustered,
            labels: model.labels.clone(),
            centroids: model.centroids.clone(),
            plot,
        })
    }

    /// Category distributions over the active dataset.
    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let dataset = self
            .store
            .active_snapshot()?
            .ok_or(SegmentError::NoActiveDataset)?
            .dataset;

        let mut stats = DashboardStats {
            total_students: dataset.records.len(),
            sex_distribution: BTreeMap::new(),
            program_distribution: BTreeMap::new(),
            municipality_distribution: BTreeMap::new(),
            income_distribution: BTreeMap::new(),
            shs_distribution: BTreeMap::new(),
            honors_distribution: BTreeMap::new(),
        };

        for record in &dataset.records {
            bump(
                &mut stats.sex_distribution,
                record.sex.as_deref().unwrap_or("Not Specified"),
            );
            bump(
                &mut stats.program_distribution,
                record.program.as_deref().unwrap_or("No Program Entered"),
            );
            bump(
                &mut stats.municipality_distribution,
                record
                    .municipality
                    .as_deref()
                    .unwrap_or("No Municipality Entered"),
            );
            bump(
                &mut stats.income_distribution,
                &record.income_bracket().to_string(),
            );
            bump(
                &mut stats.shs_distribution,
                record.shs_type.as_deref().unwrap_or("No SHS Type Entered"),
            );
            bump(&mut stats.honors_distribution, &record.honors().to_string());
        }

        Ok(stats)
    }

    /// Full pipeline over a record snapshot. Pure with respect to the store.
    fn run_pipeline(
        &self,
        records: &[StudentRecord],
        registry: &ProgramRegistry,
        k: Option<usize>,
    ) -> Result<PipelineOutput> {
        if records.is_empty() {
            return Err(SegmentError::EmptyInput);
        }

        let indices = complete_indices(records);
        let complete: Vec<&StudentRecord> = indices.iter().map(|&i| &records[i]).collect();
        let usable = complete.len();
        if usable < 2 {
            return Err(SegmentError::InsufficientRecords {
                required: 2,
                actual: usable,
            });
        }

        let schema = FeatureSchema::new(registry.clone());
        let matrix = schema.encode(&complete);
        ensure_usable(&matrix)?;
        let (scaled, scaler) = StandardScaler::fit_transform(&matrix)?;

        let k = match k {
            Some(k) => {
                if k < 2 || k > usable {
                    return Err(SegmentError::InvalidK {
                        requested: k,
                        usable,
                    });
                }
                k
            }
            None => elbow(&scaled, &self.config.params)?.recommended_k,
        };

        let model = fit_kmeans(&scaled, k, &self.config.params)?;

        // Centroids go back to original units before storage; only the
        // (gwa, income) pair is kept for the 2-D dashboard plot.
        let original = scaler.inverse_transform(&model.centroids);
        let centroids = original
            .rows()
            .into_iter()
            .map(|row| (row[0], row[1]))
            .collect();

        let mut members: BTreeMap<usize, Vec<&StudentRecord>> = BTreeMap::new();
        for (pos, record) in complete.iter().enumerate() {
            members.entry(model.labels[pos]).or_default().push(record);
        }
        let labels: BTreeMap<usize, String> = (0..k)
            .map(|c| {
                let label = members
                    .get(&c)
                    .map(|m| describe_cluster(m))
                    .unwrap_or_else(|| describe_cluster(&[]));
                (c, label)
            })
            .collect();

        let drafts = indices
            .iter()
            .enumerate()
            .map(|(pos, &i)| AssignmentDraft {
                student_id: records[i].id,
                cluster_number: model.labels[pos],
            })
            .collect();

        Ok(PipelineOutput {
            k,
            drafts,
            centroids,
            labels,
            clustered: usable,
        })
    }

    fn dataset_lock(&self, dataset_id: DatasetId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| SegmentError::persistence("lock registry poisoned"))?;
        Ok(locks.entry(dataset_id).or_default().clone())
    }
}

fn bump(map: &mut BTreeMap<String, usize>, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

fn student_view(
    record: &StudentRecord,
    cluster: Option<usize>,
    labels: &BTreeMap<usize, String>,
) -> StudentView {
    StudentView {
        id: record.id,
        name: record.display_name(),
        sex: record.sex.clone().unwrap_or_else(|| "Not Specified".to_string()),
        program: record
            .program
            .clone()
            .unwrap_or_else(|| "No Program Entered".to_string()),
        municipality: record
            .municipality
            .clone()
            .unwrap_or_else(|| "No Municipality Entered".to_string()),
        shs_type: record
            .shs_type
            .clone()
            .unwrap_or_else(|| "No SHS Type Entered".to_string()),
        income_display: record.income_display(),
        gwa_display: record.gwa_display(),
        income_bracket: record.income_bracket().to_string(),
        honors: record.honors().to_string(),
        location: record.location().to_string(),
        cluster_number: cluster,
        cluster_label: cluster.and_then(|c| labels.get(&c).cloned()),
    }
}

fn hover_text(record: &StudentRecord) -> String {
    format!(
        "{} | Program: {} | Municipality: {} | Income: {} | Honors: {} | SHS: {}",
        record.display_name(),
        record.program.as_deref().unwrap_or("-"),
        record.municipality.as_deref().unwrap_or("-"),
        record.income_bracket(),
        record.honors(),
        record.shs_type.as_deref().unwrap_or("-"),
    )
}
