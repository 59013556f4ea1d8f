//! Deterministic k-means (Lloyd's algorithm with k-means++ seeding).
//!
//! The engine is seeded explicitly and restarted a fixed number of times,
//! keeping the run with the lowest inertia, so identical input always
//! produces identical assignments. Empty clusters are reseeded to the point
//! farthest from its nearest surviving centroid instead of crashing.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SegmentError;
use crate::Result;

/// Tuning knobs for a clustering run. Defaults match the dashboard's
/// reproducibility contract: seed 42, 10 restarts.
#[derive(Debug, Clone, Copy)]
pub struct KMeansParams {
    pub seed: u64,
    pub n_restarts: usize,
    pub max_iters: usize,
    pub tolerance: f64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            seed: 42,
            n_restarts: 10,
            max_iters: 300,
            tolerance: 1e-4,
        }
    }
}

/// Fitted k-means model: per-row assignments and centroids in the *scaled*
/// feature space. Callers inverse-transform centroids before storage.
#[derive(Debug, Clone)]
pub struct KMeansModel {
    pub k: usize,
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    pub inertia: f64,
}

impl KMeansModel {
    /// Number of members per cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &label in &self.labels {
            if label < self.k {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

/// Fit k-means on a scaled feature matrix.
///
/// Rejects k outside [2, rows]. Deterministic for a fixed seed: the restart
/// sequence draws from one seeded generator, and the best restart by inertia
/// wins (first occurrence on exact ties).
pub fn fit_kmeans(matrix: &Array2<f64>, k: usize, params: &KMeansParams) -> Result<KMeansModel> {
    let rows = matrix.nrows();
    if rows == 0 {
        return Err(SegmentError::EmptyInput);
    }
    if k < 2 || k > rows {
        return Err(SegmentError::InvalidK {
            requested: k,
            usable: rows,
        });
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<KMeansModel> = None;

    for _ in 0..params.n_restarts.max(1) {
        let run = lloyd_run(matrix, k, params, &mut rng)?;
        let better = match &best {
            Some(current) => run.inertia < current.inertia,
            None => true,
        };
        if better {
            best = Some(run);
        }
    }

    best.ok_or_else(|| SegmentError::computation("no k-means restart produced a model"))
}

fn lloyd_run(
    matrix: &Array2<f64>,
    k: usize,
    params: &KMeansParams,
    rng: &mut StdRng,
) -> Result<KMeansModel> {
    let rows = matrix.nrows();
    let cols = matrix.ncols();

    let mut centroids = init_plus_plus(matrix, k, rng);
    let mut labels = vec![0usize; rows];

    for _ in 0..params.max_iters.max(1) {
        // Assignment step.
        for (row, point) in matrix.rows().into_iter().enumerate() {
            labels[row] = nearest_centroid(&point, &centroids).0;
        }

        // Update step.
        let mut sums = Array2::<f64>::zeros((k, cols));
        let mut counts = vec![0usize; k];
        for (row, point) in matrix.rows().into_iter().enumerate() {
            let cluster = labels[row];
            counts[cluster] += 1;
            for (col, v) in point.iter().enumerate() {
                sums[[cluster, col]] += v;
            }
        }

        let mut next = Array2::<f64>::zeros((k, cols));
        for cluster in 0..k {
            if counts[cluster] > 0 {
                let n = counts[cluster] as f64;
                for col in 0..cols {
                    next[[cluster, col]] = sums[[cluster, col]] / n;
                }
            } else {
                // Degenerate cluster: reseed at the point farthest from its
                // nearest centroid so the cluster count is preserved.
                let far = farthest_point(matrix, &centroids);
                for col in 0..cols {
                    next[[cluster, col]] = matrix[[far, col]];
                }
            }
        }

        let movement = (0..k)
            .map(|c| squared_distance(&centroids.row(c), &next.row(c)).sqrt())
            .fold(0.0f64, f64::max);
        centroids = next;

        if movement < params.tolerance {
            break;
        }
    }

    // Final assignment against the converged centroids.
    let mut inertia = 0.0;
    for (row, point) in matrix.rows().into_iter().enumerate() {
        let (cluster, dist2) = nearest_centroid(&point, &centroids);
        labels[row] = cluster;
        inertia += dist2;
    }

    if !inertia.is_finite() {
        return Err(SegmentError::computation("non-finite inertia"));
    }

    Ok(KMeansModel {
        k,
        labels,
        centroids,
        inertia,
    })
}

/// k-means++ initialization: first centroid uniform, the rest weighted by
/// squared distance to the nearest centroid chosen so far.
fn init_plus_plus(matrix: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let rows = matrix.nrows();
    let cols = matrix.ncols();
    let mut centroids = Array2::<f64>::zeros((k, cols));

    let first = rng.gen_range(0..rows);
    centroids.row_mut(0).assign(&matrix.row(first));

    let mut dist2 = vec![0.0f64; rows];
    for next in 1..k {
        for (row, point) in matrix.rows().into_iter().enumerate() {
            dist2[row] = (0..next)
                .map(|c| squared_distance(&point, &centroids.row(c)))
                .fold(f64::INFINITY, f64::min);
        }
        let total: f64 = dist2.iter().sum();

        let pick = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = rows - 1;
            for (row, d) in dist2.iter().enumerate() {
                if target <= *d {
                    pick = row;
                    break;
                }
                target -= d;
            }
            pick
        } else {
            // All remaining points coincide with chosen centroids.
            rng.gen_range(0..rows)
        };

        centroids.row_mut(next).assign(&matrix.row(pick));
    }

    centroids
}

fn nearest_centroid(point: &ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0usize, f64::INFINITY);
    for (cluster, centroid) in centroids.rows().into_iter().enumerate() {
        let d2 = squared_distance(point, &centroid);
        if d2 < best.1 {
            best = (cluster, d2);
        }
    }
    best
}

fn farthest_point(matrix: &Array2<f64>, centroids: &Array2<f64>) -> usize {
    let mut best = (0usize, f64::NEG_INFINITY);
    for (row, point) in matrix.rows().into_iter().enumerate() {
        let d2 = centroids
            .rows()
            .into_iter()
            .map(|c| squared_distance(&point, &c))
            .fold(f64::INFINITY, f64::min);
        if d2 > best.1 {
            best = (row, d2);
        }
    }
    best.0
}

fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn two_blob_matrix() -> Array2<f64> {
        // Two tight groups far apart on both axes.
        Array2::from_shape_vec(
            (8, 2),
            vec![
                -5.0, -5.0, -5.2, -4.8, -4.9, -5.1, -5.1, -5.0, //
                5.0, 5.0, 5.1, 4.9, 4.8, 5.2, 5.0, 5.1,
            ],
        )
        .unwrap()
    }

    #[test]
    fn separates_obvious_blobs() {
        let matrix = two_blob_matrix();
        let model = fit_kmeans(&matrix, 2, &KMeansParams::default()).unwrap();

        let first = model.labels[0];
        assert!(model.labels[..4].iter().all(|l| *l == first));
        assert!(model.labels[4..].iter().all(|l| *l != first));
        assert_eq!(model.cluster_sizes(), vec![4, 4]);
        assert!(model.inertia < 1.0);
    }

    #[test]
    fn fixed_seed_is_deterministic() {
        let matrix = two_blob_matrix();
        let params = KMeansParams::default();
        let a = fit_kmeans(&matrix, 2, &params).unwrap();
        let b = fit_kmeans(&matrix, 2, &params).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centroids, b.centroids);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn rejects_k_out_of_range() {
        let matrix = two_blob_matrix();
        let params = KMeansParams::default();
        assert!(matches!(
            fit_kmeans(&matrix, 1, &params),
            Err(SegmentError::InvalidK { requested: 1, .. })
        ));
        assert!(matches!(
            fit_kmeans(&matrix, 9, &params),
            Err(SegmentError::InvalidK { requested: 9, .. })
        ));
    }

    #[test]
    fn duplicate_points_do_not_crash() {
        // k equals the row count and most points coincide, which forces the
        // degenerate-cluster path through init and reseeding.
        let matrix = Array2::from_shape_vec(
            (4, 2),
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 9.0, 9.0],
        )
        .unwrap();
        let model = fit_kmeans(&matrix, 4, &KMeansParams::default()).unwrap();
        assert_eq!(model.labels.len(), 4);
        assert!(model.inertia.is_finite());
    }

    #[test]
    fn inertia_decreases_with_more_clusters() {
        let matrix = two_blob_matrix();
        let params = KMeansParams::default();
        let k2 = fit_kmeans(&matrix, 2, &params).unwrap();
        let k4 = fit_kmeans(&matrix, 4, &params).unwrap();
        assert!(k4.inertia <= k2.inertia + 1e-9);
    }
}
