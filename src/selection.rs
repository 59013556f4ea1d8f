//! WCSS sweep and elbow-based k recommendation.

use ndarray::Array2;
use serde::Serialize;

use crate::error::SegmentError;
use crate::model::{fit_kmeans, KMeansParams};
use crate::Result;

/// Default candidate range for the k sweep.
pub const DEFAULT_K_MIN: usize = 2;
pub const DEFAULT_K_MAX: usize = 10;

/// WCSS per candidate k plus the recommended k.
#[derive(Debug, Clone, Serialize)]
pub struct ElbowReport {
    pub k_min: usize,
    pub wcss: Vec<f64>,
    pub recommended_k: usize,
}

/// Run one seeded k-means fit per candidate k and record its inertia.
/// `k_max` is capped at the number of rows before calling.
pub fn wcss_for_range(
    matrix: &Array2<f64>,
    k_min: usize,
    k_max: usize,
    params: &KMeansParams,
) -> Result<Vec<f64>> {
    if k_min < 2 || k_max < k_min {
        return Err(SegmentError::InvalidK {
            requested: k_max,
            usable: matrix.nrows(),
        });
    }
    let mut wcss = Vec::with_capacity(k_max - k_min + 1);
    for k in k_min..=k_max {
        let model = fit_kmeans(matrix, k, params)?;
        wcss.push(model.inertia);
    }
    Ok(wcss)
}

/// Find the elbow of a convex, decreasing WCSS curve: the candidate whose
/// point lies farthest (perpendicular) from the chord joining the curve's
/// endpoints. Falls back to `max(2, min(5, candidates/2))` when the curve
/// has no meaningful bend.
pub fn recommend_k(wcss: &[f64], k_min: usize) -> usize {
    let n = wcss.len();
    let fallback = 2usize.max(5usize.min(n / 2));

    if n < 3 {
        return clamp_to_range(fallback, k_min, n.max(1));
    }

    let first = wcss[0];
    let last = wcss[n - 1];
    let span = (first - last).abs();
    if span <= f64::EPSILON {
        return clamp_to_range(fallback, k_min, n);
    }

    // Normalize both axes to [0,1]; the chord runs from (0,1) to (1,0) for a
    // decreasing curve, so the distance reduces to a simple expression.
    let mut best_idx = 0usize;
    let mut best_dist = f64::NEG_INFINITY;
    for (i, &value) in wcss.iter().enumerate() {
        let x = i as f64 / (n - 1) as f64;
        let y = (value - last) / (first - last);
        let dist = (x + y - 1.0).abs() / std::f64::consts::SQRT_2;
        if dist > best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }

    // A knee on the chord itself means the curve is essentially linear.
    if best_dist < 1e-3 || best_idx == 0 || best_idx == n - 1 {
        return clamp_to_range(fallback, k_min, n);
    }

    k_min + best_idx
}

fn clamp_to_range(k: usize, k_min: usize, candidates: usize) -> usize {
    let k_max = k_min + candidates - 1;
    k.clamp(k_min, k_max)
}

/// Sweep the candidate range and recommend a k. The sweep never considers
/// k above the row count.
pub fn elbow(matrix: &Array2<f64>, params: &KMeansParams) -> Result<ElbowReport> {
    let rows = matrix.nrows();
    if rows < DEFAULT_K_MIN {
        return Err(SegmentError::InsufficientRecords {
            required: DEFAULT_K_MIN,
            actual: rows,
        });
    }
    let k_max = DEFAULT_K_MAX.min(rows);
    let wcss = wcss_for_range(matrix, DEFAULT_K_MIN, k_max, params)?;
    let recommended_k = recommend_k(&wcss, DEFAULT_K_MIN);
    Ok(ElbowReport {
        k_min: DEFAULT_K_MIN,
        wcss,
        recommended_k,
    })
}
