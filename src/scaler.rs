//! Column-wise standardization with an exact inverse.
//!
//! Scaler state lives only for the duration of one clustering run; centroids
//! are mapped back to original units before anything is stored, since the
//! scaled space is not comparable across runs.

use ndarray::{Array1, Array2};

use crate::error::SegmentError;
use crate::Result;

/// Per-column mean/scale pair fitted on a feature matrix.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl StandardScaler {
    /// Fit means and population standard deviations per column.
    /// Zero-variance columns get scale 1.0 so transform stays finite.
    pub fn fit(matrix: &Array2<f64>) -> Result<Self> {
        let rows = matrix.nrows();
        if rows == 0 {
            return Err(SegmentError::EmptyInput);
        }
        let n = rows as f64;

        let mut means = Array1::zeros(matrix.ncols());
        let mut scales = Array1::zeros(matrix.ncols());

        for (col, column) in matrix.columns().into_iter().enumerate() {
            let mean = column.sum() / n;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            if !mean.is_finite() || !std.is_finite() {
                return Err(SegmentError::computation(format!(
                    "non-finite statistics in column {col}"
                )));
            }
            means[col] = mean;
            scales[col] = if std > 0.0 { std } else { 1.0 };
        }

        Ok(Self { means, scales })
    }

    pub fn fit_transform(matrix: &Array2<f64>) -> Result<(Array2<f64>, Self)> {
        let scaler = Self::fit(matrix)?;
        let scaled = scaler.transform(matrix);
        Ok((scaled, scaler))
    }

    /// Subtract the fitted mean and divide by the fitted scale, per column.
    pub fn transform(&self, matrix: &Array2<f64>) -> Array2<f64> {
        let mut out = matrix.clone();
        for mut row in out.rows_mut() {
            for (col, value) in row.iter_mut().enumerate() {
                *value = (*value - self.means[col]) / self.scales[col];
            }
        }
        out
    }

    /// Map scaled values (typically centroids) back to original units.
    pub fn inverse_transform(&self, matrix: &Array2<f64>) -> Array2<f64> {
        let mut out = matrix.clone();
        for mut row in out.rows_mut() {
            for (col, value) in row.iter_mut().enumerate() {
                *value = *value * self.scales[col] + self.means[col];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn transform_centers_and_scales_columns() {
        let matrix = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let (scaled, scaler) = StandardScaler::fit_transform(&matrix).unwrap();

        // First column: mean 3, population std sqrt(8/3).
        for col in 0..scaled.ncols() {
            let mean: f64 = scaled.column(col).sum() / 3.0;
            assert!(mean.abs() < 1e-12);
        }
        // Zero-variance column is passed through with scale 1.
        assert_eq!(scaler.scales[1], 1.0);
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn inverse_transform_round_trips() {
        let matrix = array![
            [92.0, 25_000.0, 1.0],
            [78.5, 8_000.0, 0.0],
            [85.0, 60_000.0, -1.0]
        ];
        let (scaled, scaler) = StandardScaler::fit_transform(&matrix).unwrap();
        let restored = scaler.inverse_transform(&scaled);

        for (a, b) in matrix.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 1e-9, "expected {a}, got {b}");
        }
    }

    #[test]
    fn empty_matrix_is_rejected() {
        let matrix = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            StandardScaler::fit(&matrix),
            Err(SegmentError::EmptyInput)
        ));
    }
}
