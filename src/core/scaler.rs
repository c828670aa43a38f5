use crate::domain::features::FEATURE_COUNT;
use crate::utils::error::{Result, RiskError};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column standardization: `(x - mean) / scale`.
///
/// `scale` is the population standard deviation; constant columns get a
/// scale of 1.0 so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub samples_seen: usize,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(RiskError::ProcessingError {
                message: "Cannot fit scaler on an empty matrix".to_string(),
            });
        }

        let mean = x.mean_axis(Axis(0)).ok_or_else(|| RiskError::ProcessingError {
            message: "Cannot compute column means".to_string(),
        })?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > f64::EPSILON { s } else { 1.0 });

        Ok(Self {
            mean: mean.to_vec(),
            scale: scale.to_vec(),
            samples_seen: x.nrows(),
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(RiskError::ProcessingError {
                message: format!(
                    "Scaler was fitted on {} columns, got {}",
                    self.n_features(),
                    x.ncols()
                ),
            });
        }
        let mean = Array1::from(self.mean.clone());
        let scale = Array1::from(self.scale.clone());
        Ok((&x - &mean) / &scale)
    }

    pub fn transform_row(&self, row: &[f64; FEATURE_COUNT]) -> Result<[f64; FEATURE_COUNT]> {
        if self.n_features() != FEATURE_COUNT {
            return Err(RiskError::ModelIncompatible {
                message: format!(
                    "scaler expects {} features, service provides {}",
                    self.n_features(),
                    FEATURE_COUNT
                ),
            });
        }
        let mut out = [0.0; FEATURE_COUNT];
        for (i, value) in row.iter().enumerate() {
            out[i] = (value - self.mean[i]) / self.scale[i];
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_uses_population_std() {
        let x = array![[1.0, 10.0], [3.0, 10.0]];
        let scaler = StandardScaler::fit(x.view()).unwrap();

        assert_eq!(scaler.mean, vec![2.0, 10.0]);
        assert!((scaler.scale[0] - 1.0).abs() < 1e-12);
        // constant column falls back to 1.0
        assert_eq!(scaler.scale[1], 1.0);
        assert_eq!(scaler.samples_seen, 2);
    }

    #[test]
    fn test_transform_standardizes_columns() {
        let x = array![[0.0, 2.0], [4.0, 6.0], [8.0, 10.0]];
        let scaler = StandardScaler::fit(x.view()).unwrap();
        let scaled = scaler.transform(x.view()).unwrap();

        let means = scaled.mean_axis(Axis(0)).unwrap();
        let stds = scaled.std_axis(Axis(0), 0.0);
        for j in 0..2 {
            assert!(means[j].abs() < 1e-12);
            assert!((stds[j] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_transform_rejects_wrong_width() {
        let scaler = StandardScaler::fit(array![[1.0, 2.0], [3.0, 4.0]].view()).unwrap();
        assert!(scaler.transform(array![[1.0, 2.0, 3.0]].view()).is_err());
    }

    #[test]
    fn test_transform_row_matches_matrix_transform() {
        let rows = array![
            [1.0, 85.0, 66.0, 29.0, 0.0, 26.6, 0.351, 31.0],
            [8.0, 183.0, 64.0, 0.0, 0.0, 23.3, 0.672, 32.0],
            [1.0, 89.0, 66.0, 23.0, 94.0, 28.1, 0.167, 21.0]
        ];
        let scaler = StandardScaler::fit(rows.view()).unwrap();
        let matrix = scaler.transform(rows.view()).unwrap();

        let first = [1.0, 85.0, 66.0, 29.0, 0.0, 26.6, 0.351, 31.0];
        let row = scaler.transform_row(&first).unwrap();
        for j in 0..FEATURE_COUNT {
            assert!((row[j] - matrix[[0, j]]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_matrix_is_an_error() {
        let x = Array2::<f64>::zeros((0, 8));
        assert!(StandardScaler::fit(x.view()).is_err());
    }
}
