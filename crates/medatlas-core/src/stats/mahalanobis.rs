//! Mahalanobis distance gating
//!
//! Scale-invariant multivariate distance from the sample centroid,
//! `d^2 = (x - mu)^T Sigma^-1 (x - mu)`, thresholded against the inverse
//! chi-square CDF. Degenerate inputs (too few rows, singular covariance)
//! yield no detector; callers skip the stage rather than fail.

use ndarray::{Array1, Array2};

/// Inverse chi-square CDF at p = 0.975 with 6 degrees of freedom
pub const CHI2_975_DF6: f64 = 14.4494;

/// Inverse chi-square CDF at p = 0.975 with 4 degrees of freedom
pub const CHI2_975_DF4: f64 = 11.1433;

/// Lower-triangular Cholesky factor of a symmetric positive-definite matrix.
/// Returns `None` when the matrix is not positive definite (singular
/// covariance, e.g. a constant feature column).
fn cholesky(matrix: &Array2<f64>) -> Option<Array2<f64>> {
    let n = matrix.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = matrix[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 1e-12 {
                    return None;
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `L z = y` by forward substitution for lower-triangular `L`
fn forward_solve(l: &Array2<f64>, y: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = y[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }
    z
}

/// Fitted Mahalanobis detector over feature vectors
pub struct MahalanobisDetector {
    mean: Array1<f64>,
    chol: Array2<f64>,
    dims: usize,
}

impl MahalanobisDetector {
    /// Fit over rows of equal dimensionality.
    ///
    /// Returns `None` when there are fewer rows than `dims + 1` (the
    /// covariance would be rank-deficient by construction) or the covariance
    /// is singular.
    pub fn fit(data: &[Vec<f64>]) -> Option<Self> {
        let n = data.len();
        let dims = data.first()?.len();
        if dims == 0 || n <= dims {
            return None;
        }

        let mut mean = Array1::<f64>::zeros(dims);
        for row in data {
            for (j, &v) in row.iter().enumerate() {
                mean[j] += v;
            }
        }
        mean /= n as f64;

        let mut cov = Array2::<f64>::zeros((dims, dims));
        for row in data {
            let centered = Array1::from_iter(row.iter().enumerate().map(|(j, &v)| v - mean[j]));
            for i in 0..dims {
                for j in 0..dims {
                    cov[[i, j]] += centered[i] * centered[j];
                }
            }
        }
        cov /= (n - 1) as f64;

        let chol = cholesky(&cov)?;
        Some(Self { mean, chol, dims })
    }

    /// Squared Mahalanobis distance of a point from the fitted centroid
    pub fn distance_sq(&self, point: &[f64]) -> f64 {
        debug_assert_eq!(point.len(), self.dims);
        let centered =
            Array1::from_iter(point.iter().enumerate().map(|(j, &v)| v - self.mean[j]));
        let z = forward_solve(&self.chol, &centered);
        z.dot(&z)
    }

    /// Indices of rows whose squared distance exceeds `threshold`
    pub fn outliers(&self, data: &[Vec<f64>], threshold: f64) -> Vec<usize> {
        data.iter()
            .enumerate()
            .filter(|(_, row)| self.distance_sq(row) > threshold)
            .map(|(i, _)| i)
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
