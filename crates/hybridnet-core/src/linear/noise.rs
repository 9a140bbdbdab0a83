//! Gaussian noise models.
//!
//! A noise model `N(0, Σ)` is stored through a square-root information matrix
//! `W` with `WᵀW = Σ⁻¹`, so whitening is `w = W e` and the whitened residual is
//! standard normal. Unit, isotropic and diagonal models keep their compact form.

use nalgebra::{DMatrix, DVector};

use crate::errors::HybridError;

#[derive(Debug, Clone, PartialEq)]
pub enum NoiseModel {
    /// `Σ = I`.
    Unit { dim: usize },
    /// `Σ = σ² I`.
    Isotropic { dim: usize, sigma: f64 },
    /// `Σ = diag(σ²)`.
    Diagonal { sigmas: DVector<f64> },
    /// Full covariance; `sqrt_covariance = W⁻¹`.
    Gaussian {
        sqrt_information: DMatrix<f64>,
        sqrt_covariance: DMatrix<f64>,
    },
}

fn check_sigma(sigma: f64) -> Result<(), HybridError> {
    if sigma.is_finite() && sigma > 0.0 {
        Ok(())
    } else {
        Err(HybridError::ValidationError(format!(
            "noise sigma must be finite and > 0, got {}",
            sigma
        )))
    }
}

fn check_square(matrix: &DMatrix<f64>, context: &str) -> Result<(), HybridError> {
    if matrix.nrows() == matrix.ncols() {
        Ok(())
    } else {
        Err(HybridError::dimension(context, matrix.nrows(), matrix.ncols()))
    }
}

impl NoiseModel {
    pub fn unit(dim: usize) -> Self {
        NoiseModel::Unit { dim }
    }

    pub fn isotropic(dim: usize, sigma: f64) -> Result<Self, HybridError> {
        check_sigma(sigma)?;
        Ok(NoiseModel::Isotropic { dim, sigma })
    }

    pub fn diagonal(sigmas: DVector<f64>) -> Result<Self, HybridError> {
        for sigma in sigmas.iter() {
            check_sigma(*sigma)?;
        }
        Ok(NoiseModel::Diagonal { sigmas })
    }

    /// Full model from a symmetric positive-definite covariance.
    pub fn from_covariance(covariance: DMatrix<f64>) -> Result<Self, HybridError> {
        check_square(&covariance, "covariance")?;
        let cholesky = covariance.cholesky().ok_or_else(|| {
            HybridError::ValidationError("covariance must be symmetric positive definite".into())
        })?;
        let sqrt_covariance = cholesky.l();
        let sqrt_information = sqrt_covariance.clone().try_inverse().ok_or_else(|| {
            HybridError::Numerical("covariance square root is not invertible".into())
        })?;
        Ok(NoiseModel::Gaussian {
            sqrt_information,
            sqrt_covariance,
        })
    }

    /// Full model from a symmetric positive-definite information matrix.
    pub fn from_information(information: DMatrix<f64>) -> Result<Self, HybridError> {
        check_square(&information, "information")?;
        let cholesky = information.cholesky().ok_or_else(|| {
            HybridError::ValidationError("information must be symmetric positive definite".into())
        })?;
        let sqrt_information = cholesky.l().transpose();
        let sqrt_covariance = sqrt_information.clone().try_inverse().ok_or_else(|| {
            HybridError::Numerical("information square root is not invertible".into())
        })?;
        Ok(NoiseModel::Gaussian {
            sqrt_information,
            sqrt_covariance,
        })
    }

    pub fn dim(&self) -> usize {
        match self {
            NoiseModel::Unit { dim } | NoiseModel::Isotropic { dim, .. } => *dim,
            NoiseModel::Diagonal { sigmas } => sigmas.len(),
            NoiseModel::Gaussian {
                sqrt_information, ..
            } => sqrt_information.nrows(),
        }
    }

    /// `W e`.
    pub fn whiten(&self, e: &DVector<f64>) -> DVector<f64> {
        match self {
            NoiseModel::Unit { .. } => e.clone(),
            NoiseModel::Isotropic { sigma, .. } => e / *sigma,
            NoiseModel::Diagonal { sigmas } => e.component_div(sigmas),
            NoiseModel::Gaussian {
                sqrt_information, ..
            } => sqrt_information * e,
        }
    }

    /// `W⁻¹ z`: maps a standard-normal draw to a noise sample.
    pub fn unwhiten(&self, z: &DVector<f64>) -> DVector<f64> {
        match self {
            NoiseModel::Unit { .. } => z.clone(),
            NoiseModel::Isotropic { sigma, .. } => z * *sigma,
            NoiseModel::Diagonal { sigmas } => z.component_mul(sigmas),
            NoiseModel::Gaussian {
                sqrt_covariance, ..
            } => sqrt_covariance * z,
        }
    }

    /// Squared Mahalanobis norm `eᵀ Σ⁻¹ e`.
    pub fn squared_mahalanobis(&self, e: &DVector<f64>) -> f64 {
        self.whiten(e).norm_squared()
    }

    /// `ln |det W|`.
    pub fn log_det_sqrt_information(&self) -> f64 {
        match self {
            NoiseModel::Unit { .. } => 0.0,
            NoiseModel::Isotropic { dim, sigma } => -(*dim as f64) * sigma.ln(),
            NoiseModel::Diagonal { sigmas } => -sigmas.iter().map(|s| s.ln()).sum::<f64>(),
            NoiseModel::Gaussian {
                sqrt_information, ..
            } => sqrt_information
                .clone()
                .lu()
                .u()
                .diagonal()
                .iter()
                .map(|u| u.abs().ln())
                .sum(),
        }
    }

    pub fn equals(&self, other: &NoiseModel, tol: f64) -> bool {
        match (self, other) {
            (NoiseModel::Unit { dim: a }, NoiseModel::Unit { dim: b }) => a == b,
            (
                NoiseModel::Isotropic { dim: a, sigma: sa },
                NoiseModel::Isotropic { dim: b, sigma: sb },
            ) => a == b && (sa - sb).abs() <= tol,
            (NoiseModel::Diagonal { sigmas: a }, NoiseModel::Diagonal { sigmas: b }) => {
                a.len() == b.len() && (a - b).amax() <= tol
            }
            (
                NoiseModel::Gaussian {
                    sqrt_information: a,
                    ..
                },
                NoiseModel::Gaussian {
                    sqrt_information: b,
                    ..
                },
            ) => a.shape() == b.shape() && (a - b).amax() <= tol,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isotropic_rejects_non_positive_sigma() {
        assert!(NoiseModel::isotropic(2, 0.0).is_err());
        assert!(NoiseModel::isotropic(2, f64::NAN).is_err());
    }

    #[test]
    fn diagonal_whitens_per_component() {
        let model = NoiseModel::diagonal(DVector::from_vec(vec![2.0, 0.5])).expect("model");
        let w = model.whiten(&DVector::from_vec(vec![4.0, 1.0]));
        assert_eq!(w, DVector::from_vec(vec![2.0, 2.0]));
        assert!((model.squared_mahalanobis(&DVector::from_vec(vec![4.0, 1.0])) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn whiten_and_unwhiten_are_inverse() {
        let cov = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 2.0]);
        let model = NoiseModel::from_covariance(cov).expect("model");
        let e = DVector::from_vec(vec![0.3, -1.2]);
        let back = model.unwhiten(&model.whiten(&e));
        assert!((back - e).amax() < 1e-12);
    }

    #[test]
    fn covariance_and_information_forms_agree() {
        let cov = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 2.0]);
        let info = cov.clone().try_inverse().expect("invertible");
        let from_cov = NoiseModel::from_covariance(cov).expect("cov");
        let from_info = NoiseModel::from_information(info).expect("info");

        let e = DVector::from_vec(vec![1.0, 2.0]);
        assert!((from_cov.squared_mahalanobis(&e) - from_info.squared_mahalanobis(&e)).abs() < 1e-9);
        assert!(
            (from_cov.log_det_sqrt_information() - from_info.log_det_sqrt_information()).abs()
                < 1e-9
        );
    }

    #[test]
    fn log_det_matches_isotropic_closed_form() {
        let model = NoiseModel::isotropic(3, 2.0).expect("model");
        assert!((model.log_det_sqrt_information() + 3.0 * 2.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn from_covariance_rejects_indefinite_matrix() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(NoiseModel::from_covariance(cov).is_err());
    }
}
