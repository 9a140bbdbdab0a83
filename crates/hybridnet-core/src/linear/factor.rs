//! Whitened linear least-squares factors.

use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;

use crate::errors::HybridError;
use crate::keys::Key;
use crate::linear::noise::NoiseModel;
use crate::values::VectorValues;

/// Coefficient blocks keyed by variable.
pub type Terms = SmallVec<[(Key, DMatrix<f64>); 4]>;

/// A Gaussian factor `φ(x) = exp(c − ½‖W(Σ Aⱼ xⱼ − b)‖²)`.
///
/// `c` is the log normalization constant inherited from the conditional the
/// factor was derived from (zero for factors built directly), so the product
/// of converted factors equals the source net's joint density.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianFactor {
    terms: Terms,
    b: DVector<f64>,
    noise: NoiseModel,
    log_constant: f64,
}

impl JacobianFactor {
    pub fn new(
        terms: impl IntoIterator<Item = (Key, DMatrix<f64>)>,
        b: DVector<f64>,
        noise: NoiseModel,
    ) -> Result<Self, HybridError> {
        let terms: Terms = terms.into_iter().collect();
        let rows = b.len();
        if noise.dim() != rows {
            return Err(HybridError::dimension("factor noise model", rows, noise.dim()));
        }
        for (i, (key, a)) in terms.iter().enumerate() {
            if a.nrows() != rows {
                return Err(HybridError::dimension(
                    format!("factor block for {}", key),
                    rows,
                    a.nrows(),
                ));
            }
            if terms[..i].iter().any(|(other, _)| other == key) {
                return Err(HybridError::ValidationError(format!(
                    "factor lists key {} twice",
                    key
                )));
            }
        }
        Ok(Self {
            terms,
            b,
            noise,
            log_constant: 0.0,
        })
    }

    pub fn with_log_constant(mut self, log_constant: f64) -> Self {
        self.log_constant = log_constant;
        self
    }

    pub fn keys(&self) -> Vec<Key> {
        self.terms.iter().map(|(key, _)| *key).collect()
    }

    pub fn terms(&self) -> &[(Key, DMatrix<f64>)] {
        &self.terms
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    pub fn log_constant(&self) -> f64 {
        self.log_constant
    }

    pub fn rows(&self) -> usize {
        self.b.len()
    }

    /// `Σ Aⱼ xⱼ − b`.
    pub fn unwhitened_error(&self, values: &VectorValues) -> Result<DVector<f64>, HybridError> {
        let mut residual = -&self.b;
        for (key, a) in &self.terms {
            let x = values.at(*key)?;
            if x.len() != a.ncols() {
                return Err(HybridError::dimension(
                    format!("value of {}", key),
                    a.ncols(),
                    x.len(),
                ));
            }
            residual += a * x;
        }
        Ok(residual)
    }

    /// `½‖W(Σ Aⱼ xⱼ − b)‖²`.
    pub fn error(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(0.5 * self.noise.squared_mahalanobis(&self.unwhitened_error(values)?))
    }

    /// `c − error`.
    pub fn log_value(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(self.log_constant - self.error(values)?)
    }

    pub fn evaluate(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(self.log_value(values)?.exp())
    }

    pub fn equals(&self, other: &JacobianFactor, tol: f64) -> bool {
        self.terms.len() == other.terms.len()
            && self
                .terms
                .iter()
                .zip(&other.terms)
                .all(|((ka, a), (kb, b))| {
                    ka == kb && a.shape() == b.shape() && (a - b).amax() <= tol
                })
            && self.b.len() == other.b.len()
            && (&self.b - &other.b).amax() <= tol
            && self.noise.equals(&other.noise, tol)
            && (self.log_constant - other.log_constant).abs() <= tol
    }
}
