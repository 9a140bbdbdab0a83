//! Linear-Gaussian conditionals.
//!
//! A [`GaussianConditional`] encodes `P(x | y)` through
//!
//! ```text
//! R x + Σⱼ Sⱼ yⱼ = d + e,   e ~ N(0, Σ)
//! ```
//!
//! where `x` stacks the frontal variables, `R` is square over that block and
//! `Σ` comes from the [`NoiseModel`]. The mean given the parents is obtained by
//! back-substitution, `x = R⁻¹(d − S y)`.

use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use smallvec::SmallVec;

use crate::errors::HybridError;
use crate::keys::Key;
use crate::linear::factor::{JacobianFactor, Terms};
use crate::linear::noise::NoiseModel;
use crate::values::VectorValues;

/// `½ ln(2π)`.
const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianConditional {
    frontals: SmallVec<[(Key, usize); 2]>,
    parents: Terms,
    r: DMatrix<f64>,
    d: DVector<f64>,
    noise: NoiseModel,
}

impl GaussianConditional {
    /// Builds `R x + Σ Sⱼ yⱼ = d + e`.
    ///
    /// `frontals` lists the frontal keys with their dimensions in the order
    /// they are stacked in `x`.
    pub fn new(
        frontals: impl IntoIterator<Item = (Key, usize)>,
        r: DMatrix<f64>,
        parents: impl IntoIterator<Item = (Key, DMatrix<f64>)>,
        d: DVector<f64>,
        noise: NoiseModel,
    ) -> Result<Self, HybridError> {
        let frontals: SmallVec<[(Key, usize); 2]> = frontals.into_iter().collect();
        let parents: Terms = parents.into_iter().collect();
        let n: usize = frontals.iter().map(|(_, dim)| dim).sum();

        if frontals.is_empty() || n == 0 {
            return Err(HybridError::ValidationError(
                "gaussian conditional needs a non-empty frontal block".into(),
            ));
        }
        if r.nrows() != n || r.ncols() != n {
            return Err(HybridError::dimension(
                "frontal block R",
                n,
                if r.nrows() != n { r.nrows() } else { r.ncols() },
            ));
        }
        if d.len() != n {
            return Err(HybridError::dimension("right-hand side d", n, d.len()));
        }
        if noise.dim() != n {
            return Err(HybridError::dimension("conditional noise model", n, noise.dim()));
        }
        for (key, s) in &parents {
            if s.nrows() != n {
                return Err(HybridError::dimension(
                    format!("parent block for {}", key),
                    n,
                    s.nrows(),
                ));
            }
        }

        let mut seen: Vec<Key> = Vec::with_capacity(frontals.len() + parents.len());
        for key in frontals
            .iter()
            .map(|(k, _)| *k)
            .chain(parents.iter().map(|(k, _)| *k))
        {
            if seen.contains(&key) {
                return Err(HybridError::ValidationError(format!(
                    "gaussian conditional lists key {} twice",
                    key
                )));
            }
            seen.push(key);
        }

        Ok(Self {
            frontals,
            parents,
            r,
            d,
            noise,
        })
    }

    /// `x ~ N(mean, σ² I)`.
    pub fn from_mean_and_stddev(
        key: Key,
        mean: DVector<f64>,
        sigma: f64,
    ) -> Result<Self, HybridError> {
        let n = mean.len();
        Self::new(
            [(key, n)],
            DMatrix::identity(n, n),
            Vec::new(),
            mean,
            NoiseModel::isotropic(n, sigma)?,
        )
    }

    /// `x ~ N(mean, covariance)`.
    pub fn from_mean_and_covariance(
        key: Key,
        mean: DVector<f64>,
        covariance: DMatrix<f64>,
    ) -> Result<Self, HybridError> {
        let n = mean.len();
        Self::new(
            [(key, n)],
            DMatrix::identity(n, n),
            Vec::new(),
            mean,
            NoiseModel::from_covariance(covariance)?,
        )
    }

    /// `x = Σ Aⱼ yⱼ + offset + e`.
    pub fn linear(
        key: Key,
        terms: impl IntoIterator<Item = (Key, DMatrix<f64>)>,
        offset: DVector<f64>,
        noise: NoiseModel,
    ) -> Result<Self, HybridError> {
        let n = offset.len();
        Self::new(
            [(key, n)],
            DMatrix::identity(n, n),
            terms.into_iter().map(|(k, a)| (k, -a)),
            offset,
            noise,
        )
    }

    pub fn frontals(&self) -> &[(Key, usize)] {
        &self.frontals
    }

    pub fn parents(&self) -> &[(Key, DMatrix<f64>)] {
        &self.parents
    }

    pub fn frontal_keys(&self) -> Vec<Key> {
        self.frontals.iter().map(|(key, _)| *key).collect()
    }

    pub fn parent_keys(&self) -> Vec<Key> {
        self.parents.iter().map(|(key, _)| *key).collect()
    }

    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    pub fn d(&self) -> &DVector<f64> {
        &self.d
    }

    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    /// Dimension of the frontal block.
    pub fn dim(&self) -> usize {
        self.d.len()
    }

    /// Whether every frontal key has a value.
    pub fn frontals_in(&self, values: &VectorValues) -> bool {
        self.frontals.iter().all(|(key, _)| values.contains(*key))
    }

    /// Whether two conditionals share frontal keys, dimensions and parent keys.
    pub fn same_structure(&self, other: &GaussianConditional) -> bool {
        self.frontals == other.frontals
            && self.parents.len() == other.parents.len()
            && self
                .parents
                .iter()
                .zip(&other.parents)
                .all(|((ka, a), (kb, b))| ka == kb && a.ncols() == b.ncols())
    }

    fn stacked_frontals(&self, values: &VectorValues) -> Result<DVector<f64>, HybridError> {
        let mut x = DVector::zeros(self.dim());
        let mut offset = 0;
        for (key, dim) in &self.frontals {
            let value = values.at(*key)?;
            if value.len() != *dim {
                return Err(HybridError::dimension(
                    format!("value of {}", key),
                    *dim,
                    value.len(),
                ));
            }
            x.rows_mut(offset, *dim).copy_from(value);
            offset += dim;
        }
        Ok(x)
    }

    /// `Σ Sⱼ yⱼ`.
    fn parent_contribution(&self, values: &VectorValues) -> Result<DVector<f64>, HybridError> {
        let mut total = DVector::zeros(self.dim());
        for (key, s) in &self.parents {
            let y = values.at(*key)?;
            if y.len() != s.ncols() {
                return Err(HybridError::dimension(
                    format!("value of {}", key),
                    s.ncols(),
                    y.len(),
                ));
            }
            total += s * y;
        }
        Ok(total)
    }

    fn split_frontals(&self, x: &DVector<f64>) -> VectorValues {
        let mut offset = 0;
        self.frontals
            .iter()
            .map(|(key, dim)| {
                let value = x.rows(offset, *dim).into_owned();
                offset += dim;
                (*key, value)
            })
            .collect()
    }

    fn first_frontal(&self) -> Key {
        self.frontals[0].0
    }

    /// LU of `R`; singular blocks fail with `UnderdeterminedSystem`.
    fn frontal_lu(&self) -> Result<LU<f64, Dyn, Dyn>, HybridError> {
        let lu = self.r.clone().lu();
        if !lu.is_invertible() {
            return Err(HybridError::UnderdeterminedSystem {
                key: self.first_frontal(),
            });
        }
        Ok(lu)
    }

    fn solve_frontal_block(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, HybridError> {
        self.frontal_lu()?
            .solve(rhs)
            .ok_or(HybridError::UnderdeterminedSystem {
                key: self.first_frontal(),
            })
    }

    /// `R x + S y − d` at the given values.
    pub fn residual(&self, values: &VectorValues) -> Result<DVector<f64>, HybridError> {
        let x = self.stacked_frontals(values)?;
        Ok(&self.r * x + self.parent_contribution(values)? - &self.d)
    }

    /// `½‖W(R x + S y − d)‖²`.
    pub fn error(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(0.5 * self.noise.squared_mahalanobis(&self.residual(values)?))
    }

    /// `ln k` with `P(x | y) = k · exp(−error)`.
    ///
    /// Fails with `UnderdeterminedSystem` when `R` is singular, since the
    /// conditional then has no density.
    pub fn log_normalization_constant(&self) -> Result<f64, HybridError> {
        // ln|det R| as the sum of log pivots; det R itself may not be representable.
        let log_det: f64 = self
            .frontal_lu()?
            .u()
            .diagonal()
            .iter()
            .map(|u| u.abs().ln())
            .sum();
        Ok(-(self.dim() as f64) * LOG_SQRT_2PI + log_det + self.noise.log_det_sqrt_information())
    }

    pub fn log_density(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(self.log_normalization_constant()? - self.error(values)?)
    }

    /// Probability density of the frontal values given the parents.
    pub fn evaluate(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(self.log_density(values)?.exp())
    }

    /// Back-substitution: the frontal values that satisfy `R x = d − S y`.
    pub fn solve(&self, parents: &VectorValues) -> Result<VectorValues, HybridError> {
        let rhs = &self.d - self.parent_contribution(parents)?;
        let x = self.solve_frontal_block(&rhs)?;
        Ok(self.split_frontals(&x))
    }

    /// Draws the frontal values given the parents.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        parents: &VectorValues,
        rng: &mut R,
    ) -> Result<VectorValues, HybridError> {
        let z: DVector<f64> = DVector::from_fn(self.dim(), |_, _| StandardNormal.sample(&mut *rng));
        let rhs = &self.d - self.parent_contribution(parents)? + self.noise.unwhiten(&z);
        let x = self.solve_frontal_block(&rhs)?;
        Ok(self.split_frontals(&x))
    }

    /// The likelihood `L(y) = P(x = measurement | y)` as a factor on the parents.
    pub fn likelihood(&self, measurements: &VectorValues) -> Result<JacobianFactor, HybridError> {
        let x = self.stacked_frontals(measurements)?;
        let b = &self.d - &self.r * x;
        Ok(
            JacobianFactor::new(self.parents.iter().cloned(), b, self.noise.clone())?
                .with_log_constant(self.log_normalization_constant()?),
        )
    }

    /// The conditional as a factor over all of its keys.
    pub fn to_factor(&self) -> Result<JacobianFactor, HybridError> {
        let mut terms: Terms = SmallVec::new();
        let mut offset = 0;
        for (key, dim) in &self.frontals {
            terms.push((*key, self.r.columns(offset, *dim).into_owned()));
            offset += dim;
        }
        terms.extend(self.parents.iter().cloned());
        Ok(
            JacobianFactor::new(terms, self.d.clone(), self.noise.clone())?
                .with_log_constant(self.log_normalization_constant()?),
        )
    }

    pub fn equals(&self, other: &GaussianConditional, tol: f64) -> bool {
        self.same_structure(other)
            && (&self.r - &other.r).amax() <= tol
            && (&self.d - &other.d).amax() <= tol
            && self
                .parents
                .iter()
                .zip(&other.parents)
                .all(|((_, a), (_, b))| a.shape() == b.shape() && (a - b).amax() <= tol)
            && self.noise.equals(&other.noise, tol)
    }
}
