//! Purely continuous Bayes nets of Gaussian conditionals.

use rand::Rng;

use crate::errors::HybridError;
use crate::linear::conditional::GaussianConditional;
use crate::values::VectorValues;

/// An ordered list of Gaussian conditionals in elimination order.
///
/// Each conditional's parents are frontal in a later conditional (or
/// exogenous), so solving and sampling walk the list in reverse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaussianBayesNet {
    conditionals: Vec<GaussianConditional>,
}

impl GaussianBayesNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, conditional: GaussianConditional) {
        self.conditionals.push(conditional);
    }

    pub fn len(&self) -> usize {
        self.conditionals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&GaussianConditional> {
        self.conditionals.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GaussianConditional> + '_ {
        self.conditionals.iter()
    }

    /// The mean of the joint density, by back-substitution.
    pub fn optimize(&self) -> Result<VectorValues, HybridError> {
        self.optimize_given(&VectorValues::new())
    }

    /// Back-substitution with exogenous parents taken from `given`.
    ///
    /// The result holds the solved frontal values only.
    pub fn optimize_given(&self, given: &VectorValues) -> Result<VectorValues, HybridError> {
        let mut known = given.clone();
        let mut solution = VectorValues::new();
        for conditional in self.conditionals.iter().rev() {
            let frontals = conditional.solve(&known)?;
            known.update(&frontals);
            solution.update(&frontals);
        }
        Ok(solution)
    }

    /// `Σ` conditional errors.
    pub fn error(&self, values: &VectorValues) -> Result<f64, HybridError> {
        self.conditionals
            .iter()
            .map(|c| c.error(values))
            .sum()
    }

    pub fn log_density(&self, values: &VectorValues) -> Result<f64, HybridError> {
        self.conditionals
            .iter()
            .map(|c| c.log_density(values))
            .sum()
    }

    pub fn evaluate(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(self.log_density(values)?.exp())
    }

    /// Ancestral sample of every frontal variable.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<VectorValues, HybridError> {
        self.sample_given(&VectorValues::new(), rng)
    }

    /// Ancestral sample; conditionals whose frontals are all in `given` keep
    /// the given values. The result includes `given`.
    pub fn sample_given<R: Rng + ?Sized>(
        &self,
        given: &VectorValues,
        rng: &mut R,
    ) -> Result<VectorValues, HybridError> {
        let mut result = given.clone();
        for conditional in self.conditionals.iter().rev() {
            if conditional.frontals_in(given) {
                continue;
            }
            let sampled = conditional.sample(&result, rng)?;
            result.update(&sampled);
        }
        Ok(result)
    }

    pub fn equals(&self, other: &GaussianBayesNet, tol: f64) -> bool {
        self.len() == other.len()
            && self
                .conditionals
                .iter()
                .zip(&other.conditionals)
                .all(|(a, b)| a.equals(b, tol))
    }
}

impl FromIterator<GaussianConditional> for GaussianBayesNet {
    fn from_iter<I: IntoIterator<Item = GaussianConditional>>(iter: I) -> Self {
        Self {
            conditionals: iter.into_iter().collect(),
        }
    }
}
