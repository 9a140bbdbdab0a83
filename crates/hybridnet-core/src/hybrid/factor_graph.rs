//! Hybrid Gaussian factor graphs.
//!
//! A [`HybridGaussianFactorGraph`] is the factor form of a hybrid Bayes net,
//! typically produced by conditioning on measurements. Its unnormalized
//! probability is the product of all factor values; each converted factor
//! carries the log normalization constant of its source conditional.

use std::collections::BTreeSet;

use crate::discrete::table::{DecisionTable, DiscreteDomain, DiscreteKeys};
use crate::errors::HybridError;
use crate::hybrid::mixture::GaussianMixtureFactor;
use crate::keys::Key;
use crate::linear::factor::JacobianFactor;
use crate::values::{HybridValues, VectorValues};

#[derive(Debug, Clone, PartialEq)]
pub enum HybridFactor {
    /// A non-negative table over discrete keys.
    Discrete(DecisionTable),
    /// A Gaussian factor over continuous keys.
    Gaussian(JacobianFactor),
    /// One Gaussian factor per discrete assignment.
    Mixture(GaussianMixtureFactor),
}

impl HybridFactor {
    pub fn discrete_keys(&self) -> DiscreteKeys {
        match self {
            HybridFactor::Discrete(t) => t.keys().iter().copied().collect(),
            HybridFactor::Gaussian(_) => DiscreteKeys::new(),
            HybridFactor::Mixture(m) => m.discrete_keys().iter().copied().collect(),
        }
    }

    pub fn continuous_keys(&self) -> Vec<Key> {
        match self {
            HybridFactor::Discrete(_) => Vec::new(),
            HybridFactor::Gaussian(f) => f.keys(),
            HybridFactor::Mixture(m) => m.continuous_keys().to_vec(),
        }
    }

    /// `−ln` of a discrete factor or the quadratic error of a Gaussian one.
    pub fn error(&self, values: &HybridValues) -> Result<f64, HybridError> {
        match self {
            HybridFactor::Discrete(t) => Ok(-t.value(values.discrete())?.ln()),
            HybridFactor::Gaussian(f) => f.error(values.continuous()),
            HybridFactor::Mixture(m) => m.error(values),
        }
    }

    /// Log of the factor value, including any log normalization constant.
    pub fn log_value(&self, values: &HybridValues) -> Result<f64, HybridError> {
        match self {
            HybridFactor::Discrete(t) => Ok(t.value(values.discrete())?.ln()),
            HybridFactor::Gaussian(f) => f.log_value(values.continuous()),
            HybridFactor::Mixture(m) => m.log_value(values),
        }
    }

    pub fn error_table(&self, continuous: &VectorValues) -> Result<DecisionTable, HybridError> {
        match self {
            HybridFactor::Discrete(t) => Ok(t.apply(|v| -v.ln())),
            HybridFactor::Gaussian(f) => Ok(DecisionTable::constant(f.error(continuous)?)),
            HybridFactor::Mixture(m) => m.error_table(continuous),
        }
    }

    pub fn log_value_table(&self, continuous: &VectorValues) -> Result<DecisionTable, HybridError> {
        match self {
            HybridFactor::Discrete(t) => Ok(t.apply(f64::ln)),
            HybridFactor::Gaussian(f) => Ok(DecisionTable::constant(f.log_value(continuous)?)),
            HybridFactor::Mixture(m) => m.log_value_table(continuous),
        }
    }
}

impl From<DecisionTable> for HybridFactor {
    fn from(table: DecisionTable) -> Self {
        HybridFactor::Discrete(table)
    }
}

impl From<JacobianFactor> for HybridFactor {
    fn from(factor: JacobianFactor) -> Self {
        HybridFactor::Gaussian(factor)
    }
}

impl From<GaussianMixtureFactor> for HybridFactor {
    fn from(factor: GaussianMixtureFactor) -> Self {
        HybridFactor::Mixture(factor)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridGaussianFactorGraph {
    factors: Vec<HybridFactor>,
}

impl HybridGaussianFactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, factor: impl Into<HybridFactor>) {
        self.factors.push(factor.into());
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&HybridFactor> {
        self.factors.get(index)
    }

    pub fn factors(&self) -> &[HybridFactor] {
        &self.factors
    }

    pub fn iter(&self) -> impl Iterator<Item = &HybridFactor> + '_ {
        self.factors.iter()
    }

    /// Union of the discrete keys of all factors, sorted by key.
    pub fn discrete_keys(&self) -> Result<DiscreteKeys, HybridError> {
        let mut domain = DiscreteDomain::empty();
        for factor in &self.factors {
            domain = domain.union(&DiscreteDomain::new(factor.discrete_keys())?)?;
        }
        Ok(domain.keys().iter().copied().collect())
    }

    /// Union of the continuous keys of all factors, sorted by key.
    pub fn continuous_keys(&self) -> Vec<Key> {
        self.factors
            .iter()
            .flat_map(HybridFactor::continuous_keys)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// `Σ` factor errors.
    pub fn error(&self, values: &HybridValues) -> Result<f64, HybridError> {
        self.factors.iter().map(|f| f.error(values)).sum()
    }

    /// Unnormalized probability `Π` factor values.
    pub fn prob_prime(&self, values: &HybridValues) -> Result<f64, HybridError> {
        let log_value: f64 = self
            .factors
            .iter()
            .map(|f| f.log_value(values))
            .sum::<Result<f64, HybridError>>()?;
        Ok(log_value.exp())
    }

    /// `error` for every discrete assignment at fixed continuous values.
    pub fn error_tree(&self, continuous: &VectorValues) -> Result<DecisionTable, HybridError> {
        self.factors
            .iter()
            .try_fold(DecisionTable::constant(0.0), |acc, f| {
                acc.add(&f.error_table(continuous)?)
            })
    }

    /// `prob_prime` for every discrete assignment at fixed continuous values.
    pub fn prob_prime_tree(&self, continuous: &VectorValues) -> Result<DecisionTable, HybridError> {
        let log_values = self
            .factors
            .iter()
            .try_fold(DecisionTable::constant(0.0), |acc, f| {
                acc.add(&f.log_value_table(continuous)?)
            })?;
        Ok(log_values.apply(f64::exp))
    }
}

impl FromIterator<HybridFactor> for HybridGaussianFactorGraph {
    fn from_iter<I: IntoIterator<Item = HybridFactor>>(iter: I) -> Self {
        Self {
            factors: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{symbol, DiscreteKey};
    use crate::linear::noise::NoiseModel;
    use nalgebra::{DMatrix, DVector};

    fn mode() -> DiscreteKey {
        DiscreteKey::new(symbol('m', 0), 2)
    }

    fn graph() -> HybridGaussianFactorGraph {
        let x = symbol('x', 0);
        let prior = DecisionTable::new([mode()], vec![0.25, 0.75]).expect("prior");
        let unary = JacobianFactor::new(
            [(x, DMatrix::identity(1, 1))],
            DVector::from_element(1, 1.0),
            NoiseModel::unit(1),
        )
        .expect("unary");
        let switched = GaussianMixtureFactor::new(
            vec![x],
            [mode()],
            vec![
                Some(
                    JacobianFactor::new(
                        [(x, DMatrix::identity(1, 1))],
                        DVector::zeros(1),
                        NoiseModel::unit(1),
                    )
                    .expect("f0"),
                ),
                Some(
                    JacobianFactor::new(
                        [(x, DMatrix::identity(1, 1))],
                        DVector::from_element(1, 4.0),
                        NoiseModel::unit(1),
                    )
                    .expect("f1")
                    .with_log_constant(-0.5),
                ),
            ],
        )
        .expect("switched");

        let mut graph = HybridGaussianFactorGraph::new();
        graph.push(prior);
        graph.push(unary);
        graph.push(switched);
        graph
    }

    #[test]
    fn keys_are_collected_from_all_factors() {
        let graph = graph();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.discrete_keys().expect("keys").as_slice(), &[mode()]);
        assert_eq!(graph.continuous_keys(), vec![symbol('x', 0)]);
    }

    #[test]
    fn error_tree_leaves_match_pointwise_error() {
        let graph = graph();
        let mut continuous = VectorValues::new();
        continuous.insert_scalar(symbol('x', 0), 2.0);

        let tree = graph.error_tree(&continuous).expect("tree");
        for (assignment, leaf) in tree.iter() {
            let values = HybridValues::new(continuous.clone(), assignment);
            assert!((leaf - graph.error(&values).expect("error")).abs() < 1e-12);
        }
    }

    #[test]
    fn prob_prime_tree_includes_log_constants() {
        let graph = graph();
        let mut continuous = VectorValues::new();
        continuous.insert_scalar(symbol('x', 0), 2.0);

        let tree = graph.prob_prime_tree(&continuous).expect("tree");
        // m=0: 0.25 * exp(-0.5) * exp(-2); m=1: 0.75 * exp(-0.5) * exp(-0.5 - 2)
        assert!((tree.values()[0] - 0.25 * (-2.5f64).exp()).abs() < 1e-12);
        assert!((tree.values()[1] - 0.75 * (-3.0f64).exp()).abs() < 1e-12);

        for (assignment, leaf) in tree.iter() {
            let values = HybridValues::new(continuous.clone(), assignment);
            assert!((leaf - graph.prob_prime(&values).expect("prob")).abs() < 1e-12);
        }
    }

    #[test]
    fn empty_graph_has_unit_probability() {
        let graph = HybridGaussianFactorGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.prob_prime(&HybridValues::default()), Ok(1.0));
        assert_eq!(graph.error(&HybridValues::default()), Ok(0.0));
    }
}
