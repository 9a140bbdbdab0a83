//! The closed set of conditionals a hybrid Bayes net can hold.

use crate::discrete::conditional::DiscreteConditional;
use crate::discrete::table::{DecisionTable, DiscreteKeys};
use crate::errors::HybridError;
use crate::hybrid::mixture::GaussianMixture;
use crate::keys::Key;
use crate::linear::conditional::GaussianConditional;
use crate::values::{DiscreteValues, HybridValues, VectorValues};

/// Shared query surface of every conditional kind.
pub trait Conditional {
    fn frontal_keys(&self) -> Vec<Key>;

    fn parent_keys(&self) -> Vec<Key>;

    /// Frontals followed by parents.
    fn keys(&self) -> Vec<Key> {
        let mut keys = self.frontal_keys();
        keys.extend(self.parent_keys());
        keys
    }

    /// Probability (mass or density) of the frontal values given the parents.
    fn evaluate(&self, values: &HybridValues) -> Result<f64, HybridError>;

    /// Negative log probability for discrete conditionals, quadratic error
    /// for Gaussian ones.
    fn error(&self, values: &HybridValues) -> Result<f64, HybridError>;
}

impl Conditional for DiscreteConditional {
    fn frontal_keys(&self) -> Vec<Key> {
        DiscreteConditional::frontal_keys(self)
    }

    fn parent_keys(&self) -> Vec<Key> {
        DiscreteConditional::parent_keys(self)
    }

    fn evaluate(&self, values: &HybridValues) -> Result<f64, HybridError> {
        DiscreteConditional::evaluate(self, values.discrete())
    }

    fn error(&self, values: &HybridValues) -> Result<f64, HybridError> {
        DiscreteConditional::error(self, values.discrete())
    }
}

impl Conditional for GaussianConditional {
    fn frontal_keys(&self) -> Vec<Key> {
        GaussianConditional::frontal_keys(self)
    }

    fn parent_keys(&self) -> Vec<Key> {
        GaussianConditional::parent_keys(self)
    }

    fn evaluate(&self, values: &HybridValues) -> Result<f64, HybridError> {
        GaussianConditional::evaluate(self, values.continuous())
    }

    fn error(&self, values: &HybridValues) -> Result<f64, HybridError> {
        GaussianConditional::error(self, values.continuous())
    }
}

impl Conditional for GaussianMixture {
    fn frontal_keys(&self) -> Vec<Key> {
        GaussianMixture::frontal_keys(self)
    }

    fn parent_keys(&self) -> Vec<Key> {
        GaussianMixture::parent_keys(self)
    }

    fn evaluate(&self, values: &HybridValues) -> Result<f64, HybridError> {
        GaussianMixture::evaluate(self, values)
    }

    fn error(&self, values: &HybridValues) -> Result<f64, HybridError> {
        GaussianMixture::error(self, values)
    }
}

/// A conditional in a hybrid Bayes net.
#[derive(Debug, Clone, PartialEq)]
pub enum HybridConditional {
    /// `P(m | parents)` over discrete keys only.
    Discrete(DiscreteConditional),
    /// `P(x | y)` over continuous keys only.
    Gaussian(GaussianConditional),
    /// `P(x | y, m)` switched by discrete parents.
    Mixture(GaussianMixture),
}

impl HybridConditional {
    pub fn is_discrete(&self) -> bool {
        matches!(self, HybridConditional::Discrete(_))
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self, HybridConditional::Gaussian(_))
    }

    pub fn is_hybrid(&self) -> bool {
        matches!(self, HybridConditional::Mixture(_))
    }

    pub fn as_discrete(&self) -> Option<&DiscreteConditional> {
        match self {
            HybridConditional::Discrete(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_gaussian(&self) -> Option<&GaussianConditional> {
        match self {
            HybridConditional::Gaussian(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_mixture(&self) -> Option<&GaussianMixture> {
        match self {
            HybridConditional::Mixture(c) => Some(c),
            _ => None,
        }
    }

    /// Discrete keys, frontals first for discrete conditionals and the
    /// switching parents for mixtures.
    pub fn discrete_keys(&self) -> DiscreteKeys {
        match self {
            HybridConditional::Discrete(c) => c.discrete_keys(),
            HybridConditional::Gaussian(_) => DiscreteKeys::new(),
            HybridConditional::Mixture(m) => m.discrete_parents().iter().copied().collect(),
        }
    }

    /// Continuous keys, frontals first.
    pub fn continuous_keys(&self) -> Vec<Key> {
        match self {
            HybridConditional::Discrete(_) => Vec::new(),
            HybridConditional::Gaussian(c) => Conditional::keys(c),
            HybridConditional::Mixture(m) => m.continuous_keys(),
        }
    }

    /// Whether every frontal variable has a value of its kind.
    pub fn frontals_in(&self, values: &HybridValues) -> bool {
        match self {
            HybridConditional::Discrete(c) => c
                .frontals()
                .iter()
                .all(|dk| values.discrete().contains_key(&dk.key)),
            HybridConditional::Gaussian(c) => c.frontals_in(values.continuous()),
            HybridConditional::Mixture(m) => m.frontals_in(values.continuous()),
        }
    }

    /// The Gaussian selected by `assignment`; `None` for discrete conditionals.
    pub fn choose(
        &self,
        assignment: &DiscreteValues,
    ) -> Result<Option<&GaussianConditional>, HybridError> {
        match self {
            HybridConditional::Discrete(_) => Ok(None),
            HybridConditional::Gaussian(c) => Ok(Some(c)),
            HybridConditional::Mixture(m) => m.choose(assignment).map(Some),
        }
    }

    /// `error` as a function of the discrete keys at fixed continuous values.
    pub fn error_table(&self, continuous: &VectorValues) -> Result<DecisionTable, HybridError> {
        match self {
            HybridConditional::Discrete(c) => Ok(c.error_table()),
            HybridConditional::Gaussian(c) => Ok(DecisionTable::constant(c.error(continuous)?)),
            HybridConditional::Mixture(m) => m.error_table(continuous),
        }
    }

    pub fn equals(&self, other: &HybridConditional, tol: f64) -> bool {
        match (self, other) {
            (HybridConditional::Discrete(a), HybridConditional::Discrete(b)) => a.equals(b, tol),
            (HybridConditional::Gaussian(a), HybridConditional::Gaussian(b)) => a.equals(b, tol),
            (HybridConditional::Mixture(a), HybridConditional::Mixture(b)) => a.equals(b, tol),
            _ => false,
        }
    }
}

impl Conditional for HybridConditional {
    fn frontal_keys(&self) -> Vec<Key> {
        match self {
            HybridConditional::Discrete(c) => Conditional::frontal_keys(c),
            HybridConditional::Gaussian(c) => Conditional::frontal_keys(c),
            HybridConditional::Mixture(m) => Conditional::frontal_keys(m),
        }
    }

    fn parent_keys(&self) -> Vec<Key> {
        match self {
            HybridConditional::Discrete(c) => Conditional::parent_keys(c),
            HybridConditional::Gaussian(c) => Conditional::parent_keys(c),
            HybridConditional::Mixture(m) => Conditional::parent_keys(m),
        }
    }

    fn evaluate(&self, values: &HybridValues) -> Result<f64, HybridError> {
        match self {
            HybridConditional::Discrete(c) => Conditional::evaluate(c, values),
            HybridConditional::Gaussian(c) => Conditional::evaluate(c, values),
            HybridConditional::Mixture(m) => Conditional::evaluate(m, values),
        }
    }

    fn error(&self, values: &HybridValues) -> Result<f64, HybridError> {
        match self {
            HybridConditional::Discrete(c) => Conditional::error(c, values),
            HybridConditional::Gaussian(c) => Conditional::error(c, values),
            HybridConditional::Mixture(m) => Conditional::error(m, values),
        }
    }
}

impl From<DiscreteConditional> for HybridConditional {
    fn from(conditional: DiscreteConditional) -> Self {
        HybridConditional::Discrete(conditional)
    }
}

impl From<GaussianConditional> for HybridConditional {
    fn from(conditional: GaussianConditional) -> Self {
        HybridConditional::Gaussian(conditional)
    }
}

impl From<GaussianMixture> for HybridConditional {
    fn from(mixture: GaussianMixture) -> Self {
        HybridConditional::Mixture(mixture)
    }
}
