//! Discrete-switched linear-Gaussian conditionals and their factors.
//!
//! A [`GaussianMixture`] holds one [`GaussianConditional`] per joint assignment
//! of its discrete parents. All components share frontal keys, continuous
//! parent keys and dimensions. Pruning replaces a component with `None`; a
//! pruned component has zero density and can never be chosen again.

use rand::Rng;

use crate::discrete::table::{DecisionTable, DiscreteDomain};
use crate::errors::HybridError;
use crate::keys::{DiscreteKey, Key};
use crate::linear::conditional::GaussianConditional;
use crate::linear::factor::JacobianFactor;
use crate::values::{DiscreteValues, HybridValues, VectorValues};

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixture {
    frontals: Vec<Key>,
    continuous_parents: Vec<Key>,
    discrete_parents: DiscreteDomain,
    components: Vec<Option<GaussianConditional>>,
}

impl GaussianMixture {
    /// Builds a mixture from one component per discrete parent assignment,
    /// in enumeration order (last discrete parent varies fastest).
    pub fn new(
        discrete_parents: impl IntoIterator<Item = DiscreteKey>,
        components: Vec<GaussianConditional>,
    ) -> Result<Self, HybridError> {
        let discrete_parents = DiscreteDomain::new(discrete_parents)?;
        if discrete_parents.is_scalar() {
            return Err(HybridError::ValidationError(
                "gaussian mixture needs at least one discrete parent".into(),
            ));
        }
        if components.len() != discrete_parents.size() {
            return Err(HybridError::dimension(
                "mixture components",
                discrete_parents.size(),
                components.len(),
            ));
        }
        let first = &components[0];
        if let Some(bad) = components.iter().find(|c| !c.same_structure(first)) {
            return Err(HybridError::ValidationError(format!(
                "mixture components disagree on structure: {:?} vs {:?}",
                first.frontal_keys(),
                bad.frontal_keys()
            )));
        }
        for key in first.frontal_keys().into_iter().chain(first.parent_keys()) {
            if discrete_parents.contains(key) {
                return Err(HybridError::ValidationError(format!(
                    "key {} is both continuous and a discrete parent",
                    key
                )));
            }
        }
        Ok(Self {
            frontals: first.frontal_keys(),
            continuous_parents: first.parent_keys(),
            discrete_parents,
            components: components.into_iter().map(Some).collect(),
        })
    }

    pub fn discrete_parents(&self) -> &[DiscreteKey] {
        self.discrete_parents.keys()
    }

    pub fn frontal_keys(&self) -> Vec<Key> {
        self.frontals.clone()
    }

    pub fn continuous_parent_keys(&self) -> Vec<Key> {
        self.continuous_parents.clone()
    }

    /// Continuous parents followed by discrete parents.
    pub fn parent_keys(&self) -> Vec<Key> {
        let mut keys = self.continuous_parent_keys();
        keys.extend(self.discrete_parents().iter().map(|dk| dk.key));
        keys
    }

    /// Frontal and continuous parent keys.
    pub fn continuous_keys(&self) -> Vec<Key> {
        let mut keys = self.frontal_keys();
        keys.extend(self.continuous_parent_keys());
        keys
    }

    /// Number of components that have not been pruned.
    pub fn nr_components(&self) -> usize {
        self.components.iter().filter(|c| c.is_some()).count()
    }

    /// `(assignment, component)` in enumeration order; `None` marks pruned ones.
    pub fn components(
        &self,
    ) -> impl Iterator<Item = (DiscreteValues, Option<&GaussianConditional>)> + '_ {
        self.components
            .iter()
            .enumerate()
            .map(move |(i, c)| (self.discrete_parents.assignment_at(i), c.as_ref()))
    }

    fn branch(&self, discrete: &DiscreteValues) -> Result<Option<&GaussianConditional>, HybridError> {
        let index = self.discrete_parents.index_of(discrete)?;
        Ok(self.components[index].as_ref())
    }

    /// The component selected by the discrete parent values.
    pub fn choose(&self, discrete: &DiscreteValues) -> Result<&GaussianConditional, HybridError> {
        self.branch(discrete)?.ok_or_else(|| HybridError::PrunedBranch {
            key: self.frontals[0],
        })
    }

    /// Density of the selected component; zero for a pruned component.
    pub fn evaluate(&self, values: &HybridValues) -> Result<f64, HybridError> {
        Ok(self.log_density(values)?.exp())
    }

    /// Log density of the selected component; `−∞` for a pruned component.
    pub fn log_density(&self, values: &HybridValues) -> Result<f64, HybridError> {
        match self.branch(values.discrete())? {
            Some(component) => component.log_density(values.continuous()),
            None => Ok(f64::NEG_INFINITY),
        }
    }

    /// Quadratic error of the selected component; `+∞` for a pruned component.
    pub fn error(&self, values: &HybridValues) -> Result<f64, HybridError> {
        match self.branch(values.discrete())? {
            Some(component) => component.error(values.continuous()),
            None => Ok(f64::INFINITY),
        }
    }

    /// Quadratic error of every component at the continuous values.
    pub fn error_table(&self, continuous: &VectorValues) -> Result<DecisionTable, HybridError> {
        let values = self
            .components
            .iter()
            .map(|c| match c {
                Some(component) => component.error(continuous),
                None => Ok(f64::INFINITY),
            })
            .collect::<Result<Vec<_>, _>>()?;
        DecisionTable::from_domain(self.discrete_parents.clone(), values)
    }

    /// Samples the component selected by the discrete values in `parents`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        parents: &HybridValues,
        rng: &mut R,
    ) -> Result<VectorValues, HybridError> {
        self.choose(parents.discrete())?
            .sample(parents.continuous(), rng)
    }

    pub fn frontals_in(&self, values: &VectorValues) -> bool {
        self.frontals.iter().all(|key| values.contains(*key))
    }

    /// Likelihood of every component with frontals fixed to `measurements`.
    pub fn likelihood(
        &self,
        measurements: &VectorValues,
    ) -> Result<GaussianMixtureFactor, HybridError> {
        let factors = self
            .components
            .iter()
            .map(|c| c.as_ref().map(|c| c.likelihood(measurements)).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        GaussianMixtureFactor::new(
            self.continuous_parent_keys(),
            self.discrete_parents().iter().copied(),
            factors,
        )
    }

    /// Every component as a factor over all of its continuous keys.
    pub fn to_factor(&self) -> Result<GaussianMixtureFactor, HybridError> {
        let factors = self
            .components
            .iter()
            .map(|c| c.as_ref().map(GaussianConditional::to_factor).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        GaussianMixtureFactor::new(
            self.continuous_keys(),
            self.discrete_parents().iter().copied(),
            factors,
        )
    }

    /// Drops components whose discrete assignment has no support in `joint`.
    ///
    /// Discrete parents that `joint` does not mention are left unconstrained.
    pub fn prune(&self, joint: &DecisionTable) -> Result<Self, HybridError> {
        let support = joint.max_marginal(self.discrete_parents())?;
        let components = self
            .components()
            .map(|(assignment, component)| {
                Ok(match component {
                    Some(c) if support.value(&assignment)? > 0.0 => Some(c.clone()),
                    _ => None,
                })
            })
            .collect::<Result<Vec<_>, HybridError>>()?;

        if components.iter().all(Option::is_none) {
            return Err(HybridError::InvalidStructure(format!(
                "pruning removed every component of the mixture on {:?}",
                self.frontals
            )));
        }
        Ok(Self {
            frontals: self.frontals.clone(),
            continuous_parents: self.continuous_parents.clone(),
            discrete_parents: self.discrete_parents.clone(),
            components,
        })
    }

    pub fn equals(&self, other: &GaussianMixture, tol: f64) -> bool {
        self.frontals == other.frontals
            && self.continuous_parents == other.continuous_parents
            && self.discrete_parents == other.discrete_parents
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|(a, b)| match (a, b) {
                    (Some(a), Some(b)) => a.equals(b, tol),
                    (None, None) => true,
                    _ => false,
                })
    }
}

/// A Gaussian factor per discrete assignment, over shared continuous keys.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixtureFactor {
    continuous_keys: Vec<Key>,
    discrete_keys: DiscreteDomain,
    factors: Vec<Option<JacobianFactor>>,
}

impl GaussianMixtureFactor {
    pub fn new(
        continuous_keys: Vec<Key>,
        discrete_keys: impl IntoIterator<Item = DiscreteKey>,
        factors: Vec<Option<JacobianFactor>>,
    ) -> Result<Self, HybridError> {
        let discrete_keys = DiscreteDomain::new(discrete_keys)?;
        if factors.len() != discrete_keys.size() {
            return Err(HybridError::dimension(
                "mixture factor components",
                discrete_keys.size(),
                factors.len(),
            ));
        }
        Ok(Self {
            continuous_keys,
            discrete_keys,
            factors,
        })
    }

    pub fn continuous_keys(&self) -> &[Key] {
        &self.continuous_keys
    }

    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        self.discrete_keys.keys()
    }

    /// The factor for a discrete assignment; `None` if it was pruned.
    pub fn factor(&self, discrete: &DiscreteValues) -> Result<Option<&JacobianFactor>, HybridError> {
        Ok(self.factors[self.discrete_keys.index_of(discrete)?].as_ref())
    }

    pub fn error(&self, values: &HybridValues) -> Result<f64, HybridError> {
        match self.factor(values.discrete())? {
            Some(f) => f.error(values.continuous()),
            None => Ok(f64::INFINITY),
        }
    }

    pub fn log_value(&self, values: &HybridValues) -> Result<f64, HybridError> {
        match self.factor(values.discrete())? {
            Some(f) => f.log_value(values.continuous()),
            None => Ok(f64::NEG_INFINITY),
        }
    }

    fn table(
        &self,
        missing: f64,
        f: impl Fn(&JacobianFactor) -> Result<f64, HybridError>,
    ) -> Result<DecisionTable, HybridError> {
        let values = self
            .factors
            .iter()
            .map(|factor| factor.as_ref().map_or(Ok(missing), &f))
            .collect::<Result<Vec<_>, _>>()?;
        DecisionTable::from_domain(self.discrete_keys.clone(), values)
    }

    /// Quadratic error per discrete assignment.
    pub fn error_table(&self, continuous: &VectorValues) -> Result<DecisionTable, HybridError> {
        self.table(f64::INFINITY, |f| f.error(continuous))
    }

    /// Log value (log constant minus error) per discrete assignment.
    pub fn log_value_table(&self, continuous: &VectorValues) -> Result<DecisionTable, HybridError> {
        self.table(f64::NEG_INFINITY, |f| f.log_value(continuous))
    }

    pub fn equals(&self, other: &GaussianMixtureFactor, tol: f64) -> bool {
        self.continuous_keys == other.continuous_keys
            && self.discrete_keys == other.discrete_keys
            && self
                .factors
                .iter()
                .zip(&other.factors)
                .all(|(a, b)| match (a, b) {
                    (Some(a), Some(b)) => a.equals(b, tol),
                    (None, None) => true,
                    _ => false,
                })
    }
}
