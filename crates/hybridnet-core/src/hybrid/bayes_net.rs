//! Hybrid Bayes nets over discrete and continuous variables.
//!
//! A [`HybridBayesNet`] is an ordered list of conditionals in elimination
//! order: every parent of a conditional is either exogenous or a frontal
//! variable of a *later* conditional. Solving and sampling therefore walk the
//! list in reverse, so every parent is known by the time it is needed.
//!
//! The discrete part is handled densely through [`DecisionTable`]s. The
//! continuous part is reached by fixing the discrete assignment and selecting
//! one component per mixture, which yields a plain [`GaussianBayesNet`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::discrete::conditional::{DiscreteConditional, DEFAULT_NORMALIZATION_TOLERANCE};
use crate::discrete::table::DecisionTable;
use crate::errors::HybridError;
use crate::hybrid::conditional::{Conditional, HybridConditional};
use crate::hybrid::factor_graph::{HybridFactor, HybridGaussianFactorGraph};
use crate::keys::Key;
use crate::linear::bayes_net::GaussianBayesNet;
use crate::values::{DiscreteValues, HybridValues, VectorValues};

/// Configuration for building hybrid Bayes nets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BayesNetConfig {
    /// Check ordering and key-kind consistency on every `push`.
    pub validate_on_push: bool,
    /// Allowed deviation from one for each row of a discrete conditional.
    pub normalization_tolerance: f64,
}

impl Default for BayesNetConfig {
    fn default() -> Self {
        Self {
            validate_on_push: true,
            normalization_tolerance: DEFAULT_NORMALIZATION_TOLERANCE,
        }
    }
}

impl BayesNetConfig {
    pub fn validate(self) -> Result<Self, HybridError> {
        if self.normalization_tolerance <= 0.0 || !self.normalization_tolerance.is_finite() {
            return Err(HybridError::ValidationError(
                "bayes net: normalization_tolerance must be finite and > 0".into(),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Discrete { cardinality: usize },
    Continuous { dim: usize },
}

/// Keys seen so far while walking a net front to back.
#[derive(Debug, Clone, Default)]
struct StructureCheck {
    frontals: FxHashSet<Key>,
    kinds: FxHashMap<Key, KeyKind>,
}

impl StructureCheck {
    /// Checks every conditional of a list in order.
    fn of(conditionals: &[HybridConditional], normalization_tolerance: f64) -> Result<Self, HybridError> {
        let mut check = Self::default();
        for conditional in conditionals {
            check.admit(conditional, normalization_tolerance)?;
        }
        Ok(check)
    }

    fn key_kinds(conditional: &HybridConditional) -> Vec<(Key, KeyKind)> {
        let discrete = conditional.discrete_keys().into_iter().map(|dk| {
            (
                dk.key,
                KeyKind::Discrete {
                    cardinality: dk.cardinality,
                },
            )
        });
        let gaussian = match conditional {
            HybridConditional::Discrete(_) => None,
            HybridConditional::Gaussian(g) => Some(g),
            HybridConditional::Mixture(m) => m.components().find_map(|(_, c)| c),
        };
        let continuous = gaussian.into_iter().flat_map(|g| {
            g.frontals()
                .iter()
                .map(|(key, dim)| (*key, KeyKind::Continuous { dim: *dim }))
                .chain(
                    g.parents()
                        .iter()
                        .map(|(key, s)| (*key, KeyKind::Continuous { dim: s.ncols() })),
                )
                .collect::<Vec<_>>()
        });
        discrete.chain(continuous).collect()
    }

    /// Admits the next conditional in list order.
    fn admit(
        &mut self,
        conditional: &HybridConditional,
        normalization_tolerance: f64,
    ) -> Result<(), HybridError> {
        let frontals = conditional.frontal_keys();
        for key in &frontals {
            if self.frontals.contains(key) {
                return Err(HybridError::InvalidStructure(format!(
                    "key {} is frontal in more than one conditional",
                    key
                )));
            }
        }
        for key in conditional.parent_keys() {
            if self.frontals.contains(&key) {
                return Err(HybridError::InvalidStructure(format!(
                    "parent {} of conditional on {:?} is frontal in an earlier conditional",
                    key, frontals
                )));
            }
        }
        // Nothing is recorded until the whole conditional is accepted.
        let mut staged: FxHashMap<Key, KeyKind> = FxHashMap::default();
        for (key, kind) in Self::key_kinds(conditional) {
            match staged.get(&key).or_else(|| self.kinds.get(&key)).copied() {
                Some(existing) if existing != kind => {
                    return Err(HybridError::InvalidStructure(format!(
                        "key {} used as {:?} and as {:?}",
                        key, existing, kind
                    )))
                }
                Some(_) => {}
                None => {
                    staged.insert(key, kind);
                }
            }
        }
        if let HybridConditional::Discrete(d) = conditional {
            if !d.is_normalized(normalization_tolerance) {
                return Err(HybridError::Numerical(format!(
                    "discrete conditional on {:?} is not normalized",
                    frontals
                )));
            }
        }
        self.kinds.extend(staged);
        self.frontals.extend(frontals);
        Ok(())
    }
}

/// An ordered list of hybrid conditionals in elimination order.
#[derive(Debug, Clone, Default)]
pub struct HybridBayesNet {
    conditionals: Vec<HybridConditional>,
    config: BayesNetConfig,
    /// Keys of `conditionals`, kept current only with `validate_on_push`.
    structure: StructureCheck,
}

impl PartialEq for HybridBayesNet {
    fn eq(&self, other: &Self) -> bool {
        self.conditionals == other.conditionals && self.config == other.config
    }
}

impl HybridBayesNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BayesNetConfig) -> Result<Self, HybridError> {
        Ok(Self {
            conditionals: Vec::new(),
            config: config.validate()?,
            structure: StructureCheck::default(),
        })
    }

    fn from_parts(
        conditionals: Vec<HybridConditional>,
        config: BayesNetConfig,
    ) -> Result<Self, HybridError> {
        let structure = if config.validate_on_push {
            StructureCheck::of(&conditionals, config.normalization_tolerance)?
        } else {
            StructureCheck::default()
        };
        Ok(Self {
            conditionals,
            config,
            structure,
        })
    }

    /// Builds a net by pushing every conditional in order.
    pub fn from_conditionals(
        conditionals: impl IntoIterator<Item = HybridConditional>,
    ) -> Result<Self, HybridError> {
        let mut net = Self::new();
        for conditional in conditionals {
            net.push(conditional)?;
        }
        Ok(net)
    }

    pub fn config(&self) -> &BayesNetConfig {
        &self.config
    }

    /// Appends a conditional.
    ///
    /// With `validate_on_push`, fails with `InvalidStructure` if the new
    /// conditional's frontals or parents are already frontal in the net, or
    /// if a key changes kind or cardinality; the net is left unchanged.
    /// Only the new conditional is checked against the keys seen so far.
    pub fn push(&mut self, conditional: impl Into<HybridConditional>) -> Result<(), HybridError> {
        let conditional = conditional.into();
        if self.config.validate_on_push {
            if let Err(err) = self
                .structure
                .admit(&conditional, self.config.normalization_tolerance)
            {
                #[cfg(feature = "tracing")]
                tracing::warn!("rejected conditional on {:?}: {}", conditional.frontal_keys(), err);
                return Err(err);
            }
        }
        self.conditionals.push(conditional);
        Ok(())
    }

    /// Verifies the ordering invariant, key-kind consistency and the
    /// normalization of every discrete conditional.
    pub fn check_invariants(&self) -> Result<(), HybridError> {
        StructureCheck::of(&self.conditionals, self.config.normalization_tolerance).map(|_| ())
    }

    pub fn len(&self) -> usize {
        self.conditionals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&HybridConditional> {
        self.conditionals.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HybridConditional> + '_ {
        self.conditionals.iter()
    }

    pub fn conditionals(&self) -> &[HybridConditional] {
        &self.conditionals
    }

    /// The Gaussian Bayes net selected by a discrete assignment.
    ///
    /// Discrete conditionals are dropped, Gaussian conditionals are copied and
    /// each mixture contributes the component selected by `assignment`.
    pub fn choose(&self, assignment: &DiscreteValues) -> Result<GaussianBayesNet, HybridError> {
        let mut net = GaussianBayesNet::new();
        for conditional in &self.conditionals {
            if let Some(gaussian) = conditional.choose(assignment)? {
                net.push(gaussian.clone());
            }
        }
        Ok(net)
    }

    /// Joint probability (density) of a full assignment.
    ///
    /// Continuous log densities are summed before exponentiating.
    pub fn evaluate(&self, values: &HybridValues) -> Result<f64, HybridError> {
        let mut log_density = 0.0;
        let mut probability = 1.0;
        for conditional in &self.conditionals {
            match conditional {
                HybridConditional::Discrete(d) => probability *= d.evaluate(values.discrete())?,
                HybridConditional::Gaussian(g) => log_density += g.log_density(values.continuous())?,
                HybridConditional::Mixture(m) => log_density += m.log_density(values)?,
            }
        }
        Ok(probability * log_density.exp())
    }

    /// Product of every discrete conditional's table.
    ///
    /// Mixtures do not contribute; an all-continuous net yields the constant 1.
    pub fn discrete_conditionals(&self) -> Result<DecisionTable, HybridError> {
        self.conditionals
            .iter()
            .filter_map(HybridConditional::as_discrete)
            .try_fold(DecisionTable::constant(1.0), |joint, d| joint.multiply(d.table()))
    }

    /// Most probable discrete assignment, then the continuous optimum given it.
    ///
    /// This is a two-stage approximation: the discrete MPE ignores how well
    /// each mode explains the continuous part.
    pub fn optimize(&self) -> Result<HybridValues, HybridError> {
        let (mpe, _) = self.discrete_conditionals()?.argmax();
        #[cfg(feature = "tracing")]
        tracing::debug!("optimize: discrete MPE {:?}", mpe);
        let continuous = self.optimize_given(&mpe)?;
        Ok(HybridValues::new(continuous, mpe))
    }

    /// Continuous optimum of the Gaussian net selected by `assignment`.
    pub fn optimize_given(&self, assignment: &DiscreteValues) -> Result<VectorValues, HybridError> {
        self.choose(assignment)?.optimize()
    }

    /// Ancestral sample of every variable.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<HybridValues, HybridError> {
        self.sample_given(&HybridValues::default(), rng)
    }

    /// Ancestral sample; conditionals whose frontals are all in `given` keep
    /// the given values. The result includes `given`.
    pub fn sample_given<R: Rng + ?Sized>(
        &self,
        given: &HybridValues,
        rng: &mut R,
    ) -> Result<HybridValues, HybridError> {
        let mut result = given.clone();
        for conditional in self.conditionals.iter().rev() {
            if conditional.frontals_in(given) {
                continue;
            }
            match conditional {
                HybridConditional::Discrete(d) => {
                    let sampled = d.sample(result.discrete(), rng)?;
                    result.update_discrete(&sampled);
                }
                HybridConditional::Gaussian(g) => {
                    let sampled = g.sample(result.continuous(), rng)?;
                    result.update_continuous(&sampled);
                }
                HybridConditional::Mixture(m) => {
                    let sampled = m.sample(&result, rng)?;
                    result.update_continuous(&sampled);
                }
            }
            // Partially given conditionals keep their given frontals.
            result.update(given);
        }
        Ok(result)
    }

    /// `sample` with a generator seeded from system entropy.
    pub fn sample_from_entropy(&self) -> Result<HybridValues, HybridError> {
        self.sample(&mut StdRng::from_entropy())
    }

    /// `sample_given` with a generator seeded from system entropy.
    pub fn sample_given_from_entropy(&self, given: &HybridValues) -> Result<HybridValues, HybridError> {
        self.sample_given(given, &mut StdRng::from_entropy())
    }

    /// Keeps the `max_leaves` most probable discrete assignments.
    ///
    /// The discrete conditionals are replaced by one conditional holding the
    /// pruned, renormalized joint, placed where the last discrete conditional
    /// was. Mixture components with no kept leaf are removed and Gaussian
    /// conditionals are unchanged. A net with at most `max_leaves` non-zero
    /// leaves is returned as is.
    pub fn prune(&self, max_leaves: usize) -> Result<HybridBayesNet, HybridError> {
        if max_leaves == 0 {
            return Err(HybridError::ValidationError(
                "prune: max_leaves must be > 0".into(),
            ));
        }
        let joint = self.discrete_conditionals()?;
        if joint.nr_nonzero() <= max_leaves {
            return Ok(self.clone());
        }
        let kept = joint.prune(max_leaves);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "prune: {} -> {} non-zero discrete leaves (max_leaves = {})",
            joint.nr_nonzero(),
            kept.nr_nonzero(),
            max_leaves
        );

        let discrete_frontals: Vec<Key> = self
            .conditionals
            .iter()
            .filter_map(HybridConditional::as_discrete)
            .flat_map(|d| d.frontal_keys())
            .collect();
        let last_discrete = self
            .conditionals
            .iter()
            .rposition(HybridConditional::is_discrete);
        let mut pruned_joint = Some(DiscreteConditional::from_joint(&kept, &discrete_frontals)?);

        let mut conditionals = Vec::with_capacity(self.conditionals.len());
        for (i, conditional) in self.conditionals.iter().enumerate() {
            match conditional {
                HybridConditional::Discrete(_) => {
                    if Some(i) == last_discrete {
                        if let Some(d) = pruned_joint.take() {
                            conditionals.push(HybridConditional::Discrete(d));
                        }
                    }
                }
                HybridConditional::Gaussian(g) => conditionals.push(HybridConditional::Gaussian(g.clone())),
                HybridConditional::Mixture(m) => {
                    let pruned = m.prune(&kept)?;
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "prune: mixture on {:?} keeps {} of {} components",
                        m.frontal_keys(),
                        pruned.nr_components(),
                        m.nr_components()
                    );
                    conditionals.push(HybridConditional::Mixture(pruned));
                }
            }
        }

        Self::from_parts(conditionals, self.config)
    }

    /// Quadratic errors of the continuous conditionals plus `−ln p` of the
    /// discrete ones. Gaussian normalization constants are excluded.
    pub fn error(&self, values: &HybridValues) -> Result<f64, HybridError> {
        self.conditionals.iter().map(|c| c.error(values)).sum()
    }

    fn error_tables(&self, continuous: &VectorValues) -> Result<Vec<DecisionTable>, HybridError> {
        #[cfg(feature = "parallel")]
        {
            self.conditionals
                .par_iter()
                .map(|c| c.error_table(continuous))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.conditionals
                .iter()
                .map(|c| c.error_table(continuous))
                .collect()
        }
    }

    /// `error` for every discrete assignment at fixed continuous values.
    pub fn error_tree(&self, continuous: &VectorValues) -> Result<DecisionTable, HybridError> {
        self.error_tables(continuous)?
            .iter()
            .try_fold(DecisionTable::constant(0.0), |acc, table| acc.add(table))
    }

    /// Unnormalized probability `exp(−error)` for every discrete assignment.
    pub fn prob_prime(&self, continuous: &VectorValues) -> Result<DecisionTable, HybridError> {
        Ok(self.error_tree(continuous)?.apply(|e| (-e).exp()))
    }

    /// The net conditioned on measurements of every continuous frontal.
    ///
    /// Gaussian and mixture conditionals become likelihood factors on their
    /// parents; discrete conditionals pass through as discrete factors.
    pub fn to_factor_graph(
        &self,
        measurements: &VectorValues,
    ) -> Result<HybridGaussianFactorGraph, HybridError> {
        self.conditionals
            .iter()
            .map(|conditional| {
                Ok(match conditional {
                    HybridConditional::Discrete(d) => HybridFactor::Discrete(d.table().clone()),
                    HybridConditional::Gaussian(g) => HybridFactor::Gaussian(g.likelihood(measurements)?),
                    HybridConditional::Mixture(m) => HybridFactor::Mixture(m.likelihood(measurements)?),
                })
            })
            .collect()
    }

    /// Like [`to_factor_graph`](Self::to_factor_graph), but conditionals with
    /// no measured frontal are kept as factors over all of their keys.
    ///
    /// A conditional with only some frontals measured fails with `MissingKey`.
    pub fn to_posterior_factor_graph(
        &self,
        measurements: &VectorValues,
    ) -> Result<HybridGaussianFactorGraph, HybridError> {
        self.conditionals
            .iter()
            .map(|conditional| {
                let measured = |keys: Vec<Key>| -> Result<bool, HybridError> {
                    let missing: Vec<Key> =
                        keys.iter().copied().filter(|k| !measurements.contains(*k)).collect();
                    match missing.first() {
                        None => Ok(true),
                        Some(_) if missing.len() == keys.len() => Ok(false),
                        Some(key) => Err(HybridError::MissingKey { key: *key }),
                    }
                };
                Ok(match conditional {
                    HybridConditional::Discrete(d) => HybridFactor::Discrete(d.table().clone()),
                    HybridConditional::Gaussian(g) => HybridFactor::Gaussian(
                        if measured(g.frontal_keys())? {
                            g.likelihood(measurements)?
                        } else {
                            g.to_factor()?
                        },
                    ),
                    HybridConditional::Mixture(m) => HybridFactor::Mixture(
                        if measured(m.frontal_keys())? {
                            m.likelihood(measurements)?
                        } else {
                            m.to_factor()?
                        },
                    ),
                })
            })
            .collect()
    }

    pub fn equals(&self, other: &HybridBayesNet, tol: f64) -> bool {
        self.len() == other.len()
            && self
                .conditionals
                .iter()
                .zip(&other.conditionals)
                .all(|(a, b)| a.equals(b, tol))
    }
}

impl<'a> IntoIterator for &'a HybridBayesNet {
    type Item = &'a HybridConditional;
    type IntoIter = std::slice::Iter<'a, HybridConditional>;

    fn into_iter(self) -> Self::IntoIter {
        self.conditionals.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hybrid::mixture::GaussianMixture;
    use crate::keys::{symbol, DiscreteKey};
    use crate::linear::conditional::GaussianConditional;
    use nalgebra::DVector;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn mode() -> DiscreteKey {
        DiscreteKey::new(symbol('m', 0), 2)
    }

    fn x() -> Key {
        symbol('x', 0)
    }

    fn two_modes() -> HybridBayesNet {
        let component = |mean: f64| {
            GaussianConditional::from_mean_and_stddev(x(), DVector::from_element(1, mean), 1.0)
                .expect("component")
        };
        let mut net = HybridBayesNet::new();
        net.push(GaussianMixture::new([mode()], vec![component(0.0), component(10.0)]).expect("mixture"))
            .expect("push mixture");
        net.push(DiscreteConditional::prior(mode(), &[0.3, 0.7]).expect("prior"))
            .expect("push prior");
        net
    }

    fn assignment(m: usize) -> DiscreteValues {
        [(mode().key, m)].into_iter().collect()
    }

    #[test]
    fn config_rejects_non_positive_tolerance() {
        let config = BayesNetConfig {
            normalization_tolerance: 0.0,
            ..BayesNetConfig::default()
        };
        assert!(matches!(
            HybridBayesNet::with_config(config),
            Err(HybridError::ValidationError(_))
        ));
    }

    #[test]
    fn push_rejects_parent_that_is_already_frontal() {
        let mut net = HybridBayesNet::new();
        net.push(DiscreteConditional::prior(mode(), &[0.5, 0.5]).expect("prior"))
            .expect("prior");
        let component = GaussianConditional::from_mean_and_stddev(x(), DVector::zeros(1), 1.0)
            .expect("component");
        let mixture = GaussianMixture::new([mode()], vec![component.clone(), component]).expect("mixture");

        assert!(matches!(net.push(mixture), Err(HybridError::InvalidStructure(_))));
        assert_eq!(net.len(), 1);
    }

    #[test]
    fn push_rejects_duplicate_frontal() {
        let mut net = HybridBayesNet::new();
        let prior = GaussianConditional::from_mean_and_stddev(x(), DVector::zeros(1), 1.0).expect("prior");
        net.push(prior.clone()).expect("first");
        assert!(matches!(net.push(prior), Err(HybridError::InvalidStructure(_))));
    }

    #[test]
    fn push_rejects_key_used_as_both_kinds() {
        let mut net = HybridBayesNet::new();
        net.push(GaussianConditional::from_mean_and_stddev(mode().key, DVector::zeros(1), 1.0).expect("g"))
            .expect("gaussian");
        assert!(matches!(
            net.push(DiscreteConditional::prior(mode(), &[0.5, 0.5]).expect("prior")),
            Err(HybridError::InvalidStructure(_))
        ));
    }

    #[test]
    fn unvalidated_net_reports_violation_on_check() {
        let config = BayesNetConfig {
            validate_on_push: false,
            ..BayesNetConfig::default()
        };
        let mut net = HybridBayesNet::with_config(config).expect("net");
        let prior = GaussianConditional::from_mean_and_stddev(x(), DVector::zeros(1), 1.0).expect("prior");
        net.push(prior.clone()).expect("first");
        net.push(prior).expect("second");
        assert!(net.check_invariants().is_err());
        assert!(two_modes().check_invariants().is_ok());
    }

    #[test]
    fn optimize_picks_most_probable_mode() {
        let solution = two_modes().optimize().expect("optimize");
        assert_eq!(solution.at_discrete(mode().key), Ok(1));
        assert!((solution.at(x()).expect("x")[0] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn error_includes_discrete_term() {
        let net = two_modes();
        let mut values = HybridValues::default();
        values.insert_discrete(mode().key, 1);
        values.insert_scalar(x(), 10.0);
        assert!((net.error(&values).expect("error") + 0.7f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn choose_requires_mixture_modes() {
        assert_eq!(
            two_modes().choose(&DiscreteValues::new()),
            Err(HybridError::MissingDiscreteAssignment { key: mode().key })
        );
    }

    #[test]
    fn discrete_conditionals_of_continuous_net_is_one() {
        let mut net = HybridBayesNet::new();
        net.push(GaussianConditional::from_mean_and_stddev(x(), DVector::zeros(1), 1.0).expect("prior"))
            .expect("push");
        let joint = net.discrete_conditionals().expect("joint");
        assert_eq!(joint.values(), &[1.0]);
    }

    #[test]
    fn prune_to_one_leaf_removes_other_mode() {
        let pruned = two_modes().prune(1).expect("prune");
        let mixture = pruned.at(0).and_then(HybridConditional::as_mixture).expect("mixture");
        assert_eq!(mixture.nr_components(), 1);
        let prior = pruned.at(1).and_then(HybridConditional::as_discrete).expect("prior");
        assert_eq!(prior.table().values(), &[0.0, 1.0]);
        assert!(matches!(pruned.choose(&assignment(0)), Err(HybridError::PrunedBranch { .. })));
        assert!(pruned.choose(&assignment(1)).is_ok());
    }

    /// `P(x | a, b) P(a) P(b)` with independent `(0.4, 0.6)` priors.
    fn independent_modes() -> (HybridBayesNet, DiscreteKey, DiscreteKey) {
        let a = DiscreteKey::new(symbol('a', 0), 2);
        let b = DiscreteKey::new(symbol('b', 0), 2);
        let components = (0..4)
            .map(|i| {
                GaussianConditional::from_mean_and_stddev(x(), DVector::from_element(1, i as f64), 1.0)
                    .expect("component")
            })
            .collect();
        let mut net = HybridBayesNet::new();
        net.push(GaussianMixture::new([a, b], components).expect("mixture"))
            .expect("push mixture");
        net.push(DiscreteConditional::prior(a, &[0.4, 0.6]).expect("a")).expect("push a");
        net.push(DiscreteConditional::prior(b, &[0.4, 0.6]).expect("b")).expect("push b");
        (net, a, b)
    }

    #[test]
    fn prune_of_independent_priors_respects_leaf_budget() {
        let (net, a, b) = independent_modes();
        let pruned = net.prune(3).expect("prune");

        assert_eq!(pruned.len(), 2);
        let joint = pruned.discrete_conditionals().expect("joint");
        assert_eq!(joint.nr_nonzero(), 3);
        let both_low: DiscreteValues = [(a.key, 0), (b.key, 0)].into_iter().collect();
        let both_high: DiscreteValues = [(a.key, 1), (b.key, 1)].into_iter().collect();
        assert_eq!(joint.value(&both_low), Ok(0.0));
        assert!((joint.value(&both_high).expect("leaf") - 0.36 / 0.84).abs() < 1e-12);
        assert!(pruned.check_invariants().is_ok());

        let mut rng = ChaCha8Rng::seed_from_u64(19);
        for _ in 0..200 {
            let sample = pruned.sample(&mut rng).expect("sample");
            assert!(pruned.evaluate(&sample).expect("evaluate") > 0.0);
        }
    }

    #[test]
    fn pruned_net_keeps_validating_pushes() {
        let (net, _, _) = independent_modes();
        let mut pruned = net.prune(2).expect("prune");
        let prior = GaussianConditional::from_mean_and_stddev(x(), DVector::zeros(1), 1.0).expect("prior");
        assert!(matches!(pruned.push(prior), Err(HybridError::InvalidStructure(_))));
    }

    #[test]
    fn rejected_push_records_no_keys() {
        let config = BayesNetConfig {
            normalization_tolerance: 1e-12,
            ..BayesNetConfig::default()
        };
        let mut net = HybridBayesNet::with_config(config).expect("net");
        let three_way = DiscreteKey::new(mode().key, 3);
        let loose = DiscreteConditional::prior(three_way, &[0.3, 0.3, 0.4 + 1e-8]).expect("loose");
        assert!(matches!(net.push(loose), Err(HybridError::Numerical(_))));

        // The rejected conditional must not pin the key to cardinality 3.
        net.push(DiscreteConditional::prior(mode(), &[0.5, 0.5]).expect("prior"))
            .expect("push");
        assert_eq!(net.len(), 1);
        assert!(net.check_invariants().is_ok());
    }

    #[test]
    fn prune_rejects_zero_leaves() {
        assert!(matches!(two_modes().prune(0), Err(HybridError::ValidationError(_))));
    }

    #[test]
    fn sample_given_keeps_given_mode() {
        let net = two_modes();
        let given = HybridValues::from(assignment(0));
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..20 {
            let sample = net.sample_given(&given, &mut rng).expect("sample");
            assert_eq!(sample.at_discrete(mode().key), Ok(0));
            assert!(sample.at(x()).expect("x")[0].abs() < 6.0);
        }
    }

    #[test]
    fn to_factor_graph_requires_measurements() {
        assert_eq!(
            two_modes().to_factor_graph(&VectorValues::new()),
            Err(HybridError::MissingKey { key: x() })
        );
    }

    #[test]
    fn posterior_factor_graph_keeps_unmeasured_conditionals() {
        let graph = two_modes()
            .to_posterior_factor_graph(&VectorValues::new())
            .expect("graph");
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.continuous_keys(), vec![x()]);
    }
}
