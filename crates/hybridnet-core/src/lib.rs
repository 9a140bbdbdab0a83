//! # Hybridnet Core
//!
//! Hybrid Bayes nets: directed probabilistic models whose variables are a mix
//! of discrete (finite-valued) and continuous (real-vector) quantities.
//!
//! A net holds three kinds of conditionals: discrete probability tables,
//! linear-Gaussian conditionals, and Gaussian mixtures switched by discrete
//! parents. Queries cover selecting the Gaussian net for a discrete
//! assignment, joint evaluation, MPE optimization, ancestral sampling,
//! pruning of the discrete hypothesis space, and conversion to a factor graph
//! given measurements.

#![forbid(unsafe_code)]

pub mod discrete;
pub mod errors;
pub mod hybrid;
pub mod keys;
pub mod linear;
pub mod values;

// Re-export commonly used types
pub use discrete::{DecisionTable, DiscreteConditional, DiscreteDomain, DiscreteKeys};
pub use errors::HybridError;
pub use hybrid::{
    BayesNetConfig, Conditional, GaussianMixture, GaussianMixtureFactor, HybridBayesNet,
    HybridConditional, HybridFactor, HybridGaussianFactorGraph,
};
pub use keys::{symbol, DiscreteKey, Key};
pub use linear::{GaussianBayesNet, GaussianConditional, JacobianFactor, NoiseModel};
pub use values::{DiscreteValues, HybridValues, VectorValues};
