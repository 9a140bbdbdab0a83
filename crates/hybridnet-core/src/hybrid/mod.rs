//! Hybrid layer: mixtures, the conditional variant set, Bayes nets and
//! factor graphs over discrete and continuous variables.

pub mod bayes_net;
pub mod conditional;
pub mod factor_graph;
pub mod mixture;

pub use bayes_net::{BayesNetConfig, HybridBayesNet};
pub use conditional::{Conditional, HybridConditional};
pub use factor_graph::{HybridFactor, HybridGaussianFactorGraph};
pub use mixture::{GaussianMixture, GaussianMixtureFactor};
