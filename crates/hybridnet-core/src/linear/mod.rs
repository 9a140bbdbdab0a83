//! Linear-Gaussian layer: noise models, conditionals, factors and Bayes nets.

pub mod bayes_net;
pub mod conditional;
pub mod factor;
pub mod noise;

pub use bayes_net::GaussianBayesNet;
pub use conditional::GaussianConditional;
pub use factor::JacobianFactor;
pub use noise::NoiseModel;
