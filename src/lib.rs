//! # Hybridnet - Hybrid Bayes Nets
//!
//! Hybridnet models joint distributions over discrete modes and continuous
//! linear-Gaussian variables as an ordered list of conditionals.
//!
//! ## Architecture
//!
//! The implementation lives in `hybridnet-core` and is organized into layers:
//!
//! - **keys / values**: variable identifiers and assignments
//! - **discrete**: decision tables and discrete conditionals
//! - **linear**: noise models, Gaussian conditionals, Jacobian factors
//! - **hybrid**: Gaussian mixtures, hybrid Bayes nets and factor graphs
//!
//! ## Usage
//!
//! ```rust
//! use hybridnet::{symbol, DiscreteConditional, DiscreteKey, GaussianConditional,
//!     GaussianMixture, HybridBayesNet};
//! use nalgebra::DVector;
//!
//! # fn main() -> Result<(), hybridnet::HybridError> {
//! let mode = DiscreteKey::new(symbol('m', 0), 2);
//! let x = symbol('x', 0);
//!
//! let mut net = HybridBayesNet::new();
//! net.push(GaussianMixture::new(
//!     [mode],
//!     vec![
//!         GaussianConditional::from_mean_and_stddev(x, DVector::from_element(1, 0.0), 1.0)?,
//!         GaussianConditional::from_mean_and_stddev(x, DVector::from_element(1, 10.0), 1.0)?,
//!     ],
//! )?)?;
//! net.push(DiscreteConditional::prior(mode, &[0.3, 0.7])?)?;
//!
//! let best = net.optimize()?;
//! assert_eq!(best.at_discrete(mode.key)?, 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub use hybridnet_core::*;
