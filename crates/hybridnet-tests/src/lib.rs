//! Shared model fixtures for the hybridnet integration tests.

use hybridnet_core::{
    symbol, DiscreteConditional, DiscreteKey, GaussianConditional, GaussianMixture,
    HybridBayesNet, HybridError, HybridValues, Key, NoiseModel, VectorValues,
};
use nalgebra::{DMatrix, DVector};

pub fn m(index: u64) -> Key {
    symbol('m', index)
}

pub fn x(index: u64) -> Key {
    symbol('x', index)
}

pub fn z(index: u64) -> Key {
    symbol('z', index)
}

/// Binary mode variable `m0`.
pub fn mode() -> DiscreteKey {
    DiscreteKey::new(m(0), 2)
}

pub fn scalar(value: f64) -> DVector<f64> {
    DVector::from_element(1, value)
}

pub fn assert_close(actual: f64, expected: f64, tol: f64, label: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{} mismatch: expected {:.15}, got {:.15}, diff={:.3e}",
        label,
        expected,
        actual,
        (actual - expected).abs()
    );
}

/// `P(x0 | m0) P(m0)` with `P(m0) = (0.3, 0.7)` and `x0 ~ N(0, 1)` or
/// `N(10, 1)` depending on the mode.
pub fn two_mode_net() -> Result<HybridBayesNet, HybridError> {
    let mut net = HybridBayesNet::new();
    net.push(GaussianMixture::new(
        [mode()],
        vec![
            GaussianConditional::from_mean_and_stddev(x(0), scalar(0.0), 1.0)?,
            GaussianConditional::from_mean_and_stddev(x(0), scalar(10.0), 1.0)?,
        ],
    )?)?;
    net.push(DiscreteConditional::prior(mode(), &[0.3, 0.7])?)?;
    Ok(net)
}

/// `z = x0 + e` with `e ~ N(0, σ²)`.
fn measurement(index: u64, sigma: f64) -> Result<GaussianConditional, HybridError> {
    GaussianConditional::linear(
        z(index),
        [(x(0), DMatrix::identity(1, 1))],
        scalar(0.0),
        NoiseModel::isotropic(1, sigma)?,
    )
}

/// The generative model `P(z | x0, m0) P(x0) P(m0)`.
///
/// Each measurement `zi = x0 + e` has standard deviation 0.5 in mode 0
/// (low noise) and 3 in mode 1 (high noise). `x0 ~ N(prior_mean,
/// prior_sigma²)` and `P(m0) = (0.4, 0.6)`.
pub fn tiny(
    num_measurements: u64,
    prior_mean: f64,
    prior_sigma: f64,
) -> Result<HybridBayesNet, HybridError> {
    let mut net = HybridBayesNet::new();
    for i in 0..num_measurements {
        net.push(GaussianMixture::new(
            [mode()],
            vec![measurement(i, 0.5)?, measurement(i, 3.0)?],
        )?)?;
    }
    net.push(GaussianConditional::from_mean_and_stddev(
        x(0),
        scalar(prior_mean),
        prior_sigma,
    )?)?;
    net.push(DiscreteConditional::from_spec(mode(), &[], "4/6")?)?;
    Ok(net)
}

/// Measured values of `z0 .. z{count}` taken from `values`.
pub fn measurements(values: &HybridValues, count: u64) -> Result<VectorValues, HybridError> {
    (0..count)
        .map(|i| Ok((z(i), values.at(z(i))?.clone())))
        .collect()
}

/// A chain `m1 -> m0` of discrete conditionals with a mixture on each mode.
///
/// `P(x1 | x0, m1) P(x0 | m0) P(m0 | m1) P(m1)`, useful for pruning where
/// the discrete joint has four leaves.
pub fn switching_chain() -> Result<HybridBayesNet, HybridError> {
    let m1 = DiscreteKey::new(m(1), 2);
    let step = |offset: f64| -> Result<GaussianConditional, HybridError> {
        GaussianConditional::linear(
            x(1),
            [(x(0), DMatrix::identity(1, 1))],
            scalar(offset),
            NoiseModel::isotropic(1, 0.5)?,
        )
    };

    let mut net = HybridBayesNet::new();
    net.push(GaussianMixture::new([m1], vec![step(0.0)?, step(1.0)?])?)?;
    net.push(GaussianMixture::new(
        [mode()],
        vec![
            GaussianConditional::from_mean_and_stddev(x(0), scalar(-1.0), 1.0)?,
            GaussianConditional::from_mean_and_stddev(x(0), scalar(1.0), 1.0)?,
        ],
    )?)?;
    net.push(DiscreteConditional::from_spec(mode(), &[m1], "9/1 3/7")?)?;
    net.push(DiscreteConditional::from_spec(m1, &[], "2/8")?)?;
    Ok(net)
}
