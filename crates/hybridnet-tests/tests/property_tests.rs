//! Property tests for hybrid Bayes net invariants.

use hybridnet_core::{
    DiscreteConditional, DiscreteKey, GaussianConditional, GaussianMixture, HybridBayesNet,
    HybridValues, NoiseModel, VectorValues,
};
use hybridnet_tests::{m, mode, scalar, switching_chain, x};
use nalgebra::DMatrix;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// `P(x1 | x0, m1) P(x0 | m0) P(m0 | m1) P(m1)` with the given weights and means.
fn chain(
    m1_weights: &[f64],
    m0_rows: &[Vec<f64>],
    means: &[f64],
    gain: f64,
) -> HybridBayesNet {
    let m1 = DiscreteKey::new(m(1), m1_weights.len());
    let m0 = DiscreteKey::new(m(0), m0_rows[0].len());
    let normalize = |row: &[f64]| {
        let total: f64 = row.iter().sum();
        row.iter().map(|w| w / total).collect::<Vec<_>>()
    };

    let steps = (0..m1.cardinality)
        .map(|i| {
            GaussianConditional::linear(
                x(1),
                [(x(0), DMatrix::from_element(1, 1, gain))],
                scalar(i as f64),
                NoiseModel::isotropic(1, 0.5).expect("noise"),
            )
            .expect("step")
        })
        .collect();
    let priors = means
        .iter()
        .map(|mean| GaussianConditional::from_mean_and_stddev(x(0), scalar(*mean), 1.0).expect("prior"))
        .collect();

    let mut net = HybridBayesNet::new();
    net.push(GaussianMixture::new([m1], steps).expect("steps")).expect("push steps");
    net.push(GaussianMixture::new([m0], priors).expect("priors")).expect("push priors");
    net.push(
        DiscreteConditional::new([m0], [m1], m0_rows.iter().flat_map(|r| normalize(r)).collect())
            .expect("m0 | m1"),
    )
    .expect("push m0");
    net.push(DiscreteConditional::new([m1], [], normalize(m1_weights)).expect("m1"))
        .expect("push m1");
    net
}

fn chain_strategy() -> impl Strategy<Value = HybridBayesNet> {
    (2usize..4, 2usize..4).prop_flat_map(|(c1, c0)| {
        (
            prop::collection::vec(0.1f64..10.0, c1),
            prop::collection::vec(prop::collection::vec(0.1f64..10.0, c0), c1),
            prop::collection::vec(-5.0f64..5.0, c0),
            -2.0f64..2.0,
        )
            .prop_map(|(m1_weights, m0_rows, means, gain)| chain(&m1_weights, &m0_rows, &means, gain))
    })
}

fn normalized(row: &[f64]) -> Vec<f64> {
    let total: f64 = row.iter().sum();
    row.iter().map(|w| w / total).collect()
}

/// `P(x0 | m0, m1, m2) P(m2 | m0, m1) P(m0) P(m1)`, or with an independent
/// prior on `m2` when `collide` is false.
fn non_chain(a_weights: &[f64], b_weights: &[f64], c_rows: &[Vec<f64>], collide: bool) -> HybridBayesNet {
    let a = DiscreteKey::new(m(0), a_weights.len());
    let b = DiscreteKey::new(m(1), b_weights.len());
    let c = DiscreteKey::new(m(2), c_rows[0].len());

    let components = (0..a.cardinality * b.cardinality * c.cardinality)
        .map(|i| GaussianConditional::from_mean_and_stddev(x(0), scalar(i as f64), 1.0).expect("component"))
        .collect();
    let c_conditional = if collide {
        DiscreteConditional::new([c], [a, b], c_rows.iter().flat_map(|r| normalized(r)).collect())
    } else {
        DiscreteConditional::new([c], [], normalized(&c_rows[0]))
    }
    .expect("m2");

    let mut net = HybridBayesNet::new();
    net.push(GaussianMixture::new([a, b, c], components).expect("mixture")).expect("push mixture");
    net.push(c_conditional).expect("push m2");
    net.push(DiscreteConditional::new([a], [], normalized(a_weights)).expect("m0")).expect("push m0");
    net.push(DiscreteConditional::new([b], [], normalized(b_weights)).expect("m1")).expect("push m1");
    net
}

fn non_chain_strategy() -> impl Strategy<Value = HybridBayesNet> {
    (2usize..4, 2usize..4, 2usize..4, any::<bool>()).prop_flat_map(|(ca, cb, cc, collide)| {
        (
            prop::collection::vec(0.1f64..10.0, ca),
            prop::collection::vec(0.1f64..10.0, cb),
            prop::collection::vec(prop::collection::vec(0.1f64..10.0, cc), ca * cb),
        )
            .prop_map(move |(a, b, c)| non_chain(&a, &b, &c, collide))
    })
}

proptest! {
    #[test]
    fn discrete_joint_is_normalized(net in chain_strategy()) {
        let joint = net.discrete_conditionals().unwrap();
        prop_assert!((joint.sum() - 1.0).abs() < 1e-9);
        prop_assert!(joint.values().iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn prune_keeps_exactly_the_top_leaves(net in chain_strategy(), k in 1usize..10) {
        let joint = net.discrete_conditionals().unwrap();
        let pruned_joint = net.prune(k).unwrap().discrete_conditionals().unwrap();

        let mut order: Vec<usize> = (0..joint.len()).collect();
        order.sort_by(|&a, &b| joint.values()[b].total_cmp(&joint.values()[a]));
        let kept: Vec<bool> = (0..joint.len()).map(|i| order.iter().take(k).any(|&j| j == i)).collect();

        prop_assert_eq!(pruned_joint.keys(), joint.keys());
        prop_assert!(pruned_joint.nr_nonzero() <= k);
        for (i, p) in pruned_joint.values().iter().enumerate() {
            prop_assert_eq!(*p > 0.0, kept[i], "leaf {} kept={} value={}", i, kept[i], p);
        }
        prop_assert!((pruned_joint.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn prob_prime_is_exp_of_negative_error_tree(
        net in chain_strategy(),
        x0 in -5.0f64..5.0,
        x1 in -5.0f64..5.0,
    ) {
        let mut continuous = VectorValues::new();
        continuous.insert_scalar(x(0), x0);
        continuous.insert_scalar(x(1), x1);

        let errors = net.error_tree(&continuous).unwrap();
        let probs = net.prob_prime(&continuous).unwrap();
        for (e, p) in errors.values().iter().zip(probs.values()) {
            prop_assert!((p - (-e).exp()).abs() <= 1e-12 * p.max(1.0));
        }
        for (assignment, leaf) in errors.iter() {
            let values = HybridValues::new(continuous.clone(), assignment);
            let error = net.error(&values).unwrap();
            prop_assert!((leaf - error).abs() <= 1e-9 * error.abs().max(1.0));
        }
    }

    #[test]
    fn choose_then_optimize_matches_optimize_given(net in chain_strategy(), pick in 0usize..16) {
        let joint = net.discrete_conditionals().unwrap();
        let assignment = joint.domain().assignment_at(pick % joint.len());

        let via_choose = net.choose(&assignment).unwrap().optimize().unwrap();
        let direct = net.optimize_given(&assignment).unwrap();
        prop_assert!(via_choose.equals(&direct, 1e-12));
    }

    #[test]
    fn evaluate_is_exp_of_negative_error_up_to_constants(
        net in chain_strategy(),
        x0 in -3.0f64..3.0,
        x1 in -3.0f64..3.0,
    ) {
        // Every component has unit R and fixed sigma, so the Gaussian
        // normalization constants are the same for all modes.
        let mut continuous = VectorValues::new();
        continuous.insert_scalar(x(0), x0);
        continuous.insert_scalar(x(1), x1);
        let probs = net.prob_prime(&continuous).unwrap();
        let ratios: Vec<f64> = probs
            .iter()
            .map(|(assignment, p)| {
                let values = HybridValues::new(continuous.clone(), assignment);
                net.evaluate(&values).unwrap() / p
            })
            .collect();
        for r in &ratios {
            prop_assert!((r - ratios[0]).abs() <= 1e-9 * ratios[0]);
        }
    }

    #[test]
    fn seeded_sampling_is_reproducible(seed in any::<u64>()) {
        let net = switching_chain().unwrap();
        let first = net.sample(&mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        let second = net.sample(&mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert!(first.discrete().contains_key(&mode().key));
        prop_assert!(first.discrete().contains_key(&m(1)));
    }

    #[test]
    fn prune_of_non_chain_nets_keeps_exactly_the_top_leaves(
        net in non_chain_strategy(),
        k in 1usize..30,
    ) {
        let joint = net.discrete_conditionals().unwrap();
        let pruned_joint = net.prune(k).unwrap().discrete_conditionals().unwrap();

        let mut order: Vec<usize> = (0..joint.len()).collect();
        order.sort_by(|&a, &b| joint.values()[b].total_cmp(&joint.values()[a]));
        let kept: Vec<bool> = (0..joint.len()).map(|i| order.iter().take(k).any(|&j| j == i)).collect();

        prop_assert_eq!(pruned_joint.keys(), joint.keys());
        prop_assert_eq!(pruned_joint.nr_nonzero(), k.min(joint.nr_nonzero()));
        for (i, p) in pruned_joint.values().iter().enumerate() {
            prop_assert_eq!(*p > 0.0, kept[i], "leaf {} kept={} value={}", i, kept[i], p);
        }
        prop_assert!((pruned_joint.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pruned_non_chain_nets_sample_only_kept_branches(
        net in non_chain_strategy(),
        k in 1usize..8,
        seed in any::<u64>(),
    ) {
        let pruned = net.prune(k).unwrap();
        let joint = pruned.discrete_conditionals().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..20 {
            let sample = pruned.sample(&mut rng).unwrap();
            prop_assert!(joint.value(sample.discrete()).unwrap() > 0.0);
            prop_assert!(pruned.evaluate(&sample).unwrap() > 0.0);
        }
    }
}
