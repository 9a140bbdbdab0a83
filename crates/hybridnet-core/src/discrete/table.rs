//! Dense decision tables over discrete keys.
//!
//! A [`DiscreteDomain`] enumerates every joint assignment of an ordered list of
//! discrete keys in mixed-radix order: the last key varies fastest. A
//! [`DecisionTable`] stores one real value per assignment and supports lookup,
//! pointwise combination over the union of two domains, max-projection and
//! leaf-count-bounded pruning.

use smallvec::SmallVec;

use crate::errors::HybridError;
use crate::keys::{DiscreteKey, Key};
use crate::values::{discrete_at, DiscreteValues};

/// Inline capacity for discrete key lists; most conditionals touch few modes.
pub const INLINE_KEYS: usize = 4;

/// An ordered list of discrete keys.
pub type DiscreteKeys = SmallVec<[DiscreteKey; INLINE_KEYS]>;

/// The joint domain of an ordered list of discrete keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscreteDomain {
    keys: DiscreteKeys,
    strides: SmallVec<[usize; INLINE_KEYS]>,
    size: usize,
}

impl Default for DiscreteDomain {
    fn default() -> Self {
        Self::empty()
    }
}

impl DiscreteDomain {
    /// Domain with no keys; it has exactly one (empty) assignment.
    pub fn empty() -> Self {
        Self {
            keys: DiscreteKeys::new(),
            strides: SmallVec::new(),
            size: 1,
        }
    }

    /// Builds a domain, rejecting duplicate keys, empty domains and overflow.
    pub fn new(keys: impl IntoIterator<Item = DiscreteKey>) -> Result<Self, HybridError> {
        let keys: DiscreteKeys = keys.into_iter().collect();
        for (i, dk) in keys.iter().enumerate() {
            if dk.cardinality == 0 {
                return Err(HybridError::ValidationError(format!(
                    "discrete key {} must have positive cardinality",
                    dk.key
                )));
            }
            if keys[..i].iter().any(|other| other.key == dk.key) {
                return Err(HybridError::ValidationError(format!(
                    "discrete key {} listed twice",
                    dk.key
                )));
            }
        }

        let mut strides: SmallVec<[usize; INLINE_KEYS]> = SmallVec::from_elem(1, keys.len());
        let mut size = 1usize;
        for i in (0..keys.len()).rev() {
            strides[i] = size;
            size = size.checked_mul(keys[i].cardinality).ok_or_else(|| {
                HybridError::ValidationError("discrete domain size overflows usize".into())
            })?;
        }

        Ok(Self {
            keys,
            strides,
            size,
        })
    }

    pub fn keys(&self) -> &[DiscreteKey] {
        &self.keys
    }

    /// Number of joint assignments.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_scalar(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: Key) -> bool {
        self.position(key).is_some()
    }

    pub fn position(&self, key: Key) -> Option<usize> {
        self.keys.iter().position(|dk| dk.key == key)
    }

    /// Linear index of the assignment restricted to this domain's keys.
    ///
    /// Extra keys in `values` are ignored.
    pub fn index_of(&self, values: &DiscreteValues) -> Result<usize, HybridError> {
        let mut index = 0;
        for (dk, stride) in self.keys.iter().zip(&self.strides) {
            let value = discrete_at(values, dk.key)?;
            if value >= dk.cardinality {
                return Err(HybridError::InvalidAssignment {
                    key: dk.key,
                    value,
                    cardinality: dk.cardinality,
                });
            }
            index += value * stride;
        }
        Ok(index)
    }

    /// Value of the key at `position` within assignment `index`.
    fn digit(&self, index: usize, position: usize) -> usize {
        (index / self.strides[position]) % self.keys[position].cardinality
    }

    /// The assignment with linear index `index`.
    pub fn assignment_at(&self, index: usize) -> DiscreteValues {
        self.keys
            .iter()
            .enumerate()
            .map(|(pos, dk)| (dk.key, self.digit(index, pos)))
            .collect()
    }

    /// Every assignment in enumeration order.
    pub fn assignments(&self) -> impl Iterator<Item = DiscreteValues> + '_ {
        (0..self.size).map(move |index| self.assignment_at(index))
    }

    /// Union of two domains, ordered by key.
    pub fn union(&self, other: &DiscreteDomain) -> Result<DiscreteDomain, HybridError> {
        let mut keys: Vec<DiscreteKey> = self.keys.to_vec();
        for dk in other.keys() {
            match keys.iter().find(|existing| existing.key == dk.key) {
                Some(existing) if existing.cardinality != dk.cardinality => {
                    return Err(HybridError::InvalidStructure(format!(
                        "discrete key {} has cardinality {} and {}",
                        dk.key, existing.cardinality, dk.cardinality
                    )));
                }
                Some(_) => {}
                None => keys.push(*dk),
            }
        }
        keys.sort_by_key(|dk| dk.key);
        DiscreteDomain::new(keys)
    }

    /// Positions in `self` of every key of `sub`.
    fn positions_of(&self, sub: &DiscreteDomain) -> Result<SmallVec<[usize; INLINE_KEYS]>, HybridError> {
        sub.keys
            .iter()
            .map(|dk| match self.position(dk.key) {
                Some(pos) if self.keys[pos].cardinality == dk.cardinality => Ok(pos),
                Some(pos) => Err(HybridError::InvalidStructure(format!(
                    "discrete key {} has cardinality {} and {}",
                    dk.key, self.keys[pos].cardinality, dk.cardinality
                ))),
                None => Err(HybridError::InvalidStructure(format!(
                    "discrete key {} is not part of the domain",
                    dk.key
                ))),
            })
            .collect()
    }

    /// Projects assignment `index` of `self` onto `sub`, given `positions_of(sub)`.
    fn project(&self, index: usize, sub: &DiscreteDomain, positions: &[usize]) -> usize {
        positions
            .iter()
            .zip(&sub.strides)
            .map(|(&pos, stride)| self.digit(index, pos) * stride)
            .sum()
    }
}

/// A real value for every assignment of a discrete domain.
///
/// Used for joint probability tables, discrete conditionals, and the
/// per-assignment error and probability trees of the hybrid Bayes net.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTable {
    domain: DiscreteDomain,
    values: Vec<f64>,
}

impl DecisionTable {
    /// Builds a table from values laid out in enumeration order.
    pub fn new(
        keys: impl IntoIterator<Item = DiscreteKey>,
        values: Vec<f64>,
    ) -> Result<Self, HybridError> {
        let domain = DiscreteDomain::new(keys)?;
        Self::from_domain(domain, values)
    }

    pub fn from_domain(domain: DiscreteDomain, values: Vec<f64>) -> Result<Self, HybridError> {
        if values.len() != domain.size() {
            return Err(HybridError::dimension(
                "decision table values",
                domain.size(),
                values.len(),
            ));
        }
        if values.iter().any(|v| v.is_nan()) {
            return Err(HybridError::Numerical(
                "decision table contains NaN".into(),
            ));
        }
        Ok(Self { domain, values })
    }

    /// A table with no keys holding a single value.
    pub fn constant(value: f64) -> Self {
        Self {
            domain: DiscreteDomain::empty(),
            values: vec![value],
        }
    }

    /// Builds a table by evaluating `f` on every assignment.
    pub fn from_fn(
        keys: impl IntoIterator<Item = DiscreteKey>,
        mut f: impl FnMut(&DiscreteValues) -> f64,
    ) -> Result<Self, HybridError> {
        let domain = DiscreteDomain::new(keys)?;
        let values = domain.assignments().map(|a| f(&a)).collect();
        Self::from_domain(domain, values)
    }

    /// Like [`from_fn`](Self::from_fn) but `f` may fail.
    pub fn try_from_fn(
        keys: impl IntoIterator<Item = DiscreteKey>,
        mut f: impl FnMut(&DiscreteValues) -> Result<f64, HybridError>,
    ) -> Result<Self, HybridError> {
        let domain = DiscreteDomain::new(keys)?;
        let values = domain
            .assignments()
            .map(|a| f(&a))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_domain(domain, values)
    }

    pub fn domain(&self) -> &DiscreteDomain {
        &self.domain
    }

    pub fn keys(&self) -> &[DiscreteKey] {
        self.domain.keys()
    }

    /// Number of leaves (assignments), zero-valued ones included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of leaves with a non-zero value.
    pub fn nr_nonzero(&self) -> usize {
        self.values.iter().filter(|v| **v != 0.0).count()
    }

    /// Value at the assignment; keys outside the table are ignored.
    pub fn value(&self, values: &DiscreteValues) -> Result<f64, HybridError> {
        Ok(self.values[self.domain.index_of(values)?])
    }

    /// `(assignment, value)` for every leaf in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (DiscreteValues, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| (self.domain.assignment_at(i), *v))
    }

    /// Applies `f` to every leaf.
    pub fn apply(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            domain: self.domain.clone(),
            values: self.values.iter().map(|v| f(*v)).collect(),
        }
    }

    /// Pointwise combination over the union of both domains.
    pub fn combine(
        &self,
        other: &DecisionTable,
        op: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, HybridError> {
        let domain = self.domain.union(&other.domain)?;
        let lhs = domain.positions_of(&self.domain)?;
        let rhs = domain.positions_of(&other.domain)?;
        let values = (0..domain.size())
            .map(|i| {
                let a = self.values[domain.project(i, &self.domain, &lhs)];
                let b = other.values[domain.project(i, &other.domain, &rhs)];
                op(a, b)
            })
            .collect();
        Ok(Self { domain, values })
    }

    pub fn multiply(&self, other: &DecisionTable) -> Result<Self, HybridError> {
        self.combine(other, |a, b| a * b)
    }

    /// Pointwise sum. `∞ + x` stays `∞`, matching error semantics of pruned branches.
    pub fn add(&self, other: &DecisionTable) -> Result<Self, HybridError> {
        self.combine(other, |a, b| a + b)
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Rescales the leaves so they sum to one.
    pub fn normalize(&self) -> Result<Self, HybridError> {
        let total = self.sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(HybridError::Numerical(format!(
                "cannot normalize decision table with total mass {}",
                total
            )));
        }
        Ok(self.apply(|v| v / total))
    }

    /// Assignment of the largest leaf; the first one in enumeration order wins ties.
    pub fn argmax(&self) -> (DiscreteValues, f64) {
        let mut best = 0;
        for (i, v) in self.values.iter().enumerate() {
            if *v > self.values[best] {
                best = i;
            }
        }
        (self.domain.assignment_at(best), self.values[best])
    }

    /// Keeps the `max_leaves` largest non-zero leaves and zeroes the rest.
    ///
    /// Leaves with equal values are retained in enumeration order.
    pub fn prune(&self, max_leaves: usize) -> Self {
        if self.nr_nonzero() <= max_leaves {
            return self.clone();
        }
        let mut order: Vec<usize> = (0..self.values.len()).collect();
        // Stable sort keeps enumeration order among ties.
        order.sort_by(|&a, &b| self.values[b].total_cmp(&self.values[a]));

        let mut values = vec![0.0; self.values.len()];
        for &i in order.iter().take(max_leaves) {
            values[i] = self.values[i];
        }
        Self {
            domain: self.domain.clone(),
            values,
        }
    }

    /// Max-projection onto the keys of `keys` that this table contains.
    ///
    /// Keys the table does not mention are dropped from the result, so the
    /// projection never constrains them.
    pub fn max_marginal(&self, keys: &[DiscreteKey]) -> Result<Self, HybridError> {
        let shared: Vec<DiscreteKey> = keys
            .iter()
            .filter(|dk| self.domain.contains(dk.key))
            .copied()
            .collect();
        let target = DiscreteDomain::new(shared)?;
        let positions = self.domain.positions_of(&target)?;
        let mut values = vec![f64::NEG_INFINITY; target.size()];
        for (i, v) in self.values.iter().enumerate() {
            let j = self.domain.project(i, &target, &positions);
            values[j] = values[j].max(*v);
        }
        Ok(Self {
            domain: target,
            values,
        })
    }

    /// Approximate equality over identical domains.
    pub fn equals(&self, other: &DecisionTable, tol: f64) -> bool {
        self.domain == other.domain
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a == b || (a - b).abs() <= tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::symbol;

    fn a() -> DiscreteKey {
        DiscreteKey::new(symbol('a', 0), 2)
    }

    fn b() -> DiscreteKey {
        DiscreteKey::new(symbol('b', 0), 3)
    }

    fn assignment(pairs: &[(DiscreteKey, usize)]) -> DiscreteValues {
        pairs.iter().map(|(dk, v)| (dk.key, *v)).collect()
    }

    #[test]
    fn last_key_varies_fastest() {
        let table = DecisionTable::new([a(), b()], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
            .expect("table");
        assert_eq!(table.value(&assignment(&[(a(), 0), (b(), 2)])).expect("v"), 2.0);
        assert_eq!(table.value(&assignment(&[(a(), 1), (b(), 0)])).expect("v"), 3.0);
    }

    #[test]
    fn rejects_wrong_number_of_values() {
        let err = DecisionTable::new([a(), b()], vec![1.0; 5]).expect_err("size");
        assert!(matches!(err, HybridError::DimensionMismatch { expected: 6, actual: 5, .. }));
    }

    #[test]
    fn rejects_duplicate_keys() {
        assert!(DiscreteDomain::new([a(), a()]).is_err());
    }

    #[test]
    fn value_reports_missing_and_out_of_range() {
        let table = DecisionTable::new([a()], vec![0.5, 0.5]).expect("table");
        assert!(matches!(
            table.value(&DiscreteValues::new()),
            Err(HybridError::MissingDiscreteAssignment { .. })
        ));
        assert!(matches!(
            table.value(&assignment(&[(a(), 2)])),
            Err(HybridError::InvalidAssignment { value: 2, cardinality: 2, .. })
        ));
    }

    #[test]
    fn multiply_spans_union_of_keys() {
        let pa = DecisionTable::new([a()], vec![0.25, 0.75]).expect("pa");
        let pb = DecisionTable::new([b()], vec![0.2, 0.3, 0.5]).expect("pb");
        let joint = pa.multiply(&pb).expect("joint");

        assert_eq!(joint.keys(), &[a(), b()]);
        assert!((joint.sum() - 1.0).abs() < 1e-12);
        let v = joint.value(&assignment(&[(a(), 1), (b(), 2)])).expect("v");
        assert!((v - 0.375).abs() < 1e-12);
    }

    #[test]
    fn multiply_is_commutative() {
        let pa = DecisionTable::new([a()], vec![0.25, 0.75]).expect("pa");
        let pb = DecisionTable::new([b()], vec![0.2, 0.3, 0.5]).expect("pb");
        let ab = pa.multiply(&pb).expect("ab");
        let ba = pb.multiply(&pa).expect("ba");
        assert!(ab.equals(&ba, 1e-15));
    }

    #[test]
    fn combine_rejects_conflicting_cardinality() {
        let t1 = DecisionTable::new([a()], vec![1.0, 1.0]).expect("t1");
        let t2 = DecisionTable::new([DiscreteKey::new(symbol('a', 0), 3)], vec![1.0; 3])
            .expect("t2");
        assert!(matches!(
            t1.multiply(&t2),
            Err(HybridError::InvalidStructure(_))
        ));
    }

    #[test]
    fn argmax_keeps_first_maximum() {
        let table = DecisionTable::new([b()], vec![0.4, 0.4, 0.2]).expect("table");
        let (best, value) = table.argmax();
        assert_eq!(best.get(&b().key), Some(&0));
        assert_eq!(value, 0.4);
    }

    #[test]
    fn prune_keeps_largest_leaves() {
        let table = DecisionTable::new([a(), b()], vec![0.1, 0.3, 0.05, 0.2, 0.25, 0.1])
            .expect("table");
        let pruned = table.prune(3);
        assert_eq!(pruned.nr_nonzero(), 3);
        assert_eq!(pruned.values(), &[0.0, 0.3, 0.0, 0.2, 0.25, 0.0]);
    }

    #[test]
    fn prune_breaks_ties_by_enumeration_order() {
        let table = DecisionTable::new([b()], vec![0.25, 0.5, 0.25]).expect("table");
        let pruned = table.prune(2);
        assert_eq!(pruned.values(), &[0.25, 0.5, 0.0]);
    }

    #[test]
    fn prune_is_identity_below_limit() {
        let table = DecisionTable::new([a()], vec![0.0, 1.0]).expect("table");
        assert_eq!(table.prune(1), table);
    }

    #[test]
    fn max_marginal_projects_onto_shared_keys() {
        let table = DecisionTable::new([a(), b()], vec![0.1, 0.3, 0.05, 0.2, 0.25, 0.1])
            .expect("table");
        let projected = table
            .max_marginal(&[b(), DiscreteKey::new(symbol('c', 0), 2)])
            .expect("projection");
        assert_eq!(projected.keys(), &[b()]);
        assert_eq!(projected.values(), &[0.2, 0.3, 0.1]);
    }

    #[test]
    fn constant_table_has_single_assignment() {
        let table = DecisionTable::constant(2.0);
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(&DiscreteValues::new()).expect("v"), 2.0);
        let (best, _) = table.argmax();
        assert!(best.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn leaves() -> impl Strategy<Value = Vec<f64>> {
            prop::collection::vec(prop_oneof![Just(0.0), 0.0f64..1.0], 6)
        }

        proptest! {
            #[test]
            fn prune_never_exceeds_leaf_budget(values in leaves(), k in 1usize..8) {
                let table = DecisionTable::new([a(), b()], values).unwrap();
                let pruned = table.prune(k);
                prop_assert!(pruned.nr_nonzero() <= k);
                for (kept, original) in pruned.values().iter().zip(table.values()) {
                    prop_assert!(*kept == 0.0 || kept == original);
                }
            }

            #[test]
            fn max_marginal_dominates_every_leaf(values in leaves()) {
                let table = DecisionTable::new([a(), b()], values).unwrap();
                let projected = table.max_marginal(&[a()]).unwrap();
                for (assignment, v) in table.iter() {
                    prop_assert!(projected.value(&assignment).unwrap() >= v);
                }
            }
        }
    }
}
