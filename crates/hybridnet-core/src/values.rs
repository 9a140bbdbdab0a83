//! Assignments of discrete and continuous variables.
//!
//! - **DiscreteValues**: ordered map from key to a value in `0..cardinality`
//! - **VectorValues**: ordered map from key to a real vector
//! - **HybridValues**: both halves of a joint assignment
//!
//! Ordered maps keep iteration (and therefore sampling and printing) deterministic.

use std::collections::btree_map;
use std::collections::BTreeMap;

use nalgebra::DVector;

use crate::errors::HybridError;
use crate::keys::Key;

/// Assignment of discrete keys to values.
pub type DiscreteValues = BTreeMap<Key, usize>;

/// Looks up a discrete value, failing with `MissingDiscreteAssignment`.
pub fn discrete_at(values: &DiscreteValues, key: Key) -> Result<usize, HybridError> {
    values
        .get(&key)
        .copied()
        .ok_or(HybridError::MissingDiscreteAssignment { key })
}

/// Assignment of continuous keys to real vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorValues {
    values: BTreeMap<Key, DVector<f64>>,
}

impl VectorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value of `key`.
    pub fn insert(&mut self, key: Key, value: DVector<f64>) {
        self.values.insert(key, value);
    }

    /// Inserts a scalar (1-dimensional) value.
    pub fn insert_scalar(&mut self, key: Key, value: f64) {
        self.values.insert(key, DVector::from_element(1, value));
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with(mut self, key: Key, value: DVector<f64>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: Key) -> Option<&DVector<f64>> {
        self.values.get(&key)
    }

    /// Returns the value of `key` or `MissingKey`.
    pub fn at(&self, key: Key) -> Result<&DVector<f64>, HybridError> {
        self.values.get(&key).ok_or(HybridError::MissingKey { key })
    }

    pub fn contains(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }

    /// Copies every entry of `other` into `self`, overwriting duplicates.
    pub fn update(&mut self, other: &VectorValues) {
        for (key, value) in other.iter() {
            self.values.insert(key, value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, &DVector<f64>)> + '_ {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Total dimension of all stored vectors.
    pub fn dim(&self) -> usize {
        self.values.values().map(|v| v.len()).sum()
    }

    /// Approximate equality: same keys and element-wise difference within `tol`.
    pub fn equals(&self, other: &VectorValues, tol: f64) -> bool {
        self.values.len() == other.values.len()
            && self.values.iter().all(|(key, value)| match other.values.get(key) {
                Some(o) => o.len() == value.len() && (value - o).amax() <= tol,
                None => false,
            })
    }
}

impl FromIterator<(Key, DVector<f64>)> for VectorValues {
    fn from_iter<I: IntoIterator<Item = (Key, DVector<f64>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for VectorValues {
    type Item = (Key, DVector<f64>);
    type IntoIter = btree_map::IntoIter<Key, DVector<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// A joint assignment over discrete and continuous variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridValues {
    continuous: VectorValues,
    discrete: DiscreteValues,
}

impl HybridValues {
    pub fn new(continuous: VectorValues, discrete: DiscreteValues) -> Self {
        Self {
            continuous,
            discrete,
        }
    }

    pub fn continuous(&self) -> &VectorValues {
        &self.continuous
    }

    pub fn discrete(&self) -> &DiscreteValues {
        &self.discrete
    }

    pub fn insert(&mut self, key: Key, value: DVector<f64>) {
        self.continuous.insert(key, value);
    }

    pub fn insert_scalar(&mut self, key: Key, value: f64) {
        self.continuous.insert_scalar(key, value);
    }

    pub fn insert_discrete(&mut self, key: Key, value: usize) {
        self.discrete.insert(key, value);
    }

    /// Continuous value of `key` or `MissingKey`.
    pub fn at(&self, key: Key) -> Result<&DVector<f64>, HybridError> {
        self.continuous.at(key)
    }

    /// Discrete value of `key` or `MissingDiscreteAssignment`.
    pub fn at_discrete(&self, key: Key) -> Result<usize, HybridError> {
        discrete_at(&self.discrete, key)
    }

    /// Merges continuous values into this assignment, overwriting duplicates.
    pub fn update_continuous(&mut self, other: &VectorValues) {
        self.continuous.update(other);
    }

    /// Merges discrete values into this assignment, overwriting duplicates.
    pub fn update_discrete(&mut self, other: &DiscreteValues) {
        self.discrete
            .extend(other.iter().map(|(key, value)| (*key, *value)));
    }

    /// Merges both halves of `other` into this assignment.
    pub fn update(&mut self, other: &HybridValues) {
        self.update_continuous(&other.continuous);
        self.update_discrete(&other.discrete);
    }

    pub fn into_parts(self) -> (VectorValues, DiscreteValues) {
        (self.continuous, self.discrete)
    }

    pub fn equals(&self, other: &HybridValues, tol: f64) -> bool {
        self.discrete == other.discrete && self.continuous.equals(&other.continuous, tol)
    }
}

impl From<VectorValues> for HybridValues {
    fn from(continuous: VectorValues) -> Self {
        Self {
            continuous,
            discrete: DiscreteValues::new(),
        }
    }
}

impl From<DiscreteValues> for HybridValues {
    fn from(discrete: DiscreteValues) -> Self {
        Self {
            continuous: VectorValues::new(),
            discrete,
        }
    }
}
