//! Discrete conditionals `P(frontals | parents)` over finite domains.

use std::ops::Range;

use rand::Rng;

use crate::discrete::table::{DecisionTable, DiscreteDomain, DiscreteKeys};
use crate::errors::HybridError;
use crate::keys::{DiscreteKey, Key};
use crate::values::DiscreteValues;

/// Tolerance used when checking that each parent row sums to one.
pub const DEFAULT_NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// A conditional probability table.
///
/// The underlying table is keyed by `parents ++ frontals`, so the frontal
/// entries for one parent assignment form a contiguous row.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteConditional {
    frontals: DiscreteDomain,
    parents: DiscreteDomain,
    table: DecisionTable,
}

impl DiscreteConditional {
    /// Builds a conditional from row-major probabilities.
    ///
    /// `values` holds one row per parent assignment (parent enumeration order),
    /// each row listing the frontal assignments in enumeration order. Every
    /// row must sum to one.
    pub fn new(
        frontals: impl IntoIterator<Item = DiscreteKey>,
        parents: impl IntoIterator<Item = DiscreteKey>,
        values: Vec<f64>,
    ) -> Result<Self, HybridError> {
        let conditional = Self::from_parts_unchecked(frontals, parents, values)?;
        if conditional.frontals.is_scalar() {
            return Err(HybridError::ValidationError(
                "discrete conditional needs at least one frontal key".into(),
            ));
        }
        if conditional.table.values().iter().any(|p| *p < 0.0 || !p.is_finite()) {
            return Err(HybridError::Numerical(
                "discrete conditional probabilities must be finite and non-negative".into(),
            ));
        }
        if !conditional.is_normalized(DEFAULT_NORMALIZATION_TOLERANCE) {
            return Err(HybridError::Numerical(
                "discrete conditional rows must sum to one".into(),
            ));
        }
        Ok(conditional)
    }

    /// A prior `P(key)` from its probability vector.
    pub fn prior(key: DiscreteKey, probabilities: &[f64]) -> Result<Self, HybridError> {
        Self::new([key], [], probabilities.to_vec())
    }

    /// Builds `P(frontal | parents)` from a compact row specification.
    ///
    /// Rows are separated by whitespace, entries within a row by `/`, and each
    /// row is normalized: `"4/6"` is the prior `(0.4, 0.6)`, `"1/3 2/2"` has one
    /// row per value of a binary parent.
    pub fn from_spec(
        frontal: DiscreteKey,
        parents: &[DiscreteKey],
        spec: &str,
    ) -> Result<Self, HybridError> {
        let parent_domain = DiscreteDomain::new(parents.iter().copied())?;
        let rows: Vec<&str> = spec.split_whitespace().collect();
        if rows.len() != parent_domain.size() {
            return Err(HybridError::dimension(
                format!("spec rows for {}", frontal.key),
                parent_domain.size(),
                rows.len(),
            ));
        }

        let mut values = Vec::with_capacity(parent_domain.size() * frontal.cardinality);
        for row in rows {
            let weights = row
                .split('/')
                .map(|w| {
                    w.trim().parse::<f64>().map_err(|_| {
                        HybridError::ValidationError(format!("invalid weight '{}' in spec", w))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if weights.len() != frontal.cardinality {
                return Err(HybridError::dimension(
                    format!("spec row '{}'", row),
                    frontal.cardinality,
                    weights.len(),
                ));
            }
            let total: f64 = weights.iter().sum();
            if !(total.is_finite() && total > 0.0) {
                return Err(HybridError::ValidationError(format!(
                    "spec row '{}' has no probability mass",
                    row
                )));
            }
            values.extend(weights.iter().map(|w| w / total));
        }

        Self::new([frontal], parents.iter().copied(), values)
    }

    fn from_parts_unchecked(
        frontals: impl IntoIterator<Item = DiscreteKey>,
        parents: impl IntoIterator<Item = DiscreteKey>,
        values: Vec<f64>,
    ) -> Result<Self, HybridError> {
        let frontals = DiscreteDomain::new(frontals)?;
        let parents = DiscreteDomain::new(parents)?;
        let keys: DiscreteKeys = parents
            .keys()
            .iter()
            .chain(frontals.keys())
            .copied()
            .collect();
        let table = DecisionTable::new(keys, values)?;
        Ok(Self {
            frontals,
            parents,
            table,
        })
    }

    pub fn frontals(&self) -> &[DiscreteKey] {
        self.frontals.keys()
    }

    pub fn parents(&self) -> &[DiscreteKey] {
        self.parents.keys()
    }

    pub fn frontal_keys(&self) -> Vec<Key> {
        self.frontals().iter().map(|dk| dk.key).collect()
    }

    pub fn parent_keys(&self) -> Vec<Key> {
        self.parents().iter().map(|dk| dk.key).collect()
    }

    /// Every key of the conditional, frontals first.
    pub fn discrete_keys(&self) -> DiscreteKeys {
        self.frontals()
            .iter()
            .chain(self.parents())
            .copied()
            .collect()
    }

    /// The table keyed by `parents ++ frontals`.
    pub fn table(&self) -> &DecisionTable {
        &self.table
    }

    /// `P(frontals | parents)` at the given assignment.
    pub fn evaluate(&self, values: &DiscreteValues) -> Result<f64, HybridError> {
        self.table.value(values)
    }

    /// Negative log probability; `+∞` for impossible assignments.
    pub fn error(&self, values: &DiscreteValues) -> Result<f64, HybridError> {
        Ok(-self.evaluate(values)?.ln())
    }

    /// Negative log probability for every assignment of the conditional's keys.
    pub fn error_table(&self) -> DecisionTable {
        self.table.apply(|p| -p.ln())
    }

    fn row(&self, parent_values: &DiscreteValues) -> Result<Range<usize>, HybridError> {
        let width = self.frontals.size();
        let start = self.parents.index_of(parent_values)? * width;
        Ok(start..start + width)
    }

    /// Most probable frontal assignment given the parents.
    ///
    /// The first maximal entry in enumeration order wins ties.
    pub fn argmax(&self, parent_values: &DiscreteValues) -> Result<DiscreteValues, HybridError> {
        let row = &self.table.values()[self.row(parent_values)?];
        let mut best = 0;
        for (i, p) in row.iter().enumerate() {
            if *p > row[best] {
                best = i;
            }
        }
        Ok(self.frontals.assignment_at(best))
    }

    /// Draws a frontal assignment given the parents.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        parent_values: &DiscreteValues,
        rng: &mut R,
    ) -> Result<DiscreteValues, HybridError> {
        let row = &self.table.values()[self.row(parent_values)?];
        let total: f64 = row.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(HybridError::Numerical(format!(
                "no probability mass on {} for the given parents",
                self.frontals()[0].key
            )));
        }

        let u = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        let mut chosen = None;
        for (i, p) in row.iter().enumerate() {
            if *p <= 0.0 {
                continue;
            }
            cumulative += p;
            chosen = Some(i);
            if u < cumulative {
                break;
            }
        }
        // Rounding can leave u just above the final cumulative sum.
        let index = chosen.unwrap_or(row.len() - 1);
        Ok(self.frontals.assignment_at(index))
    }

    /// Conditions a joint table on its keys that are not in `frontal_keys`.
    ///
    /// Each parent row is renormalized; rows without mass stay all-zero, so
    /// those parent values are impossible. Zero leaves of `joint` stay zero.
    pub fn from_joint(joint: &DecisionTable, frontal_keys: &[Key]) -> Result<Self, HybridError> {
        let (frontals, parents): (DiscreteKeys, DiscreteKeys) = joint
            .keys()
            .iter()
            .copied()
            .partition(|dk| frontal_keys.contains(&dk.key));
        if frontals.is_empty() {
            return Err(HybridError::ValidationError(
                "discrete conditional needs at least one frontal key".into(),
            ));
        }

        let domain = DiscreteDomain::new(parents.iter().chain(&frontals).copied())?;
        let mut values = domain
            .assignments()
            .map(|assignment| joint.value(&assignment))
            .collect::<Result<Vec<_>, _>>()?;
        if values.iter().any(|p| *p < 0.0 || !p.is_finite()) {
            return Err(HybridError::Numerical(
                "joint table must be finite and non-negative".into(),
            ));
        }
        let row_len: usize = frontals.iter().map(|dk| dk.cardinality).product();
        for row in values.chunks_mut(row_len) {
            let total: f64 = row.iter().sum();
            if total > 0.0 {
                row.iter_mut().for_each(|p| *p /= total);
            }
        }

        Self::from_parts_unchecked(frontals, parents, values)
    }

    /// Whether every parent row sums to one (all-zero rows are allowed).
    pub fn is_normalized(&self, tol: f64) -> bool {
        self.table
            .values()
            .chunks(self.frontals.size())
            .all(|row| {
                let total: f64 = row.iter().sum();
                total == 0.0 || (total - 1.0).abs() <= tol
            })
    }

    pub fn equals(&self, other: &DiscreteConditional, tol: f64) -> bool {
        self.frontals == other.frontals
            && self.parents == other.parents
            && self.table.equals(&other.table, tol)
    }
}
