//! Discrete layer: decision tables and conditional probability tables.

pub mod conditional;
pub mod table;

pub use conditional::DiscreteConditional;
pub use table::{DecisionTable, DiscreteDomain, DiscreteKeys};
