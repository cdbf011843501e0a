//! Opaque indices for variables and constraints.
//!
//! Constraint indices live in two spaces. The underlying model mints
//! positive ("inner") indices; the bridge optimizer mints negative ("outer")
//! indices for constraints it intercepts. The two spaces never collide, and
//! outer indices are never reused within one optimizer's lifetime.

use std::fmt;

/// Unique identifier for a variable in the underlying model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableIndex(u64);

impl VariableIndex {
    /// Create a variable index from its raw value.
    pub fn new(value: u64) -> Self {
        VariableIndex(value)
    }

    /// Get the raw index value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VariableIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x[{}]", self.0)
    }
}

/// Unique identifier for a constraint.
///
/// Positive values are inner indices minted by the underlying model;
/// negative values are outer indices minted by the bridge optimizer for
/// bridged constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintIndex(i64);

impl ConstraintIndex {
    /// Create a constraint index from its raw value.
    pub fn new(value: i64) -> Self {
        ConstraintIndex(value)
    }

    /// Get the raw index value.
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Whether this index identifies a bridged (optimizer-owned) constraint.
    pub fn is_bridged(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ConstraintIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c[{}]", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridged_detection() {
        assert!(ConstraintIndex::new(-1).is_bridged());
        assert!(!ConstraintIndex::new(1).is_bridged());
        assert!(!ConstraintIndex::new(0).is_bridged());
    }

    #[test]
    fn test_display() {
        assert_eq!(VariableIndex::new(3).to_string(), "x[3]");
        assert_eq!(ConstraintIndex::new(-2).to_string(), "c[-2]");
    }
}
