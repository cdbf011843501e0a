//! The underlying-model contract.
//!
//! The bridging core never stores a problem itself; it talks to an opaque
//! mutable model through the [`ModelRead`]/[`ModelLike`] traits. Solver
//! wrappers implement these; [`mock::MockModel`] is the in-crate test
//! double with injectable solution values.
//!
//! Attribute dispatch is a closed enumeration ([`Attr`]) with one handler
//! per bridge, not runtime reflection.

pub mod mock;

pub use mock::MockModel;

use crate::construct::{ConstructType, Function, FunctionType, OptimizationSense, Set, SetType};
use crate::error::{BridgeError, Result};
use crate::index::{ConstraintIndex, VariableIndex};

/// The attribute kinds the core can get or set on a construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    /// The function of a constraint.
    ConstraintFunction,
    /// The set of a constraint.
    ConstraintSet,
    /// The value of a constraint's function at the solution.
    ConstraintPrimal,
    /// The dual value of a constraint at the solution.
    ConstraintDual,
    /// A warm-start value for a constraint's primal.
    PrimalStart,
    /// A warm-start value for a constraint's dual.
    DualStart,
    /// The objective function.
    ObjectiveFunction,
    /// The objective value at the solution.
    ObjectiveValue,
}

/// A value carried by an attribute get or set.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// A function value.
    Function(Function),
    /// A set value.
    Set(Set),
    /// A scalar value.
    Scalar(f64),
    /// No value (an unset start, for example).
    Missing,
}

impl AttrValue {
    /// Unwrap a scalar, failing with a state error otherwise.
    pub fn into_scalar(self) -> Result<f64> {
        match self {
            AttrValue::Scalar(v) => Ok(v),
            other => Err(BridgeError::State(format!(
                "expected a scalar attribute value, got {other:?}"
            ))),
        }
    }

    /// Unwrap a function, failing with a state error otherwise.
    pub fn into_function(self) -> Result<Function> {
        match self {
            AttrValue::Function(f) => Ok(f),
            other => Err(BridgeError::State(format!(
                "expected a function attribute value, got {other:?}"
            ))),
        }
    }

    /// Unwrap a set, failing with a state error otherwise.
    pub fn into_set(self) -> Result<Set> {
        match self {
            AttrValue::Set(s) => Ok(s),
            other => Err(BridgeError::State(format!(
                "expected a set attribute value, got {other:?}"
            ))),
        }
    }

    /// Unwrap an optional scalar (`Missing` maps to `None`).
    pub fn into_optional_scalar(self) -> Result<Option<f64>> {
        match self {
            AttrValue::Scalar(v) => Ok(Some(v)),
            AttrValue::Missing => Ok(None),
            other => Err(BridgeError::State(format!(
                "expected an optional scalar attribute value, got {other:?}"
            ))),
        }
    }
}

impl From<Option<f64>> for AttrValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => AttrValue::Scalar(v),
            None => AttrValue::Missing,
        }
    }
}

/// An incremental change to a construct's function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modification {
    /// Replace the net coefficient on one variable.
    ScalarCoefficientChange {
        /// The variable whose coefficient changes.
        variable: VariableIndex,
        /// The new coefficient.
        new_coefficient: f64,
    },
    /// Replace the constant term.
    ConstantChange {
        /// The new constant.
        new_constant: f64,
    },
}

/// Read-only view of a model.
///
/// Everything a bridge needs while reconstructing attributes; the bridge
/// optimizer hands bridges a view that routes bridged inner indices back
/// through their owners.
pub trait ModelRead {
    /// Whether the model natively accepts the given construct type.
    fn supports(&self, ty: &ConstructType) -> bool;

    /// The function of a constraint.
    fn constraint_function(&self, ci: ConstraintIndex) -> Result<Function>;

    /// The set of a constraint.
    fn constraint_set(&self, ci: ConstraintIndex) -> Result<Set>;

    /// The value of a constraint's function at the solution.
    fn constraint_primal(&self, ci: ConstraintIndex) -> Result<f64>;

    /// The dual value of a constraint at the solution.
    fn constraint_dual(&self, ci: ConstraintIndex) -> Result<f64>;

    /// The constraint's primal warm start, if set.
    fn primal_start(&self, ci: ConstraintIndex) -> Result<Option<f64>>;

    /// The constraint's dual warm start, if set.
    fn dual_start(&self, ci: ConstraintIndex) -> Result<Option<f64>>;

    /// The value of a variable at the solution.
    fn variable_primal(&self, vi: VariableIndex) -> Result<f64>;

    /// The objective function.
    fn objective_function(&self) -> Result<Function>;

    /// The objective value at the solution.
    fn objective_value(&self) -> Result<f64>;

    /// The optimization sense.
    fn sense(&self) -> OptimizationSense;

    /// Number of constraints of the given type.
    fn num_constraints(&self, fty: FunctionType, sty: SetType) -> usize;

    /// Indices of the constraints of the given type.
    fn constraint_indices(&self, fty: FunctionType, sty: SetType) -> Vec<ConstraintIndex>;
}

/// Full model contract: reads plus mutation and solving.
///
/// The bridge optimizer both consumes this trait (for the underlying model)
/// and implements it (as a drop-in substitute for callers).
pub trait ModelLike: ModelRead {
    /// Create a fresh variable.
    fn add_variable(&mut self) -> VariableIndex;

    /// Add a constraint `f(x) in s`.
    fn add_constraint(&mut self, f: Function, s: Set) -> Result<ConstraintIndex>;

    /// Delete a constraint. Deleting a missing index fails loudly.
    fn delete_constraint(&mut self, ci: ConstraintIndex) -> Result<()>;

    /// Delete a variable. Deleting a missing index fails loudly.
    fn delete_variable(&mut self, vi: VariableIndex) -> Result<()>;

    /// Replace a constraint's function.
    fn set_constraint_function(&mut self, ci: ConstraintIndex, f: Function) -> Result<()>;

    /// Replace a constraint's set.
    fn set_constraint_set(&mut self, ci: ConstraintIndex, s: Set) -> Result<()>;

    /// Apply an incremental change to a constraint's function.
    fn modify_constraint(&mut self, ci: ConstraintIndex, change: &Modification) -> Result<()>;

    /// Set or clear a constraint's primal warm start.
    fn set_primal_start(&mut self, ci: ConstraintIndex, value: Option<f64>) -> Result<()>;

    /// Set or clear a constraint's dual warm start.
    fn set_dual_start(&mut self, ci: ConstraintIndex, value: Option<f64>) -> Result<()>;

    /// Set the objective function.
    fn set_objective(&mut self, f: Function) -> Result<()>;

    /// Remove the objective ("no objective").
    fn clear_objective(&mut self) -> Result<()>;

    /// Set the optimization sense.
    fn set_sense(&mut self, sense: OptimizationSense) -> Result<()>;

    /// Ask the model to solve the current problem.
    fn optimize(&mut self) -> Result<()>;
}
