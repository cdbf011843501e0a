//! Problem constructs: scalar functions, sets, and their type keys.
//!
//! A construct is either a constraint, written as a (function, set) pair
//! `f(x) in S`, or an objective, written as a function alone. Construct
//! *types* are the immutable keys the bridge catalog and graph search
//! operate on; the full type space is finite and enumerable, which is what
//! makes catalog acyclicity checkable at registration time.

pub mod function;
pub mod set;

use std::fmt;

pub use function::{AffineFunction, AffineTerm, Function, QuadraticFunction, QuadraticTerm};
pub use set::Set;

/// Shape of a scalar function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionType {
    /// A single variable.
    Variable,
    /// An affine combination of variables plus a constant.
    Affine,
    /// Quadratic terms plus an affine part.
    Quadratic,
}

impl FunctionType {
    /// All function shapes, in increasing expressiveness.
    pub const ALL: [FunctionType; 3] = [
        FunctionType::Variable,
        FunctionType::Affine,
        FunctionType::Quadratic,
    ];
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FunctionType::Variable => "Variable",
            FunctionType::Affine => "Affine",
            FunctionType::Quadratic => "Quadratic",
        };
        write!(f, "{name}")
    }
}

/// Shape of a constraint set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SetType {
    /// Upper-bounded half line.
    LessThan,
    /// Lower-bounded half line.
    GreaterThan,
    /// A single point.
    EqualTo,
}

impl SetType {
    /// All set shapes.
    pub const ALL: [SetType; 3] = [SetType::LessThan, SetType::GreaterThan, SetType::EqualTo];
}

impl fmt::Display for SetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetType::LessThan => "LessThan",
            SetType::GreaterThan => "GreaterThan",
            SetType::EqualTo => "EqualTo",
        };
        write!(f, "{name}")
    }
}

/// Immutable key identifying the kind of a construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstructType {
    /// A constraint `f(x) in S`, keyed by its function and set shapes.
    Constraint(FunctionType, SetType),
    /// An objective, keyed by its function shape.
    Objective(FunctionType),
}

impl ConstructType {
    /// Enumerate the whole construct type space.
    pub fn all() -> Vec<ConstructType> {
        let mut types = Vec::with_capacity(FunctionType::ALL.len() * (SetType::ALL.len() + 1));
        for fty in FunctionType::ALL {
            for sty in SetType::ALL {
                types.push(ConstructType::Constraint(fty, sty));
            }
        }
        for fty in FunctionType::ALL {
            types.push(ConstructType::Objective(fty));
        }
        types
    }

    /// The construct type of a constraint `(f, s)`.
    pub fn of_constraint(f: &Function, s: &Set) -> Self {
        ConstructType::Constraint(f.function_type(), s.set_type())
    }

    /// The construct type of an objective function.
    pub fn of_objective(f: &Function) -> Self {
        ConstructType::Objective(f.function_type())
    }
}

impl fmt::Display for ConstructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructType::Constraint(fty, sty) => write!(f, "Constraint({fty}, {sty})"),
            ConstructType::Objective(fty) => write!(f, "Objective({fty})"),
        }
    }
}

/// Direction of optimization.
///
/// `FeasibilitySense` means "no objective": the state a caller must pass
/// through before changing sense while an objective bridge is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OptimizationSense {
    /// Minimize the objective.
    Minimize,
    /// Maximize the objective.
    Maximize,
    /// No objective; find any feasible point.
    #[default]
    FeasibilitySense,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_space_is_finite() {
        let all = ConstructType::all();
        assert_eq!(all.len(), 12);
        // No duplicates.
        let mut sorted = all.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), all.len());
    }

    #[test]
    fn test_display_names_shapes() {
        let ty = ConstructType::Constraint(FunctionType::Affine, SetType::LessThan);
        assert_eq!(ty.to_string(), "Constraint(Affine, LessThan)");
        let ty = ConstructType::Objective(FunctionType::Quadratic);
        assert_eq!(ty.to_string(), "Objective(Quadratic)");
    }
}
