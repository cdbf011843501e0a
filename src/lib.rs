//! # bridgecalc
//!
//! Automatic reformulation of optimization constructs.
//!
//! A model (a solver wrapper, usually) accepts only some combinations of
//! function shape and set; callers want to state their problem in whatever
//! combination is natural. This crate sits between the two: wrap the model
//! in a [`BridgeOptimizer`] and submit constructs freely. Anything the
//! model accepts natively passes straight through; anything else is
//! rewritten through a chain of *bridges* into constructs the model does
//! accept, while every attribute the caller reads back (functions, sets,
//! primal and dual values, the objective value) is reconstructed in terms
//! of what was originally submitted.
//!
//! ## Example
//!
//! ```
//! use bridgecalc::prelude::*;
//!
//! // A model that only takes affine <= constraints.
//! let mut inner = MockModel::affine();
//! inner.remove_support(&ConstructType::Constraint(
//!     FunctionType::Affine,
//!     SetType::GreaterThan,
//! ));
//! inner.remove_support(&ConstructType::Constraint(
//!     FunctionType::Variable,
//!     SetType::GreaterThan,
//! ));
//! let mut optimizer = BridgeOptimizer::new(inner);
//!
//! // A >= constraint is silently flipped into a <= one.
//! let x = optimizer.add_variable();
//! let f = Function::Affine(AffineFunction::new(vec![AffineTerm::new(2.0, x)], 0.0));
//! let ci = optimizer.add_constraint(f.clone(), Set::GreaterThan(1.0)).unwrap();
//!
//! // The caller still sees the constraint as submitted.
//! assert!(optimizer.constraint_function(ci).unwrap().approx_eq(&f, 1e-12));
//! assert_eq!(optimizer.constraint_set(ci).unwrap(), Set::GreaterThan(1.0));
//! ```
//!
//! ## Built-in bridges
//!
//! - **flip**: `f(x) >= c` becomes `-f(x) <= -c`.
//! - **parametric_substitution**: a quadratic constraint whose quadratic
//!   terms each touch a variable fixed by a `Variable == c` constraint is
//!   lowered to an affine constraint, with the fixed values re-read before
//!   every solve (a *final touch*).
//! - **objective_slack**: a general objective `g(x)` becomes a slack
//!   variable objective with a linking constraint.
//!
//! Custom bridges implement [`BridgeFactory`](bridge::BridgeFactory) and
//! [`Bridge`](bridge::Bridge) and register through
//! [`BridgeOptimizer::add_bridge`]. Selection picks the cheapest chain,
//! breaking ties by registration order, and is memoized until the catalog
//! changes.

pub mod bridge;
pub mod catalog;
pub mod construct;
pub mod error;
pub mod graph;
pub mod index;
pub mod model;
pub mod optimizer;

pub use error::{BridgeError, Result};
pub use optimizer::BridgeOptimizer;

/// Common imports for working with the crate.
pub mod prelude {
    pub use crate::catalog::BridgeCatalog;
    pub use crate::construct::{
        AffineFunction, AffineTerm, ConstructType, Function, FunctionType, OptimizationSense,
        QuadraticFunction, QuadraticTerm, Set, SetType,
    };
    pub use crate::error::{BridgeError, Result};
    pub use crate::index::{ConstraintIndex, VariableIndex};
    pub use crate::model::{
        Attr, AttrValue, MockModel, ModelLike, ModelRead, Modification,
    };
    pub use crate::optimizer::BridgeOptimizer;
}
