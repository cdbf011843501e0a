//! The bridge protocol.
//!
//! A bridge re-expresses one construct type via more primitive construct
//! types. [`BridgeFactory`] is the catalog-level contract (what a bridge
//! type accepts, what it produces, what it costs, how to build one);
//! [`Bridge`] is the live instance owning the underlying resources it
//! created and reconstructing the caller's view of attributes from them.
//!
//! Factories receive the *bridged* model handle when building: adding a
//! produced construct through it re-enters the optimizer, so chains deeper
//! than one bridge compose without the factory knowing.

pub mod flip;
pub mod slack;
pub mod substitution;

pub use flip::FlipBridgeFactory;
pub use slack::ObjectiveSlackBridgeFactory;
pub use substitution::ParametricSubstitutionBridgeFactory;

use std::fmt;

use crate::construct::{ConstructType, Function, OptimizationSense, Set};
use crate::error::{BridgeError, Result};
use crate::index::{ConstraintIndex, VariableIndex};
use crate::model::{Attr, AttrValue, ModelLike, ModelRead, Modification};

/// Catalog entry: one reformulation recipe.
pub trait BridgeFactory {
    /// Unique name of this bridge type, used for catalog mutation and logs.
    fn name(&self) -> &'static str;

    /// Whether this bridge can consume the given construct type.
    fn accepts(&self, ty: &ConstructType) -> bool;

    /// The construct types emitted when consuming `ty`.
    ///
    /// Only meaningful when `accepts(ty)`; used by the selector to cost
    /// chains and by the catalog's acyclicity check.
    fn produced(&self, ty: &ConstructType) -> Vec<ConstructType>;

    /// Cost of applying this bridge. Chain cost is the sum over the chain.
    fn cost(&self) -> u64 {
        1
    }

    /// Build an instance for a constraint `f(x) in s`.
    ///
    /// Deterministic. Fails with `UnsupportedConstruct` on a
    /// parameterization this bridge cannot handle, rolling back anything
    /// already created on the model.
    fn build_constraint(
        &self,
        model: &mut dyn ModelLike,
        f: &Function,
        s: &Set,
    ) -> Result<Box<dyn Bridge>> {
        let _ = model;
        Err(BridgeError::UnsupportedConstruct {
            construct: ConstructType::of_constraint(f, s),
        })
    }

    /// Build an instance for an objective function.
    fn build_objective(
        &self,
        model: &mut dyn ModelLike,
        f: &Function,
        sense: OptimizationSense,
    ) -> Result<Box<dyn Bridge>> {
        let _ = (model, sense);
        Err(BridgeError::UnsupportedConstruct {
            construct: ConstructType::of_objective(f),
        })
    }
}

/// A live bridge instance.
///
/// Owns the variables and constraints it created. Owned constraint indices
/// may themselves be bridged (negative): the model handle passed to every
/// method routes those back through their owners, so instances treat all
/// owned indices uniformly.
pub trait Bridge: fmt::Debug {
    /// The variables this instance created.
    fn owned_variables(&self) -> Vec<VariableIndex>;

    /// The constraints this instance created.
    fn owned_constraints(&self) -> Vec<ConstraintIndex>;

    /// Reconstruct the original construct's view of an attribute.
    fn get(&self, model: &dyn ModelRead, attr: Attr) -> Result<AttrValue>;

    /// Re-express a caller-set attribute onto owned resources.
    fn set(&mut self, model: &mut dyn ModelLike, attr: Attr, value: AttrValue) -> Result<()>;

    /// Translate an incremental change on the original construct.
    fn modify(&mut self, model: &mut dyn ModelLike, change: &Modification) -> Result<()>;

    /// Remove every owned resource. A second call fails loudly.
    fn delete(&mut self, model: &mut dyn ModelLike) -> Result<()>;

    /// Whether this instance requires a deferred finalization step.
    fn needs_final_touch(&self) -> bool {
        false
    }

    /// Deferred finalization, run once before each solve, after all adds
    /// and deletes. Must be idempotent from the caller's perspective.
    fn final_touch(&mut self, model: &mut dyn ModelLike) -> Result<()> {
        let _ = model;
        Ok(())
    }
}

/// Error for an attribute a bridge does not carry.
pub(crate) fn unsupported_attr(name: &'static str, attr: Attr) -> BridgeError {
    BridgeError::State(format!("bridge {name} does not handle attribute {attr:?}"))
}
