//! Objective-to-slack-variable reformulation.
//!
//! Rewrites a general scalar objective `g(x)` as a fresh variable `s`
//! constrained by `g(x) - s <= 0` (minimize) or `g(x) - s >= 0` (maximize),
//! with objective `s`. The solver may leave a numerical gap between `s` and
//! `g(x)`, so the reported objective value is reconstructed as
//! `constraint primal + s - set constant` rather than read from `s` alone.
//!
//! Changing the optimization sense while this bridge is attached is
//! unsupported; the caller clears the objective first. The optimizer
//! enforces that.

use crate::construct::{ConstructType, Function, FunctionType, OptimizationSense, Set, SetType};
use crate::error::{BridgeError, Result};
use crate::index::{ConstraintIndex, VariableIndex};
use crate::model::{Attr, AttrValue, ModelLike, ModelRead, Modification};

use super::{unsupported_attr, Bridge, BridgeFactory};

/// Factory for [`ObjectiveSlackBridge`].
#[derive(Debug, Default)]
pub struct ObjectiveSlackBridgeFactory;

impl ObjectiveSlackBridgeFactory {
    /// Create the factory.
    pub fn new() -> Self {
        ObjectiveSlackBridgeFactory
    }
}

impl BridgeFactory for ObjectiveSlackBridgeFactory {
    fn name(&self) -> &'static str {
        "objective_slack"
    }

    fn accepts(&self, ty: &ConstructType) -> bool {
        matches!(
            ty,
            ConstructType::Objective(FunctionType::Affine)
                | ConstructType::Objective(FunctionType::Quadratic)
        )
    }

    fn produced(&self, ty: &ConstructType) -> Vec<ConstructType> {
        match ty {
            // The orientation of the emitted constraint depends on the sense
            // at build time, so both must be reachable.
            ConstructType::Objective(fty) => vec![
                ConstructType::Constraint(*fty, SetType::LessThan),
                ConstructType::Constraint(*fty, SetType::GreaterThan),
                ConstructType::Objective(FunctionType::Variable),
            ],
            _ => Vec::new(),
        }
    }

    fn build_objective(
        &self,
        model: &mut dyn ModelLike,
        f: &Function,
        sense: OptimizationSense,
    ) -> Result<Box<dyn Bridge>> {
        if !self.accepts(&ConstructType::of_objective(f)) {
            return Err(BridgeError::UnsupportedConstruct {
                construct: ConstructType::of_objective(f),
            });
        }
        let set = match sense {
            OptimizationSense::Minimize => Set::LessThan(0.0),
            OptimizationSense::Maximize => Set::GreaterThan(0.0),
            OptimizationSense::FeasibilitySense => {
                return Err(BridgeError::State(
                    "cannot bridge an objective under FeasibilitySense; set a sense first".into(),
                ))
            }
        };

        let slack = model.add_variable();
        let inner = match model.add_constraint(f.minus_variable(slack), set) {
            Ok(ci) => ci,
            Err(e) => {
                // Failed builds must not leave partial state behind.
                let _ = model.delete_variable(slack);
                return Err(e);
            }
        };
        if let Err(e) = model.set_objective(Function::Variable(slack)) {
            let _ = model.delete_constraint(inner);
            let _ = model.delete_variable(slack);
            return Err(e);
        }
        Ok(Box::new(ObjectiveSlackBridge {
            slack,
            inner,
            deleted: false,
        }))
    }
}

/// Instance owning the slack variable and the linking constraint.
#[derive(Debug)]
pub struct ObjectiveSlackBridge {
    slack: VariableIndex,
    inner: ConstraintIndex,
    deleted: bool,
}

impl ObjectiveSlackBridge {
    /// Re-derive `g(x)` from the inner constraint: drop the `-s` term and
    /// fold the set constant back into the function constant.
    fn original_function(&self, model: &dyn ModelRead) -> Result<Function> {
        let set_constant = model.constraint_set(self.inner)?.constant();
        match model.constraint_function(self.inner)? {
            Function::Affine(mut a) => {
                a.remove_variable(self.slack);
                a.constant += set_constant;
                Ok(Function::Affine(a))
            }
            Function::Quadratic(mut q) => {
                q.affine_terms.retain(|t| t.variable != self.slack);
                q.constant += set_constant;
                Ok(Function::Quadratic(q))
            }
            Function::Variable(_) => Err(BridgeError::State(
                "slack bridge inner constraint lost its affine shape".into(),
            )),
        }
    }
}

impl Bridge for ObjectiveSlackBridge {
    fn owned_variables(&self) -> Vec<VariableIndex> {
        vec![self.slack]
    }

    fn owned_constraints(&self) -> Vec<ConstraintIndex> {
        vec![self.inner]
    }

    fn get(&self, model: &dyn ModelRead, attr: Attr) -> Result<AttrValue> {
        match attr {
            Attr::ObjectiveValue => {
                let set_constant = model.constraint_set(self.inner)?.constant();
                let primal = model.constraint_primal(self.inner)?;
                let slack = model.variable_primal(self.slack)?;
                Ok(AttrValue::Scalar(primal + slack - set_constant))
            }
            Attr::ObjectiveFunction => Ok(AttrValue::Function(self.original_function(model)?)),
            other => Err(unsupported_attr("objective_slack", other)),
        }
    }

    fn set(&mut self, _model: &mut dyn ModelLike, attr: Attr, _value: AttrValue) -> Result<()> {
        Err(unsupported_attr("objective_slack", attr))
    }

    fn modify(&mut self, model: &mut dyn ModelLike, change: &Modification) -> Result<()> {
        if let Modification::ScalarCoefficientChange { variable, .. } = change {
            if *variable == self.slack {
                return Err(BridgeError::InvalidIndex(format!(
                    "{variable} is owned by the objective slack bridge"
                )));
            }
        }
        // g and g - s share every caller-visible coefficient and the constant.
        model.modify_constraint(self.inner, change)
    }

    fn delete(&mut self, model: &mut dyn ModelLike) -> Result<()> {
        if self.deleted {
            return Err(BridgeError::InvalidIndex(
                "objective slack bridge already deleted".into(),
            ));
        }
        // The model objective still references the slack variable.
        model.clear_objective()?;
        model.delete_constraint(self.inner)?;
        model.delete_variable(self.slack)?;
        self.deleted = true;
        Ok(())
    }
}
