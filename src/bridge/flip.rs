//! Greater-to-less orientation flip.
//!
//! `f(x) >= b` holds exactly when `-f(x) <= -b`, so a solver that only
//! accepts upper bounds can still take lower-bounded constraints. Every
//! attribute is negated back into the caller's orientation on the way out,
//! duals and warm starts included.

use crate::construct::{ConstructType, Function, FunctionType, Set, SetType};
use crate::error::{BridgeError, Result};
use crate::index::{ConstraintIndex, VariableIndex};
use crate::model::{Attr, AttrValue, ModelLike, ModelRead, Modification};

use super::{unsupported_attr, Bridge, BridgeFactory};

/// Factory for [`FlipBridge`].
#[derive(Debug, Default)]
pub struct FlipBridgeFactory;

impl FlipBridgeFactory {
    /// Create the factory.
    pub fn new() -> Self {
        FlipBridgeFactory
    }

    fn flipped_function_type(fty: FunctionType) -> FunctionType {
        match fty {
            // Negating a bare variable leaves affine.
            FunctionType::Variable | FunctionType::Affine => FunctionType::Affine,
            FunctionType::Quadratic => FunctionType::Quadratic,
        }
    }
}

impl BridgeFactory for FlipBridgeFactory {
    fn name(&self) -> &'static str {
        "flip"
    }

    fn accepts(&self, ty: &ConstructType) -> bool {
        matches!(ty, ConstructType::Constraint(_, SetType::GreaterThan))
    }

    fn produced(&self, ty: &ConstructType) -> Vec<ConstructType> {
        match ty {
            ConstructType::Constraint(fty, SetType::GreaterThan) => vec![ConstructType::Constraint(
                Self::flipped_function_type(*fty),
                SetType::LessThan,
            )],
            _ => Vec::new(),
        }
    }

    fn build_constraint(
        &self,
        model: &mut dyn ModelLike,
        f: &Function,
        s: &Set,
    ) -> Result<Box<dyn Bridge>> {
        if s.set_type() != SetType::GreaterThan {
            return Err(BridgeError::UnsupportedConstruct {
                construct: ConstructType::of_constraint(f, s),
            });
        }
        let inner = model.add_constraint(f.negated(), s.negated())?;
        Ok(Box::new(FlipBridge {
            inner,
            deleted: false,
        }))
    }
}

/// Instance holding the negated inner constraint.
#[derive(Debug)]
pub struct FlipBridge {
    inner: ConstraintIndex,
    deleted: bool,
}

impl Bridge for FlipBridge {
    fn owned_variables(&self) -> Vec<VariableIndex> {
        Vec::new()
    }

    fn owned_constraints(&self) -> Vec<ConstraintIndex> {
        vec![self.inner]
    }

    fn get(&self, model: &dyn ModelRead, attr: Attr) -> Result<AttrValue> {
        match attr {
            Attr::ConstraintFunction => Ok(AttrValue::Function(
                model.constraint_function(self.inner)?.negated(),
            )),
            Attr::ConstraintSet => Ok(AttrValue::Set(model.constraint_set(self.inner)?.negated())),
            Attr::ConstraintPrimal => {
                Ok(AttrValue::Scalar(-model.constraint_primal(self.inner)?))
            }
            Attr::ConstraintDual => Ok(AttrValue::Scalar(-model.constraint_dual(self.inner)?)),
            Attr::PrimalStart => Ok(model.primal_start(self.inner)?.map(|v| -v).into()),
            Attr::DualStart => Ok(model.dual_start(self.inner)?.map(|v| -v).into()),
            other => Err(unsupported_attr("flip", other)),
        }
    }

    fn set(&mut self, model: &mut dyn ModelLike, attr: Attr, value: AttrValue) -> Result<()> {
        match attr {
            Attr::ConstraintFunction => {
                let f = value.into_function()?;
                model.set_constraint_function(self.inner, f.negated())
            }
            Attr::ConstraintSet => {
                let s = value.into_set()?;
                if s.set_type() != SetType::GreaterThan {
                    return Err(BridgeError::State(
                        "flip bridge only carries GreaterThan sets; delete and re-add to change \
                         the set shape"
                            .into(),
                    ));
                }
                model.set_constraint_set(self.inner, s.negated())
            }
            Attr::PrimalStart => {
                let v = value.into_optional_scalar()?;
                model.set_primal_start(self.inner, v.map(|v| -v))
            }
            Attr::DualStart => {
                let v = value.into_optional_scalar()?;
                model.set_dual_start(self.inner, v.map(|v| -v))
            }
            other => Err(unsupported_attr("flip", other)),
        }
    }

    fn modify(&mut self, model: &mut dyn ModelLike, change: &Modification) -> Result<()> {
        let negated = match change {
            Modification::ScalarCoefficientChange {
                variable,
                new_coefficient,
            } => Modification::ScalarCoefficientChange {
                variable: *variable,
                new_coefficient: -new_coefficient,
            },
            Modification::ConstantChange { new_constant } => Modification::ConstantChange {
                new_constant: -new_constant,
            },
        };
        model.modify_constraint(self.inner, &negated)
    }

    fn delete(&mut self, model: &mut dyn ModelLike) -> Result<()> {
        if self.deleted {
            return Err(BridgeError::InvalidIndex(
                "flip bridge already deleted".into(),
            ));
        }
        model.delete_constraint(self.inner)?;
        self.deleted = true;
        Ok(())
    }
}
