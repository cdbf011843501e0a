//! Parametric-variable substitution.
//!
//! Converts a quadratic constraint into an affine one by replacing, within
//! each quadratic term only, variables currently held fixed by a separate
//! single-variable `EqualTo` constraint. Linear occurrences of a fixed
//! variable are left untouched. A squared self-term `c*x*x` with `x` fixed
//! at `v` contributes the linear term `(c/2)*v` on `x`, consistent with the
//! one-half convention on diagonal quadratic terms.
//!
//! Which variables are fixed is problem-wide state that may change after
//! this constraint is added, so the substitution is recomputed in a final
//! touch before every solve. A quadratic term whose variables are both
//! unfixed at that point makes the reformulation fail.

use std::collections::HashMap;

use crate::construct::{
    ConstructType, Function, FunctionType, QuadraticFunction, Set, SetType,
};
use crate::error::{BridgeError, Result};
use crate::index::{ConstraintIndex, VariableIndex};
use crate::model::{Attr, AttrValue, ModelLike, ModelRead, Modification};

use super::{unsupported_attr, Bridge, BridgeFactory};

/// Factory for [`ParametricSubstitutionBridge`].
#[derive(Debug, Default)]
pub struct ParametricSubstitutionBridgeFactory;

impl ParametricSubstitutionBridgeFactory {
    /// Create the factory.
    pub fn new() -> Self {
        ParametricSubstitutionBridgeFactory
    }
}

impl BridgeFactory for ParametricSubstitutionBridgeFactory {
    fn name(&self) -> &'static str {
        "parametric_substitution"
    }

    fn accepts(&self, ty: &ConstructType) -> bool {
        matches!(ty, ConstructType::Constraint(FunctionType::Quadratic, _))
    }

    fn produced(&self, ty: &ConstructType) -> Vec<ConstructType> {
        match ty {
            ConstructType::Constraint(FunctionType::Quadratic, sty) => {
                vec![ConstructType::Constraint(FunctionType::Affine, *sty)]
            }
            _ => Vec::new(),
        }
    }

    fn build_constraint(
        &self,
        model: &mut dyn ModelLike,
        f: &Function,
        s: &Set,
    ) -> Result<Box<dyn Bridge>> {
        let original = match f {
            Function::Quadratic(q) => q.clone(),
            _ => {
                return Err(BridgeError::UnsupportedConstruct {
                    construct: ConstructType::of_constraint(f, s),
                })
            }
        };
        // The quadratic contribution is unknown until final touch; start
        // from the affine part alone.
        let inner = model.add_constraint(Function::Affine(original.affine_part()), *s)?;
        Ok(Box::new(ParametricSubstitutionBridge {
            original,
            inner,
            deleted: false,
        }))
    }
}

/// Instance holding the original quadratic and the affine inner constraint.
#[derive(Debug)]
pub struct ParametricSubstitutionBridge {
    original: QuadraticFunction,
    inner: ConstraintIndex,
    deleted: bool,
}

/// Variables currently fixed by a single-variable `EqualTo` constraint.
fn fixed_variables(model: &dyn ModelRead) -> Result<HashMap<VariableIndex, f64>> {
    let mut fixed = HashMap::new();
    for ci in model.constraint_indices(FunctionType::Variable, SetType::EqualTo) {
        if let (Function::Variable(v), Set::EqualTo(value)) =
            (model.constraint_function(ci)?, model.constraint_set(ci)?)
        {
            fixed.insert(v, value);
        }
    }
    Ok(fixed)
}

impl ParametricSubstitutionBridge {
    fn substituted(&self, fixed: &HashMap<VariableIndex, f64>) -> Result<Function> {
        let mut affine = self.original.affine_part();
        for term in &self.original.quadratic_terms {
            if term.is_diagonal() {
                match fixed.get(&term.variable_1) {
                    Some(value) => affine.push(term.coefficient / 2.0 * value, term.variable_1),
                    None => {
                        return Err(BridgeError::Reformulation(format!(
                            "quadratic term on {} * {} has no fixed variable to substitute",
                            term.variable_1, term.variable_2
                        )))
                    }
                }
            } else {
                match (fixed.get(&term.variable_1), fixed.get(&term.variable_2)) {
                    (Some(value), _) => affine.push(term.coefficient * value, term.variable_2),
                    (None, Some(value)) => affine.push(term.coefficient * value, term.variable_1),
                    (None, None) => {
                        return Err(BridgeError::Reformulation(format!(
                            "quadratic term on {} * {} has no fixed variable to substitute",
                            term.variable_1, term.variable_2
                        )))
                    }
                }
            }
        }
        Ok(Function::Affine(affine.canonicalized()))
    }
}

impl Bridge for ParametricSubstitutionBridge {
    fn owned_variables(&self) -> Vec<VariableIndex> {
        Vec::new()
    }

    fn owned_constraints(&self) -> Vec<ConstraintIndex> {
        vec![self.inner]
    }

    fn get(&self, model: &dyn ModelRead, attr: Attr) -> Result<AttrValue> {
        match attr {
            Attr::ConstraintFunction => {
                Ok(AttrValue::Function(Function::Quadratic(self.original.clone())))
            }
            Attr::ConstraintSet => Ok(AttrValue::Set(model.constraint_set(self.inner)?)),
            Attr::ConstraintPrimal => Ok(AttrValue::Scalar(model.constraint_primal(self.inner)?)),
            Attr::ConstraintDual => Ok(AttrValue::Scalar(model.constraint_dual(self.inner)?)),
            Attr::PrimalStart => Ok(model.primal_start(self.inner)?.into()),
            Attr::DualStart => Ok(model.dual_start(self.inner)?.into()),
            other => Err(unsupported_attr("parametric_substitution", other)),
        }
    }

    fn set(&mut self, model: &mut dyn ModelLike, attr: Attr, value: AttrValue) -> Result<()> {
        match attr {
            Attr::ConstraintFunction => {
                let f = value.into_function()?;
                match f {
                    Function::Quadratic(q) => {
                        self.original = q;
                        // Revert to the affine part; the next final touch
                        // recomputes the substitution.
                        model.set_constraint_function(
                            self.inner,
                            Function::Affine(self.original.affine_part()),
                        )
                    }
                    other => Err(BridgeError::State(format!(
                        "substitution bridge carries a quadratic function, got {:?}",
                        other.function_type()
                    ))),
                }
            }
            Attr::ConstraintSet => model.set_constraint_set(self.inner, value.into_set()?),
            Attr::PrimalStart => {
                model.set_primal_start(self.inner, value.into_optional_scalar()?)
            }
            Attr::DualStart => model.set_dual_start(self.inner, value.into_optional_scalar()?),
            other => Err(unsupported_attr("parametric_substitution", other)),
        }
    }

    fn modify(&mut self, model: &mut dyn ModelLike, change: &Modification) -> Result<()> {
        match change {
            Modification::ScalarCoefficientChange {
                variable,
                new_coefficient,
            } => {
                self.original.affine_terms.retain(|t| t.variable != *variable);
                if *new_coefficient != 0.0 {
                    self.original
                        .affine_terms
                        .push(crate::construct::AffineTerm::new(*new_coefficient, *variable));
                }
            }
            Modification::ConstantChange { new_constant } => {
                self.original.constant = *new_constant;
            }
        }
        model.set_constraint_function(self.inner, Function::Affine(self.original.affine_part()))
    }

    fn delete(&mut self, model: &mut dyn ModelLike) -> Result<()> {
        if self.deleted {
            return Err(BridgeError::InvalidIndex(
                "substitution bridge already deleted".into(),
            ));
        }
        model.delete_constraint(self.inner)?;
        self.deleted = true;
        Ok(())
    }

    fn needs_final_touch(&self) -> bool {
        true
    }

    fn final_touch(&mut self, model: &mut dyn ModelLike) -> Result<()> {
        let fixed = fixed_variables(model)?;
        let substituted = self.substituted(&fixed)?;
        model.set_constraint_function(self.inner, substituted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{AffineTerm, QuadraticTerm};
    use crate::model::MockModel;

    fn quadratic_model() -> MockModel {
        let mut model = MockModel::affine();
        model.add_support(ConstructType::Constraint(
            FunctionType::Variable,
            SetType::EqualTo,
        ));
        model
    }

    #[test]
    fn test_cross_term_substitution() {
        let mut model = quadratic_model();
        let p = model.add_variable();
        let x = model.add_variable();
        model
            .add_constraint(Function::Variable(p), Set::EqualTo(3.0))
            .unwrap();

        let q = QuadraticFunction::new(
            vec![QuadraticTerm::new(0.3, p, x)],
            vec![AffineTerm::new(1.0, x)],
            0.0,
        );
        let factory = ParametricSubstitutionBridgeFactory::new();
        let mut bridge = factory
            .build_constraint(&mut model, &Function::Quadratic(q), &Set::LessThan(2.0))
            .unwrap();
        let inner = bridge.owned_constraints()[0];

        bridge.final_touch(&mut model).unwrap();
        match model.constraint_function(inner).unwrap() {
            Function::Affine(a) => {
                assert!((a.coefficient(x) - 1.9).abs() < 1e-12);
                assert_eq!(a.coefficient(p), 0.0);
            }
            other => panic!("unexpected function {other:?}"),
        }
    }

    #[test]
    fn test_diagonal_term_uses_half_coefficient() {
        let mut model = quadratic_model();
        let p = model.add_variable();
        model
            .add_constraint(Function::Variable(p), Set::EqualTo(4.0))
            .unwrap();

        let q = QuadraticFunction::new(vec![QuadraticTerm::new(2.0, p, p)], vec![], 0.0);
        let factory = ParametricSubstitutionBridgeFactory::new();
        let mut bridge = factory
            .build_constraint(&mut model, &Function::Quadratic(q), &Set::LessThan(0.0))
            .unwrap();
        let inner = bridge.owned_constraints()[0];

        bridge.final_touch(&mut model).unwrap();
        match model.constraint_function(inner).unwrap() {
            // (2/2) * 4 = 4 on p.
            Function::Affine(a) => assert!((a.coefficient(p) - 4.0).abs() < 1e-12),
            other => panic!("unexpected function {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_term_fails_reformulation() {
        let mut model = quadratic_model();
        let x = model.add_variable();
        let y = model.add_variable();
        let q = QuadraticFunction::new(vec![QuadraticTerm::new(1.0, x, y)], vec![], 0.0);
        let factory = ParametricSubstitutionBridgeFactory::new();
        let mut bridge = factory
            .build_constraint(&mut model, &Function::Quadratic(q), &Set::LessThan(0.0))
            .unwrap();

        let err = bridge.final_touch(&mut model).unwrap_err();
        assert!(matches!(err, BridgeError::Reformulation(_)));
    }

    #[test]
    fn test_final_touch_is_idempotent() {
        let mut model = quadratic_model();
        let p = model.add_variable();
        let x = model.add_variable();
        model
            .add_constraint(Function::Variable(p), Set::EqualTo(3.0))
            .unwrap();

        let q = QuadraticFunction::new(
            vec![QuadraticTerm::new(0.3, p, x)],
            vec![AffineTerm::new(1.0, x)],
            0.5,
        );
        let factory = ParametricSubstitutionBridgeFactory::new();
        let mut bridge = factory
            .build_constraint(&mut model, &Function::Quadratic(q), &Set::LessThan(2.0))
            .unwrap();
        let inner = bridge.owned_constraints()[0];

        bridge.final_touch(&mut model).unwrap();
        let first = model.constraint_function(inner).unwrap();
        bridge.final_touch(&mut model).unwrap();
        let second = model.constraint_function(inner).unwrap();
        assert!(first.approx_eq(&second, 1e-12));
    }

    #[test]
    fn test_function_roundtrips_as_original() {
        let mut model = quadratic_model();
        let p = model.add_variable();
        let x = model.add_variable();
        let q = QuadraticFunction::new(
            vec![QuadraticTerm::new(0.3, p, x)],
            vec![AffineTerm::new(1.0, x)],
            0.0,
        );
        let f = Function::Quadratic(q);
        let factory = ParametricSubstitutionBridgeFactory::new();
        let bridge = factory
            .build_constraint(&mut model, &f, &Set::LessThan(2.0))
            .unwrap();
        let got = bridge
            .get(&model, Attr::ConstraintFunction)
            .unwrap()
            .into_function()
            .unwrap();
        assert!(got.approx_eq(&f, 1e-12));
    }
}
