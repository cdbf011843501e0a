//! In-memory model with injectable solution values.
//!
//! `MockModel` honors the whole [`ModelLike`] contract without doing any
//! numeric solving: callers preload variable primals, constraint
//! primals/duals, and an objective value, then read them back after
//! `optimize`. The set of natively supported construct types is
//! configurable, which is what every bridging test keys on.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::construct::{ConstructType, Function, FunctionType, OptimizationSense, Set, SetType};
use crate::error::{BridgeError, Result};
use crate::index::{ConstraintIndex, VariableIndex};
use crate::model::{ModelLike, ModelRead, Modification};

#[derive(Debug, Clone)]
struct StoredConstraint {
    function: Function,
    set: Set,
    primal_start: Option<f64>,
    dual_start: Option<f64>,
}

/// An in-memory model for testing bridges and the optimizer.
#[derive(Debug, Default)]
pub struct MockModel {
    supported: HashSet<ConstructType>,
    variables: BTreeSet<VariableIndex>,
    constraints: BTreeMap<ConstraintIndex, StoredConstraint>,
    next_variable: u64,
    next_constraint: i64,
    objective: Option<Function>,
    sense: OptimizationSense,
    variable_primals: HashMap<VariableIndex, f64>,
    constraint_primals: HashMap<ConstraintIndex, f64>,
    constraint_duals: HashMap<ConstraintIndex, f64>,
    objective_value: Option<f64>,
    optimize_calls: usize,
}

impl MockModel {
    /// Create a model natively accepting the given construct types.
    pub fn new(supported: impl IntoIterator<Item = ConstructType>) -> Self {
        MockModel {
            supported: supported.into_iter().collect(),
            ..Default::default()
        }
    }

    /// A model accepting every affine constraint type, the variable-in-set
    /// types, and a variable objective. The usual stand-in for an LP solver.
    pub fn affine() -> Self {
        let mut supported = HashSet::new();
        for sty in SetType::ALL {
            supported.insert(ConstructType::Constraint(FunctionType::Affine, sty));
            supported.insert(ConstructType::Constraint(FunctionType::Variable, sty));
        }
        supported.insert(ConstructType::Objective(FunctionType::Variable));
        supported.insert(ConstructType::Objective(FunctionType::Affine));
        MockModel {
            supported,
            ..Default::default()
        }
    }

    /// Declare one more natively supported construct type.
    pub fn add_support(&mut self, ty: ConstructType) {
        self.supported.insert(ty);
    }

    /// Withdraw native support for a construct type.
    pub fn remove_support(&mut self, ty: &ConstructType) {
        self.supported.remove(ty);
    }

    /// Inject the solution value of a variable.
    pub fn set_variable_primal(&mut self, vi: VariableIndex, value: f64) {
        self.variable_primals.insert(vi, value);
    }

    /// Inject the solution primal of a constraint.
    pub fn set_constraint_primal(&mut self, ci: ConstraintIndex, value: f64) {
        self.constraint_primals.insert(ci, value);
    }

    /// Inject the solution dual of a constraint.
    pub fn set_constraint_dual(&mut self, ci: ConstraintIndex, value: f64) {
        self.constraint_duals.insert(ci, value);
    }

    /// Inject the solution objective value.
    pub fn set_objective_value(&mut self, value: f64) {
        self.objective_value = Some(value);
    }

    /// How many times `optimize` has been called.
    pub fn optimize_calls(&self) -> usize {
        self.optimize_calls
    }

    /// Number of live variables.
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Total number of live constraints, of any type.
    pub fn total_constraints(&self) -> usize {
        self.constraints.len()
    }

    fn stored(&self, ci: ConstraintIndex) -> Result<&StoredConstraint> {
        self.constraints
            .get(&ci)
            .ok_or_else(|| BridgeError::InvalidIndex(format!("unknown constraint {ci}")))
    }

    fn stored_mut(&mut self, ci: ConstraintIndex) -> Result<&mut StoredConstraint> {
        self.constraints
            .get_mut(&ci)
            .ok_or_else(|| BridgeError::InvalidIndex(format!("unknown constraint {ci}")))
    }
}

impl ModelRead for MockModel {
    fn supports(&self, ty: &ConstructType) -> bool {
        self.supported.contains(ty)
    }

    fn constraint_function(&self, ci: ConstraintIndex) -> Result<Function> {
        Ok(self.stored(ci)?.function.clone())
    }

    fn constraint_set(&self, ci: ConstraintIndex) -> Result<Set> {
        Ok(self.stored(ci)?.set)
    }

    fn constraint_primal(&self, ci: ConstraintIndex) -> Result<f64> {
        self.stored(ci)?;
        self.constraint_primals
            .get(&ci)
            .copied()
            .ok_or_else(|| BridgeError::State(format!("no primal value loaded for {ci}")))
    }

    fn constraint_dual(&self, ci: ConstraintIndex) -> Result<f64> {
        self.stored(ci)?;
        self.constraint_duals
            .get(&ci)
            .copied()
            .ok_or_else(|| BridgeError::State(format!("no dual value loaded for {ci}")))
    }

    fn primal_start(&self, ci: ConstraintIndex) -> Result<Option<f64>> {
        Ok(self.stored(ci)?.primal_start)
    }

    fn dual_start(&self, ci: ConstraintIndex) -> Result<Option<f64>> {
        Ok(self.stored(ci)?.dual_start)
    }

    fn variable_primal(&self, vi: VariableIndex) -> Result<f64> {
        if !self.variables.contains(&vi) {
            return Err(BridgeError::InvalidIndex(format!("unknown variable {vi}")));
        }
        self.variable_primals
            .get(&vi)
            .copied()
            .ok_or_else(|| BridgeError::State(format!("no primal value loaded for {vi}")))
    }

    fn objective_function(&self) -> Result<Function> {
        self.objective
            .clone()
            .ok_or_else(|| BridgeError::State("model has no objective".into()))
    }

    fn objective_value(&self) -> Result<f64> {
        self.objective_value
            .ok_or_else(|| BridgeError::State("no objective value loaded".into()))
    }

    fn sense(&self) -> OptimizationSense {
        self.sense
    }

    fn num_constraints(&self, fty: FunctionType, sty: SetType) -> usize {
        self.constraint_indices(fty, sty).len()
    }

    fn constraint_indices(&self, fty: FunctionType, sty: SetType) -> Vec<ConstraintIndex> {
        self.constraints
            .iter()
            .filter(|(_, c)| c.function.function_type() == fty && c.set.set_type() == sty)
            .map(|(ci, _)| *ci)
            .collect()
    }
}

impl ModelLike for MockModel {
    fn add_variable(&mut self) -> VariableIndex {
        self.next_variable += 1;
        let vi = VariableIndex::new(self.next_variable);
        self.variables.insert(vi);
        vi
    }

    fn add_constraint(&mut self, f: Function, s: Set) -> Result<ConstraintIndex> {
        let ty = ConstructType::of_constraint(&f, &s);
        if !self.supports(&ty) {
            return Err(BridgeError::UnsupportedConstruct { construct: ty });
        }
        self.next_constraint += 1;
        let ci = ConstraintIndex::new(self.next_constraint);
        self.constraints.insert(
            ci,
            StoredConstraint {
                function: f,
                set: s,
                primal_start: None,
                dual_start: None,
            },
        );
        Ok(ci)
    }

    fn delete_constraint(&mut self, ci: ConstraintIndex) -> Result<()> {
        if self.constraints.remove(&ci).is_none() {
            return Err(BridgeError::InvalidIndex(format!(
                "cannot delete unknown constraint {ci}"
            )));
        }
        self.constraint_primals.remove(&ci);
        self.constraint_duals.remove(&ci);
        Ok(())
    }

    fn delete_variable(&mut self, vi: VariableIndex) -> Result<()> {
        if !self.variables.remove(&vi) {
            return Err(BridgeError::InvalidIndex(format!(
                "cannot delete unknown variable {vi}"
            )));
        }
        self.variable_primals.remove(&vi);
        Ok(())
    }

    fn set_constraint_function(&mut self, ci: ConstraintIndex, f: Function) -> Result<()> {
        self.stored_mut(ci)?.function = f;
        Ok(())
    }

    fn set_constraint_set(&mut self, ci: ConstraintIndex, s: Set) -> Result<()> {
        self.stored_mut(ci)?.set = s;
        Ok(())
    }

    fn modify_constraint(&mut self, ci: ConstraintIndex, change: &Modification) -> Result<()> {
        let stored = self.stored_mut(ci)?;
        match (change, &mut stored.function) {
            (
                Modification::ScalarCoefficientChange {
                    variable,
                    new_coefficient,
                },
                Function::Affine(a),
            ) => {
                a.terms.retain(|t| t.variable != *variable);
                if *new_coefficient != 0.0 {
                    a.push(*new_coefficient, *variable);
                }
                Ok(())
            }
            (
                Modification::ScalarCoefficientChange {
                    variable,
                    new_coefficient,
                },
                Function::Quadratic(q),
            ) => {
                q.affine_terms.retain(|t| t.variable != *variable);
                if *new_coefficient != 0.0 {
                    q.affine_terms
                        .push(crate::construct::AffineTerm::new(*new_coefficient, *variable));
                }
                Ok(())
            }
            (Modification::ConstantChange { new_constant }, Function::Affine(a)) => {
                a.constant = *new_constant;
                Ok(())
            }
            (Modification::ConstantChange { new_constant }, Function::Quadratic(q)) => {
                q.constant = *new_constant;
                Ok(())
            }
            (_, Function::Variable(_)) => Err(BridgeError::State(
                "cannot modify a single-variable function in place".into(),
            )),
        }
    }

    fn set_primal_start(&mut self, ci: ConstraintIndex, value: Option<f64>) -> Result<()> {
        self.stored_mut(ci)?.primal_start = value;
        Ok(())
    }

    fn set_dual_start(&mut self, ci: ConstraintIndex, value: Option<f64>) -> Result<()> {
        self.stored_mut(ci)?.dual_start = value;
        Ok(())
    }

    fn set_objective(&mut self, f: Function) -> Result<()> {
        let ty = ConstructType::of_objective(&f);
        if !self.supports(&ty) {
            return Err(BridgeError::UnsupportedConstruct { construct: ty });
        }
        self.objective = Some(f);
        Ok(())
    }

    fn clear_objective(&mut self) -> Result<()> {
        self.objective = None;
        Ok(())
    }

    fn set_sense(&mut self, sense: OptimizationSense) -> Result<()> {
        self.sense = sense;
        Ok(())
    }

    fn optimize(&mut self) -> Result<()> {
        self.optimize_calls += 1;
        Ok(())
    }
}
