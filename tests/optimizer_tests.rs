//! End-to-end tests of the bridge optimizer over the mock model.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use bridgecalc::bridge::{Bridge, BridgeFactory};
use bridgecalc::prelude::*;

const TOL: f64 = 1e-12;

/// Route bridge selection logs through the test harness; `RUST_LOG` controls
/// verbosity.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn affine(c: f64, x: VariableIndex) -> Function {
    Function::Affine(AffineFunction::new(vec![AffineTerm::new(c, x)], 0.0))
}

/// An LP-like model that cannot take lower bounds.
fn no_lower_bounds() -> MockModel {
    let mut model = MockModel::affine();
    model.remove_support(&ConstructType::Constraint(
        FunctionType::Affine,
        SetType::GreaterThan,
    ));
    model.remove_support(&ConstructType::Constraint(
        FunctionType::Variable,
        SetType::GreaterThan,
    ));
    model
}

#[test]
fn test_native_constructs_pass_through() {
    let mut optimizer = BridgeOptimizer::new(MockModel::affine());
    let x = optimizer.add_variable();
    let ci = optimizer
        .add_constraint(affine(1.0, x), Set::LessThan(4.0))
        .unwrap();
    assert!(!ci.is_bridged());
    assert_eq!(optimizer.num_bridged_constraints(), 0);

    optimizer.optimize().unwrap();
    assert_eq!(optimizer.model().optimize_calls(), 1);
}

#[test]
fn test_flip_roundtrip_through_optimizer() {
    init_tracing();
    let mut optimizer = BridgeOptimizer::new(no_lower_bounds());
    let x = optimizer.add_variable();
    let f = affine(2.0, x);
    let ci = optimizer
        .add_constraint(f.clone(), Set::GreaterThan(3.0))
        .unwrap();
    assert!(ci.is_bridged());

    // The caller's view is exactly what was submitted.
    assert!(optimizer.constraint_function(ci).unwrap().approx_eq(&f, TOL));
    assert_eq!(optimizer.constraint_set(ci).unwrap(), Set::GreaterThan(3.0));

    // Solution values come back in the caller's orientation.
    let inner = optimizer
        .model()
        .constraint_indices(FunctionType::Affine, SetType::LessThan)[0];
    optimizer.model_mut().set_constraint_primal(inner, -5.0);
    optimizer.model_mut().set_constraint_dual(inner, 0.25);
    assert!((optimizer.constraint_primal(ci).unwrap() - 5.0).abs() < TOL);
    assert!((optimizer.constraint_dual(ci).unwrap() + 0.25).abs() < TOL);

    // Warm starts negate on the way in and back out.
    optimizer.set_primal_start(ci, Some(2.0)).unwrap();
    assert_eq!(optimizer.model().primal_start(inner).unwrap(), Some(-2.0));
    assert_eq!(optimizer.primal_start(ci).unwrap(), Some(2.0));
}

#[test]
fn test_counting_merges_native_and_bridged() {
    let mut optimizer = BridgeOptimizer::new(no_lower_bounds());
    let x = optimizer.add_variable();
    let native = optimizer
        .add_constraint(affine(1.0, x), Set::LessThan(1.0))
        .unwrap();
    let bridged = optimizer
        .add_constraint(affine(1.0, x), Set::GreaterThan(0.0))
        .unwrap();

    // Each constraint is visible exactly once, under its submitted type;
    // the flip's inner <= constraint stays hidden.
    assert_eq!(
        optimizer.constraint_indices(FunctionType::Affine, SetType::LessThan),
        vec![native]
    );
    assert_eq!(
        optimizer.constraint_indices(FunctionType::Affine, SetType::GreaterThan),
        vec![bridged]
    );

    for fty in FunctionType::ALL {
        for sty in SetType::ALL {
            assert_eq!(
                optimizer.num_constraints(fty, sty),
                optimizer.constraint_indices(fty, sty).len()
            );
        }
    }
}

#[test]
fn test_cascade_delete_removes_owned_resources() {
    let mut optimizer = BridgeOptimizer::new(no_lower_bounds());
    let x = optimizer.add_variable();
    let ci = optimizer
        .add_constraint(affine(1.0, x), Set::GreaterThan(0.0))
        .unwrap();
    assert_eq!(optimizer.model().total_constraints(), 1);

    optimizer.delete_constraint(ci).unwrap();
    assert_eq!(optimizer.model().total_constraints(), 0);
    assert_eq!(optimizer.num_bridged_constraints(), 0);

    // The retired outer index is gone for good.
    assert!(matches!(
        optimizer.delete_constraint(ci).unwrap_err(),
        BridgeError::InvalidIndex(_)
    ));
    assert!(matches!(
        optimizer.constraint_function(ci).unwrap_err(),
        BridgeError::InvalidIndex(_)
    ));
}

#[test]
fn test_bridge_owned_inner_index_is_protected() {
    let mut optimizer = BridgeOptimizer::new(no_lower_bounds());
    let x = optimizer.add_variable();
    optimizer
        .add_constraint(affine(1.0, x), Set::GreaterThan(0.0))
        .unwrap();
    let inner = optimizer
        .model()
        .constraint_indices(FunctionType::Affine, SetType::LessThan)[0];
    assert!(matches!(
        optimizer.delete_constraint(inner).unwrap_err(),
        BridgeError::InvalidIndex(_)
    ));
}

#[test]
fn test_unsupported_construct_error_names_the_type() {
    let mut optimizer =
        BridgeOptimizer::with_catalog(MockModel::affine(), BridgeCatalog::new());
    let x = optimizer.add_variable();
    let y = optimizer.add_variable();
    let q = Function::Quadratic(QuadraticFunction::new(
        vec![QuadraticTerm::new(1.0, x, y)],
        vec![],
        0.0,
    ));
    let err = optimizer
        .add_constraint(q, Set::GreaterThan(0.0))
        .unwrap_err();
    match err {
        BridgeError::UnsupportedConstruct { construct } => assert_eq!(
            construct,
            ConstructType::Constraint(FunctionType::Quadratic, SetType::GreaterThan)
        ),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_runtime_catalog_mutation() {
    let mut optimizer =
        BridgeOptimizer::with_catalog(no_lower_bounds(), BridgeCatalog::new());
    let x = optimizer.add_variable();

    // Nothing registered: lower bounds are rejected.
    assert!(optimizer
        .add_constraint(affine(1.0, x), Set::GreaterThan(0.0))
        .is_err());

    optimizer
        .add_bridge(Arc::new(bridgecalc::bridge::FlipBridgeFactory::new()))
        .unwrap();
    let ci = optimizer
        .add_constraint(affine(1.0, x), Set::GreaterThan(0.0))
        .unwrap();
    assert!(ci.is_bridged());

    // Removing the bridge type stops new reformulations but leaves the
    // live instance fully usable.
    optimizer.remove_bridge("flip").unwrap();
    assert!(optimizer
        .add_constraint(affine(1.0, x), Set::GreaterThan(2.0))
        .is_err());
    assert_eq!(optimizer.constraint_set(ci).unwrap(), Set::GreaterThan(0.0));
    optimizer.delete_constraint(ci).unwrap();
}

#[test]
fn test_selected_chain_introspection() {
    let mut model = MockModel::new([
        ConstructType::Constraint(FunctionType::Affine, SetType::LessThan),
        ConstructType::Constraint(FunctionType::Variable, SetType::EqualTo),
    ]);
    model.add_support(ConstructType::Objective(FunctionType::Variable));
    let mut optimizer = BridgeOptimizer::new(model);

    let ty = ConstructType::Constraint(FunctionType::Quadratic, SetType::GreaterThan);
    assert_eq!(
        optimizer.selected_chain(&ty).unwrap(),
        ["flip", "parametric_substitution"]
    );
    // Stable across repeated queries.
    assert_eq!(
        optimizer.selected_chain(&ty).unwrap(),
        ["flip", "parametric_substitution"]
    );

    let native = ConstructType::Constraint(FunctionType::Affine, SetType::LessThan);
    assert!(optimizer.selected_chain(&native).unwrap().is_empty());
}

#[test]
fn test_objective_slack_end_to_end() {
    let mut model = MockModel::affine();
    model.remove_support(&ConstructType::Objective(FunctionType::Affine));
    let mut optimizer = BridgeOptimizer::new(model);
    optimizer.set_sense(OptimizationSense::Minimize).unwrap();

    let x = optimizer.add_variable();
    let g = affine(3.0, x);
    optimizer.set_objective(g.clone()).unwrap();
    assert!(optimizer.has_objective_bridge());

    // The model was handed `minimize s` with `3x - s <= 0`.
    let slack = match optimizer.model().objective_function().unwrap() {
        Function::Variable(s) => s,
        other => panic!("unexpected model objective {other:?}"),
    };
    assert_ne!(slack, x);
    let inner = optimizer
        .model()
        .constraint_indices(FunctionType::Affine, SetType::LessThan)[0];

    // The caller still sees `3x`, and the objective value is rebuilt from
    // the linking constraint rather than read from `s` alone.
    assert!(optimizer.objective_function().unwrap().approx_eq(&g, TOL));
    optimizer.model_mut().set_variable_primal(slack, 7.0);
    optimizer.model_mut().set_constraint_primal(inner, 0.0);
    assert!((optimizer.objective_value().unwrap() - 7.0).abs() < TOL);

    // Sense changes are frozen while the bridge is attached.
    assert!(matches!(
        optimizer.set_sense(OptimizationSense::Maximize).unwrap_err(),
        BridgeError::State(_)
    ));

    optimizer.clear_objective().unwrap();
    assert!(!optimizer.has_objective_bridge());
    assert_eq!(optimizer.model().total_constraints(), 0);
    optimizer.set_sense(OptimizationSense::Maximize).unwrap();
}

#[test]
fn test_substitution_refreshes_between_solves() {
    let mut optimizer = BridgeOptimizer::new(MockModel::affine());
    let p = optimizer.add_variable();
    let x = optimizer.add_variable();
    let fix = optimizer
        .add_constraint(Function::Variable(p), Set::EqualTo(3.0))
        .unwrap();

    let q = Function::Quadratic(QuadraticFunction::new(
        vec![QuadraticTerm::new(0.3, p, x)],
        vec![AffineTerm::new(1.0, x)],
        0.0,
    ));
    optimizer.add_constraint(q, Set::LessThan(2.0)).unwrap();

    optimizer.optimize().unwrap();
    let inner = optimizer
        .model()
        .constraint_indices(FunctionType::Affine, SetType::LessThan)[0];
    match optimizer.model().constraint_function(inner).unwrap() {
        Function::Affine(a) => assert!((a.coefficient(x) - 1.9).abs() < TOL),
        other => panic!("unexpected function {other:?}"),
    }

    // Re-fix the parameter; the next solve picks up the new value.
    optimizer.set_constraint_set(fix, Set::EqualTo(5.0)).unwrap();
    optimizer.optimize().unwrap();
    match optimizer.model().constraint_function(inner).unwrap() {
        Function::Affine(a) => assert!((a.coefficient(x) - 2.5).abs() < TOL),
        other => panic!("unexpected function {other:?}"),
    }
    assert_eq!(optimizer.model().optimize_calls(), 2);
}

#[test]
fn test_failed_finalization_aborts_the_solve() {
    let mut optimizer = BridgeOptimizer::new(MockModel::affine());
    let x = optimizer.add_variable();
    let y = optimizer.add_variable();
    // Neither variable is fixed, so the substitution cannot resolve.
    let q = Function::Quadratic(QuadraticFunction::new(
        vec![QuadraticTerm::new(1.0, x, y)],
        vec![],
        0.0,
    ));
    optimizer.add_constraint(q, Set::LessThan(0.0)).unwrap();

    assert!(matches!(
        optimizer.optimize().unwrap_err(),
        BridgeError::Reformulation(_)
    ));
    assert_eq!(optimizer.model().optimize_calls(), 0);
}

/// A bridge type that records when each of its instances is finalized.
struct TouchProbeFactory {
    touches: Rc<RefCell<Vec<usize>>>,
    built: Cell<usize>,
}

impl TouchProbeFactory {
    fn new(touches: Rc<RefCell<Vec<usize>>>) -> Self {
        TouchProbeFactory {
            touches,
            built: Cell::new(0),
        }
    }
}

impl BridgeFactory for TouchProbeFactory {
    fn name(&self) -> &'static str {
        "touch_probe"
    }

    fn accepts(&self, ty: &ConstructType) -> bool {
        matches!(
            ty,
            ConstructType::Constraint(_, SetType::GreaterThan)
                | ConstructType::Objective(FunctionType::Affine)
        )
    }

    fn produced(&self, ty: &ConstructType) -> Vec<ConstructType> {
        match ty {
            ConstructType::Constraint(fty, SetType::GreaterThan) => {
                vec![ConstructType::Constraint(*fty, SetType::LessThan)]
            }
            ConstructType::Objective(FunctionType::Affine) => {
                vec![ConstructType::Objective(FunctionType::Variable)]
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
        let inner = model.add_constraint(f.negated(), s.negated())?;
        self.built.set(self.built.get() + 1);
        Ok(Box::new(TouchProbeBridge {
            id: self.built.get(),
            inner: Some(inner),
            slack: None,
            touches: Rc::clone(&self.touches),
        }))
    }

    fn build_objective(
        &self,
        model: &mut dyn ModelLike,
        _f: &Function,
        _sense: OptimizationSense,
    ) -> Result<Box<dyn Bridge>> {
        let slack = model.add_variable();
        model.set_objective(Function::Variable(slack))?;
        self.built.set(self.built.get() + 1);
        Ok(Box::new(TouchProbeBridge {
            id: self.built.get(),
            inner: None,
            slack: Some(slack),
            touches: Rc::clone(&self.touches),
        }))
    }
}

#[derive(Debug)]
struct TouchProbeBridge {
    id: usize,
    inner: Option<ConstraintIndex>,
    slack: Option<VariableIndex>,
    touches: Rc<RefCell<Vec<usize>>>,
}

impl Bridge for TouchProbeBridge {
    fn owned_variables(&self) -> Vec<VariableIndex> {
        self.slack.into_iter().collect()
    }

    fn owned_constraints(&self) -> Vec<ConstraintIndex> {
        self.inner.into_iter().collect()
    }

    fn get(&self, _model: &dyn ModelRead, attr: Attr) -> Result<AttrValue> {
        Err(BridgeError::State(format!("probe does not carry {attr:?}")))
    }

    fn set(&mut self, _model: &mut dyn ModelLike, attr: Attr, _value: AttrValue) -> Result<()> {
        Err(BridgeError::State(format!("probe does not carry {attr:?}")))
    }

    fn modify(&mut self, _model: &mut dyn ModelLike, _change: &Modification) -> Result<()> {
        Err(BridgeError::State("probe does not carry changes".into()))
    }

    fn delete(&mut self, model: &mut dyn ModelLike) -> Result<()> {
        if let Some(inner) = self.inner.take() {
            model.delete_constraint(inner)?;
        }
        if let Some(slack) = self.slack.take() {
            model.clear_objective()?;
            model.delete_variable(slack)?;
        }
        Ok(())
    }

    fn needs_final_touch(&self) -> bool {
        true
    }

    fn final_touch(&mut self, _model: &mut dyn ModelLike) -> Result<()> {
        self.touches.borrow_mut().push(self.id);
        Ok(())
    }
}

#[test]
fn test_final_touch_runs_once_per_solve_in_creation_order() {
    init_tracing();
    let touches = Rc::new(RefCell::new(Vec::new()));
    let mut catalog = BridgeCatalog::new();
    catalog
        .add_bridge(Arc::new(TouchProbeFactory::new(Rc::clone(&touches))))
        .unwrap();
    let mut optimizer = BridgeOptimizer::with_catalog(no_lower_bounds(), catalog);

    let x = optimizer.add_variable();
    optimizer
        .add_constraint(affine(1.0, x), Set::GreaterThan(0.0))
        .unwrap();
    optimizer
        .add_constraint(affine(2.0, x), Set::GreaterThan(1.0))
        .unwrap();
    assert!(touches.borrow().is_empty());

    optimizer.optimize().unwrap();
    assert_eq!(*touches.borrow(), [1, 2]);
    assert_eq!(optimizer.model().optimize_calls(), 1);

    optimizer.optimize().unwrap();
    assert_eq!(*touches.borrow(), [1, 2, 1, 2]);
}

#[test]
fn test_objective_touch_keeps_its_creation_position() {
    let touches = Rc::new(RefCell::new(Vec::new()));
    let mut catalog = BridgeCatalog::new();
    catalog
        .add_bridge(Arc::new(TouchProbeFactory::new(Rc::clone(&touches))))
        .unwrap();
    let mut model = no_lower_bounds();
    model.remove_support(&ConstructType::Objective(FunctionType::Affine));
    let mut optimizer = BridgeOptimizer::with_catalog(model, catalog);
    optimizer.set_sense(OptimizationSense::Minimize).unwrap();

    // Constraint bridge, then objective bridge, then another constraint
    // bridge: touches must replay that order, not constraints-then-objective.
    let x = optimizer.add_variable();
    optimizer
        .add_constraint(affine(1.0, x), Set::GreaterThan(0.0))
        .unwrap();
    optimizer.set_objective(affine(3.0, x)).unwrap();
    optimizer
        .add_constraint(affine(2.0, x), Set::GreaterThan(1.0))
        .unwrap();

    optimizer.optimize().unwrap();
    assert_eq!(*touches.borrow(), [1, 2, 3]);
}

#[test]
fn test_failed_objective_replacement_keeps_the_old_objective() {
    let mut model = MockModel::affine();
    model.remove_support(&ConstructType::Objective(FunctionType::Affine));
    let mut optimizer = BridgeOptimizer::new(model);
    optimizer.set_sense(OptimizationSense::Minimize).unwrap();

    let x = optimizer.add_variable();
    let g = affine(3.0, x);
    optimizer.set_objective(g.clone()).unwrap();
    assert!(optimizer.has_objective_bridge());

    // Without the substitution bridge the quadratic objective has no chain;
    // the rejected replacement must leave the attached objective intact.
    optimizer.remove_bridge("parametric_substitution").unwrap();
    let q = Function::Quadratic(QuadraticFunction::new(
        vec![QuadraticTerm::new(1.0, x, x)],
        vec![],
        0.0,
    ));
    assert!(matches!(
        optimizer.set_objective(q).unwrap_err(),
        BridgeError::UnsupportedConstruct { .. }
    ));

    assert!(optimizer.has_objective_bridge());
    assert!(optimizer.objective_function().unwrap().approx_eq(&g, TOL));
}
