//! The bridge optimizer: a drop-in substitute for the underlying model.
//!
//! Every operation either delegates straight to the model (natively
//! supported constructs, positive indices) or runs through the bridging
//! machinery: select a bridge, build an instance, register it under a
//! fresh negative outer index, and from then on route attribute traffic
//! to the owning instance.
//!
//! Bridges are handed a [`Router`]-backed model handle while they build,
//! mutate, or delete, so a produced construct that is itself unsupported
//! re-enters the same machinery and chains compose to arbitrary depth.
//! While one instance is operating, its own slot is taken out of the
//! registry; ownership is strictly hierarchical, so an instance never
//! touches its own outer index.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::bridge::{Bridge, BridgeFactory};
use crate::catalog::BridgeCatalog;
use crate::construct::{ConstructType, Function, FunctionType, OptimizationSense, Set, SetType};
use crate::error::{BridgeError, Result};
use crate::graph::{Resolution, Selector};
use crate::index::{ConstraintIndex, VariableIndex};
use crate::model::{Attr, AttrValue, ModelLike, ModelRead, Modification};

struct Slot {
    bridge: Box<dyn Bridge>,
    /// The construct type the caller originally submitted; listing and
    /// counting report the bridged constraint under this type.
    original: ConstructType,
}

/// One live instance in creation order. The objective bridge participates
/// in final-touch scheduling like any constraint bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Creation {
    Constraint(ConstraintIndex),
    Objective,
}

/// Outer-index bookkeeping for live bridge instances.
#[derive(Default)]
struct BridgeRegistry {
    slots: HashMap<i64, Slot>,
    /// Creation order of live instances; final touches run in this order.
    order: Vec<Creation>,
    /// Strictly decreasing; outer indices are never reused.
    next_outer: i64,
}

impl BridgeRegistry {
    fn register(&mut self, bridge: Box<dyn Bridge>, original: ConstructType) -> ConstraintIndex {
        self.next_outer -= 1;
        let ci = ConstraintIndex::new(self.next_outer);
        self.slots.insert(self.next_outer, Slot { bridge, original });
        self.order.push(Creation::Constraint(ci));
        ci
    }

    fn slot(&self, ci: ConstraintIndex) -> Result<&Slot> {
        self.slots
            .get(&ci.value())
            .ok_or_else(|| BridgeError::InvalidIndex(format!("unknown bridged constraint {ci}")))
    }

    /// Take an instance out of the map while it operates; `restore` puts
    /// it back. The order entry stays.
    fn take(&mut self, ci: ConstraintIndex) -> Result<Slot> {
        self.slots
            .remove(&ci.value())
            .ok_or_else(|| BridgeError::InvalidIndex(format!("unknown bridged constraint {ci}")))
    }

    fn restore(&mut self, ci: ConstraintIndex, slot: Slot) {
        self.slots.insert(ci.value(), slot);
    }

    fn retire(&mut self, ci: ConstraintIndex) {
        self.order.retain(|entry| *entry != Creation::Constraint(ci));
    }

    fn note_objective(&mut self) {
        self.order.push(Creation::Objective);
    }

    fn retire_objective(&mut self) {
        self.order.retain(|entry| *entry != Creation::Objective);
    }
}

/// Read-only routing view: positive indices go to the model, negative
/// indices to the owning bridge's attribute reconstruction.
struct RouterRef<'a> {
    model: &'a dyn ModelLike,
    catalog: &'a BridgeCatalog,
    registry: &'a BridgeRegistry,
    objective: &'a Option<Box<dyn Bridge>>,
}

impl RouterRef<'_> {
    /// Every constraint index owned by some live instance, inner and
    /// nested-outer alike. These are private to their owners and excluded
    /// from listing.
    fn bridge_owned_constraints(&self) -> HashSet<ConstraintIndex> {
        let mut owned = HashSet::new();
        for slot in self.registry.slots.values() {
            owned.extend(slot.bridge.owned_constraints());
        }
        if let Some(bridge) = self.objective {
            owned.extend(bridge.owned_constraints());
        }
        owned
    }

    fn bridge_owned_variables(&self) -> HashSet<VariableIndex> {
        let mut owned = HashSet::new();
        for slot in self.registry.slots.values() {
            owned.extend(slot.bridge.owned_variables());
        }
        if let Some(bridge) = self.objective {
            owned.extend(bridge.owned_variables());
        }
        owned
    }

    fn bridged_get(&self, ci: ConstraintIndex, attr: Attr) -> Result<AttrValue> {
        let slot = self.registry.slot(ci)?;
        slot.bridge.get(self, attr)
    }
}

impl ModelRead for RouterRef<'_> {
    fn supports(&self, ty: &ConstructType) -> bool {
        if self.model.supports(ty) {
            return true;
        }
        // Capability of the bridged layer: reachable means supported.
        let model = self.model;
        let mut selector = Selector::new();
        matches!(
            selector.resolve(self.catalog, &|t| model.supports(t), ty),
            Resolution::Bridged(_)
        )
    }

    fn constraint_function(&self, ci: ConstraintIndex) -> Result<Function> {
        if ci.is_bridged() {
            self.bridged_get(ci, Attr::ConstraintFunction)?.into_function()
        } else {
            self.model.constraint_function(ci)
        }
    }

    fn constraint_set(&self, ci: ConstraintIndex) -> Result<Set> {
        if ci.is_bridged() {
            self.bridged_get(ci, Attr::ConstraintSet)?.into_set()
        } else {
            self.model.constraint_set(ci)
        }
    }

    fn constraint_primal(&self, ci: ConstraintIndex) -> Result<f64> {
        if ci.is_bridged() {
            self.bridged_get(ci, Attr::ConstraintPrimal)?.into_scalar()
        } else {
            self.model.constraint_primal(ci)
        }
    }

    fn constraint_dual(&self, ci: ConstraintIndex) -> Result<f64> {
        if ci.is_bridged() {
            self.bridged_get(ci, Attr::ConstraintDual)?.into_scalar()
        } else {
            self.model.constraint_dual(ci)
        }
    }

    fn primal_start(&self, ci: ConstraintIndex) -> Result<Option<f64>> {
        if ci.is_bridged() {
            self.bridged_get(ci, Attr::PrimalStart)?.into_optional_scalar()
        } else {
            self.model.primal_start(ci)
        }
    }

    fn dual_start(&self, ci: ConstraintIndex) -> Result<Option<f64>> {
        if ci.is_bridged() {
            self.bridged_get(ci, Attr::DualStart)?.into_optional_scalar()
        } else {
            self.model.dual_start(ci)
        }
    }

    fn variable_primal(&self, vi: VariableIndex) -> Result<f64> {
        self.model.variable_primal(vi)
    }

    fn objective_function(&self) -> Result<Function> {
        match self.objective {
            Some(bridge) => bridge.get(self, Attr::ObjectiveFunction)?.into_function(),
            None => self.model.objective_function(),
        }
    }

    fn objective_value(&self) -> Result<f64> {
        match self.objective {
            Some(bridge) => bridge.get(self, Attr::ObjectiveValue)?.into_scalar(),
            None => self.model.objective_value(),
        }
    }

    fn sense(&self) -> OptimizationSense {
        self.model.sense()
    }

    fn num_constraints(&self, fty: FunctionType, sty: SetType) -> usize {
        self.constraint_indices(fty, sty).len()
    }

    /// Natively stored constraints of the type, minus bridge-owned inner
    /// ones, plus bridged constraints originally submitted as the type.
    /// Each construct is reported exactly once.
    fn constraint_indices(&self, fty: FunctionType, sty: SetType) -> Vec<ConstraintIndex> {
        let ty = ConstructType::Constraint(fty, sty);
        let owned = self.bridge_owned_constraints();
        let mut indices: Vec<ConstraintIndex> = self
            .model
            .constraint_indices(fty, sty)
            .into_iter()
            .filter(|ci| !owned.contains(ci))
            .collect();
        for entry in &self.registry.order {
            let Creation::Constraint(ci) = entry else {
                continue;
            };
            if owned.contains(ci) {
                continue;
            }
            if let Ok(slot) = self.registry.slot(*ci) {
                if slot.original == ty {
                    indices.push(*ci);
                }
            }
        }
        indices
    }
}

/// Mutable routing view. Implements the full model contract; this is the
/// handle bridges build against, which is what makes re-bridging of
/// produced constructs recursive.
struct Router<'a> {
    model: &'a mut dyn ModelLike,
    catalog: &'a BridgeCatalog,
    selector: &'a mut Selector,
    registry: &'a mut BridgeRegistry,
    objective: &'a mut Option<Box<dyn Bridge>>,
}

impl Router<'_> {
    fn as_read(&self) -> RouterRef<'_> {
        RouterRef {
            model: &*self.model,
            catalog: self.catalog,
            registry: &*self.registry,
            objective: &*self.objective,
        }
    }

    fn select_factory(&mut self, ty: &ConstructType) -> Result<Arc<dyn BridgeFactory>> {
        let model: &dyn ModelLike = &*self.model;
        let selection = self
            .selector
            .select(self.catalog, &|t| model.supports(t), ty)?;
        Ok(Arc::clone(self.catalog.factory(selection.factory)))
    }
}

impl ModelRead for Router<'_> {
    fn supports(&self, ty: &ConstructType) -> bool {
        self.as_read().supports(ty)
    }

    fn constraint_function(&self, ci: ConstraintIndex) -> Result<Function> {
        self.as_read().constraint_function(ci)
    }

    fn constraint_set(&self, ci: ConstraintIndex) -> Result<Set> {
        self.as_read().constraint_set(ci)
    }

    fn constraint_primal(&self, ci: ConstraintIndex) -> Result<f64> {
        self.as_read().constraint_primal(ci)
    }

    fn constraint_dual(&self, ci: ConstraintIndex) -> Result<f64> {
        self.as_read().constraint_dual(ci)
    }

    fn primal_start(&self, ci: ConstraintIndex) -> Result<Option<f64>> {
        self.as_read().primal_start(ci)
    }

    fn dual_start(&self, ci: ConstraintIndex) -> Result<Option<f64>> {
        self.as_read().dual_start(ci)
    }

    fn variable_primal(&self, vi: VariableIndex) -> Result<f64> {
        self.as_read().variable_primal(vi)
    }

    fn objective_function(&self) -> Result<Function> {
        self.as_read().objective_function()
    }

    fn objective_value(&self) -> Result<f64> {
        self.as_read().objective_value()
    }

    fn sense(&self) -> OptimizationSense {
        self.as_read().sense()
    }

    fn num_constraints(&self, fty: FunctionType, sty: SetType) -> usize {
        self.as_read().num_constraints(fty, sty)
    }

    fn constraint_indices(&self, fty: FunctionType, sty: SetType) -> Vec<ConstraintIndex> {
        self.as_read().constraint_indices(fty, sty)
    }
}

impl ModelLike for Router<'_> {
    fn add_variable(&mut self) -> VariableIndex {
        self.model.add_variable()
    }

    fn add_constraint(&mut self, f: Function, s: Set) -> Result<ConstraintIndex> {
        let ty = ConstructType::of_constraint(&f, &s);
        if self.model.supports(&ty) {
            return self.model.add_constraint(f, s);
        }
        let factory = self.select_factory(&ty)?;
        debug!(construct = %ty, bridge = factory.name(), "building constraint bridge");
        let bridge = factory.build_constraint(self, &f, &s)?;
        Ok(self.registry.register(bridge, ty))
    }

    fn delete_constraint(&mut self, ci: ConstraintIndex) -> Result<()> {
        if !ci.is_bridged() {
            if self.as_read().bridge_owned_constraints().contains(&ci) {
                return Err(BridgeError::InvalidIndex(format!(
                    "{ci} is owned by a bridge and cannot be deleted directly"
                )));
            }
            return self.model.delete_constraint(ci);
        }
        let mut slot = self.registry.take(ci)?;
        self.registry.retire(ci);
        debug!(constraint = %ci, "deleting bridged constraint");
        slot.bridge.delete(self)
    }

    fn delete_variable(&mut self, vi: VariableIndex) -> Result<()> {
        if self.as_read().bridge_owned_variables().contains(&vi) {
            return Err(BridgeError::InvalidIndex(format!(
                "{vi} is owned by a bridge and cannot be deleted directly"
            )));
        }
        self.model.delete_variable(vi)
    }

    fn set_constraint_function(&mut self, ci: ConstraintIndex, f: Function) -> Result<()> {
        if !ci.is_bridged() {
            return self.model.set_constraint_function(ci, f);
        }
        let mut slot = self.registry.take(ci)?;
        let result = slot
            .bridge
            .set(self, Attr::ConstraintFunction, AttrValue::Function(f));
        self.registry.restore(ci, slot);
        result
    }

    fn set_constraint_set(&mut self, ci: ConstraintIndex, s: Set) -> Result<()> {
        if !ci.is_bridged() {
            return self.model.set_constraint_set(ci, s);
        }
        let mut slot = self.registry.take(ci)?;
        let result = slot.bridge.set(self, Attr::ConstraintSet, AttrValue::Set(s));
        self.registry.restore(ci, slot);
        result
    }

    fn modify_constraint(&mut self, ci: ConstraintIndex, change: &Modification) -> Result<()> {
        if !ci.is_bridged() {
            return self.model.modify_constraint(ci, change);
        }
        let mut slot = self.registry.take(ci)?;
        let result = slot.bridge.modify(self, change);
        self.registry.restore(ci, slot);
        result
    }

    fn set_primal_start(&mut self, ci: ConstraintIndex, value: Option<f64>) -> Result<()> {
        if !ci.is_bridged() {
            return self.model.set_primal_start(ci, value);
        }
        let mut slot = self.registry.take(ci)?;
        let result = slot.bridge.set(self, Attr::PrimalStart, value.into());
        self.registry.restore(ci, slot);
        result
    }

    fn set_dual_start(&mut self, ci: ConstraintIndex, value: Option<f64>) -> Result<()> {
        if !ci.is_bridged() {
            return self.model.set_dual_start(ci, value);
        }
        let mut slot = self.registry.take(ci)?;
        let result = slot.bridge.set(self, Attr::DualStart, value.into());
        self.registry.restore(ci, slot);
        result
    }

    fn set_objective(&mut self, f: Function) -> Result<()> {
        // Resolve the replacement before tearing anything down: a rejected
        // objective must leave the current one untouched.
        let ty = ConstructType::of_objective(&f);
        let factory = if self.model.supports(&ty) {
            None
        } else {
            Some(self.select_factory(&ty)?)
        };
        if let Some(mut bridge) = self.objective.take() {
            self.registry.retire_objective();
            bridge.delete(self)?;
        }
        match factory {
            None => self.model.set_objective(f),
            Some(factory) => {
                let sense = self.model.sense();
                debug!(construct = %ty, bridge = factory.name(), "building objective bridge");
                let bridge = factory.build_objective(self, &f, sense)?;
                *self.objective = Some(bridge);
                self.registry.note_objective();
                Ok(())
            }
        }
    }

    fn clear_objective(&mut self) -> Result<()> {
        if let Some(mut bridge) = self.objective.take() {
            debug!("deleting objective bridge");
            self.registry.retire_objective();
            return bridge.delete(self);
        }
        self.model.clear_objective()
    }

    fn set_sense(&mut self, sense: OptimizationSense) -> Result<()> {
        if self.objective.is_some() {
            return Err(BridgeError::State(
                "cannot change the optimization sense while an objective bridge is attached; \
                 clear the objective first"
                    .into(),
            ));
        }
        self.model.set_sense(sense)
    }

    /// Run every pending final touch, in creation order, exactly once,
    /// then forward the solve. A finalization failure aborts before the
    /// underlying model is invoked.
    fn optimize(&mut self) -> Result<()> {
        let order = self.registry.order.clone();
        for entry in order {
            match entry {
                Creation::Constraint(ci) => {
                    let mut slot = self.registry.take(ci)?;
                    if slot.bridge.needs_final_touch() {
                        trace!(constraint = %ci, "running final touch");
                        let result = slot.bridge.final_touch(self);
                        self.registry.restore(ci, slot);
                        result?;
                    } else {
                        self.registry.restore(ci, slot);
                    }
                }
                Creation::Objective => {
                    if let Some(mut bridge) = self.objective.take() {
                        if bridge.needs_final_touch() {
                            trace!("running objective final touch");
                            let result = bridge.final_touch(self);
                            *self.objective = Some(bridge);
                            result?;
                        } else {
                            *self.objective = Some(bridge);
                        }
                    }
                }
            }
        }
        self.model.optimize()
    }
}

/// The bridging layer around an underlying model.
///
/// Exposes the same contract as the model it wraps, plus introspection and
/// mutation of the active bridge catalog.
pub struct BridgeOptimizer<M: ModelLike> {
    model: M,
    catalog: BridgeCatalog,
    selector: Selector,
    registry: BridgeRegistry,
    objective: Option<Box<dyn Bridge>>,
}

impl<M: ModelLike> BridgeOptimizer<M> {
    /// Wrap a model with the built-in bridge catalog.
    pub fn new(model: M) -> Self {
        Self::with_catalog(model, BridgeCatalog::with_builtin_bridges())
    }

    /// Wrap a model with a custom catalog.
    pub fn with_catalog(model: M, catalog: BridgeCatalog) -> Self {
        BridgeOptimizer {
            model,
            catalog,
            selector: Selector::new(),
            registry: BridgeRegistry::default(),
            objective: None,
        }
    }

    /// The underlying model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable access to the underlying model, for loading solution values
    /// into a test double. Structural mutation through this handle bypasses
    /// the bridge bookkeeping.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// The active bridge catalog.
    pub fn catalog(&self) -> &BridgeCatalog {
        &self.catalog
    }

    /// Register a bridge type. Memoized selections are invalidated.
    pub fn add_bridge(&mut self, factory: Arc<dyn BridgeFactory>) -> Result<()> {
        self.catalog.add_bridge(factory)
    }

    /// Remove a bridge type by name. Memoized selections are invalidated.
    /// Live instances built from it are unaffected.
    pub fn remove_bridge(&mut self, name: &str) -> Result<()> {
        self.catalog.remove_bridge(name)
    }

    /// Number of live bridged constraints.
    pub fn num_bridged_constraints(&self) -> usize {
        self.registry.slots.len()
    }

    /// Whether an objective bridge is currently attached.
    pub fn has_objective_bridge(&self) -> bool {
        self.objective.is_some()
    }

    /// The chain of bridge names the selector would apply for a construct
    /// type. Empty for a natively supported type.
    pub fn selected_chain(&mut self, ty: &ConstructType) -> Result<Vec<&'static str>> {
        let model = &self.model;
        let native = |t: &ConstructType| model.supports(t);
        self.selector.chain(&self.catalog, &native, ty)
    }

    fn router(&mut self) -> Router<'_> {
        Router {
            model: &mut self.model,
            catalog: &self.catalog,
            selector: &mut self.selector,
            registry: &mut self.registry,
            objective: &mut self.objective,
        }
    }

    fn read_router(&self) -> RouterRef<'_> {
        RouterRef {
            model: &self.model,
            catalog: &self.catalog,
            registry: &self.registry,
            objective: &self.objective,
        }
    }
}

impl<M: ModelLike> ModelRead for BridgeOptimizer<M> {
    fn supports(&self, ty: &ConstructType) -> bool {
        self.read_router().supports(ty)
    }

    fn constraint_function(&self, ci: ConstraintIndex) -> Result<Function> {
        self.read_router().constraint_function(ci)
    }

    fn constraint_set(&self, ci: ConstraintIndex) -> Result<Set> {
        self.read_router().constraint_set(ci)
    }

    fn constraint_primal(&self, ci: ConstraintIndex) -> Result<f64> {
        self.read_router().constraint_primal(ci)
    }

    fn constraint_dual(&self, ci: ConstraintIndex) -> Result<f64> {
        self.read_router().constraint_dual(ci)
    }

    fn primal_start(&self, ci: ConstraintIndex) -> Result<Option<f64>> {
        self.read_router().primal_start(ci)
    }

    fn dual_start(&self, ci: ConstraintIndex) -> Result<Option<f64>> {
        self.read_router().dual_start(ci)
    }

    fn variable_primal(&self, vi: VariableIndex) -> Result<f64> {
        self.read_router().variable_primal(vi)
    }

    fn objective_function(&self) -> Result<Function> {
        self.read_router().objective_function()
    }

    fn objective_value(&self) -> Result<f64> {
        self.read_router().objective_value()
    }

    fn sense(&self) -> OptimizationSense {
        self.read_router().sense()
    }

    fn num_constraints(&self, fty: FunctionType, sty: SetType) -> usize {
        self.read_router().num_constraints(fty, sty)
    }

    fn constraint_indices(&self, fty: FunctionType, sty: SetType) -> Vec<ConstraintIndex> {
        self.read_router().constraint_indices(fty, sty)
    }
}

impl<M: ModelLike> ModelLike for BridgeOptimizer<M> {
    fn add_variable(&mut self) -> VariableIndex {
        self.router().add_variable()
    }

    fn add_constraint(&mut self, f: Function, s: Set) -> Result<ConstraintIndex> {
        self.router().add_constraint(f, s)
    }

    fn delete_constraint(&mut self, ci: ConstraintIndex) -> Result<()> {
        self.router().delete_constraint(ci)
    }

    fn delete_variable(&mut self, vi: VariableIndex) -> Result<()> {
        self.router().delete_variable(vi)
    }

    fn set_constraint_function(&mut self, ci: ConstraintIndex, f: Function) -> Result<()> {
        self.router().set_constraint_function(ci, f)
    }

    fn set_constraint_set(&mut self, ci: ConstraintIndex, s: Set) -> Result<()> {
        self.router().set_constraint_set(ci, s)
    }

    fn modify_constraint(&mut self, ci: ConstraintIndex, change: &Modification) -> Result<()> {
        self.router().modify_constraint(ci, change)
    }

    fn set_primal_start(&mut self, ci: ConstraintIndex, value: Option<f64>) -> Result<()> {
        self.router().set_primal_start(ci, value)
    }

    fn set_dual_start(&mut self, ci: ConstraintIndex, value: Option<f64>) -> Result<()> {
        self.router().set_dual_start(ci, value)
    }

    fn set_objective(&mut self, f: Function) -> Result<()> {
        self.router().set_objective(f)
    }

    fn clear_objective(&mut self) -> Result<()> {
        self.router().clear_objective()
    }

    fn set_sense(&mut self, sense: OptimizationSense) -> Result<()> {
        self.router().set_sense(sense)
    }

    fn optimize(&mut self) -> Result<()> {
        self.router().optimize()
    }
}
