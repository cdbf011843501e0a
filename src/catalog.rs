//! The bridge catalog: an ordered registry of bridge types.
//!
//! Registration order is the deterministic tie-break for equal-cost chains,
//! so the catalog is a `Vec`, not a map. The active set may be extended or
//! shrunk at runtime; either bumps a generation counter that invalidates
//! memoized selections.
//!
//! Acyclicity of the derived type graph is an invariant of the catalog
//! itself: a factory whose edges would close a cycle is rejected at
//! registration, so the selector can recurse without a runtime guard.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::bridge::{
    BridgeFactory, FlipBridgeFactory, ObjectiveSlackBridgeFactory,
    ParametricSubstitutionBridgeFactory,
};
use crate::construct::ConstructType;
use crate::error::{BridgeError, Result};

/// Ordered registry of bridge factories.
pub struct BridgeCatalog {
    factories: Vec<Arc<dyn BridgeFactory>>,
    generation: u64,
}

impl BridgeCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        BridgeCatalog {
            factories: Vec::new(),
            generation: 0,
        }
    }

    /// The catalog with the built-in bridges: flip, parametric
    /// substitution, objective slack, registered in that order.
    pub fn with_builtin_bridges() -> Self {
        // The built-in set is acyclic by construction, so registration
        // cannot fail and the checks are skipped.
        BridgeCatalog {
            factories: vec![
                Arc::new(FlipBridgeFactory::new()),
                Arc::new(ParametricSubstitutionBridgeFactory::new()),
                Arc::new(ObjectiveSlackBridgeFactory::new()),
            ],
            generation: 0,
        }
    }

    /// Register a bridge type. Rejects duplicates by name and any factory
    /// whose edges would make the type graph cyclic.
    pub fn add_bridge(&mut self, factory: Arc<dyn BridgeFactory>) -> Result<()> {
        if self.factories.iter().any(|f| f.name() == factory.name()) {
            return Err(BridgeError::State(format!(
                "bridge {:?} is already registered",
                factory.name()
            )));
        }
        let mut candidate: Vec<&dyn BridgeFactory> =
            self.factories.iter().map(Arc::as_ref).collect();
        candidate.push(factory.as_ref());
        if has_cycle(&candidate) {
            return Err(BridgeError::State(format!(
                "bridge {:?} would make the catalog graph cyclic",
                factory.name()
            )));
        }
        debug!(bridge = factory.name(), "registering bridge type");
        self.factories.push(factory);
        self.generation += 1;
        Ok(())
    }

    /// Remove a bridge type by name.
    pub fn remove_bridge(&mut self, name: &str) -> Result<()> {
        let position = self
            .factories
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| BridgeError::State(format!("bridge {name:?} is not registered")))?;
        debug!(bridge = name, "removing bridge type");
        self.factories.remove(position);
        self.generation += 1;
        Ok(())
    }

    /// The registered factories, in registration order.
    pub fn factories(&self) -> &[Arc<dyn BridgeFactory>] {
        &self.factories
    }

    /// The factory at a registration position.
    pub fn factory(&self, position: usize) -> &Arc<dyn BridgeFactory> {
        &self.factories[position]
    }

    /// Monotone counter bumped by every catalog change. Memoized search
    /// results are valid only for the generation they were computed under.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Default for BridgeCatalog {
    fn default() -> Self {
        BridgeCatalog::with_builtin_bridges()
    }
}

/// Cycle check over the finite construct type space.
fn has_cycle(factories: &[&dyn BridgeFactory]) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        ty: &ConstructType,
        factories: &[&dyn BridgeFactory],
        marks: &mut HashMap<ConstructType, Mark>,
    ) -> bool {
        match marks.get(ty).copied().unwrap_or(Mark::Unvisited) {
            Mark::Done => return false,
            Mark::InProgress => return true,
            Mark::Unvisited => {}
        }
        marks.insert(*ty, Mark::InProgress);
        for factory in factories {
            if !factory.accepts(ty) {
                continue;
            }
            for produced in factory.produced(ty) {
                if visit(&produced, factories, marks) {
                    return true;
                }
            }
        }
        marks.insert(*ty, Mark::Done);
        false
    }

    let mut marks = HashMap::new();
    ConstructType::all()
        .iter()
        .any(|ty| visit(ty, factories, &mut marks))
}
