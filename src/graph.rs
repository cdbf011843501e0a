//! Least-cost bridge selection over the catalog graph.
//!
//! Nodes are construct types; a factory accepting a type contributes one
//! edge from that type to each type it produces. Because one bridge may
//! emit several constructs, the search is a dynamic program over the
//! catalog DAG rather than a plain shortest path: the cost of bridging a
//! type is the factory's own cost plus the cost of every produced type,
//! and a natively accepted type costs nothing (the search stops there, so
//! no chain ever passes *through* a native node).
//!
//! Ties on total cost go to the factory registered earliest, which makes
//! selection reproducible. Results are memoized per construct type until
//! the catalog changes. Termination relies on the catalog's acyclicity
//! invariant, enforced at registration; there is no recursion guard here.

use std::collections::HashMap;

use tracing::debug;

use crate::catalog::BridgeCatalog;
use crate::construct::ConstructType;
use crate::error::{BridgeError, Result};

/// The winning bridge for one construct type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Registration position of the selected factory in the catalog.
    pub factory: usize,
    /// Total cost of the chain rooted at this selection.
    pub cost: u64,
}

/// Outcome of resolving a construct type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The underlying model accepts the type as-is.
    Native,
    /// The type is reachable through the selected bridge.
    Bridged(Selection),
    /// No chain terminates at a native type.
    Unreachable,
}

/// Memoizing selector over a catalog.
#[derive(Debug, Default)]
pub struct Selector {
    memo: HashMap<ConstructType, Resolution>,
    generation: Option<u64>,
}

impl Selector {
    /// Create an empty selector.
    pub fn new() -> Self {
        Selector::default()
    }

    /// Resolve a construct type against the catalog and the model's native
    /// capability query.
    pub fn resolve(
        &mut self,
        catalog: &BridgeCatalog,
        native: &dyn Fn(&ConstructType) -> bool,
        ty: &ConstructType,
    ) -> Resolution {
        if self.generation != Some(catalog.generation()) {
            self.memo.clear();
            self.generation = Some(catalog.generation());
        }
        self.resolve_memoized(catalog, native, ty)
    }

    fn resolve_memoized(
        &mut self,
        catalog: &BridgeCatalog,
        native: &dyn Fn(&ConstructType) -> bool,
        ty: &ConstructType,
    ) -> Resolution {
        if let Some(cached) = self.memo.get(ty) {
            return *cached;
        }
        let resolution = self.resolve_uncached(catalog, native, ty);
        self.memo.insert(*ty, resolution);
        resolution
    }

    fn resolve_uncached(
        &mut self,
        catalog: &BridgeCatalog,
        native: &dyn Fn(&ConstructType) -> bool,
        ty: &ConstructType,
    ) -> Resolution {
        if native(ty) {
            return Resolution::Native;
        }
        let mut best: Option<Selection> = None;
        for (position, factory) in catalog.factories().iter().enumerate() {
            if !factory.accepts(ty) {
                continue;
            }
            let mut cost = factory.cost();
            let mut reachable = true;
            for produced in factory.produced(ty) {
                match self.resolve_memoized(catalog, native, &produced) {
                    Resolution::Native => {}
                    Resolution::Bridged(selection) => cost += selection.cost,
                    Resolution::Unreachable => {
                        reachable = false;
                        break;
                    }
                }
            }
            // Strict comparison keeps the earliest-registered factory on ties.
            if reachable && best.map_or(true, |b| cost < b.cost) {
                best = Some(Selection {
                    factory: position,
                    cost,
                });
            }
        }
        match best {
            Some(selection) => {
                debug!(
                    construct = %ty,
                    bridge = catalog.factory(selection.factory).name(),
                    cost = selection.cost,
                    "selected bridge"
                );
                Resolution::Bridged(selection)
            }
            None => Resolution::Unreachable,
        }
    }

    /// Resolve a type that is known not to be native, failing with
    /// `UnsupportedConstruct` when no chain exists.
    pub fn select(
        &mut self,
        catalog: &BridgeCatalog,
        native: &dyn Fn(&ConstructType) -> bool,
        ty: &ConstructType,
    ) -> Result<Selection> {
        match self.resolve(catalog, native, ty) {
            Resolution::Bridged(selection) => Ok(selection),
            Resolution::Native => Err(BridgeError::State(format!(
                "{ty} is natively supported; nothing to select"
            ))),
            Resolution::Unreachable => Err(BridgeError::UnsupportedConstruct { construct: *ty }),
        }
    }

    /// The full winning chain of bridge names for a type, in the order the
    /// bridges would be applied (preorder over produced constructs).
    /// Empty for a native type.
    pub fn chain(
        &mut self,
        catalog: &BridgeCatalog,
        native: &dyn Fn(&ConstructType) -> bool,
        ty: &ConstructType,
    ) -> Result<Vec<&'static str>> {
        match self.resolve(catalog, native, ty) {
            Resolution::Native => Ok(Vec::new()),
            Resolution::Unreachable => Err(BridgeError::UnsupportedConstruct { construct: *ty }),
            Resolution::Bridged(selection) => {
                let factory = catalog.factory(selection.factory).clone();
                let mut names = vec![factory.name()];
                for produced in factory.produced(ty) {
                    names.extend(self.chain(catalog, native, &produced)?);
                }
                Ok(names)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{FunctionType, SetType};

    fn affine_native(ty: &ConstructType) -> bool {
        matches!(
            ty,
            ConstructType::Constraint(FunctionType::Affine, SetType::LessThan)
                | ConstructType::Objective(FunctionType::Variable)
        )
    }

    #[test]
    fn test_native_type_short_circuits() {
        let catalog = BridgeCatalog::with_builtin_bridges();
        let mut selector = Selector::new();
        let ty = ConstructType::Constraint(FunctionType::Affine, SetType::LessThan);
        assert_eq!(
            selector.resolve(&catalog, &affine_native, &ty),
            Resolution::Native
        );
        assert!(matches!(
            selector.select(&catalog, &affine_native, &ty).unwrap_err(),
            BridgeError::State(_)
        ));
    }

    #[test]
    fn test_single_edge_selection() {
        let catalog = BridgeCatalog::with_builtin_bridges();
        let mut selector = Selector::new();
        let ty = ConstructType::Constraint(FunctionType::Affine, SetType::GreaterThan);
        let selection = selector.select(&catalog, &affine_native, &ty).unwrap();
        assert_eq!(catalog.factory(selection.factory).name(), "flip");
        assert_eq!(selection.cost, 1);
    }

    #[test]
    fn test_tie_break_prefers_earliest_registration() {
        // Quadratic >= reaches Affine <= two ways at cost 2:
        // flip then substitute, or substitute then flip. Flip was
        // registered first, so its edge wins.
        let catalog = BridgeCatalog::with_builtin_bridges();
        let mut selector = Selector::new();
        let ty = ConstructType::Constraint(FunctionType::Quadratic, SetType::GreaterThan);
        let chain = selector.chain(&catalog, &affine_native, &ty).unwrap();
        assert_eq!(chain, ["flip", "parametric_substitution"]);
        let selection = selector.select(&catalog, &affine_native, &ty).unwrap();
        assert_eq!(selection.cost, 2);
    }

    #[test]
    fn test_selection_is_deterministic_on_unchanged_catalog() {
        let catalog = BridgeCatalog::with_builtin_bridges();
        let mut selector = Selector::new();
        let ty = ConstructType::Constraint(FunctionType::Quadratic, SetType::GreaterThan);
        let first = selector.chain(&catalog, &affine_native, &ty).unwrap();
        let second = selector.chain(&catalog, &affine_native, &ty).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_catalog_change_invalidates_memo() {
        let mut catalog = BridgeCatalog::with_builtin_bridges();
        let mut selector = Selector::new();
        let ty = ConstructType::Constraint(FunctionType::Quadratic, SetType::GreaterThan);
        assert_eq!(
            selector.chain(&catalog, &affine_native, &ty).unwrap(),
            ["flip", "parametric_substitution"]
        );

        catalog.remove_bridge("flip").unwrap();
        assert!(matches!(
            selector.resolve(&catalog, &affine_native, &ty),
            Resolution::Unreachable
        ));
    }

    #[test]
    fn test_unreachable_error_names_the_requested_type() {
        let catalog = BridgeCatalog::new();
        let mut selector = Selector::new();
        let ty = ConstructType::Constraint(FunctionType::Quadratic, SetType::EqualTo);
        let err = selector.select(&catalog, &affine_native, &ty).unwrap_err();
        match err {
            BridgeError::UnsupportedConstruct { construct } => assert_eq!(construct, ty),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_objective_chain_costs_both_orientations() {
        let catalog = BridgeCatalog::with_builtin_bridges();
        let mut selector = Selector::new();
        let ty = ConstructType::Objective(FunctionType::Affine);
        let selection = selector.select(&catalog, &affine_native, &ty).unwrap();
        assert_eq!(catalog.factory(selection.factory).name(), "objective_slack");
        // slack itself + Affine<= native + Affine>= via flip.
        assert_eq!(selection.cost, 2);
    }
}
