//! Constraint sets.

use crate::construct::SetType;

/// A scalar constraint set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Set {
    /// `f(x) <= upper`.
    LessThan(f64),
    /// `f(x) >= lower`.
    GreaterThan(f64),
    /// `f(x) == value`.
    EqualTo(f64),
}

impl Set {
    /// The shape of this set.
    pub fn set_type(&self) -> SetType {
        match self {
            Set::LessThan(_) => SetType::LessThan,
            Set::GreaterThan(_) => SetType::GreaterThan,
            Set::EqualTo(_) => SetType::EqualTo,
        }
    }

    /// The set's constant term (bound or fixed value).
    pub fn constant(&self) -> f64 {
        match self {
            Set::LessThan(c) | Set::GreaterThan(c) | Set::EqualTo(c) => *c,
        }
    }

    /// The set satisfied by `-f(x)` whenever this set is satisfied by `f(x)`.
    pub fn negated(&self) -> Set {
        match self {
            Set::LessThan(c) => Set::GreaterThan(-c),
            Set::GreaterThan(c) => Set::LessThan(-c),
            Set::EqualTo(c) => Set::EqualTo(-c),
        }
    }
}
