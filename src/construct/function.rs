//! Scalar function representations.
//!
//! Quadratic terms follow the one-half convention on the diagonal: a term
//! with coefficient `c` on `(x, x)` denotes `(c/2) x^2`, while off-diagonal
//! terms denote `c * x * y` directly.

use std::collections::HashMap;

use crate::construct::FunctionType;
use crate::index::VariableIndex;

/// One `coefficient * variable` term of an affine function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTerm {
    /// Multiplier on the variable.
    pub coefficient: f64,
    /// The variable.
    pub variable: VariableIndex,
}

impl AffineTerm {
    /// Create a term `coefficient * variable`.
    pub fn new(coefficient: f64, variable: VariableIndex) -> Self {
        AffineTerm {
            coefficient,
            variable,
        }
    }
}

/// One `coefficient * variable_1 * variable_2` term of a quadratic function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticTerm {
    /// Multiplier on the variable product (halved implicitly on the diagonal).
    pub coefficient: f64,
    /// First variable of the product.
    pub variable_1: VariableIndex,
    /// Second variable of the product.
    pub variable_2: VariableIndex,
}

impl QuadraticTerm {
    /// Create a term `coefficient * variable_1 * variable_2`.
    pub fn new(coefficient: f64, variable_1: VariableIndex, variable_2: VariableIndex) -> Self {
        QuadraticTerm {
            coefficient,
            variable_1,
            variable_2,
        }
    }

    /// Whether this is a squared self-term (`x * x`).
    pub fn is_diagonal(&self) -> bool {
        self.variable_1 == self.variable_2
    }
}

/// An affine scalar function: `sum(terms) + constant`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AffineFunction {
    /// The linear terms.
    pub terms: Vec<AffineTerm>,
    /// The constant offset.
    pub constant: f64,
}

impl AffineFunction {
    /// Create an affine function from terms and a constant.
    pub fn new(terms: Vec<AffineTerm>, constant: f64) -> Self {
        AffineFunction { terms, constant }
    }

    /// Append a term.
    pub fn push(&mut self, coefficient: f64, variable: VariableIndex) {
        self.terms.push(AffineTerm::new(coefficient, variable));
    }

    /// Negate every term and the constant.
    pub fn negated(&self) -> Self {
        AffineFunction {
            terms: self
                .terms
                .iter()
                .map(|t| AffineTerm::new(-t.coefficient, t.variable))
                .collect(),
            constant: -self.constant,
        }
    }

    /// Combine duplicate variables and drop zero coefficients.
    pub fn canonicalized(&self) -> Self {
        let mut combined: HashMap<VariableIndex, f64> = HashMap::new();
        for t in &self.terms {
            *combined.entry(t.variable).or_insert(0.0) += t.coefficient;
        }
        let mut terms: Vec<AffineTerm> = combined
            .into_iter()
            .filter(|(_, c)| *c != 0.0)
            .map(|(v, c)| AffineTerm::new(c, v))
            .collect();
        terms.sort_by_key(|t| t.variable);
        AffineFunction {
            terms,
            constant: self.constant,
        }
    }

    /// Net coefficient on a variable, combining duplicate terms.
    pub fn coefficient(&self, variable: VariableIndex) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.variable == variable)
            .map(|t| t.coefficient)
            .sum()
    }

    /// Remove every term mentioning `variable`, returning its net coefficient.
    pub fn remove_variable(&mut self, variable: VariableIndex) -> f64 {
        let removed = self.coefficient(variable);
        self.terms.retain(|t| t.variable != variable);
        removed
    }
}

/// A quadratic scalar function: quadratic terms plus an affine part.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuadraticFunction {
    /// The quadratic terms (one-half convention on the diagonal).
    pub quadratic_terms: Vec<QuadraticTerm>,
    /// The linear terms.
    pub affine_terms: Vec<AffineTerm>,
    /// The constant offset.
    pub constant: f64,
}

impl QuadraticFunction {
    /// Create a quadratic function from its parts.
    pub fn new(
        quadratic_terms: Vec<QuadraticTerm>,
        affine_terms: Vec<AffineTerm>,
        constant: f64,
    ) -> Self {
        QuadraticFunction {
            quadratic_terms,
            affine_terms,
            constant,
        }
    }

    /// The affine part, with the quadratic terms dropped.
    pub fn affine_part(&self) -> AffineFunction {
        AffineFunction {
            terms: self.affine_terms.clone(),
            constant: self.constant,
        }
    }

    /// Negate every term and the constant.
    pub fn negated(&self) -> Self {
        QuadraticFunction {
            quadratic_terms: self
                .quadratic_terms
                .iter()
                .map(|t| QuadraticTerm::new(-t.coefficient, t.variable_1, t.variable_2))
                .collect(),
            affine_terms: self
                .affine_terms
                .iter()
                .map(|t| AffineTerm::new(-t.coefficient, t.variable))
                .collect(),
            constant: -self.constant,
        }
    }
}

/// A scalar function of the model's variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    /// The function `f(x) = x` for a single variable.
    Variable(VariableIndex),
    /// An affine function.
    Affine(AffineFunction),
    /// A quadratic function.
    Quadratic(QuadraticFunction),
}

impl Function {
    /// The shape of this function.
    pub fn function_type(&self) -> FunctionType {
        match self {
            Function::Variable(_) => FunctionType::Variable,
            Function::Affine(_) => FunctionType::Affine,
            Function::Quadratic(_) => FunctionType::Quadratic,
        }
    }

    /// Negate the function. A single variable becomes affine.
    pub fn negated(&self) -> Function {
        match self {
            Function::Variable(v) => {
                Function::Affine(AffineFunction::new(vec![AffineTerm::new(-1.0, *v)], 0.0))
            }
            Function::Affine(a) => Function::Affine(a.negated()),
            Function::Quadratic(q) => Function::Quadratic(q.negated()),
        }
    }

    /// The function minus one fresh slack variable: `f(x) - s`.
    pub fn minus_variable(&self, s: VariableIndex) -> Function {
        match self {
            Function::Variable(v) => Function::Affine(AffineFunction::new(
                vec![AffineTerm::new(1.0, *v), AffineTerm::new(-1.0, s)],
                0.0,
            )),
            Function::Affine(a) => {
                let mut out = a.clone();
                out.push(-1.0, s);
                Function::Affine(out)
            }
            Function::Quadratic(q) => {
                let mut out = q.clone();
                out.affine_terms.push(AffineTerm::new(-1.0, s));
                Function::Quadratic(out)
            }
        }
    }

    /// Mathematical equivalence within a tolerance, ignoring term order,
    /// duplicate terms, and the Variable/Affine shape distinction.
    pub fn approx_eq(&self, other: &Function, tol: f64) -> bool {
        fn affine_map(terms: &[AffineTerm]) -> HashMap<VariableIndex, f64> {
            let mut map = HashMap::new();
            for t in terms {
                *map.entry(t.variable).or_insert(0.0) += t.coefficient;
            }
            map.retain(|_, c| *c != 0.0);
            map
        }
        fn quad_map(terms: &[QuadraticTerm]) -> HashMap<(VariableIndex, VariableIndex), f64> {
            let mut map = HashMap::new();
            for t in terms {
                let key = if t.variable_1 <= t.variable_2 {
                    (t.variable_1, t.variable_2)
                } else {
                    (t.variable_2, t.variable_1)
                };
                *map.entry(key).or_insert(0.0) += t.coefficient;
            }
            map.retain(|_, c| *c != 0.0);
            map
        }
        fn maps_close<K: std::hash::Hash + Eq + Copy>(
            a: &HashMap<K, f64>,
            b: &HashMap<K, f64>,
            tol: f64,
        ) -> bool {
            a.keys().chain(b.keys()).all(|k| {
                let ca = a.get(k).copied().unwrap_or(0.0);
                let cb = b.get(k).copied().unwrap_or(0.0);
                (ca - cb).abs() <= tol
            })
        }

        let (qa, aa, ca) = self.parts();
        let (qb, ab, cb) = other.parts();
        (ca - cb).abs() <= tol
            && maps_close(&affine_map(&aa), &affine_map(&ab), tol)
            && maps_close(&quad_map(&qa), &quad_map(&qb), tol)
    }

    fn parts(&self) -> (Vec<QuadraticTerm>, Vec<AffineTerm>, f64) {
        match self {
            Function::Variable(v) => (Vec::new(), vec![AffineTerm::new(1.0, *v)], 0.0),
            Function::Affine(a) => (Vec::new(), a.terms.clone(), a.constant),
            Function::Quadratic(q) => (
                q.quadratic_terms.clone(),
                q.affine_terms.clone(),
                q.constant,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: u64) -> VariableIndex {
        VariableIndex::new(i)
    }

    #[test]
    fn test_canonicalized_combines_and_drops() {
        let f = AffineFunction::new(
            vec![
                AffineTerm::new(2.0, v(1)),
                AffineTerm::new(3.0, v(1)),
                AffineTerm::new(0.0, v(2)),
            ],
            1.5,
        );
        let c = f.canonicalized();
        assert_eq!(c.terms.len(), 1);
        assert_eq!(c.terms[0].coefficient, 5.0);
        assert_eq!(c.constant, 1.5);
    }

    #[test]
    fn test_negate_variable_becomes_affine() {
        let f = Function::Variable(v(7));
        let n = f.negated();
        assert_eq!(n.function_type(), FunctionType::Affine);
        assert!(n.approx_eq(
            &Function::Affine(AffineFunction::new(vec![AffineTerm::new(-1.0, v(7))], 0.0)),
            1e-12
        ));
    }

    #[test]
    fn test_minus_variable() {
        let f = Function::Affine(AffineFunction::new(vec![AffineTerm::new(3.0, v(1))], 2.0));
        let g = f.minus_variable(v(9));
        let expected = Function::Affine(AffineFunction::new(
            vec![AffineTerm::new(3.0, v(1)), AffineTerm::new(-1.0, v(9))],
            2.0,
        ));
        assert!(g.approx_eq(&expected, 1e-12));
    }

    #[test]
    fn test_approx_eq_ignores_shape_distinction() {
        let a = Function::Variable(v(4));
        let b = Function::Affine(AffineFunction::new(vec![AffineTerm::new(1.0, v(4))], 0.0));
        assert!(a.approx_eq(&b, 1e-12));
        assert!(!a.approx_eq(&Function::Variable(v(5)), 1e-12));
    }

    #[test]
    fn test_quadratic_symmetry_in_approx_eq() {
        let a = Function::Quadratic(QuadraticFunction::new(
            vec![QuadraticTerm::new(2.0, v(1), v(2))],
            vec![],
            0.0,
        ));
        let b = Function::Quadratic(QuadraticFunction::new(
            vec![QuadraticTerm::new(2.0, v(2), v(1))],
            vec![],
            0.0,
        ));
        assert!(a.approx_eq(&b, 1e-12));
    }

    #[test]
    fn test_remove_variable() {
        let mut f = AffineFunction::new(
            vec![AffineTerm::new(3.0, v(1)), AffineTerm::new(-1.0, v(2))],
            0.0,
        );
        let c = f.remove_variable(v(2));
        assert_eq!(c, -1.0);
        assert_eq!(f.terms.len(), 1);
    }
}
