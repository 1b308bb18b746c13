//! Two-dimensional polynomials used as source mappings for warps.

use serde::{Deserialize, Serialize};

/// One term `coeff · x^px · y^py`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub px: u32,
    pub py: u32,
    pub coeff: f64,
}

/// Sum of monomials in `x` and `y`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Poly2d {
    terms: Vec<Term>,
}

impl Poly2d {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a term, returning `self` for chaining.
    pub fn with_term(mut self, px: u32, py: u32, coeff: f64) -> Self {
        self.terms.push(Term { px, py, coeff });
        self
    }

    /// Affine polynomial `c + a·x + b·y`.
    pub fn affine(c: f64, a: f64, b: f64) -> Self {
        Self::new()
            .with_term(0, 0, c)
            .with_term(1, 0, a)
            .with_term(0, 1, b)
    }

    /// Identity mapping for the x coordinate.
    pub fn identity_x() -> Self {
        Self::affine(0.0, 1.0, 0.0)
    }

    /// Identity mapping for the y coordinate.
    pub fn identity_y() -> Self {
        Self::affine(0.0, 0.0, 1.0)
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Evaluate at `(x, y)`.
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        self.terms
            .iter()
            .map(|t| t.coeff * x.powi(t.px as i32) * y.powi(t.py as i32))
            .sum()
    }
}
