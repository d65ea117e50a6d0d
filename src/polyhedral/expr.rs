//! Affine expressions over dimension variables and symbolic parameters.
//!
//! An expression is `constant + sum(coeffs[i] * dim_i) + sum(param_coeffs[j] * param_j)`.
//! Dimension variables are indexed positionally; for maps the layout is
//! inputs first, then outputs.

use num_integer::Integer;
use serde::{Deserialize, Serialize};

/// An affine expression with integer coefficients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffineExpr {
    /// Constant term
    pub constant: i64,
    /// Coefficients of the dimension variables
    pub coeffs: Vec<i64>,
    /// Coefficients of the symbolic parameters
    pub param_coeffs: Vec<i64>,
}

impl AffineExpr {
    /// The zero expression in a space with `n_dim` dimensions and
    /// `n_param` parameters.
    pub fn zero(n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: 0,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// A constant expression.
    pub fn constant(value: i64, n_dim: usize, n_param: usize) -> Self {
        let mut e = Self::zero(n_dim, n_param);
        e.constant = value;
        e
    }

    /// The expression consisting of a single dimension variable.
    pub fn var(index: usize, n_dim: usize, n_param: usize) -> Self {
        let mut e = Self::zero(n_dim, n_param);
        e.coeffs[index] = 1;
        e
    }

    /// The expression consisting of a single parameter.
    pub fn param(index: usize, n_dim: usize, n_param: usize) -> Self {
        let mut e = Self::zero(n_dim, n_param);
        e.param_coeffs[index] = 1;
        e
    }

    pub fn n_dim(&self) -> usize {
        self.coeffs.len()
    }

    pub fn n_param(&self) -> usize {
        self.param_coeffs.len()
    }

    /// True if no dimension or parameter has a nonzero coefficient.
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0) && self.param_coeffs.iter().all(|&c| c == 0)
    }

    pub fn as_constant(&self) -> Option<i64> {
        if self.is_constant() {
            Some(self.constant)
        } else {
            None
        }
    }

    /// True if `dim` is the only dimension with a nonzero coefficient
    /// (parameters may still appear).
    pub fn is_single_dim(&self, dim: usize) -> bool {
        self.coeffs
            .iter()
            .enumerate()
            .all(|(i, &c)| i == dim || c == 0)
    }

    pub fn add(&self, other: &AffineExpr) -> AffineExpr {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        assert_eq!(self.param_coeffs.len(), other.param_coeffs.len());
        AffineExpr {
            constant: self.constant + other.constant,
            coeffs: self
                .coeffs
                .iter()
                .zip(&other.coeffs)
                .map(|(a, b)| a + b)
                .collect(),
            param_coeffs: self
                .param_coeffs
                .iter()
                .zip(&other.param_coeffs)
                .map(|(a, b)| a + b)
                .collect(),
        }
    }

    pub fn sub(&self, other: &AffineExpr) -> AffineExpr {
        self.add(&other.scale(-1))
    }

    pub fn scale(&self, factor: i64) -> AffineExpr {
        AffineExpr {
            constant: self.constant * factor,
            coeffs: self.coeffs.iter().map(|c| c * factor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|c| c * factor).collect(),
        }
    }

    pub fn neg(&self) -> AffineExpr {
        self.scale(-1)
    }

    /// Replace `dim` by `replacement` (which must not itself mention `dim`).
    pub fn substitute_dim(&self, dim: usize, replacement: &AffineExpr) -> AffineExpr {
        debug_assert_eq!(replacement.coeffs[dim], 0);
        let c = self.coeffs[dim];
        if c == 0 {
            return self.clone();
        }
        let mut out = self.add(&replacement.scale(c));
        out.coeffs[dim] = 0;
        out
    }

    /// Gcd of all dimension and parameter coefficients (0 if none are
    /// nonzero).
    pub fn content(&self) -> i64 {
        let mut g: i64 = 0;
        for &c in self.coeffs.iter().chain(self.param_coeffs.iter()) {
            g = g.gcd(&c);
        }
        g
    }

    pub fn evaluate(&self, dims: &[i64], params: &[i64]) -> i64 {
        assert_eq!(dims.len(), self.coeffs.len());
        assert_eq!(params.len(), self.param_coeffs.len());
        let mut v = self.constant;
        for (c, x) in self.coeffs.iter().zip(dims) {
            v += c * x;
        }
        for (c, x) in self.param_coeffs.iter().zip(params) {
            v += c * x;
        }
        v
    }

    /// Insert `count` zero-coefficient dimensions at variable index `at`.
    pub fn insert_dims(&mut self, at: usize, count: usize) {
        for _ in 0..count {
            self.coeffs.insert(at, 0);
        }
    }

    /// Remap parameter coefficients into a wider parameter list.
    pub fn remap_params(&mut self, remap: &[usize], new_n_param: usize) {
        let mut coeffs = vec![0; new_n_param];
        for (old, &new) in remap.iter().enumerate() {
            coeffs[new] += self.param_coeffs[old];
        }
        self.param_coeffs = coeffs;
    }

    /// Render with the given dimension and parameter names, e.g.
    /// `2*c0 + c1 - 3`.  Re-parses under the same names.
    pub fn display_with(&self, dim_names: &[String], param_names: &[String]) -> String {
        assert_eq!(dim_names.len(), self.coeffs.len());
        assert_eq!(param_names.len(), self.param_coeffs.len());
        let mut parts: Vec<String> = Vec::new();
        let named = self
            .coeffs
            .iter()
            .zip(dim_names)
            .chain(self.param_coeffs.iter().zip(param_names));
        for (&c, name) in named {
            match c {
                0 => {}
                1 => parts.push(name.clone()),
                -1 => parts.push(format!("-{}", name)),
                _ => parts.push(format!("{}*{}", c, name)),
            }
        }
        if self.constant != 0 || parts.is_empty() {
            parts.push(self.constant.to_string());
        }
        parts.join(" + ").replace("+ -", "- ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_arithmetic() {
        let i = AffineExpr::var(0, 2, 1);
        let j = AffineExpr::var(1, 2, 1);
        let e = i.scale(2).add(&j).add(&AffineExpr::constant(-3, 2, 1));
        assert_eq!(e.coeffs, vec![2, 1]);
        assert_eq!(e.constant, -3);
        assert_eq!(e.evaluate(&[5, 1], &[0]), 8);
    }

    #[test]
    fn test_substitute_dim() {
        // i with i := 2*c0 + c1 over dims (i, c0, c1)
        let e = AffineExpr::var(0, 3, 0).scale(3);
        let mut repl = AffineExpr::zero(3, 0);
        repl.coeffs[1] = 2;
        repl.coeffs[2] = 1;
        let out = e.substitute_dim(0, &repl);
        assert_eq!(out.coeffs, vec![0, 6, 3]);
    }

    #[test]
    fn test_content() {
        let mut e = AffineExpr::zero(2, 1);
        e.coeffs = vec![4, -6];
        e.param_coeffs = vec![0];
        e.constant = 7;
        assert_eq!(e.content(), 2);
    }

    #[test]
    fn test_display_with() {
        let mut e = AffineExpr::zero(2, 1);
        e.coeffs = vec![2, -1];
        e.param_coeffs = vec![1];
        e.constant = -1;
        let s = e.display_with(&names(&["c0", "c1"]), &names(&["N"]));
        assert_eq!(s, "2*c0 - c1 + N - 1");
    }

    #[test]
    fn test_display_zero() {
        let e = AffineExpr::zero(1, 0);
        assert_eq!(e.display_with(&names(&["i"]), &[]), "0");
    }
}
