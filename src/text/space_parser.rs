//! Tuple-entry parser for the textual transformation pipeline.
//!
//! A `SpaceParser` holds the comma-separated entries of one tuple,
//! verbatim.  The split/interchange transformations edit these entries
//! (`replace`, reordering); the polyhedral backend does the real
//! parsing when the map is rebuilt from its pieces.

use crate::polyhedral::parse::is_identifier;

/// The entries of one tuple, as raw text.
#[derive(Debug, Clone)]
pub struct SpaceParser {
    /// Tuple entries in order; identifiers or affine expressions.
    pub dimensions: Vec<String>,
    constraints: Vec<String>,
    fresh: usize,
}

impl SpaceParser {
    /// Split the inner text of a tuple (`"i, j"`) into entries.
    pub fn new(inner: &str) -> Self {
        let dimensions = inner
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            dimensions,
            constraints: Vec::new(),
            fresh: 0,
        }
    }

    /// Wrap an already-split entry list.
    pub fn from_dimensions(dimensions: Vec<String>) -> Self {
        Self {
            dimensions,
            constraints: Vec::new(),
            fresh: 0,
        }
    }

    /// Replace the entry equal to `old` with the two entries `new1`,
    /// `new2` (in place).  Used by split to turn one dimension into an
    /// outer/inner pair.
    pub fn replace(&mut self, old: &str, new1: &str, new2: &str) {
        let mut out = Vec::with_capacity(self.dimensions.len() + 1);
        for d in &self.dimensions {
            if d == old {
                out.push(new1.to_string());
                out.push(new2.to_string());
            } else {
                out.push(d.clone());
            }
        }
        self.dimensions = out;
    }

    /// Turn every non-identifier entry into a fresh dimension name plus
    /// an equality constraint pinning it to the original expression.
    pub fn fold_expressions(&mut self) {
        for i in 0..self.dimensions.len() {
            if is_identifier(&self.dimensions[i]) {
                continue;
            }
            let fresh = self.fresh_name();
            self.constraints
                .push(format!("{} = {}", fresh, self.dimensions[i]));
            self.dimensions[i] = fresh;
        }
    }

    fn fresh_name(&mut self) -> String {
        loop {
            let candidate = format!("e{}", self.fresh);
            self.fresh += 1;
            if !self.dimensions.iter().any(|d| d == &candidate) {
                return candidate;
            }
        }
    }

    pub fn add_constraint(&mut self, constraint: impl Into<String>) {
        self.constraints.push(constraint.into());
    }

    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    /// The entries re-joined with `", "`.
    pub fn get_str(&self) -> String {
        self.dimensions.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_rejoin() {
        let p = SpaceParser::new("i, j");
        assert_eq!(p.dimensions, vec!["i", "j"]);
        assert_eq!(p.get_str(), "i, j");
    }

    #[test]
    fn test_replace_expands_in_place() {
        let mut p = SpaceParser::new("i, j, k");
        p.replace("j", "c0", "c1");
        assert_eq!(p.get_str(), "i, c0, c1, k");
    }

    #[test]
    fn test_fold_expressions() {
        let mut p = SpaceParser::new("i, 2*i + 1");
        p.fold_expressions();
        assert_eq!(p.dimensions, vec!["i", "e0"]);
        assert_eq!(p.constraints(), &["e0 = 2*i + 1".to_string()]);
    }
}
