//! Spaces: the named shape of a set or map.
//!
//! A set space has symbolic parameters and one output tuple
//! (`[N] -> { S[i, j] }`); a map space additionally has an input tuple
//! (`{ S[i, j] -> [c0, c1] }`).  Tuple names are optional: the
//! time-processor space is anonymous.  Output dimensions may also be
//! individually anonymous (empty name), in which case they print as the
//! affine expression an equality constraint binds them to.

use serde::{Deserialize, Serialize};

/// The shape of a set or map: parameter names, optional input tuple,
/// output tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    params: Vec<String>,
    in_name: Option<String>,
    in_dims: Vec<String>,
    out_name: Option<String>,
    /// Empty string means the dimension is anonymous.
    out_dims: Vec<String>,
    map: bool,
}

impl Space {
    /// Space of a set: one (optionally named) tuple.
    pub fn set_space(name: Option<&str>, dims: Vec<String>, params: Vec<String>) -> Self {
        Self {
            params,
            in_name: None,
            in_dims: Vec::new(),
            out_name: name.map(|s| s.to_string()),
            out_dims: dims,
            map: false,
        }
    }

    /// Space of a map: input tuple and output tuple.
    pub fn map_space(
        in_name: Option<&str>,
        in_dims: Vec<String>,
        out_name: Option<&str>,
        out_dims: Vec<String>,
        params: Vec<String>,
    ) -> Self {
        Self {
            params,
            in_name: in_name.map(|s| s.to_string()),
            in_dims,
            out_name: out_name.map(|s| s.to_string()),
            out_dims,
            map: true,
        }
    }

    pub fn is_map(&self) -> bool {
        self.map
    }

    pub fn n_in(&self) -> usize {
        self.in_dims.len()
    }

    pub fn n_out(&self) -> usize {
        self.out_dims.len()
    }

    /// Total number of variable dimensions (inputs first, then outputs).
    pub fn n_dim(&self) -> usize {
        self.in_dims.len() + self.out_dims.len()
    }

    pub fn n_param(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn in_name(&self) -> Option<&str> {
        self.in_name.as_deref()
    }

    pub fn out_name(&self) -> Option<&str> {
        self.out_name.as_deref()
    }

    pub fn in_dims(&self) -> &[String] {
        &self.in_dims
    }

    pub fn out_dims(&self) -> &[String] {
        &self.out_dims
    }

    pub fn set_in_name(&mut self, name: Option<&str>) {
        self.in_name = name.map(|s| s.to_string());
    }

    pub fn set_out_name(&mut self, name: Option<&str>) {
        self.out_name = name.map(|s| s.to_string());
    }

    pub(crate) fn set_params(&mut self, params: Vec<String>) {
        self.params = params;
    }

    /// Variable index of output dimension `i` in the concatenated
    /// (inputs, outputs) layout.
    pub fn out_var(&self, i: usize) -> usize {
        debug_assert!(i < self.out_dims.len());
        self.in_dims.len() + i
    }

    /// All dimension names in variable-index order (inputs, then outputs).
    pub fn dim_names(&self) -> Vec<String> {
        let mut names = self.in_dims.clone();
        names.extend(self.out_dims.iter().cloned());
        names
    }

    /// Insert `count` anonymous output dimensions at output position `at`.
    pub fn insert_out_dims(&mut self, at: usize, count: usize) {
        debug_assert!(at <= self.out_dims.len());
        for _ in 0..count {
            self.out_dims.insert(at, String::new());
        }
    }

    /// The set space formed by this map's input tuple.
    pub fn domain_space(&self) -> Space {
        debug_assert!(self.map);
        Space::set_space(self.in_name(), self.in_dims.clone(), self.params.clone())
    }

    /// The set space formed by this map's output tuple.
    pub fn range_space(&self) -> Space {
        debug_assert!(self.map);
        Space::set_space(self.out_name(), self.out_dims.clone(), self.params.clone())
    }
}

/// Union of two parameter name lists: `a`'s names in order, then `b`'s
/// names not already present.  Returns the merged list and, for each
/// input list, the mapping from old index to merged index.
pub(crate) fn merge_param_names(
    a: &[String],
    b: &[String],
) -> (Vec<String>, Vec<usize>, Vec<usize>) {
    let mut merged: Vec<String> = a.to_vec();
    let remap_a: Vec<usize> = (0..a.len()).collect();
    let mut remap_b = Vec::with_capacity(b.len());
    for name in b {
        match merged.iter().position(|m| m == name) {
            Some(i) => remap_b.push(i),
            None => {
                merged.push(name.clone());
                remap_b.push(merged.len() - 1);
            }
        }
    }
    (merged, remap_a, remap_b)
}
