//! Phylogenetic trees as points of BHV space.
//!
//! Purpose
//! - Represent a tree on a fixed leaf set by its interior edges (each a
//!   `Split` with a length) plus one pendant-edge length per leaf.
//! - The order of `edges()` is stable and defines the interior-edge variable
//!   index space used by extension spaces and the solver.
//!
//! Conventions
//! - Splits are stored as given (either orientation). Lookups go through
//!   `find_edge`, which tries the exact side first and then the complement.
//! - `with_lengths` rebuilds a tree with the same topology; trees are never
//!   mutated in place once constructed.

pub mod newick;
mod split;

pub use split::Split;

use std::collections::{HashMap, HashSet};

use crate::cfg::LENGTH_EPS;

/// Errors raised when assembling a tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error("tree needs at least 3 leaves, got {0}")]
    TooFewLeaves(usize),
    #[error("duplicate leaf name `{0}`")]
    DuplicateLeaf(String),
    #[error("edge {edge} is defined over {got} leaves, tree has {expected}")]
    LeafCountMismatch {
        edge: usize,
        got: usize,
        expected: usize,
    },
    #[error("edge {0} is trivial (one side has fewer than two leaves)")]
    TrivialSplit(usize),
    #[error("edges {0} and {1} describe the same split")]
    DuplicateSplit(usize, usize),
    #[error("edges {0} and {1} are incompatible")]
    IncompatibleSplits(usize, usize),
    #[error("expected {expected} leaf-edge lengths, got {got}")]
    LeafLengthCount { expected: usize, got: usize },
    #[error("length {value} of {what} is not a finite non-negative number")]
    BadLength { what: String, value: f64 },
}

/// Interior edge: a split and its length.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub split: Split,
    pub length: f64,
}

impl Edge {
    #[inline]
    pub fn new(split: Split, length: f64) -> Self {
        Self { split, length }
    }
}

/// A tree with named leaves, interior edges and pendant-edge lengths.
///
/// Invariants (checked by `new`):
/// - at least 3 leaves, unique names;
/// - every split is non-trivial, over the same leaf count, pairwise
///   compatible and pairwise non-equivalent;
/// - all lengths finite and `>= -LENGTH_EPS`.
#[derive(Clone, Debug)]
pub struct Tree {
    leaves: Vec<String>,
    edges: Vec<Edge>,
    leaf_lengths: Vec<f64>,
    index: HashMap<Split, usize>,
}

impl Tree {
    pub fn new(
        leaves: Vec<String>,
        edges: Vec<Edge>,
        leaf_lengths: Vec<f64>,
    ) -> Result<Self, TreeError> {
        let n = leaves.len();
        if n < 3 {
            return Err(TreeError::TooFewLeaves(n));
        }
        let mut seen = HashSet::with_capacity(n);
        for name in &leaves {
            if !seen.insert(name.as_str()) {
                return Err(TreeError::DuplicateLeaf(name.clone()));
            }
        }
        if leaf_lengths.len() != n {
            return Err(TreeError::LeafLengthCount {
                expected: n,
                got: leaf_lengths.len(),
            });
        }
        for (i, &l) in leaf_lengths.iter().enumerate() {
            check_length(l, || format!("leaf `{}`", leaves[i]))?;
        }
        for (i, e) in edges.iter().enumerate() {
            if e.split.n_leaves() != n {
                return Err(TreeError::LeafCountMismatch {
                    edge: i,
                    got: e.split.n_leaves(),
                    expected: n,
                });
            }
            if e.split.is_trivial() {
                return Err(TreeError::TrivialSplit(i));
            }
            check_length(e.length, || format!("edge {i}"))?;
        }
        for i in 0..edges.len() {
            for j in (i + 1)..edges.len() {
                if edges[i].split.is_equivalent(&edges[j].split) {
                    return Err(TreeError::DuplicateSplit(i, j));
                }
                if !edges[i].split.is_compatible(&edges[j].split) {
                    return Err(TreeError::IncompatibleSplits(i, j));
                }
            }
        }
        let index = build_index(&edges);
        Ok(Self {
            leaves,
            edges,
            leaf_lengths,
            index,
        })
    }

    /// Same topology and leaves, new lengths.
    ///
    /// Lengths are not validated here: the solver produces them from a
    /// feasible point and probes may sit a rounding error below zero.
    pub fn with_lengths(&self, lengths: &[f64], leaf_lengths: &[f64]) -> Self {
        debug_assert_eq!(lengths.len(), self.edges.len());
        debug_assert_eq!(leaf_lengths.len(), self.leaves.len());
        let edges = self
            .edges
            .iter()
            .zip(lengths)
            .map(|(e, &l)| Edge::new(e.split.clone(), l))
            .collect();
        Self {
            leaves: self.leaves.clone(),
            edges,
            leaf_lengths: leaf_lengths.to_vec(),
            index: self.index.clone(),
        }
    }

    #[inline]
    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }

    #[inline]
    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn edge(&self, i: usize) -> &Edge {
        &self.edges[i]
    }

    #[inline]
    pub fn leaf_lengths(&self) -> &[f64] {
        &self.leaf_lengths
    }

    /// Interior edge lengths in edge order.
    pub fn lengths(&self) -> Vec<f64> {
        self.edges.iter().map(|e| e.length).collect()
    }

    pub fn leaf_index(&self, name: &str) -> Option<usize> {
        self.leaves.iter().position(|l| l == name)
    }

    /// Index of the edge whose stored side equals `split` exactly.
    #[inline]
    pub fn edge_index(&self, split: &Split) -> Option<usize> {
        self.index.get(split).copied()
    }

    /// Index of the edge describing `split`, trying the complement when the
    /// exact side is not stored.
    pub fn find_edge(&self, split: &Split) -> Option<usize> {
        self.edge_index(split)
            .or_else(|| self.edge_index(&split.complement()))
    }

    /// Length of `split` in this tree; 0 when the tree does not contain it.
    pub fn length_of(&self, split: &Split) -> f64 {
        self.find_edge(split).map_or(0.0, |i| self.edges[i].length)
    }

    /// Whether `split` can be added to this tree without conflicts.
    pub fn is_compatible_with(&self, split: &Split) -> bool {
        self.edges.iter().all(|e| e.split.is_compatible(split))
    }

    /// Same leaf names in the same order.
    pub fn same_leaf_set(&self, other: &Tree) -> bool {
        self.leaves == other.leaves
    }
}

fn build_index(edges: &[Edge]) -> HashMap<Split, usize> {
    edges
        .iter()
        .enumerate()
        .map(|(i, e)| (e.split.clone(), i))
        .collect()
}

fn check_length(value: f64, what: impl FnOnce() -> String) -> Result<(), TreeError> {
    if value.is_finite() && value >= -LENGTH_EPS {
        Ok(())
    } else {
        Err(TreeError::BadLength {
            what: what(),
            value,
        })
    }
}

#[cfg(test)]
mod tests;
