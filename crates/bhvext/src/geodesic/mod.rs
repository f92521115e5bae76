//! Geodesics between two trees in BHV space.
//!
//! Purpose
//! - Define the oracle interface the distance solver consumes
//!   (`GeodesicEngine`) and the data it returns (`Geodesic`, `Ratio`).
//! - Ship one engine, `GtpEngine`, implementing the polynomial-time
//!   algorithm of Owen and Provan.
//!
//! Model
//! - Edges of tree A that are compatible with every edge of tree B are
//!   *common*: either B has the same split (matched with complement
//!   fallback), or B lacks it and its length there is 0. Same for B.
//! - The remaining edges are split into a ratio sequence `(E_i, F_i)`; the
//!   path drops `E_1` while growing `F_1`, then `E_2`/`F_2`, and so on, with
//!   `‖E_i‖/‖F_i‖` non-descending.
//! - Squared length:
//!   `Σ (‖E_i‖+‖F_i‖)² + Σ_common (ℓ_A−ℓ_B)² + Σ_leaves (ℓ_A−ℓ_B)²`.
//!
//! References
//! - M. Owen, J. S. Provan, "A fast algorithm for computing geodesic
//!   distances in tree space", IEEE/ACM TCBB 8(1), 2011.

mod cover;
mod gtp;

pub use gtp::GtpEngine;

use crate::tree::{Split, Tree};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeodesicError {
    #[error("trees are over different leaf sets ({a} and {b} leaves)")]
    LeafSetMismatch { a: usize, b: usize },
}

/// Oracle returning the geodesic between two trees on the same leaf set.
///
/// Implementations must be deterministic and free of side effects: the
/// solver calls them repeatedly inside its line search.
pub trait GeodesicEngine {
    fn geodesic(&self, a: &Tree, b: &Tree) -> Result<Geodesic, GeodesicError>;
}

impl<G: GeodesicEngine + ?Sized> GeodesicEngine for &G {
    fn geodesic(&self, a: &Tree, b: &Tree) -> Result<Geodesic, GeodesicError> {
        (**self).geodesic(a, b)
    }
}

/// One step of a ratio sequence. Edge lists index into the edges of the
/// respective trees; lengths are Euclidean norms of those edges.
#[derive(Clone, Debug, PartialEq)]
pub struct Ratio {
    pub e_edges: Vec<usize>,
    pub f_edges: Vec<usize>,
    pub e_length: f64,
    pub f_length: f64,
}

impl Ratio {
    pub fn new(a: &Tree, b: &Tree, e_edges: Vec<usize>, f_edges: Vec<usize>) -> Self {
        let e_length = norm(e_edges.iter().map(|&i| a.edge(i).length));
        let f_length = norm(f_edges.iter().map(|&j| b.edge(j).length));
        Self {
            e_edges,
            f_edges,
            e_length,
            f_length,
        }
    }

    /// `‖E‖/‖F‖`; `+∞` when `‖F‖ = 0`.
    pub fn value(&self) -> f64 {
        if self.f_length == 0.0 {
            if self.e_length == 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            self.e_length / self.f_length
        }
    }

    fn merged(mut self, other: Ratio) -> Ratio {
        self.e_edges.extend(other.e_edges);
        self.f_edges.extend(other.f_edges);
        self.e_length = self.e_length.hypot(other.e_length);
        self.f_length = self.f_length.hypot(other.f_length);
        self
    }
}

/// Geodesic between tree A and tree B.
#[derive(Clone, Debug, PartialEq)]
pub struct Geodesic {
    pub distance: f64,
    pub ratios: Vec<Ratio>,
    /// Common edges, as indices into A's edges.
    pub common_a: Vec<usize>,
    /// Common edges, as indices into B's edges.
    pub common_b: Vec<usize>,
}

impl Geodesic {
    /// Every common split once. A split shared by both trees is reported on
    /// both sides, possibly with opposite orientations; equivalent splits
    /// are merged here so callers never count an edge twice.
    pub fn common_splits(&self, a: &Tree, b: &Tree) -> Vec<Split> {
        dedup_equivalent(
            self.common_a
                .iter()
                .map(|&i| a.edge(i).split.clone())
                .chain(self.common_b.iter().map(|&j| b.edge(j).split.clone())),
        )
    }
}

/// Keep the first of every group of equivalent splits, preserving order.
pub fn dedup_equivalent<I: IntoIterator<Item = Split>>(splits: I) -> Vec<Split> {
    let mut out: Vec<Split> = Vec::new();
    for s in splits {
        if !out.iter().any(|o| o.is_equivalent(&s)) {
            out.push(s);
        }
    }
    out
}

/// Squared-length contribution of everything outside the ratio sequence.
pub(crate) fn common_and_leaf_sq(
    a: &Tree,
    b: &Tree,
    common_a: &[usize],
    common_b: &[usize],
) -> f64 {
    let mut sq = 0.0;
    for &i in common_a {
        let e = a.edge(i);
        let d = e.length - b.length_of(&e.split);
        sq += d * d;
    }
    for &j in common_b {
        let f = b.edge(j);
        if a.find_edge(&f.split).is_none() {
            sq += f.length * f.length;
        }
    }
    for (x, y) in a.leaf_lengths().iter().zip(b.leaf_lengths()) {
        sq += (x - y) * (x - y);
    }
    sq
}

#[inline]
fn norm<I: Iterator<Item = f64>>(xs: I) -> f64 {
    xs.map(|x| x * x).sum::<f64>().sqrt()
}
