//! Owen–Provan geodesic tree path (GTP) algorithm.
//!
//! Steps
//! 1. Classify edges: those compatible with the whole other tree are common,
//!    the rest are incompatible.
//! 2. Start from the cone path, the single ratio `(A, B)` of all
//!    incompatible edges.
//! 3. For each ratio solve the extension problem: a minimum-weight vertex
//!    cover `C1 ∪ D2` of the incompatibility graph with weights
//!    `|e|²/‖E‖²`, `|f|²/‖F‖²`. If it weighs `< 1`, replace the ratio by
//!    `(C1, D1), (C2, D2)` (the independent set `C2 ∪ D1` may coexist) and
//!    examine both halves again, first half first.
//! 4. Merge any neighbours left in descending order, so the sequence is
//!    non-descending even under rounding.

use super::cover::min_weight_cover;
use super::{common_and_leaf_sq, Geodesic, GeodesicEngine, GeodesicError, Ratio};
use crate::cfg::COVER_EPS;
use crate::tree::Tree;

/// Geodesic engine implementing the GTP algorithm. Stateless.
#[derive(Clone, Copy, Debug, Default)]
pub struct GtpEngine;

impl GeodesicEngine for GtpEngine {
    fn geodesic(&self, a: &Tree, b: &Tree) -> Result<Geodesic, GeodesicError> {
        if !a.same_leaf_set(b) {
            return Err(GeodesicError::LeafSetMismatch {
                a: a.n_leaves(),
                b: b.n_leaves(),
            });
        }
        let (common_a, inc_a): (Vec<usize>, Vec<usize>) =
            (0..a.edges().len()).partition(|&i| b.is_compatible_with(&a.edge(i).split));
        let (common_b, inc_b): (Vec<usize>, Vec<usize>) =
            (0..b.edges().len()).partition(|&j| a.is_compatible_with(&b.edge(j).split));

        let ratios = ratio_sequence(a, b, inc_a, inc_b);
        let mut sq = common_and_leaf_sq(a, b, &common_a, &common_b);
        for r in &ratios {
            sq += (r.e_length + r.f_length).powi(2);
        }
        Ok(Geodesic {
            distance: sq.sqrt(),
            ratios,
            common_a,
            common_b,
        })
    }
}

fn ratio_sequence(a: &Tree, b: &Tree, inc_a: Vec<usize>, inc_b: Vec<usize>) -> Vec<Ratio> {
    if inc_a.is_empty() && inc_b.is_empty() {
        return Vec::new();
    }
    let mut stack = vec![Ratio::new(a, b, inc_a, inc_b)];
    let mut done = Vec::new();
    while let Some(r) = stack.pop() {
        match split_ratio(a, b, &r) {
            Some((first, second)) => {
                stack.push(second);
                stack.push(first);
            }
            None => done.push(r),
        }
    }
    merge_descending(done)
}

/// Solve the extension problem for one ratio.
fn split_ratio(a: &Tree, b: &Tree, r: &Ratio) -> Option<(Ratio, Ratio)> {
    if r.e_length <= 0.0 || r.f_length <= 0.0 {
        return None;
    }
    if r.e_edges.len() < 2 && r.f_edges.len() < 2 {
        return None;
    }
    let (e2, f2) = (r.e_length * r.e_length, r.f_length * r.f_length);
    let wl: Vec<f64> = r.e_edges.iter().map(|&i| a.edge(i).length.powi(2) / e2).collect();
    let wr: Vec<f64> = r.f_edges.iter().map(|&j| b.edge(j).length.powi(2) / f2).collect();
    let adj: Vec<Vec<usize>> = r
        .e_edges
        .iter()
        .map(|&i| {
            let si = &a.edge(i).split;
            r.f_edges
                .iter()
                .enumerate()
                .filter(|(_, &j)| !si.is_compatible(&b.edge(j).split))
                .map(|(k, _)| k)
                .collect()
        })
        .collect();
    let cover = min_weight_cover(&wl, &wr, &adj);
    if cover.weight >= 1.0 - COVER_EPS {
        return None;
    }
    let mut c1 = Vec::new();
    let mut c2 = Vec::new();
    for (k, &i) in r.e_edges.iter().enumerate() {
        if cover.left[k] {
            c1.push(i);
        } else {
            c2.push(i);
        }
    }
    let mut d1 = Vec::new();
    let mut d2 = Vec::new();
    for (k, &j) in r.f_edges.iter().enumerate() {
        if cover.right[k] {
            d2.push(j);
        } else {
            d1.push(j);
        }
    }
    if c1.is_empty() || c2.is_empty() || d1.is_empty() || d2.is_empty() {
        return None;
    }
    Some((Ratio::new(a, b, c1, d1), Ratio::new(a, b, c2, d2)))
}

fn merge_descending(ratios: Vec<Ratio>) -> Vec<Ratio> {
    let mut out: Vec<Ratio> = Vec::with_capacity(ratios.len());
    for r in ratios {
        out.push(r);
        while out.len() >= 2 {
            let k = out.len();
            if out[k - 2].value() <= out[k - 1].value() {
                break;
            }
            let (Some(last), Some(prev)) = (out.pop(), out.pop()) else {
                break;
            };
            out.push(prev.merged(last));
        }
    }
    out
}
