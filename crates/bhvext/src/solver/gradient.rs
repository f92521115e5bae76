//! Gradient of the squared geodesic length, per side.
//!
//! Contributions
//! - ratio `(E, F)`: an edge `e ∈ E` gets `|e|·(1 + ‖F‖/‖E‖)`, or `‖F‖`
//!   when `‖E‖ = 0`; symmetric for `F`;
//! - common edge: own length minus the matching length on the other side
//!   (0 when the other tree lacks the split);
//! - original leaf variable (unrestricted layout): own leaf length minus the
//!   other side's.

use nalgebra::DVector;

use super::partition::{Rows, SidePartition};
use super::{Frame, Side};
use crate::geodesic::Geodesic;
use crate::tree::Tree;

/// Full gradient vectors `[g_A, g_B]` at the point `trees`.
pub(crate) fn full(frame: &Frame<'_>, trees: [&Tree; 2], geo: &Geodesic) -> [DVector<f64>; 2] {
    let [a, b] = trees;
    let [lay_a, lay_b] = frame.layouts;
    let mut ga = DVector::zeros(lay_a.len());
    let mut gb = DVector::zeros(lay_b.len());

    for r in &geo.ratios {
        for &i in &r.e_edges {
            ga[lay_a.interior(i)] += if r.e_length == 0.0 {
                r.f_length
            } else {
                a.edge(i).length * (1.0 + r.f_length / r.e_length)
            };
        }
        for &j in &r.f_edges {
            gb[lay_b.interior(j)] += if r.f_length == 0.0 {
                r.e_length
            } else {
                b.edge(j).length * (1.0 + r.e_length / r.f_length)
            };
        }
    }

    for &i in &geo.common_a {
        let e = a.edge(i);
        ga[lay_a.interior(i)] += e.length - b.length_of(&e.split);
    }
    for &j in &geo.common_b {
        let f = b.edge(j);
        gb[lay_b.interior(j)] += f.length - a.length_of(&f.split);
    }

    add_leaf_terms(&mut ga, frame, Side::A, a, b);
    add_leaf_terms(&mut gb, frame, Side::B, b, a);
    [ga, gb]
}

fn add_leaf_terms(g: &mut DVector<f64>, frame: &Frame<'_>, side: Side, own: &Tree, other: &Tree) {
    let originals = frame.spaces[side.idx()].original_leaves();
    for k in 0..frame.layouts[side.idx()].leaf_vars() {
        let leaf = originals[k];
        g[k] += own.leaf_lengths()[leaf] - other.leaf_lengths()[leaf];
    }
}

/// `g[v] - g[basic of v's row]` for each of `vars`.
pub(crate) fn reduced(
    g: &DVector<f64>,
    rows: &Rows,
    part: &SidePartition,
    vars: &[usize],
) -> DVector<f64> {
    DVector::from_iterator(
        vars.len(),
        vars.iter().map(|&v| {
            let basic = part.basic_of(rows, v).unwrap_or(v);
            g[v] - g[basic]
        }),
    )
}

/// Largest absolute entry over both blocks (0 for empty blocks).
pub(crate) fn max_abs(blocks: &[DVector<f64>; 2]) -> f64 {
    blocks
        .iter()
        .flat_map(|b| b.iter())
        .fold(0.0, |m: f64, x| m.max(x.abs()))
}
