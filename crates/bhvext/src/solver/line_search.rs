//! Exact line search along a feasible direction.
//!
//! `tau_max` is the first step at which some variable reaches 0. If the
//! objective still decreases just below `tau_max` and the full step does
//! not end higher than it started, the step goes all the way (a boundary
//! hit); otherwise the slope is bisected on `[0, tau_max]` until it is small
//! relative to the slope at the start.

use nalgebra::DVector;
use tracing::{debug, trace, warn};

use super::partition::{Partition, Status};
use super::{Frame, Side, SolveCfg};
use crate::cfg::SLOPE_EPS;
use crate::geodesic::{Geodesic, GeodesicEngine, GeodesicError};
use crate::tree::Tree;

/// First blocking step and every variable reaching zero there.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Blocking {
    pub tau_max: f64,
    pub candidates: Vec<(Side, usize)>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Step {
    /// Step to `tau_max`; one of `candidates` must become Nonbasic.
    Boundary { tau: f64, candidates: Vec<(Side, usize)> },
    /// Minimum strictly inside the feasible segment.
    Interior { tau: f64, bisections: usize },
}

/// Directional derivative of `d²/2` plus the summed magnitude of its terms,
/// which bounds the rounding error in `value`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Slope {
    pub value: f64,
    pub scale: f64,
}

impl Slope {
    /// Clearly negative, not just rounding noise.
    pub fn is_descent(&self) -> bool {
        self.value < -SLOPE_EPS * self.scale
    }

    pub fn is_flat(&self) -> bool {
        self.value.abs() <= SLOPE_EPS * self.scale
    }
}

/// Objective value and slope where the line starts.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Origin {
    pub distance: f64,
    pub slope: Slope,
}

/// Ratio test over both sides. `None` when no component decreases.
pub(crate) fn blocking(
    values: &[DVector<f64>; 2],
    dirs: &[DVector<f64>; 2],
    partition: &Partition,
    tie_rel: f64,
) -> Option<Blocking> {
    let mut best: Option<Blocking> = None;
    for side in Side::BOTH {
        let (x, d) = (&values[side.idx()], &dirs[side.idx()]);
        for v in 0..d.len() {
            if d[v] >= 0.0 {
                continue;
            }
            let r = (-x[v] / d[v]).max(0.0);
            let nonbasic = partition.side(side).status(v) == Some(Status::Nonbasic);
            if nonbasic {
                warn!(%side, var = v, "candidate is already nonbasic");
            }
            let tie = best.as_ref().is_some_and(|b| {
                (r - b.tau_max).abs() <= tie_rel * b.tau_max.max(f64::MIN_POSITIVE)
            });
            let better = best.as_ref().map_or(true, |b| r < b.tau_max);
            if tie {
                if let (false, Some(b)) = (nonbasic, best.as_mut()) {
                    b.candidates.push((side, v));
                }
            } else if better {
                best = Some(Blocking {
                    tau_max: r,
                    candidates: if nonbasic { Vec::new() } else { vec![(side, v)] },
                });
            }
        }
    }
    best
}

/// Slope of half the squared geodesic length along `dirs` at `trees`.
pub(crate) fn slope(
    frame: &Frame<'_>,
    trees: [&Tree; 2],
    geo: &Geodesic,
    dirs: &[DVector<f64>; 2],
) -> Slope {
    let [a, b] = trees;
    let [lay_a, lay_b] = frame.layouts;
    let [da, db] = dirs;
    let (mut value, mut scale) = (0.0, 0.0);

    for r in &geo.ratios {
        if r.e_length > 0.0 {
            let factor = 1.0 + r.f_length / r.e_length;
            for &i in &r.e_edges {
                let t = da[lay_a.interior(i)] * a.edge(i).length * factor;
                value += t;
                scale += t.abs();
            }
        }
        if r.f_length > 0.0 {
            let factor = 1.0 + r.e_length / r.f_length;
            for &j in &r.f_edges {
                let t = db[lay_b.interior(j)] * b.edge(j).length * factor;
                value += t;
                scale += t.abs();
            }
        }
    }

    for split in geo.common_splits(a, b) {
        let (dir_a, len_a) = a
            .find_edge(&split)
            .map_or((0.0, 0.0), |i| (da[lay_a.interior(i)], a.edge(i).length));
        let (dir_b, len_b) = b
            .find_edge(&split)
            .map_or((0.0, 0.0), |j| (db[lay_b.interior(j)], b.edge(j).length));
        value += (dir_a - dir_b) * (len_a - len_b);
        scale += (dir_a.abs() + dir_b.abs()) * (len_a + len_b);
    }

    for (side, own, other, d) in [(Side::A, a, b, da), (Side::B, b, a, db)] {
        let originals = frame.spaces[side.idx()].original_leaves();
        for k in 0..frame.layouts[side.idx()].leaf_vars() {
            let (x, y) = (own.leaf_lengths()[originals[k]], other.leaf_lengths()[originals[k]]);
            value += d[k] * (x - y);
            scale += d[k].abs() * (x + y);
        }
    }
    Slope { value, scale }
}

/// Trial point `values + tau·dirs` as trees.
fn trial(
    frame: &Frame<'_>,
    values: &[DVector<f64>; 2],
    dirs: &[DVector<f64>; 2],
    tau: f64,
) -> [Tree; 2] {
    Side::BOTH.map(|side| {
        let i = side.idx();
        let x = &values[i] + &dirs[i] * tau;
        frame.layouts[i].tree(frame.spaces[i], &x)
    })
}

fn slope_at<G: GeodesicEngine>(
    engine: &G,
    frame: &Frame<'_>,
    values: &[DVector<f64>; 2],
    dirs: &[DVector<f64>; 2],
    tau: f64,
) -> Result<Slope, GeodesicError> {
    let [ta, tb] = trial(frame, values, dirs, tau);
    let geo = engine.geodesic(&ta, &tb)?;
    Ok(slope(frame, [&ta, &tb], &geo, dirs))
}

fn distance_at<G: GeodesicEngine>(
    engine: &G,
    frame: &Frame<'_>,
    values: &[DVector<f64>; 2],
    dirs: &[DVector<f64>; 2],
    tau: f64,
) -> Result<f64, GeodesicError> {
    let [ta, tb] = trial(frame, values, dirs, tau);
    Ok(engine.geodesic(&ta, &tb)?.distance)
}

/// Locate the step along `dirs` given the blocking step. `origin.slope` must
/// be a descent slope.
pub(crate) fn search<G: GeodesicEngine>(
    engine: &G,
    frame: &Frame<'_>,
    cfg: &SolveCfg,
    values: &[DVector<f64>; 2],
    dirs: &[DVector<f64>; 2],
    origin: Origin,
    block: Blocking,
) -> Result<Step, GeodesicError> {
    let Blocking {
        tau_max,
        candidates,
    } = block;
    let probe = tau_max * (1.0 - cfg.eps_probe);
    let s = slope_at(engine, frame, values, dirs, probe)?;
    if s.value <= 0.0 {
        let end = distance_at(engine, frame, values, dirs, tau_max)?;
        if end <= origin.distance * (1.0 + 4.0 * f64::EPSILON) {
            return Ok(Step::Boundary {
                tau: tau_max,
                candidates,
            });
        }
        debug!(tau_max, end, start = origin.distance, "boundary step rises, bisecting");
    }

    let target = cfg.eps_deriv * origin.slope.value.abs();
    let (mut lo, mut hi) = (0.0, tau_max);
    let mut tau = 0.5 * (lo + hi);
    let mut bisections = 0;
    loop {
        let s = slope_at(engine, frame, values, dirs, tau)?;
        bisections += 1;
        trace!(bisections, tau, slope = s.value, "bisection");
        if s.value.abs() <= target || s.is_flat() {
            break;
        }
        if s.value > 0.0 {
            hi = tau;
        } else {
            lo = tau;
        }
        let mid = 0.5 * (lo + hi);
        if bisections >= cfg.max_bisections || mid <= lo || mid >= hi {
            warn!(bisections, tau, slope = s.value, "bisection stalled");
            break;
        }
        tau = mid;
    }
    Ok(Step::Interior { tau, bisections })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{ConstraintRow, ExtensionSpace, Member, VarLayout};
    use crate::geodesic::GtpEngine;
    use crate::solver::gradient;
    use crate::solver::partition::Rows;
    use crate::tree::newick::parse;
    use crate::tree::{Edge, Split};

    fn partition() -> (Partition, [Rows; 2]) {
        let t = parse("((a:1,b:1):0.5,c:1,(d:1,e:1):0.5);").unwrap();
        let space = ExtensionSpace::new(
            t,
            vec![ConstraintRow::new(
                vec![Member::Interior(0), Member::Interior(1)],
                1.0,
            )],
            vec![],
        )
        .unwrap();
        let layout = VarLayout::new(&space, true).unwrap();
        let rows = [Rows::new(&space, &layout), Rows::new(&space, &layout)];
        (Partition::from_rows(&rows), rows)
    }

    /// Six leaves. Both trees hold the split {t0,t1}, stored as {t0,t1} in A
    /// and as {t2,t3,t4,t5} in B; {t0,t1,t2} and {t0,t1,t3} conflict.
    fn flipped_pair() -> (ExtensionSpace, ExtensionSpace) {
        let names: Vec<String> = (0..6).map(|i| format!("t{i}")).collect();
        let sp = |s: &[usize]| Split::from_leaves(6, s.iter().copied());
        let ta = Tree::new(
            names.clone(),
            vec![Edge::new(sp(&[0, 1]), 0.5), Edge::new(sp(&[0, 1, 2]), 0.4)],
            vec![1.0; 6],
        )
        .unwrap();
        let tb = Tree::new(
            names,
            vec![Edge::new(sp(&[2, 3, 4, 5]), 0.2), Edge::new(sp(&[0, 1, 3]), 0.6)],
            vec![0.7, 1.0, 1.0, 1.0, 1.0, 1.0],
        )
        .unwrap();
        let row = |fixed| {
            vec![ConstraintRow::new(
                vec![Member::Interior(0), Member::Interior(1), Member::Leaf(0)],
                fixed,
            )]
        };
        let a = ExtensionSpace::new(ta, row(1.9), vec![0]).unwrap();
        let b = ExtensionSpace::new(tb, row(1.5), vec![0]).unwrap();
        (a, b)
    }

    #[test]
    fn blocking_picks_the_first_zero_crossing() {
        let (p, _) = partition();
        let values = [DVector::from_vec(vec![0.5, 0.5]), DVector::from_vec(vec![0.2, 0.8])];
        let dirs = [DVector::from_vec(vec![-1.0, 1.0]), DVector::from_vec(vec![1.0, -1.0])];
        let b = blocking(&values, &dirs, &p, 1e-12).unwrap();
        assert!((b.tau_max - 0.5).abs() < 1e-15);
        assert_eq!(b.candidates, vec![(Side::A, 0)]);
    }

    #[test]
    fn blocking_collects_ties_across_sides() {
        let (p, _) = partition();
        let values = [DVector::from_vec(vec![0.5, 0.5]), DVector::from_vec(vec![0.5, 0.5])];
        let dirs = [DVector::from_vec(vec![-1.0, 1.0]), DVector::from_vec(vec![1.0, -1.0])];
        let b = blocking(&values, &dirs, &p, 1e-12).unwrap();
        assert_eq!(b.candidates, vec![(Side::A, 0), (Side::B, 1)]);
    }

    #[test]
    fn no_decreasing_component_means_no_block() {
        let (p, _) = partition();
        let values = [DVector::from_vec(vec![0.5, 0.5]), DVector::from_vec(vec![0.5, 0.5])];
        let zero = [DVector::zeros(2), DVector::zeros(2)];
        assert!(blocking(&values, &zero, &p, 1e-12).is_none());
    }

    #[test]
    fn slope_matches_finite_difference_with_flipped_common_split() {
        let (a, b) = flipped_pair();
        let cfg = SolveCfg::default().with_restricted(false);
        let frame = Frame::new(&a, &b, &cfg).unwrap();
        let values = [
            frame.layouts[0].values(&a, a.start()),
            frame.layouts[1].values(&b, b.start()),
        ];
        // Layout per side: leaf t0, then the two interior edges.
        let dirs = [
            DVector::from_vec(vec![0.3, -0.2, 0.5]),
            DVector::from_vec(vec![-0.4, 0.1, 0.25]),
        ];
        let [ta, tb] = trial(&frame, &values, &dirs, 0.0);
        let geo = GtpEngine.geodesic(&ta, &tb).unwrap();
        assert_eq!(geo.common_a, vec![0]);
        assert_eq!(geo.common_b, vec![0]);
        assert_eq!(geo.common_splits(&ta, &tb).len(), 1);

        let s = slope(&frame, [&ta, &tb], &geo, &dirs);
        let half_sq = |tau: f64| {
            let d = distance_at(&GtpEngine, &frame, &values, &dirs, tau).unwrap();
            0.5 * d * d
        };
        let h = 1e-6;
        let fd = (half_sq(h) - half_sq(-h)) / (2.0 * h);
        assert!((s.value - fd).abs() < 1e-7, "slope {} vs difference {}", s.value, fd);

        let g = gradient::full(&frame, [&ta, &tb], &geo);
        let along = g[0].dot(&dirs[0]) + g[1].dot(&dirs[1]);
        assert!((s.value - along).abs() < 1e-12);
        assert!(s.scale >= s.value.abs());
    }

    #[test]
    fn tiny_slopes_relative_to_their_terms_are_flat() {
        let noise = Slope { value: -1e-20, scale: 1e-6 };
        assert!(noise.is_flat() && !noise.is_descent());
        // Small in absolute terms but far above the rounding in its terms.
        let small = Slope { value: -1e-18, scale: 1e-9 };
        assert!(small.is_descent() && !small.is_flat());
    }

    #[test]
    fn bisection_stops_relative_to_the_starting_slope() {
        let (a, b) = flipped_pair();
        let cfg = SolveCfg::default().with_restricted(false);
        let frame = Frame::new(&a, &b, &cfg).unwrap();
        let values = [
            frame.layouts[0].values(&a, a.start()),
            frame.layouts[1].values(&b, b.start()),
        ];
        // Shrink A's copy of the shared split (0.5) towards B's (0.2). The
        // tiny rate keeps every slope far below 1e-12 in absolute terms.
        let rate = 1e-13;
        let dirs = [
            DVector::from_vec(vec![0.0, -rate, 0.0]),
            DVector::zeros(3),
        ];
        let [ta, tb] = trial(&frame, &values, &dirs, 0.0);
        let geo = GtpEngine.geodesic(&ta, &tb).unwrap();
        let s0 = slope(&frame, [&ta, &tb], &geo, &dirs);
        assert!(s0.is_descent());
        assert!(s0.value.abs() < 1e-12);

        let origin = Origin {
            distance: geo.distance,
            slope: s0,
        };
        let block = Blocking {
            tau_max: 0.5 / rate,
            candidates: vec![(Side::A, 1)],
        };
        let step = search(&GtpEngine, &frame, &cfg, &values, &dirs, origin, block).unwrap();
        let Step::Interior { tau, .. } = step else {
            panic!("expected an interior minimum, got {step:?}");
        };
        let end = distance_at(&GtpEngine, &frame, &values, &dirs, tau).unwrap();
        assert!(end <= geo.distance);
        // The minimum sits where A's copy reaches B's length.
        assert!((tau * rate - 0.3).abs() < 1e-6, "tau {tau}");
    }
}
