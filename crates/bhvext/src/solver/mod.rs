//! Minimum distance between two orthant extension spaces.
//!
//! Purpose
//! - Minimize the geodesic distance `d(T_A, T_B)` over tree pairs where
//!   `T_A` ranges over one extension space and `T_B` over another. Edge
//!   lengths are non-negative and every constraint row keeps its fixed sum.
//!
//! Method (reduced gradient with an active set)
//! - Each side's row members are Basic (one per row, determined by the row
//!   sum), Superbasic (free) or Nonbasic (pinned at 0).
//! - Per iteration: gradient of `d²/2` from the current geodesic, reduced
//!   gradients `g[s] − g[basic(s)]`, a Polak–Ribière direction on the
//!   Superbasic blocks, then an exact line search capped by the first
//!   variable to reach 0.
//! - Hitting that cap moves one variable to Nonbasic (fresh variables first,
//!   as a heuristic against cycling). At a semi-stationary point, Nonbasic
//!   variables with a negative reduced gradient are released; when none
//!   remain the point is optimal.
//!
//! Notes
//! - Termination is not guaranteed in theory; `SolveCfg::max_iterations`
//!   bounds the run and the last point is returned with the error.
//! - The two spaces are assumed to share a leaf set; a mismatch surfaces as
//!   a geodesic error on the first evaluation.

mod direction;
mod gradient;
mod line_search;
mod partition;

pub use partition::{Partition, Rows, SidePartition, Status};

use std::fmt;

use nalgebra::DVector;
use tracing::{debug, info};

use crate::extension::{ExtensionSpace, SpaceError, VarLayout};
use crate::geodesic::{Geodesic, GeodesicEngine, GeodesicError, GtpEngine};
use crate::tree::Tree;
use direction::Conjugate;
use line_search::{Origin, Slope, Step};

/// One of the two extension spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    #[inline]
    pub fn idx(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::A => "A",
            Side::B => "B",
        })
    }
}

/// Solver tolerances and limits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveCfg {
    /// Only interior edges vary; otherwise original leaf edges vary too.
    pub restricted: bool,
    /// Semi-stationary when every reduced gradient is below this.
    pub eps_grad: f64,
    /// Bisection stops once the slope is below this fraction of the slope at
    /// the start of the line (or within rounding of zero).
    pub eps_deriv: f64,
    /// Relative offset below `tau_max` at which the boundary slope is probed.
    pub eps_probe: f64,
    /// Relative tolerance for treating blocking steps as tied.
    pub tie_rel: f64,
    pub max_iterations: usize,
    pub max_bisections: usize,
}

impl Default for SolveCfg {
    fn default() -> Self {
        Self {
            restricted: true,
            eps_grad: 1e-10,
            eps_deriv: 1e-10,
            eps_probe: 1e-13,
            tie_rel: 1e-12,
            max_iterations: 10_000,
            max_bisections: 200,
        }
    }
}

impl SolveCfg {
    pub fn with_restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }
    pub fn with_eps_grad(mut self, eps: f64) -> Self {
        self.eps_grad = eps;
        self
    }
    pub fn with_eps_deriv(mut self, eps: f64) -> Self {
        self.eps_deriv = eps;
        self
    }
    pub fn with_eps_probe(mut self, eps: f64) -> Self {
        self.eps_probe = eps;
        self
    }
    pub fn with_tie_rel(mut self, tie_rel: f64) -> Self {
        self.tie_rel = tie_rel;
        self
    }
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }
    pub fn with_max_bisections(mut self, n: usize) -> Self {
        self.max_bisections = n;
        self
    }
}

/// Result of a solve: the closest pair of trees and the geodesic between them.
#[derive(Clone, Debug)]
pub struct DistanceSolution {
    pub tree_a: Tree,
    pub tree_b: Tree,
    pub distance: f64,
    pub geodesic: Geodesic,
    pub partition: Partition,
    pub values_a: DVector<f64>,
    pub values_b: DVector<f64>,
    pub iterations: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error(transparent)]
    Space(#[from] SpaceError),
    #[error(transparent)]
    Geodesic(#[from] GeodesicError),
    #[error(
        "active set exhausted: {} (last distance {:.12})",
        describe_candidate(.candidate),
        .best.distance
    )]
    ActiveSetExhausted {
        /// The Basic variable that has no Superbasic sibling to take its row,
        /// or `None` when no candidate could be reclassified at all.
        candidate: Option<(Side, usize)>,
        best: Box<DistanceSolution>,
    },
    #[error("no optimum within {limit} iterations (last distance {:.12})", .best.distance)]
    IterationLimit {
        limit: usize,
        best: Box<DistanceSolution>,
    },
    #[error("search direction has no blocking variable (last distance {:.12})", .best.distance)]
    UnboundedStep { best: Box<DistanceSolution> },
    #[error("warm start values do not fit side {side}: expected {expected} variables, got {got}")]
    WarmStartMismatch {
        side: Side,
        expected: usize,
        got: usize,
    },
}

fn describe_candidate(candidate: &Option<(Side, usize)>) -> String {
    match candidate {
        Some((side, var)) => format!("variable {var} of side {side} cannot become nonbasic"),
        None => "no blocking candidate can become nonbasic".to_string(),
    }
}

impl SolveError {
    /// Last consistent point, when the run got that far.
    pub fn best(&self) -> Option<&DistanceSolution> {
        match self {
            SolveError::ActiveSetExhausted { best, .. }
            | SolveError::IterationLimit { best, .. }
            | SolveError::UnboundedStep { best } => Some(best),
            _ => None,
        }
    }
}

/// What one outer iteration did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepKind {
    /// No reduced gradient is negative anywhere: the point is optimal.
    Optimal,
    /// Semi-stationary; `count` Nonbasic variables returned to Superbasic.
    Released { count: usize },
    /// Stepped to the boundary and pinned `variable` of `side`.
    Boundary { tau: f64, side: Side, variable: usize },
    /// Stepped to an interior minimum along the direction.
    Interior { tau: f64, bisections: usize },
}

/// Static per-run data shared by the numeric kernels.
pub(crate) struct Frame<'a> {
    pub spaces: [&'a ExtensionSpace; 2],
    pub layouts: [VarLayout; 2],
    pub rows: [Rows; 2],
}

impl<'a> Frame<'a> {
    fn new(
        a: &'a ExtensionSpace,
        b: &'a ExtensionSpace,
        cfg: &SolveCfg,
    ) -> Result<Self, SpaceError> {
        let layouts = [
            VarLayout::new(a, cfg.restricted)?,
            VarLayout::new(b, cfg.restricted)?,
        ];
        let rows = [Rows::new(a, &layouts[0]), Rows::new(b, &layouts[1])];
        Ok(Self {
            spaces: [a, b],
            layouts,
            rows,
        })
    }

    fn trees(&self, values: &[DVector<f64>; 2]) -> [Tree; 2] {
        Side::BOTH.map(|s| self.layouts[s.idx()].tree(self.spaces[s.idx()], &values[s.idx()]))
    }
}

/// Iterative solver state. Drive it with `step` or `run`.
pub struct Solver<'a, G: GeodesicEngine> {
    engine: G,
    cfg: SolveCfg,
    frame: Frame<'a>,
    partition: Partition,
    values: [DVector<f64>; 2],
    trees: [Tree; 2],
    geodesic: Geodesic,
    cg: Conjugate,
    iterations: usize,
    optimal: bool,
}

impl<'a, G: GeodesicEngine> Solver<'a, G> {
    /// Start from both spaces' start trees with the initial partition.
    pub fn new(
        engine: G,
        a: &'a ExtensionSpace,
        b: &'a ExtensionSpace,
        cfg: SolveCfg,
    ) -> Result<Self, SolveError> {
        let frame = Frame::new(a, b, &cfg)?;
        let partition = Partition::from_rows(&frame.rows);
        let values = [
            frame.layouts[0].values(a, a.start()),
            frame.layouts[1].values(b, b.start()),
        ];
        Self::assemble(engine, cfg, frame, partition, values)
    }

    /// Resume from a previous solution's partition and values.
    pub fn warm_start(
        engine: G,
        a: &'a ExtensionSpace,
        b: &'a ExtensionSpace,
        cfg: SolveCfg,
        from: &DistanceSolution,
    ) -> Result<Self, SolveError> {
        let frame = Frame::new(a, b, &cfg)?;
        let values = [from.values_a.clone(), from.values_b.clone()];
        for side in Side::BOTH {
            let expected = frame.layouts[side.idx()].len();
            let got = values[side.idx()].len();
            if expected != got {
                return Err(SolveError::WarmStartMismatch {
                    side,
                    expected,
                    got,
                });
            }
        }
        Self::assemble(engine, cfg, frame, from.partition.clone(), values)
    }

    fn assemble(
        engine: G,
        cfg: SolveCfg,
        frame: Frame<'a>,
        partition: Partition,
        values: [DVector<f64>; 2],
    ) -> Result<Self, SolveError> {
        let trees = frame.trees(&values);
        let geodesic = engine.geodesic(&trees[0], &trees[1])?;
        Ok(Self {
            engine,
            cfg,
            frame,
            partition,
            values,
            trees,
            geodesic,
            cg: Conjugate::new(),
            iterations: 0,
            optimal: false,
        })
    }

    #[inline]
    pub fn distance(&self) -> f64 {
        self.geodesic.distance
    }

    #[inline]
    pub fn geodesic(&self) -> &Geodesic {
        &self.geodesic
    }

    #[inline]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    #[inline]
    pub fn tree(&self, side: Side) -> &Tree {
        &self.trees[side.idx()]
    }

    #[inline]
    pub fn values(&self, side: Side) -> &DVector<f64> {
        &self.values[side.idx()]
    }

    #[inline]
    pub fn rows(&self, side: Side) -> &Rows {
        &self.frame.rows[side.idx()]
    }

    #[inline]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    #[inline]
    pub fn is_optimal(&self) -> bool {
        self.optimal
    }

    /// Current point as a solution value.
    pub fn snapshot(&self) -> DistanceSolution {
        let [tree_a, tree_b] = self.trees.clone();
        let [values_a, values_b] = self.values.clone();
        DistanceSolution {
            tree_a,
            tree_b,
            distance: self.geodesic.distance,
            geodesic: self.geodesic.clone(),
            partition: self.partition.clone(),
            values_a,
            values_b,
            iterations: self.iterations,
        }
    }

    /// One outer iteration. Returns `Optimal` again once optimal.
    pub fn step(&mut self) -> Result<StepKind, SolveError> {
        if self.optimal {
            return Ok(StepKind::Optimal);
        }
        if self.iterations >= self.cfg.max_iterations {
            return Err(SolveError::IterationLimit {
                limit: self.cfg.max_iterations,
                best: Box::new(self.snapshot()),
            });
        }
        self.iterations += 1;
        if self.cg.counter > self.partition.n_superbasic() {
            self.cg.restart();
        }

        let grad = gradient::full(
            &self.frame,
            [&self.trees[0], &self.trees[1]],
            &self.geodesic,
        );
        let reduced = Side::BOTH.map(|s| {
            let i = s.idx();
            let part = self.partition.side(s);
            gradient::reduced(&grad[i], &self.frame.rows[i], part, part.superbasic())
        });

        let kind = if gradient::max_abs(&reduced) < self.cfg.eps_grad {
            self.release_or_finish(&grad)
        } else {
            self.descend(&grad, &reduced)?
        };
        debug!(
            iteration = self.iterations,
            distance = self.geodesic.distance,
            superbasic = self.partition.n_superbasic(),
            nonbasic = self.partition.n_nonbasic(),
            ?kind,
            "step"
        );
        Ok(kind)
    }

    fn release_or_finish(&mut self, grad: &[DVector<f64>; 2]) -> StepKind {
        let promising = Side::BOTH.map(|s| {
            let i = s.idx();
            let part = self.partition.side(s);
            let r = gradient::reduced(&grad[i], &self.frame.rows[i], part, part.nonbasic());
            part.nonbasic()
                .iter()
                .zip(r.iter())
                .filter(|(_, g)| **g < 0.0)
                .map(|(v, _)| *v)
                .collect::<Vec<usize>>()
        });
        let count = promising[0].len() + promising[1].len();
        if count == 0 {
            self.optimal = true;
            return StepKind::Optimal;
        }
        self.partition = self.partition.release(&promising);
        self.cg.restart();
        StepKind::Released { count }
    }

    fn descend(
        &mut self,
        grad: &[DVector<f64>; 2],
        reduced: &[DVector<f64>; 2],
    ) -> Result<StepKind, SolveError> {
        let mut dirs = self.directions(reduced);
        let mut s0 = self.slope(&dirs);
        if !s0.is_descent() && self.cg.counter > 0 {
            self.cg.restart();
            dirs = self.directions(reduced);
            s0 = self.slope(&dirs);
        }
        if !s0.is_descent() {
            debug!(slope = s0.value, scale = s0.scale, "slope lost in rounding");
            return Ok(self.release_or_finish(grad));
        }

        let block = line_search::blocking(&self.values, &dirs, &self.partition, self.cfg.tie_rel);
        let Some(block) = block else {
            return Err(SolveError::UnboundedStep {
                best: Box::new(self.snapshot()),
            });
        };
        let origin = Origin {
            distance: self.geodesic.distance,
            slope: s0,
        };
        let step = line_search::search(
            &self.engine,
            &self.frame,
            &self.cfg,
            &self.values,
            &dirs,
            origin,
            block,
        )?;

        let (tau, next, kind) = match step {
            Step::Boundary { tau, candidates } => {
                let (next, side, variable) = self.pin(&candidates)?;
                (tau, next, StepKind::Boundary { tau, side, variable })
            }
            Step::Interior { tau, bisections } => {
                self.cg.counter += 1;
                (tau, self.partition.clone(), StepKind::Interior { tau, bisections })
            }
        };

        let values = Side::BOTH.map(|s| {
            let i = s.idx();
            advance(&self.frame.rows[i], next.side(s), &self.values[i], &dirs[i], tau)
        });
        let trees = self.frame.trees(&values);
        let geodesic = self.engine.geodesic(&trees[0], &trees[1])?;
        self.partition = next;
        self.values = values;
        self.trees = trees;
        self.geodesic = geodesic;
        Ok(kind)
    }

    /// Full per-variable directions for the current partition.
    fn directions(&mut self, reduced: &[DVector<f64>; 2]) -> [DVector<f64>; 2] {
        let d_s = self.cg.direction(reduced);
        Side::BOTH.map(|s| {
            let i = s.idx();
            direction::expand(&self.frame.rows[i], self.partition.side(s), &d_s[i])
        })
    }

    fn slope(&self, dirs: &[DVector<f64>; 2]) -> Slope {
        line_search::slope(
            &self.frame,
            [&self.trees[0], &self.trees[1]],
            &self.geodesic,
            dirs,
        )
    }

    /// Partition after moving one of the boundary `candidates` to Nonbasic.
    /// On failure the current point is returned with the error, unchanged.
    fn pin(
        &mut self,
        candidates: &[(Side, usize)],
    ) -> Result<(Partition, Side, usize), SolveError> {
        match self.partition.reclassify(&self.frame.rows, candidates) {
            Ok((next, (side, variable))) => {
                self.cg.restart();
                Ok((next, side, variable))
            }
            Err(e) => Err(SolveError::ActiveSetExhausted {
                candidate: e.candidate,
                best: Box::new(self.snapshot()),
            }),
        }
    }

    /// Iterate until optimal.
    pub fn run(mut self) -> Result<DistanceSolution, SolveError> {
        while self.step()? != StepKind::Optimal {}
        info!(
            iterations = self.iterations,
            distance = self.geodesic.distance,
            "optimum reached"
        );
        Ok(self.snapshot())
    }
}

/// Values after a step of `tau` along `dir`, made consistent with `part`:
/// Superbasic members move, Nonbasic members sit at 0, each Basic member
/// closes its row sum. Variables outside every row keep their values.
fn advance(
    rows: &Rows,
    part: &SidePartition,
    x: &DVector<f64>,
    dir: &DVector<f64>,
    tau: f64,
) -> DVector<f64> {
    let mut next = x.clone();
    for &s in part.superbasic() {
        next[s] = x[s] + tau * dir[s];
    }
    for &v in part.nonbasic() {
        next[v] = 0.0;
    }
    for (r, &b) in part.basic().iter().enumerate() {
        let others: f64 = rows
            .members(r)
            .iter()
            .filter(|&&m| m != b)
            .map(|&m| next[m])
            .sum();
        next[b] = rows.fixed(r) - others;
    }
    next
}

/// Minimum distance between `a` and `b` using `engine`.
pub fn solve<G: GeodesicEngine>(
    engine: G,
    a: &ExtensionSpace,
    b: &ExtensionSpace,
    cfg: SolveCfg,
) -> Result<DistanceSolution, SolveError> {
    Solver::new(engine, a, b, cfg)?.run()
}

/// `solve` with the GTP engine and default tolerances (restricted).
pub fn solve_with_defaults(
    a: &ExtensionSpace,
    b: &ExtensionSpace,
) -> Result<DistanceSolution, SolveError> {
    solve(GtpEngine, a, b, SolveCfg::default())
}
