//! Fixed tolerances for the tree model, geodesic engine and slope tests (internal).
//!
//! Policy
//! - Fixed constants, not solver knobs. Solver tolerances live in
//!   `solver::SolveCfg` where callers can tune them per run.

/// Lengths down to `-LENGTH_EPS` are accepted as zero by `Tree::new`.
pub(crate) const LENGTH_EPS: f64 = 1e-9;
/// A ratio is split only when its minimum vertex cover weighs `< 1 - COVER_EPS`.
pub(crate) const COVER_EPS: f64 = 1e-10;
/// Residual capacities at or below this are treated as saturated.
pub(crate) const FLOW_EPS: f64 = 1e-14;
/// Row sums of a start point must match their fixed length within this.
pub(crate) const ROW_EPS: f64 = 1e-9;
/// Slopes within this fraction of the magnitude of their summed terms are
/// rounding noise.
pub(crate) const SLOPE_EPS: f64 = 1e-12;
