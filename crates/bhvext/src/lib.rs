//! Minimum distance between orthant extension spaces in BHV tree space.
//!
//! Layout
//! - `tree`: splits, trees and Newick I/O.
//! - `geodesic`: the geodesic oracle interface and the GTP engine.
//! - `extension`: extension-space descriptions and their variable layout.
//! - `solver`: the reduced-gradient active-set distance solver.
//! - `report`: text rendering of results.
//! - `rand`: reproducible random trees and spaces.
//!
//! References
//! - L. J. Billera, S. P. Holmes, K. Vogtmann, "Geometry of the space of
//!   phylogenetic trees", Adv. Appl. Math. 27, 2001.
//! - M. Owen, J. S. Provan, "A fast algorithm for computing geodesic
//!   distances in tree space", IEEE/ACM TCBB 8(1), 2011.

pub mod api;
pub(crate) mod cfg;
pub mod extension;
pub mod geodesic;
pub mod rand;
pub mod report;
pub mod solver;
pub mod tree;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use solver::{solve, solve_with_defaults, DistanceSolution, SolveCfg, SolveError};

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::extension::{ConstraintRow, ExtensionSpace, Member, SpaceError, VarLayout};
    pub use crate::geodesic::{Geodesic, GeodesicEngine, GtpEngine, Ratio};
    pub use crate::solver::{
        solve, solve_with_defaults, DistanceSolution, Side, SolveCfg, SolveError, Solver, StepKind,
    };
    pub use crate::tree::{newick, Edge, Split, Tree};
}
