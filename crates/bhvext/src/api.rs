//! Flat re-export surface for the CLI and downstream experiments.
//!
//! Not a stability promise; names follow the modules they come from.

// Tree model
pub use crate::tree::newick::{format as to_newick, parse as parse_newick, NewickError};
pub use crate::tree::{Edge, Split, Tree, TreeError};
// Geodesics
pub use crate::geodesic::{
    dedup_equivalent, Geodesic, GeodesicEngine, GeodesicError, GtpEngine, Ratio,
};
// Extension spaces
pub use crate::extension::{ConstraintRow, ExtensionSpace, Member, SpaceError, VarLayout};
// Solver
pub use crate::solver::{
    solve, solve_with_defaults, DistanceSolution, Partition, Side, SidePartition, SolveCfg,
    SolveError, Solver, StepKind,
};
// Reporting and sampling
pub use crate::rand::{random_pair, random_space, random_tree, ReplayToken, SpaceCfg};
pub use crate::report::{clade, ratio_table, summary};
