//! Orthant extension spaces and their variable layout.
//!
//! Purpose
//! - `ExtensionSpace` is the immutable description of one side of a distance
//!   problem: a start tree on the complete leaf set, constraint rows that
//!   group edge lengths into fixed-sum blocks, and (for the unrestricted
//!   configuration) the map from original leaves to complete leaves.
//! - `VarLayout` flattens a space into the solver's variable vector.
//!
//! Conventions
//! - A row's members sum to its fixed length; the first member is the
//!   initial basic variable, the rest are companions.
//! - Restricted layout: one variable per interior edge, in tree edge order.
//!   Unrestricted layout: original-leaf variables first, then interior edges.
//! - A variable outside every row keeps its start value for the whole run.

use nalgebra::DVector;

use crate::cfg::ROW_EPS;
use crate::tree::{Tree, TreeError};

/// A row member: an interior edge of the start tree (by edge index) or the
/// pendant edge of an original leaf (by position in `original_leaves`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Member {
    Interior(usize),
    Leaf(usize),
}

/// Members whose lengths add up to `fixed_length`.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintRow {
    pub members: Vec<Member>,
    pub fixed_length: f64,
}

impl ConstraintRow {
    pub fn new(members: Vec<Member>, fixed_length: f64) -> Self {
        Self {
            members,
            fixed_length,
        }
    }

    /// Members after the first.
    pub fn companions(&self) -> &[Member] {
        self.members.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpaceError {
    #[error("row {0} has no members")]
    EmptyRow(usize),
    #[error("row {row}: member {member:?} is out of range")]
    MemberOutOfRange { row: usize, member: Member },
    #[error("member {member:?} appears in rows {first} and {second}")]
    SharedMember {
        member: Member,
        first: usize,
        second: usize,
    },
    #[error("row {row}: fixed length {value} is not a finite non-negative number")]
    BadFixedLength { row: usize, value: f64 },
    #[error("row {row}: start point sums to {sum}, fixed length is {fixed}")]
    RowMismatch { row: usize, sum: f64, fixed: f64 },
    #[error("original leaf {index} maps to leaf {leaf}, tree has {n_leaves} leaves")]
    LeafMapOutOfRange {
        index: usize,
        leaf: usize,
        n_leaves: usize,
    },
    #[error("original leaves {0} and {1} map to the same leaf")]
    LeafMapNotInjective(usize, usize),
    #[error("row {row} varies leaf member {member:?}, which the restricted configuration fixes")]
    LeafInRestricted { row: usize, member: Member },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Immutable description of one orthant extension space.
#[derive(Clone, Debug)]
pub struct ExtensionSpace {
    start: Tree,
    rows: Vec<ConstraintRow>,
    original_leaves: Vec<usize>,
}

impl ExtensionSpace {
    /// Validate and wrap. The start tree must satisfy every row.
    pub fn new(
        start: Tree,
        rows: Vec<ConstraintRow>,
        original_leaves: Vec<usize>,
    ) -> Result<Self, SpaceError> {
        let space = Self {
            start,
            rows,
            original_leaves,
        };
        space.check_structure()?;
        for (r, row) in space.rows.iter().enumerate() {
            let sum: f64 = row
                .members
                .iter()
                .map(|&m| space.member_value(&space.start, m))
                .sum();
            let tol = ROW_EPS * row.fixed_length.abs().max(1.0);
            if (sum - row.fixed_length).abs() > tol {
                return Err(SpaceError::RowMismatch {
                    row: r,
                    sum,
                    fixed: row.fixed_length,
                });
            }
        }
        Ok(space)
    }

    /// Build the start point by sharing each row's fixed length evenly among
    /// its members; lengths outside every row are taken from `topology`.
    pub fn with_even_start(
        topology: Tree,
        rows: Vec<ConstraintRow>,
        original_leaves: Vec<usize>,
    ) -> Result<Self, SpaceError> {
        let probe = Self {
            start: topology,
            rows,
            original_leaves,
        };
        probe.check_structure()?;
        let mut lengths = probe.start.lengths();
        let mut leaf_lengths = probe.start.leaf_lengths().to_vec();
        for row in &probe.rows {
            let share = row.fixed_length / row.members.len() as f64;
            for &m in &row.members {
                match m {
                    Member::Interior(i) => lengths[i] = share,
                    Member::Leaf(k) => leaf_lengths[probe.original_leaves[k]] = share,
                }
            }
        }
        let start = probe.start.with_lengths(&lengths, &leaf_lengths);
        Self::new(start, probe.rows, probe.original_leaves)
    }

    fn check_structure(&self) -> Result<(), SpaceError> {
        let n_leaves = self.start.n_leaves();
        for (k, &leaf) in self.original_leaves.iter().enumerate() {
            if leaf >= n_leaves {
                return Err(SpaceError::LeafMapOutOfRange {
                    index: k,
                    leaf,
                    n_leaves,
                });
            }
            if let Some(prev) = self.original_leaves[..k].iter().position(|&l| l == leaf) {
                return Err(SpaceError::LeafMapNotInjective(prev, k));
            }
        }
        let mut owner: std::collections::HashMap<Member, usize> = Default::default();
        for (r, row) in self.rows.iter().enumerate() {
            if row.members.is_empty() {
                return Err(SpaceError::EmptyRow(r));
            }
            if !(row.fixed_length.is_finite() && row.fixed_length >= 0.0) {
                return Err(SpaceError::BadFixedLength {
                    row: r,
                    value: row.fixed_length,
                });
            }
            for &m in &row.members {
                let in_range = match m {
                    Member::Interior(i) => i < self.start.edges().len(),
                    Member::Leaf(k) => k < self.original_leaves.len(),
                };
                if !in_range {
                    return Err(SpaceError::MemberOutOfRange { row: r, member: m });
                }
                if let Some(first) = owner.insert(m, r) {
                    return Err(SpaceError::SharedMember {
                        member: m,
                        first,
                        second: r,
                    });
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn start(&self) -> &Tree {
        &self.start
    }

    #[inline]
    pub fn rows(&self) -> &[ConstraintRow] {
        &self.rows
    }

    #[inline]
    pub fn original_leaves(&self) -> &[usize] {
        &self.original_leaves
    }

    /// Ambient dimension: interior edges of a tree on the complete leaf set.
    #[inline]
    pub fn dim(&self) -> usize {
        self.start.edges().len()
    }

    #[inline]
    pub fn leaf_set(&self) -> &[String] {
        self.start.leaves()
    }

    /// Some row has more than one member.
    pub fn has_companions(&self) -> bool {
        self.rows.iter().any(|r| r.members.len() > 1)
    }

    /// Current length of `m` in `tree` (a tree over this space's leaf set).
    pub fn member_value(&self, tree: &Tree, m: Member) -> f64 {
        match m {
            Member::Interior(i) => tree.edge(i).length,
            Member::Leaf(k) => tree.leaf_lengths()[self.original_leaves[k]],
        }
    }
}

/// Flat variable index space of one side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarLayout {
    leaf_vars: usize,
    interior: usize,
}

impl VarLayout {
    /// Restricted: interior edges only. Unrestricted: original leaves too.
    pub fn new(space: &ExtensionSpace, restricted: bool) -> Result<Self, SpaceError> {
        if restricted {
            for (r, row) in space.rows().iter().enumerate() {
                if let Some(&member) = row.members.iter().find(|m| matches!(m, Member::Leaf(_))) {
                    return Err(SpaceError::LeafInRestricted { row: r, member });
                }
            }
        }
        Ok(Self {
            leaf_vars: if restricted {
                0
            } else {
                space.original_leaves().len()
            },
            interior: space.dim(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.leaf_vars + self.interior
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of leading original-leaf variables (0 when restricted).
    #[inline]
    pub fn leaf_vars(&self) -> usize {
        self.leaf_vars
    }

    /// Flat index of interior edge `i`.
    #[inline]
    pub fn interior(&self, i: usize) -> usize {
        self.leaf_vars + i
    }

    #[inline]
    pub fn index(&self, m: Member) -> usize {
        match m {
            Member::Leaf(k) => k,
            Member::Interior(i) => self.interior(i),
        }
    }

    pub fn member(&self, idx: usize) -> Member {
        if idx < self.leaf_vars {
            Member::Leaf(idx)
        } else {
            Member::Interior(idx - self.leaf_vars)
        }
    }

    /// Variable vector read off `tree`.
    pub fn values(&self, space: &ExtensionSpace, tree: &Tree) -> DVector<f64> {
        DVector::from_iterator(
            self.len(),
            (0..self.len()).map(|idx| space.member_value(tree, self.member(idx))),
        )
    }

    /// Tree point for a variable vector. Leaf lengths that are not variables
    /// come from the space's start tree.
    pub fn tree(&self, space: &ExtensionSpace, values: &DVector<f64>) -> Tree {
        let start = space.start();
        let interior: Vec<f64> = (0..self.interior)
            .map(|i| values[self.interior(i)])
            .collect();
        let mut leaf_lengths = start.leaf_lengths().to_vec();
        for k in 0..self.leaf_vars {
            leaf_lengths[space.original_leaves()[k]] = values[k];
        }
        start.with_lengths(&interior, &leaf_lengths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::newick::parse;

    fn quartet() -> Tree {
        // Five leaves, two interior edges: {a,b} and {d,e}.
        parse("((a:1,b:1):0.4,c:1,(d:1,e:1):0.6);").unwrap()
    }

    #[test]
    fn new_checks_row_sums() {
        let rows = vec![ConstraintRow::new(
            vec![Member::Interior(0), Member::Interior(1)],
            1.0,
        )];
        assert!(ExtensionSpace::new(quartet(), rows, vec![]).is_ok());
        let bad = vec![ConstraintRow::new(vec![Member::Interior(0)], 1.0)];
        assert!(matches!(
            ExtensionSpace::new(quartet(), bad, vec![]),
            Err(SpaceError::RowMismatch { row: 0, .. })
        ));
    }

    #[test]
    fn structure_errors() {
        let t = quartet();
        let shared = vec![
            ConstraintRow::new(vec![Member::Interior(0)], 0.4),
            ConstraintRow::new(vec![Member::Interior(0)], 0.4),
        ];
        assert!(matches!(
            ExtensionSpace::new(t.clone(), shared, vec![]),
            Err(SpaceError::SharedMember { first: 0, second: 1, .. })
        ));
        let oob = vec![ConstraintRow::new(vec![Member::Interior(7)], 0.4)];
        assert!(matches!(
            ExtensionSpace::new(t.clone(), oob, vec![]),
            Err(SpaceError::MemberOutOfRange { row: 0, .. })
        ));
        let empty = vec![ConstraintRow::new(vec![], 0.0)];
        assert_eq!(
            ExtensionSpace::new(t.clone(), empty, vec![]).unwrap_err(),
            SpaceError::EmptyRow(0)
        );
        assert_eq!(
            ExtensionSpace::new(t, vec![], vec![1, 1]).unwrap_err(),
            SpaceError::LeafMapNotInjective(0, 1)
        );
    }

    #[test]
    fn even_start_shares_fixed_length() {
        let rows = vec![ConstraintRow::new(
            vec![Member::Interior(1), Member::Leaf(0)],
            3.0,
        )];
        let s = ExtensionSpace::with_even_start(quartet(), rows, vec![2]).unwrap();
        assert!((s.start().edge(1).length - 1.5).abs() < 1e-15);
        assert!((s.start().leaf_lengths()[2] - 1.5).abs() < 1e-15);
        // untouched edge keeps its length
        assert!((s.start().edge(0).length - 0.4).abs() < 1e-15);
    }

    #[test]
    fn layout_orders_leaf_variables_first() {
        let rows = vec![ConstraintRow::new(
            vec![Member::Interior(1), Member::Leaf(0)],
            3.0,
        )];
        let s = ExtensionSpace::with_even_start(quartet(), rows, vec![2]).unwrap();
        assert!(matches!(
            VarLayout::new(&s, true),
            Err(SpaceError::LeafInRestricted { row: 0, .. })
        ));
        let lay = VarLayout::new(&s, false).unwrap();
        assert_eq!(lay.len(), 3);
        assert_eq!(lay.index(Member::Leaf(0)), 0);
        assert_eq!(lay.index(Member::Interior(1)), 2);
        assert_eq!(lay.member(1), Member::Interior(0));

        let v = lay.values(&s, s.start());
        assert_eq!(v.as_slice(), &[1.5, 0.4, 1.5]);
        let moved = DVector::from_vec(vec![0.5, 0.4, 2.5]);
        let t = lay.tree(&s, &moved);
        assert!((t.leaf_lengths()[2] - 0.5).abs() < 1e-15);
        assert!((t.edge(1).length - 2.5).abs() < 1e-15);
        assert_eq!(lay.values(&s, &t), moved);
    }
}
