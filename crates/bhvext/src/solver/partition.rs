//! Basic / Superbasic / Nonbasic bookkeeping per side.
//!
//! Partitions are values: `release` and `reclassify` return a new partition
//! derived from the old one plus one event, never editing lists mid-scan.

use std::collections::BTreeSet;

use super::Side;
use crate::extension::{ExtensionSpace, VarLayout};

/// Static row structure of one side in flat variable indices.
#[derive(Clone, Debug, PartialEq)]
pub struct Rows {
    members: Vec<Vec<usize>>,
    fixed: Vec<f64>,
    row_of: Vec<Option<usize>>,
}

impl Rows {
    pub fn new(space: &ExtensionSpace, layout: &VarLayout) -> Self {
        let mut row_of = vec![None; layout.len()];
        let mut members = Vec::with_capacity(space.rows().len());
        let mut fixed = Vec::with_capacity(space.rows().len());
        for (r, row) in space.rows().iter().enumerate() {
            let flat: Vec<usize> = row.members.iter().map(|&m| layout.index(m)).collect();
            for &v in &flat {
                row_of[v] = Some(r);
            }
            members.push(flat);
            fixed.push(row.fixed_length);
        }
        Self {
            members,
            fixed,
            row_of,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[inline]
    pub fn members(&self, row: usize) -> &[usize] {
        &self.members[row]
    }

    #[inline]
    pub fn fixed(&self, row: usize) -> f64 {
        self.fixed[row]
    }

    #[inline]
    pub fn row_of(&self, var: usize) -> Option<usize> {
        self.row_of.get(var).copied().flatten()
    }

    #[inline]
    pub fn n_vars(&self) -> usize {
        self.row_of.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Basic,
    Superbasic,
    Nonbasic,
}

/// Classification of one side's row members.
#[derive(Clone, Debug, PartialEq)]
pub struct SidePartition {
    basic: Vec<usize>,
    superbasic: Vec<usize>,
    nonbasic: Vec<usize>,
    history: BTreeSet<usize>,
}

impl SidePartition {
    /// First member of every row is Basic, the rest Superbasic.
    pub fn from_rows(rows: &Rows) -> Self {
        let mut basic = Vec::with_capacity(rows.len());
        let mut superbasic = Vec::new();
        for r in 0..rows.len() {
            let (first, rest) = rows.members(r).split_at(1);
            basic.extend_from_slice(first);
            superbasic.extend_from_slice(rest);
        }
        Self {
            basic,
            superbasic,
            nonbasic: Vec::new(),
            history: BTreeSet::new(),
        }
    }

    pub fn from_space(space: &ExtensionSpace, layout: &VarLayout) -> Self {
        Self::from_rows(&Rows::new(space, layout))
    }

    /// Basic variable of each row, by row.
    pub fn basic(&self) -> &[usize] {
        &self.basic
    }

    pub fn superbasic(&self) -> &[usize] {
        &self.superbasic
    }

    pub fn nonbasic(&self) -> &[usize] {
        &self.nonbasic
    }

    /// Variables made Nonbasic at some point of the run.
    pub fn history(&self) -> &BTreeSet<usize> {
        &self.history
    }

    pub fn basic_of(&self, rows: &Rows, var: usize) -> Option<usize> {
        rows.row_of(var).map(|r| self.basic[r])
    }

    pub fn status(&self, var: usize) -> Option<Status> {
        if self.basic.contains(&var) {
            Some(Status::Basic)
        } else if self.superbasic.contains(&var) {
            Some(Status::Superbasic)
        } else if self.nonbasic.contains(&var) {
            Some(Status::Nonbasic)
        } else {
            None
        }
    }

    /// Move `vars` from Nonbasic to Superbasic (appended in the given order).
    pub fn release(&self, vars: &[usize]) -> Self {
        let mut next = self.clone();
        next.nonbasic.retain(|v| !vars.contains(v));
        next.superbasic
            .extend(vars.iter().copied().filter(|v| self.nonbasic.contains(v)));
        next
    }

    /// Pin `var` at zero. A Basic `var` hands its row to the first Superbasic
    /// sibling; `None` when there is none or `var` is neither Basic nor
    /// Superbasic.
    fn retire(&self, rows: &Rows, var: usize) -> Option<Self> {
        let mut next = self.clone();
        match self.status(var) {
            Some(Status::Superbasic) => {
                next.superbasic.retain(|&v| v != var);
            }
            Some(Status::Basic) => {
                let row = rows.row_of(var)?;
                let heir = rows
                    .members(row)
                    .iter()
                    .copied()
                    .find(|m| self.superbasic.contains(m))?;
                next.superbasic.retain(|&v| v != heir);
                next.basic[row] = heir;
            }
            _ => return None,
        }
        next.nonbasic.push(var);
        next.history.insert(var);
        Some(next)
    }
}

/// Outcome of a failed boundary reclassification: the Basic candidate left
/// without a Superbasic sibling, or `None` when no candidate was usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Exhausted {
    pub candidate: Option<(Side, usize)>,
}

/// Both sides' partitions.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    sides: [SidePartition; 2],
}

impl Partition {
    pub fn from_rows(rows: &[Rows; 2]) -> Self {
        Self {
            sides: [
                SidePartition::from_rows(&rows[0]),
                SidePartition::from_rows(&rows[1]),
            ],
        }
    }

    #[inline]
    pub fn side(&self, side: Side) -> &SidePartition {
        &self.sides[side.idx()]
    }

    /// Superbasic count over both sides.
    pub fn n_superbasic(&self) -> usize {
        self.sides.iter().map(|s| s.superbasic.len()).sum()
    }

    pub fn n_nonbasic(&self) -> usize {
        self.sides.iter().map(|s| s.nonbasic.len()).sum()
    }

    pub(crate) fn release(&self, promising: &[Vec<usize>; 2]) -> Self {
        Self {
            sides: [
                self.sides[0].release(&promising[0]),
                self.sides[1].release(&promising[1]),
            ],
        }
    }

    /// Move exactly one of `candidates` to Nonbasic.
    ///
    /// Candidates outside their side's History come first (stable order,
    /// side A before side B for equal standing). A Basic candidate without a
    /// Superbasic sibling ends the search with `Exhausted`; candidates that
    /// are neither Basic nor Superbasic are skipped; if none is left the
    /// error carries no candidate.
    pub(crate) fn reclassify(
        &self,
        rows: &[Rows; 2],
        candidates: &[(Side, usize)],
    ) -> Result<(Self, (Side, usize)), Exhausted> {
        let mut ordered: Vec<(Side, usize)> = candidates.to_vec();
        ordered.sort_by_key(|&(side, var)| (self.side(side).history.contains(&var), side.idx()));
        for &(side, var) in &ordered {
            let current = self.side(side);
            let is_basic = current.status(var) == Some(Status::Basic);
            match current.retire(&rows[side.idx()], var) {
                Some(next_side) => {
                    let mut next = self.clone();
                    next.sides[side.idx()] = next_side;
                    return Ok((next, (side, var)));
                }
                None if is_basic => {
                    return Err(Exhausted {
                        candidate: Some((side, var)),
                    })
                }
                None => continue,
            }
        }
        Err(Exhausted { candidate: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{ConstraintRow, Member};
    use crate::tree::newick::parse;

    fn rows() -> Rows {
        // Edges: 0={a,b}, 1={a,b,c}, 2={e,f}; rows [0,1] and [2].
        let t = parse("(((a:1,b:1):0.5,c:1):0.5,d:1,(e:1,f:1):1);").unwrap();
        let space = ExtensionSpace::new(
            t,
            vec![
                ConstraintRow::new(vec![Member::Interior(0), Member::Interior(1)], 1.0),
                ConstraintRow::new(vec![Member::Interior(2)], 1.0),
            ],
            vec![],
        )
        .unwrap();
        let layout = VarLayout::new(&space, true).unwrap();
        Rows::new(&space, &layout)
    }

    #[test]
    fn initial_partition_takes_first_member_as_basic() {
        let r = rows();
        let p = SidePartition::from_rows(&r);
        assert_eq!(p.basic(), &[0, 2]);
        assert_eq!(r.row_of(1), Some(0));
        assert_eq!(r.row_of(2), Some(1));
        assert_eq!(p.superbasic(), &[1]);
        assert!(p.nonbasic().is_empty());
        assert_eq!(p.basic_of(&r, 1), Some(0));
    }

    #[test]
    fn retiring_a_basic_promotes_its_sibling() {
        let r = rows();
        let both = [r.clone(), r.clone()];
        let p = Partition::from_rows(&both);
        let (next, hit) = p.reclassify(&both, &[(Side::B, 0)]).unwrap();
        assert_eq!(hit, (Side::B, 0));
        assert_eq!(next.side(Side::B).basic(), &[1, 2]);
        assert!(next.side(Side::B).superbasic().is_empty());
        assert_eq!(next.side(Side::B).nonbasic(), &[0]);
        assert!(next.side(Side::B).history().contains(&0));
        // side A untouched
        assert_eq!(next.side(Side::A), p.side(Side::A));
    }

    #[test]
    fn lone_basic_exhausts() {
        let r = rows();
        let both = [r.clone(), r];
        let p = Partition::from_rows(&both);
        assert_eq!(
            p.reclassify(&both, &[(Side::A, 2)]).unwrap_err(),
            Exhausted {
                candidate: Some((Side::A, 2))
            }
        );
    }

    #[test]
    fn nothing_to_reclassify_names_no_variable() {
        let r = rows();
        let both = [r.clone(), r];
        let p = Partition::from_rows(&both);
        let (p, _) = p.reclassify(&both, &[(Side::B, 1)]).unwrap();
        // B:1 is already nonbasic and 5 belongs to no row.
        for candidates in [&[][..], &[(Side::B, 1), (Side::A, 5)][..]] {
            assert_eq!(
                p.reclassify(&both, candidates).unwrap_err(),
                Exhausted { candidate: None }
            );
        }
    }

    #[test]
    fn fresh_candidates_win_over_history() {
        let r = rows();
        let both = [r.clone(), r];
        let p = Partition::from_rows(&both);
        let (p, _) = p.reclassify(&both, &[(Side::A, 1)]).unwrap();
        let p = p.release(&[vec![1], vec![]]);
        assert_eq!(p.side(Side::A).superbasic(), &[1]);
        // A:1 is in history, B:1 is not.
        let (next, hit) = p.reclassify(&both, &[(Side::A, 1), (Side::B, 1)]).unwrap();
        assert_eq!(hit, (Side::B, 1));
        assert_eq!(next.side(Side::A).superbasic(), &[1]);
    }
}
