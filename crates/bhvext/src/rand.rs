//! Random trees and extension spaces (replay tokens).
//!
//! Purpose
//! - Reproducible inputs for property tests, benchmarks and the CLI demo.
//!
//! Model
//! - Trees: leaf 0 is the outgroup; the remaining leaves are split
//!   recursively at random, every cluster of two or more leaves below the
//!   top becomes an interior edge. The result is binary (`n - 3` edges).
//! - Spaces: interior edges are shuffled and chunked into rows of
//!   `1..=max_row` members with random fixed lengths; in the unrestricted
//!   flavour some leaves are declared original and join rows too. The start
//!   point shares each fixed length evenly.
//! - Determinism: a `(seed, index)` token is mixed into one `StdRng`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::extension::{ConstraintRow, ExtensionSpace, Member, SpaceError};
use crate::tree::{Edge, Split, Tree, TreeError};

/// Replay token to make draws reproducible and indexable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayToken {
    pub seed: u64,
    pub index: u64,
}

impl ReplayToken {
    pub fn new(seed: u64, index: u64) -> Self {
        Self { seed, index }
    }

    /// Next token in the same stream.
    pub fn next(self) -> Self {
        Self {
            seed: self.seed,
            index: self.index.wrapping_add(1),
        }
    }

    pub fn rng(self) -> StdRng {
        fn mix(mut x: u64) -> u64 {
            x ^= x >> 31;
            x = x.wrapping_mul(0xd6e8feb86659fd93);
            x ^= x >> 32;
            x = x.wrapping_mul(0xd6e8feb86659fd93);
            x ^ (x >> 32)
        }
        StdRng::seed_from_u64(mix(self.seed.rotate_left(17) ^ mix(self.index)))
    }
}

/// Sampler knobs for `random_space`.
#[derive(Clone, Copy, Debug)]
pub struct SpaceCfg {
    /// Upper bound on members per row.
    pub max_row: usize,
    /// Fixed lengths are drawn uniformly from this range.
    pub fixed_range: (f64, f64),
    /// Share of leaves declared original and placed into rows (0 = restricted).
    pub leaf_share: f64,
}

impl Default for SpaceCfg {
    fn default() -> Self {
        Self {
            max_row: 3,
            fixed_range: (0.2, 1.5),
            leaf_share: 0.0,
        }
    }
}

impl SpaceCfg {
    /// Same knobs with original leaves taking part in rows.
    pub fn unrestricted(self, leaf_share: f64) -> Self {
        Self {
            leaf_share: leaf_share.clamp(0.0, 1.0),
            ..self
        }
    }
}

/// Leaf names `t0, t1, ...`.
pub fn leaf_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("t{i}")).collect()
}

/// Random binary tree on `n_leaves` leaves, lengths in `[0.1, 1.0)`.
pub fn random_tree(n_leaves: usize, tok: ReplayToken) -> Result<Tree, TreeError> {
    random_tree_with(n_leaves, &mut tok.rng())
}

pub fn random_tree_with<R: Rng>(n_leaves: usize, rng: &mut R) -> Result<Tree, TreeError> {
    let mut clusters = Vec::new();
    if n_leaves >= 3 {
        grow((1..n_leaves).collect(), n_leaves, true, rng, &mut clusters);
    }
    let edges = clusters
        .into_iter()
        .map(|s| Edge::new(s, rng.gen_range(0.1..1.0)))
        .collect();
    let leaf_lengths = (0..n_leaves).map(|_| rng.gen_range(0.1..1.0)).collect();
    Tree::new(leaf_names(n_leaves), edges, leaf_lengths)
}

fn grow<R: Rng>(mut set: Vec<usize>, n: usize, top: bool, rng: &mut R, out: &mut Vec<Split>) {
    if set.len() < 2 {
        return;
    }
    if !top {
        out.push(Split::from_leaves(n, set.iter().copied()));
    }
    set.shuffle(rng);
    let cut = rng.gen_range(1..set.len());
    let right = set.split_off(cut);
    grow(set, n, false, rng, out);
    grow(right, n, false, rng, out);
}

/// Random extension space whose topology is `tree`.
pub fn random_space(
    tree: &Tree,
    cfg: SpaceCfg,
    tok: ReplayToken,
) -> Result<ExtensionSpace, SpaceError> {
    random_space_with(tree, cfg, &mut tok.rng())
}

pub fn random_space_with<R: Rng>(
    tree: &Tree,
    cfg: SpaceCfg,
    rng: &mut R,
) -> Result<ExtensionSpace, SpaceError> {
    let max_row = cfg.max_row.max(1);
    let (lo, hi) = cfg.fixed_range;
    let draw_fixed = |rng: &mut R| {
        if hi > lo {
            rng.gen_range(lo..hi)
        } else {
            lo.max(0.0)
        }
    };

    let mut interior: Vec<usize> = (0..tree.edges().len()).collect();
    interior.shuffle(rng);
    let mut rows: Vec<Vec<Member>> = Vec::new();
    while !interior.is_empty() {
        let take = rng.gen_range(1..=max_row.min(interior.len()));
        let rest = interior.split_off(take);
        rows.push(interior.into_iter().map(Member::Interior).collect());
        interior = rest;
    }

    let mut original_leaves: Vec<usize> = (0..tree.n_leaves())
        .filter(|_| cfg.leaf_share > 0.0 && rng.gen_bool(cfg.leaf_share.min(1.0)))
        .collect();
    original_leaves.shuffle(rng);
    for k in 0..original_leaves.len() {
        if rows.is_empty() || rng.gen_bool(0.5) {
            rows.push(vec![Member::Leaf(k)]);
        } else {
            let r = rng.gen_range(0..rows.len());
            rows[r].push(Member::Leaf(k));
        }
    }

    let rows = rows
        .into_iter()
        .map(|members| ConstraintRow::new(members, draw_fixed(rng)))
        .collect();
    ExtensionSpace::with_even_start(tree.clone(), rows, original_leaves)
}

/// Two random spaces over the same leaf set (independent topologies).
pub fn random_pair(
    n_leaves: usize,
    cfg: SpaceCfg,
    tok: ReplayToken,
) -> Result<(ExtensionSpace, ExtensionSpace), SpaceError> {
    let mut rng = tok.rng();
    let ta = random_tree_with(n_leaves, &mut rng)?;
    let tb = random_tree_with(n_leaves, &mut rng)?;
    let a = random_space_with(&ta, cfg, &mut rng)?;
    let b = random_space_with(&tb, cfg, &mut rng)?;
    Ok((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trees_are_binary_and_reproducible() {
        for n in 3..12 {
            let tok = ReplayToken::new(7, n as u64);
            let t = random_tree(n, tok).unwrap();
            assert_eq!(t.edges().len(), n - 3);
            let again = random_tree(n, tok).unwrap();
            assert_eq!(t.edges(), again.edges());
        }
    }

    #[test]
    fn tokens_differ_by_index() {
        let a = random_tree(9, ReplayToken::new(1, 0)).unwrap();
        let b = random_tree(9, ReplayToken::new(1, 1)).unwrap();
        assert_ne!(a.lengths(), b.lengths());
    }

    #[test]
    fn spaces_cover_every_interior_edge_once() {
        let t = random_tree(10, ReplayToken::new(3, 0)).unwrap();
        let s = random_space(&t, SpaceCfg::default(), ReplayToken::new(3, 1)).unwrap();
        let mut seen: Vec<Member> = s.rows().iter().flat_map(|r| r.members.clone()).collect();
        seen.sort();
        let want: Vec<Member> = (0..t.edges().len()).map(Member::Interior).collect();
        assert_eq!(seen, want);
        assert!(s.rows().iter().all(|r| r.members.len() <= 3));
    }

    #[test]
    fn unrestricted_spaces_use_original_leaves() {
        let cfg = SpaceCfg::default().unrestricted(1.0);
        let (a, b) = random_pair(8, cfg, ReplayToken::new(5, 2)).unwrap();
        for s in [&a, &b] {
            assert_eq!(s.original_leaves().len(), 8);
            let leaf_members = s
                .rows()
                .iter()
                .flat_map(|r| &r.members)
                .filter(|m| matches!(m, Member::Leaf(_)))
                .count();
            assert_eq!(leaf_members, 8);
        }
        assert_eq!(a.leaf_set(), b.leaf_set());
    }
}
