//! Bipartitions of a fixed leaf set.

use std::fmt;

const WORD: usize = 64;

/// One side of a bipartition of the leaves `0..n`.
///
/// A split and its complement describe the same tree edge; `==` compares the
/// stored side exactly, `is_equivalent` also accepts the complement.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Split {
    words: Vec<u64>,
    n_leaves: usize,
}

impl Split {
    /// Empty side over `n_leaves` leaves.
    pub fn empty(n_leaves: usize) -> Self {
        Self {
            words: vec![0; n_leaves.div_ceil(WORD)],
            n_leaves,
        }
    }

    /// Side containing the given leaves. Indices `>= n_leaves` are ignored.
    pub fn from_leaves<I: IntoIterator<Item = usize>>(n_leaves: usize, leaves: I) -> Self {
        let mut s = Self::empty(n_leaves);
        for leaf in leaves {
            s.insert(leaf);
        }
        s
    }

    #[inline]
    pub(crate) fn insert(&mut self, leaf: usize) {
        if leaf < self.n_leaves {
            self.words[leaf / WORD] |= 1u64 << (leaf % WORD);
        }
    }

    #[inline]
    pub fn n_leaves(&self) -> usize {
        self.n_leaves
    }

    #[inline]
    pub fn contains(&self, leaf: usize) -> bool {
        leaf < self.n_leaves && self.words[leaf / WORD] & (1u64 << (leaf % WORD)) != 0
    }

    /// Number of leaves on the stored side.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Leaves on the stored side, ascending.
    pub fn leaves(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_leaves).filter(move |&i| self.contains(i))
    }

    pub fn complement(&self) -> Self {
        let mut words: Vec<u64> = self.words.iter().map(|w| !w).collect();
        let tail = self.n_leaves % WORD;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
        Self {
            words,
            n_leaves: self.n_leaves,
        }
    }

    /// Orientation not containing leaf 0.
    pub fn canonical(&self) -> Self {
        if self.contains(0) {
            self.complement()
        } else {
            self.clone()
        }
    }

    /// Either side has fewer than two leaves (a pendant edge or nothing).
    pub fn is_trivial(&self) -> bool {
        let k = self.len();
        k < 2 || self.n_leaves - k < 2
    }

    /// Same bipartition: identical side or complementary side.
    pub fn is_equivalent(&self, other: &Split) -> bool {
        if self.n_leaves != other.n_leaves {
            return false;
        }
        if self == other {
            return true;
        }
        self.len() + other.len() == self.n_leaves && self.is_disjoint(other)
    }

    pub fn is_disjoint(&self, other: &Split) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & b == 0)
    }

    pub fn is_subset(&self, other: &Split) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & !b == 0)
    }

    /// Two splits can coexist in one tree iff one of the four pairwise
    /// intersections of their sides is empty.
    pub fn is_compatible(&self, other: &Split) -> bool {
        if self.n_leaves != other.n_leaves {
            return false;
        }
        let (a, b) = (self, other);
        a.is_disjoint(b)
            || a.is_subset(b)
            || b.is_subset(a)
            || a.complement().is_disjoint(&b.complement())
    }
}

impl fmt::Debug for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Split{{")?;
        for (k, leaf) in self.leaves().enumerate() {
            if k > 0 {
                write!(f, ",")?;
            }
            write!(f, "{leaf}")?;
        }
        write!(f, "|{}}}", self.n_leaves)
    }
}
