//! Newick input/output for `Tree`.
//!
//! - `parse`: rooted or unrooted Newick to an unrooted `Tree`. The two edges at
//!   a degree-2 root describe one split and are merged (lengths add up);
//!   clusters whose complement is a single leaf add to that leaf's pendant
//!   length. Missing lengths read as 0.
//! - `format`: render a tree rooted at leaf 0, children ordered by their
//!   smallest leaf index. Quoting is not supported; names must avoid `(),:;`.

use std::fmt::Write as _;

use super::{Edge, Split, Tree, TreeError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NewickError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected `{found}` at byte {pos}")]
    Unexpected { found: char, pos: usize },
    #[error("invalid branch length `{0}`")]
    BadLength(String),
    #[error("leaf without a name at byte {0}")]
    UnnamedLeaf(usize),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

struct Node {
    name: Option<String>,
    length: f64,
    children: Vec<Node>,
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, want: char) -> Result<(), NewickError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == want => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(found) => Err(NewickError::Unexpected {
                found,
                pos: self.pos,
            }),
            None => Err(NewickError::UnexpectedEnd),
        }
    }

    fn token(&mut self) -> &'s str {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || "(),:;".contains(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn node(&mut self) -> Result<Node, NewickError> {
        self.skip_ws();
        let mut children = Vec::new();
        if self.peek() == Some('(') {
            self.pos += 1;
            loop {
                children.push(self.node()?);
                self.skip_ws();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some(')') => {
                        self.pos += 1;
                        break;
                    }
                    Some(found) => {
                        return Err(NewickError::Unexpected {
                            found,
                            pos: self.pos,
                        })
                    }
                    None => return Err(NewickError::UnexpectedEnd),
                }
            }
        }
        let at = self.pos;
        let label = self.token();
        if children.is_empty() && label.is_empty() {
            return Err(NewickError::UnnamedLeaf(at));
        }
        let name = (!label.is_empty()).then(|| label.to_string());
        self.skip_ws();
        let mut length = 0.0;
        if self.peek() == Some(':') {
            self.pos += 1;
            let raw = self.token();
            length = raw
                .parse::<f64>()
                .map_err(|_| NewickError::BadLength(raw.to_string()))?;
        }
        Ok(Node {
            name,
            length,
            children,
        })
    }
}

/// Parse a Newick string (terminating `;` required).
pub fn parse(src: &str) -> Result<Tree, NewickError> {
    let mut p = Parser { src, pos: 0 };
    let root = p.node()?;
    p.expect(';')?;
    p.skip_ws();
    if let Some(found) = p.peek() {
        return Err(NewickError::Unexpected { found, pos: p.pos });
    }

    let mut leaves = Vec::new();
    collect_leaves(&root, &mut leaves);
    let n = leaves.len();
    if n < 3 {
        return Err(TreeError::TooFewLeaves(n).into());
    }

    let mut leaf_lengths = vec![0.0; n];
    let mut edges: Vec<Edge> = Vec::new();
    let mut next_leaf = 0;
    for child in &root.children {
        let cluster = clusters(child, n, &mut next_leaf, &mut leaf_lengths, &mut edges);
        add_cluster(cluster, child.length, &mut leaf_lengths, &mut edges);
    }
    Ok(Tree::new(leaves, edges, leaf_lengths)?)
}

fn collect_leaves(node: &Node, out: &mut Vec<String>) {
    if node.children.is_empty() {
        out.push(node.name.clone().unwrap_or_default());
    }
    for c in &node.children {
        collect_leaves(c, out);
    }
}

/// Post-order walk; returns the leaf cluster below `node` and records every
/// strictly interior cluster it meets.
fn clusters(
    node: &Node,
    n: usize,
    next_leaf: &mut usize,
    leaf_lengths: &mut [f64],
    edges: &mut Vec<Edge>,
) -> Split {
    if node.children.is_empty() {
        let s = Split::from_leaves(n, [*next_leaf]);
        *next_leaf += 1;
        return s;
    }
    let mut acc = Split::empty(n);
    for c in &node.children {
        let sub = clusters(c, n, next_leaf, leaf_lengths, edges);
        for leaf in sub.leaves() {
            acc.insert(leaf);
        }
        add_cluster(sub, c.length, leaf_lengths, edges);
    }
    acc
}

fn add_cluster(cluster: Split, length: f64, leaf_lengths: &mut [f64], edges: &mut Vec<Edge>) {
    let n = cluster.n_leaves();
    let k = cluster.len();
    if k == 1 {
        if let Some(leaf) = cluster.leaves().next() {
            leaf_lengths[leaf] += length;
        }
    } else if k + 1 == n {
        if let Some(leaf) = cluster.complement().leaves().next() {
            leaf_lengths[leaf] += length;
        }
    } else if k == 0 || k == n {
        // degenerate wrapper node, nothing to record
    } else if let Some(e) = edges.iter_mut().find(|e| e.split.is_equivalent(&cluster)) {
        e.length += length;
    } else {
        edges.push(Edge::new(cluster, length));
    }
}

enum Child {
    Leaf(usize),
    Cluster(usize),
}

/// Render `tree` as Newick rooted at leaf 0.
pub fn format(tree: &Tree) -> String {
    let n = tree.n_leaves();
    let clusters: Vec<Split> = tree.edges().iter().map(|e| e.split.canonical()).collect();
    // Parent of each cluster / leaf: the smallest cluster strictly containing it.
    let smallest_containing = |pred: &dyn Fn(&Split) -> bool| -> Option<usize> {
        clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| pred(c))
            .min_by_key(|(_, c)| c.len())
            .map(|(j, _)| j)
    };
    let mut children: Vec<Vec<Child>> = (0..clusters.len()).map(|_| Vec::new()).collect();
    let mut top: Vec<Child> = vec![Child::Leaf(0)];
    for (i, c) in clusters.iter().enumerate() {
        let parent = smallest_containing(&|o: &Split| o.len() > c.len() && c.is_subset(o));
        match parent {
            Some(p) => children[p].push(Child::Cluster(i)),
            None => top.push(Child::Cluster(i)),
        }
    }
    for leaf in 1..n {
        match smallest_containing(&|o: &Split| o.contains(leaf)) {
            Some(p) => children[p].push(Child::Leaf(leaf)),
            None => top.push(Child::Leaf(leaf)),
        }
    }
    let min_leaf = |c: &Child| match c {
        Child::Leaf(l) => *l,
        Child::Cluster(j) => clusters[*j].leaves().next().unwrap_or(usize::MAX),
    };
    top.sort_by_key(min_leaf);
    for ch in &mut children {
        ch.sort_by_key(min_leaf);
    }

    let mut out = String::new();
    write_children(tree, &top, &children, &mut out);
    out.push(';');
    out
}

fn write_children(tree: &Tree, list: &[Child], children: &[Vec<Child>], out: &mut String) {
    out.push('(');
    for (k, c) in list.iter().enumerate() {
        if k > 0 {
            out.push(',');
        }
        match c {
            Child::Leaf(l) => {
                let _ = write!(out, "{}:{}", tree.leaves()[*l], tree.leaf_lengths()[*l]);
            }
            Child::Cluster(j) => {
                write_children(tree, &children[*j], children, out);
                let _ = write!(out, ":{}", tree.edge(*j).length);
            }
        }
    }
    out.push(')');
}
