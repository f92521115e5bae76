//! JSON problem and result files.
//!
//! A problem names both spaces by a Newick start tree plus rows whose
//! members are clades (interior edges, by leaf names on either side) or
//! original leaves (by name):
//!
//! ```json
//! { "a": { "tree": "((a:1,b:1):0.5,c:1,(d:1,e:1):0.5);",
//!          "rows": [ { "members": [ {"clade": ["a","b"]}, {"clade": ["d","e"]} ],
//!                      "fixed_length": 1.0 } ] },
//!   "b": { ... } }
//! ```

use anyhow::{anyhow, bail, Context, Result};
use bhvext::api::{
    clade, parse_newick, to_newick, ConstraintRow, DistanceSolution, ExtensionSpace, Member, Split,
    Tree,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProblemFile {
    pub a: SpaceSpec,
    pub b: SpaceSpec,
    /// Let original leaf edges vary as well.
    #[serde(default)]
    pub unrestricted: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SpaceSpec {
    pub tree: String,
    pub rows: Vec<RowSpec>,
    #[serde(default)]
    pub original_leaves: Vec<String>,
    /// Share each row's fixed length evenly instead of using the tree's lengths.
    #[serde(default)]
    pub even_start: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RowSpec {
    pub members: Vec<MemberSpec>,
    pub fixed_length: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MemberSpec {
    Clade(Vec<String>),
    Leaf(String),
}

impl ProblemFile {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing problem JSON")
    }

    pub fn spaces(&self) -> Result<(ExtensionSpace, ExtensionSpace)> {
        let a = self.a.build().context("space a")?;
        let b = self.b.build().context("space b")?;
        if a.leaf_set() != b.leaf_set() {
            bail!(
                "spaces list leaves differently: a has {:?}, b has {:?}",
                a.leaf_set(),
                b.leaf_set()
            );
        }
        Ok((a, b))
    }
}

impl SpaceSpec {
    pub fn build(&self) -> Result<ExtensionSpace> {
        let tree = parse_newick(&self.tree).with_context(|| format!("tree `{}`", self.tree))?;
        let original_leaves = self
            .original_leaves
            .iter()
            .map(|name| leaf(&tree, name))
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                let members = row
                    .members
                    .iter()
                    .map(|m| self.member(&tree, m))
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("row {r}"))?;
                Ok(ConstraintRow::new(members, row.fixed_length))
            })
            .collect::<Result<Vec<_>>>()?;
        let space = if self.even_start {
            ExtensionSpace::with_even_start(tree, rows, original_leaves)?
        } else {
            ExtensionSpace::new(tree, rows, original_leaves)?
        };
        Ok(space)
    }

    fn member(&self, tree: &Tree, spec: &MemberSpec) -> Result<Member> {
        match spec {
            MemberSpec::Clade(names) => {
                let leaves = names
                    .iter()
                    .map(|n| leaf(tree, n))
                    .collect::<Result<Vec<_>>>()?;
                let split = Split::from_leaves(tree.n_leaves(), leaves);
                tree.find_edge(&split)
                    .map(Member::Interior)
                    .ok_or_else(|| anyhow!("clade {names:?} is not an edge of the tree"))
            }
            MemberSpec::Leaf(name) => self
                .original_leaves
                .iter()
                .position(|l| l == name)
                .map(Member::Leaf)
                .ok_or_else(|| anyhow!("leaf `{name}` is not listed in original_leaves")),
        }
    }
}

fn leaf(tree: &Tree, name: &str) -> Result<usize> {
    tree.leaf_index(name)
        .ok_or_else(|| anyhow!("unknown leaf `{name}`"))
}

/// Serializable view of a solution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolutionRecord {
    pub distance: f64,
    pub iterations: usize,
    pub tree_a: String,
    pub tree_b: String,
    pub ratios: Vec<RatioRecord>,
    pub common: Vec<String>,
    pub values_a: Vec<f64>,
    pub values_b: Vec<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RatioRecord {
    pub e: Vec<String>,
    pub f: Vec<String>,
    pub e_length: f64,
    pub f_length: f64,
}

impl SolutionRecord {
    pub fn new(sol: &DistanceSolution) -> Self {
        let (a, b) = (&sol.tree_a, &sol.tree_b);
        Self {
            distance: sol.distance,
            iterations: sol.iterations,
            tree_a: to_newick(a),
            tree_b: to_newick(b),
            ratios: sol
                .geodesic
                .ratios
                .iter()
                .map(|r| RatioRecord {
                    e: r.e_edges.iter().map(|&i| clade(a, i)).collect(),
                    f: r.f_edges.iter().map(|&j| clade(b, j)).collect(),
                    e_length: r.e_length,
                    f_length: r.f_length,
                })
                .collect(),
            common: sol.geodesic.common_a.iter().map(|&i| clade(a, i)).collect(),
            values_a: sol.values_a.iter().copied().collect(),
            values_b: sol.values_b.iter().copied().collect(),
        }
    }
}
