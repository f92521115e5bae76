//! Human-readable rendering of solver results. Formatting only.

use std::fmt::{self, Write as _};

use crate::geodesic::Geodesic;
use crate::solver::DistanceSolution;
use crate::tree::{newick, Split, Tree};

impl fmt::Display for DistanceSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "distance   {:.12}", self.distance)?;
        writeln!(f, "iterations {}", self.iterations)?;
        writeln!(f, "tree A     {}", newick::format(&self.tree_a))?;
        write!(f, "tree B     {}", newick::format(&self.tree_b))
    }
}

/// Distance, iteration count and both trees, followed by the ratio table.
pub fn summary(sol: &DistanceSolution) -> String {
    let mut out = sol.to_string();
    out.push('\n');
    out.push_str(&ratio_table(&sol.geodesic, &sol.tree_a, &sol.tree_b));
    out
}

/// One line per ratio `(E_i, F_i)` plus the common edges.
pub fn ratio_table(geo: &Geodesic, a: &Tree, b: &Tree) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>3}  {:>10}  {:>10}  {:>10}  edges", "#", "|E|", "|F|", "|E|/|F|");
    for (k, r) in geo.ratios.iter().enumerate() {
        let e: Vec<String> = r.e_edges.iter().map(|&i| clade(a, i)).collect();
        let f: Vec<String> = r.f_edges.iter().map(|&j| clade(b, j)).collect();
        let _ = writeln!(
            out,
            "{:>3}  {:>10.6}  {:>10.6}  {:>10.4}  {} -> {}",
            k,
            r.e_length,
            r.f_length,
            r.value(),
            e.join(" "),
            f.join(" ")
        );
    }
    for split in geo.common_splits(a, b) {
        let _ = writeln!(
            out,
            "  =  {:>10.6}  {:>10.6}  {:>10}  {}",
            a.length_of(&split),
            b.length_of(&split),
            "",
            clade_of(a, &split.canonical())
        );
    }
    out
}

/// Leaf names of edge `i`'s side without leaf 0, as `{x,y}`.
pub fn clade(tree: &Tree, i: usize) -> String {
    clade_of(tree, &tree.edge(i).split.canonical())
}

fn clade_of(tree: &Tree, split: &Split) -> String {
    let names: Vec<&str> = split.leaves().map(|l| tree.leaves()[l].as_str()).collect();
    format!("{{{}}}", names.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesic::{GeodesicEngine, GtpEngine};
    use crate::tree::newick::parse;

    #[test]
    fn ratio_table_lists_ratios_and_common_edges() {
        let a = parse("((a:1,b:1):0.5,c:1,(d:1,e:1):0.2);").unwrap();
        let b = parse("(a:1,(b:1,c:1):0.5,(d:1,e:1):0.3);").unwrap();
        let g = GtpEngine.geodesic(&a, &b).unwrap();
        let t = ratio_table(&g, &a, &b);
        assert!(t.contains("{c,d,e} -> {b,c}"), "{t}");
        assert!(t.contains("{d,e}"), "{t}");
        assert_eq!(t.lines().count(), 3);
    }
}
