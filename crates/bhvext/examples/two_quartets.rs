//! Distance between two extension spaces on five leaves.
//!
//! Side A merges the two interior edges of `((a,b),c,(d,e))` into one row of
//! length 1; side B does the same for `(a,(b,c),(d,e))`. The solver slides
//! length between the edges until the trees are as close as the rows allow.

use bhvext::prelude::*;
use bhvext::report::summary;

fn space(newick_str: &str) -> Result<ExtensionSpace, Box<dyn std::error::Error>> {
    let topology = newick::parse(newick_str)?;
    let row = ConstraintRow::new(vec![Member::Interior(0), Member::Interior(1)], 1.0);
    Ok(ExtensionSpace::with_even_start(topology, vec![row], vec![])?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let a = space("((a:1,b:1):1,c:1,(d:1,e:1):1);")?;
    let b = space("(a:1,(b:1,c:1):1,(d:1,e:1):1);")?;
    let start = GtpEngine.geodesic(a.start(), b.start())?.distance;
    let sol = solve_with_defaults(&a, &b)?;
    println!("start distance {start:.12}");
    println!("{}", summary(&sol));
    Ok(())
}
