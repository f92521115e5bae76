use super::newick::{format, parse, NewickError};
use super::*;

fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("t{i}")).collect()
}

#[test]
fn find_edge_falls_back_to_complement() {
    let n = 5;
    let s = Split::from_leaves(n, [0, 1]);
    let t = Tree::new(names(n), vec![Edge::new(s.clone(), 0.7)], vec![1.0; n]).unwrap();
    assert_eq!(t.edge_index(&s), Some(0));
    assert_eq!(t.edge_index(&s.complement()), None);
    assert_eq!(t.find_edge(&s.complement()), Some(0));
    assert!((t.length_of(&s.complement()) - 0.7).abs() < 1e-15);
    assert_eq!(t.length_of(&Split::from_leaves(n, [1, 2])), 0.0);
}

#[test]
fn new_rejects_bad_topologies() {
    let n = 5;
    let ab = Split::from_leaves(n, [0, 1]);
    let bc = Split::from_leaves(n, [1, 2]);
    let err = Tree::new(
        names(n),
        vec![Edge::new(ab.clone(), 1.0), Edge::new(bc, 1.0)],
        vec![0.0; n],
    )
    .unwrap_err();
    assert_eq!(err, TreeError::IncompatibleSplits(0, 1));

    let err = Tree::new(
        names(n),
        vec![Edge::new(ab.clone(), 1.0), Edge::new(ab.complement(), 1.0)],
        vec![0.0; n],
    )
    .unwrap_err();
    assert_eq!(err, TreeError::DuplicateSplit(0, 1));

    let err = Tree::new(
        names(n),
        vec![Edge::new(Split::from_leaves(n, [3]), 1.0)],
        vec![0.0; n],
    )
    .unwrap_err();
    assert_eq!(err, TreeError::TrivialSplit(0));

    let err = Tree::new(names(n), vec![Edge::new(ab, f64::NAN)], vec![0.0; n]).unwrap_err();
    assert!(matches!(err, TreeError::BadLength { .. }));
}

#[test]
fn with_lengths_keeps_topology() {
    let t = parse("((a:1,b:1):0.5,(c:1,d:1):0.25,e:1);").unwrap();
    let t2 = t.with_lengths(&[2.0, 3.0], &[0.0; 5]);
    assert_eq!(t2.edges().len(), 2);
    for (e, e2) in t.edges().iter().zip(t2.edges()) {
        assert_eq!(e.split, e2.split);
    }
    assert_eq!(t2.lengths(), vec![2.0, 3.0]);
    // original untouched
    assert_eq!(t.lengths(), vec![0.5, 0.25]);
}

#[test]
fn parse_merges_rooted_edges() {
    // Rooted at a degree-2 node: (a,b) and (c,d) are the same split.
    let t = parse("((a:1,b:2):0.3,(c:3,d:4):0.2);").unwrap();
    assert_eq!(t.n_leaves(), 4);
    assert_eq!(t.edges().len(), 1);
    assert!((t.edge(0).length - 0.5).abs() < 1e-12);
    assert_eq!(t.leaf_lengths(), &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn parse_folds_single_leaf_complement_into_pendant() {
    // (a,(b,c,d)) rooted: the cluster {b,c,d} is the pendant edge of a.
    let t = parse("(a:1,(b:1,c:1,d:1):0.5);").unwrap();
    assert!(t.edges().is_empty());
    assert!((t.leaf_lengths()[0] - 1.5).abs() < 1e-12);
}

#[test]
fn parse_errors() {
    assert!(matches!(parse("(a,b,c)"), Err(NewickError::UnexpectedEnd)));
    assert!(matches!(
        parse("(a:x,b,c);"),
        Err(NewickError::BadLength(_))
    ));
    assert!(matches!(parse("(a,,c);"), Err(NewickError::UnnamedLeaf(_))));
    assert!(matches!(
        parse("(a,b);"),
        Err(NewickError::Tree(TreeError::TooFewLeaves(2)))
    ));
    assert!(matches!(
        parse("(a,b,c);x"),
        Err(NewickError::Unexpected { found: 'x', .. })
    ));
}

#[test]
fn format_then_parse_preserves_splits_and_lengths() {
    let t = parse("(((a:1,b:2):0.5,c:1):0.75,(d:1,e:1):0.25,f:3);").unwrap();
    let s = format(&t);
    let back = parse(&s).unwrap();
    assert_eq!(back.n_leaves(), t.n_leaves());
    assert_eq!(back.edges().len(), t.edges().len());
    for e in t.edges() {
        // Clades here are contiguous, so the leaf numbering survives.
        let j = back.find_edge(&e.split).expect("split survives");
        assert!((back.edge(j).length - e.length).abs() < 1e-12);
    }
    for (x, y) in t.leaf_lengths().iter().zip(back.leaf_lengths()) {
        assert!((x - y).abs() < 1e-12);
    }
}
