//! Minimum-weight vertex cover of a bipartite graph via max-flow/min-cut.
//!
//! Network: source → left (capacity = weight), left → right (∞ for every
//! graph edge), right → sink (capacity = weight). With `S` the vertices
//! reachable from the source in the final residual graph, the cover is
//! `(left \ S) ∪ (right ∩ S)` and its weight equals the max flow.

use std::collections::VecDeque;

use crate::cfg::FLOW_EPS;

pub(crate) struct Cover {
    pub left: Vec<bool>,
    pub right: Vec<bool>,
    pub weight: f64,
}

/// `adj[i]` lists the right vertices adjacent to left vertex `i`.
pub(crate) fn min_weight_cover(wl: &[f64], wr: &[f64], adj: &[Vec<usize>]) -> Cover {
    let (nl, nr) = (wl.len(), wr.len());
    let n = nl + nr + 2;
    let (s, t) = (0, n - 1);
    let left = |i: usize| 1 + i;
    let right = |j: usize| 1 + nl + j;

    let mut cap = vec![vec![0.0f64; n]; n];
    for (i, &w) in wl.iter().enumerate() {
        cap[s][left(i)] = w;
        for &j in &adj[i] {
            cap[left(i)][right(j)] = f64::INFINITY;
        }
    }
    for (j, &w) in wr.iter().enumerate() {
        cap[right(j)][t] = w;
    }
    let mut flow = vec![vec![0.0f64; n]; n];
    let residual = |cap: &[Vec<f64>], flow: &[Vec<f64>], u: usize, v: usize| cap[u][v] - flow[u][v];

    // Edmonds–Karp.
    loop {
        let parent = bfs(n, s, |u, v| residual(&cap, &flow, u, v) > FLOW_EPS);
        if parent[t].is_none() {
            break;
        }
        let mut bottleneck = f64::INFINITY;
        let mut v = t;
        while v != s {
            let Some(u) = parent[v] else { break };
            bottleneck = bottleneck.min(residual(&cap, &flow, u, v));
            v = u;
        }
        if !(bottleneck.is_finite() && bottleneck > FLOW_EPS) {
            break;
        }
        let mut v = t;
        while v != s {
            let Some(u) = parent[v] else { break };
            flow[u][v] += bottleneck;
            flow[v][u] -= bottleneck;
            v = u;
        }
    }

    let reach = bfs(n, s, |u, v| residual(&cap, &flow, u, v) > FLOW_EPS);
    let reachable = |x: usize| x == s || reach[x].is_some();
    let left_cover: Vec<bool> = (0..nl).map(|i| !reachable(left(i))).collect();
    let right_cover: Vec<bool> = (0..nr).map(|j| reachable(right(j))).collect();
    let weight: f64 = wl
        .iter()
        .zip(&left_cover)
        .chain(wr.iter().zip(&right_cover))
        .filter(|(_, c)| **c)
        .map(|(w, _)| w)
        .sum();
    Cover {
        left: left_cover,
        right: right_cover,
        weight,
    }
}

/// BFS parents from `s` over arcs accepted by `open`.
fn bfs(n: usize, s: usize, open: impl Fn(usize, usize) -> bool) -> Vec<Option<usize>> {
    let mut parent = vec![None; n];
    let mut seen = vec![false; n];
    seen[s] = true;
    let mut q = VecDeque::from([s]);
    while let Some(u) = q.pop_front() {
        for v in 0..n {
            if !seen[v] && open(u, v) {
                seen[v] = true;
                parent[v] = Some(u);
                q.push_back(v);
            }
        }
    }
    parent
}
