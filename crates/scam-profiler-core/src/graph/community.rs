//! Modularity-based community detection (Louvain).
//!
//! Deterministic variant: nodes are visited in index order and community
//! ties resolve through ordered maps, so the same graph always partitions
//! the same way. Communities are renumbered densely in first-seen order.

use std::collections::BTreeMap;

/// Adjacency list; a self-loop is stored once with doubled weight so the
/// node degree comes out right.
fn build_adjacency(n: usize, edges: &[(usize, usize, f64)]) -> Vec<Vec<(usize, f64)>> {
    let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for &(a, b, w) in edges {
        if a == b {
            adj[a].push((a, 2.0 * w));
        } else {
            adj[a].push((b, w));
            adj[b].push((a, w));
        }
    }
    adj
}

/// One local-move phase. Returns (community per node, any move made).
fn one_level(adj: &[Vec<(usize, f64)>], m2: f64) -> (Vec<usize>, bool) {
    let n = adj.len();
    let degree: Vec<f64> = adj
        .iter()
        .map(|nb| nb.iter().map(|&(_, w)| w).sum())
        .collect();
    let mut community: Vec<usize> = (0..n).collect();
    let mut tot: Vec<f64> = degree.clone();
    let mut improved = false;

    loop {
        let mut moves = 0usize;
        for i in 0..n {
            let current = community[i];

            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for &(j, w) in &adj[i] {
                if j != i {
                    *links.entry(community[j]).or_insert(0.0) += w;
                }
            }

            tot[current] -= degree[i];
            let stay_weight = links.get(&current).copied().unwrap_or(0.0);
            let mut best = current;
            let mut best_gain = stay_weight - tot[current] * degree[i] / m2;
            for (&candidate, &weight) in &links {
                if candidate == current {
                    continue;
                }
                let gain = weight - tot[candidate] * degree[i] / m2;
                if gain > best_gain + 1e-12 {
                    best_gain = gain;
                    best = candidate;
                }
            }
            tot[best] += degree[i];

            if best != current {
                community[i] = best;
                moves += 1;
                improved = true;
            }
        }
        if moves == 0 {
            break;
        }
    }

    (community, improved)
}

/// Renumber labels densely in first-seen order.
fn renumber(labels: &[usize]) -> Vec<usize> {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let mut next = 0usize;
    labels
        .iter()
        .map(|&label| {
            *mapping.entry(label).or_insert_with(|| {
                let id = next;
                next += 1;
                id
            })
        })
        .collect()
}

/// Full multi-level Louvain over an undirected weighted edge list.
///
/// Returns a dense community id per node. Isolated nodes keep singleton
/// communities.
pub fn louvain_communities(n: usize, edges: &[(usize, usize, f64)]) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }

    let mut membership: Vec<usize> = (0..n).collect();
    let mut level_n = n;
    let mut level_edges: Vec<(usize, usize, f64)> = edges.to_vec();

    loop {
        let adj = build_adjacency(level_n, &level_edges);
        let m2: f64 = adj
            .iter()
            .map(|nb| nb.iter().map(|&(_, w)| w).sum::<f64>())
            .sum();
        if m2 == 0.0 {
            break;
        }

        let (community, improved) = one_level(&adj, m2);
        let community = renumber(&community);
        let n_communities = community.iter().copied().max().map_or(0, |m| m + 1);

        for slot in membership.iter_mut() {
            *slot = community[*slot];
        }

        if !improved || n_communities == level_n {
            break;
        }

        // Aggregate: communities become nodes, weights sum.
        let mut merged: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(a, b, w) in &level_edges {
            let (ca, cb) = (community[a], community[b]);
            let key = (ca.min(cb), ca.max(cb));
            *merged.entry(key).or_insert(0.0) += w;
        }
        level_edges = merged.into_iter().map(|((a, b), w)| (a, b, w)).collect();
        level_n = n_communities;
    }

    renumber(&membership)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clique on the given nodes.
    fn clique(nodes: &[usize]) -> Vec<(usize, usize, f64)> {
        let mut edges = Vec::new();
        for (i, &a) in nodes.iter().enumerate() {
            for &b in &nodes[i + 1..] {
                edges.push((a, b, 1.0));
            }
        }
        edges
    }

    #[test]
    fn test_two_cliques_with_bridge() {
        let mut edges = clique(&[0, 1, 2, 3]);
        edges.extend(clique(&[4, 5, 6, 7]));
        edges.push((3, 4, 1.0)); // bridge

        let communities = louvain_communities(8, &edges);
        assert_eq!(communities[0], communities[1]);
        assert_eq!(communities[0], communities[2]);
        assert_eq!(communities[0], communities[3]);
        assert_eq!(communities[4], communities[5]);
        assert_eq!(communities[4], communities[7]);
        assert_ne!(communities[0], communities[4], "cliques must split");
    }

    #[test]
    fn test_no_edges_yields_singletons() {
        let communities = louvain_communities(3, &[]);
        assert_eq!(communities, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_graph() {
        assert!(louvain_communities(0, &[]).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let mut edges = clique(&[0, 1, 2]);
        edges.extend(clique(&[3, 4, 5]));
        edges.push((2, 3, 1.0));
        let a = louvain_communities(6, &edges);
        let b = louvain_communities(6, &edges);
        assert_eq!(a, b);
    }
}
