//! HDBSCAN density clustering over the embedding.
//!
//! Pipeline: core distances -> mutual reachability -> minimum spanning
//! tree -> single-linkage hierarchy -> condensed tree (min_cluster_size)
//! -> stability -> excess-of-mass selection. Points that never join a
//! selected cluster are labeled noise (-1).
//!
//! The whole computation is deterministic: ties are broken by point index
//! and clusters are numbered in condensed-tree order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::HdbscanConfig;

use super::error::ClusterError;

/// Noise label.
pub const NOISE: i32 = -1;

/// How clusters are extracted from the condensed hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ClusterSelectionMethod {
    /// Excess of Mass: prefer stable clusters over maximizing count.
    #[default]
    EOM,
    /// Leaf clusters only: more granular partitions.
    Leaf,
}

/// Parameters for the density clusterer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HdbscanParams {
    /// Minimum number of points to form a cluster.
    pub min_cluster_size: usize,

    /// Core-point threshold. `None` falls back to `min_cluster_size`.
    pub min_samples: Option<usize>,

    /// Distance threshold below which adjacent clusters are merged.
    pub cluster_selection_epsilon: f32,

    /// Extraction method.
    pub cluster_selection_method: ClusterSelectionMethod,
}

impl Default for HdbscanParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 30,
            min_samples: None,
            cluster_selection_epsilon: 0.0,
            cluster_selection_method: ClusterSelectionMethod::EOM,
        }
    }
}

impl HdbscanParams {
    pub fn from_config(config: &HdbscanConfig) -> Self {
        Self {
            min_cluster_size: config.min_cluster_size,
            min_samples: config.min_samples,
            cluster_selection_epsilon: config.cluster_selection_epsilon,
            cluster_selection_method: ClusterSelectionMethod::EOM,
        }
    }

    #[must_use]
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    #[must_use]
    pub fn with_min_samples(mut self, samples: usize) -> Self {
        self.min_samples = Some(samples);
        self
    }

    #[must_use]
    pub fn with_selection_epsilon(mut self, epsilon: f32) -> Self {
        self.cluster_selection_epsilon = epsilon;
        self
    }

    /// Effective core-point threshold.
    pub fn effective_min_samples(&self) -> usize {
        self.min_samples.unwrap_or(self.min_cluster_size)
    }

    /// Validate parameters. Values are not auto-clamped.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.min_cluster_size < 2 {
            return Err(ClusterError::invalid_parameter(format!(
                "min_cluster_size must be >= 2, got {}",
                self.min_cluster_size
            )));
        }
        if let Some(min_samples) = self.min_samples {
            if min_samples < 1 {
                return Err(ClusterError::invalid_parameter(
                    "min_samples must be >= 1",
                ));
            }
            if min_samples > self.min_cluster_size {
                return Err(ClusterError::invalid_parameter(format!(
                    "min_samples ({}) must be <= min_cluster_size ({})",
                    min_samples, self.min_cluster_size
                )));
            }
        }
        if self.cluster_selection_epsilon < 0.0 {
            return Err(ClusterError::invalid_parameter(
                "cluster_selection_epsilon must be >= 0.0",
            ));
        }
        Ok(())
    }
}

/// Result of one clustering run.
#[derive(Debug, Clone)]
pub struct ClusterResult {
    /// Per-point label; `-1` is noise, others are dense ids from 0.
    pub labels: Vec<i32>,
    pub n_clusters: usize,
    pub n_noise: usize,
}

/// Density clusterer with validated parameters.
#[derive(Debug, Clone)]
pub struct HdbscanClusterer {
    params: HdbscanParams,
}

// Internal hierarchy node: children are point ids (< n) or earlier
// internal nodes (>= n).
struct LinkageNode {
    left: usize,
    right: usize,
    distance: f32,
    size: usize,
}

// One cluster of the condensed tree.
#[derive(Debug, Default)]
struct CondensedCluster {
    parent: Option<usize>,
    birth_lambda: f32,
    /// Direct point children with the lambda at which they left.
    points: Vec<(usize, f32)>,
    children: Vec<usize>,
    /// Total points in the subtree.
    size: usize,
    stability: f32,
}

impl HdbscanClusterer {
    pub fn new(params: HdbscanParams) -> Result<Self, ClusterError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Cluster an embedding (Euclidean metric).
    ///
    /// Degenerate batches never error: fewer points than
    /// `min_cluster_size` gives an all-noise labeling.
    pub fn fit(&self, embedding: &[Vec<f32>]) -> Result<ClusterResult, ClusterError> {
        let n = embedding.len();
        if n == 0 {
            return Ok(ClusterResult {
                labels: Vec::new(),
                n_clusters: 0,
                n_noise: 0,
            });
        }
        let dim = embedding[0].len();
        for (row, point) in embedding.iter().enumerate() {
            if point.len() != dim {
                return Err(ClusterError::DimensionMismatch {
                    expected: dim,
                    actual: point.len(),
                    row,
                });
            }
        }
        if n < self.params.min_cluster_size {
            return Ok(ClusterResult {
                labels: vec![NOISE; n],
                n_clusters: 0,
                n_noise: n,
            });
        }

        let core = core_distances(embedding, self.params.effective_min_samples().min(n - 1).max(1));
        let mst = mutual_reachability_mst(embedding, &core);
        let linkage = single_linkage(&mst, n);
        let mut clusters = condense_tree(&linkage, n, self.params.min_cluster_size);
        compute_stability(&mut clusters);
        let selected = match self.params.cluster_selection_method {
            ClusterSelectionMethod::EOM => select_eom(&clusters),
            ClusterSelectionMethod::Leaf => select_leaves(&clusters),
        };
        let selected = apply_selection_epsilon(
            &clusters,
            selected,
            self.params.cluster_selection_epsilon,
        );
        let labels = assign_labels(&clusters, &selected, n);

        let n_noise = labels.iter().filter(|&&l| l == NOISE).count();
        let n_clusters = selected.iter().filter(|&&s| s).count();
        tracing::debug!(n, n_clusters, n_noise, "hdbscan fit complete");

        Ok(ClusterResult {
            labels,
            n_clusters,
            n_noise,
        })
    }
}

fn euclidean(x: &[f32], y: &[f32]) -> f32 {
    x.iter()
        .zip(y)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f32>()
        .sqrt()
}

/// Distance to the k-th nearest other point.
fn core_distances(embedding: &[Vec<f32>], k: usize) -> Vec<f32> {
    embedding
        .par_iter()
        .enumerate()
        .map(|(i, point)| {
            let mut dists: Vec<f32> = embedding
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, other)| euclidean(point, other))
                .collect();
            let idx = k - 1;
            let (_, kth, _) = dists.select_nth_unstable_by(idx, |a, b| {
                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
            });
            *kth
        })
        .collect()
}

/// Prim MST over the implicit mutual-reachability graph.
///
/// Returns edges sorted ascending by weight (ties by endpoint indices).
fn mutual_reachability_mst(embedding: &[Vec<f32>], core: &[f32]) -> Vec<(usize, usize, f32)> {
    let n = embedding.len();
    let mut in_tree = vec![false; n];
    let mut best_dist = vec![f32::INFINITY; n];
    let mut best_from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));

    let mut current = 0usize;
    in_tree[0] = true;
    for _ in 1..n {
        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let d = euclidean(&embedding[current], &embedding[j])
                .max(core[current])
                .max(core[j]);
            if d < best_dist[j] {
                best_dist[j] = d;
                best_from[j] = current;
            }
        }
        // Deterministic: smallest distance, then smallest index.
        let mut next = usize::MAX;
        for j in 0..n {
            if !in_tree[j] && (next == usize::MAX || best_dist[j] < best_dist[next]) {
                next = j;
            }
        }
        if next == usize::MAX {
            break;
        }
        edges.push((best_from[next], next, best_dist[next]));
        in_tree[next] = true;
        current = next;
    }

    edges.sort_unstable_by(|a, b| {
        a.2.partial_cmp(&b.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (a.0, a.1).cmp(&(b.0, b.1)))
    });
    edges
}

/// Union-find single-linkage dendrogram from sorted MST edges.
///
/// Leaves are 0..n; internal node `n + e` merges at edge `e`'s weight.
fn single_linkage(edges: &[(usize, usize, f32)], n: usize) -> Vec<LinkageNode> {
    let total = n + edges.len();
    let mut parent: Vec<usize> = (0..total).collect();
    let mut size: Vec<usize> = vec![1; total];

    fn find(parent: &mut Vec<usize>, mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut nodes = Vec::with_capacity(edges.len());
    for (e, &(a, b, distance)) in edges.iter().enumerate() {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        let merged = n + e;
        let node_size = size[ra] + size[rb];
        size[merged] = node_size;
        parent[ra] = merged;
        parent[rb] = merged;
        nodes.push(LinkageNode {
            left: ra,
            right: rb,
            distance,
            size: node_size,
        });
    }
    nodes
}

fn node_size(linkage: &[LinkageNode], n: usize, id: usize) -> usize {
    if id < n {
        1
    } else {
        linkage[id - n].size
    }
}

/// All leaf point ids under a hierarchy node.
fn collect_points(linkage: &[LinkageNode], n: usize, id: usize, out: &mut Vec<usize>) {
    let mut stack = vec![id];
    while let Some(x) = stack.pop() {
        if x < n {
            out.push(x);
        } else {
            let node = &linkage[x - n];
            stack.push(node.left);
            stack.push(node.right);
        }
    }
}

/// Condense the dendrogram: only splits where both sides reach
/// `min_cluster_size` create new clusters; smaller sides fall out as
/// points at the split's lambda.
fn condense_tree(linkage: &[LinkageNode], n: usize, min_cluster_size: usize) -> Vec<CondensedCluster> {
    let mut clusters: Vec<CondensedCluster> = vec![CondensedCluster {
        parent: None,
        birth_lambda: 0.0,
        ..Default::default()
    }];

    if linkage.is_empty() {
        // Single point: it falls out of the root immediately.
        if n == 1 {
            clusters[0].points.push((0, 0.0));
        }
        return clusters;
    }

    let root = n + linkage.len() - 1;
    // (hierarchy node, condensed cluster it currently belongs to)
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

    while let Some((h, c)) = stack.pop() {
        let node = &linkage[h - n];
        let lambda = if node.distance > 0.0 {
            1.0 / node.distance
        } else {
            f32::MAX
        };
        let left_big = node_size(linkage, n, node.left) >= min_cluster_size;
        let right_big = node_size(linkage, n, node.right) >= min_cluster_size;

        match (left_big, right_big) {
            (true, true) => {
                for &child in &[node.left, node.right] {
                    let id = clusters.len();
                    clusters.push(CondensedCluster {
                        parent: Some(c),
                        birth_lambda: lambda,
                        ..Default::default()
                    });
                    clusters[c].children.push(id);
                    stack.push((child, id));
                }
            }
            (true, false) => {
                drop_points(linkage, n, node.right, lambda, &mut clusters[c]);
                descend(n, node.left, c, lambda, &mut clusters, &mut stack);
            }
            (false, true) => {
                drop_points(linkage, n, node.left, lambda, &mut clusters[c]);
                descend(n, node.right, c, lambda, &mut clusters, &mut stack);
            }
            (false, false) => {
                drop_points(linkage, n, node.left, lambda, &mut clusters[c]);
                drop_points(linkage, n, node.right, lambda, &mut clusters[c]);
            }
        }
    }

    // Subtree sizes, children created after parents so one reverse pass works.
    for id in (0..clusters.len()).rev() {
        let own = clusters[id].points.len();
        let child_sum: usize = clusters[id].children.iter().map(|&ch| clusters[ch].size).sum();
        clusters[id].size = own + child_sum;
    }

    clusters
}

/// A child subtree keeps the parent's cluster identity: points descend,
/// internal nodes go back on the stack.
fn descend(
    n: usize,
    child: usize,
    cluster: usize,
    lambda: f32,
    clusters: &mut [CondensedCluster],
    stack: &mut Vec<(usize, usize)>,
) {
    if child < n {
        clusters[cluster].points.push((child, lambda));
    } else {
        stack.push((child, cluster));
    }
}

/// Every point under `id` leaves `cluster` at `lambda`.
fn drop_points(
    linkage: &[LinkageNode],
    n: usize,
    id: usize,
    lambda: f32,
    cluster: &mut CondensedCluster,
) {
    let mut points = Vec::new();
    collect_points(linkage, n, id, &mut points);
    points.sort_unstable();
    for p in points {
        cluster.points.push((p, lambda));
    }
}

/// Stability: sum over departures of `(lambda_leave - lambda_birth) * size`.
fn compute_stability(clusters: &mut [CondensedCluster]) {
    for id in 0..clusters.len() {
        let birth = clusters[id].birth_lambda;
        let point_mass: f32 = clusters[id]
            .points
            .iter()
            .map(|&(_, lambda)| (lambda - birth).max(0.0))
            .sum();
        let child_mass: f32 = clusters[id]
            .children
            .iter()
            .map(|&ch| (clusters[ch].birth_lambda - birth).max(0.0) * clusters[ch].size as f32)
            .sum();
        clusters[id].stability = point_mass + child_mass;
    }
}

/// Excess-of-mass selection. The root is never selectable.
fn select_eom(clusters: &[CondensedCluster]) -> Vec<bool> {
    let mut selected = vec![false; clusters.len()];
    let mut subtree_stability = vec![0.0f32; clusters.len()];

    // Children have larger ids than their parents; reverse order is
    // bottom-up.
    for id in (0..clusters.len()).rev() {
        let child_sum: f32 = clusters[id]
            .children
            .iter()
            .map(|&ch| subtree_stability[ch])
            .sum();
        let is_root = clusters[id].parent.is_none();
        if !is_root && (clusters[id].children.is_empty() || clusters[id].stability > child_sum) {
            selected[id] = true;
            unselect_descendants(clusters, id, &mut selected);
            subtree_stability[id] = clusters[id].stability.max(child_sum);
        } else {
            subtree_stability[id] = child_sum.max(if is_root { 0.0 } else { clusters[id].stability });
        }
    }
    selected
}

/// Leaf-only selection: clusters with no cluster children, root excluded.
fn select_leaves(clusters: &[CondensedCluster]) -> Vec<bool> {
    clusters
        .iter()
        .map(|c| c.parent.is_some() && c.children.is_empty())
        .collect()
}

fn unselect_descendants(clusters: &[CondensedCluster], id: usize, selected: &mut [bool]) {
    let mut stack = clusters[id].children.clone();
    while let Some(ch) = stack.pop() {
        selected[ch] = false;
        stack.extend(clusters[ch].children.iter().copied());
    }
}

/// Epsilon merge: a selected cluster born below the epsilon distance is
/// replaced by its highest ancestor also born below it (root excluded).
fn apply_selection_epsilon(
    clusters: &[CondensedCluster],
    mut selected: Vec<bool>,
    epsilon: f32,
) -> Vec<bool> {
    if epsilon <= 0.0 {
        return selected;
    }
    let birth_distance = |id: usize| -> f32 {
        let lambda = clusters[id].birth_lambda;
        if lambda > 0.0 {
            1.0 / lambda
        } else {
            f32::INFINITY
        }
    };

    let originally: Vec<usize> = (0..clusters.len()).filter(|&id| selected[id]).collect();
    for id in originally {
        if !selected[id] || birth_distance(id) >= epsilon {
            continue;
        }
        let mut candidate = id;
        let mut walk = clusters[id].parent;
        while let Some(p) = walk {
            if clusters[p].parent.is_none() {
                break; // never promote to root
            }
            if birth_distance(p) < epsilon {
                candidate = p;
            }
            walk = clusters[p].parent;
        }
        if candidate != id {
            selected[candidate] = true;
            unselect_descendants(clusters, candidate, &mut selected);
        }
    }
    selected
}

/// Points of every selected cluster's subtree get that cluster's dense
/// label; everything else is noise.
fn assign_labels(clusters: &[CondensedCluster], selected: &[bool], n: usize) -> Vec<i32> {
    let mut labels = vec![NOISE; n];
    let mut next = 0i32;
    for id in 0..clusters.len() {
        if !selected[id] {
            continue;
        }
        let label = next;
        next += 1;
        let mut stack = vec![id];
        while let Some(c) = stack.pop() {
            for &(p, _) in &clusters[c].points {
                labels[p] = label;
            }
            stack.extend(clusters[c].children.iter().copied());
        }
    }
    labels
}
