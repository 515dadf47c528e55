//! Manifold embedding of the sparse feature matrix.
//!
//! A seeded UMAP-style projection: cosine k-NN graph over the lexical
//! feature space, smooth-kNN kernel calibration, fuzzy-union
//! symmetrization, then SGD layout with negative sampling. The fit is
//! deterministic for a given seed, and a model fit on one batch is never
//! applied to a disjoint batch; every run fits fresh.
//!
//! ```text
//! feature matrix ─> k-NN (cosine) ─> fuzzy graph ─> seeded SGD ─> embedding
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::UmapConfig;
use crate::error::{CoreError, CoreResult};
use crate::features::matrix::SparseMatrix;

/// Gradient clip bound, as in the reference implementation.
const GRAD_CLIP: f32 = 4.0;

/// Parameters for the manifold projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmapParams {
    /// Neighborhood size for the k-NN graph.
    pub n_neighbors: usize,
    /// Minimum spacing between embedded points.
    pub min_dist: f32,
    /// Output dimensionality.
    pub n_components: usize,
    /// RNG seed for init and negative sampling.
    pub seed: u64,
    /// Optimization epochs. `None` picks 500 for small batches, 200 above 10k rows.
    pub n_epochs: Option<usize>,
    /// Initial SGD learning rate.
    pub learning_rate: f32,
    /// Negative samples per positive edge sample.
    pub negative_sample_rate: usize,
}

impl Default for UmapParams {
    fn default() -> Self {
        Self {
            n_neighbors: 30,
            min_dist: 0.1,
            n_components: 10,
            seed: 42,
            n_epochs: None,
            learning_rate: 1.0,
            negative_sample_rate: 5,
        }
    }
}

impl UmapParams {
    /// Derive params from pipeline config, for the clustering projection.
    pub fn from_config(config: &UmapConfig) -> Self {
        Self {
            n_neighbors: config.n_neighbors,
            min_dist: config.min_dist,
            n_components: config.n_components,
            seed: config.seed,
            ..Self::default()
        }
    }

    /// Same neighborhood parameters, 2-D output for visualization.
    pub fn for_visualization(config: &UmapConfig) -> Self {
        Self {
            n_components: config.viz_components,
            ..Self::from_config(config)
        }
    }

    #[must_use]
    pub fn with_n_neighbors(mut self, n: usize) -> Self {
        self.n_neighbors = n;
        self
    }

    #[must_use]
    pub fn with_n_components(mut self, n: usize) -> Self {
        self.n_components = n;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate parameters. Fails fast with descriptive messages.
    pub fn validate(&self) -> CoreResult<()> {
        if self.n_neighbors < 2 {
            return Err(CoreError::InvalidParameter(format!(
                "n_neighbors must be >= 2, got {}",
                self.n_neighbors
            )));
        }
        if self.n_components == 0 {
            return Err(CoreError::InvalidParameter(
                "n_components must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_dist) {
            return Err(CoreError::InvalidParameter(format!(
                "min_dist must be in [0.0, 1.0], got {}",
                self.min_dist
            )));
        }
        if self.learning_rate <= 0.0 {
            return Err(CoreError::InvalidParameter(
                "learning_rate must be > 0".to_string(),
            ));
        }
        if self.negative_sample_rate == 0 {
            return Err(CoreError::InvalidParameter(
                "negative_sample_rate must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The fitted projection. Diagnostics only; consumed with the run.
#[derive(Debug, Clone)]
pub struct UmapModel {
    pub params: UmapParams,
    /// Fitted curve parameters derived from `min_dist`.
    pub a: f32,
    pub b: f32,
    /// Number of rows this model was fit on.
    pub n_fit: usize,
}

/// One symmetrized fuzzy-graph edge.
struct Edge {
    head: usize,
    tail: usize,
    weight: f32,
}

/// Fit the projection on a batch and embed it.
///
/// Degenerate batches are not errors: a single row embeds at the origin.
/// `n_neighbors` is clamped to `n - 1` with a warning when the batch is
/// smaller than the configured neighborhood.
pub fn fit_embed(matrix: &SparseMatrix, params: &UmapParams) -> CoreResult<(UmapModel, Vec<Vec<f32>>)> {
    params.validate()?;
    let n = matrix.n_rows();
    if n == 0 {
        return Err(CoreError::EmptyBatch {
            context: "embedding".to_string(),
        });
    }

    let (a, b) = find_ab_params(1.0, params.min_dist);
    let model = UmapModel {
        params: params.clone(),
        a,
        b,
        n_fit: n,
    };

    if n == 1 {
        return Ok((model, vec![vec![0.0; params.n_components]]));
    }

    let k = if params.n_neighbors > n - 1 {
        tracing::warn!(
            requested = params.n_neighbors,
            clamped = n - 1,
            "n_neighbors exceeds batch size, clamping"
        );
        n - 1
    } else {
        params.n_neighbors
    };

    let knn = nearest_neighbors(matrix, k);
    let edges = fuzzy_graph(&knn, n, k);
    let embedding = optimize_layout(&edges, n, params, a, b);

    Ok((model, embedding))
}

/// Brute-force cosine k-NN, deterministic order (distance, then index).
fn nearest_neighbors(matrix: &SparseMatrix, k: usize) -> Vec<Vec<(usize, f32)>> {
    let n = matrix.n_rows();
    (0..n)
        .into_par_iter()
        .map(|i| {
            let mut dists: Vec<(usize, f32)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, matrix.cosine_distance(i, j)))
                .collect();
            dists.sort_unstable_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            dists.truncate(k);
            dists
        })
        .collect()
}

/// Calibrate the smooth-kNN kernel for one point: returns (rho, sigma).
///
/// `rho` is the distance to the nearest neighbor; `sigma` is found by
/// binary search so the kernel mass equals `log2(k)`.
fn smooth_knn_dist(dists: &[f32], k: usize) -> (f32, f32) {
    let rho = dists
        .iter()
        .copied()
        .filter(|&d| d > 0.0)
        .fold(f32::INFINITY, f32::min);
    let rho = if rho.is_finite() { rho } else { 0.0 };

    let target = (k as f32).log2();
    let mut lo = 0.0f32;
    let mut hi = f32::INFINITY;
    let mut mid = 1.0f32;

    for _ in 0..64 {
        let psum: f32 = dists
            .iter()
            .map(|&d| {
                let shifted = (d - rho).max(0.0);
                if mid > 0.0 {
                    (-shifted / mid).exp()
                } else if shifted == 0.0 {
                    1.0
                } else {
                    0.0
                }
            })
            .sum();

        if (psum - target).abs() < 1e-5 {
            break;
        }
        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    (rho, mid.max(1e-10))
}

/// Directed membership strengths, symmetrized by fuzzy union
/// `w = a + b - a*b`.
fn fuzzy_graph(knn: &[Vec<(usize, f32)>], n: usize, k: usize) -> Vec<Edge> {
    let mut directed: Vec<std::collections::HashMap<usize, f32>> = vec![Default::default(); n];
    for (i, neighbors) in knn.iter().enumerate() {
        let dist_values: Vec<f32> = neighbors.iter().map(|&(_, d)| d).collect();
        let (rho, sigma) = smooth_knn_dist(&dist_values, k);
        for &(j, d) in neighbors {
            let weight = (-(d - rho).max(0.0) / sigma).exp();
            directed[i].insert(j, weight);
        }
    }

    // Collect both directions per unordered pair; a neighbor relation is
    // often asymmetric. BTreeMap keeps edge order deterministic.
    let mut pairs: std::collections::BTreeMap<(usize, usize), (f32, f32)> = Default::default();
    for (i, weights) in directed.iter().enumerate() {
        for (&j, &w) in weights {
            let entry = pairs.entry((i.min(j), i.max(j))).or_insert((0.0, 0.0));
            if i < j {
                entry.0 = w;
            } else {
                entry.1 = w;
            }
        }
    }

    pairs
        .into_iter()
        .filter_map(|((head, tail), (w_fwd, w_back))| {
            let weight = w_fwd + w_back - w_fwd * w_back;
            (weight > 0.0).then_some(Edge { head, tail, weight })
        })
        .collect()
}

/// Fit the output-space curve `1 / (1 + a x^(2b))` to the min_dist shaped
/// target by deterministic two-stage grid refinement.
fn find_ab_params(spread: f32, min_dist: f32) -> (f32, f32) {
    let xs: Vec<f32> = (0..300).map(|i| i as f32 * (3.0 * spread) / 299.0).collect();
    let target = |x: f32| -> f32 {
        if x <= min_dist {
            1.0
        } else {
            (-(x - min_dist) / spread).exp()
        }
    };
    let loss = |a: f32, b: f32| -> f32 {
        xs.iter()
            .map(|&x| {
                let phi = 1.0 / (1.0 + a * x.powf(2.0 * b));
                let diff = phi - target(x);
                diff * diff
            })
            .sum()
    };

    let mut best = (1.0f32, 1.0f32);
    let mut best_loss = f32::INFINITY;
    for ai in 1..=100 {
        let a = ai as f32 * 0.05; // 0.05 ..= 5.0
        for bi in 1..=50 {
            let b = bi as f32 * 0.05; // 0.05 ..= 2.5
            let l = loss(a, b);
            if l < best_loss {
                best_loss = l;
                best = (a, b);
            }
        }
    }
    // Refine around the coarse optimum.
    let (ca, cb) = best;
    for ai in -20..=20 {
        let a = (ca + ai as f32 * 0.0025).max(1e-3);
        for bi in -20..=20 {
            let b = (cb + bi as f32 * 0.0025).max(1e-3);
            let l = loss(a, b);
            if l < best_loss {
                best_loss = l;
                best = (a, b);
            }
        }
    }
    best
}

/// SGD layout with per-edge epoch scheduling and negative sampling.
fn optimize_layout(
    edges: &[Edge],
    n: usize,
    params: &UmapParams,
    a: f32,
    b: f32,
) -> Vec<Vec<f32>> {
    let dim = params.n_components;
    let mut rng = StdRng::seed_from_u64(params.seed);

    let mut coords: Vec<Vec<f32>> = (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-10.0..10.0)).collect())
        .collect();

    if edges.is_empty() {
        return coords;
    }

    let n_epochs = params
        .n_epochs
        .unwrap_or(if n < 10_000 { 500 } else { 200 });

    let max_weight = edges.iter().map(|e| e.weight).fold(f32::MIN, f32::max);
    let epochs_per_sample: Vec<f32> = edges.iter().map(|e| max_weight / e.weight).collect();
    let epochs_per_negative: Vec<f32> = epochs_per_sample
        .iter()
        .map(|&eps| eps / params.negative_sample_rate as f32)
        .collect();
    let mut next_sample: Vec<f32> = epochs_per_sample.clone();
    let mut next_negative: Vec<f32> = epochs_per_negative.clone();

    for epoch in 0..n_epochs {
        let alpha = params.learning_rate * (1.0 - epoch as f32 / n_epochs as f32);
        let epoch_f = epoch as f32;

        for (e, edge) in edges.iter().enumerate() {
            if next_sample[e] > epoch_f {
                continue;
            }

            // Attractive update along the edge, both endpoints move.
            let d2 = sq_dist(&coords[edge.head], &coords[edge.tail]);
            let grad_coeff = if d2 > 0.0 {
                (-2.0 * a * b * d2.powf(b - 1.0)) / (1.0 + a * d2.powf(b))
            } else {
                0.0
            };
            for d in 0..dim {
                let g = (grad_coeff * (coords[edge.head][d] - coords[edge.tail][d]))
                    .clamp(-GRAD_CLIP, GRAD_CLIP);
                coords[edge.head][d] += alpha * g;
                coords[edge.tail][d] -= alpha * g;
            }
            next_sample[e] += epochs_per_sample[e];

            // Repulsive updates against sampled non-neighbors.
            let n_neg = ((epoch_f - next_negative[e]) / epochs_per_negative[e]).max(0.0) as usize;
            for _ in 0..n_neg {
                let other = rng.gen_range(0..n);
                if other == edge.head {
                    continue;
                }
                let d2 = sq_dist(&coords[edge.head], &coords[other]);
                let grad_coeff = if d2 > 0.0 {
                    (2.0 * b) / ((0.001 + d2) * (1.0 + a * d2.powf(b)))
                } else {
                    0.0
                };
                for d in 0..dim {
                    let g = if grad_coeff > 0.0 {
                        (grad_coeff * (coords[edge.head][d] - coords[other][d]))
                            .clamp(-GRAD_CLIP, GRAD_CLIP)
                    } else {
                        GRAD_CLIP
                    };
                    coords[edge.head][d] += alpha * g;
                }
            }
            next_negative[e] += n_neg as f32 * epochs_per_negative[e];
        }
    }

    coords
}

fn sq_dist(x: &[f32], y: &[f32]) -> f32 {
    x.iter().zip(y).map(|(a, b)| (a - b) * (a - b)).sum()
}
