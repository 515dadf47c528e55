//! Embedding quality metrics.
//!
//! Silhouette over the non-noise partition. Degenerate partitions (fewer
//! than two clusters, or fewer than two clustered points) yield `None`,
//! never an error.

use std::collections::BTreeMap;

use crate::cluster::NOISE;

fn euclidean(x: &[f32], y: &[f32]) -> f64 {
    x.iter()
        .zip(y)
        .map(|(a, b)| {
            let d = f64::from(a - b);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Mean silhouette coefficient of the clustered (non-noise) points.
pub fn silhouette_score(embedding: &[Vec<f32>], labels: &[i32]) -> Option<f64> {
    debug_assert_eq!(embedding.len(), labels.len());

    let clustered: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] != NOISE).collect();
    if clustered.len() < 2 {
        return None;
    }

    let mut members: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for &i in &clustered {
        members.entry(labels[i]).or_default().push(i);
    }
    if members.len() < 2 {
        return None;
    }

    let mut total = 0.0f64;
    for &i in &clustered {
        let own = &members[&labels[i]];
        if own.len() == 1 {
            // Singleton convention: silhouette 0.
            continue;
        }

        let a = own
            .iter()
            .filter(|&&j| j != i)
            .map(|&j| euclidean(&embedding[i], &embedding[j]))
            .sum::<f64>()
            / (own.len() - 1) as f64;

        let b = members
            .iter()
            .filter(|(&label, _)| label != labels[i])
            .map(|(_, other)| {
                other
                    .iter()
                    .map(|&j| euclidean(&embedding[i], &embedding[j]))
                    .sum::<f64>()
                    / other.len() as f64
            })
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Some(total / clustered.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_separated_clusters_score_high() {
        let embedding = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![10.0, 10.1],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let score = silhouette_score(&embedding, &labels).unwrap();
        assert!(score > 0.9, "score = {}", score);
    }

    #[test]
    fn test_single_cluster_is_none() {
        let embedding = vec![vec![0.0], vec![1.0], vec![2.0]];
        assert_eq!(silhouette_score(&embedding, &[0, 0, 0]), None);
    }

    #[test]
    fn test_all_noise_is_none() {
        let embedding = vec![vec![0.0], vec![1.0]];
        assert_eq!(silhouette_score(&embedding, &[NOISE, NOISE]), None);
    }

    #[test]
    fn test_noise_points_excluded_from_score() {
        let embedding = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![500.0, -500.0],
        ];
        let labels = vec![0, 0, 1, 1, NOISE];
        let score = silhouette_score(&embedding, &labels).unwrap();
        assert!(score > 0.9, "outlier must not drag the score, got {}", score);
    }
}
