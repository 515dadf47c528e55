//! Cross-source consensus between internal clusters and external labels.
//!
//! The two labelings share no coordinate space and no cluster ids, so the
//! alignment is a per-cluster majority vote: each internal cluster adopts
//! the most common external label among its members as its persona label,
//! and each record agrees when its own external label matches its
//! cluster's persona label.
//!
//! Generic over the external label type: anything with equality works,
//! not just strings.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::cluster::NOISE;

/// Summary of one internal cluster against the external labeling.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusRow<L> {
    /// Internal cluster id (never the noise label).
    pub hdb_cluster: i32,
    /// Member count, including members without an external label.
    pub size: usize,
    /// Majority external label; `None` when no member carries one.
    pub majority: Option<L>,
    /// Majority share of the non-missing external labels, in percent.
    /// Exactly 0.0 when no member carries an external label.
    pub majority_share_pct: f64,
}

/// Full consensus output for one batch.
#[derive(Debug, Clone)]
pub struct ConsensusResult<L> {
    /// Per-cluster rows, sorted by size descending (ties by cluster id).
    pub rows: Vec<ConsensusRow<L>>,
    /// Per-record persona label: the majority label of the record's
    /// cluster. `None` for noise records and majority-less clusters.
    pub persona_labels: Vec<Option<L>>,
    /// Per-record agreement flag. A missing external label never agrees.
    pub agreement: Vec<bool>,
    /// Mean of `agreement` over ALL records, in percent.
    pub agreement_pct: f64,
}

/// Majority label with first-encountered tie-break.
///
/// Ties are broken by the order labels first appear in the member
/// sequence, which follows record order. This is the documented
/// tie-break rule, not incidental iteration order.
fn majority_vote<L: Clone + Eq + Hash>(members: &[&L]) -> Option<(L, usize)> {
    let mut counts: HashMap<&L, usize> = HashMap::new();
    let mut first_seen: HashMap<&L, usize> = HashMap::new();
    for (position, &label) in members.iter().enumerate() {
        *counts.entry(label).or_insert(0) += 1;
        first_seen.entry(label).or_insert(position);
    }
    counts
        .iter()
        .max_by_key(|(label, &count)| (count, std::cmp::Reverse(first_seen[*label])))
        .map(|(&label, &count)| (label.clone(), count))
}

/// Align internal cluster labels with an external labeling.
///
/// `labels[i]` and `externals[i]` describe the same record. The noise
/// cluster is excluded from the consensus table; noise records simply
/// carry no persona label and never agree.
pub fn reconcile<L: Clone + Eq + Hash>(
    labels: &[i32],
    externals: &[Option<L>],
) -> ConsensusResult<L> {
    assert_eq!(
        labels.len(),
        externals.len(),
        "internal and external labelings must cover the same records"
    );

    let mut members: HashMap<i32, Vec<usize>> = HashMap::new();
    for (i, &label) in labels.iter().enumerate() {
        if label != NOISE {
            members.entry(label).or_default().push(i);
        }
    }

    let mut cluster_ids: Vec<i32> = members.keys().copied().collect();
    cluster_ids.sort_unstable();

    let mut rows = Vec::with_capacity(cluster_ids.len());
    let mut persona_by_cluster: HashMap<i32, Option<L>> = HashMap::new();
    for cluster in cluster_ids {
        let indices = &members[&cluster];
        let present: Vec<&L> = indices
            .iter()
            .filter_map(|&i| externals[i].as_ref())
            .collect();

        let (majority, share) = match majority_vote(&present) {
            Some((label, count)) => {
                let pct = count as f64 / present.len() as f64 * 100.0;
                (Some(label), pct)
            }
            None => (None, 0.0),
        };
        persona_by_cluster.insert(cluster, majority.clone());
        rows.push(ConsensusRow {
            hdb_cluster: cluster,
            size: indices.len(),
            majority,
            majority_share_pct: share,
        });
    }
    rows.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.hdb_cluster.cmp(&b.hdb_cluster)));

    let persona_labels: Vec<Option<L>> = labels
        .iter()
        .map(|&label| {
            if label == NOISE {
                None
            } else {
                persona_by_cluster.get(&label).cloned().flatten()
            }
        })
        .collect();

    let agreement: Vec<bool> = persona_labels
        .iter()
        .zip(externals)
        .map(|(persona, external)| match (persona, external) {
            (Some(p), Some(e)) => p == e,
            _ => false,
        })
        .collect();

    let agreement_pct = if agreement.is_empty() {
        0.0
    } else {
        agreement.iter().filter(|&&a| a).count() as f64 / agreement.len() as f64 * 100.0
    };

    ConsensusResult {
        rows,
        persona_labels,
        agreement,
        agreement_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Option<String> {
        Some(text.to_string())
    }

    #[test]
    fn test_majority_and_share() {
        let labels = vec![0, 0, 0, 1, 1];
        let externals = vec![s("phish"), s("phish"), s("romance"), s("prize"), None];
        let result = reconcile(&labels, &externals);

        // Rows sorted by size descending.
        assert_eq!(result.rows[0].hdb_cluster, 0);
        assert_eq!(result.rows[0].size, 3);
        assert_eq!(result.rows[0].majority, Some("phish".to_string()));
        assert!((result.rows[0].majority_share_pct - 66.666_666_666_666_66).abs() < 1e-9);

        // Cluster 1: one labeled member out of two.
        assert_eq!(result.rows[1].majority, Some("prize".to_string()));
        assert!((result.rows[1].majority_share_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_cluster_without_external_labels() {
        let labels = vec![0, 0];
        let externals: Vec<Option<String>> = vec![None, None];
        let result = reconcile(&labels, &externals);

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].majority, None);
        assert_eq!(result.rows[0].majority_share_pct, 0.0);
        assert_eq!(result.persona_labels, vec![None, None]);
        assert_eq!(result.agreement_pct, 0.0);
    }

    #[test]
    fn test_tie_breaks_to_first_encountered() {
        let labels = vec![0, 0, 0, 0];
        let externals = vec![s("b"), s("a"), s("a"), s("b")];
        let result = reconcile(&labels, &externals);
        // "b" and "a" both count 2; "b" was seen first.
        assert_eq!(result.rows[0].majority, Some("b".to_string()));
    }

    #[test]
    fn test_overall_agreement_includes_unlabeled_records() {
        // 4 records, exactly 1 agrees -> 25%.
        let labels = vec![0, 0, 0, NOISE];
        let externals = vec![s("phish"), s("romance"), None, s("phish")];
        let result = reconcile(&labels, &externals);

        // Cluster 0 majority is "phish" (first-encountered on 1-1 tie).
        assert_eq!(result.agreement, vec![true, false, false, false]);
        assert!((result.agreement_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_noise_records_have_no_persona() {
        let labels = vec![NOISE, 0, 0];
        let externals = vec![s("x"), s("x"), s("x")];
        let result = reconcile(&labels, &externals);
        assert_eq!(result.persona_labels[0], None);
        assert!(!result.agreement[0], "noise never agrees");
        assert_eq!(result.rows.len(), 1, "noise cluster gets no row");
    }

    #[test]
    fn test_generic_over_non_string_labels() {
        let labels = vec![0, 0, 1];
        let externals = vec![Some(7u32), Some(7u32), None];
        let result = reconcile(&labels, &externals);
        assert_eq!(result.rows.iter().find(|r| r.hdb_cluster == 0).unwrap().majority, Some(7));
        assert_eq!(result.rows.iter().find(|r| r.hdb_cluster == 1).unwrap().majority, None);
    }

    #[test]
    fn test_empty_batch() {
        let result: ConsensusResult<String> = reconcile(&[], &[]);
        assert!(result.rows.is_empty());
        assert_eq!(result.agreement_pct, 0.0);
    }
}
