//! Entity co-occurrence graph.
//!
//! Actors (sender identities) connect to the entity tokens they used
//! (emails, phones, wallets, domains). Shared infrastructure shows up as
//! actors joined through common entity nodes; modularity communities over
//! this graph are a corroboration signal alongside the text clusters, not
//! a replacement for them.
//!
//! Invariant: edges only ever connect an actor to an entity, never
//! actor-actor or entity-entity.

pub mod community;

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};
use serde::Serialize;

use crate::config::NetworkConfig;
use crate::types::{EntityKind, Record};

use community::louvain_communities;

/// A node of the co-occurrence graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    /// Prefixed key: `s:<sender>` for actors, `e:<token>` for entities.
    pub key: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Actor,
    Entity(EntityKind),
}

/// Undirected actor-to-entity graph for one batch.
#[derive(Debug, Default)]
pub struct EntityGraph {
    graph: UnGraph<GraphNode, EntityKind>,
    index: HashMap<String, NodeIndex>,
}

impl EntityGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn actor_count(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|n| n.kind == NodeKind::Actor)
            .count()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of connected components.
    pub fn connected_components(&self) -> usize {
        petgraph::algo::connected_components(&self.graph)
    }

    /// Node keys adjacent to `key`.
    pub fn neighbors(&self, key: &str) -> Vec<&str> {
        match self.index.get(key) {
            Some(&idx) => {
                let mut keys: Vec<&str> = self
                    .graph
                    .neighbors(idx)
                    .map(|n| self.graph[n].key.as_str())
                    .collect();
                keys.sort_unstable();
                keys
            }
            None => Vec::new(),
        }
    }

    fn intern(&mut self, key: String, kind: NodeKind) -> NodeIndex {
        match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.graph.add_node(GraphNode {
                    key: key.clone(),
                    kind,
                });
                self.index.insert(key, idx);
                idx
            }
        }
    }

    /// Actor-to-community assignment via modularity optimization.
    ///
    /// Entity nodes partition too; the returned map covers every node key.
    pub fn partition(&self) -> HashMap<String, usize> {
        let edges: Vec<(usize, usize, f64)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (a.index(), b.index(), 1.0))
            .collect();
        let communities = louvain_communities(self.graph.node_count(), &edges);
        self.graph
            .node_indices()
            .map(|idx| (self.graph[idx].key.clone(), communities[idx.index()]))
            .collect()
    }
}

/// Build the graph from a batch of cleaned records.
///
/// Entities appearing in fewer than `cooccurrence_min` records are left
/// out. Records without a sender get the shared `s:unknown` actor.
pub fn build_graph(records: &[Record], config: &NetworkConfig) -> EntityGraph {
    // Entity frequency across records (counted once per record).
    let mut entity_records: HashMap<&str, usize> = HashMap::new();
    for record in records {
        let mut seen: Vec<&str> = Vec::new();
        for entity in &record.entities {
            if !seen.contains(&entity.token.as_str()) {
                seen.push(&entity.token);
                *entity_records.entry(&entity.token).or_insert(0) += 1;
            }
        }
    }

    let mut graph = EntityGraph::default();
    for record in records {
        let sender = record.sender_id.as_deref().unwrap_or("unknown");
        let actor_key = format!("s:{}", sender);

        for entity in &record.entities {
            if entity.token.is_empty() {
                continue;
            }
            if entity_records[entity.token.as_str()] < config.cooccurrence_min {
                continue;
            }
            let actor = graph.intern(actor_key.clone(), NodeKind::Actor);
            let node = graph.intern(
                format!("e:{}", entity.token),
                NodeKind::Entity(entity.kind),
            );
            if graph.graph.find_edge(actor, node).is_none() {
                graph.graph.add_edge(actor, node, entity.kind);
            }
        }
    }

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        actors = graph.actor_count(),
        "entity graph built"
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityToken;

    fn record(sender: &str, entities: &[(EntityKind, &str)]) -> Record {
        Record {
            id: "0".into(),
            subject: String::new(),
            cleaned_text: "text".into(),
            sender_id: Some(sender.to_string()),
            entities: entities
                .iter()
                .map(|&(kind, token)| EntityToken {
                    kind,
                    token: token.to_string(),
                })
                .collect(),
            redaction: Default::default(),
            extras: Default::default(),
        }
    }

    #[test]
    fn test_shared_wallet_joins_two_actors() {
        let records = vec![
            record("alice", &[(EntityKind::Wallet, "w1")]),
            record("bob", &[(EntityKind::Wallet, "w1")]),
        ];
        let graph = build_graph(&records, &NetworkConfig::default());

        assert_eq!(graph.node_count(), 3, "two actors + one wallet");
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.connected_components(), 1);
        assert_eq!(graph.neighbors("e:w1"), ["s:alice", "s:bob"]);
    }

    #[test]
    fn test_no_actor_actor_or_entity_entity_edges() {
        let records = vec![
            record("alice", &[(EntityKind::Email, "e1"), (EntityKind::Domain, "d1")]),
            record("bob", &[(EntityKind::Email, "e1")]),
        ];
        let graph = build_graph(&records, &NetworkConfig::default());
        for edge in graph.graph.edge_indices() {
            let (a, b) = graph.graph.edge_endpoints(edge).unwrap();
            let kinds = (graph.graph[a].kind, graph.graph[b].kind);
            assert!(
                matches!(kinds, (NodeKind::Actor, NodeKind::Entity(_)))
                    || matches!(kinds, (NodeKind::Entity(_), NodeKind::Actor)),
                "edge must join actor and entity, got {:?}",
                kinds
            );
        }
    }

    #[test]
    fn test_duplicate_entity_use_adds_one_edge() {
        let records = vec![record(
            "alice",
            &[(EntityKind::Email, "e1"), (EntityKind::Email, "e1")],
        )];
        let graph = build_graph(&records, &NetworkConfig::default());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_cooccurrence_min_filters_rare_entities() {
        let records = vec![
            record("alice", &[(EntityKind::Domain, "common")]),
            record("bob", &[(EntityKind::Domain, "common")]),
            record("carol", &[(EntityKind::Domain, "rare")]),
        ];
        let config = NetworkConfig { cooccurrence_min: 2 };
        let graph = build_graph(&records, &config);
        assert!(graph.contains("e:common"));
        assert!(!graph.contains("e:rare"));
        assert!(!graph.contains("s:carol"), "actor with no kept entities is omitted");
    }

    #[test]
    fn test_missing_sender_uses_unknown_actor() {
        let mut rec = record("x", &[(EntityKind::Phone, "p1")]);
        rec.sender_id = None;
        let graph = build_graph(&[rec], &NetworkConfig::default());
        assert!(graph.contains("s:unknown"));
    }

    #[test]
    fn test_partition_separates_disjoint_infrastructure() {
        let records = vec![
            record("a1", &[(EntityKind::Wallet, "w1"), (EntityKind::Email, "m1")]),
            record("a2", &[(EntityKind::Wallet, "w1"), (EntityKind::Email, "m1")]),
            record("b1", &[(EntityKind::Domain, "d9"), (EntityKind::Phone, "p9")]),
            record("b2", &[(EntityKind::Domain, "d9"), (EntityKind::Phone, "p9")]),
        ];
        let graph = build_graph(&records, &NetworkConfig::default());
        let partition = graph.partition();

        assert_eq!(partition["s:a1"], partition["s:a2"]);
        assert_eq!(partition["s:b1"], partition["s:b2"]);
        assert_ne!(partition["s:a1"], partition["s:b1"]);
        assert_eq!(partition["s:a1"], partition["e:w1"]);
    }
}
