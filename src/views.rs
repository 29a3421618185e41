//! Read-only aggregate views over the imported archive: row totals and a
//! node/edge projection suitable for graph visualization.

use crate::models::{AssociationKind, EntityId, EntityKind};
use crate::store::Store;
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Rows per entity table
    pub totals: BTreeMap<&'static str, i64>,
    /// Rows per association table
    pub links: BTreeMap<&'static str, i64>,
}

pub async fn totals<S: Store>(store: &S) -> Result<Totals> {
    let mut totals = BTreeMap::new();
    for kind in EntityKind::ALL {
        totals.insert(kind.table(), store.count(kind).await?);
    }

    let mut links = BTreeMap::new();
    for kind in AssociationKind::ALL {
        links.insert(kind.table(), store.count_links(kind).await?);
    }

    Ok(Totals { totals, links })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

pub fn node_id(kind: EntityKind, id: EntityId) -> String {
    format!("{}:{id}", kind.node_type())
}

pub async fn graph<S: Store>(store: &S) -> Result<Graph> {
    let mut graph = Graph::default();

    for kind in EntityKind::ALL {
        for (id, label) in store.labels(kind).await? {
            let label = label
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| kind.fallback_label().to_string());
            graph.nodes.push(GraphNode {
                id: node_id(kind, id),
                label,
                node_type: kind.node_type(),
            });
        }
    }

    for kind in AssociationKind::ALL {
        for (event_id, related_id) in store.link_pairs(kind).await? {
            let source = node_id(EntityKind::Event, event_id);
            let target = node_id(kind.related(), related_id);
            graph.edges.push(GraphEdge {
                id: format!("{source}__{target}"),
                source,
                target,
                edge_type: kind.edge_type(),
            });
        }
    }

    Ok(graph)
}
