//! # Graph Store
//!
//! The in-memory standoff graph for tiergraf.
//!
//! Nodes, regions and annotation spaces are keyed in `BTreeMap`s for
//! deterministic iteration; edges keep their creation order so that a node's
//! children come back in source order. The store has no behavior beyond
//! insertion during the build pass and lookup afterwards.

use crate::{Annotation, AnnotationSpace, Blob, Edge, GrafError, Node, NodeId, Region};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The standoff annotation graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    /// Node storage: NodeId -> Node
    nodes: BTreeMap<NodeId, Node>,

    /// Edges in creation order. Nodes refer to them by position.
    edges: Vec<Edge>,

    /// Region storage: region id -> Region
    regions: BTreeMap<String, Region>,

    /// Annotation spaces by name, created lazily.
    annotation_spaces: BTreeMap<String, AnnotationSpace>,

    /// Format-specific side data. Never inspected by the core.
    additional_information: BTreeMap<String, Blob>,
}

/// The slice of a graph that belongs to one tier prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPartition<'a> {
    pub nodes: Vec<&'a Node>,
    /// Edges whose target node is in the tier.
    pub edges: Vec<&'a Edge>,
    pub regions: Vec<&'a Region>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Insertion (build pass only)
    // -------------------------------------------------------------------------

    /// Insert a fresh node. Identities must be unique.
    pub fn insert_node(&mut self, id: NodeId) -> Result<(), GrafError> {
        if self.nodes.contains_key(&id) {
            return Err(GrafError::DuplicateNode(id.to_string()));
        }
        self.nodes.insert(id.clone(), Node::new(id));
        Ok(())
    }

    /// Insert the directed edge `from -> to`. Returns the edge's position.
    ///
    /// Both endpoints must already exist, and `to` may not have a parent yet.
    pub fn insert_edge(&mut self, from: &NodeId, to: &NodeId) -> Result<usize, GrafError> {
        if !self.nodes.contains_key(from) {
            return Err(GrafError::NodeNotFound(from.to_string()));
        }
        let index = self.edges.len();
        let target = self
            .nodes
            .get_mut(to)
            .ok_or_else(|| GrafError::NodeNotFound(to.to_string()))?;
        if target.in_edge.is_some() {
            return Err(GrafError::InvalidSource(format!(
                "node {} already has a parent",
                to
            )));
        }
        target.in_edge = Some(index);

        if let Some(source) = self.nodes.get_mut(from) {
            source.out_edges.push(index);
        }
        self.edges.push(Edge {
            id: to.edge_id(),
            from: from.clone(),
            to: to.clone(),
        });
        Ok(index)
    }

    /// Create the region of `node` and link it.
    pub fn attach_region(&mut self, node: &NodeId, start: u64, end: u64) -> Result<(), GrafError> {
        let target = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| GrafError::NodeNotFound(node.to_string()))?;
        let region = Region::new(node.region_id(), start, end);
        target.region = Some(region.id.clone());
        self.regions.insert(region.id.clone(), region);
        Ok(())
    }

    /// Attach an annotation to `node` and register it in its annotation space.
    pub fn add_annotation(&mut self, node: &NodeId, annotation: Annotation) -> Result<(), GrafError> {
        let target = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| GrafError::NodeNotFound(node.to_string()))?;
        target.annotations.push(annotation.clone());

        self.annotation_spaces
            .entry(annotation.label.clone())
            .or_insert_with(|| AnnotationSpace::new(annotation.label.clone()))
            .add(annotation);
        Ok(())
    }

    /// Store an opaque side-data payload under `key`, replacing any previous one.
    pub fn insert_additional_information(&mut self, key: impl Into<String>, blob: Blob) {
        self.additional_information.insert(key.into(), blob);
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Lookup a node by its id.
    #[must_use]
    pub fn lookup(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Check if the graph contains a node.
    #[must_use]
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Get all nodes in identity order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Nodes whose prefix is exactly `prefix`, in identity order.
    ///
    /// The nodes borrow from the graph only, so they outlive `prefix`.
    pub fn nodes_with_prefix<'a, 'p>(
        &'a self,
        prefix: &'p str,
    ) -> impl Iterator<Item = &'a Node> + use<'a, 'p> {
        self.nodes.values().filter(move |n| n.id.is_in_tier(prefix))
    }

    /// Get all edges in creation order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Get an edge by position.
    #[must_use]
    pub fn edge(&self, index: usize) -> Option<&Edge> {
        self.edges.get(index)
    }

    /// Targets of a node's outgoing edges, in edge creation order.
    pub fn children<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Node> + 'a {
        node.out_edges
            .iter()
            .filter_map(|&i| self.edges.get(i))
            .filter_map(|edge| self.nodes.get(&edge.to))
    }

    /// Source of a node's incoming edge.
    #[must_use]
    pub fn parent(&self, node: &Node) -> Option<&Node> {
        let edge = self.edges.get(node.in_edge?)?;
        self.nodes.get(&edge.from)
    }

    /// Get all regions in id order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// The region linked from `node`, if any.
    #[must_use]
    pub fn region_of(&self, node: &Node) -> Option<&Region> {
        node.region.as_ref().and_then(|id| self.regions.get(id))
    }

    /// Get all annotation spaces in name order.
    pub fn annotation_spaces(&self) -> impl Iterator<Item = &AnnotationSpace> {
        self.annotation_spaces.values()
    }

    /// Get one annotation space by name.
    #[must_use]
    pub fn annotation_space(&self, name: &str) -> Option<&AnnotationSpace> {
        self.annotation_spaces.get(name)
    }

    /// Get the opaque side data.
    #[must_use]
    pub fn additional_information(&self) -> &BTreeMap<String, Blob> {
        &self.additional_information
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Everything that belongs to one tier: its nodes, the edges that point
    /// into it and its regions.
    #[must_use]
    pub fn partition<'a>(&'a self, tier_prefix: &str) -> TierPartition<'a> {
        let nodes: Vec<&Node> = self.nodes_with_prefix(tier_prefix).collect();
        let regions = nodes.iter().filter_map(|n| self.region_of(n)).collect();
        TierPartition {
            edges: self
                .edges
                .iter()
                .filter(|e| e.to.is_in_tier(tier_prefix))
                .collect(),
            nodes,
            regions,
        }
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable representation of the graph for persistence and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub regions: Vec<Region>,
    #[serde(default)]
    pub annotation_spaces: Vec<AnnotationSpace>,
    #[serde(default)]
    pub additional_information: Vec<(String, Blob)>,
}

impl From<&Graph> for SerializableGraph {
    fn from(graph: &Graph) -> Self {
        Self {
            nodes: graph.nodes.values().cloned().collect(),
            edges: graph.edges.clone(),
            regions: graph.regions.values().cloned().collect(),
            annotation_spaces: graph.annotation_spaces.values().cloned().collect(),
            additional_information: graph
                .additional_information
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

impl TryFrom<SerializableGraph> for Graph {
    type Error = GrafError;

    /// Rebuild a graph, rejecting edges, links or regions that dangle.
    fn try_from(sg: SerializableGraph) -> Result<Self, Self::Error> {
        let mut graph = Graph::new();

        for node in sg.nodes {
            if graph.nodes.contains_key(&node.id) {
                return Err(GrafError::DuplicateNode(node.id.to_string()));
            }
            graph.nodes.insert(node.id.clone(), node);
        }

        for edge in &sg.edges {
            if !graph.nodes.contains_key(&edge.from) {
                return Err(GrafError::NodeNotFound(edge.from.to_string()));
            }
            if !graph.nodes.contains_key(&edge.to) {
                return Err(GrafError::NodeNotFound(edge.to.to_string()));
            }
        }
        let edge_count = sg.edges.len();
        for node in graph.nodes.values() {
            let dangling = node
                .in_edge
                .iter()
                .chain(node.out_edges.iter())
                .any(|&i| i >= edge_count);
            if dangling {
                return Err(GrafError::DeserializationError(format!(
                    "node {} references a missing edge",
                    node.id
                )));
            }
        }
        graph.edges = sg.edges;

        for region in sg.regions {
            graph.regions.insert(region.id.clone(), region);
        }
        for space in sg.annotation_spaces {
            graph.annotation_spaces.insert(space.name.clone(), space);
        }
        graph.additional_information = sg.additional_information.into_iter().collect();

        Ok(graph)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::ANNOTATION_VALUE_KEY;

    fn annotation(id: &str, label: &str, value: &str) -> Annotation {
        let mut a = Annotation::new(id, label);
        a.features
            .insert(ANNOTATION_VALUE_KEY.to_string(), value.to_string());
        a
    }

    #[test]
    fn insert_and_lookup_node() {
        let mut graph = Graph::new();
        let id = NodeId::new("word", "1");

        graph.insert_node(id.clone()).expect("insert");

        assert!(graph.lookup(&id).is_some());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn insert_duplicate_node_fails() {
        let mut graph = Graph::new();
        let id = NodeId::new("word", "1");

        graph.insert_node(id.clone()).expect("insert");
        let result = graph.insert_node(id);

        assert!(matches!(result, Err(GrafError::DuplicateNode(_))));
    }

    #[test]
    fn insert_edge_links_both_endpoints() {
        let mut graph = Graph::new();
        let parent = NodeId::new("record", "1");
        let child = NodeId::new("word", "2");
        graph.insert_node(parent.clone()).expect("insert");
        graph.insert_node(child.clone()).expect("insert");

        let index = graph.insert_edge(&parent, &child).expect("edge");

        assert_eq!(graph.edge(index).map(|e| e.id.as_str()), Some("e2"));
        let parent_node = graph.lookup(&parent).expect("parent");
        let children: Vec<_> = graph.children(parent_node).map(|n| n.id.clone()).collect();
        assert_eq!(children, vec![child.clone()]);

        let child_node = graph.lookup(&child).expect("child");
        assert_eq!(graph.parent(child_node).map(|n| &n.id), Some(&parent));
    }

    #[test]
    fn insert_edge_requires_existing_endpoints() {
        let mut graph = Graph::new();
        let parent = NodeId::new("record", "1");
        graph.insert_node(parent.clone()).expect("insert");

        let result = graph.insert_edge(&parent, &NodeId::new("word", "9"));
        assert!(matches!(result, Err(GrafError::NodeNotFound(_))));

        let result = graph.insert_edge(&NodeId::new("record", "9"), &parent);
        assert!(matches!(result, Err(GrafError::NodeNotFound(_))));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn second_parent_is_rejected() {
        let mut graph = Graph::new();
        let a = NodeId::new("record", "1");
        let b = NodeId::new("record", "2");
        let child = NodeId::new("word", "1");
        for id in [&a, &b, &child] {
            graph.insert_node(id.clone()).expect("insert");
        }

        graph.insert_edge(&a, &child).expect("edge");
        assert!(graph.insert_edge(&b, &child).is_err());
    }

    #[test]
    fn children_follow_edge_creation_order() {
        let mut graph = Graph::new();
        let parent = NodeId::new("record", "1");
        graph.insert_node(parent.clone()).expect("insert");
        for index in ["9", "3", "5"] {
            let child = NodeId::new("word", index);
            graph.insert_node(child.clone()).expect("insert");
            graph.insert_edge(&parent, &child).expect("edge");
        }

        let parent_node = graph.lookup(&parent).expect("parent");
        let order: Vec<_> = graph
            .children(parent_node)
            .map(|n| n.id.index().to_string())
            .collect();
        assert_eq!(order, vec!["9", "3", "5"]);
    }

    #[test]
    fn attach_region_links_node() {
        let mut graph = Graph::new();
        let id = NodeId::new("record", "1");
        graph.insert_node(id.clone()).expect("insert");

        graph.attach_region(&id, 10, 15).expect("region");

        let node = graph.lookup(&id).expect("node");
        let region = graph.region_of(node).expect("region");
        assert_eq!(region.id, "record/r1");
        assert_eq!((region.start(), region.end()), (10, 15));
    }

    #[test]
    fn add_annotation_registers_space_once() {
        let mut graph = Graph::new();
        let id = NodeId::new("word", "1");
        graph.insert_node(id.clone()).expect("insert");

        let a = annotation("a1", "word", "dog");
        graph.add_annotation(&id, a.clone()).expect("annotate");
        graph.add_annotation(&id, a).expect("annotate");

        let node = graph.lookup(&id).expect("node");
        assert_eq!(node.annotations.len(), 2);
        assert_eq!(graph.annotation_space("word").map(AnnotationSpace::len), Some(1));
    }

    #[test]
    fn add_annotation_missing_node_fails() {
        let mut graph = Graph::new();
        let result = graph.add_annotation(&NodeId::new("word", "1"), Annotation::new("a", "word"));
        assert!(matches!(result, Err(GrafError::NodeNotFound(_))));
    }

    #[test]
    fn partition_selects_tier_only() {
        let mut graph = Graph::new();
        let record = NodeId::new("record", "1");
        let word = NodeId::new("word", "1");
        let word_gloss = NodeId::new("word_gloss", "1");
        for id in [&record, &word, &word_gloss] {
            graph.insert_node(id.clone()).expect("insert");
        }
        graph.insert_edge(&record, &word).expect("edge");
        graph.insert_edge(&word, &word_gloss).expect("edge");
        graph.attach_region(&word, 0, 3).expect("region");
        graph.attach_region(&word_gloss, 0, 3).expect("region");

        let partition = graph.partition("word");
        assert_eq!(partition.nodes.len(), 1);
        assert_eq!(partition.edges.len(), 1);
        assert_eq!(partition.edges[0].from, record);
        assert_eq!(partition.regions.len(), 1);
    }

    #[test]
    fn partition_ignores_namespaced_tier_regions() {
        let mut graph = Graph::new();
        let word = NodeId::new("word", "1");
        let relation = NodeId::new("word/rel", "2");
        for id in [&word, &relation] {
            graph.insert_node(id.clone()).expect("insert");
            graph.attach_region(id, 0, 3).expect("region");
        }

        let partition = graph.partition("word");

        assert_eq!(partition.nodes.len(), 1);
        let regions: Vec<_> = partition.regions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(regions, vec!["word/r1"]);
    }

    #[test]
    fn nodes_with_prefix_outlive_prefix() {
        let mut graph = Graph::new();
        graph.insert_node(NodeId::new("word", "1")).expect("insert");
        graph.insert_node(NodeId::new("record", "1")).expect("insert");

        let words: Vec<&Node> = {
            let tier = String::from("word");
            graph.nodes_with_prefix(&tier).collect()
        };

        assert_eq!(words.len(), 1);
    }

    #[test]
    fn serializable_graph_roundtrip() {
        let mut graph = Graph::new();
        let record = NodeId::new("record", "1");
        let word = NodeId::new("word", "2");
        graph.insert_node(record.clone()).expect("insert");
        graph.insert_node(word.clone()).expect("insert");
        graph.insert_edge(&record, &word).expect("edge");
        graph.attach_region(&record, 0, 5).expect("region");
        graph
            .add_annotation(&word, annotation("a2", "word", "cat"))
            .expect("annotate");
        graph.insert_additional_information("extra_info", Blob::new("text/xml", b"<x/>".to_vec()));

        let serializable = SerializableGraph::from(&graph);
        let restored = Graph::try_from(serializable).expect("restore");

        assert_eq!(restored, graph);
    }

    #[test]
    fn restore_rejects_dangling_edge() {
        let sg = SerializableGraph {
            nodes: vec![Node::new(NodeId::new("record", "1"))],
            edges: vec![Edge {
                id: "e2".to_string(),
                from: NodeId::new("record", "1"),
                to: NodeId::new("word", "2"),
            }],
            regions: Vec::new(),
            annotation_spaces: Vec::new(),
            additional_information: Vec::new(),
        };

        assert!(Graph::try_from(sg).is_err());
    }
}
