//! # Hierarchy-Aware View
//!
//! Read-only access to a built [`Graph`] through one declared tier hierarchy.
//!
//! The view answers three questions: which nodes are the roots, which nodes
//! of a tier hang under a node, and which annotations of a tier belong to a
//! node. The table layout and the tree filter are both built on these.

use crate::filter::{Element, ElementEntry, ElementTree};
use crate::graph::Graph;
use crate::hierarchy::{HierarchyEntry, HierarchyTree};
use crate::primitives::MAX_HIERARCHY_DEPTH;
use crate::{Annotation, GrafError, Node};
use std::collections::BTreeMap;

// =============================================================================
// DATA STRUCTURE
// =============================================================================

/// A declared tier hierarchy with its flat (pre-order) form.
///
/// Row indices of the flat form are computed once here and reused by every
/// layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStructure {
    hierarchy: HierarchyTree,
    flat: Vec<String>,
    rows: BTreeMap<String, usize>,
}

impl DataStructure {
    /// Validate and index a hierarchy.
    ///
    /// The hierarchy must be headed by a tier, every group must be headed by
    /// a tier, and no tier may appear twice.
    pub fn new(hierarchy: HierarchyTree) -> Result<Self, GrafError> {
        if hierarchy.head().is_none() {
            return Err(GrafError::InvalidSource(
                "hierarchy must start with a tier".to_string(),
            ));
        }
        if hierarchy.depth() > MAX_HIERARCHY_DEPTH {
            return Err(GrafError::InvalidSource(format!(
                "hierarchy deeper than {}",
                MAX_HIERARCHY_DEPTH
            )));
        }
        check_groups(&hierarchy)?;

        let flat = hierarchy.flatten();
        let mut rows = BTreeMap::new();
        for (row, tier) in flat.iter().enumerate() {
            if rows.insert(tier.clone(), row).is_some() {
                return Err(GrafError::InvalidSource(format!(
                    "tier {} appears twice in the hierarchy",
                    tier
                )));
            }
        }

        Ok(Self {
            hierarchy,
            flat,
            rows,
        })
    }

    pub fn hierarchy(&self) -> &HierarchyTree {
        &self.hierarchy
    }

    pub fn flat(&self) -> &[String] {
        &self.flat
    }

    /// Row of `tier` in the flat hierarchy.
    #[must_use]
    pub fn row_of(&self, tier: &str) -> Option<usize> {
        self.rows.get(tier).copied()
    }

    /// First tier of the flat hierarchy.
    #[must_use]
    pub fn root_tier(&self) -> &str {
        self.flat.first().map(String::as_str).unwrap_or_default()
    }
}

fn check_groups(tree: &HierarchyTree) -> Result<(), GrafError> {
    for entry in tree.entries() {
        if let HierarchyEntry::Group(group) = entry {
            if group.head().is_none() {
                return Err(GrafError::InvalidSource(
                    "every group must start with a tier".to_string(),
                ));
            }
            check_groups(group)?;
        }
    }
    Ok(())
}

// =============================================================================
// ANNOTATION GRAPH VIEW
// =============================================================================

/// A graph seen through a [`DataStructure`].
#[derive(Debug, Clone, Copy)]
pub struct AnnotationGraph<'a> {
    graph: &'a Graph,
    structure: &'a DataStructure,
}

impl<'a> AnnotationGraph<'a> {
    #[must_use]
    pub fn new(graph: &'a Graph, structure: &'a DataStructure) -> Self {
        Self { graph, structure }
    }

    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    pub fn structure(&self) -> &'a DataStructure {
        self.structure
    }

    /// Nodes of the root tier, ordered by region start.
    ///
    /// If any of them lacks a region the whole list falls back to identity
    /// order; a partially sorted list is never returned.
    #[must_use]
    pub fn root_nodes(&self) -> Vec<&'a Node> {
        let graph = self.graph;
        let mut nodes: Vec<&Node> = graph.nodes_with_prefix(self.structure.root_tier()).collect();

        let starts: Option<Vec<u64>> = nodes
            .iter()
            .map(|n| graph.region_of(n).map(|r| r.start()))
            .collect();

        match starts {
            Some(starts) => {
                let mut keyed: Vec<(u64, &Node)> = starts.into_iter().zip(nodes).collect();
                keyed.sort_by_key(|(start, _)| *start);
                nodes = keyed.into_iter().map(|(_, n)| n).collect();
            }
            None => {
                tracing::warn!(
                    tier = self.structure.root_tier(),
                    "root node without region, using identity order"
                );
            }
        }
        nodes
    }

    /// Nodes of `tier`: the children of `parent` when given, otherwise every
    /// node of the tier in the graph (no particular order promised).
    #[must_use]
    pub fn nodes_for_tier(&self, tier: &str, parent: Option<&'a Node>) -> Vec<&'a Node> {
        match parent {
            Some(parent) => self
                .graph
                .children(parent)
                .filter(|n| n.id.is_in_tier(tier))
                .collect(),
            None => self.graph.nodes_with_prefix(tier).collect(),
        }
    }

    /// Annotations of `tier` at `node`: its own when the node is in the tier,
    /// otherwise those of its children in the tier, child after child.
    #[must_use]
    pub fn annotations_for_tier(&self, tier: &str, node: &'a Node) -> Vec<&'a Annotation> {
        if node.id.is_in_tier(tier) {
            return node.annotations.iter().collect();
        }
        self.nodes_for_tier(tier, Some(node))
            .into_iter()
            .flat_map(|n| n.annotations.iter())
            .collect()
    }

    /// The node carrying the first annotation of `tier` at `node`.
    fn first_annotated(&self, tier: &str, node: &'a Node) -> Option<(&'a Node, &'a Annotation)> {
        if node.id.is_in_tier(tier) {
            return node.annotations.first().map(|a| (node, a));
        }
        self.nodes_for_tier(tier, Some(node))
            .into_iter()
            .find_map(|n| n.annotations.first().map(|a| (n, a)))
    }

    /// Extract the element tree of `root` for filtering.
    ///
    /// The tree mirrors the declared hierarchy: one leaf per tier holding the
    /// first annotation's text, one list of subtrees per repeating group.
    #[must_use]
    pub fn element_tree(&self, root: &'a Node) -> ElementTree {
        self.element_subtree(root, self.structure.hierarchy())
    }

    /// Element trees of every root node, in [`Self::root_nodes`] order.
    #[must_use]
    pub fn element_trees(&self) -> Vec<ElementTree> {
        self.root_nodes()
            .into_iter()
            .map(|root| self.element_tree(root))
            .collect()
    }

    fn element_subtree(&self, node: &'a Node, tree: &HierarchyTree) -> ElementTree {
        let entries = tree
            .entries()
            .iter()
            .map(|entry| match entry {
                HierarchyEntry::Tier(tier) => ElementEntry::Leaf(
                    self.first_annotated(tier, node)
                        .map(|(n, a)| Element::new(n.id.to_string(), a.value()))
                        .unwrap_or_default(),
                ),
                HierarchyEntry::Group(group) => {
                    let children = group
                        .head()
                        .map(|head| self.nodes_for_tier(head, Some(node)))
                        .unwrap_or_default();
                    ElementEntry::Group(
                        children
                            .into_iter()
                            .map(|child| self.element_subtree(child, group))
                            .collect(),
                    )
                }
            })
            .collect();
        ElementTree::new(entries)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::NodeId;
    use crate::document::Document;
    use crate::source::{NestedAnnotation, NestedSource, NestedTier};

    fn ann(id: &str, value: &str) -> NestedAnnotation {
        NestedAnnotation::new(id, value)
    }

    fn utterance_source() -> NestedSource {
        let utterance = NestedTier::new("utterance")
            .with_regions()
            .with_child(NestedTier::new("word").with_child(NestedTier::new("gloss")))
            .with_child(NestedTier::new("translation"));

        let u2 = ann("u2", "a dog")
            .with_region(0, 5)
            .with_children("word", vec![ann("w21", "a"), ann("w22", "dog")]);
        let u1 = ann("u1", "the cat")
            .with_region(20, 27)
            .with_children(
                "word",
                vec![
                    ann("w11", "the"),
                    ann("w12", "cat").with_children("gloss", vec![ann("g12", "CAT")]),
                ],
            )
            .with_children("translation", vec![ann("t1", "le chat")]);

        NestedSource::new(vec![utterance])
            .with_annotation("utterance", u1)
            .with_annotation("utterance", u2)
    }

    #[test]
    fn root_nodes_sorted_by_region_start() {
        let document = Document::from_source(&utterance_source()).expect("build");
        let structure = document.structure(None).expect("structure");
        let view = document.view(&structure);

        let roots: Vec<_> = view.root_nodes().iter().map(|n| n.id.index().to_string()).collect();
        assert_eq!(roots, vec!["u2", "u1"]);
    }

    #[test]
    fn root_nodes_fall_back_to_identity_order() {
        let document = Document::from_source(&utterance_source()).expect("build");
        // Words carry no regions, so a word-rooted view keeps identity order.
        let structure =
            DataStructure::new(HierarchyTree::new(vec![HierarchyEntry::tier("word")])).expect("structure");
        let view = document.view(&structure);

        let words: Vec<_> = view.root_nodes().iter().map(|n| n.id.index().to_string()).collect();
        assert_eq!(words, vec!["w11", "w12", "w21", "w22"]);
    }

    #[test]
    fn nodes_for_tier_scoped_and_unscoped() {
        let document = Document::from_source(&utterance_source()).expect("build");
        let structure = document.structure(None).expect("structure");
        let view = document.view(&structure);
        let u1 = document
            .graph()
            .lookup(&NodeId::new("utterance", "u1"))
            .expect("u1");

        let words: Vec<_> = view
            .nodes_for_tier("word", Some(u1))
            .iter()
            .map(|n| n.id.index().to_string())
            .collect();
        assert_eq!(words, vec!["w11", "w12"]);

        assert_eq!(view.nodes_for_tier("word", None).len(), 4);
        assert!(view.nodes_for_tier("gloss", Some(u1)).is_empty());
    }

    #[test]
    fn nodes_for_tier_with_owned_tier_name() {
        let document = Document::from_source(&utterance_source()).expect("build");
        let structure = document.structure(None).expect("structure");
        let view = document.view(&structure);

        let words = {
            let tier = structure.flat()[1].clone();
            view.nodes_for_tier(&tier, None)
        };

        assert_eq!(words.len(), 4);
        assert!(words.iter().all(|n| n.id.is_in_tier("word")));
    }

    #[test]
    fn annotations_for_tier_own_or_children() {
        let document = Document::from_source(&utterance_source()).expect("build");
        let structure = document.structure(None).expect("structure");
        let view = document.view(&structure);
        let u1 = document
            .graph()
            .lookup(&NodeId::new("utterance", "u1"))
            .expect("u1");

        let own: Vec<_> = view.annotations_for_tier("utterance", u1).iter().map(|a| a.value()).collect();
        assert_eq!(own, vec!["the cat"]);

        let words: Vec<_> = view.annotations_for_tier("word", u1).iter().map(|a| a.value()).collect();
        assert_eq!(words, vec!["the", "cat"]);

        assert!(view.annotations_for_tier("gloss", u1).is_empty());
    }

    #[test]
    fn element_tree_mirrors_hierarchy() {
        let document = Document::from_source(&utterance_source()).expect("build");
        let structure = document.structure(None).expect("structure");
        let view = document.view(&structure);
        let u1 = document
            .graph()
            .lookup(&NodeId::new("utterance", "u1"))
            .expect("u1");

        let tree = view.element_tree(u1);
        let entries = tree.entries();
        assert_eq!(entries.len(), 3);

        match &entries[0] {
            ElementEntry::Leaf(element) => {
                assert_eq!(element.id, "utterance/nu1");
                assert_eq!(element.annotation, "the cat");
            }
            other => panic!("unexpected entry {:?}", other),
        }
        match &entries[1] {
            ElementEntry::Group(words) => assert_eq!(words.len(), 2),
            other => panic!("unexpected entry {:?}", other),
        }
        match &entries[2] {
            ElementEntry::Group(translations) => assert_eq!(translations.len(), 1),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn structure_rejects_repeated_tier() {
        let tree = HierarchyTree::new(vec![
            HierarchyEntry::tier("a"),
            HierarchyEntry::group(vec![HierarchyEntry::tier("a")]),
        ]);
        assert!(DataStructure::new(tree).is_err());
    }

    #[test]
    fn structure_rejects_headless_group() {
        let tree = HierarchyTree::new(vec![
            HierarchyEntry::tier("a"),
            HierarchyEntry::Group(HierarchyTree::default()),
        ]);
        assert!(DataStructure::new(tree).is_err());
    }
}
