//! # Graph Builder
//!
//! Turns any [`SourceAdapter`] into a [`Graph`] and, in the same pass,
//! discovers the tier hierarchy.
//!
//! - Depth-first walk seeded from the adapter's root tiers
//! - One node per source annotation, keyed by `NodeId(tier prefix, annotation id)`
//! - Parent nodes are created before their children, so every edge has both
//!   endpoints when it is inserted
//! - Every `(tier, parent tier)` pair walked through goes into the traversal
//!   log, which is folded into the forest at the end

use crate::document::Document;
use crate::graph::Graph;
use crate::hierarchy::{TierHierarchy, TraversalLog};
use crate::primitives::{ANNOTATION_VALUE_KEY, EXTRA_INFO_KEY, MAX_HIERARCHY_DEPTH};
use crate::{Annotation, GrafError, NodeId, SourceAdapter, SourceAnnotation, Tier};

/// The Graph Builder walks a source once and records what it sees.
pub struct GraphBuilder<'s, S: SourceAdapter + ?Sized> {
    source: &'s S,
    graph: Graph,
    log: TraversalLog,
}

/// Where a tier sits in the current recursion.
#[derive(Clone, Copy)]
struct ParentContext<'a> {
    node: Option<&'a NodeId>,
    annotation: Option<&'a SourceAnnotation>,
    prefix: Option<&'a str>,
    depth: usize,
}

impl<'s, S: SourceAdapter + ?Sized> GraphBuilder<'s, S> {
    /// Build the graph and the inferred tier hierarchy of `source`.
    pub fn build(source: &'s S) -> Result<(Graph, TierHierarchy), GrafError> {
        let document = Self::build_document(source)?;
        Ok(document.into_parts())
    }

    /// Build a [`Document`], which also keeps the traversal log.
    pub fn build_document(source: &'s S) -> Result<Document, GrafError> {
        let mut builder = Self {
            source,
            graph: Graph::new(),
            log: TraversalLog::new(),
        };

        let root_context = ParentContext {
            node: None,
            annotation: None,
            prefix: None,
            depth: 0,
        };
        for tier in builder.source.root_tiers()? {
            builder.convert_tier(&tier, root_context)?;
        }

        if let Some(meta) = builder.source.meta_information() {
            builder
                .graph
                .insert_additional_information(EXTRA_INFO_KEY, meta);
        }

        tracing::debug!(
            nodes = builder.graph.node_count(),
            edges = builder.graph.edge_count(),
            regions = builder.graph.region_count(),
            tier_pairs = builder.log.pairs().len(),
            "graph built"
        );

        Ok(Document::new(builder.graph, builder.log))
    }

    fn convert_tier(&mut self, tier: &Tier, parent: ParentContext<'_>) -> Result<(), GrafError> {
        if parent.depth >= MAX_HIERARCHY_DEPTH {
            return Err(GrafError::InvalidSource(format!(
                "tier nesting deeper than {} at tier {}",
                MAX_HIERARCHY_DEPTH, tier.name
            )));
        }

        let child_tiers = self.source.child_tiers_for_tier(tier)?;
        let prefix = tier.prefix();
        let annotation_name = tier.annotation_name();
        let has_regions = self.source.tier_has_regions(tier);

        self.log.record(&prefix, parent.prefix);

        let annotations = self.source.annotations_for_tier(tier, parent.annotation)?;
        tracing::debug!(
            tier = %prefix,
            parent = parent.prefix.unwrap_or("-"),
            annotations = annotations.len(),
            children = child_tiers.len(),
            "converting tier"
        );

        for annotation in &annotations {
            let node_id = NodeId::new(prefix.as_str(), annotation.id.as_str());
            self.add_node(&node_id, annotation, &annotation_name, has_regions, parent.node)?;

            let context = ParentContext {
                node: Some(&node_id),
                annotation: Some(annotation),
                prefix: Some(&prefix),
                depth: parent.depth + 1,
            };
            for child in &child_tiers {
                self.convert_tier(child, context)?;
            }
        }

        // Empty branch: still walk the children once so the log sees the pair.
        if annotations.is_empty() {
            let context = ParentContext {
                node: None,
                annotation: None,
                prefix: Some(&prefix),
                depth: parent.depth + 1,
            };
            for child in &child_tiers {
                self.convert_tier(child, context)?;
            }
        }

        Ok(())
    }

    fn add_node(
        &mut self,
        node_id: &NodeId,
        annotation: &SourceAnnotation,
        annotation_name: &str,
        has_regions: bool,
        parent: Option<&NodeId>,
    ) -> Result<(), GrafError> {
        self.graph.insert_node(node_id.clone())?;

        if has_regions {
            let (start, end) = self.source.region_for_annotation(annotation)?;
            self.graph.attach_region(node_id, start, end)?;
        }

        if let Some(parent) = parent {
            self.graph.insert_edge(parent, node_id)?;
        }

        let mut graph_annotation = Annotation::new(annotation.id.as_str(), annotation_name);
        graph_annotation.features = annotation.features.clone();
        if let Some(value) = &annotation.value {
            graph_annotation
                .features
                .insert(ANNOTATION_VALUE_KEY.to_string(), value.clone());
        }
        self.graph.add_annotation(node_id, graph_annotation)?;

        tracing::trace!(node = %node_id, "node created");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{HierarchyEntry, HierarchyTree};
    use crate::source::{NestedAnnotation, NestedSource, NestedTier};

    fn ann(id: &str, value: &str) -> NestedAnnotation {
        NestedAnnotation::new(id, value)
    }

    fn record_word_source() -> NestedSource {
        let word = NestedTier::new("word");
        let record = NestedTier::new("record").with_regions().with_child(word);
        NestedSource::new(vec![record])
            .with_annotation("record", ann("1", "the cat").with_region(0, 5).with_children(
                "word",
                vec![ann("11", "the"), ann("12", "cat")],
            ))
            .with_annotation("record", ann("2", "a dog").with_region(10, 15).with_children(
                "word",
                vec![ann("21", "a"), ann("22", "dog")],
            ))
    }

    #[test]
    fn build_creates_one_node_per_annotation() {
        let source = record_word_source();

        let (graph, _) = GraphBuilder::build(&source).expect("build");

        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.region_count(), 2);
        assert!(graph.lookup(&NodeId::new("word", "12")).is_some());
    }

    #[test]
    fn build_links_parent_to_child() {
        let source = record_word_source();

        let (graph, _) = GraphBuilder::build(&source).expect("build");

        let record = graph.lookup(&NodeId::new("record", "2")).expect("record");
        let children: Vec<_> = graph
            .children(record)
            .map(|n| n.id.to_string())
            .collect();
        assert_eq!(children, vec!["word/n21", "word/n22"]);
    }

    #[test]
    fn build_copies_value_into_feature() {
        let source = record_word_source();

        let (graph, _) = GraphBuilder::build(&source).expect("build");

        let word = graph.lookup(&NodeId::new("word", "12")).expect("word");
        assert_eq!(word.annotations.len(), 1);
        assert_eq!(word.annotations[0].value(), "cat");
        assert_eq!(word.annotations[0].label, "word");
        assert_eq!(graph.annotation_space("word").map(|s| s.len()), Some(4));
    }

    #[test]
    fn build_infers_hierarchy() {
        let source = record_word_source();

        let (_, hierarchy) = GraphBuilder::build(&source).expect("build");

        let expected = HierarchyTree::new(vec![
            HierarchyEntry::tier("record"),
            HierarchyEntry::group(vec![HierarchyEntry::tier("word")]),
        ]);
        assert_eq!(hierarchy.trees(), &[expected]);
    }

    #[test]
    fn empty_branch_still_records_child_tier() {
        let gloss = NestedTier::new("gloss");
        let word = NestedTier::new("word").with_child(gloss);
        let source = NestedSource::new(vec![word]);

        let (graph, hierarchy) = GraphBuilder::build(&source).expect("build");

        assert_eq!(graph.node_count(), 0);
        assert_eq!(hierarchy.flatten(), vec!["word", "gloss"]);
    }

    #[test]
    fn annotation_space_prefixes_node_ids() {
        let tier = NestedTier::new("W-Spch").with_space("words speaker A");
        let source = NestedSource::new(vec![tier]).with_annotation("W-Spch", ann("a1", "so"));

        let (graph, hierarchy) = GraphBuilder::build(&source).expect("build");

        let id = NodeId::new("words_speaker_A/W-Spch", "a1");
        let node = graph.lookup(&id).expect("node");
        assert_eq!(node.annotations[0].label, "words_speaker_A");
        assert_eq!(hierarchy.flatten(), vec!["words_speaker_A/W-Spch"]);
    }

    #[test]
    fn region_requested_without_anchor_fails() {
        let tier = NestedTier::new("record").with_regions();
        let source = NestedSource::new(vec![tier]).with_annotation("record", ann("1", "x"));

        let result = GraphBuilder::build(&source);
        assert!(matches!(result, Err(GrafError::RegionsUnavailable(_))));
    }

    /// Adapter that reports the same annotation twice for one tier.
    struct RepeatingSource;

    impl SourceAdapter for RepeatingSource {
        fn root_tiers(&self) -> Result<Vec<Tier>, GrafError> {
            Ok(vec![Tier::new("word")])
        }

        fn child_tiers_for_tier(&self, _tier: &Tier) -> Result<Vec<Tier>, GrafError> {
            Ok(Vec::new())
        }

        fn annotations_for_tier(
            &self,
            _tier: &Tier,
            _parent: Option<&SourceAnnotation>,
        ) -> Result<Vec<SourceAnnotation>, GrafError> {
            let a = SourceAnnotation::new("1", Some("a".to_string()));
            Ok(vec![a.clone(), a])
        }

        fn tier_has_regions(&self, _tier: &Tier) -> bool {
            false
        }

        fn region_for_annotation(
            &self,
            annotation: &SourceAnnotation,
        ) -> Result<(u64, u64), GrafError> {
            Err(GrafError::RegionsUnavailable(annotation.id.clone()))
        }
    }

    #[test]
    fn duplicate_annotation_id_is_rejected() {
        let result = GraphBuilder::build(&RepeatingSource);
        assert!(matches!(result, Err(GrafError::DuplicateNode(_))));
    }

    #[test]
    fn meta_information_passes_through() {
        let source = record_word_source().with_meta("<ANNOTATION_DOCUMENT/>");

        let (graph, _) = GraphBuilder::build(&source).expect("build");

        let blob = graph
            .additional_information()
            .get(EXTRA_INFO_KEY)
            .expect("extra info");
        assert_eq!(blob.bytes, b"<ANNOTATION_DOCUMENT/>".to_vec());
    }
}
