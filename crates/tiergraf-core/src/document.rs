//! # Document
//!
//! A built graph together with the tier hierarchy inferred while building it.
//!
//! This is what a conversion produces and what the snapshot format stores.
//! Only the traversal log is kept as the source of truth for the hierarchy;
//! the forest is folded from it on construction.

use crate::builder::GraphBuilder;
use crate::graph::Graph;
use crate::hierarchy::{TierHierarchy, TraversalLog};
use crate::view::{AnnotationGraph, DataStructure};
use crate::{GrafError, SourceAdapter};

/// A converted annotation document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    graph: Graph,
    log: TraversalLog,
    hierarchy: TierHierarchy,
}

impl Document {
    /// Pair a graph with its traversal log.
    #[must_use]
    pub fn new(graph: Graph, log: TraversalLog) -> Self {
        let hierarchy = log.fold();
        Self {
            graph,
            log,
            hierarchy,
        }
    }

    /// Convert a source into a document.
    pub fn from_source<S: SourceAdapter + ?Sized>(source: &S) -> Result<Self, GrafError> {
        GraphBuilder::build_document(source)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn hierarchy(&self) -> &TierHierarchy {
        &self.hierarchy
    }

    pub fn log(&self) -> &TraversalLog {
        &self.log
    }

    #[must_use]
    pub fn into_parts(self) -> (Graph, TierHierarchy) {
        (self.graph, self.hierarchy)
    }

    /// The data structure for the tree headed by `root_tier` (or the first tree).
    pub fn structure(&self, root_tier: Option<&str>) -> Result<DataStructure, GrafError> {
        DataStructure::new(self.hierarchy.select(root_tier)?.clone())
    }

    /// A read-only view of the graph through `structure`.
    #[must_use]
    pub fn view<'a>(&'a self, structure: &'a DataStructure) -> AnnotationGraph<'a> {
        AnnotationGraph::new(&self.graph, structure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{NestedAnnotation, NestedSource, NestedTier};

    #[test]
    fn structure_follows_requested_root() {
        let source = NestedSource::new(vec![
            NestedTier::new("header"),
            NestedTier::new("ref").with_child(NestedTier::new("tx")),
        ])
        .with_annotation("ref", NestedAnnotation::new("r1", "001"));

        let document = Document::from_source(&source).expect("build");

        assert_eq!(document.hierarchy().len(), 2);
        let structure = document.structure(Some("ref")).expect("structure");
        assert_eq!(structure.flat(), &["ref".to_string(), "tx".to_string()]);

        let structure = document.structure(None).expect("structure");
        assert_eq!(structure.root_tier(), "header");
    }

    #[test]
    fn rebuilding_from_log_gives_same_hierarchy() {
        let source = NestedSource::new(vec![
            NestedTier::new("record").with_child(NestedTier::new("word")),
        ]);
        let document = Document::from_source(&source).expect("build");

        let (graph, hierarchy) = document.clone().into_parts();
        let rebuilt = Document::new(graph, document.log().clone());

        assert_eq!(rebuilt.hierarchy(), &hierarchy);
    }
}
