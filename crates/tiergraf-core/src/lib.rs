//! # tiergraf-core
//!
//! Standoff annotation graphs for tier-based linguistic data.
//!
//! A source document (interlinear glossed text, time-aligned transcription)
//! is read through a [`SourceAdapter`] and turned into a graph of annotated
//! nodes. While walking the source, the builder also infers the tier
//! hierarchy: which tier repeats under which.
//!
//! On top of the built graph:
//! - [`view`] answers hierarchy-aware lookups (roots, children in a tier)
//! - [`table`] lays elements out as interlinear grids (HTML or text)
//! - [`filter`] evaluates per-tier patterns over element trees
//!
//! ## Architectural Constraints
//!
//! - Pure, synchronous Rust: no async, no network, no file I/O
//! - Deterministic: keyed storage is ordered, identities come from the source
//! - Built once: the graph is never mutated after the builder returns

// =============================================================================
// MODULES
// =============================================================================

pub mod builder;
pub mod document;
pub mod filter;
pub mod formats;
pub mod graph;
pub mod hierarchy;
pub mod primitives;
pub mod source;
pub mod table;
pub mod types;
pub mod view;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    Anchors, Annotation, AnnotationSpace, Blob, Edge, GrafError, Node, NodeId, Region,
    SourceAdapter, SourceAnnotation, Tier,
};

// =============================================================================
// RE-EXPORTS: Graph and Hierarchy
// =============================================================================

pub use builder::GraphBuilder;
pub use document::Document;
pub use graph::{Graph, SerializableGraph, TierPartition};
pub use hierarchy::{HierarchyEntry, HierarchyTree, TierHierarchy, TierPair, TraversalLog};
pub use source::{NestedAnnotation, NestedSource, NestedTier};
pub use view::{AnnotationGraph, DataStructure};

// =============================================================================
// RE-EXPORTS: Layout and Filters
// =============================================================================

pub use filter::{
    AnnotationFilter, AppliedFilter, BooleanMode, Element, ElementEntry, ElementTree,
    FilterChain, FilterOutcome, MatchMap, PatternEngine, PatternMatcher, RegexEngine, Span,
};
pub use table::{Cell, Grid, GridRow, layout, layout_all, layout_roots, render_html};

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::{SnapshotHeader, document_from_bytes, document_to_bytes};
