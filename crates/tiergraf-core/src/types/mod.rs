//! # Core Type Definitions
//!
//! This module contains all core types for the tiergraf standoff graph:
//! - Identity scheme (`NodeId`) and source-side tiers (`Tier`, `SourceAnnotation`)
//! - Graph records (`Node`, `Edge`, `Region`, `Annotation`, `AnnotationSpace`)
//! - The opaque passthrough payload (`Blob`)
//! - The source capability interface (`SourceAdapter`)
//! - Error types (`GrafError`)
//!
//! ## Identity Guarantees
//!
//! Every identifier is derived from the source: a tier prefix plus the
//! annotation id the adapter reported. Nothing here draws random or
//! counter-based ids, so two builds of the same source agree on every id.

use crate::primitives::ANNOTATION_VALUE_KEY;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTITY SCHEME
// =============================================================================

/// Composite identifier of a node: tier prefix plus source-local index.
///
/// The string form is `"<prefix>/n<index>"`. The same pair derives the edge id
/// (`"e<index>"`) of the edge pointing at this node and the region id
/// (`"<prefix>/r<index>"`) of the region linked from it.
///
/// Ordering is by prefix, then index. This is the "identity order" used when
/// root nodes cannot be ordered by region.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    prefix: String,
    index: String,
}

impl NodeId {
    /// Create a node id from a resolved tier prefix and a local index.
    #[must_use]
    pub fn new(prefix: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            index: index.into(),
        }
    }

    /// The tier prefix (`space/tier` or `tier`).
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The source-local index.
    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Id of the edge whose target is this node.
    #[must_use]
    pub fn edge_id(&self) -> String {
        format!("e{}", self.index)
    }

    /// Id of the region linked from this node.
    #[must_use]
    pub fn region_id(&self) -> String {
        format!("{}/r{}", self.prefix, self.index)
    }

    /// Check whether this node belongs to the given tier prefix.
    #[must_use]
    pub fn is_in_tier(&self, tier_prefix: &str) -> bool {
        self.prefix == tier_prefix
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/n{}", self.prefix, self.index)
    }
}

// =============================================================================
// SOURCE-SIDE TYPES
// =============================================================================

/// A column of annotations in the source document.
///
/// `annotation_space` groups tiers that share a naming authority. When absent,
/// the tier name itself acts as the annotation space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    #[serde(default)]
    pub annotation_space: Option<String>,
}

impl Tier {
    /// Create a tier without an annotation space.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation_space: None,
        }
    }

    /// Create a tier inside a named annotation space.
    #[must_use]
    pub fn with_space(name: impl Into<String>, space: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation_space: Some(space.into()),
        }
    }

    /// Label of the annotations produced for this tier.
    ///
    /// The annotation space with whitespace replaced by `_`, or the tier name.
    #[must_use]
    pub fn annotation_name(&self) -> String {
        match &self.annotation_space {
            Some(space) => normalize_space(space),
            None => self.name.clone(),
        }
    }

    /// Node-id prefix of every node created for this tier.
    #[must_use]
    pub fn prefix(&self) -> String {
        match &self.annotation_space {
            Some(space) => format!("{}/{}", normalize_space(space), self.name),
            None => self.name.clone(),
        }
    }
}

fn normalize_space(space: &str) -> String {
    space
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// An annotation as reported by a source adapter, before it enters the graph.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceAnnotation {
    pub id: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub features: BTreeMap<String, String>,
}

impl SourceAnnotation {
    #[must_use]
    pub fn new(id: impl Into<String>, value: Option<String>) -> Self {
        Self {
            id: id.into(),
            value,
            features: BTreeMap::new(),
        }
    }
}

// =============================================================================
// GRAPH RECORDS
// =============================================================================

/// A typed annotation attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    /// Tier or annotation-space name.
    pub label: String,
    pub features: BTreeMap<String, String>,
}

impl Annotation {
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            features: BTreeMap::new(),
        }
    }

    /// The primary annotation text, or `""` when the feature is missing.
    #[must_use]
    pub fn value(&self) -> &str {
        self.features
            .get(ANNOTATION_VALUE_KEY)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Named collection of annotations sharing one label.
///
/// Annotations are deduplicated by id and kept in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "StoredSpace", into = "StoredSpace")]
pub struct AnnotationSpace {
    pub name: String,
    annotations: Vec<Annotation>,
    ids: BTreeSet<String>,
}

/// Serialized form of an [`AnnotationSpace`]; the id set is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct StoredSpace {
    name: String,
    annotations: Vec<Annotation>,
}

impl From<StoredSpace> for AnnotationSpace {
    fn from(stored: StoredSpace) -> Self {
        let mut space = Self::new(stored.name);
        for annotation in stored.annotations {
            space.add(annotation);
        }
        space
    }
}

impl From<AnnotationSpace> for StoredSpace {
    fn from(space: AnnotationSpace) -> Self {
        Self {
            name: space.name,
            annotations: space.annotations,
        }
    }
}

impl AnnotationSpace {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: Vec::new(),
            ids: BTreeSet::new(),
        }
    }

    /// Add an annotation. Returns `false` if one with the same id is present.
    pub fn add(&mut self, annotation: Annotation) -> bool {
        if !self.ids.insert(annotation.id.clone()) {
            return false;
        }
        self.annotations.push(annotation);
        true
    }

    /// Check whether an annotation with `id` is present.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

/// A directed parent → child edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: NodeId,
    pub to: NodeId,
}

/// A span of the base text, as a pair of numeric anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchors {
    pub start: u64,
    pub end: u64,
}

/// A region of the base text linked from a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub anchors: Anchors,
}

impl Region {
    #[must_use]
    pub fn new(id: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            id: id.into(),
            anchors: Anchors { start, end },
        }
    }

    #[must_use]
    pub const fn start(&self) -> u64 {
        self.anchors.start
    }

    #[must_use]
    pub const fn end(&self) -> u64 {
        self.anchors.end
    }
}

/// A node of the standoff graph, one per source annotation.
///
/// Edges are referenced by their position in the owning graph's edge list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub in_edge: Option<usize>,
    pub out_edges: Vec<usize>,
    pub region: Option<String>,
    pub annotations: Vec<Annotation>,
}

impl Node {
    #[must_use]
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            in_edge: None,
            out_edges: Vec::new(),
            region: None,
            annotations: Vec::new(),
        }
    }
}

/// Format-specific side data carried through the graph untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Blob {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    #[must_use]
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }
}

// =============================================================================
// SOURCE ADAPTER TRAIT
// =============================================================================

/// The capability set every annotation source exposes to the graph builder.
///
/// # Extension Point
///
/// One implementation per input format. The builder only ever asks for tiers
/// that the adapter itself returned from `root_tiers` or
/// `child_tiers_for_tier`; failing to answer for such a tier is a contract
/// violation and is surfaced as an error without retry.
pub trait SourceAdapter {
    /// Tiers that have no parent tier.
    fn root_tiers(&self) -> Result<Vec<Tier>, GrafError>;

    /// Direct child tiers of `tier`.
    fn child_tiers_for_tier(&self, tier: &Tier) -> Result<Vec<Tier>, GrafError>;

    /// Annotations of `tier`, optionally restricted to those owned by `parent`.
    fn annotations_for_tier(
        &self,
        tier: &Tier,
        parent: Option<&SourceAnnotation>,
    ) -> Result<Vec<SourceAnnotation>, GrafError>;

    /// Whether annotations of `tier` are anchored to the base text.
    fn tier_has_regions(&self, tier: &Tier) -> bool;

    /// Start and end anchor of an annotation on a region-carrying tier.
    fn region_for_annotation(&self, annotation: &SourceAnnotation)
    -> Result<(u64, u64), GrafError>;

    /// Opaque metadata of the source document, passed through to the graph.
    fn meta_information(&self) -> Option<Blob> {
        None
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in tiergraf.
///
/// Missing optional data (annotation value, region for ordering) is never an
/// error; it degrades to a defined fallback at the call site.
#[derive(Debug, Error)]
pub enum GrafError {
    /// A tier name that is not part of the hierarchy or the source.
    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    /// A second node with an existing identity.
    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    /// The requested node was not found in the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// A region was requested for an annotation that has none.
    #[error("No region available for annotation {0}")]
    RegionsUnavailable(String),

    /// A filter pattern failed to compile.
    #[error("Invalid pattern for tier {tier}: {message}")]
    InvalidPattern { tier: String, message: String },

    /// The source document is structurally invalid.
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// =============================================================================
// TESTS
// =============================================================================
