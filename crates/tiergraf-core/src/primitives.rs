//! # Primitives
//!
//! Fixed constants shared by the builder, the view and the snapshot format.

/// Feature key holding the primary text of an annotation.
pub const ANNOTATION_VALUE_KEY: &str = "annotation_value";

/// Key under which a source's meta information is stored in
/// `Graph::additional_information`.
pub const EXTRA_INFO_KEY: &str = "extra_info";

/// Separator that marks a namespaced root tier (`file..record`) when
/// selecting a hierarchy by root tier name.
pub const ROOT_TIER_SEPARATOR: &str = "..";

/// Text rendered for an empty table cell in HTML output.
pub const HTML_EMPTY_CELL: &str = "&nbsp;";

/// Magic bytes for the tiergraf snapshot header.
pub const MAGIC_BYTES: &[u8; 4] = b"TGRF";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum depth of a declared tier hierarchy.
///
/// Layout and filter recurse once per hierarchy level, so this bounds their
/// stack use independently of document size.
pub const MAX_HIERARCHY_DEPTH: usize = 64;
