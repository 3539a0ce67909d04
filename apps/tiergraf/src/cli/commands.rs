//! # CLI Command Implementations
//!
//! Each command returns the text it prints, so tests can drive them directly.

use super::{ConvertFormat, TableFormat};
use std::path::{Path, PathBuf};
use tiergraf_core::primitives::MAGIC_BYTES;
use tiergraf_core::{
    BooleanMode, Document, ElementEntry, ElementTree, FilterChain, GrafError, HierarchyEntry,
    HierarchyTree, NestedSource, SerializableGraph, TierHierarchy, document_from_bytes,
    document_to_bytes, layout_roots, render_html,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of an input file (200 MB).
const MAX_INPUT_FILE_SIZE: u64 = 200 * 1024 * 1024;

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), GrafError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| GrafError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(GrafError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `path` to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, GrafError> {
    let canonical = path.canonicalize().map_err(|e| {
        GrafError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(GrafError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve the parent of `path` to an existing directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, GrafError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        GrafError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(GrafError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| GrafError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<PathBuf, GrafError> {
    let validated = validate_output_path(path)?;
    std::fs::write(&validated, bytes)
        .map_err(|e| GrafError::IoError(format!("Write {}: {}", validated.display(), e)))?;
    Ok(validated)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, GrafError> {
    serde_json::to_string_pretty(value).map_err(|e| GrafError::SerializationError(e.to_string()))
}

// =============================================================================
// INPUT
// =============================================================================

/// Read a snapshot or a nested JSON source and return the document.
pub fn load_document(path: &Path) -> Result<Document, GrafError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_INPUT_FILE_SIZE)?;

    let bytes = std::fs::read(&validated)
        .map_err(|e| GrafError::IoError(format!("Read {}: {}", validated.display(), e)))?;

    if bytes.starts_with(MAGIC_BYTES) {
        tracing::debug!(path = %validated.display(), "reading snapshot");
        return document_from_bytes(&bytes);
    }

    tracing::debug!(path = %validated.display(), "reading nested source");
    let source: NestedSource = serde_json::from_slice(&bytes)
        .map_err(|e| GrafError::InvalidSource(format!("{}: {}", validated.display(), e)))?;
    Document::from_source(&source)
}

// =============================================================================
// CONVERT COMMAND
// =============================================================================

#[derive(serde::Serialize)]
struct JsonExport<'a> {
    graph: SerializableGraph,
    hierarchy: &'a TierHierarchy,
}

/// Convert `input` and write the result to `output`.
pub fn cmd_convert(
    input: &Path,
    output: &Path,
    format: ConvertFormat,
    quiet: bool,
) -> Result<String, GrafError> {
    tracing::info!("Converting {:?} ({:?})", input, format);

    let document = load_document(input)?;
    let bytes = match format {
        ConvertFormat::Snapshot => document_to_bytes(&document)?,
        ConvertFormat::Json => {
            let export = JsonExport {
                graph: SerializableGraph::from(document.graph()),
                hierarchy: document.hierarchy(),
            };
            to_json(&export)?.into_bytes()
        }
    };
    let written = write_output(output, &bytes)?;

    if quiet {
        return Ok(String::new());
    }
    Ok(format!(
        "Converted {} nodes, {} edges, {} regions into {}",
        document.graph().node_count(),
        document.graph().edge_count(),
        document.graph().region_count(),
        written.display()
    ))
}

// =============================================================================
// HIERARCHY COMMAND
// =============================================================================

fn outline(tree: &HierarchyTree, depth: usize, out: &mut String) {
    for entry in tree.entries() {
        match entry {
            HierarchyEntry::Tier(tier) => {
                out.push_str(&format!("{}{}\n", "  ".repeat(depth), tier));
            }
            HierarchyEntry::Group(group) => outline(group, depth + 1, out),
        }
    }
}

/// Print the inferred hierarchy as an indented outline, or as nested lists.
pub fn cmd_hierarchy(input: &Path, json_mode: bool) -> Result<String, GrafError> {
    let document = load_document(input)?;

    if json_mode {
        return to_json(document.hierarchy());
    }

    let mut out = String::new();
    for tree in document.hierarchy().trees() {
        outline(tree, 0, &mut out);
    }
    Ok(out.trim_end().to_string())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show graph counts, overall and per tier.
pub fn cmd_status(input: &Path, json_mode: bool) -> Result<String, GrafError> {
    let document = load_document(input)?;
    let graph = document.graph();
    let tiers = document.hierarchy().flatten();

    if json_mode {
        let per_tier: serde_json::Map<String, serde_json::Value> = tiers
            .iter()
            .map(|tier| {
                let part = graph.partition(tier);
                (
                    tier.clone(),
                    serde_json::json!({
                        "nodes": part.nodes.len(),
                        "edges": part.edges.len(),
                        "regions": part.regions.len(),
                    }),
                )
            })
            .collect();
        let output = serde_json::json!({
            "file": input.to_string_lossy(),
            "node_count": graph.node_count(),
            "edge_count": graph.edge_count(),
            "region_count": graph.region_count(),
            "annotation_spaces": graph.annotation_spaces().count(),
            "hierarchy_trees": document.hierarchy().len(),
            "tiers": per_tier,
        });
        return to_json(&output);
    }

    let mut out = String::new();
    out.push_str("tiergraf Document Status\n");
    out.push_str("========================\n");
    out.push_str(&format!("File: {:?}\n\n", input));
    out.push_str(&format!("Nodes:             {}\n", graph.node_count()));
    out.push_str(&format!("Edges:             {}\n", graph.edge_count()));
    out.push_str(&format!("Regions:           {}\n", graph.region_count()));
    out.push_str(&format!(
        "Annotation spaces: {}\n",
        graph.annotation_spaces().count()
    ));
    out.push_str(&format!(
        "Hierarchy trees:   {}\n\n",
        document.hierarchy().len()
    ));
    out.push_str("Tiers:\n");
    for tier in &tiers {
        out.push_str(&format!(
            "  {:<20} {} nodes\n",
            tier,
            graph.partition(tier).nodes.len()
        ));
    }
    Ok(out.trim_end().to_string())
}

// =============================================================================
// TABLE COMMAND
// =============================================================================

/// Table options after merging flags with the configuration.
#[derive(Debug, Clone)]
pub struct TableSettings {
    pub root_tier: Option<String>,
    pub format: TableFormat,
    pub full_html: bool,
}

/// Render the elements of `input` as tables.
pub fn cmd_table(
    input: &Path,
    settings: &TableSettings,
    output: Option<&Path>,
) -> Result<String, GrafError> {
    let document = load_document(input)?;
    let structure = document.structure(settings.root_tier.as_deref())?;
    let view = document.view(&structure);

    let rendered = match settings.format {
        TableFormat::Html => render_html(view, settings.full_html),
        TableFormat::Text => layout_roots(view)
            .iter()
            .enumerate()
            .map(|(i, grid)| format!("[{}]\n{}", i, grid))
            .collect::<Vec<_>>()
            .join("\n\n"),
    };

    match output {
        Some(path) => {
            let written = write_output(path, rendered.as_bytes())?;
            Ok(format!("Wrote {}", written.display()))
        }
        None => Ok(rendered),
    }
}

// =============================================================================
// FILTER COMMAND
// =============================================================================

/// Filter options after merging flags with the configuration.
#[derive(Debug, Clone)]
pub struct FilterSettings {
    pub root_tier: Option<String>,
    pub patterns: Vec<(String, String)>,
    pub mode: BooleanMode,
    pub inverted: bool,
}

/// Text of the first leaf of an element tree, the root tier's annotation.
fn root_text(tree: &ElementTree) -> &str {
    match tree.entries().first() {
        Some(ElementEntry::Leaf(element)) => &element.annotation,
        _ => "",
    }
}

/// Evaluate the patterns over every root element of `input`.
pub fn cmd_filter(
    input: &Path,
    settings: &FilterSettings,
    json_mode: bool,
) -> Result<String, GrafError> {
    let document = load_document(input)?;
    let structure = document.structure(settings.root_tier.as_deref())?;
    let elements = document.view(&structure).element_trees();
    let total = elements.len();

    let mut chain = FilterChain::new(structure, elements);
    let mut filter = chain.last_filter();
    for (tier, pattern) in &settings.patterns {
        filter.set_filter_for_tier(tier, pattern)?;
    }
    filter.set_boolean_mode(settings.mode);
    filter.set_inverted(settings.inverted);
    chain.append_filter(filter);

    let passed = chain.filtered_element_ids();
    tracing::info!(total, passed = passed.len(), "filter evaluated");

    if json_mode {
        let elements: Vec<serde_json::Value> = passed
            .iter()
            .filter_map(|&i| chain.elements().get(i).map(|tree| (i, tree)))
            .map(|(i, tree)| serde_json::json!({ "index": i, "tree": tree }))
            .collect();
        let output = serde_json::json!({
            "total": total,
            "passed": passed,
            "elements": elements,
            "matches": chain.last_matches(),
        });
        return to_json(&output);
    }

    let mut out = format!("{} of {} elements pass\n", passed.len(), total);
    for &i in passed {
        if let Some(tree) = chain.elements().get(i) {
            out.push_str(&format!("  [{}] {}\n", i, root_text(tree)));
        }
    }
    if let Some(matches) = chain.last_matches() {
        for (tier, by_element) in matches {
            for (id, spans) in by_element {
                out.push_str(&format!("  match {} {} {:?}\n", tier, id, spans));
            }
        }
    }
    Ok(out.trim_end().to_string())
}
