//! # Table Layout Engine
//!
//! Interlinear layout of annotation trees as grids of merged cells.
//!
//! A [`Grid`] has one row per tier of the flat hierarchy. Instances of a
//! repeating group are laid out side by side; rows of the tiers around the
//! group are widened to cover every column the group consumed.
//!
//! ```text
//! record | the cat   | a dog
//! word   | the | cat | a | dog
//! ```

use crate::Node;
use crate::hierarchy::{HierarchyEntry, HierarchyTree};
use crate::primitives::HTML_EMPTY_CELL;
use crate::view::AnnotationGraph;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use unicode_width::UnicodeWidthStr;

// =============================================================================
// GRID
// =============================================================================

/// Displayed text and the number of columns it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub text: String,
    pub span: usize,
}

impl Cell {
    pub fn new(text: impl Into<String>, span: usize) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }
}

/// Cells of one tier, keyed by starting column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridRow {
    pub tier: String,
    pub cells: BTreeMap<usize, Cell>,
}

/// One row per tier of the flat hierarchy, in flat order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grid {
    rows: Vec<GridRow>,
}

impl Grid {
    /// Empty grid with one row per tier.
    #[must_use]
    pub fn new(flat: &[String]) -> Self {
        let rows = flat
            .iter()
            .map(|tier| GridRow {
                tier: tier.clone(),
                cells: BTreeMap::new(),
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    pub fn row(&self, tier: &str) -> Option<&GridRow> {
        self.rows.iter().find(|r| r.tier == tier)
    }

    /// Number of columns covered by the widest row.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter().map(|(column, cell)| column + cell.span))
            .max()
            .unwrap_or(0)
    }

    /// Render as one `<table>` element; `index` labels the first column.
    #[must_use]
    pub fn to_html(&self, index: usize) -> String {
        let mut html = String::from("<table border=\"1\">\n");
        for (j, row) in self.rows.iter().enumerate() {
            html.push_str("<tr>\n");
            if j == 0 {
                html.push_str(&format!(
                    "<td rowspan=\"{}\" class=\"element_id\">{}</td>\n",
                    self.rows.len(),
                    index
                ));
            }
            let class = html_escape(&row.tier);
            html.push_str(&format!("<td class=\"ann_type\">{}</td>", class));
            for cell in row.cells.values() {
                let text = if cell.text.is_empty() {
                    HTML_EMPTY_CELL.to_string()
                } else {
                    html_escape(&cell.text)
                };
                html.push_str(&format!(
                    "<td colspan=\"{}\" class=\"{}\">{}</td>\n",
                    cell.span, class, text
                ));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table>\n");
        html
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![1; self.column_count()];
        let mut spanning = Vec::new();

        for row in &self.rows {
            for (&column, cell) in &row.cells {
                let width = UnicodeWidthStr::width(cell.text.as_str());
                if cell.span <= 1 {
                    if let Some(w) = widths.get_mut(column) {
                        *w = (*w).max(width);
                    }
                } else {
                    spanning.push((cell.span, column, width));
                }
            }
        }

        // Narrow spans first so wider ones see the final inner widths.
        spanning.sort_unstable();
        for (span, column, width) in spanning {
            let end = (column + span).min(widths.len());
            let available = span_width(&widths, column, end);
            if width > available {
                if let Some(last) = widths.get_mut(end.saturating_sub(1)) {
                    *last += width - available;
                }
            }
        }
        widths
    }
}

const SEPARATOR: &str = " | ";

fn span_width(widths: &[usize], start: usize, end: usize) -> usize {
    let inner: usize = widths.get(start..end).map(|w| w.iter().sum()).unwrap_or(0);
    inner + SEPARATOR.len() * end.saturating_sub(start).saturating_sub(1)
}

fn pad(text: &str, width: usize) -> String {
    let used = UnicodeWidthStr::width(text);
    format!("{}{}", text, " ".repeat(width.saturating_sub(used)))
}

/// Plain-text rendering, one line per tier.
impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();
        let label_width = self
            .rows
            .iter()
            .map(|r| UnicodeWidthStr::width(r.tier.as_str()))
            .max()
            .unwrap_or(0);

        for (j, row) in self.rows.iter().enumerate() {
            if j > 0 {
                writeln!(f)?;
            }
            let mut line = pad(&row.tier, label_width);
            let mut column = 0;
            while column < widths.len() {
                line.push_str(SEPARATOR);
                match row.cells.get(&column) {
                    Some(cell) => {
                        let span = cell.span.max(1);
                        let end = (column + span).min(widths.len());
                        line.push_str(&pad(&cell.text, span_width(&widths, column, end)));
                        column += span;
                    }
                    None => {
                        line.push_str(&" ".repeat(widths[column]));
                        column += 1;
                    }
                }
            }
            f.write_str(line.trim_end())?;
        }
        Ok(())
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// =============================================================================
// LAYOUT
// =============================================================================

/// Lay out the tree under `root` starting at column 0.
#[must_use]
pub fn layout<'a>(view: AnnotationGraph<'a>, root: &'a Node) -> Grid {
    let structure = view.structure();
    let mut grid = Grid::new(structure.flat());
    place(view, root, structure.hierarchy(), &mut grid, 0);
    grid
}

/// One grid per root node, in root order.
#[must_use]
pub fn layout_roots(view: AnnotationGraph<'_>) -> Vec<Grid> {
    view.root_nodes()
        .into_iter()
        .map(|root| layout(view, root))
        .collect()
}

/// Every root side by side in a single grid.
#[must_use]
pub fn layout_all(view: AnnotationGraph<'_>) -> Grid {
    let structure = view.structure();
    let mut grid = Grid::new(structure.flat());
    let mut column = 0;
    for root in view.root_nodes() {
        let consumed = place(view, root, structure.hierarchy(), &mut grid, column);
        column += consumed + 1;
    }
    grid
}

/// HTML for every root of `view`, one table each.
#[must_use]
pub fn render_html(view: AnnotationGraph<'_>, full_html: bool) -> String {
    let mut html = String::new();
    if full_html {
        html.push_str(
            "<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\" /></head><body>\n",
        );
    }
    for (i, grid) in layout_roots(view).iter().enumerate() {
        html.push_str(&grid.to_html(i));
    }
    if full_html {
        html.push_str("</body></html>");
    }
    html
}

/// Place `node` laid out along `subtree` at `column`.
///
/// Returns the number of extra columns consumed beyond the first.
fn place<'a>(
    view: AnnotationGraph<'a>,
    node: &'a Node,
    subtree: &HierarchyTree,
    grid: &mut Grid,
    column: usize,
) -> usize {
    let structure = view.structure();
    let mut inserted = 0;

    for entry in subtree.entries() {
        match entry {
            HierarchyEntry::Group(group) => {
                let children = group
                    .head()
                    .map(|head| view.nodes_for_tier(head, Some(node)))
                    .unwrap_or_default();
                for (i, child) in children.iter().copied().enumerate() {
                    inserted += place(view, child, group, grid, column + i + inserted);
                }
                inserted += children.len().saturating_sub(1);

                let width = inserted + 1;
                for tier in subtree.direct_tiers() {
                    let Some(row) = structure.row_of(tier) else {
                        continue;
                    };
                    match grid.rows[row].cells.entry(column) {
                        Entry::Occupied(mut cell) => cell.get_mut().span = width,
                        Entry::Vacant(slot) => {
                            slot.insert(Cell::new("", width));
                        }
                    }
                }
            }
            HierarchyEntry::Tier(tier) => {
                let Some(row) = structure.row_of(tier) else {
                    continue;
                };
                let text = view
                    .annotations_for_tier(tier, node)
                    .first()
                    .map(|a| a.value().to_string())
                    .unwrap_or_default();
                match grid.rows[row].cells.entry(column) {
                    Entry::Occupied(mut cell) => cell.get_mut().text = text,
                    Entry::Vacant(slot) => {
                        slot.insert(Cell::new(text, 1));
                    }
                }
            }
        }
    }

    tracing::trace!(node = %node.id, column, inserted, "node placed");
    inserted
}

// =============================================================================
// TESTS
// =============================================================================
