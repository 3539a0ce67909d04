//! # Tree Filter Evaluator
//!
//! Per-tier pattern filters over element trees.
//!
//! An [`ElementTree`] has the shape of the declared hierarchy: one leaf per
//! tier and one list of subtrees per repeating group. A filter holds one
//! pattern per tier of the flat hierarchy; an empty pattern means "no
//! constraint". Evaluation walks the whole tree, recording every match span
//! it finds, and never stops early.
//!
//! ## Combination rules
//!
//! - Leaf with a pattern: passes when the pattern matches the leaf text.
//! - Leaf without a pattern: passes in `And` mode, fails in `Or` mode.
//! - Group: passes when any child instance passes.
//! - Each verdict is folded into the running total with the boolean mode.
//! - All patterns empty: every element passes, before inversion.
//!
//! The matching engine is pluggable through [`PatternEngine`]; the default
//! is [`RegexEngine`].

use crate::GrafError;
use crate::hierarchy::{HierarchyEntry, HierarchyTree};
use crate::view::DataStructure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A byte span `(start, end)` of one match.
pub type Span = (usize, usize);

/// Match spans by tier, then by element id.
pub type MatchMap = BTreeMap<String, BTreeMap<String, Vec<Span>>>;

// =============================================================================
// ELEMENT TREES
// =============================================================================

/// The text of one tier at one element, with the id of the node carrying it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub annotation: String,
}

impl Element {
    pub fn new(id: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            annotation: annotation.into(),
        }
    }
}

/// One position of an element tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementEntry {
    Leaf(Element),
    Group(Vec<ElementTree>),
}

/// Element tree aligned with a [`HierarchyTree`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementTree(Vec<ElementEntry>);

impl ElementTree {
    #[must_use]
    pub fn new(entries: Vec<ElementEntry>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[ElementEntry] {
        &self.0
    }
}

// =============================================================================
// PATTERN ENGINES
// =============================================================================

/// A compiled pattern.
pub trait PatternMatcher {
    /// Every non-overlapping match span in `text`, left to right.
    fn find_all(&self, text: &str) -> Vec<Span>;
}

/// Compiles pattern strings into matchers.
pub trait PatternEngine {
    type Matcher: PatternMatcher + Clone + fmt::Debug;

    fn compile(&self, pattern: &str) -> Result<Self::Matcher, String>;
}

/// [`PatternEngine`] backed by the `regex` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexEngine;

impl PatternMatcher for regex::Regex {
    fn find_all(&self, text: &str) -> Vec<Span> {
        self.find_iter(text).map(|m| (m.start(), m.end())).collect()
    }
}

impl PatternEngine for RegexEngine {
    type Matcher = regex::Regex;

    fn compile(&self, pattern: &str) -> Result<regex::Regex, String> {
        regex::Regex::new(pattern).map_err(|e| e.to_string())
    }
}

// =============================================================================
// FILTER
// =============================================================================

/// How per-tier verdicts are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanMode {
    #[default]
    And,
    Or,
}

impl BooleanMode {
    fn combine(self, running: bool, verdict: bool) -> bool {
        match self {
            Self::And => running && verdict,
            Self::Or => running || verdict,
        }
    }

    fn initial(self) -> bool {
        matches!(self, Self::And)
    }
}

/// A pattern string with its compiled form (`None` when empty).
#[derive(Debug, Clone)]
struct TierPattern<M> {
    source: String,
    matcher: Option<M>,
}

/// Result of evaluating one element tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    pub passed: bool,
    pub matches: MatchMap,
}

/// A set of per-tier patterns with a boolean mode and an inversion flag.
#[derive(Debug, Clone)]
pub struct AnnotationFilter<E: PatternEngine = RegexEngine> {
    engine: E,
    hierarchy: HierarchyTree,
    patterns: BTreeMap<String, TierPattern<E::Matcher>>,
    mode: BooleanMode,
    inverted: bool,
}

impl AnnotationFilter<RegexEngine> {
    /// Filter over `structure` with every pattern empty.
    #[must_use]
    pub fn new(structure: &DataStructure) -> Self {
        Self::with_engine(structure, RegexEngine)
    }
}

impl<E: PatternEngine> AnnotationFilter<E> {
    pub fn with_engine(structure: &DataStructure, engine: E) -> Self {
        let patterns = structure
            .flat()
            .iter()
            .map(|tier| {
                (
                    tier.clone(),
                    TierPattern {
                        source: String::new(),
                        matcher: None,
                    },
                )
            })
            .collect();
        Self {
            engine,
            hierarchy: structure.hierarchy().clone(),
            patterns,
            mode: BooleanMode::And,
            inverted: false,
        }
    }

    /// Set the pattern for `tier`. An empty pattern removes the constraint.
    ///
    /// The pattern is compiled here; a malformed one leaves the filter
    /// unchanged.
    pub fn set_filter_for_tier(&mut self, tier: &str, pattern: &str) -> Result<(), GrafError> {
        let slot = self
            .patterns
            .get_mut(tier)
            .ok_or_else(|| GrafError::UnknownTier(tier.to_string()))?;

        let matcher = if pattern.is_empty() {
            None
        } else {
            Some(
                self.engine
                    .compile(pattern)
                    .map_err(|message| GrafError::InvalidPattern {
                        tier: tier.to_string(),
                        message,
                    })?,
            )
        };

        *slot = TierPattern {
            source: pattern.to_string(),
            matcher,
        };
        Ok(())
    }

    pub fn set_boolean_mode(&mut self, mode: BooleanMode) {
        self.mode = mode;
    }

    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    pub fn boolean_mode(&self) -> BooleanMode {
        self.mode
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// The pattern string set for `tier`.
    pub fn pattern(&self, tier: &str) -> Option<&str> {
        self.patterns.get(tier).map(|p| p.source.as_str())
    }

    /// True when no tier carries a pattern.
    pub fn is_empty(&self) -> bool {
        self.patterns.values().all(|p| p.matcher.is_none())
    }

    /// Evaluate one element tree.
    pub fn evaluate(&self, tree: &ElementTree) -> FilterOutcome {
        let mut matches = MatchMap::new();
        let passed = if self.is_empty() {
            true
        } else {
            self.walk(self.mode.initial(), tree, &self.hierarchy, &mut matches)
        };

        FilterOutcome {
            passed: passed != self.inverted,
            matches,
        }
    }

    fn walk(
        &self,
        mut passed: bool,
        tree: &ElementTree,
        hierarchy: &HierarchyTree,
        matches: &mut MatchMap,
    ) -> bool {
        for (entry, element) in hierarchy.entries().iter().zip(tree.entries()) {
            let verdict = match (entry, element) {
                (HierarchyEntry::Group(group), ElementEntry::Group(children)) => {
                    let mut any = false;
                    for child in children {
                        let child_passed = self.walk(passed, child, group, matches);
                        any = any || child_passed;
                    }
                    any
                }
                (HierarchyEntry::Tier(tier), ElementEntry::Leaf(element)) => {
                    self.match_leaf(tier, element, matches)
                }
                _ => {
                    tracing::warn!("element tree does not follow the filter hierarchy");
                    false
                }
            };
            passed = self.mode.combine(passed, verdict);
        }
        passed
    }

    fn match_leaf(&self, tier: &str, element: &Element, matches: &mut MatchMap) -> bool {
        let Some(matcher) = self.patterns.get(tier).and_then(|p| p.matcher.as_ref()) else {
            return self.mode == BooleanMode::And;
        };

        let spans = matcher.find_all(&element.annotation);
        if spans.is_empty() {
            return false;
        }
        // Empty elements stand for missing annotations and have nothing to highlight.
        if !element.id.is_empty() {
            matches
                .entry(tier.to_string())
                .or_default()
                .insert(element.id.clone(), spans);
        }
        true
    }
}

// =============================================================================
// FILTER CHAIN
// =============================================================================

/// A filter applied in a chain, with the spans it recorded.
#[derive(Debug, Clone)]
pub struct AppliedFilter<E: PatternEngine = RegexEngine> {
    pub filter: AnnotationFilter<E>,
    pub matches: MatchMap,
}

/// A stack of filters, each narrowing the survivors of the previous one.
#[derive(Debug, Clone)]
pub struct FilterChain<E: PatternEngine + Clone = RegexEngine> {
    structure: DataStructure,
    engine: E,
    elements: Vec<ElementTree>,
    filters: Vec<AppliedFilter<E>>,
    filtered: Vec<Vec<usize>>,
}

impl FilterChain<RegexEngine> {
    #[must_use]
    pub fn new(structure: DataStructure, elements: Vec<ElementTree>) -> Self {
        Self::with_engine(structure, elements, RegexEngine)
    }
}

impl<E: PatternEngine + Clone> FilterChain<E> {
    pub fn with_engine(structure: DataStructure, elements: Vec<ElementTree>, engine: E) -> Self {
        let all = (0..elements.len()).collect();
        Self {
            structure,
            engine,
            elements,
            filters: Vec::new(),
            filtered: vec![all],
        }
    }

    pub fn elements(&self) -> &[ElementTree] {
        &self.elements
    }

    pub fn filters(&self) -> &[AppliedFilter<E>] {
        &self.filters
    }

    /// Apply `filter` to the current survivors and push it.
    pub fn append_filter(&mut self, filter: AnnotationFilter<E>) {
        let (survivors, matches) = self.apply(&filter, self.filtered_element_ids());
        tracing::debug!(
            before = self.filtered_element_ids().len(),
            after = survivors.len(),
            "filter appended"
        );
        self.filtered.push(survivors);
        self.filters.push(AppliedFilter { filter, matches });
    }

    /// Remove the last filter and its survivors.
    pub fn pop_filter(&mut self) -> Option<AnnotationFilter<E>> {
        let applied = self.filters.pop()?;
        self.filtered.pop();
        Some(applied.filter)
    }

    pub fn update_last_filter(&mut self, filter: AnnotationFilter<E>) {
        self.pop_filter();
        self.append_filter(filter);
    }

    /// Recompute every survivor set from the full element list.
    pub fn reset_filters(&mut self) {
        let filters = std::mem::take(&mut self.filters);
        self.filtered.truncate(1);
        for applied in filters {
            self.append_filter(applied.filter);
        }
    }

    /// The last filter, or a fresh filter with every pattern empty.
    pub fn last_filter(&self) -> AnnotationFilter<E> {
        match self.filters.last() {
            Some(applied) => applied.filter.clone(),
            None => AnnotationFilter::with_engine(&self.structure, self.engine.clone()),
        }
    }

    /// Indices of the elements passing every filter so far.
    pub fn filtered_element_ids(&self) -> &[usize] {
        self.filtered.last().map(Vec::as_slice).unwrap_or_default()
    }

    /// Spans recorded by the last filter.
    pub fn last_matches(&self) -> Option<&MatchMap> {
        self.filters.last().map(|applied| &applied.matches)
    }

    fn apply(&self, filter: &AnnotationFilter<E>, candidates: &[usize]) -> (Vec<usize>, MatchMap) {
        let mut survivors = Vec::new();
        let mut matches = MatchMap::new();
        for &index in candidates {
            let Some(tree) = self.elements.get(index) else {
                continue;
            };
            let outcome = filter.evaluate(tree);
            for (tier, spans) in outcome.matches {
                matches.entry(tier).or_default().extend(spans);
            }
            if outcome.passed {
                survivors.push(index);
            }
        }
        (survivors, matches)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str, text: &str) -> ElementEntry {
        ElementEntry::Leaf(Element::new(id, text))
    }

    fn record_word() -> DataStructure {
        DataStructure::new(HierarchyTree::new(vec![
            HierarchyEntry::tier("record"),
            HierarchyEntry::group(vec![HierarchyEntry::tier("word")]),
        ]))
        .expect("structure")
    }

    fn record(id: &str, text: &str, words: &[(&str, &str)]) -> ElementTree {
        ElementTree::new(vec![
            leaf(id, text),
            ElementEntry::Group(
                words
                    .iter()
                    .map(|(id, text)| ElementTree::new(vec![leaf(id, text)]))
                    .collect(),
            ),
        ])
    }

    #[test]
    fn group_passes_when_any_instance_matches() {
        let mut filter = AnnotationFilter::new(&record_word());
        filter.set_filter_for_tier("word", "cat").expect("pattern");

        let tree = record("r1", "", &[("w1", "the cat"), ("w2", "a dog")]);
        let outcome = filter.evaluate(&tree);

        assert!(outcome.passed);
        let word_matches = outcome.matches.get("word").expect("word matches");
        assert_eq!(word_matches.get("w1"), Some(&vec![(4, 7)]));
        assert!(!word_matches.contains_key("w2"));
    }

    #[test]
    fn all_empty_passes_in_both_modes() {
        let tree = record("r1", "x", &[]);
        let mut filter = AnnotationFilter::new(&record_word());
        assert!(filter.evaluate(&tree).passed);

        filter.set_boolean_mode(BooleanMode::Or);
        assert!(filter.evaluate(&tree).passed);

        filter.set_inverted(true);
        assert!(!filter.evaluate(&tree).passed);
    }

    #[test]
    fn empty_pattern_blocks_nothing_in_and_mode() {
        let mut filter = AnnotationFilter::new(&record_word());
        filter.set_filter_for_tier("record", "cat").expect("pattern");

        let tree = record("r1", "the cat", &[("w1", "the")]);
        assert!(filter.evaluate(&tree).passed);
    }

    #[test]
    fn empty_pattern_satisfies_nothing_in_or_mode() {
        let mut filter = AnnotationFilter::new(&record_word());
        filter.set_boolean_mode(BooleanMode::Or);
        filter.set_filter_for_tier("record", "zebra").expect("pattern");

        let tree = record("r1", "the cat", &[("w1", "the")]);
        assert!(!filter.evaluate(&tree).passed);

        filter.set_filter_for_tier("word", "the").expect("pattern");
        assert!(filter.evaluate(&tree).passed);
    }

    #[test]
    fn every_span_is_recorded_even_when_failing() {
        let mut filter = AnnotationFilter::new(&record_word());
        filter.set_filter_for_tier("record", "a").expect("pattern");
        filter.set_filter_for_tier("word", "zebra").expect("pattern");

        let tree = record("r1", "banana", &[("w1", "dog")]);
        let outcome = filter.evaluate(&tree);

        assert!(!outcome.passed);
        assert_eq!(
            outcome.matches["record"]["r1"],
            vec![(1, 2), (3, 4), (5, 6)]
        );
    }

    #[test]
    fn inversion_negates() {
        let mut filter = AnnotationFilter::new(&record_word());
        filter.set_filter_for_tier("word", "cat").expect("pattern");
        let tree = record("r1", "", &[("w1", "the cat")]);

        let plain = filter.evaluate(&tree).passed;
        filter.set_inverted(true);
        assert_eq!(filter.evaluate(&tree).passed, !plain);
    }

    #[test]
    fn malformed_pattern_is_rejected() {
        let mut filter = AnnotationFilter::new(&record_word());
        filter.set_filter_for_tier("word", "cat").expect("pattern");

        let result = filter.set_filter_for_tier("word", "(unclosed");

        assert!(matches!(result, Err(GrafError::InvalidPattern { .. })));
        assert_eq!(filter.pattern("word"), Some("cat"));
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let mut filter = AnnotationFilter::new(&record_word());
        let result = filter.set_filter_for_tier("gloss", "x");
        assert!(matches!(result, Err(GrafError::UnknownTier(_))));
    }

    #[test]
    fn chain_narrows_and_pops() {
        let structure = record_word();
        let elements = vec![
            record("r1", "one", &[("w1", "the cat")]),
            record("r2", "two", &[("w2", "a dog")]),
            record("r3", "three", &[("w3", "the dog")]),
        ];
        let mut chain = FilterChain::new(structure, elements);
        assert_eq!(chain.filtered_element_ids(), &[0, 1, 2]);

        let mut first = chain.last_filter();
        first.set_filter_for_tier("word", "the").expect("pattern");
        chain.append_filter(first);
        assert_eq!(chain.filtered_element_ids(), &[0, 2]);

        let mut second = chain.last_filter();
        second.set_filter_for_tier("word", "dog").expect("pattern");
        chain.append_filter(second);
        assert_eq!(chain.filtered_element_ids(), &[2]);
        assert!(chain.last_matches().expect("matches")["word"].contains_key("w3"));

        let popped = chain.pop_filter().expect("popped");
        assert_eq!(popped.pattern("word"), Some("dog"));
        assert_eq!(chain.filtered_element_ids(), &[0, 2]);

        chain.reset_filters();
        assert_eq!(chain.filtered_element_ids(), &[0, 2]);
        assert_eq!(chain.filters().len(), 1);
    }

    #[test]
    fn update_last_filter_replaces_it() {
        let elements = vec![
            record("r1", "one", &[("w1", "cat")]),
            record("r2", "two", &[("w2", "dog")]),
        ];
        let mut chain = FilterChain::new(record_word(), elements);

        let mut filter = chain.last_filter();
        filter.set_filter_for_tier("word", "cat").expect("pattern");
        chain.append_filter(filter);
        assert_eq!(chain.filtered_element_ids(), &[0]);

        let mut filter = chain.last_filter();
        filter.set_filter_for_tier("word", "dog").expect("pattern");
        chain.update_last_filter(filter);
        assert_eq!(chain.filtered_element_ids(), &[1]);
        assert_eq!(chain.filters().len(), 1);
    }

    #[test]
    fn pop_on_empty_chain_is_none() {
        let mut chain = FilterChain::new(record_word(), Vec::new());
        assert!(chain.pop_filter().is_none());
        assert!(chain.filtered_element_ids().is_empty());
        assert!(chain.last_filter().is_empty());
    }

    #[test]
    fn element_tree_json_shape() {
        let tree = record("r1", "x", &[("w1", "y")]);
        let json = serde_json::to_string(&tree).expect("json");
        assert_eq!(
            json,
            r#"[{"id":"r1","annotation":"x"},[[{"id":"w1","annotation":"y"}]]]"#
        );
    }
}
