//! # Nested Source
//!
//! An in-memory [`SourceAdapter`] over a tree of tiers and annotations.
//!
//! The shape is what a JSON document naturally looks like: tiers nest their
//! child tiers, annotations nest the annotations they own, keyed by child tier
//! name.
//!
//! ```json
//! {
//!   "tiers": [{ "name": "record", "regions": true, "children": [{ "name": "word" }] }],
//!   "annotations": {
//!     "record": [{ "id": "r1", "value": "the cat", "region": [0, 7],
//!                  "children": { "word": [{ "id": "w1", "value": "the" }] } }]
//!   }
//! }
//! ```
//!
//! Annotation ids must be unique across the whole document; the adapter finds
//! parents and regions by id.

use crate::{Blob, GrafError, SourceAdapter, SourceAnnotation, Tier};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::BTreeMap;

/// A tier declaration with its child tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedTier {
    pub name: String,
    #[serde(default)]
    pub annotation_space: Option<String>,
    /// Whether annotations of this tier carry a region.
    #[serde(default)]
    pub regions: bool,
    #[serde(default)]
    pub children: Vec<NestedTier>,
}

impl NestedTier {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation_space: None,
            regions: false,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_space(mut self, space: impl Into<String>) -> Self {
        self.annotation_space = Some(space.into());
        self
    }

    #[must_use]
    pub fn with_regions(mut self) -> Self {
        self.regions = true;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: NestedTier) -> Self {
        self.children.push(child);
        self
    }

    fn to_tier(&self) -> Tier {
        Tier {
            name: self.name.clone(),
            annotation_space: self.annotation_space.clone(),
        }
    }

    fn matches(&self, tier: &Tier) -> bool {
        self.name == tier.name && self.annotation_space == tier.annotation_space
    }

    fn find(&self, tier: &Tier) -> Option<&NestedTier> {
        if self.matches(tier) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(tier))
    }
}

/// An annotation with the annotations it owns, grouped by child tier name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedAnnotation {
    pub id: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub features: BTreeMap<String, String>,
    #[serde(default)]
    pub region: Option<(u64, u64)>,
    #[serde(default)]
    pub children: BTreeMap<String, Vec<NestedAnnotation>>,
}

impl NestedAnnotation {
    #[must_use]
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: Some(value.into()),
            features: BTreeMap::new(),
            region: None,
            children: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_region(mut self, start: u64, end: u64) -> Self {
        self.region = Some((start, end));
        self
    }

    #[must_use]
    pub fn with_feature(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.features.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_children(mut self, tier: impl Into<String>, children: Vec<NestedAnnotation>) -> Self {
        self.children.entry(tier.into()).or_default().extend(children);
        self
    }

    fn to_source(&self) -> SourceAnnotation {
        SourceAnnotation {
            id: self.id.clone(),
            value: self.value.clone(),
            features: self.features.clone(),
        }
    }
}

/// Position of an annotation: top-level tier and index, then one
/// `(child tier, index)` step per nesting level.
type AnnotationPath = Vec<(String, usize)>;

/// A whole document held in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NestedSource {
    tiers: Vec<NestedTier>,
    /// Annotations without a parent, keyed by tier name.
    #[serde(default)]
    annotations: BTreeMap<String, Vec<NestedAnnotation>>,
    /// Free-form metadata passed through to the graph.
    #[serde(default)]
    meta: Option<String>,
    #[serde(skip)]
    index: OnceCell<Result<BTreeMap<String, AnnotationPath>, String>>,
}

impl NestedSource {
    #[must_use]
    pub fn new(tiers: Vec<NestedTier>) -> Self {
        Self {
            tiers,
            ..Self::default()
        }
    }

    /// Add a parent-less annotation to `tier`.
    #[must_use]
    pub fn with_annotation(mut self, tier: impl Into<String>, annotation: NestedAnnotation) -> Self {
        self.annotations.entry(tier.into()).or_default().push(annotation);
        self.index = OnceCell::new();
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    pub fn tiers(&self) -> &[NestedTier] {
        &self.tiers
    }

    /// Check that annotation ids are unique.
    pub fn validate(&self) -> Result<(), GrafError> {
        self.index().map(|_| ())
    }

    fn index(&self) -> Result<&BTreeMap<String, AnnotationPath>, GrafError> {
        self.index
            .get_or_init(|| self.build_index())
            .as_ref()
            .map_err(|e| GrafError::InvalidSource(e.clone()))
    }

    fn build_index(&self) -> Result<BTreeMap<String, AnnotationPath>, String> {
        fn visit(
            annotation: &NestedAnnotation,
            path: &mut AnnotationPath,
            index: &mut BTreeMap<String, AnnotationPath>,
        ) -> Result<(), String> {
            if index.insert(annotation.id.clone(), path.clone()).is_some() {
                return Err(format!("duplicate annotation id {}", annotation.id));
            }
            for (tier, children) in &annotation.children {
                for (i, child) in children.iter().enumerate() {
                    path.push((tier.clone(), i));
                    visit(child, path, index)?;
                    path.pop();
                }
            }
            Ok(())
        }

        let mut index = BTreeMap::new();
        for (tier, annotations) in &self.annotations {
            for (i, annotation) in annotations.iter().enumerate() {
                let mut path = vec![(tier.clone(), i)];
                visit(annotation, &mut path, &mut index)?;
            }
        }
        Ok(index)
    }

    fn resolve(&self, path: &[(String, usize)]) -> Option<&NestedAnnotation> {
        let ((tier, i), rest) = path.split_first()?;
        let mut current = self.annotations.get(tier)?.get(*i)?;
        for (tier, i) in rest {
            current = current.children.get(tier)?.get(*i)?;
        }
        Some(current)
    }

    fn lookup(&self, id: &str) -> Result<Option<&NestedAnnotation>, GrafError> {
        let index = self.index()?;
        Ok(index.get(id).and_then(|path| self.resolve(path)))
    }

    fn find_tier(&self, tier: &Tier) -> Result<&NestedTier, GrafError> {
        self.tiers
            .iter()
            .find_map(|t| t.find(tier))
            .ok_or_else(|| GrafError::UnknownTier(tier.name.clone()))
    }
}

impl SourceAdapter for NestedSource {
    fn root_tiers(&self) -> Result<Vec<Tier>, GrafError> {
        self.validate()?;
        Ok(self.tiers.iter().map(NestedTier::to_tier).collect())
    }

    fn child_tiers_for_tier(&self, tier: &Tier) -> Result<Vec<Tier>, GrafError> {
        let nested = self.find_tier(tier)?;
        Ok(nested.children.iter().map(NestedTier::to_tier).collect())
    }

    fn annotations_for_tier(
        &self,
        tier: &Tier,
        parent: Option<&SourceAnnotation>,
    ) -> Result<Vec<SourceAnnotation>, GrafError> {
        let owned = match parent {
            None => self.annotations.get(&tier.name),
            Some(parent) => {
                let nested = self
                    .lookup(&parent.id)?
                    .ok_or_else(|| GrafError::InvalidSource(format!("unknown annotation {}", parent.id)))?;
                nested.children.get(&tier.name)
            }
        };
        Ok(owned
            .map(|list| list.iter().map(NestedAnnotation::to_source).collect())
            .unwrap_or_default())
    }

    fn tier_has_regions(&self, tier: &Tier) -> bool {
        self.find_tier(tier).map(|t| t.regions).unwrap_or(false)
    }

    fn region_for_annotation(
        &self,
        annotation: &SourceAnnotation,
    ) -> Result<(u64, u64), GrafError> {
        self.lookup(&annotation.id)?
            .and_then(|a| a.region)
            .ok_or_else(|| GrafError::RegionsUnavailable(annotation.id.clone()))
    }

    fn meta_information(&self) -> Option<Blob> {
        self.meta
            .as_ref()
            .map(|m| Blob::new("text/plain", m.as_bytes().to_vec()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NestedSource {
        let tiers = vec![
            NestedTier::new("record")
                .with_regions()
                .with_child(NestedTier::new("word")),
        ];
        NestedSource::new(tiers).with_annotation(
            "record",
            NestedAnnotation::new("r1", "the cat")
                .with_region(0, 7)
                .with_children(
                    "word",
                    vec![
                        NestedAnnotation::new("w1", "the"),
                        NestedAnnotation::new("w2", "cat"),
                    ],
                ),
        )
    }

    #[test]
    fn root_and_child_tiers() {
        let source = sample();

        let roots = source.root_tiers().expect("roots");
        assert_eq!(roots, vec![Tier::new("record")]);

        let children = source.child_tiers_for_tier(&roots[0]).expect("children");
        assert_eq!(children, vec![Tier::new("word")]);
    }

    #[test]
    fn annotations_scoped_to_parent() {
        let source = sample();
        let records = source
            .annotations_for_tier(&Tier::new("record"), None)
            .expect("records");
        assert_eq!(records.len(), 1);

        let words = source
            .annotations_for_tier(&Tier::new("word"), Some(&records[0]))
            .expect("words");
        let ids: Vec<_> = words.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "w2"]);
    }

    #[test]
    fn region_lookup_by_id() {
        let source = sample();
        let record = SourceAnnotation::new("r1", None);
        assert_eq!(source.region_for_annotation(&record).expect("region"), (0, 7));

        let word = SourceAnnotation::new("w1", None);
        assert!(matches!(
            source.region_for_annotation(&word),
            Err(GrafError::RegionsUnavailable(_))
        ));
    }

    #[test]
    fn unknown_tier_is_an_error() {
        let source = sample();
        assert!(matches!(
            source.child_tiers_for_tier(&Tier::new("phrase")),
            Err(GrafError::UnknownTier(_))
        ));
        assert!(!source.tier_has_regions(&Tier::new("phrase")));
    }

    #[test]
    fn duplicate_ids_fail_validation() {
        let source = sample().with_annotation("record", NestedAnnotation::new("w1", "dup"));
        assert!(matches!(source.validate(), Err(GrafError::InvalidSource(_))));
        assert!(source.root_tiers().is_err());
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{
            "tiers": [{ "name": "record", "regions": true, "children": [{ "name": "word" }] }],
            "annotations": {
                "record": [{ "id": "r1", "value": "the cat", "region": [0, 7],
                             "children": { "word": [{ "id": "w1", "value": "the" }] } }]
            },
            "meta": "speaker: A"
        }"#;

        let source: NestedSource = serde_json::from_str(json).expect("parse");

        assert!(source.tier_has_regions(&Tier::new("record")));
        assert_eq!(source.region_for_annotation(&SourceAnnotation::new("r1", None)).expect("region"), (0, 7));
        assert_eq!(
            source.meta_information().map(|b| b.bytes),
            Some(b"speaker: A".to_vec())
        );
    }
}
