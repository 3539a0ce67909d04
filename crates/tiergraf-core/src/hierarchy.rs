//! # Tier Hierarchy
//!
//! The forest of tier names discovered while building a graph.
//!
//! The builder records every `(tier, parent tier)` pair it walks through in a
//! [`TraversalLog`]: insertion ordered, duplicates dropped. Folding the log
//! yields a [`TierHierarchy`]: one [`HierarchyTree`] per root tier, where each
//! child tier appears as a nested group under its parent, meaning "this tier
//! repeats under its parent".
//!
//! ```text
//! log:   (record, -) (word, record) (morpheme, word) (translation, record)
//! tree:  [record, [word, [morpheme]], [translation]]
//! flat:  record word morpheme translation
//! ```

use crate::GrafError;
use crate::primitives::ROOT_TIER_SEPARATOR;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// HIERARCHY SHAPE
// =============================================================================

/// One position in a hierarchy: a tier, or a group that repeats under its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HierarchyEntry {
    Tier(String),
    Group(HierarchyTree),
}

impl HierarchyEntry {
    #[must_use]
    pub fn tier(name: impl Into<String>) -> Self {
        Self::Tier(name.into())
    }

    #[must_use]
    pub fn group(entries: Vec<HierarchyEntry>) -> Self {
        Self::Group(HierarchyTree::new(entries))
    }
}

/// An ordered sequence of hierarchy entries.
///
/// The top-level tree of a forest and every group share this shape. For a
/// group, the first entry is the repeating tier itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HierarchyTree(Vec<HierarchyEntry>);

impl HierarchyTree {
    #[must_use]
    pub fn new(entries: Vec<HierarchyEntry>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[HierarchyEntry] {
        &self.0
    }

    /// The tier this sequence is headed by.
    #[must_use]
    pub fn head(&self) -> Option<&str> {
        match self.0.first() {
            Some(HierarchyEntry::Tier(name)) => Some(name),
            _ => None,
        }
    }

    /// Pre-order list of tier names, groups expanded in place.
    #[must_use]
    pub fn flatten(&self) -> Vec<String> {
        let mut flat = Vec::new();
        self.flatten_into(&mut flat);
        flat
    }

    fn flatten_into(&self, flat: &mut Vec<String>) {
        for entry in &self.0 {
            match entry {
                HierarchyEntry::Tier(name) => flat.push(name.clone()),
                HierarchyEntry::Group(group) => group.flatten_into(flat),
            }
        }
    }

    /// Number of nesting levels, counting this one.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self
            .0
            .iter()
            .filter_map(|e| match e {
                HierarchyEntry::Group(group) => Some(group.depth()),
                HierarchyEntry::Tier(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Tier names that sit directly in this sequence (not inside a group).
    pub fn direct_tiers(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|e| match e {
            HierarchyEntry::Tier(name) => Some(name.as_str()),
            HierarchyEntry::Group(_) => None,
        })
    }
}

/// The inferred forest: one tree per distinct root tier, in traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierHierarchy {
    trees: Vec<HierarchyTree>,
}

impl TierHierarchy {
    #[must_use]
    pub fn new(trees: Vec<HierarchyTree>) -> Self {
        Self { trees }
    }

    pub fn trees(&self) -> &[HierarchyTree] {
        &self.trees
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Pre-order tier names of every tree, tree after tree.
    #[must_use]
    pub fn flatten(&self) -> Vec<String> {
        self.trees.iter().flat_map(HierarchyTree::flatten).collect()
    }

    /// Pick the tree to lay out.
    ///
    /// With a requested root tier, the first tree whose head equals it or ends
    /// with `..<root_tier>` wins. Without a match (or without a request) the
    /// first tree is used.
    pub fn select(&self, root_tier: Option<&str>) -> Result<&HierarchyTree, GrafError> {
        if let Some(root) = root_tier {
            let suffix = format!("{}{}", ROOT_TIER_SEPARATOR, root);
            let found = self.trees.iter().find(|tree| {
                tree.head()
                    .is_some_and(|head| head == root || head.ends_with(&suffix))
            });
            if let Some(tree) = found {
                return Ok(tree);
            }
            tracing::warn!(
                root_tier = root,
                "root tier not found in hierarchy, using the first tier hierarchy"
            );
        }
        self.trees
            .first()
            .ok_or_else(|| GrafError::UnknownTier(root_tier.unwrap_or_default().to_string()))
    }
}

// =============================================================================
// TRAVERSAL LOG
// =============================================================================

/// Observed `(tier prefix, parent tier prefix)` pair.
pub type TierPair = (String, Option<String>);

/// Ordered, de-duplicated log of tier pairs seen during a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalLog {
    pairs: Vec<TierPair>,
    seen: BTreeSet<TierPair>,
}

impl TraversalLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from stored pairs, dropping repeats.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = TierPair>) -> Self {
        let mut log = Self::new();
        for (tier, parent) in pairs {
            log.record(&tier, parent.as_deref());
        }
        log
    }

    /// Record a pair. Returns `false` when it was already logged.
    pub fn record(&mut self, tier: &str, parent: Option<&str>) -> bool {
        let pair = (tier.to_string(), parent.map(str::to_string));
        if !self.seen.insert(pair.clone()) {
            return false;
        }
        self.pairs.push(pair);
        true
    }

    pub fn pairs(&self) -> &[TierPair] {
        &self.pairs
    }

    /// Fold the log into a forest.
    ///
    /// Each tier lands at the position of its first observation; later pairs
    /// naming an already-placed tier are ignored. Parents are found through a
    /// prefix -> sequence index, so each pair is placed in O(log n).
    #[must_use]
    pub fn fold(&self) -> TierHierarchy {
        enum Slot {
            Tier(String),
            Group(usize),
        }

        let mut sequences: Vec<Vec<Slot>> = Vec::new();
        let mut roots: Vec<usize> = Vec::new();
        let mut location: BTreeMap<&str, usize> = BTreeMap::new();

        for (tier, parent) in &self.pairs {
            if location.contains_key(tier.as_str()) {
                continue;
            }
            match parent {
                None => {
                    let index = sequences.len();
                    sequences.push(vec![Slot::Tier(tier.clone())]);
                    roots.push(index);
                    location.insert(tier, index);
                }
                Some(parent) => {
                    let Some(&owner) = location.get(parent.as_str()) else {
                        tracing::warn!(tier = %tier, parent = %parent, "parent tier never observed, skipping");
                        continue;
                    };
                    let index = sequences.len();
                    sequences.push(vec![Slot::Tier(tier.clone())]);
                    sequences[owner].push(Slot::Group(index));
                    location.insert(tier, index);
                }
            }
        }

        fn materialize(sequences: &[Vec<Slot>], index: usize) -> HierarchyTree {
            HierarchyTree::new(
                sequences[index]
                    .iter()
                    .map(|slot| match slot {
                        Slot::Tier(name) => HierarchyEntry::Tier(name.clone()),
                        Slot::Group(child) => {
                            HierarchyEntry::Group(materialize(sequences, *child))
                        }
                    })
                    .collect(),
            )
        }

        TierHierarchy::new(
            roots
                .into_iter()
                .map(|root| materialize(&sequences, root))
                .collect(),
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
