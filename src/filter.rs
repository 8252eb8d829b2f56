//! Annotation set filtering: deciding which annotations survive extraction,
//! and enriching the survivors with the text they cover.
//!
//! A filter specification is a comma-separated list of `set:type` pairs,
//! e.g. `"drugs:Drug, *:Token"`. The `*` token matches any name at its
//! position. An empty filter means "no restriction".

use std::collections::{BTreeMap, BTreeSet};
use std::iter;

use tracing::warn;

use crate::data_model::{attr, GenericAnnotation};
use crate::engine::{EngineAnnotation, EngineDocument, DEFAULT_SET_NAME};
use crate::utils::text::span_text;

/// The filter-language token matching any set or type name.
pub const MATCH_ANY: &str = "*";

/// A mapping from annotation-set name to the set of admitted type names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSetFilter {
    sets: BTreeMap<String, BTreeSet<String>>,
}

impl AnnotationSetFilter {
    /// Parses a filter specification string.
    ///
    /// Malformed pairs (anything that does not split into exactly two tokens
    /// on ':') are skipped with a warning, never fatal. A `*:*` pair
    /// collapses the wildcard entry to the match-anything singleton.
    pub fn parse(spec: &str) -> Self {
        let mut sets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for pair in spec.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }

            let tokens: Vec<&str> = pair.split(':').collect();
            if tokens.len() != 2 {
                warn!(clause = pair, "Invalid filtering clause specified. Skipping...");
                continue;
            }

            let set_name = tokens[0].trim();
            let type_name = tokens[1].trim();

            if set_name != MATCH_ANY {
                // set:type and set:*
                sets.entry(set_name.to_string())
                    .or_default()
                    .insert(type_name.to_string());
            } else if type_name != MATCH_ANY {
                // *:type
                sets.entry(MATCH_ANY.to_string())
                    .or_default()
                    .insert(type_name.to_string());
            } else {
                // *:* admits everything
                sets.insert(
                    MATCH_ANY.to_string(),
                    BTreeSet::from([MATCH_ANY.to_string()]),
                );
            }
        }

        AnnotationSetFilter { sets }
    }

    /// A filter with no entries, meaning "no restriction".
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn types_for(&self, set_name: &str) -> Option<&BTreeSet<String>> {
        self.sets.get(set_name)
    }

    /// Intersection of two filters: an AND of restrictions.
    ///
    /// For a set name present on both sides, identical type-sets are kept;
    /// a wildcard-type singleton on either side imposes no restriction, so
    /// the other side wins; otherwise the type-sets are intersected. A set
    /// name present on only one side is dropped -- both sides must agree to
    /// include a set.
    pub fn intersect(&self, other: &AnnotationSetFilter) -> AnnotationSetFilter {
        let mut sets = BTreeMap::new();

        for (set_name, types1) in &self.sets {
            let Some(types2) = other.sets.get(set_name) else {
                continue;
            };

            let merged = if types1 == types2 {
                types1.clone()
            } else if is_match_any_singleton(types1) {
                types2.clone()
            } else if is_match_any_singleton(types2) {
                types1.clone()
            } else {
                types1.intersection(types2).cloned().collect()
            };
            sets.insert(set_name.clone(), merged);
        }

        AnnotationSetFilter { sets }
    }

    /// Extracts the annotations admitted by this filter from the document,
    /// tagging each with the set it was actually found in.
    ///
    /// Wildcard-set entries are resolved first, across the default set and
    /// every named set; concretely named sets follow in filter order. The
    /// result is the union of both passes, no deduplication.
    pub fn extract(&self, doc: &EngineDocument) -> Vec<GenericAnnotation> {
        let mut annotations = Vec::new();

        if let Some(types) = self.sets.get(MATCH_ANY) {
            let wanted: BTreeSet<&str> = types
                .iter()
                .map(String::as_str)
                .filter(|t| *t != MATCH_ANY)
                .collect();

            for set_name in iter::once(DEFAULT_SET_NAME).chain(doc.named_set_names()) {
                for ann in doc.annotation_set(set_name) {
                    if wanted.is_empty() || wanted.contains(ann.annotation_type.as_str()) {
                        annotations.push(to_atomic_annotation(ann, set_name));
                    }
                }
            }
        }

        for (set_name, types) in &self.sets {
            if set_name == MATCH_ANY {
                continue;
            }
            let wanted: BTreeSet<&str> = types
                .iter()
                .map(String::as_str)
                .filter(|t| *t != MATCH_ANY)
                .collect();

            for ann in doc.annotation_set(set_name) {
                if wanted.is_empty() || wanted.contains(ann.annotation_type.as_str()) {
                    annotations.push(to_atomic_annotation(ann, set_name));
                }
            }
        }

        annotations
    }
}

fn is_match_any_singleton(types: &BTreeSet<String>) -> bool {
    types.len() == 1 && types.contains(MATCH_ANY)
}

/// Extracts ALL annotations from the document: the default set first, then
/// every named set, each annotation tagged with its originating set name.
pub fn extract_all(doc: &EngineDocument) -> Vec<GenericAnnotation> {
    let mut annotations = Vec::new();

    for set_name in iter::once(DEFAULT_SET_NAME).chain(doc.named_set_names()) {
        for ann in doc.annotation_set(set_name) {
            annotations.push(to_atomic_annotation(ann, set_name));
        }
    }

    annotations
}

/// Refines annotations to include the text they refer to: every annotation
/// with numeric start/end offsets gets a `text` attribute holding the
/// covered substring. Pure, order-independent enrichment.
pub fn refine_annotations(annotations: &mut [GenericAnnotation], text: &str) {
    for ann in annotations {
        if let (Some(start), Some(end)) = (ann.start_idx(), ann.end_idx()) {
            if let Some(covered) = span_text(text, start, end) {
                ann.set_attribute(attr::TEXT, covered);
            }
        }
    }
}

/// Converts a raw engine annotation into the generic attribute-bag form.
/// Engine features are applied last and may shadow the conventional keys.
fn to_atomic_annotation(engine_ann: &EngineAnnotation, set_name: &str) -> GenericAnnotation {
    let mut ann = GenericAnnotation::new();

    ann.set_attribute(attr::TYPE, engine_ann.annotation_type.clone());
    ann.set_attribute(attr::START_IDX, engine_ann.start);
    ann.set_attribute(attr::END_IDX, engine_ann.end);
    ann.set_attribute(attr::SET, set_name);
    ann.set_attribute(attr::ID, engine_ann.id);

    for (name, value) in &engine_ann.features {
        ann.set_attribute(name.clone(), value.clone());
    }

    ann
}
