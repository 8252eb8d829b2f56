//! The boundary to the external text-annotation engine capability.
//!
//! This crate never implements NLP itself: an engine is an opaque, stateful
//! instance that takes raw text and produces named sets of typed,
//! offset-anchored annotations. Production backends implement the traits
//! below; the test suite substitutes scripted doubles.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Name of the unnamed default annotation set.
pub const DEFAULT_SET_NAME: &str = "";

/// A raw annotation as produced by an engine run: a typed, offset-anchored
/// span plus engine-specific features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineAnnotation {
    /// Engine-assigned annotation id.
    pub id: u64,
    pub annotation_type: String,
    /// Span offsets, in characters.
    pub start: u64,
    pub end: u64,
    #[serde(default)]
    pub features: BTreeMap<String, Value>,
}

impl EngineAnnotation {
    pub fn new(id: u64, annotation_type: impl Into<String>, start: u64, end: u64) -> Self {
        EngineAnnotation {
            id,
            annotation_type: annotation_type.into(),
            start,
            end,
            features: BTreeMap::new(),
        }
    }

    pub fn with_feature(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.features.insert(name.into(), value.into());
        self
    }
}

/// The engine-internal working representation of one document in a batch.
///
/// Built fresh by the orchestrator for every processing call, annotated in
/// place by the engine, then discarded after extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineDocument {
    text: String,
    annotation_sets: BTreeMap<String, Vec<EngineAnnotation>>,
    document_features: BTreeMap<String, Value>,
}

impl EngineDocument {
    pub fn new(text: impl Into<String>) -> Self {
        EngineDocument {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Annotations of one set; the empty slice if the set does not exist.
    pub fn annotation_set(&self, set_name: &str) -> &[EngineAnnotation] {
        self.annotation_sets
            .get(set_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Names of the named annotation sets, excluding the default set.
    pub fn named_set_names(&self) -> impl Iterator<Item = &str> {
        self.annotation_sets
            .keys()
            .map(String::as_str)
            .filter(|name| *name != DEFAULT_SET_NAME)
    }

    pub fn add_annotation(&mut self, set_name: impl Into<String>, annotation: EngineAnnotation) {
        self.annotation_sets
            .entry(set_name.into())
            .or_default()
            .push(annotation);
    }

    pub fn document_features(&self) -> &BTreeMap<String, Value> {
        &self.document_features
    }

    pub fn set_document_feature(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.document_features.insert(name.into(), value.into());
    }
}

/// One ready-to-use annotation engine instance.
///
/// Execution is synchronous and blocking for the duration of the call; the
/// engine annotates the submitted corpus in place. An instance is mutated by
/// exactly one caller at a time (enforced by the pool).
pub trait TextEngine: Send {
    fn execute(&mut self, corpus: &mut [EngineDocument]) -> Result<()>;
}

/// Constructs engine instances: the first from a definition artifact on disk,
/// the rest as independent structural duplicates of it, so the expensive
/// initialization happens only once.
pub trait EngineFactory: Send + Sync {
    type Engine: TextEngine;

    fn build_from_definition(&self, path: &Path) -> Result<Self::Engine>;

    /// Duplicates must share no mutable annotation state with the original.
    fn duplicate(&self, engine: &Self::Engine) -> Result<Self::Engine>;
}
