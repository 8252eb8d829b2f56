use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute keys every engine-produced annotation carries by convention.
pub mod attr {
    pub const TYPE: &str = "type";
    pub const START_IDX: &str = "start_idx";
    pub const END_IDX: &str = "end_idx";
    pub const SET: &str = "set";
    pub const ID: &str = "id";
    pub const TEXT: &str = "text";
}

/// A schema-less annotation: a bag of attributes represented as KVPs.
/// It is the responsibility of the upstream application to parse them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericAnnotation {
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl GenericAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn annotation_type(&self) -> Option<&str> {
        self.attributes.get(attr::TYPE).and_then(Value::as_str)
    }

    pub fn set_name(&self) -> Option<&str> {
        self.attributes.get(attr::SET).and_then(Value::as_str)
    }

    pub fn start_idx(&self) -> Option<u64> {
        self.attributes.get(attr::START_IDX).and_then(Value::as_u64)
    }

    pub fn end_idx(&self) -> Option<u64> {
        self.attributes.get(attr::END_IDX).and_then(Value::as_u64)
    }

    /// The substring the span covers, attached during refinement.
    pub fn covered_text(&self) -> Option<&str> {
        self.attributes.get(attr::TEXT).and_then(Value::as_str)
    }
}

/// Generic document model used when working with annotations.
/// Created fresh per request (input) and per response (output); request-scoped only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenericDocument {
    /// The current document text.
    #[serde(default)]
    pub text: String,

    /// The document annotations, in discovery order.
    #[serde(default)]
    pub annotations: Vec<GenericAnnotation>,

    /// Document-level features, a single document-scoped attribute bag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_features: Option<GenericAnnotation>,

    /// Auxiliary caller-supplied key/value pairs, passthrough only.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub linked_attributes: HashMap<String, Value>,
}

impl GenericDocument {
    /// An annotation-less document carrying the given text.
    pub fn with_text(text: impl Into<String>) -> Self {
        GenericDocument {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Description of an error that occurred during processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        ProcessingError {
            message: message.into(),
            description: None,
        }
    }
}

/// The result of processing a single input document.
///
/// Invariant: `errors` is non-empty if and only if `success` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// The document content that was used or modified during processing.
    #[serde(default)]
    pub text: String,

    /// The resulting annotations.
    #[serde(default)]
    pub annotations: Vec<GenericAnnotation>,

    /// Free-form additional data; carries `document_features` when present.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    /// Processing status: 'true' on success, 'false' otherwise.
    pub success: bool,

    /// Processing timestamp.
    pub timestamp: DateTime<Utc>,

    /// Errors that caused the processing to fail (success: false).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ProcessingError>,

    /// Auxiliary data provided by the client application, returned back as-is.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub footer: HashMap<String, Value>,
}

impl ProcessingResult {
    /// Builds a successful result out of a processed document.
    pub fn from_document(doc: GenericDocument) -> Self {
        let mut metadata = HashMap::new();
        if let Some(features) = doc.document_features {
            metadata.insert(
                "document_features".to_string(),
                Value::Object(features.attributes.into_iter().collect()),
            );
        }
        ProcessingResult {
            text: doc.text,
            annotations: doc.annotations,
            metadata,
            success: true,
            timestamp: Utc::now(),
            errors: Vec::new(),
            footer: HashMap::new(),
        }
    }

    /// Builds a failed result carrying the given error description.
    pub fn failed(error: ProcessingError) -> Self {
        ProcessingResult {
            text: String::new(),
            annotations: Vec::new(),
            metadata: HashMap::new(),
            success: false,
            timestamp: Utc::now(),
            errors: vec![error],
            footer: HashMap::new(),
        }
    }

    pub fn set_error(&mut self, error: ProcessingError) {
        self.success = false;
        self.errors.push(error);
    }
}
