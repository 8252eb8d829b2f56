//! End-to-end tests of the annotation service against a scripted mock
//! engine. The mock recognizes the drug name "Prozac" (default set) and
//! emits one Sentence annotation per document (named set "sections"),
//! mirroring the shape of a real engine-backed drug-name application.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use text_annotator::config::ServiceConfig;
use text_annotator::data_model::attr;
use text_annotator::engine::{
    EngineAnnotation, EngineDocument, EngineFactory, TextEngine, DEFAULT_SET_NAME,
};
use text_annotator::error::{Result, ServiceError};
use text_annotator::service::AnnotationService;
use text_annotator::GenericDocument;

const DRUG_NAME: &str = "Prozac";

struct MockEngine {
    fail_execution: Arc<AtomicBool>,
    execution_delay: Option<Duration>,
    /// Guard catching two concurrent owners of the same engine instance.
    busy: AtomicBool,
    violations: Arc<AtomicUsize>,
    next_id: u64,
}

impl TextEngine for MockEngine {
    fn execute(&mut self, corpus: &mut [EngineDocument]) -> Result<()> {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(delay) = self.execution_delay {
            std::thread::sleep(delay);
        }

        let result = if self.fail_execution.load(Ordering::SeqCst) {
            Err(ServiceError::EngineError(
                "mock engine exploded mid-run".to_string(),
            ))
        } else {
            for doc in corpus.iter_mut() {
                self.annotate(doc);
            }
            Ok(())
        };

        self.busy.store(false, Ordering::SeqCst);
        result
    }
}

impl MockEngine {
    fn annotate(&mut self, doc: &mut EngineDocument) {
        let text = doc.text().to_string();

        for (byte_idx, matched) in text.match_indices(DRUG_NAME) {
            let start = text[..byte_idx].chars().count() as u64;
            let end = start + matched.chars().count() as u64;
            let id = self.bump_id();
            doc.add_annotation(
                DEFAULT_SET_NAME,
                EngineAnnotation::new(id, "Drug", start, end)
                    .with_feature("name", DRUG_NAME)
                    .with_feature("majorType", "drug")
                    .with_feature("minorType", "medication"),
            );
        }

        let id = self.bump_id();
        doc.add_annotation(
            "sections",
            EngineAnnotation::new(id, "Sentence", 0, text.chars().count() as u64),
        );

        doc.set_document_feature("engine", "mock");
    }

    fn bump_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

struct MockFactory {
    fail_execution: Arc<AtomicBool>,
    execution_delay: Option<Duration>,
    violations: Arc<AtomicUsize>,
    built_from: Mutex<Vec<PathBuf>>,
    duplicated: AtomicUsize,
}

impl MockFactory {
    fn new() -> Self {
        MockFactory {
            fail_execution: Arc::new(AtomicBool::new(false)),
            execution_delay: None,
            violations: Arc::new(AtomicUsize::new(0)),
            built_from: Mutex::new(Vec::new()),
            duplicated: AtomicUsize::new(0),
        }
    }

    fn with_delay(delay: Duration) -> Self {
        MockFactory {
            execution_delay: Some(delay),
            ..MockFactory::new()
        }
    }

    fn make_engine(&self) -> MockEngine {
        MockEngine {
            fail_execution: Arc::clone(&self.fail_execution),
            execution_delay: self.execution_delay,
            busy: AtomicBool::new(false),
            violations: Arc::clone(&self.violations),
            next_id: 0,
        }
    }
}

impl EngineFactory for MockFactory {
    type Engine = MockEngine;

    fn build_from_definition(&self, path: &Path) -> Result<MockEngine> {
        self.built_from.lock().unwrap().push(path.to_path_buf());
        Ok(self.make_engine())
    }

    fn duplicate(&self, _engine: &MockEngine) -> Result<MockEngine> {
        self.duplicated.fetch_add(1, Ordering::SeqCst);
        Ok(self.make_engine())
    }
}

fn test_config(pool_size: usize, annotation_sets: Option<&str>) -> ServiceConfig {
    ServiceConfig {
        app_path: "/opt/nlp/apps/drug-app.def".to_string(),
        engine_pool_size: Some(pool_size),
        annotation_sets: annotation_sets.map(str::to_string),
    }
}

fn short_document() -> GenericDocument {
    GenericDocument::with_text("Patient took Prozac twice daily.")
}

#[tokio::test]
async fn factory_is_driven_by_configuration() {
    let factory = MockFactory::new();
    let config = test_config(3, None);
    let service = AnnotationService::new(&factory, &config).unwrap();

    let built = factory.built_from.lock().unwrap();
    assert_eq!(built.as_slice(), &[PathBuf::from("/opt/nlp/apps/drug-app.def")]);
    assert_eq!(factory.duplicated.load(Ordering::SeqCst), 2);
    assert_eq!(service.processor().pool().size(), 3);
}

#[tokio::test]
async fn blank_documents_short_circuit_without_acquiring_an_engine() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    for blank in ["", "   ", "\t\n", " \r\n \t "] {
        let result = service
            .process(&GenericDocument::with_text(blank), None)
            .await;
        assert!(result.success);
        assert_eq!(result.text, blank);
        assert!(result.annotations.is_empty());
    }

    assert_eq!(service.processor().pool().acquired_total(), 0);
}

#[tokio::test]
async fn unfiltered_processing_returns_all_annotation_sets() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    let result = service.process(&short_document(), None).await;
    assert!(result.success);
    assert!(result.errors.is_empty());

    // one Drug (default set) plus one Sentence ("sections")
    assert_eq!(result.annotations.len(), 2);
    assert_eq!(result.annotations[0].set_name(), Some(""));
    assert_eq!(result.annotations[0].annotation_type(), Some("Drug"));
    assert_eq!(result.annotations[1].set_name(), Some("sections"));
    assert_eq!(result.annotations[1].annotation_type(), Some("Sentence"));
}

#[tokio::test]
async fn drug_filter_keeps_only_the_drug_annotation() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    let result = service.process(&short_document(), Some("*:Drug")).await;
    assert!(result.success);
    assert_eq!(result.annotations.len(), 1);

    let ann = &result.annotations[0];
    assert_eq!(ann.annotation_type(), Some("Drug"));
    assert_eq!(ann.attribute("majorType"), Some(&json!("drug")));
    assert_eq!(ann.attribute("minorType"), Some(&json!("medication")));
}

#[tokio::test]
async fn refinement_attaches_the_exact_covered_substring() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    let doc = short_document();
    let result = service.process(&doc, Some("*:Drug")).await;
    let ann = &result.annotations[0];

    let start = ann.start_idx().unwrap() as usize;
    let end = ann.end_idx().unwrap() as usize;
    let expected: String = doc.text.chars().take(end).skip(start).collect();
    assert_eq!(ann.covered_text(), Some(expected.as_str()));
    assert_eq!(ann.covered_text(), Some("Prozac"));
}

#[tokio::test]
async fn configured_and_requested_filters_intersect() {
    let factory = MockFactory::new();
    let config = test_config(1, Some("*:Drug, sections:Sentence"));
    let service = AnnotationService::new(&factory, &config).unwrap();

    // the request narrows to "sections" only; its wildcard type defers to
    // the configured Sentence restriction
    let result = service.process(&short_document(), Some("sections:*")).await;
    assert_eq!(result.annotations.len(), 1);
    assert_eq!(result.annotations[0].annotation_type(), Some("Sentence"));
    assert_eq!(result.annotations[0].set_name(), Some("sections"));
}

#[tokio::test]
async fn malformed_filter_clause_is_ignored_but_valid_one_applies() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    let result = service
        .process(&short_document(), Some("badclause, *:Drug"))
        .await;
    assert!(result.success);
    assert_eq!(result.annotations.len(), 1);
    assert_eq!(result.annotations[0].annotation_type(), Some("Drug"));
}

#[tokio::test]
async fn bulk_processing_preserves_indices_and_skips_blank_slots() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    let documents = vec![
        short_document(),
        GenericDocument::with_text("   \t"),
        GenericDocument::with_text("No drugs mentioned here."),
        GenericDocument::with_text(""),
        GenericDocument::with_text("More Prozac was prescribed."),
    ];

    let results = service.process_bulk(&documents, None).await.unwrap();
    assert_eq!(results.len(), documents.len());

    // blank inputs map to empty-annotation outputs at the same index,
    // with their text preserved
    assert_eq!(results[1].text, "   \t");
    assert!(results[1].annotations.is_empty());
    assert_eq!(results[3].text, "");
    assert!(results[3].annotations.is_empty());

    // non-blank slots keep their identity
    assert_eq!(results[0].text, documents[0].text);
    assert!(results[0]
        .annotations
        .iter()
        .any(|a| a.annotation_type() == Some("Drug")));
    assert_eq!(results[2].text, documents[2].text);
    assert!(results[2]
        .annotations
        .iter()
        .all(|a| a.annotation_type() != Some("Drug")));
    assert!(results[4]
        .annotations
        .iter()
        .any(|a| a.covered_text() == Some("Prozac")));

    // the whole batch went through one engine acquisition
    assert_eq!(service.processor().pool().acquired_total(), 1);
}

#[tokio::test]
async fn all_blank_bulk_never_touches_the_pool() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    let documents = vec![
        GenericDocument::with_text(""),
        GenericDocument::with_text(" \n "),
    ];
    let results = service.process_bulk(&documents, None).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.annotations.is_empty()));
    assert_eq!(service.processor().pool().acquired_total(), 0);
}

#[tokio::test]
async fn engine_failure_surfaces_error_and_returns_the_engine() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    factory.fail_execution.store(true, Ordering::SeqCst);
    let result = service.process(&short_document(), None).await;
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].message.contains("mock engine exploded"));

    // the engine went back to the pool despite the failure
    assert_eq!(service.processor().pool().available(), 1);

    factory.fail_execution.store(false, Ordering::SeqCst);
    let result = service.process(&short_document(), None).await;
    assert!(result.success);
}

#[tokio::test]
async fn bulk_engine_failure_fails_the_whole_batch() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    factory.fail_execution.store(true, Ordering::SeqCst);
    let documents = vec![short_document(), GenericDocument::with_text("also text")];
    let outcome = service.process_bulk(&documents, None).await;

    assert!(matches!(outcome, Err(ServiceError::EngineError(_))));
    assert_eq!(service.processor().pool().available(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_engine_pool_serializes_concurrent_callers() {
    let factory = MockFactory::with_delay(Duration::from_millis(25));
    let violations = Arc::clone(&factory.violations);
    let service = Arc::new(AnnotationService::new(&factory, &test_config(1, None)).unwrap());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.process(&short_document(), None).await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.success);
    }

    // the non-reentrant guard on the mock engine never fired
    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert_eq!(service.processor().pool().acquired_total(), 4);
}

#[tokio::test]
async fn linked_attributes_are_echoed_back_in_the_footer() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    let mut doc = short_document();
    doc.linked_attributes
        .insert("record_id".to_string(), json!("abc-123"));

    let result = service.process(&doc, None).await;
    assert_eq!(result.footer.get("record_id"), Some(&json!("abc-123")));

    let bulk = service.process_bulk(&[doc], None).await.unwrap();
    assert_eq!(bulk[0].footer.get("record_id"), Some(&json!("abc-123")));
}

#[tokio::test]
async fn document_features_are_carried_in_result_metadata() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    let result = service.process(&short_document(), None).await;
    assert_eq!(
        result.metadata.get("document_features"),
        Some(&json!({"engine": "mock"}))
    );
}

#[tokio::test]
async fn closed_pool_fails_processing_with_a_result_error() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    service.processor().pool().close();
    let result = service.process(&short_document(), None).await;
    assert!(!result.success);
    assert!(result.errors[0].message.contains("pool is closed"));
}

#[tokio::test]
async fn engine_assigned_ids_are_present_on_annotations() {
    let factory = MockFactory::new();
    let service = AnnotationService::new(&factory, &test_config(1, None)).unwrap();

    let result = service.process(&short_document(), None).await;
    for ann in &result.annotations {
        assert!(ann.attribute(attr::ID).and_then(|v| v.as_u64()).is_some());
    }
}
