//! The document processing orchestrator: turns input documents into
//! annotated output documents using the engine pool and the annotation set
//! filter.

use std::path::Path;

use tracing::{error, info};

use crate::config::ServiceConfig;
use crate::data_model::{GenericAnnotation, GenericDocument};
use crate::engine::{EngineDocument, EngineFactory, TextEngine};
use crate::error::Result;
use crate::filter::{self, AnnotationSetFilter};
use crate::pool::EnginePool;
use crate::utils::text::is_blank;

/// Orchestrates single and bulk document processing.
///
/// Owns the engine pool and the statically configured annotation-set filter;
/// a per-request filter spec may narrow the static one further (intersection
/// semantics).
pub struct DocumentProcessor<E: TextEngine> {
    pool: EnginePool<E>,
    static_filter: Option<AnnotationSetFilter>,
}

impl<E: TextEngine> DocumentProcessor<E> {
    pub fn new<F>(factory: &F, config: &ServiceConfig) -> Result<Self>
    where
        F: EngineFactory<Engine = E>,
    {
        let pool = EnginePool::build(factory, Path::new(&config.app_path), config.pool_size())?;

        let static_filter = config
            .annotation_sets
            .as_deref()
            .map(AnnotationSetFilter::parse)
            .filter(|f| !f.is_empty());

        Ok(DocumentProcessor {
            pool,
            static_filter,
        })
    }

    /// Processes a single document and extracts its annotations.
    ///
    /// Blank text (empty or whitespace-only) short-circuits to an empty
    /// result without touching the engine pool. Engine failures are
    /// propagated; the engine returns to the pool on every exit path.
    pub async fn process_document(
        &self,
        in_document: &GenericDocument,
        annotation_filter: Option<&str>,
    ) -> Result<GenericDocument> {
        if is_blank(&in_document.text) {
            info!("Provided document contains only whitespace characters");
            return Ok(GenericDocument::with_text(in_document.text.clone()));
        }

        let mut corpus = [EngineDocument::new(in_document.text.clone())];
        {
            let mut lease = self.pool.acquire().await?;
            info!(engine = lease.name(), "Executing annotation engine");

            if let Err(e) = lease.execute(&mut corpus) {
                error!(error = %e, "Error executing annotation engine on the provided document");
                return Err(e);
            }
        }

        let [engine_document] = corpus;
        Ok(self.prepare_output_document(engine_document, annotation_filter))
    }

    /// Processes a batch of documents through one engine execution call.
    ///
    /// The output list always has the same length as the input list and the
    /// i-th output corresponds to the i-th input. Blank inputs are skipped at
    /// engine level and map to empty-annotation outputs with their text
    /// preserved. An engine failure fails the whole batch.
    pub async fn process_documents_bulk(
        &self,
        in_documents: &[GenericDocument],
        annotation_filter: Option<&str>,
    ) -> Result<Vec<GenericDocument>> {
        // prepare engine documents, skipping blank slots
        let mut corpus = Vec::new();
        let mut skipped = vec![false; in_documents.len()];

        for (i, doc) in in_documents.iter().enumerate() {
            if is_blank(&doc.text) {
                info!(idx = i, "Provided document contains only whitespace characters");
                skipped[i] = true;
            } else {
                corpus.push(EngineDocument::new(doc.text.clone()));
            }
        }

        // run the engine once over the whole corpus
        if !corpus.is_empty() {
            let mut lease = self.pool.acquire().await?;
            info!(
                engine = lease.name(),
                documents = corpus.len(),
                "Executing annotation engine on bulk corpus"
            );

            if let Err(e) = lease.execute(&mut corpus) {
                error!(error = %e, "Error executing annotation engine on the provided bulk corpus");
                return Err(e);
            }
        }

        // reassemble outputs at their input indices
        let mut processed = corpus.into_iter();
        let out_documents = in_documents
            .iter()
            .zip(skipped)
            .map(|(in_doc, was_skipped)| {
                if was_skipped {
                    GenericDocument::with_text(in_doc.text.clone())
                } else {
                    match processed.next() {
                        Some(engine_doc) => {
                            self.prepare_output_document(engine_doc, annotation_filter)
                        }
                        None => unreachable!("corpus shorter than non-blank input count"),
                    }
                }
            })
            .collect();

        Ok(out_documents)
    }

    /// The pool backing this processor, exposed for shutdown and inspection.
    pub fn pool(&self) -> &EnginePool<E> {
        &self.pool
    }

    /// The configured filter intersected with the per-request one. Either
    /// side may be absent; an empty spec imposes no restriction.
    fn effective_filter(&self, annotation_filter: Option<&str>) -> Option<AnnotationSetFilter> {
        let request_filter = annotation_filter
            .map(AnnotationSetFilter::parse)
            .filter(|f| !f.is_empty());

        match (&self.static_filter, request_filter) {
            (Some(configured), Some(requested)) => Some(configured.intersect(&requested)),
            (Some(configured), None) => Some(configured.clone()),
            (None, requested) => requested,
        }
    }

    /// Extracts, filters and refines annotations and document-level features
    /// out of a processed engine document.
    fn prepare_output_document(
        &self,
        engine_document: EngineDocument,
        annotation_filter: Option<&str>,
    ) -> GenericDocument {
        let mut annotations = match self.effective_filter(annotation_filter) {
            Some(f) => f.extract(&engine_document),
            None => filter::extract_all(&engine_document),
        };
        filter::refine_annotations(&mut annotations, engine_document.text());

        let mut out_document = GenericDocument::with_text(engine_document.text());
        out_document.annotations = annotations;

        if !engine_document.document_features().is_empty() {
            let mut features = GenericAnnotation::new();
            for (name, value) in engine_document.document_features() {
                features.set_attribute(name.clone(), value.clone());
            }
            out_document.document_features = Some(features);
        }

        out_document
    }
}
