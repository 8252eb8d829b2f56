//! The annotation service layer: wraps the document processor and converts
//! its outputs and failures into wire-level processing results.

use tracing::error;

use crate::config::ServiceConfig;
use crate::data_model::{GenericDocument, ProcessingError, ProcessingResult};
use crate::engine::{EngineFactory, TextEngine};
use crate::error::Result;
use crate::processor::DocumentProcessor;

/// A concrete annotation service parameterized by the engine capability.
pub struct AnnotationService<E: TextEngine> {
    processor: DocumentProcessor<E>,
}

impl<E: TextEngine> AnnotationService<E> {
    pub fn new<F>(factory: &F, config: &ServiceConfig) -> Result<Self>
    where
        F: EngineFactory<Engine = E>,
    {
        Ok(AnnotationService {
            processor: DocumentProcessor::new(factory, config)?,
        })
    }

    /// Processes one document. Never panics and never loses an error: a
    /// processing failure becomes a failed result carrying the error
    /// message. The caller-supplied linked attributes are echoed back in the
    /// result footer.
    pub async fn process(
        &self,
        document: &GenericDocument,
        annotation_filter: Option<&str>,
    ) -> ProcessingResult {
        let mut result = match self
            .processor
            .process_document(document, annotation_filter)
            .await
        {
            Ok(out_document) => ProcessingResult::from_document(out_document),
            Err(e) => {
                let message = format!("Error processing the query: {}", e);
                error!("{}", message);
                ProcessingResult::failed(ProcessingError::new(message))
            }
        };

        result.footer = document.linked_attributes.clone();
        result
    }

    /// Processes documents in bulk, all-or-nothing: a single engine
    /// execution covers the whole batch, so one engine failure fails the
    /// entire call. On success the result list preserves input indices.
    pub async fn process_bulk(
        &self,
        documents: &[GenericDocument],
        annotation_filter: Option<&str>,
    ) -> Result<Vec<ProcessingResult>> {
        let out_documents = self
            .processor
            .process_documents_bulk(documents, annotation_filter)
            .await
            .map_err(|e| {
                error!("Error processing the bulk query: {}", e);
                e
            })?;

        let results = out_documents
            .into_iter()
            .zip(documents)
            .map(|(out_document, in_document)| {
                let mut result = ProcessingResult::from_document(out_document);
                result.footer = in_document.linked_attributes.clone();
                result
            })
            .collect();

        Ok(results)
    }

    pub fn processor(&self) -> &DocumentProcessor<E> {
        &self.processor
    }
}
