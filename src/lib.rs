//! Core of a document annotation service: raw text goes in, labeled spans
//! with attributes come out. The annotation work itself is delegated to an
//! external engine capability (see [`engine`]); this crate owns the engine
//! pool, the processing orchestration and the annotation-set filter algebra.

pub mod config;
pub mod data_model;
pub mod engine;
pub mod error;
pub mod filter;
pub mod pool;
pub mod processor;
pub mod service;
pub mod utils;

pub use data_model::{GenericAnnotation, GenericDocument, ProcessingError, ProcessingResult};
pub use error::{Result, ServiceError};
