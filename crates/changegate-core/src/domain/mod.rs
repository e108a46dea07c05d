//! Domain models for the validation pipeline.
//!
//! - `ComponentFactBlock`: facts and checks for one referenced component
//! - `CloneFreshnessResult`: environment lineage classification
//! - `DocumentationBundle`: the four reconciled documentation fields
//! - `FactBundle`: everything synthesis sees for one change

pub mod error;
pub mod facts;

pub use error::{CollectError, PipelineError, Result, SynthesisError};
pub use facts::{
    CloneFreshnessResult, CloneStatus, ComponentFactBlock, ComponentRef, DocumentationBundle,
    FactBundle, FactSource,
};
