//! Change-State: Validation Records for Changegate
//!
//! This crate owns the persisted side of a validation run: the
//! [`ChangeValidationRecord`] created when a change webhook arrives, the
//! verdict types written back onto it, and the [`ChangeRecordStore`] trait
//! the pipeline uses to move a record through its lifecycle.
//!
//! ## Key Components
//!
//! - `ChangeValidationRecord`: one change under review plus its submitted payload
//! - `ValidationResult`: the structured verdict (`APPROVE`, `APPROVE_WITH_CONDITIONS`, `REJECT`)
//! - `ChangeRecordStore`: lifecycle transitions (`received → processing → completed | failed`)
//! - `fakes::MemoryChangeStore`: in-memory store enforcing the same state machine

mod error;
pub mod fakes;
mod schema;
pub mod store;

pub use error::StorageError;
pub use schema::{
    ChangeValidationRecord, ComponentType, OverallStatus, ValidationResult, ValidationStatus,
    VerdictSource,
};
pub use store::{ChangeRecordStore, StorageResult};
