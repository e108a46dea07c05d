//! Change-API: Change-Management System Client for Changegate
//!
//! This crate provides the remote boundary the validation pipeline pulls
//! facts from and publishes verdicts to. It speaks the table REST API of the
//! change-management system and hides retries behind the
//! [`ChangeManagementApi`] and [`ResultPublisher`] traits.
//!
//! Retries live here (exponential backoff with jitter, bounded attempts,
//! non-retryable classification). Callers only see the final outcome.

pub mod api;
mod client;
mod config;
mod error;
pub mod fakes;
pub mod retry;

pub use api::{ChangeManagementApi, ResultPublisher};
pub use client::ServiceNowClient;
pub use config::ServiceNowCredentials;
pub use error::ApiError;
pub use retry::{retry_with_backoff, RetryPolicy};

/// Result type for change-api operations
pub type Result<T> = std::result::Result<T, ApiError>;
