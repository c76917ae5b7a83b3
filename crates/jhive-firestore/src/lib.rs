//! Firestore REST API client for JobHive.
//!
//! This crate provides:
//! - Typed repositories for users, companies, jobs and applications
//! - Structured queries with filters, whitelisted sorting and offset pagination
//! - COUNT aggregation for list totals and per-status stats
//! - Service account authentication via gcp_auth
//! - Merge updates, atomic batch writes and retry logic

pub mod applications_repo;
pub mod client;
pub mod companies_repo;
pub mod error;
pub mod jobs_repo;
pub mod metrics;
pub mod query;
pub mod retry;
pub mod slug;
pub mod token_cache;
pub mod types;
pub mod users_repo;

pub use applications_repo::ApplicationsRepository;
pub use client::{FirestoreClient, FirestoreConfig};
pub use companies_repo::CompaniesRepository;
pub use error::{FirestoreError, FirestoreResult};
pub use jobs_repo::JobsRepository;
pub use query::{QueryBuilder, SortDirection, SortSpec};
pub use slug::generate_unique_slug;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use users_repo::UsersRepository;
