//! Client-side data-synchronization layer for a collaborative todo dashboard.
//!
//! The crate keeps an in-memory [`cache::QueryCache`] of remote query results
//! consistent with the [`remote::TodoService`] API. Reads go through
//! [`services::QueryClient`], writes through [`services::MutationDispatcher`],
//! which applies optimistic patches for status changes and reconciles by
//! invalidation (or rollback) once the mutation settles. A
//! [`services::RefreshWorker`] refetches whatever invalidation marked stale.

pub mod cache;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;

pub use error::ApiError;
