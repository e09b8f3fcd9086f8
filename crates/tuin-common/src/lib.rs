//! Shared domain types for the tuinbeheer garden service.
//!
//! The entity structs mirror the rows stored by the service layer; the
//! envelope and paging types are the wire shapes every API operation returns.

pub mod access;
pub mod envelope;
pub mod models;

pub use access::{AccessScope, Permission, Role, UserStatus};
pub use envelope::{Page, PaginationParams, ServiceResponse, SortDirection, SortOptions};
pub use models::*;
