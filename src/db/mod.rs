//! Database layer for narthex
//!
//! MongoDB store wrapper, read-query construction, resource descriptors,
//! and the generic repository built from them.

pub mod mongo;
pub mod query;
pub mod repository;
pub mod schemas;

pub use mongo::{ConnectionProfile, MongoStore, RoleInfo};
pub use repository::{Configuration, FacetPage, Repository};
