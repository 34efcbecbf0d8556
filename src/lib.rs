//! Narthex - REST facade over congregation records
//!
//! "Enter his gates with thanksgiving" - Psalm 100:4
//!
//! Narthex fronts a MongoDB namespace of congregation records with a small
//! JSON API. Seven resource families (app settings, users, courses, sermons,
//! members, affinity groups, gospel communities) share one table-driven
//! handler set parameterized by static resource descriptors.
//!
//! ## Operations
//!
//! - **List**: first page of open records with a total count
//! - **Search**: single-key filtered lookup with paging
//! - **Facet search**: bucketed counts alongside the matching records
//! - **Get by id**: one record plus the type of its update marker
//! - **Config options**: pool size, write timeout and caller role

pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{NarthexError, Result};
