//! HTTP server for Narthex

pub mod http;

pub use http::{run, AppState};
