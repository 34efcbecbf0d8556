//! HTTP routes for Narthex

pub mod health;
pub mod people;
pub mod resource;

pub use health::{health_check, version_info};
pub use people::{handle_authenticate, handle_get_user};
pub use resource::{handle_get_by_id, handle_resource_request, SearchParams};
