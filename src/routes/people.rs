//! People-only endpoints
//!
//! ## Endpoints
//!
//! - `GET /people/getuser/{email}` - Fetch one person by email
//! - `GET /people/auth/{email}/{token}` - Credential lookup, stub only
//!
//! The auth route matches the presented token verbatim against the stored
//! `pwd` field and answers with the same envelope as a get-by-id. Password
//! hashing and session management live outside this service; legacy clients
//! expect exactly this stub.

use hyper::{Response, StatusCode};
use tracing::warn;

use crate::db::Repository;
use crate::routes::resource::{
    self, error_response, json_response, record_envelope, repository_error_response, FullBody,
};

/// GET /people/getuser/{email} - Same lookup as the generic id route,
/// kept on its own path for the clients that call it by this name
pub async fn handle_get_user(repo: &Repository, email: &str) -> Response<FullBody> {
    resource::handle_get_by_id(repo, email).await
}

/// GET /people/auth/{email}/{token} - Stub credential check
pub async fn handle_authenticate(
    repo: &Repository,
    email: &str,
    token: &str,
) -> Response<FullBody> {
    match repo.find_by_credentials(email, token).await {
        Ok(Some(record)) => json_response(StatusCode::OK, &record_envelope(repo.spec(), record)),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Not found"),
        Err(e) => {
            warn!("Error authenticating {}: {}", email, e);
            repository_error_response(&e)
        }
    }
}
