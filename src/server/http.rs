//! HTTP server implementation
//!
//! hyper http1 with TokioIo: one spawned task per connection, one static
//! match over (method, path) as the routing table. Resource families all
//! dispatch through the same generic handler; only the people extras and
//! the service endpoints have their own arms.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Args;
use crate::db::schemas::RESOURCES;
use crate::db::{MongoStore, Repository};
use crate::routes;
use crate::types::Result;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: MongoStore,
    /// One repository per resource family, in registry order
    pub repos: Vec<Repository>,
}

impl AppState {
    /// Build one repository per registered resource family
    pub fn new(args: Args, store: MongoStore) -> Self {
        let repos = RESOURCES
            .iter()
            .map(|spec| Repository::new(&store, spec))
            .collect();

        Self { args, store, repos }
    }

    /// Repository registered under a mount segment
    pub fn repo_for_mount(&self, mount: &str) -> Option<&Repository> {
        self.repos.iter().find(|repo| repo.spec().mount == mount)
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Narthex listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Liveness probe
        (Method::GET, "/health") => routes::health_check(Arc::clone(&state)).await,

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        // Default route serves the settings list
        (Method::GET, "/") => match state.repo_for_mount("settings") {
            Some(repo) => routes::handle_resource_request(&req, repo, "").await,
            None => not_found_response(),
        },

        // People extras sit above the generic family dispatch
        (Method::GET, p) if p.starts_with("/people/getuser/") => {
            let raw = p.strip_prefix("/people/getuser/").unwrap_or("");
            match (state.repo_for_mount("people"), decode_segment(raw)) {
                (Some(repo), Some(email)) => routes::handle_get_user(repo, &email).await,
                _ => not_found_response(),
            }
        }

        (Method::GET, p) if p.starts_with("/people/auth/") => {
            let rest = p.strip_prefix("/people/auth/").unwrap_or("");
            match (state.repo_for_mount("people"), split_credentials(rest)) {
                (Some(repo), Some((email, token))) => {
                    routes::handle_authenticate(repo, &email, &token).await
                }
                _ => not_found_response(),
            }
        }

        // Everything else resolves through the mount registry
        (_, p) => {
            let (mount, subpath) = split_mount(p);
            match state.repo_for_mount(mount) {
                Some(repo) => routes::handle_resource_request(&req, repo, subpath).await,
                None => not_found_response(),
            }
        }
    };

    Ok(response)
}

/// Split "/{mount}{subpath}" into its mount segment and the remainder
fn split_mount(path: &str) -> (&str, &str) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    match trimmed.find('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
        None => (trimmed, ""),
    }
}

/// Percent-decode one path segment; rejects empty or nested segments
fn decode_segment(raw: &str) -> Option<String> {
    if raw.is_empty() || raw.contains('/') {
        return None;
    }
    Some(urlencoding::decode(raw).unwrap_or_default().to_string())
}

/// Split "{email}/{token}" from the auth route into decoded segments
fn split_credentials(rest: &str) -> Option<(String, String)> {
    let (email, token) = rest.split_once('/')?;
    Some((decode_segment(email)?, decode_segment(token)?))
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(r#"{"error":"not found"}"#)))
        .unwrap()
}
