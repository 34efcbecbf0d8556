//! Generic endpoints shared by every mounted resource family
//!
//! ## Endpoints
//!
//! - `GET /{mount}/` - List every record, identifier descending
//! - `GET /{mount}/search` - Filtered search with pagination
//! - `GET /{mount}/facet-search` - Search plus bucketed facet counts
//! - `GET /{mount}/id/{id}` - Fetch one record by identifier
//! - `GET /{mount}/config-options` - Connection diagnostics
//!
//! One handler set serves all seven families. The `ResourceSpec` descriptor
//! supplies the envelope keys, the search allow-list, and the facet
//! parameters, so nothing here knows which family it is talking to.

use bson::{Bson, Document};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::db::query::PAGE_SIZE;
use crate::db::schemas::ResourceSpec;
use crate::db::{FacetPage, Repository};
use crate::types::NarthexError;

pub(crate) type FullBody = Full<Bytes>;

// =============================================================================
// Query-String Parsing
// =============================================================================

/// Parsed query parameters for search and facet-search requests.
///
/// The FIRST query key decides the filter: when it appears in the resource's
/// allow-list it becomes the single applied filter, otherwise the search runs
/// unfiltered. `page` may appear at any position and coerces to 0 when it
/// does not parse. The facet trigger parameter is picked up wherever it
/// appears. A key sent without `=` parses with an empty-string value.
#[derive(Debug, Default)]
pub struct SearchParams {
    pub page: u64,
    pub filters: Document,
    pub facet_value: Option<String>,
}

impl SearchParams {
    pub fn from_query_string(query: Option<&str>, spec: &ResourceSpec) -> Self {
        let mut params = Self::default();
        let mut first: Option<(String, String)> = None;

        if let Some(q) = query {
            for pair in q.split('&') {
                if pair.is_empty() {
                    continue;
                }
                // A key without '=' carries an empty-string value
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let value = urlencoding::decode(value).unwrap_or_default();
                if key == "page" {
                    params.page = value.parse().unwrap_or(0);
                }
                if key == spec.facet_trigger {
                    params.facet_value = Some(value.to_string());
                }
                if first.is_none() {
                    first = Some((key.to_string(), value.to_string()));
                }
            }
        }

        if let Some((key, value)) = first {
            if let Some(field) = spec.search_field(&key) {
                params.filters.insert(field, value);
            }
        }

        params
    }
}

// =============================================================================
// Response Helpers
// =============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response<FullBody> {
    json_response(
        status,
        &ErrorBody {
            error: message.to_string(),
        },
    )
}

/// Map a repository failure onto its HTTP status.
///
/// An oversized facet result is the caller's problem (400); everything else
/// the repository reports, including a missing required facet filter, comes
/// back as a generic 500 with the error text.
pub(crate) fn repository_error_response(err: &NarthexError) -> Response<FullBody> {
    let status = match err {
        NarthexError::ResultsTooLarge => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &err.to_string())
}

// =============================================================================
// Envelope Builders
// =============================================================================

fn bson_to_json(doc: Document) -> Value {
    Bson::Document(doc).into_relaxed_extjson()
}

fn records_to_json(records: Vec<Document>) -> Value {
    Value::Array(records.into_iter().map(bson_to_json).collect())
}

/// `"Date"` when the lifecycle timestamp round-tripped as a real BSON
/// datetime, `"other"` for legacy string timestamps or absent fields
fn updated_type(record: &Document) -> &'static str {
    match record.get("dateUpdated") {
        Some(Bson::DateTime(_)) => "Date",
        _ => "other",
    }
}

fn list_envelope(spec: &ResourceSpec, records: Vec<Document>) -> Value {
    let total = records.len();
    let mut body = Map::new();
    body.insert(spec.plural.to_string(), records_to_json(records));
    body.insert("page".to_string(), json!(0));
    body.insert("filters".to_string(), json!({}));
    body.insert("items_per_page".to_string(), json!(PAGE_SIZE));
    body.insert("total_items".to_string(), json!(total));
    Value::Object(body)
}

fn search_envelope(
    spec: &ResourceSpec,
    records: Vec<Document>,
    filters: &Document,
    page: u64,
    total: u64,
) -> Value {
    let mut body = Map::new();
    body.insert(spec.plural.to_string(), records_to_json(records));
    body.insert("page".to_string(), json!(page));
    body.insert("filters".to_string(), bson_to_json(filters.clone()));
    body.insert("items_per_page".to_string(), json!(PAGE_SIZE));
    body.insert("total_results".to_string(), json!(total));
    Value::Object(body)
}

fn facet_envelope(
    spec: &ResourceSpec,
    facet_page: FacetPage,
    filters: &Document,
    page: u64,
) -> Value {
    let mut body = Map::new();
    body.insert(spec.plural.to_string(), records_to_json(facet_page.records));
    body.insert("facets".to_string(), bson_to_json(facet_page.facets));
    body.insert("page".to_string(), json!(page));
    body.insert("filters".to_string(), bson_to_json(filters.clone()));
    body.insert("items_per_page".to_string(), json!(PAGE_SIZE));
    body.insert("total_results".to_string(), json!(facet_page.total));
    Value::Object(body)
}

pub(crate) fn record_envelope(spec: &ResourceSpec, record: Document) -> Value {
    let mut body = Map::new();
    body.insert("updated_type".to_string(), json!(updated_type(&record)));
    body.insert(spec.singular.to_string(), bson_to_json(record));
    Value::Object(body)
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /{mount}/* routes
pub async fn handle_resource_request(
    req: &Request<Incoming>,
    repo: &Repository,
    subpath: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let query = req.uri().query();

    match (method, subpath) {
        (Method::GET, "") | (Method::GET, "/") => handle_list(repo).await,

        (Method::GET, "/search") => handle_search(repo, query).await,

        (Method::GET, "/facet-search") => handle_facet_search(repo, query).await,

        (Method::GET, "/config-options") => handle_config_options(repo).await,

        (Method::GET, p) if p.starts_with("/id/") => {
            let raw = p.strip_prefix("/id/").unwrap_or("");
            if raw.is_empty() || raw.contains('/') {
                return error_response(StatusCode::NOT_FOUND, "not found");
            }
            let id = urlencoding::decode(raw).unwrap_or_default();
            handle_get_by_id(repo, &id).await
        }

        _ => error_response(StatusCode::NOT_FOUND, "not found"),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /{mount}/ - Full listing, no filters, no pagination
async fn handle_list(repo: &Repository) -> Response<FullBody> {
    let spec = repo.spec();

    match repo.list_all().await {
        Ok(records) => json_response(StatusCode::OK, &list_envelope(spec, records)),
        Err(e) => {
            warn!("Error listing {}: {}", spec.plural, e);
            repository_error_response(&e)
        }
    }
}

/// GET /{mount}/search - One allow-listed filter plus pagination
async fn handle_search(repo: &Repository, query: Option<&str>) -> Response<FullBody> {
    let params = SearchParams::from_query_string(query, repo.spec());
    run_search(repo, params).await
}

/// GET /{mount}/facet-search - Bucketed counts alongside the page
///
/// Without the trigger parameter this degrades to a plain search rather
/// than failing.
async fn handle_facet_search(repo: &Repository, query: Option<&str>) -> Response<FullBody> {
    let spec = repo.spec();
    let params = SearchParams::from_query_string(query, spec);

    let value = match params.facet_value.clone() {
        Some(v) => v,
        None => return run_search(repo, params).await,
    };

    let mut filters = Document::new();
    filters.insert(spec.facet_filter_field, value);

    match repo.faceted_search(filters.clone(), params.page).await {
        Ok(facet_page) => {
            json_response(
                StatusCode::OK,
                &facet_envelope(spec, facet_page, &filters, params.page),
            )
        }
        Err(e) => {
            warn!("Error faceting {}: {}", spec.plural, e);
            repository_error_response(&e)
        }
    }
}

async fn run_search(repo: &Repository, params: SearchParams) -> Response<FullBody> {
    let spec = repo.spec();

    match repo.search(params.filters.clone(), params.page).await {
        Ok((records, total)) => json_response(
            StatusCode::OK,
            &search_envelope(spec, records, &params.filters, params.page, total),
        ),
        Err(e) => {
            warn!("Error searching {}: {}", spec.plural, e);
            repository_error_response(&e)
        }
    }
}

/// GET /{mount}/id/{id} - One record or 404
pub async fn handle_get_by_id(repo: &Repository, id: &str) -> Response<FullBody> {
    let spec = repo.spec();

    match repo.get_by_id(id).await {
        Ok(Some(record)) => json_response(StatusCode::OK, &record_envelope(spec, record)),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Not found"),
        Err(e) => {
            warn!("Error fetching {} {}: {}", spec.singular, id, e);
            repository_error_response(&e)
        }
    }
}

/// GET /{mount}/config-options - Pool size, write timeout, caller role
async fn handle_config_options(repo: &Repository) -> Response<FullBody> {
    match repo.configuration().await {
        Ok(config) => json_response(StatusCode::OK, &config),
        Err(e) => {
            warn!("Error reading configuration for {}: {}", repo.spec().plural, e);
            repository_error_response(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, DateTime};
    use crate::db::schemas::{PEOPLE, SETTINGS};

    #[test]
    fn test_search_params_first_key_becomes_filter() {
        let params = SearchParams::from_query_string(Some("ID=S7&page=2"), &SETTINGS);
        assert_eq!(params.page, 2);
        assert_eq!(params.filters, doc! { "settingID": "S7" });
    }

    #[test]
    fn test_search_params_unrecognized_first_key_yields_empty_filters() {
        // Only the first key is consulted, so a leading page param hides
        // the name filter entirely.
        let params = SearchParams::from_query_string(Some("page=2&name=Theme"), &SETTINGS);
        assert_eq!(params.page, 2);
        assert!(params.filters.is_empty());
    }

    #[test]
    fn test_search_params_bad_page_coerces_to_zero() {
        let params = SearchParams::from_query_string(Some("page=abc"), &SETTINGS);
        assert_eq!(params.page, 0);

        let params = SearchParams::from_query_string(Some("page=-1"), &SETTINGS);
        assert_eq!(params.page, 0);
    }

    #[test]
    fn test_search_params_missing_query_is_unfiltered_page_zero() {
        let params = SearchParams::from_query_string(None, &SETTINGS);
        assert_eq!(params.page, 0);
        assert!(params.filters.is_empty());
        assert!(params.facet_value.is_none());
    }

    #[test]
    fn test_search_params_decodes_values() {
        let params =
            SearchParams::from_query_string(Some("Email=kofi%40example.org"), &PEOPLE);
        assert_eq!(params.filters, doc! { "email": "kofi@example.org" });
    }

    #[test]
    fn test_search_params_bare_key_applies_empty_string_filter() {
        // A key sent without '=' still occupies the first-key slot and
        // filters on the empty string rather than being dropped.
        let params = SearchParams::from_query_string(Some("ID"), &SETTINGS);
        assert_eq!(params.filters, doc! { "settingID": "" });

        let params = SearchParams::from_query_string(Some("ID&name=Theme"), &SETTINGS);
        assert_eq!(params.filters, doc! { "settingID": "" });
    }

    #[test]
    fn test_search_params_facet_trigger_found_at_any_position() {
        let params = SearchParams::from_query_string(Some("page=1&cast=90"), &SETTINGS);
        assert_eq!(params.facet_value.as_deref(), Some("90"));
        assert_eq!(params.page, 1);
    }

    #[test]
    fn test_updated_type_distinguishes_real_datetimes() {
        let with_date = doc! { "dateUpdated": DateTime::now() };
        assert_eq!(updated_type(&with_date), "Date");

        let with_string = doc! { "dateUpdated": "2021-03-14T09:26:53Z" };
        assert_eq!(updated_type(&with_string), "other");

        assert_eq!(updated_type(&doc! {}), "other");
    }

    #[test]
    fn test_list_envelope_shape() {
        let records = vec![doc! { "settingID": "S1" }, doc! { "settingID": "S2" }];
        let envelope = list_envelope(&SETTINGS, records);

        assert_eq!(envelope["appSettings"].as_array().unwrap().len(), 2);
        assert_eq!(envelope["page"], json!(0));
        assert_eq!(envelope["filters"], json!({}));
        assert_eq!(envelope["items_per_page"], json!(20));
        assert_eq!(envelope["total_items"], json!(2));
    }

    #[test]
    fn test_search_envelope_echoes_applied_filter() {
        let filters = doc! { "name": "Theme" };
        let envelope = search_envelope(&SETTINGS, vec![doc! { "settingID": "S1" }], &filters, 3, 61);

        assert_eq!(envelope["page"], json!(3));
        assert_eq!(envelope["filters"], json!({ "name": "Theme" }));
        assert_eq!(envelope["total_results"], json!(61));
        assert!(envelope.get("total_items").is_none());
    }

    #[test]
    fn test_facet_envelope_nests_bucket_counts() {
        let facet_page = FacetPage {
            records: vec![doc! { "settingID": "S1" }],
            facets: doc! {
                "name": [{ "_id": "other", "count": 4 }],
                "description": [{ "_id": "other", "count": 4 }],
            },
            total: 4,
        };
        let filters = doc! { "cast": "90" };
        let envelope = facet_envelope(&SETTINGS, facet_page, &filters, 0);

        assert_eq!(envelope["facets"]["name"][0]["count"], json!(4));
        assert_eq!(envelope["facets"]["description"][0]["_id"], json!("other"));
        assert_eq!(envelope["filters"], json!({ "cast": "90" }));
        assert_eq!(envelope["total_results"], json!(4));
    }

    #[test]
    fn test_record_envelope_uses_singular_key() {
        let record = doc! { "settingID": "S1", "dateUpdated": DateTime::now() };
        let envelope = record_envelope(&SETTINGS, record);

        assert_eq!(envelope["updated_type"], json!("Date"));
        assert_eq!(envelope["appSetting"]["settingID"], json!("S1"));
        assert!(envelope.get("appSettings").is_none());
    }

    #[test]
    fn test_error_body_shape() {
        let body = serde_json::to_value(ErrorBody {
            error: "Not found".to_string(),
        })
        .unwrap();
        assert_eq!(body, json!({ "error": "Not found" }));
    }
}
