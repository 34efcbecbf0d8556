//! Generic repository over one resource family
//!
//! One instance per family, built at startup from the shared store and a
//! static descriptor. Reads run as aggregation pipelines with majority
//! read concern; creates write with majority concern and the configured
//! timeout. Every operation returns a tagged result, never a panic.

use bson::{doc, Bson, DateTime, Document};
use futures::stream::StreamExt;
use mongodb::options::{
    Acknowledgment, AggregateOptions, InsertOneOptions, ReadConcern, WriteConcern,
};
use mongodb::results::{InsertOneResult, UpdateResult};
use mongodb::{Collection, IndexModel};
use serde::Serialize;
use std::time::Duration;

use crate::db::mongo::{MongoStore, RoleInfo};
use crate::db::query::{self, SearchQuery, FACET_RECORDS_KEY};
use crate::db::schemas::ResourceSpec;
use crate::types::{NarthexError, Result};

/// Connection configuration reported by the config-options routes.
///
/// Role info flattens into the top level and disappears entirely on an
/// unauthenticated connection.
#[derive(Debug, Clone, Serialize)]
pub struct Configuration {
    pub pool_size: u32,
    pub wtimeout: u64,
    #[serde(flatten)]
    pub auth_info: Option<RoleInfo>,
}

/// One page of faceted results: the records themselves, the named bucket
/// counts, and the filter-wide total.
#[derive(Debug, Clone)]
pub struct FacetPage {
    pub records: Vec<Document>,
    pub facets: Document,
    pub total: u64,
}

/// Repository for one resource family.
#[derive(Clone)]
pub struct Repository {
    spec: &'static ResourceSpec,
    collection: Collection<Document>,
    store: MongoStore,
}

impl Repository {
    /// Bind a repository to its collection handle
    pub fn new(store: &MongoStore, spec: &'static ResourceSpec) -> Self {
        Self {
            spec,
            collection: store.collection(spec.collection),
            store: store.clone(),
        }
    }

    /// The descriptor this repository serves
    pub fn spec(&self) -> &'static ResourceSpec {
        self.spec
    }

    /// Apply the descriptor's index definitions
    ///
    /// Called once at startup; the unique identifier index backs the
    /// uniqueness invariant for every later insert.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let indices: Vec<IndexModel> = self
            .spec
            .into_indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        if indices.is_empty() {
            return Ok(());
        }

        self.collection
            .create_indexes(indices)
            .await
            .map_err(|e| NarthexError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert one record, injecting lifecycle metadata and the default
    /// open status
    ///
    /// The record must already carry its identifier field; anything the
    /// caller supplied for the lifecycle fields is overwritten.
    pub async fn create(&self, record: Document, actor: &str) -> Result<InsertOneResult> {
        match record.get_str(self.spec.id_field) {
            Ok(id) if !id.is_empty() => {}
            _ => return Err(NarthexError::MissingIdentifier(self.spec.id_field)),
        }

        let record = with_lifecycle(record, self.spec, actor);

        let options = InsertOneOptions::builder()
            .write_concern(self.majority_write_concern())
            .build();

        self.collection
            .insert_one(record)
            .with_options(options)
            .await
            .map_err(|e| NarthexError::Write(format!("Insert failed: {}", e)))
    }

    /// Set fields on one open record, refreshing `dateUpdated`/`updateBy`
    ///
    /// Matches the identifier AND the open status, so a closed record is
    /// untouched and the ack reports zero modified. The identifier and
    /// status fields cannot be reassigned this way; caller-supplied values
    /// for them are dropped.
    pub async fn update(
        &self,
        id: &str,
        mut fields: Document,
        actor: &str,
    ) -> Result<UpdateResult> {
        fields.remove(self.spec.id_field);
        fields.remove(self.spec.status.field);
        fields.insert("dateUpdated", DateTime::now());
        fields.insert("updateBy", actor);

        self.collection
            .update_one(open_record_filter(self.spec, id), doc! { "$set": fields })
            .await
            .map_err(|e| NarthexError::Write(format!("Update failed: {}", e)))
    }

    /// Flip one open record to its closed status
    ///
    /// Idempotent: a second call matches nothing and reports zero
    /// modified.
    pub async fn deactivate(&self, id: &str) -> Result<UpdateResult> {
        let mut flip = Document::new();
        flip.insert(self.spec.status.field, self.spec.status.closed);
        flip.insert("dateUpdated", DateTime::now());

        self.collection
            .update_one(open_record_filter(self.spec, id), doc! { "$set": flip })
            .await
            .map_err(|e| NarthexError::Write(format!("Deactivate failed: {}", e)))
    }

    /// Every record, identifier descending, regardless of status
    pub async fn list_all(&self) -> Result<Vec<Document>> {
        self.run_pipeline(query::list_pipeline(self.spec.id_field))
            .await
    }

    /// Exact identifier lookup
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Document>> {
        let records = self
            .run_pipeline(query::by_id_pipeline(self.spec.id_field, id))
            .await?;
        Ok(records.into_iter().next())
    }

    /// Credential lookup for the stub auth route: identifier plus a
    /// plaintext `pwd` match, nothing more
    pub async fn find_by_credentials(&self, id: &str, token: &str) -> Result<Option<Document>> {
        let mut criteria = Document::new();
        criteria.insert(self.spec.id_field, id);
        criteria.insert("pwd", token);

        let records = self.run_pipeline(vec![doc! { "$match": criteria }]).await?;
        Ok(records.into_iter().next())
    }

    /// One page of records matching `filters`, with the filter-wide total
    pub async fn search(&self, filters: Document, page: u64) -> Result<(Vec<Document>, u64)> {
        let search = SearchQuery::new().with_filters(filters).page(page);

        let records = self
            .run_pipeline(search.page_pipeline(self.spec.id_field))
            .await?;
        let total = self.run_count(search.count_pipeline(self.spec.id_field)).await?;

        Ok((records, total))
    }

    /// Faceted page: records plus bucket counts plus the total
    ///
    /// Refuses to run without the descriptor's required filter key. Any
    /// aggregation failure on the facet pipelines is reported as an
    /// oversized result, matching what callers can act on.
    pub async fn faceted_search(&self, filters: Document, page: u64) -> Result<FacetPage> {
        let search = SearchQuery::new().with_filters(filters).page(page);
        facet_precondition(self.spec, &search)?;

        let pipeline = search.facet_pipeline(self.spec.id_field, &self.spec.facets);
        let options = AggregateOptions::builder()
            .read_concern(ReadConcern::majority())
            .build();

        let mut cursor = self
            .collection
            .aggregate(pipeline)
            .with_options(options)
            .await
            .map_err(|_| NarthexError::ResultsTooLarge)?;

        let mut facet_doc = match cursor.next().await {
            Some(Ok(doc)) => doc,
            Some(Err(_)) => return Err(NarthexError::ResultsTooLarge),
            None => Document::new(),
        };

        let records = match facet_doc.remove(FACET_RECORDS_KEY) {
            Some(Bson::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Bson::Document(record) => Some(record),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let total = self
            .run_count(search.count_pipeline(self.spec.id_field))
            .await
            .map_err(|_| NarthexError::ResultsTooLarge)?;

        Ok(FacetPage {
            records,
            facets: facet_doc,
            total,
        })
    }

    /// Pool size, write timeout, and the caller's first granted role
    pub async fn configuration(&self) -> Result<Configuration> {
        let profile = self.store.profile();
        let auth_info = self.store.caller_role().await?;

        Ok(Configuration {
            pool_size: profile.pool_size,
            wtimeout: profile.wtimeout,
            auth_info,
        })
    }

    fn majority_write_concern(&self) -> WriteConcern {
        WriteConcern::builder()
            .w(Acknowledgment::Majority)
            .w_timeout(Duration::from_millis(self.store.profile().wtimeout))
            .build()
    }

    async fn run_pipeline(&self, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        let options = AggregateOptions::builder()
            .read_concern(ReadConcern::majority())
            .build();

        let mut cursor = self
            .collection
            .aggregate(pipeline)
            .with_options(options)
            .await
            .map_err(|e| NarthexError::Query(format!("Aggregation failed: {}", e)))?;

        let mut records = Vec::new();
        while let Some(record) = cursor.next().await {
            records.push(
                record.map_err(|e| NarthexError::Query(format!("Cursor read failed: {}", e)))?,
            );
        }

        Ok(records)
    }

    async fn run_count(&self, pipeline: Vec<Document>) -> Result<u64> {
        let counts = self.run_pipeline(pipeline).await?;
        Ok(counts.first().map(read_count).unwrap_or(0))
    }
}

/// Inject lifecycle metadata and the default open status
fn with_lifecycle(mut record: Document, spec: &ResourceSpec, actor: &str) -> Document {
    let now = DateTime::now();
    record.insert("dateCreated", now);
    record.insert("createdBy", actor);
    record.insert("dateUpdated", now);
    record.insert("updateBy", actor);
    record.insert(spec.status.field, spec.status.open);
    record
}

/// Identifier AND open-status match used by update and deactivate
fn open_record_filter(spec: &ResourceSpec, id: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(spec.id_field, id);
    filter.insert(spec.status.field, spec.status.open);
    filter
}

/// Faceted search requires the descriptor's required filter key
fn facet_precondition(spec: &ResourceSpec, search: &SearchQuery) -> Result<()> {
    if search.has_filter(spec.facet_required) {
        Ok(())
    } else {
        Err(NarthexError::MissingRequiredFilter(spec.facet_required))
    }
}

/// `$count` emits an int32 or int64 depending on the server
fn read_count(doc: &Document) -> u64 {
    match doc.get("count") {
        Some(Bson::Int32(count)) => *count as u64,
        Some(Bson::Int64(count)) => *count as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{COURSES, SETTINGS};

    #[test]
    fn test_with_lifecycle_injects_metadata_and_status() {
        let record = doc! { "settingID": "S1", "name": "Theme" };
        let record = with_lifecycle(record, &SETTINGS, "admin");

        assert_eq!(record.get_str("settingID").unwrap(), "S1");
        assert_eq!(record.get_str("name").unwrap(), "Theme");
        assert_eq!(record.get_str("createdBy").unwrap(), "admin");
        assert_eq!(record.get_str("updateBy").unwrap(), "admin");
        assert_eq!(record.get_str("status").unwrap(), "ACTIVE");
        assert!(record.get_datetime("dateCreated").is_ok());
        assert!(record.get_datetime("dateUpdated").is_ok());
    }

    #[test]
    fn test_with_lifecycle_overrides_caller_status() {
        let record = doc! { "courseID": "C1", "status": "VOID" };
        let record = with_lifecycle(record, &COURSES, "bursar");
        assert_eq!(record.get_str("status").unwrap(), "OPEN");
    }

    #[test]
    fn test_open_record_filter_requires_open_status() {
        let filter = open_record_filter(&COURSES, "C1");
        assert_eq!(filter.get_str("courseID").unwrap(), "C1");
        assert_eq!(filter.get_str("status").unwrap(), "OPEN");
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_facet_precondition_rejects_missing_key() {
        let search = SearchQuery::new();
        let err = facet_precondition(&SETTINGS, &search).unwrap_err();
        assert!(matches!(
            err,
            NarthexError::MissingRequiredFilter("dates")
        ));
        assert_eq!(err.to_string(), "Must specify dates to filter by.");
    }

    #[test]
    fn test_facet_precondition_accepts_required_key() {
        let search = SearchQuery::new().filter("dates", "2021");
        assert!(facet_precondition(&SETTINGS, &search).is_ok());
    }

    #[test]
    fn test_read_count_handles_both_int_widths() {
        assert_eq!(read_count(&doc! { "count": 42_i32 }), 42);
        assert_eq!(read_count(&doc! { "count": 42_i64 }), 42);
        assert_eq!(read_count(&doc! {}), 0);
    }
}
