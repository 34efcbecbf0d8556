//! Read-query construction
//!
//! Builds the ordered aggregation stages shared by every resource family.
//! The builder only describes a query; the repository hands the stage list
//! to the collection for execution.

use bson::{doc, Bson, Document};

use crate::db::schemas::FacetSpec;

/// Records per page, fixed across all resources.
pub const PAGE_SIZE: i64 = 20;

/// Key the facet stage returns the paginated records under.
pub const FACET_RECORDS_KEY: &str = "records";

/// One filtered, paginated read.
///
/// Stage order is fixed: match, sort, skip, limit, then optionally the
/// facet stage. The count pipeline mirrors match and sort but replaces
/// pagination with a single `$count`.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    filters: Document,
    page: u64,
}

impl SearchQuery {
    /// Match-all query for page 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the filter document (field -> exact-match value)
    pub fn with_filters(mut self, filters: Document) -> Self {
        self.filters = filters;
        self
    }

    /// Add one exact-match clause
    pub fn filter(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.filters.insert(field, value.into());
        self
    }

    /// Select the page to return
    pub fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    /// The filter document this query matches on
    pub fn filters(&self) -> &Document {
        &self.filters
    }

    /// Whether a filter clause targets the given field
    pub fn has_filter(&self, field: &str) -> bool {
        self.filters.contains_key(field)
    }

    fn match_stage(&self) -> Document {
        doc! { "$match": self.filters.clone() }
    }

    // Saturates instead of wrapping: $skip must never go negative, and a
    // page past the end of the collection reads as an empty page.
    fn skip(&self) -> i64 {
        i64::try_from(self.page)
            .ok()
            .and_then(|page| page.checked_mul(PAGE_SIZE))
            .unwrap_or(i64::MAX)
    }

    /// match -> sort -> skip -> limit
    pub fn page_pipeline(&self, sort_field: &str) -> Vec<Document> {
        vec![
            self.match_stage(),
            sort_stage(sort_field),
            doc! { "$skip": self.skip() },
            doc! { "$limit": PAGE_SIZE },
        ]
    }

    /// match -> sort -> $count, independent of pagination
    pub fn count_pipeline(&self, sort_field: &str) -> Vec<Document> {
        vec![
            self.match_stage(),
            sort_stage(sort_field),
            doc! { "$count": "count" },
        ]
    }

    /// Page pipeline with a trailing facet stage
    pub fn facet_pipeline(&self, sort_field: &str, facets: &[FacetSpec]) -> Vec<Document> {
        let mut pipeline = self.page_pipeline(sort_field);
        pipeline.push(facet_stage(facets));
        pipeline
    }
}

/// Descending sort over the identifier field; identifiers are unique, so
/// the ordering is total and pages stay stable across calls.
pub fn sort_stage(sort_field: &str) -> Document {
    let mut sort = Document::new();
    sort.insert(sort_field, -1);
    doc! { "$sort": sort }
}

/// Unpaginated full-scan pipeline, identifier descending
pub fn list_pipeline(sort_field: &str) -> Vec<Document> {
    vec![sort_stage(sort_field)]
}

/// Single-record lookup pipeline
pub fn by_id_pipeline(id_field: &str, id: &str) -> Vec<Document> {
    let mut criteria = Document::new();
    criteria.insert(id_field, id);
    vec![doc! { "$match": criteria }]
}

/// `$facet` stage: one `$bucket` sub-pipeline per spec, plus a
/// pass-through sub-pipeline carrying the already-paginated records.
pub fn facet_stage(facets: &[FacetSpec]) -> Document {
    let mut branches = Document::new();
    branches.insert(FACET_RECORDS_KEY, vec![doc! { "$match": {} }]);
    for facet in facets {
        branches.insert(facet.name, vec![bucket_stage(facet)]);
    }
    doc! { "$facet": branches }
}

fn bucket_stage(facet: &FacetSpec) -> Document {
    let boundaries: Vec<Bson> = facet
        .boundaries
        .iter()
        .map(|bound| Bson::Int32(*bound))
        .collect();

    doc! {
        "$bucket": {
            "groupBy": format!("${}", facet.group_by),
            "boundaries": boundaries,
            "default": "other",
            "output": { "count": { "$sum": 1 } },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::DEFAULT_BOUNDARIES;

    fn stage_names(pipeline: &[Document]) -> Vec<&str> {
        pipeline
            .iter()
            .map(|stage| stage.keys().next().map(|k| k.as_str()).unwrap())
            .collect()
    }

    #[test]
    fn test_page_pipeline_stage_order() {
        let query = SearchQuery::new().filter("name", "Theme").page(2);
        let pipeline = query.page_pipeline("settingID");

        assert_eq!(
            stage_names(&pipeline),
            vec!["$match", "$sort", "$skip", "$limit"]
        );
    }

    #[test]
    fn test_skip_is_page_size_times_page() {
        let query = SearchQuery::new().page(3);
        let pipeline = query.page_pipeline("courseID");

        assert_eq!(pipeline[2].get_i64("$skip").unwrap(), 60);
        assert_eq!(pipeline[3].get_i64("$limit").unwrap(), PAGE_SIZE);
    }

    #[test]
    fn test_page_zero_skips_nothing() {
        let pipeline = SearchQuery::new().page_pipeline("email");
        assert_eq!(pipeline[2].get_i64("$skip").unwrap(), 0);
    }

    #[test]
    fn test_skip_saturates_on_huge_page() {
        let pipeline = SearchQuery::new().page(1 << 62).page_pipeline("settingID");
        assert_eq!(pipeline[2].get_i64("$skip").unwrap(), i64::MAX);
    }

    #[test]
    fn test_skip_never_negative() {
        let pipeline = SearchQuery::new().page(u64::MAX).page_pipeline("settingID");
        assert!(pipeline[2].get_i64("$skip").unwrap() >= 0);
    }

    #[test]
    fn test_empty_filters_match_all() {
        let pipeline = SearchQuery::new().page_pipeline("settingID");
        let criteria = pipeline[0].get_document("$match").unwrap();
        assert!(criteria.is_empty());
    }

    #[test]
    fn test_sort_is_identifier_descending() {
        let pipeline = SearchQuery::new().page_pipeline("sermonID");
        let sort = pipeline[1].get_document("$sort").unwrap();
        assert_eq!(sort.get_i32("sermonID").unwrap(), -1);
        assert_eq!(sort.len(), 1);
    }

    #[test]
    fn test_count_pipeline_mirrors_match_and_sort() {
        let query = SearchQuery::new().filter("status", "OPEN").page(7);
        let page = query.page_pipeline("courseID");
        let count = query.count_pipeline("courseID");

        assert_eq!(stage_names(&count), vec!["$match", "$sort", "$count"]);
        assert_eq!(count[0], page[0]);
        assert_eq!(count[1], page[1]);
        assert_eq!(count[2].get_str("$count").unwrap(), "count");
    }

    #[test]
    fn test_facet_pipeline_appends_facet_stage() {
        let facets = [
            FacetSpec {
                name: "amount",
                group_by: "courseAmount",
                boundaries: DEFAULT_BOUNDARIES,
            },
            FacetSpec {
                name: "vat",
                group_by: "VAT",
                boundaries: DEFAULT_BOUNDARIES,
            },
        ];
        let query = SearchQuery::new().filter("dates", "2021");
        let pipeline = query.facet_pipeline("courseID", &facets);

        assert_eq!(
            stage_names(&pipeline),
            vec!["$match", "$sort", "$skip", "$limit", "$facet"]
        );

        let branches = pipeline[4].get_document("$facet").unwrap();
        assert!(branches.contains_key(FACET_RECORDS_KEY));
        assert!(branches.contains_key("amount"));
        assert!(branches.contains_key("vat"));
    }

    #[test]
    fn test_bucket_stage_shape() {
        let facet = FacetSpec {
            name: "serial",
            group_by: "serialNo",
            boundaries: DEFAULT_BOUNDARIES,
        };
        let stage = bucket_stage(&facet);
        let bucket = stage.get_document("$bucket").unwrap();

        assert_eq!(bucket.get_str("groupBy").unwrap(), "$serialNo");
        assert_eq!(bucket.get_str("default").unwrap(), "other");
        assert_eq!(bucket.get_array("boundaries").unwrap().len(), 5);
        let output = bucket.get_document("output").unwrap();
        assert!(output.contains_key("count"));
    }

    #[test]
    fn test_by_id_pipeline_matches_identifier() {
        let pipeline = by_id_pipeline("settingID", "S1");
        assert_eq!(pipeline.len(), 1);
        let criteria = pipeline[0].get_document("$match").unwrap();
        assert_eq!(criteria.get_str("settingID").unwrap(), "S1");
    }

    #[test]
    fn test_list_pipeline_is_sort_only() {
        let pipeline = list_pipeline("memberID");
        assert_eq!(stage_names(&pipeline), vec!["$sort"]);
    }
}
