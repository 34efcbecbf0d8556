//! Resource descriptors for the congregation collections
//!
//! Each descriptor captures everything that varies between resource
//! families; the repository, query construction, and route handlers are
//! generic over them.

use bson::Document;
use mongodb::options::IndexOptions;

/// Bucket boundaries shared by the stock facet definitions.
pub const DEFAULT_BOUNDARIES: &[i32] = &[0, 50, 70, 90, 100];

/// Status values for one resource family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSpec {
    /// Document field holding the status
    pub field: &'static str,
    /// Value assigned at creation
    pub open: &'static str,
    /// Value deactivation flips to
    pub closed: &'static str,
}

/// Active/inactive lifecycle used by most families.
pub const ACTIVE_INACTIVE: StatusSpec = StatusSpec {
    field: "status",
    open: "ACTIVE",
    closed: "INACTIVE",
};

/// Open/void lifecycle used by course-like families.
pub const OPEN_VOID: StatusSpec = StatusSpec {
    field: "status",
    open: "OPEN",
    closed: "VOID",
};

/// One named bucket aggregation over a grouping field.
///
/// Values outside the boundaries (including non-numeric ones) land in the
/// "other" bucket.
#[derive(Debug, Clone, Copy)]
pub struct FacetSpec {
    /// Key the bucket counts are returned under
    pub name: &'static str,
    /// Document field the buckets group by
    pub group_by: &'static str,
    /// Ascending bucket boundaries
    pub boundaries: &'static [i32],
}

/// Static description of one resource family.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSpec {
    /// URL segment the family is served under
    pub mount: &'static str,
    /// MongoDB collection name
    pub collection: &'static str,
    /// JSON envelope key for a single record
    pub singular: &'static str,
    /// JSON envelope key for record lists
    pub plural: &'static str,
    /// Identifier field; unique, immutable, and the descending sort key
    pub id_field: &'static str,
    /// Status field and its open/closed values
    pub status: StatusSpec,
    /// Search allow-list: recognized query key -> document field
    pub search_keys: &'static [(&'static str, &'static str)],
    /// Query parameter that switches facet search on
    pub facet_trigger: &'static str,
    /// Document field the facet trigger value filters on
    pub facet_filter_field: &'static str,
    /// Filter key faceted search refuses to run without
    pub facet_required: &'static str,
    /// The two bucket aggregations returned by facet search
    pub facets: [FacetSpec; 2],
}

impl ResourceSpec {
    /// Map a recognized search query key to its document field
    pub fn search_field(&self, key: &str) -> Option<&'static str> {
        self.search_keys
            .iter()
            .find(|(query_key, _)| *query_key == key)
            .map(|(_, field)| *field)
    }

    /// Index definitions applied at startup: a unique index over the
    /// identifier field backs the uniqueness invariant.
    pub fn into_indices(&self) -> Vec<(Document, Option<IndexOptions>)> {
        let mut keys = Document::new();
        keys.insert(self.id_field, 1);
        vec![(
            keys,
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name(format!("{}_unique", self.id_field))
                    .build(),
            ),
        )]
    }
}

/// App settings family
pub const SETTINGS: ResourceSpec = ResourceSpec {
    mount: "settings",
    collection: "settings",
    singular: "appSetting",
    plural: "appSettings",
    id_field: "settingID",
    status: ACTIVE_INACTIVE,
    search_keys: &[
        ("ID", "settingID"),
        ("description", "description"),
        ("name", "name"),
    ],
    facet_trigger: "cast",
    facet_filter_field: "cast",
    facet_required: "dates",
    facets: [
        FacetSpec {
            name: "name",
            group_by: "name",
            boundaries: DEFAULT_BOUNDARIES,
        },
        FacetSpec {
            name: "description",
            group_by: "description",
            boundaries: DEFAULT_BOUNDARIES,
        },
    ],
};

/// Users family, mounted under /people
pub const PEOPLE: ResourceSpec = ResourceSpec {
    mount: "people",
    collection: "users",
    singular: "user",
    plural: "users",
    id_field: "email",
    status: ACTIVE_INACTIVE,
    search_keys: &[
        ("Email", "email"),
        ("firstname", "firstname"),
        ("lastname", "lastname"),
        ("status", "status"),
    ],
    facet_trigger: "cast",
    facet_filter_field: "cast",
    facet_required: "dates",
    facets: [
        FacetSpec {
            name: "firstname",
            group_by: "firstname",
            boundaries: DEFAULT_BOUNDARIES,
        },
        FacetSpec {
            name: "lastname",
            group_by: "lastname",
            boundaries: DEFAULT_BOUNDARIES,
        },
    ],
};

/// Courses (inventory) family, mounted under /inv
pub const COURSES: ResourceSpec = ResourceSpec {
    mount: "inv",
    collection: "courses",
    singular: "course",
    plural: "courses",
    id_field: "courseID",
    status: OPEN_VOID,
    search_keys: &[
        ("ID", "courseID"),
        ("title", "title"),
        ("orderNo", "orderNo"),
    ],
    facet_trigger: "cast",
    facet_filter_field: "cast",
    facet_required: "dates",
    facets: [
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
    ],
};

/// Sermons family
pub const SERMONS: ResourceSpec = ResourceSpec {
    mount: "sermons",
    collection: "sermon",
    singular: "sermon",
    plural: "sermons",
    id_field: "sermonID",
    status: ACTIVE_INACTIVE,
    search_keys: &[
        ("ID", "sermonID"),
        ("title", "title"),
        ("preacher", "preacher"),
        ("series", "series"),
    ],
    facet_trigger: "date",
    facet_filter_field: "date",
    facet_required: "date",
    facets: [
        FacetSpec {
            name: "serial",
            group_by: "serialNo",
            boundaries: DEFAULT_BOUNDARIES,
        },
        FacetSpec {
            name: "series",
            group_by: "series",
            boundaries: DEFAULT_BOUNDARIES,
        },
    ],
};

/// Members family
pub const MEMBERS: ResourceSpec = ResourceSpec {
    mount: "members",
    collection: "members",
    singular: "member",
    plural: "members",
    id_field: "memberID",
    status: ACTIVE_INACTIVE,
    search_keys: &[
        ("ID", "memberID"),
        ("firstname", "firstname"),
        ("lastname", "lastname"),
        ("email", "email"),
    ],
    facet_trigger: "w_date",
    facet_filter_field: "w_date",
    facet_required: "w_date",
    facets: [
        FacetSpec {
            name: "firstname",
            group_by: "firstname",
            boundaries: DEFAULT_BOUNDARIES,
        },
        FacetSpec {
            name: "lastname",
            group_by: "lastname",
            boundaries: DEFAULT_BOUNDARIES,
        },
    ],
};

/// Affinity groups family
pub const AFFINITY_GROUPS: ResourceSpec = ResourceSpec {
    mount: "groups",
    collection: "affinitygroups",
    singular: "affinitygroup",
    plural: "affinitygroups",
    id_field: "affinitygroupID",
    status: ACTIVE_INACTIVE,
    search_keys: &[
        ("ID", "affinitygroupID"),
        ("groupName", "groupName"),
        ("cordinator", "cordinator"),
    ],
    facet_trigger: "meetingDate",
    facet_filter_field: "meetingDate",
    facet_required: "meetingDate",
    facets: [
        FacetSpec {
            name: "membersCount",
            group_by: "membersCount",
            boundaries: DEFAULT_BOUNDARIES,
        },
        FacetSpec {
            name: "groupName",
            group_by: "groupName",
            boundaries: DEFAULT_BOUNDARIES,
        },
    ],
};

/// Gospel communities family
pub const GOSPEL_COMMUNITIES: ResourceSpec = ResourceSpec {
    mount: "communities",
    collection: "gospelcommunities",
    singular: "gospelcommunity",
    plural: "gospelcommunities",
    id_field: "gospelcommunityID",
    status: ACTIVE_INACTIVE,
    search_keys: &[
        ("ID", "gospelcommunityID"),
        ("gcName", "gcName"),
        ("cordinator", "cordinator"),
    ],
    facet_trigger: "meetingDate",
    facet_filter_field: "meetingDate",
    facet_required: "meetingDate",
    facets: [
        FacetSpec {
            name: "gcName",
            group_by: "gcName",
            boundaries: DEFAULT_BOUNDARIES,
        },
        FacetSpec {
            name: "venue",
            group_by: "venue",
            boundaries: DEFAULT_BOUNDARIES,
        },
    ],
};

/// Every resource family served by this facade, in mount order.
pub const RESOURCES: &[ResourceSpec] = &[
    SETTINGS,
    PEOPLE,
    COURSES,
    SERMONS,
    MEMBERS,
    AFFINITY_GROUPS,
    GOSPEL_COMMUNITIES,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_mounts_are_unique() {
        let mounts: HashSet<&str> = RESOURCES.iter().map(|spec| spec.mount).collect();
        assert_eq!(mounts.len(), RESOURCES.len());
    }

    #[test]
    fn test_collections_are_unique() {
        let collections: HashSet<&str> = RESOURCES.iter().map(|spec| spec.collection).collect();
        assert_eq!(collections.len(), RESOURCES.len());
    }

    #[test]
    fn test_search_field_maps_recognized_keys() {
        assert_eq!(SETTINGS.search_field("ID"), Some("settingID"));
        assert_eq!(PEOPLE.search_field("Email"), Some("email"));
        assert_eq!(COURSES.search_field("title"), Some("title"));
    }

    #[test]
    fn test_search_field_rejects_unrecognized_keys() {
        for spec in RESOURCES {
            assert_eq!(spec.search_field("page"), None);
            assert_eq!(spec.search_field("no-such-key"), None);
        }
    }

    #[test]
    fn test_identifier_index_is_unique() {
        for spec in RESOURCES {
            let indices = spec.into_indices();
            assert_eq!(indices.len(), 1);
            let (keys, options) = &indices[0];
            assert_eq!(keys.get_i32(spec.id_field).unwrap(), 1);
            assert_eq!(options.as_ref().unwrap().unique, Some(true));
        }
    }

    #[test]
    fn test_boundaries_are_ascending() {
        for spec in RESOURCES {
            for facet in &spec.facets {
                assert!(facet.boundaries.windows(2).all(|pair| pair[0] < pair[1]));
            }
        }
    }

    #[test]
    fn test_course_status_values() {
        assert_eq!(COURSES.status.open, "OPEN");
        assert_eq!(COURSES.status.closed, "VOID");
        assert_eq!(SETTINGS.status.open, "ACTIVE");
    }
}
