//! Structured-query building: filters, whitelisted sorting, offset paging.

use crate::types::{
    CollectionSelector, FieldReference, Filter, Order, StructuredQuery, Value,
};

/// Sort direction for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    /// Firestore direction string.
    pub const fn firestore_direction(&self) -> &'static str {
        match self {
            Self::Ascending => "ASCENDING",
            Self::Descending => "DESCENDING",
        }
    }
}

/// A validated sort field + direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Firestore field path.
    pub field: &'static str,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Default ordering: newest first.
    pub fn newest_first() -> Self {
        Self {
            field: "created_at",
            direction: SortDirection::Descending,
        }
    }

    /// Parse a requested sort key ("name", "-createdAt", ...) against a
    /// whitelist mapping API keys to Firestore field paths. Unknown keys
    /// fall back to newest-first.
    pub fn parse(requested: Option<&str>, allowed: &[(&str, &'static str)]) -> Self {
        let Some(raw) = requested.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::newest_first();
        };

        let (key, direction) = match raw.strip_prefix('-') {
            Some(rest) => (rest, SortDirection::Descending),
            None => (raw, SortDirection::Ascending),
        };

        for (api_key, field_path) in allowed {
            if *api_key == key {
                return Self {
                    field: field_path,
                    direction,
                };
            }
        }

        Self::newest_first()
    }
}

/// Sentinel appended to a prefix term to form the exclusive upper bound of
/// a prefix range scan.
const PREFIX_UPPER_BOUND: char = '\u{10FFFF}';

/// Operators that make a filter a range/inequality constraint. Firestore
/// rejects a query whose leading explicit sort differs from an
/// inequality-filtered field, so these fields must head the ordering.
const RANGE_OPS: &[&str] = &[
    "LESS_THAN",
    "LESS_THAN_OR_EQUAL",
    "GREATER_THAN",
    "GREATER_THAN_OR_EQUAL",
    "NOT_EQUAL",
];

/// Builder for filtered, sorted, offset-paginated queries over a top-level
/// collection.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    collection: String,
    filters: Vec<Filter>,
    /// Fields under a range/inequality filter, in insertion order. These
    /// lead the built `order_by` (see `build_order`). Queries ranging over
    /// more than one field additionally need a composite index; the shapes
    /// the API issues are declared in `firestore.indexes.json`.
    range_fields: Vec<String>,
    sort: Option<SortSpec>,
    offset: Option<i32>,
    limit: Option<i32>,
}

impl QueryBuilder {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            range_fields: Vec::new(),
            sort: None,
            offset: None,
            limit: None,
        }
    }

    /// Equality filter.
    pub fn filter_eq(mut self, field: &str, value: Value) -> Self {
        self.filters.push(Filter::eq(field, value));
        self
    }

    /// Comparison filter (GREATER_THAN_OR_EQUAL, LESS_THAN_OR_EQUAL, ...).
    pub fn filter_op(mut self, field: &str, op: &str, value: Value) -> Self {
        if RANGE_OPS.contains(&op) {
            self.note_range_field(field);
        }
        self.filters.push(Filter::field(field, op, value));
        self
    }

    /// Case-sensitive prefix match as a range scan. Callers pass lowercased
    /// terms against lowercased shadow fields for case-insensitive search.
    pub fn filter_prefix(mut self, field: &str, term: &str) -> Self {
        let upper = format!("{}{}", term, PREFIX_UPPER_BOUND);
        self.note_range_field(field);
        self.filters.push(Filter::field(
            field,
            "GREATER_THAN_OR_EQUAL",
            Value::StringValue(term.to_string()),
        ));
        self.filters
            .push(Filter::field(field, "LESS_THAN", Value::StringValue(upper)));
        self
    }

    fn note_range_field(&mut self, field: &str) {
        if !self.range_fields.iter().any(|f| f == field) {
            self.range_fields.push(field.to_string());
        }
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn page(mut self, offset: u64, limit: u32) -> Self {
        self.offset = Some(offset.min(i32::MAX as u64) as i32);
        self.limit = Some(limit.min(i32::MAX as u32) as i32);
        self
    }

    /// Build the query for document retrieval (ordered + paginated).
    pub fn build(self) -> StructuredQuery {
        let Self {
            collection,
            filters,
            range_fields,
            sort,
            offset,
            limit,
        } = self;

        StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: collection,
                all_descendants: None,
            }],
            filter: Filter::and(filters),
            order_by: build_order(&range_fields, sort.as_ref()),
            offset,
            limit,
        }
    }

    /// Build the filter-only query used for COUNT aggregation. Aggregations
    /// carry no explicit ordering, so the inequality-ordering rule does not
    /// apply here.
    pub fn build_for_count(self) -> StructuredQuery {
        StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: self.collection,
                all_descendants: None,
            }],
            filter: Filter::and(self.filters),
            order_by: None,
            offset: None,
            limit: None,
        }
    }
}

/// Explicit ordering for a query.
///
/// Range-filtered fields come first, in filter order, ascending unless the
/// requested sort targets one of them; the requested sort follows when it
/// is a different field. The document ID closes the list as a stable
/// pagination tiebreak. A search or salary-range listing therefore orders
/// by the ranged field before the requested sort, which is the closest
/// legal ordering the store allows.
fn build_order(range_fields: &[String], sort: Option<&SortSpec>) -> Option<Vec<Order>> {
    if range_fields.is_empty() {
        let sort = sort?;
        return Some(vec![
            order(sort.field, sort.direction),
            order("__name__", sort.direction),
        ]);
    }

    let mut orders = Vec::with_capacity(range_fields.len() + 2);
    let mut last_direction = SortDirection::Ascending;

    for field in range_fields {
        let direction = match sort {
            Some(s) if s.field == field.as_str() => s.direction,
            _ => SortDirection::Ascending,
        };
        orders.push(order(field, direction));
        last_direction = direction;
    }

    if let Some(s) = sort {
        if !range_fields.iter().any(|f| f.as_str() == s.field) {
            orders.push(order(s.field, s.direction));
            last_direction = s.direction;
        }
    }

    orders.push(order("__name__", last_direction));
    Some(orders)
}

fn order(field: &str, direction: SortDirection) -> Order {
    Order {
        field: FieldReference {
            field_path: field.to_string(),
        },
        direction: direction.firestore_direction().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB_SORTS: &[(&str, &str)] = &[
        ("createdAt", "created_at"),
        ("title", "title_lc"),
        ("salary.min", "salary_min"),
    ];

    fn order_fields(query: &StructuredQuery) -> Vec<(String, String)> {
        query
            .order_by
            .as_ref()
            .map(|orders| {
                orders
                    .iter()
                    .map(|o| (o.field.field_path.clone(), o.direction.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn sort_parsing_with_whitelist() {
        let spec = SortSpec::parse(Some("-createdAt"), JOB_SORTS);
        assert_eq!(spec.field, "created_at");
        assert_eq!(spec.direction, SortDirection::Descending);

        let spec = SortSpec::parse(Some("title"), JOB_SORTS);
        assert_eq!(spec.field, "title_lc");
        assert_eq!(spec.direction, SortDirection::Ascending);

        // Unknown keys fall back to newest-first
        let spec = SortSpec::parse(Some("password_hash"), JOB_SORTS);
        assert_eq!(spec, SortSpec::newest_first());

        assert_eq!(SortSpec::parse(None, JOB_SORTS), SortSpec::newest_first());
        assert_eq!(SortSpec::parse(Some("  "), JOB_SORTS), SortSpec::newest_first());
    }

    #[test]
    fn build_includes_stable_tiebreak() {
        let query = QueryBuilder::new("jobs")
            .sort(SortSpec::newest_first())
            .page(40, 20)
            .build();

        assert_eq!(
            order_fields(&query),
            vec![
                ("created_at".to_string(), "DESCENDING".to_string()),
                ("__name__".to_string(), "DESCENDING".to_string()),
            ]
        );
        assert_eq!(query.offset, Some(40));
        assert_eq!(query.limit, Some(20));
    }

    #[test]
    fn count_query_drops_order_and_paging() {
        let query = QueryBuilder::new("jobs")
            .filter_eq("status", Value::StringValue("open".to_string()))
            .sort(SortSpec::newest_first())
            .page(40, 20)
            .build_for_count();

        assert!(query.order_by.is_none());
        assert!(query.offset.is_none());
        assert!(query.limit.is_none());
        assert!(query.filter.is_some());
    }

    #[test]
    fn prefix_filter_builds_range() {
        let query = QueryBuilder::new("jobs")
            .filter_prefix("title_lc", "backend")
            .build();

        match query.filter.unwrap() {
            Filter::CompositeFilter(c) => {
                assert_eq!(c.op, "AND");
                assert_eq!(c.filters.len(), 2);
            }
            _ => panic!("expected composite range filter"),
        }
    }

    #[test]
    fn range_field_leads_the_ordering() {
        // A prefix search under the default newest-first sort must order by
        // the ranged field first or the store rejects the query
        let query = QueryBuilder::new("jobs")
            .filter_prefix("title_lc", "backend")
            .sort(SortSpec::newest_first())
            .build();

        assert_eq!(
            order_fields(&query),
            vec![
                ("title_lc".to_string(), "ASCENDING".to_string()),
                ("created_at".to_string(), "DESCENDING".to_string()),
                ("__name__".to_string(), "DESCENDING".to_string()),
            ]
        );
    }

    #[test]
    fn sort_on_the_range_field_is_not_duplicated() {
        let query = QueryBuilder::new("companies")
            .filter_prefix("name_lc", "acme")
            .sort(SortSpec {
                field: "name_lc",
                direction: SortDirection::Ascending,
            })
            .build();

        assert_eq!(
            order_fields(&query),
            vec![
                ("name_lc".to_string(), "ASCENDING".to_string()),
                ("__name__".to_string(), "ASCENDING".to_string()),
            ]
        );
    }

    #[test]
    fn multiple_range_fields_all_precede_the_sort() {
        let query = QueryBuilder::new("jobs")
            .filter_op(
                "salary.min",
                "GREATER_THAN_OR_EQUAL",
                Value::IntegerValue("500000".to_string()),
            )
            .filter_op(
                "salary.max",
                "LESS_THAN_OR_EQUAL",
                Value::IntegerValue("900000".to_string()),
            )
            .sort(SortSpec::newest_first())
            .build();

        assert_eq!(
            order_fields(&query),
            vec![
                ("salary.min".to_string(), "ASCENDING".to_string()),
                ("salary.max".to_string(), "ASCENDING".to_string()),
                ("created_at".to_string(), "DESCENDING".to_string()),
                ("__name__".to_string(), "DESCENDING".to_string()),
            ]
        );
    }

    #[test]
    fn equality_filters_do_not_constrain_ordering() {
        let query = QueryBuilder::new("jobs")
            .filter_eq("status", Value::StringValue("open".to_string()))
            .sort(SortSpec::newest_first())
            .build();

        assert_eq!(order_fields(&query)[0].0, "created_at");
    }
}
