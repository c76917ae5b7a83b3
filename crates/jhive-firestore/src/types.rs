//! Firestore REST API wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Firestore document value types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    pub name: Option<String>,
    /// Document fields
    pub fields: Option<HashMap<String, Value>>,
    /// Create time
    pub create_time: Option<String>,
    /// Update time
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// The document ID, i.e. the last segment of the resource name.
    pub fn doc_id(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.rsplit('/').next())
    }

    /// Look up a field value.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.as_ref().and_then(|f| f.get(key))
    }
}

/// List documents response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    pub documents: Option<Vec<Document>>,
    pub next_page_token: Option<String>,
}

// ============================================================================
// Structured queries
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_descendants: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub field: FieldReference,
    pub direction: String,
}

/// A single-field comparison filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFilter {
    pub field: FieldReference,
    /// EQUAL, LESS_THAN, LESS_THAN_OR_EQUAL, GREATER_THAN,
    /// GREATER_THAN_OR_EQUAL, ...
    pub op: String,
    pub value: Value,
}

/// AND/OR combination of filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeFilter {
    pub op: String,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    FieldFilter(FieldFilter),
    CompositeFilter(CompositeFilter),
}

impl Filter {
    /// Equality filter on a field.
    pub fn eq(field: &str, value: Value) -> Self {
        Self::field(field, "EQUAL", value)
    }

    /// Comparison filter on a field.
    pub fn field(field: &str, op: &str, value: Value) -> Self {
        Filter::FieldFilter(FieldFilter {
            field: FieldReference {
                field_path: field.to_string(),
            },
            op: op.to_string(),
            value,
        })
    }

    /// AND together a set of filters. Returns None for an empty set and the
    /// filter itself for a single-element set.
    pub fn and(mut filters: Vec<Filter>) -> Option<Filter> {
        match filters.len() {
            0 => None,
            1 => Some(filters.remove(0)),
            _ => Some(Filter::CompositeFilter(CompositeFilter {
                op: "AND".to_string(),
                filters,
            })),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<Order>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_time: Option<String>,
}

// ============================================================================
// Aggregation queries (COUNT)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountAggregation {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub alias: String,
    pub count: CountAggregation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredAggregationQuery {
    pub structured_query: StructuredQuery,
    pub aggregations: Vec<Aggregation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAggregationQueryRequest {
    pub structured_aggregation_query: StructuredAggregationQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub aggregate_fields: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAggregationQueryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AggregationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_time: Option<String>,
}

// ============================================================================
// Batch writes (atomic multi-document operations)
// ============================================================================

/// A single write operation in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    /// Update or insert a document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Document>,

    /// Delete a document by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,

    /// Field mask for partial updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_mask: Option<DocumentMask>,

    /// Precondition for the write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_document: Option<Precondition>,
}

impl Write {
    /// Insert that fails if the document already exists.
    pub fn create(doc_name: String, fields: HashMap<String, Value>) -> Self {
        Self {
            update: Some(Document {
                name: Some(doc_name),
                fields: Some(fields),
                create_time: None,
                update_time: None,
            }),
            delete: None,
            update_mask: None,
            current_document: Some(Precondition {
                exists: Some(false),
                update_time: None,
            }),
        }
    }

    /// Unconditional delete by full document name.
    pub fn delete(doc_name: String) -> Self {
        Self {
            update: None,
            delete: Some(doc_name),
            update_mask: None,
            current_document: None,
        }
    }
}

/// Document field mask for partial updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    pub field_paths: Vec<String>,
}

/// Precondition for a write operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Precondition {
    /// Document must (not) exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,

    /// Document must have this update time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

/// Commit request: the atomic flavor of multi-document writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub writes: Vec<Write>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub write_results: Option<Vec<WriteResult>>,
    pub commit_time: Option<String>,
}

// ============================================================================
// Value conversion traits
// ============================================================================

/// Convert a Rust value to Firestore Value.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToFirestoreValue for &str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.to_string())
    }
}

impl ToFirestoreValue for i64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for i32 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue((*self as i64).to_string())
    }
}

impl ToFirestoreValue for u32 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue((*self as i64).to_string())
    }
}

impl ToFirestoreValue for u64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue((*self as i64).to_string())
    }
}

impl ToFirestoreValue for f64 {
    fn to_firestore_value(&self) -> Value {
        Value::DoubleValue(*self)
    }
}

impl ToFirestoreValue for bool {
    fn to_firestore_value(&self) -> Value {
        Value::BooleanValue(*self)
    }
}

impl ToFirestoreValue for DateTime<Utc> {
    fn to_firestore_value(&self) -> Value {
        Value::TimestampValue(self.to_rfc3339())
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        match self {
            Some(v) => v.to_firestore_value(),
            None => Value::NullValue(()),
        }
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Vec<T> {
    fn to_firestore_value(&self) -> Value {
        Value::ArrayValue(ArrayValue {
            values: Some(self.iter().map(|v| v.to_firestore_value()).collect()),
        })
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for HashMap<String, T> {
    fn to_firestore_value(&self) -> Value {
        Value::MapValue(MapValue {
            fields: Some(
                self.iter()
                    .map(|(k, v)| (k.clone(), v.to_firestore_value()))
                    .collect(),
            ),
        })
    }
}

/// Convert Firestore Value to Rust type.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for i64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u32 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as u32),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as u64),
            _ => None,
        }
    }
}

impl FromFirestoreValue for f64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::DoubleValue(f) => Some(*f),
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromFirestoreValue for bool {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into()),
            _ => None,
        }
    }
}

// ============================================================================
// Field map reading helpers
// ============================================================================

/// Read a typed value out of a document field map.
pub fn read<T: FromFirestoreValue>(fields: &HashMap<String, Value>, key: &str) -> Option<T> {
    fields.get(key).and_then(|v| T::from_firestore_value(v))
}

/// Read a string array field.
pub fn read_string_array(fields: &HashMap<String, Value>, key: &str) -> Vec<String> {
    match fields.get(key) {
        Some(Value::ArrayValue(arr)) => arr
            .values
            .as_ref()
            .map(|vs| {
                vs.iter()
                    .filter_map(String::from_firestore_value)
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Read a nested map field's fields.
pub fn read_map<'a>(
    fields: &'a HashMap<String, Value>,
    key: &str,
) -> Option<&'a HashMap<String, Value>> {
    match fields.get(key) {
        Some(Value::MapValue(map)) => map.fields.as_ref(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_is_last_name_segment() {
        let doc = Document {
            name: Some("projects/p/databases/(default)/documents/jobs/abc".to_string()),
            fields: None,
            create_time: None,
            update_time: None,
        };
        assert_eq!(doc.doc_id(), Some("abc"));
    }

    #[test]
    fn and_filter_flattening() {
        assert!(Filter::and(vec![]).is_none());

        let single = Filter::and(vec![Filter::eq("a", Value::BooleanValue(true))]).unwrap();
        assert!(matches!(single, Filter::FieldFilter(_)));

        let many = Filter::and(vec![
            Filter::eq("a", Value::BooleanValue(true)),
            Filter::eq("b", Value::BooleanValue(false)),
        ])
        .unwrap();
        assert!(matches!(many, Filter::CompositeFilter(_)));
    }

    #[test]
    fn integer_round_trip_via_string() {
        let v = 42i64.to_firestore_value();
        assert_eq!(i64::from_firestore_value(&v), Some(42));
    }

    #[test]
    fn timestamp_round_trip() {
        let now = Utc::now();
        let v = now.to_firestore_value();
        let back = DateTime::<Utc>::from_firestore_value(&v).unwrap();
        assert_eq!(back.timestamp_millis(), now.timestamp_millis());
    }
}
