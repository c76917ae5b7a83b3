//! Request-body extraction for upload endpoints.
//!
//! The profile and company endpoints accept either a JSON body or a
//! multipart form carrying the same fields plus file parts (avatar, resume,
//! logo). Multipart text fields use dotted names for nesting
//! ("location.city").

use std::collections::HashMap;

use axum::extract::multipart::Multipart;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// An uploaded file part.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Parsed request body: typed fields plus any file parts by field name.
#[derive(Debug)]
pub struct ParsedBody<T> {
    pub body: T,
    pub files: HashMap<String, FilePart>,
}

/// A field that may arrive as an array or as a comma/newline separated
/// string (multipart forms send strings).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    List(Vec<String>),
    Csv(String),
}

impl StringOrList {
    /// Normalize into a trimmed, non-empty list.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::List(items) => items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            StringOrList::Csv(s) => s
                .split(['\n', ','])
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
        }
    }
}

/// Parse a request as JSON or multipart into `T` plus file parts.
pub async fn json_or_multipart<T>(state: &AppState, request: Request) -> ApiResult<ParsedBody<T>>
where
    T: DeserializeOwned,
{
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if is_multipart {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?;
        parse_multipart(multipart).await
    } else {
        let Json(body) = Json::<T>::from_request(request, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
        Ok(ParsedBody {
            body,
            files: HashMap::new(),
        })
    }
}

async fn parse_multipart<T: DeserializeOwned>(mut multipart: Multipart) -> ApiResult<ParsedBody<T>> {
    let mut fields = Map::new();
    let mut files = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart field: {}", e)))?
    {
        let Some(name) = field.name().map(|n| n.to_string()) else {
            continue;
        };

        if field.file_name().is_some() {
            let content_type = field
                .content_type()
                .map(|ct| ct.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?
                .to_vec();

            if !data.is_empty() {
                files.insert(name, FilePart { data, content_type });
            }
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid form field: {}", e)))?;
            insert_dotted(&mut fields, &name, Value::String(text));
        }
    }

    let body = serde_json::from_value(Value::Object(fields))
        .map_err(|e| ApiError::bad_request(format!("Invalid form body: {}", e)))?;

    Ok(ParsedBody { body, files })
}

/// Insert a value under a possibly dotted field name, nesting objects.
fn insert_dotted(map: &mut Map<String, Value>, name: &str, value: Value) {
    match name.split_once('.') {
        None => {
            map.insert(name.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = entry {
                insert_dotted(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_names_nest() {
        let mut map = Map::new();
        insert_dotted(&mut map, "name", json!("Acme"));
        insert_dotted(&mut map, "location.city", json!("Pune"));
        insert_dotted(&mut map, "location.country", json!("IN"));

        let value = Value::Object(map);
        assert_eq!(value["name"], "Acme");
        assert_eq!(value["location"]["city"], "Pune");
        assert_eq!(value["location"]["country"], "IN");
    }

    #[test]
    fn string_or_list_normalization() {
        let list = StringOrList::List(vec![" rust ".into(), "".into(), "sql".into()]);
        assert_eq!(list.into_vec(), vec!["rust".to_string(), "sql".to_string()]);

        let csv = StringOrList::Csv("rust, sql\nkubernetes,, ".into());
        assert_eq!(
            csv.into_vec(),
            vec!["rust".to_string(), "sql".to_string(), "kubernetes".to_string()]
        );
    }
}
