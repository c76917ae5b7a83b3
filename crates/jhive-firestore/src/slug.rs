//! Unique slug probing against a collection.

use tracing::debug;

use jhive_models::slug::{slug_candidate, slugify_title, MAX_SLUG_ATTEMPTS};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::query::QueryBuilder;
use crate::types::Value;

/// Derive a slug from a title that is unique within `collection`.
///
/// Probes `slug == candidate` and appends an incrementing numeric suffix on
/// collision. Gives up after MAX_SLUG_ATTEMPTS rather than looping forever
/// under sustained collision.
pub async fn generate_unique_slug(
    client: &FirestoreClient,
    collection: &str,
    title: &str,
) -> FirestoreResult<String> {
    let base = slugify_title(title);

    for attempt in 0..=MAX_SLUG_ATTEMPTS {
        let candidate = slug_candidate(&base, attempt);

        let query = QueryBuilder::new(collection)
            .filter_eq("slug", Value::StringValue(candidate.clone()))
            .page(0, 1)
            .build();

        let taken = !client.run_query(query).await?.is_empty();
        if !taken {
            if attempt > 0 {
                debug!(
                    "Slug '{}' taken in {}, using '{}'",
                    base, collection, candidate
                );
            }
            return Ok(candidate);
        }
    }

    Err(FirestoreError::request_failed(format!(
        "Unable to generate unique slug for '{}' in {} after {} attempts",
        base, collection, MAX_SLUG_ATTEMPTS
    )))
}
