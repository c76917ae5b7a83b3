//! Typed repository for user accounts.
//!
//! Uses a dual-document pattern for email uniqueness:
//! - Account doc at `users/{user_id}`
//! - Email index at `user_emails/{email}` pointing back at the account
//!
//! Both documents are written in one atomic commit with create
//! preconditions, so a concurrent duplicate registration fails with
//! ALREADY_EXISTS instead of leaving two accounts behind one address.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::info;

use jhive_models::{normalize_limit, normalize_page, PageMeta, User, UserId, UserLocation, UserRole};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::query::{QueryBuilder, SortSpec};
use crate::types::{
    read, read_map, read_string_array, Document, MapValue, ToFirestoreValue, Value, Write,
};

const COLLECTION: &str = "users";
const EMAIL_INDEX: &str = "user_emails";

/// Whitelisted sort keys for the admin user listing.
pub const USER_SORTS: &[(&str, &'static str)] = &[
    ("createdAt", "created_at"),
    ("name", "name_lc"),
    ("email", "email"),
];

/// Filters for the admin user listing.
#[derive(Debug, Clone, Default)]
pub struct UserListQuery {
    /// Sanitized, lowercased search term (name prefix).
    pub q: Option<String>,
    pub role: Option<UserRole>,
    pub company: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Repository for user documents.
pub struct UsersRepository {
    client: FirestoreClient,
}

impl UsersRepository {
    /// Create a new users repository.
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &UserId) -> FirestoreResult<Option<User>> {
        let doc = self.client.get_document(COLLECTION, id.as_str()).await?;
        doc.map(|d| document_to_user(&d)).transpose()
    }

    /// Look up a user by normalized email via the email index.
    pub async fn get_by_email(&self, email: &str) -> FirestoreResult<Option<User>> {
        let index = self.client.get_document(EMAIL_INDEX, email).await?;
        let Some(index) = index else {
            return Ok(None);
        };

        let fields = index
            .fields
            .as_ref()
            .ok_or_else(|| FirestoreError::invalid_response("email index has no fields"))?;
        let user_id: String = read(fields, "user_id")
            .ok_or_else(|| FirestoreError::invalid_response("email index missing user_id"))?;

        self.get(&UserId::from_string(user_id)).await
    }

    /// Create a user atomically with its email index entry.
    ///
    /// Returns `AlreadyExists` when the email (or, improbably, the ID) is
    /// already taken.
    pub async fn create(&self, user: &User) -> FirestoreResult<()> {
        let user_name = self
            .client
            .full_document_name(COLLECTION, user.id.as_str());
        let index_name = self.client.full_document_name(EMAIL_INDEX, &user.email);

        let mut index_fields = HashMap::new();
        index_fields.insert("user_id".to_string(), user.id.as_str().to_firestore_value());
        index_fields.insert("created_at".to_string(), Utc::now().to_firestore_value());

        let writes = vec![
            Write::create(user_name, user_to_fields(user)),
            Write::create(index_name, index_fields),
        ];

        self.client.commit(writes).await?;
        info!("Created user {} ({})", user.id, user.email);
        Ok(())
    }

    /// Replace a user document with the given state.
    pub async fn update(&self, user: &User) -> FirestoreResult<()> {
        self.client
            .update_document(COLLECTION, user.id.as_str(), user_to_fields(user), None)
            .await?;
        Ok(())
    }

    /// Delete a user and its email index entry atomically.
    pub async fn delete(&self, user: &User) -> FirestoreResult<()> {
        let user_name = self
            .client
            .full_document_name(COLLECTION, user.id.as_str());
        let index_name = self.client.full_document_name(EMAIL_INDEX, &user.email);

        self.client
            .commit(vec![Write::delete(user_name), Write::delete(index_name)])
            .await?;
        info!("Deleted user {} ({})", user.id, user.email);
        Ok(())
    }

    /// Store (or clear) the refresh-token digest.
    pub async fn set_refresh_token_hash(
        &self,
        id: &UserId,
        hash: Option<&str>,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "refresh_token_hash".to_string(),
            hash.to_firestore_value(),
        );
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                COLLECTION,
                id.as_str(),
                fields,
                Some(vec![
                    "refresh_token_hash".to_string(),
                    "updated_at".to_string(),
                ]),
            )
            .await?;
        Ok(())
    }

    /// Admin listing with filters, whitelisted sort and page totals.
    pub async fn list(&self, params: &UserListQuery) -> FirestoreResult<(Vec<User>, PageMeta)> {
        let page = normalize_page(params.page);
        let limit = normalize_limit(params.limit, max_page_limit());
        let sort = SortSpec::parse(params.sort.as_deref(), USER_SORTS);

        let base = filtered(params);
        let total = self.client.count(base.clone().build_for_count()).await?;
        let meta = PageMeta::new(total, page, limit);

        let query = base.sort(sort).page(meta.offset(), limit).build();
        let docs = self.client.run_query(query).await?;

        let users = docs
            .iter()
            .map(document_to_user)
            .collect::<FirestoreResult<Vec<_>>>()?;

        Ok((users, meta))
    }
}

fn filtered(params: &UserListQuery) -> QueryBuilder {
    let mut builder = QueryBuilder::new(COLLECTION);

    if let Some(role) = params.role {
        builder = builder.filter_eq("role", Value::StringValue(role.as_str().to_string()));
    }
    if let Some(company) = &params.company {
        builder = builder.filter_eq("company", Value::StringValue(company.clone()));
    }
    if let Some(q) = params.q.as_deref().filter(|q| !q.is_empty()) {
        builder = builder.filter_prefix("name_lc", q);
    }

    builder
}

/// Page-size cap, shared by every listing.
pub fn max_page_limit() -> u32 {
    std::env::var("MAX_PAGE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100)
}

// =============================================================================
// Conversion
// =============================================================================

fn location_to_value(location: &UserLocation) -> Value {
    let mut fields = HashMap::new();
    fields.insert("city".to_string(), location.city.to_firestore_value());
    fields.insert("state".to_string(), location.state.to_firestore_value());
    fields.insert("country".to_string(), location.country.to_firestore_value());
    Value::MapValue(MapValue {
        fields: Some(fields),
    })
}

fn location_from_fields(fields: &HashMap<String, Value>, key: &str) -> UserLocation {
    match read_map(fields, key) {
        Some(map) => UserLocation {
            city: read(map, "city"),
            state: read(map, "state"),
            country: read(map, "country"),
        },
        None => UserLocation::default(),
    }
}

/// Convert a user to Firestore fields.
pub(crate) fn user_to_fields(user: &User) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("name".to_string(), user.name.to_firestore_value());
    fields.insert("name_lc".to_string(), user.name.to_lowercase().to_firestore_value());
    fields.insert("email".to_string(), user.email.to_firestore_value());
    fields.insert(
        "password_hash".to_string(),
        user.password_hash.to_firestore_value(),
    );
    fields.insert("role".to_string(), user.role.as_str().to_firestore_value());
    fields.insert("avatar_url".to_string(), user.avatar_url.to_firestore_value());
    fields.insert("avatar_key".to_string(), user.avatar_key.to_firestore_value());
    fields.insert("resume_url".to_string(), user.resume_url.to_firestore_value());
    fields.insert("resume_key".to_string(), user.resume_key.to_firestore_value());
    fields.insert(
        "company".to_string(),
        user.company
            .as_ref()
            .map(|c| c.as_str().to_string())
            .to_firestore_value(),
    );
    fields.insert("bio".to_string(), user.bio.to_firestore_value());
    fields.insert("location".to_string(), location_to_value(&user.location));
    fields.insert("skills".to_string(), user.skills.to_firestore_value());
    fields.insert(
        "email_verified".to_string(),
        user.email_verified.to_firestore_value(),
    );
    fields.insert(
        "email_verification_otp_hash".to_string(),
        user.email_verification_otp_hash.to_firestore_value(),
    );
    fields.insert(
        "email_verification_otp_expires".to_string(),
        user.email_verification_otp_expires.to_firestore_value(),
    );
    fields.insert(
        "last_verification_sent_at".to_string(),
        user.last_verification_sent_at.to_firestore_value(),
    );
    fields.insert(
        "password_reset_otp_hash".to_string(),
        user.password_reset_otp_hash.to_firestore_value(),
    );
    fields.insert(
        "password_reset_otp_expires".to_string(),
        user.password_reset_otp_expires.to_firestore_value(),
    );
    fields.insert(
        "last_password_reset_sent_at".to_string(),
        user.last_password_reset_sent_at.to_firestore_value(),
    );
    fields.insert(
        "refresh_token_hash".to_string(),
        user.refresh_token_hash.to_firestore_value(),
    );
    fields.insert("created_at".to_string(), user.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), user.updated_at.to_firestore_value());
    fields
}

/// Parse a user from a Firestore document.
pub(crate) fn document_to_user(doc: &Document) -> FirestoreResult<User> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_response("user document has no fields"))?;
    let id = doc
        .doc_id()
        .ok_or_else(|| FirestoreError::invalid_response("user document has no name"))?;

    let role = read::<String>(fields, "role")
        .and_then(|r| UserRole::parse(&r))
        .unwrap_or_default();

    Ok(User {
        id: UserId::from_string(id),
        name: read(fields, "name").unwrap_or_default(),
        email: read(fields, "email").unwrap_or_default(),
        password_hash: read(fields, "password_hash").unwrap_or_default(),
        role,
        avatar_url: read(fields, "avatar_url"),
        avatar_key: read(fields, "avatar_key"),
        resume_url: read(fields, "resume_url"),
        resume_key: read(fields, "resume_key"),
        company: read::<String>(fields, "company").map(Into::into),
        bio: read(fields, "bio"),
        location: location_from_fields(fields, "location"),
        skills: read_string_array(fields, "skills"),
        email_verified: read(fields, "email_verified").unwrap_or(false),
        email_verification_otp_hash: read(fields, "email_verification_otp_hash"),
        email_verification_otp_expires: read::<DateTime<Utc>>(fields, "email_verification_otp_expires"),
        last_verification_sent_at: read(fields, "last_verification_sent_at"),
        password_reset_otp_hash: read(fields, "password_reset_otp_hash"),
        password_reset_otp_expires: read(fields, "password_reset_otp_expires"),
        last_password_reset_sent_at: read(fields, "last_password_reset_sent_at"),
        refresh_token_hash: read(fields, "refresh_token_hash"),
        created_at: read(fields, "created_at").unwrap_or_else(Utc::now),
        updated_at: read(fields, "updated_at").unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_round_trip_through_fields() {
        let mut user = User::new("Jane Doe", "jane@example.com", "$argon2id$stub", UserRole::Employer);
        user.skills = vec!["rust".to_string(), "sql".to_string()];
        user.bio = Some("hiring manager".to_string());
        user.location.city = Some("Pune".to_string());
        user.email_verified = true;

        let fields = user_to_fields(&user);
        let doc = Document {
            name: Some(format!("projects/p/databases/(default)/documents/users/{}", user.id)),
            fields: Some(fields),
            create_time: None,
            update_time: None,
        };

        let parsed = document_to_user(&doc).unwrap();
        assert_eq!(parsed.id, user.id);
        assert_eq!(parsed.name, user.name);
        assert_eq!(parsed.email, user.email);
        assert_eq!(parsed.role, UserRole::Employer);
        assert_eq!(parsed.skills, user.skills);
        assert_eq!(parsed.location.city.as_deref(), Some("Pune"));
        assert!(parsed.email_verified);
        assert!(parsed.refresh_token_hash.is_none());
    }

    #[test]
    fn shadow_name_field_is_lowercased() {
        let user = User::new("Jane DOE", "jane@example.com", "hash", UserRole::Jobseeker);
        let fields = user_to_fields(&user);
        match fields.get("name_lc") {
            Some(Value::StringValue(s)) => assert_eq!(s, "jane doe"),
            other => panic!("unexpected name_lc: {:?}", other),
        }
    }
}
