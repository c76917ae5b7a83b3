//! Typed repository for company profiles.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use jhive_models::{
    normalize_limit, normalize_page, Company, CompanyId, CompanyLocation, PageMeta,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::query::{QueryBuilder, SortSpec};
use crate::slug::generate_unique_slug;
use crate::types::{read, read_map, Document, MapValue, ToFirestoreValue, Value};
use crate::users_repo::max_page_limit;

const COLLECTION: &str = "companies";

/// Whitelisted sort keys for company listings.
pub const COMPANY_SORTS: &[(&str, &'static str)] =
    &[("createdAt", "created_at"), ("name", "name_lc")];

/// Filters for the public company listing.
#[derive(Debug, Clone, Default)]
pub struct CompanyListQuery {
    /// Sanitized, lowercased search term (name prefix).
    pub q: Option<String>,
    pub owner: Option<String>,
    pub industry: Option<String>,
    pub verified: Option<bool>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Repository for company documents.
pub struct CompaniesRepository {
    client: FirestoreClient,
}

impl CompaniesRepository {
    /// Create a new companies repository.
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Get a company by ID.
    pub async fn get(&self, id: &CompanyId) -> FirestoreResult<Option<Company>> {
        let doc = self.client.get_document(COLLECTION, id.as_str()).await?;
        doc.map(|d| document_to_company(&d)).transpose()
    }

    /// Get a company by slug.
    pub async fn get_by_slug(&self, slug: &str) -> FirestoreResult<Option<Company>> {
        let query = QueryBuilder::new(COLLECTION)
            .filter_eq("slug", Value::StringValue(slug.to_string()))
            .page(0, 1)
            .build();

        let docs = self.client.run_query(query).await?;
        docs.first().map(document_to_company).transpose()
    }

    /// Best-effort duplicate-name probe (Firestore has no unique indexes).
    pub async fn name_taken(&self, name: &str) -> FirestoreResult<bool> {
        let query = QueryBuilder::new(COLLECTION)
            .filter_eq("name_lc", Value::StringValue(name.to_lowercase()))
            .page(0, 1)
            .build();

        Ok(!self.client.run_query(query).await?.is_empty())
    }

    /// Derive a slug unique among companies.
    pub async fn unique_slug(&self, name: &str) -> FirestoreResult<String> {
        generate_unique_slug(&self.client, COLLECTION, name).await
    }

    /// Create a company record.
    pub async fn create(&self, company: &Company) -> FirestoreResult<()> {
        self.client
            .create_document(COLLECTION, company.id.as_str(), company_to_fields(company))
            .await?;
        info!("Created company {} ({})", company.id, company.slug);
        Ok(())
    }

    /// Replace a company document with the given state.
    pub async fn update(&self, company: &Company) -> FirestoreResult<()> {
        self.client
            .update_document(
                COLLECTION,
                company.id.as_str(),
                company_to_fields(company),
                None,
            )
            .await?;
        Ok(())
    }

    /// Delete a company document.
    pub async fn delete(&self, id: &CompanyId) -> FirestoreResult<()> {
        self.client.delete_document(COLLECTION, id.as_str()).await
    }

    /// Set the admin verification flag.
    pub async fn set_verified(&self, id: &CompanyId, verified: bool) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("verified".to_string(), verified.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                COLLECTION,
                id.as_str(),
                fields,
                Some(vec!["verified".to_string(), "updated_at".to_string()]),
            )
            .await?;
        Ok(())
    }

    /// Adjust the advisory jobs counter.
    ///
    /// Read-modify-write without a transaction: the count is advisory and
    /// callers invoke this fire-and-forget.
    pub async fn adjust_jobs_count(&self, id: &CompanyId, delta: i64) -> FirestoreResult<()> {
        let doc = self.client.get_document(COLLECTION, id.as_str()).await?;
        let current = doc
            .as_ref()
            .and_then(|d| d.fields.as_ref())
            .and_then(|f| read::<i64>(f, "jobs_count"))
            .unwrap_or(0);

        let next = (current + delta).max(0);

        let mut fields = HashMap::new();
        fields.insert("jobs_count".to_string(), next.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                COLLECTION,
                id.as_str(),
                fields,
                Some(vec!["jobs_count".to_string(), "updated_at".to_string()]),
            )
            .await?;
        debug!("Adjusted jobs_count for {} by {} -> {}", id, delta, next);
        Ok(())
    }

    /// Public listing with filters, whitelisted sort and page totals. A
    /// name search (`q`) ranges over `name_lc` and leads the ordering.
    pub async fn list(
        &self,
        params: &CompanyListQuery,
    ) -> FirestoreResult<(Vec<Company>, PageMeta)> {
        let page = normalize_page(params.page);
        let limit = normalize_limit(params.limit, max_page_limit());
        let sort = SortSpec::parse(params.sort.as_deref(), COMPANY_SORTS);

        let base = filtered(params);
        let total = self.client.count(base.clone().build_for_count()).await?;
        let meta = PageMeta::new(total, page, limit);

        let query = base.sort(sort).page(meta.offset(), limit).build();
        let docs = self.client.run_query(query).await?;

        let companies = docs
            .iter()
            .map(document_to_company)
            .collect::<FirestoreResult<Vec<_>>>()?;

        Ok((companies, meta))
    }
}

fn filtered(params: &CompanyListQuery) -> QueryBuilder {
    let mut builder = QueryBuilder::new(COLLECTION);

    if let Some(owner) = &params.owner {
        builder = builder.filter_eq("owner", Value::StringValue(owner.clone()));
    }
    if let Some(industry) = &params.industry {
        builder = builder.filter_eq("industry", Value::StringValue(industry.clone()));
    }
    if let Some(verified) = params.verified {
        builder = builder.filter_eq("verified", Value::BooleanValue(verified));
    }
    if let Some(city) = &params.city {
        builder = builder.filter_eq("location.city", Value::StringValue(city.clone()));
    }
    if let Some(state) = &params.state {
        builder = builder.filter_eq("location.state", Value::StringValue(state.clone()));
    }
    if let Some(country) = &params.country {
        builder = builder.filter_eq("location.country", Value::StringValue(country.clone()));
    }
    if let Some(q) = params.q.as_deref().filter(|q| !q.is_empty()) {
        builder = builder.filter_prefix("name_lc", q);
    }

    builder
}

// =============================================================================
// Conversion
// =============================================================================

fn location_to_value(location: &CompanyLocation) -> Value {
    let mut fields = HashMap::new();
    fields.insert("city".to_string(), location.city.to_firestore_value());
    fields.insert("state".to_string(), location.state.to_firestore_value());
    fields.insert("country".to_string(), location.country.to_firestore_value());
    Value::MapValue(MapValue {
        fields: Some(fields),
    })
}

fn location_from_fields(fields: &HashMap<String, Value>) -> CompanyLocation {
    match read_map(fields, "location") {
        Some(map) => CompanyLocation {
            city: read(map, "city"),
            state: read(map, "state"),
            country: read(map, "country"),
        },
        None => CompanyLocation::default(),
    }
}

pub(crate) fn company_to_fields(company: &Company) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("name".to_string(), company.name.to_firestore_value());
    fields.insert("name_lc".to_string(), company.name_lc().to_firestore_value());
    fields.insert("slug".to_string(), company.slug.to_firestore_value());
    fields.insert(
        "description".to_string(),
        company.description.to_firestore_value(),
    );
    fields.insert("website".to_string(), company.website.to_firestore_value());
    fields.insert("industry".to_string(), company.industry.to_firestore_value());
    fields.insert("logo_url".to_string(), company.logo_url.to_firestore_value());
    fields.insert("logo_key".to_string(), company.logo_key.to_firestore_value());
    fields.insert("location".to_string(), location_to_value(&company.location));
    fields.insert("owner".to_string(), company.owner.as_str().to_firestore_value());
    fields.insert("verified".to_string(), company.verified.to_firestore_value());
    fields.insert("jobs_count".to_string(), company.jobs_count.to_firestore_value());
    fields.insert("created_at".to_string(), company.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), company.updated_at.to_firestore_value());
    fields
}

pub(crate) fn document_to_company(doc: &Document) -> FirestoreResult<Company> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_response("company document has no fields"))?;
    let id = doc
        .doc_id()
        .ok_or_else(|| FirestoreError::invalid_response("company document has no name"))?;

    Ok(Company {
        id: CompanyId::from_string(id),
        name: read(fields, "name").unwrap_or_default(),
        slug: read(fields, "slug").unwrap_or_default(),
        description: read(fields, "description"),
        website: read(fields, "website"),
        industry: read(fields, "industry"),
        logo_url: read(fields, "logo_url"),
        logo_key: read(fields, "logo_key"),
        location: location_from_fields(fields),
        owner: read::<String>(fields, "owner").unwrap_or_default().into(),
        verified: read(fields, "verified").unwrap_or(false),
        jobs_count: read(fields, "jobs_count").unwrap_or(0),
        created_at: read(fields, "created_at").unwrap_or_else(Utc::now),
        updated_at: read(fields, "updated_at").unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jhive_models::UserId;

    #[test]
    fn name_search_leads_the_ordering() {
        let params = CompanyListQuery {
            q: Some("acme".to_string()),
            verified: Some(true),
            ..CompanyListQuery::default()
        };

        let query = filtered(&params).sort(SortSpec::newest_first()).build();
        let orders = query.order_by.unwrap();

        assert_eq!(orders[0].field.field_path, "name_lc");
        assert_eq!(orders[1].field.field_path, "created_at");
    }

    #[test]
    fn company_round_trip_through_fields() {
        let mut company = Company::new("Acme Corp", "acme-corp", UserId::from_string("u1"));
        company.industry = Some("software".to_string());
        company.verified = true;
        company.jobs_count = 3;
        company.location.country = Some("IN".to_string());

        let doc = Document {
            name: Some(format!(
                "projects/p/databases/(default)/documents/companies/{}",
                company.id
            )),
            fields: Some(company_to_fields(&company)),
            create_time: None,
            update_time: None,
        };

        let parsed = document_to_company(&doc).unwrap();
        assert_eq!(parsed.id, company.id);
        assert_eq!(parsed.name, "Acme Corp");
        assert_eq!(parsed.slug, "acme-corp");
        assert_eq!(parsed.owner.as_str(), "u1");
        assert!(parsed.verified);
        assert_eq!(parsed.jobs_count, 3);
        assert_eq!(parsed.location.country.as_deref(), Some("IN"));
    }
}
