//! Typed repository for job postings.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use jhive_models::{
    normalize_limit, normalize_page, ExperienceLevel, Job, JobId, JobLocation, JobStatus, JobType,
    PageMeta, Salary, UserId,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::query::{QueryBuilder, SortSpec};
use crate::slug::generate_unique_slug;
use crate::types::{
    read, read_map, read_string_array, Document, MapValue, ToFirestoreValue, Value,
};
use crate::users_repo::max_page_limit;

const COLLECTION: &str = "jobs";

/// Whitelisted sort keys for job listings.
pub const JOB_SORTS: &[(&str, &'static str)] = &[
    ("createdAt", "created_at"),
    ("title", "title_lc"),
    ("salary.min", "salary.min"),
];

/// Filters for job listings.
///
/// `status: None` with `default_open: true` applies the public-listing rule
/// that only open jobs show unless a status is explicitly requested.
#[derive(Debug, Clone, Default)]
pub struct JobListQuery {
    /// Sanitized, lowercased search term (title prefix).
    pub q: Option<String>,
    pub company: Option<String>,
    pub created_by: Option<String>,
    pub job_type: Option<JobType>,
    pub experience_level: Option<ExperienceLevel>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub remote: Option<bool>,
    pub status: Option<JobStatus>,
    pub default_open: bool,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Repository for job documents.
pub struct JobsRepository {
    client: FirestoreClient,
}

impl JobsRepository {
    /// Create a new jobs repository.
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Get a job by ID.
    pub async fn get(&self, id: &JobId) -> FirestoreResult<Option<Job>> {
        let doc = self.client.get_document(COLLECTION, id.as_str()).await?;
        doc.map(|d| document_to_job(&d)).transpose()
    }

    /// Get a job by slug.
    pub async fn get_by_slug(&self, slug: &str) -> FirestoreResult<Option<Job>> {
        let query = QueryBuilder::new(COLLECTION)
            .filter_eq("slug", Value::StringValue(slug.to_string()))
            .page(0, 1)
            .build();

        let docs = self.client.run_query(query).await?;
        docs.first().map(document_to_job).transpose()
    }

    /// Derive a slug unique among jobs.
    pub async fn unique_slug(&self, title: &str) -> FirestoreResult<String> {
        generate_unique_slug(&self.client, COLLECTION, title).await
    }

    /// Create a job record.
    pub async fn create(&self, job: &Job) -> FirestoreResult<()> {
        self.client
            .create_document(COLLECTION, job.id.as_str(), job_to_fields(job))
            .await?;
        info!("Created job {} ({})", job.id, job.slug);
        Ok(())
    }

    /// Replace a job document with the given state.
    pub async fn update(&self, job: &Job) -> FirestoreResult<()> {
        self.client
            .update_document(COLLECTION, job.id.as_str(), job_to_fields(job), None)
            .await?;
        Ok(())
    }

    /// Delete a job document.
    pub async fn delete(&self, id: &JobId) -> FirestoreResult<()> {
        self.client.delete_document(COLLECTION, id.as_str()).await
    }

    /// Update just the lifecycle status.
    pub async fn update_status(&self, id: &JobId, status: JobStatus) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), status.as_str().to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                COLLECTION,
                id.as_str(),
                fields,
                Some(vec!["status".to_string(), "updated_at".to_string()]),
            )
            .await?;
        Ok(())
    }

    /// Adjust the advisory application counter.
    ///
    /// Read-modify-write without a transaction: the count is advisory and
    /// callers invoke this fire-and-forget.
    pub async fn adjust_application_count(&self, id: &JobId, delta: i64) -> FirestoreResult<()> {
        let doc = self.client.get_document(COLLECTION, id.as_str()).await?;
        let current = doc
            .as_ref()
            .and_then(|d| d.fields.as_ref())
            .and_then(|f| read::<i64>(f, "application_count"))
            .unwrap_or(0);

        let next = (current + delta).max(0);

        let mut fields = HashMap::new();
        fields.insert("application_count".to_string(), next.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                COLLECTION,
                id.as_str(),
                fields,
                Some(vec![
                    "application_count".to_string(),
                    "updated_at".to_string(),
                ]),
            )
            .await?;
        debug!("Adjusted application_count for {} by {} -> {}", id, delta, next);
        Ok(())
    }

    /// Listing with filters, whitelisted sort and page totals. Range
    /// filters (`q` title prefix, salary bounds) take over the leading
    /// sort position; the requested sort applies within them.
    pub async fn list(&self, params: &JobListQuery) -> FirestoreResult<(Vec<Job>, PageMeta)> {
        let page = normalize_page(params.page);
        let limit = normalize_limit(params.limit, max_page_limit());
        let sort = SortSpec::parse(params.sort.as_deref(), JOB_SORTS);

        let base = filtered(params);
        let total = self.client.count(base.clone().build_for_count()).await?;
        let meta = PageMeta::new(total, page, limit);

        let query = base.sort(sort).page(meta.offset(), limit).build();
        let docs = self.client.run_query(query).await?;

        let jobs = docs
            .iter()
            .map(document_to_job)
            .collect::<FirestoreResult<Vec<_>>>()?;

        Ok((jobs, meta))
    }
}

/// Translate list filters into a query. Public listings pass
/// `default_open: true`, restricting the result to open jobs unless the
/// caller asked for a status explicitly.
fn filtered(params: &JobListQuery) -> QueryBuilder {
    let mut builder = QueryBuilder::new(COLLECTION);

    match (params.status, params.default_open) {
        (Some(status), _) => {
            builder =
                builder.filter_eq("status", Value::StringValue(status.as_str().to_string()));
        }
        (None, true) => {
            builder = builder.filter_eq(
                "status",
                Value::StringValue(JobStatus::Open.as_str().to_string()),
            );
        }
        (None, false) => {}
    }

    if let Some(company) = &params.company {
        builder = builder.filter_eq("company", Value::StringValue(company.clone()));
    }
    if let Some(created_by) = &params.created_by {
        builder = builder.filter_eq("created_by", Value::StringValue(created_by.clone()));
    }
    if let Some(job_type) = params.job_type {
        builder =
            builder.filter_eq("job_type", Value::StringValue(job_type.as_str().to_string()));
    }
    if let Some(level) = params.experience_level {
        builder = builder.filter_eq(
            "experience_level",
            Value::StringValue(level.as_str().to_string()),
        );
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
    if let Some(remote) = params.remote {
        builder = builder.filter_eq("location.remote", Value::BooleanValue(remote));
    }
    if let Some(min) = params.min_salary {
        builder = builder.filter_op(
            "salary.min",
            "GREATER_THAN_OR_EQUAL",
            min.to_firestore_value(),
        );
    }
    if let Some(max) = params.max_salary {
        builder = builder.filter_op(
            "salary.max",
            "LESS_THAN_OR_EQUAL",
            max.to_firestore_value(),
        );
    }
    if let Some(q) = params.q.as_deref().filter(|q| !q.is_empty()) {
        builder = builder.filter_prefix("title_lc", q);
    }

    builder
}

// =============================================================================
// Conversion
// =============================================================================

fn salary_to_value(salary: &Salary) -> Value {
    let mut fields = HashMap::new();
    fields.insert("min".to_string(), salary.min.to_firestore_value());
    fields.insert("max".to_string(), salary.max.to_firestore_value());
    fields.insert("currency".to_string(), salary.currency.to_firestore_value());
    Value::MapValue(MapValue {
        fields: Some(fields),
    })
}

fn salary_from_fields(fields: &HashMap<String, Value>) -> Salary {
    match read_map(fields, "salary") {
        Some(map) => Salary {
            min: read(map, "min"),
            max: read(map, "max"),
            currency: read(map, "currency").unwrap_or_else(|| "INR".to_string()),
        },
        None => Salary::default(),
    }
}

fn location_to_value(location: &JobLocation) -> Value {
    let mut fields = HashMap::new();
    fields.insert("city".to_string(), location.city.to_firestore_value());
    fields.insert("state".to_string(), location.state.to_firestore_value());
    fields.insert("country".to_string(), location.country.to_firestore_value());
    fields.insert("remote".to_string(), location.remote.to_firestore_value());
    Value::MapValue(MapValue {
        fields: Some(fields),
    })
}

fn location_from_fields(fields: &HashMap<String, Value>) -> JobLocation {
    match read_map(fields, "location") {
        Some(map) => JobLocation {
            city: read(map, "city"),
            state: read(map, "state"),
            country: read(map, "country"),
            remote: read(map, "remote").unwrap_or(false),
        },
        None => JobLocation::default(),
    }
}

pub(crate) fn job_to_fields(job: &Job) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("title".to_string(), job.title.to_firestore_value());
    fields.insert("title_lc".to_string(), job.title_lc().to_firestore_value());
    fields.insert("slug".to_string(), job.slug.to_firestore_value());
    fields.insert("description".to_string(), job.description.to_firestore_value());
    fields.insert("requirements".to_string(), job.requirements.to_firestore_value());
    fields.insert(
        "responsibilities".to_string(),
        job.responsibilities.to_firestore_value(),
    );
    fields.insert("skills".to_string(), job.skills.to_firestore_value());
    fields.insert("salary".to_string(), salary_to_value(&job.salary));
    fields.insert("job_type".to_string(), job.job_type.as_str().to_firestore_value());
    fields.insert(
        "experience_level".to_string(),
        job.experience_level.as_str().to_firestore_value(),
    );
    fields.insert("location".to_string(), location_to_value(&job.location));
    fields.insert("status".to_string(), job.status.as_str().to_firestore_value());
    fields.insert("company".to_string(), job.company.as_str().to_firestore_value());
    fields.insert("created_by".to_string(), job.created_by.as_str().to_firestore_value());
    fields.insert(
        "application_count".to_string(),
        job.application_count.to_firestore_value(),
    );
    fields.insert("expires_at".to_string(), job.expires_at.to_firestore_value());
    fields.insert("created_at".to_string(), job.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), job.updated_at.to_firestore_value());
    fields
}

pub(crate) fn document_to_job(doc: &Document) -> FirestoreResult<Job> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_response("job document has no fields"))?;
    let id = doc
        .doc_id()
        .ok_or_else(|| FirestoreError::invalid_response("job document has no name"))?;

    Ok(Job {
        id: JobId::from_string(id),
        title: read(fields, "title").unwrap_or_default(),
        slug: read(fields, "slug").unwrap_or_default(),
        description: read(fields, "description").unwrap_or_default(),
        requirements: read_string_array(fields, "requirements"),
        responsibilities: read_string_array(fields, "responsibilities"),
        skills: read_string_array(fields, "skills"),
        salary: salary_from_fields(fields),
        job_type: read::<String>(fields, "job_type")
            .and_then(|s| JobType::parse(&s))
            .unwrap_or_default(),
        experience_level: read::<String>(fields, "experience_level")
            .and_then(|s| ExperienceLevel::parse(&s))
            .unwrap_or_default(),
        location: location_from_fields(fields),
        status: read::<String>(fields, "status")
            .and_then(|s| JobStatus::parse(&s))
            .unwrap_or_default(),
        company: read::<String>(fields, "company").unwrap_or_default().into(),
        created_by: UserId::from_string(read::<String>(fields, "created_by").unwrap_or_default()),
        application_count: read(fields, "application_count").unwrap_or(0),
        expires_at: read(fields, "expires_at"),
        created_at: read(fields, "created_at").unwrap_or_else(Utc::now),
        updated_at: read(fields, "updated_at").unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Filter;
    use jhive_models::CompanyId;

    /// Collect (field, value) pairs from the EQUAL filters of a built query.
    fn equality_filters(filter: Option<Filter>) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut stack: Vec<Filter> = filter.into_iter().collect();
        while let Some(f) = stack.pop() {
            match f {
                Filter::FieldFilter(ff) if ff.op == "EQUAL" => {
                    if let Value::StringValue(s) = ff.value {
                        pairs.push((ff.field.field_path, s));
                    }
                }
                Filter::FieldFilter(_) => {}
                Filter::CompositeFilter(c) => stack.extend(c.filters),
            }
        }
        pairs
    }

    #[test]
    fn public_listing_defaults_to_open_jobs() {
        let params = JobListQuery {
            default_open: true,
            ..JobListQuery::default()
        };
        let query = filtered(&params).build();
        assert!(equality_filters(query.filter)
            .contains(&("status".to_string(), "open".to_string())));
    }

    #[test]
    fn explicit_status_overrides_the_default() {
        let params = JobListQuery {
            status: Some(JobStatus::Closed),
            default_open: true,
            ..JobListQuery::default()
        };
        let query = filtered(&params).build();
        let filters = equality_filters(query.filter);
        assert!(filters.contains(&("status".to_string(), "closed".to_string())));
        assert!(!filters.contains(&("status".to_string(), "open".to_string())));
    }

    #[test]
    fn search_and_salary_filters_produce_a_legal_ordering() {
        // The store requires range-filtered fields to lead the sort; the
        // public search + salary shape must build that ordering itself
        let params = JobListQuery {
            q: Some("backend".to_string()),
            min_salary: Some(500_000),
            max_salary: Some(900_000),
            default_open: true,
            ..JobListQuery::default()
        };

        let query = filtered(&params).sort(SortSpec::newest_first()).build();
        let fields: Vec<String> = query
            .order_by
            .unwrap()
            .into_iter()
            .map(|o| o.field.field_path)
            .collect();

        let created_pos = fields.iter().position(|f| f == "created_at").unwrap();
        for ranged in ["salary.min", "salary.max", "title_lc"] {
            let pos = fields.iter().position(|f| f == ranged).unwrap();
            assert!(pos < created_pos, "{} must precede created_at", ranged);
        }
    }

    #[test]
    fn owner_scoped_listing_has_no_status_default() {
        let params = JobListQuery {
            created_by: Some("u1".to_string()),
            ..JobListQuery::default()
        };
        let query = filtered(&params).build();
        let filters = equality_filters(query.filter);
        assert!(!filters.iter().any(|(field, _)| field == "status"));
        assert!(filters.contains(&("created_by".to_string(), "u1".to_string())));
    }

    #[test]
    fn job_round_trip_through_fields() {
        let mut job = Job::new(
            "Backend Engineer",
            "backend-engineer",
            "Build services",
            CompanyId::from_string("c1"),
            UserId::from_string("u1"),
        );
        job.salary = Salary {
            min: Some(900_000),
            max: Some(1_800_000),
            currency: "INR".to_string(),
        };
        job.location.remote = true;
        job.skills = vec!["rust".to_string()];
        job.job_type = JobType::Contract;
        job.experience_level = ExperienceLevel::Senior;

        let doc = Document {
            name: Some(format!(
                "projects/p/databases/(default)/documents/jobs/{}",
                job.id
            )),
            fields: Some(job_to_fields(&job)),
            create_time: None,
            update_time: None,
        };

        let parsed = document_to_job(&doc).unwrap();
        assert_eq!(parsed.title, "Backend Engineer");
        assert_eq!(parsed.salary.min, Some(900_000));
        assert_eq!(parsed.salary.max, Some(1_800_000));
        assert!(parsed.location.remote);
        assert_eq!(parsed.job_type, JobType::Contract);
        assert_eq!(parsed.experience_level, ExperienceLevel::Senior);
        assert_eq!(parsed.status, JobStatus::Open);
        assert_eq!(parsed.company.as_str(), "c1");
        assert_eq!(parsed.created_by.as_str(), "u1");
    }
}
