//! Typed repository for job applications.
//!
//! Application documents use the deterministic ID `{job_id}--{applicant_id}`,
//! so one-application-per-job-per-applicant is enforced by the store: a
//! duplicate create fails with ALREADY_EXISTS. The `exists_for` pre-check is
//! a best-effort optimization only and is racy by design.

use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use jhive_models::{
    normalize_limit, normalize_page, Application, ApplicationId, ApplicationStatus, ExperienceLevel,
    JobId, JobLocation, JobType, PageMeta, SalarySnapshot, UserId,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::query::{QueryBuilder, SortSpec};
use crate::types::{read, read_map, Document, MapValue, ToFirestoreValue, Value};
use crate::users_repo::max_page_limit;

const COLLECTION: &str = "applications";

/// Whitelisted sort keys for per-job application listings.
pub const APPLICATION_SORTS: &[(&str, &'static str)] =
    &[("createdAt", "created_at"), ("status", "status")];

/// Filters for an applicant's own application listing.
#[derive(Debug, Clone, Default)]
pub struct MyApplicationsQuery {
    pub applicant: String,
    pub status: Option<ApplicationStatus>,
    pub company: Option<String>,
    /// Sanitized, lowercased search term (snapshotted job title prefix).
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Filters for an employer's per-job application listing.
#[derive(Debug, Clone, Default)]
pub struct JobApplicationsQuery {
    pub job: String,
    pub status: Option<ApplicationStatus>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Repository for application documents.
pub struct ApplicationsRepository {
    client: FirestoreClient,
}

impl ApplicationsRepository {
    /// Create a new applications repository.
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Get an application by ID.
    pub async fn get(&self, id: &ApplicationId) -> FirestoreResult<Option<Application>> {
        let doc = self.client.get_document(COLLECTION, id.as_str()).await?;
        doc.map(|d| document_to_application(&d)).transpose()
    }

    /// Best-effort pre-check for an existing (job, applicant) application.
    pub async fn exists_for(&self, job: &JobId, applicant: &UserId) -> FirestoreResult<bool> {
        let id = ApplicationId::for_pair(job, applicant);
        Ok(self
            .client
            .get_document(COLLECTION, id.as_str())
            .await?
            .is_some())
    }

    /// Create an application. `AlreadyExists` means a duplicate submission.
    pub async fn create(&self, application: &Application) -> FirestoreResult<()> {
        self.client
            .create_document(
                COLLECTION,
                application.id.as_str(),
                application_to_fields(application),
            )
            .await?;
        info!(
            "Created application {} (job={}, applicant={})",
            application.id, application.job, application.applicant
        );
        Ok(())
    }

    /// Replace an application document with the given state.
    pub async fn update(&self, application: &Application) -> FirestoreResult<()> {
        self.client
            .update_document(
                COLLECTION,
                application.id.as_str(),
                application_to_fields(application),
                None,
            )
            .await?;
        Ok(())
    }

    /// Mark an application as viewed by the employer.
    pub async fn set_viewed(&self, id: &ApplicationId) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("viewed".to_string(), true.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                COLLECTION,
                id.as_str(),
                fields,
                Some(vec!["viewed".to_string(), "updated_at".to_string()]),
            )
            .await?;
        Ok(())
    }

    /// Delete an application document.
    pub async fn delete(&self, id: &ApplicationId) -> FirestoreResult<()> {
        self.client.delete_document(COLLECTION, id.as_str()).await
    }

    /// An applicant's applications, newest first. A title search (`q`)
    /// ranges over `job_title_snapshot_lc`, which then has to lead the
    /// ordering; within equal titles results stay newest-first.
    pub async fn list_for_applicant(
        &self,
        params: &MyApplicationsQuery,
    ) -> FirestoreResult<(Vec<Application>, PageMeta)> {
        let page = normalize_page(params.page);
        let limit = normalize_limit(params.limit, max_page_limit());

        let base = applicant_filtered(params);
        let total = self.client.count(base.clone().build_for_count()).await?;
        let meta = PageMeta::new(total, page, limit);

        let query = base
            .sort(SortSpec::newest_first())
            .page(meta.offset(), limit)
            .build();
        let docs = self.client.run_query(query).await?;

        let applications = docs
            .iter()
            .map(document_to_application)
            .collect::<FirestoreResult<Vec<_>>>()?;

        Ok((applications, meta))
    }

    /// Applications for one job, with a whitelisted sort.
    pub async fn list_for_job(
        &self,
        params: &JobApplicationsQuery,
    ) -> FirestoreResult<(Vec<Application>, PageMeta)> {
        let page = normalize_page(params.page);
        let limit = normalize_limit(params.limit, max_page_limit());
        let sort = SortSpec::parse(params.sort.as_deref(), APPLICATION_SORTS);

        let base = job_filtered(params);
        let total = self.client.count(base.clone().build_for_count()).await?;
        let meta = PageMeta::new(total, page, limit);

        let query = base.sort(sort).page(meta.offset(), limit).build();
        let docs = self.client.run_query(query).await?;

        let applications = docs
            .iter()
            .map(document_to_application)
            .collect::<FirestoreResult<Vec<_>>>()?;

        Ok((applications, meta))
    }

    /// Per-status counts for one job.
    pub async fn status_counts_for_job(
        &self,
        job: &JobId,
    ) -> FirestoreResult<HashMap<ApplicationStatus, u64>> {
        self.status_counts("job", job.as_str()).await
    }

    /// Per-status counts for one applicant.
    pub async fn status_counts_for_applicant(
        &self,
        applicant: &UserId,
    ) -> FirestoreResult<HashMap<ApplicationStatus, u64>> {
        self.status_counts("applicant", applicant.as_str()).await
    }

    async fn status_counts(
        &self,
        field: &str,
        value: &str,
    ) -> FirestoreResult<HashMap<ApplicationStatus, u64>> {
        let mut counts = HashMap::new();

        for status in ApplicationStatus::ALL {
            let query = QueryBuilder::new(COLLECTION)
                .filter_eq(field, Value::StringValue(value.to_string()))
                .filter_eq("status", Value::StringValue(status.as_str().to_string()))
                .build_for_count();

            counts.insert(status, self.client.count(query).await?);
        }

        Ok(counts)
    }
}

fn applicant_filtered(params: &MyApplicationsQuery) -> QueryBuilder {
    let mut builder = QueryBuilder::new(COLLECTION)
        .filter_eq("applicant", Value::StringValue(params.applicant.clone()));

    if let Some(status) = params.status {
        builder = builder.filter_eq("status", Value::StringValue(status.as_str().to_string()));
    }
    if let Some(company) = &params.company {
        builder = builder.filter_eq("company", Value::StringValue(company.clone()));
    }
    if let Some(q) = params.q.as_deref().filter(|q| !q.is_empty()) {
        builder = builder.filter_prefix("job_title_snapshot_lc", q);
    }

    builder
}

fn job_filtered(params: &JobApplicationsQuery) -> QueryBuilder {
    let mut builder =
        QueryBuilder::new(COLLECTION).filter_eq("job", Value::StringValue(params.job.clone()));

    if let Some(status) = params.status {
        builder = builder.filter_eq("status", Value::StringValue(status.as_str().to_string()));
    }

    builder
}

// =============================================================================
// Conversion
// =============================================================================

fn location_snapshot_to_value(location: &JobLocation) -> Value {
    let mut fields = HashMap::new();
    fields.insert("city".to_string(), location.city.to_firestore_value());
    fields.insert("state".to_string(), location.state.to_firestore_value());
    fields.insert("country".to_string(), location.country.to_firestore_value());
    fields.insert("remote".to_string(), location.remote.to_firestore_value());
    Value::MapValue(MapValue {
        fields: Some(fields),
    })
}

fn salary_snapshot_to_value(salary: &SalarySnapshot) -> Value {
    let mut fields = HashMap::new();
    fields.insert("min".to_string(), salary.min.to_firestore_value());
    fields.insert("max".to_string(), salary.max.to_firestore_value());
    fields.insert("currency".to_string(), salary.currency.to_firestore_value());
    Value::MapValue(MapValue {
        fields: Some(fields),
    })
}

pub(crate) fn application_to_fields(app: &Application) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("job".to_string(), app.job.as_str().to_firestore_value());
    fields.insert("company".to_string(), app.company.as_str().to_firestore_value());
    fields.insert("applicant".to_string(), app.applicant.as_str().to_firestore_value());
    fields.insert("resume_url".to_string(), app.resume_url.to_firestore_value());
    fields.insert("resume_key".to_string(), app.resume_key.to_firestore_value());
    fields.insert("cover_letter".to_string(), app.cover_letter.to_firestore_value());
    fields.insert("status".to_string(), app.status.as_str().to_firestore_value());
    fields.insert("viewed".to_string(), app.viewed.to_firestore_value());
    fields.insert(
        "rejected_reason".to_string(),
        app.rejected_reason.to_firestore_value(),
    );
    fields.insert(
        "interview_date".to_string(),
        app.interview_date.to_firestore_value(),
    );
    fields.insert(
        "job_title_snapshot".to_string(),
        app.job_title_snapshot.to_firestore_value(),
    );
    fields.insert(
        "job_title_snapshot_lc".to_string(),
        app.job_title_snapshot
            .as_ref()
            .map(|t| t.to_lowercase())
            .to_firestore_value(),
    );
    fields.insert(
        "company_name_snapshot".to_string(),
        app.company_name_snapshot.to_firestore_value(),
    );
    if let Some(location) = &app.job_location_snapshot {
        fields.insert(
            "job_location_snapshot".to_string(),
            location_snapshot_to_value(location),
        );
    }
    fields.insert(
        "job_type_snapshot".to_string(),
        app.job_type_snapshot
            .map(|t| t.as_str().to_string())
            .to_firestore_value(),
    );
    fields.insert(
        "experience_level_snapshot".to_string(),
        app.experience_level_snapshot
            .map(|l| l.as_str().to_string())
            .to_firestore_value(),
    );
    if let Some(salary) = &app.job_salary_snapshot {
        fields.insert(
            "job_salary_snapshot".to_string(),
            salary_snapshot_to_value(salary),
        );
    }
    fields.insert("created_at".to_string(), app.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), app.updated_at.to_firestore_value());
    fields
}

pub(crate) fn document_to_application(doc: &Document) -> FirestoreResult<Application> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_response("application document has no fields"))?;
    let id = doc
        .doc_id()
        .ok_or_else(|| FirestoreError::invalid_response("application document has no name"))?;

    let job_location_snapshot = read_map(fields, "job_location_snapshot").map(|map| JobLocation {
        city: read(map, "city"),
        state: read(map, "state"),
        country: read(map, "country"),
        remote: read(map, "remote").unwrap_or(false),
    });

    let job_salary_snapshot = read_map(fields, "job_salary_snapshot").map(|map| SalarySnapshot {
        min: read(map, "min"),
        max: read(map, "max"),
        currency: read(map, "currency").unwrap_or_default(),
    });

    Ok(Application {
        id: ApplicationId::from_string(id),
        job: JobId::from_string(read::<String>(fields, "job").unwrap_or_default()),
        company: read::<String>(fields, "company").unwrap_or_default().into(),
        applicant: UserId::from_string(read::<String>(fields, "applicant").unwrap_or_default()),
        resume_url: read(fields, "resume_url"),
        resume_key: read(fields, "resume_key"),
        cover_letter: read(fields, "cover_letter"),
        status: read::<String>(fields, "status")
            .and_then(|s| ApplicationStatus::parse(&s))
            .unwrap_or_default(),
        viewed: read(fields, "viewed").unwrap_or(false),
        rejected_reason: read(fields, "rejected_reason"),
        interview_date: read(fields, "interview_date"),
        job_title_snapshot: read(fields, "job_title_snapshot"),
        company_name_snapshot: read(fields, "company_name_snapshot"),
        job_location_snapshot,
        job_type_snapshot: read::<String>(fields, "job_type_snapshot")
            .and_then(|s| JobType::parse(&s)),
        experience_level_snapshot: read::<String>(fields, "experience_level_snapshot")
            .and_then(|s| ExperienceLevel::parse(&s)),
        job_salary_snapshot,
        created_at: read(fields, "created_at").unwrap_or_else(Utc::now),
        updated_at: read(fields, "updated_at").unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jhive_models::CompanyId;

    #[test]
    fn title_search_leads_the_ordering() {
        // GET /applications/my?q=... has no sort parameter, so the built
        // query itself must put the ranged snapshot field first
        let params = MyApplicationsQuery {
            applicant: "u1".to_string(),
            q: Some("backend".to_string()),
            ..MyApplicationsQuery::default()
        };

        let query = applicant_filtered(&params)
            .sort(SortSpec::newest_first())
            .build();
        let orders = query.order_by.unwrap();

        assert_eq!(orders[0].field.field_path, "job_title_snapshot_lc");
        assert_eq!(orders[1].field.field_path, "created_at");
    }

    #[test]
    fn plain_listing_stays_newest_first() {
        let params = MyApplicationsQuery {
            applicant: "u1".to_string(),
            ..MyApplicationsQuery::default()
        };

        let query = applicant_filtered(&params)
            .sort(SortSpec::newest_first())
            .build();
        assert_eq!(query.order_by.unwrap()[0].field.field_path, "created_at");
    }

    #[test]
    fn application_round_trip_through_fields() {
        let mut app = Application::new(
            JobId::from_string("j1"),
            CompanyId::from_string("c1"),
            UserId::from_string("u1"),
        );
        app.cover_letter = Some("I would be a great fit".to_string());
        app.job_title_snapshot = Some("Backend Engineer".to_string());
        app.company_name_snapshot = Some("Acme".to_string());
        app.job_type_snapshot = Some(JobType::FullTime);
        app.experience_level_snapshot = Some(ExperienceLevel::Mid);
        app.job_location_snapshot = Some(JobLocation {
            city: Some("Pune".to_string()),
            state: None,
            country: Some("IN".to_string()),
            remote: true,
        });
        app.job_salary_snapshot = Some(SalarySnapshot {
            min: Some(500_000),
            max: Some(900_000),
            currency: "INR".to_string(),
        });

        let doc = Document {
            name: Some(format!(
                "projects/p/databases/(default)/documents/applications/{}",
                app.id
            )),
            fields: Some(application_to_fields(&app)),
            create_time: None,
            update_time: None,
        };

        let parsed = document_to_application(&doc).unwrap();
        assert_eq!(parsed.id.as_str(), "j1--u1");
        assert_eq!(parsed.status, ApplicationStatus::Applied);
        assert!(!parsed.viewed);
        assert_eq!(parsed.job_title_snapshot.as_deref(), Some("Backend Engineer"));
        assert_eq!(parsed.job_type_snapshot, Some(JobType::FullTime));
        assert_eq!(
            parsed.job_location_snapshot.as_ref().unwrap().city.as_deref(),
            Some("Pune")
        );
        assert_eq!(parsed.job_salary_snapshot.as_ref().unwrap().min, Some(500_000));
    }

    #[test]
    fn snapshot_title_shadow_field_is_lowercased() {
        let mut app = Application::new(
            JobId::from_string("j1"),
            CompanyId::from_string("c1"),
            UserId::from_string("u1"),
        );
        app.job_title_snapshot = Some("Senior RUST Engineer".to_string());

        let fields = application_to_fields(&app);
        match fields.get("job_title_snapshot_lc") {
            Some(Value::StringValue(s)) => assert_eq!(s, "senior rust engineer"),
            other => panic!("unexpected shadow field: {:?}", other),
        }
    }
}
