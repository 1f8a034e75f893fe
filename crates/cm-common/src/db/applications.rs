//! Read-only access to applications and their candidate/job records. The
//! scoring engine never writes to these tables.

use deadpool_postgres::PoolError;
use tokio_postgres::{Error as PgError, Row};
use tracing::instrument;

use crate::db::PgPool;
use crate::{Application, Candidate, Job};

#[derive(Debug, thiserror::Error)]
pub enum ApplicationFetchError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
}

/// One application joined with the records scoring needs.
#[derive(Debug, Clone)]
pub struct ApplicationBundle {
    pub application: Application,
    pub candidate: Candidate,
    pub job: Job,
}

fn row_to_bundle(row: &Row) -> Result<ApplicationBundle, ApplicationFetchError> {
    let application = Application {
        id: row.try_get("application_id")?,
        organization_id: row.try_get("organization_id")?,
        candidate_id: row.try_get("candidate_id")?,
        job_id: row.try_get("job_id")?,
    };

    let candidate = Candidate {
        id: Some(application.candidate_id),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        current_company: row.try_get("current_company")?,
        current_title: row.try_get("current_title")?,
        location: row.try_get("candidate_location")?,
        resume_url: row.try_get("resume_url")?,
        resume_parsed_data: row.try_get("resume_parsed_data")?,
        tags: row
            .try_get::<_, Option<Vec<String>>>("tags")?
            .unwrap_or_default(),
        notes: row.try_get("notes")?,
    };

    let job = Job {
        id: Some(application.job_id),
        title: row.try_get("title")?,
        department: row.try_get("department")?,
        location: row.try_get("job_location")?,
        employment_type: row.try_get("employment_type")?,
        description: row.try_get("description")?,
        requirements: row.try_get("requirements")?,
    };

    Ok(ApplicationBundle {
        application,
        candidate,
        job,
    })
}

/// Load one application with its candidate and job in a single query.
#[instrument(skip(pool))]
pub async fn fetch_application_bundle(
    pool: &PgPool,
    application_id: i64,
) -> Result<Option<ApplicationBundle>, ApplicationFetchError> {
    let client = pool.get().await?;

    let row = client
        .query_opt(
            "SELECT
                a.id AS application_id,
                a.organization_id,
                a.candidate_id,
                a.job_id,
                c.first_name,
                c.last_name,
                c.email,
                c.current_company,
                c.current_title,
                c.location AS candidate_location,
                c.resume_url,
                c.resume_parsed_data,
                c.tags,
                c.notes,
                j.title,
                j.department,
                j.location AS job_location,
                j.employment_type,
                j.description,
                j.requirements
            FROM ats.applications a
            JOIN ats.candidates c ON c.id = a.candidate_id
            JOIN ats.jobs j ON j.id = a.job_id
            WHERE a.id = $1",
            &[&application_id],
        )
        .await?;

    row.map(|r| row_to_bundle(&r)).transpose()
}

/// The batch target set: every application for the job that lacks a score
/// (automatic mode), or every application for the job (forced re-score).
#[instrument(skip(pool))]
pub async fn fetch_target_application_ids(
    pool: &PgPool,
    job_id: i64,
    organization_id: i64,
    rescore: bool,
) -> Result<Vec<i64>, ApplicationFetchError> {
    let client = pool.get().await?;

    let rows = if rescore {
        client
            .query(
                "SELECT a.id
                 FROM ats.applications a
                 WHERE a.job_id = $1 AND a.organization_id = $2
                 ORDER BY a.id",
                &[&job_id, &organization_id],
            )
            .await?
    } else {
        client
            .query(
                "SELECT a.id
                 FROM ats.applications a
                 LEFT JOIN ats.match_scores ms ON ms.application_id = a.id
                 WHERE a.job_id = $1 AND a.organization_id = $2 AND ms.id IS NULL
                 ORDER BY a.id",
                &[&job_id, &organization_id],
            )
            .await?
    };

    Ok(rows.iter().map(|row| row.get("id")).collect())
}

/// Jobs in an organization that still have unscored applications. Drives the
/// auto-score worker's cycle planning.
#[instrument(skip(pool))]
pub async fn fetch_jobs_with_unscored_applications(
    pool: &PgPool,
    organization_id: i64,
) -> Result<Vec<i64>, ApplicationFetchError> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT DISTINCT a.job_id
             FROM ats.applications a
             LEFT JOIN ats.match_scores ms ON ms.application_id = a.id
             WHERE a.organization_id = $1 AND ms.id IS NULL
             ORDER BY a.job_id",
            &[&organization_id],
        )
        .await?;

    Ok(rows.iter().map(|row| row.get("job_id")).collect())
}
