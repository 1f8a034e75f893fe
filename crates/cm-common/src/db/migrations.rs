use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use crate::db::{DbPoolError, PgPool};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to build pool: {0}")]
    PoolBuild(#[from] DbPoolError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        description: "match_scores + scoring_configs tables with range checks",
        sql: r#"
CREATE SCHEMA IF NOT EXISTS ats;

CREATE TABLE IF NOT EXISTS ats.match_scores (
    id BIGSERIAL PRIMARY KEY,
    application_id BIGINT NOT NULL UNIQUE,
    organization_id BIGINT NOT NULL,
    candidate_id BIGINT NOT NULL,
    job_id BIGINT NOT NULL,
    overall_score INTEGER NOT NULL,
    skill_score INTEGER NOT NULL,
    experience_score INTEGER NOT NULL,
    semantic_score INTEGER NOT NULL,
    ai_summary TEXT NOT NULL DEFAULT '',
    recommendation TEXT NOT NULL,
    strengths JSONB NOT NULL DEFAULT '[]'::jsonb,
    concerns JSONB NOT NULL DEFAULT '[]'::jsonb,
    breakdown JSONB NOT NULL DEFAULT '{}'::jsonb,
    weights JSONB NOT NULL DEFAULT '{}'::jsonb,
    model_used TEXT NOT NULL DEFAULT '',
    scored_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_overall_score_range
        CHECK (overall_score >= 0 AND overall_score <= 100),
    CONSTRAINT chk_sub_score_ranges CHECK (
        skill_score >= 0 AND skill_score <= 100
        AND experience_score >= 0 AND experience_score <= 100
        AND semantic_score >= 0 AND semantic_score <= 100
    ),
    CONSTRAINT chk_recommendation CHECK (recommendation IN (
        'strong_match', 'good_match', 'moderate_match', 'weak_match', 'poor_match'
    ))
);

CREATE INDEX IF NOT EXISTS idx_match_scores_job
    ON ats.match_scores(job_id, organization_id);

CREATE TABLE IF NOT EXISTS ats.scoring_configs (
    organization_id BIGINT PRIMARY KEY,
    enabled BOOLEAN NOT NULL DEFAULT TRUE,
    auto_score BOOLEAN NOT NULL DEFAULT TRUE,
    skill_weight DOUBLE PRECISION NOT NULL DEFAULT 40,
    experience_weight DOUBLE PRECISION NOT NULL DEFAULT 30,
    semantic_weight DOUBLE PRECISION NOT NULL DEFAULT 30,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_weights_non_negative CHECK (
        skill_weight >= 0 AND experience_weight >= 0 AND semantic_weight >= 0
    )
);

DO $$
BEGIN
    IF EXISTS (
        SELECT 1 FROM information_schema.tables
        WHERE table_schema = 'ats' AND table_name = 'applications'
    ) THEN
        CREATE INDEX IF NOT EXISTS idx_applications_job
            ON ats.applications(job_id, organization_id);
    END IF;
END $$;
"#,
    },
];

#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    client
        .batch_execute(
            "CREATE SCHEMA IF NOT EXISTS ats;
             CREATE TABLE IF NOT EXISTS ats.schema_migrations (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             );",
        )
        .await?;

    for migration in MIGRATIONS {
        let already_applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM ats.schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .get(0);

        if already_applied {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await?;
        tx.execute(
            "INSERT INTO ats.schema_migrations (id, description) VALUES ($1, $2)",
            &[&migration.id, &migration.description],
        )
        .await?;
        tx.commit().await?;

        info!(
            id = migration.id,
            description = migration.description,
            "applied migration"
        );
    }

    Ok(())
}
