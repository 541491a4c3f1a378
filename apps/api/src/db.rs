use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the `resumes` table if it does not exist yet.
/// `identity_key` is unique so upserts can target it with `ON CONFLICT`.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resumes (
            id           UUID PRIMARY KEY,
            identity_key TEXT NOT NULL UNIQUE,
            data         JSONB NOT NULL,
            created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at   TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create resumes table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS resumes_data_gin ON resumes USING GIN (data jsonb_path_ops)")
        .execute(pool)
        .await
        .context("Failed to create resumes index")?;

    info!("Schema ready");
    Ok(())
}
