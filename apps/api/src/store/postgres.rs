use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::query::ResumeQuery;
use super::{DocumentCollection, IdentityKey, StoreError, StoredDocument};
use crate::models::resume::ResumeRow;

/// `resumes` table collection. Documents live in a JSONB column and are
/// searched with SQL/JSON path predicates.
#[derive(Clone)]
pub struct PgCollection {
    pool: PgPool,
}

impl PgCollection {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentCollection for PgCollection {
    async fn upsert_one(&self, document: &Value, key: &IdentityKey) -> Result<Uuid, StoreError> {
        // Single statement: on conflict the existing row keeps its id.
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO resumes (id, identity_key, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (identity_key)
            DO UPDATE SET data = EXCLUDED.data, updated_at = now()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key.as_key())
        .bind(document)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find(&self, query: &ResumeQuery) -> Result<Vec<StoredDocument>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT id, identity_key, data, created_at, updated_at FROM resumes WHERE TRUE",
        );
        for filter in &query.filters {
            let (path, vars) = filter.to_jsonpath();
            debug!("Resume filter {path} vars={vars}");
            builder
                .push(" AND jsonb_path_exists(data, ")
                .push_bind(path)
                .push("::jsonpath, ")
                .push_bind(vars)
                .push(")");
        }
        builder.push(" ORDER BY created_at");

        let rows: Vec<ResumeRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| -> Result<StoredDocument, StoreError> {
                Ok(StoredDocument {
                    id: row.id,
                    identity_key: row.identity_key,
                    updated_at: row.updated_at,
                    record: serde_json::from_value(row.data)?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
