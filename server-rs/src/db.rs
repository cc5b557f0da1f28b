use async_trait::async_trait;
use match_engine::store::{Document, DocumentStore, Order, Query, StoreError, StoreResult};
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::config::Config;

const SCHEMA: &str = include_str!("../migrations/001_documents.sql");

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    let url = config.database_url();
    PgPoolOptions::new()
        .min_connections(config.db.pool_min)
        .max_connections(config.db.pool_max)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&url)
        .await
}

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Equality filters as a JSONB containment document.
fn containment(query: &Query) -> Value {
    let mut map = Map::new();
    for (field, value) in &query.filters {
        map.insert(field.clone(), value.clone());
    }
    Value::Object(map)
}

/// Documents in one JSONB table keyed by `(collection, id)`.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create(&self, collection: &str, body: Value) -> StoreResult<String> {
        if !body.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO documents (collection, id, version, body) VALUES ($1, $2, 1, $3)")
            .bind(collection)
            .bind(&id)
            .bind(&body)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(id)
    }

    async fn put(&self, collection: &str, id: &str, body: Value) -> StoreResult<()> {
        if !body.is_object() {
            return Err(StoreError::NotAnObject);
        }
        sqlx::query(
            r#"INSERT INTO documents (collection, id, version, body) VALUES ($1, $2, 1, $3)
            ON CONFLICT (collection, id) DO UPDATE SET
                body = EXCLUDED.body, version = documents.version + 1, updated_at = NOW()"#,
        )
        .bind(collection)
        .bind(id)
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn create_unless_exists(
        &self,
        collection: &str,
        guard: &Query,
        body: Value,
    ) -> StoreResult<Option<String>> {
        if !body.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // serialises conditional inserts per collection until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = $1 AND body @> $2)",
        )
        .bind(collection)
        .bind(containment(guard))
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;
        if exists {
            tx.rollback().await.map_err(backend)?;
            return Ok(None);
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO documents (collection, id, version, body) VALUES ($1, $2, 1, $3)")
            .bind(collection)
            .bind(&id)
            .bind(&body)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(Some(id))
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let row: Option<(String, i64, Value)> = sqlx::query_as(
            "SELECT id, version, body FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(|(id, version, body)| Document { id, version, body }))
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let order = match &query.order_by {
            Some((_, Order::Asc)) => "ORDER BY body -> $3 ASC NULLS FIRST, id",
            Some((_, Order::Desc)) => "ORDER BY body -> $3 DESC NULLS LAST, id",
            None => "ORDER BY body -> $3, id",
        };
        let sql = format!(
            "SELECT id, version, body FROM documents \
             WHERE collection = $1 AND body @> $2 {order} LIMIT $4"
        );
        let field = query
            .order_by
            .as_ref()
            .map(|(f, _)| f.clone())
            .unwrap_or_default();

        let rows: Vec<(String, i64, Value)> = sqlx::query_as(&sql)
            .bind(collection)
            .bind(containment(query))
            .bind(field)
            .bind(query.limit.map(|l| l as i64))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|(id, version, body)| Document { id, version, body })
            .collect())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()> {
        if !patch.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let result = sqlx::query(
            r#"UPDATE documents SET body = body || $3, version = version + 1, updated_at = NOW()
            WHERE collection = $1 AND id = $2"#,
        )
        .bind(collection)
        .bind(id)
        .bind(&patch)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        patch: Value,
    ) -> StoreResult<bool> {
        if !patch.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let result = sqlx::query(
            r#"UPDATE documents SET body = body || $4, version = version + 1, updated_at = NOW()
            WHERE collection = $1 AND id = $2 AND version = $3"#,
        )
        .bind(collection)
        .bind(id)
        .bind(expected_version)
        .bind(&patch)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }
        match self.get(collection, id).await? {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn containment_mirrors_equality_filters() {
        let q = Query::new().eq("matchId", "m1").eq("read", false);
        assert_eq!(containment(&q), json!({"matchId": "m1", "read": false}));
        assert_eq!(containment(&Query::new()), json!({}));
    }

    #[test]
    fn schema_splits_into_statements() {
        let statements: Vec<_> = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE"));
    }
}
