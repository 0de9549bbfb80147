use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, Pool, Postgres, QueryBuilder};

use super::{
    error::QueryError,
    form::FormData,
    schema::DocumentId,
    store::{generate_document_id, Direction, Document, DocumentStore, Predicate, StoreQuery},
};

const MAX_CONNECTIONS: u32 = 5;

/// Document store kept in a single JSONB table keyed by collection and id.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), QueryError> {
        sqlx::query(
            "
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data JSONB NOT NULL DEFAULT '{}'::jsonb,
                PRIMARY KEY (collection, id)
            )
        ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

type DocumentRow = (String, Json<FormData>);

fn into_document((id, Json(fields)): DocumentRow) -> Document {
    Document { id, fields }
}

/// `data -> field` with JSON `null` folded into SQL `NULL`.
fn push_field(builder: &mut QueryBuilder<'_, Postgres>, field: &str) {
    builder.push("NULLIF(data -> ");
    builder.push_bind(field.to_string());
    builder.push("::text, 'null'::jsonb)");
}

pub fn build_select(query: &StoreQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT id, data FROM documents WHERE collection = ");
    builder.push_bind(query.collection.to_owned());

    for predicate in &query.predicates {
        match predicate {
            Predicate::Equals(field, value) => {
                builder.push(" AND ");
                push_field(&mut builder, field);
                builder.push(" = ");
                builder.push_bind(Json(value.to_owned()));
                builder.push("::jsonb");
            }
        }
    }

    match &query.order_by {
        Some(order) => {
            let (beyond, direction) = match order.direction {
                Direction::Ascending => (" > ", "ASC"),
                Direction::Descending => (" < ", "DESC"),
            };

            if let Some(cursor) = &query.start_after {
                builder.push(" AND (");
                match &cursor.value {
                    Some(value) => {
                        push_field(&mut builder, &order.field);
                        builder.push(beyond);
                        push_cursor_value(&mut builder, value);
                        builder.push(" OR (");
                        push_field(&mut builder, &order.field);
                        builder.push(" = ");
                        push_cursor_value(&mut builder, value);
                        builder.push(" AND id > ");
                        builder.push_bind(cursor.id.to_owned());
                        builder.push(") OR ");
                        push_field(&mut builder, &order.field);
                        builder.push(" IS NULL");
                    }
                    None => {
                        push_field(&mut builder, &order.field);
                        builder.push(" IS NULL AND id > ");
                        builder.push_bind(cursor.id.to_owned());
                    }
                }
                builder.push(")");
            }

            builder.push(" ORDER BY ");
            push_field(&mut builder, &order.field);
            builder.push(format!(" {direction} NULLS LAST, id ASC"));
        }
        None => {
            if let Some(cursor) = &query.start_after {
                builder.push(" AND id > ");
                builder.push_bind(cursor.id.to_owned());
            }
            builder.push(" ORDER BY id ASC");
        }
    }

    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit as i64);
    }

    builder
}

fn push_cursor_value(builder: &mut QueryBuilder<'_, Postgres>, value: &Value) {
    builder.push_bind(Json(value.to_owned()));
    builder.push("::jsonb");
}

impl DocumentStore for PgStore {
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, QueryError> {
        let rows: Vec<DocumentRow> =
            sqlx::query_as("SELECT id, data FROM documents WHERE collection = $1 ORDER BY id")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(into_document).collect())
    }

    async fn query(&self, query: &StoreQuery) -> Result<Vec<Document>, QueryError> {
        let mut builder = build_select(query);
        log::trace!("> Querying {}", builder.sql());

        let rows: Vec<DocumentRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(into_document).collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, QueryError> {
        let row: Option<DocumentRow> =
            sqlx::query_as("SELECT id, data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(into_document))
    }

    async fn create(&self, collection: &str, fields: FormData) -> Result<DocumentId, QueryError> {
        let id = generate_document_id();
        self.set(collection, &id, fields).await?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: FormData) -> Result<(), QueryError> {
        sqlx::query(
            "
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data
        ",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: FormData) -> Result<(), QueryError> {
        let result =
            sqlx::query("UPDATE documents SET data = data || $3 WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .bind(Json(patch))
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(QueryError::not_found(collection, id));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), QueryError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
