use super::{IdMap, Secondary, Store};
use crate::config::{DB_CONNECT_MAX_RETRIES, DB_CONNECT_RETRY_DELAY_SECS, DB_MAX_CONNECTIONS};
use crate::mapping::Transform;
use crate::models::{AssociationKind, EntityDraft, EntityId, EntityKind, FieldValue};
use anyhow::{bail, Context, Result};
use futures::TryStreamExt;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Postgres, Row};
use std::time::Duration;
use tracing::{debug, info};

/// PostgreSQL adapter. Table and column names come from the static mapping
/// tables, never from input data, so they are spliced into SQL directly.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Opens a pool and checks it with a trivial query, retrying while the
    /// database comes up.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let max_retries = DB_CONNECT_MAX_RETRIES;
        let delay = Duration::from_secs(DB_CONNECT_RETRY_DELAY_SECS);

        for attempt in 1..=max_retries {
            let pool = PgPoolOptions::new()
                .max_connections(DB_MAX_CONNECTIONS)
                .connect(database_url)
                .await;
            match pool {
                Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                    Ok(_) => return Ok(Self { pool }),
                    Err(e) if attempt < max_retries => {
                        info!(attempt, "Connection test failed, retrying: {e}");
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => {
                        return Err(e).context(format!(
                            "Database did not answer after {max_retries} attempts"
                        ));
                    }
                },
                Err(e) if attempt < max_retries => {
                    info!(attempt, "Cannot connect to database, retrying: {e}");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(e).context(format!(
                        "Cannot connect to database after {max_retries} attempts.\n\
                         Check DATABASE_URL and that PostgreSQL is running."
                    ));
                }
            }
        }

        bail!("Cannot connect to database after {max_retries} attempts");
    }
}

fn column_type(transform: Transform) -> &'static str {
    match transform {
        Transform::Text => "TEXT",
        Transform::List => "TEXT[]",
    }
}

fn field_names(kind: EntityKind) -> Vec<&'static str> {
    kind.fields().iter().map(|f| f.field).collect()
}

fn placeholders(from: usize, count: usize) -> String {
    (from..from + count)
        .map(|n| format!("${n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn create_entity_table_sql(kind: EntityKind) -> String {
    let columns: String = kind
        .fields()
        .iter()
        .map(|f| format!("    {} {},\n", f.field, column_type(f.transform)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    \
         id BIGSERIAL PRIMARY KEY,\n    \
         source_record_id TEXT UNIQUE,\n\
         {columns}    \
         created_at TIMESTAMPTZ NOT NULL DEFAULT now(),\n    \
         updated_at TIMESTAMPTZ NOT NULL DEFAULT now()\n)",
        table = kind.table(),
    )
}

pub(crate) fn create_link_table_sql(kind: AssociationKind) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    \
         event_id BIGINT NOT NULL REFERENCES events(id) ON DELETE CASCADE,\n    \
         {column} BIGINT NOT NULL REFERENCES {related}(id) ON DELETE CASCADE,\n    \
         PRIMARY KEY (event_id, {column})\n)",
        table = kind.table(),
        column = kind.related_column(),
        related = kind.related().table(),
    )
}

pub(crate) fn upsert_sql(kind: EntityKind) -> String {
    let fields = field_names(kind);
    let updates: Vec<String> = fields
        .iter()
        .map(|f| format!("{f} = EXCLUDED.{f}"))
        .chain(std::iter::once("updated_at = now()".to_string()))
        .collect();
    format!(
        "INSERT INTO {table} (source_record_id, {columns}) VALUES ({values}) \
         ON CONFLICT (source_record_id) DO UPDATE SET {updates} RETURNING id",
        table = kind.table(),
        columns = fields.join(", "),
        values = placeholders(1, fields.len() + 1),
        updates = updates.join(", "),
    )
}

pub(crate) fn insert_sql(kind: EntityKind) -> String {
    let fields = field_names(kind);
    format!(
        "INSERT INTO {table} ({columns}) VALUES ({values}) RETURNING id",
        table = kind.table(),
        columns = fields.join(", "),
        values = placeholders(1, fields.len()),
    )
}

pub(crate) fn find_match_sql(
    kind: EntityKind,
    name_field: &str,
    secondary_field: Option<&str>,
) -> String {
    let mut sql = format!(
        "SELECT id FROM {table} WHERE lower(btrim({name_field})) = lower(btrim($1))",
        table = kind.table(),
    );
    if let Some(field) = secondary_field {
        sql.push_str(&format!(" AND {field} IS NOT DISTINCT FROM $2"));
    }
    sql.push_str(" ORDER BY id LIMIT 1");
    sql
}

pub(crate) fn link_sql(kind: AssociationKind) -> String {
    format!(
        "INSERT INTO {table} (event_id, {column}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        table = kind.table(),
        column = kind.related_column(),
    )
}

fn bind_field<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &FieldValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        FieldValue::Text(v) => query.bind(v.clone()),
        FieldValue::List(v) => query.bind(v.clone()),
    }
}

fn bind_draft<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    draft: &EntityDraft,
) -> Query<'q, Postgres, PgArguments> {
    for (_, value) in &draft.fields {
        query = bind_field(query, value);
    }
    query
}

impl Store for PgStore {
    async fn ensure_schema(&self) -> Result<()> {
        for kind in EntityKind::ALL {
            let sql = create_entity_table_sql(kind);
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create table {}", kind.table()))?;
        }
        for kind in AssociationKind::ALL {
            let sql = create_link_table_sql(kind);
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create table {}", kind.table()))?;
        }
        debug!("Schema ready");
        Ok(())
    }

    async fn upsert(
        &self,
        draft: &EntityDraft,
        source_record_id: &str,
    ) -> Result<Option<EntityId>> {
        let sql = upsert_sql(draft.kind);
        let query = sqlx::query(&sql).bind(source_record_id.to_string());
        let row = bind_draft(query, draft)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| {
                format!(
                    "Failed to upsert {} with source_record_id {source_record_id}",
                    draft.kind
                )
            })?;
        row.map(|r| r.try_get::<i64, _>("id"))
            .transpose()
            .context("Upsert returned no id column")
    }

    async fn find_match(
        &self,
        kind: EntityKind,
        name_field: &'static str,
        name: &str,
        secondary: Option<Secondary<'_>>,
    ) -> Result<Option<EntityId>> {
        let sql = find_match_sql(kind, name_field, secondary.map(|s| s.field));
        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(name.to_string());
        if let Some(s) = secondary {
            query = query.bind(s.value.map(str::to_string));
        }
        query
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to look up {kind} named {name:?}"))
    }

    async fn insert(&self, draft: &EntityDraft) -> Result<Option<EntityId>> {
        let sql = insert_sql(draft.kind);
        let row = bind_draft(sqlx::query(&sql), draft)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to insert {}", draft.kind))?;
        row.map(|r| r.try_get::<i64, _>("id"))
            .transpose()
            .context("Insert returned no id column")
    }

    async fn source_id_map(&self, kind: EntityKind) -> Result<IdMap> {
        let sql = format!(
            "SELECT id, source_record_id FROM {} WHERE source_record_id IS NOT NULL",
            kind.table()
        );
        let mut rows = sqlx::query_as::<_, (i64, String)>(&sql).fetch(&self.pool);
        let mut map = IdMap::default();
        while let Some((id, key)) = rows
            .try_next()
            .await
            .with_context(|| format!("Failed to read {} ids", kind.table()))?
        {
            map.insert(key, id);
        }
        Ok(map)
    }

    async fn link(
        &self,
        kind: AssociationKind,
        event_id: EntityId,
        related_id: EntityId,
    ) -> Result<bool> {
        let sql = link_sql(kind);
        let result = sqlx::query(&sql)
            .bind(event_id)
            .bind(related_id)
            .execute(&self.pool)
            .await
            .with_context(|| {
                format!("Failed to link event {event_id} to {} {related_id}", kind.related())
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, kind: EntityKind) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to execute count query: {sql}"))
    }

    async fn count_links(&self, kind: AssociationKind) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to execute count query: {sql}"))
    }

    async fn labels(&self, kind: EntityKind) -> Result<Vec<(EntityId, Option<String>)>> {
        let sql = format!(
            "SELECT id, {} FROM {} ORDER BY id",
            kind.label_field(),
            kind.table()
        );
        sqlx::query_as::<_, (i64, Option<String>)>(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read {} labels", kind.table()))
    }

    async fn link_pairs(&self, kind: AssociationKind) -> Result<Vec<(EntityId, EntityId)>> {
        let sql = format!(
            "SELECT event_id, {} FROM {} ORDER BY event_id, {}",
            kind.related_column(),
            kind.table(),
            kind.related_column()
        );
        sqlx::query_as::<_, (i64, i64)>(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read {}", kind.table()))
    }
}
