//! PostgreSQL storage backend implementation.
//!
//! Uses sqlx for database operations and implements the StorageBackend trait.
//! Polymorphic response fields are stored as a SMALLINT type tag next to a JSONB
//! payload, one pair per field.

use super::{StorageError, traits::*};
use crate::models::{
    Flow, FlowQuestion, FlowVersion, NewFlowResponse, QuestionType, StoredResponse, StoredValue,
    ValueType,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

/// Rows per INSERT statement; keeps bind parameters under the Postgres limit.
const RESPONSE_INSERT_CHUNK: usize = 5000;

/// PostgreSQL storage backend implementation.
pub struct PostgresStorageBackend {
    pool: PgPool,
}

impl PostgresStorageBackend {
    /// Create a new PostgreSQL storage backend.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FlowRow {
    primary_key: i64,
    id: Uuid,
    name: String,
    version: String,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    title: String,
    language: String,
}

impl TryFrom<FlowRow> for StoredFlow {
    type Error = StorageError;

    fn try_from(row: FlowRow) -> Result<Self, Self::Error> {
        let version: FlowVersion = row.version.parse().map_err(StorageError::Other)?;
        Ok(StoredFlow {
            primary_key: row.primary_key,
            flow: Flow {
                id: row.id,
                name: row.name,
                version,
                created: row.created,
                modified: row.modified,
                title: row.title,
                language: row.language,
            },
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    primary_key: i64,
    flow_id: i64,
    id: String,
    #[sqlx(rename = "type")]
    question_type: String,
    label: String,
    type_options: Json<Map<String, Value>>,
}

impl TryFrom<QuestionRow> for StoredQuestion {
    type Error = StorageError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let question_type: QuestionType =
            row.question_type.parse().map_err(StorageError::Other)?;
        Ok(StoredQuestion {
            primary_key: row.primary_key,
            flow_pk: row.flow_id,
            question: FlowQuestion {
                id: row.id,
                question_type,
                label: row.label,
                type_options: row.type_options.0,
            },
        })
    }
}

#[derive(sqlx::FromRow)]
struct ResponseRow {
    id: i64,
    question_id: String,
    timestamp: DateTime<Utc>,
    row_id_type: i16,
    row_id_value: Json<Value>,
    contact_id_type: i16,
    contact_id_value: Json<Value>,
    session_id_type: i16,
    session_id_value: Json<Value>,
    response_type: i16,
    response_value: Json<Value>,
    response_metadata: Json<Map<String, Value>>,
}

fn stored_value(tag: i16, payload: Json<Value>) -> Result<StoredValue, StorageError> {
    Ok(StoredValue {
        value_type: ValueType::try_from(tag)?,
        payload: payload.0,
    })
}

impl TryFrom<ResponseRow> for StoredResponse {
    type Error = StorageError;

    fn try_from(row: ResponseRow) -> Result<Self, Self::Error> {
        Ok(StoredResponse {
            sequence: row.id,
            question_id: row.question_id,
            timestamp: row.timestamp,
            row_id: stored_value(row.row_id_type, row.row_id_value)?,
            contact_id: stored_value(row.contact_id_type, row.contact_id_value)?,
            session_id: stored_value(row.session_id_type, row.session_id_value)?,
            response: stored_value(row.response_type, row.response_value)?,
            response_metadata: row.response_metadata.0,
        })
    }
}

/// Append the sequence bounds, ordering and limit of `range` to a query whose
/// WHERE clause is already open.
fn push_range(builder: &mut QueryBuilder<'_, Postgres>, column: &str, range: SequenceRange) {
    if let Some(after) = range.after {
        builder.push(format!(" AND {} > ", column)).push_bind(after);
    }
    if let Some(before) = range.before {
        builder.push(format!(" AND {} < ", column)).push_bind(before);
    }
    builder.push(format!(
        " ORDER BY {} {}",
        column,
        if range.descending { "DESC" } else { "ASC" }
    ));
    builder
        .push(" LIMIT ")
        .push_bind(i64::try_from(range.limit).unwrap_or(i64::MAX));
}

#[async_trait]
impl StorageBackend for PostgresStorageBackend {
    async fn create_flow(
        &self,
        flow: &Flow,
        questions: &[FlowQuestion],
    ) -> Result<StoredFlow, StorageError> {
        let mut tx = self.pool.begin().await?;

        let primary_key: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO flows (id, name, version, created, modified, title, language)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING primary_key
            "#,
        )
        .bind(flow.id)
        .bind(&flow.name)
        .bind(flow.version.as_str())
        .bind(flow.created)
        .bind(flow.modified)
        .bind(&flow.title)
        .bind(&flow.language)
        .fetch_one(&mut *tx)
        .await?;

        if !questions.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"INSERT INTO flow_questions (flow_id, id, "type", label, type_options) "#,
            );
            builder.push_values(questions, |mut row, question| {
                row.push_bind(primary_key)
                    .push_bind(question.id.clone())
                    .push_bind(question.question_type.as_str())
                    .push_bind(question.label.clone())
                    .push_bind(Json(question.type_options.clone()));
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!(
            "Stored flow {} with {} question(s)",
            flow.id,
            questions.len()
        );

        Ok(StoredFlow {
            primary_key,
            flow: flow.clone(),
        })
    }

    async fn get_flow(&self, id: Uuid) -> Result<Option<StoredFlow>, StorageError> {
        let row = sqlx::query_as::<_, FlowRow>(
            r#"
            SELECT primary_key, id, name, version, created, modified, title, language
            FROM flows
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoredFlow::try_from).transpose()
    }

    async fn get_questions(&self, flow_pk: i64) -> Result<Vec<StoredQuestion>, StorageError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT primary_key, flow_id, id, "type", label, type_options
            FROM flow_questions
            WHERE flow_id = $1
            ORDER BY primary_key
            "#,
        )
        .bind(flow_pk)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredQuestion::try_from).collect()
    }

    async fn flow_sequence(&self, id: Uuid) -> Result<Option<i64>, StorageError> {
        let sequence = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT primary_key FROM flows WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sequence)
    }

    async fn scan_flows(&self, range: SequenceRange) -> Result<Vec<StoredFlow>, StorageError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT primary_key, id, name, version, created, modified, title, language \
             FROM flows WHERE TRUE",
        );
        push_range(&mut builder, "primary_key", range);

        let rows = builder
            .build_query_as::<FlowRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(StoredFlow::try_from).collect()
    }

    async fn create_responses(&self, responses: &[NewFlowResponse]) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in responses.chunks(RESPONSE_INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"INSERT INTO flow_responses (flow_id, question_id, "timestamp",
                    row_id_type, row_id_value, contact_id_type, contact_id_value,
                    session_id_type, session_id_value, response_type, response_value,
                    response_metadata) "#,
            );
            builder.push_values(chunk, |mut row, response| {
                row.push_bind(response.flow_pk)
                    .push_bind(response.question_pk)
                    .push_bind(response.timestamp)
                    .push_bind(response.row_id.value_type.as_i16())
                    .push_bind(Json(response.row_id.payload.clone()))
                    .push_bind(response.contact_id.value_type.as_i16())
                    .push_bind(Json(response.contact_id.payload.clone()))
                    .push_bind(response.session_id.value_type.as_i16())
                    .push_bind(Json(response.session_id.payload.clone()))
                    .push_bind(response.response.value_type.as_i16())
                    .push_bind(Json(response.response.payload.clone()))
                    .push_bind(Json(response.response_metadata.clone()));
            });
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn response_sequences(
        &self,
        flow_pk: i64,
        row_id: &str,
    ) -> Result<Option<SequenceSpan>, StorageError> {
        let candidates = row_id_candidates(row_id);
        let string_candidate = candidates[0].clone();
        let integer_candidate = candidates.get(1).cloned().unwrap_or_else(|| string_candidate.clone());

        let (first, last) = sqlx::query_as::<_, (Option<i64>, Option<i64>)>(
            r#"
            SELECT MIN(id), MAX(id)
            FROM flow_responses
            WHERE flow_id = $1 AND (row_id_value = $2 OR row_id_value = $3)
            "#,
        )
        .bind(flow_pk)
        .bind(Json(string_candidate))
        .bind(Json(integer_candidate))
        .fetch_one(&self.pool)
        .await?;

        Ok(first.zip(last).map(|(first, last)| SequenceSpan { first, last }))
    }

    async fn scan_responses(
        &self,
        flow_pk: i64,
        range: SequenceRange,
        filter: TimestampFilter,
    ) -> Result<Vec<StoredResponse>, StorageError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"SELECT r.id, q.id AS question_id, r."timestamp",
                r.row_id_type, r.row_id_value, r.contact_id_type, r.contact_id_value,
                r.session_id_type, r.session_id_value, r.response_type, r.response_value,
                r.response_metadata
            FROM flow_responses r
            JOIN flow_questions q ON q.primary_key = r.question_id
            WHERE r.flow_id = "#,
        );
        builder.push_bind(flow_pk);
        if let Some(start) = filter.start {
            builder.push(r#" AND r."timestamp" > "#).push_bind(start);
        }
        if let Some(end) = filter.end {
            builder.push(r#" AND r."timestamp" <= "#).push_bind(end);
        }
        push_range(&mut builder, "r.id", range);

        let rows = builder
            .build_query_as::<ResponseRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(StoredResponse::try_from).collect()
    }

    async fn delete_responses_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query(
            r#"
            DELETE FROM flow_responses WHERE "timestamp" < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
