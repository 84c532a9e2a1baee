use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::database::DatabasePool;
use crate::oracle::SimilarTicketProvider;
use crate::ticket::{Priority, SimilarTicket, Ticket};

/// How many historical matches the engine gets to look at.
const SIMILAR_LIMIT: i64 = 10;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Client for the external embedding service. Model choice lives there.
pub struct EmbeddingClient {
    client: Client,
    endpoint: String,
}

impl EmbeddingClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/embed", base_url.trim_end_matches('/')),
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbeddingRequest { text })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("embedding request failed ({}): {}", status, body));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        if parsed.embedding.is_empty() {
            return Err(anyhow!("embedding service returned an empty vector"));
        }
        Ok(parsed.embedding)
    }
}

/// Vector search over resolved historical tickets (pgvector cosine
/// distance). Assignee email is denormalized onto the historical row, so
/// departed members still carry their history.
pub struct PgSimilarTicketProvider {
    pool: DatabasePool,
    embeddings: EmbeddingClient,
}

impl PgSimilarTicketProvider {
    pub fn new(pool: DatabasePool, embeddings: EmbeddingClient) -> Self {
        Self { pool, embeddings }
    }
}

#[async_trait]
impl SimilarTicketProvider for PgSimilarTicketProvider {
    async fn find_similar(&self, ticket: &Ticket) -> Result<Vec<SimilarTicket>> {
        let embedding = self.embeddings.embed(&ticket.search_text()).await?;
        let vector_literal = vector_literal(&embedding);

        let rows = sqlx::query(
            r#"
            SELECT
                h.assignee_email,
                h.priority,
                h.resolved_at,
                1 - (e.embedding <=> $1::text::vector) AS similarity
            FROM historical_tickets h
            JOIN embeddings e ON e.historical_ticket_id = h.id
            WHERE h.resolved_at IS NOT NULL
            ORDER BY e.embedding <=> $1::text::vector
            LIMIT $2
            "#,
        )
        .bind(&vector_literal)
        .bind(SIMILAR_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let similar = rows
            .iter()
            .map(|row| SimilarTicket {
                similarity_score: row.get::<f64, _>("similarity").clamp(0.0, 1.0),
                assignee_email: row.get("assignee_email"),
                priority: Priority::canonicalize(&row.get::<String, _>("priority")),
                resolved_at: row.try_get("resolved_at").unwrap_or(None),
            })
            .collect();

        Ok(similar)
    }
}

/// pgvector's text input format: `[0.1,0.2,...]`.
fn vector_literal(embedding: &[f32]) -> String {
    let joined: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", joined.join(","))
}
