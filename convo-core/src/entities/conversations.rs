use crate::framework::DatabaseProcessor;
use crate::transcript::project_transcript;
use convo_sdk::objects::TranscriptionData;
use kanau::processor::Processor;

/// A call transcript as stored in the `conversations` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRecord {
    /// Conflict target of the upsert.
    pub id: String,
    pub agent_id: String,
    pub transcript: String,
    /// Seconds, `DOUBLE PRECISION` in the table.
    pub call_duration: f64,
}

impl TranscriptRecord {
    /// Build a record from a decoded post-call transcription.
    ///
    /// The identity is the provider's `conversation_id` when it is present
    /// and non-empty. Otherwise it is derived from the content with
    /// [`content_identity`], so a redelivery of the same call maps to the
    /// same row.
    pub fn from_event(data: TranscriptionData) -> Self {
        let transcript = project_transcript(&data.transcript);
        let call_duration = data.metadata.call_duration_secs;
        let id = match data.conversation_id {
            Some(id) if !id.is_empty() => id,
            _ => content_identity(&data.agent_id, &transcript, call_duration),
        };
        Self {
            id,
            agent_id: data.agent_id,
            transcript,
            call_duration,
        }
    }
}

/// Lowercase hex SHA-256 over the length-prefixed record fields.
pub fn content_identity(agent_id: &str, transcript: &str, call_duration: f64) -> String {
    let mut ctx = ring::digest::Context::new(&ring::digest::SHA256);
    for field in [agent_id.as_bytes(), transcript.as_bytes()] {
        ctx.update(&(field.len() as u64).to_be_bytes());
        ctx.update(field);
    }
    ctx.update(&call_duration.to_bits().to_be_bytes());
    hex::encode(ctx.finish())
}

/// Whether an upsert created a row or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Insert a transcript, overwriting any row with the same `id`.
#[derive(Debug, Clone)]
pub struct UpsertConversation {
    pub record: TranscriptRecord,
}

impl Processor<UpsertConversation> for DatabaseProcessor {
    type Output = UpsertOutcome;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertConversation")]
    async fn process(&self, cmd: UpsertConversation) -> Result<UpsertOutcome, sqlx::Error> {
        let record = cmd.record;
        // xmax is 0 only for a freshly inserted tuple.
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO conversations (id, agent_id, transcript, call_duration)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET agent_id = EXCLUDED.agent_id,
                transcript = EXCLUDED.transcript,
                call_duration = EXCLUDED.call_duration,
                updated_at = now()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.id)
        .bind(&record.agent_id)
        .bind(&record.transcript)
        .bind(record.call_duration)
        .fetch_one(&self.pool)
        .await?;
        Ok(if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }
}
