use sqlx::PgPool;

/// Runs database commands against a connection pool.
///
/// Each command is a plain struct with a
/// [`Processor`](kanau::processor::Processor) impl on this type.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
