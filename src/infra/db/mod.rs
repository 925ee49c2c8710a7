//! Postgres-backed implementations of the aggregation sources.

mod rank;
mod shortage;

pub use rank::PgRankSource;
pub use shortage::PgShortageSource;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::application::sources::SourceError;

/// Normalizes abbreviated and spelled-out state names into one spelling so a
/// state never splits into two aggregation groups.
const NORM_STATE_EXPR: &str = "CASE \
    WHEN state_name IN ('NSW','New South Wales') THEN 'New South Wales' \
    WHEN state_name IN ('VIC','Victoria') THEN 'Victoria' \
    WHEN state_name IN ('QLD','Queensland') THEN 'Queensland' \
    WHEN state_name IN ('SA','South Australia') THEN 'South Australia' \
    WHEN state_name IN ('WA','Western Australia') THEN 'Western Australia' \
    WHEN state_name IN ('TAS','Tasmania') THEN 'Tasmania' \
    WHEN state_name IN ('NT','Northern Territory') THEN 'Northern Territory' \
    WHEN state_name IN ('ACT','Australian Capital Territory') THEN 'Australian Capital Territory' \
    ELSE state_name \
END";

const PREFIX4_FILTER: &str = "LEFT(TRIM(CAST(anzsco_code AS TEXT)), 4) = $1";

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
}

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> SourceError {
    match err {
        sqlx::Error::PoolTimedOut => SourceError::Unavailable("connection pool timed out".into()),
        sqlx::Error::Io(io) => SourceError::Unavailable(io.to_string()),
        other => SourceError::from_query(other),
    }
}

/// Carriage returns and newlines occasionally survive in imported titles.
pub(crate) fn strip_linebreaks(value: &str) -> String {
    value.replace(['\r', '\n'], "")
}
