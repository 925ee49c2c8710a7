//! Shortage aggregations over the NERO extract table.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use time::OffsetDateTime;

use crate::application::sources::{
    ShortageSections, ShortageSource, SourceError, StateLatest, StateStats, YearlyPoint,
};

use super::{NORM_STATE_EXPR, PREFIX4_FILTER, map_sqlx_error};

pub struct PgShortageSource {
    pool: PgPool,
}

impl PgShortageSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn latest_sql() -> String {
        format!(
            "WITH filtered AS ( \
                 SELECT {NORM_STATE_EXPR} AS state, date, nsc_emp::double precision AS nsc_emp \
                 FROM nero_extract \
                 WHERE {PREFIX4_FILTER} \
             ), \
             ranked AS ( \
                 SELECT state, date, nsc_emp, \
                        ROW_NUMBER() OVER (PARTITION BY state ORDER BY date DESC) AS rn \
                 FROM filtered \
             ) \
             SELECT state, date, nsc_emp \
             FROM ranked \
             WHERE rn = 1 \
             ORDER BY state"
        )
    }

    fn stats_sql() -> String {
        format!(
            "SELECT {NORM_STATE_EXPR} AS state, \
                    COUNT(*) AS samples, \
                    MIN(date) AS first_date, \
                    MAX(date) AS last_date, \
                    AVG(nsc_emp)::double precision AS avg_nsc_emp, \
                    STDDEV_SAMP(nsc_emp)::double precision AS stddev_nsc_emp, \
                    MIN(nsc_emp)::double precision AS min_nsc_emp, \
                    MAX(nsc_emp)::double precision AS max_nsc_emp \
             FROM nero_extract \
             WHERE {PREFIX4_FILTER} \
             GROUP BY 1 \
             ORDER BY 1"
        )
    }

    fn yearly_sql() -> String {
        format!(
            "SELECT {NORM_STATE_EXPR} AS state, \
                    EXTRACT(YEAR FROM date)::int AS year, \
                    AVG(nsc_emp)::double precision AS avg_nsc_emp \
             FROM nero_extract \
             WHERE {PREFIX4_FILTER} \
             GROUP BY 1, 2 \
             ORDER BY 1, 2"
        )
    }
}

#[derive(sqlx::FromRow)]
struct LatestRow {
    state: String,
    date: OffsetDateTime,
    nsc_emp: f64,
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    state: String,
    samples: i64,
    first_date: OffsetDateTime,
    last_date: OffsetDateTime,
    avg_nsc_emp: f64,
    stddev_nsc_emp: Option<f64>,
    min_nsc_emp: f64,
    max_nsc_emp: f64,
}

#[derive(sqlx::FromRow)]
struct YearlyRow {
    state: String,
    year: i32,
    avg_nsc_emp: f64,
}

#[async_trait]
impl ShortageSource for PgShortageSource {
    async fn sections(&self, prefix4: &str) -> Result<ShortageSections, SourceError> {
        let latest: Vec<LatestRow> = sqlx::query_as(&Self::latest_sql())
            .bind(prefix4)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let stats: Vec<StatsRow> = sqlx::query_as(&Self::stats_sql())
            .bind(prefix4)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let yearly: Vec<YearlyRow> = sqlx::query_as(&Self::yearly_sql())
            .bind(prefix4)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(ShortageSections {
            latest_by_state: latest
                .into_iter()
                .map(|row| StateLatest {
                    state: row.state,
                    date: row.date,
                    nsc_emp: row.nsc_emp,
                })
                .collect(),
            stats_by_state: stats
                .into_iter()
                .map(|row| StateStats {
                    state: row.state,
                    samples: row.samples,
                    first_date: row.first_date,
                    last_date: row.last_date,
                    avg_nsc_emp: row.avg_nsc_emp,
                    stddev_nsc_emp: row.stddev_nsc_emp,
                    min_nsc_emp: row.min_nsc_emp,
                    max_nsc_emp: row.max_nsc_emp,
                })
                .collect(),
            yearly_trend: yearly
                .into_iter()
                .map(|row| YearlyPoint {
                    state: row.state,
                    year: row.year,
                    avg_nsc_emp: row.avg_nsc_emp,
                })
                .collect(),
        })
    }

    async fn distinct_prefixes(&self) -> Result<Vec<String>, SourceError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT LEFT(TRIM(CAST(anzsco_code AS TEXT)), 4) AS prefix4 \
             FROM nero_extract \
             WHERE anzsco_code IS NOT NULL \
               AND LENGTH(TRIM(CAST(anzsco_code AS TEXT))) >= 4 \
             ORDER BY 1",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(prefix,)| prefix)
            .filter(|p| p.len() == 4 && p.bytes().all(|b| b.is_ascii_digit()))
            .collect())
    }
}
