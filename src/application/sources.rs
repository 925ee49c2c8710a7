//! Source traits describing the expensive relational aggregations.
//!
//! The cache layer treats these as opaque workers with arbitrary latency and
//! arbitrary failure modes. Production wires the Postgres adapters from
//! `infra::db`; tests substitute fakes.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source query failed: {0}")]
    Query(String),
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    pub fn from_query(err: impl std::fmt::Display) -> Self {
        Self::Query(err.to_string())
    }
}

// ============================================================================
// Shortage
// ============================================================================

/// Latest observation per state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateLatest {
    pub state: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub nsc_emp: f64,
}

/// Whole-history statistics per state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateStats {
    pub state: String,
    pub samples: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub first_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_date: OffsetDateTime,
    pub avg_nsc_emp: f64,
    pub stddev_nsc_emp: Option<f64>,
    pub min_nsc_emp: f64,
    pub max_nsc_emp: f64,
}

/// Yearly average per state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyPoint {
    pub state: String,
    pub year: i32,
    pub avg_nsc_emp: f64,
}

/// The three read-only aggregations behind the shortage endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortageSections {
    pub latest_by_state: Vec<StateLatest>,
    pub stats_by_state: Vec<StateStats>,
    pub yearly_trend: Vec<YearlyPoint>,
}

#[async_trait]
pub trait ShortageSource: Send + Sync {
    /// Aggregate shortage data for one 4-digit ANZSCO prefix.
    async fn sections(&self, prefix4: &str) -> Result<ShortageSections, SourceError>;

    /// All 4-digit prefixes present in the extract, for prewarming.
    async fn distinct_prefixes(&self) -> Result<Vec<String>, SourceError>;
}

// ============================================================================
// Rank
// ============================================================================

/// One occupation hit by one selected ability code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupationMatch {
    pub occupation_code: String,
    pub occupation_title: String,
    pub code: String,
}

/// One SOC -> ANZSCO mapping row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupationAnzsco {
    pub occupation_code: String,
    pub code: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[async_trait]
pub trait RankSource: Send + Sync {
    /// Titles for the given ability codes of one kind, keyed by code.
    async fn ability_titles(
        &self,
        kind: &str,
        codes: &[String],
    ) -> Result<HashMap<String, Option<String>>, SourceError>;

    /// Occupations matched by any of the given ability codes of one kind.
    async fn occupation_matches(
        &self,
        kind: &str,
        codes: &[String],
    ) -> Result<Vec<OccupationMatch>, SourceError>;

    /// ANZSCO mappings for the given occupations, optionally restricted to a
    /// fuzzy, case-insensitive industry name match.
    async fn anzsco_for_occupations(
        &self,
        occupation_codes: &[String],
        industry: Option<&str>,
    ) -> Result<Vec<OccupationAnzsco>, SourceError>;
}
