//! Reverse lookups for occupation ranking.
//!
//! The scoring itself lives in the application layer; this adapter only
//! fetches the raw rows: code titles, occupation hits per ability code, and
//! the SOC -> ANZSCO mapping with an optional industry filter.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::application::sources::{OccupationAnzsco, OccupationMatch, RankSource, SourceError};

use super::{map_sqlx_error, strip_linebreaks};

pub struct PgRankSource {
    pool: PgPool,
}

impl PgRankSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Table and column names for one ability kind.
    fn tables(kind: &str) -> Result<(&'static str, &'static str, &'static str, &'static str), SourceError> {
        match kind {
            "knowledge" => Ok((
                "knowledge_data",
                "knowledge_code",
                "knowledge_title",
                "occup_know_data",
            )),
            "skill" => Ok(("skill_data", "skill_code", "skill_title", "occup_skill_data")),
            "tech" => Ok((
                "technology_skill_data",
                "tech_skill_code",
                "tech_title",
                "occup_tech_data",
            )),
            other => Err(SourceError::Query(format!("unknown ability kind `{other}`"))),
        }
    }
}

#[async_trait]
impl RankSource for PgRankSource {
    async fn ability_titles(
        &self,
        kind: &str,
        codes: &[String],
    ) -> Result<HashMap<String, Option<String>>, SourceError> {
        if codes.is_empty() {
            return Ok(HashMap::new());
        }
        let (table, code_col, title_col, _) = Self::tables(kind)?;
        let sql = format!("SELECT {code_col} AS code, {title_col} AS title FROM {table} WHERE {code_col} = ANY($1)");

        let rows: Vec<(String, Option<String>)> = sqlx::query_as(&sql)
            .bind(codes)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(code, title)| (code, title.map(|t| strip_linebreaks(&t))))
            .collect())
    }

    async fn occupation_matches(
        &self,
        kind: &str,
        codes: &[String],
    ) -> Result<Vec<OccupationMatch>, SourceError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let (_, code_col, _, link_table) = Self::tables(kind)?;
        let sql = format!(
            "SELECT o.occupation_code, o.occupation_title, t.{code_col} AS code \
             FROM {link_table} t \
             JOIN occupation_data o ON o.occupation_code = t.occupation_code \
             WHERE t.{code_col} = ANY($1)"
        );

        let rows: Vec<(String, String, String)> = sqlx::query_as(&sql)
            .bind(codes)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(occupation_code, occupation_title, code)| OccupationMatch {
                occupation_code,
                occupation_title: strip_linebreaks(&occupation_title),
                code,
            })
            .collect())
    }

    async fn anzsco_for_occupations(
        &self,
        occupation_codes: &[String],
        industry: Option<&str>,
    ) -> Result<Vec<OccupationAnzsco>, SourceError> {
        if occupation_codes.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(String, String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT DISTINCT \
                    os.occupation_code, \
                    oa.anzsco_code AS code, \
                    ad.anzsco_title AS title, \
                    ad.anzsco_description AS description \
             FROM occup_soc_data os \
             JOIN soc_isco_data si ON si.usa_soc_code = os.usa_soc_code \
             JOIN isco_osca_data io ON io.isco_code = si.isco_code \
             JOIN osca_anzsco_data oa ON oa.osca_code = io.osca_code \
             LEFT JOIN anzsco_data ad ON ad.anzsco_code = oa.anzsco_code \
             LEFT JOIN anzsco_industry_map m ON m.anzsco_code = ad.anzsco_code \
             LEFT JOIN industry_dim i ON i.industry_id = m.industry_id \
             WHERE os.occupation_code = ANY($1) \
               AND ($2 = '' OR (i.industry_name IS NOT NULL \
                    AND LOWER(i.industry_name) LIKE '%' || LOWER($2) || '%'))",
        )
        .bind(occupation_codes)
        .bind(industry.unwrap_or(""))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(occupation_code, code, title, description)| OccupationAnzsco {
                occupation_code,
                code,
                title: title.map(|t| strip_linebreaks(&t)),
                description: description.map(|d| strip_linebreaks(&d)),
            })
            .collect())
    }
}
