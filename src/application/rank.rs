//! Occupation ranking by selected ability codes.
//!
//! Consults the cache directly (bypassable with the refresh flag) instead of
//! going through single-flight: the key space here is wide and user-shaped,
//! so collisions between concurrent misses are rare while the computation
//! fans out into several queries. Empty results are cached briefly so a
//! fruitless selection does not hammer the store; non-empty results live for
//! hours.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{Cache, keys};
use crate::domain::{DomainError, Selection};

use super::error::AppError;
use super::sources::RankSource;

const POSITIVE_TTL: Duration = Duration::from_secs(18 * 60 * 60);
const NEGATIVE_TTL: Duration = Duration::from_secs(120);
const KNOWN_KINDS: [&str; 3] = ["knowledge", "skill", "tech"];
const CATEGORY_COVERAGE_WEIGHT: f64 = 0.1;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct RankRequest {
    pub selections: Vec<Selection>,
    pub industry: Option<String>,
    pub limit: Option<usize>,
    /// Bypass the cache read path; the result is still written back.
    pub refresh: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankResponse {
    pub total_selected: usize,
    pub industry: Option<String>,
    pub limit: usize,
    pub items: Vec<RankedOccupation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOccupation {
    pub occupation_code: String,
    pub occupation_title: String,
    pub score: f64,
    pub count: usize,
    pub unmatched: UnmatchedCodes,
    pub anzsco: Vec<AnzscoEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedCodes {
    pub knowledge: Vec<CodeTitle>,
    pub skill: Vec<CodeTitle>,
    pub tech: Vec<CodeTitle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTitle {
    pub code: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnzscoEntry {
    pub code: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Ranking result plus whether it came from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct RankOutcome {
    pub cached: bool,
    pub response: RankResponse,
}

pub struct RankService {
    cache: Cache,
    source: Arc<dyn RankSource>,
}

impl RankService {
    pub fn new(cache: Cache, source: Arc<dyn RankSource>) -> Self {
        Self { cache, source }
    }

    pub async fn rank(&self, request: RankRequest) -> Result<RankOutcome, AppError> {
        let selections: Vec<Selection> = request
            .selections
            .iter()
            .filter_map(Selection::normalized)
            .filter(|sel| KNOWN_KINDS.contains(&sel.kind.as_str()))
            .collect();
        if selections.is_empty() {
            return Err(DomainError::validation("no codes provided").into());
        }

        let industry = request
            .industry
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let limit = request.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let scope = keys::industry_scope(industry.as_deref());
        let key = keys::rank_key(&scope, &keys::stable_hash(&selections));

        if !request.refresh {
            if let Some(hit) = self.cache.get::<RankResponse>(&key).await? {
                return Ok(RankOutcome {
                    cached: true,
                    response: hit,
                });
            }
        }

        let response = self
            .compute(&selections, industry.as_deref(), limit)
            .await?;

        let ttl = if response.items.is_empty() {
            NEGATIVE_TTL
        } else {
            POSITIVE_TTL
        };
        // A failed write-back is worth a warning, not a failed request.
        if let Err(err) = self.cache.set(&key, &response, Some(ttl)).await {
            warn!(key = %key, error = %err, "Failed to cache rank response");
        }

        Ok(RankOutcome {
            cached: false,
            response,
        })
    }

    async fn compute(
        &self,
        selections: &[Selection],
        industry: Option<&str>,
        limit: usize,
    ) -> Result<RankResponse, AppError> {
        // Per-kind deduplicated code sets; BTree keeps output deterministic.
        let mut by_kind: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for sel in selections {
            by_kind
                .entry(match sel.kind.as_str() {
                    "knowledge" => "knowledge",
                    "skill" => "skill",
                    _ => "tech",
                })
                .or_default()
                .insert(sel.code.clone());
        }

        let mut titles: BTreeMap<&str, std::collections::HashMap<String, Option<String>>> =
            BTreeMap::new();
        let mut aggregates: BTreeMap<String, OccupationAggregate> = BTreeMap::new();

        for (&kind, codes) in &by_kind {
            let codes: Vec<String> = codes.iter().cloned().collect();
            titles.insert(kind, self.source.ability_titles(kind, &codes).await?);

            for hit in self.source.occupation_matches(kind, &codes).await? {
                let entry = aggregates
                    .entry(hit.occupation_code.clone())
                    .or_insert_with(|| OccupationAggregate::new(hit.occupation_title.clone()));
                entry.matched(kind).insert(hit.code);
            }
        }

        let mut items: Vec<RankedOccupation> = aggregates
            .into_iter()
            .map(|(occupation_code, agg)| {
                let kc = agg.knowledge.len();
                let sc = agg.skill.len();
                let tc = agg.tech.len();
                let categories = [kc, sc, tc].iter().filter(|n| **n > 0).count();
                let score =
                    (kc + sc + tc) as f64 + categories as f64 * CATEGORY_COVERAGE_WEIGHT;

                let unmatched = UnmatchedCodes {
                    knowledge: unmatched_codes(
                        by_kind.get("knowledge"),
                        &agg.knowledge,
                        titles.get("knowledge"),
                    ),
                    skill: unmatched_codes(by_kind.get("skill"), &agg.skill, titles.get("skill")),
                    tech: unmatched_codes(by_kind.get("tech"), &agg.tech, titles.get("tech")),
                };

                RankedOccupation {
                    occupation_code,
                    occupation_title: agg.title,
                    score,
                    count: kc + sc + tc,
                    unmatched,
                    anzsco: Vec::new(),
                }
            })
            .collect();

        items.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.occupation_title.cmp(&b.occupation_title))
        });

        let occupation_codes: Vec<String> =
            items.iter().map(|i| i.occupation_code.clone()).collect();
        let mut mappings: BTreeMap<String, Vec<AnzscoEntry>> = BTreeMap::new();
        for row in self
            .source
            .anzsco_for_occupations(&occupation_codes, industry)
            .await?
        {
            mappings
                .entry(row.occupation_code)
                .or_default()
                .push(AnzscoEntry {
                    code: row.code,
                    title: row.title,
                    description: row.description,
                });
        }

        let items: Vec<RankedOccupation> = items
            .into_iter()
            .filter_map(|mut item| {
                item.anzsco = mappings.remove(&item.occupation_code)?;
                (!item.anzsco.is_empty()).then_some(item)
            })
            .take(limit)
            .collect();

        Ok(RankResponse {
            total_selected: selections.len(),
            industry: industry.map(str::to_string),
            limit,
            items,
        })
    }
}

struct OccupationAggregate {
    title: String,
    knowledge: BTreeSet<String>,
    skill: BTreeSet<String>,
    tech: BTreeSet<String>,
}

impl OccupationAggregate {
    fn new(title: String) -> Self {
        Self {
            title,
            knowledge: BTreeSet::new(),
            skill: BTreeSet::new(),
            tech: BTreeSet::new(),
        }
    }

    fn matched(&mut self, kind: &str) -> &mut BTreeSet<String> {
        match kind {
            "knowledge" => &mut self.knowledge,
            "skill" => &mut self.skill,
            _ => &mut self.tech,
        }
    }
}

fn unmatched_codes(
    selected: Option<&BTreeSet<String>>,
    matched: &BTreeSet<String>,
    titles: Option<&std::collections::HashMap<String, Option<String>>>,
) -> Vec<CodeTitle> {
    let Some(selected) = selected else {
        return Vec::new();
    };
    selected
        .iter()
        .filter(|code| !matched.contains(*code))
        .map(|code| CodeTitle {
            code: code.clone(),
            title: titles.and_then(|t| t.get(code).cloned()).flatten(),
        })
        .collect()
}
