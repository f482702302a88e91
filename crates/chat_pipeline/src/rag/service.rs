//! RAG service: reformulation, search, ranking, citation bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chat_core::Message;
use chrono::{DateTime, Utc};
use provider_llm::AuxModel;

use crate::context::Citation;
use crate::error::PipelineError;
use crate::rag::search::{SearchClient, SearchDoc};
use crate::rag::KnowledgeBaseConfig;

/// Fetch this many times the requested top-K, so dedup and diversity
/// capping still leave enough candidates.
const OVERFETCH_FACTOR: usize = 3;

/// Linear recency falloff window.
const RECENCY_WINDOW_DAYS: i64 = 365;

/// Blend weights for the combined ranking score.
const RELEVANCE_WEIGHT: f64 = 0.7;
const RECENCY_WEIGHT: f64 = 0.3;

/// Results older than the window with relevance below this are dropped
/// outright.
const STALE_RELEVANCE_FLOOR: f64 = 0.35;

/// Semantic reranker scores are roughly 0..4; normalize into 0..1.
const RERANKER_SCALE: f64 = 4.0;

const REFORMULATION_SYSTEM: &str = "You rewrite a chat request into a concise search query. \
Replace relative time expressions (\"this week\", \"last month\") with concrete month and year \
references based on the current date given. Respond with JSON: {\"query\": \"...\"}.";

/// Result of augmentation: the numbered source block and its citations.
#[derive(Clone, Debug)]
pub struct RagOutcome {
    pub source_block: String,
    pub citations: Vec<Citation>,
    pub system_prompt_override: Option<String>,
}

pub struct RagService {
    aux: Arc<dyn AuxModel>,
    search: Arc<dyn SearchClient>,
    reformulation_enabled: bool,
}

impl RagService {
    pub fn new(
        aux: Arc<dyn AuxModel>,
        search: Arc<dyn SearchClient>,
        reformulation_enabled: bool,
    ) -> Self {
        Self {
            aux,
            search,
            reformulation_enabled,
        }
    }

    /// Rewrite the user's request into a concise search string.
    ///
    /// Skipped entirely when reformulation is configured off; a failed
    /// call falls back to the raw user text.
    pub async fn reformulate(&self, query: &str, recent: &[Message], now: DateTime<Utc>) -> String {
        if !self.reformulation_enabled {
            return query.to_string();
        }

        let window: Vec<String> = recent
            .iter()
            .rev()
            .take(4)
            .rev()
            .map(|m| m.text())
            .collect();
        let user = format!(
            "Current date: {}\nRecent messages:\n{}\nCurrent request: {}",
            now.format("%Y-%m-%d"),
            window.join("\n"),
            query
        );

        match self.aux.structured(REFORMULATION_SYSTEM, &user).await {
            Ok(value) => value["query"]
                .as_str()
                .filter(|q| !q.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| query.to_string()),
            Err(e) => {
                log::warn!("query reformulation failed, using raw text: {e}");
                query.to_string()
            }
        }
    }

    /// Execute hybrid search and rank the candidates.
    pub async fn retrieve(
        &self,
        query: &str,
        kb: &KnowledgeBaseConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<SearchDoc>, PipelineError> {
        let candidates = self
            .search
            .hybrid_search(
                query,
                kb.top_k * OVERFETCH_FACTOR,
                &kb.semantic_configuration,
                &kb.vector_field,
            )
            .await?;

        Ok(rank_candidates(
            candidates,
            kb.top_k,
            kb.per_source_cap,
            now,
        ))
    }

    /// Full augmentation: reformulate, retrieve, and format the numbered
    /// source block with its parallel citation list.
    pub async fn augment(
        &self,
        user_query: &str,
        recent: &[Message],
        kb: &KnowledgeBaseConfig,
        citation_offset: usize,
    ) -> Result<Option<RagOutcome>, PipelineError> {
        let now = Utc::now();
        let query = self.reformulate(user_query, recent, now).await;
        log::debug!("rag search query: {query}");

        let docs = self.retrieve(&query, kb, now).await?;
        if docs.is_empty() {
            return Ok(None);
        }

        let (source_block, citations) = format_sources(&docs, citation_offset);
        Ok(Some(RagOutcome {
            source_block,
            citations,
            system_prompt_override: kb.system_prompt.clone(),
        }))
    }
}

/// Dedup by chunk identity, cap chunks per source document, then rank by
/// blended relevance/recency and keep the top K.
pub fn rank_candidates(
    candidates: Vec<SearchDoc>,
    top_k: usize,
    per_source_cap: usize,
    now: DateTime<Utc>,
) -> Vec<SearchDoc> {
    let mut seen_chunks: HashSet<String> = HashSet::new();
    let mut per_source: HashMap<String, usize> = HashMap::new();

    let mut scored: Vec<(f64, SearchDoc)> = candidates
        .into_iter()
        .filter(|doc| seen_chunks.insert(doc.chunk_id.clone()))
        .filter_map(|doc| {
            let relevance = (doc.score / RERANKER_SCALE).clamp(0.0, 1.0);
            let recency = recency_score(doc.date, now);
            if recency == 0.0 && relevance < STALE_RELEVANCE_FLOOR {
                return None;
            }
            let combined = RELEVANCE_WEIGHT * relevance + RECENCY_WEIGHT * recency;
            Some((combined, doc))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .filter(|(_, doc)| {
            let count = per_source.entry(doc.url.clone()).or_insert(0);
            *count += 1;
            *count <= per_source_cap
        })
        .map(|(_, doc)| doc)
        .take(top_k)
        .collect()
}

/// Linear falloff from 1.0 (today) to 0.0 (a year old or undated).
fn recency_score(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(date) = date else {
        return 0.0;
    };
    let age_days = (now - date).num_days();
    if age_days < 0 {
        return 1.0;
    }
    (1.0 - age_days as f64 / RECENCY_WINDOW_DAYS as f64).max(0.0)
}

/// Format the numbered source block and its parallel citation list.
/// Numbering continues from `offset` so citations stay globally
/// sequential across sources.
pub fn format_sources(docs: &[SearchDoc], offset: usize) -> (String, Vec<Citation>) {
    let mut block = String::from("Sources:\n");
    let mut citations = Vec::with_capacity(docs.len());

    for (i, doc) in docs.iter().enumerate() {
        let number = offset + i + 1;
        let date = doc.date.map(|d| d.format("%Y-%m-%d").to_string());
        block.push_str(&format!(
            "[{number}] {} ({})\n{}\n\n",
            doc.title,
            date.as_deref().unwrap_or("undated"),
            doc.chunk
        ));
        citations.push(Citation {
            number,
            title: doc.title.clone(),
            url: doc.url.clone(),
            date,
        });
    }

    (block, citations)
}
