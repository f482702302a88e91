//! Retrieval-augmented generation.
//!
//! Knowledge-base lookup, query reformulation, hybrid search with
//! dedup/diversity/recency ranking, and citation bookkeeping.

pub mod search;
pub mod service;

pub use service::{RagOutcome, RagService};

/// Per-knowledge-base search configuration.
#[derive(Clone, Debug)]
pub struct KnowledgeBaseConfig {
    pub bot_id: String,
    /// System prompt override injected for this knowledge base
    pub system_prompt: Option<String>,
    pub top_k: usize,
    pub semantic_configuration: String,
    pub vector_field: String,
    /// Cap on chunks drawn from one source document
    pub per_source_cap: usize,
}

/// Registry of configured knowledge-base agents.
#[derive(Clone, Debug, Default)]
pub struct KnowledgeBaseRegistry {
    entries: Vec<KnowledgeBaseConfig>,
}

impl KnowledgeBaseRegistry {
    pub fn new(entries: Vec<KnowledgeBaseConfig>) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, bot_id: &str) -> Option<&KnowledgeBaseConfig> {
        self.entries.iter().find(|e| e.bot_id == bot_id)
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            KnowledgeBaseConfig {
                bot_id: "msf_communications".to_string(),
                system_prompt: Some(
                    "You answer questions using the organization's communications archive. \
                     Cite sources by their bracketed numbers."
                        .to_string(),
                ),
                top_k: 5,
                semantic_configuration: "default".to_string(),
                vector_field: "content_vector".to_string(),
                per_source_cap: 2,
            },
            KnowledgeBaseConfig {
                bot_id: "policy_handbook".to_string(),
                system_prompt: None,
                top_k: 5,
                semantic_configuration: "default".to_string(),
                vector_field: "content_vector".to_string(),
                per_source_cap: 2,
            },
        ])
    }
}
