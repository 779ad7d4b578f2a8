//! Knowledge base loading and retrieval

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{KnowledgeCategory, KnowledgeError};

/// Shown to the model when nothing relevant was found
pub const NO_KNOWLEDGE: &str = "No specific knowledge retrieved for this turn.";

const SEED: &str = include_str!("../data/knowledge_base.json");

/// Weight of one trigger phrase found in the query
const PHRASE_WEIGHT: f32 = 1.0;
/// Weight of one word shared between query and entry
const WORD_WEIGHT: f32 = 0.2;
/// Score given to category fallbacks when no entry matched the query
const FALLBACK_SCORE: f32 = 0.5;

/// One piece of sales knowledge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub category: KnowledgeCategory,
    #[serde(default)]
    pub subcategory: String,
    pub content: String,
    /// Phrases in the prospect's words that make this entry relevant.
    /// Compliance entries without phrases always apply.
    #[serde(default)]
    pub trigger_phrases: Vec<String>,
    /// Id of an entry worth pulling in alongside this one
    #[serde(default)]
    pub follow_up_action: Option<String>,
    #[serde(default)]
    pub effectiveness_score: f32,
}

/// Knowledge file format (JSON or YAML)
#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeFile {
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub knowledge_entries: Vec<KnowledgeEntry>,
}

/// An entry selected for a turn
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedEntry {
    pub id: String,
    pub category: KnowledgeCategory,
    pub subcategory: String,
    pub content: String,
    pub score: f32,
}

impl RetrievedEntry {
    fn from_entry(entry: &KnowledgeEntry, score: f32) -> Self {
        Self {
            id: entry.id.clone(),
            category: entry.category,
            subcategory: entry.subcategory.clone(),
            content: entry.content.clone(),
            score,
        }
    }
}

/// In-memory knowledge base
#[derive(Debug)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
    /// Lowercased words of each entry's content and phrases, by position
    words: Vec<HashSet<String>>,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Result<Self, KnowledgeError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.id.trim().is_empty() {
                return Err(KnowledgeError::Invalid("entry with empty id".to_string()));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(KnowledgeError::Invalid(format!("duplicate id {}", entry.id)));
            }
        }

        let words = entries
            .iter()
            .map(|e| {
                let mut set = words_of(&e.content);
                for phrase in &e.trigger_phrases {
                    set.extend(words_of(phrase));
                }
                set
            })
            .collect();

        Ok(Self { entries, words })
    }

    /// Built-in SalesPilot knowledge
    pub fn seed() -> Result<Self, KnowledgeError> {
        Self::from_json_str(SEED)
    }

    pub fn from_json_str(text: &str) -> Result<Self, KnowledgeError> {
        let file: KnowledgeFile =
            serde_json::from_str(text).map_err(|e| KnowledgeError::Parse(e.to_string()))?;
        Self::new(file.knowledge_entries)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, KnowledgeError> {
        let file: KnowledgeFile =
            serde_yaml::from_str(text).map_err(|e| KnowledgeError::Parse(e.to_string()))?;
        Self::new(file.knowledge_entries)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let base = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text)?,
            other => {
                return Err(KnowledgeError::UnsupportedFormat(
                    other.unwrap_or("none").to_string(),
                ))
            }
        };

        tracing::info!(
            path = %path.display(),
            entries = base.len(),
            "Loaded knowledge base"
        );
        Ok(base)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&KnowledgeEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Distinct categories present, in first-seen order
    pub fn categories(&self) -> Vec<KnowledgeCategory> {
        let mut out = Vec::new();
        for entry in &self.entries {
            if !out.contains(&entry.category) {
                out.push(entry.category);
            }
        }
        out
    }

    /// Entries relevant to `query` within `categories`
    ///
    /// Applicable compliance rules come first, then up to `top_k` scored
    /// entries. When nothing in the categories matches the query, the most
    /// effective entries of those categories stand in.
    pub fn retrieve(
        &self,
        query: &str,
        categories: &[KnowledgeCategory],
        top_k: usize,
    ) -> Vec<RetrievedEntry> {
        let query_lower = query.to_lowercase();
        let query_words = words_of(&query_lower);

        let mut results: Vec<RetrievedEntry> = self
            .entries
            .iter()
            .filter(|e| e.category == KnowledgeCategory::ComplianceRules)
            .filter(|e| {
                e.trigger_phrases.is_empty()
                    || e.trigger_phrases
                        .iter()
                        .any(|p| query_lower.contains(&p.to_lowercase()))
            })
            .map(|e| RetrievedEntry::from_entry(e, 1.0))
            .collect();

        let candidates: Vec<usize> = (0..self.entries.len())
            .filter(|&i| {
                let category = self.entries[i].category;
                category != KnowledgeCategory::ComplianceRules && categories.contains(&category)
            })
            .collect();

        let mut scored: Vec<(usize, f32)> = candidates
            .iter()
            .map(|&i| (i, self.score(i, &query_lower, &query_words)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        if scored.is_empty() {
            scored = candidates.iter().map(|&i| (i, FALLBACK_SCORE)).collect();
        }

        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1).then(
                self.entries[b.0]
                    .effectiveness_score
                    .total_cmp(&self.entries[a.0].effectiveness_score),
            )
        });
        scored.truncate(top_k);

        let mut picked: Vec<RetrievedEntry> = scored
            .iter()
            .map(|&(i, score)| RetrievedEntry::from_entry(&self.entries[i], score))
            .collect();

        // Follow-ups fill any remaining room
        for &(i, score) in &scored {
            if picked.len() >= top_k {
                break;
            }
            let Some(next) = self.entries[i]
                .follow_up_action
                .as_deref()
                .and_then(|id| self.get(id))
            else {
                continue;
            };
            if next.category != KnowledgeCategory::ComplianceRules
                && !picked.iter().any(|p| p.id == next.id)
            {
                picked.push(RetrievedEntry::from_entry(next, score / 2.0));
            }
        }

        results.extend(picked);
        results
    }

    fn score(&self, index: usize, query_lower: &str, query_words: &HashSet<String>) -> f32 {
        let entry = &self.entries[index];
        let phrase_hits = entry
            .trigger_phrases
            .iter()
            .filter(|p| query_lower.contains(&p.to_lowercase()))
            .count();
        let shared = self.words[index].intersection(query_words).count();
        phrase_hits as f32 * PHRASE_WEIGHT + shared as f32 * WORD_WEIGHT
    }

    /// Render retrieved entries for a prompt
    ///
    /// Compliance rules are left out; the base prompt already carries them.
    pub fn format_for_prompt(entries: &[RetrievedEntry]) -> String {
        let lines: Vec<String> = entries
            .iter()
            .filter(|e| e.category != KnowledgeCategory::ComplianceRules)
            .map(|e| format!("[{}/{}] {}", e.category, e.subcategory, e.content))
            .collect();

        if lines.is_empty() {
            NO_KNOWLEDGE.to_string()
        } else {
            lines.join("\n\n")
        }
    }
}

/// Lowercased words of four letters or more
fn words_of(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(|w| w.to_lowercase())
        .collect()
}
