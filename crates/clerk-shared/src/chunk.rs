//! Retrieved evidence chunks.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Evidence source lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Jurisdiction-local documents
    Local,
    /// Authoritative (statute, state guidance) corpus
    State,
}

impl Lane {
    /// Citation token prefix
    pub fn token_prefix(&self) -> &'static str {
        match self {
            Lane::Local => "L",
            Lane::State => "S",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lane::Local => write!(f, "local"),
            Lane::State => write!(f, "state"),
        }
    }
}

/// A retrieved evidence unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub lane: Lane,
    pub title: String,
    pub content: String,
    /// Relevance score, 0.0-1.0
    pub score: f32,
    pub document_ids: Vec<String>,
}

impl Chunk {
    pub fn new(lane: Lane, title: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
        Self {
            lane,
            title: title.into(),
            content: content.into(),
            score,
            document_ids: Vec::new(),
        }
    }

    pub fn with_document(mut self, id: impl Into<String>) -> Self {
        self.document_ids.push(id.into());
        self
    }

    /// Title and content joined for scanning
    pub fn text(&self) -> String {
        format!("{}\n{}", self.title, self.content)
    }
}

/// Lowercase, extension-free, punctuation-free title used as the dedupe key
pub fn normalize_title(title: &str) -> String {
    let lower = title.trim().to_lowercase();
    let stem = match lower.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && is_file_extension(ext) => stem.to_string(),
        _ => lower,
    };
    stem.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_file_extension(ext: &str) -> bool {
    (1..=4).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Deduplicate by normalized title, keeping the higher-scored instance
///
/// The surviving chunk takes the position of the first occurrence.
pub fn dedupe_by_title(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut out: Vec<Chunk> = Vec::with_capacity(chunks.len());
    let mut keys: Vec<String> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let key = normalize_title(&chunk.title);
        match keys.iter().position(|k| k == &key) {
            Some(idx) => {
                if chunk.score > out[idx].score {
                    out[idx] = chunk;
                }
            }
            None => {
                keys.push(key);
                out.push(chunk);
            }
        }
    }
    out
}

/// Count of chunks in a lane
pub fn lane_count(chunks: &[Chunk], lane: Lane) -> usize {
    chunks.iter().filter(|c| c.lane == lane).count()
}

/// Distinct underlying documents in a lane (title stands in when ids are missing)
pub fn distinct_documents(chunks: &[Chunk], lane: Lane) -> usize {
    let mut seen: HashSet<String> = HashSet::new();
    for chunk in chunks.iter().filter(|c| c.lane == lane) {
        if chunk.document_ids.is_empty() {
            seen.insert(normalize_title(&chunk.title));
        } else {
            for id in &chunk.document_ids {
                seen.insert(id.clone());
            }
        }
    }
    seen.len()
}
