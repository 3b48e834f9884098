//! BM25 ranking over an [`InvertedIndex`].
//!
//! IDF uses the `+1` form, `ln((n - df + 0.5) / (df + 0.5) + 1)`, which never
//! goes negative for very common terms.

use crate::document::DocId;
use crate::error::Result;
use crate::index::InvertedIndex;
use serde::Serialize;
use std::collections::BTreeSet;

pub const DEFAULT_K1: f64 = 1.5;
pub const DEFAULT_B: f64 = 0.75;
pub const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f64,
    /// Length normalization strength, 0 disables it.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: DEFAULT_K1, b: DEFAULT_B }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
}

impl InvertedIndex {
    /// BM25 inverse document frequency of a single-token term.
    pub fn idf(&self, term: &str) -> Result<f64> {
        let token = self.single_token(term)?;
        Ok(self.token_idf(&token))
    }

    /// Length-normalized term frequency of a single-token term in one document.
    pub fn tf_component(&self, doc_id: DocId, term: &str, params: Bm25Params) -> Result<f64> {
        let tf = self.frequency(doc_id, term)?;
        Ok(self.saturated_tf(doc_id, tf, self.average_doc_length(), params))
    }

    pub fn score(&self, doc_id: DocId, term: &str, params: Bm25Params) -> Result<f64> {
        Ok(self.idf(term)? * self.tf_component(doc_id, term, params)?)
    }

    /// Rank documents against `query`, best first, at most `limit` hits.
    ///
    /// Documents whose summed score is not strictly positive are dropped.
    /// Equal scores keep ascending document id order.
    pub fn search(&self, query: &str, params: Bm25Params, limit: usize) -> Vec<SearchHit> {
        let tokens = self.tokenizer().tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let candidates: BTreeSet<DocId> = tokens
            .iter()
            .filter_map(|tok| self.postings(tok))
            .flatten()
            .copied()
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let avg_len = self.average_doc_length();
        let idfs: Vec<f64> = tokens.iter().map(|tok| self.token_idf(tok)).collect();

        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .map(|doc_id| {
                let score: f64 = tokens
                    .iter()
                    .zip(&idfs)
                    .map(|(tok, idf)| {
                        let tf = self.token_frequency(doc_id, tok);
                        idf * self.saturated_tf(doc_id, tf, avg_len, params)
                    })
                    .sum();
                SearchHit { doc_id, score }
            })
            .filter(|hit| hit.score > 0.0)
            .collect();
        tracing::debug!(query, tokens = tokens.len(), matched = hits.len(), "bm25 search");

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        hits
    }

    fn token_idf(&self, token: &str) -> f64 {
        let n = self.num_docs() as f64;
        if n == 0.0 {
            return 0.0;
        }
        let df = self.document_frequency(token) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn saturated_tf(&self, doc_id: DocId, tf: u32, avg_len: f64, params: Bm25Params) -> f64 {
        let doc_len = self.doc_length(doc_id) as f64;
        if doc_len == 0.0 || avg_len == 0.0 {
            return 0.0;
        }
        let tf = tf as f64;
        let length_norm = 1.0 - params.b + params.b * (doc_len / avg_len);
        (tf * (params.k1 + 1.0)) / (tf + params.k1 * length_norm)
    }
}
