use crate::document::{DocId, Document};
use crate::error::{Error, Result};
use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// The four structures that make up a built index. Saved and loaded as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    /// token -> ids of documents containing it
    pub postings: HashMap<String, BTreeSet<DocId>>,
    pub catalog: HashMap<DocId, Document>,
    /// doc id -> token -> occurrences
    pub term_frequencies: HashMap<DocId, HashMap<String, u32>>,
    /// doc id -> total token count
    pub doc_lengths: HashMap<DocId, u32>,
}

impl IndexState {
    pub fn num_docs(&self) -> usize {
        self.catalog.len()
    }

    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }

    /// Check the cross-structure invariants a built index always satisfies.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for id in self.catalog.keys() {
            let Some(tf) = self.term_frequencies.get(id) else {
                return Err(format!("document {id} has no term frequency entry"));
            };
            let total: u32 = tf.values().sum();
            let len = self.doc_lengths.get(id).copied().unwrap_or(0);
            if total != len {
                return Err(format!("document {id}: length {len} but term counts sum to {total}"));
            }
            for token in tf.keys() {
                if !self.postings.get(token).is_some_and(|ids| ids.contains(id)) {
                    return Err(format!("document {id}: token {token:?} missing from postings"));
                }
            }
        }
        for (token, ids) in &self.postings {
            for id in ids {
                if !self.term_frequencies.get(id).is_some_and(|tf| tf.contains_key(token)) {
                    return Err(format!("posting {token:?} lists document {id} which never contains it"));
                }
            }
        }
        Ok(())
    }
}

pub struct InvertedIndex {
    state: IndexState,
    tokenizer: Arc<dyn Tokenizer>,
}

impl fmt::Debug for InvertedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvertedIndex")
            .field("num_docs", &self.state.num_docs())
            .field("num_terms", &self.state.num_terms())
            .field("tokenizer", &self.tokenizer.signature())
            .finish()
    }
}

impl InvertedIndex {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { state: IndexState::default(), tokenizer }
    }

    pub fn with_tokenizer<T: Tokenizer + 'static>(tokenizer: T) -> Self {
        Self::new(Arc::new(tokenizer))
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    pub fn state(&self) -> &IndexState {
        &self.state
    }

    pub(crate) fn replace_state(&mut self, state: IndexState) {
        self.state = state;
    }

    /// Index a document collection, discarding whatever the index held before.
    ///
    /// A document id seen more than once keeps only its last record.
    pub fn build<I: IntoIterator<Item = Document>>(&mut self, documents: I) {
        let mut unique: BTreeMap<DocId, Document> = BTreeMap::new();
        for doc in documents {
            if let Some(prev) = unique.insert(doc.id, doc) {
                tracing::warn!(doc_id = prev.id, "duplicate document id, keeping the last record");
            }
        }

        self.state = IndexState::default();
        for doc in unique.into_values() {
            self.add_document(doc);
        }
        tracing::info!(num_docs = self.state.num_docs(), num_terms = self.state.num_terms(), "index build complete");
    }

    fn add_document(&mut self, doc: Document) {
        let doc_id = doc.id;
        let tokens = self.tokenizer.tokenize(&doc.indexed_text());
        let counts = self.state.term_frequencies.entry(doc_id).or_default();
        for token in &tokens {
            self.state.postings.entry(token.clone()).or_default().insert(doc_id);
            *counts.entry(token.clone()).or_insert(0) += 1;
        }
        self.state.doc_lengths.insert(doc_id, tokens.len() as u32);
        self.state.catalog.insert(doc_id, doc);
    }

    /// Ids of documents containing the first token of `term`, ascending.
    pub fn lookup(&self, term: &str) -> Vec<DocId> {
        let tokens = self.tokenizer.tokenize(term);
        let Some(first) = tokens.first() else {
            return Vec::new();
        };
        self.state
            .postings
            .get(first)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Occurrences of a single-token `term` in a document; 0 for unknown documents.
    pub fn frequency(&self, doc_id: DocId, term: &str) -> Result<u32> {
        let token = self.single_token(term)?;
        Ok(self.token_frequency(doc_id, &token))
    }

    pub(crate) fn single_token(&self, term: &str) -> Result<String> {
        let mut tokens = self.tokenizer.tokenize(term);
        if tokens.len() != 1 {
            return Err(Error::InvalidTerm { term: term.to_string(), tokens: tokens.len() });
        }
        Ok(tokens.remove(0))
    }

    pub(crate) fn token_frequency(&self, doc_id: DocId, token: &str) -> u32 {
        self.state
            .term_frequencies
            .get(&doc_id)
            .and_then(|counts| counts.get(token))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn document_frequency(&self, token: &str) -> usize {
        self.state.postings.get(token).map_or(0, BTreeSet::len)
    }

    pub(crate) fn postings(&self, token: &str) -> Option<&BTreeSet<DocId>> {
        self.state.postings.get(token)
    }

    pub fn doc_length(&self, doc_id: DocId) -> u32 {
        self.state.doc_lengths.get(&doc_id).copied().unwrap_or(0)
    }

    /// Mean token count over all documents, 0.0 for an empty index.
    pub fn average_doc_length(&self) -> f64 {
        let lengths = &self.state.doc_lengths;
        if lengths.is_empty() {
            return 0.0;
        }
        let total: u64 = lengths.values().map(|&l| l as u64).sum();
        total as f64 / lengths.len() as f64
    }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> {
        self.state.catalog.get(&doc_id)
    }

    pub fn num_docs(&self) -> usize {
        self.state.num_docs()
    }

    pub fn num_terms(&self) -> usize {
        self.state.num_terms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::WhitespaceTokenizer;

    fn corpus() -> InvertedIndex {
        let mut idx = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
        idx.build(vec![
            Document::new(1, "red fox", "runs"),
            Document::new(2, "red dog", "sleeps"),
            Document::new(3, "blue fox", "sleeps"),
        ]);
        idx
    }

    #[test]
    fn lookup_is_sorted_and_uses_first_token() {
        let idx = corpus();
        assert_eq!(idx.lookup("fox"), vec![1, 3]);
        assert_eq!(idx.lookup("FOX dog"), vec![1, 3]);
        assert!(idx.lookup("   ").is_empty());
        assert!(idx.lookup("cat").is_empty());
    }

    #[test]
    fn frequency_counts_and_unknowns() {
        let mut idx = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
        idx.build(vec![Document::new(5, "hello hello", "hello world")]);
        assert_eq!(idx.frequency(5, "hello").unwrap(), 3);
        assert_eq!(idx.frequency(5, "absent").unwrap(), 0);
        assert_eq!(idx.frequency(99, "hello").unwrap(), 0);
    }

    #[test]
    fn frequency_rejects_multi_and_zero_token_terms() {
        let idx = corpus();
        assert!(matches!(idx.frequency(42, "red fox"), Err(Error::InvalidTerm { tokens: 2, .. })));
        assert!(matches!(idx.frequency(1, ""), Err(Error::InvalidTerm { tokens: 0, .. })));
    }

    #[test]
    fn lengths_match_term_counts() {
        let idx = corpus();
        assert_eq!(idx.doc_length(1), 3);
        assert_eq!(idx.average_doc_length(), 3.0);
        assert!(idx.state().validate().is_ok());
    }

    #[test]
    fn empty_text_still_gets_entries() {
        let mut idx = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
        idx.build(vec![Document::new(1, "", "  ")]);
        assert_eq!(idx.num_docs(), 1);
        assert_eq!(idx.doc_length(1), 0);
        assert!(idx.state().term_frequencies[&1].is_empty());
        assert_eq!(idx.average_doc_length(), 0.0);
    }

    #[test]
    fn empty_index_average_is_zero() {
        let idx = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
        assert_eq!(idx.average_doc_length(), 0.0);
    }

    #[test]
    fn rebuild_discards_previous_documents() {
        let mut idx = corpus();
        idx.build(vec![Document::new(9, "green", "frog")]);
        assert_eq!(idx.num_docs(), 1);
        assert!(idx.lookup("fox").is_empty());
        assert_eq!(idx.lookup("frog"), vec![9]);
    }

    #[test]
    fn duplicate_ids_keep_last_record() {
        let mut idx = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
        idx.build(vec![Document::new(1, "old", "text"), Document::new(1, "new", "words here")]);
        assert_eq!(idx.num_docs(), 1);
        assert!(idx.lookup("old").is_empty());
        assert_eq!(idx.doc_length(1), 3);
        assert_eq!(idx.document(1).unwrap().title, "new");
        assert!(idx.state().validate().is_ok());
    }

    #[test]
    fn validate_detects_length_mismatch() {
        let mut idx = corpus();
        let mut state = idx.state().clone();
        state.doc_lengths.insert(1, 10);
        idx.replace_state(state);
        assert!(idx.state().validate().is_err());
    }
}
