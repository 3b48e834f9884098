use kwsearch_core::persist::{load_meta, IndexPaths};
use kwsearch_core::{Bm25Params, Document, Error, InvertedIndex, StandardTokenizer, WhitespaceTokenizer};
use serde_json::json;
use std::sync::Arc;

fn animals() -> Vec<Document> {
    vec![
        Document::new(1, "red fox", "runs"),
        Document::new(2, "red dog", "sleeps"),
        Document::new(3, "blue fox", "sleeps"),
    ]
}

fn animal_index() -> InvertedIndex {
    let mut idx = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
    idx.build(animals());
    idx
}

#[test]
fn three_document_scenario() {
    let idx = animal_index();
    assert_eq!(idx.lookup("fox"), vec![1, 3]);
    assert_eq!(idx.frequency(1, "red").unwrap(), 1);
    assert!((idx.idf("red").unwrap() - 0.47).abs() < 0.005);

    let hits = idx.search("fox sleeps", Bm25Params::default(), 5);
    assert_eq!(hits[0].doc_id, 3);
    assert!(hits[1..].iter().all(|h| h.score < hits[0].score));
}

#[test]
fn multi_token_frequency_is_invalid() {
    let idx = animal_index();
    match idx.frequency(42, "red fox") {
        Err(Error::InvalidTerm { term, tokens }) => {
            assert_eq!(term, "red fox");
            assert_eq!(tokens, 2);
        }
        other => panic!("expected InvalidTerm, got {other:?}"),
    }
}

#[test]
fn load_without_save_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("never-built"));
    let err = InvertedIndex::open(&paths, Arc::new(WhitespaceTokenizer)).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(err.to_string().contains("run build first"));
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("cache"));

    let mut idx = InvertedIndex::with_tokenizer(StandardTokenizer::default());
    let mut record = json!({"id": 10, "title": "Paddington", "description": "A bear moves to London."});
    record["year"] = json!(2014);
    idx.build(vec![
        Document::from_value(record).unwrap(),
        Document::new(11, "Paddington 2", "The bear takes a job to buy a present."),
    ]);
    let saved = idx.save(&paths).unwrap();

    let loaded = InvertedIndex::open(&paths, Arc::new(StandardTokenizer::default())).unwrap();
    assert_eq!(loaded.state(), idx.state());
    assert_eq!(loaded.document(10).unwrap().extra_value("year"), Some(json!(2014)));
    assert_eq!(load_meta(&paths).unwrap(), saved);

    let p = Bm25Params::default();
    assert_eq!(loaded.search("bear london", p, 5), idx.search("bear london", p, 5));
}

#[test]
fn load_replaces_current_state() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    animal_index().save(&paths).unwrap();

    let mut other = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
    other.build(vec![Document::new(99, "green", "frog")]);
    other.load(&paths).unwrap();
    assert!(other.document(99).is_none());
    assert_eq!(other.num_docs(), 3);
}

#[test]
fn empty_index_round_trips_and_is_distinct_from_missing() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let mut empty = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
    empty.build(Vec::new());
    empty.save(&paths).unwrap();

    let loaded = InvertedIndex::open(&paths, Arc::new(WhitespaceTokenizer)).unwrap();
    assert_eq!(loaded.num_docs(), 0);
    assert!(loaded.search("anything", Bm25Params::default(), 5).is_empty());
    assert_eq!(loaded.idf("anything").unwrap(), 0.0);
}

#[test]
fn resave_overwrites_previous_build() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    animal_index().save(&paths).unwrap();

    let mut idx = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
    idx.build(vec![Document::new(7, "only", "one")]);
    idx.save(&paths).unwrap();

    let loaded = InvertedIndex::open(&paths, Arc::new(WhitespaceTokenizer)).unwrap();
    assert_eq!(loaded.num_docs(), 1);
    assert!(loaded.lookup("fox").is_empty());
}
