pub mod bm25;
pub mod document;
pub mod error;
pub mod index;
pub mod persist;
pub mod tokenizer;

pub use bm25::{Bm25Params, SearchHit, DEFAULT_B, DEFAULT_K1, DEFAULT_LIMIT};
pub use document::{DocId, Document};
pub use error::{Error, Result};
pub use index::{IndexState, InvertedIndex};
pub use persist::{IndexPaths, MetaFile};
pub use tokenizer::{StandardTokenizer, StopWords, Tokenizer, WhitespaceTokenizer};
