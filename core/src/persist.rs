//! Saving and loading an index as one envelope file.
//!
//! The envelope is `index.bin` inside the index directory: a [`MetaFile`]
//! header followed by the [`IndexState`], bincode-encoded. Writes go to a
//! temporary sibling first and are renamed into place.

use crate::error::{Error, Result};
use crate::index::{IndexState, InvertedIndex};
use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const FORMAT_VERSION: u32 = 1;
pub const INDEX_DIR_ENV: &str = "KWSEARCH_INDEX_DIR";
pub const DEFAULT_INDEX_DIR: &str = "cache";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    /// Signature of the tokenizer the index was built with.
    pub tokenizer: String,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    meta: &'a MetaFile,
    state: &'a IndexState,
}

#[derive(Deserialize)]
struct Envelope {
    meta: MetaFile,
    state: IndexState,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    /// Resolve the index directory from, in order of priority:
    /// 1. An explicit path (from --index)
    /// 2. The KWSEARCH_INDEX_DIR environment variable
    /// 3. `./cache`
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Some(val) = std::env::var_os(INDEX_DIR_ENV) {
            PathBuf::from(val)
        } else {
            PathBuf::from(DEFAULT_INDEX_DIR)
        };
        Self { root }
    }

    pub fn envelope(&self) -> PathBuf {
        self.root.join("index.bin")
    }

    fn envelope_tmp(&self) -> PathBuf {
        self.root.join("index.bin.tmp")
    }

    pub fn exists(&self) -> bool {
        self.envelope().is_file()
    }
}

impl InvertedIndex {
    /// Load a saved index, failing with [`Error::NotFound`] if nothing was saved there.
    pub fn open(paths: &IndexPaths, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        let mut index = InvertedIndex::new(tokenizer);
        index.load(paths)?;
        Ok(index)
    }

    /// Write all index structures as a single file, creating the directory if needed.
    pub fn save(&self, paths: &IndexPaths) -> Result<MetaFile> {
        create_dir_all(&paths.root)?;
        let state = self.state();
        let meta = MetaFile {
            version: FORMAT_VERSION,
            num_docs: state.num_docs() as u32,
            num_terms: state.num_terms() as u32,
            created_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            tokenizer: self.tokenizer().signature(),
        };
        let bytes = bincode::serialize(&EnvelopeRef { meta: &meta, state })?;

        let tmp = paths.envelope_tmp();
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, paths.envelope())?;

        tracing::info!(path = %paths.envelope().display(), bytes = bytes.len(), num_docs = meta.num_docs, "saved index");
        Ok(meta)
    }

    /// Replace the in-memory state with the saved one.
    pub fn load(&mut self, paths: &IndexPaths) -> Result<MetaFile> {
        let path = paths.envelope();
        if !path.is_file() {
            return Err(Error::NotFound(paths.root.clone()));
        }
        let raw = fs::read(&path)?;
        let meta: MetaFile = bincode::deserialize(&raw)?;
        check_version(&meta)?;
        let Envelope { meta, state } = bincode::deserialize(&raw)?;
        state.validate().map_err(Error::Corrupt)?;

        let signature = self.tokenizer().signature();
        if meta.tokenizer != signature {
            tracing::warn!(saved = %meta.tokenizer, current = %signature, "index was built with a different tokenizer");
        }
        self.replace_state(state);
        tracing::info!(path = %path.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "loaded index");
        Ok(meta)
    }
}

/// Read only the header of a saved index.
pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.envelope();
    if !path.is_file() {
        return Err(Error::NotFound(paths.root.clone()));
    }
    let meta: MetaFile = bincode::deserialize_from(BufReader::new(File::open(path)?))?;
    check_version(&meta)?;
    Ok(meta)
}

fn check_version(meta: &MetaFile) -> Result<()> {
    if meta.version > FORMAT_VERSION {
        return Err(Error::IncompatibleIndex { expected: FORMAT_VERSION, actual: meta.version });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::tokenizer::WhitespaceTokenizer;

    #[test]
    fn save_creates_nested_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(tmp.path().join("a/b/cache"));
        let mut idx = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
        idx.build(vec![Document::new(1, "x", "y")]);
        let meta = idx.save(&paths).unwrap();
        assert!(paths.exists());
        assert!(!paths.envelope_tmp().exists());
        assert_eq!(meta.num_docs, 1);
        assert_eq!(meta.num_terms, 2);
        assert_eq!(load_meta(&paths).unwrap(), meta);
    }

    #[test]
    fn resolve_with_explicit_path() {
        let paths = IndexPaths::resolve(Some(Path::new("/srv/index")));
        assert_eq!(paths.envelope(), PathBuf::from("/srv/index/index.bin"));
    }

    #[test]
    fn missing_index_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(tmp.path());
        let mut idx = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
        assert!(matches!(idx.load(&paths), Err(Error::NotFound(_))));
        assert!(matches!(load_meta(&paths), Err(Error::NotFound(_))));
    }

    #[test]
    fn newer_version_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(tmp.path());
        let meta = MetaFile {
            version: FORMAT_VERSION + 1,
            num_docs: 0,
            num_terms: 0,
            created_at: String::new(),
            tokenizer: "whitespace".into(),
        };
        let bytes = bincode::serialize(&EnvelopeRef { meta: &meta, state: &IndexState::default() }).unwrap();
        fs::write(paths.envelope(), bytes).unwrap();

        let mut idx = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
        assert!(matches!(idx.load(&paths), Err(Error::IncompatibleIndex { actual, .. }) if actual == FORMAT_VERSION + 1));
    }

    #[test]
    fn garbage_file_is_a_serialization_error() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(tmp.path());
        fs::write(paths.envelope(), b"xy").unwrap();
        let mut idx = InvertedIndex::with_tokenizer(WhitespaceTokenizer);
        assert!(matches!(idx.load(&paths), Err(Error::Serialization(_))));
    }
}
