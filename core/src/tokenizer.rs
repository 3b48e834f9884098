use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

pub const STOPWORDS_ENV: &str = "KWSEARCH_STOPWORDS";

lazy_static! {
    static ref PUNCT: Regex = Regex::new(r"[\p{P}\p{S}]").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref ENGLISH_STOPWORDS: Vec<&'static str> = vec![
        "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
        "be","because","been","before","being","below","between","both","but","by",
        "can","can't","cannot","could","couldn't",
        "did","didn't","do","does","doesn't","doing","don't","down","during",
        "each","few","for","from","further",
        "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
        "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
        "let's","me","more","most","mustn't","my","myself",
        "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
        "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
        "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
        "under","until","up","very",
        "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
        "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
    ];
}

/// Turns raw text into index tokens.
///
/// The same instance must be used to build an index and to query it.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Short description of the normalization settings, stored with a saved index.
    fn signature(&self) -> String {
        "custom".to_string()
    }
}

/// Lowercase and split on whitespace, nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_lowercase).collect()
    }

    fn signature(&self) -> String {
        "whitespace".to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn english() -> Self {
        Self::from_words(ENGLISH_STOPWORDS.iter().copied())
    }

    /// Stopwords from an explicit file, else the file named by KWSEARCH_STOPWORDS,
    /// else the built-in English list.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit.map(Path::to_path_buf).or_else(|| std::env::var_os(STOPWORDS_ENV).map(PathBuf::from));
        match path {
            Some(p) => {
                let words = Self::from_file(&p)?;
                tracing::debug!(path = %p.display(), count = words.len(), "loaded stopwords");
                Ok(words)
            }
            None => Ok(Self::english()),
        }
    }

    /// One word per line; blank lines are skipped.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::from_words(text.lines()))
    }

    /// Words are normalized the way the tokenizer normalizes text, so "don't" matches "dont".
    pub fn from_words<'a, I: IntoIterator<Item = &'a str>>(words: I) -> Self {
        let words = words
            .into_iter()
            .map(|w| strip_punctuation(&w.trim().to_lowercase()))
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// NFKC normalization, lowercase, punctuation stripping, whitespace split,
/// stopword removal and optional English stemming.
#[derive(Debug, Clone)]
pub struct StandardTokenizer {
    stopwords: StopWords,
    stem: bool,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        Self::new(StopWords::english(), true)
    }
}

impl StandardTokenizer {
    pub fn new(stopwords: StopWords, stem: bool) -> Self {
        Self { stopwords, stem }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let cleaned = strip_punctuation(&normalized);
        cleaned
            .split_whitespace()
            .filter(|tok| !self.stopwords.contains(tok))
            .map(|tok| if self.stem { STEMMER.stem(tok).into_owned() } else { tok.to_string() })
            .collect()
    }

    fn signature(&self) -> String {
        format!("standard;stopwords={};stem={}", self.stopwords.len(), self.stem)
    }
}

fn strip_punctuation(text: &str) -> String {
    PUNCT.replace_all(text, "").into_owned()
}
