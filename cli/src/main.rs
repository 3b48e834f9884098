use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kwsearch_core::persist::{load_meta, IndexPaths};
use kwsearch_core::{
    Bm25Params, DocId, InvertedIndex, StandardTokenizer, StopWords, Tokenizer, DEFAULT_B, DEFAULT_K1, DEFAULT_LIMIT,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

mod source;

#[derive(Parser)]
#[command(name = "kwsearch")]
#[command(about = "Build a keyword index and query it with BM25", long_about = None)]
struct Cli {
    /// Index directory [env: KWSEARCH_INDEX_DIR, default: ./cache]
    #[arg(long, global = true)]
    index: Option<PathBuf>,
    /// Stopword file, one word per line [env: KWSEARCH_STOPWORDS, default: built-in English list]
    #[arg(long, global = true)]
    stopwords: Option<PathBuf>,
    /// Disable stemming (must match between build and queries)
    #[arg(long, global = true, default_value_t = false)]
    no_stem: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct ScoringArgs {
    /// BM25 term frequency saturation
    #[arg(long, default_value_t = DEFAULT_K1)]
    k1: f64,
    /// BM25 length normalization
    #[arg(long, default_value_t = DEFAULT_B)]
    b: f64,
}

impl From<ScoringArgs> for Bm25Params {
    fn from(args: ScoringArgs) -> Self {
        Bm25Params { k1: args.k1, b: args.b }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a JSON/JSONL file or a directory of them
    Build {
        #[arg(long)]
        input: PathBuf,
    },
    /// Rank documents against a query with BM25
    Search {
        query: String,
        #[command(flatten)]
        scoring: ScoringArgs,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
    /// List documents containing the first token of a term
    Lookup {
        term: String,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Raw term frequency of a single-token term in a document
    Tf { doc_id: DocId, term: String },
    /// BM25 inverse document frequency of a single-token term
    Idf { term: String },
    /// BM25 saturated, length-normalized term frequency
    Bm25tf {
        doc_id: DocId,
        term: String,
        #[command(flatten)]
        scoring: ScoringArgs,
    },
    /// BM25 score of one term for one document
    Score {
        doc_id: DocId,
        term: String,
        #[command(flatten)]
        scoring: ScoringArgs,
    },
    /// Print a catalogued document
    Doc { doc_id: DocId },
    /// Print the saved index header
    Info,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let paths = IndexPaths::resolve(cli.index.as_deref());
    let tokenizer = build_tokenizer(cli.stopwords.as_deref(), !cli.no_stem)?;

    match cli.command {
        Commands::Build { input } => build_index(&input, &paths, tokenizer),
        Commands::Info => {
            let meta = load_meta(&paths)?;
            println!("index:      {}", paths.envelope().display());
            println!("version:    {}", meta.version);
            println!("documents:  {}", meta.num_docs);
            println!("terms:      {}", meta.num_terms);
            println!("created at: {}", meta.created_at);
            println!("tokenizer:  {}", meta.tokenizer);
            Ok(())
        }
        command => {
            let index = InvertedIndex::open(&paths, tokenizer)?;
            run_query(&index, command)
        }
    }
}

fn build_tokenizer(stopwords: Option<&Path>, stem: bool) -> Result<Arc<dyn Tokenizer>> {
    let stopwords = StopWords::resolve(stopwords).context("loading stopwords")?;
    Ok(Arc::new(StandardTokenizer::new(stopwords, stem)))
}

fn build_index(input: &Path, paths: &IndexPaths, tokenizer: Arc<dyn Tokenizer>) -> Result<()> {
    let docs = source::read_documents(input)?;
    tracing::info!(documents = docs.len(), input = %input.display(), "ingested documents");

    let mut index = InvertedIndex::new(tokenizer);
    index.build(docs);
    let meta = index.save(paths).with_context(|| format!("saving index to {}", paths.root.display()))?;
    println!("Indexed {} documents ({} terms) into {}", meta.num_docs, meta.num_terms, paths.root.display());
    Ok(())
}

fn run_query(index: &InvertedIndex, command: Commands) -> Result<()> {
    match command {
        Commands::Search { query, scoring, limit } => {
            let hits = index.search(&query, scoring.into(), limit);
            if hits.is_empty() {
                println!("No results found.");
            }
            for (rank, hit) in hits.iter().enumerate() {
                let title = index.document(hit.doc_id).map_or("<unknown>", |d| d.title.as_str());
                println!("{}. ({}) {} - Score: {:.2}", rank + 1, hit.doc_id, title, hit.score);
            }
        }
        Commands::Lookup { term, limit } => {
            let ids = index.lookup(&term);
            if ids.is_empty() {
                println!("No results found.");
            }
            for id in ids.into_iter().take(limit) {
                let title = index.document(id).map_or("<unknown>", |d| d.title.as_str());
                println!("({id}) {title}");
            }
        }
        Commands::Tf { doc_id, term } => {
            println!("{}", index.frequency(doc_id, &term)?);
        }
        Commands::Idf { term } => {
            println!("{:.2}", index.idf(&term)?);
        }
        Commands::Bm25tf { doc_id, term, scoring } => {
            println!("{:.2}", index.tf_component(doc_id, &term, scoring.into())?);
        }
        Commands::Score { doc_id, term, scoring } => {
            println!("{:.2}", index.score(doc_id, &term, scoring.into())?);
        }
        Commands::Doc { doc_id } => {
            let doc = index.document(doc_id).with_context(|| format!("document {doc_id} is not in the index"))?;
            println!("{}", serde_json::to_string_pretty(&doc.to_value())?);
        }
        Commands::Build { .. } | Commands::Info => unreachable!("handled before loading the index"),
    }
    Ok(())
}
