use anyhow::{Context, Result};
use kwsearch_core::document::parse_collection;
use kwsearch_core::Document;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// `.json` and `.jsonl` files under `input`, or `input` itself if it is a file.
pub fn collect_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(extension(p), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

pub fn read_documents(input: &Path) -> Result<Vec<Document>> {
    let files = collect_files(input);
    if files.is_empty() {
        anyhow::bail!("no .json or .jsonl files found at {}", input.display());
    }
    let mut docs = Vec::new();
    for file in files {
        let before = docs.len();
        if extension(&file) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs)?;
        }
        tracing::debug!(file = %file.display(), documents = docs.len() - before, "read source file");
    }
    Ok(docs)
}

fn read_json(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    let json: serde_json::Value = serde_json::from_reader(reader).with_context(|| format!("parsing {}", file.display()))?;
    docs.extend(parse_collection(json).with_context(|| format!("reading documents from {}", file.display()))?);
    Ok(())
}

fn read_jsonl(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let value: serde_json::Value = serde_json::from_str(&line).with_context(|| format!("{}:{}", file.display(), n + 1))?;
        docs.push(Document::from_value(value).with_context(|| format!("{}:{}", file.display(), n + 1))?);
    }
    Ok(())
}

fn extension(p: &Path) -> Option<&str> {
    p.extension().and_then(|s| s.to_str())
}
