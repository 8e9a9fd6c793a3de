//! Run a JSON-encoded span query against an index directory
//!
//! Usage:
//!   span_query --index ./index --query '{"Term":{"field":"contents","annotation":"word","term":"fox"}}'
//!   span_query --index ./index --query-file query.json --limit 20

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use rustie_spans::{QueryNode, SpanEngine};

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[derive(Parser)]
#[command(name = "span_query")]
#[command(about = "Run a span query against a span index")]
struct Args {
    /// Index directory path
    #[arg(short, long, default_value = "./index")]
    index: String,

    /// YAML engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Query tree as JSON
    #[arg(short, long, conflicts_with = "query_file")]
    query: Option<String>,

    /// File holding the query tree as JSON
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Maximum number of hits
    #[arg(short, long)]
    limit: Option<usize>,

    /// Print the rewritten query and exit
    #[arg(long)]
    explain: bool,
}

fn read_query(args: &Args) -> Result<QueryNode> {
    let json = match (&args.query, &args.query_file) {
        (Some(json), _) => json.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read query file {}", path.display()))?,
        (None, None) => return Err(anyhow!("Pass a query with --query or --query-file")),
    };
    serde_json::from_str(&json).context("Invalid query JSON")
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let query = read_query(&args)?;
    let engine = SpanEngine::from_path(&args.index, args.config.as_deref())?;
    log::info!("Index loaded: {} documents", engine.num_docs());

    if args.explain {
        println!("{:#?}", engine.rewrite(&query)?);
        return Ok(());
    }

    let start = std::time::Instant::now();
    let results = engine.search(&query, args.limit)?;
    log::info!("Search took {:.2?}", start.elapsed());
    println!("{}", results.to_json()?);
    Ok(())
}
