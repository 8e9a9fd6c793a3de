//! Build a span index from a JSON-lines file of token documents
//!
//! Each line is a document:
//!   {"id":"d1","annotations":{"word":["The","cat"],"pos":["DT","NN"]},"tags":[{"name":"np","start":0,"end":2}]}

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use rustie_spans::{SpanDocument, SpanEngine};

#[derive(Parser)]
#[command(name = "create_span_index")]
#[command(about = "Index token documents from a JSON-lines file")]
struct Args {
    /// JSON-lines input file
    #[arg(short = 'f', long)]
    input: PathBuf,

    /// Index directory (created if missing)
    #[arg(short, long, default_value = "./index")]
    index: PathBuf,

    /// YAML engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip invalid lines instead of failing
    #[arg(long)]
    skip_invalid: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !args.index.exists() {
        std::fs::create_dir_all(&args.index)?;
        info!("Created index directory: {}", args.index.display());
    }
    let index_dir = args.index.to_string_lossy().to_string();
    let mut engine = SpanEngine::from_path(&index_dir, args.config.as_deref())?;

    let input = File::open(&args.input).with_context(|| format!("Failed to open {}", args.input.display()))?;
    let mut indexed = 0usize;
    let mut skipped = 0usize;
    for (line_no, line) in BufReader::new(input).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let added = serde_json::from_str::<SpanDocument>(&line)
            .map_err(anyhow::Error::from)
            .and_then(|doc| engine.add_document(&doc));
        match added {
            Ok(()) => indexed += 1,
            Err(e) if args.skip_invalid => {
                warn!("Skipping line {}: {}", line_no + 1, e);
                skipped += 1;
            }
            Err(e) => return Err(e.context(format!("Line {}", line_no + 1))),
        }
    }
    engine.commit()?;

    println!("Indexed {} documents ({} skipped) into {}", indexed, skipped, args.index.display());
    Ok(())
}
