use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mintcrawl::output::read_site;
use mintcrawl::{SearchDocument, SearchEngine, SearchOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "mintcrawl-search",
    version,
    about = "Build and query a lexical index over crawled documentation"
)]
struct SearchCli {
    /// Index file written by `index` and read by every other command
    #[arg(long, env = "MINTCRAWL_INDEX", default_value = "search-index.json")]
    index: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index an output directory produced by `mintcrawl`
    Index {
        /// Directory containing metadata.json
        dir: PathBuf,
    },
    /// Rank documents for a query
    Query {
        /// Query text
        #[arg(required = true, num_args = 1..)]
        terms: Vec<String>,
        /// Maximum results
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
        /// Drop results scoring below this
        #[arg(long, default_value_t = 0.1)]
        min_score: f64,
        /// Restrict to one section
        #[arg(long)]
        section: Option<String>,
        /// Ignore code examples when scoring
        #[arg(long, default_value_t = false)]
        no_code: bool,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Complete a prefix from titles and past queries
    Suggest {
        /// Prefix to complete
        prefix: String,
        /// Maximum suggestions
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
    },
    /// List indexed sections with document counts
    Sections,
    /// Show the most frequent past queries
    Popular {
        /// Maximum queries
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
}

fn history_path(index: &Path) -> PathBuf {
    let mut name = OsString::from(index.as_os_str());
    name.push(".history.json");
    PathBuf::from(name)
}

fn load_history(index: &Path) -> Result<Vec<String>> {
    let path = history_path(index);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read history {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid history {}", path.display()))
}

fn save_history(index: &Path, engine: &SearchEngine) -> Result<()> {
    let path = history_path(index);
    let history: Vec<&str> = engine.history().collect();
    fs::write(&path, serde_json::to_string_pretty(&history)?)
        .with_context(|| format!("failed to write history {}", path.display()))
}

fn load_engine(index: &Path) -> Result<SearchEngine> {
    let raw = fs::read_to_string(index)
        .with_context(|| format!("failed to read index {}", index.display()))?;
    let mut engine = SearchEngine::new().with_history(load_history(index)?);
    engine
        .import_index(&raw)
        .with_context(|| format!("failed to load index {}", index.display()))?;
    Ok(engine)
}

fn build_index(dir: &Path, index: &Path) -> Result<()> {
    let (manifest, pages) =
        read_site(dir).with_context(|| format!("failed to read output {}", dir.display()))?;
    let documents: Vec<SearchDocument> = pages
        .iter()
        .map(|page| SearchDocument {
            updated_at: Some(manifest.scraped_at),
            ..SearchDocument::from(page)
        })
        .collect();

    let mut engine = SearchEngine::new();
    engine.build(documents);
    let json = engine.export_index().context("nothing to index")?;
    fs::write(index, json).with_context(|| format!("failed to write index {}", index.display()))?;
    println!(
        "Indexed {} documents from {} into {}",
        engine.len(),
        manifest.base_url,
        index.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = SearchCli::parse();
    match cli.command {
        Command::Index { dir } => build_index(&dir, &cli.index)?,
        Command::Query {
            terms,
            limit,
            min_score,
            section,
            no_code,
            json,
        } => {
            let mut engine = load_engine(&cli.index)?;
            let options = SearchOptions {
                limit,
                min_score,
                section,
                include_code: !no_code,
            };
            let query = terms.join(" ");
            let results = engine.search(&query, &options)?;
            save_history(&cli.index, &engine)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No results for {query:?}");
            } else {
                for (rank, result) in results.iter().enumerate() {
                    println!(
                        "{:>2}. {:<40} {:>7.2}  [{}] {}",
                        rank + 1,
                        result.title,
                        result.score,
                        result.section,
                        result.url
                    );
                    if !result.snippet.is_empty() {
                        println!("    {}", result.snippet);
                    }
                }
            }
        }
        Command::Suggest { prefix, limit } => {
            let engine = load_engine(&cli.index)?;
            for suggestion in engine.suggest(&prefix, limit) {
                println!("{suggestion}");
            }
        }
        Command::Sections => {
            let engine = load_engine(&cli.index)?;
            for (section, count) in engine.sections() {
                println!("{section:<30} {count}");
            }
        }
        Command::Popular { limit } => {
            let engine = load_engine(&cli.index)?;
            for (query, count) in engine.popular_queries(limit) {
                println!("{count:>4}  {query}");
            }
        }
    }
    Ok(())
}
