//! schema-walk CLI
//!
//! Lists, rewrites and round-trips `$ref` references in JSON Schema files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use schema_walk::config::OutputFormat;
use schema_walk::visitor::{from_fn, visit_from};
use schema_walk::{codec, ReferenceCollector, ReferenceRewriter, SchemaDocument, WalkConfig};
use similar::{ChangeTag, TextDiff};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "schema-walk")]
#[command(about = "Walk and rewrite $ref references in JSON Schema documents")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every reference with its path
    Refs {
        /// Schema file or directory
        path: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rewrite reference targets by prefix
    Rewrite {
        /// Schema file or directory
        path: PathBuf,
        /// Prefix to replace
        #[arg(long)]
        from: String,
        /// Replacement prefix
        #[arg(long)]
        to: String,
        /// Write the result back instead of printing it
        #[arg(short, long)]
        write: bool,
    },

    /// Parse, walk without changes and check the printed output matches
    Roundtrip {
        /// Schema file or directory
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = WalkConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Refs { path, json } => {
            let mut all = Vec::new();
            for file in schema_files(&path, &config)? {
                let mut doc = load(&file)?;
                let mut collector = ReferenceCollector::new();
                walk(&mut doc, &config, &mut collector).await?;

                if json {
                    all.push(serde_json::json!({
                        "file": file.display().to_string(),
                        "references": collector.references(),
                    }));
                } else {
                    println!("{}", file.display());
                    for reference in collector.references() {
                        println!("  {} -> {}", reference.path, reference.reference_path);
                    }
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&all)?);
            }
            Ok(())
        }

        Commands::Rewrite {
            path,
            from,
            to,
            write,
        } => {
            for file in schema_files(&path, &config)? {
                let mut doc = load(&file)?;
                let mut rewriter = ReferenceRewriter::new(from.as_str(), to.as_str());
                walk(&mut doc, &config, &mut rewriter).await?;
                info!(
                    file = %file.display(),
                    rewritten = rewriter.rewritten(),
                    "rewrote references"
                );

                let text = print(&doc, config.output.format)?;
                if write {
                    if rewriter.rewritten() > 0 {
                        fs::write(&file, text + "\n")
                            .with_context(|| format!("writing {}", file.display()))?;
                        println!("✏️  {} ({} rewritten)", file.display(), rewriter.rewritten());
                    }
                } else {
                    println!("{}", text);
                }
            }
            Ok(())
        }

        Commands::Roundtrip { path } => {
            let mut mismatches = 0;
            for file in schema_files(&path, &config)? {
                let source = fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?;
                let parsed: serde_json::Value = serde_json::from_str(&source)?;
                let expected = serde_json::to_string_pretty(&parsed)?;

                let mut doc = codec::from_str(&source)
                    .with_context(|| format!("parsing {}", file.display()))?;
                let mut unchanged = from_fn(|_doc, reference, _path, _hint| Ok(Some(reference)));
                walk(&mut doc, &config, &mut unchanged).await?;
                let actual = codec::to_string_pretty(&doc)?;

                if actual == expected {
                    println!("✅ {}", file.display());
                } else {
                    mismatches += 1;
                    println!("❌ {}", file.display());
                    print_diff(&expected, &actual);
                }
            }
            if mismatches > 0 {
                anyhow::bail!("{} file(s) did not round-trip", mismatches);
            }
            Ok(())
        }
    }
}

/// Expand a file or directory argument into schema files
fn schema_files(path: &Path, config: &WalkConfig) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
        let file = entry.path();
        if !file.is_file() {
            continue;
        }
        let relative = file.strip_prefix(path)?;
        if config.files.accepts(relative) {
            files.push(file.to_path_buf());
        } else {
            debug!(path = %relative.display(), "skipping");
        }
    }
    files.sort();
    if files.is_empty() {
        warn!(path = %path.display(), "no schema files found");
    }
    Ok(files)
}

fn load(file: &Path) -> anyhow::Result<SchemaDocument> {
    let source = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    codec::from_str(&source).with_context(|| format!("parsing {}", file.display()))
}

async fn walk<V>(
    doc: &mut SchemaDocument,
    config: &WalkConfig,
    visitor: &mut V,
) -> anyhow::Result<()>
where
    V: schema_walk::ReferenceVisitor,
{
    let Some(root) = doc.root() else {
        return Ok(());
    };
    let cancel = config.traversal.cancellation_token();
    visit_from(doc, root, &config.traversal.root_path, visitor, &cancel).await?;
    Ok(())
}

fn print(doc: &SchemaDocument, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Pretty => codec::to_string_pretty(doc)?,
        OutputFormat::Compact => codec::to_string(doc)?,
    })
}

fn print_diff(expected: &str, actual: &str) {
    let diff = TextDiff::from_lines(expected, actual);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => continue,
        };
        print!("    {}{}", sign, change);
    }
}
