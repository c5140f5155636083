use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use multigrep::config::{self, Overrides, RunConfig};
use multigrep::discover::{self, FileFilter};
use multigrep::pipeline::{Monitor, Pipeline, PipelineReport};
use multigrep::rewrite::{RewriteOptions, RewriteOutcome};
use multigrep::trie::{codec, Trie};
use multigrep::{patterns, PatternSet};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

/// Default location of a saved tree, below the home directory.
const DEFAULT_TREE: &str = ".multigrep/tree.bin";

#[derive(Parser)]
#[command(name = "multigrep")]
#[command(about = "Rewrite many patterns across many files in one pass", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./multigrep.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan files and replace every pattern match
    Apply {
        /// Pattern file: one `"pattern" "replacement"` pair per line
        patterns: PathBuf,

        /// Files or directories to rewrite
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Match with a saved tree (default ~/.multigrep/tree.bin)
        #[arg(long, value_name = "BIN")]
        tree: Option<Option<PathBuf>>,

        /// Quote character delimiting pattern file values
        #[arg(short = 'g', long, value_name = "CHAR")]
        quote: Option<char>,

        /// Keep a .bak copy of every rewritten file
        #[arg(short, long)]
        backup: bool,

        /// Never insert a newline between consecutive replacements
        #[arg(long)]
        no_split_lines: bool,

        /// Only rewrite files with this extension (repeatable)
        #[arg(short, long = "ext", value_name = "EXT")]
        extensions: Vec<String>,

        /// Compile patterns as rules (`.`, `[a-z]`, `\x`)
        #[arg(long)]
        syntax: bool,

        /// Worker threads (0 picks one per core)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Where to write the match log
        #[arg(long, value_name = "PATH")]
        log: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long, requires = "dry_run")]
        diff: bool,
    },

    /// Build a tree from a pattern file and save it
    Build {
        /// Pattern file to compile
        patterns: PathBuf,

        /// Output path (default ~/.multigrep/tree.bin)
        output: Option<PathBuf>,

        /// Quote character delimiting pattern file values
        #[arg(short = 'g', long, value_name = "CHAR")]
        quote: Option<char>,
    },

    /// List every pattern in a pattern file or saved tree
    List {
        /// Pattern file, or a saved `.bin` tree
        source: PathBuf,

        /// Quote character delimiting pattern file values
        #[arg(short = 'g', long, value_name = "CHAR")]
        quote: Option<char>,
    },
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("MULTIGREP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let base = config::load_or_default(cli.config.as_deref(), &env::current_dir()?)?;

    match cli.command {
        Commands::Apply {
            patterns,
            paths,
            tree,
            quote,
            backup,
            no_split_lines,
            extensions,
            syntax,
            threads,
            log,
            dry_run,
            diff,
        } => {
            let config = base.merge(Overrides {
                quote,
                backup,
                no_split_lines,
                extensions,
                threads,
                log_path: log,
                syntax,
            })?;
            cmd_apply(&config, &patterns, paths, tree, dry_run, diff)
        }

        Commands::Build {
            patterns,
            output,
            quote,
        } => {
            let config = base.merge(Overrides {
                quote,
                ..Overrides::default()
            })?;
            cmd_build(&config, &patterns, output)
        }

        Commands::List { source, quote } => {
            let config = base.merge(Overrides {
                quote,
                ..Overrides::default()
            })?;
            cmd_list(&config, &source)
        }
    }
}

fn default_tree_path() -> Result<PathBuf> {
    let home = home::home_dir().context("Could not determine the home directory")?;
    Ok(home.join(DEFAULT_TREE))
}

fn read_pattern_set(config: &RunConfig, path: &Path) -> Result<PatternSet> {
    if !path.is_file() {
        anyhow::bail!("Pattern file not found: {}", path.display());
    }
    let set = patterns::read_patterns(path, config.quote)?;
    if set.is_empty() {
        eprintln!(
            "{}",
            format!("Warning: no patterns found in {}", path.display()).yellow()
        );
    }
    Ok(set)
}

fn load_tree(path: &Path) -> Result<Trie> {
    if !path.is_file() {
        anyhow::bail!("Tree file not found: {}", path.display());
    }
    codec::load_from_path(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Helper: Show unified diff between original and rewritten content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (rewritten)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_apply(
    config: &RunConfig,
    patterns: &Path,
    paths: Vec<PathBuf>,
    tree: Option<Option<PathBuf>>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    // 1. Inputs
    for path in &paths {
        if !path.exists() {
            anyhow::bail!("Input path not found: {}", path.display());
        }
    }
    let set = read_pattern_set(config, patterns)?;

    // 2. Matching tree
    let mut trie = match tree {
        Some(bin) => {
            let bin = match bin {
                Some(bin) => bin,
                None => default_tree_path()?,
            };
            load_tree(&bin)?
        }
        None => set.build_trie(config.syntax)?,
    };
    trie.set_max_edits(config.max_edits);

    // 3. Pipeline
    let options = RewriteOptions {
        backup: config.backup,
        split_lines: config.split_lines,
        dry_run,
    };
    let pipeline = Pipeline::new(
        Arc::new(trie),
        Arc::new(set.replacements().clone()),
        options,
        config.threads,
    )?;
    let progress = pipeline.progress();
    let cancel = pipeline.cancel_token();
    let log = pipeline.log();

    {
        let log = Arc::clone(&log);
        let log_path = config.log_path.clone();
        cancel.on_cancel(move || {
            if let Err(err) = log.flush(&log_path) {
                eprintln!("{} Failed to write {}: {}", "✗".red(), log_path.display(), err);
            }
        });
    }
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())
            .context("Failed to install the Ctrl-C handler")?;
    }

    let (work_tx, work_rx) = crossbeam_channel::unbounded();
    let walker = discover::spawn(
        paths,
        FileFilter::new(&config.extensions),
        work_tx,
        Arc::clone(&progress),
        cancel.clone(),
    );
    let running = pipeline.spawn(work_rx);

    // 4. Progress table until the run finishes
    let monitor = Monitor::new(Duration::from_millis(config.monitor_interval_ms));
    let elapsed = monitor.run(&progress, running.done(), io::stdout().lock())?;

    let report = running.join()?;
    let walk = walker
        .join()
        .map_err(|_| anyhow::anyhow!("Enumeration thread panicked"))??;
    tracing::debug!(queued = walk.queued, skipped = walk.skipped, "walk summary");

    println!("Completed in {:?}. Changes: {}", elapsed, report.changes());

    if show_diff {
        print_previews(&report);
    }

    // 5. Match log
    if report.found == 0 {
        println!("No matches found.");
    } else {
        let written = log
            .flush(&config.log_path)
            .with_context(|| format!("Failed to write {}", config.log_path.display()))?;
        tracing::debug!(records = written, "flushed match log");
        println!(
            "{} matches logged to {}",
            report.found,
            config.log_path.display()
        );
    }

    // 6. Summary
    if report.cancelled {
        println!("{}", "Cancelled.".yellow().bold());
    }
    for failure in &report.failures {
        eprintln!(
            "{} {}: {}",
            "✗".red(),
            failure.path.display(),
            failure.error
        );
    }
    if !report.failures.is_empty() {
        eprintln!(
            "  {} failed",
            format!("{}", report.failures.len()).red()
        );
        std::process::exit(1);
    }

    Ok(())
}

fn print_previews(report: &PipelineReport) {
    let mut previews: Vec<_> = report
        .outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            RewriteOutcome::Preview {
                file,
                original,
                rewritten,
                ..
            } => Some((file, original, rewritten)),
            RewriteOutcome::Written { .. } => None,
        })
        .collect();
    previews.sort_by(|a, b| a.0.cmp(b.0));

    for (file, original, rewritten) in previews {
        display_diff(
            file,
            &String::from_utf8_lossy(original),
            &String::from_utf8_lossy(rewritten),
        );
    }
}

fn cmd_build(config: &RunConfig, patterns: &Path, output: Option<PathBuf>) -> Result<()> {
    let set = read_pattern_set(config, patterns)?;
    let trie = set.build_trie(false)?;

    let output = match output {
        Some(output) => output,
        None => default_tree_path()?,
    };
    codec::save_to_path(&trie, &output)
        .with_context(|| format!("Failed to save {}", output.display()))?;

    println!(
        "{} Saved {} patterns to {}",
        "✓".green(),
        set.len(),
        output.display()
    );
    println!(
        "  nodes: {}, depth: {}, breadth: {}",
        trie.len(),
        trie.depth(),
        trie.breadth(trie.root())
    );
    Ok(())
}

fn cmd_list(config: &RunConfig, source: &Path) -> Result<()> {
    let is_tree = source.extension().and_then(|ext| ext.to_str()) == Some("bin");
    let trie = if is_tree {
        load_tree(source)?
    } else {
        read_pattern_set(config, source)?.build_trie(config.syntax)?
    };

    let found = trie.patterns();
    if found.is_empty() {
        println!("{}", "No patterns found".yellow());
        return Ok(());
    }
    for (pattern, id) in found {
        println!("{} : {}", id, String::from_utf8_lossy(&pattern));
    }
    Ok(())
}
