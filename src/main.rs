mod arena;
mod config;
mod db;
mod error;
mod generate;
mod normalize;
mod preview;
mod runs;

use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::Settings;
use crate::runs::RunStore;

#[derive(Parser)]
#[command(name = "landing_arena", about = "Blind A/B arena for LLM-generated landing pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask every configured model for a landing page
    Generate {
        /// Run directory name (default: run-<timestamp>)
        #[arg(long)]
        run_id: Option<String>,
        /// Model to query; repeat for several (default: configured models)
        #[arg(short, long = "model")]
        models: Vec<String>,
    },
    /// Extract and sanitise stored responses into the database
    Load {
        /// Load a single run (default: every run on disk)
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Run the extractor over one file and print the result as JSON
    Extract {
        /// Input file, or `-` for stdin
        file: PathBuf,
    },
    /// Pick the least-compared pair and write the comparison page
    Pair {
        /// Run to draw from (default: latest loaded run)
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Record a vote for a pair
    Vote {
        pair_id: i64,
        /// left, right or tie
        choice: db::Choice,
    },
    /// Win rates per model
    Leaderboard {
        /// Restrict to one run (default: all votes)
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Show arena statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let store = RunStore::new(&settings.runs_dir);

    let result = match cli.command {
        Commands::Generate { run_id, models } => {
            let run_id = run_id.unwrap_or_else(|| runs::new_run_id(Utc::now()));
            let models = if models.is_empty() {
                settings.models.clone()
            } else {
                models
            };
            if models.is_empty() {
                println!("No models configured. Pass --model or set ARENA_MODELS.");
                return Ok(());
            }
            println!("Generating {} with {} models...", run_id, models.len());
            let stats = generate::run_generation(&settings, &store, &run_id, models).await?;
            println!(
                "Done: {} requested ({} ok, {} errors). Saved to {:?}",
                stats.total,
                stats.ok,
                stats.errors,
                store.run_dir(&run_id)
            );
            Ok(())
        }
        Commands::Load { run_id } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let run_ids = match run_id {
                Some(id) => vec![id],
                None => store.list_runs()?,
            };
            if run_ids.is_empty() {
                println!("No runs found in {:?}. Run 'generate' first.", settings.runs_dir);
                return Ok(());
            }
            for run_id in &run_ids {
                let raw = store.load_variants(run_id)?;
                let t_load = Instant::now();
                let saved = load_variants(&conn, &raw)?;
                println!(
                    "{}: loaded {} variants in {:.1}s",
                    run_id,
                    saved,
                    t_load.elapsed().as_secs_f64()
                );
            }
            Ok(())
        }
        Commands::Extract { file } => {
            let raw = if file.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read stdin")?;
                buf
            } else {
                std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {:?}", file))?
            };
            let extracted = normalize::extract_primary_section(&raw);
            println!("{}", serde_json::to_string_pretty(&extracted)?);
            Ok(())
        }
        Commands::Pair { run_id } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let run_id = match run_id {
                Some(id) => Some(id),
                None => db::latest_run_id(&conn)?,
            };
            let Some(run_id) = run_id else {
                println!("No variants loaded. Run 'load' first.");
                return Ok(());
            };
            let variants = db::fetch_variants(&conn, &run_id)?;
            let counts = db::pair_counts(&conn, &run_id)?;
            let Some(pair) = arena::least_compared_pair(&variants, &counts) else {
                println!("Run {} has {} variant(s); need at least two.", run_id, variants.len());
                return Ok(());
            };
            let (left, right) = arena::orient(pair, rand::random::<bool>());
            let pair_id = db::insert_pair(&conn, &run_id, &left.id, &right.id)?;
            let page = preview::render_comparison(pair_id, left, right);
            preview::write_page(&settings.preview_path, &page)?;
            info!(pair_id, left = %left.id, right = %right.id, "pair stored");
            println!("Pair #{} written to {:?}", pair_id, settings.preview_path);
            println!("Vote with: landing_arena vote {} <left|right|tie>", pair_id);
            Ok(())
        }
        Commands::Vote { pair_id, choice } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pair = db::insert_vote(&conn, pair_id, choice)?;
            println!("Recorded {} for pair #{} ({})", choice, pair.id, pair.run_id);
            println!("  A was {}", pair.left_id);
            println!("  B was {}", pair.right_id);
            Ok(())
        }
        Commands::Leaderboard { run_id } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::leaderboard(&conn, run_id.as_deref())?;
            if rows.is_empty() {
                println!("No votes yet.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<40} | {:>5} | {:>6} | {:>4} | {:>5} | {:>6}",
                "#", "Model", "Wins", "Losses", "Ties", "Votes", "Win %"
            );
            println!("{}", "-".repeat(88));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<40} | {:>5} | {:>6} | {:>4} | {:>5} | {:>5.1}%",
                    i + 1,
                    truncate(&r.model, 40),
                    r.wins,
                    r.losses,
                    r.ties,
                    r.votes,
                    r.win_rate() * 100.0
                );
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Runs on disk: {}", store.list_runs()?.len());
            println!("Runs loaded:  {}", s.runs);
            println!("Variants:     {}", s.variants);
            println!("Pairs:        {}", s.pairs);
            println!("Votes:        {}", s.votes);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn load_variants(conn: &rusqlite::Connection, raw: &[runs::RawVariant]) -> anyhow::Result<usize> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(raw.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut saved = 0;
    for chunk in raw.chunks(500) {
        let rows: Vec<_> = chunk.par_iter().map(runs::index_variant).collect();
        saved += db::save_variants(conn, &rows)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(saved)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
