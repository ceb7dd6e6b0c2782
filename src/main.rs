mod batch;
mod config;
mod db;
mod error;
mod model;
mod parser;
mod pipeline;
mod portrait;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use batch::JsonFileSink;
use config::Config;
use model::FighterRecord;
use pipeline::{ListingClient, Scraper};
use portrait::WikiPortraits;

#[derive(Parser)]
#[command(name = "ufc_scraper", about = "UFC fighter scraper with Wikipedia portraits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ScrapeArgs {
    /// Letters to scrape, e.g. "abc" (default: a-z)
    #[arg(short, long)]
    keys: Option<String>,
    /// Max rows processed at once per letter
    #[arg(short, long)]
    workers: Option<usize>,
    /// Write a checkpoint after this many new fighters
    #[arg(long)]
    checkpoint_every: Option<usize>,
    /// JSON output file (rewritten on every checkpoint)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every letter and write fighters to JSON
    Scrape(ScrapeArgs),
    /// Replace the database contents with a scraped JSON file
    Upload {
        /// JSON file to load (default: fighters.json)
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Scrape + upload in one go
    Run {
        #[command(flatten)]
        scrape: ScrapeArgs,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Find stored fighters by name
    Search {
        /// Matches first, last or full name (default: everyone)
        query: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show database statistics
    Stats {
        #[arg(long)]
        db: Option<PathBuf>,
    },
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

    let result = match cli.command {
        Commands::Scrape(args) => scrape(&args).await.map(|_| ()),
        Commands::Upload { input, db } => {
            let config = Config::default().with_output(input).with_db_path(db);
            upload(&config)
        }
        Commands::Run { scrape: args, db } => scrape(&args)
            .await
            .and_then(|config| upload(&config.with_db_path(db))),
        Commands::Search { query, limit, db } => {
            search(&Config::default().with_db_path(db), query.as_deref(), limit)
        }
        Commands::Stats { db } => stats(&Config::default().with_db_path(db)),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Run the batch over the selected letters. Returns the config used so
/// `run` can upload the same file.
async fn scrape(args: &ScrapeArgs) -> anyhow::Result<Config> {
    let config = Config::default()
        .with_pool_size(args.workers)
        .with_checkpoint_threshold(args.checkpoint_every)
        .with_output(args.output.clone());
    let keys = batch::partition_keys(args.keys.as_deref())?;

    let portraits = Arc::new(WikiPortraits::new(&config)?);
    let listing = ListingClient::new(&config)?;
    let source = Scraper::new(listing, portraits, config.pool_size);
    let mut sink = JsonFileSink::new(&config.output);

    println!(
        "Scraping {} letters with {} workers...",
        keys.len(),
        config.pool_size
    );
    let (_, stats) =
        batch::run_batch(&source, &keys, &mut sink, config.checkpoint_threshold).await?;
    println!(
        "Scraped {} fighters from {} letters ({} checkpoints). Saved to {}",
        stats.records,
        stats.partitions,
        stats.checkpoints,
        sink.path().display()
    );
    Ok(config)
}

fn upload(config: &Config) -> anyhow::Result<()> {
    let fighters = batch::load_batch(&config.output)?;
    let conn = db::connect(&config.db_path)?;
    db::init_schema(&conn)?;
    let inserted = db::replace_all(&conn, &fighters)?;
    println!(
        "Inserted {} fighters into {}.",
        inserted,
        config.db_path.display()
    );
    Ok(())
}

fn search(config: &Config, query: Option<&str>, limit: usize) -> anyhow::Result<()> {
    let conn = db::connect(&config.db_path)?;
    db::init_schema(&conn)?;
    let rows = db::search(&conn, query, limit)?;
    print!("{}", render_search(&rows));
    Ok(())
}

fn stats(config: &Config) -> anyhow::Result<()> {
    let conn = db::connect(&config.db_path)?;
    db::init_schema(&conn)?;
    let s = db::get_stats(&conn)?;
    println!("Fighters:    {}", s.total);
    println!("With photo:  {}", s.with_image);
    println!("With height: {}", s.with_height);
    println!("With weight: {}", s.with_weight);
    Ok(())
}

/// Result table for `search`, or a one-line notice when nothing matched.
fn render_search(rows: &[FighterRecord]) -> String {
    if rows.is_empty() {
        return "No fighters found.\n".to_string();
    }

    let mut out = format!(
        "{:>3} | {:<28} | {:>7} | {:>7} | {:<8} | {:<5}\n",
        "#", "Fighter", "Ht (cm)", "Wt (kg)", "W-L-D", "Photo"
    );
    out.push_str(&"-".repeat(72));
    out.push('\n');

    for (i, f) in rows.iter().enumerate() {
        out.push_str(&format!(
            "{:>3} | {:<28} | {:>7} | {:>7} | {:<8} | {:<5}\n",
            i + 1,
            truncate(&f.full_name(), 28),
            opt_num(f.height_cm),
            opt_num(f.weight_kg),
            format!("{}-{}-{}", f.wins, f.losses, f.draws),
            if f.image_url.is_some() { "yes" } else { "-" },
        ));
    }

    out.push_str(&format!("\n{} fighters\n", rows.len()));
    out
}

fn opt_num(v: Option<f64>) -> String {
    v.map(|x| format!("{:.1}", x)).unwrap_or_else(|| "-".into())
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
