//! `pattern-store` statistics CLI.
//!
//! Read-side views over an existing pattern database: a dashboard, per-engine reliability,
//! divergence history and a JSON export.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use serde::Serialize;

use pattern_store::{
    CategoryStat, EngineQualityPolicy, EngineStat, PatternStore, StatsFilter, StoreConfig,
    StoreSummary,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Inspect what the pattern store has learned
#[derive(Parser)]
#[command(name = "pattern-store")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// SQLite database to inspect
    #[arg(
        short,
        long,
        global = true,
        env = "PATTERN_STORE_DB_PATH",
        value_name = "FILE",
        default_value = pattern_store::config::DEFAULT_DB_PATH
    )]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summary, engines, categories, recent patterns and cases
    Dashboard {
        /// Rows per list
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Only patterns created by this engine
        #[arg(short, long)]
        engine: Option<String>,

        /// Only patterns created on or after this date (YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,
    },

    /// Per-engine pattern counts and reliability
    Engines {
        #[arg(short, long)]
        engine: Option<String>,

        #[arg(short, long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,
    },

    /// Recorded divergences per engine
    Divergences,

    /// Summary, engine and category statistics as JSON
    Export {
        #[arg(short, long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,

        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = open_existing(&cli.db)?;

    match cli.command {
        Commands::Dashboard {
            limit,
            engine,
            since,
        } => {
            let filter = build_filter(engine, since)?;
            print_summary(&store.summary()?);
            print_engines(&store.engine_stats_filtered(&filter)?);
            print_categories(&store.category_distribution(filter.since)?);
            print_recent(&store, limit, &filter)?;
            print_cases(&store, limit)?;
        }
        Commands::Engines { engine, since } => {
            let filter = build_filter(engine, since)?;
            print_engines(&store.engine_stats_filtered(&filter)?);
        }
        Commands::Divergences => print_divergences(&store)?,
        Commands::Export { since, output } => {
            let filter = build_filter(None, since)?;
            let report = ExportReport {
                summary: store.summary()?,
                engines: store
                    .engine_stats_filtered(&filter)?
                    .into_iter()
                    .map(EngineExport::from)
                    .collect(),
                patterns: store.category_distribution(since)?,
                exported_at: Utc::now(),
            };
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
    }

    store.close()?;
    Ok(())
}

fn open_existing(db: &Path) -> Result<PatternStore> {
    if !db.is_file() {
        bail!(
            "database not found: {} (check the path or process some documents first)",
            db.display()
        );
    }

    let config = StoreConfig::default().with_db_path(db);
    let policy = EngineQualityPolicy::from_env().context("reading engine quality policy")?;
    PatternStore::open(config, policy)
        .with_context(|| format!("opening pattern database {}", db.display()))
}

fn parse_since(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(at.and_utc());
        }
    }
    Err(format!("invalid date '{raw}', use YYYY-MM-DD"))
}

fn build_filter(engine: Option<String>, since: Option<DateTime<Utc>>) -> Result<StatsFilter> {
    let mut filter = StatsFilter::default();
    if let Some(name) = engine {
        filter = filter.engine(name.parse()?);
    }
    if let Some(since) = since {
        filter = filter.since(since);
    }
    Ok(filter)
}

#[derive(Serialize)]
struct EngineExport {
    #[serde(flatten)]
    stat: EngineStat,
    reliability: f64,
}

impl From<EngineStat> for EngineExport {
    fn from(stat: EngineStat) -> Self {
        Self {
            reliability: stat.reliability(),
            stat,
        }
    }
}

#[derive(Serialize)]
struct ExportReport {
    summary: StoreSummary,
    engines: Vec<EngineExport>,
    patterns: Vec<CategoryStat>,
    exported_at: DateTime<Utc>,
}

fn print_summary(summary: &StoreSummary) {
    println!("== Summary ==");
    println!("cases           {}", summary.total_cases);
    println!(
        "patterns        {} ({} active, {} deprecated)",
        summary.total_patterns, summary.active_patterns, summary.deprecated_patterns
    );
    println!("occurrences     {}", summary.total_occurrences);
    println!("divergences     {}", summary.total_divergences);
    println!("avg confidence  {:.3}", summary.avg_confidence);
    println!();
}

fn print_engines(stats: &[EngineStat]) {
    println!("== Engines ==");
    if stats.is_empty() {
        println!("(no engine statistics)\n");
        return;
    }
    println!(
        "{:<16} {:>8} {:>8} {:>11} {:>7} {:>10} {:>11}",
        "engine", "patterns", "avg conf", "occurrences", "active", "deprecated", "reliability"
    );
    for s in stats {
        println!(
            "{:<16} {:>8} {:>8.3} {:>11} {:>7} {:>10} {:>10.0}%",
            s.engine.as_str(),
            s.total_patterns,
            s.avg_confidence,
            s.total_occurrences,
            s.active_count,
            s.deprecated_count,
            s.reliability() * 100.0
        );
    }
    println!();
}

fn print_categories(stats: &[CategoryStat]) {
    println!("== Categories ==");
    if stats.is_empty() {
        println!("(no patterns)\n");
        return;
    }
    println!("{:<16} {:>6} {:>8} {:<16}", "category", "count", "avg conf", "top engine");
    for s in stats {
        println!(
            "{:<16} {:>6} {:>8.3} {:<16}",
            s.category.as_str(),
            s.count,
            s.avg_confidence,
            s.top_engine.as_ref().map_or("-", |e| e.as_str())
        );
    }
    println!();
}

fn print_recent(store: &PatternStore, limit: usize, filter: &StatsFilter) -> Result<()> {
    println!("== Recent patterns ==");
    let recent = store.recent_patterns(limit, filter)?;
    if recent.is_empty() {
        println!("(nothing processed yet)\n");
        return Ok(());
    }
    for p in recent {
        println!(
            "#{:<6} {:<28} {:<16} {:<12} conf {:.3}  page {:<5} {}",
            p.pattern_id,
            p.case_external_id,
            p.category.as_str(),
            p.engine.as_str(),
            p.avg_confidence,
            p.last_seen_page,
            p.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    Ok(())
}

fn print_cases(store: &PatternStore, limit: usize) -> Result<()> {
    println!("== Cases ==");
    let cases = store.case_summaries(limit)?;
    if cases.is_empty() {
        println!("(no cases)");
        return Ok(());
    }
    for c in cases {
        let confidence = c
            .avg_confidence
            .map_or_else(|| "-".to_string(), |v| format!("{v:.3}"));
        println!(
            "{:<28} {:<8} {:>4} patterns  conf {:<6} {}",
            c.external_id,
            c.origin,
            c.pattern_count,
            confidence,
            c.created_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}

fn print_divergences(store: &PatternStore) -> Result<()> {
    let stats = store.divergence_stats()?;
    println!("== Divergences ==");
    println!("total           {}", stats.total);
    println!("avg magnitude   {:.3}", stats.avg_magnitude);
    if stats.by_engine.is_empty() {
        println!("(no divergences recorded)");
        return Ok(());
    }
    println!();
    println!("{:<16} {:>6}", "engine", "count");
    for (engine, count) in &stats.by_engine {
        println!("{:<16} {:>6}", engine.as_str(), count);
    }
    Ok(())
}
