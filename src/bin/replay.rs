//! Replay a JSON fixture of players and matches through the pipeline and
//! print the resulting player documents.
//!
//! ```text
//! replay --input season.json --k-factor 24
//! ```
//!
//! The fixture is `{"players": [Player, ..], "matches": [Match, ..]}`; matches
//! are recorded and fully processed one at a time, in file order.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use rivalry::model::{Match, Player};
use rivalry::{DocumentStore, InMemoryDocumentStore, Pipeline, PipelineConfig, PipelineStats};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Fixture file with players and matches
    #[arg(short, long)]
    input: PathBuf,

    /// Override the rating K-factor
    #[arg(long, env = "RIVALRY_K_FACTOR")]
    k_factor: Option<f64>,

    /// Override the share of a pair's rating taken from its weaker player
    #[arg(long)]
    weak_link_weight: Option<f64>,

    /// Override the minimum matches against an opponent for a nemesis
    #[arg(long)]
    nemesis_min_matches: Option<u32>,

    /// Print a one-line summary per player instead of JSON
    #[arg(long)]
    summary: bool,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    players: Vec<Player>,
    #[serde(default)]
    matches: Vec<Match>,
}

fn main() -> Result<()> {
    rivalry::logging::init();
    let args = Args::parse();

    let mut config = PipelineConfig::from_env()?;
    if let Some(k) = args.k_factor {
        config = config.with_k_factor(k);
    }
    if let Some(weight) = args.weak_link_weight {
        config = config.with_weak_link_weight(weight);
    }
    if let Some(min) = args.nemesis_min_matches {
        config = config.with_nemesis_min_matches(min);
    }
    config.validate()?;

    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", args.input.display()))?;

    let store = InMemoryDocumentStore::new();
    for player in &fixture.players {
        store.upsert(player)?;
    }

    let pipeline = Pipeline::new(store, config);
    let mut totals = PipelineStats::default();
    for m in &fixture.matches {
        pipeline.record_match(m)?;
        let stats = pipeline.run_until_idle()?;
        totals.relayed += stats.relayed;
        totals.rating.merge(&stats.rating);
        totals.head_to_head.merge(&stats.head_to_head);
        totals.nemesis.merge(&stats.nemesis);
    }

    let players: Vec<Player> = pipeline
        .store()
        .find::<Player>(&|_: &Player| true)?
        .into_iter()
        .map(|v| v.data)
        .collect();

    if args.summary {
        for p in &players {
            let nemesis = p
                .nemesis
                .as_ref()
                .map(|n| format!("{} ({}-{})", n.opponent_name, n.matches_won, n.matches_lost))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<20} rating {:>7.1}  peak {:>7.1}  {}W-{}L  streak {:+}  nemesis {}",
                p.display_label(),
                p.rating.current.unwrap_or(pipeline.config().rating.default_rating),
                p.rating.peak.unwrap_or(pipeline.config().rating.default_rating),
                p.wins,
                p.losses,
                p.current_streak,
                nemesis
            );
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&players)?);
    }

    let dead_letters = pipeline.queue().dead_letters();
    eprintln!(
        "replayed {} matches: {} rated, {} head-to-head, {} nemesis updates, {} dead letters",
        fixture.matches.len(),
        totals.rating.applied,
        totals.head_to_head.applied,
        totals.nemesis.applied,
        dead_letters.len()
    );

    Ok(())
}
