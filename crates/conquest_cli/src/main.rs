use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conquest_control::BotDirector;
use conquest_core::{Match, MatchEvent, MatchPhase, MatchResult};
use conquest_world::{load_content, start_bot_match};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "conquest_cli", about = "Headless territory-conquest match runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play an all-bot match to completion by single-stepping ticks.
    Run {
        /// Match seed. Random when omitted.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 4)]
        bots: usize,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        /// Stop after this many ticks even if the match is still running.
        #[arg(long)]
        ticks: Option<u64>,
        /// Override the match length in seconds.
        #[arg(long)]
        duration_secs: Option<f64>,
        #[arg(long, default_value_t = 600)]
        print_every: u64,
        /// Write the final standings as JSON to this path.
        #[arg(long)]
        result_out: Option<String>,
    },
}

struct RunArgs {
    seed: Option<u64>,
    bots: usize,
    content_dir: String,
    ticks: Option<u64>,
    duration_secs: Option<f64>,
    print_every: u64,
    result_out: Option<String>,
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn run(args: RunArgs) -> Result<()> {
    let mut content = load_content(&args.content_dir)
        .with_context(|| format!("loading content from {}", args.content_dir))?;
    if let Some(secs) = args.duration_secs {
        content.constants.match_duration_secs = secs;
    }
    let dt = 1.0 / content.constants.ticks_per_sec;
    let seed = resolve_seed(args.seed);
    let mut game = start_bot_match(
        Arc::new(content),
        seed,
        args.bots,
        Box::new(BotDirector::new(seed)),
        None,
    )?;

    println!(
        "Starting match {}: seed={seed} bots={} map={}x{} content_version={}",
        game.match_id(),
        game.state().contestants.len(),
        game.state().map.width(),
        game.state().map.height(),
        game.content().content_version,
    );
    println!("{}", "-".repeat(80));

    let print_every = args.print_every.max(1);
    loop {
        if args.ticks.is_some_and(|limit| game.state().meta.tick >= limit) {
            break;
        }
        let events = game.tick(dt);
        for event in &events {
            match &event.event {
                MatchEvent::ContestantEliminated { contestant } => {
                    println!("*** {contestant} eliminated at tick={:05} ***", event.tick);
                }
                MatchEvent::MatchFinished { winner } => {
                    println!(
                        "*** match finished at tick={:05}, winner: {} ***",
                        event.tick,
                        winner.as_ref().map_or("none", |w| w.0.as_str()),
                    );
                }
                _ => {}
            }
        }
        if game.state().meta.tick % print_every == 0 {
            print_status(&game);
        }
        if game.state().meta.phase == MatchPhase::Finished {
            break;
        }
    }

    println!("{}", "-".repeat(80));
    let result = game.result();
    print_standings(&result);

    if let Some(path) = args.result_out {
        let file =
            std::fs::File::create(&path).with_context(|| format!("creating {path}"))?;
        serde_json::to_writer_pretty(file, &result).with_context(|| format!("writing {path}"))?;
        println!("Result written to {path}");
    }
    game.destroy();
    Ok(())
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

fn print_status(game: &Match) {
    let state = game.state();
    let secs = state.meta.phase_elapsed_secs;
    let alive = state.contestants.iter().filter(|c| c.alive).count();
    let leader = state
        .contestants
        .iter()
        .filter(|c| c.alive)
        .max_by(|a, b| a.score.total_cmp(&b.score));
    println!(
        "[tick={:05}  t={secs:6.1}s]  alive={alive:2}  squads={:3}  leader={} ({:.0})",
        state.meta.tick,
        state.squads.len(),
        leader.map_or("-", |c| c.name.as_str()),
        leader.map_or(0.0, |c| c.score),
    );
}

fn print_standings(result: &MatchResult) {
    println!(
        "Final standings after {:.1}s (match {}):",
        result.duration_secs, result.match_id
    );
    for s in &result.standings {
        println!(
            "  #{:<2} {:<10} {:<5} score={:8.1} territory={:4} kills={:3} losses={:3} captures={:3} gold={:8.1}",
            s.placement,
            s.name,
            if s.alive { "alive" } else { "dead" },
            s.score,
            s.territory,
            s.kills,
            s.losses,
            s.captures,
            s.gold_earned,
        );
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            seed,
            bots,
            content_dir,
            ticks,
            duration_secs,
            print_every,
            result_out,
        } => run(RunArgs {
            seed,
            bots,
            content_dir,
            ticks,
            duration_secs,
            print_every,
            result_out,
        })?,
    }
    Ok(())
}
