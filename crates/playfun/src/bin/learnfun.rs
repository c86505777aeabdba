use anyhow::Result;
use clap::Parser;
use playfun::learn::{LearnConfig, learn};
use playfun_emu::{EmuError, Emulator, default_core_path};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Mines objective and motif files from a recorded example movie.
#[derive(Parser, Debug)]
#[command(name = "learnfun")]
#[command(about = "Derives <game>.objectives and <game>.motifs from example play", long_about = None)]
struct Args {
    /// Path to a libretro core; falls back to LIBRETRO_CORE, then well-known
    /// core locations
    #[arg(long)]
    core: Option<PathBuf>,

    /// Objective yield budget for the miner
    #[arg(long, default_value_t = 100)]
    objectives: i64,

    /// Candidate-shuffle seed; 0 enumerates in index order
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Game base name (trailing .nes stripped)
    #[arg(default_value = "smb")]
    game: String,

    /// Example movie (defaults to <game>-walk.fm2)
    movie: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to install log subscriber");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let game = args
        .game
        .strip_suffix(".nes")
        .unwrap_or(&args.game)
        .to_string();
    let movie_file = args.movie.unwrap_or_else(|| format!("{game}-walk.fm2"));
    let core = args
        .core
        .or_else(default_core_path)
        .ok_or(EmuError::NoDefaultCore)?;

    info!(game = %game, movie = %movie_file, core = %core.display(), "starting learnfun");

    let mut emu = Emulator::new(&core, format!("{game}.nes"))?;
    learn(
        &mut emu,
        &LearnConfig {
            game,
            movie_file,
            objective_budget: args.objectives,
            seed: args.seed,
        },
    )?;
    Ok(())
}
