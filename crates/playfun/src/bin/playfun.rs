use anyhow::Result;
use clap::Parser;
use playfun::{PlayFun, PlayFunConfig, ScoringMode};
use playfun_emu::{EmuError, Emulator, default_core_path};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Greedy motif player driven by learned objectives.
#[derive(Parser, Debug)]
#[command(name = "playfun")]
#[command(about = "Plays a game by scoring motif rollouts against learned objectives", long_about = None)]
struct Args {
    /// Path to a libretro core; falls back to LIBRETRO_CORE, then well-known
    /// core locations
    #[arg(long)]
    core: Option<PathBuf>,

    /// Use magnitude-weighted scoring
    #[arg(long)]
    magnitude: bool,

    /// Committed frames to emit
    #[arg(long, default_value_t = 10_000)]
    frames: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Game base name (trailing .nes stripped)
    #[arg(default_value = "smb")]
    game: String,

    /// Seed movie (defaults to <game>-walk.fm2)
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

    info!(game = %game, movie = %movie_file, core = %core.display(), "starting playfun");

    let emu = Emulator::new(&core, format!("{game}.nes"))?;
    let scoring = if args.magnitude {
        ScoringMode::Magnitude
    } else {
        ScoringMode::Binary
    };
    let mut player = PlayFun::new(
        emu,
        PlayFunConfig {
            game,
            movie_file,
            scoring,
        },
    )?;
    player.play(args.frames)?;
    Ok(())
}
