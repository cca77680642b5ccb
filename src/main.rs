//! Command-line driver: plays the computer against itself, or counts
//! perft nodes for a position.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, PoisonError};
use std::thread;

use clap::Parser;
use log::{error, info};

use chess_match::perft;
use chess_match::{
    ChessError, ChessService, Difficulty, EngineConfig, GameRecord, MatchEvent, Position,
    SystemTimeSource, TimeControlSettings,
};

const BOARD: &str = "main";

#[derive(Parser, Debug)]
#[command(name = "chess_match", about = "Computer-vs-computer chess matches")]
struct Args {
    /// Difficulty of the white computer, 1 to 10
    #[arg(long, default_value_t = 5)]
    white: u8,

    /// Difficulty of the black computer, 1 to 10
    #[arg(long, default_value_t = 5)]
    black: u8,

    /// Time control as <minutes>[:<increment seconds>]
    #[arg(long)]
    time_control: Option<TimeControlSettings>,

    /// Seed for the computers' random choices
    #[arg(long)]
    seed: Option<u64>,

    /// Abandon the game after this many plies
    #[arg(long, default_value_t = 200)]
    max_plies: usize,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Count leaf nodes to this depth instead of playing
    #[arg(long)]
    perft: Option<u32>,

    /// Position for --perft
    #[arg(long)]
    fen: Option<String>,
}

fn run_perft(fen: Option<&str>, depth: u32) -> Result<(), ChessError> {
    let position = match fen {
        Some(fen) => Position::from_fen(fen)?,
        None => Position::new(),
    };
    let mut total = 0;
    for (mov, nodes) in perft::divide(&position, depth) {
        println!("{}: {}", mov, nodes);
        total += nodes;
    }
    println!("\nNodes searched: {}", total);
    Ok(())
}

fn play(args: &Args, config: EngineConfig) -> Result<GameRecord, ChessError> {
    let white = Difficulty::new(args.white)?;
    let black = Difficulty::new(args.black)?;
    let tick = config.tick_interval();

    let service = ChessService::new(config, Arc::new(SystemTimeSource));
    service.create_board(BOARD)?;
    let id = service.start_cpu_match(BOARD, white, black, args.time_control)?;
    info!("game {} started: white level {} vs black level {}", id, white.level(), black.level());

    let mut plies = 0;
    loop {
        thread::sleep(tick);
        service.tick();
        for event in service.drain_events() {
            match event {
                MatchEvent::MovePlayed { color, mv, .. } => {
                    plies += 1;
                    println!("{:>3}. {:<5} {}", plies, color.to_string(), mv);
                }
                MatchEvent::GameEnded { state, record, .. } => {
                    service.wait_for_computer(BOARD);
                    if let Some(snapshot) = service.snapshot(BOARD)? {
                        println!("\n{}", snapshot.fen);
                    }
                    if let Some(game) = service.game(BOARD) {
                        let game = game.lock().unwrap_or_else(PoisonError::into_inner);
                        println!("{}", game.board());
                    }
                    println!("Result: {}", state);
                    return Ok(record);
                }
                _ => {}
            }
        }
        if plies >= args.max_plies {
            info!("ply limit {} reached", args.max_plies);
            service.reset_board(BOARD)?;
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if let Some(depth) = args.perft {
        return match run_perft(args.fen.as_deref(), depth) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match &args.config {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    };
    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    match play(&args, config).and_then(|record| record.to_json_pretty()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
