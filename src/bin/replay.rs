// Standalone replay tool for analyzing arena round logs
//
// Usage:
//   cargo run --bin replay -- <log_file> [options]
//
// Options:
//   --player <N>           Player whose decisions are replayed (default: 0)
//   --strategy <name>      pathfinding | reactive (default: from config)
//   --all                  Replay every logged decision
//   --ticks <t1,t2>        Replay specific snapshot ticks (comma-separated)
//   --validate             Check logged decisions against expected moves
//   --verbose              Show detailed output for each tick
//   --config <path>        Path to Arena.toml (default: Arena.toml)

use std::env;
use std::process;

use snake_arena::config::Config;
use snake_arena::replay::ReplayEngine;
use snake_arena::strategy::StrategyKind;
use snake_arena::types::{Direction, PlayerIndex};

fn print_usage() {
    eprintln!("Snake Arena Replay Tool");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  replay <log_file> [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("  --player <N>            Player to replay (default: 0)");
    eprintln!("  --strategy <NAME>       pathfinding | reactive (default: from config)");
    eprintln!("  --all                   Replay every logged decision");
    eprintln!("  --ticks <T1,T2,...>     Replay specific snapshot ticks");
    eprintln!("  --validate <T:M,...>    Validate expected moves (format: tick:move,...)");
    eprintln!("  --verbose               Show detailed output for each tick");
    eprintln!("  --config <path>         Path to Arena.toml (default: Arena.toml)");
    eprintln!("  --help                  Show this help message");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("  replay arena_round.jsonl --all --player 1");
    eprintln!("  replay arena_round.jsonl --ticks 5,10,15 --strategy reactive");
    eprintln!("  replay arena_round.jsonl --validate 5:up,10:right|down");
}

fn parse_ticks(s: &str) -> Result<Vec<u64>, String> {
    s.split(',')
        .map(|t| {
            t.trim()
                .parse::<u64>()
                .map_err(|e| format!("Invalid tick number '{}': {}", t, e))
        })
        .collect()
}

fn parse_expected_moves(s: &str) -> Result<Vec<(u64, Vec<Direction>)>, String> {
    s.split(',')
        .map(|pair| {
            let (tick, moves) = pair
                .trim()
                .split_once(':')
                .ok_or_else(|| format!("Invalid format '{}'. Expected 'tick:move'", pair))?;

            let tick = tick
                .parse::<u64>()
                .map_err(|e| format!("Invalid tick number '{}': {}", tick, e))?;

            // Several acceptable moves separated by '|'
            let moves = moves
                .split('|')
                .map(|m| Direction::parse(m.trim()))
                .collect::<Result<Vec<Direction>, String>>()?;

            Ok((tick, moves))
        })
        .collect()
}

enum Mode {
    All,
    Ticks(String),
    Validate(String),
}

fn next_value(args: &[String], i: usize, flag: &str) -> String {
    match args.get(i + 1) {
        Some(value) => value.clone(),
        None => {
            eprintln!("Error: {} requires an argument", flag);
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "--help") {
        print_usage();
        process::exit(if args.iter().any(|a| a == "--help") { 0 } else { 1 });
    }

    let log_file = &args[1];
    let mut config_path = "Arena.toml".to_string();
    let mut verbose = false;
    let mut player: PlayerIndex = 0;
    let mut strategy: Option<String> = None;
    let mut mode = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--all" => mode = Some(Mode::All),
            "--ticks" => {
                mode = Some(Mode::Ticks(next_value(&args, i, "--ticks")));
                i += 1;
            }
            "--validate" => {
                mode = Some(Mode::Validate(next_value(&args, i, "--validate")));
                i += 1;
            }
            "--player" => {
                let value = next_value(&args, i, "--player");
                player = value.parse().unwrap_or_else(|e| {
                    eprintln!("Error: invalid player '{}': {}", value, e);
                    process::exit(1);
                });
                i += 1;
            }
            "--strategy" => {
                strategy = Some(next_value(&args, i, "--strategy"));
                i += 1;
            }
            "--config" => {
                config_path = next_value(&args, i, "--config");
                i += 1;
            }
            "--verbose" => verbose = true,
            _ => {
                eprintln!("Error: Unknown option '{}'", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let Some(mode) = mode else {
        eprintln!("Error: Must specify --all, --ticks, or --validate");
        print_usage();
        process::exit(1);
    };

    let config = Config::from_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from '{}': {}", config_path, e);
        eprintln!("Using default configuration");
        Config::default_hardcoded()
    });

    let kind = match strategy {
        Some(name) => StrategyKind::parse(&name).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        }),
        None => config.agents.default_strategy,
    };

    println!("Loaded configuration from: {}", config_path);
    println!("Replay log file: {}", log_file);
    println!("Player {} with strategy '{}'", player, kind.as_str());
    println!();

    let engine = ReplayEngine::new(config, verbose);

    let entries = match engine.load_log_file(log_file) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error loading log file: {}", e);
            process::exit(1);
        }
    };

    if entries.is_empty() {
        eprintln!("Error: Log file is empty");
        process::exit(1);
    }

    let outcome = match mode {
        Mode::All => engine.replay_all(&entries, player, kind),
        Mode::Ticks(arg) => parse_ticks(&arg)
            .and_then(|ticks| engine.replay_ticks(&entries, player, kind, &ticks)),
        Mode::Validate(arg) => {
            let result = parse_expected_moves(&arg)
                .and_then(|moves| engine.validate_expected_moves(&entries, player, &moves));
            match result {
                Ok(()) => {
                    println!("All expected moves validated successfully!");
                    return;
                }
                Err(e) => {
                    eprintln!("Validation failed: {}", e);
                    process::exit(1);
                }
            }
        }
    };

    match outcome {
        Ok(results) => engine.print_report(&results),
        Err(e) => {
            eprintln!("Error during replay: {}", e);
            process::exit(1);
        }
    }
}
