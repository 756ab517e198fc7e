use log::{debug, error, info};
use std::env;
use std::process;

use snake_arena::config::Config;
use snake_arena::engine::RenderView;
use snake_arena::entities::PlayerSpec;
use snake_arena::level::{self, MAX_PLAYERS};
use snake_arena::round::{PlayerSlot, RenderSink, Round};

/// Headless sink: a scoreboard line every `every` ticks and the final banner
struct LogSink {
    every: u64,
}

impl RenderSink for LogSink {
    fn present(&mut self, view: &RenderView<'_>) {
        if let Some(status) = view.status_text() {
            info!("[{}] tick {}: {}", view.level_name, view.tick, status);
            return;
        }
        if self.every > 0 && view.tick % self.every == 0 {
            let line: Vec<String> = view
                .scoreboard()
                .iter()
                .map(|s| {
                    format!(
                        "{} len={} kills={}{}",
                        s.name,
                        s.length,
                        s.kills,
                        if s.alive { "" } else { " (dead)" }
                    )
                })
                .collect();
            debug!("tick {}: {}", view.tick, line.join(" | "));
        }
    }
}

#[tokio::main]
async fn main() {
    // We default to 'info' level logging. But if the `RUST_LOG` environment variable is set,
    // we keep that value instead.
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    env_logger::init();

    info!("Starting Snake Arena...");

    let config = Config::load_or_default();

    let level = match env::var("ARENA_LEVEL") {
        Ok(name) => level::builtin_level(&name).unwrap_or_else(|| {
            error!("Unknown level '{}'", name);
            process::exit(1);
        }),
        Err(_) => match level::builtin_levels().into_iter().next() {
            Some(level) => level,
            None => {
                error!("No built-in levels available");
                process::exit(1);
            }
        },
    };

    let players = env::var("ARENA_PLAYERS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(MAX_PLAYERS);

    let kind = config.agents.default_strategy;
    let slots = (0..players)
        .map(|i| PlayerSlot::ai(PlayerSpec::numbered(i), kind))
        .collect();

    let round = match Round::new(config, level, slots) {
        Ok(round) => round,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let mut sink = LogSink { every: 50 };
    match round.run(&mut sink).await {
        Ok(summary) => {
            for line in &summary.scoreboard {
                info!(
                    "{:<10} {:>3} kills  length {:>3}  {}",
                    line.name,
                    line.kills,
                    line.length,
                    if line.alive { "alive" } else { "dead" }
                );
            }
            if !summary.agents.is_clean() {
                info!("Agent shutdown: {:?}", summary.agents.reports);
            }
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
