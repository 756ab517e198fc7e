// Replay module for analyzing round logs and debugging agent decisions
//
// A round log holds, per tick, the snapshot agents saw and the commands the
// engine applied. Every command records the snapshot tick it was computed
// from, so for a given player the logged decision on snapshot `t` is the
// command with `origin_tick == t`. Replaying runs a strategy on snapshot `t`
// again and compares the two.
//
// Snapshots whose decision never reached the engine (superseded in the queue,
// or the strategy returned nothing) have no logged move and are skipped.

use log::{info, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use crate::config::Config;
use crate::round_logger::LogEntry;
use crate::strategy::StrategyKind;
use crate::types::{Direction, PlayerIndex};

/// Result of replaying a single snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayResult {
    pub tick: u64,
    pub logged_move: Direction,
    pub replayed_move: Option<Direction>,
    pub matches: bool,
    pub computation_time_us: u128,
}

/// Statistics for a complete replay session
#[derive(Debug, Default)]
pub struct ReplayStats {
    pub total_ticks: usize,
    pub matches: usize,
    pub mismatches: usize,
    pub match_rate: f64,
}

/// Replays one player's decisions with a chosen strategy
pub struct ReplayEngine {
    config: Config,
    verbose: bool,
}

impl ReplayEngine {
    pub fn new(config: Config, verbose: bool) -> Self {
        ReplayEngine { config, verbose }
    }

    /// Loads all log entries from a JSONL file, ordered by tick
    pub fn load_log_file<P: AsRef<Path>>(&self, log_path: P) -> Result<Vec<LogEntry>, String> {
        let file =
            File::open(log_path.as_ref()).map_err(|e| format!("Failed to open log file: {}", e))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| format!("Failed to read line {}: {}", line_num + 1, e))?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: LogEntry = serde_json::from_str(&line)
                .map_err(|e| format!("Failed to parse JSON on line {}: {}", line_num + 1, e))?;
            entries.push(entry);
        }

        entries.sort_by_key(|e| e.tick);
        info!("Loaded {} log entries", entries.len());
        Ok(entries)
    }

    /// Logged decisions of one player, keyed by the snapshot tick they answered
    pub fn logged_moves(entries: &[LogEntry], player: PlayerIndex) -> BTreeMap<u64, Direction> {
        entries
            .iter()
            .flat_map(|e| e.commands.iter())
            .filter(|c| c.player == player)
            .map(|c| (c.origin_tick, c.direction))
            .collect()
    }

    /// Re-runs the strategy on one logged snapshot and compares it with the
    /// logged decision
    pub fn replay_entry(
        &self,
        entry: &LogEntry,
        logged_move: Direction,
        player: PlayerIndex,
        kind: StrategyKind,
    ) -> Result<ReplayResult, String> {
        if entry.snapshot.snake(player).is_none() {
            return Err(format!("Player {} not found in tick {}", player, entry.tick));
        }

        let strategy = kind.build(&self.config.pathfinding);
        let start_time = Instant::now();
        let replayed_move = strategy.decide(&entry.snapshot, player);
        let computation_time_us = start_time.elapsed().as_micros();

        let matches = replayed_move == Some(logged_move);
        let replayed_str = replayed_move.map(|d| d.as_str()).unwrap_or("none");

        if self.verbose {
            if matches {
                info!(
                    "Tick {}: MATCH - {} ({}us)",
                    entry.tick, replayed_str, computation_time_us
                );
            } else {
                warn!(
                    "Tick {}: MISMATCH - Logged: {}, Replayed: {} ({}us)",
                    entry.tick,
                    logged_move.as_str(),
                    replayed_str,
                    computation_time_us
                );
            }
        }

        Ok(ReplayResult {
            tick: entry.tick,
            logged_move,
            replayed_move,
            matches,
            computation_time_us,
        })
    }

    /// Replays every snapshot the player answered
    pub fn replay_all(
        &self,
        entries: &[LogEntry],
        player: PlayerIndex,
        kind: StrategyKind,
    ) -> Result<Vec<ReplayResult>, String> {
        let ticks: Vec<u64> = entries.iter().map(|e| e.tick).collect();
        self.replay_selected(entries, player, kind, &ticks, false)
    }

    /// Replays specific snapshot ticks
    pub fn replay_ticks(
        &self,
        entries: &[LogEntry],
        player: PlayerIndex,
        kind: StrategyKind,
        ticks: &[u64],
    ) -> Result<Vec<ReplayResult>, String> {
        self.replay_selected(entries, player, kind, ticks, true)
    }

    fn replay_selected(
        &self,
        entries: &[LogEntry],
        player: PlayerIndex,
        kind: StrategyKind,
        ticks: &[u64],
        strict: bool,
    ) -> Result<Vec<ReplayResult>, String> {
        let logged = Self::logged_moves(entries, player);
        let mut results = Vec::new();

        for tick in ticks {
            let entry = match entries.iter().find(|e| e.tick == *tick) {
                Some(entry) => entry,
                None if strict => return Err(format!("Tick {} not found in log file", tick)),
                None => continue,
            };
            let Some(logged_move) = logged.get(tick) else {
                if strict {
                    warn!("Tick {}: no logged decision for player {}", tick, player);
                }
                continue;
            };

            match self.replay_entry(entry, *logged_move, player, kind) {
                Ok(result) => results.push(result),
                Err(e) => warn!("Failed to replay tick {}: {}", tick, e),
            }
        }

        Ok(results)
    }

    pub fn generate_stats(&self, results: &[ReplayResult]) -> ReplayStats {
        let total_ticks = results.len();
        let matches = results.iter().filter(|r| r.matches).count();
        let match_rate = if total_ticks > 0 {
            (matches as f64 / total_ticks as f64) * 100.0
        } else {
            0.0
        };

        ReplayStats {
            total_ticks,
            matches,
            mismatches: total_ticks - matches,
            match_rate,
        }
    }

    pub fn print_report(&self, results: &[ReplayResult]) {
        let stats = self.generate_stats(results);

        println!("\n===========================================================");
        println!("                    REPLAY REPORT");
        println!("===========================================================");
        println!("Decisions:      {}", stats.total_ticks);
        println!("Matches:        {} ({:.1}%)", stats.matches, stats.match_rate);
        println!("Mismatches:     {}", stats.mismatches);
        println!("===========================================================\n");

        if !results.is_empty() {
            let avg_time: f64 = results
                .iter()
                .map(|r| r.computation_time_us as f64)
                .sum::<f64>()
                / results.len() as f64;
            println!("Average Decision Time:   {:.1}us\n", avg_time);
        }

        let mismatches: Vec<_> = results.iter().filter(|r| !r.matches).collect();
        if !mismatches.is_empty() {
            println!("                  DETAILED MISMATCHES");
            println!("-----------------------------------------------------------");
            for result in mismatches {
                println!(
                    "Tick {}: {} -> {}",
                    result.tick,
                    result.logged_move.as_str(),
                    result.replayed_move.map(|d| d.as_str()).unwrap_or("none")
                );
            }
            println!();
        }
    }

    /// Checks that the player's logged decisions at the given snapshot ticks
    /// were among the acceptable moves
    pub fn validate_expected_moves(
        &self,
        entries: &[LogEntry],
        player: PlayerIndex,
        expected_moves: &[(u64, Vec<Direction>)],
    ) -> Result<(), String> {
        let logged = Self::logged_moves(entries, player);

        for (tick, acceptable) in expected_moves {
            let actual = logged
                .get(tick)
                .ok_or_else(|| format!("No decision by player {} on tick {}", player, tick))?;

            if !acceptable.contains(actual) {
                return Err(format!(
                    "Tick {}: Expected one of {:?}, but got {}",
                    tick,
                    acceptable.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
                    actual.as_str()
                ));
            }
        }

        Ok(())
    }
}
