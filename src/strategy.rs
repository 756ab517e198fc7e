// AI decision strategies
//
// A strategy maps a snapshot to a direction for one player. Strategies only
// read snapshots; the agent turns their decisions into commands.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::board::Cell;
use crate::config::PathfindingConfig;
use crate::snapshot::{SnakeView, Snapshot};
use crate::types::{Coord, Direction, PlayerIndex};

/// Capability shared by every AI variant
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Chooses a direction for `player`; None means "keep going straight"
    fn decide(&self, snapshot: &Snapshot, player: PlayerIndex) -> Option<Direction>;
}

/// Strategy selection, as written in Arena.toml
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Pathfinding,
    Reactive,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Pathfinding => "pathfinding",
            StrategyKind::Reactive => "reactive",
        }
    }

    pub fn parse(s: &str) -> Result<StrategyKind, String> {
        match s.to_lowercase().as_str() {
            "pathfinding" => Ok(StrategyKind::Pathfinding),
            "reactive" => Ok(StrategyKind::Reactive),
            _ => Err(format!("Unknown strategy: {}", s)),
        }
    }

    pub fn build(&self, config: &PathfindingConfig) -> Arc<dyn Strategy> {
        match self {
            StrategyKind::Pathfinding => Arc::new(PathfindingStrategy::new(config.clone())),
            StrategyKind::Reactive => Arc::new(ReactiveStrategy),
        }
    }
}

/// Directions whose next cell is not immediately fatal
fn safe_moves(snapshot: &Snapshot, head: Coord) -> Vec<Direction> {
    Direction::all()
        .into_iter()
        .filter(|dir| !snapshot.is_blocked(snapshot.step(head, *dir)))
        .collect()
}

fn live_view(snapshot: &Snapshot, player: PlayerIndex) -> Option<(&SnakeView, Coord)> {
    let me = snapshot.snake(player)?;
    if !me.alive {
        return None;
    }
    Some((me, me.head?))
}

/// Avoids immediate collisions and otherwise heads greedily for the nearest apple
#[derive(Debug, Default)]
pub struct ReactiveStrategy;

impl Strategy for ReactiveStrategy {
    fn name(&self) -> &'static str {
        "reactive"
    }

    fn decide(&self, snapshot: &Snapshot, player: PlayerIndex) -> Option<Direction> {
        let (me, head) = live_view(snapshot, player)?;
        let moves = safe_moves(snapshot, head);
        if moves.is_empty() {
            return None;
        }

        let target = snapshot
            .apples
            .iter()
            .min_by_key(|apple| snapshot.distance(head, **apple))
            .copied();

        let Some(target) = target else {
            return Some(if moves.contains(&me.direction) {
                me.direction
            } else {
                moves[0]
            });
        };

        // Current direction first so it wins ties
        let mut ordered = moves;
        ordered.sort_by_key(|d| *d != me.direction);
        ordered
            .into_iter()
            .min_by_key(|dir| snapshot.distance(snapshot.step(head, *dir), target))
    }
}

/// What a breadth-first walk from a cell can reach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reach {
    space: usize,
    nearest_apple: Option<usize>,
}

/// Candidate move with its evaluation
#[derive(Debug, Clone, Copy)]
struct Candidate {
    direction: Direction,
    reach: Reach,
    score: i64,
}

/// Flood-fill and BFS based strategy: keeps enough room to survive, avoids
/// cells another head can also take, and paths to the nearest reachable apple
#[derive(Debug, Clone)]
pub struct PathfindingStrategy {
    config: PathfindingConfig,
}

impl PathfindingStrategy {
    pub fn new(config: PathfindingConfig) -> Self {
        PathfindingStrategy { config }
    }

    fn explore(snapshot: &Snapshot, start: Coord) -> Reach {
        let idx = |c: Coord| (c.y * snapshot.width + c.x) as usize;
        let mut visited = vec![false; snapshot.cells.len()];
        let mut queue = VecDeque::new();
        let mut reach = Reach {
            space: 0,
            nearest_apple: None,
        };

        if snapshot.is_blocked(start) {
            return reach;
        }
        visited[idx(start)] = true;
        queue.push_back((start, 0usize));

        while let Some((cell, depth)) = queue.pop_front() {
            reach.space += 1;
            if reach.nearest_apple.is_none() && snapshot.cell(cell) == Some(Cell::Apple) {
                reach.nearest_apple = Some(depth);
            }
            for dir in Direction::all() {
                let next = snapshot.step(cell, dir);
                if snapshot.is_blocked(next) || visited[idx(next)] {
                    continue;
                }
                visited[idx(next)] = true;
                queue.push_back((next, depth + 1));
            }
        }
        reach
    }

    /// True if some other live head is one step away from `cell`
    fn contested(snapshot: &Snapshot, player: PlayerIndex, cell: Coord) -> bool {
        snapshot
            .snakes
            .iter()
            .filter(|s| s.alive && s.player != player)
            .filter_map(|s| s.head)
            .any(|h| Direction::all().iter().any(|d| snapshot.step(h, *d) == cell))
    }

    fn evaluate(
        &self,
        snapshot: &Snapshot,
        me: &SnakeView,
        head: Coord,
        direction: Direction,
    ) -> Candidate {
        let next = snapshot.step(head, direction);
        let reach = Self::explore(snapshot, next);
        let needed = me.length + self.config.space_safety_margin;

        let mut score = self.config.weight_space as i64 * reach.space.min(needed) as i64;
        score -= match reach.nearest_apple {
            Some(d) => self.config.weight_apple_distance as i64 * d as i64,
            None => self.config.weight_apple_distance as i64 * snapshot.cells.len() as i64,
        };
        if Self::contested(snapshot, me.player, next) {
            score -= self.config.head_contest_penalty as i64;
        }
        if direction == me.direction {
            score += self.config.keep_direction_bonus as i64;
        }

        Candidate {
            direction,
            reach,
            score,
        }
    }
}

impl Strategy for PathfindingStrategy {
    fn name(&self) -> &'static str {
        "pathfinding"
    }

    fn decide(&self, snapshot: &Snapshot, player: PlayerIndex) -> Option<Direction> {
        let (me, head) = live_view(snapshot, player)?;
        let moves = safe_moves(snapshot, head);
        if moves.is_empty() {
            return None;
        }

        let candidates: Vec<Candidate> = moves
            .par_iter()
            .map(|dir| self.evaluate(snapshot, me, head, *dir))
            .collect();

        // Moves that would box us in are only taken when nothing roomier exists
        let needed = me.length + self.config.space_safety_margin;
        let roomy: Vec<Candidate> = candidates
            .iter()
            .copied()
            .filter(|c| c.reach.space >= needed)
            .collect();
        let pool = if roomy.is_empty() { candidates } else { roomy };

        let mut best: Option<Candidate> = None;
        for candidate in pool {
            let better = match best {
                None => true,
                Some(b) => {
                    candidate.score > b.score
                        || (candidate.score == b.score && candidate.reach.space > b.reach.space)
                }
            };
            if better {
                best = Some(candidate);
            }
        }
        best.map(|c| c.direction)
    }
}
