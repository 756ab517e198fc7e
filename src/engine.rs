// Simulation engine
//
// Owns the board and every entity of a round and advances the world one
// discrete tick at a time. All snakes move simultaneously: collisions are
// evaluated against the frozen pre-move board plus every proposed head, so
// processing order never changes the result.
//
// A tick runs on a working copy of the world and is committed only when it
// resolves completely; a failed tick leaves the previous state authoritative.

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::board::{Board, Cell};
use crate::command::Command;
use crate::config::RulesConfig;
use crate::entities::{Apple, DeathCause, Effect, EffectKind, PlayerSpec, Snake};
use crate::level::{AppleRule, Level, LevelError, WinCondition};
use crate::types::{Coord, Direction, PlayerIndex};

/// How a round ended
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Winner(PlayerIndex),
    Draw,
    /// The round loop gave up after its tick limit
    TickLimit,
}

/// Something that happened during a tick
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A buffered direction would have reversed the snake into its neck
    ReversalIgnored { player: PlayerIndex, requested: Direction },
    Died { player: PlayerIndex, cause: DeathCause, at: Coord },
    Kill { killer: PlayerIndex, victim: PlayerIndex },
    AppleEaten { player: PlayerIndex, at: Coord },
    AppleSpawned { at: Coord },
    RoundDecided(RoundOutcome),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TickError {
    /// Impossible state reached; indicates a logic defect
    #[error("invariant violation at tick {tick}: {detail}")]
    InvariantViolation { tick: u64, detail: String },
}

/// One row of the scoreboard
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ScoreLine {
    pub player: PlayerIndex,
    pub name: String,
    pub color: String,
    pub kills: u32,
    pub length: usize,
    pub alive: bool,
}

/// Read-only post-tick state handed to the render sink
#[derive(Debug)]
pub struct RenderView<'a> {
    pub tick: u64,
    pub level_name: &'a str,
    pub board: &'a Board,
    pub snakes: &'a [Snake],
    pub apples: &'a [Apple],
    pub effects: &'a [Effect],
    pub outcome: Option<RoundOutcome>,
}

impl RenderView<'_> {
    pub fn scoreboard(&self) -> Vec<ScoreLine> {
        scoreboard(self.snakes)
    }

    /// Win/draw banner text, if the round is decided
    pub fn status_text(&self) -> Option<String> {
        self.outcome.map(|outcome| match outcome {
            RoundOutcome::Winner(player) => {
                let name = self
                    .snakes
                    .get(player)
                    .map(|s| s.name.as_str())
                    .unwrap_or("Unknown");
                format!("{} wins!", name)
            }
            RoundOutcome::Draw => "Draw!".to_string(),
            RoundOutcome::TickLimit => "Time up - draw!".to_string(),
        })
    }
}

/// Mutable world state; cloned per tick so a failed tick can be discarded
#[derive(Debug, Clone)]
struct World {
    tick: u64,
    board: Board,
    snakes: Vec<Snake>,
    apples: Vec<Apple>,
    effects: Vec<Effect>,
    apple_cursor: usize,
    outcome: Option<RoundOutcome>,
}

pub struct Engine {
    level: Level,
    /// Board holding only the level's walls
    walls: Board,
    effect_lifetime: u32,
    rng: StdRng,
    world: World,
}

impl Engine {
    /// Builds a round: validates the level against the roster, places snakes
    /// at their spawn points and seeds the initial apples
    pub fn new(
        level: Level,
        roster: &[PlayerSpec],
        rules: &RulesConfig,
        seed: u64,
    ) -> Result<Engine, LevelError> {
        level.validate(roster.len())?;

        let mut walls = Board::new(level.width, level.height, level.wrap);
        for wall in &level.walls {
            if walls.get(*wall) != Some(Cell::Wall) {
                walls.place(*wall, Cell::Wall)?;
            }
        }

        let snakes: Vec<Snake> = roster
            .iter()
            .zip(level.spawns.iter())
            .enumerate()
            .map(|(index, (spec, spawn))| {
                Snake::new(index, spec, level.spawn_body(spawn), spawn.direction)
            })
            .collect();

        let mut engine = Engine {
            effect_lifetime: rules.effect_lifetime_ticks,
            rng: StdRng::seed_from_u64(seed),
            world: World {
                tick: 0,
                board: walls.clone(),
                snakes,
                apples: Vec::new(),
                effects: Vec::new(),
                apple_cursor: 0,
                outcome: None,
            },
            walls,
            level,
        };

        let mut board = build_board(&engine.walls, &engine.world.snakes, &[])?;
        let mut apples = Vec::new();
        let mut cursor = 0;
        for _ in 0..engine.level.apple_count {
            match pick_apple_cell(&engine.level.apple_rule, &board, &mut cursor, &mut engine.rng) {
                Some(at) => {
                    board.place(at, Cell::Apple)?;
                    apples.push(Apple { position: at });
                }
                None => break,
            }
        }
        engine.world.board = board;
        engine.world.apples = apples;
        engine.world.apple_cursor = cursor;

        info!(
            "Round ready on '{}' ({}x{}, wrap={}) with {} snakes",
            engine.level.name,
            engine.level.width,
            engine.level.height,
            engine.level.wrap,
            engine.world.snakes.len()
        );
        Ok(engine)
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    /// Number of completed ticks
    pub fn tick_count(&self) -> u64 {
        self.world.tick
    }

    pub fn board(&self) -> &Board {
        &self.world.board
    }

    pub fn snakes(&self) -> &[Snake] {
        &self.world.snakes
    }

    pub fn snake(&self, player: PlayerIndex) -> Option<&Snake> {
        self.world.snakes.get(player)
    }

    pub fn apples(&self) -> &[Apple] {
        &self.world.apples
    }

    pub fn effects(&self) -> &[Effect] {
        &self.world.effects
    }

    pub fn alive_count(&self) -> usize {
        self.world.snakes.iter().filter(|s| s.is_alive()).count()
    }

    /// Outcome reached so far, if any
    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.world.outcome
    }

    pub fn scoreboard(&self) -> Vec<ScoreLine> {
        scoreboard(&self.world.snakes)
    }

    /// Current renderable state; the sink cannot mutate the engine through it
    pub fn render_view(&self) -> RenderView<'_> {
        RenderView {
            tick: self.world.tick,
            level_name: &self.level.name,
            board: &self.world.board,
            snakes: &self.world.snakes,
            apples: &self.world.apples,
            effects: &self.world.effects,
            outcome: self.world.outcome,
        }
    }

    /// Advances the world by exactly one step
    ///
    /// `commands` should hold at most one command per player (as produced by
    /// `CommandReceiver::drain`); if several are given the last one wins.
    pub fn tick<I>(&mut self, commands: I) -> Result<Vec<GameEvent>, TickError>
    where
        I: IntoIterator<Item = Command>,
    {
        let mut next = self.world.clone();
        let tick = next.tick + 1;
        let mut events = Vec::new();

        let violation = |detail: String| {
            error!("Tick {}: invariant violation: {}", tick, detail);
            TickError::InvariantViolation { tick, detail }
        };

        // Corpses from the previous tick leave the board
        for snake in next.snakes.iter_mut().filter(|s| !s.is_alive()) {
            snake.vacate();
        }
        let pre = build_board(&self.walls, &next.snakes, &next.apples)
            .map_err(|e| violation(e.to_string()))?;

        // 1. Buffer and commit directions
        for command in commands {
            match next.snakes.get_mut(command.player) {
                Some(snake) if snake.is_alive() => snake.buffer_direction(command.direction),
                _ => debug!(
                    "Tick {}: dropping command for inactive player {}",
                    tick, command.player
                ),
            }
        }
        for snake in next.snakes.iter_mut().filter(|s| s.is_alive()) {
            let requested = snake.pending();
            if snake.commit_direction(|c, d| pre.step(c, d)) {
                if let Some(requested) = requested {
                    events.push(GameEvent::ReversalIgnored {
                        player: snake.index,
                        requested,
                    });
                }
            }
        }

        // 2. Proposed heads, all computed from the same pre-move state
        let mut proposals: Vec<(PlayerIndex, Coord, Coord)> = Vec::new();
        for snake in next.snakes.iter().filter(|s| s.is_alive()) {
            let head = snake
                .head()
                .ok_or_else(|| violation(format!("live snake {} has an empty body", snake.index)))?;
            proposals.push((snake.index, head, pre.step(head, snake.facing())));
        }

        let mut contested: HashMap<Coord, Vec<PlayerIndex>> = HashMap::new();
        for (player, _, target) in &proposals {
            contested.entry(*target).or_default().push(*player);
        }

        // 3. Collisions against the frozen pre-move board
        let mut deaths: Vec<(PlayerIndex, Coord, DeathCause)> = Vec::new();
        for (player, head, target) in &proposals {
            let cause = match pre.get(*target) {
                None | Some(Cell::Wall) => Some(DeathCause::Wall),
                Some(Cell::Snake(owner)) if owner == *player => Some(DeathCause::SelfCollision),
                // Swapping cells counts as two body hits, so both owners get a kill
                Some(Cell::Snake(owner)) => Some(DeathCause::Body { owner }),
                Some(Cell::Empty) | Some(Cell::Apple) => None,
            }
            .or_else(|| {
                let others: Vec<PlayerIndex> = contested
                    .get(target)
                    .map(|all| all.iter().copied().filter(|p| p != player).collect())
                    .unwrap_or_default();
                (!others.is_empty()).then_some(DeathCause::HeadToHead { with: others })
            });

            if let Some(cause) = cause {
                deaths.push((*player, *head, cause));
            }
        }
        let dying: HashSet<PlayerIndex> = deaths.iter().map(|(p, _, _)| *p).collect();

        // 4. Survivors move; an apple under the new head grows the snake this tick
        let mut eaten: Vec<(PlayerIndex, Coord)> = Vec::new();
        for (player, _, target) in &proposals {
            if dying.contains(player) {
                continue;
            }
            let snake = &mut next.snakes[*player];
            if pre.get(*target) == Some(Cell::Apple) {
                snake.grow = true;
                eaten.push((*player, *target));
            }
            snake.advance(*target);
        }

        // 5. Deaths, kill attribution
        next.effects.retain_mut(|e| e.age());
        for (player, at, cause) in deaths {
            if let DeathCause::Body { owner } = &cause {
                next.snakes[*owner].award_kill();
                events.push(GameEvent::Kill {
                    killer: *owner,
                    victim: player,
                });
            }
            debug!("Tick {}: player {} died ({:?})", tick, player, cause);
            next.snakes[player].kill(cause.clone());
            next.effects
                .push(Effect::new(EffectKind::Burst, at, self.effect_lifetime));
            events.push(GameEvent::Died { player, cause, at });
        }

        // 6. Apple consumption
        for (player, at) in &eaten {
            next.apples.retain(|a| a.position != *at);
            next.effects
                .push(Effect::new(EffectKind::Sparkle, *at, self.effect_lifetime));
            events.push(GameEvent::AppleEaten {
                player: *player,
                at: *at,
            });
        }

        // Rebuilding the board detects any overlap or self-intersection
        let mut board = build_board(&self.walls, &next.snakes, &next.apples)
            .map_err(|e| violation(e.to_string()))?;

        while next.apples.len() < self.level.apple_count {
            match pick_apple_cell(
                &self.level.apple_rule,
                &board,
                &mut next.apple_cursor,
                &mut self.rng,
            ) {
                Some(at) => {
                    board
                        .place(at, Cell::Apple)
                        .map_err(|e| violation(e.to_string()))?;
                    next.apples.push(Apple { position: at });
                    events.push(GameEvent::AppleSpawned { at });
                }
                None => {
                    warn!("Tick {}: no free cell left for a new apple", tick);
                    break;
                }
            }
        }

        next.board = board;
        next.tick = tick;

        // 7. Win check on post-tick state
        if next.outcome.is_none() {
            if let Some(outcome) = evaluate_outcome(&self.level, &next.snakes) {
                info!("Tick {}: round decided: {:?}", tick, outcome);
                next.outcome = Some(outcome);
                events.push(GameEvent::RoundDecided(outcome));
            }
        }

        self.world = next;
        Ok(events)
    }

    /// Records a tick-limit ending decided by the round loop
    pub fn declare_tick_limit(&mut self) {
        if self.world.outcome.is_none() {
            self.world.outcome = Some(RoundOutcome::TickLimit);
        }
    }
}

/// Evaluates the level's win condition against the given snakes
pub fn evaluate_outcome(level: &Level, snakes: &[Snake]) -> Option<RoundOutcome> {
    if let WinCondition::Kills(threshold) = level.win_condition {
        let top = snakes.iter().map(Snake::kills).max().unwrap_or(0);
        if top >= threshold {
            let leaders: Vec<&Snake> = snakes.iter().filter(|s| s.kills() == top).collect();
            return Some(match leaders.as_slice() {
                [only] => RoundOutcome::Winner(only.index),
                _ => RoundOutcome::Draw,
            });
        }
    }

    let alive: Vec<&Snake> = snakes.iter().filter(|s| s.is_alive()).collect();
    if snakes.len() > 1 {
        match alive.as_slice() {
            [] => Some(RoundOutcome::Draw),
            [survivor] => Some(RoundOutcome::Winner(survivor.index)),
            _ => None,
        }
    } else if alive.is_empty() {
        Some(RoundOutcome::Draw)
    } else {
        None
    }
}

fn scoreboard(snakes: &[Snake]) -> Vec<ScoreLine> {
    snakes
        .iter()
        .map(|s| ScoreLine {
            player: s.index,
            name: s.name.clone(),
            color: s.color.clone(),
            kills: s.kills(),
            length: s.len(),
            alive: s.is_alive(),
        })
        .collect()
}

/// Lays walls, apples and every snake body (live or corpse) onto a fresh board
fn build_board(
    walls: &Board,
    snakes: &[Snake],
    apples: &[Apple],
) -> Result<Board, crate::board::BoardError> {
    let mut board = walls.clone();
    for apple in apples {
        board.place(apple.position, Cell::Apple)?;
    }
    for snake in snakes {
        for segment in snake.body() {
            board.place(*segment, Cell::Snake(snake.index))?;
        }
    }
    Ok(board)
}

fn pick_apple_cell(
    rule: &AppleRule,
    board: &Board,
    cursor: &mut usize,
    rng: &mut StdRng,
) -> Option<Coord> {
    if let AppleRule::Fixed(points) = rule {
        for offset in 0..points.len() {
            let idx = (*cursor + offset) % points.len();
            if board.is_free(points[idx]) {
                *cursor = (idx + 1) % points.len();
                return Some(points[idx]);
            }
        }
    }
    board.free_cells().choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::SpawnPoint;

    fn rules() -> RulesConfig {
        RulesConfig {
            effect_lifetime_ticks: 3,
            seed: None,
        }
    }

    fn duel_level() -> Level {
        Level {
            name: "Duel".to_string(),
            width: 7,
            height: 7,
            wrap: false,
            walls: vec![],
            spawns: vec![
                SpawnPoint { position: Coord::new(2, 1), direction: Direction::Right },
                SpawnPoint { position: Coord::new(4, 5), direction: Direction::Left },
            ],
            apple_count: 1,
            apple_rule: AppleRule::Fixed(vec![Coord::new(6, 6)]),
            win_condition: WinCondition::LastStanding,
            initial_length: 2,
        }
    }

    fn roster(n: usize) -> Vec<PlayerSpec> {
        (0..n).map(PlayerSpec::numbered).collect()
    }

    #[test]
    fn test_failed_tick_keeps_previous_state() {
        let mut engine = Engine::new(duel_level(), &roster(2), &rules(), 1).unwrap();
        engine.world.snakes[0].vacate();

        let result = engine.tick(Vec::new());
        assert!(matches!(result, Err(TickError::InvariantViolation { tick: 1, .. })));
        assert_eq!(engine.tick_count(), 0);
        assert!(engine.snakes()[1].head() == Some(Coord::new(4, 5)));
    }

    #[test]
    fn test_fixed_apple_rule_places_first_point() {
        let engine = Engine::new(duel_level(), &roster(2), &rules(), 1).unwrap();
        assert_eq!(engine.apples(), &[Apple { position: Coord::new(6, 6) }]);
        assert_eq!(engine.board().get(Coord::new(6, 6)), Some(Cell::Apple));
    }

    #[test]
    fn test_invalid_level_is_rejected_before_round() {
        let mut level = duel_level();
        level.spawns[1].position = Coord::new(9, 9);
        assert!(Engine::new(level, &roster(2), &rules(), 1).is_err());
    }

    #[test]
    fn test_outcome_kills_threshold() {
        let mut level = duel_level();
        level.win_condition = WinCondition::Kills(1);
        let mut snakes: Vec<Snake> = roster(2)
            .iter()
            .enumerate()
            .map(|(i, spec)| Snake::new(i, spec, vec![Coord::new(i as i32, 0)], Direction::Down))
            .collect();
        assert_eq!(evaluate_outcome(&level, &snakes), None);

        snakes[1].award_kill();
        assert_eq!(evaluate_outcome(&level, &snakes), Some(RoundOutcome::Winner(1)));

        snakes[0].award_kill();
        assert_eq!(evaluate_outcome(&level, &snakes), Some(RoundOutcome::Draw));
    }

    #[test]
    fn test_outcome_single_player_ends_on_death() {
        let level = duel_level();
        let mut snakes = vec![Snake::new(0, &PlayerSpec::numbered(0), vec![Coord::new(0, 0)], Direction::Down)];
        assert_eq!(evaluate_outcome(&level, &snakes), None);
        snakes[0].kill(DeathCause::Wall);
        assert_eq!(evaluate_outcome(&level, &snakes), Some(RoundOutcome::Draw));
    }

    #[test]
    fn test_status_text() {
        let mut engine = Engine::new(duel_level(), &roster(2), &rules(), 1).unwrap();
        assert_eq!(engine.render_view().status_text(), None);
        engine.declare_tick_limit();
        assert_eq!(
            engine.render_view().status_text().as_deref(),
            Some("Time up - draw!")
        );
    }
}
