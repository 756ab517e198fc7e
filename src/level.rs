// Level definitions
//
// A level is immutable round configuration: board size, wrap policy, walls,
// spawn points, apple rules and the win condition. Levels are normally supplied
// by an external loader (they deserialize from TOML/JSON); a small built-in
// catalogue is provided for the headless runner and tests.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::board::BoardError;
use crate::types::{Coord, Direction};

/// Smallest playable board edge
pub const MIN_BOARD_SIZE: i32 = 5;

/// Largest playable board edge
pub const MAX_BOARD_SIZE: i32 = 256;

/// Largest roster a round supports
pub const MAX_PLAYERS: usize = 4;

/// Where and facing which way a snake starts
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnPoint {
    pub position: Coord,
    pub direction: Direction,
}

/// How a replacement apple is placed after one is eaten
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub enum AppleRule {
    /// Uniformly random unoccupied cell
    #[default]
    Random,
    /// Cycle through these cells, skipping occupied ones; random when all are taken
    Fixed(Vec<Coord>),
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinCondition {
    /// Round ends when at most one snake is left alive
    LastStanding,
    /// First snake to reach this many kills wins; falls back to last standing
    Kills(u32),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub name: String,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub wrap: bool,
    #[serde(default)]
    pub walls: Vec<Coord>,
    pub spawns: Vec<SpawnPoint>,
    pub apple_count: usize,
    #[serde(default)]
    pub apple_rule: AppleRule,
    pub win_condition: WinCondition,
    #[serde(default = "default_initial_length")]
    pub initial_length: usize,
}

fn default_initial_length() -> usize {
    3
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("board {width}x{height} is smaller than the {min}x{min} minimum", min = MIN_BOARD_SIZE)]
    BoardTooSmall { width: i32, height: i32 },
    #[error("board {width}x{height} is larger than the {max}x{max} maximum", max = MAX_BOARD_SIZE)]
    BoardTooLarge { width: i32, height: i32 },
    #[error("a round needs at least one player")]
    NoPlayers,
    #[error("{players} players requested but at most {max} are supported", max = MAX_PLAYERS)]
    TooManyPlayers { players: usize },
    #[error("level '{level}' has {spawns} spawn points, {players} players requested")]
    NotEnoughSpawns {
        level: String,
        spawns: usize,
        players: usize,
    },
    #[error("wall at ({}, {}) is outside the board", .0.x, .0.y)]
    WallOutOfBounds(Coord),
    #[error("initial snake length must be at least 1")]
    InvalidSnakeLength,
    #[error("spawn {index} places a segment outside the board at ({}, {})", .at.x, .at.y)]
    SpawnOutOfBounds { index: usize, at: Coord },
    #[error("spawn {index} places a segment on an occupied cell at ({}, {})", .at.x, .at.y)]
    SpawnBlocked { index: usize, at: Coord },
    #[error("level must place at least one apple")]
    NoApples,
    #[error("{apples} apples do not fit in {free} free cells")]
    TooManyApples { apples: usize, free: usize },
    #[error("fixed apple point ({}, {}) is outside the board or on a wall", .0.x, .0.y)]
    InvalidApplePoint(Coord),
    #[error("kill threshold must be at least 1")]
    InvalidWinThreshold,
    #[error("level layout is inconsistent: {0}")]
    Layout(#[from] BoardError),
}

impl Level {
    pub fn in_bounds(&self, c: Coord) -> bool {
        c.x >= 0 && c.x < self.width && c.y >= 0 && c.y < self.height
    }

    /// Cells a snake occupies at spawn: head first, body trailing away from the facing direction
    pub fn spawn_body(&self, spawn: &SpawnPoint) -> Vec<Coord> {
        let back = spawn.direction.opposite();
        let mut body = Vec::with_capacity(self.initial_length);
        let mut cur = spawn.position;
        for _ in 0..self.initial_length {
            body.push(cur);
            cur = back.apply(&cur);
        }
        body
    }

    /// Checks that the level can host a round with `players` snakes
    pub fn validate(&self, players: usize) -> Result<(), LevelError> {
        if self.width < MIN_BOARD_SIZE || self.height < MIN_BOARD_SIZE {
            return Err(LevelError::BoardTooSmall {
                width: self.width,
                height: self.height,
            });
        }
        if self.width > MAX_BOARD_SIZE || self.height > MAX_BOARD_SIZE {
            return Err(LevelError::BoardTooLarge {
                width: self.width,
                height: self.height,
            });
        }
        if players == 0 {
            return Err(LevelError::NoPlayers);
        }
        if players > MAX_PLAYERS {
            return Err(LevelError::TooManyPlayers { players });
        }
        if players > self.spawns.len() {
            return Err(LevelError::NotEnoughSpawns {
                level: self.name.clone(),
                spawns: self.spawns.len(),
                players,
            });
        }
        if self.initial_length == 0 {
            return Err(LevelError::InvalidSnakeLength);
        }
        if let WinCondition::Kills(0) = self.win_condition {
            return Err(LevelError::InvalidWinThreshold);
        }

        let mut occupied: HashSet<Coord> = HashSet::new();
        for wall in &self.walls {
            if !self.in_bounds(*wall) {
                return Err(LevelError::WallOutOfBounds(*wall));
            }
            occupied.insert(*wall);
        }

        for (index, spawn) in self.spawns.iter().take(players).enumerate() {
            for at in self.spawn_body(spawn) {
                if !self.in_bounds(at) {
                    return Err(LevelError::SpawnOutOfBounds { index, at });
                }
                if !occupied.insert(at) {
                    return Err(LevelError::SpawnBlocked { index, at });
                }
            }
        }

        if let AppleRule::Fixed(points) = &self.apple_rule {
            let walls: HashSet<&Coord> = self.walls.iter().collect();
            if let Some(bad) = points
                .iter()
                .find(|p| !self.in_bounds(**p) || walls.contains(p))
            {
                return Err(LevelError::InvalidApplePoint(*bad));
            }
        }

        if self.apple_count == 0 {
            return Err(LevelError::NoApples);
        }
        let free = (self.width as usize * self.height as usize).saturating_sub(occupied.len());
        if self.apple_count > free {
            return Err(LevelError::TooManyApples {
                apples: self.apple_count,
                free,
            });
        }

        Ok(())
    }
}

/// Levels shipped with the arena
pub fn builtin_levels() -> Vec<Level> {
    vec![open_field(), the_box(), crossroads()]
}

/// Finds a built-in level by case-insensitive name
pub fn builtin_level(name: &str) -> Option<Level> {
    builtin_levels()
        .into_iter()
        .find(|l| l.name.eq_ignore_ascii_case(name))
}

fn open_field() -> Level {
    Level {
        name: "Open Field".to_string(),
        width: 20,
        height: 20,
        wrap: true,
        walls: vec![],
        spawns: vec![
            SpawnPoint { position: Coord::new(5, 4), direction: Direction::Right },
            SpawnPoint { position: Coord::new(14, 15), direction: Direction::Left },
            SpawnPoint { position: Coord::new(15, 5), direction: Direction::Down },
            SpawnPoint { position: Coord::new(4, 14), direction: Direction::Up },
        ],
        apple_count: 3,
        apple_rule: AppleRule::Random,
        win_condition: WinCondition::LastStanding,
        initial_length: 3,
    }
}

fn the_box() -> Level {
    let (w, h) = (20, 20);
    let mut walls = Vec::new();
    for x in 0..w {
        walls.push(Coord::new(x, 0));
        walls.push(Coord::new(x, h - 1));
    }
    for y in 1..h - 1 {
        walls.push(Coord::new(0, y));
        walls.push(Coord::new(w - 1, y));
    }

    Level {
        name: "The Box".to_string(),
        width: w,
        height: h,
        wrap: false,
        walls,
        spawns: vec![
            SpawnPoint { position: Coord::new(6, 4), direction: Direction::Right },
            SpawnPoint { position: Coord::new(13, 15), direction: Direction::Left },
            SpawnPoint { position: Coord::new(15, 6), direction: Direction::Down },
            SpawnPoint { position: Coord::new(4, 13), direction: Direction::Up },
        ],
        apple_count: 2,
        apple_rule: AppleRule::Random,
        win_condition: WinCondition::Kills(2),
        initial_length: 3,
    }
}

fn crossroads() -> Level {
    let (w, h) = (24, 24);
    let mut walls = Vec::new();
    // Plus-shaped divider with a 4-cell gap around the center and open ends
    for i in 3..w - 3 {
        if !(10..14).contains(&i) {
            walls.push(Coord::new(i, 12));
            walls.push(Coord::new(12, i));
        }
    }

    Level {
        name: "Crossroads".to_string(),
        width: w,
        height: h,
        wrap: true,
        walls,
        spawns: vec![
            SpawnPoint { position: Coord::new(6, 5), direction: Direction::Right },
            SpawnPoint { position: Coord::new(17, 18), direction: Direction::Left },
            SpawnPoint { position: Coord::new(18, 6), direction: Direction::Down },
            SpawnPoint { position: Coord::new(5, 17), direction: Direction::Up },
        ],
        apple_count: 4,
        apple_rule: AppleRule::Fixed(vec![
            Coord::new(8, 8),
            Coord::new(15, 8),
            Coord::new(15, 15),
            Coord::new(8, 15),
            Coord::new(11, 11),
            Coord::new(13, 13),
        ]),
        win_condition: WinCondition::Kills(2),
        initial_length: 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_level() -> Level {
        Level {
            name: "Small".to_string(),
            width: 7,
            height: 7,
            wrap: false,
            walls: vec![],
            spawns: vec![
                SpawnPoint { position: Coord::new(3, 1), direction: Direction::Right },
                SpawnPoint { position: Coord::new(3, 5), direction: Direction::Left },
            ],
            apple_count: 1,
            apple_rule: AppleRule::Random,
            win_condition: WinCondition::LastStanding,
            initial_length: 3,
        }
    }

    #[test]
    fn test_builtin_levels_validate_for_full_roster() {
        for level in builtin_levels() {
            for players in 1..=MAX_PLAYERS {
                assert_eq!(level.validate(players), Ok(()), "level {}", level.name);
            }
        }
    }

    #[test]
    fn test_spawn_body_trails_behind_head() {
        let level = small_level();
        assert_eq!(
            level.spawn_body(&level.spawns[0]),
            vec![Coord::new(3, 1), Coord::new(2, 1), Coord::new(1, 1)]
        );
    }

    #[test]
    fn test_rejects_small_board() {
        let mut level = small_level();
        level.width = 4;
        assert!(matches!(level.validate(1), Err(LevelError::BoardTooSmall { .. })));
    }

    #[test]
    fn test_rejects_oversized_board() {
        let mut level = small_level();
        level.width = 50_000;
        level.height = 50_000;
        assert_eq!(
            level.validate(1),
            Err(LevelError::BoardTooLarge { width: 50_000, height: 50_000 })
        );

        level.width = MAX_BOARD_SIZE;
        level.height = MAX_BOARD_SIZE;
        assert!(level.validate(1).is_ok());
    }

    #[test]
    fn test_rejects_spawn_out_of_bounds() {
        let mut level = small_level();
        level.spawns[0].position = Coord::new(1, 1);
        assert_eq!(
            level.validate(1),
            Err(LevelError::SpawnOutOfBounds { index: 0, at: Coord::new(-1, 1) })
        );
    }

    #[test]
    fn test_rejects_spawn_on_wall() {
        let mut level = small_level();
        level.walls.push(Coord::new(2, 1));
        assert_eq!(
            level.validate(1),
            Err(LevelError::SpawnBlocked { index: 0, at: Coord::new(2, 1) })
        );
    }

    #[test]
    fn test_rejects_roster_larger_than_spawns() {
        let level = small_level();
        assert!(matches!(level.validate(3), Err(LevelError::NotEnoughSpawns { .. })));
        assert_eq!(level.validate(0), Err(LevelError::NoPlayers));
    }

    #[test]
    fn test_rejects_zero_kill_threshold() {
        let mut level = small_level();
        level.win_condition = WinCondition::Kills(0);
        assert_eq!(level.validate(2), Err(LevelError::InvalidWinThreshold));
    }

    #[test]
    fn test_level_deserializes_from_toml() {
        let src = r#"
            name = "Toml Level"
            width = 8
            height = 6
            apple_count = 2
            win_condition = "LastStanding"

            [[spawns]]
            position = { x = 3, y = 2 }
            direction = "right"
        "#;
        let level: Level = toml::from_str(src).expect("level should parse");
        assert_eq!(level.initial_length, 3);
        assert_eq!(level.apple_rule, AppleRule::Random);
        assert!(!level.wrap);
        assert_eq!(level.validate(1), Ok(()));
    }
}
