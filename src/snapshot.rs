// Snapshot codec
//
// A Snapshot is an owned, value-copied view of the engine between ticks. It is
// the only game state that crosses into AI agents: the round publishes it as an
// encoded byte envelope and every agent decodes its own copy.
//
// Kill counts and full body history are left out; occupancy codes,
// heads, directions and apples are enough to choose a direction.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::board::{wrap_coord, Cell};
use crate::engine::Engine;
use crate::types::{Coord, Direction, PlayerIndex};

/// Bumped whenever the envelope layout changes
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

/// Per-snake part of a snapshot
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SnakeView {
    pub player: PlayerIndex,
    pub alive: bool,
    /// None once a corpse has vacated the board
    pub head: Option<Coord>,
    pub direction: Direction,
    pub length: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Completed engine ticks when captured; doubles as the snapshot version
    pub tick: u64,
    pub width: i32,
    pub height: i32,
    pub wrap: bool,
    /// Row-major occupancy codes (see `Cell::code`)
    pub cells: Vec<u8>,
    pub snakes: Vec<SnakeView>,
    pub apples: Vec<Coord>,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("snapshot format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },
    #[error("snapshot carries {found} cells for a board of {expected}")]
    CellCountMismatch { expected: usize, found: usize },
}

#[derive(Deserialize, Serialize)]
struct Envelope {
    v: u16,
    snapshot: Snapshot,
}

/// Encoded snapshot as published to agents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSnapshot {
    pub tick: u64,
    pub bytes: Arc<[u8]>,
}

impl Snapshot {
    /// Copies the engine's current (between-tick) state
    pub fn capture(engine: &Engine) -> Snapshot {
        let board = engine.board();
        Snapshot {
            tick: engine.tick_count(),
            width: board.width(),
            height: board.height(),
            wrap: board.wraps(),
            cells: board.codes(),
            snakes: engine
                .snakes()
                .iter()
                .map(|s| SnakeView {
                    player: s.index,
                    alive: s.is_alive(),
                    head: s.head(),
                    direction: s.facing(),
                    length: s.len(),
                })
                .collect(),
            apples: engine.apples().iter().map(|a| a.position).collect(),
        }
    }

    pub fn in_bounds(&self, c: Coord) -> bool {
        c.x >= 0 && c.x < self.width && c.y >= 0 && c.y < self.height
    }

    /// Occupant of a cell, None off the board
    pub fn cell(&self, c: Coord) -> Option<Cell> {
        if self.in_bounds(c) {
            self.cells
                .get((c.y * self.width + c.x) as usize)
                .map(|code| Cell::from_code(*code))
        } else {
            None
        }
    }

    /// Neighbor under the snapshot's wrap policy
    pub fn step(&self, c: Coord, dir: Direction) -> Coord {
        let next = dir.apply(&c);
        if self.wrap {
            wrap_coord(next, self.width, self.height)
        } else {
            next
        }
    }

    /// True for off-board, wall and snake cells
    pub fn is_blocked(&self, c: Coord) -> bool {
        !matches!(self.cell(c), Some(Cell::Empty) | Some(Cell::Apple))
    }

    pub fn snake(&self, player: PlayerIndex) -> Option<&SnakeView> {
        self.snakes.iter().find(|s| s.player == player)
    }

    /// Distance between two cells, taking wrap into account
    pub fn distance(&self, a: Coord, b: Coord) -> i32 {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        if self.wrap {
            dx.min(self.width - dx) + dy.min(self.height - dy)
        } else {
            dx + dy
        }
    }
}

/// Serializes a snapshot into its versioned byte envelope
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, CodecError> {
    let envelope = Envelope {
        v: SNAPSHOT_FORMAT_VERSION,
        snapshot: snapshot.clone(),
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Exact inverse of `encode`
pub fn decode(bytes: &[u8]) -> Result<Snapshot, CodecError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    if envelope.v != SNAPSHOT_FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: envelope.v,
            expected: SNAPSHOT_FORMAT_VERSION,
        });
    }

    let snapshot = envelope.snapshot;
    let expected = snapshot.width.max(0) as usize * snapshot.height.max(0) as usize;
    if snapshot.cells.len() != expected {
        return Err(CodecError::CellCountMismatch {
            expected,
            found: snapshot.cells.len(),
        });
    }
    Ok(snapshot)
}

impl EncodedSnapshot {
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, CodecError> {
        Ok(EncodedSnapshot {
            tick: snapshot.tick,
            bytes: encode(snapshot)?.into(),
        })
    }

    pub fn decode(&self) -> Result<Snapshot, CodecError> {
        decode(&self.bytes)
    }
}
