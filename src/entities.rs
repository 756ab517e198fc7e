// Entity model: snakes, apples and transient effects

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::{Coord, Direction, PlayerIndex};

/// Default snake colors, assigned by roster position
pub const PALETTE: [&str; 4] = ["#00DEAD", "#FF5555", "#5599FF", "#FFD700"];

/// Why a snake died
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum DeathCause {
    /// Left the board in wall mode, or hit a wall cell
    Wall,
    /// Ran into its own body
    SelfCollision,
    /// Ran into another snake's body; `owner` is credited with the kill
    Body { owner: PlayerIndex },
    /// Proposed head shared with other snakes on the same tick
    HeadToHead { with: Vec<PlayerIndex> },
}

/// Identity of a roster slot
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PlayerSpec {
    pub name: String,
    pub color: String,
}

impl PlayerSpec {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        PlayerSpec {
            name: name.into(),
            color: color.into(),
        }
    }

    /// Numbered player with a palette color
    pub fn numbered(index: PlayerIndex) -> Self {
        PlayerSpec::new(
            format!("Player {}", index + 1),
            PALETTE[index % PALETTE.len()],
        )
    }
}

/// A player's snake. The body is ordered head first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snake {
    pub index: PlayerIndex,
    pub name: String,
    pub color: String,
    body: VecDeque<Coord>,
    facing: Direction,
    pending: Option<Direction>,
    /// When set, the next move keeps the tail (net growth of one segment)
    pub grow: bool,
    alive: bool,
    kills: u32,
    death: Option<DeathCause>,
}

impl Snake {
    pub fn new(index: PlayerIndex, spec: &PlayerSpec, body: Vec<Coord>, facing: Direction) -> Self {
        Snake {
            index,
            name: spec.name.clone(),
            color: spec.color.clone(),
            body: body.into(),
            facing,
            pending: None,
            grow: false,
            alive: true,
            kills: 0,
            death: None,
        }
    }

    pub fn head(&self) -> Option<Coord> {
        self.body.front().copied()
    }

    pub fn body(&self) -> &VecDeque<Coord> {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn pending(&self) -> Option<Direction> {
        self.pending
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn death_cause(&self) -> Option<&DeathCause> {
        self.death.as_ref()
    }

    /// Buffers a requested direction; the latest request wins
    pub fn buffer_direction(&mut self, dir: Direction) {
        self.pending = Some(dir);
    }

    /// Applies the buffered direction unless it would turn the head back onto
    /// the neck. `step` maps (cell, direction) to the neighboring cell under
    /// the board's wrap policy. Returns true when the buffered direction was
    /// rejected.
    pub fn commit_direction(&mut self, step: impl Fn(Coord, Direction) -> Coord) -> bool {
        let Some(requested) = self.pending.take() else {
            return false;
        };

        let reverses = match (self.body.front(), self.body.get(1)) {
            (Some(&head), Some(&neck)) => step(head, requested) == neck,
            _ => false,
        };

        if reverses {
            true
        } else {
            self.facing = requested;
            false
        }
    }

    /// Moves the head to `new_head`, dropping the tail unless growing
    pub fn advance(&mut self, new_head: Coord) {
        self.body.push_front(new_head);
        if self.grow {
            self.grow = false;
        } else {
            self.body.pop_back();
        }
    }

    pub fn kill(&mut self, cause: DeathCause) {
        self.alive = false;
        self.pending = None;
        self.death = Some(cause);
    }

    /// Removes a dead snake's corpse from the board
    pub fn vacate(&mut self) {
        self.body.clear();
    }

    pub fn award_kill(&mut self) {
        self.kills += 1;
    }
}

/// A collectible apple
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Apple {
    pub position: Coord,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// A snake died here
    Burst,
    /// An apple was eaten here
    Sparkle,
}

/// Short-lived presentation marker; never occupies a board cell
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    pub kind: EffectKind,
    pub at: Coord,
    pub remaining_ticks: u32,
}

impl Effect {
    pub fn new(kind: EffectKind, at: Coord, lifetime: u32) -> Self {
        Effect {
            kind,
            at,
            remaining_ticks: lifetime,
        }
    }

    /// Ages the effect by one tick; returns false once it has expired
    pub fn age(&mut self) -> bool {
        self.remaining_ticks = self.remaining_ticks.saturating_sub(1);
        self.remaining_ticks > 0
    }
}
