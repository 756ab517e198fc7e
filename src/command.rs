// Command channel: direction requests flowing into the engine
//
// Multi-producer, single-consumer. Producers (input mapping, AI agents) never
// block; the engine drains once per tick and keeps only the freshest command
// per player, discarding everything it supersedes.

use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::types::{Direction, PlayerIndex};

/// A single direction request attributed to one player
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub player: PlayerIndex,
    pub direction: Direction,
    /// Tick of the snapshot the command was decided on (0 for direct input)
    pub origin_tick: u64,
    /// Enqueue order, assigned by the channel
    pub seq: u64,
}

impl Command {
    pub fn new(player: PlayerIndex, direction: Direction, origin_tick: u64) -> Self {
        Command {
            player,
            direction,
            origin_tick,
            seq: 0,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("command channel closed: the round has ended")]
pub struct ChannelClosed;

#[derive(Debug)]
struct Shared {
    queue: Mutex<VecDeque<Command>>,
    next_seq: AtomicU64,
    closed: AtomicBool,
}

/// Creates a connected sender/receiver pair
pub fn channel() -> (CommandSender, CommandReceiver) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::new()),
        next_seq: AtomicU64::new(1),
        closed: AtomicBool::new(false),
    });
    (
        CommandSender {
            shared: shared.clone(),
        },
        CommandReceiver { shared },
    )
}

/// Producer handle; cheap to clone and safe to share across threads
#[derive(Debug, Clone)]
pub struct CommandSender {
    shared: Arc<Shared>,
}

impl CommandSender {
    /// Enqueues a command without blocking
    pub fn send(&self, mut command: Command) -> Result<u64, ChannelClosed> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(ChannelClosed);
        }
        let mut queue = self.shared.queue.lock();
        // Sequence is taken under the lock so queue order matches seq order
        command.seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        queue.push_back(command);
        Ok(command.seq)
    }

    /// Binds this sender to one player
    pub fn for_player(&self, player: PlayerIndex) -> PlayerCommandSender {
        PlayerCommandSender {
            player,
            inner: self.clone(),
        }
    }
}

/// Sender that can only issue commands for a single player
#[derive(Debug, Clone)]
pub struct PlayerCommandSender {
    player: PlayerIndex,
    inner: CommandSender,
}

impl PlayerCommandSender {
    pub fn player(&self) -> PlayerIndex {
        self.player
    }

    pub fn send(&self, direction: Direction, origin_tick: u64) -> Result<u64, ChannelClosed> {
        self.inner
            .send(Command::new(self.player, direction, origin_tick))
    }
}

/// Consumer handle, owned by the round loop
#[derive(Debug)]
pub struct CommandReceiver {
    shared: Arc<Shared>,
}

impl CommandReceiver {
    /// Takes everything queued since the last drain and returns the latest
    /// command per player, ordered by player index
    pub fn drain(&mut self) -> Vec<Command> {
        let pending: VecDeque<Command> = std::mem::take(&mut *self.shared.queue.lock());
        let total = pending.len();

        let mut latest: HashMap<PlayerIndex, Command> = HashMap::new();
        for command in pending {
            match latest.get(&command.player) {
                Some(existing) if existing.seq > command.seq => {}
                _ => {
                    latest.insert(command.player, command);
                }
            }
        }

        let mut fresh: Vec<Command> = latest.into_values().collect();
        fresh.sort_by_key(|c| c.player);

        if total > fresh.len() {
            debug!("Discarded {} superseded commands", total - fresh.len());
        }
        fresh
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }
}

impl Drop for CommandReceiver {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}
