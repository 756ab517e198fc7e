// AI agents and their supervisor
//
// Each AI-controlled player gets an independently scheduled tokio task. The
// task waits on a watch channel for the next encoded snapshot, runs its
// strategy on a blocking worker, and sends the resulting direction through a
// command sender bound to its player. The same watch channel carries the
// shutdown signal, which agents watch while a decision is running and while
// pacing themselves.
//
// The round loop never waits on an agent: it publishes snapshots with
// `send_replace` and drains whatever commands happen to be queued.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::command::{CommandSender, PlayerCommandSender};
use crate::config::AgentsConfig;
use crate::snapshot::{CodecError, EncodedSnapshot, Snapshot};
use crate::strategy::Strategy;
use crate::types::PlayerIndex;

/// What the supervisor broadcasts to agents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentFeed {
    Snapshot(EncodedSnapshot),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSettings {
    pub think_interval: Duration,
    pub shutdown_grace: Duration,
}

impl From<&AgentsConfig> for AgentSettings {
    fn from(config: &AgentsConfig) -> Self {
        AgentSettings {
            think_interval: config.think_interval(),
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// Why an agent loop ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentExit {
    Shutdown,
    FeedClosed,
    ChannelClosed,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("decision task for player {player} panicked")]
    DecisionPanicked { player: PlayerIndex },
    #[error("player {player} could not decode snapshot {tick}: {source}")]
    Decode {
        player: PlayerIndex,
        tick: u64,
        #[source]
        source: CodecError,
    },
}

/// A single decision loop controlling one player
pub struct Agent {
    player: PlayerIndex,
    strategy: Arc<dyn Strategy>,
    feed: watch::Receiver<AgentFeed>,
    commands: PlayerCommandSender,
    think_interval: Duration,
}

impl Agent {
    pub fn new(
        strategy: Arc<dyn Strategy>,
        feed: watch::Receiver<AgentFeed>,
        commands: PlayerCommandSender,
        think_interval: Duration,
    ) -> Self {
        Agent {
            player: commands.player(),
            strategy,
            feed,
            commands,
            think_interval,
        }
    }

    /// Runs until shutdown, feed closure or a failure
    pub async fn run(mut self) -> Result<AgentExit, AgentError> {
        let mut last_tick: Option<u64> = None;

        loop {
            let current = self.feed.borrow_and_update().clone();
            match current {
                AgentFeed::Shutdown => return Ok(AgentExit::Shutdown),
                AgentFeed::Snapshot(encoded) if last_tick.map_or(true, |t| encoded.tick > t) => {
                    last_tick = Some(encoded.tick);
                    if let Some(exit) = self.decide_and_send(&encoded).await? {
                        return Ok(exit);
                    }
                    if self.pace().await {
                        return Ok(AgentExit::Shutdown);
                    }
                    continue;
                }
                _ => {}
            }

            if self.feed.changed().await.is_err() {
                return Ok(AgentExit::FeedClosed);
            }
        }
    }

    async fn decide_and_send(
        &mut self,
        encoded: &EncodedSnapshot,
    ) -> Result<Option<AgentExit>, AgentError> {
        let player = self.player;
        let snapshot = encoded.decode().map_err(|source| AgentError::Decode {
            player,
            tick: encoded.tick,
            source,
        })?;

        let strategy = self.strategy.clone();
        let mut worker = tokio::task::spawn_blocking(move || strategy.decide(&snapshot, player));

        // A running decision cannot be cancelled; on shutdown it is left to
        // finish on its worker thread and its result is dropped.
        let decision = loop {
            tokio::select! {
                joined = &mut worker => {
                    break joined.map_err(|_| AgentError::DecisionPanicked { player })?;
                }
                changed = self.feed.changed() => {
                    if changed.is_err() {
                        return Ok(Some(AgentExit::FeedClosed));
                    }
                    if self.shutdown_requested() {
                        debug!("Agent {}: shutdown during decision on snapshot {}", player, encoded.tick);
                        return Ok(Some(AgentExit::Shutdown));
                    }
                }
            }
        };

        if self.shutdown_requested() {
            return Ok(Some(AgentExit::Shutdown));
        }

        if let Some(direction) = decision {
            debug!(
                "Agent {} ({}): {} on snapshot {}",
                player,
                self.strategy.name(),
                direction.as_str(),
                encoded.tick
            );
            if self.commands.send(direction, encoded.tick).is_err() {
                return Ok(Some(AgentExit::ChannelClosed));
            }
        }
        Ok(None)
    }

    fn shutdown_requested(&self) -> bool {
        matches!(*self.feed.borrow(), AgentFeed::Shutdown)
    }

    /// Waits out the think interval; returns true if shutdown arrived meanwhile
    async fn pace(&mut self) -> bool {
        let pause = tokio::time::sleep(self.think_interval);
        tokio::pin!(pause);

        loop {
            tokio::select! {
                _ = &mut pause => return false,
                changed = self.feed.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                    if self.shutdown_requested() {
                        return true;
                    }
                }
            }
        }
    }
}

/// Starting parameters for one AI player
#[derive(Clone)]
pub struct AgentSpec {
    pub player: PlayerIndex,
    pub strategy: Arc<dyn Strategy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    Exited(AgentExit),
    Failed(String),
    Panicked,
    Cancelled,
    /// Still running after the grace period; aborted
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReport {
    pub player: PlayerIndex,
    pub strategy: &'static str,
    pub status: AgentStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub reports: Vec<AgentReport>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// True when every agent acknowledged shutdown in time
    pub fn is_clean(&self) -> bool {
        self.reports
            .iter()
            .all(|r| r.status == AgentStatus::Exited(AgentExit::Shutdown))
    }

    pub fn timed_out(&self) -> Vec<PlayerIndex> {
        self.reports
            .iter()
            .filter(|r| r.status == AgentStatus::TimedOut)
            .map(|r| r.player)
            .collect()
    }
}

struct RunningAgent {
    player: PlayerIndex,
    strategy: &'static str,
    handle: JoinHandle<Result<AgentExit, AgentError>>,
}

fn status_of(joined: Result<Result<AgentExit, AgentError>, JoinError>) -> AgentStatus {
    match joined {
        Ok(Ok(exit)) => AgentStatus::Exited(exit),
        Ok(Err(e)) => AgentStatus::Failed(e.to_string()),
        Err(e) if e.is_panic() => AgentStatus::Panicked,
        Err(_) => AgentStatus::Cancelled,
    }
}

/// Starts, monitors and stops the agents of one round
pub struct AgentSupervisor {
    feed: watch::Sender<AgentFeed>,
    agents: Vec<RunningAgent>,
    disconnected: Vec<AgentReport>,
    settings: AgentSettings,
}

impl AgentSupervisor {
    /// Spawns one agent per spec on the current tokio runtime
    pub fn start(
        specs: Vec<AgentSpec>,
        initial: &Snapshot,
        commands: &CommandSender,
        settings: AgentSettings,
    ) -> Result<Self, CodecError> {
        let initial = EncodedSnapshot::from_snapshot(initial)?;
        let (feed, _) = watch::channel(AgentFeed::Snapshot(initial));

        let agents = specs
            .into_iter()
            .map(|spec| {
                let agent = Agent::new(
                    spec.strategy.clone(),
                    feed.subscribe(),
                    commands.for_player(spec.player),
                    settings.think_interval,
                );
                info!(
                    "Starting {} agent for player {}",
                    spec.strategy.name(),
                    spec.player
                );
                RunningAgent {
                    player: spec.player,
                    strategy: spec.strategy.name(),
                    handle: tokio::spawn(agent.run()),
                }
            })
            .collect();

        Ok(AgentSupervisor {
            feed,
            agents,
            disconnected: Vec::new(),
            settings,
        })
    }

    /// Broadcasts a fresh snapshot; never waits for agents
    pub fn publish(&self, snapshot: &Snapshot) -> Result<(), CodecError> {
        let encoded = EncodedSnapshot::from_snapshot(snapshot)?;
        self.feed.send_replace(AgentFeed::Snapshot(encoded));
        Ok(())
    }

    pub fn running(&self) -> usize {
        self.agents.len()
    }

    /// Agents that stopped before shutdown was requested
    pub fn disconnected(&self) -> &[AgentReport] {
        &self.disconnected
    }

    /// Collects agents that have ended on their own. Their players simply stop
    /// receiving AI commands and keep moving straight.
    pub async fn reap(&mut self) -> Vec<AgentReport> {
        let mut finished = Vec::new();
        let mut i = 0;
        while i < self.agents.len() {
            if self.agents[i].handle.is_finished() {
                finished.push(self.agents.swap_remove(i));
            } else {
                i += 1;
            }
        }

        let mut reports = Vec::new();
        for agent in finished {
            let status = status_of(agent.handle.await);
            warn!(
                "Agent for player {} ({}) stopped unexpectedly: {:?}",
                agent.player, agent.strategy, status
            );
            let report = AgentReport {
                player: agent.player,
                strategy: agent.strategy,
                status,
            };
            self.disconnected.push(report.clone());
            reports.push(report);
        }
        reports
    }

    /// Signals shutdown and waits up to the grace period for every agent.
    /// Agents still running afterwards are aborted and reported, not retried.
    pub async fn shutdown(mut self) -> ShutdownReport {
        let started = Instant::now();
        self.feed.send_replace(AgentFeed::Shutdown);
        let deadline = tokio::time::Instant::now() + self.settings.shutdown_grace;

        let mut reports = std::mem::take(&mut self.disconnected);
        for agent in self.agents.drain(..) {
            let abort = agent.handle.abort_handle();
            let status = match tokio::time::timeout_at(deadline, agent.handle).await {
                Ok(joined) => status_of(joined),
                Err(_) => {
                    abort.abort();
                    warn!(
                        "Agent for player {} ({}) ignored shutdown for {:?}; aborted",
                        agent.player, agent.strategy, self.settings.shutdown_grace
                    );
                    AgentStatus::TimedOut
                }
            };
            reports.push(AgentReport {
                player: agent.player,
                strategy: agent.strategy,
                status,
            });
        }
        reports.sort_by_key(|r| r.player);

        let elapsed = started.elapsed();
        info!("Agents stopped in {}ms", elapsed.as_millis());
        ShutdownReport { reports, elapsed }
    }
}
