// Round runner
//
// Owns one engine for the length of a round and drives it at a fixed cadence:
// drain commands, tick, publish the new snapshot, log, present. Agents are
// started before the first tick and always stopped before `run` returns, even
// when a tick fails.

use log::{debug, error, info};
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::agent::{AgentSettings, AgentSpec, AgentSupervisor, ShutdownReport};
use crate::command::{self, CommandReceiver, CommandSender};
use crate::config::Config;
use crate::engine::{Engine, RenderView, RoundOutcome, ScoreLine, TickError};
use crate::entities::PlayerSpec;
use crate::level::{Level, LevelError};
use crate::round_logger::RoundLogger;
use crate::snapshot::{CodecError, Snapshot};
use crate::strategy::StrategyKind;

/// Who steers a snake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    /// Commands arrive through `Round::command_sender`
    Human,
    Ai(StrategyKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSlot {
    pub spec: PlayerSpec,
    pub controller: Controller,
}

impl PlayerSlot {
    pub fn human(spec: PlayerSpec) -> Self {
        PlayerSlot {
            spec,
            controller: Controller::Human,
        }
    }

    pub fn ai(spec: PlayerSpec, kind: StrategyKind) -> Self {
        PlayerSlot {
            spec,
            controller: Controller::Ai(kind),
        }
    }
}

#[derive(Debug, Error)]
pub enum RoundError {
    #[error("level rejected: {0}")]
    Level(#[from] LevelError),
    #[error("round aborted: {0}")]
    Invariant(#[from] TickError),
    #[error("snapshot could not be published: {0}")]
    Codec(#[from] CodecError),
}

/// Receives read-only post-tick state once per tick
pub trait RenderSink {
    fn present(&mut self, view: &RenderView<'_>);
}

/// Discards every frame
#[derive(Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn present(&mut self, _view: &RenderView<'_>) {}
}

#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub outcome: RoundOutcome,
    pub ticks: u64,
    pub scoreboard: Vec<ScoreLine>,
    pub agents: ShutdownReport,
}

pub struct Round {
    config: Config,
    engine: Engine,
    sender: CommandSender,
    receiver: CommandReceiver,
    agents: Vec<AgentSpec>,
}

impl Round {
    /// Validates the level against the roster and prepares the engine.
    /// Nothing is spawned until `run`.
    pub fn new(config: Config, level: Level, slots: Vec<PlayerSlot>) -> Result<Self, RoundError> {
        let seed = config.rules.seed.unwrap_or_else(rand::random);
        let roster: Vec<PlayerSpec> = slots.iter().map(|slot| slot.spec.clone()).collect();
        let engine = Engine::new(level, &roster, &config.rules, seed)?;
        info!("Round seed: {}", seed);

        let agents = slots
            .iter()
            .enumerate()
            .filter_map(|(player, slot)| match slot.controller {
                Controller::Ai(kind) => Some(AgentSpec {
                    player,
                    strategy: kind.build(&config.pathfinding),
                }),
                Controller::Human => None,
            })
            .collect();

        let (sender, receiver) = command::channel();
        Ok(Round {
            config,
            engine,
            sender,
            receiver,
            agents,
        })
    }

    /// Sender for input mappers; agents get their own
    pub fn command_sender(&self) -> CommandSender {
        self.sender.clone()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Plays the round to its outcome
    pub async fn run<S>(mut self, sink: &mut S) -> Result<RoundSummary, RoundError>
    where
        S: RenderSink + ?Sized,
    {
        let logger =
            RoundLogger::new(self.config.debug.enabled, &self.config.debug.log_file_path).await;

        let initial = Snapshot::capture(&self.engine);
        let mut supervisor = AgentSupervisor::start(
            std::mem::take(&mut self.agents),
            &initial,
            &self.sender,
            AgentSettings::from(&self.config.agents),
        )?;
        logger.log_tick(&initial, &[], &[]);
        sink.present(&self.engine.render_view());

        info!(
            "Round started on '{}' with {} agents",
            self.engine.level().name,
            supervisor.running()
        );

        let played = self.play(&mut supervisor, &logger, sink).await;
        let agents = supervisor.shutdown().await;
        logger.close().await;

        let outcome = match played {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Round ended abnormally: {}", e);
                return Err(e);
            }
        };

        let summary = RoundSummary {
            outcome,
            ticks: self.engine.tick_count(),
            scoreboard: self.engine.scoreboard(),
            agents,
        };
        info!(
            "Round finished after {} ticks: {}",
            summary.ticks,
            self.engine.render_view().status_text().unwrap_or_default()
        );
        Ok(summary)
    }

    async fn play<S>(
        &mut self,
        supervisor: &mut AgentSupervisor,
        logger: &RoundLogger,
        sink: &mut S,
    ) -> Result<RoundOutcome, RoundError>
    where
        S: RenderSink + ?Sized,
    {
        let period = self.config.timing.tick_interval().max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            let commands = self.receiver.drain();
            let events = self.engine.tick(commands.iter().copied())?;
            let snapshot = Snapshot::capture(&self.engine);
            supervisor.publish(&snapshot)?;
            logger.log_tick(&snapshot, &commands, &events);
            debug!(
                "Tick {}: {} commands, {} events, {} alive",
                snapshot.tick,
                commands.len(),
                events.len(),
                self.engine.alive_count()
            );

            supervisor.reap().await;

            let max_ticks = self.config.timing.max_ticks;
            if max_ticks > 0 && self.engine.tick_count() >= max_ticks {
                self.engine.declare_tick_limit();
            }

            sink.present(&self.engine.render_view());

            if let Some(outcome) = self.engine.outcome() {
                return Ok(outcome);
            }
        }
    }
}
