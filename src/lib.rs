// Library exports for the snake arena
// The round runner binary, the replay tool and the integration tests all use these

pub mod agent;
pub mod board;
pub mod command;
pub mod config;
pub mod engine;
pub mod entities;
pub mod level;
pub mod replay;
pub mod round;
pub mod round_logger;
pub mod snapshot;
pub mod strategy;
pub mod types;
