//! # Reentry
//!
//! A sliding-tile puzzle played inside a falling capsule. Every merge pushes
//! the capsule deeper into the atmosphere: the sky heats up, particles and
//! the drone intensify, and oxygen runs short.
//!
//! This crate ties together all subsystems:
//! - Gameplay: board rules, event bus, persistence, progression
//! - Kernel: particle visuals and procedural audio
//! - Engine: window, input, rendering and the debug panel

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;
mod debug;
mod egui_integration;
mod input;
mod renderer;
mod scene;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EngineConfig;

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("reentry=info".parse()?)
                .add_directive("reentry_gameplay=info".parse()?)
                .add_directive("reentry_kernel=info".parse()?),
        )
        .init();

    info!("Reentry starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = EngineConfig::load();
    config.apply_args(std::env::args().skip(1));

    app::run(config)?;

    info!("Reentry shutdown complete");
    Ok(())
}
