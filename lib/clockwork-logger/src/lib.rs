//! Initializes the global `tracing` subscriber from a [`LogConfig`], the way
//! the teacher's `bin/core` / `bin/periphery` both call `logger::init` once
//! at startup before doing anything else.

use anyhow::Context;
use clockwork_client::{LogConfig, LogLevel, StdioLogMode};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Registry};

pub fn init(config: &LogConfig) -> anyhow::Result<()> {
  let log_level: tracing::Level = config.level.into();
  let registry = Registry::default().with(LevelFilter::from(log_level));

  match (config.stdio, config.pretty) {
    (StdioLogMode::Standard, true) => registry
      .with(
        tracing_subscriber::fmt::layer()
          .pretty()
          .with_file(config.location)
          .with_line_number(config.location),
      )
      .try_init(),
    (StdioLogMode::Standard, false) => registry
      .with(
        tracing_subscriber::fmt::layer()
          .with_file(config.location)
          .with_line_number(config.location),
      )
      .try_init(),
    (StdioLogMode::Json, _) => {
      registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    }
    (StdioLogMode::None, _) => Ok(()),
  }
  .context("failed to init logger")
}

/// Exercised by binaries that want a quick sanity default without reading
/// config, e.g. `--help` paths that never reach full config loading.
pub fn init_default() -> anyhow::Result<()> {
  init(&LogConfig {
    level: LogLevel::Info,
    ..Default::default()
  })
}
