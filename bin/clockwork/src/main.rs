//! The `clockwork` CLI: `plan|apply|destroy|assert` against a resource file,
//! calling straight into the core library's entry points (spec.md §6 "CLI
//! surface"). No HTTP server, no supervisor loop — one pass, then exit with
//! the contractual status code.

#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clockwork_client::{ClockworkConfig, Env};
use clockwork_driver::Driver;
use clockwork_driver_local::LocalDriver;
use clockwork_llm_http::{HttpLLMClient, HttpLLMConfig};
use colored::Colorize;

#[derive(Parser, Debug)]
#[command(name = "clockwork")]
struct Cli {
  #[command(subcommand)]
  command: Command,
  /// Overrides the configured LLMClient API key (spec.md §6).
  #[arg(long, global = true)]
  api_key: Option<String>,
  /// Overrides the configured LLMClient model (spec.md §6).
  #[arg(long, global = true)]
  model: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Prints the ordered list of intended actions without touching the driver.
  Plan { path: PathBuf },
  /// Completes, deploys, and reports every resource reachable from `path`.
  Apply { path: PathBuf },
  /// Tears down every resource reachable from `path`, in reverse order.
  Destroy {
    path: PathBuf,
    #[arg(long)]
    keep_files: bool,
  },
  /// Evaluates every assertion declared in `path` without deploying.
  Assert { path: PathBuf },
}

fn config(cli: &Cli) -> ClockworkConfig {
  let env: Env = envy::from_env().unwrap_or_default();
  let mut config = ClockworkConfig::default();
  if let Some(key) = cli.api_key.clone().or(env.clockwork_api_key) {
    config.api_key = key;
  }
  if let Some(model) = cli.model.clone().or(env.clockwork_model) {
    config.model = model;
  }
  if let Some(base_url) = env.clockwork_base_url {
    config.base_url = base_url;
  }
  if let Some(retries) = env.clockwork_completion_max_retries {
    config.completion_max_retries = retries;
  }
  if let Some(parallelism) = env.clockwork_deploy_parallelism {
    config.deploy_parallelism = parallelism;
  }
  config
}

async fn load(path: &PathBuf) -> anyhow::Result<(clockwork_client::ResourceGraph, Vec<clockwork_client::ResourceId>)> {
  let defs = clockwork_loader::read_and_parse(path).await.with_context(|| format!("loading {path:?}"))?;
  clockwork_loader::build_graph(defs).with_context(|| format!("building resource graph from {path:?}"))
}

async fn run(cli: Cli) -> ExitCode {
  let cfg = config(&cli);
  let _ = clockwork_logger::init_default();

  match &cli.command {
    Command::Plan { path } => match load(path).await {
      Ok((graph, roots)) => match clockwork_applier::plan(&graph, &roots) {
        Ok(plan) => {
          print!("{}", clockwork_applier::render_plan(&plan));
          ExitCode::SUCCESS
        }
        Err(e) => {
          eprintln!("{}: {e}", "planning error".red());
          ExitCode::from(2)
        }
      },
      Err(e) => {
        eprintln!("{}: {e:#}", "planning error".red());
        ExitCode::from(2)
      }
    },
    Command::Apply { path } => match apply(path, &cfg).await {
      Ok((report, graph)) => {
        print!("{}", clockwork_applier::render_apply_report(&report, &graph));
        if report.failed.is_empty() {
          ExitCode::SUCCESS
        } else {
          ExitCode::FAILURE
        }
      }
      Err(e) => {
        eprintln!("{}: {e:#}", "apply failed".red());
        ExitCode::FAILURE
      }
    },
    Command::Destroy { path, keep_files } => {
      if *keep_files {
        info!("--keep-files set; this only affects project unregistration in clockwork_core, destroy always removes deployed resources");
      }
      match destroy(path).await {
        Ok(report) => {
          if report.failed.is_empty() {
            ExitCode::SUCCESS
          } else {
            for (id, reason) in &report.failed {
              eprintln!("{}: {id}: {reason}", "destroy failed".red());
            }
            ExitCode::FAILURE
          }
        }
        Err(e) => {
          eprintln!("{}: {e:#}", "destroy failed".red());
          ExitCode::FAILURE
        }
      }
    }
    Command::Assert { path } => match assert(path).await {
      Ok(all_passed) => {
        if all_passed {
          ExitCode::SUCCESS
        } else {
          ExitCode::FAILURE
        }
      }
      Err(e) => {
        eprintln!("{}: {e:#}", "assert failed".red());
        ExitCode::FAILURE
      }
    },
  }
}

async fn apply(
  path: &PathBuf,
  config: &ClockworkConfig,
) -> anyhow::Result<(clockwork_applier::ApplyReport, clockwork_client::ResourceGraph)> {
  let (mut graph, roots) = load(path).await?;
  let ids = clockwork_graph::flatten_descendants(&graph, &roots);
  let ordered = clockwork_graph::order(&graph, &ids).context("planning deploy order")?;

  let llm = HttpLLMClient::new(HttpLLMConfig::new(&config.base_url, &config.api_key, &config.model));
  let completion = clockwork_completion::complete_all(&ordered, &mut graph, &llm, config.completion_max_retries).await;
  for (id, e) in &completion.failed {
    warn!("completion failed for {id}, deploying with null fields where unresolved: {e}");
  }
  let preskipped = completion.failed.into_iter().map(|(id, e)| (id, e.to_string())).collect();

  let driver = local_driver()?;
  let report =
    clockwork_applier::apply_with_preskipped(&mut graph, &roots, driver.as_ref(), config.deploy_parallelism, preskipped)
      .await
      .context("deploying resources")?;
  Ok((report, graph))
}

async fn destroy(path: &PathBuf) -> anyhow::Result<clockwork_applier::ApplyReport> {
  let (graph, roots) = load(path).await?;
  let driver = local_driver()?;
  clockwork_applier::destroy(&graph, &roots, driver.as_ref()).await.context("destroying resources")
}

async fn assert(path: &PathBuf) -> anyhow::Result<bool> {
  let (graph, roots) = load(path).await?;
  let driver = local_driver()?;
  let outcomes = clockwork_applier::assert_all(&graph, &roots, driver.as_ref()).await;
  let mut all_passed = true;
  for (_, name, outcome) in &outcomes {
    if outcome.ok {
      println!("{} {name}: {}", "ok".green(), outcome.detail);
    } else {
      all_passed = false;
      println!("{} {name}: {}", "fail".red(), outcome.detail);
    }
  }
  Ok(all_passed)
}

fn local_driver() -> anyhow::Result<std::sync::Arc<dyn Driver>> {
  Ok(std::sync::Arc::new(LocalDriver::connect().context("failed to connect to docker")?))
}

#[tokio::main]
async fn main() -> ExitCode {
  let cli = Cli::parse();
  run(cli).await
}
