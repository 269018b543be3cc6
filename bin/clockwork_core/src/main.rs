#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use clap::Parser;
use clockwork_client::{ClockworkConfig, Env, Project};
use clockwork_config::ConfigLoader;
use clockwork_driver::Driver;
use clockwork_driver_local::LocalDriver;
use clockwork_llm_http::{HttpLLMClient, HttpLLMConfig};
use clockwork_supervisor::Supervisor;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

mod project;

#[derive(Parser, Debug)]
#[command(name = "clockwork_core")]
struct CliArgs {
  #[arg(long)]
  config_path: Vec<String>,
  #[arg(long)]
  config_keyword: Vec<String>,
  #[arg(long)]
  port: Option<u16>,
  #[arg(long)]
  api_key: Option<String>,
  #[arg(long)]
  model: Option<String>,
}

fn cli_args() -> &'static CliArgs {
  static ARGS: OnceLock<CliArgs> = OnceLock::new();
  ARGS.get_or_init(CliArgs::parse)
}

pub fn core_config() -> &'static ClockworkConfig {
  static CONFIG: OnceLock<ClockworkConfig> = OnceLock::new();
  CONFIG.get_or_init(|| {
    let env: Env = envy::from_env().expect("failed to parse clockwork_core environment");
    let args = cli_args();
    let config_paths = if args.config_path.is_empty() {
      env.clockwork_config_paths.clone()
    } else {
      args.config_path.clone()
    };

    let mut config: ClockworkConfig = if config_paths.is_empty() {
      println!("{}: no config paths found, using default config", "INFO".green());
      ClockworkConfig::default()
    } else {
      (ConfigLoader {
        paths: &config_paths.iter().map(PathBuf::from).collect::<Vec<_>>().iter().map(PathBuf::as_path).collect::<Vec<_>>(),
        match_wildcards: &args
          .config_keyword
          .iter()
          .chain(env.clockwork_config_keywords.iter())
          .map(String::as_str)
          .collect::<Vec<_>>(),
        include_file_name: ".clockworkinclude",
        merge_nested: env.clockwork_merge_nested_config.unwrap_or(true),
        extend_array: env.clockwork_extend_config_arrays.unwrap_or(false),
        debug_print: false,
      })
      .load()
      .expect("failed at parsing config from paths")
    };

    if let Some(key) = args.api_key.clone().or(env.clockwork_api_key) {
      config.api_key = key;
    }
    if let Some(model) = args.model.clone().or(env.clockwork_model) {
      config.model = model;
    }
    config
  })
}

struct AppState {
  supervisor: Arc<Supervisor>,
}

#[derive(Deserialize)]
struct RegisterProjectBody {
  main_file: String,
}

#[derive(Serialize)]
struct RegisterProjectResponse {
  project_id: Uuid,
}

#[derive(Deserialize)]
struct DeleteProjectQuery {
  #[serde(default)]
  keep_files: bool,
}

#[derive(Serialize)]
struct ErrorBody {
  error_kind: String,
  message: String,
}

async fn register_project(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RegisterProjectBody>,
) -> Result<(StatusCode, Json<RegisterProjectResponse>), (StatusCode, Json<ErrorBody>)> {
  let id = project::register(&state.supervisor, body.main_file)
    .await
    .map_err(|e| {
      (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody { error_kind: "planning_error".to_string(), message: e.to_string() }),
      )
    })?;
  Ok((StatusCode::CREATED, Json(RegisterProjectResponse { project_id: id })))
}

async fn delete_project(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Query(query): Query<DeleteProjectQuery>,
) -> StatusCode {
  project::unregister(&state.supervisor, id, query.keep_files).await;
  StatusCode::NO_CONTENT
}

async fn get_project(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Project>, StatusCode> {
  state
    .supervisor
    .registry
    .get(id)
    .map(|r| Json(r.value().clone()))
    .ok_or(StatusCode::NOT_FOUND)
}

async fn get_health() -> Json<serde_json::Value> {
  Json(serde_json::json!({"status": "healthy"}))
}

async fn app() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  let config = core_config();
  clockwork_logger::init(&config.logging)?;

  info!("Clockwork Core starting, version v{}", env!("CARGO_PKG_VERSION"));

  let driver: Arc<dyn Driver> = Arc::new(LocalDriver::connect().context("failed to connect to docker")?);
  let llm: Arc<dyn clockwork_completion::LLMClient> =
    Arc::new(HttpLLMClient::new(HttpLLMConfig::new(&config.base_url, &config.api_key, &config.model)));
  let supervisor = Arc::new(Supervisor::new(driver, llm, config.clone()));
  supervisor.clone().spawn();

  let state = Arc::new(AppState { supervisor });

  let app = Router::new()
    .route("/projects", post(register_project))
    .route("/projects/{id}", delete(delete_project).get(get_project))
    .route("/health", get(get_health))
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .with_state(state);

  let port = cli_args().port.unwrap_or(8182);
  let addr = format!("0.0.0.0:{port}");
  info!("Clockwork Core listening on http://{addr}");
  let listener = tokio::net::TcpListener::bind(&addr).await.context("failed to bind listen address")?;
  axum::serve(listener, app).await.context("failed to serve http")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let mut term_signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
  tokio::select! {
    res = tokio::spawn(app()) => res?,
    _ = term_signal.recv() => Ok(()),
  }
}
