//! Turns a registered `main_file` into a deployed [`Project`], and tears one
//! back down on unregistration (spec.md §5 `POST /projects`, `DELETE
//! /projects/{id}`).
//!
//! `clockwork_core` is long-running, so unlike `bin/clockwork` it never
//! exits after one pass: registering a project here means load, complete,
//! deploy, then hand the live graph to the [`Supervisor`] so its tick loop
//! keeps checking it.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clockwork_client::Project;
use clockwork_llm_http::{HttpLLMClient, HttpLLMConfig};
use clockwork_supervisor::Supervisor;
use uuid::Uuid;

pub async fn register(supervisor: &Supervisor, main_file: String) -> anyhow::Result<Uuid> {
  let path = PathBuf::from(main_file);
  let defs = clockwork_loader::read_and_parse(&path)
    .await
    .with_context(|| format!("loading {path:?}"))?;
  let (mut graph, roots) = clockwork_loader::build_graph(defs).context("building resource graph")?;

  let ids = clockwork_graph::flatten_descendants(&graph, &roots);
  let ordered = clockwork_graph::order(&graph, &ids).context("planning deploy order")?;

  let config = supervisor.config();
  let llm = HttpLLMClient::new(HttpLLMConfig::new(&config.base_url, &config.api_key, &config.model));
  let completion = clockwork_completion::complete_all(&ordered, &mut graph, &llm, config.completion_max_retries).await;
  if !completion.failed.is_empty() {
    tracing::warn!(
      "{} of {} resources in {path:?} could not be completed; deploying the rest and leaving these null",
      completion.failed.len(),
      ordered.len()
    );
  }
  let preskipped: HashMap<_, _> = completion
    .failed
    .into_iter()
    .map(|(id, e)| (id, e.to_string()))
    .collect();

  let report = clockwork_applier::apply_with_preskipped(
    &mut graph,
    &roots,
    supervisor.driver().as_ref(),
    config.deploy_parallelism,
    preskipped,
  )
  .await
  .context("deploying resources")?;

  if !report.failed.is_empty() {
    let reasons: Vec<String> = report
      .failed
      .iter()
      .map(|(id, reason)| format!("{id}: {reason}"))
      .collect();
    return Err(anyhow!("{} resource(s) failed to deploy: {}", reasons.len(), reasons.join("; ")));
  }

  let project = Project::register(path, graph, clockwork_supervisor::now_ms());
  Ok(supervisor.registry.register(project))
}

/// Removes `id` from the registry and, unless `keep_files`, tears down every
/// resource it deployed (spec.md §5 `DELETE /projects/{id}?keep_files=`).
pub async fn unregister(supervisor: &Supervisor, id: Uuid, keep_files: bool) {
  let Some(project) = supervisor.registry.remove(id) else {
    return;
  };
  if keep_files {
    return;
  }
  let roots = clockwork_graph::roots(&project.graph);
  if let Err(e) = clockwork_applier::destroy(&project.graph, &roots, supervisor.driver().as_ref()).await {
    tracing::error!("destroying project {id} ({:?}): {e}", project.main_file);
  }
}
