//! Schema-guided completion: fills null resource/connection fields via a
//! bound [`LLMClient`] capability (spec.md §4.3, "L5").
//!
//! The core never talks to a provider directly — it builds a prompt, a tool
//! list, and a validator closure, and hands them to whatever `LLMClient` the
//! binary wired in (spec.md §6, §9 "Schema-guided LLM completion").

use std::collections::HashMap;

use async_trait::async_trait;
use clockwork_client::{Connection, ResourceGraph, ResourceId};
use serde_json::{Map, Value};

mod merge;
mod prompt;
mod tools;

pub use tools::ToolSelector;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
  #[error("completion for {0} exhausted its retry budget")]
  RetriesExhausted(ResourceId),
  #[error("completion output for {0} failed schema binding: {1}")]
  SchemaBinding(ResourceId, String),
  #[error("completion output for {0} still needs completion after merge: {1}")]
  StillIncomplete(ResourceId, String),
  #[error("resource {0} not found in graph")]
  MissingResource(ResourceId),
  #[error("provider error: {0}")]
  Provider(String),
}

/// One call to the bound LLM: a schema hint, prompts, the tool set, a retry
/// budget, and a validator the capability must satisfy before returning
/// (spec.md §6 `structured_complete`).
pub struct CompletionRequest {
  pub schema: Value,
  pub system_prompt: String,
  pub user_prompt: String,
  pub tools: Vec<String>,
  pub retries: u32,
  /// Runs inside the capability's retry loop; `Err` triggers a retry (or a
  /// final [`CompletionError::StillIncomplete`] once the budget is spent).
  pub validator: Box<dyn Fn(&Value) -> Result<(), String> + Send + Sync>,
}

/// "Given a prompt, a target schema, a list of bound tools, and a retry
/// budget, return an instance of the schema or fail" (spec.md §1).
#[async_trait]
pub trait LLMClient: Send + Sync {
  async fn structured_complete(
    &self,
    req: CompletionRequest,
  ) -> Result<Value, CompletionError>;
}

/// Report from a `complete_all` run: per-resource completion failures are
/// collected, never halt the whole batch (spec.md §4.7 "collect-and-continue").
#[derive(Debug, Default)]
pub struct CompletionReport {
  pub completed: Vec<ResourceId>,
  pub failed: HashMap<ResourceId, CompletionError>,
}

/// Completes every resource in `ordered` (already topologically sorted so
/// upstream `connection_context()` is available), then every connection
/// attached to a completed resource. Resources whose completion failed are
/// recorded in the report but do not stop the rest of the batch.
pub async fn complete_all(
  ordered: &[ResourceId],
  graph: &mut ResourceGraph,
  llm: &dyn LLMClient,
  max_retries: u32,
) -> CompletionReport {
  let mut report = CompletionReport::default();
  for &id in ordered {
    match complete_resource(id, graph, llm, max_retries).await {
      Ok(()) => report.completed.push(id),
      Err(e) => {
        tracing::warn!("completion failed for {id}: {e}");
        report.failed.insert(id, e);
      }
    }
  }
  for &id in ordered {
    if report.failed.contains_key(&id) {
      continue;
    }
    let conn_count = graph.get(id).map(|n| n.connections.len()).unwrap_or(0);
    for idx in 0..conn_count {
      if let Err(e) = complete_connection(id, idx, graph, llm, max_retries).await {
        tracing::warn!("connection completion failed for {id}#{idx}: {e}");
      }
    }
  }
  report
}

/// Completes a single resource in place (spec.md §4.3 steps a-e). Used both
/// by `complete_all` and by the Remediator's single-resource re-completion
/// (spec.md §4.9 step 4).
pub async fn complete_resource(
  id: ResourceId,
  graph: &mut ResourceGraph,
  llm: &dyn LLMClient,
  max_retries: u32,
) -> Result<(), CompletionError> {
  let needs = graph
    .get(id)
    .map(|n| n.needs_completion())
    .ok_or(CompletionError::MissingResource(id))?;
  if !needs {
    return Ok(());
  }
  complete_resource_unconditionally(id, graph, llm, max_retries).await
}

/// Same as [`complete_resource`] but skips the `needs_completion()` gate —
/// used by the Remediator (spec.md §4.9 step 4), which re-invokes the
/// Completer on an already-complete resource whose description has been
/// enriched with failure diagnostics, in case that yields a better value
/// (e.g. a reachable image tag) than the one currently deployed.
pub async fn complete_resource_unconditionally(
  id: ResourceId,
  graph: &mut ResourceGraph,
  llm: &dyn LLMClient,
  max_retries: u32,
) -> Result<(), CompletionError> {
  let node = graph.get(id).ok_or(CompletionError::MissingResource(id))?;
  let tools = ToolSelector::select(node);
  let user_prompt = prompt::build_resource_prompt(node, graph);
  let schema = merge::kind_schema_hint(&node.kind);
  let original = node.kind.clone();
  let original_name = node.name.clone();

  let validator_original = original.clone();
  let validator = Box::new(move |value: &Value| -> Result<(), String> {
    let mut candidate = validator_original.clone();
    merge::merge_kind_fields(&mut candidate, value);
    if merge::kind_needs_completion(&candidate) {
      Err("merged candidate still has null required fields".to_string())
    } else {
      Ok(())
    }
  });

  let req = CompletionRequest {
    schema,
    system_prompt: "fill the required fields".to_string(),
    user_prompt,
    tools,
    retries: max_retries,
    validator,
  };

  let value = llm.structured_complete(req).await?;

  let node = graph.get_mut(id).ok_or(CompletionError::MissingResource(id))?;
  merge::merge_kind_fields(&mut node.kind, &value);
  if merge::kind_needs_completion(&node.kind) {
    return Err(CompletionError::StillIncomplete(
      id,
      "fields remained null after merge".to_string(),
    ));
  }
  if original_name.is_none() {
    if let Some(name) = value.get("name").and_then(Value::as_str) {
      node.name = Some(name.to_string());
    }
  }
  let _ = original;
  Ok(())
}

async fn complete_connection(
  resource: ResourceId,
  idx: usize,
  graph: &mut ResourceGraph,
  llm: &dyn LLMClient,
  max_retries: u32,
) -> Result<(), CompletionError> {
  let needs = graph
    .get(resource)
    .and_then(|n| n.connections.get(idx))
    .map(Connection::needs_completion)
    .unwrap_or(false);
  if !needs {
    return Ok(());
  }

  let node = graph.get(resource).ok_or(CompletionError::MissingResource(resource))?;
  let conn = &node.connections[idx];
  let user_prompt = prompt::build_connection_prompt(conn, graph);
  let schema = merge::connection_schema_hint(&conn.kind);

  let validator = Box::new(move |_value: &Value| -> Result<(), String> { Ok(()) });

  let req = CompletionRequest {
    schema,
    system_prompt: "fill the required connection fields".to_string(),
    user_prompt,
    tools: Vec::new(),
    retries: max_retries,
    validator,
  };
  let value = llm.structured_complete(req).await?;

  let node = graph.get_mut(resource).ok_or(CompletionError::MissingResource(resource))?;
  let conn = &mut node.connections[idx];
  merge::merge_connection_fields(&mut conn.kind, &value);
  Ok(())
}

/// Shared by the merge module: a JSON object view of whatever fields are
/// already non-null, so prompts can enumerate "already-provided fields"
/// (spec.md §4.3 step b).
pub(crate) fn non_null_fields(value: &Value) -> Map<String, Value> {
  match value {
    Value::Object(map) => map
      .iter()
      .filter(|(_, v)| !v.is_null())
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect(),
    _ => Map::new(),
  }
}
