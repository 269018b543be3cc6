//! Single-resource remediation: collect diagnostics, re-complete with an
//! enriched description, redeploy, then reassert (spec.md §4.9 steps 3-6).

use clockwork_client::{Project, ResourceId, ResourceKind};
use clockwork_completion::LLMClient;
use clockwork_driver::Driver;

pub enum RemediationOutcome {
  Recovered,
  StillFailing(String),
}

pub async fn remediate(
  project: &mut Project,
  name: &str,
  driver: &dyn Driver,
  llm: &dyn LLMClient,
  completion_max_retries: u32,
  parallelism: usize,
) -> RemediationOutcome {
  let Some(id) = project
    .graph
    .ids()
    .find(|&id| project.graph.get(id).and_then(|n| n.name.as_deref()) == Some(name))
  else {
    return RemediationOutcome::StillFailing(format!("resource {name} no longer in graph"));
  };

  let diagnostics = collect_diagnostics(id, project, driver).await;
  let original_description = project.graph.get(id).and_then(|n| n.description.clone());
  if let Some(node) = project.graph.get_mut(id) {
    node.description = Some(enrich_description(node.description.as_deref(), &node.kind, &diagnostics));
  }

  let completion_result =
    clockwork_completion::complete_resource_unconditionally(id, &mut project.graph, llm, completion_max_retries).await;
  if let Some(node) = project.graph.get_mut(id) {
    node.description = original_description;
  }
  if let Err(e) = completion_result {
    tracing::warn!("remediation re-completion for {name} did not produce a better value: {e}");
  }

  if let Err(e) = clockwork_applier::apply(&mut project.graph, &[id], driver, parallelism).await {
    return RemediationOutcome::StillFailing(format!("redeploy failed: {e}"));
  }

  let Some(node) = project.graph.get(id) else {
    return RemediationOutcome::StillFailing(format!("resource {name} vanished mid-remediation"));
  };
  if node.assertions.is_empty() {
    return RemediationOutcome::Recovered;
  }
  for assertion in &node.assertions {
    let outcome = clockwork_assertions::run(assertion, driver).await;
    if !outcome.ok {
      return RemediationOutcome::StillFailing(outcome.detail);
    }
  }
  RemediationOutcome::Recovered
}

/// Collects the kind-specific diagnostics spec.md §4.9 step 3 lists: container
/// logs (tail 50) + status, file existence, or git status.
async fn collect_diagnostics(id: ResourceId, project: &Project, driver: &dyn Driver) -> String {
  let Some(node) = project.graph.get(id) else {
    return "resource no longer present in the graph".to_string();
  };
  let name = node.name.clone().unwrap_or_else(|| id.to_string());
  match &node.kind {
    ResourceKind::Container(_) => {
      let logs = driver.container_logs(&name, 50).await.unwrap_or_else(|e| format!("<could not read logs: {e}>"));
      let status = match driver.inspect_container(&name).await {
        Ok(inspect) => format!("running={} image={}", inspect.running, inspect.image),
        Err(e) => format!("<could not inspect container: {e}>"),
      };
      format!("container status: {status}\nlast 50 log lines:\n{logs}")
    }
    ResourceKind::File(f) => {
      let Some(path) = f.resolve_path(node.name.as_deref()) else {
        return "file resource has no resolvable path".to_string();
      };
      match driver.file_exists(&path).await {
        Ok(true) => format!("file exists at {path}"),
        Ok(false) => format!("file does not exist at {path}"),
        Err(e) => format!("<could not check {path}: {e}>"),
      }
    }
    ResourceKind::GitRepo(g) => {
      let Some(dest) = &g.dest else {
        return "git repo resource has no resolved dest".to_string();
      };
      match driver
        .run_command(
          &["git".to_string(), "status".to_string(), "--short".to_string()],
          &[],
          Some(dest.as_str()),
          std::time::Duration::from_secs(10),
        )
        .await
      {
        Ok(output) => format!("git status --short in {dest}:\n{}{}", output.stdout, output.stderr),
        Err(e) => format!("<could not run git status in {dest}: {e}>"),
      }
    }
    ResourceKind::Directory(d) => match driver.file_exists(&d.path).await {
      Ok(true) => format!("directory exists at {}", d.path),
      Ok(false) => format!("directory does not exist at {}", d.path),
      Err(e) => format!("<could not check {}: {e}>", d.path),
    },
    ResourceKind::User(_) | ResourceKind::BrewPackage(_) | ResourceKind::Blank => {
      "no kind-specific diagnostics available for this resource kind".to_string()
    }
  }
}

/// Appends the collected diagnostics and a kind-specific checklist to the
/// resource's original description (spec.md §4.9 step 4 examples).
fn enrich_description(original: Option<&str>, kind: &ResourceKind, diagnostics: &str) -> String {
  let checklist = match kind {
    ResourceKind::Container(_) => "verify the image tag is reachable; ensure the port is not already bound",
    ResourceKind::File(_) => "confirm the parent directory exists; verify the file mode is valid",
    ResourceKind::GitRepo(_) => "confirm the repo URL and branch are correct; check for local changes blocking a pull",
    ResourceKind::Directory(_) => "confirm the parent directory exists and the owning user/group are valid",
    ResourceKind::User(_) => "confirm the requested shell exists and the group is valid",
    ResourceKind::BrewPackage(_) => "confirm the package name exists in the configured tap",
    ResourceKind::Blank => "no remediation checklist for this kind",
  };
  format!(
    "{}\n\n--- remediation diagnostics ---\n{diagnostics}\n\nchecklist: {checklist}",
    original.unwrap_or("")
  )
}
