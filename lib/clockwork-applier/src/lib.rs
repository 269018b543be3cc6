//! Plan/apply/destroy orchestration (spec.md §4.6-§4.8, "L2").
//!
//! `apply` groups the topological order into dependency ranks and deploys
//! each rank's driver-facing work concurrently, bounded by a
//! `tokio::sync::Semaphore` sized by `deploy_parallelism` — connection setup
//! for a rank runs first and sequentially, since it mutates the shared
//! graph (injecting env vars into `from`), then that rank's resources
//! deploy concurrently since deploying one never requires mutating another.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clockwork_client::{
  AssertionOutcome, DeployOutput, DeployOutputs, ResourceGraph, ResourceId, ResourceKind,
};
use clockwork_driver::{ContainerDeploySpec, Driver, DriverError, UserDeploySpec};
use clockwork_graph::GraphError;
use tokio::sync::Semaphore;

mod render;

pub use render::{render_apply_report, render_plan};

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
  #[error("graph error: {0}")]
  Graph(#[from] GraphError),
  #[error("driver error: {0}")]
  Driver(#[from] DriverError),
  #[error("connection setup error: {0}")]
  Connection(#[from] clockwork_connections::ConnectionError),
  #[error("resource {0} has no resolvable file path (set `path` or `directory` plus a name)")]
  UnresolvedFilePath(String),
  #[error("resource {0} is missing repo_url/dest; completion should have filled these")]
  IncompleteGitRepo(String),
  #[error("resource {0} not found in graph")]
  MissingResource(ResourceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
  Create,
  Destroy,
  NoOp,
}

pub struct PlanEntry {
  pub id: ResourceId,
  pub name: String,
  pub action: PlannedAction,
}

pub struct Plan {
  pub order: Vec<ResourceId>,
  pub entries: Vec<PlanEntry>,
}

/// Computes the deploy order and what each resource's declared `present`
/// flag implies, without touching the driver (spec.md §7 "clockwork plan").
pub fn plan(graph: &ResourceGraph, roots: &[ResourceId]) -> Result<Plan, ApplyError> {
  let ids = clockwork_graph::flatten_descendants(graph, roots);
  let ordered = clockwork_graph::order(graph, &ids)?;
  let entries = ordered
    .iter()
    .map(|&id| {
      let node = graph.get(id);
      let name = node
        .and_then(|n| n.name.clone())
        .unwrap_or_else(|| id.to_string());
      let action = match node.map(|n| kind_present(&n.kind)) {
        Some(true) => PlannedAction::Create,
        Some(false) => PlannedAction::Destroy,
        None => PlannedAction::NoOp,
      };
      PlanEntry { id, name, action }
    })
    .collect();
  Ok(Plan { order: ordered, entries })
}

fn kind_present(kind: &ResourceKind) -> bool {
  match kind {
    ResourceKind::Container(c) => c.present,
    ResourceKind::File(f) => f.present,
    ResourceKind::Directory(d) => d.present,
    ResourceKind::GitRepo(g) => g.present,
    ResourceKind::User(u) => u.present,
    ResourceKind::BrewPackage(b) => b.present,
    ResourceKind::Blank => true,
  }
}

#[derive(Debug, Default)]
pub struct ApplyReport {
  pub deployed: Vec<ResourceId>,
  pub failed: HashMap<ResourceId, String>,
  pub outputs: DeployOutputs,
}

fn rank_groups(graph: &ResourceGraph, ordered: &[ResourceId]) -> Vec<Vec<ResourceId>> {
  let ordered_set: std::collections::HashSet<ResourceId> = ordered.iter().copied().collect();
  let mut rank_of: HashMap<ResourceId, usize> = HashMap::new();
  let mut max_rank = 0;
  for &id in ordered {
    let mut rank = 0;
    if let Some(node) = graph.get(id) {
      for conn in &node.connections {
        if ordered_set.contains(&conn.to) {
          let dep_rank = rank_of.get(&conn.to).copied().unwrap_or(0);
          rank = rank.max(dep_rank + 1);
        }
      }
    }
    rank_of.insert(id, rank);
    max_rank = max_rank.max(rank);
  }
  let mut groups = vec![Vec::new(); max_rank + 1];
  for &id in ordered {
    groups[rank_of[&id]].push(id);
  }
  groups
}

/// Deploys every resource reachable from `roots`, rank by rank (spec.md §4.6
/// invariant I5 "dependency-ordered deploy"). Failures are collected per
/// resource rather than aborting the batch (spec.md §4.7).
pub async fn apply(
  graph: &mut ResourceGraph,
  roots: &[ResourceId],
  driver: &dyn Driver,
  parallelism: usize,
) -> Result<ApplyReport, ApplyError> {
  apply_with_preskipped(graph, roots, driver, parallelism, HashMap::new()).await
}

/// Same as [`apply`], but seeds the failure set with resources already known
/// to be unusable before deploy starts — e.g. ones whose completion pass
/// (spec.md §4.3) left required fields null. Any resource that transitively
/// depends on a pre-skipped or failed one is skipped in turn, so a single
/// upstream failure can't silently leave a dependent deployed against a
/// never-created dependency (invariant I5).
pub async fn apply_with_preskipped(
  graph: &mut ResourceGraph,
  roots: &[ResourceId],
  driver: &dyn Driver,
  parallelism: usize,
  preskipped: HashMap<ResourceId, String>,
) -> Result<ApplyReport, ApplyError> {
  let ids = clockwork_graph::flatten_descendants(graph, roots);
  let ordered = clockwork_graph::order(graph, &ids)?;
  let ranks = rank_groups(graph, &ordered);

  let mut report = ApplyReport::default();
  report.failed = preskipped;
  let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));

  for rank in ranks {
    for &id in &rank {
      if report.failed.contains_key(&id) {
        continue;
      }
      let depends_on_failed = graph
        .get(id)
        .map(|n| n.connections.iter().any(|c| report.failed.contains_key(&c.to)))
        .unwrap_or(false);
      if depends_on_failed {
        report.failed.insert(id, "skipped: depends on a resource that failed or was skipped".to_string());
        continue;
      }
      if let Err(e) = setup_connections(graph, id, &report.outputs, driver).await {
        tracing::warn!("connection setup failed for {id}: {e}");
        report.failed.insert(id, e.to_string());
      }
    }

    let mut futs = Vec::new();
    for &id in &rank {
      if report.failed.contains_key(&id) {
        continue;
      }
      let Some(node) = graph.get(id) else { continue };
      let kind = node.kind.clone();
      let name = node.name.clone().unwrap_or_else(|| id.to_string());
      let sem = semaphore.clone();
      futs.push(async move {
        let _permit = sem.acquire_owned().await.expect("semaphore never closed");
        (id, deploy_kind(driver, &name, &kind).await)
      });
    }
    let results = futures::future::join_all(futs).await;
    for (id, result) in results {
      match result {
        Ok(output) => {
          report.outputs.insert(id, output);
          report.deployed.push(id);
        }
        Err(e) => {
          report.failed.insert(id, e.to_string());
        }
      }
    }
  }

  Ok(report)
}

async fn setup_connections(
  graph: &mut ResourceGraph,
  id: ResourceId,
  outputs: &DeployOutputs,
  driver: &dyn Driver,
) -> Result<(), ApplyError> {
  let conn_count = graph.get(id).map(|n| n.connections.len()).unwrap_or(0);
  for idx in 0..conn_count {
    let mut conn = graph
      .get(id)
      .ok_or(ApplyError::MissingResource(id))?
      .connections[idx]
      .clone();
    clockwork_connections::setup(&mut conn, graph, outputs, driver).await?;
    graph.get_mut(id).ok_or(ApplyError::MissingResource(id))?.connections[idx] = conn;
  }
  Ok(())
}

async fn deploy_kind(
  driver: &dyn Driver,
  name: &str,
  kind: &ResourceKind,
) -> Result<DeployOutput, ApplyError> {
  match kind {
    ResourceKind::Container(c) => {
      if !c.present {
        let _ = driver.stop_container(name).await;
        driver.remove_container(name).await?;
        return Ok(DeployOutput::Blank);
      }
      let spec = ContainerDeploySpec {
        name: name.to_string(),
        image: c.image.clone().unwrap_or_default(),
        ports: c.ports.clone(),
        volumes: c.volumes.clone(),
        env_vars: c.env_vars.clone(),
        networks: c.networks.clone(),
        start: c.start,
      };
      let handle = driver.ensure_container(&spec).await?;
      let inspect = driver.inspect_container(&handle.container_id).await?;
      Ok(DeployOutput::Container {
        container_id: handle.container_id,
        published_ports: inspect.published_ports,
      })
    }
    ResourceKind::File(f) => {
      let path = f
        .resolve_path(Some(name))
        .ok_or_else(|| ApplyError::UnresolvedFilePath(name.to_string()))?;
      if !f.present {
        driver.remove_file(&path).await?;
        if let Some(dir) = &f.directory {
          // Best-effort: a non-empty directory failing to remove is not fatal.
          let _ = driver.run_command(
            &["rmdir".to_string(), dir.clone()],
            &[],
            None,
            Duration::from_secs(30),
          ).await;
        }
        return Ok(DeployOutput::Blank);
      }
      if let Some(dir) = &f.directory {
        driver.ensure_dir(dir, "755", None, None, true).await?;
      }
      let content = f.content.clone().unwrap_or_default();
      driver.write_file(&path, content.as_bytes(), &f.mode, None, None).await?;
      Ok(DeployOutput::File { path })
    }
    ResourceKind::Directory(d) => {
      if !d.present {
        driver
          .run_command(
            &["rm".to_string(), "-rf".to_string(), d.path.clone()],
            &[],
            None,
            Duration::from_secs(30),
          )
          .await?;
        return Ok(DeployOutput::Blank);
      }
      driver
        .ensure_dir(&d.path, &d.mode, d.user.as_deref(), d.group.as_deref(), d.recursive)
        .await?;
      Ok(DeployOutput::Directory { path: d.path.clone() })
    }
    ResourceKind::GitRepo(g) => {
      let (Some(url), Some(dest)) = (&g.repo_url, &g.dest) else {
        return Err(ApplyError::IncompleteGitRepo(name.to_string()));
      };
      if !g.present {
        driver
          .run_command(
            &["rm".to_string(), "-rf".to_string(), dest.clone()],
            &[],
            None,
            Duration::from_secs(30),
          )
          .await?;
        return Ok(DeployOutput::Blank);
      }
      driver.ensure_git_clone(url, g.branch.as_deref(), dest, g.pull).await?;
      Ok(DeployOutput::GitRepo { dest: dest.clone(), hash: None })
    }
    ResourceKind::User(u) => {
      if !u.present {
        driver.remove_user(name).await?;
        return Ok(DeployOutput::Blank);
      }
      driver
        .ensure_user(&UserDeploySpec {
          name: name.to_string(),
          home: u.home.clone(),
          shell: u.shell.clone(),
          group: u.group.clone(),
          system: u.system,
        })
        .await?;
      Ok(DeployOutput::User { name: name.to_string() })
    }
    ResourceKind::BrewPackage(b) => {
      let packages = b.packages.clone().unwrap_or_default();
      for pkg in &packages {
        driver.ensure_package(pkg, b.cask, b.present, b.update).await?;
      }
      Ok(DeployOutput::BrewPackage { packages })
    }
    ResourceKind::Blank => Ok(DeployOutput::Blank),
  }
}

/// Tears every resource down, in reverse topological order, regardless of
/// its declared `present` flag (spec.md §4.6 invariant I6 "reverse-
/// topological destroy").
pub async fn destroy(
  graph: &ResourceGraph,
  roots: &[ResourceId],
  driver: &dyn Driver,
) -> Result<ApplyReport, ApplyError> {
  let ids = clockwork_graph::flatten_descendants(graph, roots);
  let mut ordered = clockwork_graph::order(graph, &ids)?;
  ordered.reverse();

  let mut report = ApplyReport::default();
  for id in ordered {
    let Some(node) = graph.get(id) else { continue };
    let name = node.name.clone().unwrap_or_else(|| id.to_string());
    match teardown_kind(driver, &name, &node.kind).await {
      Ok(()) => report.deployed.push(id),
      Err(e) => {
        report.failed.insert(id, e.to_string());
      }
    }
  }
  Ok(report)
}

async fn teardown_kind(driver: &dyn Driver, name: &str, kind: &ResourceKind) -> Result<(), ApplyError> {
  match kind {
    ResourceKind::Container(_) => {
      let _ = driver.stop_container(name).await;
      driver.remove_container(name).await?;
    }
    ResourceKind::File(f) => {
      if let Some(path) = f.resolve_path(Some(name)) {
        driver.remove_file(&path).await?;
      }
    }
    ResourceKind::Directory(d) => {
      driver
        .run_command(
          &["rm".to_string(), "-rf".to_string(), d.path.clone()],
          &[],
          None,
          Duration::from_secs(30),
        )
        .await?;
    }
    ResourceKind::GitRepo(g) => {
      if let Some(dest) = &g.dest {
        driver
          .run_command(
            &["rm".to_string(), "-rf".to_string(), dest.clone()],
            &[],
            None,
            Duration::from_secs(30),
          )
          .await?;
      }
    }
    ResourceKind::User(_) => {
      driver.remove_user(name).await?;
    }
    ResourceKind::BrewPackage(b) => {
      for pkg in b.packages.clone().unwrap_or_default() {
        driver.ensure_package(&pkg, b.cask, false, false).await?;
      }
    }
    ResourceKind::Blank => {}
  }
  Ok(())
}

/// Evaluates every assertion on every resource reachable from `roots`
/// (spec.md §4.2, the `clockwork assert` subcommand).
pub async fn assert_all(
  graph: &ResourceGraph,
  roots: &[ResourceId],
  driver: &dyn Driver,
) -> Vec<(ResourceId, String, AssertionOutcome)> {
  let ids = clockwork_graph::flatten_descendants(graph, roots);
  let mut out = Vec::new();
  for id in ids {
    let Some(node) = graph.get(id) else { continue };
    let name = node.name.clone().unwrap_or_else(|| id.to_string());
    for assertion in &node.assertions {
      let outcome = clockwork_assertions::run(assertion, driver).await;
      out.push((id, name.clone(), outcome));
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use clockwork_client::{
    Connection, ConnectionKind, ContainerSpec, FileSpec, ResourceNode,
  };
  use clockwork_driver::{
    CommandOutput, ContainerHandle, ContainerInspect, DiskUsageReading, DriverError, NetworkOptions,
  };
  use clockwork_client::EnvironmentVar;
  use std::sync::Mutex;

  #[derive(Default)]
  struct FakeDriver {
    calls: Mutex<Vec<String>>,
  }

  #[async_trait]
  impl Driver for FakeDriver {
    async fn ensure_container(&self, spec: &ContainerDeploySpec) -> Result<clockwork_driver::ContainerHandle, DriverError> {
      self.calls.lock().unwrap().push(format!("ensure_container:{}", spec.name));
      Ok(ContainerHandle { container_id: spec.name.clone() })
    }
    async fn stop_container(&self, _id: &str) -> Result<(), DriverError> {
      Ok(())
    }
    async fn remove_container(&self, id: &str) -> Result<(), DriverError> {
      self.calls.lock().unwrap().push(format!("remove_container:{id}"));
      Ok(())
    }
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspect, DriverError> {
      Ok(ContainerInspect {
        container_id: id.to_string(),
        running: true,
        image: "img".to_string(),
        published_ports: vec![(8080, 80)],
      })
    }
    async fn container_logs(&self, _id: &str, _tail: usize) -> Result<String, DriverError> {
      Ok(String::new())
    }
    async fn write_file(&self, path: &str, _c: &[u8], _m: &str, _o: Option<&str>, _g: Option<&str>) -> Result<(), DriverError> {
      self.calls.lock().unwrap().push(format!("write_file:{path}"));
      Ok(())
    }
    async fn remove_file(&self, _p: &str) -> Result<(), DriverError> {
      Ok(())
    }
    async fn ensure_dir(&self, path: &str, mode: &str, _o: Option<&str>, _g: Option<&str>, _r: bool) -> Result<(), DriverError> {
      self.calls.lock().unwrap().push(format!("ensure_dir:{path}:{mode}"));
      Ok(())
    }
    async fn file_exists(&self, _p: &str) -> Result<bool, DriverError> {
      Ok(true)
    }
    async fn read_file(&self, _p: &str) -> Result<Vec<u8>, DriverError> {
      Ok(Vec::new())
    }
    async fn run_command(&self, _a: &[String], _e: &[EnvironmentVar], _c: Option<&str>, _t: Duration) -> Result<CommandOutput, DriverError> {
      Ok(CommandOutput { exit_code: 0, stdout: String::new(), stderr: String::new() })
    }
    async fn tcp_probe(&self, _h: &str, _p: u16, _t: Duration) -> Result<bool, DriverError> {
      Ok(true)
    }
    async fn udp_probe(&self, _h: &str, _p: u16, _t: Duration) -> Result<bool, DriverError> {
      Ok(true)
    }
    async fn http_get(&self, _u: &str, _t: Duration) -> Result<u16, DriverError> {
      Ok(200)
    }
    async fn ensure_user(&self, _s: &UserDeploySpec) -> Result<(), DriverError> {
      Ok(())
    }
    async fn remove_user(&self, _n: &str) -> Result<(), DriverError> {
      Ok(())
    }
    async fn ensure_package(&self, _n: &str, _c: bool, _p: bool, _u: bool) -> Result<(), DriverError> {
      Ok(())
    }
    async fn ensure_git_clone(&self, _u: &str, _b: Option<&str>, _d: &str, _p: bool) -> Result<(), DriverError> {
      Ok(())
    }
    async fn ensure_network(&self, _n: &str, _o: &NetworkOptions) -> Result<(), DriverError> {
      Ok(())
    }
    async fn attach(&self, _c: &str, _n: &str) -> Result<(), DriverError> {
      Ok(())
    }
    async fn query_state(&self, _k: &str, _n: &str) -> Result<serde_json::Value, DriverError> {
      Ok(serde_json::Value::Null)
    }
    async fn process_count(&self, _n: &str) -> Result<usize, DriverError> {
      Ok(1)
    }
    async fn memory_usage_mb(&self, _c: Option<&str>) -> Result<f64, DriverError> {
      Ok(0.0)
    }
    async fn cpu_usage_percent(&self, _c: Option<&str>) -> Result<f64, DriverError> {
      Ok(0.0)
    }
    async fn disk_usage(&self, _p: &str) -> Result<DiskUsageReading, DriverError> {
      Ok(DiskUsageReading { used_percent: 0.0, used_mb: 0 })
    }
  }

  fn node(id: ResourceId, name: &str, kind: ResourceKind) -> ResourceNode {
    ResourceNode {
      id,
      name: Some(name.to_string()),
      description: None,
      assertions: Vec::new(),
      tools: Vec::new(),
      connections: Vec::new(),
      children: Vec::new(),
      parent: None,
      kind,
    }
  }

  #[tokio::test]
  async fn deploys_dependency_before_dependent() {
    let mut graph = ResourceGraph::new();
    let db = graph.insert(|id| node(id, "db", ResourceKind::Container(ContainerSpec::new("postgres:15"))));
    let api = graph.insert(|id| node(id, "api", ResourceKind::Container(ContainerSpec::new("api:latest"))));
    graph.get_mut(api).unwrap().connections.push(Connection {
      from: api,
      to: db,
      description: None,
      setup_resources: Vec::new(),
      kind: ConnectionKind::Dependency,
    });

    let driver = FakeDriver::default();
    let report = apply(&mut graph, &[api, db], &driver, 4).await.unwrap();
    assert!(report.failed.is_empty());
    assert_eq!(report.deployed.len(), 2);
    assert!(report.outputs.get(&db).unwrap().container_id().is_some());

    let calls = driver.calls.lock().unwrap();
    let db_pos = calls.iter().position(|c| c == "ensure_container:db").unwrap();
    let api_pos = calls.iter().position(|c| c == "ensure_container:api").unwrap();
    assert!(db_pos < api_pos);
  }

  #[tokio::test]
  async fn destroy_runs_in_reverse_order() {
    let mut graph = ResourceGraph::new();
    let db = graph.insert(|id| node(id, "db", ResourceKind::Container(ContainerSpec::new("postgres:15"))));
    let api = graph.insert(|id| node(id, "api", ResourceKind::Container(ContainerSpec::new("api:latest"))));
    graph.get_mut(api).unwrap().connections.push(Connection {
      from: api,
      to: db,
      description: None,
      setup_resources: Vec::new(),
      kind: ConnectionKind::Dependency,
    });

    let driver = FakeDriver::default();
    destroy(&graph, &[api, db], &driver).await.unwrap();
    let calls = driver.calls.lock().unwrap();
    let db_pos = calls.iter().position(|c| c == "remove_container:db").unwrap();
    let api_pos = calls.iter().position(|c| c == "remove_container:api").unwrap();
    assert!(api_pos < db_pos);
  }

  #[tokio::test]
  async fn file_with_directory_ensures_dir_then_writes() {
    let mut graph = ResourceGraph::new();
    let file_spec = FileSpec {
      content: Some("events{}\nhttp{}\n".into()),
      directory: Some("/etc/nginx".into()),
      present: true,
      ..Default::default()
    };
    let id = graph.insert(|id| node(id, "nginx.conf", ResourceKind::File(file_spec)));

    let driver = FakeDriver::default();
    let report = apply(&mut graph, &[id], &driver, 4).await.unwrap();
    assert!(report.failed.is_empty());

    let calls = driver.calls.lock().unwrap();
    let dir_pos = calls.iter().position(|c| c == "ensure_dir:/etc/nginx:755").unwrap();
    let write_pos = calls.iter().position(|c| c == "write_file:/etc/nginx/nginx.conf").unwrap();
    assert!(dir_pos < write_pos);
  }

  #[test]
  fn plan_marks_absent_resources_for_destroy() {
    let mut graph = ResourceGraph::new();
    let mut file_spec = FileSpec { content: Some("x".into()), path: Some("/tmp/x".into()), ..Default::default() };
    file_spec.present = false;
    let id = graph.insert(|id| node(id, "cfg", ResourceKind::File(file_spec)));
    let p = plan(&graph, &[id]).unwrap();
    assert_eq!(p.entries[0].action, PlannedAction::Destroy);
  }
}
