//! The long-lived supervisor: a project registry, a 1-second tick loop that
//! dispatches due health checks, and bounded remediation (spec.md §4.9, "L1").
//!
//! Grounded on the teacher's `spawn_schedule_executor` in
//! `core/src/schedule.rs` — a `tokio::spawn`ed loop ticking on
//! `async_timing_util::wait_until_timelength(Timelength::OneSecond, 0)` —
//! generalized from one-shot scheduled runs to a continuously re-armed
//! per-resource health check. The project registry itself is a `DashMap`,
//! the same concurrent map the teacher's `core` binary keeps its resource
//! caches in, replacing the Python original's single global dict (spec.md
//! §9 "global singleton state").

mod interval;
mod remediate;

pub use interval::health_check_interval;
pub use remediate::{remediate, RemediationOutcome};

use std::sync::Arc;
use std::time::Duration;

use async_timing_util::Timelength;
use clockwork_client::{clockwork_timestamp, ClockworkConfig, Project};
use clockwork_completion::LLMClient;
use clockwork_driver::Driver;
use dashmap::DashMap;
use uuid::Uuid;

/// Concurrent project registry (spec.md §5 "the supervisor owns every
/// registered `Project`").
#[derive(Default)]
pub struct Registry {
  projects: DashMap<Uuid, Project>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&self, project: Project) -> Uuid {
    let id = project.id;
    self.projects.insert(id, project);
    id
  }

  pub fn remove(&self, id: Uuid) -> Option<Project> {
    self.projects.remove(&id).map(|(_, p)| p)
  }

  pub fn get(&self, id: Uuid) -> Option<dashmap::mapref::one::Ref<'_, Uuid, Project>> {
    self.projects.get(&id)
  }

  pub fn ids(&self) -> Vec<Uuid> {
    self.projects.iter().map(|e| *e.key()).collect()
  }

  pub fn len(&self) -> usize {
    self.projects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.projects.is_empty()
  }
}

pub struct Supervisor {
  pub registry: Arc<Registry>,
  driver: Arc<dyn Driver>,
  llm: Arc<dyn LLMClient>,
  config: ClockworkConfig,
}

impl Supervisor {
  pub fn new(driver: Arc<dyn Driver>, llm: Arc<dyn LLMClient>, config: ClockworkConfig) -> Self {
    Supervisor {
      registry: Arc::new(Registry::new()),
      driver,
      llm,
      config,
    }
  }

  pub fn driver(&self) -> &Arc<dyn Driver> {
    &self.driver
  }

  pub fn config(&self) -> &ClockworkConfig {
    &self.config
  }

  /// Spawns the 1-second tick loop. Returns the join handle so callers (the
  /// `clockwork_core` binary, or a test) can hold or abort it.
  pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
      loop {
        let now = async_timing_util::wait_until_timelength(Timelength::OneSecond, 0).await as i64;
        self.tick(now).await;
      }
    })
  }

  /// Runs one pass over every registered project, checking whatever
  /// resources are due, and remediating failures within their attempt
  /// budget (spec.md §4.9 steps 1-5).
  pub async fn tick(&self, now: i64) {
    for id in self.registry.ids() {
      let Some(mut project) = self.registry.get(id).map(|r| r.value().clone()) else {
        continue;
      };
      self.check_project(&mut project, now).await;
      self.registry.projects.insert(id, project);
    }
  }

  async fn check_project(&self, project: &mut Project, now: i64) {
    let due: Vec<(String, Duration)> = project
      .graph
      .iter()
      .filter_map(|node| {
        let name = node.name.clone()?;
        if project.permanently_failed.contains(&name) {
          return None;
        }
        let interval = health_check_interval(&node.kind, self.config.service_check_interval_default);
        let last = project.last_check.get(&name).copied().unwrap_or(0);
        if interval.is_zero() && last != 0 {
          // "once" kinds (e.g. File) never recheck after their first pass.
          return None;
        }
        if now - last >= interval.as_millis() as i64 {
          Some((name, interval))
        } else {
          None
        }
      })
      .collect();

    for (name, _interval) in due {
      project.last_check.insert(name.clone(), now);
      let Some(id) = project.graph.ids().find(|&id| {
        project.graph.get(id).and_then(|n| n.name.as_deref()) == Some(name.as_str())
      }) else {
        continue;
      };
      let Some(node) = project.graph.get(id) else { continue };
      let assertions = node.assertions.clone();

      let mut healthy = true;
      for assertion in &assertions {
        let outcome = clockwork_assertions::run(assertion, self.driver.as_ref()).await;
        if !outcome.ok {
          healthy = false;
          tracing::warn!("resource {name} failed assertion: {}", outcome.detail);
        }
      }
      project.health_status.insert(name.clone(), healthy);

      if !healthy {
        self.handle_unhealthy(project, &name).await;
      }
    }
  }

  async fn handle_unhealthy(&self, project: &mut Project, name: &str) {
    if !project.can_remediate(name, self.config.service_max_remediation_attempts) {
      tracing::error!("resource {name} exhausted its remediation budget; marking permanently failed");
      project.permanently_failed.insert(name.to_string());
      return;
    }

    // Increment before attempting, per the confirmed open-question decision:
    // a crash mid-remediation must still count against the budget.
    *project.remediation_attempts.entry(name.to_string()).or_insert(0) += 1;

    match remediate(
      project,
      name,
      self.driver.as_ref(),
      self.llm.as_ref(),
      self.config.completion_max_retries,
      self.config.deploy_parallelism,
    )
    .await
    {
      RemediationOutcome::Recovered => {
        project.health_status.insert(name.to_string(), true);
      }
      RemediationOutcome::StillFailing(reason) => {
        tracing::warn!("remediation of {name} did not recover health: {reason}");
      }
    }
  }
}

pub fn now_ms() -> i64 {
  clockwork_timestamp()
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use clockwork_client::{
    AssertionKind, AssertionSpec, ContainerSpec, EnvironmentVar, ResourceGraph, ResourceKind,
    ResourceNode,
  };
  use clockwork_driver::{
    CommandOutput, ContainerDeploySpec, ContainerHandle, ContainerInspect, DiskUsageReading,
    DriverError, NetworkOptions, UserDeploySpec,
  };
  use std::sync::atomic::{AtomicBool, Ordering};

  struct FlakyDriver {
    file_exists: AtomicBool,
  }

  /// Used where remediation's attempt budget is already exhausted before
  /// `remediate()` is ever called — the LLM must stay unreached there.
  struct UnreachableLLMClient;

  #[async_trait]
  impl LLMClient for UnreachableLLMClient {
    async fn structured_complete(
      &self,
      _req: clockwork_completion::CompletionRequest,
    ) -> Result<serde_json::Value, clockwork_completion::CompletionError> {
      panic!("LLMClient should not be invoked once the remediation budget is exhausted")
    }
  }

  /// Remediation re-completes unconditionally (spec.md §4.9 step 4), even
  /// when every field is already non-null, so the stub must tolerate being
  /// called; it proposes nothing new and relies on the merge rule (user/
  /// existing value wins) to leave the resource's fields untouched.
  struct NoOpLLMClient;

  #[async_trait]
  impl LLMClient for NoOpLLMClient {
    async fn structured_complete(
      &self,
      _req: clockwork_completion::CompletionRequest,
    ) -> Result<serde_json::Value, clockwork_completion::CompletionError> {
      Ok(serde_json::json!({}))
    }
  }

  #[async_trait]
  impl Driver for FlakyDriver {
    async fn ensure_container(&self, _s: &ContainerDeploySpec) -> Result<ContainerHandle, DriverError> {
      Ok(ContainerHandle { container_id: "c".into() })
    }
    async fn stop_container(&self, _id: &str) -> Result<(), DriverError> {
      Ok(())
    }
    async fn remove_container(&self, _id: &str) -> Result<(), DriverError> {
      Ok(())
    }
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspect, DriverError> {
      Ok(ContainerInspect { container_id: id.to_string(), running: true, image: "i".into(), published_ports: vec![] })
    }
    async fn container_logs(&self, _id: &str, _tail: usize) -> Result<String, DriverError> {
      Ok(String::new())
    }
    async fn write_file(&self, _p: &str, _c: &[u8], _m: &str, _o: Option<&str>, _g: Option<&str>) -> Result<(), DriverError> {
      self.file_exists.store(true, Ordering::SeqCst);
      Ok(())
    }
    async fn remove_file(&self, _p: &str) -> Result<(), DriverError> {
      Ok(())
    }
    async fn ensure_dir(&self, _p: &str, _m: &str, _o: Option<&str>, _g: Option<&str>, _r: bool) -> Result<(), DriverError> {
      Ok(())
    }
    async fn file_exists(&self, _p: &str) -> Result<bool, DriverError> {
      Ok(self.file_exists.load(Ordering::SeqCst))
    }
    async fn read_file(&self, _p: &str) -> Result<Vec<u8>, DriverError> {
      Ok(Vec::new())
    }
    async fn run_command(&self, _a: &[String], _e: &[EnvironmentVar], _c: Option<&str>, _t: std::time::Duration) -> Result<CommandOutput, DriverError> {
      Ok(CommandOutput { exit_code: 0, stdout: String::new(), stderr: String::new() })
    }
    async fn tcp_probe(&self, _h: &str, _p: u16, _t: std::time::Duration) -> Result<bool, DriverError> {
      Ok(true)
    }
    async fn udp_probe(&self, _h: &str, _p: u16, _t: std::time::Duration) -> Result<bool, DriverError> {
      Ok(true)
    }
    async fn http_get(&self, _u: &str, _t: std::time::Duration) -> Result<u16, DriverError> {
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
      Ok(0)
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

  fn failing_project() -> Project {
    let mut graph = ResourceGraph::new();
    graph.insert(|id| ResourceNode {
      id,
      name: Some("web".to_string()),
      description: None,
      assertions: vec![AssertionKind {
        timeout_secs: 1,
        spec: AssertionSpec::FileExists { path: "/tmp/clockwork-missing".to_string() },
      }],
      tools: Vec::new(),
      connections: Vec::new(),
      children: Vec::new(),
      parent: None,
      kind: ResourceKind::Container(ContainerSpec::new("web:latest")),
    });
    Project::register("proj.yaml".into(), graph, 0)
  }

  #[tokio::test]
  async fn unhealthy_resource_triggers_remediation_and_counts_attempt() {
    let driver: Arc<dyn Driver> = Arc::new(FlakyDriver { file_exists: AtomicBool::new(false) });
    let config = ClockworkConfig { service_max_remediation_attempts: 3, ..Default::default() };
    let supervisor = Supervisor::new(driver, Arc::new(NoOpLLMClient), config);
    let id = supervisor.registry.register(failing_project());

    supervisor.tick(10_000).await;

    let project = supervisor.registry.get(id).unwrap();
    assert_eq!(project.remediation_attempts.get("web"), Some(&1));
  }

  #[tokio::test]
  async fn exhausted_budget_marks_permanently_failed() {
    let driver: Arc<dyn Driver> = Arc::new(FlakyDriver { file_exists: AtomicBool::new(false) });
    let config = ClockworkConfig { service_max_remediation_attempts: 1, ..Default::default() };
    let supervisor = Supervisor::new(driver, Arc::new(UnreachableLLMClient), config);
    let mut project = failing_project();
    project.remediation_attempts.insert("web".to_string(), 1);
    let id = supervisor.registry.register(project);

    supervisor.tick(10_000).await;

    let project = supervisor.registry.get(id).unwrap();
    assert!(project.permanently_failed.contains("web"));
  }
}
