//! The Driver capability: the single, stable surface through which the core
//! touches the world (spec.md §4.5, "L6"). Concrete drivers — a local
//! container/filesystem driver, a remote agent, a dry-run recorder — all
//! implement this trait; the core itself never constructs a subprocess,
//! opens a socket, or touches a filesystem path directly.

use std::time::Duration;

use async_trait::async_trait;
use clockwork_client::EnvironmentVar;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
  #[error("not found: {0}")]
  NotFound(String),
  #[error("conflict: {0}")]
  Conflict(String),
  #[error("timed out: {0}")]
  Timeout(String),
  #[error("permission denied: {0}")]
  PermissionDenied(String),
  #[error("unavailable: {0}")]
  Unavailable(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerDeploySpec {
  pub name: String,
  pub image: String,
  pub ports: Vec<String>,
  pub volumes: Vec<String>,
  pub env_vars: Vec<EnvironmentVar>,
  pub networks: Vec<String>,
  pub start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerHandle {
  pub container_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInspect {
  pub container_id: String,
  pub running: bool,
  pub image: String,
  /// `host:container` pairs, in publish order; `ServiceMesh` port discovery
  /// reads the first entry (spec.md §4.4).
  pub published_ports: Vec<(u16, u16)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDeploySpec {
  pub name: String,
  pub home: Option<String>,
  pub shell: String,
  pub group: Option<String>,
  pub system: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkOptions {
  pub driver: String,
  pub internal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
  pub exit_code: i32,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.exit_code == 0
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiskUsageReading {
  pub used_percent: f64,
  pub used_mb: u64,
}

/// The capability core code calls through. All methods are expected to be
/// idempotent when the driver's present state already matches, and to
/// fail fast (`Conflict`) on ambiguous partial states rather than guess.
#[async_trait]
pub trait Driver: Send + Sync {
  async fn ensure_container(
    &self,
    spec: &ContainerDeploySpec,
  ) -> Result<ContainerHandle, DriverError>;
  async fn stop_container(&self, id: &str) -> Result<(), DriverError>;
  async fn remove_container(&self, id: &str) -> Result<(), DriverError>;
  async fn inspect_container(&self, id: &str) -> Result<ContainerInspect, DriverError>;
  async fn container_logs(&self, id: &str, tail: usize) -> Result<String, DriverError>;

  async fn write_file(
    &self,
    path: &str,
    contents: &[u8],
    mode: &str,
    owner: Option<&str>,
    group: Option<&str>,
  ) -> Result<(), DriverError>;
  async fn remove_file(&self, path: &str) -> Result<(), DriverError>;
  async fn ensure_dir(
    &self,
    path: &str,
    mode: &str,
    owner: Option<&str>,
    group: Option<&str>,
    recursive: bool,
  ) -> Result<(), DriverError>;
  async fn file_exists(&self, path: &str) -> Result<bool, DriverError>;
  async fn read_file(&self, path: &str) -> Result<Vec<u8>, DriverError>;

  async fn run_command(
    &self,
    argv: &[String],
    env: &[EnvironmentVar],
    cwd: Option<&str>,
    timeout: Duration,
  ) -> Result<CommandOutput, DriverError>;

  async fn tcp_probe(&self, host: &str, port: u16, timeout: Duration) -> Result<bool, DriverError>;
  async fn udp_probe(&self, host: &str, port: u16, timeout: Duration) -> Result<bool, DriverError>;
  async fn http_get(&self, url: &str, timeout: Duration) -> Result<u16, DriverError>;

  async fn ensure_user(&self, spec: &UserDeploySpec) -> Result<(), DriverError>;
  async fn remove_user(&self, name: &str) -> Result<(), DriverError>;
  async fn ensure_package(
    &self,
    name: &str,
    cask: bool,
    present: bool,
    update: bool,
  ) -> Result<(), DriverError>;

  async fn ensure_git_clone(
    &self,
    url: &str,
    branch: Option<&str>,
    dest: &str,
    pull: bool,
  ) -> Result<(), DriverError>;

  async fn ensure_network(&self, name: &str, options: &NetworkOptions) -> Result<(), DriverError>;
  async fn attach(&self, container: &str, network: &str) -> Result<(), DriverError>;

  async fn query_state(
    &self,
    resource_kind: &str,
    name: &str,
  ) -> Result<serde_json::Value, DriverError>;

  /// Ambient system probes the assertion runner needs (spec.md §4.2):
  /// these are not user-facing resource operations, but the assertion
  /// library has no other route to the outside world.
  async fn process_count(&self, name: &str) -> Result<usize, DriverError>;
  async fn memory_usage_mb(&self, container: Option<&str>) -> Result<f64, DriverError>;
  async fn cpu_usage_percent(&self, container: Option<&str>) -> Result<f64, DriverError>;
  async fn disk_usage(&self, path: &str) -> Result<DiskUsageReading, DriverError>;
}
