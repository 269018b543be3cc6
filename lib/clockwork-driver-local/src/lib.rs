//! A concrete [`clockwork_driver::Driver`]: talks to the local Docker
//! daemon via `bollard`, the local filesystem via `tokio::fs`, spawns local
//! processes for everything else (spec.md §4.5, §9 "mixed async/blocking
//! unified under tokio").
//!
//! Grounded on the teacher's `periphery` binary: a single long-lived
//! `bollard::Docker` handle behind a struct (teacher's `docker_client()`
//! `OnceLock`), shelling out through `clockwork-command` for anything
//! bollard doesn't cover directly (teacher's `pull_image`/`docker_login`).

mod docker;
mod filesystem;
mod git;
mod package;
mod probes;
mod system;
mod user;

use async_trait::async_trait;
use bollard::Docker;
use clockwork_client::EnvironmentVar;
use clockwork_driver::{
  CommandOutput, ContainerDeploySpec, ContainerHandle, ContainerInspect, DiskUsageReading,
  Driver, DriverError, NetworkOptions, UserDeploySpec,
};
use std::time::Duration;

pub struct LocalDriver {
  docker: Docker,
}

impl LocalDriver {
  pub fn connect() -> Result<Self, DriverError> {
    let docker = Docker::connect_with_local_defaults()
      .map_err(|e| DriverError::Unavailable(format!("docker daemon: {e}")))?;
    Ok(LocalDriver { docker })
  }
}

#[async_trait]
impl Driver for LocalDriver {
  async fn ensure_container(
    &self,
    spec: &ContainerDeploySpec,
  ) -> Result<ContainerHandle, DriverError> {
    docker::ensure_container(&self.docker, spec).await
  }

  async fn stop_container(&self, id: &str) -> Result<(), DriverError> {
    docker::stop_container(&self.docker, id).await
  }

  async fn remove_container(&self, id: &str) -> Result<(), DriverError> {
    docker::remove_container(&self.docker, id).await
  }

  async fn inspect_container(&self, id: &str) -> Result<ContainerInspect, DriverError> {
    docker::inspect_container(&self.docker, id).await
  }

  async fn container_logs(&self, id: &str, tail: usize) -> Result<String, DriverError> {
    docker::container_logs(&self.docker, id, tail).await
  }

  async fn write_file(
    &self,
    path: &str,
    contents: &[u8],
    mode: &str,
    owner: Option<&str>,
    group: Option<&str>,
  ) -> Result<(), DriverError> {
    filesystem::write_file(path, contents, mode, owner, group).await
  }

  async fn remove_file(&self, path: &str) -> Result<(), DriverError> {
    filesystem::remove_file(path).await
  }

  async fn ensure_dir(
    &self,
    path: &str,
    mode: &str,
    owner: Option<&str>,
    group: Option<&str>,
    recursive: bool,
  ) -> Result<(), DriverError> {
    filesystem::ensure_dir(path, mode, owner, group, recursive).await
  }

  async fn file_exists(&self, path: &str) -> Result<bool, DriverError> {
    filesystem::file_exists(path).await
  }

  async fn read_file(&self, path: &str) -> Result<Vec<u8>, DriverError> {
    filesystem::read_file(path).await
  }

  async fn run_command(
    &self,
    argv: &[String],
    env: &[EnvironmentVar],
    cwd: Option<&str>,
    timeout: Duration,
  ) -> Result<CommandOutput, DriverError> {
    filesystem::run_command(argv, env, cwd, timeout).await
  }

  async fn tcp_probe(&self, host: &str, port: u16, timeout: Duration) -> Result<bool, DriverError> {
    probes::tcp_probe(host, port, timeout).await
  }

  async fn udp_probe(&self, host: &str, port: u16, timeout: Duration) -> Result<bool, DriverError> {
    probes::udp_probe(host, port, timeout).await
  }

  async fn http_get(&self, url: &str, timeout: Duration) -> Result<u16, DriverError> {
    probes::http_get(url, timeout).await
  }

  async fn ensure_user(&self, spec: &UserDeploySpec) -> Result<(), DriverError> {
    user::ensure_user(spec).await
  }

  async fn remove_user(&self, name: &str) -> Result<(), DriverError> {
    user::remove_user(name).await
  }

  async fn ensure_package(
    &self,
    name: &str,
    cask: bool,
    present: bool,
    update: bool,
  ) -> Result<(), DriverError> {
    package::ensure_package(name, cask, present, update).await
  }

  async fn ensure_git_clone(
    &self,
    url: &str,
    branch: Option<&str>,
    dest: &str,
    pull: bool,
  ) -> Result<(), DriverError> {
    git::ensure_git_clone(url, branch, dest, pull).await
  }

  async fn ensure_network(&self, name: &str, options: &NetworkOptions) -> Result<(), DriverError> {
    docker::ensure_network(&self.docker, name, options).await
  }

  async fn attach(&self, container: &str, network: &str) -> Result<(), DriverError> {
    docker::attach(&self.docker, container, network).await
  }

  async fn query_state(
    &self,
    resource_kind: &str,
    name: &str,
  ) -> Result<serde_json::Value, DriverError> {
    match resource_kind {
      "container" => docker::query_container_state(&self.docker, name).await,
      "file" | "directory" => filesystem::query_path_state(name).await,
      _ => Ok(serde_json::Value::Null),
    }
  }

  async fn process_count(&self, name: &str) -> Result<usize, DriverError> {
    system::process_count(name).await
  }

  async fn memory_usage_mb(&self, container: Option<&str>) -> Result<f64, DriverError> {
    match container {
      Some(id) => docker::container_memory_mb(&self.docker, id).await,
      None => system::host_memory_mb().await,
    }
  }

  async fn cpu_usage_percent(&self, container: Option<&str>) -> Result<f64, DriverError> {
    match container {
      Some(id) => docker::container_cpu_percent(&self.docker, id).await,
      None => system::host_cpu_percent().await,
    }
  }

  async fn disk_usage(&self, path: &str) -> Result<DiskUsageReading, DriverError> {
    system::disk_usage(path).await
  }
}
