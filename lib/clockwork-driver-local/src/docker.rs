//! Container/network lifecycle. Mutating operations shell out to the
//! `docker` CLI (grounded on the teacher's `stop_container_command` and
//! `docker stats --no-stream --format json` idiom in
//! `periphery/src/docker/mod.rs` and `stats.rs`); read-only inspection goes
//! through `bollard` directly (grounded on `periphery/src/docker/containers.rs`).

use bollard::query_parameters::InspectContainerOptions;
use bollard::Docker;
use clockwork_driver::{ContainerDeploySpec, ContainerHandle, ContainerInspect, DriverError, NetworkOptions};
use run_command::async_run_command;

fn shell_err(context: &str, stderr: &str) -> DriverError {
  DriverError::Unavailable(format!("{context}: {}", stderr.trim()))
}

pub async fn ensure_container(
  _docker: &Docker,
  spec: &ContainerDeploySpec,
) -> Result<ContainerHandle, DriverError> {
  let mut command = format!("docker run -d --name {}", shell_escape::escape(spec.name.as_str().into()));
  for port in &spec.ports {
    command.push_str(&format!(" -p {}", shell_escape::escape(port.as_str().into())));
  }
  for volume in &spec.volumes {
    command.push_str(&format!(" -v {}", shell_escape::escape(volume.as_str().into())));
  }
  for env in &spec.env_vars {
    command.push_str(&format!(
      " -e {}",
      shell_escape::escape(format!("{}={}", env.variable, env.value).into())
    ));
  }
  for network in &spec.networks {
    command.push_str(&format!(" --network {}", shell_escape::escape(network.as_str().into())));
  }
  command.push(' ');
  command.push_str(&shell_escape::escape(spec.image.as_str().into()));

  if !spec.start {
    command = command.replacen("docker run -d", "docker create", 1);
  }

  let output = async_run_command(&command).await;
  if !output.success() {
    return Err(shell_err("docker run", &output.stderr));
  }
  let container_id = output.stdout.trim().to_string();
  Ok(ContainerHandle { container_id })
}

pub async fn stop_container(_docker: &Docker, id: &str) -> Result<(), DriverError> {
  let command = format!("docker stop {}", shell_escape::escape(id.into()));
  let output = async_run_command(&command).await;
  if output.success() {
    Ok(())
  } else {
    Err(shell_err("docker stop", &output.stderr))
  }
}

pub async fn remove_container(_docker: &Docker, id: &str) -> Result<(), DriverError> {
  let command = format!("docker rm -f {}", shell_escape::escape(id.into()));
  let output = async_run_command(&command).await;
  if output.success() {
    Ok(())
  } else {
    Err(shell_err("docker rm", &output.stderr))
  }
}

pub async fn inspect_container(docker: &Docker, id: &str) -> Result<ContainerInspect, DriverError> {
  let container = docker
    .inspect_container(id, Some(InspectContainerOptions { size: false }))
    .await
    .map_err(|e| DriverError::NotFound(format!("{id}: {e}")))?;

  let running = container
    .state
    .as_ref()
    .and_then(|s| s.running)
    .unwrap_or(false);
  let image = container.config.and_then(|c| c.image).unwrap_or_default();

  let mut published_ports = Vec::new();
  if let Some(network_settings) = container.network_settings {
    if let Some(ports) = network_settings.ports {
      for (container_port, bindings) in ports {
        let Some(container_port) = container_port.split('/').next().and_then(|p| p.parse::<u16>().ok())
        else {
          continue;
        };
        for binding in bindings.unwrap_or_default() {
          if let Some(host_port) = binding.host_port.and_then(|p| p.parse::<u16>().ok()) {
            published_ports.push((host_port, container_port));
          }
        }
      }
    }
  }

  Ok(ContainerInspect {
    container_id: container.id.unwrap_or_else(|| id.to_string()),
    running,
    image,
    published_ports,
  })
}

pub async fn container_logs(_docker: &Docker, id: &str, tail: usize) -> Result<String, DriverError> {
  let command = format!(
    "docker logs --tail {tail} {}",
    shell_escape::escape(id.into())
  );
  let output = async_run_command(&command).await;
  Ok(format!("{}{}", output.stdout, output.stderr))
}

pub async fn ensure_network(
  _docker: &Docker,
  name: &str,
  options: &NetworkOptions,
) -> Result<(), DriverError> {
  let inspect = async_run_command(&format!(
    "docker network inspect {}",
    shell_escape::escape(name.into())
  ))
  .await;
  if inspect.success() {
    return Ok(());
  }
  let mut command = format!("docker network create --driver {}", options.driver);
  if options.internal {
    command.push_str(" --internal");
  }
  command.push(' ');
  command.push_str(&shell_escape::escape(name.into()));
  let output = async_run_command(&command).await;
  if output.success() {
    Ok(())
  } else {
    Err(shell_err("docker network create", &output.stderr))
  }
}

pub async fn attach(_docker: &Docker, container: &str, network: &str) -> Result<(), DriverError> {
  let command = format!(
    "docker network connect {} {}",
    shell_escape::escape(network.into()),
    shell_escape::escape(container.into())
  );
  let output = async_run_command(&command).await;
  if output.success() || output.stderr.contains("already exists") {
    Ok(())
  } else {
    Err(shell_err("docker network connect", &output.stderr))
  }
}

pub async fn query_container_state(docker: &Docker, name: &str) -> Result<serde_json::Value, DriverError> {
  match inspect_container(docker, name).await {
    Ok(inspect) => Ok(serde_json::json!({
      "running": inspect.running,
      "image": inspect.image,
      "published_ports": inspect.published_ports,
    })),
    Err(DriverError::NotFound(_)) => Ok(serde_json::Value::Null),
    Err(e) => Err(e),
  }
}

/// Parses `docker stats --no-stream --format "{{.MemUsage}}"`-style single
/// field readouts (teacher's `get_container_stats` in `stats.rs`).
async fn stats_field(id: &str, format: &str) -> Result<String, DriverError> {
  let command = format!(
    "docker stats --no-stream --format \"{format}\" {}",
    shell_escape::escape(id.into())
  );
  let output = async_run_command(&command).await;
  if output.success() {
    Ok(output.stdout.trim().to_string())
  } else {
    Err(shell_err("docker stats", &output.stderr))
  }
}

pub async fn container_memory_mb(docker: &Docker, id: &str) -> Result<f64, DriverError> {
  let _ = docker;
  let raw = stats_field(id, "{{.MemUsage}}").await?;
  let used = raw.split('/').next().unwrap_or("").trim();
  parse_size_mb(used).ok_or_else(|| DriverError::Unavailable(format!("unparseable MemUsage: {used}")))
}

pub async fn container_cpu_percent(docker: &Docker, id: &str) -> Result<f64, DriverError> {
  let _ = docker;
  let raw = stats_field(id, "{{.CPUPerc}}").await?;
  raw
    .trim_end_matches('%')
    .parse::<f64>()
    .map_err(|_| DriverError::Unavailable(format!("unparseable CPUPerc: {raw}")))
}

fn parse_size_mb(value: &str) -> Option<f64> {
  let value = value.trim();
  let split_at = value.find(|c: char| !c.is_ascii_digit() && c != '.')?;
  let (number, unit) = value.split_at(split_at);
  let number: f64 = number.parse().ok()?;
  let factor = match unit.trim() {
    "B" => 1.0 / 1_048_576.0,
    "KiB" => 1.0 / 1024.0,
    "MiB" => 1.0,
    "GiB" => 1024.0,
    "TiB" => 1024.0 * 1024.0,
    _ => return None,
  };
  Some(number * factor)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_mebibyte_reading() {
    assert_eq!(parse_size_mb("512MiB"), Some(512.0));
  }

  #[test]
  fn parses_gibibyte_reading() {
    assert_eq!(parse_size_mb("1.5GiB"), Some(1536.0));
  }
}
