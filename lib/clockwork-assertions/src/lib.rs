//! Assertion runner: each [`AssertionSpec`] compiles to a pure check that
//! returns `(ok, detail)` within its configured timeout (spec.md §4.2, "L1").

use std::time::Duration;

use clockwork_client::{AssertionKind, AssertionOutcome, AssertionSpec, Protocol};
use clockwork_driver::Driver;

/// Run a single assertion against `driver`, honoring its configured timeout.
pub async fn run(assertion: &AssertionKind, driver: &dyn Driver) -> AssertionOutcome {
  let timeout = Duration::from_secs(assertion.timeout_secs);
  match tokio::time::timeout(timeout, evaluate(&assertion.spec, driver)).await {
    Ok(outcome) => outcome,
    Err(_) => AssertionOutcome::timed_out(&assertion.spec.to_string(), assertion.timeout_secs),
  }
}

async fn evaluate(spec: &AssertionSpec, driver: &dyn Driver) -> AssertionOutcome {
  match spec {
    AssertionSpec::FileExists { path } => match driver.file_exists(path).await {
      Ok(true) => AssertionOutcome::ok(format!("{path} exists")),
      Ok(false) => AssertionOutcome::fail(format!("{path} does not exist")),
      Err(e) => AssertionOutcome::fail(format!("checking {path}: {e}")),
    },

    AssertionSpec::FileContentMatches {
      path,
      pattern,
      sha256,
    } => file_content_matches(driver, path, pattern.as_deref(), sha256.as_deref()).await,

    AssertionSpec::PortAccessible {
      host,
      port,
      protocol,
    } => port_accessible(driver, host, *port, *protocol).await,

    AssertionSpec::Healthcheck {
      url,
      expected_status,
    } => healthcheck(driver, url, *expected_status).await,

    AssertionSpec::ProcessRunning { name, min_count } => {
      match driver.process_count(name).await {
        Ok(count) if count >= *min_count => {
          AssertionOutcome::ok(format!("{count} process(es) matching {name}"))
        }
        Ok(count) => AssertionOutcome::fail(format!(
          "only {count} process(es) matching {name}, need >= {min_count}"
        )),
        Err(e) => AssertionOutcome::fail(format!("counting processes {name}: {e}")),
      }
    }

    AssertionSpec::ProcessNotRunning { name } => match driver.process_count(name).await {
      Ok(0) => AssertionOutcome::ok(format!("no processes matching {name}")),
      Ok(count) => AssertionOutcome::fail(format!("{count} process(es) matching {name} still running")),
      Err(e) => AssertionOutcome::fail(format!("counting processes {name}: {e}")),
    },

    AssertionSpec::ContainerRunning { container } => {
      match driver.inspect_container(container).await {
        Ok(inspect) if inspect.running => {
          AssertionOutcome::ok(format!("{container} is running"))
        }
        Ok(_) => AssertionOutcome::fail(format!("{container} is not running")),
        Err(e) => AssertionOutcome::fail(format!("inspecting {container}: {e}")),
      }
    }

    AssertionSpec::MemoryUsage { max_mb, container } => {
      match driver.memory_usage_mb(container.as_deref()).await {
        Ok(used) if used <= *max_mb as f64 => {
          AssertionOutcome::ok(format!("memory usage {used:.1}MB <= {max_mb}MB"))
        }
        Ok(used) => AssertionOutcome::fail(format!("memory usage {used:.1}MB > {max_mb}MB")),
        Err(e) => AssertionOutcome::fail(format!("reading memory usage: {e}")),
      }
    }

    AssertionSpec::CpuUsage {
      max_percent,
      container,
    } => match driver.cpu_usage_percent(container.as_deref()).await {
      Ok(used) if used <= *max_percent => {
        AssertionOutcome::ok(format!("cpu usage {used:.1}% <= {max_percent}%"))
      }
      Ok(used) => AssertionOutcome::fail(format!("cpu usage {used:.1}% > {max_percent}%")),
      Err(e) => AssertionOutcome::fail(format!("reading cpu usage: {e}")),
    },

    AssertionSpec::DiskUsage {
      path,
      max_percent,
      max_mb,
    } => disk_usage(driver, path, *max_percent, *max_mb).await,
  }
}

async fn file_content_matches(
  driver: &dyn Driver,
  path: &str,
  pattern: Option<&str>,
  sha256: Option<&str>,
) -> AssertionOutcome {
  let bytes = match driver.read_file(path).await {
    Ok(bytes) => bytes,
    Err(e) => return AssertionOutcome::fail(format!("reading {path}: {e}")),
  };

  if let Some(pattern) = pattern {
    let re = match regex::Regex::new(pattern) {
      Ok(re) => re,
      Err(e) => return AssertionOutcome::fail(format!("invalid pattern {pattern:?}: {e}")),
    };
    let content = String::from_utf8_lossy(&bytes);
    return if re.is_match(&content) {
      AssertionOutcome::ok(format!("{path} matches pattern {pattern:?}"))
    } else {
      AssertionOutcome::fail(format!("{path} does not match pattern {pattern:?}"))
    };
  }

  if let Some(expected) = sha256 {
    use sha2::Digest;
    let digest = hex::encode(sha2::Sha256::digest(&bytes));
    return if digest.eq_ignore_ascii_case(expected) {
      AssertionOutcome::ok(format!("{path} matches digest {expected}"))
    } else {
      AssertionOutcome::fail(format!("{path} digest {digest} != expected {expected}"))
    };
  }

  // Constructor-level validation (invariant: exactly one of pattern/sha256)
  // should have already ruled this out.
  AssertionOutcome::fail("neither pattern nor sha256 set")
}

async fn port_accessible(
  driver: &dyn Driver,
  host: &str,
  port: u16,
  protocol: Protocol,
) -> AssertionOutcome {
  let probe_timeout = Duration::from_secs(5);
  let result = match protocol {
    Protocol::Tcp => driver.tcp_probe(host, port, probe_timeout).await,
    Protocol::Udp => driver.udp_probe(host, port, probe_timeout).await,
  };
  match result {
    Ok(true) => AssertionOutcome::ok(format!("{host}:{port}/{protocol} accessible")),
    Ok(false) => AssertionOutcome::fail(format!("{host}:{port}/{protocol} not accessible")),
    Err(e) => AssertionOutcome::fail(format!("probing {host}:{port}/{protocol}: {e}")),
  }
}

async fn healthcheck(driver: &dyn Driver, url: &str, expected_status: u16) -> AssertionOutcome {
  match driver.http_get(url, Duration::from_secs(10)).await {
    Ok(status) if status == expected_status => {
      AssertionOutcome::ok(format!("{url} returned {status}"))
    }
    Ok(status) => AssertionOutcome::fail(format!(
      "{url} returned {status}, expected {expected_status}"
    )),
    Err(e) => AssertionOutcome::fail(format!("GET {url}: {e}")),
  }
}

async fn disk_usage(
  driver: &dyn Driver,
  path: &str,
  max_percent: Option<f64>,
  max_mb: Option<u64>,
) -> AssertionOutcome {
  let reading = match driver.disk_usage(path).await {
    Ok(reading) => reading,
    Err(e) => return AssertionOutcome::fail(format!("reading disk usage for {path}: {e}")),
  };

  if let Some(max_percent) = max_percent {
    if reading.used_percent > max_percent {
      return AssertionOutcome::fail(format!(
        "{path} at {:.1}% > {max_percent}%",
        reading.used_percent
      ));
    }
  }
  if let Some(max_mb) = max_mb {
    if reading.used_mb > max_mb {
      return AssertionOutcome::fail(format!("{path} at {}MB > {max_mb}MB", reading.used_mb));
    }
  }
  AssertionOutcome::ok(format!(
    "{path} at {:.1}% / {}MB within bounds",
    reading.used_percent, reading.used_mb
  ))
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use clockwork_client::AssertionSpec;
  use clockwork_driver::{
    CommandOutput, ContainerDeploySpec, ContainerHandle, ContainerInspect, DiskUsageReading,
    DriverError, NetworkOptions, UserDeploySpec,
  };
  use std::collections::HashMap;

  #[derive(Default)]
  struct FakeDriver {
    files: HashMap<String, Vec<u8>>,
    process_counts: HashMap<String, usize>,
  }

  #[async_trait]
  impl Driver for FakeDriver {
    async fn ensure_container(
      &self,
      _spec: &ContainerDeploySpec,
    ) -> Result<ContainerHandle, DriverError> {
      unimplemented!()
    }
    async fn stop_container(&self, _id: &str) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn remove_container(&self, _id: &str) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn inspect_container(&self, _id: &str) -> Result<ContainerInspect, DriverError> {
      Err(DriverError::NotFound(_id.to_string()))
    }
    async fn container_logs(&self, _id: &str, _tail: usize) -> Result<String, DriverError> {
      unimplemented!()
    }
    async fn write_file(
      &self,
      _path: &str,
      _contents: &[u8],
      _mode: &str,
      _owner: Option<&str>,
      _group: Option<&str>,
    ) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn remove_file(&self, _path: &str) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn ensure_dir(
      &self,
      _path: &str,
      _mode: &str,
      _owner: Option<&str>,
      _group: Option<&str>,
      _recursive: bool,
    ) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn file_exists(&self, path: &str) -> Result<bool, DriverError> {
      Ok(self.files.contains_key(path))
    }
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, DriverError> {
      self
        .files
        .get(path)
        .cloned()
        .ok_or_else(|| DriverError::NotFound(path.to_string()))
    }
    async fn run_command(
      &self,
      _argv: &[String],
      _env: &[clockwork_client::EnvironmentVar],
      _cwd: Option<&str>,
      _timeout: std::time::Duration,
    ) -> Result<CommandOutput, DriverError> {
      unimplemented!()
    }
    async fn tcp_probe(
      &self,
      _host: &str,
      _port: u16,
      _timeout: std::time::Duration,
    ) -> Result<bool, DriverError> {
      Ok(true)
    }
    async fn udp_probe(
      &self,
      _host: &str,
      _port: u16,
      _timeout: std::time::Duration,
    ) -> Result<bool, DriverError> {
      Ok(true)
    }
    async fn http_get(&self, _url: &str, _timeout: std::time::Duration) -> Result<u16, DriverError> {
      Ok(200)
    }
    async fn ensure_user(&self, _spec: &UserDeploySpec) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn remove_user(&self, _name: &str) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn ensure_package(
      &self,
      _name: &str,
      _cask: bool,
      _present: bool,
      _update: bool,
    ) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn ensure_git_clone(
      &self,
      _url: &str,
      _branch: Option<&str>,
      _dest: &str,
      _pull: bool,
    ) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn ensure_network(&self, _name: &str, _options: &NetworkOptions) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn attach(&self, _container: &str, _network: &str) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn query_state(
      &self,
      _resource_kind: &str,
      _name: &str,
    ) -> Result<serde_json::Value, DriverError> {
      unimplemented!()
    }
    async fn process_count(&self, name: &str) -> Result<usize, DriverError> {
      Ok(self.process_counts.get(name).copied().unwrap_or(0))
    }
    async fn memory_usage_mb(&self, _container: Option<&str>) -> Result<f64, DriverError> {
      Ok(10.0)
    }
    async fn cpu_usage_percent(&self, _container: Option<&str>) -> Result<f64, DriverError> {
      Ok(5.0)
    }
    async fn disk_usage(&self, _path: &str) -> Result<DiskUsageReading, DriverError> {
      Ok(DiskUsageReading {
        used_percent: 40.0,
        used_mb: 4096,
      })
    }
  }

  #[tokio::test]
  async fn file_exists_reports_ok_and_missing() {
    let mut driver = FakeDriver::default();
    driver.files.insert("/etc/hosts".into(), b"127.0.0.1".to_vec());
    let outcome = evaluate(
      &AssertionSpec::FileExists {
        path: "/etc/hosts".into(),
      },
      &driver,
    )
    .await;
    assert!(outcome.ok);

    let outcome = evaluate(
      &AssertionSpec::FileExists {
        path: "/missing".into(),
      },
      &driver,
    )
    .await;
    assert!(!outcome.ok);
  }

  #[tokio::test]
  async fn file_content_matches_regex() {
    let mut driver = FakeDriver::default();
    driver
      .files
      .insert("/app/config.yml".into(), b"version: 2.0".to_vec());
    let outcome = evaluate(
      &AssertionSpec::FileContentMatches {
        path: "/app/config.yml".into(),
        pattern: Some("version: \\d".into()),
        sha256: None,
      },
      &driver,
    )
    .await;
    assert!(outcome.ok, "{}", outcome.detail);
  }

  #[tokio::test]
  async fn file_content_matches_sha256() {
    use sha2::Digest;
    let mut driver = FakeDriver::default();
    let content = b"exact bytes".to_vec();
    let digest = hex::encode(sha2::Sha256::digest(&content));
    driver.files.insert("/app/bin".into(), content);
    let outcome = evaluate(
      &AssertionSpec::FileContentMatches {
        path: "/app/bin".into(),
        pattern: None,
        sha256: Some(digest),
      },
      &driver,
    )
    .await;
    assert!(outcome.ok, "{}", outcome.detail);
  }

  #[tokio::test]
  async fn process_running_respects_min_count() {
    let mut driver = FakeDriver::default();
    driver.process_counts.insert("nginx".into(), 2);
    let outcome = evaluate(
      &AssertionSpec::ProcessRunning {
        name: "nginx".into(),
        min_count: 3,
      },
      &driver,
    )
    .await;
    assert!(!outcome.ok);
  }

  #[tokio::test]
  async fn disk_usage_requires_both_bounds_when_set() {
    let driver = FakeDriver::default();
    let outcome = evaluate(
      &AssertionSpec::DiskUsage {
        path: "/".into(),
        max_percent: Some(50.0),
        max_mb: Some(100),
      },
      &driver,
    )
    .await;
    // used_percent=40 <= 50 ok, but used_mb=4096 > 100 fails.
    assert!(!outcome.ok);
  }

  #[tokio::test]
  async fn numeric_assertion_missing_measurement_is_failure() {
    let driver = FakeDriver::default();
    let outcome = evaluate(
      &AssertionSpec::ContainerRunning {
        container: "absent".into(),
      },
      &driver,
    )
    .await;
    assert!(!outcome.ok);
  }
}
