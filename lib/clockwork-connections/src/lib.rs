//! Connection engine: per-kind `setup(from, to, driver)` side effects and
//! ordering contributions (spec.md §4.4, "L3"). Connections are owned by
//! their `from` resource; `setup` runs after `to` has deployed (the graph
//! engine's `conn.to -> v` edge guarantees this) and before `from` deploys.

use std::{path::Path, time::Duration};

use clockwork_client::{
  Connection, ConnectionKind, DeployOutputs, EnvironmentVar, ResourceGraph, ResourceId,
  ResourceKind,
};
use clockwork_driver::{Driver, DriverError, NetworkOptions};

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
  #[error("connection endpoint {0} not found in graph")]
  MissingEndpoint(ResourceId),
  #[error("{kind} connection's `from` endpoint {from} has no env_vars list (not a Container)")]
  FromNotInjectable { kind: &'static str, from: ResourceId },
  #[error("FileConnection could not resolve a mount source: set one of source_path, a File-resource `to`, or volume_name")]
  UnresolvedFileSource,
  #[error("ServiceMeshConnection could not discover a port: `to` published no container ports and none was pre-set")]
  UnresolvedServiceMeshPort,
  #[error("timed out waiting for database at {host}:{port} to accept connections")]
  DatabaseNotReady { host: String, port: u16 },
  #[error("driver error during connection setup: {0}")]
  Driver(#[from] DriverError),
  #[error("reading migration/schema file {0:?}: {1}")]
  Io(std::path::PathBuf, std::io::Error),
}

/// Runs `conn`'s setup side effects. `conn` is expected to already have
/// passed completion (spec.md §4.4: "Every connection's `needs_completion()`
/// follows the same rule as resources... the Completer handles it before
/// `setup` runs").
pub async fn setup(
  conn: &mut Connection,
  graph: &mut ResourceGraph,
  outputs: &DeployOutputs,
  driver: &dyn Driver,
) -> Result<(), ConnectionError> {
  match &mut conn.kind {
    ConnectionKind::Dependency => Ok(()),
    ConnectionKind::Database(spec) => {
      setup_database(conn.from, conn.to, spec, graph, outputs, driver).await
    }
    ConnectionKind::Network(spec) => {
      setup_network(conn.from, conn.to, spec, graph, outputs, driver).await
    }
    ConnectionKind::File(spec) => setup_file(conn.from, conn.to, spec, graph, outputs),
    ConnectionKind::ServiceMesh(spec) => {
      setup_service_mesh(conn.from, conn.to, spec, graph, outputs)
    }
  }
}

fn resource_name(graph: &ResourceGraph, id: ResourceId) -> Result<String, ConnectionError> {
  graph
    .get(id)
    .and_then(|n| n.name.clone())
    .ok_or(ConnectionError::MissingEndpoint(id))
}

fn inject_env(
  graph: &mut ResourceGraph,
  target: ResourceId,
  kind: &'static str,
  var: impl Into<String>,
  value: impl Into<String>,
) -> Result<(), ConnectionError> {
  let node = graph
    .get_mut(target)
    .ok_or(ConnectionError::MissingEndpoint(target))?;
  let env_vars = node
    .env_vars_mut()
    .ok_or(ConnectionError::FromNotInjectable { kind, from: target })?;
  let var = var.into();
  if let Some(existing) = env_vars.iter_mut().find(|e| e.variable == var) {
    existing.value = value.into();
  } else {
    env_vars.push(EnvironmentVar::new(var, value));
  }
  Ok(())
}

async fn setup_database(
  from: ResourceId,
  to: ResourceId,
  spec: &mut clockwork_client::DatabaseConnectionSpec,
  graph: &mut ResourceGraph,
  outputs: &DeployOutputs,
  driver: &dyn Driver,
) -> Result<(), ConnectionError> {
  let host = resource_name(graph, to)?;
  let port = outputs
    .get(&to)
    .and_then(|o| o.first_container_port())
    .unwrap_or(5432);

  if spec.wait_for_ready {
    wait_for_ready(driver, &host, port, Duration::from_secs(spec.timeout_secs)).await?;
  }

  let username = spec.username.clone().unwrap_or_default();
  let password = spec.password.clone().unwrap_or_default();
  let database = spec.database_name.clone().unwrap_or_default();
  let connection_string = spec
    .connection_string_template
    .clone()
    .unwrap_or_else(|| {
      "postgresql://{user}:{pw}@{host}:{port}/{database}".to_string()
    })
    .replace("{user}", &username)
    .replace("{pw}", &password)
    .replace("{host}", &host)
    .replace("{port}", &port.to_string())
    .replace("{database}", &database);

  if let Some(schema_file) = spec.schema_file.clone() {
    apply_sql_file(driver, &connection_string, Path::new(&schema_file)).await?;
  }
  if let Some(migrations_dir) = spec.migrations_dir.clone() {
    apply_migrations(driver, &connection_string, Path::new(&migrations_dir)).await?;
  }

  inject_env(
    graph,
    from,
    "Database",
    spec.env_var_name.clone(),
    connection_string,
  )
}

async fn wait_for_ready(
  driver: &dyn Driver,
  host: &str,
  port: u16,
  timeout: Duration,
) -> Result<(), ConnectionError> {
  let deadline = tokio::time::Instant::now() + timeout;
  loop {
    if matches!(driver.tcp_probe(host, port, Duration::from_secs(2)).await, Ok(true)) {
      return Ok(());
    }
    if tokio::time::Instant::now() >= deadline {
      return Err(ConnectionError::DatabaseNotReady {
        host: host.to_string(),
        port,
      });
    }
    tokio::time::sleep(Duration::from_millis(250)).await;
  }
}

async fn apply_sql_file(
  driver: &dyn Driver,
  connection_string: &str,
  local_path: &Path,
) -> Result<(), ConnectionError> {
  let contents = tokio::fs::read(local_path)
    .await
    .map_err(|e| ConnectionError::Io(local_path.to_path_buf(), e))?;
  let remote_path = format!(
    "/tmp/clockwork-sql/{}",
    local_path.file_name().and_then(|n| n.to_str()).unwrap_or("migration.sql")
  );
  if let Some(dir) = Path::new(&remote_path).parent() {
    driver
      .ensure_dir(&dir.display().to_string(), "755", None, None, true)
      .await?;
  }
  driver.write_file(&remote_path, &contents, "644", None, None).await?;
  driver
    .run_command(
      &[
        "psql".to_string(),
        connection_string.to_string(),
        "-f".to_string(),
        remote_path.clone(),
      ],
      &[],
      None,
      Duration::from_secs(60),
    )
    .await?;
  let _ = driver.remove_file(&remote_path).await;
  Ok(())
}

/// Applies every file in `migrations_dir` in lexicographic order (spec.md §4.4).
/// The directory is read from the coordinator's own filesystem (where the
/// project file lives), not through the Driver — migrations ship alongside
/// the project definition, the same way the teacher reads build-time
/// artifacts locally before handing commands to periphery.
async fn apply_migrations(
  driver: &dyn Driver,
  connection_string: &str,
  migrations_dir: &Path,
) -> Result<(), ConnectionError> {
  let mut entries = tokio::fs::read_dir(migrations_dir)
    .await
    .map_err(|e| ConnectionError::Io(migrations_dir.to_path_buf(), e))?;
  let mut paths = Vec::new();
  while let Some(entry) = entries
    .next_entry()
    .await
    .map_err(|e| ConnectionError::Io(migrations_dir.to_path_buf(), e))?
  {
    if entry.path().is_file() {
      paths.push(entry.path());
    }
  }
  paths.sort();
  for path in paths {
    apply_sql_file(driver, connection_string, &path).await?;
  }
  Ok(())
}

async fn setup_network(
  from: ResourceId,
  to: ResourceId,
  spec: &mut clockwork_client::NetworkConnectionSpec,
  graph: &mut ResourceGraph,
  outputs: &DeployOutputs,
  driver: &dyn Driver,
) -> Result<(), ConnectionError> {
  if spec.create_network {
    driver
      .ensure_network(
        &spec.network_name,
        &NetworkOptions {
          driver: spec.driver.clone(),
          internal: spec.internal,
        },
      )
      .await?;
  }

  for endpoint in [from, to] {
    if let Some(container_id) = outputs.get(&endpoint).and_then(|o| o.container_id()) {
      driver.attach(container_id, &spec.network_name).await?;
    } else {
      tracing::debug!(
        "network connection endpoint {endpoint} is not a container; skipping attach"
      );
    }
  }

  let from_name = resource_name(graph, from)?;
  let to_name = resource_name(graph, to)?;
  inject_env(
    graph,
    from,
    "Network",
    format!("{}_HOST", to_name.to_uppercase()),
    to_name.clone(),
  )?;
  inject_env(
    graph,
    to,
    "Network",
    format!("{}_HOST", from_name.to_uppercase()),
    from_name,
  )?;
  Ok(())
}

fn setup_file(
  from: ResourceId,
  to: ResourceId,
  spec: &mut clockwork_client::FileConnectionSpec,
  graph: &mut ResourceGraph,
  outputs: &DeployOutputs,
) -> Result<(), ConnectionError> {
  let source = if let Some(source_path) = &spec.source_path {
    source_path.clone()
  } else if let Some(path) = outputs.get(&to).and_then(|o| o.file_path()) {
    path.to_string()
  } else if let Some(volume_name) = &spec.volume_name {
    volume_name.clone()
  } else {
    return Err(ConnectionError::UnresolvedFileSource);
  };

  let target = spec
    .mount_path
    .clone()
    .ok_or(ConnectionError::UnresolvedFileSource)?;
  let mount = if spec.read_only {
    format!("{source}:{target}:ro")
  } else {
    format!("{source}:{target}")
  };

  let node = graph
    .get_mut(from)
    .ok_or(ConnectionError::MissingEndpoint(from))?;
  match &mut node.kind {
    ResourceKind::Container(c) => {
      c.volumes.push(mount);
      Ok(())
    }
    _ => Err(ConnectionError::FromNotInjectable {
      kind: "File",
      from,
    }),
  }
}

fn setup_service_mesh(
  from: ResourceId,
  to: ResourceId,
  spec: &mut clockwork_client::ServiceMeshConnectionSpec,
  graph: &mut ResourceGraph,
  outputs: &DeployOutputs,
) -> Result<(), ConnectionError> {
  let port = match spec.port {
    Some(port) => port,
    None => {
      let discovered = outputs
        .get(&to)
        .and_then(|o| o.first_container_port())
        .ok_or(ConnectionError::UnresolvedServiceMeshPort)?;
      spec.port = Some(discovered);
      discovered
    }
  };

  let to_name = resource_name(graph, to)?;
  spec.service_name = Some(to_name.clone());

  inject_env(
    graph,
    from,
    "ServiceMesh",
    format!("{}_URL", to_name.to_uppercase()),
    format!("{}://{}:{}", spec.protocol, to_name, port),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use clockwork_client::{
    ContainerSpec, DatabaseConnectionSpec, DeployOutput, NetworkConnectionSpec, ResourceNode,
    ServiceMeshConnectionSpec,
  };
  use clockwork_driver::{
    CommandOutput, ContainerDeploySpec, ContainerHandle, ContainerInspect, DiskUsageReading,
    UserDeploySpec,
  };
  use std::collections::HashMap;
  use std::sync::Mutex;

  #[derive(Default)]
  struct FakeDriver {
    attached: Mutex<Vec<(String, String)>>,
    tcp_ok: bool,
  }

  #[async_trait]
  impl Driver for FakeDriver {
    async fn ensure_container(&self, _s: &ContainerDeploySpec) -> Result<ContainerHandle, DriverError> {
      unimplemented!()
    }
    async fn stop_container(&self, _id: &str) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn remove_container(&self, _id: &str) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn inspect_container(&self, _id: &str) -> Result<ContainerInspect, DriverError> {
      unimplemented!()
    }
    async fn container_logs(&self, _id: &str, _tail: usize) -> Result<String, DriverError> {
      unimplemented!()
    }
    async fn write_file(&self, _p: &str, _c: &[u8], _m: &str, _o: Option<&str>, _g: Option<&str>) -> Result<(), DriverError> {
      Ok(())
    }
    async fn remove_file(&self, _p: &str) -> Result<(), DriverError> {
      Ok(())
    }
    async fn ensure_dir(&self, _p: &str, _m: &str, _o: Option<&str>, _g: Option<&str>, _r: bool) -> Result<(), DriverError> {
      Ok(())
    }
    async fn file_exists(&self, _p: &str) -> Result<bool, DriverError> {
      unimplemented!()
    }
    async fn read_file(&self, _p: &str) -> Result<Vec<u8>, DriverError> {
      unimplemented!()
    }
    async fn run_command(&self, _a: &[String], _e: &[EnvironmentVar], _c: Option<&str>, _t: Duration) -> Result<CommandOutput, DriverError> {
      Ok(CommandOutput { exit_code: 0, stdout: String::new(), stderr: String::new() })
    }
    async fn tcp_probe(&self, _h: &str, _p: u16, _t: Duration) -> Result<bool, DriverError> {
      Ok(self.tcp_ok)
    }
    async fn udp_probe(&self, _h: &str, _p: u16, _t: Duration) -> Result<bool, DriverError> {
      Ok(true)
    }
    async fn http_get(&self, _u: &str, _t: Duration) -> Result<u16, DriverError> {
      unimplemented!()
    }
    async fn ensure_user(&self, _s: &UserDeploySpec) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn remove_user(&self, _n: &str) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn ensure_package(&self, _n: &str, _c: bool, _p: bool, _u: bool) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn ensure_git_clone(&self, _u: &str, _b: Option<&str>, _d: &str, _p: bool) -> Result<(), DriverError> {
      unimplemented!()
    }
    async fn ensure_network(&self, _n: &str, _o: &NetworkOptions) -> Result<(), DriverError> {
      Ok(())
    }
    async fn attach(&self, container: &str, network: &str) -> Result<(), DriverError> {
      self.attached.lock().unwrap().push((container.to_string(), network.to_string()));
      Ok(())
    }
    async fn query_state(&self, _k: &str, _n: &str) -> Result<serde_json::Value, DriverError> {
      unimplemented!()
    }
    async fn process_count(&self, _n: &str) -> Result<usize, DriverError> {
      unimplemented!()
    }
    async fn memory_usage_mb(&self, _c: Option<&str>) -> Result<f64, DriverError> {
      unimplemented!()
    }
    async fn cpu_usage_percent(&self, _c: Option<&str>) -> Result<f64, DriverError> {
      unimplemented!()
    }
    async fn disk_usage(&self, _p: &str) -> Result<DiskUsageReading, DriverError> {
      unimplemented!()
    }
  }

  fn container_node(id: ResourceId, name: &str) -> ResourceNode {
    ResourceNode {
      id,
      name: Some(name.to_string()),
      description: None,
      assertions: Vec::new(),
      tools: Vec::new(),
      connections: Vec::new(),
      children: Vec::new(),
      parent: None,
      kind: ResourceKind::Container(ContainerSpec::new("postgres:15")),
    }
  }

  #[tokio::test]
  async fn network_connection_injects_symmetric_hostnames() {
    let mut graph = ResourceGraph::new();
    let api = graph.insert(|id| container_node(id, "api"));
    let db = graph.insert(|id| container_node(id, "db"));
    let driver = FakeDriver { tcp_ok: true, ..Default::default() };
    let mut conn = Connection {
      from: api,
      to: db,
      description: None,
      setup_resources: Vec::new(),
      kind: ConnectionKind::Network(NetworkConnectionSpec {
        network_name: "app-net".into(),
        driver: "bridge".into(),
        create_network: true,
        internal: false,
      }),
    };
    let outputs = HashMap::new();
    setup(&mut conn, &mut graph, &outputs, &driver).await.unwrap();

    let api_node = graph.get(api).unwrap();
    assert!(matches!(&api_node.kind, ResourceKind::Container(c) if c.env_vars.iter().any(|e| e.variable == "DB_HOST" && e.value == "db")));
    let db_node = graph.get(db).unwrap();
    assert!(matches!(&db_node.kind, ResourceKind::Container(c) if c.env_vars.iter().any(|e| e.variable == "API_HOST" && e.value == "api")));
  }

  #[tokio::test]
  async fn database_connection_injects_formatted_url() {
    let mut graph = ResourceGraph::new();
    let api = graph.insert(|id| container_node(id, "api"));
    let db = graph.insert(|id| container_node(id, "db"));
    let driver = FakeDriver { tcp_ok: true, ..Default::default() };
    let mut conn = Connection {
      from: api,
      to: db,
      description: None,
      setup_resources: Vec::new(),
      kind: ConnectionKind::Database(DatabaseConnectionSpec {
        schema_file: None,
        migrations_dir: None,
        connection_string_template: Some(
          "postgresql://{user}:{pw}@{host}:{port}/{database}".into(),
        ),
        env_var_name: "DATABASE_URL".into(),
        username: Some("postgres".into()),
        password: Some("secret".into()),
        database_name: Some("app".into()),
        wait_for_ready: true,
        timeout_secs: 5,
      }),
    };
    let mut outputs = HashMap::new();
    outputs.insert(
      db,
      DeployOutput::Container {
        container_id: "dbid".into(),
        published_ports: vec![(5432, 5432)],
      },
    );
    setup(&mut conn, &mut graph, &outputs, &driver).await.unwrap();
    let api_node = graph.get(api).unwrap();
    let url = match &api_node.kind {
      ResourceKind::Container(c) => c
        .env_vars
        .iter()
        .find(|e| e.variable == "DATABASE_URL")
        .map(|e| e.value.clone()),
      _ => None,
    };
    assert_eq!(
      url.as_deref(),
      Some("postgresql://postgres:secret@db:5432/app")
    );
  }

  #[tokio::test]
  async fn service_mesh_discovers_port_from_deploy_output() {
    let mut graph = ResourceGraph::new();
    let api = graph.insert(|id| container_node(id, "api"));
    let svc = graph.insert(|id| container_node(id, "svc"));
    let driver = FakeDriver::default();
    let mut conn = Connection {
      from: api,
      to: svc,
      description: None,
      setup_resources: Vec::new(),
      kind: ConnectionKind::ServiceMesh(ServiceMeshConnectionSpec {
        protocol: "http".into(),
        health_check_path: "/health".into(),
        port: None,
        service_name: None,
      }),
    };
    let mut outputs = HashMap::new();
    outputs.insert(
      svc,
      DeployOutput::Container {
        container_id: "svcid".into(),
        published_ports: vec![(8080, 3000)],
      },
    );
    setup(&mut conn, &mut graph, &outputs, &driver).await.unwrap();
    match &conn.kind {
      ConnectionKind::ServiceMesh(s) => {
        assert_eq!(s.port, Some(3000));
        assert_eq!(s.service_name.as_deref(), Some("svc"));
      }
      _ => unreachable!(),
    }
  }
}
