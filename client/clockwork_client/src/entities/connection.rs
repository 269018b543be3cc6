use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::ResourceId;

/// A typed edge between two resources (spec.md §3.1, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
  pub from: ResourceId,
  pub to: ResourceId,
  pub description: Option<String>,
  /// Additional resources this connection creates as a side effect of
  /// `setup` (e.g. a virtual network object behind a NetworkConnection).
  #[serde(default)]
  pub setup_resources: Vec<ResourceId>,
  pub kind: ConnectionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, strum::Display, strum::EnumIs)]
#[serde(tag = "kind", content = "spec")]
pub enum ConnectionKind {
  /// Ordering only; `setup` is a no-op.
  Dependency,
  Database(DatabaseConnectionSpec),
  Network(NetworkConnectionSpec),
  File(FileConnectionSpec),
  ServiceMesh(ServiceMeshConnectionSpec),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConnectionSpec {
  pub schema_file: Option<String>,
  pub migrations_dir: Option<String>,
  /// Template using literal `{user}`, `{pw}`, `{host}`, `{port}`, `{database}`
  /// placeholders (spec.md §8 Scenario 3).
  pub connection_string_template: Option<String>,
  #[serde(default = "default_env_var_name")]
  pub env_var_name: String,
  pub username: Option<String>,
  pub password: Option<String>,
  pub database_name: Option<String>,
  #[serde(default = "default_true")]
  pub wait_for_ready: bool,
  #[serde(default = "default_db_timeout")]
  pub timeout_secs: u64,
}

fn default_env_var_name() -> String {
  "DATABASE_URL".to_string()
}
fn default_db_timeout() -> u64 {
  30
}
fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConnectionSpec {
  pub network_name: String,
  #[serde(default = "default_network_driver")]
  pub driver: String,
  #[serde(default = "default_true")]
  pub create_network: bool,
  #[serde(default)]
  pub internal: bool,
}

fn default_network_driver() -> String {
  "bridge".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConnectionSpec {
  pub mount_path: Option<String>,
  pub source_path: Option<String>,
  pub volume_name: Option<String>,
  #[serde(default)]
  pub create_volume: bool,
  #[serde(default = "default_volume_driver")]
  pub volume_driver: String,
  #[serde(default)]
  pub read_only: bool,
}

fn default_volume_driver() -> String {
  "local".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceMeshConnectionSpec {
  #[serde(default = "default_protocol")]
  pub protocol: String,
  #[serde(default = "default_health_path")]
  pub health_check_path: String,
  /// Discovered from `to`'s first published port; may be pre-set by the user.
  pub port: Option<u16>,
  /// Set to `to.name` by `setup`.
  pub service_name: Option<String>,
}

fn default_protocol() -> String {
  "http".to_string()
}
fn default_health_path() -> String {
  "/health".to_string()
}

impl Connection {
  /// Connections follow the same completion rule as resources: a
  /// `description` plus any still-null completable field means the
  /// Completer must run before `setup` (spec.md §4.4).
  pub fn needs_completion(&self) -> bool {
    if self.description.is_none() {
      return false;
    }
    match &self.kind {
      ConnectionKind::Dependency => false,
      ConnectionKind::Database(d) => {
        d.connection_string_template.is_none() || d.username.is_none()
      }
      ConnectionKind::Network(_) => false,
      ConnectionKind::File(f) => {
        f.mount_path.is_none()
          || (f.source_path.is_none() && f.volume_name.is_none())
      }
      ConnectionKind::ServiceMesh(s) => s.port.is_none(),
    }
  }

  pub fn connection_context(&self) -> Map<String, Value> {
    let mut ctx = Map::new();
    ctx.insert("kind".into(), Value::from(self.kind.to_string()));
    ctx.insert("from".into(), Value::from(self.from.to_string()));
    ctx.insert("to".into(), Value::from(self.to.to_string()));
    ctx
  }
}
