use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::resource::ResourceGraph;

/// A registered deployment, owned by the supervisor (spec.md §3.1, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
  pub id: Uuid,
  pub main_file: std::path::PathBuf,
  pub graph: ResourceGraph,
  pub registered_at: i64,
  /// Millisecond timestamp of the last health check dispatched for a
  /// resource, keyed by resource name.
  #[serde(default)]
  pub last_check: HashMap<String, i64>,
  #[serde(default)]
  pub health_status: HashMap<String, bool>,
  /// Per-resource remediation attempt count, bounded by
  /// `service_max_remediation_attempts` (invariant I7).
  #[serde(default)]
  pub remediation_attempts: HashMap<String, u32>,
  /// Resources that exhausted their remediation budget and are left failed
  /// until explicit re-registration.
  #[serde(default)]
  pub permanently_failed: std::collections::HashSet<String>,
}

impl Project {
  /// spec.md §5 `register`: fresh id, every named resource starts healthy
  /// with a zeroed attempt counter.
  pub fn register(main_file: std::path::PathBuf, graph: ResourceGraph, now: i64) -> Self {
    let mut health_status = HashMap::new();
    let mut remediation_attempts = HashMap::new();
    let mut last_check = HashMap::new();
    for node in graph.iter() {
      if let Some(name) = &node.name {
        health_status.insert(name.clone(), true);
        remediation_attempts.insert(name.clone(), 0);
        last_check.insert(name.clone(), 0);
      }
    }
    Project {
      id: Uuid::new_v4(),
      main_file,
      graph,
      registered_at: now,
      last_check,
      health_status,
      remediation_attempts,
      permanently_failed: std::collections::HashSet::new(),
    }
  }

  pub fn is_healthy(&self) -> bool {
    self.health_status.values().all(|&ok| ok)
      && self.permanently_failed.is_empty()
  }

  /// Returns `true` if `name` may still be remediated under
  /// `max_remediation_attempts` (invariant I7).
  pub fn can_remediate(&self, name: &str, max_remediation_attempts: u32) -> bool {
    if self.permanently_failed.contains(name) {
      return false;
    }
    self.remediation_attempts.get(name).copied().unwrap_or(0) < max_remediation_attempts
  }
}
