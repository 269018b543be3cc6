use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::ResourceId;

/// The durable side-effect handle a resource's `deploy` produced (spec.md
/// §4.6: "per-resource deploy outputs are recorded in a run-local map...
/// exposed to later resources via their connections' `get_connection_context()`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeployOutput {
  Container {
    container_id: String,
    /// `(host, container)` port pairs in publish order; connection setup
    /// reads index 0 for service-mesh port auto-discovery (spec.md §4.4).
    published_ports: Vec<(u16, u16)>,
  },
  File {
    path: String,
  },
  Directory {
    path: String,
  },
  GitRepo {
    dest: String,
    hash: Option<String>,
  },
  User {
    name: String,
  },
  BrewPackage {
    packages: Vec<String>,
  },
  Blank,
}

impl DeployOutput {
  pub fn container_id(&self) -> Option<&str> {
    match self {
      DeployOutput::Container { container_id, .. } => Some(container_id),
      _ => None,
    }
  }

  pub fn first_container_port(&self) -> Option<u16> {
    match self {
      DeployOutput::Container { published_ports, .. } => {
        published_ports.first().map(|(_, container)| *container)
      }
      _ => None,
    }
  }

  pub fn file_path(&self) -> Option<&str> {
    match self {
      DeployOutput::File { path } => Some(path),
      _ => None,
    }
  }
}

/// Run-local map of completed deploy outputs, keyed by resource identity.
pub type DeployOutputs = HashMap<ResourceId, DeployOutput>;
