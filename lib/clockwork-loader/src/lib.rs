//! Loads a user-authored resource file (YAML or JSON) into a
//! [`ResourceGraph`] (spec.md §3.3 "Created" lifecycle stage).
//!
//! This is the one piece of "HCL-style configuration parsing" spec.md §1
//! explicitly keeps outside the reconciliation core — a thin, serde-driven
//! shell that both `bin/clockwork` and `bin/clockwork_core` call into so
//! neither binary duplicates the resource-file format. Unlike the
//! teacher's own `.toml`/`.yaml` build-definition files, a Clockwork
//! resource file declares a forest of typed resources whose `connections`
//! reference siblings by `name` rather than by array index — this loader's
//! only job is resolving those names into [`ResourceId`]s once, at load
//! time, exactly as the graph engine expects them.

use std::path::Path;

use clockwork_client::{
  AssertionConstructError, AssertionKind, Connection, ConnectionKind, ResourceGraph, ResourceId,
  ResourceKind, ResourceNode,
};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
  #[error("reading {0:?}: {1}")]
  Io(std::path::PathBuf, std::io::Error),
  #[error("parsing {0:?}: {1}")]
  Parse(std::path::PathBuf, serde_yaml_ng::Error),
  #[error("connection target {0:?} does not match any named resource in this file")]
  UnknownConnectionTarget(String),
  #[error(
    "resource at {0} has connections but no `name`; connection targets are resolved by name \
     at load time, so a connected resource must be named in the file"
  )]
  UnnamedConnectionSource(String),
  #[error("resource {0:?} declares an invalid assertion: {1}")]
  InvalidAssertion(String, AssertionConstructError),
}

/// The on-disk shape of one resource. Mirrors [`ResourceNode`] but drops the
/// arena-index bookkeeping (`id`, `parent`) that only exists once the
/// resource is inserted into a [`ResourceGraph`], and resolves
/// `connections[].to` from a resource name instead of a [`ResourceId`].
#[derive(Debug, Deserialize)]
pub struct ResourceDef {
  pub name: Option<String>,
  pub description: Option<String>,
  #[serde(flatten)]
  pub kind: ResourceKind,
  #[serde(default)]
  pub assertions: Vec<AssertionKind>,
  #[serde(default)]
  pub tools: Vec<String>,
  #[serde(default)]
  pub connections: Vec<ConnectionDef>,
  #[serde(default)]
  pub children: Vec<ResourceDef>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionDef {
  /// The name of the resource this connection points to, resolved against
  /// every resource declared in the same file (spec.md §4.4).
  pub to: String,
  pub description: Option<String>,
  #[serde(flatten)]
  pub kind: ConnectionKind,
}

/// Parses `path` as YAML (a superset of JSON, so `.json` files load too)
/// into the on-disk [`ResourceDef`] forest.
pub fn parse_file(path: &Path, contents: &str) -> Result<Vec<ResourceDef>, LoadError> {
  serde_yaml_ng::from_str(contents).map_err(|e| LoadError::Parse(path.to_path_buf(), e))
}

pub async fn read_and_parse(path: &Path) -> Result<Vec<ResourceDef>, LoadError> {
  let contents = tokio::fs::read_to_string(path)
    .await
    .map_err(|e| LoadError::Io(path.to_path_buf(), e))?;
  parse_file(path, &contents)
}

/// Builds a [`ResourceGraph`] from a parsed resource forest, returning the
/// graph plus the root [`ResourceId`]s in file order (spec.md §4.1 `roots`).
///
/// Two passes: the first inserts every node (recursing into `children` and
/// wiring parent/child via [`ResourceGraph::reparent`]) and records a
/// name→id map; the second resolves every [`ConnectionDef::to`] against
/// that map and pushes the resolved [`Connection`] onto its `from` node.
pub fn build_graph(defs: Vec<ResourceDef>) -> Result<(ResourceGraph, Vec<ResourceId>), LoadError> {
  let mut graph = ResourceGraph::new();
  let mut names: std::collections::HashMap<String, ResourceId> = std::collections::HashMap::new();
  // (resource id, its declared connections, awaiting name resolution)
  let mut pending: Vec<(ResourceId, Vec<ConnectionDef>)> = Vec::new();

  let mut roots = Vec::new();
  for def in defs {
    let id = insert_def(&mut graph, def, None, &mut names, &mut pending)?;
    roots.push(id);
  }

  for (from, conns) in pending {
    for conn in conns {
      let to = names
        .get(&conn.to)
        .copied()
        .ok_or_else(|| LoadError::UnknownConnectionTarget(conn.to.clone()))?;
      let resolved = Connection {
        from,
        to,
        description: conn.description,
        setup_resources: Vec::new(),
        kind: conn.kind,
      };
      graph
        .get_mut(from)
        .expect("just inserted")
        .connections
        .push(resolved);
    }
  }

  Ok((graph, roots))
}

fn insert_def(
  graph: &mut ResourceGraph,
  def: ResourceDef,
  parent: Option<ResourceId>,
  names: &mut std::collections::HashMap<String, ResourceId>,
  pending: &mut Vec<(ResourceId, Vec<ConnectionDef>)>,
) -> Result<ResourceId, LoadError> {
  if !def.connections.is_empty() && def.name.is_none() {
    return Err(LoadError::UnnamedConnectionSource(
      def.description.clone().unwrap_or_else(|| "<unnamed>".to_string()),
    ));
  }
  for assertion in &def.assertions {
    assertion.spec.validate().map_err(|e| {
      LoadError::InvalidAssertion(
        def.name.clone().unwrap_or_else(|| "<unnamed>".to_string()),
        e,
      )
    })?;
  }

  let ResourceDef {
    name,
    description,
    kind,
    assertions,
    tools,
    connections,
    children,
  } = def;

  let id = graph.insert(|id| ResourceNode {
    id,
    name: name.clone(),
    description,
    assertions,
    tools,
    connections: Vec::new(),
    children: Vec::new(),
    parent,
    kind,
  });

  if let Some(name) = name {
    names.insert(name, id);
  }
  if !connections.is_empty() {
    pending.push((id, connections));
  }
  if let Some(parent) = parent {
    graph.get_mut(parent).expect("parent already inserted").children.push(id);
  }

  for child in children {
    insert_def(graph, child, Some(id), names, pending)?;
  }

  Ok(id)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn loads_linear_dependency_chain() {
    let yaml = r#"
- name: db
  kind: Container
  spec:
    image: postgres:15
- name: api
  kind: Container
  spec:
    image: api:latest
  connections:
    - to: db
      kind: Dependency
"#;
    let defs = parse_file(Path::new("test.yaml"), yaml).unwrap();
    let (graph, roots) = build_graph(defs).unwrap();
    assert_eq!(roots.len(), 2);
    let api = graph
      .iter()
      .find(|n| n.name.as_deref() == Some("api"))
      .unwrap();
    assert_eq!(api.connections.len(), 1);
    let db = graph
      .iter()
      .find(|n| n.name.as_deref() == Some("db"))
      .unwrap();
    assert_eq!(api.connections[0].to, db.id);
  }

  #[test]
  fn unresolved_connection_target_is_an_error() {
    let yaml = r#"
- name: api
  kind: Container
  spec:
    image: api:latest
  connections:
    - to: ghost
      kind: Dependency
"#;
    let defs = parse_file(Path::new("test.yaml"), yaml).unwrap();
    let err = build_graph(defs).unwrap_err();
    assert!(matches!(err, LoadError::UnknownConnectionTarget(t) if t == "ghost"));
  }

  #[test]
  fn rejects_assertion_with_both_pattern_and_sha256() {
    let yaml = r#"
- name: cfg
  kind: File
  spec:
    content: "hi"
  assertions:
    - spec:
        FileContentMatches:
          path: /etc/cfg
          pattern: "hi"
          sha256: "deadbeef"
"#;
    let defs = parse_file(Path::new("test.yaml"), yaml).unwrap();
    let err = build_graph(defs).unwrap_err();
    assert!(matches!(err, LoadError::InvalidAssertion(name, _) if name == "cfg"));
  }

  #[test]
  fn nested_children_are_reparented() {
    let yaml = r#"
- name: stack
  kind: Blank
  children:
    - name: web
      kind: Container
      spec:
        image: nginx:latest
"#;
    let defs = parse_file(Path::new("test.yaml"), yaml).unwrap();
    let (graph, roots) = build_graph(defs).unwrap();
    assert_eq!(roots.len(), 1);
    let stack = graph.get(roots[0]).unwrap();
    assert_eq!(stack.children.len(), 1);
    let web = graph.get(stack.children[0]).unwrap();
    assert_eq!(web.parent, Some(roots[0]));
  }
}
