//! Prompt assembly: description plus already-provided fields plus upstream
//! connection context (spec.md §4.3 step b).

use clockwork_client::{Connection, ResourceGraph, ResourceNode};
use serde_json::json;

use crate::non_null_fields;

pub fn build_resource_prompt(node: &ResourceNode, graph: &ResourceGraph) -> String {
  let provided = non_null_fields(&json!(node.kind));
  let mut related = Vec::new();
  for &child in &node.children {
    if let Some(c) = graph.get(child) {
      related.push(c.connection_context());
    }
  }
  for conn in &node.connections {
    if let Some(to) = graph.get(conn.to) {
      related.push(to.connection_context());
    }
  }

  json!({
    "description": node.description,
    "already_provided": provided,
    "related_resources": related,
  })
  .to_string()
}

pub fn build_connection_prompt(conn: &Connection, graph: &ResourceGraph) -> String {
  let from = graph.get(conn.from).map(ResourceNode::connection_context);
  let to = graph.get(conn.to).map(ResourceNode::connection_context);
  json!({
    "description": conn.description,
    "from": from,
    "to": to,
  })
  .to_string()
}
