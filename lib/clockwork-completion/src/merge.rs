//! Per-kind merge rule: "user value wins, else LLM value, else null"
//! (spec.md §4.3 step e, §8 testable property), plus the schema hints that
//! tell the LLM which fields it's being asked to fill.

use clockwork_client::{ConnectionKind, ResourceKind};
use serde_json::{json, Value};

fn str_field(value: &Value, key: &str) -> Option<String> {
  value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(value: &Value, key: &str) -> Option<bool> {
  value.get(key).and_then(Value::as_bool)
}

fn str_vec_field(value: &Value, key: &str) -> Option<Vec<String>> {
  value.get(key).and_then(Value::as_array).map(|arr| {
    arr
      .iter()
      .filter_map(Value::as_str)
      .map(str::to_string)
      .collect()
  })
}

/// Merges `llm` into `kind` in place, only where the existing field is
/// `None`/unset. Never overwrites a user-provided value.
pub fn merge_kind_fields(kind: &mut ResourceKind, llm: &Value) {
  match kind {
    ResourceKind::Container(c) => {
      if c.image.is_none() {
        c.image = str_field(llm, "image");
      }
      if c.ports.is_empty() {
        if let Some(ports) = str_vec_field(llm, "ports") {
          c.ports = ports;
        }
      }
    }
    ResourceKind::File(f) => {
      if f.content.is_none() {
        f.content = str_field(llm, "content");
      }
    }
    ResourceKind::Directory(_) => {}
    ResourceKind::GitRepo(g) => {
      if g.repo_url.is_none() {
        g.repo_url = str_field(llm, "repo_url");
      }
      if g.dest.is_none() {
        g.dest = str_field(llm, "dest");
      }
      if g.branch.is_none() {
        g.branch = str_field(llm, "branch").or_else(|| Some("main".to_string()));
      }
    }
    ResourceKind::User(_) => {}
    ResourceKind::BrewPackage(b) => {
      if b.packages.is_none() || b.packages.as_ref().is_some_and(Vec::is_empty) {
        if let Some(packages) = str_vec_field(llm, "packages") {
          b.packages = Some(packages);
        }
      }
    }
    ResourceKind::Blank => {}
  }
  let _ = bool_field;
}

pub fn kind_needs_completion(kind: &ResourceKind) -> bool {
  match kind {
    ResourceKind::Container(c) => c.image.is_none(),
    ResourceKind::File(f) => f.content.is_none(),
    ResourceKind::Directory(_) => false,
    ResourceKind::GitRepo(g) => g.repo_url.is_none() || g.dest.is_none() || g.branch.is_none(),
    ResourceKind::User(_) => false,
    ResourceKind::BrewPackage(b) => {
      b.packages.is_none() || b.packages.as_ref().is_some_and(Vec::is_empty)
    }
    ResourceKind::Blank => false,
  }
}

/// A plain JSON-shape hint (not a formal JSON Schema document — the
/// workspace carries no `schemars` dependency) naming the nullable fields
/// the LLM is being asked to fill for this kind.
pub fn kind_schema_hint(kind: &ResourceKind) -> Value {
  match kind {
    ResourceKind::Container(_) => json!({
      "type": "object",
      "fields": {"name": "string", "image": "string", "ports": "array<string>"}
    }),
    ResourceKind::File(_) => json!({
      "type": "object",
      "fields": {"name": "string", "content": "string"}
    }),
    ResourceKind::Directory(_) => json!({"type": "object", "fields": {"name": "string"}}),
    ResourceKind::GitRepo(_) => json!({
      "type": "object",
      "fields": {"name": "string", "repo_url": "string", "dest": "string", "branch": "string"}
    }),
    ResourceKind::User(_) => json!({"type": "object", "fields": {"name": "string"}}),
    ResourceKind::BrewPackage(_) => json!({
      "type": "object",
      "fields": {"name": "string", "packages": "array<string>"}
    }),
    ResourceKind::Blank => json!({"type": "object", "fields": {"name": "string"}}),
  }
}

pub fn merge_connection_fields(kind: &mut ConnectionKind, llm: &Value) {
  match kind {
    ConnectionKind::Dependency => {}
    ConnectionKind::Database(d) => {
      if d.connection_string_template.is_none() {
        d.connection_string_template = str_field(llm, "connection_string_template");
      }
      if d.username.is_none() {
        d.username = str_field(llm, "username");
      }
      if d.password.is_none() {
        d.password = str_field(llm, "password");
      }
      if d.database_name.is_none() {
        d.database_name = str_field(llm, "database_name");
      }
    }
    ConnectionKind::Network(_) => {}
    ConnectionKind::File(f) => {
      if f.mount_path.is_none() {
        f.mount_path = str_field(llm, "mount_path");
      }
      if f.source_path.is_none() && f.volume_name.is_none() {
        f.source_path = str_field(llm, "source_path");
        f.volume_name = str_field(llm, "volume_name");
      }
    }
    ConnectionKind::ServiceMesh(s) => {
      if s.port.is_none() {
        s.port = llm.get("port").and_then(Value::as_u64).map(|p| p as u16);
      }
    }
  }
}

pub fn connection_schema_hint(kind: &ConnectionKind) -> Value {
  match kind {
    ConnectionKind::Dependency => json!({"type": "object", "fields": {}}),
    ConnectionKind::Database(_) => json!({
      "type": "object",
      "fields": {
        "connection_string_template": "string",
        "username": "string",
        "password": "string",
        "database_name": "string"
      }
    }),
    ConnectionKind::Network(_) => json!({"type": "object", "fields": {}}),
    ConnectionKind::File(_) => json!({
      "type": "object",
      "fields": {"mount_path": "string", "source_path": "string", "volume_name": "string"}
    }),
    ConnectionKind::ServiceMesh(_) => json!({"type": "object", "fields": {"port": "integer"}}),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clockwork_client::FileSpec;

  #[test]
  fn user_value_wins_over_llm_value() {
    let mut kind = ResourceKind::File(FileSpec {
      content: Some("user wrote this".to_string()),
      ..Default::default()
    });
    merge_kind_fields(&mut kind, &json!({"content": "llm would write this"}));
    match kind {
      ResourceKind::File(f) => assert_eq!(f.content.as_deref(), Some("user wrote this")),
      _ => unreachable!(),
    }
  }

  #[test]
  fn llm_value_fills_null_field() {
    let mut kind = ResourceKind::File(FileSpec::default());
    merge_kind_fields(&mut kind, &json!({"content": "generated"}));
    assert!(!kind_needs_completion(&kind));
  }

  #[test]
  fn still_incomplete_when_llm_omits_field() {
    let mut kind = ResourceKind::File(FileSpec::default());
    merge_kind_fields(&mut kind, &json!({}));
    assert!(kind_needs_completion(&kind));
  }
}
