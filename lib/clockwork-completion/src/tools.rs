//! Default tool bindings per resource kind, plus user-declared tools and
//! keyword-triggered additions (spec.md §4.3 step c).

use clockwork_client::{ResourceKind, ResourceNode};

pub struct ToolSelector;

impl ToolSelector {
  /// Starts from the kind's default tool set, appends anything the resource
  /// declared explicitly, appends `web_search` when the description mentions
  /// a recognizable image/package registry term, and dedups while
  /// preserving first-seen order.
  pub fn select(node: &ResourceNode) -> Vec<String> {
    let mut tools: Vec<String> = match &node.kind {
      ResourceKind::Container(_) => vec!["registry_lookup".to_string()],
      ResourceKind::File(_) => vec!["filesystem".to_string()],
      ResourceKind::GitRepo(_) => vec!["web_search".to_string()],
      ResourceKind::BrewPackage(_) => vec!["package_index".to_string()],
      ResourceKind::Directory(_) | ResourceKind::User(_) | ResourceKind::Blank => Vec::new(),
    };
    tools.extend(node.tools.iter().cloned());

    if let Some(description) = &node.description {
      let lower = description.to_lowercase();
      if (lower.contains("latest") || lower.contains("recommended"))
        && !tools.iter().any(|t| t == "web_search")
      {
        tools.push("web_search".to_string());
      }
    }

    let mut seen = std::collections::HashSet::new();
    tools.retain(|t| seen.insert(t.clone()));
    tools
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clockwork_client::{FileSpec, ResourceId};

  fn node(kind: ResourceKind, description: Option<&str>) -> ResourceNode {
    ResourceNode {
      id: ResourceId(0),
      name: None,
      description: description.map(str::to_string),
      assertions: Vec::new(),
      tools: Vec::new(),
      connections: Vec::new(),
      children: Vec::new(),
      parent: None,
      kind,
    }
  }

  #[test]
  fn file_gets_filesystem_tool_by_default() {
    let n = node(ResourceKind::File(FileSpec::default()), None);
    assert_eq!(ToolSelector::select(&n), vec!["filesystem".to_string()]);
  }

  #[test]
  fn keyword_triggers_web_search_addition() {
    let n = node(
      ResourceKind::File(FileSpec::default()),
      Some("use the latest nginx config style"),
    );
    let tools = ToolSelector::select(&n);
    assert!(tools.contains(&"web_search".to_string()));
    assert!(tools.contains(&"filesystem".to_string()));
  }
}
