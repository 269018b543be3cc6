use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::assertion::AssertionKind;
use super::connection::Connection;
use super::ids::ResourceId;
use super::log::EnvironmentVar;

/// A tagged variant over the concrete resource kinds (spec.md §3.1, §9).
///
/// Every place the original Python source dispatched on `self.__class__.__name__`
/// is replaced here by a match on this tag.
#[derive(Debug, Clone, Serialize, Deserialize, strum::Display, strum::EnumIs)]
#[serde(tag = "kind", content = "spec")]
pub enum ResourceKind {
  Container(ContainerSpec),
  File(FileSpec),
  Directory(DirectorySpec),
  GitRepo(GitRepoSpec),
  User(UserSpec),
  BrewPackage(BrewPackageSpec),
  Blank,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
  pub image: Option<String>,
  #[serde(default)]
  pub ports: Vec<String>,
  #[serde(default)]
  pub volumes: Vec<String>,
  #[serde(default)]
  pub env_vars: Vec<EnvironmentVar>,
  #[serde(default)]
  pub networks: Vec<String>,
  #[serde(default = "default_true")]
  pub present: bool,
  #[serde(default = "default_true")]
  pub start: bool,
}

fn default_true() -> bool {
  true
}

impl ContainerSpec {
  pub fn new(image: impl Into<String>) -> Self {
    ContainerSpec {
      image: Some(image.into()),
      present: true,
      start: true,
      ..Default::default()
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSpec {
  /// If set, completion is skipped (exactly one of content/description is
  /// populated at construction time, per invariant I8).
  pub content: Option<String>,
  pub path: Option<String>,
  pub directory: Option<String>,
  #[serde(default = "default_file_mode")]
  pub mode: String,
  #[serde(default = "default_true")]
  pub present: bool,
}

fn default_file_mode() -> String {
  "644".to_string()
}

impl FileSpec {
  /// Resolve the effective write target: `path` overrides `directory + name`.
  pub fn resolve_path(&self, name: Option<&str>) -> Option<String> {
    if let Some(path) = &self.path {
      return Some(path.clone());
    }
    match (&self.directory, name) {
      (Some(dir), Some(name)) => {
        Some(format!("{}/{}", dir.trim_end_matches('/'), name))
      }
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySpec {
  pub path: String,
  #[serde(default = "default_dir_mode")]
  pub mode: String,
  pub user: Option<String>,
  pub group: Option<String>,
  #[serde(default = "default_true")]
  pub present: bool,
  #[serde(default = "default_true")]
  pub recursive: bool,
}

fn default_dir_mode() -> String {
  "755".to_string()
}

impl Default for DirectorySpec {
  fn default() -> Self {
    DirectorySpec {
      path: String::new(),
      mode: default_dir_mode(),
      user: None,
      group: None,
      present: true,
      recursive: true,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitRepoSpec {
  pub repo_url: Option<String>,
  pub dest: Option<String>,
  pub branch: Option<String>,
  #[serde(default = "default_true")]
  pub pull: bool,
  #[serde(default = "default_true")]
  pub present: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSpec {
  pub home: Option<String>,
  #[serde(default = "default_shell")]
  pub shell: String,
  pub group: Option<String>,
  #[serde(default = "default_true")]
  pub present: bool,
  #[serde(default)]
  pub system: bool,
}

fn default_shell() -> String {
  "/bin/bash".to_string()
}

impl Default for UserSpec {
  fn default() -> Self {
    UserSpec {
      home: None,
      shell: default_shell(),
      group: None,
      present: true,
      system: false,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrewPackageSpec {
  pub packages: Option<Vec<String>>,
  #[serde(default)]
  pub cask: bool,
  #[serde(default)]
  pub update: bool,
  #[serde(default = "default_true")]
  pub present: bool,
}

/// One node in the resource forest (spec.md §3.1, §9 arena redesign).
///
/// `parent`/`children` are plain [`ResourceId`] indices into the owning
/// [`ResourceGraph`], never owning references, so the composite tree cannot
/// form a reference cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
  pub id: ResourceId,
  pub name: Option<String>,
  pub description: Option<String>,
  #[serde(default)]
  pub assertions: Vec<AssertionKind>,
  /// Opaque tool handles forwarded to the LLM (e.g. "web_search", "filesystem").
  #[serde(default)]
  pub tools: Vec<String>,
  #[serde(default)]
  pub connections: Vec<Connection>,
  #[serde(default)]
  pub children: Vec<ResourceId>,
  pub parent: Option<ResourceId>,
  pub kind: ResourceKind,
}

impl ResourceNode {
  /// spec.md §3.1/§9: monotone completion check, no class-name inspection.
  pub fn needs_completion(&self) -> bool {
    if self.name.is_none() {
      return true;
    }
    match &self.kind {
      ResourceKind::Container(c) => c.image.is_none(),
      ResourceKind::File(f) => f.content.is_none(),
      ResourceKind::Directory(_) => false,
      ResourceKind::GitRepo(g) => {
        g.repo_url.is_none() || g.dest.is_none() || g.branch.is_none()
      }
      ResourceKind::User(_) => false,
      ResourceKind::BrewPackage(b) => {
        b.packages.is_none() || b.packages.as_ref().is_some_and(Vec::is_empty)
      }
      ResourceKind::Blank => false,
    }
  }

  /// spec.md §3.1 `connection_context()`: the shareable fields other
  /// resources' completion prompts can read.
  pub fn connection_context(&self) -> Map<String, Value> {
    let mut ctx = Map::new();
    ctx.insert("name".into(), Value::from(self.name.clone()));
    ctx.insert("kind".into(), Value::from(self.kind.to_string()));
    ctx.insert(
      "description".into(),
      Value::from(self.description.clone()),
    );
    match &self.kind {
      ResourceKind::Container(c) => {
        ctx.insert("image".into(), Value::from(c.image.clone()));
        ctx.insert(
          "ports".into(),
          Value::from(c.ports.clone()),
        );
      }
      ResourceKind::File(f) => {
        ctx.insert(
          "path".into(),
          Value::from(f.resolve_path(self.name.as_deref())),
        );
      }
      ResourceKind::Directory(d) => {
        ctx.insert("path".into(), Value::from(d.path.clone()));
      }
      ResourceKind::GitRepo(g) => {
        ctx.insert("dest".into(), Value::from(g.dest.clone()));
        ctx.insert("branch".into(), Value::from(g.branch.clone()));
      }
      ResourceKind::User(u) => {
        ctx.insert("home".into(), Value::from(u.home.clone()));
      }
      ResourceKind::BrewPackage(b) => {
        ctx.insert(
          "packages".into(),
          Value::from(b.packages.clone().unwrap_or_default()),
        );
      }
      ResourceKind::Blank => {}
    }
    ctx
  }

  pub fn env_vars_mut(&mut self) -> Option<&mut Vec<EnvironmentVar>> {
    match &mut self.kind {
      ResourceKind::Container(c) => Some(&mut c.env_vars),
      _ => None,
    }
  }
}

/// Arena-backed forest of [`ResourceNode`]s plus their [`Connection`]-derived
/// edges. Owned by the planner/applier/supervisor in common (spec.md §2 "L4").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGraph {
  nodes: Vec<ResourceNode>,
}

impl ResourceGraph {
  pub fn new() -> Self {
    Self { nodes: Vec::new() }
  }

  pub fn insert(&mut self, build: impl FnOnce(ResourceId) -> ResourceNode) -> ResourceId {
    let id = ResourceId(self.nodes.len() as u32);
    self.nodes.push(build(id));
    id
  }

  pub fn get(&self, id: ResourceId) -> Option<&ResourceNode> {
    self.nodes.get(id.0 as usize)
  }

  pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut ResourceNode> {
    self.nodes.get_mut(id.0 as usize)
  }

  /// Two independent mutable borrows into the arena, for connection setup
  /// steps that need to mutate both endpoints (e.g. injecting env vars into
  /// `from` while reading `to`'s resolved name/port). Panics if `a == b`;
  /// callers should special-case self-connections before calling this.
  pub fn get_pair_mut(
    &mut self,
    a: ResourceId,
    b: ResourceId,
  ) -> (Option<&mut ResourceNode>, Option<&mut ResourceNode>) {
    assert_ne!(a, b, "get_pair_mut requires distinct resource ids");
    let (lo, hi) = if a.0 < b.0 { (a, b) } else { (b, a) };
    let (left, right) = self.nodes.split_at_mut(hi.0 as usize);
    let lo_ref = left.get_mut(lo.0 as usize);
    let hi_ref = right.get_mut(0);
    if a.0 < b.0 {
      (lo_ref, hi_ref)
    } else {
      (hi_ref, lo_ref)
    }
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &ResourceNode> {
    self.nodes.iter()
  }

  pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
    self.nodes.iter().map(|n| n.id)
  }

  /// Dict-like child lookup by name, replacing the Python `ChildrenCollection`
  /// (spec.md §3.1 supplement) without a live reference-holding wrapper.
  pub fn child_by_name(&self, parent: ResourceId, name: &str) -> Option<ResourceId> {
    let parent = self.get(parent)?;
    parent
      .children
      .iter()
      .copied()
      .find(|&child_id| self.get(child_id).and_then(|n| n.name.as_deref()) == Some(name))
  }

  /// Re-parent `child` under `new_parent`, logging per invariant I3.
  pub fn reparent(&mut self, child: ResourceId, new_parent: ResourceId) {
    if let Some(node) = self.get(child) {
      if let Some(old_parent) = node.parent {
        if old_parent != new_parent {
          tracing::warn!(
            "resource {child} re-parented from {old_parent} to {new_parent}; \
             transferring ownership"
          );
          if let Some(old) = self.get_mut(old_parent) {
            old.children.retain(|&c| c != child);
          }
        }
      }
    }
    if let Some(parent_node) = self.get_mut(new_parent) {
      if !parent_node.children.contains(&child) {
        parent_node.children.push(child);
      }
    }
    if let Some(node) = self.get_mut(child) {
      node.parent = Some(new_parent);
    }
  }
}
