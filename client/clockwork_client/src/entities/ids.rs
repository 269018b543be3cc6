use serde::{Deserialize, Serialize};

/// Arena index into a [`crate::resource::ResourceGraph`].
///
/// Indices are never reused within one graph's lifetime, which is what lets
/// `parent` be a plain index instead of an owning or cyclic reference (see
/// the composite-tree redesign note).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ResourceId(pub u32);

impl std::fmt::Display for ResourceId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{}", self.0)
  }
}
