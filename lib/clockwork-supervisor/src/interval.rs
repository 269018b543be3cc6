//! Per-kind health-check cadence (spec.md §9 "health-check intervals are a
//! hard-coded kind property, not global config"). A zero duration means
//! "check once, right after the first pass, then leave alone".

use std::time::Duration;

use clockwork_client::ResourceKind;

pub fn health_check_interval(kind: &ResourceKind, default_secs: u64) -> Duration {
  match kind {
    ResourceKind::File(_) => Duration::ZERO,
    ResourceKind::Container(_) => Duration::from_secs(30),
    ResourceKind::GitRepo(_) => Duration::from_secs(300),
    _ => Duration::from_secs(default_secs),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clockwork_client::{ContainerSpec, FileSpec};

  #[test]
  fn file_checks_only_once() {
    assert_eq!(health_check_interval(&ResourceKind::File(FileSpec::default()), 60), Duration::ZERO);
  }

  #[test]
  fn container_checks_every_thirty_seconds() {
    assert_eq!(
      health_check_interval(&ResourceKind::Container(ContainerSpec::new("x")), 60),
      Duration::from_secs(30)
    );
  }

  #[test]
  fn blank_falls_back_to_configured_default() {
    assert_eq!(health_check_interval(&ResourceKind::Blank, 45), Duration::from_secs(45));
  }
}
