//! Terraform-style summary rendering for `plan`/`apply`/`destroy` (spec.md §7).

use clockwork_formatting::{plan_header, ResourceLine};

use crate::{ApplyReport, Plan, PlannedAction};

pub fn render_plan(plan: &Plan) -> String {
  let mut added = 0;
  let mut skipped = 0;
  let failed = 0;
  let mut lines = String::new();
  for entry in &plan.entries {
    match entry.action {
      PlannedAction::Create => {
        added += 1;
        lines.push_str(&ResourceLine::Deployed(&entry.name).to_string());
        lines.push('\n');
      }
      PlannedAction::Destroy => {
        skipped += 1;
        lines.push_str(&ResourceLine::Skipped(&entry.name, "marked absent, will be destroyed").to_string());
        lines.push('\n');
      }
      PlannedAction::NoOp => {}
    }
  }
  lines.push_str(&plan_header(added, skipped, failed));
  lines
}

/// `apply_with_preskipped` records both genuine driver/completion failures
/// and "skipped due to failed dependency" entries (spec.md §4.7) in the same
/// `report.failed` map, distinguished only by this prefix on the reason
/// string; the summary renders them as separate categories, matching spec.md
/// §7 "distinguishing added, updated, failed, and skipped resources".
const SKIPPED_PREFIX: &str = "skipped: ";

pub fn render_apply_report(report: &ApplyReport, graph: &clockwork_client::ResourceGraph) -> String {
  let mut lines = String::new();
  let mut skipped_count = 0;
  let mut failed_count = 0;
  for &id in &report.deployed {
    let name = graph
      .get(id)
      .and_then(|n| n.name.clone())
      .unwrap_or_else(|| id.to_string());
    lines.push_str(&ResourceLine::Deployed(&name).to_string());
    lines.push('\n');
  }
  for (id, detail) in &report.failed {
    let name = graph
      .get(*id)
      .and_then(|n| n.name.clone())
      .unwrap_or_else(|| id.to_string());
    if let Some(reason) = detail.strip_prefix(SKIPPED_PREFIX) {
      skipped_count += 1;
      lines.push_str(&ResourceLine::Skipped(&name, reason).to_string());
    } else {
      failed_count += 1;
      lines.push_str(&ResourceLine::Failed(&name, detail).to_string());
    }
    lines.push('\n');
  }
  lines.push_str(&plan_header(report.deployed.len(), skipped_count, failed_count));
  lines
}

#[cfg(test)]
mod tests {
  use super::*;
  use clockwork_client::{ResourceGraph, ResourceId};

  #[test]
  fn plan_render_counts_create_and_destroy() {
    let plan = Plan {
      order: vec![ResourceId(0), ResourceId(1)],
      entries: vec![
        crate::PlanEntry { id: ResourceId(0), name: "a".into(), action: PlannedAction::Create },
        crate::PlanEntry { id: ResourceId(1), name: "b".into(), action: PlannedAction::Destroy },
      ],
    };
    let rendered = render_plan(&plan);
    assert!(rendered.contains("1 to add"));
    assert!(rendered.contains("1 to skip"));
  }

  #[test]
  fn apply_render_lists_failures() {
    let graph = ResourceGraph::new();
    let mut report = ApplyReport::default();
    report.failed.insert(ResourceId(0), "boom".to_string());
    let rendered = render_apply_report(&report, &graph);
    assert!(rendered.contains("boom"));
    assert!(rendered.contains("0 to add"));
    assert!(rendered.contains("0 to skip"));
    assert!(rendered.contains("1 to fail"));
  }

  #[test]
  fn apply_render_distinguishes_skipped_from_failed() {
    let graph = ResourceGraph::new();
    let mut report = ApplyReport::default();
    report.failed.insert(ResourceId(0), "boom".to_string());
    report.failed.insert(
      ResourceId(1),
      "skipped: depends on a resource that failed or was skipped".to_string(),
    );
    let rendered = render_apply_report(&report, &graph);
    assert!(rendered.contains("1 to skip"));
    assert!(rendered.contains("1 to fail"));
  }
}
