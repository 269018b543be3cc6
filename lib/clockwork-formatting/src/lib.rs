//! Terminal color/summary helpers shared by the applier and the CLI
//! (spec.md §7 "`apply` prints a terraform-style summary"). Generalizes the
//! teacher's HTML `<span>`-based formatting helpers into ANSI terminal
//! output via `colored`, since Clockwork has no web UI in the core.

use colored::Colorize;

pub fn muted(content: impl std::fmt::Display) -> String {
  content.to_string().dimmed().to_string()
}

pub fn bold(content: impl std::fmt::Display) -> String {
  content.to_string().bold().to_string()
}

pub enum Color {
  Red,
  Green,
  Yellow,
  Blue,
}

pub fn colored(content: impl std::fmt::Display, color: Color) -> String {
  let content = content.to_string();
  match color {
    Color::Red => content.red().to_string(),
    Color::Green => content.green().to_string(),
    Color::Yellow => content.yellow().to_string(),
    Color::Blue => content.blue().to_string(),
  }
}

/// One line of a resource's outcome in an `apply`/`plan`/`destroy` summary.
pub enum ResourceLine<'a> {
  Deployed(&'a str),
  Skipped(&'a str, &'a str),
  Failed(&'a str, &'a str),
  AssertionFailed(&'a str, &'a str),
}

impl std::fmt::Display for ResourceLine<'_> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ResourceLine::Deployed(name) => {
        write!(f, "  {} {name}", colored("+", Color::Green))
      }
      ResourceLine::Skipped(name, reason) => {
        write!(
          f,
          "  {} {name} {}",
          colored("~", Color::Yellow),
          muted(format!("(skipped: {reason})"))
        )
      }
      ResourceLine::Failed(name, detail) => {
        write!(f, "  {} {name} {}", colored("x", Color::Red), muted(detail))
      }
      ResourceLine::AssertionFailed(name, detail) => {
        write!(f, "  {} {name} {}", colored("!", Color::Red), muted(detail))
      }
    }
  }
}

/// Build the terraform-style header line, e.g.
/// "Plan: 3 to add, 1 to skip, 0 to fail.".
pub fn plan_header(added: usize, skipped: usize, failed: usize) -> String {
  format!(
    "{}: {} to add, {} to skip, {} to fail.",
    bold("Plan"),
    added,
    skipped,
    failed
  )
}

pub fn format_error(label: &str, error: &(dyn std::error::Error + 'static)) -> String {
  format!("{}: {label}: {error}", colored("ERROR", Color::Red))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_reports_counts() {
    let header = plan_header(3, 1, 0);
    assert!(header.contains("3 to add"));
    assert!(header.contains("1 to skip"));
    assert!(header.contains("0 to fail"));
  }
}
