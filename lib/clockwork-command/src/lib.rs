//! Shell-out helper shared by drivers: runs a command, captures stdout /
//! stderr / exit status into a [`Log`], and stamps start/end timestamps.
//! Mirrors the teacher's `run_komodo_command` helper, generalized for the
//! Driver's `run_command` operation (spec.md §4.5) instead of a build
//! pipeline's fixed stage list.

use std::{path::Path, time::Duration};

use clockwork_client::{clockwork_timestamp, Log};
use run_command::{async_run_command, CommandOutput};

/// Runs `command` (optionally `cd`-ing into `path` first) to completion and
/// wraps the result in a [`Log`] tagged with `stage`.
pub async fn run_clockwork_command(
  stage: &str,
  path: impl Into<Option<&Path>>,
  command: impl AsRef<str>,
) -> Log {
  let command = if let Some(path) = path.into() {
    format!("cd {} && {}", path.display(), command.as_ref())
  } else {
    command.as_ref().to_string()
  };
  let start_ts = clockwork_timestamp();
  let output = async_run_command(&command).await;
  output_into_log(stage, command, start_ts, output)
}

/// Same as [`run_clockwork_command`], but bounded by `timeout` — used by the
/// Driver's `run_command` operation, which the core always calls with an
/// explicit timeout (spec.md §4.5).
pub async fn run_clockwork_command_timeout(
  stage: &str,
  path: impl Into<Option<&Path>>,
  command: impl AsRef<str>,
  timeout: Duration,
) -> Log {
  let path = path.into();
  match tokio::time::timeout(
    timeout,
    run_clockwork_command(stage, path, command.as_ref()),
  )
  .await
  {
    Ok(log) => log,
    Err(_) => Log {
      stage: stage.to_string(),
      command: command.as_ref().to_string(),
      stdout: String::new(),
      stderr: format!("command timed out after {timeout:?}"),
      success: false,
      start_ts: clockwork_timestamp(),
      end_ts: clockwork_timestamp(),
    },
  }
}

pub fn output_into_log(
  stage: &str,
  command: String,
  start_ts: i64,
  output: CommandOutput,
) -> Log {
  let success = output.success();
  Log {
    stage: stage.to_string(),
    stdout: output.stdout,
    stderr: output.stderr,
    command,
    success,
    start_ts,
    end_ts: clockwork_timestamp(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn captures_stdout_on_success() {
    let log = run_clockwork_command("echo", None, "echo hello").await;
    assert!(log.success);
    assert!(log.stdout.contains("hello"));
  }

  #[tokio::test]
  async fn captures_failure() {
    let log = run_clockwork_command("false", None, "exit 3").await;
    assert!(!log.success);
  }

  #[tokio::test]
  async fn times_out() {
    let log = run_clockwork_command_timeout(
      "sleep",
      None,
      "sleep 5",
      Duration::from_millis(50),
    )
    .await;
    assert!(!log.success);
    assert!(log.stderr.contains("timed out"));
  }
}
