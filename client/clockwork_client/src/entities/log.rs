use serde::{Deserialize, Serialize};

/// Unix timestamp in milliseconds, matching the teacher's `komodo_timestamp`.
pub fn clockwork_timestamp() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

/// The captured result of running one shell stage (clone, on_clone, write_file, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
  pub stage: String,
  pub command: String,
  pub stdout: String,
  pub stderr: String,
  pub success: bool,
  pub start_ts: i64,
  pub end_ts: i64,
}

impl Log {
  pub fn simple(stage: impl Into<String>, stdout: impl Into<String>) -> Log {
    let ts = clockwork_timestamp();
    Log {
      stage: stage.into(),
      command: String::new(),
      stdout: stdout.into(),
      stderr: String::new(),
      success: true,
      start_ts: ts,
      end_ts: ts,
    }
  }

  pub fn error(stage: impl Into<String>, stderr: impl Into<String>) -> Log {
    let ts = clockwork_timestamp();
    Log {
      stage: stage.into(),
      command: String::new(),
      stdout: String::new(),
      stderr: stderr.into(),
      success: false,
      start_ts: ts,
      end_ts: ts,
    }
  }
}

pub fn all_logs_success(logs: &[Log]) -> bool {
  logs.iter().all(|log| log.success)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVar {
  pub variable: String,
  pub value: String,
}

impl EnvironmentVar {
  pub fn new(variable: impl Into<String>, value: impl Into<String>) -> Self {
    EnvironmentVar {
      variable: variable.into(),
      value: value.into(),
    }
  }
}
