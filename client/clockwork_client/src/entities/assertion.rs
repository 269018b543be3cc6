use serde::{Deserialize, Serialize};

/// A named predicate evaluated against a deployed resource (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionKind {
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  pub spec: AssertionSpec,
}

fn default_timeout_secs() -> u64 {
  10
}

#[derive(Debug, Clone, Serialize, Deserialize, strum::Display)]
pub enum AssertionSpec {
  FileExists { path: String },
  FileContentMatches {
    path: String,
    pattern: Option<String>,
    sha256: Option<String>,
  },
  PortAccessible {
    #[serde(default = "default_host")]
    host: String,
    port: u16,
    protocol: Protocol,
  },
  Healthcheck {
    url: String,
    #[serde(default = "default_status")]
    expected_status: u16,
  },
  ProcessRunning {
    name: String,
    #[serde(default = "default_min_count")]
    min_count: usize,
  },
  ProcessNotRunning { name: String },
  ContainerRunning { container: String },
  MemoryUsage {
    max_mb: u64,
    container: Option<String>,
  },
  CpuUsage {
    max_percent: f64,
    container: Option<String>,
  },
  DiskUsage {
    path: String,
    max_percent: Option<f64>,
    max_mb: Option<u64>,
  },
}

fn default_host() -> String {
  "localhost".to_string()
}
fn default_status() -> u16 {
  200
}
fn default_min_count() -> usize {
  1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
  Tcp,
  Udp,
}

#[derive(Debug, thiserror::Error)]
pub enum AssertionConstructError {
  #[error(
    "FileContentMatches must set exactly one of `pattern` or `sha256`, got {0}"
  )]
  PatternXorDigest(&'static str),
  #[error("DiskUsage must set at least one of `max_percent` or `max_mb`")]
  DiskUsageNoLimit,
}

impl AssertionKind {
  pub fn new(
    timeout_secs: u64,
    spec: AssertionSpec,
  ) -> Result<Self, AssertionConstructError> {
    spec.validate()?;
    Ok(AssertionKind { timeout_secs, spec })
  }
}

impl AssertionSpec {
  pub fn validate(&self) -> Result<(), AssertionConstructError> {
    match self {
      AssertionSpec::FileContentMatches { pattern, sha256, .. } => {
        match (pattern.is_some(), sha256.is_some()) {
          (true, true) => Err(AssertionConstructError::PatternXorDigest("both set")),
          (false, false) => {
            Err(AssertionConstructError::PatternXorDigest("neither set"))
          }
          _ => Ok(()),
        }
      }
      AssertionSpec::DiskUsage {
        max_percent, max_mb, ..
      } => {
        if max_percent.is_none() && max_mb.is_none() {
          Err(AssertionConstructError::DiskUsageNoLimit)
        } else {
          Ok(())
        }
      }
      _ => Ok(()),
    }
  }
}

/// The outcome of running a single assertion (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionOutcome {
  pub ok: bool,
  pub detail: String,
}

impl AssertionOutcome {
  pub fn ok(detail: impl Into<String>) -> Self {
    AssertionOutcome {
      ok: true,
      detail: detail.into(),
    }
  }

  pub fn fail(detail: impl Into<String>) -> Self {
    AssertionOutcome {
      ok: false,
      detail: detail.into(),
    }
  }

  pub fn timed_out(label: &str, timeout_secs: u64) -> Self {
    AssertionOutcome {
      ok: false,
      detail: format!("{label} timed out after {timeout_secs}s"),
    }
  }
}
