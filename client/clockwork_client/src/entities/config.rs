use serde::{Deserialize, Serialize};

use super::logger::LogConfig;

/// Recognized Clockwork configuration, per spec.md §6 "Configuration".
/// Loaded from environment (common prefix `CLOCKWORK_`), overridable from CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockworkConfig {
  #[serde(default)]
  pub api_key: String,
  #[serde(default = "default_model")]
  pub model: String,
  #[serde(default)]
  pub base_url: String,

  #[serde(default = "default_completion_max_retries")]
  pub completion_max_retries: u32,
  #[serde(default = "default_check_interval")]
  pub service_check_interval_default: u64,
  #[serde(default = "default_max_remediation_attempts")]
  pub service_max_remediation_attempts: u32,
  #[serde(default = "default_deploy_parallelism")]
  pub deploy_parallelism: usize,
  #[serde(default = "default_assertion_timeout")]
  pub assertion_default_timeout: u64,
  #[serde(default = "default_grace_period")]
  pub supervisor_grace_period: u64,

  #[serde(default)]
  pub logging: LogConfig,
}

fn default_model() -> String {
  "default".to_string()
}
fn default_completion_max_retries() -> u32 {
  3
}
fn default_check_interval() -> u64 {
  60
}
fn default_max_remediation_attempts() -> u32 {
  3
}
fn default_deploy_parallelism() -> usize {
  4
}
fn default_assertion_timeout() -> u64 {
  10
}
fn default_grace_period() -> u64 {
  5
}

impl Default for ClockworkConfig {
  fn default() -> Self {
    Self {
      api_key: String::new(),
      model: default_model(),
      base_url: String::new(),
      completion_max_retries: default_completion_max_retries(),
      service_check_interval_default: default_check_interval(),
      service_max_remediation_attempts: default_max_remediation_attempts(),
      deploy_parallelism: default_deploy_parallelism(),
      assertion_default_timeout: default_assertion_timeout(),
      supervisor_grace_period: default_grace_period(),
      logging: Default::default(),
    }
  }
}

/// Environment-variable view of [`ClockworkConfig`], parsed via `envy` with prefix
/// `CLOCKWORK_`. Mirrors the teacher's periphery `Env` struct shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Env {
  pub clockwork_config_paths: Vec<String>,
  pub clockwork_config_keywords: Vec<String>,
  pub clockwork_merge_nested_config: Option<bool>,
  pub clockwork_extend_config_arrays: Option<bool>,

  pub clockwork_api_key: Option<String>,
  pub clockwork_model: Option<String>,
  pub clockwork_base_url: Option<String>,
  pub clockwork_completion_max_retries: Option<u32>,
  pub clockwork_service_check_interval_default: Option<u64>,
  pub clockwork_service_max_remediation_attempts: Option<u32>,
  pub clockwork_deploy_parallelism: Option<usize>,
  pub clockwork_assertion_default_timeout: Option<u64>,
  pub clockwork_supervisor_grace_period: Option<u64>,
}
