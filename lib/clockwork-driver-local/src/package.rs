use clockwork_driver::DriverError;
use run_command::async_run_command;

pub async fn ensure_package(name: &str, cask: bool, present: bool, update: bool) -> Result<(), DriverError> {
  if update {
    let output = async_run_command("brew update").await;
    if !output.success() {
      tracing::warn!("brew update failed: {}", output.stderr.trim());
    }
  }

  let cask_flag = if cask { " --cask" } else { "" };
  let command = if present {
    format!("brew install{cask_flag} {name}")
  } else {
    format!("brew uninstall{cask_flag} {name}")
  };
  let output = async_run_command(&command).await;
  if output.success() || output.stdout.contains("already installed") {
    Ok(())
  } else {
    Err(DriverError::Unavailable(format!(
      "brew {name}: {}",
      output.stderr.trim()
    )))
  }
}
