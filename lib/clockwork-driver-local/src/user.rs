use clockwork_driver::{DriverError, UserDeploySpec};
use run_command::async_run_command;

pub async fn ensure_user(spec: &UserDeploySpec) -> Result<(), DriverError> {
  let exists = async_run_command(&format!("id -u {}", spec.name)).await.success();
  if exists {
    return Ok(());
  }
  let mut command = String::from("useradd");
  if spec.system {
    command.push_str(" --system");
  }
  if let Some(home) = &spec.home {
    command.push_str(&format!(" --home-dir {home} --create-home"));
  }
  if let Some(group) = &spec.group {
    command.push_str(&format!(" --gid {group}"));
  }
  command.push_str(&format!(" --shell {}", spec.shell));
  command.push(' ');
  command.push_str(&spec.name);

  let output = async_run_command(&command).await;
  if output.success() {
    Ok(())
  } else {
    Err(DriverError::Unavailable(format!(
      "useradd {}: {}",
      spec.name,
      output.stderr.trim()
    )))
  }
}

pub async fn remove_user(name: &str) -> Result<(), DriverError> {
  let output = async_run_command(&format!("userdel -r {name}")).await;
  if output.success() || output.stderr.contains("does not exist") {
    Ok(())
  } else {
    Err(DriverError::Unavailable(format!(
      "userdel {name}: {}",
      output.stderr.trim()
    )))
  }
}
