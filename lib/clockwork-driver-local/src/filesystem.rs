//! Local filesystem + subprocess execution. `run_command` needs argv/env/cwd/
//! timeout control the `run_command` crate's shell-string helpers don't
//! offer, so this goes straight to `tokio::process::Command` (still the
//! same unified-under-tokio idiom as `clockwork-command`'s `async_run_command`
//! wrapper).

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use clockwork_client::EnvironmentVar;
use clockwork_driver::{CommandOutput, DriverError};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

pub async fn write_file(
  path: &str,
  contents: &[u8],
  mode: &str,
  owner: Option<&str>,
  group: Option<&str>,
) -> Result<(), DriverError> {
  if let Some(parent) = Path::new(path).parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .map_err(|e| io_err("create parent dir", path, e))?;
  }
  tokio::fs::write(path, contents)
    .await
    .map_err(|e| io_err("write file", path, e))?;
  apply_mode(path, mode).await?;
  apply_owner(path, owner, group).await?;
  Ok(())
}

pub async fn remove_file(path: &str) -> Result<(), DriverError> {
  match tokio::fs::remove_file(path).await {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(io_err("remove file", path, e)),
  }
}

pub async fn ensure_dir(
  path: &str,
  mode: &str,
  owner: Option<&str>,
  group: Option<&str>,
  recursive: bool,
) -> Result<(), DriverError> {
  if recursive {
    tokio::fs::create_dir_all(path)
      .await
      .map_err(|e| io_err("create dir", path, e))?;
  } else {
    match tokio::fs::create_dir(path).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
      Err(e) => return Err(io_err("create dir", path, e)),
    }
  }
  apply_mode(path, mode).await?;
  apply_owner(path, owner, group).await?;
  Ok(())
}

pub async fn file_exists(path: &str) -> Result<bool, DriverError> {
  Ok(tokio::fs::metadata(path).await.is_ok())
}

pub async fn read_file(path: &str) -> Result<Vec<u8>, DriverError> {
  tokio::fs::read(path).await.map_err(|e| io_err("read file", path, e))
}

pub async fn query_path_state(path: &str) -> Result<serde_json::Value, DriverError> {
  match tokio::fs::metadata(path).await {
    Ok(meta) => Ok(serde_json::json!({
      "exists": true,
      "is_dir": meta.is_dir(),
      "len": meta.len(),
    })),
    Err(_) => Ok(serde_json::json!({"exists": false})),
  }
}

pub async fn run_command(
  argv: &[String],
  env: &[EnvironmentVar],
  cwd: Option<&str>,
  timeout: Duration,
) -> Result<CommandOutput, DriverError> {
  let Some((program, args)) = argv.split_first() else {
    return Err(DriverError::Unavailable("empty command".to_string()));
  };
  let mut command = Command::new(program);
  command.args(args);
  command.stdout(Stdio::piped());
  command.stderr(Stdio::piped());
  for var in env {
    command.env(&var.variable, &var.value);
  }
  if let Some(cwd) = cwd {
    command.current_dir(cwd);
  }

  let mut child = command
    .spawn()
    .map_err(|e| DriverError::Unavailable(format!("spawn {program}: {e}")))?;

  let mut stdout_pipe = child.stdout.take();
  let mut stderr_pipe = child.stderr.take();

  let run = async {
    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some(pipe) = stdout_pipe.as_mut() {
      let _ = pipe.read_to_string(&mut stdout).await;
    }
    if let Some(pipe) = stderr_pipe.as_mut() {
      let _ = pipe.read_to_string(&mut stderr).await;
    }
    let status = child
      .wait()
      .await
      .map_err(|e| DriverError::Unavailable(format!("wait {program}: {e}")))?;
    Ok::<_, DriverError>(CommandOutput {
      exit_code: status.code().unwrap_or(-1),
      stdout,
      stderr,
    })
  };

  match tokio::time::timeout(timeout, run).await {
    Ok(result) => result,
    Err(_) => Err(DriverError::Timeout(format!("{program} exceeded {timeout:?}"))),
  }
}

async fn apply_mode(path: &str, mode: &str) -> Result<(), DriverError> {
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    let mode = u32::from_str_radix(mode, 8)
      .map_err(|_| DriverError::Unavailable(format!("invalid mode {mode}")))?;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
      .await
      .map_err(|e| io_err("chmod", path, e))?;
  }
  #[cfg(not(unix))]
  {
    let _ = (path, mode);
  }
  Ok(())
}

async fn apply_owner(path: &str, owner: Option<&str>, group: Option<&str>) -> Result<(), DriverError> {
  if owner.is_none() && group.is_none() {
    return Ok(());
  }
  let spec = match (owner, group) {
    (Some(o), Some(g)) => format!("{o}:{g}"),
    (Some(o), None) => o.to_string(),
    (None, Some(g)) => format!(":{g}"),
    (None, None) => return Ok(()),
  };
  let output = run_command(
    &["chown".to_string(), spec, path.to_string()],
    &[],
    None,
    Duration::from_secs(5),
  )
  .await?;
  if output.success() {
    Ok(())
  } else {
    Err(DriverError::PermissionDenied(format!(
      "chown {path}: {}",
      output.stderr.trim()
    )))
  }
}

fn io_err(context: &str, path: &str, error: std::io::Error) -> DriverError {
  match error.kind() {
    std::io::ErrorKind::NotFound => DriverError::NotFound(format!("{context} {path}: {error}")),
    std::io::ErrorKind::PermissionDenied => {
      DriverError::PermissionDenied(format!("{context} {path}: {error}"))
    }
    _ => DriverError::Unavailable(format!("{context} {path}: {error}")),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn writes_and_reads_back_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/greeting.txt");
    write_file(path.to_str().unwrap(), b"hello", "644", None, None)
      .await
      .unwrap();
    let contents = read_file(path.to_str().unwrap()).await.unwrap();
    assert_eq!(contents, b"hello");
  }

  #[tokio::test]
  async fn file_exists_reflects_presence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("maybe.txt");
    assert!(!file_exists(path.to_str().unwrap()).await.unwrap());
    tokio::fs::write(&path, b"x").await.unwrap();
    assert!(file_exists(path.to_str().unwrap()).await.unwrap());
  }

  #[tokio::test]
  async fn run_command_captures_stdout() {
    let output = run_command(
      &["echo".to_string(), "hi".to_string()],
      &[],
      None,
      Duration::from_secs(5),
    )
    .await
    .unwrap();
    assert!(output.success());
    assert_eq!(output.stdout.trim(), "hi");
  }

  #[tokio::test]
  async fn run_command_times_out() {
    let result = run_command(
      &["sleep".to_string(), "5".to_string()],
      &[],
      None,
      Duration::from_millis(50),
    )
    .await;
    assert!(matches!(result, Err(DriverError::Timeout(_))));
  }
}
