//! Git checkout helpers backing the `GitRepo` resource's deploy semantics
//! (spec.md §4.6: "if `dest/.git` exists and `pull=true`, checkout `branch`
//! and fast-forward; else clone."). Grounded on the teacher's
//! `lib/git/src/{clone,pull}.rs` shell-out idiom, generalized over
//! `clockwork-command` instead of a build-specific `CloneArgs` type.

use std::path::Path;

use clockwork_client::{all_logs_success, Log};
use clockwork_command::run_clockwork_command;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
  #[error("git operation failed: {0}")]
  CommandFailed(String),
}

/// The captured result of a clone or pull: every stage's log, plus the
/// resolved commit hash/message when available.
#[derive(Debug, Clone, Default)]
pub struct GitOutcome {
  pub logs: Vec<Log>,
  pub hash: Option<String>,
  pub message: Option<String>,
}

impl GitOutcome {
  pub fn success(&self) -> bool {
    all_logs_success(&self.logs)
  }
}

/// Clone-if-missing / pull-if-present, matching `GitRepoSpec`'s
/// `(repo_url, branch, dest, pull)` fields one-to-one.
pub async fn ensure_clone(
  repo_url: &str,
  branch: Option<&str>,
  dest: &Path,
  pull: bool,
) -> Result<GitOutcome, GitError> {
  if dest.join(".git").is_dir() {
    if pull {
      self::pull(repo_url, branch, dest).await
    } else {
      Ok(GitOutcome::default())
    }
  } else {
    self::clone(repo_url, branch, dest).await
  }
}

pub async fn clone(
  repo_url: &str,
  branch: Option<&str>,
  dest: &Path,
) -> Result<GitOutcome, GitError> {
  if let Some(parent) = dest.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .map_err(|e| GitError::CommandFailed(format!("creating {parent:?}: {e}")))?;
  }
  let branch_flag = branch.map(|b| format!(" -b {b}")).unwrap_or_default();
  let command = format!("git clone {repo_url} {}{branch_flag}", dest.display());
  let log = run_clockwork_command("clone", None, command).await;
  let success = log.success;
  let mut outcome = GitOutcome {
    logs: vec![log],
    hash: None,
    message: None,
  };
  if !success {
    return Ok(outcome);
  }
  let (hash, message) = commit_info(dest).await?;
  outcome.hash = hash;
  outcome.message = message;
  Ok(outcome)
}

pub async fn pull(
  repo_url: &str,
  branch: Option<&str>,
  dest: &Path,
) -> Result<GitOutcome, GitError> {
  let mut logs = Vec::new();

  let set_remote = run_clockwork_command(
    "set remote",
    Some(dest),
    format!("git remote set-url origin {repo_url}"),
  )
  .await;
  logs.push(set_remote);
  if !all_logs_success(&logs) {
    return Ok(GitOutcome {
      logs,
      hash: None,
      message: None,
    });
  }

  if let Some(branch) = branch {
    let checkout = run_clockwork_command(
      "checkout branch",
      Some(dest),
      format!("git checkout -f {branch}"),
    )
    .await;
    logs.push(checkout);
    if !all_logs_success(&logs) {
      return Ok(GitOutcome {
        logs,
        hash: None,
        message: None,
      });
    }
  }

  let pull_log = run_clockwork_command(
    "pull",
    Some(dest),
    format!(
      "git pull --ff-only origin {}",
      branch.unwrap_or("HEAD")
    ),
  )
  .await;
  logs.push(pull_log);
  if !all_logs_success(&logs) {
    return Ok(GitOutcome {
      logs,
      hash: None,
      message: None,
    });
  }

  let (hash, message) = commit_info(dest).await?;
  Ok(GitOutcome {
    logs,
    hash,
    message,
  })
}

/// Resolves `HEAD`'s short hash and subject line, best-effort.
async fn commit_info(
  dest: &Path,
) -> Result<(Option<String>, Option<String>), GitError> {
  let log = run_clockwork_command(
    "commit info",
    Some(dest),
    "git log -1 --format=%h%n%s",
  )
  .await;
  if !log.success {
    return Ok((None, None));
  }
  let mut lines = log.stdout.lines();
  let hash = lines.next().map(str::to_string);
  let message = lines.next().map(str::to_string);
  Ok((hash, message))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[tokio::test]
  async fn clones_and_reads_commit_info() {
    let origin = tempdir().unwrap();
    let origin_path = origin.path();
    let init = run_clockwork_command("init", Some(origin_path), "git init -q -b main").await;
    assert!(init.success, "{}", init.stderr);
    let _ = run_clockwork_command(
      "config email",
      Some(origin_path),
      "git config user.email test@example.com",
    )
    .await;
    let _ =
      run_clockwork_command("config name", Some(origin_path), "git config user.name test").await;
    tokio::fs::write(origin_path.join("file.txt"), b"hi")
      .await
      .unwrap();
    let _ = run_clockwork_command("add", Some(origin_path), "git add .").await;
    let commit = run_clockwork_command("commit", Some(origin_path), "git commit -q -m init").await;
    assert!(commit.success, "{}", commit.stderr);

    let dest = tempdir().unwrap();
    let dest_path = dest.path().join("checkout");
    let outcome = clone(&origin_path.display().to_string(), Some("main"), &dest_path)
      .await
      .unwrap();
    assert!(outcome.success(), "{:?}", outcome.logs);
    assert!(outcome.hash.is_some());
    assert_eq!(outcome.message.as_deref(), Some("init"));
  }
}
