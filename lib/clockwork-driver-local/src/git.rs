use std::path::Path;

use clockwork_driver::DriverError;

pub async fn ensure_git_clone(
  url: &str,
  branch: Option<&str>,
  dest: &str,
  pull: bool,
) -> Result<(), DriverError> {
  let outcome = clockwork_git::ensure_clone(url, branch, Path::new(dest), pull)
    .await
    .map_err(|e| DriverError::Unavailable(format!("git clone {url}: {e}")))?;
  if outcome.success() {
    Ok(())
  } else {
    Err(DriverError::Unavailable(format!(
      "git clone {url} reported failure in its log output"
    )))
  }
}
