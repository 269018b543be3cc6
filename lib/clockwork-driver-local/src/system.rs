//! Host-level process/resource probes backing the numeric assertions
//! (`ProcessRunning`, `MemoryUsage`, `CpuUsage`, `DiskUsage` with no
//! `container` set). Grounded on `sysinfo`, already in the teacher's stack
//! for its own resource-usage reporting.

use clockwork_driver::{DiskUsageReading, DriverError};
use sysinfo::{Disks, System};

pub async fn process_count(name: &str) -> Result<usize, DriverError> {
  let name = name.to_string();
  tokio::task::spawn_blocking(move || {
    let mut system = System::new_all();
    system.refresh_all();
    system
      .processes()
      .values()
      .filter(|p| p.name().to_string_lossy().contains(&name))
      .count()
  })
  .await
  .map_err(|e| DriverError::Unavailable(format!("process scan: {e}")))
}

pub async fn host_memory_mb() -> Result<f64, DriverError> {
  tokio::task::spawn_blocking(|| {
    let mut system = System::new_all();
    system.refresh_memory();
    system.used_memory() as f64 / 1_048_576.0
  })
  .await
  .map_err(|e| DriverError::Unavailable(format!("memory read: {e}")))
}

pub async fn host_cpu_percent() -> Result<f64, DriverError> {
  tokio::task::spawn_blocking(|| {
    let mut system = System::new_all();
    system.refresh_cpu_usage();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_cpu_usage();
    system.global_cpu_usage() as f64
  })
  .await
  .map_err(|e| DriverError::Unavailable(format!("cpu read: {e}")))
}

pub async fn disk_usage(path: &str) -> Result<DiskUsageReading, DriverError> {
  let path = path.to_string();
  tokio::task::spawn_blocking(move || {
    let disks = Disks::new_with_refreshed_list();
    let mount = disks
      .iter()
      .filter(|d| path.starts_with(&*d.mount_point().to_string_lossy()))
      .max_by_key(|d| d.mount_point().to_string_lossy().len())
      .ok_or_else(|| DriverError::NotFound(format!("no mounted filesystem under {path}")))?;
    let total = mount.total_space();
    let available = mount.available_space();
    let used = total.saturating_sub(available);
    let used_percent = if total == 0 {
      0.0
    } else {
      used as f64 / total as f64 * 100.0
    };
    Ok(DiskUsageReading {
      used_percent,
      used_mb: used / 1_048_576,
    })
  })
  .await
  .map_err(|e| DriverError::Unavailable(format!("disk read: {e}")))?
}
