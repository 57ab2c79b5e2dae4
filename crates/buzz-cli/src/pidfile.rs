//! Advisory pidfile for `buzz serve`.

use std::io::Write;
use std::path::{Path, PathBuf};

const PIDFILE_NAME: &str = "buzz-serve.pid";

pub fn path(data_dir: &Path) -> PathBuf {
    data_dir.join(PIDFILE_NAME)
}

/// PID recorded in the pidfile, if that process is still alive.
pub fn running_pid(data_dir: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(path(data_dir)).ok()?;
    let pid = content.trim().parse::<u32>().ok()?;
    is_process_alive(pid).then_some(pid)
}

/// Check for an existing pidfile and log accordingly, then write our own.
pub fn acquire(data_dir: &Path) -> Option<PathBuf> {
    let path = path(data_dir);
    if let Ok(content) = std::fs::read_to_string(&path)
        && let Ok(pid) = content.trim().parse::<u32>()
    {
        if is_process_alive(pid) {
            tracing::warn!(
                "another buzz serve (PID {pid}) is running, both will poll the upstream"
            );
        } else {
            tracing::info!("cleaned up stale pidfile (PID {pid} is dead)");
            let _ = std::fs::remove_file(&path);
        }
    }

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::File::create(&path) {
        Ok(mut f) => {
            let _ = write!(f, "{}", std::process::id());
            tracing::info!("wrote pidfile: {}", path.display());
            Some(path)
        }
        Err(e) => {
            tracing::warn!("failed to write pidfile: {e}");
            None
        }
    }
}

pub fn release(path: &Path) {
    let _ = std::fs::remove_file(path);
    tracing::info!("removed pidfile: {}", path.display());
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    // kill(pid, 0) checks existence without sending a signal
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    false
}
