use std::{env, path::Path, process::Stdio};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

use super::sync_path::to_sync_path;

/// Stops every running process started from the executable at `name`. Returns how many were
/// stopped.
pub fn kill_previous_servers(name: &Path) -> Result<usize> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't read own pid: {e}"))?;
    let mut stopped = 0;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            // This will forcefully terminate the process on Windows. Anything better will require a
            // lot more work.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            info!("Stopped sync daemon {pid}");
            stopped += 1;
        }
    }
    Ok(stopped)
}

/// Path of the sync daemon installed next to the running CLI.
pub fn sync_executable() -> Result<std::path::PathBuf> {
    Ok(to_sync_path(env::current_exe()?))
}

/// Replaces a running sync daemon with a fresh detached one working on `dir`.
pub fn restart_sync_daemon(dir: &Path, api_base: Option<&str>) -> Result<()> {
    let process_name = sync_executable()?;
    kill_previous_servers(&process_name)?;
    let mut command = std::process::Command::new(&process_name);
    command.arg("--force").arg("--dir").arg(dir);
    if let Some(api_base) = api_base {
        command.arg("--api-base").arg(api_base);
    }

    #[cfg(feature = "win")]
    {
        use std::os::windows::process::CommandExt;
        use windows::Win32::System::Threading::DETACHED_PROCESS;
        command.creation_flags(DETACHED_PROCESS.0);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    #[allow(clippy::zombie_processes)]
    let child = command.spawn()?;
    info!("Spawned {process_name:?} as {}", child.id());
    Ok(())
}
